//! Lifecycle callbacks.
//!
//! The supervisor owns its handler and calls it from a single task, so callbacks never run
//! concurrently and may keep plain mutable state. Callbacks must not block; they may call
//! [`Supervisor::close`](crate::Supervisor::close) and
//! [`Supervisor::send`](crate::Supervisor::send), which only enqueue work.

use std::fmt;
use std::time::Duration;

use crate::error::Error;
use crate::supervisor::ConnectionState;
use crate::types::CloseFrame;

/// Receives connection lifecycle events. Every method defaults to doing nothing.
///
/// A panicking callback ends the supervisor: its state is published as
/// [`ConnectionState::Closed`] without `on_close`, and pending `connect()` calls fail with
/// [`Kind::Closed`](crate::error::Kind::Closed).
pub trait Handler: Send + 'static {
    /// The transport finished its handshake.
    fn on_open(&mut self) {}

    /// A text frame arrived.
    fn on_message(&mut self, text: &str) {
        _ = text;
    }

    /// A binary frame arrived.
    fn on_binary_message(&mut self, bytes: &[u8]) {
        _ = bytes;
    }

    /// The supervisor reached its terminal state. Called exactly once per supervisor that
    /// ever left [`ConnectionState::Idle`].
    fn on_close(&mut self, frame: &CloseFrame) {
        _ = frame;
    }

    /// The transport reported a failure, or reconnection was abandoned.
    fn on_error(&mut self, error: &Error) {
        _ = error;
    }

    /// A reconnection attempt is scheduled after `delay`. `attempt` starts at 1.
    fn on_reconnecting(&mut self, attempt: u32, delay: Duration) {
        _ = (attempt, delay);
    }

    /// Every state transition, in order.
    fn on_state_change(&mut self, previous: ConnectionState, current: ConnectionState) {
        _ = (previous, current);
    }
}

type Slot<F> = Option<Box<F>>;

/// [`Handler`] assembled from closures.
///
/// ```
/// use ws_supervisor::Callbacks;
///
/// let callbacks = Callbacks::new()
///     .with_open(|| println!("connected"))
///     .with_message(|text| println!("received {text}"))
///     .with_close(|frame| println!("closed with {frame}"));
/// # drop(callbacks);
/// ```
#[derive(Default)]
pub struct Callbacks {
    open: Slot<dyn FnMut() + Send>,
    message: Slot<dyn FnMut(&str) + Send>,
    binary_message: Slot<dyn FnMut(&[u8]) + Send>,
    close: Slot<dyn FnMut(&CloseFrame) + Send>,
    error: Slot<dyn FnMut(&Error) + Send>,
    reconnecting: Slot<dyn FnMut(u32, Duration) + Send>,
    state_change: Slot<dyn FnMut(ConnectionState, ConnectionState) + Send>,
}

impl Callbacks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_open<F: FnMut() + Send + 'static>(mut self, f: F) -> Self {
        self.open = Some(Box::new(f));
        self
    }

    #[must_use]
    pub fn with_message<F: FnMut(&str) + Send + 'static>(mut self, f: F) -> Self {
        self.message = Some(Box::new(f));
        self
    }

    #[must_use]
    pub fn with_binary_message<F: FnMut(&[u8]) + Send + 'static>(mut self, f: F) -> Self {
        self.binary_message = Some(Box::new(f));
        self
    }

    #[must_use]
    pub fn with_close<F: FnMut(&CloseFrame) + Send + 'static>(mut self, f: F) -> Self {
        self.close = Some(Box::new(f));
        self
    }

    #[must_use]
    pub fn with_error<F: FnMut(&Error) + Send + 'static>(mut self, f: F) -> Self {
        self.error = Some(Box::new(f));
        self
    }

    #[must_use]
    pub fn with_reconnecting<F: FnMut(u32, Duration) + Send + 'static>(mut self, f: F) -> Self {
        self.reconnecting = Some(Box::new(f));
        self
    }

    #[must_use]
    pub fn with_state_change<F>(mut self, f: F) -> Self
    where
        F: FnMut(ConnectionState, ConnectionState) + Send + 'static,
    {
        self.state_change = Some(Box::new(f));
        self
    }
}

impl Handler for Callbacks {
    fn on_open(&mut self) {
        if let Some(f) = self.open.as_mut() {
            f();
        }
    }

    fn on_message(&mut self, text: &str) {
        if let Some(f) = self.message.as_mut() {
            f(text);
        }
    }

    fn on_binary_message(&mut self, bytes: &[u8]) {
        if let Some(f) = self.binary_message.as_mut() {
            f(bytes);
        }
    }

    fn on_close(&mut self, frame: &CloseFrame) {
        if let Some(f) = self.close.as_mut() {
            f(frame);
        }
    }

    fn on_error(&mut self, error: &Error) {
        if let Some(f) = self.error.as_mut() {
            f(error);
        }
    }

    fn on_reconnecting(&mut self, attempt: u32, delay: Duration) {
        if let Some(f) = self.reconnecting.as_mut() {
            f(attempt, delay);
        }
    }

    fn on_state_change(&mut self, previous: ConnectionState, current: ConnectionState) {
        if let Some(f) = self.state_change.as_mut() {
            f(previous, current);
        }
    }
}

impl fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callbacks")
            .field("on_open", &self.open.is_some())
            .field("on_message", &self.message.is_some())
            .field("on_binary_message", &self.binary_message.is_some())
            .field("on_close", &self.close.is_some())
            .field("on_error", &self.error.is_some())
            .field("on_reconnecting", &self.reconnecting.is_some())
            .field("on_state_change", &self.state_change.is_some())
            .finish()
    }
}

/// Handler that ignores every event.
impl Handler for () {}
