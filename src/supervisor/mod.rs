//! Connection lifecycle supervisor.
//!
//! # Architecture
//!
//! - [`Supervisor`]: cloneable handle exposing `connect`, `send`, `close` and state observers
//! - `worker`: single task owning the transport halves, the [`Handler`], the reconnect
//!   counter and the backoff timer
//!
//! Handles talk to the worker over an unbounded command channel and observe its state through a
//! `watch` channel. Because exactly one task mutates state and invokes callbacks, transitions
//! and message delivery are serialized without locks.
//!
//! # Example
//!
//! ```no_run
//! use ws_supervisor::{Callbacks, Config, Endpoint, Supervisor};
//!
//! # async fn example() -> ws_supervisor::Result<()> {
//! let endpoint = Endpoint::new("ws://localhost:8080")?;
//! let callbacks = Callbacks::new().with_message(|text| println!("received {text}"));
//!
//! let supervisor = Supervisor::tungstenite(endpoint, Config::default(), callbacks);
//! supervisor.connect().await?;
//! _ = supervisor.send_text("hello");
//! supervisor.close();
//! supervisor.wait_closed().await;
//! # Ok(())
//! # }
//! ```

mod worker;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch};

use self::worker::{Command, Worker};
use crate::Result;
use crate::config::Config;
use crate::endpoint::Endpoint;
use crate::error::{Error, NotConnectedWarning};
use crate::handler::Handler;
use crate::timer::{Timer, TokioTimer};
use crate::transport::Transport;
use crate::types::Payload;

/// Lifecycle state of a [`Supervisor`].
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum ConnectionState {
    /// Created, `connect()` not called yet
    Idle,
    /// Handshake in progress
    Connecting,
    /// Handshake complete; frames flow both ways
    Open,
    /// `close()` sent a close frame and is waiting for the peer
    Closing,
    /// Terminal; the supervisor will never connect again
    Closed,
    /// Waiting out the backoff delay before the next attempt
    Reconnecting,
}

impl ConnectionState {
    /// Check if the connection is currently active.
    #[must_use]
    pub const fn is_connected(self) -> bool {
        matches!(self, Self::Open)
    }

    /// Whether a supervisor may move from `self` to `next`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Connecting)
                | (
                    Self::Connecting,
                    Self::Open | Self::Reconnecting | Self::Closed
                )
                | (Self::Open, Self::Closing | Self::Reconnecting | Self::Closed)
                | (Self::Closing | Self::Reconnecting, Self::Closed)
                | (Self::Reconnecting, Self::Connecting)
        )
    }
}

/// Outcome of [`Supervisor::send`].
#[non_exhaustive]
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Handed to the connection; wire delivery is up to the transport
    Accepted,
    /// Not open, so the payload was dropped without touching the transport
    NotConnected(NotConnectedWarning),
}

impl Delivery {
    pub const fn is_accepted(self) -> bool {
        matches!(self, Self::Accepted)
    }
}

/// Owns one logical WebSocket connection and drives it through its lifecycle.
///
/// Cloning yields another handle to the same connection. When every handle is dropped the
/// connection is closed as if [`Supervisor::close`] had been called.
#[derive(Clone, Debug)]
pub struct Supervisor {
    endpoint: Endpoint,
    /// Watch channel sender for state changes (for handing out receivers)
    state_tx: watch::Sender<ConnectionState>,
    /// Watch channel receiver for state changes (for checking the current state)
    state_rx: watch::Receiver<ConnectionState>,
    /// Commands for the worker task
    command_tx: mpsc::UnboundedSender<Command>,
}

impl Supervisor {
    /// Create a supervisor in [`ConnectionState::Idle`] and spawn its worker on the current
    /// tokio runtime. Nothing is dialed until [`Supervisor::connect`].
    pub fn new<T, H>(endpoint: Endpoint, config: Config, transport: T, handler: H) -> Self
    where
        T: Transport,
        H: Handler,
    {
        Self::with_timer(endpoint, config, transport, handler, TokioTimer)
    }

    /// Like [`Supervisor::new`], scheduling reconnect delays on `timer`.
    pub fn with_timer<T, H, C>(
        endpoint: Endpoint,
        config: Config,
        transport: T,
        handler: H,
        timer: C,
    ) -> Self
    where
        T: Transport,
        H: Handler,
        C: Timer,
    {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Idle);

        let worker = Worker::new(
            endpoint.clone(),
            config,
            transport,
            handler,
            timer,
            state_tx.clone(),
            command_rx,
        );
        tokio::spawn(worker.run());

        Self {
            endpoint,
            state_tx,
            state_rx,
            command_tx,
        }
    }

    /// Supervisor over [`TungsteniteTransport`](crate::transport::tungstenite::TungsteniteTransport).
    #[cfg(feature = "tungstenite")]
    pub fn tungstenite<H: Handler>(endpoint: Endpoint, config: Config, handler: H) -> Self {
        Self::new(
            endpoint,
            config,
            crate::transport::tungstenite::TungsteniteTransport::default(),
            handler,
        )
    }

    /// Open the connection, waiting until the transport reports success or failure.
    ///
    /// Fails with [`Kind::AlreadyConnected`](crate::error::Kind::AlreadyConnected) while a
    /// connection exists or is being established, and with
    /// [`Kind::Closed`](crate::error::Kind::Closed) once the supervisor is closed. A failed
    /// handshake is reported to [`Handler::on_error`], returned as
    /// [`Kind::Transport`](crate::error::Kind::Transport), and still feeds the reconnect policy.
    /// Called while reconnecting, the backoff delay is skipped.
    pub async fn connect(&self) -> Result<()> {
        let state = self.current_state();
        match state {
            ConnectionState::Connecting | ConnectionState::Open | ConnectionState::Closing => {
                return Err(Error::already_connected(state));
            }
            ConnectionState::Closed => return Err(Error::closed("supervisor is closed")),
            ConnectionState::Idle | ConnectionState::Reconnecting => {}
        }

        let (reply_tx, reply_rx) = oneshot::channel();
        self.command_tx
            .send(Command::Connect(reply_tx))
            .map_err(|_e| Error::closed("supervisor is closed"))?;

        reply_rx
            .await
            .map_err(|_e| Error::closed("supervisor is closed"))?
    }

    /// Forward `payload` to the open connection without waiting for it to be written.
    ///
    /// Returns [`Delivery::NotConnected`] when the connection is not open; that is a warning,
    /// not a failure. Payloads accepted just before an unexpected disconnect are lost.
    pub fn send<P: Into<Payload>>(&self, payload: P) -> Delivery {
        let state = self.current_state();
        if !state.is_connected() {
            #[cfg(feature = "tracing")]
            tracing::warn!(%state, "WebSocket is not connected, dropping message");
            return Delivery::NotConnected(NotConnectedWarning { state });
        }

        let payload = payload.into();

        #[cfg(feature = "tracing")]
        tracing::trace!(len = payload.len(), "Queueing WebSocket message");

        match self.command_tx.send(Command::Send(payload)) {
            Ok(()) => Delivery::Accepted,
            Err(_) => Delivery::NotConnected(NotConnectedWarning {
                state: ConnectionState::Closed,
            }),
        }
    }

    /// Send a UTF-8 text frame.
    pub fn send_text<S: Into<String>>(&self, text: S) -> Delivery {
        self.send(Payload::Text(text.into()))
    }

    /// Send a binary frame.
    pub fn send_binary<B: Into<Vec<u8>>>(&self, bytes: B) -> Delivery {
        self.send(Payload::Binary(bytes.into()))
    }

    /// Serialize `message` as JSON and send it as a text frame.
    pub fn send_json<R: Serialize>(&self, message: &R) -> Result<Delivery> {
        let json = serde_json::to_string(message)?;
        Ok(self.send(Payload::Text(json)))
    }

    /// Close the connection and stop reconnecting. Idempotent and safe to call from callbacks.
    ///
    /// From `Open` a normal closure (1000) is requested and the supervisor moves to `Closed`
    /// once the peer confirms or the close timeout passes. A pending handshake or reconnect
    /// delay is canceled. In `Idle` and `Closed` this does nothing.
    pub fn close(&self) {
        // Routed through the worker even when idle so it stays ordered after a pending connect
        _ = self.command_tx.send(Command::Close);
    }

    /// Wait until the supervisor reaches [`ConnectionState::Closed`].
    ///
    /// Never resolves for a supervisor that stays `Idle`.
    pub async fn wait_closed(&self) {
        let mut state_rx = self.state_tx.subscribe();
        _ = state_rx
            .wait_for(|state| *state == ConnectionState::Closed)
            .await;
    }

    /// Get the current connection state.
    #[must_use]
    pub fn current_state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.current_state().is_connected()
    }

    /// Subscribe to connection state changes.
    ///
    /// A `watch` receiver only keeps the latest value; use [`Handler::on_state_change`] to see
    /// every transition.
    #[must_use]
    pub fn state_receiver(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    #[must_use]
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [ConnectionState; 6] = [
        ConnectionState::Idle,
        ConnectionState::Connecting,
        ConnectionState::Open,
        ConnectionState::Closing,
        ConnectionState::Closed,
        ConnectionState::Reconnecting,
    ];

    #[test]
    fn closed_is_terminal() {
        for next in ALL {
            assert!(!ConnectionState::Closed.can_transition_to(next), "{next}");
        }
    }

    #[test]
    fn idle_only_connects() {
        let allowed: Vec<_> = ALL
            .into_iter()
            .filter(|next| ConnectionState::Idle.can_transition_to(*next))
            .collect();

        assert_eq!(allowed, [ConnectionState::Connecting]);
    }

    #[test]
    fn open_cannot_be_entered_from_idle() {
        assert!(!ConnectionState::Idle.can_transition_to(ConnectionState::Open));
        assert!(!ConnectionState::Reconnecting.can_transition_to(ConnectionState::Open));
        assert!(ConnectionState::Connecting.can_transition_to(ConnectionState::Open));
    }

    #[test]
    fn closing_only_closes() {
        for next in ALL {
            assert_eq!(
                ConnectionState::Closing.can_transition_to(next),
                next == ConnectionState::Closed,
                "{next}"
            );
        }
    }

    #[test]
    fn display_is_lowercase() {
        assert_eq!(ConnectionState::Reconnecting.to_string(), "reconnecting");
        assert_eq!(ConnectionState::Open.to_string(), "open");
    }
}
