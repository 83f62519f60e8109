use std::time::Duration;

use backoff::ExponentialBackoff;
use backoff::backoff::Backoff as _;
use futures::{SinkExt as _, StreamExt as _};
use tokio::sync::{mpsc, oneshot, watch};

use super::ConnectionState;
use crate::Result;
use crate::config::Config;
use crate::endpoint::Endpoint;
use crate::error::{Error, TransportError};
use crate::handler::Handler;
use crate::timer::Timer;
use crate::transport::{EventStream, Frame, FrameSink, Transport, TransportEvent};
use crate::types::{CloseFrame, Payload};

/// Requests from [`Supervisor`](super::Supervisor) handles.
#[derive(Debug)]
pub(super) enum Command {
    Connect(oneshot::Sender<Result<()>>),
    Send(Payload),
    Close,
}

/// What the worker does next. Each variant maps to one [`ConnectionState`] phase.
enum Step {
    Idle,
    Connect,
    Open(FrameSink, EventStream),
    Reconnect(Duration),
    Closed(CloseFrame),
    /// Every handle dropped before a connection was ever requested
    Exit,
}

/// Publishes [`ConnectionState::Closed`] when the worker goes away without reaching it, which
/// only happens when a callback panics or the runtime shuts down.
struct PublishClosed(watch::Sender<ConnectionState>);

impl Drop for PublishClosed {
    fn drop(&mut self) {
        _ = self.0.send_if_modified(|state| {
            if matches!(*state, ConnectionState::Idle | ConnectionState::Closed) {
                return false;
            }
            *state = ConnectionState::Closed;
            true
        });
    }
}

enum Attempt {
    Finished(std::result::Result<(FrameSink, EventStream), TransportError>),
    Canceled,
}

/// Task owning the connection. The only place state, the reconnect counter and the handler are
/// touched.
pub(super) struct Worker<T, H, C> {
    endpoint: Endpoint,
    config: Config,
    transport: T,
    handler: H,
    timer: C,
    state_tx: watch::Sender<ConnectionState>,
    commands: mpsc::UnboundedReceiver<Command>,
    /// Reconnection attempts since the last successful open
    attempts: u32,
    backoff: ExponentialBackoff,
    /// `connect()` caller waiting on the current handshake
    waiter: Option<oneshot::Sender<Result<()>>>,
}

impl<T, H, C> Worker<T, H, C>
where
    T: Transport,
    H: Handler,
    C: Timer,
{
    pub(super) fn new(
        endpoint: Endpoint,
        config: Config,
        transport: T,
        handler: H,
        timer: C,
        state_tx: watch::Sender<ConnectionState>,
        commands: mpsc::UnboundedReceiver<Command>,
    ) -> Self {
        let backoff = ExponentialBackoff::from(&config.reconnect);

        Self {
            endpoint,
            config,
            transport,
            handler,
            timer,
            state_tx,
            commands,
            attempts: 0,
            backoff,
            waiter: None,
        }
    }

    pub(super) async fn run(mut self) {
        let _publish_closed = PublishClosed(self.state_tx.clone());
        let mut step = Step::Idle;

        loop {
            step = match step {
                Step::Idle => self.idle().await,
                Step::Connect => self.connecting().await,
                Step::Open(sink, events) => self.open(sink, events).await,
                Step::Reconnect(delay) => self.reconnecting(delay).await,
                Step::Closed(frame) => {
                    self.closed(&frame);
                    return;
                }
                Step::Exit => return,
            };
        }
    }

    async fn idle(&mut self) -> Step {
        loop {
            match self.commands.recv().await {
                Some(Command::Connect(reply)) => {
                    self.waiter = Some(reply);
                    return Step::Connect;
                }
                Some(Command::Send(_) | Command::Close) => {}
                None => return Step::Exit,
            }
        }
    }

    async fn connecting(&mut self) -> Step {
        self.transition(ConnectionState::Connecting);

        #[cfg(feature = "tracing")]
        tracing::debug!(url = %self.endpoint.url(), attempt = self.attempts, "Connecting");

        let outcome = {
            let mut attempt = self.transport.open(&self.endpoint);

            loop {
                tokio::select! {
                    biased;

                    command = self.commands.recv() => match command {
                        Some(Command::Connect(reply)) => {
                            _ = reply.send(Err(Error::already_connected(ConnectionState::Connecting)));
                        }
                        Some(Command::Send(_)) => {}
                        Some(Command::Close) | None => break Attempt::Canceled,
                    },
                    result = &mut attempt => break Attempt::Finished(result),
                }
            }
        };

        match outcome {
            Attempt::Finished(Ok((sink, events))) => {
                self.attempts = 0;
                self.backoff.reset();
                self.transition(ConnectionState::Open);

                #[cfg(feature = "tracing")]
                tracing::info!(url = %self.endpoint.url(), "Connected to WebSocket server");

                self.handler.on_open();
                if let Some(waiter) = self.waiter.take() {
                    _ = waiter.send(Ok(()));
                }

                Step::Open(sink, events)
            }
            Attempt::Finished(Err(e)) => {
                let frame = CloseFrame::abnormal(e.detail.clone());
                let error = Error::from(e);

                #[cfg(feature = "tracing")]
                tracing::warn!(error = %error, "Unable to connect");

                self.handler.on_error(&error);
                if let Some(waiter) = self.waiter.take() {
                    _ = waiter.send(Err(error));
                }

                self.after_failure(frame)
            }
            Attempt::Canceled => {
                #[cfg(feature = "tracing")]
                tracing::debug!("Connection attempt canceled");

                if let Some(waiter) = self.waiter.take() {
                    _ = waiter.send(Err(Error::closed("connection attempt canceled by close()")));
                }

                Step::Closed(CloseFrame::normal())
            }
        }
    }

    async fn open(&mut self, mut sink: FrameSink, mut events: EventStream) -> Step {
        loop {
            tokio::select! {
                event = events.next() => match event {
                    Some(TransportEvent::Text(text)) => self.handler.on_message(&text),
                    Some(TransportEvent::Binary(bytes)) => self.handler.on_binary_message(&bytes),
                    Some(TransportEvent::Error(detail)) => self.report(TransportError::new(detail)),
                    Some(TransportEvent::Closed(frame)) => {
                        #[cfg(feature = "tracing")]
                        tracing::warn!(code = frame.code, reason = %frame.reason, "Connection closed by peer");

                        return self.after_failure(frame);
                    }
                    None => {
                        #[cfg(feature = "tracing")]
                        tracing::warn!("Connection dropped without a close frame");

                        return self.after_failure(CloseFrame::abnormal(""));
                    }
                },

                command = self.commands.recv() => match command {
                    Some(Command::Connect(reply)) => {
                        _ = reply.send(Err(Error::already_connected(ConnectionState::Open)));
                    }
                    Some(Command::Send(payload)) => {
                        if let Err(e) = sink.send(Frame::from(payload)).await {
                            let frame = CloseFrame::abnormal(e.detail.clone());
                            self.report(e);
                            return self.after_failure(frame);
                        }
                    }
                    Some(Command::Close) | None => return self.closing(sink, events).await,
                },
            }
        }
    }

    /// Send a normal close frame and wait for the peer's confirmation, delivering any frames
    /// that arrive in the meantime.
    async fn closing(&mut self, mut sink: FrameSink, mut events: EventStream) -> Step {
        self.transition(ConnectionState::Closing);

        let frame = CloseFrame::normal();
        if let Err(e) = sink.send(Frame::Close(frame.clone())).await {
            #[cfg(feature = "tracing")]
            tracing::debug!(error = %e, "Unable to send close frame");
            #[cfg(not(feature = "tracing"))]
            let _ = &e;

            return Step::Closed(frame);
        }

        let handler = &mut self.handler;
        let confirmation = async {
            while let Some(event) = events.next().await {
                match event {
                    TransportEvent::Text(text) => handler.on_message(&text),
                    TransportEvent::Binary(bytes) => handler.on_binary_message(&bytes),
                    TransportEvent::Closed(confirmed) => return Some(confirmed),
                    TransportEvent::Error(detail) => {
                        let error = Error::from(TransportError::new(detail));

                        #[cfg(feature = "tracing")]
                        tracing::warn!(error = %error, "WebSocket transport error while closing");

                        handler.on_error(&error);
                    }
                }
            }
            None
        };
        let deadline = self.timer.sleep(self.config.close_timeout);

        tokio::select! {
            confirmed = confirmation => Step::Closed(confirmed.unwrap_or(frame)),
            () = deadline => {
                #[cfg(feature = "tracing")]
                tracing::debug!(timeout = ?self.config.close_timeout, "Peer did not confirm close");

                Step::Closed(frame)
            }
        }
    }

    async fn reconnecting(&mut self, delay: Duration) -> Step {
        self.transition(ConnectionState::Reconnecting);

        #[cfg(feature = "tracing")]
        tracing::info!(attempt = self.attempts, ?delay, "Attempting to reconnect");

        self.handler.on_reconnecting(self.attempts, delay);

        let mut timer = self.timer.sleep(delay);
        loop {
            tokio::select! {
                biased;

                command = self.commands.recv() => match command {
                    Some(Command::Connect(reply)) => {
                        self.waiter = Some(reply);
                        return Step::Connect;
                    }
                    Some(Command::Send(_)) => {}
                    Some(Command::Close) | None => return Step::Closed(CloseFrame::normal()),
                },
                () = &mut timer => return Step::Connect,
            }
        }
    }

    fn closed(&mut self, frame: &CloseFrame) {
        self.transition(ConnectionState::Closed);

        #[cfg(feature = "tracing")]
        tracing::info!(code = frame.code, reason = %frame.reason, "Disconnected from WebSocket server");

        self.handler.on_close(frame);
    }

    /// Apply the reconnect policy after an unexpected close or a failed handshake.
    fn after_failure(&mut self, frame: CloseFrame) -> Step {
        if self.attempts >= self.config.reconnect.max_attempts {
            let error = Error::reconnect_exhausted(self.attempts);

            #[cfg(feature = "tracing")]
            tracing::error!(attempts = self.attempts, "Max reconnection attempts reached");

            self.handler.on_error(&error);
            return Step::Closed(frame);
        }

        self.attempts = self.attempts.saturating_add(1);
        let delay = self
            .backoff
            .next_backoff()
            .unwrap_or(self.config.reconnect.interval);

        Step::Reconnect(delay)
    }

    fn report(&mut self, error: TransportError) {
        let error = Error::from(error);

        #[cfg(feature = "tracing")]
        tracing::warn!(error = %error, "WebSocket transport error");

        self.handler.on_error(&error);
    }

    fn transition(&mut self, next: ConnectionState) {
        let previous = self.state_tx.send_replace(next);
        debug_assert!(
            previous.can_transition_to(next),
            "invalid transition {previous} -> {next}"
        );

        #[cfg(feature = "tracing")]
        tracing::trace!(%previous, %next, "Connection state changed");

        self.handler.on_state_change(previous, next);
    }
}
