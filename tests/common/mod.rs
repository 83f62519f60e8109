#![allow(
    clippy::unwrap_used,
    clippy::missing_panics_doc,
    reason = "Do not need additional syntax for setting up tests"
)]
#![allow(
    unused,
    reason = "Not every test binary uses every helper"
)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::channel::mpsc as chan;
use futures::future::{self, BoxFuture};
use futures::{FutureExt as _, SinkExt as _, StreamExt as _};
use tokio::sync::mpsc;
use tokio::time::timeout;
use ws_supervisor::error::TransportError;
use ws_supervisor::timer::Timer;
use ws_supervisor::transport::{EventStream, Frame, FrameSink, Transport, TransportEvent};
use ws_supervisor::{CloseFrame, ConnectionState, Endpoint, Error, Handler, Kind};

pub const WAIT: Duration = Duration::from_secs(2);

#[must_use]
pub fn endpoint() -> Endpoint {
    Endpoint::new("ws://127.0.0.1:9/feed").unwrap()
}

/// How the next call to [`Transport::open`] behaves.
pub enum Script {
    Fail(&'static str),
    Accept(Peer),
    /// Never completes; only `close()` ends the attempt
    Hang,
}

/// Transport side of an accepted in-memory connection.
pub struct Peer {
    events_rx: chan::UnboundedReceiver<TransportEvent>,
    frames_tx: chan::UnboundedSender<Frame>,
    echo: chan::UnboundedSender<TransportEvent>,
    /// Answer a close frame with the same close frame
    echo_close: bool,
}

/// Test-side controls of an accepted connection. Keep it alive for as long as the connection
/// should stay writable.
pub struct PeerHandle {
    pub events: chan::UnboundedSender<TransportEvent>,
    pub frames: chan::UnboundedReceiver<Frame>,
}

impl PeerHandle {
    pub fn text(&self, text: &str) {
        self.events
            .unbounded_send(TransportEvent::Text(text.to_owned()))
            .unwrap();
    }

    pub fn binary(&self, bytes: &[u8]) {
        self.events
            .unbounded_send(TransportEvent::Binary(bytes.to_vec()))
            .unwrap();
    }

    pub fn error(&self, detail: &str) {
        self.events
            .unbounded_send(TransportEvent::Error(detail.to_owned()))
            .unwrap();
    }

    pub fn close(&self, code: u16, reason: &str) {
        self.events
            .unbounded_send(TransportEvent::Closed(CloseFrame::new(code, reason)))
            .unwrap();
    }

    pub async fn next_frame(&mut self) -> Option<Frame> {
        timeout(WAIT, self.frames.next()).await.ok().flatten()
    }

    /// Frames received so far, without waiting.
    pub fn drain_frames(&mut self) -> Vec<Frame> {
        let mut frames = Vec::new();
        while let Some(Some(frame)) = self.frames.next().now_or_never() {
            frames.push(frame);
        }
        frames
    }
}

#[must_use]
pub fn peer(echo_close: bool) -> (Script, PeerHandle) {
    let (events_tx, events_rx) = chan::unbounded();
    let (frames_tx, frames_rx) = chan::unbounded();

    let script = Script::Accept(Peer {
        events_rx,
        frames_tx,
        echo: events_tx.clone(),
        echo_close,
    });
    let handle = PeerHandle {
        events: events_tx,
        frames: frames_rx,
    };

    (script, handle)
}

/// Scripted in-memory [`Transport`].
#[derive(Clone, Default)]
pub struct MockTransport {
    scripts: Arc<Mutex<VecDeque<Script>>>,
    opens: Arc<AtomicUsize>,
}

impl MockTransport {
    #[must_use]
    pub fn new<I: IntoIterator<Item = Script>>(scripts: I) -> Self {
        Self {
            scripts: Arc::new(Mutex::new(scripts.into_iter().collect())),
            opens: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn push(&self, script: Script) {
        self.scripts.lock().unwrap().push_back(script);
    }

    /// Number of handshakes attempted so far.
    #[must_use]
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn open(&self, _endpoint: &Endpoint) -> Result<(FrameSink, EventStream), TransportError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let script = self.scripts.lock().unwrap().pop_front();

        match script {
            None => Err(TransportError::new("connection refused")),
            Some(Script::Fail(detail)) => Err(TransportError::new(detail)),
            Some(Script::Hang) => future::pending().await,
            Some(Script::Accept(peer)) => {
                let Peer {
                    events_rx,
                    frames_tx,
                    echo,
                    echo_close,
                } = peer;

                let sink = frames_tx
                    .sink_map_err(|e| TransportError::with_source("peer gone", e))
                    .with(move |frame: Frame| {
                        if let Frame::Close(close) = &frame
                            && echo_close
                        {
                            _ = echo.unbounded_send(TransportEvent::Closed(close.clone()));
                        }
                        future::ready(Ok::<_, TransportError>(frame))
                    });

                Ok((Box::pin(sink), Box::pin(events_rx)))
            }
        }
    }
}

/// [`Timer`] that records every requested delay and resolves immediately.
#[derive(Clone, Default)]
pub struct InstantTimer {
    pub delays: Arc<Mutex<Vec<Duration>>>,
}

impl Timer for InstantTimer {
    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()> {
        self.delays.lock().unwrap().push(duration);
        Box::pin(future::ready(()))
    }
}

/// [`Timer`] whose sleeps never finish.
#[derive(Clone, Copy, Default)]
pub struct FrozenTimer;

impl Timer for FrozenTimer {
    fn sleep(&self, _duration: Duration) -> BoxFuture<'static, ()> {
        Box::pin(future::pending())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Seen {
    Open,
    Text(String),
    Binary(Vec<u8>),
    Close(CloseFrame),
    Error(Kind),
    Reconnecting(u32),
}

/// [`Handler`] that reports every callback on a channel and records transitions.
pub struct Recorder {
    seen: mpsc::UnboundedSender<Seen>,
    transitions: Arc<Mutex<Vec<(ConnectionState, ConnectionState)>>>,
}

pub struct Observed {
    pub seen: mpsc::UnboundedReceiver<Seen>,
    pub transitions: Arc<Mutex<Vec<(ConnectionState, ConnectionState)>>>,
}

impl Observed {
    pub async fn next(&mut self) -> Seen {
        timeout(WAIT, self.seen.recv())
            .await
            .expect("timed out waiting for a callback")
            .expect("handler dropped")
    }

    /// Everything reported so far, without waiting.
    pub fn drain(&mut self) -> Vec<Seen> {
        let mut seen = Vec::new();
        while let Ok(event) = self.seen.try_recv() {
            seen.push(event);
        }
        seen
    }

    #[must_use]
    pub fn transitions(&self) -> Vec<(ConnectionState, ConnectionState)> {
        self.transitions.lock().unwrap().clone()
    }

    /// Fail if any observed transition is not allowed by the state table.
    pub fn assert_valid_transitions(&self) {
        for (previous, current) in self.transitions() {
            assert!(
                previous.can_transition_to(current),
                "invalid transition {previous} -> {current}"
            );
        }
    }
}

#[must_use]
pub fn recorder() -> (Recorder, Observed) {
    let (seen_tx, seen_rx) = mpsc::unbounded_channel();
    let transitions = Arc::new(Mutex::new(Vec::new()));

    (
        Recorder {
            seen: seen_tx,
            transitions: Arc::clone(&transitions),
        },
        Observed {
            seen: seen_rx,
            transitions,
        },
    )
}

impl Handler for Recorder {
    fn on_open(&mut self) {
        _ = self.seen.send(Seen::Open);
    }

    fn on_message(&mut self, text: &str) {
        _ = self.seen.send(Seen::Text(text.to_owned()));
    }

    fn on_binary_message(&mut self, bytes: &[u8]) {
        _ = self.seen.send(Seen::Binary(bytes.to_vec()));
    }

    fn on_close(&mut self, frame: &CloseFrame) {
        _ = self.seen.send(Seen::Close(frame.clone()));
    }

    fn on_error(&mut self, error: &Error) {
        _ = self.seen.send(Seen::Error(error.kind()));
    }

    fn on_reconnecting(&mut self, attempt: u32, _delay: Duration) {
        _ = self.seen.send(Seen::Reconnecting(attempt));
    }

    fn on_state_change(&mut self, previous: ConnectionState, current: ConnectionState) {
        self.transitions.lock().unwrap().push((previous, current));
    }
}
