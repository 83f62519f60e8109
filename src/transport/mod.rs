//! Boundary between the supervisor and the library that actually speaks WebSocket.
//!
//! A [`Transport`] performs the handshake and returns a pair of halves: a [`FrameSink`]
//! for outbound frames and an [`EventStream`] of inbound events. The supervisor owns both
//! halves exclusively for the lifetime of the connection. Handshake details, masking,
//! ping/pong and TLS all stay behind this trait.

use std::pin::Pin;

use async_trait::async_trait;
use futures::{Sink, Stream};

use crate::endpoint::Endpoint;
use crate::error::TransportError;
use crate::types::{CloseFrame, Payload};

#[cfg(feature = "tungstenite")]
pub mod tungstenite;

/// Outbound half of an open connection.
pub type FrameSink = Pin<Box<dyn Sink<Frame, Error = TransportError> + Send>>;

/// Inbound half of an open connection.
///
/// The stream ending without a [`TransportEvent::Closed`] is treated as an abnormal closure.
pub type EventStream = Pin<Box<dyn Stream<Item = TransportEvent> + Send>>;

/// Frame handed to a [`FrameSink`].
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
    Close(CloseFrame),
}

impl From<Payload> for Frame {
    fn from(payload: Payload) -> Self {
        match payload {
            Payload::Text(text) => Self::Text(text),
            Payload::Binary(bytes) => Self::Binary(bytes),
        }
    }
}

/// Event reported by an [`EventStream`].
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A complete text message
    Text(String),
    /// A complete binary message
    Binary(Vec<u8>),
    /// The connection closed with this code and reason; no further events follow
    Closed(CloseFrame),
    /// A non-terminal error; a fatal one is followed by [`TransportEvent::Closed`]
    Error(String),
}

/// Opens connections to an [`Endpoint`].
///
/// A successful return from [`Transport::open`] is the "opened" event. Implementations must be
/// cancel-safe: the supervisor drops the returned future when `close()` interrupts a handshake.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn open(&self, endpoint: &Endpoint) -> Result<(FrameSink, EventStream), TransportError>;
}
