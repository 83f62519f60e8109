//! [`Transport`] backed by `tokio-tungstenite`.
//!
//! **Feature flag:** `tungstenite` (enabled by default)

use std::time::Duration;

use async_trait::async_trait;
use futures::future::{self, Ready};
use futures::stream::{self, SplitStream};
use futures::{SinkExt as _, StreamExt as _};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::client::IntoClientRequest as _;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::SEC_WEBSOCKET_PROTOCOL;
use tokio_tungstenite::tungstenite::protocol::CloseFrame as WsCloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};

use super::{EventStream, Frame, FrameSink, Transport, TransportEvent};
use crate::endpoint::Endpoint;
use crate::error::TransportError;
use crate::types::{ABNORMAL_CLOSURE, CloseFrame, NO_STATUS_RECEIVED};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Transport that dials with [`connect_async`] and speaks RFC 6455 through tungstenite.
///
/// Ping frames are answered by tungstenite itself and never surface as events.
#[non_exhaustive]
#[derive(Debug, Clone, Default)]
pub struct TungsteniteTransport {
    /// Upper bound for TCP connect, TLS and HTTP upgrade combined
    pub handshake_timeout: Option<Duration>,
}

impl TungsteniteTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_handshake_timeout(mut self, duration: Duration) -> Self {
        self.handshake_timeout = Some(duration);
        self
    }
}

#[async_trait]
impl Transport for TungsteniteTransport {
    async fn open(&self, endpoint: &Endpoint) -> Result<(FrameSink, EventStream), TransportError> {
        let mut request = endpoint.url().as_str().into_client_request()?;

        if !endpoint.protocols().is_empty() {
            let value = HeaderValue::from_str(&endpoint.protocols().join(", "))
                .map_err(|e| TransportError::with_source("invalid subprotocol list", e))?;
            request.headers_mut().insert(SEC_WEBSOCKET_PROTOCOL, value);
        }

        let handshake = connect_async(request);
        let (ws_stream, response) = match self.handshake_timeout {
            Some(limit) => timeout(limit, handshake)
                .await
                .map_err(|e| TransportError::with_source("handshake timed out", e))??,
            None => handshake.await?,
        };

        #[cfg(feature = "tracing")]
        tracing::debug!(
            url = %endpoint.url(),
            status = %response.status(),
            protocol = ?response.headers().get(SEC_WEBSOCKET_PROTOCOL),
            "WebSocket handshake complete"
        );
        #[cfg(not(feature = "tracing"))]
        let _ = &response;

        let (write, read) = ws_stream.split();

        let sink = write
            .sink_map_err(TransportError::from)
            .with(|frame: Frame| -> Ready<Result<Message, TransportError>> {
                future::ready(Ok(to_message(frame)))
            });

        Ok((Box::pin(sink), events(read)))
    }
}

fn to_message(frame: Frame) -> Message {
    match frame {
        Frame::Text(text) => Message::Text(text.into()),
        Frame::Binary(bytes) => Message::Binary(bytes.into()),
        Frame::Close(close) => Message::Close(Some(WsCloseFrame {
            code: CloseCode::from(close.code),
            reason: close.reason.into(),
        })),
    }
}

fn to_close_frame(frame: Option<WsCloseFrame>) -> CloseFrame {
    match frame {
        Some(frame) => CloseFrame::new(u16::from(frame.code), frame.reason.as_str()),
        None => CloseFrame::new(NO_STATUS_RECEIVED, ""),
    }
}

/// Where the inbound half is in its lifecycle.
enum ReadState {
    Reading(SplitStream<WsStream>),
    /// A read failed; report the abnormal closure next
    Failed(String),
    Done,
}

/// Translate tungstenite messages into [`TransportEvent`]s.
///
/// Exactly one [`TransportEvent::Closed`] is produced, after which the stream ends.
fn events(read: SplitStream<WsStream>) -> EventStream {
    Box::pin(stream::unfold(ReadState::Reading(read), |state| async move {
        match state {
            ReadState::Reading(mut read) => loop {
                match read.next().await {
                    Some(Ok(Message::Text(text))) => {
                        return Some((
                            TransportEvent::Text(text.as_str().to_owned()),
                            ReadState::Reading(read),
                        ));
                    }
                    Some(Ok(Message::Binary(bytes))) => {
                        return Some((
                            TransportEvent::Binary(bytes.to_vec()),
                            ReadState::Reading(read),
                        ));
                    }
                    Some(Ok(Message::Close(frame))) => {
                        return Some((
                            TransportEvent::Closed(to_close_frame(frame)),
                            ReadState::Done,
                        ));
                    }
                    Some(Ok(_)) => {
                        // Ping, pong and raw frames are protocol plumbing
                    }
                    Some(Err(e)) => {
                        let detail = e.to_string();
                        return Some((
                            TransportEvent::Error(detail.clone()),
                            ReadState::Failed(detail),
                        ));
                    }
                    None => {
                        return Some((
                            TransportEvent::Closed(CloseFrame::new(ABNORMAL_CLOSURE, "")),
                            ReadState::Done,
                        ));
                    }
                }
            },
            ReadState::Failed(detail) => Some((
                TransportEvent::Closed(CloseFrame::new(ABNORMAL_CLOSURE, detail)),
                ReadState::Done,
            )),
            ReadState::Done => None,
        }
    }))
}
