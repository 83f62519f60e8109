//! Value types shared by the supervisor, its callbacks, and transports.

use std::fmt;

/// Parsed, validated WebSocket URL, re-exported so callers don't need the `url` crate.
pub use url::Url;

/// Close code for a normal, intentional closure.
pub const NORMAL_CLOSURE: u16 = 1000;
/// Close code reported when a close frame carried no status code.
pub const NO_STATUS_RECEIVED: u16 = 1005;
/// Close code reported when the connection dropped without a close frame.
pub const ABNORMAL_CLOSURE: u16 = 1006;

/// Outbound message. Text and binary payloads are framed distinctly and never converted.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// UTF-8 text frame
    Text(String),
    /// Opaque binary frame
    Binary(Vec<u8>),
}

impl Payload {
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Text(text) => text.len(),
            Self::Binary(bytes) => bytes.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Binary(bytes)
    }
}

impl From<&[u8]> for Payload {
    fn from(bytes: &[u8]) -> Self {
        Self::Binary(bytes.to_vec())
    }
}

/// Close status code and reason, as sent or received in a close frame.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseFrame {
    pub code: u16,
    pub reason: String,
}

impl CloseFrame {
    pub fn new<S: Into<String>>(code: u16, reason: S) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }

    /// `1000` with an empty reason, sent by [`Supervisor::close`](crate::Supervisor::close).
    #[must_use]
    pub fn normal() -> Self {
        Self::new(NORMAL_CLOSURE, "")
    }

    pub fn abnormal<S: Into<String>>(reason: S) -> Self {
        Self::new(ABNORMAL_CLOSURE, reason)
    }

    #[must_use]
    pub fn is_normal(&self) -> bool {
        self.code == NORMAL_CLOSURE
    }
}

impl fmt::Display for CloseFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.reason.is_empty() {
            write!(f, "{}", self.code)
        } else {
            write!(f, "{} ({})", self.code, self.reason)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_conversions_keep_kind() {
        assert_eq!(Payload::from("hi"), Payload::Text("hi".to_owned()));
        assert_eq!(Payload::from(vec![1_u8, 2]), Payload::Binary(vec![1, 2]));
        assert_eq!(Payload::from(&b"hi"[..]).len(), 2);
    }

    #[test]
    fn close_frame_display() {
        assert_eq!(CloseFrame::normal().to_string(), "1000");
        assert_eq!(
            CloseFrame::abnormal("reset").to_string(),
            "1006 (reset)"
        );
    }
}
