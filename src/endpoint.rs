use std::str::FromStr;

use url::Url;

use crate::Result;
use crate::error::Error;

/// Immutable connection target: a `ws://` or `wss://` URL and the subprotocols to offer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    url: Url,
    protocols: Vec<String>,
}

impl Endpoint {
    /// Parse and validate an endpoint URL.
    pub fn new(url: &str) -> Result<Self> {
        Self::from_url(Url::parse(url)?)
    }

    pub fn from_url(url: Url) -> Result<Self> {
        match url.scheme() {
            "ws" | "wss" => {}
            other => {
                return Err(Error::validation(format!(
                    "unsupported scheme `{other}`, expected ws or wss"
                )));
            }
        }

        if url.host_str().is_none() {
            return Err(Error::validation(format!("missing host in {url}")));
        }

        Ok(Self {
            url,
            protocols: Vec::new(),
        })
    }

    /// Offer these subprotocols during the handshake, in order of preference.
    #[must_use]
    pub fn with_protocols<I, S>(mut self, protocols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.protocols = protocols.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    #[must_use]
    pub fn protocols(&self) -> &[String] {
        &self.protocols
    }

    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.url.scheme() == "wss"
    }
}

impl FromStr for Endpoint {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}
