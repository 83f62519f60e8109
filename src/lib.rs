#![cfg_attr(doc, doc = include_str!("../README.md"))]

pub mod config;
pub mod endpoint;
pub mod error;
pub mod handler;
pub mod message;
pub mod supervisor;
pub mod timer;
pub mod transport;
pub mod types;

pub use config::{Config, ReconnectPolicy};
pub use endpoint::Endpoint;
pub use error::{Error, Kind, NotConnectedWarning};
pub use handler::{Callbacks, Handler};
pub use supervisor::{ConnectionState, Delivery, Supervisor};
pub use types::{CloseFrame, Payload};

pub type Result<T> = std::result::Result<T, Error>;
