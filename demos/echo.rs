//! Connects to an echo server, sends a few messages and closes.
//!
//! Run with tracing enabled:
//! ```sh
//! RUST_LOG=info cargo run --example echo --features tracing -- ws://localhost:8080
//! ```

use std::time::Duration;

use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;
use ws_supervisor::message::Envelope;
use ws_supervisor::{Callbacks, Config, Endpoint, ReconnectPolicy, Supervisor};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "ws://localhost:8080".to_owned());
    let endpoint = Endpoint::new(&url)?;

    let config = Config::builder()
        .reconnect(
            ReconnectPolicy::builder()
                .max_attempts(3)
                .interval(Duration::from_secs(3))
                .build(),
        )
        .build();

    let callbacks = Callbacks::new()
        .with_open(|| info!("connected"))
        .with_message(|text| {
            let envelope = Envelope::from_text(text);
            info!(kind = %envelope.kind, data = %envelope.data, "received");
        })
        .with_binary_message(|bytes| info!(len = bytes.len(), "received binary"))
        .with_close(|frame| info!(%frame, "closed"))
        .with_error(|e| info!(error = %e, "error"));

    let supervisor = Supervisor::tungstenite(endpoint, config, callbacks);
    supervisor.connect().await?;

    _ = supervisor.send_text("Hello from Rust!");
    _ = supervisor.send_binary(vec![0_u8, 159, 146, 150]);
    _ = supervisor.send_json(&Envelope::new("greeting", json!({"name": "ws-supervisor"})))?;

    tokio::time::sleep(Duration::from_secs(1)).await;

    supervisor.close();
    supervisor.wait_closed().await;

    Ok(())
}
