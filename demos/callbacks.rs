//! Implements [`Handler`] directly and watches the supervisor reconnect.
//!
//! Point it at a server, then stop the server to see the reconnect loop give up:
//! ```sh
//! RUST_LOG=ws_supervisor=debug,callbacks=info cargo run --example callbacks --features tracing
//! ```

use std::time::Duration;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use ws_supervisor::{
    CloseFrame, Config, ConnectionState, Endpoint, Error, Handler, ReconnectPolicy, Supervisor,
};

#[derive(Default)]
struct Logger {
    received: usize,
}

impl Handler for Logger {
    fn on_open(&mut self) {
        info!("open");
    }

    fn on_message(&mut self, text: &str) {
        self.received += 1;
        info!(count = self.received, text, "message");
    }

    fn on_close(&mut self, frame: &CloseFrame) {
        info!(code = frame.code, reason = %frame.reason, received = self.received, "closed");
    }

    fn on_error(&mut self, error: &Error) {
        warn!(kind = ?error.kind(), %error, "error");
    }

    fn on_reconnecting(&mut self, attempt: u32, delay: Duration) {
        info!(attempt, ?delay, "reconnecting");
    }

    fn on_state_change(&mut self, previous: ConnectionState, current: ConnectionState) {
        info!(%previous, %current, "state");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let endpoint = Endpoint::new("ws://localhost:8080")?.with_protocols(["chat"]);
    let config = Config::builder()
        .reconnect(
            ReconnectPolicy::builder()
                .max_attempts(5)
                .interval(Duration::from_millis(500))
                .multiplier(2.0)
                .max_interval(Duration::from_secs(8))
                .jitter(0.2)
                .build(),
        )
        .build();

    let supervisor = Supervisor::tungstenite(endpoint, config, Logger::default());

    if let Err(e) = supervisor.connect().await {
        warn!(error = %e, "initial connect failed, retrying in the background");
    }

    tokio::select! {
        () = supervisor.wait_closed() => info!("gave up"),
        _ = tokio::signal::ctrl_c() => {
            supervisor.close();
            supervisor.wait_closed().await;
        }
    }

    Ok(())
}
