//! Scheduling capability injected into the supervisor.
//!
//! The supervisor only ever needs "wake me after `duration`". Cancellation is dropping the
//! returned future, which is how `close()` stops a pending reconnect.

use std::time::Duration;

use futures::future::BoxFuture;

pub trait Timer: Send + Sync + 'static {
    /// Resolve once `duration` has elapsed.
    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()>;
}

/// [`Timer`] driven by the tokio time driver.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioTimer;

impl Timer for TokioTimer {
    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()> {
        Box::pin(tokio::time::sleep(duration))
    }
}
