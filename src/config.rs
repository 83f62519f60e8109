use std::time::Duration;

use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use bon::Builder;

const DEFAULT_RECONNECT_INTERVAL_DURATION: Duration = Duration::from_secs(5);
const DEFAULT_MAX_RECONNECT_INTERVAL_DURATION: Duration = Duration::from_secs(60);
const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;
const DEFAULT_BACKOFF_MULTIPLIER: f64 = 1.0;
const DEFAULT_JITTER: f64 = 0.0;
const DEFAULT_CLOSE_TIMEOUT_DURATION: Duration = Duration::from_secs(5);

/// Configuration for [`Supervisor`](crate::Supervisor) behavior.
#[non_exhaustive]
#[derive(Debug, Clone, Builder)]
pub struct Config {
    /// Reconnection strategy configuration
    #[builder(default)]
    pub reconnect: ReconnectPolicy,
    /// How long `close()` waits for the peer to confirm the close handshake
    #[builder(default = DEFAULT_CLOSE_TIMEOUT_DURATION)]
    pub close_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            reconnect: ReconnectPolicy::default(),
            close_timeout: DEFAULT_CLOSE_TIMEOUT_DURATION,
        }
    }
}

/// Configuration for automatic reconnection behavior.
///
/// The defaults retry five times at a fixed five second interval. Setting
/// `multiplier` above `1.0` turns the fixed interval into an exponential backoff
/// capped at `max_interval`.
#[non_exhaustive]
#[derive(Debug, Clone, Builder)]
pub struct ReconnectPolicy {
    /// Maximum number of reconnection attempts before giving up. `0` disables reconnection.
    #[builder(default = DEFAULT_MAX_RECONNECT_ATTEMPTS)]
    pub max_attempts: u32,
    /// Delay before the first reconnection attempt
    #[builder(default = DEFAULT_RECONNECT_INTERVAL_DURATION)]
    pub interval: Duration,
    /// Upper bound for the delay once the multiplier has been applied
    #[builder(default = DEFAULT_MAX_RECONNECT_INTERVAL_DURATION)]
    pub max_interval: Duration,
    /// Multiplier applied to the delay after every failed attempt. Values below `1.0` are
    /// raised to `1.0`; non-finite values fall back to the default.
    #[builder(default = DEFAULT_BACKOFF_MULTIPLIER)]
    pub multiplier: f64,
    /// Randomization factor applied to every delay, clamped to `[0, 1]`. `NaN` disables jitter.
    #[builder(default = DEFAULT_JITTER)]
    pub jitter: f64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            interval: DEFAULT_RECONNECT_INTERVAL_DURATION,
            max_interval: DEFAULT_MAX_RECONNECT_INTERVAL_DURATION,
            multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            jitter: DEFAULT_JITTER,
        }
    }
}

impl ReconnectPolicy {
    fn effective_multiplier(&self) -> f64 {
        if self.multiplier.is_finite() {
            self.multiplier.max(1.0)
        } else {
            DEFAULT_BACKOFF_MULTIPLIER
        }
    }

    fn effective_jitter(&self) -> f64 {
        if self.jitter.is_nan() {
            DEFAULT_JITTER
        } else {
            self.jitter.clamp(0.0, 1.0)
        }
    }
}

impl From<&ReconnectPolicy> for ExponentialBackoff {
    fn from(policy: &ReconnectPolicy) -> Self {
        ExponentialBackoffBuilder::default()
            .with_initial_interval(policy.interval)
            .with_max_interval(policy.max_interval.max(policy.interval))
            .with_multiplier(policy.effective_multiplier())
            .with_randomization_factor(policy.effective_jitter())
            .with_max_elapsed_time(None) // Attempts are bounded by `max_attempts`
            .build()
    }
}
