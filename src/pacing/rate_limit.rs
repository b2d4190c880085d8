//! Navigation pacing
//!
//! Uses the governor crate for a token bucket, then adds a randomized
//! human-like delay so probes do not hammer the target directory.

use governor::clock::DefaultClock;
use governor::middleware::NoOpMiddleware;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter as Governor};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

/// Fraction of the base delay added or removed at random
const JITTER_FRACTION: f64 = 0.2;

/// Configuration for navigation pacing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingConfig {
    /// Maximum navigations per second (0 disables the token bucket)
    pub requests_per_second: u32,
    /// Burst size (max tokens in bucket)
    pub burst_size: u32,
    /// Lower bound of the random delay before a navigation
    pub min_delay_ms: u64,
    /// Upper bound of the random delay before a navigation
    pub max_delay_ms: u64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            requests_per_second: 2,
            burst_size: 1,
            min_delay_ms: 500,
            max_delay_ms: 1500,
        }
    }
}

impl PacingConfig {
    /// No token bucket, no delay
    pub fn disabled() -> Self {
        Self {
            requests_per_second: 0,
            burst_size: 0,
            min_delay_ms: 0,
            max_delay_ms: 0,
        }
    }

    /// Fixed rate with no random delay
    pub fn per_second(requests_per_second: u32) -> Self {
        Self {
            requests_per_second,
            burst_size: requests_per_second.max(1),
            min_delay_ms: 0,
            max_delay_ms: 0,
        }
    }
}

/// Token bucket plus jittered delay, applied before every navigation
#[derive(Clone)]
pub struct Pacer {
    limiter: Option<Arc<Governor<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>>>,
    min_delay: Duration,
    max_delay: Duration,
}

impl Pacer {
    /// Create a pacer from config
    pub fn new(config: &PacingConfig) -> Self {
        let limiter = NonZeroU32::new(config.requests_per_second).map(|rps| {
            let burst = NonZeroU32::new(config.burst_size).unwrap_or(NonZeroU32::MIN);
            Arc::new(Governor::direct(Quota::per_second(rps).allow_burst(burst)))
        });

        let min_delay = Duration::from_millis(config.min_delay_ms);
        let max_delay = Duration::from_millis(config.max_delay_ms.max(config.min_delay_ms));

        Self {
            limiter,
            min_delay,
            max_delay,
        }
    }

    /// A pacer that never waits
    pub fn disabled() -> Self {
        Self::new(&PacingConfig::disabled())
    }

    /// Pick the random delay for the next navigation
    pub fn next_delay(&self) -> Duration {
        if self.max_delay.is_zero() {
            return Duration::ZERO;
        }

        let mut rng = rand::thread_rng();
        let base = if self.max_delay > self.min_delay {
            rng.gen_range(self.min_delay..=self.max_delay)
        } else {
            self.min_delay
        };
        let jitter = rng.gen_range(-JITTER_FRACTION..=JITTER_FRACTION);
        base.mul_f64((1.0 + jitter).max(0.0))
    }

    /// Wait until a navigation may be issued
    pub async fn wait(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }

        let delay = self.next_delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    /// Whether a navigation could be issued right now without queueing
    pub fn check(&self) -> bool {
        self.limiter
            .as_ref()
            .map_or(true, |limiter| limiter.check().is_ok())
    }
}

impl Default for Pacer {
    fn default() -> Self {
        Self::new(&PacingConfig::default())
    }
}

impl std::fmt::Debug for Pacer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pacer")
            .field("rate_limited", &self.limiter.is_some())
            .field("min_delay", &self.min_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}
