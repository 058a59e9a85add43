use std::sync::OnceLock;
use std::time::Duration;

use rand::Rng;
use regex::Regex;

/// Base delay before the first session stream reconnect.
pub const SESSION_BASE_DELAY_MS: u64 = 1_000;
/// Upper bound on any single session stream reconnect delay.
pub const SESSION_MAX_DELAY_MS: u64 = 30_000;
/// Default jitter fraction applied around the un-jittered delay.
pub const DEFAULT_JITTER: f64 = 0.2;

/// Backoff schedule for a stream connection.
///
/// Attempts are 1-indexed and count consecutive failures since the last
/// successful open.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    pub base: Duration,
    pub multiplier: f64,
    pub cap: Duration,
    /// Fraction of the delay that may be added or removed at random.
    pub jitter: f64,
    /// `None` retries forever; `Some(0)` never retries.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::session_stream()
    }
}

impl ReconnectPolicy {
    /// Long-lived session stream: 1s doubling to a 30s cap, never giving up.
    pub fn session_stream() -> Self {
        Self {
            base: Duration::from_millis(SESSION_BASE_DELAY_MS),
            multiplier: 2.0,
            cap: Duration::from_millis(SESSION_MAX_DELAY_MS),
            jitter: DEFAULT_JITTER,
            max_retries: None,
        }
    }

    /// Request-scoped answer stream: any drop is final.
    pub fn token_stream() -> Self {
        Self {
            max_retries: Some(0),
            ..Self::session_stream()
        }
    }

    pub fn with_base(mut self, base: Duration) -> Self {
        self.base = base;
        self
    }

    pub fn with_cap(mut self, cap: Duration) -> Self {
        self.cap = cap;
        self
    }

    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }

    pub fn with_max_retries(mut self, max_retries: Option<u32>) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Whether attempt `attempt` is still allowed.
    pub fn allows(&self, attempt: u32) -> bool {
        attempt >= 1 && self.max_retries.map_or(true, |max| attempt <= max)
    }

    /// Un-jittered delay for attempt `attempt`: `min(base * multiplier^(attempt-1), cap)`.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(63) as i32;
        let scaled = self.base.as_secs_f64() * self.multiplier.max(1.0).powi(exponent);
        if !scaled.is_finite() || scaled >= self.cap.as_secs_f64() {
            return self.cap;
        }
        Duration::from_secs_f64(scaled)
    }

    /// Jittered delay for attempt `attempt`, or `None` once the policy gives up.
    pub fn delay(&self, attempt: u32) -> Option<Duration> {
        let unit = rand::thread_rng().gen_range(0.0..=1.0);
        self.delay_with_unit(attempt, unit)
    }

    /// Deterministic variant of [`Self::delay`]; `unit` in `[0, 1]` picks the
    /// point within the jitter window (0.5 yields the un-jittered delay).
    pub fn delay_with_unit(&self, attempt: u32, unit: f64) -> Option<Duration> {
        if !self.allows(attempt) {
            return None;
        }
        let factor = 1.0 + self.jitter * (unit.clamp(0.0, 1.0) * 2.0 - 1.0);
        Some(self.base_delay(attempt).mul_f64(factor.max(0.0)))
    }
}

fn retryable_status_regex() -> &'static Regex {
    static CACHED: OnceLock<Regex> = OnceLock::new();
    CACHED.get_or_init(|| {
        Regex::new(r"(?i)rate.?limit|overloaded|service.?unavailable|upstream.?connect|connection.?refused|database is locked")
            .expect("retry regex must compile")
    })
}

/// Whether a failed stream handshake is worth retrying.
///
/// Timeouts, throttling and server-side failures are transient; any other
/// client error (unknown session, user not in session) is final.
pub fn is_retryable_http_error(status: u16, error_text: &str) -> bool {
    matches!(status, 408 | 429 | 500..=599) || retryable_status_regex().is_match(error_text)
}
