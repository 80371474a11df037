//! Rate-limit telemetry read from `X-RateLimit-*` response headers.

use rand::Rng;
use std::fmt::Debug;

use crate::response::ResponseHeaders;

pub const LIMIT_HEADER: &str = "X-RateLimit-Limit";
pub const REMAINING_HEADER: &str = "X-RateLimit-Remaining";
pub const RESET_HEADER: &str = "X-RateLimit-Reset";

/// Default fraction of the limit below which a call counts as near the limit.
pub const DEFAULT_WARN_LEVEL: f64 = 0.2;

/// Default share of near-limit calls that get logged.
pub const DEFAULT_SAMPLE_RATE: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    /// Calls allowed per window.
    pub limit: i64,
    /// Calls left in the current window.
    pub remaining: i64,
    /// When the window resets, as reported by the API.
    pub reset: i64,
}

impl RateLimit {
    /// Reads the rate-limit headers.
    ///
    /// Returns `None` unless `X-RateLimit-Limit` is present. The other two
    /// headers read as zero when missing.
    pub fn from_headers(headers: &ResponseHeaders) -> Option<Self> {
        let limit = headers.get(LIMIT_HEADER)?;
        let int = |name: &str| headers.get(name).map(parse_int).unwrap_or(0);
        Some(Self {
            limit: parse_int(limit),
            remaining: int(REMAINING_HEADER),
            reset: int(RESET_HEADER),
        })
    }

    pub fn is_near_limit(&self, warn_level: f64) -> bool {
        (self.remaining as f64) < warn_level * self.limit as f64
    }
}

/// Leading-integer parse: surrounding whitespace is ignored, trailing garbage
/// is dropped and anything without digits is zero.
pub(crate) fn parse_int(s: &str) -> i64 {
    leading_int(s).unwrap_or(0)
}

/// Like [`parse_int`], but `None` when there are no leading digits.
pub(crate) fn leading_int(s: &str) -> Option<i64> {
    let s = s.trim();
    let (neg, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    let n = digits[..end].parse::<i64>().ok()?;
    Some(if neg { -n } else { n })
}

/// Decides whether a near-limit occurrence gets logged.
pub trait WarnSampler: Send + Sync + Debug {
    fn sample(&self) -> bool;
}

/// Logs a random share of occurrences.
#[derive(Debug, Clone, Copy)]
pub struct RandomSampler {
    rate: f64,
}

impl RandomSampler {
    /// `rate` is clamped to `[0, 1]`.
    pub fn new(rate: f64) -> Self {
        let rate = if rate.is_nan() { 0.0 } else { rate.clamp(0.0, 1.0) };
        Self { rate }
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }
}

impl Default for RandomSampler {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_RATE)
    }
}

impl WarnSampler for RandomSampler {
    fn sample(&self) -> bool {
        rand::thread_rng().gen_bool(self.rate)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysSample;

impl WarnSampler for AlwaysSample {
    fn sample(&self) -> bool {
        true
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NeverSample;

impl WarnSampler for NeverSample {
    fn sample(&self) -> bool {
        false
    }
}
