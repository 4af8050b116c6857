//! TTL inputs and their normalization to backend-native seconds.

use jiff::{Span, Timestamp, tz::TimeZone};

/// A caller-supplied expiration.
///
/// `Default` defers to the adapter's configured default TTL. Spans are
/// calendar-aware: a one-month span counts the actual days of the month
/// rather than assuming a fixed seconds-per-unit.
#[derive(Debug, Clone, Copy, Default)]
pub enum Ttl {
    #[default]
    Default,
    Seconds(i64),
    Span(Span),
}

impl From<i64> for Ttl {
    fn from(secs: i64) -> Self {
        Ttl::Seconds(secs)
    }
}

/// Fractional seconds truncate toward zero.
impl From<f64> for Ttl {
    fn from(secs: f64) -> Self {
        Ttl::Seconds(secs as i64)
    }
}

impl From<std::time::Duration> for Ttl {
    fn from(d: std::time::Duration) -> Self {
        Ttl::Seconds(d.as_secs().min(i64::MAX as u64) as i64)
    }
}

impl From<Span> for Ttl {
    fn from(span: Span) -> Self {
        Ttl::Span(span)
    }
}

/// Normalizes [`Ttl`] inputs into whole seconds for one adapter.
#[derive(Debug, Clone, Copy)]
pub struct TtlPolicy {
    default_secs: i64,
}

impl TtlPolicy {
    pub fn new(default_secs: i64) -> Self {
        Self { default_secs }
    }

    /// Resolves a TTL input to whole seconds, clamping negatives to zero.
    ///
    /// A zero result means "no expiration" and maps to the call site's
    /// `zero` sentinel, which differs per backend: memcached spells it
    /// `Some(0)`, redis and the memory segment spell it `None`.
    pub fn resolve(&self, ttl: Ttl, zero: Option<u64>) -> Option<u64> {
        let secs = match ttl {
            Ttl::Default => self.default_secs,
            Ttl::Seconds(s) => s,
            Ttl::Span(span) => span_seconds(span),
        };
        if secs <= 0 { zero } else { Some(secs as u64) }
    }
}

/// Converts a span to seconds by adding it to the Unix epoch in UTC and
/// reading back the elapsed seconds, so calendar units resolve against real
/// dates. Arithmetic overflow normalizes to zero.
fn span_seconds(span: Span) -> i64 {
    let epoch = Timestamp::UNIX_EPOCH.to_zoned(TimeZone::UTC);
    epoch
        .checked_add(span)
        .map(|end| end.timestamp().as_second())
        .unwrap_or(0)
}
