//! Retry-After header parsing.
//!
//! Servers emit either delay-seconds or an HTTP-date (RFC 7231 §7.1.3); both
//! forms are accepted. Anything unparseable falls back to
//! [`DEFAULT_RETRY_AFTER_SECS`].

use std::time::{Duration, SystemTime};

use tracing::{debug, instrument, warn};

/// Wait applied when a 429 carries no usable Retry-After value.
pub const DEFAULT_RETRY_AFTER_SECS: u64 = 30;

/// Upper bound on advertised waits (1 hour).
const MAX_RETRY_AFTER_SECS: u64 = 3600;

/// Resolves a Retry-After header into whole seconds.
///
/// Supports two formats:
/// - Integer seconds: `Retry-After: 120` (negative values floor to zero)
/// - HTTP-date: `Retry-After: Wed, 21 Oct 2025 07:28:00 GMT`, converted to
///   `ceil(date - now)` seconds and floored at zero
///
/// Returns [`DEFAULT_RETRY_AFTER_SECS`] when the header is missing or
/// unparseable. Values above one hour are capped.
///
/// # Examples
///
/// ```
/// use docvault_core::api::parse_retry_after;
///
/// assert_eq!(parse_retry_after(Some("120")), 120);
/// assert_eq!(parse_retry_after(Some("-5")), 0);
/// assert_eq!(parse_retry_after(Some("soon")), 30);
/// assert_eq!(parse_retry_after(None), 30);
/// ```
#[must_use]
#[instrument]
pub fn parse_retry_after(header_value: Option<&str>) -> u64 {
    let Some(header_value) = header_value.map(str::trim).filter(|v| !v.is_empty()) else {
        return DEFAULT_RETRY_AFTER_SECS;
    };

    if let Ok(seconds) = header_value.parse::<i64>() {
        let seconds = u64::try_from(seconds.max(0)).unwrap_or(0);
        return cap(seconds);
    }

    match httpdate::parse_http_date(header_value) {
        Ok(date) => cap(seconds_until(date, SystemTime::now())),
        Err(_) => {
            debug!(header_value, "unparseable Retry-After value, using default");
            DEFAULT_RETRY_AFTER_SECS
        }
    }
}

/// Whole seconds from `now` until `date`, rounded up; zero for past dates.
fn seconds_until(date: SystemTime, now: SystemTime) -> u64 {
    match date.duration_since(now) {
        Ok(remaining) => ceil_secs(remaining),
        Err(_) => {
            debug!("Retry-After date is in the past, returning zero");
            0
        }
    }
}

fn ceil_secs(duration: Duration) -> u64 {
    if duration.subsec_nanos() > 0 {
        duration.as_secs().saturating_add(1)
    } else {
        duration.as_secs()
    }
}

fn cap(seconds: u64) -> u64 {
    if seconds > MAX_RETRY_AFTER_SECS {
        warn!(
            seconds,
            max_seconds = MAX_RETRY_AFTER_SECS,
            "Retry-After exceeds maximum, capping at 1 hour"
        );
        MAX_RETRY_AFTER_SECS
    } else {
        seconds
    }
}
