//! Monotonic clock used for test timing.

use chrono::Utc;
use once_cell::sync::Lazy;
use std::time::Instant;

static PROCESS_START: Lazy<Instant> = Lazy::new(Instant::now);

/// Seconds elapsed since the first call into the clock in this process.
///
/// Monotonic, so it is safe to subtract two readings even if the wall clock
/// is adjusted mid-test.
pub fn uptime_seconds() -> f64 {
    PROCESS_START.elapsed().as_secs_f64()
}

/// Whole milliseconds between two uptime readings, rounded to nearest.
///
/// Negative spans (end before start) clamp to zero.
pub fn elapsed_millis(start: f64, end: f64) -> u64 {
    let ms = ((end - start) * 1000.0).round();
    if ms <= 0.0 { 0 } else { ms as u64 }
}

/// Wall-clock seconds since the Unix epoch with millisecond precision, as text.
pub fn epoch_seconds_text() -> String {
    let now = Utc::now();
    format!("{}.{:03}", now.timestamp(), now.timestamp_subsec_millis())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elapsed_rounds_float_noise() {
        // 102.347 - 100.0 is 2346.9999... in binary floating point
        assert_eq!(elapsed_millis(100.000, 102.347), 2347);
        assert_eq!(elapsed_millis(0.0, 0.0004), 0);
        assert_eq!(elapsed_millis(5.0, 4.0), 0);
    }

    #[test]
    fn uptime_is_monotonic() {
        let a = uptime_seconds();
        let b = uptime_seconds();
        assert!(b >= a);
    }

    #[test]
    fn epoch_text_has_millis() {
        let text = epoch_seconds_text();
        let (secs, millis) = text.split_once('.').unwrap();
        assert!(secs.parse::<u64>().unwrap() > 1_600_000_000);
        assert_eq!(millis.len(), 3);
    }
}
