use std::time::Duration;

use rand::Rng;

pub const MIN_REFRESH_SECS: f64 = 5.0;
pub const MAX_REFRESH_SECS: f64 = 300.0;
pub const DEFAULT_REFRESH_SECS: f64 = 30.0;

/// Up to this fraction of the period is added as jitter.
const JITTER_FRACTION: f64 = 0.1;

/// Clamps a refresh period to [5, 300] seconds; NaN falls back to the default.
pub fn clamp_refresh(seconds: f64) -> Duration {
    let seconds = if seconds.is_nan() {
        DEFAULT_REFRESH_SECS
    } else {
        seconds.clamp(MIN_REFRESH_SECS, MAX_REFRESH_SECS)
    };
    Duration::from_secs_f64(seconds)
}

/// Parses the `refresh` query value. Missing or non-numeric input yields the
/// default, an empty value counts as zero and is clamped up.
pub fn parse_refresh(raw: Option<&str>) -> Duration {
    let seconds = match raw.map(str::trim) {
        None => DEFAULT_REFRESH_SECS,
        Some("") => 0.0,
        Some(value) => value.parse::<f64>().unwrap_or(f64::NAN),
    };
    clamp_refresh(seconds)
}

/// `floor(period * 0.1 * unit)` whole seconds, for `unit` in [0, 1).
pub fn jitter(period: Duration, unit: f64) -> Duration {
    let unit = unit.clamp(0.0, 1.0);
    Duration::from_secs((period.as_secs_f64() * JITTER_FRACTION * unit).floor() as u64)
}

/// The polling delay for one timer setup: the period plus a random jitter.
pub fn fetch_delay<R: Rng>(period: Duration, rng: &mut R) -> Duration {
    period + jitter(period, rng.random::<f64>())
}
