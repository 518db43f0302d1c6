//! Text conversion for the delay field.
//!
//! The field shows whole seconds. Anything that is not a non-negative integer
//! number of seconds is invalid and leaves the delay unset.

use std::time::Duration;

/// Format a delay as whole seconds, rounding to the nearest second.
///
/// An unset delay formats as an empty string.
pub fn format_delay(delay: Option<Duration>) -> String {
    delay.map_or_else(String::new, |delay| {
        let seconds = (delay.as_millis() + 500) / 1000;
        seconds.to_string()
    })
}

/// Parse whole seconds. Returns `None` for empty, negative or non-numeric text.
pub fn parse_delay(text: &str) -> Option<Duration> {
    text.trim().parse::<u64>().ok().map(Duration::from_secs)
}
