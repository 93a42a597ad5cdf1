// Display formatting for masses, percentages, and timestamps

use chrono::{DateTime, Local};

/// Grams below this render as "N g"; everything else in kilograms.
const KG_CUTOFF_G: f64 = 1000.0;

/// "500 g", "1.5 kg", "150 kg". One decimal in kilograms, trimmed when the
/// value is whole.
pub fn format_weight(grams: f64) -> String {
    if grams.abs() < KG_CUTOFF_G {
        return format!("{} g", round_trim(grams));
    }
    format!("{} kg", round_trim(grams / 1000.0))
}

/// CO2 savings use the same mass scale as weights.
pub fn format_co2(grams: f64) -> String {
    format_weight(grams)
}

pub fn format_percent(percent: f64) -> String {
    format!("{:.0}%", percent)
}

/// RFC 3339 timestamp rendered in local time; unparseable input passes
/// through untouched so a server-side format drift degrades readably.
pub fn format_timestamp(ts: &str) -> String {
    match DateTime::parse_from_rfc3339(ts) {
        Ok(dt) => dt
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string(),
        Err(_) => ts.to_string(),
    }
}

pub fn format_last_seen(last_seen: Option<&str>) -> String {
    match last_seen {
        Some(ts) => format_timestamp(ts),
        None => "never".to_string(),
    }
}

/// One decimal place, with a trailing ".0" dropped.
fn round_trim(value: f64) -> String {
    let rounded = (value * 10.0).round() / 10.0;
    if (rounded - rounded.trunc()).abs() < f64::EPSILON {
        format!("{:.0}", rounded)
    } else {
        format!("{:.1}", rounded)
    }
}
