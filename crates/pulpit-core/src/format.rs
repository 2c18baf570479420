//! Display helpers for catalog and live-session cards.

use chrono::{DateTime, Utc};

/// `mm:ss`.  Minutes are not wrapped into hours, so a 62-minute talk reads
/// `62:05`.
pub fn format_duration(secs: u64) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

/// e.g. "January 7, 2024".
pub fn format_preached(date: &DateTime<Utc>) -> String {
    date.format("%B %-d, %Y").to_string()
}

/// Compact viewer / view counter: 999, 1.2K, 3.4M.
pub fn format_count(n: u64) -> String {
    match n {
        0..=999 => n.to_string(),
        1_000..=999_999 => compact(n as f64 / 1_000.0, "K"),
        _ => compact(n as f64 / 1_000_000.0, "M"),
    }
}

fn compact(value: f64, suffix: &str) -> String {
    let rounded = (value * 10.0).floor() / 10.0;
    if rounded.fract() == 0.0 {
        format!("{}{}", rounded as u64, suffix)
    } else {
        format!("{:.1}{}", rounded, suffix)
    }
}
