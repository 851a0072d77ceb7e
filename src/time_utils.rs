// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for date/time formatting and normalization.

use chrono::{DateTime, SecondsFormat, Utc};

/// Format a UTC timestamp as RFC3339 using a `Z` suffix.
pub fn format_utc_rfc3339(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Convert a track duration in milliseconds to seconds, rounded to two
/// decimal places.
pub fn duration_ms_to_secs(duration_ms: u64) -> f64 {
    (duration_ms as f64 / 1000.0 * 100.0).round() / 100.0
}

/// Pad a partial release date to a full `YYYY-MM-DD` string.
///
/// Spotify reports release dates at year, month or day precision. Missing
/// components are filled with `01` so the value always parses as a date.
pub fn pad_release_date(date: &str) -> String {
    let date = date.trim();
    match date.len() {
        4 => format!("{date}-01-01"),
        7 => format!("{date}-01"),
        _ => date.to_string(),
    }
}
