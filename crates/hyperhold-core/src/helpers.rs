//! Pure helpers for building and presenting links
//!
//! None of these functions fail: parse problems degrade to a safe fallback
//! (usually the original input) so they can be called from display code.

use chrono::{DateTime, Local};
use url::Url;

use crate::models::now_millis;

const MINUTE_MS: i64 = 60 * 1000;
const HOUR_MS: i64 = 60 * MINUTE_MS;
const DAY_MS: i64 = 24 * HOUR_MS;
const WEEK_MS: i64 = 7 * DAY_MS;

/// Whether the input starts with a scheme such as `https://`
///
/// A `://` later in the path or query does not count.
fn has_scheme(url: &str) -> bool {
    let Some((scheme, _)) = url.split_once("://") else {
        return false;
    };
    let mut chars = scheme.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '.' | '-'))
}

/// Parse user input as a URL, assuming https when no scheme is present
fn parse_lenient(url: &str) -> Option<Url> {
    if has_scheme(url) {
        Url::parse(url).ok()
    } else {
        Url::parse(&format!("https://{}", url)).ok()
    }
}

/// Normalize user input into an absolute URL string
///
/// Surrounding whitespace is trimmed and `https://` is prefixed when no
/// scheme is present. The rest of the input is kept as typed.
pub fn normalize_url(url: &str) -> String {
    let url = url.trim();
    if url.is_empty() || has_scheme(url) {
        url.to_string()
    } else {
        format!("https://{}", url)
    }
}

/// Extract the hostname of a URL, without a leading "www."
///
/// Returns the input unchanged when it cannot be parsed.
pub fn extract_domain(url: &str) -> String {
    parse_lenient(url.trim())
        .and_then(|parsed| {
            parsed.host_str().filter(|h| !h.is_empty()).map(|host| {
                host.strip_prefix("www.").unwrap_or(host).to_string()
            })
        })
        .unwrap_or_else(|| url.to_string())
}

/// Check whether the input is a structurally valid URL (scheme optional)
pub fn validate_url(url: &str) -> bool {
    let url = url.trim();
    if url.is_empty() {
        return false;
    }
    parse_lenient(url)
        .map(|parsed| parsed.host_str().is_some_and(|h| !h.is_empty()))
        .unwrap_or(false)
}

/// Generate an opaque link id
///
/// Base-36 millisecond timestamp followed by a base-36 random suffix.
pub fn generate_id() -> String {
    let millis = now_millis().max(0) as u128;
    let random = uuid::Uuid::new_v4().as_u128() as u64;
    format!("{}{}", to_base36(millis), to_base36(random as u128))
}

fn to_base36(mut value: u128) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

/// Favicon fetch URL for a domain
pub fn favicon_url(domain: &str) -> String {
    format!("https://www.google.com/s2/favicons?domain={}&sz=32", domain)
}

/// Human-friendly age of a timestamp, relative to now
pub fn format_relative_date(timestamp: i64) -> String {
    format_relative_date_at(timestamp, now_millis())
}

/// Human-friendly age of `timestamp` as seen at `now` (both in ms)
///
/// Under an hour reports minutes, under a day hours, under a week days.
/// Older timestamps are shown as a local calendar date. Timestamps in the
/// future are treated as "0 minutes ago".
pub fn format_relative_date_at(timestamp: i64, now: i64) -> String {
    let diff = now.saturating_sub(timestamp).max(0);

    if diff < HOUR_MS {
        plural(diff / MINUTE_MS, "minute")
    } else if diff < DAY_MS {
        plural(diff / HOUR_MS, "hour")
    } else if diff < WEEK_MS {
        plural(diff / DAY_MS, "day")
    } else {
        match DateTime::from_timestamp_millis(timestamp) {
            Some(date) => date.with_timezone(&Local).format("%-m/%-d/%Y").to_string(),
            None => timestamp.to_string(),
        }
    }
}

fn plural(n: i64, unit: &str) -> String {
    if n == 1 {
        format!("{} {} ago", n, unit)
    } else {
        format!("{} {}s ago", n, unit)
    }
}

/// Shorten text to `max_chars` characters, appending "..." when cut
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars).collect();
    out.push_str("...");
    out
}
