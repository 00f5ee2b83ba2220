//! Timestamp utilities
//!
//! Record timestamps are stored as RFC 3339 text; signed URL expiry is
//! expressed in Unix seconds.

use chrono::{DateTime, SecondsFormat, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Current UTC timestamp in the text form stored in `created_at` / `updated_at`
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Current time as Unix seconds
pub fn unix_now() -> i64 {
    Utc::now().timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_rfc3339_parses_back() {
        let text = now_rfc3339();
        let parsed = DateTime::parse_from_rfc3339(&text).expect("valid RFC 3339");
        assert!(parsed.timestamp() > 946_684_800); // 2000-01-01 00:00:00 UTC
        assert!(text.ends_with('Z'));
    }

    #[test]
    fn test_unix_now_matches_chrono() {
        let a = unix_now();
        let b = now().timestamp();
        assert!((b - a).abs() <= 1);
    }
}
