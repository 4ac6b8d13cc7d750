//! Formatting helpers shared by notifications and the CLI.

use chrono::{DateTime, Duration, Utc};

/// Format how long ago `ts` was, relative to `now` (e.g., "2m ago").
pub fn format_age(ts: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let age = now.signed_duration_since(ts);

    if age.num_seconds() < 5 {
        "just now".to_string()
    } else if age.num_seconds() < 60 {
        format!("{}s ago", age.num_seconds())
    } else if age.num_minutes() < 60 {
        format!("{}m ago", age.num_minutes())
    } else if age.num_hours() < 24 {
        format!("{}h ago", age.num_hours())
    } else {
        format!("{}d ago", age.num_days())
    }
}

/// Time left until a reset: "3d 4h", "2h 15m", "12m".
pub fn format_countdown(remaining: Duration) -> String {
    let minutes = remaining.num_minutes().max(0);
    let (days, hours, mins) = (minutes / 1440, (minutes % 1440) / 60, minutes % 60);
    if days > 0 {
        format!("{}d {}h", days, hours)
    } else if hours > 0 {
        format!("{}h {}m", hours, mins)
    } else {
        format!("{}m", mins)
    }
}

/// Countdown to `reset`, or "now" once it has passed.
pub fn format_reset(reset: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let remaining = reset - now;
    if remaining <= Duration::zero() {
        "now".to_string()
    } else {
        format!("in {}", format_countdown(remaining))
    }
}

/// Whole-number percentage, clamped.
pub fn format_percentage(value: f64) -> String {
    format!("{:.0}%", crate::types::clamp_percentage(value))
}

/// Dollar amount with cents.
pub fn format_dollars(amount: f64) -> String {
    format!("${:.2}", amount)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_countdown() {
        assert_eq!(format_countdown(Duration::minutes(12)), "12m");
        assert_eq!(format_countdown(Duration::minutes(135)), "2h 15m");
        assert_eq!(format_countdown(Duration::hours(27)), "1d 3h");
        assert_eq!(format_countdown(Duration::seconds(-5)), "0m");
    }

    #[test]
    fn test_format_age() {
        let now = Utc.with_ymd_and_hms(2026, 4, 1, 12, 0, 0).unwrap();
        assert_eq!(format_age(now, now), "just now");
        assert_eq!(format_age(now - Duration::seconds(42), now), "42s ago");
        assert_eq!(format_age(now - Duration::minutes(3), now), "3m ago");
        assert_eq!(format_age(now - Duration::days(2), now), "2d ago");
    }

    #[test]
    fn test_format_reset() {
        let now = Utc.with_ymd_and_hms(2026, 4, 1, 12, 0, 0).unwrap();
        assert_eq!(format_reset(now + Duration::minutes(90), now), "in 1h 30m");
        assert_eq!(format_reset(now - Duration::minutes(1), now), "now");
    }

    #[test]
    fn test_format_amounts() {
        assert_eq!(format_percentage(41.6), "42%");
        assert_eq!(format_percentage(180.0), "100%");
        assert_eq!(format_dollars(12.5), "$12.50");
    }
}
