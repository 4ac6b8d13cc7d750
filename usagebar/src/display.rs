//! Text and JSON rendering of usage for the terminal.

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use usagebar_core::format::{format_age, format_dollars, format_percentage, format_reset};
use usagebar_core::{ApiUsageSnapshot, PopoverStyle, ServiceIndicator, ServiceStatus, UsageSnapshot};

/// Everything shown by `status`, `refresh` and `run`
pub struct UsageReport<'a> {
    pub usage: Option<&'a UsageSnapshot>,
    pub api_usage: Option<&'a ApiUsageSnapshot>,
    pub service_status: Option<&'a ServiceStatus>,
    pub popover_style: PopoverStyle,
}

impl UsageReport<'_> {
    pub fn render(&self, now: DateTime<Utc>) -> String {
        match self.popover_style {
            PopoverStyle::Compact => format!("{}\n", self.compact_line(now)),
            PopoverStyle::Detailed => self.detailed(now),
        }
    }

    /// Single line, also used for each update of `usagebar run`
    pub fn compact_line(&self, now: DateTime<Utc>) -> String {
        let mut parts = Vec::new();
        match self.usage {
            Some(usage) => {
                parts.push(format!(
                    "session {} (resets {})",
                    format_percentage(usage.session_percentage),
                    format_reset(usage.session_reset_time, now)
                ));
                parts.push(format!("weekly {}", format_percentage(usage.weekly_percentage)));
            }
            None => parts.push("no usage yet".to_string()),
        }
        if let Some(api) = self.api_usage {
            parts.push(format!("api {}", format_percentage(api.usage_percentage)));
        }
        if let Some(status) = self.service_status {
            if status.indicator != ServiceIndicator::Operational {
                parts.push(format!("service: {}", status.description));
            }
        }
        parts.join(" | ")
    }

    fn detailed(&self, now: DateTime<Utc>) -> String {
        let mut out = String::new();

        if let Some(usage) = self.usage {
            out.push_str(&format!(
                "Session   {:>4}  {:<9} resets {}\n",
                format_percentage(usage.session_percentage),
                usage.session_level().as_str(),
                format_reset(usage.session_reset_time, now)
            ));
            out.push_str(&format!(
                "Weekly    {:>4}  {:<9} resets {}\n",
                format_percentage(usage.weekly_percentage),
                usage.weekly_level().as_str(),
                format_reset(usage.weekly_reset_time, now)
            ));
            out.push_str(&format!(
                "Sonnet    {:>4}\n",
                format_percentage(usage.secondary_model_weekly_percentage)
            ));
            match (usage.cost_used, usage.cost_limit) {
                (Some(used), Some(limit)) => out.push_str(&format!(
                    "Extra     {} of {}\n",
                    format_dollars(used),
                    format_dollars(limit)
                )),
                (Some(used), None) => {
                    out.push_str(&format!("Extra     {}\n", format_dollars(used)))
                }
                _ => {}
            }
        } else {
            out.push_str("Session   no usage recorded yet\n");
        }

        if let Some(api) = self.api_usage {
            out.push_str(&format!(
                "API       {} used, {} remaining ({})\n",
                format_dollars(api.used_amount),
                format_dollars(api.remaining_amount),
                format_percentage(api.usage_percentage)
            ));
        }

        if let Some(status) = self.service_status {
            out.push_str(&format!(
                "Service   {} ({})\n",
                status.description,
                status.indicator.as_str()
            ));
        }

        if let Some(usage) = self.usage {
            out.push_str(&format!("Updated   {}\n", format_age(usage.fetched_at, now)));
        }

        out
    }

    pub fn to_json(&self) -> Value {
        json!({
            "usage": self.usage,
            "session_level": self.usage.map(|u| u.session_level()),
            "weekly_level": self.usage.map(|u| u.weekly_level()),
            "api_usage": self.api_usage,
            "service_status": self.service_status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn snapshot(now: DateTime<Utc>) -> UsageSnapshot {
        UsageSnapshot {
            session_percentage: 92.0,
            session_reset_time: now + chrono::Duration::minutes(135),
            weekly_percentage: 40.0,
            weekly_reset_time: now + chrono::Duration::days(2),
            secondary_model_weekly_percentage: 7.0,
            cost_used: Some(12.5),
            cost_limit: Some(50.0),
            fetched_at: now - chrono::Duration::minutes(3),
        }
    }

    #[test]
    fn test_detailed_report() {
        let now = Utc.with_ymd_and_hms(2026, 6, 1, 8, 0, 0).unwrap();
        let usage = snapshot(now);
        let report = UsageReport {
            usage: Some(&usage),
            api_usage: None,
            service_status: None,
            popover_style: PopoverStyle::Detailed,
        };
        let text = report.render(now);
        assert!(text.contains("Session    92%  critical  resets in 2h 15m"), "{}", text);
        assert!(text.contains("Extra     $12.50 of $50.00"));
        assert!(text.contains("Updated   3m ago"));
    }

    #[test]
    fn test_compact_report_hides_operational_status() {
        let now = Utc.with_ymd_and_hms(2026, 6, 1, 8, 0, 0).unwrap();
        let usage = snapshot(now);
        let status = ServiceStatus {
            indicator: ServiceIndicator::Operational,
            description: "All Systems Operational".to_string(),
        };
        let report = UsageReport {
            usage: Some(&usage),
            api_usage: None,
            service_status: Some(&status),
            popover_style: PopoverStyle::Compact,
        };
        assert_eq!(
            report.render(now),
            "session 92% (resets in 2h 15m) | weekly 40%\n"
        );
    }

    #[test]
    fn test_json_includes_levels() {
        let now = Utc::now();
        let usage = snapshot(now);
        let report = UsageReport {
            usage: Some(&usage),
            api_usage: None,
            service_status: None,
            popover_style: PopoverStyle::Detailed,
        };
        let value = report.to_json();
        assert_eq!(value["session_level"], "critical");
        assert_eq!(value["weekly_level"], "safe");
        assert_eq!(value["usage"]["session_percentage"], 92.0);
        assert!(value["api_usage"].is_null());
    }
}
