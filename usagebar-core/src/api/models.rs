//! Wire formats of the remote endpoints
//!
//! Every field the app does not need is ignored; every field it does need
//! but the server may omit is optional and defaulted during conversion.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::types::{ServiceIndicator, ServiceStatus, UsageSnapshot};

/// Body of `GET /api/organizations/{org}/usage`
#[derive(Debug, Clone, Deserialize)]
pub struct UsageResponse {
    pub five_hour: Option<LimitEntry>,
    pub seven_day: Option<LimitEntry>,
    pub seven_day_sonnet: Option<LimitEntry>,
    pub seven_day_opus: Option<LimitEntry>,
    pub extra_usage: Option<ExtraUsage>,
}

/// One rate-limit window
#[derive(Debug, Clone, Deserialize)]
pub struct LimitEntry {
    #[serde(default)]
    pub utilization: Option<f64>,
    #[serde(default)]
    pub resets_at: Option<DateTime<Utc>>,
}

/// Pay-as-you-go overage, amounts in cents
#[derive(Debug, Clone, Deserialize)]
pub struct ExtraUsage {
    #[serde(default)]
    pub is_enabled: bool,
    pub monthly_limit: Option<f64>,
    pub used_credits: Option<f64>,
}

impl UsageResponse {
    /// Convert into a snapshot stamped with `fetched_at`.
    ///
    /// A missing window reads as 0% resetting at `fetched_at`.
    pub fn into_snapshot(self, fetched_at: DateTime<Utc>) -> UsageSnapshot {
        let window = |entry: Option<&LimitEntry>| -> (f64, DateTime<Utc>) {
            match entry {
                Some(e) => (
                    e.utilization.unwrap_or(0.0),
                    e.resets_at.unwrap_or(fetched_at),
                ),
                None => (0.0, fetched_at),
            }
        };

        let (session_percentage, session_reset_time) = window(self.five_hour.as_ref());
        let (weekly_percentage, weekly_reset_time) = window(self.seven_day.as_ref());
        let (secondary_model_weekly_percentage, _) =
            window(self.seven_day_sonnet.as_ref().or(self.seven_day_opus.as_ref()));

        let (cost_used, cost_limit) = match self.extra_usage {
            Some(extra) if extra.is_enabled => (
                extra.used_credits.map(cents_to_dollars),
                extra.monthly_limit.map(cents_to_dollars),
            ),
            _ => (None, None),
        };

        UsageSnapshot {
            session_percentage,
            session_reset_time,
            weekly_percentage,
            weekly_reset_time,
            secondary_model_weekly_percentage,
            cost_used,
            cost_limit,
            fetched_at,
        }
    }
}

/// Body of a statuspage.io `status.json`
#[derive(Debug, Clone, Deserialize)]
pub struct StatusPageResponse {
    pub status: StatusPageStatus,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusPageStatus {
    pub indicator: String,
    #[serde(default)]
    pub description: String,
}

impl From<StatusPageResponse> for ServiceStatus {
    fn from(resp: StatusPageResponse) -> Self {
        ServiceStatus {
            indicator: ServiceIndicator::from_statuspage(&resp.status.indicator),
            description: resp.status.description,
        }
    }
}

/// Entry of `GET /api/organizations`
#[derive(Debug, Clone, Deserialize)]
pub struct OrganizationEntry {
    pub uuid: String,
    #[serde(default)]
    pub name: String,
}

/// Body of the console `prepaid/credits` and `current_spend` endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct AmountResponse {
    /// Amount in cents
    #[serde(default)]
    pub amount: f64,
}

impl AmountResponse {
    pub fn dollars(&self) -> f64 {
        cents_to_dollars(self.amount)
    }
}

pub(crate) fn cents_to_dollars(cents: f64) -> f64 {
    cents / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_usage_response_conversion() {
        let body = r#"{
            "five_hour": {"utilization": 42.0, "resets_at": "2026-02-01T15:00:00Z"},
            "seven_day": {"utilization": 12.5, "resets_at": "2026-02-05T00:00:00+00:00"},
            "seven_day_sonnet": null,
            "seven_day_opus": {"utilization": 3.0, "resets_at": null},
            "extra_usage": {"is_enabled": true, "monthly_limit": 5000, "used_credits": 1250}
        }"#;
        let fetched_at = Utc.with_ymd_and_hms(2026, 2, 1, 12, 0, 0).unwrap();
        let resp: UsageResponse = serde_json::from_str(body).unwrap();
        let snapshot = resp.into_snapshot(fetched_at);

        assert_eq!(snapshot.session_percentage, 42.0);
        assert_eq!(
            snapshot.session_reset_time,
            Utc.with_ymd_and_hms(2026, 2, 1, 15, 0, 0).unwrap()
        );
        assert_eq!(snapshot.weekly_percentage, 12.5);
        // Falls back to the opus window when sonnet is absent
        assert_eq!(snapshot.secondary_model_weekly_percentage, 3.0);
        assert_eq!(snapshot.cost_used, Some(12.5));
        assert_eq!(snapshot.cost_limit, Some(50.0));
    }

    #[test]
    fn test_disabled_extra_usage_is_dropped() {
        let body = r#"{
            "five_hour": {"utilization": 1.0, "resets_at": null},
            "seven_day": null,
            "extra_usage": {"is_enabled": false, "monthly_limit": 5000, "used_credits": 0}
        }"#;
        let fetched_at = Utc::now();
        let snapshot = serde_json::from_str::<UsageResponse>(body)
            .unwrap()
            .into_snapshot(fetched_at);
        assert_eq!(snapshot.cost_used, None);
        assert_eq!(snapshot.cost_limit, None);
        assert_eq!(snapshot.weekly_percentage, 0.0);
        assert_eq!(snapshot.weekly_reset_time, fetched_at);
    }

    #[test]
    fn test_status_page_conversion() {
        let body = r#"{"page": {"id": "x"}, "status": {"indicator": "minor", "description": "Partially Degraded Service"}}"#;
        let status: ServiceStatus = serde_json::from_str::<StatusPageResponse>(body)
            .unwrap()
            .into();
        assert_eq!(status.indicator, ServiceIndicator::Minor);
        assert_eq!(status.description, "Partially Degraded Service");
    }
}
