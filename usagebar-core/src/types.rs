//! Core domain types for usagebar
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Snapshot** | Immutable value from one successful read of remote usage data |
//! | **Session window** | The rolling five-hour usage window |
//! | **Weekly window** | The rolling seven-day usage window |
//! | **Tick** | One firing of the recurring refresh timer |
//! | **Status level** | Three-valued classification of a percentage |
//!
//! Snapshots are replaced wholesale. There is no partially updated snapshot:
//! either every field came from one decode, or the snapshot is absent.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Clamp a percentage into `[0, 100]`, mapping NaN to 0.
pub fn clamp_percentage(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}

// ============================================
// Snapshots
// ============================================

/// One successful read of the usage endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageSnapshot {
    /// Five-hour window utilization (0-100)
    pub session_percentage: f64,
    /// When the five-hour window resets
    pub session_reset_time: DateTime<Utc>,
    /// Seven-day window utilization across all models
    pub weekly_percentage: f64,
    /// When the seven-day window resets
    pub weekly_reset_time: DateTime<Utc>,
    /// Seven-day utilization of the secondary model quota
    pub secondary_model_weekly_percentage: f64,
    /// Extra usage spent this month, in dollars
    pub cost_used: Option<f64>,
    /// Extra usage monthly limit, in dollars
    pub cost_limit: Option<f64>,
    /// When this snapshot was fetched
    pub fetched_at: DateTime<Utc>,
}

impl UsageSnapshot {
    /// Session percentage clamped for drawing and classification
    pub fn session_clamped(&self) -> f64 {
        clamp_percentage(self.session_percentage)
    }

    /// Weekly percentage clamped for drawing and classification
    pub fn weekly_clamped(&self) -> f64 {
        clamp_percentage(self.weekly_percentage)
    }

    /// Status level of the session window
    pub fn session_level(&self) -> StatusLevel {
        StatusLevel::from_percentage(self.session_percentage)
    }

    /// Status level of the weekly window
    pub fn weekly_level(&self) -> StatusLevel {
        StatusLevel::from_percentage(self.weekly_percentage)
    }

    /// Time left until the session window resets, None once it has passed
    pub fn session_resets_in(&self, now: DateTime<Utc>) -> Option<chrono::Duration> {
        let remaining = self.session_reset_time - now;
        (remaining > chrono::Duration::zero()).then_some(remaining)
    }

    /// Time left until the weekly window resets, None once it has passed
    pub fn weekly_resets_in(&self, now: DateTime<Utc>) -> Option<chrono::Duration> {
        let remaining = self.weekly_reset_time - now;
        (remaining > chrono::Duration::zero()).then_some(remaining)
    }
}

/// Prepaid API credit usage from the developer console.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiUsageSnapshot {
    /// Dollars spent in the current billing period
    pub used_amount: f64,
    /// Dollars of prepaid credit left
    pub remaining_amount: f64,
    /// used / (used + remaining), as 0-100
    pub usage_percentage: f64,
    /// When this snapshot was fetched
    pub fetched_at: DateTime<Utc>,
}

impl ApiUsageSnapshot {
    /// Build a snapshot from used and remaining amounts.
    pub fn from_amounts(used_amount: f64, remaining_amount: f64, fetched_at: DateTime<Utc>) -> Self {
        let total = used_amount + remaining_amount;
        let usage_percentage = if total > 0.0 {
            clamp_percentage(used_amount / total * 100.0)
        } else {
            0.0
        };
        Self {
            used_amount,
            remaining_amount,
            usage_percentage,
            fetched_at,
        }
    }
}

// ============================================
// Service status
// ============================================

/// Status page indicator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ServiceIndicator {
    Operational,
    Minor,
    Major,
    Critical,
    #[default]
    Unknown,
}

impl ServiceIndicator {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceIndicator::Operational => "operational",
            ServiceIndicator::Minor => "minor",
            ServiceIndicator::Major => "major",
            ServiceIndicator::Critical => "critical",
            ServiceIndicator::Unknown => "unknown",
        }
    }

    /// Map a statuspage.io indicator string ("none", "minor", ...)
    pub fn from_statuspage(indicator: &str) -> Self {
        match indicator {
            "none" => ServiceIndicator::Operational,
            "minor" => ServiceIndicator::Minor,
            "major" => ServiceIndicator::Major,
            "critical" => ServiceIndicator::Critical,
            _ => ServiceIndicator::Unknown,
        }
    }
}

/// Latest reading of the public status page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub indicator: ServiceIndicator,
    pub description: String,
}

/// An organization the session key has access to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub uuid: String,
    pub name: String,
}

/// Credentials needed for one authenticated fetch
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub session_key: String,
    pub organization_id: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("session_key", &"<redacted>")
            .field("organization_id", &self.organization_id)
            .finish()
    }
}

// ============================================
// Status level
// ============================================

/// Percentage at which usage is no longer considered safe
pub const MODERATE_THRESHOLD: f64 = 50.0;
/// Percentage at which usage is considered critical
pub const CRITICAL_THRESHOLD: f64 = 75.0;

/// Three-valued classification of a usage percentage.
///
/// | Level | Range |
/// |-------|-------|
/// | Safe | `p < 50` |
/// | Moderate | `50 <= p < 75` |
/// | Critical | `p >= 75` |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusLevel {
    Safe,
    Moderate,
    Critical,
}

impl StatusLevel {
    /// Classify a percentage. Input is clamped first.
    pub fn from_percentage(percentage: f64) -> Self {
        let p = clamp_percentage(percentage);
        if p >= CRITICAL_THRESHOLD {
            StatusLevel::Critical
        } else if p >= MODERATE_THRESHOLD {
            StatusLevel::Moderate
        } else {
            StatusLevel::Safe
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StatusLevel::Safe => "safe",
            StatusLevel::Moderate => "moderate",
            StatusLevel::Critical => "critical",
        }
    }
}

// ============================================
// Display settings
// ============================================

/// Menu-bar icon style
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum IconStyle {
    #[default]
    Battery,
    ProgressBar,
    PercentageText,
    Ring,
    Dot,
}

impl IconStyle {
    pub const ALL: [IconStyle; 5] = [
        IconStyle::Battery,
        IconStyle::ProgressBar,
        IconStyle::PercentageText,
        IconStyle::Ring,
        IconStyle::Dot,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IconStyle::Battery => "battery",
            IconStyle::ProgressBar => "progress_bar",
            IconStyle::PercentageText => "percentage_text",
            IconStyle::Ring => "ring",
            IconStyle::Dot => "dot",
        }
    }
}

impl std::str::FromStr for IconStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "battery" => Ok(IconStyle::Battery),
            "progress_bar" | "progress" => Ok(IconStyle::ProgressBar),
            "percentage_text" | "text" => Ok(IconStyle::PercentageText),
            "ring" => Ok(IconStyle::Ring),
            "dot" => Ok(IconStyle::Dot),
            _ => Err(format!("unknown icon style: {}", s)),
        }
    }
}

/// Layout of the dropdown popover
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PopoverStyle {
    #[default]
    Detailed,
    Compact,
}

impl PopoverStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            PopoverStyle::Detailed => "detailed",
            PopoverStyle::Compact => "compact",
        }
    }
}

impl std::str::FromStr for PopoverStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "detailed" => Ok(PopoverStyle::Detailed),
            "compact" => Ok(PopoverStyle::Compact),
            _ => Err(format!("unknown popover style: {}", s)),
        }
    }
}

/// Menu-bar appearance, selects the text color used by icons
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Appearance {
    #[default]
    Light,
    Dark,
}

impl Appearance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Appearance::Light => "light",
            Appearance::Dark => "dark",
        }
    }

    pub fn is_dark(&self) -> bool {
        matches!(self, Appearance::Dark)
    }
}

impl std::str::FromStr for Appearance {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "light" => Ok(Appearance::Light),
            "dark" => Ok(Appearance::Dark),
            _ => Err(format!("unknown appearance: {}", s)),
        }
    }
}
