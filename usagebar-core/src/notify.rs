//! Usage threshold notifications
//!
//! Each usage window keeps a [`ThresholdTracker`]. A threshold fires once
//! when usage first reaches it and re-arms only after usage drops back below
//! it, so a value that stays above 90% across many ticks notifies once.

use std::sync::Once;

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};
use crate::format::format_countdown;
use crate::types::UsageSnapshot;

/// Thresholds used when the config does not name any
pub const DEFAULT_THRESHOLDS: [u8; 3] = [75, 90, 95];

/// Ensure the macOS sending application is set (once per process).
static MACOS_APP_INIT: Once = Once::new();

fn ensure_notifications_initialized() {
    MACOS_APP_INIT.call_once(|| {
        #[cfg(target_os = "macos")]
        {
            if let Err(e) = notify_rust::set_application("com.apple.Terminal") {
                tracing::warn!(error = %e, "Failed to set notification application");
            }
        }
    });
}

/// Tracks which thresholds have already fired for one window.
#[derive(Debug, Clone)]
pub struct ThresholdTracker {
    /// Ascending, deduplicated
    thresholds: Vec<u8>,
    fired: Vec<u8>,
}

impl ThresholdTracker {
    pub fn new(thresholds: &[u8]) -> Self {
        let mut thresholds = thresholds.to_vec();
        thresholds.sort_unstable();
        thresholds.dedup();
        Self {
            thresholds,
            fired: Vec::new(),
        }
    }

    /// Feed the latest percentage; returns the threshold to announce, if any.
    ///
    /// When one reading crosses several thresholds only the highest is
    /// returned, and all of them are marked as fired.
    pub fn observe(&mut self, percentage: f64) -> Option<u8> {
        let p = crate::types::clamp_percentage(percentage);

        // Re-arm everything usage has fallen back below
        self.fired.retain(|t| p >= f64::from(*t));

        let newly_crossed: Vec<u8> = self
            .thresholds
            .iter()
            .copied()
            .filter(|t| p >= f64::from(*t) && !self.fired.contains(t))
            .collect();

        let highest = newly_crossed.last().copied()?;
        self.fired.extend(newly_crossed);
        Some(highest)
    }

    /// Thresholds currently fired and waiting to re-arm
    pub fn fired(&self) -> &[u8] {
        &self.fired
    }
}

/// Which usage window an alert is about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageWindow {
    Session,
    Weekly,
}

impl UsageWindow {
    pub fn label(&self) -> &'static str {
        match self {
            UsageWindow::Session => "Session",
            UsageWindow::Weekly => "Weekly",
        }
    }
}

/// One notification to show
#[derive(Debug, Clone, PartialEq)]
pub struct UsageAlert {
    pub window: UsageWindow,
    pub threshold: u8,
    pub percentage: f64,
    pub resets_at: DateTime<Utc>,
}

impl UsageAlert {
    pub fn summary(&self) -> String {
        format!("{} usage at {}%", self.window.label(), self.threshold)
    }

    pub fn body(&self, now: DateTime<Utc>) -> String {
        let used = format!(
            "You've used {:.0}% of your {} limit.",
            self.percentage,
            self.window.label().to_lowercase()
        );
        let remaining = self.resets_at - now;
        if remaining <= chrono::Duration::zero() {
            return used;
        }
        format!("{} Resets in {}.", used, format_countdown(remaining))
    }

    /// Alerts at or above 90% are shown as critical
    pub fn is_critical(&self) -> bool {
        self.threshold >= 90
    }
}

/// User toggles gating delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertToggles {
    pub enabled: bool,
    pub session: bool,
    pub weekly: bool,
}

impl Default for AlertToggles {
    fn default() -> Self {
        Self {
            enabled: true,
            session: true,
            weekly: true,
        }
    }
}

/// Trackers for both windows.
#[derive(Debug, Clone)]
pub struct UsageAlerts {
    session: ThresholdTracker,
    weekly: ThresholdTracker,
}

impl UsageAlerts {
    pub fn new(thresholds: &[u8]) -> Self {
        Self {
            session: ThresholdTracker::new(thresholds),
            weekly: ThresholdTracker::new(thresholds),
        }
    }

    /// Evaluate a fresh snapshot.
    ///
    /// Trackers advance even when a toggle is off, so turning notifications
    /// back on does not replay crossings that already happened.
    pub fn evaluate(&mut self, snapshot: &UsageSnapshot, toggles: AlertToggles) -> Vec<UsageAlert> {
        let mut alerts = Vec::new();

        if let Some(threshold) = self.session.observe(snapshot.session_percentage) {
            if toggles.enabled && toggles.session {
                alerts.push(UsageAlert {
                    window: UsageWindow::Session,
                    threshold,
                    percentage: snapshot.session_clamped(),
                    resets_at: snapshot.session_reset_time,
                });
            }
        }

        if let Some(threshold) = self.weekly.observe(snapshot.weekly_percentage) {
            if toggles.enabled && toggles.weekly {
                alerts.push(UsageAlert {
                    window: UsageWindow::Weekly,
                    threshold,
                    percentage: snapshot.weekly_clamped(),
                    resets_at: snapshot.weekly_reset_time,
                });
            }
        }

        alerts
    }
}

/// Delivers alerts to the user
pub trait Notifier: Send + Sync {
    fn notify(&self, alert: &UsageAlert) -> Result<()>;
}

/// OS-native notifications via notify-rust
#[derive(Debug, Default, Clone)]
pub struct DesktopNotifier;

impl Notifier for DesktopNotifier {
    fn notify(&self, alert: &UsageAlert) -> Result<()> {
        ensure_notifications_initialized();

        let mut notification = notify_rust::Notification::new();
        notification
            .summary(&alert.summary())
            .body(&alert.body(Utc::now()))
            .timeout(notify_rust::Timeout::Milliseconds(8000));

        // Urgency is only available on Linux (freedesktop notification spec)
        #[cfg(target_os = "linux")]
        {
            let urgency = if alert.is_critical() {
                notify_rust::Urgency::Critical
            } else {
                notify_rust::Urgency::Normal
            };
            notification.urgency(urgency);
        }

        notification
            .show()
            .map(|_| ())
            .map_err(|e| Error::Notification(e.to_string()))
    }
}

/// Logs alerts instead of showing them (headless runs)
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, alert: &UsageAlert) -> Result<()> {
        tracing::info!(
            window = alert.window.label(),
            threshold = alert.threshold,
            percentage = alert.percentage,
            "Usage threshold crossed"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn snapshot(session: f64, weekly: f64) -> UsageSnapshot {
        let now = Utc.with_ymd_and_hms(2026, 5, 1, 10, 0, 0).unwrap();
        UsageSnapshot {
            session_percentage: session,
            session_reset_time: now + chrono::Duration::minutes(135),
            weekly_percentage: weekly,
            weekly_reset_time: now + chrono::Duration::days(3),
            secondary_model_weekly_percentage: 0.0,
            cost_used: None,
            cost_limit: None,
            fetched_at: now,
        }
    }

    #[test]
    fn test_fires_highest_crossed_once() {
        let mut tracker = ThresholdTracker::new(&[75, 90, 95]);
        assert_eq!(tracker.observe(92.0), Some(90));
        assert_eq!(tracker.observe(92.0), None);
        assert_eq!(tracker.observe(93.5), None);
        assert_eq!(tracker.fired(), &[75, 90]);
    }

    #[test]
    fn test_rearms_after_dropping_below() {
        let mut tracker = ThresholdTracker::new(&[75, 90, 95]);
        assert_eq!(tracker.observe(92.0), Some(90));
        assert_eq!(tracker.observe(80.0), None);
        assert_eq!(tracker.observe(91.0), Some(90));
        assert_eq!(tracker.observe(10.0), None);
        assert!(tracker.fired().is_empty());
        assert_eq!(tracker.observe(76.0), Some(75));
    }

    #[test]
    fn test_climbing_fires_each_threshold() {
        let mut tracker = ThresholdTracker::new(&[95, 75, 90, 90]);
        assert_eq!(tracker.observe(50.0), None);
        assert_eq!(tracker.observe(75.0), Some(75));
        assert_eq!(tracker.observe(90.0), Some(90));
        assert_eq!(tracker.observe(100.0), Some(95));
    }

    #[test]
    fn test_toggles_suppress_without_replay() {
        let mut alerts = UsageAlerts::new(&[75, 90, 95]);
        let off = AlertToggles {
            enabled: false,
            ..AlertToggles::default()
        };
        assert!(alerts.evaluate(&snapshot(92.0, 10.0), off).is_empty());
        // Re-enabling does not replay the 90% crossing
        assert!(alerts
            .evaluate(&snapshot(92.0, 10.0), AlertToggles::default())
            .is_empty());
    }

    #[test]
    fn test_weekly_toggle_is_independent() {
        let mut alerts = UsageAlerts::new(&[75, 90, 95]);
        let toggles = AlertToggles {
            weekly: false,
            ..AlertToggles::default()
        };
        let fired = alerts.evaluate(&snapshot(92.0, 96.0), toggles);
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].window, UsageWindow::Session);
        assert_eq!(fired[0].threshold, 90);
        assert!(fired[0].is_critical());
    }

    #[test]
    fn test_alert_text() {
        let snap = snapshot(92.0, 0.0);
        let alert = UsageAlert {
            window: UsageWindow::Session,
            threshold: 90,
            percentage: 92.0,
            resets_at: snap.session_reset_time,
        };
        assert_eq!(alert.summary(), "Session usage at 90%");
        assert_eq!(
            alert.body(snap.fetched_at),
            "You've used 92% of your session limit. Resets in 2h 15m."
        );
    }
}
