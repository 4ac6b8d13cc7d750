//! Typed preference accessors.
//!
//! Scalars are stored as UTF-8 text; the two snapshots are stored as JSON
//! byte blobs. Defaults are applied at read time when a key is absent, so a
//! key that was never written always reports its documented default and a
//! written value always wins afterwards.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use super::PreferenceStore;
use crate::error::{Error, Result};
use crate::events::{AppEvent, EventBus};
use crate::types::{
    ApiUsageSnapshot, Appearance, Credentials, IconStyle, PopoverStyle, UsageSnapshot,
};

/// Refresh interval used when none is stored
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(30);
/// Shortest refresh interval accepted; smaller values are raised to this
pub const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(5);
/// Longest refresh interval accepted; larger stored values are lowered to this
pub const MAX_REFRESH_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Every key the app reads or writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrefKey {
    SessionKey,
    OrganizationId,
    RefreshInterval,
    IconStyle,
    PopoverStyle,
    Appearance,
    MonochromeIcon,
    NotificationsEnabled,
    NotifySession,
    NotifyWeekly,
    CheckServiceStatus,
    ApiTrackingEnabled,
    ApiSessionKey,
    ApiOrganizationId,
    HasCompletedSetup,
    UsageSnapshot,
    ApiUsageSnapshot,
}

impl PrefKey {
    pub const ALL: [PrefKey; 17] = [
        PrefKey::SessionKey,
        PrefKey::OrganizationId,
        PrefKey::RefreshInterval,
        PrefKey::IconStyle,
        PrefKey::PopoverStyle,
        PrefKey::Appearance,
        PrefKey::MonochromeIcon,
        PrefKey::NotificationsEnabled,
        PrefKey::NotifySession,
        PrefKey::NotifyWeekly,
        PrefKey::CheckServiceStatus,
        PrefKey::ApiTrackingEnabled,
        PrefKey::ApiSessionKey,
        PrefKey::ApiOrganizationId,
        PrefKey::HasCompletedSetup,
        PrefKey::UsageSnapshot,
        PrefKey::ApiUsageSnapshot,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PrefKey::SessionKey => "session_key",
            PrefKey::OrganizationId => "organization_id",
            PrefKey::RefreshInterval => "refresh_interval",
            PrefKey::IconStyle => "icon_style",
            PrefKey::PopoverStyle => "popover_style",
            PrefKey::Appearance => "appearance",
            PrefKey::MonochromeIcon => "monochrome_icon",
            PrefKey::NotificationsEnabled => "notifications_enabled",
            PrefKey::NotifySession => "notify_session",
            PrefKey::NotifyWeekly => "notify_weekly",
            PrefKey::CheckServiceStatus => "check_service_status",
            PrefKey::ApiTrackingEnabled => "api_tracking_enabled",
            PrefKey::ApiSessionKey => "api_session_key",
            PrefKey::ApiOrganizationId => "api_organization_id",
            PrefKey::HasCompletedSetup => "has_completed_setup",
            PrefKey::UsageSnapshot => "usage_snapshot",
            PrefKey::ApiUsageSnapshot => "api_usage_snapshot",
        }
    }

    /// Values that must not be echoed back in listings
    pub fn is_secret(&self) -> bool {
        matches!(self, PrefKey::SessionKey | PrefKey::ApiSessionKey)
    }
}

impl std::str::FromStr for PrefKey {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        PrefKey::ALL
            .into_iter()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| format!("unknown preference key: {}", s))
    }
}

/// Typed view over a [`PreferenceStore`].
///
/// Cheap to clone; clones share the same store and event bus.
#[derive(Clone)]
pub struct Preferences {
    store: Arc<dyn PreferenceStore>,
    events: Option<EventBus>,
    legacy_key_path: Option<PathBuf>,
}

impl Preferences {
    pub fn new(store: Arc<dyn PreferenceStore>) -> Self {
        Self {
            store,
            events: None,
            legacy_key_path: None,
        }
    }

    /// Publish settings changes on `bus`
    pub fn with_events(mut self, bus: EventBus) -> Self {
        self.events = Some(bus);
        self
    }

    /// Credential file left behind by pre-store releases
    pub fn with_legacy_key_path(mut self, path: PathBuf) -> Self {
        self.legacy_key_path = Some(path);
        self
    }

    fn publish(&self, event: AppEvent) {
        if let Some(bus) = &self.events {
            bus.publish(event);
        }
    }

    // ============================================
    // Raw scalar helpers
    // ============================================

    fn get_string(&self, key: PrefKey) -> Result<Option<String>> {
        match self.store.get(key.as_str())? {
            Some(bytes) => String::from_utf8(bytes).map(Some).map_err(|e| Error::Encoding {
                key: key.as_str().to_string(),
                message: e.to_string(),
            }),
            None => Ok(None),
        }
    }

    fn set_string(&self, key: PrefKey, value: &str) -> Result<()> {
        self.store.set(key.as_str(), value.as_bytes())
    }

    /// Non-empty string value, None when absent or blank
    fn get_non_empty(&self, key: PrefKey) -> Result<Option<String>> {
        Ok(self
            .get_string(key)?
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty()))
    }

    /// Boolean with a default that applies only while the key is absent.
    fn get_bool(&self, key: PrefKey, default: bool) -> Result<bool> {
        if !self.store.contains(key.as_str())? {
            return Ok(default);
        }
        let raw = self.get_string(key)?.unwrap_or_default();
        match raw.as_str() {
            "true" | "1" => Ok(true),
            "false" | "0" => Ok(false),
            other => {
                tracing::warn!(key = key.as_str(), value = other, "Unreadable boolean preference, using default");
                Ok(default)
            }
        }
    }

    fn set_bool(&self, key: PrefKey, value: bool) -> Result<()> {
        self.set_string(key, if value { "true" } else { "false" })
    }

    fn get_parsed<T>(&self, key: PrefKey) -> Result<Option<T>>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get_string(key)? {
            Some(raw) => match raw.parse::<T>() {
                Ok(value) => Ok(Some(value)),
                Err(e) => {
                    tracing::warn!(key = key.as_str(), value = %raw, error = %e, "Unreadable preference, using default");
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    // ============================================
    // Credentials
    // ============================================

    pub fn session_key(&self) -> Result<Option<String>> {
        self.get_non_empty(PrefKey::SessionKey)
    }

    pub fn set_session_key(&self, key: &str) -> Result<()> {
        self.set_string(PrefKey::SessionKey, key.trim())?;
        self.publish(AppEvent::CredentialsChanged);
        Ok(())
    }

    pub fn organization_id(&self) -> Result<Option<String>> {
        self.get_non_empty(PrefKey::OrganizationId)
    }

    pub fn set_organization_id(&self, id: &str) -> Result<()> {
        self.set_string(PrefKey::OrganizationId, id.trim())?;
        self.publish(AppEvent::CredentialsChanged);
        Ok(())
    }

    /// Credentials for the usage endpoint, None unless both parts are set
    pub fn credentials(&self) -> Result<Option<Credentials>> {
        match (self.session_key()?, self.organization_id()?) {
            (Some(session_key), Some(organization_id)) => Ok(Some(Credentials {
                session_key,
                organization_id,
            })),
            _ => Ok(None),
        }
    }

    pub fn api_tracking_enabled(&self) -> Result<bool> {
        self.get_bool(PrefKey::ApiTrackingEnabled, false)
    }

    pub fn set_api_tracking_enabled(&self, enabled: bool) -> Result<()> {
        self.set_bool(PrefKey::ApiTrackingEnabled, enabled)?;
        self.publish(AppEvent::CredentialsChanged);
        Ok(())
    }

    pub fn set_api_session_key(&self, key: &str) -> Result<()> {
        self.set_string(PrefKey::ApiSessionKey, key.trim())?;
        self.publish(AppEvent::CredentialsChanged);
        Ok(())
    }

    pub fn set_api_organization_id(&self, id: &str) -> Result<()> {
        self.set_string(PrefKey::ApiOrganizationId, id.trim())?;
        self.publish(AppEvent::CredentialsChanged);
        Ok(())
    }

    /// Console credentials, None unless tracking is on and both parts are set
    pub fn api_credentials(&self) -> Result<Option<Credentials>> {
        if !self.api_tracking_enabled()? {
            return Ok(None);
        }
        match (
            self.get_non_empty(PrefKey::ApiSessionKey)?,
            self.get_non_empty(PrefKey::ApiOrganizationId)?,
        ) {
            (Some(session_key), Some(organization_id)) => Ok(Some(Credentials {
                session_key,
                organization_id,
            })),
            _ => Ok(None),
        }
    }

    // ============================================
    // Refresh and display
    // ============================================

    /// Refresh interval, kept within [`MIN_REFRESH_INTERVAL`] and
    /// [`MAX_REFRESH_INTERVAL`]
    pub fn refresh_interval(&self) -> Result<Duration> {
        let secs = self
            .get_parsed::<f64>(PrefKey::RefreshInterval)?
            .filter(|s| s.is_finite() && *s > 0.0);
        Ok(match secs {
            // Too large for a Duration at all
            Some(secs) => Duration::try_from_secs_f64(secs)
                .unwrap_or(MAX_REFRESH_INTERVAL)
                .clamp(MIN_REFRESH_INTERVAL, MAX_REFRESH_INTERVAL),
            None => DEFAULT_REFRESH_INTERVAL,
        })
    }

    /// Store a new interval (clamped) and announce it.
    pub fn set_refresh_interval(&self, interval: Duration) -> Result<Duration> {
        let interval = interval.clamp(MIN_REFRESH_INTERVAL, MAX_REFRESH_INTERVAL);
        self.set_string(PrefKey::RefreshInterval, &interval.as_secs_f64().to_string())?;
        self.publish(AppEvent::RefreshIntervalChanged(interval));
        Ok(interval)
    }

    pub fn icon_style(&self) -> Result<IconStyle> {
        Ok(self.get_parsed(PrefKey::IconStyle)?.unwrap_or_default())
    }

    pub fn set_icon_style(&self, style: IconStyle) -> Result<()> {
        self.set_string(PrefKey::IconStyle, style.as_str())?;
        self.publish(AppEvent::IconStyleChanged(style));
        Ok(())
    }

    pub fn popover_style(&self) -> Result<PopoverStyle> {
        Ok(self.get_parsed(PrefKey::PopoverStyle)?.unwrap_or_default())
    }

    pub fn set_popover_style(&self, style: PopoverStyle) -> Result<()> {
        self.set_string(PrefKey::PopoverStyle, style.as_str())?;
        self.publish(AppEvent::PopoverStyleChanged(style));
        Ok(())
    }

    pub fn appearance(&self) -> Result<Appearance> {
        Ok(self.get_parsed(PrefKey::Appearance)?.unwrap_or_default())
    }

    pub fn set_appearance(&self, appearance: Appearance) -> Result<()> {
        self.set_string(PrefKey::Appearance, appearance.as_str())?;
        self.publish(AppEvent::AppearanceChanged(appearance));
        Ok(())
    }

    pub fn monochrome_icon(&self) -> Result<bool> {
        self.get_bool(PrefKey::MonochromeIcon, false)
    }

    pub fn set_monochrome_icon(&self, monochrome: bool) -> Result<()> {
        self.set_bool(PrefKey::MonochromeIcon, monochrome)?;
        self.publish(AppEvent::MonochromeChanged(monochrome));
        Ok(())
    }

    // ============================================
    // Feature toggles (default on)
    // ============================================

    pub fn notifications_enabled(&self) -> Result<bool> {
        self.get_bool(PrefKey::NotificationsEnabled, true)
    }

    pub fn set_notifications_enabled(&self, enabled: bool) -> Result<()> {
        self.set_bool(PrefKey::NotificationsEnabled, enabled)
    }

    pub fn notify_session(&self) -> Result<bool> {
        self.get_bool(PrefKey::NotifySession, true)
    }

    pub fn set_notify_session(&self, enabled: bool) -> Result<()> {
        self.set_bool(PrefKey::NotifySession, enabled)
    }

    pub fn notify_weekly(&self) -> Result<bool> {
        self.get_bool(PrefKey::NotifyWeekly, true)
    }

    pub fn set_notify_weekly(&self, enabled: bool) -> Result<()> {
        self.set_bool(PrefKey::NotifyWeekly, enabled)
    }

    pub fn check_service_status(&self) -> Result<bool> {
        self.get_bool(PrefKey::CheckServiceStatus, true)
    }

    pub fn set_check_service_status(&self, enabled: bool) -> Result<()> {
        self.set_bool(PrefKey::CheckServiceStatus, enabled)
    }

    // ============================================
    // First run
    // ============================================

    /// Whether onboarding has finished.
    ///
    /// Installs that predate the store kept the session key in a plain file.
    /// When the flag was never written but that file exists, setup counts as
    /// done: the flag is persisted and the key imported if none is stored.
    pub fn has_completed_setup(&self) -> Result<bool> {
        if self.store.contains(PrefKey::HasCompletedSetup.as_str())? {
            return self.get_bool(PrefKey::HasCompletedSetup, false);
        }

        let Some(path) = &self.legacy_key_path else {
            return Ok(false);
        };
        if !path.exists() {
            return Ok(false);
        }

        tracing::info!(path = %path.display(), "Found legacy credential file, marking setup complete");
        self.set_bool(PrefKey::HasCompletedSetup, true)?;

        if self.session_key()?.is_none() {
            match std::fs::read_to_string(path) {
                Ok(contents) if !contents.trim().is_empty() => {
                    self.set_string(PrefKey::SessionKey, contents.trim())?;
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Could not read legacy credential file");
                }
            }
        }

        Ok(true)
    }

    pub fn set_has_completed_setup(&self, done: bool) -> Result<()> {
        self.set_bool(PrefKey::HasCompletedSetup, done)
    }

    // ============================================
    // Snapshots
    // ============================================

    pub fn save_usage_snapshot(&self, snapshot: &UsageSnapshot) -> Result<()> {
        let bytes = encode_snapshot(PrefKey::UsageSnapshot, snapshot)?;
        self.store.set(PrefKey::UsageSnapshot.as_str(), &bytes)
    }

    /// Last persisted usage snapshot; an undecodable blob counts as absent
    pub fn load_usage_snapshot(&self) -> Result<Option<UsageSnapshot>> {
        self.load_blob(PrefKey::UsageSnapshot)
    }

    pub fn save_api_usage_snapshot(&self, snapshot: &ApiUsageSnapshot) -> Result<()> {
        let bytes = encode_snapshot(PrefKey::ApiUsageSnapshot, snapshot)?;
        self.store.set(PrefKey::ApiUsageSnapshot.as_str(), &bytes)
    }

    pub fn load_api_usage_snapshot(&self) -> Result<Option<ApiUsageSnapshot>> {
        self.load_blob(PrefKey::ApiUsageSnapshot)
    }

    fn load_blob<T: serde::de::DeserializeOwned>(&self, key: PrefKey) -> Result<Option<T>> {
        let Some(bytes) = self.store.get(key.as_str())? else {
            return Ok(None);
        };
        match decode_snapshot(key, &bytes) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                tracing::warn!(error = %e, "Discarding undecodable snapshot");
                Ok(None)
            }
        }
    }

    // ============================================
    // Generic access (CLI)
    // ============================================

    /// Display value for `key`: stored value, or default marked as such.
    /// Secrets are masked and blobs summarized.
    pub fn display_value(&self, key: PrefKey) -> Result<String> {
        let present = self.store.contains(key.as_str())?;
        let value = match key {
            PrefKey::SessionKey | PrefKey::ApiSessionKey => {
                return Ok(if present { "<set>" } else { "<unset>" }.to_string());
            }
            PrefKey::UsageSnapshot | PrefKey::ApiUsageSnapshot => {
                return Ok(if present { "<snapshot>" } else { "<unset>" }.to_string());
            }
            PrefKey::OrganizationId => self.organization_id()?.unwrap_or_default(),
            PrefKey::ApiOrganizationId => self
                .get_non_empty(PrefKey::ApiOrganizationId)?
                .unwrap_or_default(),
            PrefKey::RefreshInterval => format!("{}", self.refresh_interval()?.as_secs_f64()),
            PrefKey::IconStyle => self.icon_style()?.as_str().to_string(),
            PrefKey::PopoverStyle => self.popover_style()?.as_str().to_string(),
            PrefKey::Appearance => self.appearance()?.as_str().to_string(),
            PrefKey::MonochromeIcon => self.monochrome_icon()?.to_string(),
            PrefKey::NotificationsEnabled => self.notifications_enabled()?.to_string(),
            PrefKey::NotifySession => self.notify_session()?.to_string(),
            PrefKey::NotifyWeekly => self.notify_weekly()?.to_string(),
            PrefKey::CheckServiceStatus => self.check_service_status()?.to_string(),
            PrefKey::ApiTrackingEnabled => self.api_tracking_enabled()?.to_string(),
            PrefKey::HasCompletedSetup => self.has_completed_setup()?.to_string(),
        };

        Ok(if present {
            value
        } else {
            format!("{} (default)", value)
        })
    }

    /// Stored keys this version does not recognize, sorted. Left behind by
    /// other versions sharing the store; `reset` does not touch them.
    pub fn unknown_keys(&self) -> Result<Vec<String>> {
        let mut keys = self.store.keys()?;
        keys.retain(|k| k.parse::<PrefKey>().is_err());
        Ok(keys)
    }

    /// Parse and store a textual value through the typed setter.
    pub fn set_from_str(&self, key: PrefKey, value: &str) -> Result<()> {
        let invalid = |msg: String| Error::Validation(format!("{}: {}", key.as_str(), msg));
        let parse_bool = |v: &str| -> Result<bool> {
            match v {
                "true" | "on" | "yes" | "1" => Ok(true),
                "false" | "off" | "no" | "0" => Ok(false),
                other => Err(invalid(format!("expected a boolean, got {:?}", other))),
            }
        };

        match key {
            PrefKey::SessionKey => self.set_session_key(value),
            PrefKey::OrganizationId => self.set_organization_id(value),
            PrefKey::ApiSessionKey => self.set_api_session_key(value),
            PrefKey::ApiOrganizationId => self.set_api_organization_id(value),
            PrefKey::RefreshInterval => {
                let secs: f64 = value
                    .parse()
                    .map_err(|_| invalid(format!("expected seconds, got {:?}", value)))?;
                if !secs.is_finite() || secs <= 0.0 {
                    return Err(invalid("must be a positive number of seconds".to_string()));
                }
                if secs > MAX_REFRESH_INTERVAL.as_secs_f64() {
                    return Err(invalid(format!(
                        "must be at most {} seconds",
                        MAX_REFRESH_INTERVAL.as_secs()
                    )));
                }
                let interval = Duration::try_from_secs_f64(secs)
                    .map_err(|e| invalid(e.to_string()))?;
                self.set_refresh_interval(interval).map(|_| ())
            }
            PrefKey::IconStyle => self.set_icon_style(value.parse().map_err(invalid)?),
            PrefKey::PopoverStyle => self.set_popover_style(value.parse().map_err(invalid)?),
            PrefKey::Appearance => self.set_appearance(value.parse().map_err(invalid)?),
            PrefKey::MonochromeIcon => self.set_monochrome_icon(parse_bool(value)?),
            PrefKey::NotificationsEnabled => self.set_notifications_enabled(parse_bool(value)?),
            PrefKey::NotifySession => self.set_notify_session(parse_bool(value)?),
            PrefKey::NotifyWeekly => self.set_notify_weekly(parse_bool(value)?),
            PrefKey::CheckServiceStatus => self.set_check_service_status(parse_bool(value)?),
            PrefKey::ApiTrackingEnabled => self.set_api_tracking_enabled(parse_bool(value)?),
            PrefKey::HasCompletedSetup => self.set_has_completed_setup(parse_bool(value)?),
            PrefKey::UsageSnapshot | PrefKey::ApiUsageSnapshot => Err(invalid(
                "snapshots are written by the refresh loop only".to_string(),
            )),
        }
    }

    /// Remove every known key, returning the store to first-run state.
    pub fn reset(&self) -> Result<()> {
        for key in PrefKey::ALL {
            self.store.remove(key.as_str())?;
        }
        self.publish(AppEvent::CredentialsChanged);
        Ok(())
    }
}

/// Encode a snapshot into the blob stored under `key`.
pub fn encode_snapshot<T: serde::Serialize>(key: PrefKey, value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| Error::Encoding {
        key: key.as_str().to_string(),
        message: e.to_string(),
    })
}

/// Decode a blob stored under `key`.
pub fn decode_snapshot<T: serde::de::DeserializeOwned>(key: PrefKey, bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(|e| Error::Encoding {
        key: key.as_str().to_string(),
        message: e.to_string(),
    })
}
