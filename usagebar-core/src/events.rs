//! Typed settings event bus.
//!
//! Presentation layers (tray shell, popover, CLI watchers) subscribe here to
//! learn that a setting changed and re-read what they need. The status
//! manager listens for interval and display changes.

use std::time::Duration;

use tokio::sync::broadcast;

use crate::types::{Appearance, IconStyle, PopoverStyle};

/// Capacity of the broadcast channel. Slow receivers see `Lagged` and skip.
const EVENT_CAPACITY: usize = 64;

/// Events emitted when a user-facing setting changes.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// Menu-bar icon style changed
    IconStyleChanged(IconStyle),

    /// Popover layout changed
    PopoverStyleChanged(PopoverStyle),

    /// Light/dark appearance changed
    AppearanceChanged(Appearance),

    /// Monochrome icon toggle changed
    MonochromeChanged(bool),

    /// Refresh interval changed (already clamped to the minimum)
    RefreshIntervalChanged(Duration),

    /// Session key, organization or API tracking settings changed
    CredentialsChanged,
}

/// Cloneable handle to the settings broadcast channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<AppEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CAPACITY);
        Self { sender }
    }

    /// Subscribe to future events.
    pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
        self.sender.subscribe()
    }

    /// Publish an event, returning how many subscribers received it.
    ///
    /// Publishing with no subscribers is not an error.
    pub fn publish(&self, event: AppEvent) -> usize {
        tracing::debug!(?event, "Publishing settings event");
        self.sender.send(event).unwrap_or(0)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
