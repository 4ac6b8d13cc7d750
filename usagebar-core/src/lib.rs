//! # usagebar-core
//!
//! Core library for usagebar - a menu-bar companion that tracks Claude
//! subscription usage.
//!
//! This library provides:
//! - Domain types for usage snapshots, status levels and display settings
//! - The status manager that runs the refresh loop
//! - Remote fetchers for usage, service status and API credits
//! - A SQLite-backed preference store with typed accessors
//! - Menu-bar icon rendering and threshold notifications
//! - Configuration management and logging infrastructure
//!
//! ## Architecture
//!
//! One manager task owns the published [`UsageState`](manager::UsageState).
//! Each timer tick spawns the remote fetches; their outcomes flow back to the
//! manager, which persists snapshots, repaints the icon and evaluates
//! notification thresholds. Settings changes reach the manager and any front
//! end through the typed [`EventBus`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use usagebar_core::{ClaudeClient, Config, EventBus, Preferences, SqliteStore, StatusManager};
//!
//! # async fn run() -> usagebar_core::Result<()> {
//! let config = Config::load()?;
//! let store = SqliteStore::open(&Config::preferences_path())?;
//!
//! let events = EventBus::new();
//! let prefs = Preferences::new(Arc::new(store)).with_events(events.clone());
//! let client = ClaudeClient::new(&config)?;
//!
//! let manager = StatusManager::new(prefs, Arc::new(client), events).start();
//! let state = manager.state();
//! println!("{:?}", state.usage);
//! manager.shutdown().await;
//! # Ok(())
//! # }
//! ```

// Re-export commonly used items at the crate root
pub use api::{ClaudeClient, UsageSource};
pub use config::Config;
pub use error::{Error, Result};
pub use events::{AppEvent, EventBus};
pub use manager::{ManagerHandle, RefreshPhase, RefreshStats, StatusManager, UsageState};
pub use store::{PreferenceStore, Preferences, SqliteStore};
pub use types::*;

// Public modules
pub mod api;
pub mod config;
pub mod error;
pub mod events;
pub mod format;
pub mod icon;
pub mod logging;
pub mod manager;
pub mod notify;
pub mod setup;
pub mod store;
pub mod types;
