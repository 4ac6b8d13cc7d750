//! Local preference store
//!
//! This module provides the persistence layer:
//! - [`PreferenceStore`]: byte-valued key-value trait, the injection seam
//! - [`SqliteStore`]: SQLite-backed store shared by every usagebar process
//! - [`MemoryStore`]: in-process store for tests and dry runs
//! - [`Preferences`]: typed accessors, defaults and snapshot blobs

mod memory;
mod preferences;
pub mod schema;
mod sqlite;

pub use memory::MemoryStore;
pub use preferences::{
    PrefKey, Preferences, DEFAULT_REFRESH_INTERVAL, MAX_REFRESH_INTERVAL, MIN_REFRESH_INTERVAL,
};
pub use sqlite::SqliteStore;

use crate::error::Result;

/// Byte-valued key-value storage.
///
/// Each key is read and written independently; there is no transaction
/// spanning several keys.
pub trait PreferenceStore: Send + Sync {
    /// Read the raw value for `key`, None when absent
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Write the raw value for `key`, replacing any previous value
    fn set(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Delete `key`. Removing an absent key is not an error.
    fn remove(&self, key: &str) -> Result<()>;

    /// Whether `key` has ever been written (and not removed)
    fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// All keys currently present, sorted
    fn keys(&self) -> Result<Vec<String>>;
}
