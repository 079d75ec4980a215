//! Document store configuration.

use serde::{Deserialize, Serialize};

/// Default local database path, relative to the project root.
fn default_path() -> String {
    ".lectern/lectern.db".to_string()
}

/// Default replica refresh interval in seconds.
const fn default_sync_interval_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    /// Local database file (or the local replica file in remote mode).
    /// `:memory:` keeps everything in process.
    #[serde(default = "default_path")]
    pub path: String,

    /// Remote database URL (e.g., `libsql://courses-acme.turso.io`).
    #[serde(default)]
    pub url: String,

    /// Remote database auth token.
    #[serde(default)]
    pub auth_token: String,

    /// How often `lec watch` pulls remote changes, in seconds.
    #[serde(default = "default_sync_interval_secs")]
    pub sync_interval_secs: u64,

    /// Directory for the JSONL write journal. Empty disables the journal.
    #[serde(default)]
    pub journal_dir: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_path(),
            url: String::new(),
            auth_token: String::new(),
            sync_interval_secs: default_sync_interval_secs(),
            journal_dir: String::new(),
        }
    }
}

impl StoreConfig {
    /// Check if the remote store has the minimum required fields.
    pub fn is_remote(&self) -> bool {
        !self.url.is_empty() && !self.auth_token.is_empty()
    }

    /// Check if the write journal is enabled.
    pub fn has_journal(&self) -> bool {
        !self.journal_dir.is_empty()
    }
}
