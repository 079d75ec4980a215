//! Sync core tuning.

use serde::{Deserialize, Serialize};

const fn default_event_buffer() -> usize {
    256
}

const fn default_lookup_concurrency() -> usize {
    8
}

const fn default_max_conflict_repasses() -> u32 {
    1
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SyncConfig {
    /// Capacity of the controller's command channel.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,

    /// Maximum concurrent instance lookups during one reconciliation pass.
    #[serde(default = "default_lookup_concurrency")]
    pub lookup_concurrency: usize,

    /// Follow-up passes scheduled for one selection after a swallowed conflict.
    #[serde(default = "default_max_conflict_repasses")]
    pub max_conflict_repasses: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            event_buffer: default_event_buffer(),
            lookup_concurrency: default_lookup_concurrency(),
            max_conflict_repasses: default_max_conflict_repasses(),
        }
    }
}
