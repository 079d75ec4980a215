//! # lec-store
//!
//! libSQL-backed implementation of the Remote Collection Gateway.
//!
//! Documents live in a single `documents` table keyed by `(collection, id)`.
//! Batched writes run in one transaction; a partial unique index on instance
//! documents rejects a second instance for the same `(assignment_id,
//! student_id)` inside that transaction. Live subscriptions are re-queried
//! after every commit and receive full snapshots when their result changes.
//!
//! Uses the `libsql` crate: a local file or `:memory:` database, or an
//! embedded replica of a remote database when a URL and token are configured.

pub mod error;
pub mod gateway;
pub mod helpers;
pub mod journal;
mod listeners;
mod migrations;

pub use gateway::LibSqlGateway;
pub use journal::WriteJournal;

use std::path::Path;

use error::StoreError;
use libsql::Builder;
use tracing::debug;

/// Central database handle for the document store.
pub struct StoreDb {
    db: libsql::Database,
    conn: libsql::Connection,
    replica: bool,
}

impl StoreDb {
    /// Open a local-only database at the given path (no remote sync).
    ///
    /// Creates the parent directory for file paths. Runs migrations
    /// automatically on open.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the database cannot be opened or migrations fail.
    pub async fn open_local(path: &str) -> Result<Self, StoreError> {
        ensure_parent_dir(path)?;
        let db = Builder::new_local(path).build().await?;
        let conn = db.connect()?;
        let store = Self {
            db,
            conn,
            replica: false,
        };
        store.run_migrations().await?;
        debug!(path, "opened local document store");
        Ok(store)
    }

    /// Open an embedded replica of a remote database.
    ///
    /// Performs an initial sync so the first queries see remote state.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the replica cannot be built, synced, or migrated.
    pub async fn open_replica(
        local_path: &str,
        url: &str,
        auth_token: &str,
    ) -> Result<Self, StoreError> {
        ensure_parent_dir(local_path)?;
        let db = Builder::new_remote_replica(local_path, url.to_string(), auth_token.to_string())
            .read_your_writes(true)
            .build()
            .await?;
        db.sync().await?;
        let conn = db.connect()?;
        let store = Self {
            db,
            conn,
            replica: true,
        };
        store.run_migrations().await?;
        debug!(local_path, url, "opened replica document store");
        Ok(store)
    }

    /// Open the store described by configuration: a replica when a remote URL
    /// and token are set, a local database otherwise.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the database cannot be opened.
    pub async fn open_from_config(config: &lec_config::StoreConfig) -> Result<Self, StoreError> {
        if config.is_remote() {
            Self::open_replica(&config.path, &config.url, &config.auth_token).await
        } else {
            Self::open_local(&config.path).await
        }
    }

    /// Access the underlying libSQL connection for direct queries.
    #[must_use]
    pub const fn conn(&self) -> &libsql::Connection {
        &self.conn
    }

    /// Whether this store is an embedded replica of a remote database.
    #[must_use]
    pub const fn is_replica(&self) -> bool {
        self.replica
    }

    /// Pull remote changes into a replica. No-op for local databases.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the sync fails.
    pub async fn sync(&self) -> Result<(), StoreError> {
        if self.replica {
            self.db.sync().await?;
        }
        Ok(())
    }
}

fn ensure_parent_dir(path: &str) -> Result<(), StoreError> {
    if path == ":memory:" {
        return Ok(());
    }
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Other(e.into()))?;
        }
    }
    Ok(())
}
