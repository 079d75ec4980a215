//! [`CollectionGateway`] over a libSQL document table.
//!
//! All statements go through one connection and are serialized by an async
//! operation lock, so a subscription's initial snapshot and the deliveries
//! that follow it are never reordered against writes.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use lec_config::StoreConfig;
use lec_core::documents::{Document, Filter, WriteOp};
use lec_core::enums::{Collection, WriteMode};
use lec_core::gateway::{
    CollectionGateway, GatewayError, SnapshotSink, SubscriptionHandle,
};
use tracing::{debug, warn};

use crate::StoreDb;
use crate::error::StoreError;
use crate::helpers::{build_where, is_unique_violation, row_to_document};
use crate::journal::WriteJournal;
use crate::listeners::{ListenerRegistry, Requery};

const INSERT_SQL: &str =
    "INSERT INTO documents (collection, id, data, updated_at) VALUES (?1, ?2, ?3, ?4)";

const UPSERT_SQL: &str = "INSERT INTO documents (collection, id, data, updated_at) \
     VALUES (?1, ?2, ?3, ?4) \
     ON CONFLICT(collection, id) DO UPDATE SET data = excluded.data, updated_at = excluded.updated_at";

struct Inner {
    db: StoreDb,
    op_lock: tokio::sync::Mutex<()>,
    listeners: Mutex<ListenerRegistry>,
    journal: WriteJournal,
}

/// libSQL-backed gateway. Cheap to clone; clones share the connection and
/// the listener registry.
#[derive(Clone)]
pub struct LibSqlGateway {
    inner: Arc<Inner>,
}

impl LibSqlGateway {
    #[must_use]
    pub fn new(db: StoreDb, journal: WriteJournal) -> Self {
        Self {
            inner: Arc::new(Inner {
                db,
                op_lock: tokio::sync::Mutex::new(()),
                listeners: Mutex::new(ListenerRegistry::default()),
                journal,
            }),
        }
    }

    /// Open the store and journal described by configuration.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the database or journal directory cannot be opened.
    pub async fn open_from_config(config: &StoreConfig) -> Result<Self, StoreError> {
        let db = StoreDb::open_from_config(config).await?;
        let journal = if config.has_journal() {
            WriteJournal::new(PathBuf::from(&config.journal_dir))?
        } else {
            WriteJournal::disabled()
        };
        Ok(Self::new(db, journal))
    }

    /// In-memory store without a journal.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the database cannot be opened.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let db = StoreDb::open_local(":memory:").await?;
        Ok(Self::new(db, WriteJournal::disabled()))
    }

    #[must_use]
    pub fn db(&self) -> &StoreDb {
        &self.inner.db
    }

    #[must_use]
    pub fn journal(&self) -> &WriteJournal {
        &self.inner.journal
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner.registry().len()
    }

    /// Pull remote changes (replica mode) and re-deliver every snapshot that
    /// changed. A failed sync is delivered as a transport error to every
    /// subscription.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the replica sync fails.
    pub async fn refresh(&self) -> Result<(), StoreError> {
        let _guard = self.inner.op_lock.lock().await;
        if let Err(e) = self.inner.db.sync().await {
            let err = GatewayError::Transport(e.to_string());
            let sinks = self.inner.registry().sinks();
            warn!(error = %e, listeners = sinks.len(), "store refresh failed");
            for sink in sinks {
                sink(Err(err.clone()));
            }
            return Err(e);
        }
        let all = self.inner.registry().all();
        self.inner.notify(all).await;
        Ok(())
    }
}

impl Inner {
    fn registry(&self) -> MutexGuard<'_, ListenerRegistry> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn select(
        &self,
        collection: Collection,
        filters: &[Filter],
    ) -> Result<Vec<Document>, StoreError> {
        let (clause, mut params) = build_where(filters)?;
        params.insert(0, collection.as_str().into());
        let sql = format!("SELECT id, data FROM documents WHERE {clause} ORDER BY id");
        let mut rows = self
            .db
            .conn()
            .query(&sql, libsql::params_from_iter(params))
            .await?;
        let mut docs = Vec::new();
        while let Some(row) = rows.next().await? {
            docs.push(row_to_document(&row)?);
        }
        Ok(docs)
    }

    async fn fetch(&self, collection: Collection, id: &str) -> Result<Option<Document>, StoreError> {
        let mut rows = self
            .db
            .conn()
            .query(
                "SELECT id, data FROM documents WHERE collection = ?1 AND id = ?2",
                libsql::params![collection.as_str(), id],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(row_to_document(&row)?)),
            None => Ok(None),
        }
    }

    /// Apply every operation in one transaction. Returns the commit timestamp.
    async fn commit(&self, ops: &[WriteOp]) -> Result<String, GatewayError> {
        let mut encoded = Vec::with_capacity(ops.len());
        for op in ops {
            if !op.data.is_object() {
                return Err(GatewayError::Rejected(format!(
                    "{} {} body is not an object",
                    op.collection, op.id
                )));
            }
            let body = serde_json::to_string(&op.data)
                .map_err(|e| GatewayError::Rejected(e.to_string()))?;
            encoded.push(body);
        }

        let ts = Utc::now().to_rfc3339();
        let tx = self
            .db
            .conn()
            .transaction()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        for (op, body) in ops.iter().zip(encoded) {
            let sql = match op.mode {
                WriteMode::Create => INSERT_SQL,
                WriteMode::Set => UPSERT_SQL,
            };
            let result = tx
                .execute(
                    sql,
                    libsql::params![op.collection.as_str(), op.id.as_str(), body, ts.as_str()],
                )
                .await;
            if let Err(e) = result {
                if let Err(rb) = tx.rollback().await {
                    warn!(error = %rb, "rollback after failed write");
                }
                if is_unique_violation(&e) {
                    debug!(collection = %op.collection, id = %op.id, "write conflict");
                    return Err(GatewayError::Conflict {
                        collection: op.collection,
                        id: op.id.clone(),
                    });
                }
                return Err(GatewayError::Transport(e.to_string()));
            }
        }

        tx.commit()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        Ok(ts)
    }

    /// Re-query each listener and deliver the snapshots that changed.
    async fn notify(&self, requeries: Vec<Requery>) {
        for requery in requeries {
            match self.select(requery.collection, &requery.filters).await {
                Ok(snapshot) => {
                    let sink = self.registry().record(requery.id, &snapshot);
                    if let Some(sink) = sink {
                        sink(Ok(snapshot));
                    }
                }
                Err(e) => {
                    warn!(collection = %requery.collection, error = %e, "re-query failed");
                    let sink = self.registry().sink(requery.id);
                    if let Some(sink) = sink {
                        sink(Err(e.into()));
                    }
                }
            }
        }
    }
}

impl CollectionGateway for LibSqlGateway {
    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Document>, GatewayError> {
        let _guard = self.inner.op_lock.lock().await;
        Ok(self.inner.fetch(collection, id).await?)
    }

    async fn query(
        &self,
        collection: Collection,
        filters: &[Filter],
    ) -> Result<Vec<Document>, GatewayError> {
        let _guard = self.inner.op_lock.lock().await;
        Ok(self.inner.select(collection, filters).await?)
    }

    async fn subscribe(
        &self,
        collection: Collection,
        filters: Vec<Filter>,
        sink: SnapshotSink,
    ) -> Result<SubscriptionHandle, GatewayError> {
        let _guard = self.inner.op_lock.lock().await;
        let snapshot = self.inner.select(collection, &filters).await?;
        let id = self
            .inner
            .registry()
            .register(collection, filters, Arc::clone(&sink), snapshot.clone());
        debug!(%collection, listener = id, docs = snapshot.len(), "subscription opened");
        sink(Ok(snapshot));

        let weak = Arc::downgrade(&self.inner);
        Ok(SubscriptionHandle::new(move || {
            if let Some(inner) = weak.upgrade() {
                if inner.registry().remove(id) {
                    debug!(%collection, listener = id, "subscription closed");
                }
            }
        }))
    }

    async fn batch_write(&self, ops: Vec<WriteOp>) -> Result<(), GatewayError> {
        if ops.is_empty() {
            return Ok(());
        }
        let _guard = self.inner.op_lock.lock().await;
        let ts = self.inner.commit(&ops).await?;
        debug!(ops = ops.len(), "batch committed");

        if let Err(e) = self.inner.journal.append_batch(&ops, &ts) {
            warn!(error = %e, "failed to journal committed batch");
        }

        let mut requeries = Vec::new();
        for collection in Collection::ALL {
            let written: Vec<Document> = ops
                .iter()
                .filter(|op| op.collection == collection)
                .map(WriteOp::as_document)
                .collect();
            if !written.is_empty() {
                requeries.extend(self.inner.registry().affected(collection, &written));
            }
        }
        self.inner.notify(requeries).await;
        Ok(())
    }
}
