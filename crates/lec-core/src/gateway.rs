//! The Remote Collection Gateway contract.
//!
//! A narrow boundary over the external document store: point lookups,
//! filtered queries, live subscriptions, and atomic batched writes. No
//! business logic lives behind this trait. `lec-store` provides the libSQL
//! implementation; the sync core is generic over it.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use thiserror::Error;

use crate::documents::{Document, Filter, WriteOp};
use crate::enums::Collection;

/// Errors surfaced by a gateway implementation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    /// The store is unreachable or failed to execute the request.
    #[error("Transport error: {0}")]
    Transport(String),

    /// A creation collided with an existing document or pairing.
    /// The whole batch was rejected.
    #[error("Conflict on {collection} {id}")]
    Conflict { collection: Collection, id: String },

    /// The request was rejected as invalid (malformed batch or unsupported
    /// filter). None of a rejected batch's operations are observable.
    #[error("Batch rejected: {0}")]
    Rejected(String),

    /// A stored document could not be decoded.
    #[error("Decode error: {0}")]
    Decode(String),
}

impl GatewayError {
    /// Whether this error means another writer already produced the document.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

/// Result of one subscription delivery: a full snapshot or an error.
pub type SnapshotEvent = Result<Vec<Document>, GatewayError>;

/// Callback invoked by the gateway for every delivery on a subscription.
///
/// Deliveries are scheduled by the store and may arrive after the subscriber
/// has moved on; the callback must tolerate that.
pub type SnapshotSink = Arc<dyn Fn(SnapshotEvent) + Send + Sync>;

/// Ends a live subscription on `cancel()` or drop. Cancelling twice is a no-op.
pub struct SubscriptionHandle {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl SubscriptionHandle {
    #[must_use]
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// A handle that owns nothing.
    #[must_use]
    pub const fn detached() -> Self {
        Self { cancel: None }
    }

    /// Unsubscribe now.
    pub fn cancel(mut self) {
        self.run_cancel();
    }

    fn run_cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.run_cancel();
    }
}

impl fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("live", &self.cancel.is_some())
            .finish()
    }
}

/// Narrow interface over the remote document store.
///
/// Every method is a suspension point. Implementations must be cheap to share
/// behind an `Arc` across tasks.
pub trait CollectionGateway: Send + Sync + 'static {
    /// Point lookup by document ID.
    fn get(
        &self,
        collection: Collection,
        id: &str,
    ) -> impl Future<Output = Result<Option<Document>, GatewayError>> + Send;

    /// All documents in `collection` matching every filter.
    fn query(
        &self,
        collection: Collection,
        filters: &[Filter],
    ) -> impl Future<Output = Result<Vec<Document>, GatewayError>> + Send;

    /// Open a live subscription. The sink receives the initial snapshot and a
    /// full snapshot after every later change to the matching set.
    fn subscribe(
        &self,
        collection: Collection,
        filters: Vec<Filter>,
        sink: SnapshotSink,
    ) -> impl Future<Output = Result<SubscriptionHandle, GatewayError>> + Send;

    /// Apply all operations atomically. On error none of them are observable.
    fn batch_write(
        &self,
        ops: Vec<WriteOp>,
    ) -> impl Future<Output = Result<(), GatewayError>> + Send;
}
