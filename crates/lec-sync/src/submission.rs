//! Submission hand-off.
//!
//! Marks an existing instance as submitted and writes it back. The sync core
//! never applies the change to its own cache; the instance subscription
//! delivers it like any other remote write.

use chrono::{DateTime, Utc};
use lec_core::documents::{Entity, Filter, WriteOp};
use lec_core::entities::AssignmentInstance;
use lec_core::enums::Collection;
use lec_core::gateway::CollectionGateway;
use tracing::info;

use crate::error::SyncError;

/// Copy of `instance` flagged as submitted at `at`. A given mark replaces the
/// stored one; `None` keeps it.
#[must_use]
pub fn mark_submitted(
    mut instance: AssignmentInstance,
    at: DateTime<Utc>,
    mark: Option<f64>,
) -> AssignmentInstance {
    instance.is_submitted = true;
    instance.submitted_at = Some(at);
    if mark.is_some() {
        instance.mark = mark;
    }
    instance
}

/// Look up the instance for a pairing directly in the store.
///
/// # Errors
///
/// Returns `SyncError` if the lookup fails or the document does not decode.
pub async fn find_instance<G: CollectionGateway>(
    gateway: &G,
    assignment_id: &str,
    student_id: &str,
) -> Result<Option<AssignmentInstance>, SyncError> {
    let filters = [
        Filter::eq("assignment_id", assignment_id),
        Filter::eq("student_id", student_id),
    ];
    let docs = gateway
        .query(Collection::AssignmentInstances, &filters)
        .await
        .map_err(|e| SyncError::from_read("instance lookup", e))?;
    Ok(docs
        .iter()
        .min_by(|a, b| a.id.cmp(&b.id))
        .map(AssignmentInstance::from_document)
        .transpose()?)
}

/// Write an updated instance back to the store.
///
/// # Errors
///
/// Returns `SyncError` if the write fails.
pub async fn write_instance<G: CollectionGateway>(
    gateway: &G,
    instance: AssignmentInstance,
) -> Result<AssignmentInstance, SyncError> {
    let op = WriteOp::set(&instance)?;
    gateway
        .batch_write(vec![op])
        .await
        .map_err(|e| SyncError::from_batch(1, e))?;
    info!(instance = %instance.id, assignment = %instance.assignment_id, "submission recorded");
    Ok(instance)
}

/// Find the student's instance for `assignment_id` and mark it submitted.
///
/// # Errors
///
/// Returns `SyncError::NotFound` if no instance exists yet.
pub async fn submit<G: CollectionGateway>(
    gateway: &G,
    assignment_id: &str,
    student_id: &str,
    mark: Option<f64>,
) -> Result<AssignmentInstance, SyncError> {
    let instance = find_instance(gateway, assignment_id, student_id)
        .await?
        .ok_or_else(|| SyncError::NotFound {
            assignment_id: assignment_id.to_string(),
            student_id: student_id.to_string(),
        })?;
    write_instance(gateway, mark_submitted(instance, Utc::now(), mark)).await
}
