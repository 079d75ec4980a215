//! Reconciliation Engine.
//!
//! One pass looks up the instance for every (assignment, student) pairing of
//! the active selection concurrently, partitions the assignments into found
//! and missing, and issues exactly one atomic batch creating an unsubmitted
//! instance for each missing assignment. A pass never retries; the
//! controller decides whether another pass runs.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use lec_core::documents::{Entity, Filter, WriteOp};
use lec_core::entities::AssignmentInstance;
use lec_core::enums::Collection;
use lec_core::gateway::CollectionGateway;
use lec_core::ids::{PREFIX_INSTANCE, generate_id};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::error::SyncError;

/// Result of looking up every pairing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Partition {
    /// Instances that already exist remotely.
    pub found: Vec<AssignmentInstance>,
    /// Assignment IDs with no instance for the student.
    pub missing: Vec<String>,
}

/// Summary of a successful pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PassOutcome {
    pub found: usize,
    /// Instances written by this pass's batch.
    pub created: Vec<AssignmentInstance>,
}

/// Progress reported by a running pass, always in this order:
/// zero or one `Partitioned`, then exactly one `Finished`.
#[derive(Debug)]
pub enum PassEvent {
    Partitioned {
        pass: u64,
        found: Vec<AssignmentInstance>,
        planned: Vec<AssignmentInstance>,
    },
    Finished {
        pass: u64,
        outcome: Result<PassOutcome, SyncError>,
    },
}

impl PassEvent {
    #[must_use]
    pub const fn pass(&self) -> u64 {
        match self {
            Self::Partitioned { pass, .. } | Self::Finished { pass, .. } => *pass,
        }
    }
}

/// Inputs of one pass, captured when it was triggered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassRequest {
    pub pass: u64,
    pub student_id: String,
    pub course_id: String,
    pub assignment_ids: Vec<String>,
}

pub struct Reconciler<G> {
    gateway: Arc<G>,
    lookup_concurrency: usize,
}

impl<G> Clone for Reconciler<G> {
    fn clone(&self) -> Self {
        Self {
            gateway: Arc::clone(&self.gateway),
            lookup_concurrency: self.lookup_concurrency,
        }
    }
}

impl<G: CollectionGateway> Reconciler<G> {
    #[must_use]
    pub fn new(gateway: Arc<G>, lookup_concurrency: usize) -> Self {
        Self {
            gateway,
            lookup_concurrency: lookup_concurrency.max(1),
        }
    }

    /// Look up every pairing concurrently and split found from missing.
    ///
    /// # Errors
    ///
    /// Returns the first lookup failure; a failed lookup fails the pass.
    pub async fn partition(
        &self,
        student_id: &str,
        assignment_ids: &[String],
    ) -> Result<Partition, SyncError> {
        let lookups: Vec<_> = assignment_ids
            .iter()
            .cloned()
            .map(|assignment_id| {
                let gateway = Arc::clone(&self.gateway);
                let student_id = student_id.to_string();
                async move {
                    let filters = [
                        Filter::eq("assignment_id", assignment_id.as_str()),
                        Filter::eq("student_id", student_id.as_str()),
                    ];
                    let result = gateway
                        .query(Collection::AssignmentInstances, &filters)
                        .await;
                    (assignment_id, result)
                }
            })
            .collect();
        let results: Vec<_> = stream::iter(lookups)
            .buffered(self.lookup_concurrency)
            .collect()
            .await;

        let mut partition = Partition::default();
        for (assignment_id, result) in results {
            let docs = result.map_err(|e| SyncError::from_read("instance lookup", e))?;
            let existing = docs
                .iter()
                .min_by(|a, b| a.id.cmp(&b.id))
                .map(AssignmentInstance::from_document)
                .transpose()?;
            match existing {
                Some(instance) => partition.found.push(instance),
                None => partition.missing.push(assignment_id),
            }
        }
        Ok(partition)
    }

    /// One unsubmitted instance per missing assignment, each with a fresh
    /// client-generated ID.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Internal` if no ID could be generated.
    pub fn plan_creations(
        student_id: &str,
        missing: &[String],
    ) -> Result<Vec<AssignmentInstance>, SyncError> {
        missing
            .iter()
            .map(|assignment_id| -> Result<AssignmentInstance, SyncError> {
                let id = generate_id(PREFIX_INSTANCE)?;
                Ok(AssignmentInstance::unsubmitted(id, assignment_id, student_id))
            })
            .collect()
    }

    /// Write the planned instances as one atomic batch of creations.
    ///
    /// # Errors
    ///
    /// `Conflict` when another writer created one of the pairings first,
    /// `PartialBatchFailure` or `Transport` otherwise.
    pub async fn commit(&self, planned: &[AssignmentInstance]) -> Result<(), SyncError> {
        if planned.is_empty() {
            return Ok(());
        }
        let ops = planned
            .iter()
            .map(WriteOp::create)
            .collect::<Result<Vec<_>, _>>()?;
        self.gateway
            .batch_write(ops)
            .await
            .map_err(|e| SyncError::from_batch(planned.len(), e))
    }

    /// Partition, plan, and commit without progress events.
    ///
    /// # Errors
    ///
    /// Same as [`Self::partition`] and [`Self::commit`].
    pub async fn reconcile(
        &self,
        student_id: &str,
        assignment_ids: &[String],
    ) -> Result<PassOutcome, SyncError> {
        let partition = self.partition(student_id, assignment_ids).await?;
        let planned = Self::plan_creations(student_id, &partition.missing)?;
        self.commit(&planned).await?;
        Ok(PassOutcome {
            found: partition.found.len(),
            created: planned,
        })
    }

    /// Run one pass, reporting progress on `events`. A closed channel means
    /// nobody is listening any more; the pass still completes its write.
    pub async fn run_pass(self, request: PassRequest, events: mpsc::UnboundedSender<PassEvent>) {
        let PassRequest {
            pass,
            student_id,
            course_id,
            assignment_ids,
        } = request;
        debug!(pass, %student_id, %course_id, assignments = assignment_ids.len(), "pass started");

        let outcome = async {
            let partition = self.partition(&student_id, &assignment_ids).await?;
            let planned = Self::plan_creations(&student_id, &partition.missing)?;
            let found = partition.found.len();
            let _ = events.send(PassEvent::Partitioned {
                pass,
                found: partition.found,
                planned: planned.clone(),
            });
            self.commit(&planned).await?;
            Ok::<_, SyncError>(PassOutcome {
                found,
                created: planned,
            })
        }
        .await;

        match &outcome {
            Ok(done) if done.created.is_empty() => {
                debug!(pass, found = done.found, "pass found nothing missing");
            }
            Ok(done) => {
                info!(pass, %course_id, created = done.created.len(), "instances created");
            }
            Err(e) => debug!(pass, error = %e, "pass failed"),
        }
        let _ = events.send(PassEvent::Finished { pass, outcome });
    }
}
