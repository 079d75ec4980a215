//! Derived State Cache.
//!
//! An in-memory, versioned mirror of the three collections. Each slice is
//! replaced wholesale by a subscription snapshot and shared as an
//! `Arc<Slice<T>>`, so a reader holding a slice never sees it change. Every
//! write bumps a global sequence; entries remember the sequence at which
//! their value last changed.
//!
//! Instances additionally carry a two-phase overlay written by the
//! reconciliation engine: creations are staged as `Pending`, then either
//! confirmed to `Acknowledged` when the batch is accepted or rolled back when
//! it is not. Once a confirmed snapshot contains the pairing, the overlay
//! entry is superseded and removed.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use lec_core::documents::{Document, Entity, decode_all};
use lec_core::entities::{Assignment, AssignmentInstance, Course};
use lec_core::enums::Collection;
use lec_core::errors::CoreError;
use tracing::{debug, warn};

/// A value plus the sequence number of its last change.
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<T> {
    pub value: T,
    pub version: u64,
}

/// One collection's mirrored contents, keyed by document ID.
#[derive(Debug, Clone, PartialEq)]
pub struct Slice<T> {
    pub entries: BTreeMap<String, Versioned<T>>,
    /// Sequence number of the snapshot that produced this slice.
    pub version: u64,
}

impl<T> Slice<T> {
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&T> {
        self.entries.get(id).map(|e| &e.value)
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.entries.values().map(|e| &e.value)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Where an instance seen through the cache comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceStatus {
    /// Present in the latest instance snapshot.
    Confirmed,
    /// Known to exist remotely (found by a lookup or accepted in a batch)
    /// but not yet in a snapshot.
    Acknowledged,
    /// Part of a creation batch that has not resolved.
    Pending,
}

#[derive(Debug, Clone)]
struct OverlayEntry {
    instance: AssignmentInstance,
    status: InstanceStatus,
    pass: u64,
}

type Pairing = (String, String);

fn pairing_of(instance: &AssignmentInstance) -> Pairing {
    (instance.assignment_id.clone(), instance.student_id.clone())
}

/// Versioned projection of courses, assignments, and instances.
#[derive(Debug, Default)]
pub struct DerivedCache {
    seq: u64,
    courses: Option<Arc<Slice<Course>>>,
    assignments: Option<Arc<Slice<Assignment>>>,
    instances: Option<Arc<Slice<AssignmentInstance>>>,
    by_pairing: HashMap<Pairing, String>,
    overlay: HashMap<Pairing, OverlayEntry>,
}

fn rebuild<T: Entity + PartialEq>(
    previous: Option<&Slice<T>>,
    docs: &[Document],
    seq: u64,
) -> (Slice<T>, Vec<CoreError>) {
    let (decoded, errors) = decode_all::<T>(docs);
    let entries = decoded
        .into_iter()
        .map(|value| {
            let id = value.id().to_string();
            let version = previous
                .and_then(|p| p.entries.get(&id))
                .filter(|e| e.value == value)
                .map_or(seq, |e| e.version);
            (id, Versioned { value, version })
        })
        .collect();
    (
        Slice {
            entries,
            version: seq,
        },
        errors,
    )
}

impl DerivedCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Global write sequence. Increases on every mutation.
    #[must_use]
    pub const fn version(&self) -> u64 {
        self.seq
    }

    fn bump(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    /// Replace a collection's slice with a full snapshot.
    ///
    /// Documents that do not decode are skipped and returned as errors; the
    /// rest of the snapshot still applies.
    pub fn apply(&mut self, collection: Collection, docs: &[Document]) -> Vec<CoreError> {
        let seq = self.bump();
        let errors = match collection {
            Collection::Courses => {
                let (slice, errors) = rebuild(self.courses.as_deref(), docs, seq);
                self.courses = Some(Arc::new(slice));
                errors
            }
            Collection::Assignments => {
                let (slice, errors) = rebuild(self.assignments.as_deref(), docs, seq);
                self.assignments = Some(Arc::new(slice));
                errors
            }
            Collection::AssignmentInstances => {
                let (slice, errors) = rebuild(self.instances.as_deref(), docs, seq);
                self.index_instances(&slice);
                self.instances = Some(Arc::new(slice));
                errors
            }
        };
        if !errors.is_empty() {
            warn!(%collection, skipped = errors.len(), "snapshot contained undecodable documents");
        }
        debug!(%collection, docs = docs.len(), version = seq, "snapshot applied");
        errors
    }

    fn index_instances(&mut self, slice: &Slice<AssignmentInstance>) {
        self.by_pairing.clear();
        for instance in slice.values() {
            let pairing = pairing_of(instance);
            // Lowest id wins when the store ever holds duplicates.
            self.by_pairing
                .entry(pairing)
                .and_modify(|id| {
                    if instance.id < *id {
                        id.clone_from(&instance.id);
                    }
                })
                .or_insert_with(|| instance.id.clone());
        }
        let superseded: Vec<Pairing> = self
            .overlay
            .keys()
            .filter(|p| self.by_pairing.contains_key(*p))
            .cloned()
            .collect();
        for pairing in superseded {
            self.overlay.remove(&pairing);
        }
    }

    /// Forget a collection's slice ("none yet"). Clearing instances also drops
    /// the overlay.
    pub fn clear(&mut self, collection: Collection) {
        self.bump();
        match collection {
            Collection::Courses => self.courses = None,
            Collection::Assignments => self.assignments = None,
            Collection::AssignmentInstances => {
                self.instances = None;
                self.by_pairing.clear();
                self.overlay.clear();
            }
        }
    }

    pub fn clear_all(&mut self) {
        for collection in Collection::ALL {
            self.clear(collection);
        }
    }

    #[must_use]
    pub fn courses(&self) -> Option<Arc<Slice<Course>>> {
        self.courses.clone()
    }

    #[must_use]
    pub fn assignments(&self) -> Option<Arc<Slice<Assignment>>> {
        self.assignments.clone()
    }

    #[must_use]
    pub fn instances(&self) -> Option<Arc<Slice<AssignmentInstance>>> {
        self.instances.clone()
    }

    /// Sequence of the last snapshot applied to `collection`, if any.
    #[must_use]
    pub fn slice_version(&self, collection: Collection) -> Option<u64> {
        match collection {
            Collection::Courses => self.courses.as_ref().map(|s| s.version),
            Collection::Assignments => self.assignments.as_ref().map(|s| s.version),
            Collection::AssignmentInstances => self.instances.as_ref().map(|s| s.version),
        }
    }

    /// Record instances a lookup found remotely.
    pub fn absorb(&mut self, pass: u64, found: Vec<AssignmentInstance>) {
        self.insert_overlay(pass, found, InstanceStatus::Acknowledged);
    }

    /// Stage a creation batch locally before it is written.
    pub fn stage(&mut self, pass: u64, planned: Vec<AssignmentInstance>) {
        self.insert_overlay(pass, planned, InstanceStatus::Pending);
    }

    fn insert_overlay(&mut self, pass: u64, items: Vec<AssignmentInstance>, status: InstanceStatus) {
        if items.is_empty() {
            return;
        }
        self.bump();
        for instance in items {
            let pairing = pairing_of(&instance);
            if self.by_pairing.contains_key(&pairing) {
                continue;
            }
            self.overlay.insert(
                pairing,
                OverlayEntry {
                    instance,
                    status,
                    pass,
                },
            );
        }
    }

    /// The pass's batch was accepted: its pending entries become acknowledged.
    /// Returns how many entries changed.
    pub fn confirm(&mut self, pass: u64) -> usize {
        let mut changed = 0;
        for entry in self.overlay.values_mut() {
            if entry.pass == pass && entry.status == InstanceStatus::Pending {
                entry.status = InstanceStatus::Acknowledged;
                changed += 1;
            }
        }
        if changed > 0 {
            self.bump();
        }
        changed
    }

    /// The pass's batch failed or was superseded: drop its pending entries.
    /// Returns how many entries were removed.
    pub fn rollback(&mut self, pass: u64) -> usize {
        let before = self.overlay.len();
        self.overlay
            .retain(|_, e| !(e.pass == pass && e.status == InstanceStatus::Pending));
        let removed = before - self.overlay.len();
        if removed > 0 {
            self.bump();
        }
        removed
    }

    /// The instance tracking `(assignment_id, student_id)`, confirmed
    /// snapshots first, then the overlay.
    #[must_use]
    pub fn instance_for(
        &self,
        assignment_id: &str,
        student_id: &str,
    ) -> Option<(&AssignmentInstance, InstanceStatus)> {
        let pairing = (assignment_id.to_string(), student_id.to_string());
        if let Some(instance) = self
            .by_pairing
            .get(&pairing)
            .and_then(|id| self.instances.as_ref()?.get(id))
        {
            return Some((instance, InstanceStatus::Confirmed));
        }
        self.overlay
            .get(&pairing)
            .map(|e| (&e.instance, e.status))
    }

    /// Number of overlay entries still pending.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.overlay
            .values()
            .filter(|e| e.status == InstanceStatus::Pending)
            .count()
    }
}
