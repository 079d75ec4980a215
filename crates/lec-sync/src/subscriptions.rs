//! Subscription Manager.
//!
//! Owns the lifecycle of the three logical subscription slots. The manager is
//! pure bookkeeping: the controller performs the gateway calls and reports
//! back through [`SubscriptionManager::attached`] and
//! [`SubscriptionManager::setup_failed`]. Every teardown bumps the slot's
//! generation synchronously, so anything captured under an older generation
//! is recognized as stale when it arrives.

use std::fmt;

use lec_core::documents::{Filter, filter_signature};
use lec_core::enums::{Collection, SlotState};
use lec_core::gateway::SubscriptionHandle;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// One logical subscription slot. A slot holds at most one live subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotKind {
    /// Courses the student is enrolled in.
    Courses,
    /// Assignments of the active course.
    Assignments,
    /// The student's assignment instances.
    Instances,
}

impl SlotKind {
    pub const ALL: [Self; 3] = [Self::Courses, Self::Assignments, Self::Instances];

    #[must_use]
    pub const fn collection(self) -> Collection {
        match self {
            Self::Courses => Collection::Courses,
            Self::Assignments => Collection::Assignments,
            Self::Instances => Collection::AssignmentInstances,
        }
    }

    const fn index(self) -> usize {
        match self {
            Self::Courses => 0,
            Self::Assignments => 1,
            Self::Instances => 2,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Courses => "courses",
            Self::Assignments => "assignments",
            Self::Instances => "instances",
        }
    }
}

impl fmt::Display for SlotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a subscription: collection name plus filter signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotKey {
    pub slot: SlotKind,
    pub filters: Vec<Filter>,
    signature: String,
}

impl SlotKey {
    #[must_use]
    pub fn new(slot: SlotKind, filters: Vec<Filter>) -> Self {
        let signature = format!("{}?{}", slot.collection(), filter_signature(&filters));
        Self {
            slot,
            filters,
            signature,
        }
    }

    #[must_use]
    pub fn courses_for(student_id: &str) -> Self {
        Self::new(
            SlotKind::Courses,
            vec![Filter::array_contains("student_ids", student_id)],
        )
    }

    #[must_use]
    pub fn assignments_for(course_id: &str) -> Self {
        Self::new(SlotKind::Assignments, vec![Filter::eq("course_id", course_id)])
    }

    #[must_use]
    pub fn instances_for(student_id: &str) -> Self {
        Self::new(SlotKind::Instances, vec![Filter::eq("student_id", student_id)])
    }

    #[must_use]
    pub fn signature(&self) -> &str {
        &self.signature
    }
}

/// What the controller must do after [`SubscriptionManager::ensure`].
#[derive(Debug, PartialEq, Eq)]
pub enum Ensure {
    /// The key is already subscribing or active in its slot.
    Unchanged,
    /// Open a subscription for `key`, tagging deliveries with `generation`.
    /// `replaced` is true when a different key was torn down first.
    Subscribe {
        key: SlotKey,
        generation: u64,
        replaced: bool,
    },
}

#[derive(Debug)]
struct Slot {
    key: Option<SlotKey>,
    state: SlotState,
    generation: u64,
    handle: Option<SubscriptionHandle>,
}

impl Slot {
    const fn new() -> Self {
        Self {
            key: None,
            state: SlotState::Unsubscribed,
            generation: 0,
            handle: None,
        }
    }

    fn transition(&mut self, kind: SlotKind, next: SlotState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "{kind}: {} -> {next}",
            self.state
        );
        trace!(slot = %kind, from = %self.state, to = %next, "slot transition");
        self.state = next;
    }

    /// Bump the generation and drop the live handle. Returns whether anything
    /// was torn down.
    fn tear_down(&mut self, kind: SlotKind) -> bool {
        if self.key.is_none() && self.state == SlotState::Unsubscribed {
            return false;
        }
        self.generation += 1;
        if self.state != SlotState::Unsubscribed {
            self.transition(kind, SlotState::TearingDown);
        }
        if let Some(handle) = self.handle.take() {
            handle.cancel();
        }
        if self.state == SlotState::TearingDown {
            self.transition(kind, SlotState::Unsubscribed);
        }
        self.key = None;
        debug!(slot = %kind, generation = self.generation, "slot torn down");
        true
    }
}

/// Lifecycle owner for the logical subscription slots.
#[derive(Debug)]
pub struct SubscriptionManager {
    slots: [Slot; 3],
}

impl Default for SubscriptionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SubscriptionManager {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slots: [Slot::new(), Slot::new(), Slot::new()],
        }
    }

    /// Make `key` the subscription of its slot.
    ///
    /// A no-op when the same key is already subscribing or active. Otherwise
    /// any previous subscription in the slot is torn down first.
    pub fn ensure(&mut self, key: SlotKey) -> Ensure {
        let kind = key.slot;
        let slot = &mut self.slots[kind.index()];
        if slot.key.as_ref() == Some(&key) && slot.state.accepts_deliveries() {
            return Ensure::Unchanged;
        }
        let replaced = slot.tear_down(kind);
        slot.generation += 1;
        slot.transition(kind, SlotState::Subscribing);
        slot.key = Some(key.clone());
        debug!(slot = %kind, generation = slot.generation, key = key.signature(), "subscribing");
        Ensure::Subscribe {
            key,
            generation: slot.generation,
            replaced,
        }
    }

    /// Tear down the slot's subscription. Idempotent; returns whether a
    /// subscription was actually released.
    pub fn release(&mut self, kind: SlotKind) -> bool {
        self.slots[kind.index()].tear_down(kind)
    }

    /// Tear down every slot.
    pub fn release_all(&mut self) {
        for kind in SlotKind::ALL {
            self.release(kind);
        }
    }

    /// Whether a delivery tagged with `generation` may still be applied.
    #[must_use]
    pub fn is_current(&self, kind: SlotKind, generation: u64) -> bool {
        let slot = &self.slots[kind.index()];
        slot.generation == generation && slot.state.accepts_deliveries()
    }

    /// Record a finished subscription setup. A handle for a superseded
    /// generation is cancelled immediately and `false` is returned.
    pub fn attached(&mut self, kind: SlotKind, generation: u64, handle: SubscriptionHandle) -> bool {
        let slot = &mut self.slots[kind.index()];
        if slot.generation != generation || slot.state != SlotState::Subscribing {
            trace!(slot = %kind, generation, current = slot.generation, "cancelling stale handle");
            handle.cancel();
            return false;
        }
        slot.transition(kind, SlotState::Active);
        slot.handle = Some(handle);
        true
    }

    /// Record a failed subscription setup. Returns whether the failure belongs
    /// to the current generation. The slot stays unsubscribed until the next
    /// `ensure`.
    pub fn setup_failed(&mut self, kind: SlotKind, generation: u64) -> bool {
        let slot = &mut self.slots[kind.index()];
        if slot.generation != generation || slot.state != SlotState::Subscribing {
            return false;
        }
        slot.transition(kind, SlotState::Unsubscribed);
        slot.key = None;
        true
    }

    #[must_use]
    pub fn state(&self, kind: SlotKind) -> SlotState {
        self.slots[kind.index()].state
    }

    #[must_use]
    pub fn generation(&self, kind: SlotKind) -> u64 {
        self.slots[kind.index()].generation
    }

    #[must_use]
    pub fn key(&self, kind: SlotKind) -> Option<&SlotKey> {
        self.slots[kind.index()].key.as_ref()
    }
}
