//! Collections, filter operators, write modes, and lifecycle state machines.
//!
//! All enums use `snake_case` serialization via `#[serde(rename_all = "snake_case")]`.
//! Lifecycle enums provide `allowed_next_states()` so owners can enforce
//! valid transitions at the application layer.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Collection
// ---------------------------------------------------------------------------

/// A named collection in the remote document store.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Courses,
    Assignments,
    AssignmentInstances,
}

impl Collection {
    pub const ALL: [Self; 3] = [Self::Courses, Self::Assignments, Self::AssignmentInstances];

    /// Return the collection name used by the store.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Courses => "courses",
            Self::Assignments => "assignments",
            Self::AssignmentInstances => "assignment_instances",
        }
    }

    /// Parse a store collection name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == name)
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// FilterOp
// ---------------------------------------------------------------------------

/// Predicate operator supported by the store: exact match or set membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum FilterOp {
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "array-contains")]
    ArrayContains,
}

impl FilterOp {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::ArrayContains => "array-contains",
        }
    }
}

impl fmt::Display for FilterOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// WriteMode
// ---------------------------------------------------------------------------

/// How a single operation inside a batch treats an existing document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    /// Insert only. An existing document (or a uniqueness collision) rejects
    /// the whole batch with a conflict.
    Create,
    /// Insert or replace.
    Set,
}

impl WriteMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Set => "set",
        }
    }
}

impl fmt::Display for WriteMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// SlotState
// ---------------------------------------------------------------------------

/// Lifecycle of one logical subscription slot.
///
/// ```text
/// unsubscribed → subscribing → active → tearing_down → unsubscribed
///                subscribing → tearing_down (superseded before attach)
///                subscribing → unsubscribed (setup failed)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SlotState {
    Unsubscribed,
    Subscribing,
    Active,
    TearingDown,
}

impl SlotState {
    #[must_use]
    pub const fn allowed_next_states(self) -> &'static [Self] {
        match self {
            Self::Unsubscribed => &[Self::Subscribing],
            Self::Subscribing => &[Self::Active, Self::TearingDown, Self::Unsubscribed],
            Self::Active => &[Self::TearingDown],
            Self::TearingDown => &[Self::Unsubscribed],
        }
    }

    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        self.allowed_next_states().contains(&next)
    }

    /// Whether deliveries for this slot may still be applied.
    #[must_use]
    pub const fn accepts_deliveries(self) -> bool {
        matches!(self, Self::Subscribing | Self::Active)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unsubscribed => "unsubscribed",
            Self::Subscribing => "subscribing",
            Self::Active => "active",
            Self::TearingDown => "tearing_down",
        }
    }
}

impl fmt::Display for SlotState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// EngineState
// ---------------------------------------------------------------------------

/// State of the reconciliation engine.
///
/// ```text
/// idle → reconciling → committing → idle
///                    → idle (no-op: nothing missing)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    #[default]
    Idle,
    Reconciling,
    Committing,
}

impl EngineState {
    #[must_use]
    #[allow(clippy::match_same_arms)]
    pub const fn allowed_next_states(self) -> &'static [Self] {
        match self {
            Self::Idle => &[Self::Reconciling],
            Self::Reconciling => &[Self::Committing, Self::Idle],
            Self::Committing => &[Self::Idle],
        }
    }

    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        self.allowed_next_states().contains(&next)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Reconciling => "reconciling",
            Self::Committing => "committing",
        }
    }
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collection_names_roundtrip() {
        for collection in Collection::ALL {
            assert_eq!(Collection::from_name(collection.as_str()), Some(collection));
        }
        assert_eq!(Collection::from_name("grades"), None);
    }

    #[test]
    fn filter_op_serializes_as_operator_symbol() {
        assert_eq!(serde_json::to_string(&FilterOp::Eq).unwrap(), "\"==\"");
        assert_eq!(
            serde_json::to_string(&FilterOp::ArrayContains).unwrap(),
            "\"array-contains\""
        );
    }

    #[test]
    fn slot_state_cycle_is_allowed() {
        let cycle = [
            SlotState::Unsubscribed,
            SlotState::Subscribing,
            SlotState::Active,
            SlotState::TearingDown,
            SlotState::Unsubscribed,
        ];
        for pair in cycle.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
        assert!(!SlotState::Active.can_transition_to(SlotState::Subscribing));
        assert!(!SlotState::Unsubscribed.can_transition_to(SlotState::Active));
    }

    #[test]
    fn engine_state_terminal_is_idle() {
        assert!(EngineState::Reconciling.can_transition_to(EngineState::Idle));
        assert!(EngineState::Committing.can_transition_to(EngineState::Idle));
        assert!(!EngineState::Idle.can_transition_to(EngineState::Committing));
        assert!(!EngineState::Committing.can_transition_to(EngineState::Reconciling));
    }
}
