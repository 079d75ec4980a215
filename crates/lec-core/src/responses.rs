//! Response types returned by the sync core and the `lec` binary.
//!
//! [`ActiveCourseView`] is the read model published to presentation layers;
//! the remaining structs define the JSON output of `lec` commands.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::entities::{Assignment, AssignmentInstance, Course};
use crate::enums::{Collection, EngineState, WriteMode};

/// The active course's assignments together with the student's instances.
///
/// Published on every change; presentation code subscribes to it and never
/// writes back into the sync core.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct ActiveCourseView {
    pub student_id: Option<String>,
    pub course_id: Option<String>,
    pub course: Option<Course>,
    pub assignments: Vec<Assignment>,
    /// Confirmed or acknowledged instances for `assignments`.
    pub instances: Vec<AssignmentInstance>,
    /// Assignment IDs whose instance creation is in flight.
    pub pending: Vec<String>,
    pub loading: bool,
    /// Most recent surfaced error, cleared by the next successful pass or by
    /// the next delivery on the subscription that failed.
    pub error: Option<String>,
    pub engine: EngineState,
    /// A conflict with another writer used up its follow-up passes; missing
    /// instances are created on the next refresh.
    #[serde(default)]
    pub needs_refresh: bool,
    /// Publish sequence; increases with every published change.
    pub version: u64,
}

impl ActiveCourseView {
    /// Locate the instance tracking `assignment_id` for the current student.
    #[must_use]
    pub fn instance_for(&self, assignment_id: &str) -> Option<&AssignmentInstance> {
        self.instances
            .iter()
            .find(|i| i.assignment_id == assignment_id)
    }

    /// Every assignment has an instance and nothing is in flight.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.pending.is_empty()
            && self
                .assignments
                .iter()
                .all(|a| self.instance_for(&a.id).is_some())
    }

    /// Loaded, idle, and complete for the selected course.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        !self.loading
            && self.engine == EngineState::Idle
            && self.course.is_some()
            && self.is_complete()
    }
}

/// Response from `lec seed`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct SeedResponse {
    pub courses: u32,
    pub assignments: u32,
    pub instances: u32,
}

/// Response from `lec submit`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct SubmitResponse {
    pub instance: AssignmentInstance,
}

/// One committed write as recorded in the JSONL write journal.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct JournalEntry {
    /// Schema version. Defaults to 1 for journals without this field.
    #[serde(default = "default_journal_version")]
    pub v: u32,
    /// RFC 3339 commit timestamp.
    pub ts: String,
    pub collection: Collection,
    pub id: String,
    pub mode: WriteMode,
    pub data: serde_json::Value,
}

const fn default_journal_version() -> u32 {
    1
}
