use std::path::PathBuf;

use clap::{Args, Subcommand};

/// Top-level command tree.
#[derive(Clone, Debug, Subcommand)]
pub enum Commands {
    /// Upsert courses, assignments, and instances from a JSON fixture.
    Seed(SeedArgs),
    /// Run one reconciliation for a student's course and print the result.
    Reconcile(SessionArgs),
    /// Follow a student's course and print every view change until Ctrl-C.
    Watch(SessionArgs),
    /// Mark a student's assignment instance as submitted.
    Submit(SubmitArgs),
    /// List stored instances for a student.
    Instances(InstancesArgs),
    /// Print committed writes from the JSONL journal.
    Journal,
}

#[derive(Clone, Debug, Args)]
pub struct SeedArgs {
    /// Fixture file with `courses`, `assignments`, and `instances` arrays.
    pub fixture: PathBuf,
}

#[derive(Clone, Debug, Args)]
pub struct SessionArgs {
    /// Student id (defaults to `general.default_student`).
    #[arg(long)]
    pub student: Option<String>,

    /// Course id (defaults to `general.default_course`).
    #[arg(long)]
    pub course: Option<String>,
}

#[derive(Clone, Debug, Args)]
pub struct SubmitArgs {
    /// Student id (defaults to `general.default_student`).
    #[arg(long)]
    pub student: Option<String>,

    /// Assignment to submit.
    #[arg(long)]
    pub assignment: String,

    /// Mark to record with the submission.
    #[arg(long)]
    pub mark: Option<f64>,
}

#[derive(Clone, Debug, Args)]
pub struct InstancesArgs {
    /// Student id (defaults to `general.default_student`).
    #[arg(long)]
    pub student: Option<String>,
}
