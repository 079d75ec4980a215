use lec_core::responses::ActiveCourseView;
use serde::Serialize;

use crate::cli::{GlobalFlags, OutputFormat};
use crate::output::output;

/// One table row per assignment in the active course.
#[derive(Debug, Serialize, PartialEq)]
pub struct AssignmentRow {
    pub assignment_id: String,
    pub title: String,
    pub status: &'static str,
    pub instance_id: Option<String>,
    pub submitted: bool,
    pub mark: Option<f64>,
}

#[must_use]
pub fn rows(view: &ActiveCourseView) -> Vec<AssignmentRow> {
    view.assignments
        .iter()
        .map(|assignment| {
            let instance = view.instance_for(&assignment.id);
            let status = if instance.is_some() {
                "tracked"
            } else if view.pending.contains(&assignment.id) {
                "pending"
            } else {
                "missing"
            };
            AssignmentRow {
                assignment_id: assignment.id.clone(),
                title: assignment.title.clone(),
                status,
                instance_id: instance.map(|i| i.id.clone()),
                submitted: instance.is_some_and(|i| i.is_submitted),
                mark: instance.and_then(|i| i.mark),
            }
        })
        .collect()
}

/// Tables list the assignments; json and raw print the whole view.
pub fn print(view: &ActiveCourseView, flags: &GlobalFlags) -> anyhow::Result<()> {
    match flags.format {
        OutputFormat::Table => output(&rows(view), flags.format),
        OutputFormat::Json | OutputFormat::Raw => output(view, flags.format),
    }
}
