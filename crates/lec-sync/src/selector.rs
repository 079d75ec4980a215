//! View Selector.
//!
//! Derives the active course and its assignment subset from the cache. The
//! result is memoized on (course id, courses version, assignments version);
//! when a recomputation yields an equal selection the previous `Arc` is
//! returned, so callers can detect a real change with `Arc::ptr_eq`.

use std::sync::Arc;

use lec_core::entities::{Assignment, Course};
use lec_core::enums::Collection;

use crate::cache::DerivedCache;

/// The active course and the materialized list of its assignments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActiveSelection {
    pub course_id: Option<String>,
    /// `None` until the course is known to be one of the student's courses.
    pub course: Option<Course>,
    /// Assignments of the course, ordered by id.
    pub assignments: Vec<Assignment>,
    /// Both the courses and the assignments slices have a snapshot.
    pub ready: bool,
}

impl ActiveSelection {
    #[must_use]
    pub fn assignment_ids(&self) -> Vec<String> {
        self.assignments.iter().map(|a| a.id.clone()).collect()
    }
}

type MemoKey = (Option<String>, Option<u64>, Option<u64>);

/// Memoized `(cache, active_course_id) -> ActiveSelection`.
#[derive(Debug, Default)]
pub struct ViewSelector {
    memo: Option<(MemoKey, Arc<ActiveSelection>)>,
    recomputes: u64,
}

impl ViewSelector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current selection. Recomputes only when the memo key changed.
    pub fn select(&mut self, cache: &DerivedCache, course_id: Option<&str>) -> Arc<ActiveSelection> {
        let key: MemoKey = (
            course_id.map(str::to_string),
            cache.slice_version(Collection::Courses),
            cache.slice_version(Collection::Assignments),
        );
        if let Some((memo_key, selection)) = &self.memo {
            if *memo_key == key {
                return Arc::clone(selection);
            }
        }

        self.recomputes += 1;
        let computed = compute(cache, course_id);
        let selection = match &self.memo {
            Some((_, previous)) if **previous == computed => Arc::clone(previous),
            _ => Arc::new(computed),
        };
        self.memo = Some((key, Arc::clone(&selection)));
        selection
    }

    /// How many times the selection was actually recomputed.
    #[must_use]
    pub const fn recomputes(&self) -> u64 {
        self.recomputes
    }

    /// Drop the memo so the next call recomputes.
    pub fn reset(&mut self) {
        self.memo = None;
    }
}

fn compute(cache: &DerivedCache, course_id: Option<&str>) -> ActiveSelection {
    let courses = cache.courses();
    let assignments = cache.assignments();
    let ready = courses.is_some() && assignments.is_some();

    let Some(course_id) = course_id else {
        return ActiveSelection {
            ready,
            ..ActiveSelection::default()
        };
    };
    let course = courses.as_ref().and_then(|c| c.get(course_id)).cloned();
    let assignments = match (&course, &assignments) {
        (Some(_), Some(slice)) => slice
            .values()
            .filter(|a| a.course_id == course_id)
            .cloned()
            .collect(),
        _ => Vec::new(),
    };
    ActiveSelection {
        course_id: Some(course_id.to_string()),
        course,
        assignments,
        ready,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lec_core::documents::Document;
    use serde_json::json;

    fn course(id: &str, students: &[&str]) -> Document {
        Document {
            id: id.into(),
            data: json!({"name": id, "student_ids": students, "assignment_ids": []}),
        }
    }

    fn assignment(id: &str, course_id: &str) -> Document {
        Document {
            id: id.into(),
            data: json!({"course_id": course_id, "title": id, "requires_submission": true}),
        }
    }

    fn loaded() -> DerivedCache {
        let mut cache = DerivedCache::new();
        cache.apply(Collection::Courses, &[course("crs-1", &["stu-1"])]);
        cache.apply(
            Collection::Assignments,
            &[assignment("asg-2", "crs-1"), assignment("asg-1", "crs-1")],
        );
        cache
    }

    #[test]
    fn selects_course_and_sorted_assignments() {
        let cache = loaded();
        let mut selector = ViewSelector::new();
        let selection = selector.select(&cache, Some("crs-1"));
        assert!(selection.ready);
        assert_eq!(selection.course.as_ref().unwrap().id, "crs-1");
        assert_eq!(selection.assignment_ids(), vec!["asg-1", "asg-2"]);
    }

    #[test]
    fn same_inputs_return_same_arc_without_recompute() {
        let cache = loaded();
        let mut selector = ViewSelector::new();
        let a = selector.select(&cache, Some("crs-1"));
        let b = selector.select(&cache, Some("crs-1"));
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(selector.recomputes(), 1);
    }

    #[test]
    fn equal_recomputation_reuses_previous_arc() {
        let mut cache = loaded();
        let mut selector = ViewSelector::new();
        let a = selector.select(&cache, Some("crs-1"));
        cache.apply(
            Collection::Assignments,
            &[assignment("asg-1", "crs-1"), assignment("asg-2", "crs-1")],
        );
        let b = selector.select(&cache, Some("crs-1"));
        assert_eq!(selector.recomputes(), 2);
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn assignment_change_produces_new_identity() {
        let mut cache = loaded();
        let mut selector = ViewSelector::new();
        let a = selector.select(&cache, Some("crs-1"));
        cache.apply(Collection::Assignments, &[assignment("asg-1", "crs-1")]);
        let b = selector.select(&cache, Some("crs-1"));
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(b.assignment_ids(), vec!["asg-1"]);
    }

    #[test]
    fn instance_writes_do_not_recompute() {
        let mut cache = loaded();
        let mut selector = ViewSelector::new();
        selector.select(&cache, Some("crs-1"));
        cache.apply(Collection::AssignmentInstances, &[]);
        selector.select(&cache, Some("crs-1"));
        assert_eq!(selector.recomputes(), 1);
    }

    #[test]
    fn unknown_course_selects_nothing() {
        let cache = loaded();
        let mut selector = ViewSelector::new();
        let selection = selector.select(&cache, Some("crs-9"));
        assert!(selection.course.is_none());
        assert!(selection.assignments.is_empty());
    }

    #[test]
    fn not_ready_until_both_slices_load() {
        let mut cache = DerivedCache::new();
        cache.apply(Collection::Courses, &[course("crs-1", &["stu-1"])]);
        let mut selector = ViewSelector::new();
        assert!(!selector.select(&cache, Some("crs-1")).ready);
    }
}
