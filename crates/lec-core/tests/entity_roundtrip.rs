//! Serde roundtrip and JsonSchema validation tests for entity and response types.

use std::collections::BTreeSet;

use chrono::Utc;
use schemars::schema_for;
use lec_core::documents::{Document, Entity, Filter, WriteOp};
use lec_core::entities::*;
use lec_core::enums::*;
use lec_core::identity::SessionState;
use lec_core::responses::*;

/// Validate a JSON value against a schemars-generated schema.
fn validate_against_schema(
    schema: &serde_json::Value,
    instance: &serde_json::Value,
) -> Vec<String> {
    let validator = jsonschema::validator_for(schema).expect("schema should be valid");
    validator
        .iter_errors(instance)
        .map(|e| format!("{e}"))
        .collect()
}

macro_rules! roundtrip_and_validate {
    ($name:ident, $ty:ty, $instance:expr) => {
        #[test]
        fn $name() {
            let val: $ty = $instance;

            // Serde roundtrip
            let json_str = serde_json::to_string_pretty(&val).unwrap();
            let recovered: $ty = serde_json::from_str(&json_str).unwrap();
            assert_eq!(
                recovered,
                val,
                "serde roundtrip failed for {}",
                stringify!($ty)
            );

            // Schema validation
            let schema = serde_json::to_value(schema_for!($ty)).unwrap();
            let instance = serde_json::to_value(&val).unwrap();
            let errors = validate_against_schema(&schema, &instance);
            assert!(
                errors.is_empty(),
                "Schema validation failed for {}: {:?}",
                stringify!($ty),
                errors
            );
        }
    };
}

fn sample_course() -> Course {
    Course {
        id: "crs-a3f8b2c1".into(),
        name: "Year 10 Biology".into(),
        student_ids: BTreeSet::from(["stu-00000001".to_string(), "stu-00000002".to_string()]),
        assignment_ids: BTreeSet::from(["asg-00000001".to_string()]),
    }
}

fn sample_assignment() -> Assignment {
    Assignment {
        id: "asg-00000001".into(),
        course_id: "crs-a3f8b2c1".into(),
        title: "Cell structure worksheet".into(),
        description: Some("Label the organelles".into()),
        requires_submission: true,
        due_at: Some(Utc::now()),
    }
}

fn sample_instance() -> AssignmentInstance {
    AssignmentInstance {
        id: "ins-0badc0de".into(),
        assignment_id: "asg-00000001".into(),
        student_id: "stu-00000001".into(),
        is_submitted: true,
        submitted_at: Some(Utc::now()),
        mark: Some(87.5),
    }
}

roundtrip_and_validate!(course_roundtrip, Course, sample_course());

roundtrip_and_validate!(assignment_roundtrip, Assignment, sample_assignment());

roundtrip_and_validate!(
    assignment_without_due_date_roundtrip,
    Assignment,
    Assignment {
        due_at: None,
        description: None,
        ..sample_assignment()
    }
);

roundtrip_and_validate!(instance_roundtrip, AssignmentInstance, sample_instance());

roundtrip_and_validate!(
    fresh_instance_roundtrip,
    AssignmentInstance,
    AssignmentInstance::unsubmitted("ins-00000002".into(), "asg-00000001", "stu-00000002")
);

roundtrip_and_validate!(
    session_signed_in_roundtrip,
    SessionState,
    SessionState::signed_in("stu-00000001")
);

roundtrip_and_validate!(session_loading_roundtrip, SessionState, SessionState::Loading);

roundtrip_and_validate!(
    active_view_roundtrip,
    ActiveCourseView,
    ActiveCourseView {
        student_id: Some("stu-00000001".into()),
        course_id: Some("crs-a3f8b2c1".into()),
        course: Some(sample_course()),
        assignments: vec![sample_assignment()],
        instances: vec![sample_instance()],
        pending: vec![],
        loading: false,
        error: None,
        engine: EngineState::Idle,
        needs_refresh: false,
        version: 7,
    }
);

roundtrip_and_validate!(
    journal_entry_roundtrip,
    JournalEntry,
    JournalEntry {
        v: 1,
        ts: "2026-10-19T12:00:00Z".into(),
        collection: Collection::AssignmentInstances,
        id: "ins-0badc0de".into(),
        mode: WriteMode::Create,
        data: serde_json::json!({"assignment_id": "asg-00000001", "student_id": "stu-00000001"}),
    }
);

roundtrip_and_validate!(
    write_op_roundtrip,
    WriteOp,
    WriteOp::create(&sample_instance()).unwrap()
);

roundtrip_and_validate!(
    filter_roundtrip,
    Filter,
    Filter::array_contains("student_ids", "stu-00000001")
);

#[test]
fn journal_entry_without_version_defaults_to_one() {
    let json = r#"{"ts":"2026-10-19T12:00:00Z","collection":"courses","id":"crs-1","mode":"set","data":{}}"#;
    let entry: JournalEntry = serde_json::from_str(json).unwrap();
    assert_eq!(entry.v, 1);
    assert_eq!(entry.collection, Collection::Courses);
}

#[test]
fn entity_document_roundtrip_preserves_fields() {
    let instance = sample_instance();
    let doc: Document = instance.to_document().unwrap();
    assert_eq!(doc.id, instance.id);
    let back = AssignmentInstance::from_document(&doc).unwrap();
    assert_eq!(back, instance);
}

#[test]
fn view_reports_completeness() {
    let mut view = ActiveCourseView {
        course: Some(sample_course()),
        assignments: vec![sample_assignment()],
        ..ActiveCourseView::default()
    };
    assert!(!view.is_complete());
    view.instances.push(sample_instance());
    assert!(view.is_complete());
    assert!(view.is_settled());
    view.pending.push("asg-00000001".into());
    assert!(!view.is_settled());
}
