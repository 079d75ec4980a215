use std::sync::Arc;

use lec_config::LecConfig;
use lec_core::enums::EngineState;
use lec_core::gateway::CollectionGateway;
use lec_core::identity::SessionState;
use lec_core::responses::ActiveCourseView;
use lec_sync::{SyncController, SyncSettings};

use crate::bootstrap;
use crate::cli::GlobalFlags;
use crate::cli::root_commands::SessionArgs;
use crate::commands::view;

/// Whether `view` belongs to this session and is as far as a single
/// reconciliation can take it.
fn is_final(view: &ActiveCourseView, student_id: &str, course_id: &str) -> bool {
    if view.student_id.as_deref() != Some(student_id)
        || view.course_id.as_deref() != Some(course_id)
    {
        return false;
    }
    if view.error.is_some() {
        return view.engine == EngineState::Idle;
    }
    if view.needs_refresh {
        return !view.loading && view.engine == EngineState::Idle;
    }
    !view.loading
        && view.engine == EngineState::Idle
        && (view.course.is_none() || view.is_complete())
}

/// Start a sync core for one student and course, wait until it has settled,
/// and tear it down again.
pub async fn run<G: CollectionGateway>(
    gateway: Arc<G>,
    settings: SyncSettings,
    student_id: &str,
    course_id: &str,
) -> anyhow::Result<ActiveCourseView> {
    let handle = SyncController::start(gateway, settings);
    handle
        .set_session(SessionState::signed_in(student_id))
        .await?;
    handle.select_course(Some(course_id.to_string())).await?;

    let settled = handle
        .wait_for(|v| is_final(v, student_id, course_id))
        .await;
    handle.dispose().await;
    let view = settled?;

    if let Some(error) = &view.error {
        anyhow::bail!("reconciliation failed: {error}");
    }
    if view.course.is_none() {
        anyhow::bail!("course {course_id} is not visible to student {student_id}");
    }
    if view.needs_refresh {
        anyhow::bail!(
            "another client kept creating instances for {student_id}; run `lec reconcile` again"
        );
    }
    tracing::info!(
        student_id,
        course_id,
        instances = view.instances.len(),
        "course reconciled"
    );
    Ok(view)
}

/// Handle `lec reconcile`.
pub async fn handle(
    args: &SessionArgs,
    config: &LecConfig,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    let student_id = bootstrap::resolve_student(args.student.as_deref(), config)?;
    let course_id = bootstrap::resolve_course(args.course.as_deref(), config)?;
    let gateway = bootstrap::open_gateway(config).await?;

    let view = run(gateway, SyncSettings::from(&config.sync), &student_id, &course_id).await?;
    view::print(&view, flags)
}
