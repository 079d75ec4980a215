use std::time::Duration;

use lec_config::LecConfig;
use lec_core::identity::SessionState;
use lec_sync::{SyncController, SyncSettings};
use tokio::sync::broadcast::error::RecvError;

use crate::bootstrap;
use crate::cli::GlobalFlags;
use crate::cli::root_commands::SessionArgs;
use crate::commands::view;

/// Handle `lec watch`.
///
/// Prints the current view, then every published change until Ctrl-C. With a
/// remote replica the store is pulled every `store.sync_interval_secs`.
pub async fn handle(
    args: &SessionArgs,
    config: &LecConfig,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    let student_id = bootstrap::resolve_student(args.student.as_deref(), config)?;
    let course_id = bootstrap::resolve_course(args.course.as_deref(), config)?;
    let gateway = bootstrap::open_gateway(config).await?;
    let replica = gateway.db().is_replica();

    let handle = SyncController::start(gateway.clone(), SyncSettings::from(&config.sync));
    let mut views = handle.view();
    let mut errors = handle.errors();
    handle
        .set_session(SessionState::signed_in(student_id.as_str()))
        .await?;
    handle.select_course(Some(course_id.clone())).await?;

    let mut pull = tokio::time::interval(Duration::from_secs(config.store.sync_interval_secs.max(1)));
    pull.tick().await;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    tracing::info!(%student_id, %course_id, replica, "watching");
    let result = loop {
        tokio::select! {
            changed = views.changed() => {
                if changed.is_err() {
                    break Ok(());
                }
                let current = views.borrow_and_update().clone();
                if let Err(error) = view::print(&current, flags) {
                    break Err(error);
                }
            }
            received = errors.recv() => match received {
                Ok(error) if !flags.quiet => eprintln!("sync error: {error}"),
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break Ok(()),
            },
            _ = pull.tick(), if replica => {
                if let Err(error) = gateway.refresh().await {
                    tracing::warn!(%error, "replica pull failed");
                }
            }
            signal = &mut ctrl_c => {
                break signal.map_err(anyhow::Error::from);
            }
        }
    };

    handle.dispose().await;
    result
}
