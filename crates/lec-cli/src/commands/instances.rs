use lec_config::LecConfig;
use lec_core::documents::{Filter, decode_all};
use lec_core::entities::AssignmentInstance;
use lec_core::enums::Collection;
use lec_core::gateway::CollectionGateway;

use crate::bootstrap;
use crate::cli::GlobalFlags;
use crate::cli::root_commands::InstancesArgs;
use crate::output::output;

/// Stored instances for `student_id`, ordered by assignment.
pub async fn list<G: CollectionGateway>(
    gateway: &G,
    student_id: &str,
    limit: usize,
) -> anyhow::Result<Vec<AssignmentInstance>> {
    let docs = gateway
        .query(
            Collection::AssignmentInstances,
            &[Filter::eq("student_id", student_id)],
        )
        .await?;
    let (mut instances, errors) = decode_all::<AssignmentInstance>(&docs);
    for error in &errors {
        tracing::warn!(%error, "skipping undecodable instance");
    }
    instances.sort_by(|a, b| {
        a.assignment_id
            .cmp(&b.assignment_id)
            .then_with(|| a.id.cmp(&b.id))
    });
    instances.truncate(limit);
    Ok(instances)
}

/// Handle `lec instances`.
pub async fn handle(
    args: &InstancesArgs,
    config: &LecConfig,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    let student_id = bootstrap::resolve_student(args.student.as_deref(), config)?;
    let gateway = bootstrap::open_gateway(config).await?;
    let limit = flags.limit_or(config.general.default_limit);
    let instances = list(gateway.as_ref(), &student_id, limit).await?;
    output(&instances, flags.format)
}
