use lec_config::LecConfig;
use lec_core::responses::SubmitResponse;
use lec_sync::submission;

use crate::bootstrap;
use crate::cli::GlobalFlags;
use crate::cli::root_commands::SubmitArgs;
use crate::output::output;

/// Handle `lec submit`.
pub async fn handle(args: &SubmitArgs, config: &LecConfig, flags: &GlobalFlags) -> anyhow::Result<()> {
    let student_id = bootstrap::resolve_student(args.student.as_deref(), config)?;
    let gateway = bootstrap::open_gateway(config).await?;

    let instance =
        submission::submit(gateway.as_ref(), &args.assignment, &student_id, args.mark).await?;
    output(&SubmitResponse { instance }, flags.format)
}
