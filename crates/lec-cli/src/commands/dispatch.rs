use lec_config::LecConfig;

use crate::cli::GlobalFlags;
use crate::cli::root_commands::Commands;
use crate::commands;

/// Dispatch a parsed command to the corresponding handler module.
pub async fn dispatch(
    command: Commands,
    config: &LecConfig,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    match command {
        Commands::Seed(args) => commands::seed::handle(&args, config, flags).await,
        Commands::Reconcile(args) => commands::reconcile::handle(&args, config, flags).await,
        Commands::Watch(args) => commands::watch::handle(&args, config, flags).await,
        Commands::Submit(args) => commands::submit::handle(&args, config, flags).await,
        Commands::Instances(args) => commands::instances::handle(&args, config, flags).await,
        Commands::Journal => commands::journal::handle(config, flags),
    }
}
