use std::sync::Arc;

use anyhow::Context;
use lec_config::LecConfig;
use lec_store::LibSqlGateway;

/// Load `.env` from the project root, then the layered configuration.
pub fn load_config() -> anyhow::Result<LecConfig> {
    load_project_dotenv()?;
    LecConfig::load().map_err(anyhow::Error::from)
}

/// Open the configured store, local file or embedded replica.
pub async fn open_gateway(config: &LecConfig) -> anyhow::Result<Arc<LibSqlGateway>> {
    let gateway = LibSqlGateway::open_from_config(&config.store)
        .await
        .with_context(|| format!("failed to open store at {}", config.store.path))?;
    tracing::debug!(
        path = %config.store.path,
        replica = config.store.is_remote(),
        journal = config.store.has_journal(),
        "store opened"
    );
    Ok(Arc::new(gateway))
}

/// `--student` if given, otherwise `general.default_student`.
pub fn resolve_student(arg: Option<&str>, config: &LecConfig) -> anyhow::Result<String> {
    arg.or_else(|| config.general.student())
        .map(str::to_string)
        .context("no student given: pass --student or set general.default_student")
}

/// `--course` if given, otherwise `general.default_course`.
pub fn resolve_course(arg: Option<&str>, config: &LecConfig) -> anyhow::Result<String> {
    arg.or_else(|| config.general.course())
        .map(str::to_string)
        .context("no course given: pass --course or set general.default_course")
}

fn load_project_dotenv() -> anyhow::Result<()> {
    let cwd = std::env::current_dir().context("failed to determine current directory")?;
    for env_path in [cwd.join(".lectern").join(".env"), cwd.join(".env")] {
        if env_path.exists() {
            dotenvy::from_path(&env_path)
                .with_context(|| format!("failed to load dotenv file at {}", env_path.display()))?;
            return Ok(());
        }
    }

    dotenvy::dotenv().ok();
    Ok(())
}
