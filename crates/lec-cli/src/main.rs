#![allow(clippy::pedantic)]
#![allow(clippy::nursery)]

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

mod bootstrap;
mod cli;
mod commands;
mod output;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("lec error: {error:#}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();
    init_tracing(cli.quiet, cli.verbose)?;

    let flags = cli.global_flags();
    if let Some(project) = flags.project.as_deref() {
        enter_project(project)?;
    }

    let config = bootstrap::load_config()?;
    commands::dispatch::dispatch(cli.command, &config, &flags).await
}

fn init_tracing(quiet: bool, verbose: bool) -> anyhow::Result<()> {
    let level = if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "warn"
    };

    let filter = tracing_subscriber::EnvFilter::try_from_env("LECTERN_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|error| anyhow::anyhow!("failed to initialize tracing subscriber: {error}"))?;

    Ok(())
}

/// Run from `project` so `.lectern/` and `.env` resolve against it.
fn enter_project(project: &str) -> anyhow::Result<()> {
    let mut root = PathBuf::from(project);
    if root
        .file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name == ".lectern")
    {
        root = root
            .parent()
            .map(std::path::Path::to_path_buf)
            .context("invalid --project path: '.lectern' directory has no parent")?;
    }

    if !root.is_dir() {
        anyhow::bail!(
            "invalid --project '{}': directory does not exist",
            root.display()
        );
    }

    std::env::set_current_dir(&root)
        .with_context(|| format!("failed to enter project at {}", root.display()))
}
