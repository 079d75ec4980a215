use std::path::Path;

use anyhow::Context;
use lec_config::LecConfig;
use lec_core::documents::WriteOp;
use lec_core::entities::{Assignment, AssignmentInstance, Course};
use lec_core::gateway::CollectionGateway;
use lec_core::responses::SeedResponse;
use serde::Deserialize;

use crate::bootstrap;
use crate::cli::GlobalFlags;
use crate::cli::root_commands::SeedArgs;
use crate::output::output;

/// Seed data file. Every section is optional.
#[derive(Debug, Default, Deserialize)]
pub struct Fixture {
    #[serde(default)]
    pub courses: Vec<Course>,
    #[serde(default)]
    pub assignments: Vec<Assignment>,
    #[serde(default)]
    pub instances: Vec<AssignmentInstance>,
}

impl Fixture {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read fixture {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("invalid fixture {}", path.display()))
    }

    /// One upsert per entity, courses first.
    pub fn write_ops(&self) -> anyhow::Result<Vec<WriteOp>> {
        let mut ops = Vec::with_capacity(
            self.courses.len() + self.assignments.len() + self.instances.len(),
        );
        for course in &self.courses {
            ops.push(WriteOp::set(course)?);
        }
        for assignment in &self.assignments {
            ops.push(WriteOp::set(assignment)?);
        }
        for instance in &self.instances {
            ops.push(WriteOp::set(instance)?);
        }
        Ok(ops)
    }
}

/// Write the whole fixture as a single batch.
pub async fn seed<G: CollectionGateway>(
    gateway: &G,
    fixture: &Fixture,
) -> anyhow::Result<SeedResponse> {
    gateway
        .batch_write(fixture.write_ops()?)
        .await
        .context("seed batch failed")?;
    Ok(SeedResponse {
        courses: u32::try_from(fixture.courses.len())?,
        assignments: u32::try_from(fixture.assignments.len())?,
        instances: u32::try_from(fixture.instances.len())?,
    })
}

/// Handle `lec seed`.
pub async fn handle(args: &SeedArgs, config: &LecConfig, flags: &GlobalFlags) -> anyhow::Result<()> {
    let fixture = Fixture::load(&args.fixture)?;
    let gateway = bootstrap::open_gateway(config).await?;
    let response = seed(gateway.as_ref(), &fixture).await?;
    tracing::info!(
        courses = response.courses,
        assignments = response.assignments,
        instances = response.instances,
        "fixture seeded"
    );
    output(&response, flags.format)
}
