//! Container runtime client
//!
//! Read-only view of the docker engine used by the HTTP health and service
//! endpoints. Containers are never created, started or stopped from here.

use async_trait::async_trait;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

/// Upper bound for a single docker CLI query
const QUERY_TIMEOUT: Duration = Duration::from_secs(10);

/// `docker ps` output format, one container per line
const PS_FORMAT: &str = "{{.ID}}|{{.Names}}|{{.State}}";

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("Failed to run docker: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("docker {command} failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("docker {0} timed out")]
    Timeout(String),
}

/// One row of the container listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSummary {
    pub id: String,
    pub name: String,
    pub state: String,
}

/// Queries against the container runtime
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Check that the runtime answers
    async fn ping(&self) -> Result<(), RuntimeError>;

    /// List all containers, running or not
    async fn list_containers(&self) -> Result<Vec<ContainerSummary>, RuntimeError>;
}

/// [`ContainerRuntime`] backed by the `docker` CLI
#[derive(Debug, Clone, Default)]
pub struct DockerCli;

impl DockerCli {
    /// Connect to the local docker engine
    ///
    /// Fails when the CLI is missing or the daemon does not answer.
    pub async fn connect() -> Result<Self, RuntimeError> {
        let cli = Self;
        cli.ping().await?;
        Ok(cli)
    }

    async fn docker(&self, args: &[&str]) -> Result<String, RuntimeError> {
        let command = args.first().copied().unwrap_or_default().to_string();
        debug!(args = ?args, "Running docker query");

        let output = tokio::time::timeout(
            QUERY_TIMEOUT,
            Command::new("docker").args(args).kill_on_drop(true).output(),
        )
        .await
        .map_err(|_| RuntimeError::Timeout(command.clone()))??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            warn!(command = %command, stderr = %stderr, "docker query failed");
            return Err(RuntimeError::CommandFailed { command, stderr });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl ContainerRuntime for DockerCli {
    async fn ping(&self) -> Result<(), RuntimeError> {
        self.docker(&["version", "--format", "{{.Server.Version}}"])
            .await
            .map(|_| ())
    }

    async fn list_containers(&self) -> Result<Vec<ContainerSummary>, RuntimeError> {
        let stdout = self.docker(&["ps", "-a", "--format", PS_FORMAT]).await?;
        Ok(parse_ps(&stdout))
    }
}

/// Parse `docker ps` lines in [`PS_FORMAT`]; malformed lines are skipped
fn parse_ps(stdout: &str) -> Vec<ContainerSummary> {
    stdout
        .lines()
        .filter_map(|line| {
            let mut parts = line.trim().splitn(3, '|');
            let id = parts.next()?.trim();
            let name = parts.next()?.trim();
            let state = parts.next()?.trim();
            if id.is_empty() || name.is_empty() {
                return None;
            }
            Some(ContainerSummary {
                id: id.to_string(),
                name: name.to_string(),
                state: state.to_string(),
            })
        })
        .collect()
}
