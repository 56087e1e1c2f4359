//! Execution Backend
//!
//! The final pipeline stage hands verified code to an execution backend for
//! the build/deploy step. The real deployment target is an external
//! collaborator; the engine only defines the seam and a dry-run
//! implementation that validates input and reports a structured summary.

use async_trait::async_trait;

/// Errors raised by the build/deploy step
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    #[error("nothing to execute: empty artifact")]
    EmptyArtifact,

    #[error("build failed: {0}")]
    BuildFailed(String),

    #[error("deploy failed: {0}")]
    DeployFailed(String),
}

/// Performs the build/deploy step for a project's verified code
#[async_trait]
pub trait ExecutionBackend: Send + Sync {
    /// Returns the name of the backend (e.g., "dry-run")
    fn name(&self) -> &str;

    /// Run the artifact for the given project, returning a human-readable
    /// summary of what happened.
    async fn run(&self, code: &str, project_id: i64) -> Result<String, ExecError>;
}

/// Backend that performs no external effect.
///
/// Validates the artifact and reports what a deployment would have done.
/// Useful for tests and for running the pipeline without infrastructure.
#[derive(Debug, Default)]
pub struct DryRunBackend;

#[async_trait]
impl ExecutionBackend for DryRunBackend {
    fn name(&self) -> &str {
        "dry-run"
    }

    async fn run(&self, code: &str, project_id: i64) -> Result<String, ExecError> {
        if code.trim().is_empty() {
            return Err(ExecError::EmptyArtifact);
        }

        Ok(format!(
            "dry run: {} bytes staged for project {}",
            code.len(),
            project_id
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_dry_run_reports_summary() {
        let backend = DryRunBackend;
        let summary = backend.run("fn main() {}", 42).await.unwrap();
        assert!(summary.contains("project 42"));
    }

    #[tokio::test]
    async fn test_dry_run_rejects_empty_artifact() {
        let backend = DryRunBackend;
        let err = backend.run("   ", 42).await.unwrap_err();
        assert!(matches!(err, ExecError::EmptyArtifact));
    }
}
