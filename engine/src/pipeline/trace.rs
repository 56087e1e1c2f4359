//! Execution Trace Records
//!
//! One `AgentTaskRecord` is created per agent invocation within an
//! orchestration run. Records are appended to the trace in stage-invocation
//! order and never mutated after finalization.

use crate::agents::AgentType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of one pipeline task record
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(TaskStatus::Pending),
            "running" => Some(TaskStatus::Running),
            "completed" => Some(TaskStatus::Completed),
            "failed" => Some(TaskStatus::Failed),
            _ => None,
        }
    }

    /// Whether this status is terminal for a record
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

/// One element of an orchestration run's execution trace.
///
/// Invariant: `completed_at` is set if and only if `status` is terminal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentTaskRecord {
    pub id: String,
    pub project_id: i64,
    pub agent_type: AgentType,
    pub status: TaskStatus,
    pub prompt: String,
    pub result: Option<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl AgentTaskRecord {
    /// Create a record in `running` state, immediately before the agent call
    pub fn running(
        id: impl Into<String>,
        project_id: i64,
        agent_type: AgentType,
        prompt: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            project_id,
            agent_type,
            status: TaskStatus::Running,
            prompt: prompt.into(),
            result: None,
            error: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Finalize to `completed` with the stage output
    pub fn complete(mut self, result: Option<String>) -> Self {
        self.status = TaskStatus::Completed;
        self.result = result;
        self.completed_at = Some(Utc::now());
        self
    }

    /// Finalize to `failed` with the failure description
    pub fn fail(mut self, error: impl Into<String>) -> Self {
        self.status = TaskStatus::Failed;
        self.error = Some(error.into());
        self.completed_at = Some(Utc::now());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in [
            TaskStatus::Pending,
            TaskStatus::Running,
            TaskStatus::Completed,
            TaskStatus::Failed,
        ] {
            assert_eq!(TaskStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(TaskStatus::parse("cancelled"), None);
    }

    #[test]
    fn test_completed_at_tracks_terminal_status() {
        let record = AgentTaskRecord::running("t-1", 42, AgentType::Planner, "build");
        assert_eq!(record.status, TaskStatus::Running);
        assert!(record.completed_at.is_none());

        let done = record.clone().complete(Some("plan".to_string()));
        assert_eq!(done.status, TaskStatus::Completed);
        assert!(done.completed_at.is_some());
        assert_eq!(done.result.as_deref(), Some("plan"));

        let failed = record.fail("timed out");
        assert_eq!(failed.status, TaskStatus::Failed);
        assert!(failed.completed_at.is_some());
        assert_eq!(failed.error.as_deref(), Some("timed out"));
    }

    #[test]
    fn test_is_terminal() {
        assert!(!TaskStatus::Pending.is_terminal());
        assert!(!TaskStatus::Running.is_terminal());
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
    }
}
