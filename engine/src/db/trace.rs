/// Pipeline trace persistence operations
///
/// Durably logs the per-stage task records produced by orchestration runs.
/// All queries use parameterized queries for SQL injection prevention.
use crate::agents::AgentType;
use crate::pipeline::trace::{AgentTaskRecord, TaskStatus};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

/// Repository for pipeline task records
pub struct TraceRepository {
    pool: SqlitePool,
}

impl TraceRepository {
    /// Create a new trace repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a finalized task record
    pub async fn insert(&self, record: &AgentTaskRecord) -> Result<()> {
        sqlx::query(
            "INSERT INTO pipeline_tasks (id, project_id, agent_type, status, prompt, result, error, created_at, completed_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.id)
        .bind(record.project_id)
        .bind(record.agent_type.as_str())
        .bind(record.status.as_str())
        .bind(&record.prompt)
        .bind(&record.result)
        .bind(&record.error)
        .bind(record.created_at.timestamp())
        .bind(record.completed_at.map(|t| t.timestamp()))
        .execute(&self.pool)
        .await
        .context("Failed to insert pipeline task record")?;

        Ok(())
    }

    /// Get the most recent records for a project, newest first
    pub async fn recent_for_project(
        &self,
        project_id: i64,
        limit: i64,
    ) -> Result<Vec<AgentTaskRecord>> {
        let rows = sqlx::query(
            "SELECT id, project_id, agent_type, status, prompt, result, error, created_at, completed_at \
             FROM pipeline_tasks WHERE project_id = ? ORDER BY created_at DESC, id DESC LIMIT ?",
        )
        .bind(project_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch pipeline task records")?;

        Ok(rows
            .into_iter()
            .map(|r| AgentTaskRecord {
                id: r.get("id"),
                project_id: r.get("project_id"),
                agent_type: AgentType::parse(&r.get::<String, _>("agent_type"))
                    .unwrap_or(AgentType::Planner),
                status: TaskStatus::parse(&r.get::<String, _>("status"))
                    .unwrap_or(TaskStatus::Failed),
                prompt: r.get("prompt"),
                result: r.get("result"),
                error: r.get("error"),
                created_at: from_unix(r.get("created_at")),
                completed_at: r
                    .get::<Option<i64>, _>("completed_at")
                    .map(from_unix),
            })
            .collect())
    }

    /// Delete records older than the given number of days (cleanup)
    pub async fn delete_older_than(&self, days: i64) -> Result<u64> {
        let cutoff = Utc::now().timestamp() - days * 24 * 60 * 60;

        let result = sqlx::query("DELETE FROM pipeline_tasks WHERE created_at < ?")
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .context("Failed to delete old pipeline task records")?;

        Ok(result.rows_affected())
    }
}

fn from_unix(secs: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(secs, 0).unwrap_or_default()
}
