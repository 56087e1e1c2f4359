//! Memory Context
//!
//! Task-oriented facade over the memory store: fetch relevant prior
//! knowledge before a task runs, record what was learned after it finishes.

use crate::memory::{MemoryEntry, MemoryError, MemoryKind, MemoryStore, RetrievalQuery};
use chrono::Utc;
use std::sync::Arc;
use tracing::debug;

/// Default number of prior entries pulled in for a task
pub const DEFAULT_CONTEXT_LIMIT: usize = 5;

/// Facade connecting orchestration runs to the memory store
pub struct MemoryContext {
    store: Arc<MemoryStore>,
    context_limit: usize,
}

impl MemoryContext {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self::with_limit(store, DEFAULT_CONTEXT_LIMIT)
    }

    pub fn with_limit(store: Arc<MemoryStore>, context_limit: usize) -> Self {
        Self {
            store,
            context_limit,
        }
    }

    /// Fetch the entries most relevant to a task description.
    ///
    /// Scoring and the relevance floor are handled inside the store; this
    /// just shapes the query and unwraps the ranked results.
    pub async fn get_context_for_task(
        &self,
        subject_id: i64,
        scope_id: Option<i64>,
        task_description: &str,
    ) -> Result<Vec<MemoryEntry>, MemoryError> {
        let mut query = RetrievalQuery::for_subject(subject_id)
            .with_text(task_description)
            .with_limit(self.context_limit);
        query.scope_id = scope_id;

        let result = self.store.retrieve(&query).await?;

        debug!(
            "Memory context for subject {}: {} of {} entries",
            subject_id,
            result.entries.len(),
            result.total_matched
        );

        Ok(result.entries.into_iter().map(|r| r.entry).collect())
    }

    /// Record the outcome of an execution as a new memory entry.
    ///
    /// Successful runs are stored as solutions, failed ones as errors. The
    /// key carries a timestamp token so repeated identical tasks never
    /// collide.
    pub async fn learn_from_execution(
        &self,
        subject_id: i64,
        scope_id: Option<i64>,
        task_description: &str,
        result_text: &str,
        succeeded: bool,
    ) -> Result<(), MemoryError> {
        let kind = if succeeded {
            MemoryKind::Solution
        } else {
            MemoryKind::Error
        };
        let key = format!("{} @{}", task_description, Utc::now().timestamp_millis());

        self.store
            .store(subject_id, kind, &key, result_text, scope_id)
            .await?;

        debug!(
            "Learned {} from execution for subject {}",
            kind, subject_id
        );

        Ok(())
    }
}
