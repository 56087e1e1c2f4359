//! Long-Term Memory Subsystem
//!
//! Persists learned facts across runs and retrieves them by semantic
//! similarity. Every entry is owned by exactly one subject; retrieval,
//! update, and deletion are always scoped to the owning subject.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

pub mod context;
pub mod store;

pub use context::MemoryContext;
pub use store::MemoryStore;

/// What a memory entry records
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MemoryKind {
    Lesson,
    Preference,
    Solution,
    Error,
}

impl MemoryKind {
    pub fn as_str(&self) -> &str {
        match self {
            MemoryKind::Lesson => "lesson",
            MemoryKind::Preference => "preference",
            MemoryKind::Solution => "solution",
            MemoryKind::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "lesson" => Some(MemoryKind::Lesson),
            "preference" => Some(MemoryKind::Preference),
            "solution" => Some(MemoryKind::Solution),
            "error" => Some(MemoryKind::Error),
            _ => None,
        }
    }
}

impl fmt::Display for MemoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One persisted unit of learned knowledge.
///
/// The embedding is derived from `value` and regenerated whenever the value
/// changes; it is never empty after the first store. `access_count` only
/// ever grows, incremented once per retrieval that returns the entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub id: String,
    pub subject_id: i64,
    pub scope_id: Option<i64>,
    pub kind: MemoryKind,
    pub key: String,
    pub value: String,
    pub embedding: Vec<f32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub access_count: i64,
    pub last_accessed_at: Option<DateTime<Utc>>,
}

/// Parameters for one retrieval call
#[derive(Debug, Clone, Default)]
pub struct RetrievalQuery {
    /// Owning subject; retrieval never crosses subjects
    pub subject_id: i64,
    /// Optional secondary scope filter (e.g. a project)
    pub scope_id: Option<i64>,
    /// Optional kind filter
    pub kind: Option<MemoryKind>,
    /// When present, candidates are ranked by similarity to this text and
    /// those at or below the relevance floor are discarded
    pub query_text: Option<String>,
    /// Maximum entries to return; store default applies when absent
    pub limit: Option<usize>,
}

impl RetrievalQuery {
    pub fn for_subject(subject_id: i64) -> Self {
        Self {
            subject_id,
            ..Default::default()
        }
    }

    pub fn with_scope(mut self, scope_id: i64) -> Self {
        self.scope_id = Some(scope_id);
        self
    }

    pub fn with_kind(mut self, kind: MemoryKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn with_text(mut self, query_text: impl Into<String>) -> Self {
        self.query_text = Some(query_text.into());
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// A retrieved entry together with its relevance score.
///
/// The score is the cosine similarity to the query text, or 0.0 when the
/// query had no text (candidates then rank by access count alone).
#[derive(Debug, Clone)]
pub struct RankedMemory {
    pub relevance_score: f32,
    pub entry: MemoryEntry,
}

/// Outcome of one retrieval call
#[derive(Debug, Clone)]
pub struct RetrievalResult {
    /// Ranked entries, already truncated to the limit
    pub entries: Vec<RankedMemory>,
    /// Candidate count before truncation
    pub total_matched: usize,
    /// Wall time spent retrieving and ranking
    pub elapsed: Duration,
}

/// Partial update applied to an owned entry
#[derive(Debug, Clone, Default)]
pub struct MemoryPatch {
    pub key: Option<String>,
    /// A new value also regenerates the embedding
    pub value: Option<String>,
}

/// Aggregated view over one subject's entries
#[derive(Debug, Clone)]
pub struct MemoryStats {
    pub total_memories: i64,
    pub count_by_kind: std::collections::HashMap<MemoryKind, i64>,
    /// Up to 5 entries, most accessed first
    pub top_accessed: Vec<MemoryEntry>,
    /// Up to 5 entries, most recently created first
    pub most_recent: Vec<MemoryEntry>,
}

/// Errors raised by memory operations.
///
/// `NotFoundOrUnauthorized` deliberately does not distinguish a missing
/// entry from one owned by another subject.
#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    #[error("memory entry {id} not found for subject {subject_id}")]
    NotFoundOrUnauthorized { id: String, subject_id: i64 },

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("embedding codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trip() {
        for kind in [
            MemoryKind::Lesson,
            MemoryKind::Preference,
            MemoryKind::Solution,
            MemoryKind::Error,
        ] {
            assert_eq!(MemoryKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(MemoryKind::parse("hunch"), None);
    }

    #[test]
    fn test_query_builder() {
        let query = RetrievalQuery::for_subject(1)
            .with_scope(9)
            .with_kind(MemoryKind::Lesson)
            .with_text("todo list")
            .with_limit(3);
        assert_eq!(query.subject_id, 1);
        assert_eq!(query.scope_id, Some(9));
        assert_eq!(query.kind, Some(MemoryKind::Lesson));
        assert_eq!(query.query_text.as_deref(), Some("todo list"));
        assert_eq!(query.limit, Some(3));
    }
}
