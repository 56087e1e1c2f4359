//! Memory Store
//!
//! SQLite-backed store for memory entries. Candidate filtering happens in
//! SQL scoped to the owning subject; similarity scoring, ranking, and
//! truncation happen in Rust over the candidate set. Access bookkeeping for
//! returned entries is applied in a single transaction so concurrent
//! retrievals never lose an increment.

use crate::config::MemoryConfig;
use crate::embedding::{cosine_similarity, SharedEmbedder};
use crate::ids::IdGenerator;
use crate::memory::{
    MemoryEntry, MemoryError, MemoryKind, MemoryPatch, MemoryStats, RankedMemory, RetrievalQuery,
    RetrievalResult,
};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

const SELECT_COLUMNS: &str = "id, subject_id, scope_id, kind, key, value, embedding, \
     created_at, updated_at, access_count, last_accessed_at";

/// Content-addressed store of learned facts with semantic retrieval
pub struct MemoryStore {
    pool: SqlitePool,
    embedder: SharedEmbedder,
    ids: Arc<dyn IdGenerator>,
    config: MemoryConfig,
}

impl MemoryStore {
    pub fn new(
        pool: SqlitePool,
        embedder: SharedEmbedder,
        ids: Arc<dyn IdGenerator>,
        config: MemoryConfig,
    ) -> Self {
        Self {
            pool,
            embedder,
            ids,
            config,
        }
    }

    /// Persist a new entry, embedding its value
    pub async fn store(
        &self,
        subject_id: i64,
        kind: MemoryKind,
        key: &str,
        value: &str,
        scope_id: Option<i64>,
    ) -> Result<MemoryEntry, MemoryError> {
        let embedding = self.embedder.embed(value);
        let embedding_json = serde_json::to_string(&embedding)?;
        let id = self.ids.next_id();
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO memories (id, subject_id, scope_id, kind, key, value, embedding, \
             created_at, updated_at, access_count, last_accessed_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 0, NULL)",
        )
        .bind(&id)
        .bind(subject_id)
        .bind(scope_id)
        .bind(kind.as_str())
        .bind(key)
        .bind(value)
        .bind(&embedding_json)
        .bind(now.timestamp())
        .bind(now.timestamp())
        .execute(&self.pool)
        .await?;

        debug!("Stored {} memory {} for subject {}", kind, id, subject_id);

        Ok(MemoryEntry {
            id,
            subject_id,
            scope_id,
            kind,
            key: key.to_string(),
            value: value.to_string(),
            embedding,
            created_at: now,
            updated_at: now,
            access_count: 0,
            last_accessed_at: None,
        })
    }

    /// Retrieve entries for a subject, ranked by relevance.
    ///
    /// When the query carries text, candidates at or below the relevance
    /// floor are discarded and the rest rank by similarity; ties (and
    /// text-less queries) rank by access count, most-used first. Every
    /// returned entry has its access count incremented and its last-accessed
    /// timestamp refreshed as part of the call.
    pub async fn retrieve(&self, query: &RetrievalQuery) -> Result<RetrievalResult, MemoryError> {
        let started = Instant::now();

        let rows = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM memories WHERE subject_id = ?"
        ))
        .bind(query.subject_id)
        .fetch_all(&self.pool)
        .await?;

        let mut candidates = Vec::with_capacity(rows.len());
        for row in rows {
            let entry = row_to_entry(&row)?;
            if let Some(scope) = query.scope_id {
                if entry.scope_id != Some(scope) {
                    continue;
                }
            }
            if let Some(kind) = query.kind {
                if entry.kind != kind {
                    continue;
                }
            }
            candidates.push(entry);
        }

        // Embed the query text once, score every candidate against it
        let mut ranked: Vec<RankedMemory> = match query.query_text.as_deref() {
            Some(text) => {
                let query_embedding = self.embedder.embed(text);
                candidates
                    .into_iter()
                    .filter_map(|entry| {
                        let score = cosine_similarity(&query_embedding, &entry.embedding);
                        (score > self.config.relevance_floor).then_some(RankedMemory {
                            relevance_score: score,
                            entry,
                        })
                    })
                    .collect()
            }
            None => candidates
                .into_iter()
                .map(|entry| RankedMemory {
                    relevance_score: 0.0,
                    entry,
                })
                .collect(),
        };

        ranked.sort_by(|a, b| {
            b.relevance_score
                .partial_cmp(&a.relevance_score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| b.entry.access_count.cmp(&a.entry.access_count))
        });

        let total_matched = ranked.len();
        let limit = query.limit.unwrap_or(self.config.retrieval_limit);
        ranked.truncate(limit);

        // Access bookkeeping is a required side effect of retrieval, applied
        // atomically for the whole returned set.
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        for item in &mut ranked {
            sqlx::query(
                "UPDATE memories SET access_count = access_count + 1, last_accessed_at = ? \
                 WHERE id = ?",
            )
            .bind(now.timestamp())
            .bind(&item.entry.id)
            .execute(&mut *tx)
            .await?;

            item.entry.access_count += 1;
            item.entry.last_accessed_at = Some(now);
        }
        tx.commit().await?;

        debug!(
            "Retrieved {}/{} memories for subject {} in {:?}",
            ranked.len(),
            total_matched,
            query.subject_id,
            started.elapsed()
        );

        Ok(RetrievalResult {
            entries: ranked,
            total_matched,
            elapsed: started.elapsed(),
        })
    }

    /// Fetch a single entry without access bookkeeping.
    ///
    /// Returns `None` both when the entry is absent and when it belongs to a
    /// different subject.
    pub async fn get(
        &self,
        id: &str,
        subject_id: i64,
    ) -> Result<Option<MemoryEntry>, MemoryError> {
        let row = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM memories WHERE id = ? AND subject_id = ?"
        ))
        .bind(id)
        .bind(subject_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| row_to_entry(&r)).transpose()
    }

    /// Apply a partial update to an owned entry.
    ///
    /// Fails with `NotFoundOrUnauthorized` if no entry with this id belongs
    /// to the subject, leaving nothing modified. A changed value regenerates
    /// the embedding; `updated_at` is always refreshed. The patch is applied
    /// in a single conditional statement, so concurrent partial updates to
    /// the same entry never overwrite each other's fields with a stale
    /// snapshot.
    pub async fn update(
        &self,
        id: &str,
        subject_id: i64,
        patch: MemoryPatch,
    ) -> Result<MemoryEntry, MemoryError> {
        let embedding_json = match patch.value.as_deref() {
            Some(value) => Some(serde_json::to_string(&self.embedder.embed(value))?),
            None => None,
        };
        let now = Utc::now();

        let result = sqlx::query(
            "UPDATE memories SET \
             key = COALESCE(?, key), \
             value = COALESCE(?, value), \
             embedding = COALESCE(?, embedding), \
             updated_at = ? \
             WHERE id = ? AND subject_id = ?",
        )
        .bind(&patch.key)
        .bind(&patch.value)
        .bind(&embedding_json)
        .bind(now.timestamp())
        .bind(id)
        .bind(subject_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(MemoryError::NotFoundOrUnauthorized {
                id: id.to_string(),
                subject_id,
            });
        }

        self.get(id, subject_id).await?.ok_or_else(|| {
            MemoryError::NotFoundOrUnauthorized {
                id: id.to_string(),
                subject_id,
            }
        })
    }

    /// Remove an owned entry. Returns whether a row was removed.
    pub async fn delete(&self, id: &str, subject_id: i64) -> Result<bool, MemoryError> {
        let result = sqlx::query("DELETE FROM memories WHERE id = ? AND subject_id = ?")
            .bind(id)
            .bind(subject_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Aggregate statistics over one subject's entries
    pub async fn statistics(&self, subject_id: i64) -> Result<MemoryStats, MemoryError> {
        let total_memories: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM memories WHERE subject_id = ?")
                .bind(subject_id)
                .fetch_one(&self.pool)
                .await?;

        let kind_rows = sqlx::query(
            "SELECT kind, COUNT(*) as n FROM memories WHERE subject_id = ? GROUP BY kind",
        )
        .bind(subject_id)
        .fetch_all(&self.pool)
        .await?;

        let mut count_by_kind = HashMap::new();
        for row in kind_rows {
            if let Some(kind) = MemoryKind::parse(&row.get::<String, _>("kind")) {
                count_by_kind.insert(kind, row.get::<i64, _>("n"));
            }
        }

        let top_accessed = self
            .fetch_sorted(subject_id, "access_count DESC, created_at DESC")
            .await?;
        let most_recent = self
            .fetch_sorted(subject_id, "created_at DESC, id DESC")
            .await?;

        Ok(MemoryStats {
            total_memories,
            count_by_kind,
            top_accessed,
            most_recent,
        })
    }

    async fn fetch_sorted(
        &self,
        subject_id: i64,
        order_by: &str,
    ) -> Result<Vec<MemoryEntry>, MemoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM memories WHERE subject_id = ? ORDER BY {order_by} LIMIT 5"
        ))
        .bind(subject_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_entry).collect()
    }
}

fn row_to_entry(row: &SqliteRow) -> Result<MemoryEntry, MemoryError> {
    let embedding: Vec<f32> = serde_json::from_str(&row.get::<String, _>("embedding"))?;
    let kind =
        MemoryKind::parse(&row.get::<String, _>("kind")).unwrap_or(MemoryKind::Lesson);

    Ok(MemoryEntry {
        id: row.get("id"),
        subject_id: row.get("subject_id"),
        scope_id: row.get("scope_id"),
        kind,
        key: row.get("key"),
        value: row.get("value"),
        embedding,
        created_at: from_unix(row.get("created_at")),
        updated_at: from_unix(row.get("updated_at")),
        access_count: row.get("access_count"),
        last_accessed_at: row.get::<Option<i64>, _>("last_accessed_at").map(from_unix),
    })
}

fn from_unix(secs: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(secs, 0).unwrap_or_default()
}
