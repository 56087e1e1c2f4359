//! Integration tests for the memory subsystem
//!
//! Exercises the store through its public API against a temporary database.
//! The relevance-floor tests use a keyword embedder whose vectors are
//! orthogonal for unrelated texts, so scores of exactly zero are reachable.

use maestro_engine::config::MemoryConfig;
use maestro_engine::db::Database;
use maestro_engine::embedding::{Embedding, EmbeddingProvider, HashEmbedder};
use maestro_engine::ids::SequentialIdGenerator;
use maestro_engine::memory::{
    MemoryError, MemoryKind, MemoryPatch, MemoryStore, RetrievalQuery,
};
use std::sync::Arc;
use tempfile::TempDir;

const KEYWORDS: [&str; 4] = ["database", "frontend", "deploy", "testing"];

/// One-hot embedder over a fixed keyword set. Texts sharing no keyword get
/// a cosine similarity of exactly zero.
struct KeywordEmbedder;

impl EmbeddingProvider for KeywordEmbedder {
    fn embed(&self, text: &str) -> Embedding {
        KEYWORDS
            .iter()
            .map(|kw| if text.contains(kw) { 1.0 } else { 0.0 })
            .collect()
    }

    fn dimension(&self) -> usize {
        KEYWORDS.len()
    }
}

async fn store_with(embedder: Arc<dyn EmbeddingProvider>) -> (TempDir, MemoryStore) {
    let temp_dir = TempDir::new().unwrap();
    let db = Database::new(&temp_dir.path().join("test.db")).await.unwrap();
    let store = MemoryStore::new(
        db.pool().clone(),
        embedder,
        Arc::new(SequentialIdGenerator::new("mem")),
        MemoryConfig::default(),
    );
    (temp_dir, store)
}

#[tokio::test]
async fn test_relevance_floor_drops_unrelated_entries() {
    let (_guard, store) = store_with(Arc::new(KeywordEmbedder)).await;

    store
        .store(1, MemoryKind::Lesson, "a", "use database indexes", None)
        .await
        .unwrap();
    store
        .store(1, MemoryKind::Lesson, "b", "frontend needs caching", None)
        .await
        .unwrap();

    let result = store
        .retrieve(&RetrievalQuery::for_subject(1).with_text("database tuning"))
        .await
        .unwrap();

    // The frontend entry scores exactly zero and is filtered out
    assert_eq!(result.entries.len(), 1);
    assert_eq!(result.entries[0].entry.key, "a");
    assert!(result.entries[0].relevance_score > 0.3);
}

#[tokio::test]
async fn test_filtered_entries_keep_their_access_counts() {
    let (_guard, store) = store_with(Arc::new(KeywordEmbedder)).await;

    store
        .store(1, MemoryKind::Lesson, "a", "database tips", None)
        .await
        .unwrap();
    let unrelated = store
        .store(1, MemoryKind::Lesson, "b", "deploy checklist", None)
        .await
        .unwrap();

    store
        .retrieve(&RetrievalQuery::for_subject(1).with_text("database"))
        .await
        .unwrap();

    // Bookkeeping touches only returned entries
    let fresh = store.get(&unrelated.id, 1).await.unwrap().unwrap();
    assert_eq!(fresh.access_count, 0);
    assert!(fresh.last_accessed_at.is_none());
}

#[tokio::test]
async fn test_exact_match_outranks_partial_match() {
    let (_guard, store) = store_with(Arc::new(KeywordEmbedder)).await;

    store
        .store(1, MemoryKind::Lesson, "both", "database testing notes", None)
        .await
        .unwrap();
    store
        .store(1, MemoryKind::Lesson, "one", "database only", None)
        .await
        .unwrap();

    let result = store
        .retrieve(&RetrievalQuery::for_subject(1).with_text("database testing"))
        .await
        .unwrap();

    assert_eq!(result.entries.len(), 2);
    assert_eq!(result.entries[0].entry.key, "both");
    assert!(result.entries[0].relevance_score > result.entries[1].relevance_score);
}

#[tokio::test]
async fn test_subjects_are_fully_isolated() {
    let (_guard, store) = store_with(Arc::new(HashEmbedder::default())).await;

    let mine = store
        .store(1, MemoryKind::Preference, "style", "tabs", None)
        .await
        .unwrap();
    store
        .store(2, MemoryKind::Preference, "style", "spaces", None)
        .await
        .unwrap();

    // Retrieval, get, update, delete all respect the subject boundary
    let result = store
        .retrieve(&RetrievalQuery::for_subject(1))
        .await
        .unwrap();
    assert!(result.entries.iter().all(|r| r.entry.subject_id == 1));

    assert!(store.get(&mine.id, 2).await.unwrap().is_none());

    let err = store
        .update(
            &mine.id,
            2,
            MemoryPatch {
                key: None,
                value: Some("stolen".to_string()),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, MemoryError::NotFoundOrUnauthorized { .. }));

    assert!(!store.delete(&mine.id, 2).await.unwrap());
    assert!(store.get(&mine.id, 1).await.unwrap().is_some());
}

#[tokio::test]
async fn test_default_retrieval_limit_is_ten() {
    let (_guard, store) = store_with(Arc::new(HashEmbedder::default())).await;

    for i in 0..15 {
        store
            .store(1, MemoryKind::Lesson, &format!("k{i}"), &format!("fact {i}"), None)
            .await
            .unwrap();
    }

    let result = store
        .retrieve(&RetrievalQuery::for_subject(1))
        .await
        .unwrap();

    assert_eq!(result.entries.len(), 10);
    assert_eq!(result.total_matched, 15);
}

#[tokio::test]
async fn test_statistics_track_access_across_retrievals() {
    let (_guard, store) = store_with(Arc::new(HashEmbedder::default())).await;

    let hot = store
        .store(1, MemoryKind::Solution, "hot", "popular answer", None)
        .await
        .unwrap();
    store
        .store(1, MemoryKind::Lesson, "cold", "rarely needed", None)
        .await
        .unwrap();

    for _ in 0..3 {
        store
            .retrieve(
                &RetrievalQuery::for_subject(1)
                    .with_text("popular answer")
                    .with_limit(1),
            )
            .await
            .unwrap();
    }

    let stats = store.statistics(1).await.unwrap();
    assert_eq!(stats.total_memories, 2);
    assert_eq!(stats.top_accessed[0].id, hot.id);
    assert_eq!(stats.top_accessed[0].access_count, 3);
    assert_eq!(stats.count_by_kind.get(&MemoryKind::Solution), Some(&1));
    assert_eq!(stats.count_by_kind.get(&MemoryKind::Lesson), Some(&1));
}

#[tokio::test]
async fn test_concurrent_partial_updates_on_one_entry() {
    let (_guard, store) = store_with(Arc::new(HashEmbedder::default())).await;

    for i in 0..50 {
        let entry = store
            .store(1, MemoryKind::Lesson, "key", "value", None)
            .await
            .unwrap();
        let new_key = format!("key-{i}");
        let new_value = format!("value-{i}");

        let (a, b) = tokio::join!(
            store.update(
                &entry.id,
                1,
                MemoryPatch {
                    key: Some(new_key.clone()),
                    value: None,
                },
            ),
            store.update(
                &entry.id,
                1,
                MemoryPatch {
                    key: None,
                    value: Some(new_value.clone()),
                },
            ),
        );
        a.unwrap();
        b.unwrap();

        let fresh = store.get(&entry.id, 1).await.unwrap().unwrap();
        assert_eq!(
            (fresh.key, fresh.value),
            (new_key, new_value),
            "one side of two concurrent partial updates was lost on iteration {i}"
        );
    }
}

#[tokio::test]
async fn test_concurrent_retrievals_count_every_access() {
    let (_guard, store) = store_with(Arc::new(HashEmbedder::default())).await;

    let entry = store
        .store(1, MemoryKind::Lesson, "k", "a well known fact", None)
        .await
        .unwrap();

    let query = RetrievalQuery::for_subject(1);
    let (a, b, c, d) = tokio::join!(
        store.retrieve(&query),
        store.retrieve(&query),
        store.retrieve(&query),
        store.retrieve(&query),
    );
    a.unwrap();
    b.unwrap();
    c.unwrap();
    d.unwrap();

    // Increments are relative, so none of the four may be lost
    let fresh = store.get(&entry.id, 1).await.unwrap().unwrap();
    assert_eq!(fresh.access_count, 4);
}

#[tokio::test]
async fn test_concurrent_update_and_retrieve_stay_consistent() {
    let (_guard, store) = store_with(Arc::new(HashEmbedder::default())).await;

    let entry = store
        .store(1, MemoryKind::Lesson, "k", "original", None)
        .await
        .unwrap();

    let query = RetrievalQuery::for_subject(1);
    let (updated, retrieved) = tokio::join!(
        store.update(
            &entry.id,
            1,
            MemoryPatch {
                key: None,
                value: Some("revised".to_string()),
            },
        ),
        store.retrieve(&query),
    );
    updated.unwrap();
    retrieved.unwrap();

    let fresh = store.get(&entry.id, 1).await.unwrap().unwrap();
    assert_eq!(fresh.value, "revised");
    assert_eq!(fresh.access_count, 1);
    assert_eq!(fresh.embedding, HashEmbedder::default().embed("revised"));
}

#[tokio::test]
async fn test_update_persists_across_reads() {
    let (_guard, store) = store_with(Arc::new(HashEmbedder::default())).await;

    let entry = store
        .store(1, MemoryKind::Lesson, "old key", "old value", Some(5))
        .await
        .unwrap();

    store
        .update(
            &entry.id,
            1,
            MemoryPatch {
                key: Some("new key".to_string()),
                value: Some("new value".to_string()),
            },
        )
        .await
        .unwrap();

    let fresh = store.get(&entry.id, 1).await.unwrap().unwrap();
    assert_eq!(fresh.key, "new key");
    assert_eq!(fresh.value, "new value");
    assert_eq!(fresh.scope_id, Some(5));
    assert_eq!(fresh.embedding, HashEmbedder::default().embed("new value"));
}
