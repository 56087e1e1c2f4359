//! Id Allocation
//!
//! Memory entries and pipeline task records carry opaque string ids. The
//! allocator sits behind a trait so tests and tooling can inject
//! deterministic ids instead of random UUIDs.

use std::sync::atomic::{AtomicU64, Ordering};

/// Allocates opaque, unique ids for domain records
pub trait IdGenerator: Send + Sync {
    /// Produce the next id. Ids are never reused within one generator.
    fn next_id(&self) -> String;
}

/// Production id generator backed by UUID v4
#[derive(Debug, Default)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn next_id(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

/// Deterministic generator producing "prefix-1", "prefix-2", ...
///
/// Intended for tests and offline tooling where reproducible ids matter.
#[derive(Debug)]
pub struct SequentialIdGenerator {
    prefix: String,
    counter: AtomicU64,
}

impl SequentialIdGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            counter: AtomicU64::new(0),
        }
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn next_id(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{}-{}", self.prefix, n)
    }
}
