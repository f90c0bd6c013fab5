use crate::config::SearchConfig;
use crate::error::Result;
use crate::index::{Index, SourceDocument};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// The currently published index, or anything published alongside it
/// (such as the directory its texts live in).
///
/// Readers take an `Arc` snapshot and query it without holding the lock.
/// A replacement is always built completely before it is swapped in, so a
/// reader sees either the old value or the new one.
pub struct IndexHandle<T = Index> {
    current: RwLock<Arc<T>>,
    generation: AtomicU64,
}

impl<T> IndexHandle<T> {
    pub fn new(value: T) -> Self {
        Self { current: RwLock::new(Arc::new(value)), generation: AtomicU64::new(0) }
    }

    pub fn current(&self) -> Arc<T> {
        self.current.read().clone()
    }

    /// Swap in `value`, returning the one it replaces.
    pub fn publish(&self, value: T) -> Arc<T> {
        let next = Arc::new(value);
        let prev = std::mem::replace(&mut *self.current.write(), next);
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        tracing::info!(generation, "published index");
        prev
    }

    /// Number of successful publishes since creation.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }
}

impl IndexHandle<Index> {
    /// Build from `documents` and publish on success. On failure the
    /// current index stays in place.
    pub fn rebuild(&self, documents: &[SourceDocument], config: SearchConfig) -> Result<Arc<Index>> {
        let index = Index::build(documents, config)?;
        self.publish(index);
        Ok(self.current())
    }
}
