//! Generation-stamped constant caching.
//!
//! An [`Invalidator`] tracks the generation of one constant name. Every
//! reassignment, removal or visibility change of a constant with that name
//! bumps the generation, which makes every [`ConstantCache`] stamped with an
//! older generation stale.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use parking_lot::RwLock;
use tracing::trace;

use super::value::Value;

#[derive(Debug)]
pub struct Invalidator {
    name: Arc<str>,
    generation: AtomicU64,
}

impl Invalidator {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            generation: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The current generation.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Makes every cache entry stamped with the current generation stale.
    pub fn invalidate(&self) {
        let previous = self.generation.fetch_add(1, Ordering::AcqRel);
        trace!(name = %self.name, generation = previous + 1, "constant invalidated");
    }
}

/// A resolved constant together with the generation it was resolved at.
#[derive(Debug)]
pub struct ConstantCache {
    value: Value,
    generation: u64,
    invalidator: Arc<Invalidator>,
}

impl ConstantCache {
    pub fn new(value: Value, generation: u64, invalidator: Arc<Invalidator>) -> Self {
        Self {
            value,
            generation,
            invalidator,
        }
    }

    /// Valid iff no invalidation happened since the stamp was taken.
    pub fn is_valid(&self) -> bool {
        self.generation == self.invalidator.generation()
    }

    pub fn value(&self) -> Value {
        self.value.clone()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn invalidator(&self) -> &Arc<Invalidator> {
        &self.invalidator
    }
}

/// A single slot holding an immutable cache entry.
///
/// Readers always observe a whole entry: entries are published by swapping
/// the `Arc`, never by mutating one in place.
#[derive(Debug, Default)]
pub struct CacheSlot {
    entry: RwLock<Option<Arc<ConstantCache>>>,
}

impl CacheSlot {
    pub fn load(&self) -> Option<Arc<ConstantCache>> {
        self.entry.read().clone()
    }

    /// The cached value, if an entry exists and is still valid.
    pub fn valid_value(&self) -> Option<Value> {
        self.load()
            .filter(|cache| cache.is_valid())
            .map(|cache| cache.value())
    }

    pub fn publish(&self, cache: ConstantCache) {
        let cache = Arc::new(cache);
        *self.entry.write() = Some(cache);
    }

    pub fn is_empty(&self) -> bool {
        self.entry.read().is_none()
    }
}
