//! Small utilities shared across the essadb crates.

use std::hash::BuildHasherDefault;

/// An insertion-order-preserving map keyed with a fast, non-cryptographic
/// hasher. Used for GROUP BY keys, DISTINCT dedup and the scalar function
/// registry, where insertion order must be observable to callers.
pub type IndexMap<K, V> = indexmap::IndexMap<K, V, BuildHasherDefault<ahash::AHasher>>;
pub type IndexSet<V> = indexmap::IndexSet<V, BuildHasherDefault<ahash::AHasher>>;

/// Lets any `Sized` type be built up with a closure, e.g.
/// `EngineConfig::default().config(|c| c.block_size = 8192)`.
pub trait Config: Sized {
    fn config(mut self, f: impl FnOnce(&mut Self)) -> Self {
        f(&mut self);
        self
    }
}

impl<T> Config for T {}
