//! cache-refs: the building blocks a concurrent cache needs beneath its hash
//! table: a frequency sketch for admission/eviction and entry references
//! that hold keys and values strongly, softly or weakly.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: supply the popularity estimator and the reference primitives a
//!   cache consumes, each with a small, precise contract. The hash table,
//!   its locking and the eviction policy live elsewhere.
//! - Layers:
//!   - Collector: generation-tagged slot table (`slotmap`) standing in for a
//!     garbage collector. Owns the referents of soft and weak references,
//!     reclaims the unreachable ones on demand and posts `Reclaimed` records.
//!   - ManagedReference<T>: one referent held strongly (fixed, mutable or
//!     identity-tagged) or collectibly. Strength and hash strategy are data
//!     on a single type.
//!   - PairEntryReference<K, V>: a slot's key and value references per an
//!     `EntryConfig`, plus the Live → Retired → Dead lifecycle.
//!   - ReclaimNotifier: per-side channels the cache drains to find slots
//!     whose soft/weak side was collected.
//!   - FrequencySketch: 4-bit Count-Min Sketch with periodic aging.
//!
//! Constraints
//! - No locking inside references or pairs; mutation takes `&mut self` and
//!   the owning table supplies exclusion. The collector's slot table is the
//!   one shared structure and guards itself with a `parking_lot::Mutex`.
//! - Reads of collectible referents are racy by nature: a referent may be
//!   reclaimed between any two calls. Emptiness is never an error.
//! - Once a reference reads empty it stays empty. Ids are generational, so a
//!   reused slot never satisfies a stale id.
//! - Sketch operations are total: uninitialized sketches estimate 0 and
//!   ignore increments; capacities are clamped, never rejected.
//!
//! Reachability
//! - Collectible referents are stored as `Arc<dyn Any + Send + Sync>`. A
//!   referent whose only strong handle is the collector's is unreachable.
//!   `get` hands out `Arc` clones, so a reader pins the referent for as long
//!   as it holds it.
//! - `CollectionKind::Minor` reclaims weak referents, `Full` also reclaims
//!   soft ones. Driving collections (on a timer, on memory pressure) is the
//!   embedding application's call.
//!
//! Reentrancy
//! - The collector drops reclaimed referents after releasing its lock, so
//!   user `Drop` impls may call back into it.
//!
//! Notes and non-goals
//! - No hash table, no eviction policy, no admission decision.
//! - Hashing in the sketch uses `rustc_hash::FxHasher` by default so
//!   estimates are reproducible; any `BuildHasher` may be supplied.

pub mod collector;
pub mod error;
pub mod frequency_sketch;
mod frequency_sketch_proptest;
pub mod notifier;
pub mod pair;
pub mod reference;
pub mod strength;

// Public surface
pub use collector::{CollectionKind, Collector, ReferenceId};
pub use error::{ReferenceError, Result};
pub use frequency_sketch::{ConcurrentFrequencySketch, FrequencySketch};
pub use notifier::{ReclaimChannel, ReclaimNotifier, Reclaimed};
pub use pair::{Lifecycle, PairEntryReference};
pub use reference::{HashStrategy, ManagedReference};
pub use strength::{EntryConfig, ReferenceStrength};
