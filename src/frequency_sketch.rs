//! FrequencySketch: Count-Min Sketch of 4-bit counters with periodic aging.
//!
//! Layout
//! - `table` is a power-of-two array of `u64` words, each packing sixteen
//!   4-bit saturating counters (max 15).
//! - An element hashes to four words (one per seed) and, inside each word, to
//!   one of four counter groups chosen by the low two bits of its hash. The
//!   i-th probe uses counter `start + i` of its word, so the four counters of
//!   one element are always distinct.
//! - The estimate is the minimum of the four counters; Count-Min never
//!   under-estimates before aging.
//!
//! Aging
//! - Every counted increment bumps `size`. When `size` reaches
//!   `sample_size` (10 × table length) every counter is halved and `size` is
//!   recomputed as `(size - odd / 4) / 2`, where `odd` is the number of
//!   counters that were odd (their lost remainder).
//!
//! With width = 4 × table length the error bound is about e / width at
//! roughly 93.75% confidence.
//!
//! Concurrency
//! - `FrequencySketch` takes `&mut self` to mutate; wrap it in whatever
//!   shard lock the admission policy already holds, or use
//!   `ConcurrentFrequencySketch`, which serializes aging against increments.

use core::hash::{BuildHasher, BuildHasherDefault, Hash};
use parking_lot::RwLock;
use rustc_hash::FxHasher;
use tracing::trace;

/// Mixture of seeds from FNV-1a, CityHash and Murmur3.
const SEED: [u64; 4] = [
    0xc3a5_c85c_97cb_3127,
    0xb492_b66f_be98_f273,
    0x9ae1_6a3b_2f90_404f,
    0xcbf2_9ce4_8422_2325,
];
const RESET_MASK: u64 = 0x7777_7777_7777_7777;
const ONE_MASK: u64 = 0x1111_1111_1111_1111;
const SPREAD_MULTIPLIER: u32 = 0x045d_9f3b;
const MAXIMUM_CAPACITY: u64 = 1 << 30;

pub type DefaultSketchHasher = BuildHasherDefault<FxHasher>;

#[derive(Debug, Clone)]
pub struct FrequencySketch<S = DefaultSketchHasher> {
    hasher: S,
    table: Box<[u64]>,
    table_mask: usize,
    sample_size: u64,
    size: u64,
}

impl FrequencySketch {
    /// Uninitialized sketch; call `ensure_capacity` before use.
    pub fn new() -> Self {
        Self::with_hasher(Default::default())
    }
}

impl<S> Default for FrequencySketch<S>
where
    S: BuildHasher + Default,
{
    fn default() -> Self {
        Self::with_hasher(S::default())
    }
}

#[inline]
fn spread(mut x: u32) -> u32 {
    x = ((x >> 16) ^ x).wrapping_mul(SPREAD_MULTIPLIER);
    x = ((x >> 16) ^ x).wrapping_mul(SPREAD_MULTIPLIER);
    (x >> 16) ^ x
}

impl<S> FrequencySketch<S>
where
    S: BuildHasher,
{
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            hasher,
            table: Vec::new().into_boxed_slice(),
            table_mask: 0,
            sample_size: 0,
            size: 0,
        }
    }

    /// Size the table for about `maximum_size` distinct elements, clamped to
    /// `[1, 2^30]`. Growing discards the current counts; a bound the table
    /// already covers is a no-op.
    pub fn ensure_capacity(&mut self, maximum_size: u64) {
        let maximum = maximum_size.clamp(1, MAXIMUM_CAPACITY) as usize;
        if self.table.len() >= maximum {
            return;
        }
        let len = maximum.next_power_of_two();
        self.table = vec![0u64; len].into_boxed_slice();
        self.table_mask = len - 1;
        self.sample_size = 10 * len as u64;
        self.size = 0;
        trace!(table_len = len, sample_size = self.sample_size, "sketch resized");
    }

    #[inline]
    pub fn is_not_initialized(&self) -> bool {
        self.table.is_empty()
    }

    /// Estimated number of recent occurrences of `e`, in `[0, 15]`.
    pub fn frequency<Q>(&self, e: &Q) -> u32
    where
        Q: ?Sized + Hash,
    {
        if self.is_not_initialized() {
            return 0;
        }
        let hash = self.spread_hash(e);
        let start = (hash & 3) << 2;
        let mut frequency = u32::MAX;
        for i in 0..4 {
            let index = self.index_of(hash, i);
            let offset = (start + i as u32) << 2;
            let count = ((self.table[index] >> offset) & 0xf) as u32;
            frequency = frequency.min(count);
        }
        frequency
    }

    /// Record one occurrence of `e`. Ages the sketch once `sample_size`
    /// counted increments have accumulated.
    pub fn increment<Q>(&mut self, e: &Q)
    where
        Q: ?Sized + Hash,
    {
        if self.is_not_initialized() {
            return;
        }
        let hash = self.spread_hash(e);
        let start = (hash & 3) << 2;
        let mut added = false;
        for i in 0..4 {
            let index = self.index_of(hash, i);
            added |= self.increment_at(index, start + i as u32);
        }
        if added {
            self.size += 1;
            if self.size == self.sample_size {
                self.reset();
            }
        }
    }

    /// Saturating +1 on counter `j` of word `i`.
    #[inline]
    fn increment_at(&mut self, i: usize, j: u32) -> bool {
        let offset = j << 2;
        let mask = 0xfu64 << offset;
        if self.table[i] & mask != mask {
            self.table[i] += 1u64 << offset;
            true
        } else {
            false
        }
    }

    /// Halve every counter and shrink `size` by what the halving removed.
    fn reset(&mut self) {
        let mut odd = 0u64;
        for word in self.table.iter_mut() {
            odd += u64::from((*word & ONE_MASK).count_ones());
            *word = (*word >> 1) & RESET_MASK;
        }
        self.size = self.size.saturating_sub(odd / 4) / 2;
        trace!(
            table_len = self.table.len(),
            odd,
            size = self.size,
            "sketch aged"
        );
    }

    #[inline]
    fn index_of(&self, hash: u32, i: usize) -> usize {
        let mut h = u64::from(hash).wrapping_add(SEED[i]).wrapping_mul(SEED[i]);
        h ^= h >> 32;
        (h as usize) & self.table_mask
    }

    #[inline]
    fn spread_hash<Q>(&self, e: &Q) -> u32
    where
        Q: ?Sized + Hash,
    {
        let h = self.hasher.hash_one(e);
        spread((h ^ (h >> 32)) as u32)
    }

    pub fn table_len(&self) -> usize {
        self.table.len()
    }

    /// Counted increments between agings.
    pub fn sample_size(&self) -> u64 {
        self.sample_size
    }

    /// Counted increments since the last aging (after its adjustment).
    pub fn size(&self) -> u64 {
        self.size
    }

    #[cfg(test)]
    pub(crate) fn counter_sum(&self) -> u64 {
        self.table
            .iter()
            .map(|w| (0..16).map(|n| (w >> (n * 4)) & 0xf).sum::<u64>())
            .sum()
    }
}

/// `FrequencySketch` behind a `parking_lot::RwLock`: estimates share the lock,
/// increments and aging take it exclusively.
#[derive(Debug)]
pub struct ConcurrentFrequencySketch<S = DefaultSketchHasher> {
    inner: RwLock<FrequencySketch<S>>,
}

impl<S> Default for ConcurrentFrequencySketch<S>
where
    S: BuildHasher + Default,
{
    fn default() -> Self {
        Self::with_hasher(S::default())
    }
}

impl ConcurrentFrequencySketch {
    pub fn new() -> Self {
        Self::with_hasher(Default::default())
    }
}

impl<S> ConcurrentFrequencySketch<S>
where
    S: BuildHasher,
{
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            inner: RwLock::new(FrequencySketch::with_hasher(hasher)),
        }
    }

    pub fn ensure_capacity(&self, maximum_size: u64) {
        self.inner.write().ensure_capacity(maximum_size);
    }

    pub fn is_not_initialized(&self) -> bool {
        self.inner.read().is_not_initialized()
    }

    pub fn frequency<Q>(&self, e: &Q) -> u32
    where
        Q: ?Sized + Hash,
    {
        self.inner.read().frequency(e)
    }

    pub fn increment<Q>(&self, e: &Q)
    where
        Q: ?Sized + Hash,
    {
        self.inner.write().increment(e);
    }

    pub fn table_len(&self) -> usize {
        self.inner.read().table_len()
    }

    pub fn sample_size(&self) -> u64 {
        self.inner.read().sample_size()
    }

    pub fn size(&self) -> u64 {
        self.inner.read().size()
    }

    pub fn into_inner(self) -> FrequencySketch<S> {
        self.inner.into_inner()
    }
}
