//! PairEntryReference: a cache slot's key and value references plus the
//! slot's lifecycle.
//!
//! Lifecycle
//! - Live: participates in the hash table and the eviction policy. The pair
//!   counts as alive once its key reference is populated.
//! - Retired: unlinked from the hash table, still tracked by the eviction
//!   policy until physically cleaned up.
//! - Dead: gone from everything. Terminal.
//!
//! ```text
//!   new ──set_key──▶ Live ──retire──▶ Retired ──die──▶ Dead
//!                     └──────────────die──────────────▶
//! ```
//!
//! The state is an explicit tag next to the reference fields. Mutation goes
//! through `&mut self`; the owning table provides bucket-level exclusion, and
//! with it cross-thread visibility of every write. Collection of a soft or
//! weak side happens outside that exclusion, so reads of `get_key`/`get_value`
//! may turn up empty at any time.

use crate::collector::{Collector, ReferenceId};
use crate::error::{ReferenceError, Result};
use crate::notifier::{ReclaimChannel, ReclaimNotifier};
use crate::reference::ManagedReference;
use crate::strength::{EntryConfig, ReferenceStrength};
use core::fmt;
use core::hash::{Hash, Hasher};
use std::sync::Arc;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Lifecycle {
    Live,
    Retired,
    Dead,
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Lifecycle::Live => "live",
            Lifecycle::Retired => "retired",
            Lifecycle::Dead => "dead",
        })
    }
}

pub struct PairEntryReference<K, V> {
    config: EntryConfig,
    collector: Arc<Collector>,
    key: Option<ManagedReference<K>>,
    value: Option<ManagedReference<V>>,
    state: Lifecycle,
}

impl<K, V> PairEntryReference<K, V>
where
    K: Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    /// Empty pair whose collectible sides live in the global collector.
    pub fn new(config: EntryConfig) -> Self {
        Self::with_collector(config, Collector::global())
    }

    pub fn with_collector(config: EntryConfig, collector: Arc<Collector>) -> Self {
        Self {
            config,
            collector,
            key: None,
            value: None,
            state: Lifecycle::Live,
        }
    }

    fn hold<T>(
        &self,
        referent: Arc<T>,
        strength: ReferenceStrength,
        channel: Option<&ReclaimChannel>,
    ) -> ManagedReference<T>
    where
        T: Send + Sync + 'static,
    {
        if strength.is_collectible() {
            ManagedReference::collectible(referent, strength, &self.collector, channel, None)
        } else {
            ManagedReference::mutable(referent)
        }
    }

    fn ensure_live(&self) -> Result<()> {
        match self.state {
            Lifecycle::Live => Ok(()),
            state => Err(ReferenceError::Inactive { state }),
        }
    }

    /// Hold `key` with the configured key strength, clearing any previous
    /// key reference. Collection of a soft/weak key is posted to the
    /// notifier's key channel, if one is given.
    ///
    /// A soft or weak key stays reachable for as long as the caller keeps a
    /// clone of the `Arc` it passed in.
    pub fn set_key(
        &mut self,
        key: impl Into<Option<Arc<K>>>,
        notifier: Option<&ReclaimNotifier>,
    ) -> Result<()> {
        let key = key
            .into()
            .ok_or(ReferenceError::InvalidArgument("key must be present"))?;
        self.ensure_live()?;
        let channel = notifier.and_then(ReclaimNotifier::key_channel);
        let reference = self.hold(key, self.config.key_strength(), channel);
        if let Some(mut previous) = self.key.replace(reference) {
            previous.clear();
        }
        Ok(())
    }

    /// Hold `value` with the configured value strength, clearing any
    /// previous value reference.
    pub fn set_value(
        &mut self,
        value: impl Into<Option<Arc<V>>>,
        notifier: Option<&ReclaimNotifier>,
    ) -> Result<()> {
        let value = value
            .into()
            .ok_or(ReferenceError::InvalidArgument("value must be present"))?;
        self.ensure_live()?;
        let channel = notifier.and_then(ReclaimNotifier::value_channel);
        let reference = self.hold(value, self.config.value_strength(), channel);
        if let Some(mut previous) = self.value.replace(reference) {
            previous.clear();
        }
        Ok(())
    }

    pub fn get_key(&self) -> Option<Arc<K>> {
        self.key.as_ref()?.get()
    }

    pub fn get_value(&self) -> Option<Arc<V>> {
        self.value.as_ref()?.get()
    }

    fn clear(&mut self) {
        if let Some(mut k) = self.key.take() {
            k.clear();
        }
        if let Some(mut v) = self.value.take() {
            v.clear();
        }
    }

    /// Unlink from the table. A strong-valued pair drops only its key; any
    /// other pair drops both sides. No effect on a dead pair.
    pub fn retire(&mut self) {
        if self.state == Lifecycle::Dead {
            return;
        }
        if self.config.value_strength() == ReferenceStrength::Strong {
            if let Some(mut k) = self.key.take() {
                k.clear();
            }
        } else {
            self.clear();
        }
        self.state = Lifecycle::Retired;
    }

    /// Discard both sides. Terminal and idempotent.
    pub fn die(&mut self) {
        self.clear();
        self.state = Lifecycle::Dead;
    }
}

impl<K, V> PairEntryReference<K, V> {
    #[inline]
    pub fn is_alive(&self) -> bool {
        self.state == Lifecycle::Live && self.key.is_some()
    }

    #[inline]
    pub fn is_retired(&self) -> bool {
        self.state == Lifecycle::Retired
    }

    #[inline]
    pub fn is_dead(&self) -> bool {
        self.state == Lifecycle::Dead
    }

    /// The lifecycle tag. A pair starts out `Live` before its key is set,
    /// so use `is_alive` to ask whether it holds a key.
    #[inline]
    pub fn lifecycle(&self) -> Lifecycle {
        self.state
    }

    pub fn config(&self) -> EntryConfig {
        self.config
    }

    pub fn key_strength(&self) -> ReferenceStrength {
        self.config.key_strength()
    }

    pub fn value_strength(&self) -> ReferenceStrength {
        self.config.value_strength()
    }

    pub fn is_strong_key(&self) -> bool {
        self.key_strength() == ReferenceStrength::Strong
    }

    pub fn is_strong_value(&self) -> bool {
        self.value_strength() == ReferenceStrength::Strong
    }

    pub fn is_soft_key(&self) -> bool {
        self.key_strength() == ReferenceStrength::Soft
    }

    pub fn is_soft_value(&self) -> bool {
        self.value_strength() == ReferenceStrength::Soft
    }

    pub fn is_weak_key(&self) -> bool {
        self.key_strength() == ReferenceStrength::Weak
    }

    pub fn is_weak_value(&self) -> bool {
        self.value_strength() == ReferenceStrength::Weak
    }

    /// Collector id of a soft/weak key.
    pub fn key_id(&self) -> Option<ReferenceId> {
        self.key.as_ref()?.id()
    }

    /// Collector id of a soft/weak value.
    pub fn value_id(&self) -> Option<ReferenceId> {
        self.value.as_ref()?.id()
    }

    /// True if either side is held under `id`; used to match a `Reclaimed`
    /// record to its slot.
    pub fn holds(&self, id: ReferenceId) -> bool {
        self.key_id() == Some(id) || self.value_id() == Some(id)
    }
}

impl<K, V> PartialEq for PairEntryReference<K, V>
where
    K: Send + Sync + 'static,
    V: PartialEq + Send + Sync + 'static,
{
    fn eq(&self, other: &Self) -> bool {
        if core::ptr::eq(self, other) {
            return true;
        }
        match (&self.value, &other.value) {
            (Some(a), Some(b)) => a.equals_by_referent(b),
            _ => false,
        }
    }
}

impl<K, V> Hash for PairEntryReference<K, V>
where
    K: Send + Sync + 'static,
    V: Hash + Send + Sync + 'static,
{
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.value.as_ref().map_or(0, |v| v.hash_by_referent()));
    }
}

impl<K, V> fmt::Display for PairEntryReference<K, V>
where
    V: fmt::Display + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(v) => fmt::Display::fmt(v, f),
            None => f.write_str("<cleared>"),
        }
    }
}

impl<K, V> fmt::Debug for PairEntryReference<K, V>
where
    K: fmt::Debug + Send + Sync + 'static,
    V: fmt::Debug + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PairEntryReference")
            .field("state", &self.state)
            .field("config", &self.config)
            .field("key", &self.key)
            .field("value", &self.value)
            .finish()
    }
}
