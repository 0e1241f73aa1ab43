//! Collector: generation-tagged slot table backing soft and weak references.
//!
//! Rust has no tracing garbage collector, so referents of collectible
//! references live here instead. Each referent occupies one slot of a
//! `SlotMap`; the `ReferenceId` handed back carries the slot's generation.
//! Releasing or collecting a slot bumps its generation, so a stale id never
//! resolves again, even when the physical slot is reused. That gives the
//! "may become empty at any time, never resurrects" contract.
//!
//! Reachability is judged by `Arc` strong counts: a referent whose only
//! strong handle is the collector's own is unreachable and may be reclaimed.
//! Readers that got an `Arc` out of `get` keep the referent alive for as long
//! as they hold it.
//!
//! Referents are dropped after the table lock is released, so `Drop` impls
//! of user types may call back into the collector.

use crate::notifier::Reclaimed;
use crate::strength::ReferenceStrength;
use crossbeam_channel::Sender;
use parking_lot::Mutex;
use slotmap::{DefaultKey, SlotMap};
use std::any::Any;
use std::sync::{Arc, OnceLock};
use tracing::{debug, trace};

/// Stable, generational identity of a collectible referent.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct ReferenceId(DefaultKey);

impl ReferenceId {
    pub(crate) fn new(k: DefaultKey) -> Self {
        ReferenceId(k)
    }
    pub(crate) fn raw_key(&self) -> DefaultKey {
        self.0
    }
}

/// Which referents a collection pass may reclaim.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum CollectionKind {
    /// Unreachable weak referents only.
    Minor,
    /// Unreachable weak and soft referents (memory pressure).
    Full,
}

impl CollectionKind {
    #[inline]
    fn reclaims(self, strength: ReferenceStrength) -> bool {
        match strength {
            ReferenceStrength::Weak => true,
            ReferenceStrength::Soft => self == CollectionKind::Full,
            ReferenceStrength::Strong => false,
        }
    }
}

/// Where to post a `Reclaimed` record when the slot is collected.
pub(crate) struct Subscription {
    pub(crate) sender: Sender<Reclaimed>,
    pub(crate) hash: u64,
}

struct Slot {
    referent: Arc<dyn Any + Send + Sync>,
    strength: ReferenceStrength,
    subscription: Option<Subscription>,
}

pub struct Collector {
    slots: Mutex<SlotMap<DefaultKey, Slot>>,
}

impl Default for Collector {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for Collector {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Collector").field("live", &self.len()).finish()
    }
}

impl Collector {
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(SlotMap::with_key()),
        }
    }

    /// Process-wide collector shared by pairs built without an explicit one.
    pub fn global() -> Arc<Collector> {
        static GLOBAL: OnceLock<Arc<Collector>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(Collector::new())))
    }

    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.lock().is_empty()
    }

    /// True while `id` still resolves to a live slot.
    pub fn contains(&self, id: ReferenceId) -> bool {
        self.slots.lock().contains_key(id.raw_key())
    }

    pub(crate) fn register<T>(
        &self,
        referent: Arc<T>,
        strength: ReferenceStrength,
        subscription: Option<Subscription>,
    ) -> ReferenceId
    where
        T: Any + Send + Sync,
    {
        debug_assert!(strength.is_collectible());
        let slot = Slot {
            referent,
            strength,
            subscription,
        };
        ReferenceId::new(self.slots.lock().insert(slot))
    }

    /// Resolve `id` to its referent. `None` once released or collected, or
    /// if the slot holds a different type.
    pub fn get<T>(&self, id: ReferenceId) -> Option<Arc<T>>
    where
        T: Any + Send + Sync,
    {
        let referent = self
            .slots
            .lock()
            .get(id.raw_key())
            .map(|s| Arc::clone(&s.referent))?;
        referent.downcast::<T>().ok()
    }

    /// Drop the slot without posting a notification. Returns whether the
    /// slot was still live.
    pub fn release(&self, id: ReferenceId) -> bool {
        let removed = self.slots.lock().remove(id.raw_key());
        removed.is_some()
    }

    /// Reclaim every unreachable referent `kind` allows and post the
    /// subscribed notifications. Returns the number of reclaimed slots.
    pub fn collect(&self, kind: CollectionKind) -> usize {
        let reclaimed: Vec<(DefaultKey, Slot)> = {
            let mut slots = self.slots.lock();
            let doomed: Vec<DefaultKey> = slots
                .iter()
                .filter(|(_, s)| kind.reclaims(s.strength) && Arc::strong_count(&s.referent) == 1)
                .map(|(k, _)| k)
                .collect();
            doomed
                .into_iter()
                .filter_map(|k| slots.remove(k).map(|s| (k, s)))
                .collect()
        };

        let mut posted = 0usize;
        for (k, slot) in &reclaimed {
            let Some(sub) = &slot.subscription else {
                continue;
            };
            let record = Reclaimed {
                id: ReferenceId::new(*k),
                hash: sub.hash,
            };
            if sub.sender.send(record).is_ok() {
                posted += 1;
            } else {
                trace!(id = ?k, "reclaim channel disconnected; notification dropped");
            }
        }

        let count = reclaimed.len();
        // User Drop impls run here, outside the lock.
        drop(reclaimed);
        debug!(?kind, reclaimed = count, posted, live = self.len(), "collection pass");
        count
    }
}
