//! ManagedReference: one referent held with a given strength.
//!
//! A single type covers every holding mode; the mode is data, not a type
//! hierarchy:
//!
//! | constructor       | strength    | hash strategy | `clear()`           |
//! |-------------------|-------------|---------------|---------------------|
//! | `fixed`           | Strong      | Equality      | ignored             |
//! | `mutable`         | Strong      | Equality      | drops the referent  |
//! | `strong_tagged`   | Strong      | Identity      | drops the referent  |
//! | `collectible`     | Soft / Weak | Identity      | releases the slot   |
//!
//! Identity-hashed references compute their hash once at construction, so the
//! reported hash stays stable after the referent is cleared or collected.
//!
//! Once a reference reports empty it stays empty: strong variants never
//! refill their field and collectible ones hold a generational id that no
//! later slot can match.

use crate::collector::{Collector, ReferenceId};
use crate::notifier::ReclaimChannel;
use crate::strength::ReferenceStrength;
use core::fmt;
use core::hash::{Hash, Hasher};
use rustc_hash::FxHasher;
use std::sync::Arc;

/// How a reference computes `hash_by_referent`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum HashStrategy {
    /// Hash of the referent's value.
    Equality,
    /// Caller-supplied code, or one derived from the referent's address.
    Identity,
}

enum Holder<T> {
    Fixed(Arc<T>),
    Mutable(Option<Arc<T>>),
    Strong {
        referent: Option<Arc<T>>,
        hash: u64,
    },
    Collectible {
        collector: Arc<Collector>,
        id: Option<ReferenceId>,
        strength: ReferenceStrength,
        hash: u64,
    },
}

pub struct ManagedReference<T> {
    holder: Holder<T>,
}

pub(crate) fn referent_hash<T: Hash + ?Sized>(value: &T) -> u64 {
    let mut h = FxHasher::default();
    value.hash(&mut h);
    h.finish()
}

pub(crate) fn identity_hash<T>(referent: &Arc<T>) -> u64 {
    let mut h = FxHasher::default();
    (Arc::as_ptr(referent) as *const () as usize).hash(&mut h);
    h.finish()
}

impl<T> ManagedReference<T>
where
    T: Send + Sync + 'static,
{
    /// Immutable strong reference; `clear()` has no effect.
    pub fn fixed(referent: Arc<T>) -> Self {
        Self {
            holder: Holder::Fixed(referent),
        }
    }

    /// Strong reference that `clear()` empties.
    pub fn mutable(referent: Arc<T>) -> Self {
        Self {
            holder: Holder::Mutable(Some(referent)),
        }
    }

    /// Strong reference reporting `hash` (or an identity hash) instead of the
    /// referent's own. For referents whose value hash is not stable.
    pub fn strong_tagged(referent: Arc<T>, hash: Option<u64>) -> Self {
        let hash = hash.unwrap_or_else(|| identity_hash(&referent));
        Self {
            holder: Holder::Strong {
                referent: Some(referent),
                hash,
            },
        }
    }

    /// Soft or weak reference whose referent lives in `collector`. When the
    /// collector reclaims it, a `Reclaimed` record goes to `channel` if given.
    ///
    /// A `Strong` strength builds a `strong_tagged` reference instead.
    pub fn collectible(
        referent: Arc<T>,
        strength: ReferenceStrength,
        collector: &Arc<Collector>,
        channel: Option<&ReclaimChannel>,
        hash: Option<u64>,
    ) -> Self {
        if !strength.is_collectible() {
            return Self::strong_tagged(referent, hash);
        }
        let hash = hash.unwrap_or_else(|| identity_hash(&referent));
        let subscription = channel.map(|ch| ch.subscribe(hash));
        let id = collector.register(referent, strength, subscription);
        Self {
            holder: Holder::Collectible {
                collector: Arc::clone(collector),
                id: Some(id),
                strength,
                hash,
            },
        }
    }

    /// The referent, or `None` once cleared or collected. For collectible
    /// references the answer can change between calls.
    pub fn get(&self) -> Option<Arc<T>> {
        match &self.holder {
            Holder::Fixed(r) => Some(Arc::clone(r)),
            Holder::Mutable(r) | Holder::Strong { referent: r, .. } => r.clone(),
            Holder::Collectible { collector, id, .. } => collector.get::<T>((*id)?),
        }
    }

    /// Empty the reference permanently. Idempotent.
    pub fn clear(&mut self) {
        match &mut self.holder {
            Holder::Fixed(_) => {}
            Holder::Mutable(r) | Holder::Strong { referent: r, .. } => {
                r.take();
            }
            Holder::Collectible { collector, id, .. } => {
                if let Some(id) = id.take() {
                    collector.release(id);
                }
            }
        }
    }

    pub fn is_cleared(&self) -> bool {
        match &self.holder {
            Holder::Fixed(_) => false,
            Holder::Mutable(r) | Holder::Strong { referent: r, .. } => r.is_none(),
            Holder::Collectible { collector, id, .. } => {
                id.map_or(true, |id| !collector.contains(id))
            }
        }
    }
}

impl<T> ManagedReference<T> {
    pub fn strength(&self) -> ReferenceStrength {
        match &self.holder {
            Holder::Collectible { strength, .. } => *strength,
            _ => ReferenceStrength::Strong,
        }
    }

    pub fn hash_strategy(&self) -> HashStrategy {
        match &self.holder {
            Holder::Fixed(_) | Holder::Mutable(_) => HashStrategy::Equality,
            Holder::Strong { .. } | Holder::Collectible { .. } => HashStrategy::Identity,
        }
    }

    fn identity_code(&self) -> Option<u64> {
        match &self.holder {
            Holder::Strong { hash, .. } | Holder::Collectible { hash, .. } => Some(*hash),
            _ => None,
        }
    }

    /// Collector slot id; `None` for strong references and after `clear()`.
    pub fn id(&self) -> Option<ReferenceId> {
        match &self.holder {
            Holder::Collectible { id, .. } => *id,
            _ => None,
        }
    }
}

impl<T> ManagedReference<T>
where
    T: PartialEq + Send + Sync + 'static,
{
    /// True if `other` is this very reference, or both are populated and
    /// their referents match under the shared hash strategy: equal values for
    /// `Equality`, the same allocation and the same code for `Identity`. Two
    /// cleared references are never equal to each other.
    ///
    /// Equal references always report equal `hash_by_referent` codes.
    pub fn equals_by_referent(&self, other: &ManagedReference<T>) -> bool {
        if core::ptr::eq(self, other) {
            return true;
        }
        let (Some(a), Some(b)) = (self.get(), other.get()) else {
            return false;
        };
        match (self.hash_strategy(), other.hash_strategy()) {
            (HashStrategy::Equality, HashStrategy::Equality) => Arc::ptr_eq(&a, &b) || *a == *b,
            (HashStrategy::Identity, HashStrategy::Identity) => {
                Arc::ptr_eq(&a, &b) && self.identity_code() == other.identity_code()
            }
            _ => false,
        }
    }
}

impl<T> ManagedReference<T>
where
    T: Hash + Send + Sync + 'static,
{
    /// Equality-hashed references hash the referent (0 once cleared);
    /// identity-hashed references report their fixed code.
    pub fn hash_by_referent(&self) -> u64 {
        match &self.holder {
            Holder::Fixed(r) => referent_hash(&**r),
            Holder::Mutable(r) => r.as_deref().map_or(0, referent_hash),
            Holder::Strong { hash, .. } | Holder::Collectible { hash, .. } => *hash,
        }
    }
}

impl<T> fmt::Display for ManagedReference<T>
where
    T: fmt::Display + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.get() {
            Some(r) => fmt::Display::fmt(&*r, f),
            None => f.write_str("<cleared>"),
        }
    }
}

impl<T> fmt::Debug for ManagedReference<T>
where
    T: fmt::Debug + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedReference")
            .field("strength", &self.strength())
            .field("hash_strategy", &self.hash_strategy())
            .field("referent", &self.get())
            .finish()
    }
}

impl<T> Drop for ManagedReference<T> {
    fn drop(&mut self) {
        if let Holder::Collectible { collector, id, .. } = &mut self.holder {
            if let Some(id) = id.take() {
                collector.release(id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::CollectionKind;
    use crate::notifier::ReclaimNotifier;
    use crate::strength::EntryConfig;

    fn weak(value: &str, c: &Arc<Collector>) -> ManagedReference<String> {
        ManagedReference::collectible(
            Arc::new(value.to_string()),
            ReferenceStrength::Weak,
            c,
            None,
            None,
        )
    }

    /// Invariant: the immutable variant ignores `clear()`.
    #[test]
    fn fixed_ignores_clear() {
        let mut r = ManagedReference::fixed(Arc::new(5u32));
        r.clear();
        assert_eq!(r.get().as_deref(), Some(&5));
        assert!(!r.is_cleared());
        assert_eq!(r.hash_strategy(), HashStrategy::Equality);
    }

    /// Invariant: after `clear()` every variant except `fixed` reads empty,
    /// and repeated clears are harmless.
    #[test]
    fn clear_is_permanent_and_idempotent() {
        let c = Arc::new(Collector::new());
        let mut refs = vec![
            ManagedReference::mutable(Arc::new("a".to_string())),
            ManagedReference::strong_tagged(Arc::new("b".to_string()), None),
            weak("c", &c),
            ManagedReference::collectible(
                Arc::new("d".to_string()),
                ReferenceStrength::Soft,
                &c,
                None,
                None,
            ),
        ];
        for r in refs.iter_mut() {
            assert!(r.get().is_some());
            r.clear();
            assert!(r.get().is_none());
            assert!(r.is_cleared());
            r.clear();
            assert!(r.get().is_none());
        }
        assert!(c.is_empty(), "cleared collectible references release their slots");
    }

    /// Invariant: strengths and hash strategies follow the constructor.
    #[test]
    fn strength_and_strategy_tags() {
        let c = Arc::new(Collector::new());
        assert_eq!(
            ManagedReference::mutable(Arc::new(1)).strength(),
            ReferenceStrength::Strong
        );
        let s = ManagedReference::strong_tagged(Arc::new(1), Some(9));
        assert_eq!(s.strength(), ReferenceStrength::Strong);
        assert_eq!(s.hash_strategy(), HashStrategy::Identity);
        assert!(s.id().is_none());

        let w = weak("w", &c);
        assert_eq!(w.strength(), ReferenceStrength::Weak);
        assert_eq!(w.hash_strategy(), HashStrategy::Identity);
        assert!(w.id().is_some());

        let downgraded =
            ManagedReference::collectible(Arc::new(3), ReferenceStrength::Strong, &c, None, None);
        assert_eq!(downgraded.strength(), ReferenceStrength::Strong);
        assert!(downgraded.id().is_none());
    }

    /// Invariant: equality holds for equal populated referents and for the
    /// same reference object; a cleared side is never equal to another reference.
    #[test]
    fn equality_by_referent() {
        let a = ManagedReference::mutable(Arc::new("x".to_string()));
        let mut b = ManagedReference::fixed(Arc::new("x".to_string()));
        let other = ManagedReference::mutable(Arc::new("y".to_string()));
        assert!(a.equals_by_referent(&b));
        assert!(!a.equals_by_referent(&other));

        let mut cleared = ManagedReference::mutable(Arc::new("x".to_string()));
        cleared.clear();
        assert!(!a.equals_by_referent(&cleared));
        assert!(cleared.equals_by_referent(&cleared), "same object");

        b = ManagedReference::mutable(Arc::new("x".to_string()));
        b.clear();
        assert!(!b.equals_by_referent(&cleared), "two cleared references differ");
    }

    /// Invariant: identity-hashed references are equal only when they share
    /// the referent allocation and the code; equal values are not enough.
    #[test]
    fn identity_equality_is_by_allocation() {
        let c = Arc::new(Collector::new());
        let a = ManagedReference::strong_tagged(Arc::new(5u32), None);
        let b = ManagedReference::strong_tagged(Arc::new(5u32), None);
        assert!(!a.equals_by_referent(&b));

        let shared = Arc::new(5u32);
        let s1 = ManagedReference::strong_tagged(Arc::clone(&shared), None);
        let s2 = ManagedReference::strong_tagged(Arc::clone(&shared), None);
        assert!(s1.equals_by_referent(&s2));
        let other_code = ManagedReference::strong_tagged(Arc::clone(&shared), Some(1));
        assert!(!s1.equals_by_referent(&other_code));

        let w1 = weak("same", &c);
        let w2 = weak("same", &c);
        assert!(!w1.equals_by_referent(&w2));

        let held = Arc::new("same".to_string());
        let soft = ManagedReference::collectible(
            Arc::clone(&held),
            ReferenceStrength::Soft,
            &c,
            None,
            None,
        );
        let tagged = ManagedReference::strong_tagged(Arc::clone(&held), None);
        assert!(soft.equals_by_referent(&tagged));
        assert_eq!(soft.hash_by_referent(), tagged.hash_by_referent());

        let by_value = ManagedReference::mutable(Arc::clone(&held));
        assert!(!by_value.equals_by_referent(&tagged), "strategies differ");
    }

    /// Invariant: for every pair of holding modes, equal references report
    /// equal hash codes.
    #[test]
    fn equal_references_hash_equally() {
        let c = Arc::new(Collector::new());
        let shared = Arc::new("v".to_string());
        let build = |mode: usize, referent: Arc<String>| match mode {
            0 => ManagedReference::fixed(referent),
            1 => ManagedReference::mutable(referent),
            2 => ManagedReference::strong_tagged(referent, None),
            3 => ManagedReference::collectible(referent, ReferenceStrength::Soft, &c, None, None),
            _ => ManagedReference::collectible(referent, ReferenceStrength::Weak, &c, None, None),
        };
        for i in 0..5 {
            for j in 0..5 {
                for share in [true, false] {
                    let a = build(i, Arc::clone(&shared));
                    let b = if share {
                        build(j, Arc::clone(&shared))
                    } else {
                        build(j, Arc::new("v".to_string()))
                    };
                    if a.equals_by_referent(&b) {
                        assert_eq!(
                            a.hash_by_referent(),
                            b.hash_by_referent(),
                            "modes {i}/{j}, shared={share}"
                        );
                    }
                    assert_eq!(a.equals_by_referent(&b), b.equals_by_referent(&a));
                }
            }
        }
    }

    /// Invariant: equality-hashed references hash the value; identity-hashed
    /// references keep their code after being cleared.
    #[test]
    fn hash_by_referent_is_stable_for_identity() {
        let a = ManagedReference::fixed(Arc::new("k".to_string()));
        let b = ManagedReference::mutable(Arc::new("k".to_string()));
        assert_eq!(a.hash_by_referent(), b.hash_by_referent());

        let mut tagged = ManagedReference::strong_tagged(Arc::new("k".to_string()), Some(42));
        assert_eq!(tagged.hash_by_referent(), 42);
        tagged.clear();
        assert_eq!(tagged.hash_by_referent(), 42);

        let c = Arc::new(Collector::new());
        let mut w = weak("k", &c);
        let before = w.hash_by_referent();
        w.clear();
        assert_eq!(w.hash_by_referent(), before);
    }

    /// Invariant: a collected referent reads empty, never resurrects, and the
    /// reclaim record carries the reference's id and hash.
    #[test]
    fn collection_empties_and_notifies() {
        let c = Arc::new(Collector::new());
        let notifier = ReclaimNotifier::new(&EntryConfig::new(None, Some(ReferenceStrength::Weak)));
        let r = ManagedReference::collectible(
            Arc::new(10u64),
            ReferenceStrength::Weak,
            &c,
            notifier.value_channel(),
            Some(77),
        );
        let id = r.id().expect("collectible id");
        assert_eq!(c.collect(CollectionKind::Minor), 1);
        assert!(r.get().is_none());
        assert!(r.is_cleared());

        // A new referent may reuse the slot; the old reference must not see it.
        let _fresh = ManagedReference::collectible(
            Arc::new(11u64),
            ReferenceStrength::Weak,
            &c,
            None,
            None,
        );
        assert!(r.get().is_none());

        let ch = notifier.value_channel().expect("channel");
        assert_eq!(ch.drain(), vec![crate::notifier::Reclaimed { id, hash: 77 }]);
    }

    /// Invariant: dropping a collectible reference frees its collector slot.
    #[test]
    fn drop_releases_slot() {
        let c = Arc::new(Collector::new());
        {
            let _w = weak("gone", &c);
            assert_eq!(c.len(), 1);
        }
        assert!(c.is_empty());
    }

    /// Invariant: Display shows the referent, or a marker once cleared.
    #[test]
    fn display_by_referent() {
        let mut r = ManagedReference::mutable(Arc::new(12));
        assert_eq!(r.to_string(), "12");
        r.clear();
        assert_eq!(r.to_string(), "<cleared>");
    }
}
