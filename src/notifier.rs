//! Reclaim notification channels for the owning cache's cleanup loop.

use crate::collector::{ReferenceId, Subscription};
use crate::strength::EntryConfig;
use crossbeam_channel::{unbounded, Receiver, Sender, TryRecvError};

/// Posted when the collector reclaims a soft or weak referent.
///
/// `id` matches `PairEntryReference::key_id`/`value_id` of the slot that held
/// the referent; `hash` is the reference's reported hash, so the owner can
/// locate the slot's bucket without scanning.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Reclaimed {
    pub id: ReferenceId,
    pub hash: u64,
}

/// One unbounded queue of `Reclaimed` records.
#[derive(Debug)]
pub struct ReclaimChannel {
    tx: Sender<Reclaimed>,
    rx: Receiver<Reclaimed>,
}

impl ReclaimChannel {
    fn new() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx }
    }

    pub(crate) fn subscribe(&self, hash: u64) -> Subscription {
        Subscription {
            sender: self.tx.clone(),
            hash,
        }
    }

    /// Pop one record without blocking.
    pub fn try_recv(&self) -> Option<Reclaimed> {
        match self.rx.try_recv() {
            Ok(r) => Some(r),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Take every record queued so far.
    pub fn drain(&self) -> Vec<Reclaimed> {
        self.rx.try_iter().collect()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

/// Per-side notification channels for one entry configuration. A side only
/// has a channel when its strength is collectible.
#[derive(Debug)]
pub struct ReclaimNotifier {
    keys: Option<ReclaimChannel>,
    values: Option<ReclaimChannel>,
}

impl ReclaimNotifier {
    pub fn new(config: &EntryConfig) -> Self {
        Self {
            keys: config.has_collectible_keys().then(ReclaimChannel::new),
            values: config.has_collectible_values().then(ReclaimChannel::new),
        }
    }

    pub fn key_channel(&self) -> Option<&ReclaimChannel> {
        self.keys.as_ref()
    }

    pub fn value_channel(&self) -> Option<&ReclaimChannel> {
        self.values.as_ref()
    }

    pub fn has_collectible_keys(&self) -> bool {
        self.keys.is_some()
    }

    pub fn has_collectible_values(&self) -> bool {
        self.values.is_some()
    }
}
