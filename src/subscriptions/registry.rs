//! Concurrent subscription registry keyed by event type.
//!
//! Each event type owns a bucket holding an immutable, insertion-ordered
//! slice of subscriptions. Writers replace the whole bucket (copy-on-write)
//! while holding the shard lock for that key; readers clone the current
//! `Arc` and iterate it without any lock.

use crate::token::Token;
use crate::types::{EventType, PublicationMode, SubscriptionId};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::ops::Deref;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::types::{HandlerRef, Predicate, Subscription};

type Bucket = Arc<[Arc<Subscription>]>;

/// Point-in-time, insertion-ordered view of the subscriptions for one event type.
///
/// Later adds and removes never show up in a snapshot that was already taken.
#[derive(Clone, Debug)]
pub struct Snapshot {
    subscriptions: Bucket,
}

impl Snapshot {
    fn empty() -> Self {
        Self {
            subscriptions: Arc::from(Vec::new()),
        }
    }

    /// Subscription ids in delivery order.
    pub fn ids(&self) -> Vec<SubscriptionId> {
        self.subscriptions.iter().map(|s| s.id()).collect()
    }
}

impl Deref for Snapshot {
    type Target = [Arc<Subscription>];

    fn deref(&self) -> &Self::Target {
        &self.subscriptions
    }
}

/// Maps event types to their active subscriptions.
///
/// Rebuilding a bucket is linear in its size and happens under the shard
/// write lock, so a large add or prune can briefly delay `snapshot_for` on
/// other event types that hash to the same shard.
pub struct SubscriptionRegistry {
    buckets: DashMap<EventType, Bucket>,
    /// Counter for generating subscription ids.
    next_id: AtomicU64,
}

impl SubscriptionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            buckets: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a handler under `event_type` and return its token.
    pub(crate) fn add(
        self: &Arc<Self>,
        event_type: EventType,
        handler: HandlerRef,
        mode: PublicationMode,
        predicate: Option<Predicate>,
    ) -> Token {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let subscription = Arc::new(Subscription::new(id, event_type, handler, mode, predicate));

        match self.buckets.entry(event_type) {
            Entry::Occupied(mut entry) => {
                let next: Bucket = entry
                    .get()
                    .iter()
                    .cloned()
                    .chain(std::iter::once(subscription))
                    .collect();
                entry.insert(next);
            }
            Entry::Vacant(entry) => {
                entry.insert(Arc::from(vec![subscription]));
            }
        }

        Token::new(id, event_type, Arc::downgrade(self))
    }

    /// Remove the subscription behind `token`.
    ///
    /// Returns false if the token was already used, belongs to another
    /// registry, or its subscription is gone.
    pub fn remove(&self, token: &Token) -> bool {
        if !token.belongs_to(self) || !token.release() {
            return false;
        }
        self.remove_id(token.event_type(), token.id())
    }

    /// Remove a subscription by id. Unknown ids are a no-op.
    pub(crate) fn remove_id(&self, event_type: EventType, id: SubscriptionId) -> bool {
        self.prune(event_type, &[id]) > 0
    }

    /// Remove every listed subscription of one event type, returning how many were present.
    pub(crate) fn prune(&self, event_type: EventType, ids: &[SubscriptionId]) -> usize {
        let Entry::Occupied(mut entry) = self.buckets.entry(event_type) else {
            return 0;
        };

        let before = entry.get().len();
        let next: Bucket = entry
            .get()
            .iter()
            .filter(|s| !ids.contains(&s.id()))
            .cloned()
            .collect();
        let removed = before - next.len();

        if next.is_empty() {
            entry.remove();
        } else if removed > 0 {
            entry.insert(next);
        }
        removed
    }

    /// Current subscriptions for `event_type`, in insertion order.
    pub fn snapshot_for(&self, event_type: EventType) -> Snapshot {
        self.buckets
            .get(&event_type)
            .map(|bucket| Snapshot {
                subscriptions: Arc::clone(bucket.value()),
            })
            .unwrap_or_else(Snapshot::empty)
    }

    /// Whether a subscription with this id is still registered.
    pub fn contains(&self, event_type: EventType, id: SubscriptionId) -> bool {
        self.buckets
            .get(&event_type)
            .map_or(false, |bucket| bucket.iter().any(|s| s.id() == id))
    }

    /// Total number of subscriptions across all event types.
    pub fn len(&self) -> usize {
        self.buckets.iter().map(|bucket| bucket.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Number of subscriptions for one event type.
    pub fn len_for(&self, event_type: EventType) -> usize {
        self.buckets.get(&event_type).map_or(0, |bucket| bucket.len())
    }

    /// Drop every subscription. Snapshots already taken are unaffected.
    pub fn clear(&self) -> usize {
        let removed = self.len();
        self.buckets.clear();
        removed
    }
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
