//! Subscription tokens.
//!
//! A [`Token`] is the only handle that can cancel a subscription. Tokens hold
//! the registry weakly, so keeping a token around never keeps a hub alive, and
//! dropping a token leaves its subscription in place.

use crate::subscriptions::SubscriptionRegistry;
use crate::types::{EventType, SubscriptionId};
use parking_lot::Mutex;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Weak;
use tracing::debug;

/// Handle to one subscription, returned by the `subscribe_for_token*` family.
pub struct Token {
    id: SubscriptionId,
    event_type: EventType,
    registry: Weak<SubscriptionRegistry>,
    subscribed: AtomicBool,
}

impl Token {
    pub(crate) fn new(
        id: SubscriptionId,
        event_type: EventType,
        registry: Weak<SubscriptionRegistry>,
    ) -> Self {
        Self {
            id,
            event_type,
            registry,
            subscribed: AtomicBool::new(true),
        }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    /// Cancel the subscription.
    ///
    /// Returns true only for the call that actually removed it. Deliveries
    /// already dispatched still run.
    pub fn unsubscribe(&self) -> bool {
        match self.registry.upgrade() {
            Some(registry) => registry.remove(self),
            None => {
                self.release();
                false
            }
        }
    }

    /// Whether the subscription is still registered.
    ///
    /// False after `unsubscribe`, after the hub was cleared, or once the hub
    /// has been dropped.
    pub fn is_subscribed(&self) -> bool {
        if !self.subscribed.load(Ordering::Acquire) {
            return false;
        }
        self.registry
            .upgrade()
            .map_or(false, |registry| registry.contains(self.event_type, self.id))
    }

    /// Flip the token to unsubscribed. Returns whether this call did it.
    pub(crate) fn release(&self) -> bool {
        self.subscribed.swap(false, Ordering::AcqRel)
    }

    pub(crate) fn belongs_to(&self, registry: &SubscriptionRegistry) -> bool {
        std::ptr::eq(self.registry.as_ptr(), registry)
    }
}

impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.registry.ptr_eq(&other.registry)
    }
}

impl Eq for Token {}

impl Hash for Token {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("id", &self.id)
            .field("event_type", &self.event_type)
            .field("subscribed", &self.subscribed.load(Ordering::Relaxed))
            .finish()
    }
}

/// A group of tokens cancelled together.
///
/// Once the group itself is unsubscribed it stays closed: tokens added later
/// are cancelled immediately.
pub struct CompositeToken {
    /// `None` once the group was unsubscribed.
    tokens: Mutex<Option<Vec<Token>>>,
}

impl CompositeToken {
    pub fn new() -> Self {
        Self {
            tokens: Mutex::new(Some(Vec::new())),
        }
    }

    /// Take ownership of `token`. Returns false if it was not kept, either
    /// because it is no longer subscribed or because the group is closed.
    pub fn add(&self, token: Token) -> bool {
        let mut tokens = self.tokens.lock();
        match tokens.as_mut() {
            Some(tokens) if token.is_subscribed() => {
                tokens.push(token);
                true
            }
            Some(_) => false,
            None => {
                token.unsubscribe();
                false
            }
        }
    }

    /// Remove one token from the group and cancel it.
    pub fn remove(&self, id: SubscriptionId) -> bool {
        let removed = {
            let mut tokens = self.tokens.lock();
            tokens.as_mut().and_then(|tokens| {
                let index = tokens.iter().position(|t| t.id() == id)?;
                Some(tokens.remove(index))
            })
        };

        match removed {
            Some(token) => {
                token.unsubscribe();
                true
            }
            None => false,
        }
    }

    /// Cancel every token in the group. Returns false if it was already closed.
    pub fn unsubscribe(&self) -> bool {
        let Some(tokens) = self.tokens.lock().take() else {
            return false;
        };

        let cancelled = tokens.iter().filter(|token| token.unsubscribe()).count();
        debug!(tokens = tokens.len(), cancelled, "composite token unsubscribed");
        true
    }

    /// True until the group is unsubscribed.
    pub fn is_subscribed(&self) -> bool {
        self.tokens.lock().is_some()
    }

    /// True while the group is open and holds at least one token.
    pub fn has_subscriptions(&self) -> bool {
        self.tokens
            .lock()
            .as_ref()
            .map_or(false, |tokens| !tokens.is_empty())
    }

    pub fn len(&self) -> usize {
        self.tokens.lock().as_ref().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for CompositeToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CompositeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeToken")
            .field("subscribed", &self.is_subscribed())
            .field("len", &self.len())
            .finish()
    }
}
