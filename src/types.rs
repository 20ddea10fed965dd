//! Core types for the event hub.

use crate::error::HubError;
use serde::{Deserialize, Serialize};
use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// Marker for values that can be published through an [`EventHub`](crate::EventHub).
///
/// Carries no required fields. Events are matched by their exact Rust type:
/// a handler registered for `A` never sees a `B`, whatever the relationship
/// between the two types.
pub trait Event: Any + Send + Sync {}

/// Identity of a declared event kind, used as the registry key.
///
/// Equality and hashing use only the [`TypeId`]; the name is kept for logs
/// and error messages.
#[derive(Clone, Copy)]
pub struct EventType {
    id: TypeId,
    name: &'static str,
}

impl EventType {
    /// The event type of `E`.
    pub fn of<E: Event>() -> Self {
        Self {
            id: TypeId::of::<E>(),
            name: std::any::type_name::<E>(),
        }
    }

    /// Fully qualified Rust type name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn id(&self) -> TypeId {
        self.id
    }
}

impl PartialEq for EventType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for EventType {}

impl Hash for EventType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventType({})", self.name)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Unique identifier for a subscription. Never reused within one hub.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(pub u64);

impl fmt::Debug for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SubscriptionId({})", self.0)
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Where a matched handler runs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublicationMode {
    /// Inline on the publishing thread; `publish` waits for the handler.
    #[default]
    CallingThread,
    /// Submitted to the background worker pool.
    BackgroundThread,
    /// Queued on the designated serial main context, in submission order.
    MainThread,
}

impl PublicationMode {
    pub const ALL: [PublicationMode; 3] = [
        PublicationMode::CallingThread,
        PublicationMode::BackgroundThread,
        PublicationMode::MainThread,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PublicationMode::CallingThread => "calling_thread",
            PublicationMode::BackgroundThread => "background_thread",
            PublicationMode::MainThread => "main_thread",
        }
    }
}

impl fmt::Display for PublicationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PublicationMode {
    type Err = HubError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        PublicationMode::ALL
            .into_iter()
            .find(|mode| mode.as_str() == normalized)
            .ok_or_else(|| HubError::UnknownPublicationMode(s.to_string()))
    }
}
