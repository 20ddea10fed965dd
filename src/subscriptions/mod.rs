//! Subscription records and the registry that indexes them.
//!
//! The registry maps each [`EventType`](crate::EventType) to an ordered,
//! copy-on-write bucket of [`Subscription`]s:
//! - `add` appends a new record and hands back a [`Token`](crate::Token)
//! - `remove` drops the record behind a token (idempotent)
//! - `snapshot_for` returns an immutable view used for one publish
//!
//! # Example
//!
//! ```ignore
//! let registry = Arc::new(SubscriptionRegistry::new());
//! let snapshot = registry.snapshot_for(EventType::of::<UserLoggedIn>());
//! for subscription in snapshot.iter() {
//!     println!("{} -> {}", subscription.id(), subscription.mode());
//! }
//! ```

mod registry;
mod types;

pub use registry::{Snapshot, SubscriptionRegistry};
pub(crate) use types::{ErasedEvent, ErasedHandler, HandlerRef};
pub use types::{HandlerResult, Predicate, Subscription, SubscriptionOptions};
