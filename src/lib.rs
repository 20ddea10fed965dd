//! # Event Hub
//!
//! An in-process, type-addressed publish/subscribe hub. Producers publish
//! typed events, consumers register handlers for an exact event type, and
//! each handler runs where its publication mode says.
//!
//! ## Core Concepts
//!
//! - **Events**: any `Send + Sync + 'static` type implementing [`Event`]
//! - **Subscriptions**: a handler plus a [`PublicationMode`] and an optional predicate
//! - **Tokens**: handles that cancel one subscription, or a group via [`CompositeToken`]
//! - **Snapshots**: each publish delivers to the subscriptions present when it started
//!
//! ## Example
//!
//! ```ignore
//! use eventhub::{Event, EventHub, MainLoop, PublicationMode};
//!
//! struct UserLoggedIn { name: String }
//! impl Event for UserLoggedIn {}
//!
//! let main_loop = MainLoop::new();
//! let hub = EventHub::builder().with_main_loop(&main_loop).build()?;
//!
//! // Runs inline, before publish returns
//! hub.subscribe(|e: &UserLoggedIn| println!("welcome {}", e.name))?;
//!
//! // Runs on the main loop; keep the token to unsubscribe later
//! let token = hub.subscribe_for_token_with_mode(
//!     |e: &UserLoggedIn| println!("refresh ui for {}", e.name),
//!     PublicationMode::MainThread,
//! )?;
//!
//! hub.publish(UserLoggedIn { name: "ada".into() })?;
//! main_loop.run_pending()?;
//! token.unsubscribe();
//! ```

mod dispatch;
pub mod error;
pub mod executor;
pub mod hub;
pub mod subscriptions;
pub mod token;
pub mod types;

// Re-exports
pub use error::{DeliveryFailure, HubError, Result};
pub use executor::{Executor, MainLoop, MainLoopExecutor, Task, WorkerPool};
pub use hub::{EventHub, EventHubBuilder, HubConfig};
pub use subscriptions::{
    HandlerResult, Predicate, Snapshot, Subscription, SubscriptionOptions, SubscriptionRegistry,
};
pub use token::{CompositeToken, Token};
pub use types::{Event, EventType, PublicationMode, SubscriptionId};
