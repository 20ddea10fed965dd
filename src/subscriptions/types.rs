//! Subscription records and the handler/predicate plumbing behind them.

use crate::types::{Event, EventType, PublicationMode, SubscriptionId};
use std::any::Any;
use std::fmt;
use std::sync::{Arc, Weak};

/// A published event with its concrete type erased.
pub(crate) type ErasedEvent = Arc<dyn Any + Send + Sync>;

/// A handler with its event type erased. Returns the failure message on error.
pub(crate) type ErasedHandler =
    Arc<dyn Fn(&(dyn Any + Send + Sync)) -> Result<(), String> + Send + Sync>;

/// Zero-argument filter evaluated before each delivery.
pub type Predicate = Arc<dyn Fn() -> bool + Send + Sync>;

/// Return values a handler may produce.
///
/// Handlers either return nothing or a `Result` whose error implements
/// `Display`. An `Err` is reported as a delivery failure.
pub trait HandlerResult {
    fn into_outcome(self) -> Result<(), String>;
}

impl HandlerResult for () {
    fn into_outcome(self) -> Result<(), String> {
        Ok(())
    }
}

impl<E: fmt::Display> HandlerResult for Result<(), E> {
    fn into_outcome(self) -> Result<(), String> {
        self.map_err(|e| e.to_string())
    }
}

/// Per-subscription dispatch settings.
///
/// A missing mode falls back to the hub's default mode.
#[derive(Clone, Default)]
pub struct SubscriptionOptions {
    pub mode: Option<PublicationMode>,
    pub predicate: Option<Predicate>,
}

impl SubscriptionOptions {
    /// Options with only a publication mode.
    pub fn mode(mode: PublicationMode) -> Self {
        Self {
            mode: Some(mode),
            predicate: None,
        }
    }

    /// Options with only a predicate.
    pub fn predicate<P>(predicate: P) -> Self
    where
        P: Fn() -> bool + Send + Sync + 'static,
    {
        Self {
            mode: None,
            predicate: Some(Arc::new(predicate)),
        }
    }

    pub fn with_mode(mut self, mode: PublicationMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn with_predicate<P>(mut self, predicate: P) -> Self
    where
        P: Fn() -> bool + Send + Sync + 'static,
    {
        self.predicate = Some(Arc::new(predicate));
        self
    }
}

impl fmt::Debug for SubscriptionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionOptions")
            .field("mode", &self.mode)
            .field("predicate", &self.predicate.is_some())
            .finish()
    }
}

/// How a subscription holds on to its handler.
#[derive(Clone)]
pub(crate) enum HandlerRef {
    Strong(ErasedHandler),
    /// Produces a strong handler while the caller still owns it.
    Weak(Arc<dyn Fn() -> Option<ErasedHandler> + Send + Sync>),
}

impl HandlerRef {
    pub(crate) fn strong<E, F, R>(handler: F) -> Self
    where
        E: Event,
        F: Fn(&E) -> R + Send + Sync + 'static,
        R: HandlerResult,
    {
        HandlerRef::Strong(erase(handler))
    }

    pub(crate) fn weak<E, F, R>(handler: &Arc<F>) -> Self
    where
        E: Event,
        F: Fn(&E) -> R + Send + Sync + 'static,
        R: HandlerResult,
    {
        let weak: Weak<F> = Arc::downgrade(handler);
        HandlerRef::Weak(Arc::new(move || {
            weak.upgrade()
                .map(|strong| erase(move |event: &E| (*strong)(event)))
        }))
    }

    fn resolve(&self) -> Option<ErasedHandler> {
        match self {
            HandlerRef::Strong(handler) => Some(Arc::clone(handler)),
            HandlerRef::Weak(upgrade) => upgrade(),
        }
    }
}

fn erase<E, F, R>(handler: F) -> ErasedHandler
where
    E: Event,
    F: Fn(&E) -> R + Send + Sync + 'static,
    R: HandlerResult,
{
    Arc::new(move |event: &(dyn Any + Send + Sync)| match event.downcast_ref::<E>() {
        Some(event) => handler(event).into_outcome(),
        None => Err(format!(
            "event is not a {}",
            std::any::type_name::<E>()
        )),
    })
}

/// One registered handler plus its dispatch configuration.
///
/// Immutable once created. Removal from the registry never touches the
/// record itself, so snapshots holding it stay valid.
pub struct Subscription {
    id: SubscriptionId,
    event_type: EventType,
    mode: PublicationMode,
    predicate: Option<Predicate>,
    handler: HandlerRef,
}

impl Subscription {
    pub(crate) fn new(
        id: SubscriptionId,
        event_type: EventType,
        handler: HandlerRef,
        mode: PublicationMode,
        predicate: Option<Predicate>,
    ) -> Self {
        Self {
            id,
            event_type,
            mode,
            predicate,
            handler,
        }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    pub fn mode(&self) -> PublicationMode {
        self.mode
    }

    pub fn has_predicate(&self) -> bool {
        self.predicate.is_some()
    }

    /// True for subscriptions that only hold their handler weakly.
    pub fn is_weak(&self) -> bool {
        matches!(self.handler, HandlerRef::Weak(_))
    }

    /// Evaluate the predicate. Subscriptions without one accept everything.
    pub(crate) fn accepts(&self) -> bool {
        self.predicate.as_ref().map_or(true, |predicate| predicate())
    }

    /// The handler to invoke, or `None` if a weak handler has been dropped.
    pub(crate) fn handler(&self) -> Option<ErasedHandler> {
        self.handler.resolve()
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("event_type", &self.event_type)
            .field("mode", &self.mode)
            .field("predicate", &self.predicate.is_some())
            .field("weak", &self.is_weak())
            .finish()
    }
}
