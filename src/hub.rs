//! Main EventHub struct tying registry, dispatcher and execution contexts together.

use crate::dispatch::Dispatcher;
use crate::error::{HubError, Result};
use crate::executor::{Executor, MainLoop, WorkerPool};
use crate::subscriptions::{
    HandlerRef, HandlerResult, Snapshot, SubscriptionOptions, SubscriptionRegistry,
};
use crate::token::Token;
use crate::types::{Event, EventType, PublicationMode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Hub configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Mode used by subscriptions that don't name one.
    pub default_mode: PublicationMode,

    /// Threads in the built-in background pool.
    /// Ignored when a background executor is supplied.
    pub background_workers: usize,

    /// Name prefix for background worker threads.
    pub worker_thread_name: String,

    /// Run main-thread deliveries inline when publishing from the main context.
    pub inline_on_main_context: bool,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            default_mode: PublicationMode::CallingThread,
            background_workers: 4,
            worker_thread_name: "eventhub-worker".to_string(),
            inline_on_main_context: false,
        }
    }
}

/// Builder for an [`EventHub`] with injected execution contexts.
#[derive(Default)]
pub struct EventHubBuilder {
    config: HubConfig,
    main: Option<Arc<dyn Executor>>,
    background: Option<Arc<dyn Executor>>,
}

impl EventHubBuilder {
    pub fn config(mut self, config: HubConfig) -> Self {
        self.config = config;
        self
    }

    pub fn default_mode(mut self, mode: PublicationMode) -> Self {
        self.config.default_mode = mode;
        self
    }

    /// Serial context used for `MainThread` deliveries.
    pub fn with_main_executor<X>(mut self, executor: X) -> Self
    where
        X: Executor + 'static,
    {
        self.main = Some(Arc::new(executor));
        self
    }

    /// Use a [`MainLoop`] as the main context.
    pub fn with_main_loop(self, main_loop: &MainLoop) -> Self {
        self.with_main_executor(main_loop.executor())
    }

    /// Context used for `BackgroundThread` deliveries instead of the built-in pool.
    pub fn with_background_executor<X>(mut self, executor: X) -> Self
    where
        X: Executor + 'static,
    {
        self.background = Some(Arc::new(executor));
        self
    }

    pub fn build(self) -> Result<EventHub> {
        let config = self.config;

        if config.default_mode == PublicationMode::MainThread && self.main.is_none() {
            return Err(HubError::NoMainContext);
        }

        let background: Arc<dyn Executor> = match self.background {
            Some(executor) => executor,
            None => Arc::new(WorkerPool::new(
                config.background_workers,
                &config.worker_thread_name,
            )?),
        };

        let dispatcher = Dispatcher::new(background, self.main, config.inline_on_main_context);

        debug!(
            default_mode = %config.default_mode,
            main_context = dispatcher.has_main_context(),
            "Event hub created"
        );

        Ok(EventHub {
            registry: Arc::new(SubscriptionRegistry::new()),
            dispatcher,
            config,
        })
    }
}

/// The in-process publish/subscribe hub.
///
/// Handlers are registered per event type and receive every published event
/// of exactly that type. Where each handler runs is decided by its
/// [`PublicationMode`]:
/// - `CallingThread`: inline, before `publish` returns
/// - `BackgroundThread`: on the background executor
/// - `MainThread`: queued on the main context, in submission order
///
/// The hub is `Send + Sync`; share it by reference or `Arc`.
pub struct EventHub {
    registry: Arc<SubscriptionRegistry>,
    dispatcher: Dispatcher,
    config: HubConfig,
}

impl EventHub {
    /// Hub with the default configuration and no main context.
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    pub fn with_config(config: HubConfig) -> Result<Self> {
        Self::builder().config(config).build()
    }

    pub fn builder() -> EventHubBuilder {
        EventHubBuilder::default()
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    // --- Subscribe ---

    /// Subscribe with the default mode and no predicate.
    ///
    /// The subscription lasts until the hub is cleared or dropped.
    pub fn subscribe<E, F, R>(&self, handler: F) -> Result<()>
    where
        E: Event,
        F: Fn(&E) -> R + Send + Sync + 'static,
        R: HandlerResult,
    {
        self.subscribe_with(handler, SubscriptionOptions::default())
    }

    pub fn subscribe_with_mode<E, F, R>(&self, handler: F, mode: PublicationMode) -> Result<()>
    where
        E: Event,
        F: Fn(&E) -> R + Send + Sync + 'static,
        R: HandlerResult,
    {
        self.subscribe_with(handler, SubscriptionOptions::mode(mode))
    }

    pub fn subscribe_with_predicate<E, F, R, P>(&self, handler: F, predicate: P) -> Result<()>
    where
        E: Event,
        F: Fn(&E) -> R + Send + Sync + 'static,
        R: HandlerResult,
        P: Fn() -> bool + Send + Sync + 'static,
    {
        self.subscribe_with(handler, SubscriptionOptions::predicate(predicate))
    }

    pub fn subscribe_with<E, F, R>(&self, handler: F, options: SubscriptionOptions) -> Result<()>
    where
        E: Event,
        F: Fn(&E) -> R + Send + Sync + 'static,
        R: HandlerResult,
    {
        self.register::<E>(HandlerRef::strong(handler), options)
            .map(drop)
    }

    /// Subscribe with the default mode and get a token for unsubscribing.
    pub fn subscribe_for_token<E, F, R>(&self, handler: F) -> Result<Token>
    where
        E: Event,
        F: Fn(&E) -> R + Send + Sync + 'static,
        R: HandlerResult,
    {
        self.subscribe_for_token_with(handler, SubscriptionOptions::default())
    }

    pub fn subscribe_for_token_with_mode<E, F, R>(
        &self,
        handler: F,
        mode: PublicationMode,
    ) -> Result<Token>
    where
        E: Event,
        F: Fn(&E) -> R + Send + Sync + 'static,
        R: HandlerResult,
    {
        self.subscribe_for_token_with(handler, SubscriptionOptions::mode(mode))
    }

    pub fn subscribe_for_token_with_predicate<E, F, R, P>(
        &self,
        handler: F,
        predicate: P,
    ) -> Result<Token>
    where
        E: Event,
        F: Fn(&E) -> R + Send + Sync + 'static,
        R: HandlerResult,
        P: Fn() -> bool + Send + Sync + 'static,
    {
        self.subscribe_for_token_with(handler, SubscriptionOptions::predicate(predicate))
    }

    pub fn subscribe_for_token_with<E, F, R>(
        &self,
        handler: F,
        options: SubscriptionOptions,
    ) -> Result<Token>
    where
        E: Event,
        F: Fn(&E) -> R + Send + Sync + 'static,
        R: HandlerResult,
    {
        self.register::<E>(HandlerRef::strong(handler), options)
    }

    /// Subscribe without keeping the handler alive.
    ///
    /// Once every `Arc` to `handler` is dropped the handler is no longer
    /// invoked, and the subscription is pruned on the next publish of `E`.
    pub fn subscribe_weak<E, F, R>(
        &self,
        handler: &Arc<F>,
        options: SubscriptionOptions,
    ) -> Result<Token>
    where
        E: Event,
        F: Fn(&E) -> R + Send + Sync + 'static,
        R: HandlerResult,
    {
        self.register::<E>(HandlerRef::weak(handler), options)
    }

    fn register<E: Event>(&self, handler: HandlerRef, options: SubscriptionOptions) -> Result<Token> {
        let mode = options.mode.unwrap_or(self.config.default_mode);
        if mode == PublicationMode::MainThread && !self.dispatcher.has_main_context() {
            return Err(HubError::NoMainContext);
        }

        let event_type = EventType::of::<E>();
        let token = self
            .registry
            .add(event_type, handler, mode, options.predicate);

        debug!(
            event_type = %event_type,
            subscription = %token.id(),
            mode = %mode,
            "Subscribed"
        );
        Ok(token)
    }

    /// Cancel a subscription. Returns false if nothing was removed.
    pub fn unsubscribe(&self, token: &Token) -> bool {
        let removed = self.registry.remove(token);
        if removed {
            debug!(
                event_type = %token.event_type(),
                subscription = %token.id(),
                "Unsubscribed"
            );
        }
        removed
    }

    // --- Publish ---

    /// Deliver `event` to every subscription registered for `E` at this moment.
    ///
    /// Returns whether any handler ran or was scheduled. If calling-thread
    /// handlers fail, every other handler is still attempted and the failures
    /// come back as [`HubError::Delivery`]. Failures of background and
    /// main-thread handlers are only logged.
    pub fn publish<E: Event>(&self, event: E) -> Result<bool> {
        self.dispatcher
            .dispatch(&self.registry, EventType::of::<E>(), Arc::new(event))
    }

    // --- Introspection ---

    /// Total number of active subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.registry.len()
    }

    pub fn subscription_count_for<E: Event>(&self) -> usize {
        self.registry.len_for(EventType::of::<E>())
    }

    /// Current subscriptions for `E`, in delivery order.
    pub fn snapshot_for<E: Event>(&self) -> Snapshot {
        self.registry.snapshot_for(EventType::of::<E>())
    }

    /// Remove every subscription. In-flight deliveries still complete.
    pub fn clear(&self) -> usize {
        let removed = self.registry.clear();
        debug!(removed, "Cleared all subscriptions");
        removed
    }
}

impl fmt::Debug for EventHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHub")
            .field("config", &self.config)
            .field("subscriptions", &self.registry.len())
            .finish()
    }
}
