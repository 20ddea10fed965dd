//! Delivery of one published event to a registry snapshot.

use crate::error::{DeliveryFailure, HubError, Result};
use crate::executor::{panic_message, Executor, Task};
use crate::subscriptions::{ErasedEvent, ErasedHandler, Subscription, SubscriptionRegistry};
use crate::types::{EventType, PublicationMode, SubscriptionId};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Applies the publication-mode policy to each matched subscription.
pub(crate) struct Dispatcher {
    background: Arc<dyn Executor>,
    main: Option<Arc<dyn Executor>>,
    /// Run main-thread deliveries inline when already on the main context.
    inline_on_main: bool,
}

/// What happened to one subscription during a publish.
enum Outcome {
    Skipped,
    Delivered,
    /// Calling-thread failure, returned to the publisher.
    Failed(DeliveryFailure),
    /// Weak handler dropped by its owner.
    Gone,
}

impl Dispatcher {
    pub(crate) fn new(
        background: Arc<dyn Executor>,
        main: Option<Arc<dyn Executor>>,
        inline_on_main: bool,
    ) -> Self {
        Self {
            background,
            main,
            inline_on_main,
        }
    }

    pub(crate) fn has_main_context(&self) -> bool {
        self.main.is_some()
    }

    /// Deliver `event` to every subscription registered for `event_type` right now.
    ///
    /// Returns whether any handler was run or scheduled. Synchronous failures
    /// are collected and returned once the whole snapshot has been attempted.
    pub(crate) fn dispatch(
        &self,
        registry: &SubscriptionRegistry,
        event_type: EventType,
        event: ErasedEvent,
    ) -> Result<bool> {
        let snapshot = registry.snapshot_for(event_type);
        if snapshot.is_empty() {
            return Ok(false);
        }

        let mut delivered = false;
        let mut failures = Vec::new();
        let mut gone = Vec::new();

        for subscription in snapshot.iter() {
            match self.deliver(subscription, &event) {
                Outcome::Skipped => {}
                Outcome::Delivered => delivered = true,
                Outcome::Failed(failure) => failures.push(failure),
                Outcome::Gone => gone.push(subscription.id()),
            }
        }

        if !gone.is_empty() {
            let pruned = registry.prune(event_type, &gone);
            debug!(event_type = %event_type, pruned, "Pruned dropped weak subscriptions");
        }

        if failures.is_empty() {
            Ok(delivered)
        } else {
            Err(HubError::Delivery {
                event_type: event_type.name().to_string(),
                failures,
            })
        }
    }

    fn deliver(&self, subscription: &Subscription, event: &ErasedEvent) -> Outcome {
        let id = subscription.id();
        let mode = subscription.mode();

        match panic::catch_unwind(AssertUnwindSafe(|| subscription.accepts())) {
            Ok(true) => {}
            Ok(false) => return Outcome::Skipped,
            Err(payload) => {
                let message = format!("predicate panicked: {}", panic_message(payload.as_ref()));
                return self.fail(subscription, message);
            }
        }

        let Some(handler) = subscription.handler() else {
            return Outcome::Gone;
        };

        match mode {
            PublicationMode::CallingThread => match invoke(&handler, &**event) {
                Ok(()) => Outcome::Delivered,
                Err(message) => self.fail(subscription, message),
            },
            PublicationMode::BackgroundThread => {
                self.submit(self.background.as_ref(), subscription, handler, event)
            }
            PublicationMode::MainThread => {
                let Some(main) = self.main.as_deref() else {
                    warn!(
                        event_type = %subscription.event_type(),
                        subscription = %id,
                        "No main context for main-thread subscription; skipping"
                    );
                    return Outcome::Skipped;
                };
                if self.inline_on_main && main.is_current() {
                    if let Err(message) = invoke(&handler, &**event) {
                        report(subscription.event_type(), id, mode, &message);
                    }
                    Outcome::Delivered
                } else {
                    self.submit(main, subscription, handler, event)
                }
            }
        }
    }

    /// Hand a delivery to an execution context without waiting for it.
    fn submit(
        &self,
        executor: &dyn Executor,
        subscription: &Subscription,
        handler: ErasedHandler,
        event: &ErasedEvent,
    ) -> Outcome {
        let id = subscription.id();
        let mode = subscription.mode();
        let event_type = subscription.event_type();
        let event = Arc::clone(event);

        let task: Task = Box::new(move || {
            if let Err(message) = invoke(&handler, &*event) {
                report(event_type, id, mode, &message);
            }
        });

        match executor.execute(task) {
            Ok(()) => Outcome::Delivered,
            Err(e) => {
                warn!(
                    event_type = %event_type,
                    subscription = %id,
                    mode = %mode,
                    error = %e,
                    "Failed to schedule event delivery"
                );
                Outcome::Skipped
            }
        }
    }

    /// Route a failure: returned for calling-thread subscriptions, logged otherwise.
    fn fail(&self, subscription: &Subscription, message: String) -> Outcome {
        let id = subscription.id();
        match subscription.mode() {
            PublicationMode::CallingThread => Outcome::Failed(DeliveryFailure {
                subscription: id,
                message,
            }),
            mode => {
                report(subscription.event_type(), id, mode, &message);
                Outcome::Skipped
            }
        }
    }
}

/// Run a handler, turning panics into failure messages.
fn invoke(handler: &ErasedHandler, event: &(dyn Any + Send + Sync)) -> std::result::Result<(), String> {
    match panic::catch_unwind(AssertUnwindSafe(|| handler(event))) {
        Ok(outcome) => outcome,
        Err(payload) => Err(format!("handler panicked: {}", panic_message(payload.as_ref()))),
    }
}

fn report(event_type: EventType, id: SubscriptionId, mode: PublicationMode, message: &str) {
    error!(
        event_type = %event_type,
        subscription = %id,
        mode = %mode,
        error = message,
        "Event handler failed"
    );
}
