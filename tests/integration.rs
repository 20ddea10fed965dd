//! Integration tests for the event hub.

use eventhub::{
    CompositeToken, Event, EventHub, HubConfig, MainLoop, PublicationMode, SubscriptionOptions,
    Token,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

struct SomeEvent;
impl Event for SomeEvent {}

struct EventA;
impl Event for EventA {}

struct EventB;
impl Event for EventB {}

#[derive(Debug, PartialEq)]
struct Message(u32);
impl Event for Message {}

const WAIT: Duration = Duration::from_secs(5);

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

fn counter() -> Arc<AtomicUsize> {
    Arc::new(AtomicUsize::new(0))
}

// --- Calling Thread ---

#[test]
fn test_calling_thread_delivers_before_publish_returns() {
    init_tracing();
    let hub = EventHub::new().unwrap();
    let calls = counter();

    let c = calls.clone();
    hub.subscribe_with_mode(
        move |_: &SomeEvent| {
            c.fetch_add(1, Ordering::SeqCst);
        },
        PublicationMode::CallingThread,
    )
    .unwrap();

    assert!(hub.publish(SomeEvent).unwrap());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_calling_thread_runs_on_publisher_thread() {
    let hub = EventHub::new().unwrap();
    let seen = Arc::new(Mutex::new(None));

    let s = seen.clone();
    hub.subscribe(move |_: &SomeEvent| {
        *s.lock() = Some(thread::current().id());
    })
    .unwrap();

    let publisher = thread::scope(|scope| {
        scope
            .spawn(|| {
                hub.publish(SomeEvent).unwrap();
                thread::current().id()
            })
            .join()
            .unwrap()
    });

    assert_eq!(*seen.lock(), Some(publisher));
}

#[test]
fn test_handlers_run_in_subscription_order() {
    let hub = EventHub::new().unwrap();
    let order = Arc::new(Mutex::new(Vec::new()));

    for i in 0..5 {
        let order = order.clone();
        hub.subscribe(move |_: &SomeEvent| order.lock().push(i)).unwrap();
    }

    hub.publish(SomeEvent).unwrap();
    assert_eq!(*order.lock(), vec![0, 1, 2, 3, 4]);
}

#[test]
fn test_handler_sees_event_payload() {
    let hub = EventHub::new().unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));

    let s = seen.clone();
    hub.subscribe(move |message: &Message| s.lock().push(message.0)).unwrap();

    hub.publish(Message(7)).unwrap();
    hub.publish(Message(9)).unwrap();
    assert_eq!(*seen.lock(), vec![7, 9]);
}

// --- Predicates ---

#[test]
fn test_false_predicate_skips_handler() {
    let hub = EventHub::new().unwrap();
    let calls = counter();

    let c = calls.clone();
    hub.subscribe_with_predicate(
        move |_: &SomeEvent| {
            c.fetch_add(1, Ordering::SeqCst);
        },
        || false,
    )
    .unwrap();

    assert!(!hub.publish(SomeEvent).unwrap());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_predicate_evaluated_per_publish() {
    let hub = EventHub::new().unwrap();
    let calls = counter();
    let enabled = Arc::new(std::sync::atomic::AtomicBool::new(false));

    let c = calls.clone();
    let e = enabled.clone();
    hub.subscribe_with(
        move |_: &SomeEvent| {
            c.fetch_add(1, Ordering::SeqCst);
        },
        SubscriptionOptions::mode(PublicationMode::CallingThread)
            .with_predicate(move || e.load(Ordering::SeqCst)),
    )
    .unwrap();

    hub.publish(SomeEvent).unwrap();
    enabled.store(true, Ordering::SeqCst);
    hub.publish(SomeEvent).unwrap();
    hub.publish(SomeEvent).unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

// --- Tokens ---

#[test]
fn test_unsubscribed_handler_not_invoked() {
    let hub = EventHub::new().unwrap();

    let token = hub
        .subscribe_for_token::<_, _, ()>(|_: &SomeEvent| panic!("should not be called"))
        .unwrap();
    assert!(token.unsubscribe());

    assert!(!hub.publish(SomeEvent).unwrap());
    assert!(!token.is_subscribed());
}

#[test]
fn test_unsubscribe_is_idempotent() {
    let hub = EventHub::new().unwrap();
    let token = hub.subscribe_for_token(|_: &SomeEvent| {}).unwrap();

    assert!(hub.unsubscribe(&token));
    assert!(!hub.unsubscribe(&token));
    assert!(!token.unsubscribe());
    assert_eq!(hub.subscription_count(), 0);
}

#[test]
fn test_unsubscribe_one_of_many() {
    let hub = EventHub::new().unwrap();
    let first = counter();
    let second = counter();

    let c = first.clone();
    hub.subscribe(move |_: &SomeEvent| {
        c.fetch_add(1, Ordering::SeqCst);
    })
    .unwrap();
    let c = second.clone();
    let token = hub
        .subscribe_for_token(move |_: &SomeEvent| {
            c.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

    token.unsubscribe();
    hub.publish(SomeEvent).unwrap();

    assert_eq!(first.load(Ordering::SeqCst), 1);
    assert_eq!(second.load(Ordering::SeqCst), 0);
}

#[test]
fn test_token_does_not_keep_hub_alive() {
    let hub = EventHub::new().unwrap();
    let token = hub.subscribe_for_token(|_: &SomeEvent| {}).unwrap();
    assert!(token.is_subscribed());

    drop(hub);
    assert!(!token.is_subscribed());
    assert!(!token.unsubscribe());
}

#[test]
fn test_composite_token_unsubscribes_all() {
    let hub = EventHub::new().unwrap();
    let composite = CompositeToken::new();

    composite.add(
        hub.subscribe_for_token::<_, _, ()>(|_: &SomeEvent| panic!("unsubscribed"))
            .unwrap(),
    );
    composite.add(
        hub.subscribe_for_token::<_, _, ()>(|_: &EventA| panic!("unsubscribed"))
            .unwrap(),
    );
    assert!(composite.is_subscribed());

    composite.unsubscribe();
    assert!(!composite.is_subscribed());

    assert!(!hub.publish(SomeEvent).unwrap());
    assert!(!hub.publish(EventA).unwrap());
}

#[test]
fn test_composite_token_remove() {
    let hub = EventHub::new().unwrap();
    let composite = CompositeToken::new();
    let calls = counter();

    let c = calls.clone();
    let token = hub
        .subscribe_for_token(move |_: &SomeEvent| {
            c.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
    let id = token.id();
    composite.add(token);

    assert!(composite.remove(id));
    assert!(!composite.has_subscriptions());
    assert!(composite.is_subscribed());

    hub.publish(SomeEvent).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

// --- Exact Type Matching ---

#[test]
fn test_only_matching_type_invoked() {
    let hub = EventHub::new().unwrap();
    let a_calls = counter();

    let c = a_calls.clone();
    hub.subscribe(move |_: &EventA| {
        c.fetch_add(1, Ordering::SeqCst);
    })
    .unwrap();
    hub.subscribe::<_, _, ()>(|_: &EventB| panic!("EventB handler must not see EventA"))
        .unwrap();

    hub.publish(EventA).unwrap();

    assert_eq!(a_calls.load(Ordering::SeqCst), 1);
    assert_eq!(hub.subscription_count_for::<EventA>(), 1);
    assert_eq!(hub.subscription_count_for::<EventB>(), 1);
}

#[test]
fn test_wrapper_types_do_not_match() {
    let hub = EventHub::new().unwrap();

    struct Wrapped(#[allow(dead_code)] EventA);
    impl Event for Wrapped {}

    hub.subscribe::<_, _, ()>(|_: &EventA| panic!("wrapper is a different type"))
        .unwrap();

    assert!(!hub.publish(Wrapped(EventA)).unwrap());
}

// --- Snapshot Semantics ---

#[test]
fn test_subscribe_during_publish_not_delivered() {
    let hub = Arc::new(EventHub::new().unwrap());
    let late_calls = counter();

    let weak_hub = Arc::downgrade(&hub);
    let late = late_calls.clone();
    hub.subscribe(move |_: &SomeEvent| {
        if let Some(hub) = weak_hub.upgrade() {
            let late = late.clone();
            hub.subscribe(move |_: &SomeEvent| {
                late.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }
    })
    .unwrap();

    hub.publish(SomeEvent).unwrap();
    assert_eq!(late_calls.load(Ordering::SeqCst), 0);
    assert_eq!(hub.subscription_count_for::<SomeEvent>(), 2);

    // The late handler takes part in the next publish.
    hub.publish(SomeEvent).unwrap();
    assert_eq!(late_calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_unsubscribe_during_publish_still_delivered() {
    let hub = EventHub::new().unwrap();
    let second_calls = counter();
    let second_token: Arc<Mutex<Option<Token>>> = Arc::new(Mutex::new(None));

    let slot = second_token.clone();
    hub.subscribe(move |_: &SomeEvent| {
        if let Some(token) = slot.lock().as_ref() {
            token.unsubscribe();
        }
    })
    .unwrap();

    let c = second_calls.clone();
    let token = hub
        .subscribe_for_token(move |_: &SomeEvent| {
            c.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
    *second_token.lock() = Some(token);

    hub.publish(SomeEvent).unwrap();
    assert_eq!(second_calls.load(Ordering::SeqCst), 1);

    hub.publish(SomeEvent).unwrap();
    assert_eq!(second_calls.load(Ordering::SeqCst), 1);
}

// --- Background Thread ---

#[test]
fn test_background_runs_on_worker() {
    init_tracing();
    let hub = EventHub::with_config(HubConfig {
        background_workers: 2,
        worker_thread_name: "bg-test".to_string(),
        ..Default::default()
    })
    .unwrap();
    let (tx, rx) = crossbeam_channel::unbounded();

    hub.subscribe_with_mode(
        move |message: &Message| {
            let name = thread::current().name().map(str::to_string);
            tx.send((message.0, name)).unwrap();
        },
        PublicationMode::BackgroundThread,
    )
    .unwrap();

    assert!(hub.publish(Message(3)).unwrap());

    let (value, name) = rx.recv_timeout(WAIT).unwrap();
    assert_eq!(value, 3);
    assert!(name.unwrap().starts_with("bg-test-"));
}

#[test]
fn test_background_does_not_block_publisher() {
    let hub = EventHub::new().unwrap();
    let (release_tx, release_rx) = crossbeam_channel::bounded::<()>(0);
    let (done_tx, done_rx) = crossbeam_channel::unbounded();

    hub.subscribe_with_mode(
        move |_: &SomeEvent| {
            release_rx.recv_timeout(WAIT).unwrap();
            done_tx.send(()).unwrap();
        },
        PublicationMode::BackgroundThread,
    )
    .unwrap();

    // Returns while the handler is still parked.
    assert!(hub.publish(SomeEvent).unwrap());
    assert!(done_rx.try_recv().is_err());

    release_tx.send(()).unwrap();
    assert!(done_rx.recv_timeout(WAIT).is_ok());
}

#[test]
fn test_default_mode_from_config() {
    let hub = EventHub::with_config(HubConfig {
        default_mode: PublicationMode::BackgroundThread,
        ..Default::default()
    })
    .unwrap();
    let publisher = thread::current().id();
    let (tx, rx) = crossbeam_channel::unbounded();

    hub.subscribe(move |_: &SomeEvent| tx.send(thread::current().id()).unwrap())
        .unwrap();
    hub.publish(SomeEvent).unwrap();

    let handler_thread = rx.recv_timeout(WAIT).unwrap();
    assert_ne!(handler_thread, publisher);
    assert_eq!(
        hub.snapshot_for::<SomeEvent>()[0].mode(),
        PublicationMode::BackgroundThread
    );
}

#[test]
fn test_custom_background_executor() {
    let ran = counter();
    let r = ran.clone();
    let hub = EventHub::builder()
        .with_background_executor(eventhub::executor::from_fn(move |task: eventhub::Task| {
            r.fetch_add(1, Ordering::SeqCst);
            task();
            Ok(())
        }))
        .build()
        .unwrap();
    let calls = counter();

    let c = calls.clone();
    hub.subscribe_with_mode(
        move |_: &SomeEvent| {
            c.fetch_add(1, Ordering::SeqCst);
        },
        PublicationMode::BackgroundThread,
    )
    .unwrap();

    hub.publish(SomeEvent).unwrap();
    assert_eq!(ran.load(Ordering::SeqCst), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

// --- Main Thread ---

#[test]
fn test_main_thread_delivery_from_other_thread() {
    init_tracing();
    let main_loop = MainLoop::new();
    let hub = EventHub::builder().with_main_loop(&main_loop).build().unwrap();
    let main_thread = thread::current().id();
    let seen = Arc::new(Mutex::new(None));

    let s = seen.clone();
    let token = hub
        .subscribe_for_token_with_mode(
            move |_: &SomeEvent| {
                *s.lock() = Some(thread::current().id());
            },
            PublicationMode::MainThread,
        )
        .unwrap();

    thread::scope(|scope| {
        scope.spawn(|| assert!(hub.publish(SomeEvent).unwrap()));
    });

    // Nothing runs until the main loop is pumped.
    assert!(seen.lock().is_none());

    let done = main_loop
        .run_until_condition(|| seen.lock().is_some(), WAIT)
        .unwrap();
    assert!(done);
    assert_eq!(*seen.lock(), Some(main_thread));
    assert!(token.is_subscribed());
}

#[test]
fn test_main_thread_preserves_submission_order() {
    let main_loop = MainLoop::new();
    let hub = EventHub::builder().with_main_loop(&main_loop).build().unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));

    let s = seen.clone();
    hub.subscribe_with_mode(
        move |message: &Message| s.lock().push(message.0),
        PublicationMode::MainThread,
    )
    .unwrap();

    thread::scope(|scope| {
        scope.spawn(|| {
            for i in 0..100 {
                hub.publish(Message(i)).unwrap();
            }
        });
    });

    assert_eq!(main_loop.run_pending().unwrap(), 100);
    assert_eq!(*seen.lock(), (0..100).collect::<Vec<_>>());
}

#[test]
fn test_main_thread_queued_even_on_main_by_default() {
    let main_loop = MainLoop::new();
    let hub = EventHub::builder().with_main_loop(&main_loop).build().unwrap();
    let calls = counter();

    let c = calls.clone();
    hub.subscribe_with_mode(
        move |_: &SomeEvent| {
            c.fetch_add(1, Ordering::SeqCst);
        },
        PublicationMode::MainThread,
    )
    .unwrap();

    hub.publish(SomeEvent).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(main_loop.pending(), 1);

    main_loop.run_pending().unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_main_thread_inline_on_main_context() {
    let main_loop = MainLoop::new();
    let hub = EventHub::builder()
        .config(HubConfig {
            inline_on_main_context: true,
            ..Default::default()
        })
        .with_main_loop(&main_loop)
        .build()
        .unwrap();
    let calls = counter();

    let c = calls.clone();
    hub.subscribe_with_mode(
        move |_: &SomeEvent| {
            c.fetch_add(1, Ordering::SeqCst);
        },
        PublicationMode::MainThread,
    )
    .unwrap();

    hub.publish(SomeEvent).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(main_loop.pending(), 0);
}

#[test]
fn test_main_thread_default_mode() {
    let main_loop = MainLoop::new();
    let hub = EventHub::builder()
        .default_mode(PublicationMode::MainThread)
        .with_main_loop(&main_loop)
        .build()
        .unwrap();
    let calls = counter();

    let c = calls.clone();
    hub.subscribe(move |_: &SomeEvent| {
        c.fetch_add(1, Ordering::SeqCst);
    })
    .unwrap();

    hub.publish(SomeEvent).unwrap();
    main_loop.run_pending().unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

// --- Weak Subscriptions ---

#[test]
fn test_weak_subscription_delivers_while_alive() {
    let hub = EventHub::new().unwrap();
    let calls = counter();

    let c = calls.clone();
    let handler = Arc::new(move |_: &SomeEvent| {
        c.fetch_add(1, Ordering::SeqCst);
    });
    let token = hub
        .subscribe_weak(&handler, SubscriptionOptions::default())
        .unwrap();

    hub.publish(SomeEvent).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(hub.snapshot_for::<SomeEvent>()[0].is_weak());
    assert!(token.is_subscribed());
}

#[test]
fn test_weak_subscription_pruned_after_drop() {
    let hub = EventHub::new().unwrap();

    let handler = Arc::new(|_: &SomeEvent| panic!("dropped handler must not run"));
    let token = hub
        .subscribe_weak::<_, _, ()>(&handler, SubscriptionOptions::default())
        .unwrap();
    drop(handler);

    assert!(!hub.publish(SomeEvent).unwrap());
    assert_eq!(hub.subscription_count(), 0);
    assert!(!token.is_subscribed());
}
