//! Tests for deferred values across all three representations.

use super::*;
use crate::config::Settings;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

fn counter() -> Arc<AtomicUsize> {
    Arc::new(AtomicUsize::new(0))
}

/// One value per representation, all producing `value`.
fn all_variants(value: i32) -> Vec<DeferredValue<i32>> {
    let (completer, handle) = AsyncHandle::channel();
    thread::spawn(move || {
        thread::sleep(Duration::from_millis(10));
        completer.succeed(value);
    });
    vec![
        DeferredValue::resolved(value),
        DeferredValue::lazy(move || value),
        DeferredValue::from_handle(handle),
    ]
}

/// Poll `condition` until it holds or `timeout` elapses.
fn eventually(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    condition()
}

/// A lazy value whose thunk signals when it starts and then holds until
/// released.
fn held(result: i32) -> (DeferredValue<i32>, Receiver<()>, Sender<()>) {
    let (started_tx, started) = mpsc::channel();
    let (release, release_rx) = mpsc::channel::<()>();
    let value = DeferredValue::lazy(move || {
        started_tx.send(()).ok();
        release_rx.recv().ok();
        result
    });
    (value, started, release)
}

/// Start forcing `value` on another thread and return once its thunk runs.
fn force_elsewhere(
    value: &DeferredValue<i32>,
    started: &Receiver<()>,
) -> thread::JoinHandle<Option<i32>> {
    let forced = value.clone();
    let forcer = thread::spawn(move || forced.to_option());
    started.recv().unwrap();
    forcer
}

#[derive(Debug)]
struct Timeout;

impl fmt::Display for Timeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "upstream timeout")
    }
}

impl std::error::Error for Timeout {}

// ==================== Construction ====================

#[test]
fn test_resolved_to_option_is_present() {
    assert_eq!(DeferredValue::resolved(5).to_option(), Some(5));
    assert_eq!(DeferredValue::from_value("x").to_option(), Some("x"));
}

#[test]
fn test_lazy_to_option_is_present_after_forcing() {
    let value = DeferredValue::lazy(|| 9);
    assert_eq!(value.variant(), Variant::Deferred);
    assert_eq!(value.to_option(), Some(9));
    assert_eq!(value.variant(), Variant::Resolved);
}

#[test]
fn test_from_option_none_fails_fast() {
    let err = DeferredValue::<String>::from_option(None).unwrap_err();
    assert_eq!(err, DeferredError::MissingInput("value"));
    assert!(!err.is_bottom());
}

#[test]
fn test_from_handle_is_async_until_forced() {
    let (completer, handle) = AsyncHandle::channel();
    let value = DeferredValue::from_handle(handle);
    assert_eq!(value.variant(), Variant::Async);
    assert!(!value.is_resolved());

    completer.succeed(4);
    assert!(value.is_resolved());
    assert_eq!(value.to_result(), Ok(4));
    assert_eq!(value.variant(), Variant::Resolved);
}

#[test]
fn test_handle_completion_resolves_without_forcing() {
    let (completer, handle) = AsyncHandle::channel();
    let value = DeferredValue::from_handle(handle);
    completer.succeed("done");
    assert_eq!(value.variant(), Variant::Resolved);
}

// ==================== Thunk memoization ====================

#[test]
fn test_thunk_runs_at_most_once_across_clones() {
    let runs = counter();
    let tally = Arc::clone(&runs);
    let value = DeferredValue::lazy(move || tally.fetch_add(1, Ordering::SeqCst) + 100);
    let other = value.clone();

    assert_eq!(value.to_option(), Some(100));
    assert_eq!(other.to_option(), Some(100));
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[test]
fn test_concurrent_forcing_runs_thunk_once() {
    let runs = counter();
    let tally = Arc::clone(&runs);
    let value = DeferredValue::lazy(move || {
        thread::sleep(Duration::from_millis(20));
        tally.fetch_add(1, Ordering::SeqCst)
    });

    let readers: Vec<_> = (0..8)
        .map(|_| {
            let value = value.clone();
            thread::spawn(move || value.to_option())
        })
        .collect();
    for reader in readers {
        assert_eq!(reader.join().unwrap(), Some(0));
    }
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

// ==================== Bottoms ====================

#[test]
fn test_failed_thunk_surfaces_as_failure() {
    let value = DeferredValue::<i32>::try_lazy(|| Err(Timeout));
    match value.to_result() {
        Err(DeferredError::Failed(err)) => assert_eq!(err.to_string(), "upstream timeout"),
        other => panic!("expected failure, got {:?}", other),
    }
    assert_eq!(value.to_option(), None);
}

#[test]
fn test_panicking_thunk_is_caught() {
    let value = DeferredValue::<i32>::lazy(|| panic!("thunk exploded"));
    assert_eq!(
        value.try_get(),
        Err(DeferredError::Panicked("thunk exploded".to_string()))
    );
    // Memoized: the bottom is stable.
    assert!(value.is_resolved());
    assert_eq!(value.to_option(), None);
}

#[test]
fn test_absent_value_is_bottom() {
    let value = DeferredValue::<i32>::lazy_option(|| None);
    assert_eq!(value.to_result(), Err(DeferredError::Absent));
}

#[test]
#[should_panic(expected = "DeferredValue::get on a bottom value")]
fn test_get_panics_on_bottom() {
    DeferredValue::<i32>::lazy_option(|| None).get();
}

#[test]
fn test_get_returns_value() {
    assert_eq!(DeferredValue::lazy(|| 3).get(), 3);
}

#[test]
fn test_composition_is_exception_transparent() {
    let runs = counter();
    let tally = Arc::clone(&runs);
    let source = DeferredValue::<i32>::lazy(|| panic!("boom"));
    let pipeline = source
        .map(|v| v + 1)
        .bind(|v| DeferredValue::resolved(v * 2))
        .map(move |v| {
            tally.fetch_add(1, Ordering::SeqCst);
            v
        });

    // Building the pipeline forced nothing and raised nothing.
    assert_eq!(pipeline.variant(), Variant::Deferred);
    assert_eq!(
        pipeline.to_result(),
        Err(DeferredError::Panicked("boom".to_string()))
    );
    assert_eq!(runs.load(Ordering::SeqCst), 0);
}

// ==================== Functor laws ====================

#[test]
fn test_map_on_resolved_applies_function() {
    let mapped = DeferredValue::resolved(20).map(|v| v + 1);
    assert_eq!(mapped.variant(), Variant::Deferred);
    assert_eq!(mapped.get(), 21);
}

#[test]
fn test_functor_identity_all_variants() {
    for value in all_variants(8) {
        assert_eq!(value.map(|v| v).to_option(), value.to_option());
    }
}

#[test]
fn test_functor_composition_all_variants() {
    let f = |v: i32| v * 3;
    let g = |v: i32| v - 1;
    for value in all_variants(5) {
        let chained = value.map(f).map(g).to_option();
        let composed = value.map(move |v| g(f(v))).to_option();
        assert_eq!(chained, composed);
        assert_eq!(chained, Some(14));
    }
}

#[test]
fn test_map_or_substitutes_fallback() {
    let broken = DeferredValue::<i32>::try_lazy(|| Err(Timeout));
    assert_eq!(broken.map_or(1, |v| v * 10).to_option(), Some(10));

    let healthy = DeferredValue::lazy(|| 4);
    assert_eq!(healthy.map_or(1, |v| v * 10).to_option(), Some(40));

    let (completer, handle) = AsyncHandle::<i32>::channel();
    let pending = DeferredValue::from_handle(handle).map_or(2, |v| v + 1);
    drop(completer);
    assert_eq!(pending.to_option(), Some(3));
}

#[test]
fn test_map_while_forced_elsewhere_does_not_block() {
    let (value, started, release) = held(41);
    let forcer = force_elsewhere(&value, &started);

    let begun = Instant::now();
    let mapped = value.map(|v| v + 1);
    assert!(begun.elapsed() < Duration::from_millis(100));
    assert_eq!(value.variant(), Variant::Deferred);
    assert!(!value.is_resolved());
    assert!(!mapped.is_resolved());

    release.send(()).unwrap();
    assert_eq!(forcer.join().unwrap(), Some(41));
    assert_eq!(mapped.to_option(), Some(42));
}

#[test]
fn test_get_timeout_while_forced_elsewhere_times_out() {
    let (value, started, release) = held(7);
    let forcer = force_elsewhere(&value, &started);

    let begun = Instant::now();
    let outcome = value.get_timeout(Duration::from_millis(20));
    assert_eq!(outcome, Err(DeferredError::TimedOut(Duration::from_millis(20))));
    assert!(begun.elapsed() < Duration::from_millis(500));

    release.send(()).unwrap();
    assert_eq!(value.get_timeout(Duration::from_secs(5)), Ok(7));
    assert_eq!(forcer.join().unwrap(), Some(7));
}

#[test]
fn test_evaluate_while_forced_elsewhere_returns_immediately() {
    let (value, started, release) = held(3);
    let forcer = force_elsewhere(&value, &started);

    let begun = Instant::now();
    let evaluated = value.evaluate();
    assert!(begun.elapsed() < Duration::from_millis(100));
    assert_eq!(evaluated.variant(), Variant::Deferred);

    release.send(()).unwrap();
    assert_eq!(evaluated.to_option(), Some(3));
    assert_eq!(forcer.join().unwrap(), Some(3));
}

#[test]
fn test_bind_and_effect_while_forced_elsewhere() {
    let (value, started, release) = held(5);
    let forcer = force_elsewhere(&value, &started);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    value.effect(move |v| sink.lock().unwrap().push(*v));
    let bound = value.bind(|v| DeferredValue::lazy(move || v * 10));
    assert!(!bound.is_resolved());

    release.send(()).unwrap();
    assert_eq!(bound.to_option(), Some(50));
    assert_eq!(forcer.join().unwrap(), Some(5));
    assert_eq!(*seen.lock().unwrap(), vec![5]);
}

// ==================== Async laziness ====================

#[test]
fn test_map_on_pending_async_does_not_block() {
    let (completer, handle) = AsyncHandle::channel();
    let source = DeferredValue::from_handle(handle);

    let started = Instant::now();
    let mapped = source.map(|v: i32| v * 2);
    assert!(started.elapsed() < Duration::from_millis(100));
    assert_eq!(mapped.variant(), Variant::Async);
    assert!(!mapped.is_resolved());

    completer.succeed(21);
    assert_eq!(mapped.to_option(), Some(42));
}

#[test]
fn test_apply_on_pending_async_does_not_block() {
    let (completer, handle) = AsyncHandle::channel();
    let source = DeferredValue::from_handle(handle);
    let function = DeferredValue::lazy(|| |v: i32| v + 1);

    let applied = source.apply(&function);
    assert_eq!(applied.variant(), Variant::Async);

    completer.succeed(1);
    assert_eq!(applied.to_option(), Some(2));
}

#[test]
fn test_mapped_async_runs_function_on_completing_thread() {
    let (completer, handle) = AsyncHandle::channel();
    let mapped = DeferredValue::from_handle(handle)
        .map(|_: i32| thread::current().name().map(str::to_string));

    thread::Builder::new()
        .name("producer".to_string())
        .spawn(move || completer.succeed(0))
        .unwrap()
        .join()
        .unwrap();

    assert_eq!(mapped.to_option(), Some(Some("producer".to_string())));
}

// ==================== Applicative ====================

#[test]
fn test_apply_preserves_receiver_variant() {
    let function = DeferredValue::resolved(|v: i32| v * 2);

    let resolved = DeferredValue::resolved(3).apply(&function);
    assert_eq!(resolved.variant(), Variant::Resolved);
    assert_eq!(resolved.to_option(), Some(6));

    let deferred = DeferredValue::lazy(|| 4).apply(&function);
    assert_eq!(deferred.variant(), Variant::Deferred);
    assert_eq!(deferred.to_option(), Some(8));

    let (completer, handle) = AsyncHandle::channel();
    let pending = DeferredValue::from_handle(handle).apply(&function);
    assert_eq!(pending.variant(), Variant::Async);
    completer.succeed(5);
    assert_eq!(pending.to_option(), Some(10));
}

#[test]
fn test_apply_on_resolved_with_pending_function_does_not_block() {
    let (completer, handle) = AsyncHandle::<fn(i32) -> i32>::channel();
    let function = DeferredValue::from_handle(handle);

    let begun = Instant::now();
    let applied = DeferredValue::resolved(3).apply(&function);
    assert!(begun.elapsed() < Duration::from_millis(100));
    assert_eq!(applied.variant(), Variant::Async);

    completer.succeed(|v| v * 5);
    assert_eq!(applied.to_option(), Some(15));
}

#[test]
fn test_apply_propagates_function_bottom() {
    let function = DeferredValue::<fn(i32) -> i32>::lazy_option(|| None);
    let applied = DeferredValue::resolved(1).apply(&function);
    assert_eq!(applied.to_result(), Err(DeferredError::Absent));
}

#[test]
fn test_apply_forces_lazy_function_only_when_forced() {
    let runs = counter();
    let tally = Arc::clone(&runs);
    let function = DeferredValue::lazy(move || {
        tally.fetch_add(1, Ordering::SeqCst);
        |v: i32| v - 1
    });
    let applied = DeferredValue::lazy(|| 10).apply(&function);
    assert_eq!(runs.load(Ordering::SeqCst), 0);
    assert_eq!(applied.to_option(), Some(9));
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

// ==================== Monad ====================

#[test]
fn test_bind_flattens_one_level() {
    for value in all_variants(6) {
        let bound = value.bind(|v| DeferredValue::lazy(move || v.to_string()));
        assert_eq!(bound.to_option(), Some("6".to_string()));
    }
}

#[test]
fn test_join_unwraps_exactly_one_level() {
    let nested = DeferredValue::resolved(DeferredValue::resolved(DeferredValue::resolved(1)));
    let once: DeferredValue<DeferredValue<i32>> = nested.join();
    assert_eq!(once.join().to_option(), Some(1));
}

#[test]
fn test_join_on_async_outer_chains_inner_async() {
    let (outer_done, outer) = AsyncHandle::channel();
    let (inner_done, inner) = AsyncHandle::channel();
    let joined = DeferredValue::from_handle(outer).join();
    assert_eq!(joined.variant(), Variant::Async);

    outer_done.succeed(DeferredValue::from_handle(inner));
    assert!(!joined.is_resolved());
    inner_done.succeed(77);
    assert_eq!(joined.to_option(), Some(77));
}

#[test]
fn test_join_propagates_outer_bottom() {
    let outer = DeferredValue::<DeferredValue<i32>>::failed(DeferredError::Absent);
    assert_eq!(outer.join().to_result(), Err(DeferredError::Absent));
}

// ==================== Effects ====================

#[test]
fn test_effect_before_resolution_fires_once() {
    let hits = counter();
    let value = DeferredValue::lazy(|| 1);
    let tally = Arc::clone(&hits);
    value.effect(move |_| {
        tally.fetch_add(1, Ordering::SeqCst);
    });
    assert_eq!(hits.load(Ordering::SeqCst), 0);

    value.to_option();
    value.to_option();
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[test]
fn test_effect_after_resolution_fires_immediately_once() {
    let hits = counter();
    let value = DeferredValue::resolved(1);
    let tally = Arc::clone(&hits);
    value.effect(move |_| {
        tally.fetch_add(1, Ordering::SeqCst);
    });
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    value.to_option();
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[test]
fn test_effects_fire_in_registration_order() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let value = DeferredValue::lazy(|| 0);
    for tag in ["first", "second", "third"] {
        let log = Arc::clone(&log);
        value.effect(move |_| log.lock().unwrap().push(tag));
    }
    value.to_option();
    assert_eq!(*log.lock().unwrap(), vec!["first", "second", "third"]);
}

#[test]
fn test_effect_skipped_on_bottom_but_on_complete_sees_it() {
    let hits = counter();
    let seen = Arc::new(Mutex::new(None));
    let value = DeferredValue::<i32>::lazy_option(|| None);

    let tally = Arc::clone(&hits);
    value.effect(move |_| {
        tally.fetch_add(1, Ordering::SeqCst);
    });
    let sink = Arc::clone(&seen);
    value.on_complete(move |outcome| {
        *sink.lock().unwrap() = Some(outcome.map(|v| *v).map_err(|e| e.clone()));
    });

    value.to_option();
    assert_eq!(hits.load(Ordering::SeqCst), 0);
    assert_eq!(*seen.lock().unwrap(), Some(Err(DeferredError::Absent)));
}

#[test]
fn test_effects_survive_evaluate_transition() {
    let hits = counter();
    let value = DeferredValue::lazy(|| 5);
    let tally = Arc::clone(&hits);
    value.effect(move |v| {
        tally.fetch_add(*v as usize, Ordering::SeqCst);
    });

    let evaluated = value.evaluate();
    assert_eq!(evaluated.to_option(), Some(5));
    // Effects run on the resolving worker, possibly after `to_option` returns.
    assert!(eventually(Duration::from_secs(2), || hits.load(Ordering::SeqCst) == 5));
}

#[test]
fn test_effect_registered_on_async_fires_after_value_dropped() {
    let (completer, handle) = AsyncHandle::channel();
    let (tx, rx) = std::sync::mpsc::channel();
    {
        let value = DeferredValue::from_handle(handle);
        value.effect(move |v: &i32| tx.send(*v).unwrap());
    }
    completer.succeed(31);
    assert_eq!(rx.recv_timeout(Duration::from_secs(1)), Ok(31));
}

#[test]
fn test_effect_runs_on_resolving_thread() {
    let pool = WorkerPool::new(&Settings::default().with_thread_name("resolver")).unwrap();
    let (tx, rx) = std::sync::mpsc::channel();
    let value = DeferredValue::lazy(|| {
        thread::sleep(Duration::from_millis(30));
        1
    });
    value.effect(move |_| {
        let name = thread::current().name().unwrap_or_default().to_string();
        tx.send(name).unwrap();
    });
    value.evaluate_on(&pool);

    let name = rx.recv_timeout(Duration::from_secs(2)).unwrap();
    assert!(name.starts_with("resolver-worker-"), "got {}", name);
}

#[test]
fn test_concurrent_effect_registration_during_resolution() {
    for _ in 0..20 {
        let hits = counter();
        let value = DeferredValue::lazy(|| 1).evaluate();
        let registrars: Vec<_> = (0..4)
            .map(|_| {
                let value = value.clone();
                let hits = Arc::clone(&hits);
                thread::spawn(move || {
                    for _ in 0..50 {
                        let hits = Arc::clone(&hits);
                        value.effect(move |_| {
                            hits.fetch_add(1, Ordering::SeqCst);
                        });
                    }
                })
            })
            .collect();
        for registrar in registrars {
            registrar.join().unwrap();
        }
        value.to_option();
        assert!(eventually(Duration::from_secs(2), || hits.load(Ordering::SeqCst) == 200));
        thread::sleep(Duration::from_millis(1));
        assert_eq!(hits.load(Ordering::SeqCst), 200);
    }
}

// ==================== Evaluate ====================

#[test]
fn test_evaluate_does_not_block_caller() {
    let value = DeferredValue::lazy(|| {
        thread::sleep(Duration::from_millis(200));
        "slow"
    });

    let started = Instant::now();
    let evaluated = value.evaluate();
    assert!(started.elapsed() < Duration::from_millis(100));
    assert_eq!(evaluated.variant(), Variant::Async);

    assert_eq!(evaluated.to_option(), Some("slow"));
    assert!(started.elapsed() >= Duration::from_millis(200));
}

#[test]
fn test_evaluate_shares_cell_with_original() {
    let value = DeferredValue::lazy(|| 3);
    let evaluated = value.evaluate();
    assert_eq!(value.variant(), Variant::Async);
    assert_eq!(evaluated.to_option(), Some(3));
    assert_eq!(value.to_option(), Some(3));
}

#[test]
fn test_evaluate_is_noop_for_resolved_and_async() {
    let resolved = DeferredValue::resolved(1).evaluate();
    assert_eq!(resolved.variant(), Variant::Resolved);

    let (_completer, handle) = AsyncHandle::<i32>::channel();
    let pending = DeferredValue::from_handle(handle.clone());
    let again = pending.evaluate();
    assert_eq!(again.variant(), Variant::Async);
}

#[test]
fn test_spawn_on_custom_pool() {
    let pool = WorkerPool::new(&Settings::default().with_pool_size(2)).unwrap();
    let value = DeferredValue::spawn_on(&pool, || (1..=10).sum::<i32>());
    assert_eq!(value.to_option(), Some(55));
}

// ==================== Timeouts and cancellation ====================

#[test]
fn test_get_timeout_honours_timeout() {
    let (_completer, handle) = AsyncHandle::<i32>::channel();
    let value = DeferredValue::from_handle(handle);

    let started = Instant::now();
    let outcome = value.get_timeout(Duration::from_millis(30));
    assert_eq!(outcome, Err(DeferredError::TimedOut(Duration::from_millis(30))));
    assert!(started.elapsed() >= Duration::from_millis(30));
    // A timeout is not a resolution.
    assert_eq!(value.variant(), Variant::Async);
}

#[test]
fn test_get_timeout_returns_value_when_ready() {
    let value = DeferredValue::spawn(|| 12);
    assert_eq!(value.get_timeout(Duration::from_secs(5)), Ok(12));
}

#[test]
fn test_cancel_never_succeeds() {
    for value in all_variants(1) {
        assert_eq!(value.cancel(), Err(DeferredError::Unsupported("cancel")));
    }
    let (_completer, handle) = AsyncHandle::<i32>::channel();
    assert!(DeferredValue::from_handle(handle).cancel().is_err());
}

#[test]
fn test_abandoned_handle_is_bottom() {
    let (completer, handle) = AsyncHandle::<i32>::channel();
    let value = DeferredValue::from_handle(handle);
    drop(completer);
    assert_eq!(value.to_result(), Err(DeferredError::Abandoned));
}

// ==================== Futures ====================

#[tokio::test]
async fn test_await_lazy_value() {
    let value = DeferredValue::lazy(|| 40 + 2);
    assert_eq!(value.await, Ok(42));
}

#[tokio::test]
async fn test_await_async_value() {
    let (completer, handle) = AsyncHandle::channel();
    let value = DeferredValue::from_handle(handle).map(|v: u32| v + 1);
    thread::spawn(move || completer.succeed(1));
    assert_eq!(value.await, Ok(2));
}

#[tokio::test]
async fn test_await_bottom() {
    let value = DeferredValue::<i32>::failed(DeferredError::Absent);
    assert_eq!(value.await, Err(DeferredError::Absent));
}

#[test]
fn test_debug_shows_variant() {
    let value = DeferredValue::lazy(|| 1);
    assert_eq!(format!("{:?}", value), "DeferredValue { variant: Deferred }");
}
