//! Deferred Pipeline Example
//!
//! Demonstrates building a pipeline of deferred values:
//! - Lazy thunks that run only when consumed
//! - Fallible and optional thunks, and how bottoms surface
//! - Evaluating on the shared worker pool without blocking
//! - Effects that fire once the value is known
//! - Externally completed async handles
//!
//! Run with `RUST_LOG=debug` to see pool events.

use std::thread;
use std::time::{Duration, Instant};

use slackwater::prelude::*;
use tracing_subscriber::EnvFilter;

// ==================== Lazy composition ====================

/// Example 1: nothing runs until the value is consumed.
fn example_lazy_composition() {
    println!("\n=== Example 1: Lazy Composition ===");

    let raw = DeferredValue::lazy(|| {
        println!("  (loading raw readings)");
        vec![12.5, 13.0, 11.75, 14.25]
    });
    let mean = raw.map(|readings| readings.iter().sum::<f64>() / readings.len() as f64);
    let label = mean.map(|m| format!("mean temperature {:.2}", m));

    println!("Pipeline built, variant: {:?}", label.variant());
    println!("Result: {:?}", label.to_option());
    println!("Again (memoized): {:?}", label.to_option());
}

// ==================== Bottoms ====================

/// Example 2: failures travel through composition and surface at the end.
fn example_bottoms() {
    println!("\n=== Example 2: Bottoms ===");

    let port = DeferredValue::try_lazy(|| "80a".parse::<u16>());
    let url = port.map(|p| format!("http://localhost:{}", p));
    match url.to_result() {
        Ok(url) => println!("URL: {}", url),
        Err(err) => println!("Could not build URL: {}", err),
    }

    let missing = DeferredValue::lazy_option(|| std::env::var("SLACKWATER_DEMO_UNSET").ok());
    println!("Optional env var: {:?}", missing.to_option());
    println!("As result: {:?}", missing.to_result().map_err(|e| e.to_string()));
}

// ==================== Evaluation ====================

/// Example 3: evaluate hands the thunk to the pool and returns at once.
fn example_evaluate() {
    println!("\n=== Example 3: Evaluate ===");

    let report = DeferredValue::lazy(|| {
        thread::sleep(Duration::from_millis(200));
        "quarterly report".to_string()
    });
    report.effect(|r| println!("  effect: {} is ready", r));

    let started = Instant::now();
    let running = report.evaluate();
    println!("evaluate returned after {:?} ({:?})", started.elapsed(), running.variant());
    println!("value: {:?} after {:?}", running.to_option(), started.elapsed());
}

// ==================== Async handles ====================

/// Example 4: a producer thread completes a handle; composition never blocks.
fn example_async_handle() {
    println!("\n=== Example 4: Async Handle ===");

    let (completer, handle) = AsyncHandle::channel();
    let greeting = DeferredValue::from_handle(handle).map(|name: String| format!("hello, {}", name));
    println!("mapped while pending: {:?}", greeting.variant());

    let producer = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        completer.succeed("slackwater".to_string());
    });

    println!("waiting at most 10ms: {:?}", greeting.get_timeout(Duration::from_millis(10)));
    println!("eventually: {:?}", greeting.to_option());
    let _ = producer.join();

    println!("cancel: {:?}", greeting.cancel());
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("Deferred Pipeline Examples");
    println!("==========================");

    example_lazy_composition();
    example_bottoms();
    example_evaluate();
    example_async_handle();

    println!("\n=== All examples completed successfully! ===");
}
