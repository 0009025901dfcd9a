//! Parallel Aggregation Example
//!
//! Demonstrates partitioned operations over `Seq`:
//! - par_map over contiguous slices on bounded workers
//! - Dropping elements whose mapping panics
//! - par_fold with a non-commutative operation
//! - MonoidStructure and the numeric monoids
//! - A configured executor with verbose logging
//!
//! Run with `RUST_LOG=slackwater=debug` to see partition events.

use slackwater::monoid::{par_fold_all, Max, Sum};
use slackwater::prelude::*;
use tracing_subscriber::EnvFilter;

// ==================== par_map ====================

/// Example 1: mapping keeps the original order for any worker count.
fn example_par_map() {
    println!("\n=== Example 1: par_map ===");

    let words = seq!["one", "two", "three", "four"];
    for workers in [1, 2, 4] {
        println!("{} workers: {:?}", workers, words.par_map(|w| w.len(), workers));
    }

    let readings = seq!["12", "7", "oops", "40", ""];
    let parsed = readings.par_filter_map(|r| r.parse::<u32>().ok(), 2);
    println!("parsed readings: {:?}", parsed);

    let ratios = seq![4, 0, 2].par_map(
        |d| {
            if *d == 0 {
                panic!("zero divisor");
            }
            100 / d
        },
        3,
    );
    println!("ratios (panicking element dropped): {:?}", ratios);
}

// ==================== par_fold ====================

/// Example 2: folding in chunks gives the same answer as folding in order.
fn example_par_fold() {
    println!("\n=== Example 2: par_fold ===");

    let numbers: Seq<u64> = (1..=100_000).collect();
    let total = numbers.par_fold(|a, b| a + b, 0, 10_000);
    println!("sum 1..=100000 = {}", total);

    let letters = Seq::generate(26, |i| char::from(b'a' + i as u8).to_string());
    let alphabet = letters.par_fold(|a, b| a + &b, String::new(), 5);
    println!("alphabet: {}", alphabet);
}

// ==================== MonoidStructure ====================

/// Example 3: packaging data with its monoid.
fn example_monoid_structure() {
    println!("\n=== Example 3: MonoidStructure ===");

    let latencies: Seq<u32> = seq![120, 85, 240, 95, 310, 70];
    let sums: Seq<Sum<u32>> = latencies.map(|l| Sum(*l));
    let peaks: Seq<Option<Max<u32>>> = latencies.map(|l| Some(Max(*l)));

    println!("total latency: {:?}", par_fold_all(&sums, 2));
    println!("peak latency: {:?}", par_fold_all(&peaks, 2));

    let empty = MonoidStructure::new(Seq::<u32>::new(), |a: u32, b: u32| a + b, 0);
    println!("empty fold: {}", empty.fold());
}

// ==================== Configured executor ====================

/// Example 4: named workers and verbose partition logging.
fn example_configured_executor() {
    println!("\n=== Example 4: Configured Executor ===");

    let parallel = Parallel::new(
        Settings::default()
            .with_thread_name("aggregate")
            .with_verbose(true),
    );
    let ids: Seq<u32> = (0..12).collect();
    let workers = parallel.map(
        &ids,
        |_| std::thread::current().name().unwrap_or_default().to_string(),
        3,
    );
    println!("worker names: {:?}", workers);

    let structure = MonoidStructure::from_monoid(ids.map(|id| vec![*id]));
    println!("concatenated: {:?}", structure.par_fold_with(&parallel, 5));
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("Parallel Aggregation Examples");
    println!("=============================");

    example_par_map();
    example_par_fold();
    example_monoid_structure();
    example_configured_executor();

    println!("\n=== All examples completed successfully! ===");
}
