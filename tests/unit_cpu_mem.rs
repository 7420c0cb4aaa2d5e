#![forbid(unsafe_code)]
#![deny(warnings)]
#![warn(clippy::pedantic)]

use resource_loadgen::lib_cpu::HASH_BUFFER_BYTES;
use resource_loadgen::lib_mem::{Allocation, CHUNK_BYTES, PAGE_BYTES};
use resource_loadgen::{CancellationSignal, CpuBurner, MemoryHolder, MemoryPool, Metrics};
use std::thread;
use std::time::{Duration, Instant};

fn wait_for(what: &str, mut done: impl FnMut() -> bool) {
    let t0 = Instant::now();
    while !done() {
        assert!(t0.elapsed() < Duration::from_secs(10), "timed out waiting for {what}");
        thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn cpu_workers_run_until_cancelled() {
    let m = Metrics::new().expect("metrics");
    let signal = CancellationSignal::new();
    let burner = CpuBurner::new(m.clone()).with_buffer_bytes(64 * 1024);
    let handles: Vec<_> = (0..3)
        .map(|i| burner.start(i, &signal).expect("start"))
        .collect();
    wait_for("3 active workers", || m.cpu_workers_active.get() == 3);
    wait_for("hash iterations", || m.cpu_hash_iterations_total.get() > 0);
    assert!(handles.iter().all(|h| !h.is_finished()));

    let t0 = Instant::now();
    signal.cancel();
    for h in handles {
        h.join().expect("join");
    }
    assert!(t0.elapsed() < Duration::from_secs(2));
    assert_eq!(m.cpu_workers_active.get(), 0);
}

#[test]
fn hash_buffer_size() {
    let m = Metrics::new().expect("metrics");
    assert_eq!(CpuBurner::new(m.clone()).buffer_bytes(), HASH_BUFFER_BYTES);
    assert_eq!(CpuBurner::new(m.clone()).with_buffer_bytes(4096).buffer_bytes(), 4096);
    assert_eq!(CpuBurner::new(m).with_buffer_bytes(0).buffer_bytes(), 1);
}

#[test]
fn cpu_worker_started_after_cancel_exits() {
    let m = Metrics::new().expect("metrics");
    let signal = CancellationSignal::new();
    signal.cancel();
    let h = CpuBurner::new(m.clone())
        .with_buffer_bytes(1024)
        .start(0, &signal)
        .expect("start");
    h.join().expect("join");
    assert_eq!(m.cpu_hash_iterations_total.get(), 0);
}

#[test]
fn allocates_exact_chunk_count() {
    let m = Metrics::new().expect("metrics");
    let holder = MemoryHolder::new(MemoryPool::Immediate, m.clone());
    let Allocation::Complete(blocks) = holder.allocate(8, &CancellationSignal::new()) else {
        panic!("allocation aborted");
    };
    assert_eq!(blocks.len(), 8);
    assert_eq!(blocks.total_bytes(), 8 * CHUNK_BYTES);
    assert!((0..8).all(|i| blocks.chunk(i).map(<[u8]>::len) == Some(CHUNK_BYTES)));
    let expected = i64::try_from(8 * CHUNK_BYTES).expect("fits");
    assert_eq!(m.allocated_bytes(MemoryPool::Immediate).get(), expected);
    assert_eq!(m.target_bytes(MemoryPool::Immediate).get(), expected);
}

#[test]
fn touch_pages_increments_one_byte_per_page() {
    let m = Metrics::new().expect("metrics");
    let holder = MemoryHolder::new(MemoryPool::Immediate, m);
    let Allocation::Complete(mut blocks) = holder.allocate(2, &CancellationSignal::new()) else {
        panic!("allocation aborted");
    };
    let before: Vec<u8> = blocks.chunk(0).expect("chunk").to_vec();
    let pages = blocks.touch_pages();
    assert_eq!(pages, 2 * CHUNK_BYTES / PAGE_BYTES);
    let after = blocks.chunk(0).expect("chunk");
    assert_eq!(after[0], before[0].wrapping_add(1));
    assert_eq!(after[PAGE_BYTES], before[PAGE_BYTES].wrapping_add(1));
    assert_eq!(after[1], before[1]);
    assert_eq!(after[PAGE_BYTES + 1], before[PAGE_BYTES + 1]);
}

#[test]
fn cancel_before_allocation_allocates_nothing() {
    let m = Metrics::new().expect("metrics");
    let signal = CancellationSignal::new();
    signal.cancel();
    let holder = MemoryHolder::new(MemoryPool::Immediate, m.clone());
    match holder.allocate(16, &signal) {
        Allocation::Aborted { allocated_chunks } => assert_eq!(allocated_chunks, 0),
        Allocation::Complete(_) => panic!("allocation should abort"),
    }
    let h = holder.start(16, &signal).expect("start");
    assert!(h.is_noop());
    h.join().expect("join");
    assert_eq!(m.allocated_bytes(MemoryPool::Immediate).get(), 0);
    assert_eq!(m.target_bytes(MemoryPool::Immediate).get(), 0);
}

#[test]
fn cancel_during_allocation_stops_adding_chunks() {
    let m = Metrics::new().expect("metrics");
    let signal = CancellationSignal::new();
    let watcher = {
        let m = m.clone();
        let signal = signal.clone();
        thread::spawn(move || {
            let threshold = i64::try_from(4 * CHUNK_BYTES).expect("fits");
            while m.allocated_bytes(MemoryPool::Immediate).get() < threshold {
                thread::sleep(Duration::from_micros(100));
            }
            signal.cancel();
        })
    };
    let holder = MemoryHolder::new(MemoryPool::Immediate, m.clone());
    match holder.allocate(2048, &signal) {
        Allocation::Aborted { allocated_chunks } => {
            assert!(allocated_chunks >= 4);
            assert!(allocated_chunks < 2048);
        }
        Allocation::Complete(_) => panic!("allocation should abort"),
    }
    watcher.join().expect("watcher");
    assert_eq!(m.allocated_bytes(MemoryPool::Immediate).get(), 0);
    assert_eq!(m.target_bytes(MemoryPool::Immediate).get(), 0);
}

#[test]
fn zero_megabytes_is_noop() {
    let m = Metrics::new().expect("metrics");
    let h = MemoryHolder::new(MemoryPool::Immediate, m)
        .start(0, &CancellationSignal::new())
        .expect("start");
    assert!(h.is_noop());
    h.join().expect("join");
}

#[test]
fn retention_runs_until_cancelled() {
    let m = Metrics::new().expect("metrics");
    let signal = CancellationSignal::new();
    let h = MemoryHolder::new(MemoryPool::Immediate, m.clone())
        .start(4, &signal)
        .expect("start");
    assert!(!h.is_noop());
    wait_for("a retention pass", || m.retention_passes(MemoryPool::Immediate).get() > 0);
    assert!(!h.is_finished());

    let t0 = Instant::now();
    signal.cancel();
    h.join().expect("join");
    assert!(t0.elapsed() < Duration::from_secs(2));
}
