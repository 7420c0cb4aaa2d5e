#![forbid(unsafe_code)]
#![deny(warnings)]
#![warn(clippy::pedantic)]

use anyhow::Result as AnyResult;
use rand::rngs::SmallRng;
use rand::{RngCore, SeedableRng};
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::domain::{MemoryPool, MEGABYTES_PER_GIGABYTE};
use crate::metrics::Metrics;
use crate::signal::CancellationSignal;
use crate::worker::WorkerHandle;

pub const CHUNK_BYTES: usize = 1024 * 1024;
pub const PAGE_BYTES: usize = 4096;
pub const PROGRESS_EVERY_CHUNKS: usize = MEGABYTES_PER_GIGABYTE;
pub const RETENTION_INTERVAL: Duration = Duration::from_secs(1);

/// Ordered 1 MiB chunks owned by a single holder.
#[derive(Debug, Default)]
pub struct MemoryBlocks {
    chunks: Vec<Box<[u8]>>,
}

impl MemoryBlocks {
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn total_bytes(&self) -> usize {
        self.chunks.iter().map(|c| c.len()).sum()
    }

    pub fn chunk(&self, index: usize) -> Option<&[u8]> {
        self.chunks.get(index).map(|c| &c[..])
    }

    /// Increments one byte in every page of every chunk. Returns the number
    /// of pages touched.
    pub fn touch_pages(&mut self) -> usize {
        let mut pages = 0;
        for chunk in &mut self.chunks {
            for offset in (0..chunk.len()).step_by(PAGE_BYTES) {
                chunk[offset] = chunk[offset].wrapping_add(1);
                pages += 1;
            }
        }
        let _ = std::hint::black_box(&mut self.chunks);
        pages
    }
}

#[derive(Debug)]
pub enum Allocation {
    Complete(MemoryBlocks),
    /// Cancellation was observed; the chunks allocated so far were released.
    Aborted { allocated_chunks: usize },
}

#[derive(Clone)]
pub struct MemoryHolder {
    pool: MemoryPool,
    metrics: Metrics,
}

impl MemoryHolder {
    pub fn new(pool: MemoryPool, metrics: Metrics) -> Self {
        Self { pool, metrics }
    }

    pub fn pool(&self) -> MemoryPool {
        self.pool
    }

    /// Allocates `target_megabytes` random-filled chunks on the calling
    /// thread, checking `signal` before each one.
    pub fn allocate(&self, target_megabytes: usize, signal: &CancellationSignal) -> Allocation {
        let allocated = self.metrics.allocated_bytes(self.pool);
        let target = self.metrics.target_bytes(self.pool);
        target.set(bytes_gauge(target_megabytes.saturating_mul(CHUNK_BYTES)));
        let mut rng = SmallRng::from_entropy();
        let mut blocks = MemoryBlocks {
            chunks: Vec::with_capacity(target_megabytes),
        };
        let started = Instant::now();
        for _ in 0..target_megabytes {
            if signal.is_cancelled() {
                let allocated_chunks = blocks.len();
                drop(blocks);
                allocated.set(0);
                target.set(0);
                warn!(pool = %self.pool, allocated_chunks, target_megabytes, "allocation aborted");
                return Allocation::Aborted { allocated_chunks };
            }
            let mut chunk = vec![0u8; CHUNK_BYTES].into_boxed_slice();
            rng.fill_bytes(&mut chunk);
            blocks.chunks.push(chunk);
            allocated.add(bytes_gauge(CHUNK_BYTES));
            if blocks.len() % PROGRESS_EVERY_CHUNKS == 0 {
                info!(
                    pool = %self.pool,
                    gigabytes = blocks.len() / PROGRESS_EVERY_CHUNKS,
                    elapsed_ms = started.elapsed().as_millis(),
                    "allocation progress"
                );
            }
            std::thread::yield_now();
        }
        info!(pool = %self.pool, megabytes = blocks.len(), "allocation complete");
        Allocation::Complete(blocks)
    }

    /// Allocates, then hands the chunks to a retention thread. Returns a
    /// no-op handle when there is nothing to hold or allocation was aborted.
    pub fn start(
        &self,
        target_megabytes: usize,
        signal: &CancellationSignal,
    ) -> AnyResult<WorkerHandle> {
        let name = format!("{}-memory", self.pool);
        if target_megabytes == 0 {
            return Ok(WorkerHandle::noop(name));
        }
        let blocks = match self.allocate(target_megabytes, signal) {
            Allocation::Complete(blocks) => blocks,
            Allocation::Aborted { .. } => return Ok(WorkerHandle::noop(name)),
        };
        let holder = self.clone();
        let signal = signal.clone();
        WorkerHandle::spawn(name, move || {
            holder.retain(blocks, &signal);
            Ok(())
        })
    }

    fn retain(&self, mut blocks: MemoryBlocks, signal: &CancellationSignal) {
        let passes = self.metrics.retention_passes(self.pool);
        while !signal.is_cancelled() {
            blocks.touch_pages();
            passes.inc();
            if signal.wait_timeout(RETENTION_INTERVAL) {
                break;
            }
        }
        info!(pool = %self.pool, megabytes = blocks.len(), "memory retention stopped");
        drop(blocks);
        self.metrics.allocated_bytes(self.pool).set(0);
    }
}

/// A [`MemoryHolder`] that only starts allocating after a cancellable delay.
#[derive(Clone)]
pub struct DelayedMemoryHolder {
    holder: MemoryHolder,
}

impl DelayedMemoryHolder {
    pub fn new(metrics: Metrics) -> Self {
        Self {
            holder: MemoryHolder::new(MemoryPool::Extra, metrics),
        }
    }

    /// Blocks the caller for `delay`, then behaves like
    /// [`MemoryHolder::start`]. Cancellation during the wait skips the
    /// allocation entirely.
    pub fn start(
        &self,
        target_megabytes: usize,
        delay: Duration,
        signal: &CancellationSignal,
    ) -> AnyResult<WorkerHandle> {
        let pool = self.holder.pool();
        if target_megabytes == 0 {
            return Ok(WorkerHandle::noop(format!("{pool}-memory")));
        }
        let pending = &self.holder.metrics.extra_memory_pending;
        info!(pool = %pool, target_megabytes, delay_seconds = delay.as_secs(), "extra memory scheduled");
        pending.set(1);
        let cancelled = signal.wait_timeout(delay);
        pending.set(0);
        if cancelled {
            info!(pool = %pool, "extra memory cancelled before delay elapsed");
            return Ok(WorkerHandle::noop(format!("{pool}-memory")));
        }
        info!(pool = %pool, target_megabytes, "extra memory delay elapsed");
        self.holder.start(target_megabytes, signal)
    }
}

fn bytes_gauge(bytes: usize) -> i64 {
    i64::try_from(bytes).unwrap_or(i64::MAX)
}
