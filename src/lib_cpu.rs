#![forbid(unsafe_code)]
#![deny(warnings)]
#![warn(clippy::pedantic)]

use anyhow::Result as AnyResult;
use rand::rngs::SmallRng;
use rand::{RngCore, SeedableRng};
use sha2::{Digest, Sha512};
use tracing::{debug, info};

use crate::metrics::{ActiveGuard, Metrics};
use crate::signal::CancellationSignal;
use crate::worker::WorkerHandle;

pub const HASH_BUFFER_BYTES: usize = 32 * 1024 * 1024;

/// Keeps one logical core busy by hashing a fixed random buffer in a loop.
#[derive(Clone)]
pub struct CpuBurner {
    buffer_bytes: usize,
    metrics: Metrics,
}

impl CpuBurner {
    pub fn new(metrics: Metrics) -> Self {
        Self {
            buffer_bytes: HASH_BUFFER_BYTES,
            metrics,
        }
    }

    #[must_use]
    pub fn with_buffer_bytes(mut self, buffer_bytes: usize) -> Self {
        self.buffer_bytes = buffer_bytes.max(1);
        self
    }

    pub fn buffer_bytes(&self) -> usize {
        self.buffer_bytes
    }

    pub fn start(&self, index: usize, signal: &CancellationSignal) -> AnyResult<WorkerHandle> {
        let buffer_bytes = self.buffer_bytes;
        let metrics = self.metrics.clone();
        let signal = signal.clone();
        WorkerHandle::spawn(format!("cpu-burner-{index}"), move || {
            burn(index, buffer_bytes, &signal, &metrics);
            Ok(())
        })
    }
}

fn burn(index: usize, buffer_bytes: usize, signal: &CancellationSignal, metrics: &Metrics) {
    let _active = ActiveGuard::new(metrics.cpu_workers_active.clone());
    debug!(worker = index, buffer_bytes, "cpu burner started");
    // Generated once so the loop measures hashing, not allocation.
    let mut buffer = vec![0u8; buffer_bytes];
    SmallRng::from_entropy().fill_bytes(&mut buffer);
    let mut iterations = 0u64;
    while !signal.is_cancelled() {
        let digest = Sha512::digest(&buffer);
        let _ = std::hint::black_box(digest);
        iterations += 1;
        metrics.cpu_hash_iterations_total.inc();
    }
    info!(worker = index, iterations, "cpu burner stopped");
}
