#![forbid(unsafe_code)]
#![deny(warnings)]
#![warn(clippy::pedantic)]

use anyhow::{Context, Result as AnyResult};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::domain::{AppState, MemoryPool, ResourceTargets};
use crate::lib_cpu::{CpuBurner, HASH_BUFFER_BYTES};
use crate::lib_mem::{DelayedMemoryHolder, MemoryHolder};
use crate::metrics::Metrics;
use crate::signal::CancellationSignal;
use crate::worker::WorkerHandle;

/// Starts every worker for a [`ResourceTargets`] and waits for them.
#[derive(Clone)]
pub struct Orchestrator {
    metrics: Metrics,
    hash_buffer_bytes: usize,
}

impl Orchestrator {
    pub fn new(metrics: Metrics) -> Self {
        Self {
            metrics,
            hash_buffer_bytes: HASH_BUFFER_BYTES,
        }
    }

    #[must_use]
    pub fn with_hash_buffer_bytes(mut self, hash_buffer_bytes: usize) -> Self {
        self.hash_buffer_bytes = hash_buffer_bytes;
        self
    }

    /// Runs the load until `signal` is cancelled and every worker has exited.
    pub fn run(&self, targets: &ResourceTargets, signal: &CancellationSignal) -> AnyResult<()> {
        self.start(targets, signal)?.join()
    }

    /// Starts CPU burners and the delayed path, then allocates the
    /// immediate memory on the calling thread before returning.
    pub fn start(
        &self,
        targets: &ResourceTargets,
        signal: &CancellationSignal,
    ) -> AnyResult<RunningLoad> {
        info!(
            cpu_cores = targets.cpu_workers(),
            memory_megabytes = targets.memory_megabytes(),
            extra_memory_megabytes = targets.extra_memory_megabytes(),
            extra_memory_delay_seconds = targets.extra_memory_delay_seconds,
            "starting load"
        );
        let mut running = RunningLoad::new(
            Vec::with_capacity(targets.cpu_workers()),
            WorkerHandle::noop("immediate-memory"),
            WorkerHandle::noop("extra-memory-delay"),
        );
        if let Err(e) = self.start_into(&mut running, targets, signal) {
            if let Err(join_err) = running.cancel_and_join(signal) {
                warn!(error = %format!("{join_err:#}"), "join after failed start");
            }
            return Err(e);
        }
        Ok(running)
    }

    fn start_into(
        &self,
        running: &mut RunningLoad,
        targets: &ResourceTargets,
        signal: &CancellationSignal,
    ) -> AnyResult<()> {
        let burner = CpuBurner::new(self.metrics.clone()).with_buffer_bytes(self.hash_buffer_bytes);
        for index in 0..targets.cpu_workers() {
            running.cpu.push(burner.start(index, signal)?);
        }

        // The delay counts from here, not from the end of the immediate
        // allocation below.
        let megabytes = targets.extra_memory_megabytes();
        if megabytes > 0 {
            let delayed = DelayedMemoryHolder::new(self.metrics.clone());
            let delay = targets.extra_memory_delay();
            let signal = signal.clone();
            running.extra_memory = WorkerHandle::spawn("extra-memory-delay", move || {
                delayed.start(megabytes, delay, &signal)?.join()
            })?;
        }

        running.memory = MemoryHolder::new(MemoryPool::Immediate, self.metrics.clone())
            .start(targets.memory_megabytes(), signal)?;
        Ok(())
    }
}

/// Handles of a started load, joined CPU first, then immediate memory,
/// then the delayed path.
#[must_use = "a running load should be joined"]
#[derive(Debug)]
pub struct RunningLoad {
    cpu: Vec<WorkerHandle>,
    memory: WorkerHandle,
    extra_memory: WorkerHandle,
}

impl RunningLoad {
    pub fn new(cpu: Vec<WorkerHandle>, memory: WorkerHandle, extra_memory: WorkerHandle) -> Self {
        Self {
            cpu,
            memory,
            extra_memory,
        }
    }

    pub fn cpu_workers(&self) -> usize {
        self.cpu.len()
    }

    pub fn memory_is_noop(&self) -> bool {
        self.memory.is_noop()
    }

    pub fn extra_memory_is_noop(&self) -> bool {
        self.extra_memory.is_noop()
    }

    /// Joins every handle, even after a failure, and returns the first error.
    pub fn join(self) -> AnyResult<()> {
        let mut first_err = None;
        let workers = self
            .cpu
            .into_iter()
            .chain([self.memory, self.extra_memory]);
        for worker in workers {
            let name = worker.name().to_owned();
            if let Err(e) = worker.join().with_context(|| format!("join {name}")) {
                error!(worker = %name, error = %format!("{e:#}"), "worker failed");
                if first_err.is_none() {
                    first_err = Some(e);
                }
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => {
                info!("all workers finished");
                Ok(())
            }
        }
    }

    /// Cancels `signal` and then joins every handle.
    pub fn cancel_and_join(self, signal: &CancellationSignal) -> AnyResult<()> {
        signal.cancel();
        self.join()
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct StatusReport {
    pub status: String,
    pub cancelled: bool,
    pub targets: ResourceTargets,
    pub started_ts_seconds: i64,
    pub uptime_seconds: i64,
    pub cpu_workers_active: i64,
    pub cpu_hash_iterations_total: u64,
    pub memory_allocated_bytes: i64,
    pub extra_memory_allocated_bytes: i64,
    pub extra_memory_pending: bool,
    pub metrics_ok: bool,
}

impl StatusReport {
    pub fn collect(state: &AppState, now_ts: i64) -> Self {
        let metrics = &state.metrics;
        let cancelled = state.signal.is_cancelled();
        let metrics_ok = metrics.encode_text().is_ok();
        let status = match (metrics_ok, cancelled) {
            (false, _) => "degraded",
            (true, true) => "stopping",
            (true, false) => "running",
        };
        StatusReport {
            status: status.to_string(),
            cancelled,
            targets: state.targets,
            started_ts_seconds: state.started_ts_seconds,
            uptime_seconds: (now_ts - state.started_ts_seconds).max(0),
            cpu_workers_active: metrics.cpu_workers_active.get(),
            cpu_hash_iterations_total: metrics.cpu_hash_iterations_total.get(),
            memory_allocated_bytes: metrics.allocated_bytes(MemoryPool::Immediate).get(),
            extra_memory_allocated_bytes: metrics.allocated_bytes(MemoryPool::Extra).get(),
            extra_memory_pending: metrics.extra_memory_pending.get() == 1,
            metrics_ok,
        }
    }
}

/// Cancels the load and records it; safe to call any number of times.
pub fn request_stop(state: &AppState, reason: &str) -> bool {
    let first = state.signal.cancel();
    state.metrics.cancelled.set(1);
    if first {
        info!(reason, "cancellation requested");
    }
    first
}
