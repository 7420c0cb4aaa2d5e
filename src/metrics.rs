#![forbid(unsafe_code)]
#![deny(warnings)]
#![warn(clippy::pedantic)]

use anyhow::{Context, Result as AnyResult};
use prometheus::{
    Encoder, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry, TextEncoder,
};

use crate::domain::MemoryPool;

#[derive(Clone)]
pub struct Metrics {
    pub registry: Registry,
    pub cpu_workers_active: IntGauge,
    pub cpu_hash_iterations_total: IntCounter,
    pub memory_allocated_bytes: IntGaugeVec,
    pub memory_target_bytes: IntGaugeVec,
    pub memory_retention_passes_total: IntCounterVec,
    pub extra_memory_pending: IntGauge,
    pub cancelled: IntGauge,
}

impl Metrics {
    pub fn new() -> AnyResult<Self> {
        let registry = Registry::new();
        let cpu_workers_active = IntGauge::with_opts(Opts::new(
            "loadgen_cpu_workers_active",
            "CPU burner threads currently running",
        ))
        .context("create cpu_workers_active")?;
        let cpu_hash_iterations_total = IntCounter::with_opts(Opts::new(
            "loadgen_cpu_hash_iterations_total",
            "completed SHA-512 passes over the burner buffer",
        ))
        .context("create cpu_hash_iterations_total")?;
        registry
            .register(Box::new(cpu_workers_active.clone()))
            .context("register cpu_workers_active")?;
        registry
            .register(Box::new(cpu_hash_iterations_total.clone()))
            .context("register cpu_hash_iterations_total")?;
        let memory_allocated_bytes = IntGaugeVec::new(
            Opts::new("loadgen_memory_allocated_bytes", "bytes held by a memory pool"),
            &["pool"],
        )
        .context("create memory_allocated_bytes")?;
        let memory_target_bytes = IntGaugeVec::new(
            Opts::new("loadgen_memory_target_bytes", "requested bytes for a memory pool"),
            &["pool"],
        )
        .context("create memory_target_bytes")?;
        let memory_retention_passes_total = IntCounterVec::new(
            Opts::new(
                "loadgen_memory_retention_passes_total",
                "page-touch passes over a memory pool",
            ),
            &["pool"],
        )
        .context("create memory_retention_passes_total")?;
        registry
            .register(Box::new(memory_allocated_bytes.clone()))
            .context("register memory_allocated_bytes")?;
        registry
            .register(Box::new(memory_target_bytes.clone()))
            .context("register memory_target_bytes")?;
        registry
            .register(Box::new(memory_retention_passes_total.clone()))
            .context("register memory_retention_passes_total")?;
        let extra_memory_pending = IntGauge::with_opts(Opts::new(
            "loadgen_extra_memory_pending",
            "1 while the extra memory is waiting for its delay",
        ))
        .context("create extra_memory_pending")?;
        let cancelled = IntGauge::with_opts(Opts::new(
            "loadgen_cancelled",
            "1 once shutdown has been requested",
        ))
        .context("create cancelled")?;
        registry
            .register(Box::new(extra_memory_pending.clone()))
            .context("register extra_memory_pending")?;
        registry
            .register(Box::new(cancelled.clone()))
            .context("register cancelled")?;
        #[cfg(target_os = "linux")]
        registry
            .register(Box::new(
                prometheus::process_collector::ProcessCollector::for_self(),
            ))
            .context("register process collector")?;
        Ok(Self {
            registry,
            cpu_workers_active,
            cpu_hash_iterations_total,
            memory_allocated_bytes,
            memory_target_bytes,
            memory_retention_passes_total,
            extra_memory_pending,
            cancelled,
        })
    }

    pub fn allocated_bytes(&self, pool: MemoryPool) -> IntGauge {
        self.memory_allocated_bytes.with_label_values(&[pool.as_str()])
    }

    pub fn target_bytes(&self, pool: MemoryPool) -> IntGauge {
        self.memory_target_bytes.with_label_values(&[pool.as_str()])
    }

    pub fn retention_passes(&self, pool: MemoryPool) -> IntCounter {
        self.memory_retention_passes_total
            .with_label_values(&[pool.as_str()])
    }

    pub fn encode_text(&self) -> AnyResult<Vec<u8>> {
        let mut buf = Vec::new();
        let encoder = TextEncoder::new();
        let mf = self.registry.gather();
        encoder.encode(&mf, &mut buf).context("encode metrics")?;
        Ok(buf)
    }
}

/// Holds a gauge at +1 for as long as it lives.
pub struct ActiveGuard {
    gauge: IntGauge,
}

impl ActiveGuard {
    pub fn new(gauge: IntGauge) -> Self {
        gauge.inc();
        Self { gauge }
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.gauge.dec();
    }
}
