#![forbid(unsafe_code)]
#![deny(warnings)]
#![warn(clippy::pedantic)]

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::metrics::Metrics;
use crate::signal::CancellationSignal;

pub const DEFAULT_EXTRA_MEMORY_DELAY_SECONDS: u64 = 300;
pub const MEGABYTES_PER_GIGABYTE: usize = 1024;

/// Validated load profile. Built once at startup and never mutated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceTargets {
    pub cpu_cores: Option<u32>,
    pub memory_gigabytes: Option<u32>,
    pub extra_memory_gigabytes: Option<u32>,
    pub extra_memory_delay_seconds: u64,
}

impl Default for ResourceTargets {
    fn default() -> Self {
        Self {
            cpu_cores: None,
            memory_gigabytes: None,
            extra_memory_gigabytes: None,
            extra_memory_delay_seconds: DEFAULT_EXTRA_MEMORY_DELAY_SECONDS,
        }
    }
}

impl ResourceTargets {
    pub fn cpu_workers(&self) -> usize {
        self.cpu_cores.map_or(0, |n| n as usize)
    }

    pub fn memory_megabytes(&self) -> usize {
        gigabytes_to_megabytes(self.memory_gigabytes)
    }

    pub fn extra_memory_megabytes(&self) -> usize {
        gigabytes_to_megabytes(self.extra_memory_gigabytes)
    }

    pub fn extra_memory_delay(&self) -> Duration {
        Duration::from_secs(self.extra_memory_delay_seconds)
    }
}

// Saturates rather than wraps; validation rejects sizes that do not fit.
fn gigabytes_to_megabytes(gigabytes: Option<u32>) -> usize {
    gigabytes.map_or(0, |gb| (gb as usize).saturating_mul(MEGABYTES_PER_GIGABYTE))
}

/// Which memory holder a series or log line belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryPool {
    Immediate,
    Extra,
}

impl MemoryPool {
    pub fn as_str(self) -> &'static str {
        match self {
            MemoryPool::Immediate => "immediate",
            MemoryPool::Extra => "extra",
        }
    }
}

impl std::fmt::Display for MemoryPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone)]
pub struct AppState {
    pub signal: CancellationSignal,
    pub metrics: Metrics,
    pub targets: ResourceTargets,
    pub started_ts_seconds: i64,
}

impl AppState {
    pub fn new(signal: CancellationSignal, metrics: Metrics, targets: ResourceTargets) -> Self {
        Self {
            signal,
            metrics,
            targets,
            started_ts_seconds: chrono::Utc::now().timestamp(),
        }
    }
}
