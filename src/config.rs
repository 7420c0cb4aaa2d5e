#![forbid(unsafe_code)]
#![deny(warnings)]
#![warn(clippy::pedantic)]

use anyhow::{bail, Result as AnyResult};
use clap::Parser;
use std::time::Duration;

use crate::domain::{ResourceTargets, DEFAULT_EXTRA_MEMORY_DELAY_SECONDS};
use crate::lib_cpu::HASH_BUFFER_BYTES;
use crate::lib_mem::CHUNK_BYTES;
use crate::validation::validate_targets;

/// Consume CPU cores and memory on demand while exposing Prometheus metrics
#[derive(Clone, Debug, Parser)]
#[command(name = "resource-loadgen", version, about)]
pub struct Config {
    /// Number of CPU cores to keep busy
    #[arg(long = "cpu", env = "LOADGEN_CPU")]
    pub cpu_cores: Option<u32>,

    /// Gigabytes of memory to allocate at startup
    #[arg(long = "memory", env = "LOADGEN_MEMORY")]
    pub memory_gigabytes: Option<u32>,

    /// Gigabytes of memory to allocate after --extra-memory-delay
    #[arg(long = "extra-memory", env = "LOADGEN_EXTRA_MEMORY")]
    pub extra_memory_gigabytes: Option<u32>,

    /// Seconds to wait before allocating the extra memory
    #[arg(
        long = "extra-memory-delay",
        env = "LOADGEN_EXTRA_MEMORY_DELAY",
        default_value_t = DEFAULT_EXTRA_MEMORY_DELAY_SECONDS
    )]
    pub extra_memory_delay_seconds: u64,

    /// Address the metrics endpoint listens on
    #[arg(long, env = "LOADGEN_METRICS_BIND", default_value = "0.0.0.0:9090")]
    pub metrics_bind: String,

    /// Stop on our own after this many seconds
    #[arg(long = "duration", env = "LOADGEN_DURATION")]
    pub duration_seconds: Option<u64>,

    /// Size of the buffer each CPU worker hashes, in MiB
    #[arg(
        long = "hash-buffer-mb",
        env = "LOADGEN_HASH_BUFFER_MB",
        default_value_t = HASH_BUFFER_BYTES / CHUNK_BYTES
    )]
    pub hash_buffer_megabytes: usize,
}

impl Config {
    pub fn targets(&self) -> ResourceTargets {
        ResourceTargets {
            cpu_cores: self.cpu_cores,
            memory_gigabytes: self.memory_gigabytes,
            extra_memory_gigabytes: self.extra_memory_gigabytes,
            extra_memory_delay_seconds: self.extra_memory_delay_seconds,
        }
    }

    pub fn duration(&self) -> Option<Duration> {
        self.duration_seconds.map(Duration::from_secs)
    }

    pub fn hash_buffer_bytes(&self) -> usize {
        self.hash_buffer_megabytes.saturating_mul(CHUNK_BYTES)
    }

    pub fn validate(&self) -> AnyResult<()> {
        validate_targets(&self.targets())?;
        if self.hash_buffer_megabytes == 0 {
            bail!("--hash-buffer-mb must be > 0");
        }
        Ok(())
    }
}
