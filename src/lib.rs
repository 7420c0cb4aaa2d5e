#![forbid(unsafe_code)]
#![deny(warnings)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod domain;
pub mod http;
pub mod lib_cpu;
pub mod lib_mem;
pub mod metrics;
pub mod service;
pub mod shutdown;
pub mod signal;
pub mod validation;
pub mod worker;

pub use config::Config;
pub use domain::{AppState, MemoryPool, ResourceTargets};
pub use http::server;
pub use http::{healthz, scrape_metrics, status, stop};
pub use lib_cpu::CpuBurner;
pub use lib_mem::{DelayedMemoryHolder, MemoryHolder};
pub use metrics::Metrics;
pub use service::{Orchestrator, RunningLoad, StatusReport};
pub use signal::CancellationSignal;
pub use validation::validate_targets;
pub use worker::WorkerHandle;
