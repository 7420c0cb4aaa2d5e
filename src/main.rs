#![forbid(unsafe_code)]
#![deny(warnings)]
#![warn(clippy::pedantic)]

use anyhow::{Context, Result as AnyResult};
use clap::Parser;
use resource_loadgen::shutdown::cancel_on_shutdown;
use resource_loadgen::{server, AppState, CancellationSignal, Config, Metrics, Orchestrator};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt = tracing_subscriber::fmt().with_env_filter(filter);
    fmt.json().init();
}

#[tokio::main]
async fn main() -> AnyResult<()> {
    let config = Config::parse();
    init_tracing();
    config.validate()?;
    let targets = config.targets();

    let available = std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get);
    if targets.cpu_workers() > available {
        warn!(requested = targets.cpu_workers(), available, "more cpu workers than logical cores");
    }

    let metrics = Metrics::new()?;
    let signal = CancellationSignal::new();
    let state = AppState::new(signal.clone(), metrics.clone(), targets);

    let http = server(&config.metrics_bind, state.clone())
        .with_context(|| format!("bind metrics endpoint {}", config.metrics_bind))?;
    let http_handle = http.handle();
    let http_task = tokio::spawn(http);
    info!(bind = %config.metrics_bind, "metrics endpoint listening");

    tokio::spawn(cancel_on_shutdown(state, config.duration()));

    let orchestrator = Orchestrator::new(metrics).with_hash_buffer_bytes(config.hash_buffer_bytes());
    tokio::task::spawn_blocking(move || orchestrator.run(&targets, &signal))
        .await
        .context("orchestrator task")??;

    http_handle.stop(true).await;
    http_task
        .await
        .context("metrics endpoint task")?
        .context("metrics endpoint")?;
    info!("shutdown complete");
    Ok(())
}
