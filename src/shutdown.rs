#![forbid(unsafe_code)]
#![deny(warnings)]
#![warn(clippy::pedantic)]

use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

use crate::domain::AppState;
use crate::service::request_stop;

/// Waits for Ctrl-C, SIGTERM or the optional run duration, whichever comes
/// first, then cancels the load.
pub async fn cancel_on_shutdown(state: AppState, duration: Option<Duration>) {
    let reason = tokio::select! {
        () = interrupt() => "interrupt",
        () = terminate() => "terminate",
        () = deadline(duration) => "duration elapsed",
    };
    request_stop(&state, reason);
}

async fn interrupt() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "ctrl-c handler unavailable");
        std::future::pending::<()>().await;
    }
}

#[cfg(unix)]
async fn terminate() {
    use tokio::signal::unix::{signal, SignalKind};
    match signal(SignalKind::terminate()) {
        Ok(mut stream) => {
            stream.recv().await;
        }
        Err(e) => {
            warn!(error = %e, "SIGTERM handler unavailable");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await;
}

async fn deadline(duration: Option<Duration>) {
    match duration {
        Some(d) => sleep(d).await,
        None => std::future::pending::<()>().await,
    }
}
