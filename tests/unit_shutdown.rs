#![forbid(unsafe_code)]
#![deny(warnings)]
#![warn(clippy::pedantic)]

use resource_loadgen::shutdown::cancel_on_shutdown;
use resource_loadgen::{AppState, CancellationSignal, Metrics, ResourceTargets};
use tokio::time::{timeout, Duration};

#[tokio::test]
async fn duration_cancels_signal() {
    let signal = CancellationSignal::new();
    let m = Metrics::new().expect("metrics");
    let state = AppState::new(signal.clone(), m.clone(), ResourceTargets::default());
    timeout(
        Duration::from_secs(5),
        cancel_on_shutdown(state, Some(Duration::from_millis(50))),
    )
    .await
    .expect("shutdown listener returned");
    assert!(signal.is_cancelled());
    assert_eq!(m.cancelled.get(), 1);
}
