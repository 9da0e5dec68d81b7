//! Common helpers for workflow tests.

use std::time::Duration;
use workflow_tests::WorkflowEnv;

/// Upper bound for UI-side state to settle after real network calls.
pub const SETTLE_TIMEOUT: Duration = Duration::from_secs(5);

/// Start a fresh backend for one test.
pub async fn setup() -> WorkflowEnv {
    WorkflowEnv::start()
        .await
        .expect("Failed to start listing-service for workflow test")
}

/// Polls `check` until it holds or the settle timeout elapses.
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    let start = std::time::Instant::now();
    while start.elapsed() < SETTLE_TIMEOUT {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    check()
}
