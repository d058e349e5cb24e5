//! Recurring reconciliation loop
//!
//! A failed pass is logged and retried on the next tick; the cursor has not
//! moved, so nothing is lost.

use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{Duration, MissedTickBehavior, interval};
use tracing::{error, info, warn};

use crate::reconcile::ReconciliationEngine;

/// Run a pass every `period`, starting immediately
pub fn spawn_scheduler(engine: Arc<ReconciliationEngine>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(
            "Scheduler started for {}, interval {:?}",
            engine.wallet_address(),
            period
        );
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            run_and_log(&engine).await;
        }
    })
}

/// One scheduled pass; errors are logged, never propagated
pub async fn run_and_log(engine: &ReconciliationEngine) {
    match engine.run_pass().await {
        Ok(report) if report.is_clean() => {}
        Ok(report) => warn!(
            "{}: {} order updates failed, cursor held at {}",
            engine.wallet_address(),
            report.failures.len(),
            report.cursor_after
        ),
        Err(e) if e.is_retryable() => {
            warn!("{}: pass failed, retrying next tick: {}", engine.wallet_address(), e)
        }
        Err(e) => error!("{}: pass failed: {}", engine.wallet_address(), e),
    }
}
