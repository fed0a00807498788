use std::sync::Arc;
use std::time::Duration;

use tokio::time::{MissedTickBehavior, interval};
use tracing::{error, info, warn};

use crate::{app_error::AppError, use_cases::subscription::SubscriptionUseCases};

pub async fn run_expiry_sweep_loop(subscriptions: Arc<SubscriptionUseCases>, every: Duration) {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(
        "Expiry sweeper started (sweeping every {}s)",
        every.as_secs()
    );

    loop {
        ticker.tick().await;
        run_once(&subscriptions).await;
    }
}

async fn run_once(subscriptions: &SubscriptionUseCases) {
    match subscriptions.process_expired().await {
        Ok(report) if report.failed > 0 => {
            warn!(
                candidates = report.candidates,
                failed = report.failed,
                "Expiry sweep finished with failures"
            );
        }
        Ok(_) => {}
        Err(AppError::Conflict(_)) => {
            // A manual sweep holds the lock; the next tick picks up anything left.
            info!("Expiry sweep skipped, another sweep is running");
        }
        Err(e) => {
            error!(error = ?e, "Expiry sweep failed");
        }
    }
}
