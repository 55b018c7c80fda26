use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Duration};
use tracing::{info, warn};

use super::models::BillingPeriod;
use super::service::BillingService;

/// Stop handle for a running billing scheduler.
///
/// Closing the channel (via [`shutdown`](Self::shutdown) or by dropping the
/// handle) ends the loop; `main` keeps the handle alive for the life of the
/// process.
pub struct BillingSchedulerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl BillingSchedulerHandle {
    /// Signals the scheduler loop to stop and waits for the task to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        let _ = self.task.await;
    }
}

/// Starts the recurring billing generation trigger.
///
/// The first tick completes immediately, so a process that was offline when a
/// firing was due closes the gap at startup; idempotent generation makes late
/// or repeated passes harmless. Tick errors are logged and the next firing
/// proceeds normally.
pub fn spawn(pool: PgPool, interval: Duration) -> BillingSchedulerHandle {
    let (tx, mut rx) = watch::channel(false);
    let task = tokio::spawn(async move {
        let mut ticker = time::interval(interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match process_tick(&pool, Utc::now()).await {
                        Ok(created) if created > 0 => {
                            info!(created, "billing generation pass created new bills");
                        }
                        Ok(_) => {}
                        Err(err) => warn!(?err, "billing generation tick failed"),
                    }
                }
                _ = rx.changed() => break,
            }
        }
    });

    BillingSchedulerHandle { shutdown: tx, task }
}

/// One generation pass for the period `now` falls in. Returns the number of
/// bills created.
pub async fn process_tick(pool: &PgPool, now: DateTime<Utc>) -> Result<u64> {
    let service = BillingService::new(pool.clone());
    let period = BillingPeriod::from_datetime(now);
    let created = service.generate_for_period(&period).await?;
    Ok(created)
}
