//! Wall-clock scheduled jobs: the daily recycle-bin purge and the yearly
//! fiscal-year rollover.
//!
//! Each job is a tokio task that sleeps until the next cron occurrence in the
//! practice's time zone. A run that overlaps a cancellation finishes first.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use croner::Cron;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{DriveError, DriveResult};
use crate::routes::AppState;
use crate::services::{PurgeReport, RolloverReport};

/// A cron expression bound to a time zone
#[derive(Clone)]
pub struct Schedule {
    expression: String,
    cron: Cron,
    tz: Tz,
}

impl Schedule {
    pub fn parse(expression: &str, tz: Tz) -> DriveResult<Self> {
        let cron = Cron::new(expression)
            .parse()
            .map_err(|e| DriveError::Validation(format!("invalid schedule '{}': {}", expression, e)))?;
        Ok(Self {
            expression: expression.to_string(),
            cron,
            tz,
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// First occurrence strictly after `now`
    pub fn next_after(&self, now: DateTime<Utc>) -> DriveResult<DateTime<Utc>> {
        let local = now.with_timezone(&self.tz);
        let next = self
            .cron
            .find_next_occurrence(&local, false)
            .map_err(|e| DriveError::Internal(format!("no next run for '{}': {}", self.expression, e)))?;
        Ok(next.with_timezone(&Utc))
    }
}

/// Run `task` at every occurrence of `schedule` until `cancel` fires
pub fn spawn_scheduled<F, Fut>(
    name: &'static str,
    schedule: Schedule,
    cancel: CancellationToken,
    task: F,
) -> JoinHandle<()>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        tracing::info!("Scheduled job '{}' with '{}'", name, schedule.expression());
        loop {
            let now = Utc::now();
            let next = match schedule.next_after(now) {
                Ok(next) => next,
                Err(err) => {
                    tracing::error!("Job '{}' stopped: {}", name, err);
                    return;
                }
            };
            let wait = (next - now).to_std().unwrap_or_default();
            tracing::debug!("Job '{}' next run at {}", name, next);

            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Job '{}' cancelled", name);
                    return;
                }
                _ = tokio::time::sleep(wait) => {
                    task().await;
                }
            }
        }
    })
}

/// One purge sweep at `now`
pub async fn run_purge(state: &AppState, now: DateTime<Utc>) -> DriveResult<PurgeReport> {
    state.recycle_bin_service().purge_expired(now).await
}

/// One rollover across every registered client, dated in the practice's zone
pub async fn run_rollover(state: &AppState, now: DateTime<Utc>) -> DriveResult<RolloverReport> {
    state
        .client_service()
        .rollover(state.config.local_date(now))
        .await
}

/// Start the purge and rollover jobs from the drive configuration
pub fn spawn_drive_jobs(
    state: Arc<AppState>,
    cancel: CancellationToken,
) -> DriveResult<Vec<JoinHandle<()>>> {
    let tz = state.config.tz()?;
    let purge = Schedule::parse(&state.config.purge_schedule, tz)?;
    let rollover = Schedule::parse(&state.config.rollover_schedule, tz)?;

    let purge_state = state.clone();
    let purge_handle = spawn_scheduled("recycle-bin-purge", purge, cancel.clone(), move || {
        let state = purge_state.clone();
        async move {
            if let Err(err) = run_purge(&state, Utc::now()).await {
                tracing::error!("Recycle bin purge failed: {}", err);
            }
        }
    });

    let rollover_state = state;
    let rollover_handle = spawn_scheduled("fiscal-year-rollover", rollover, cancel, move || {
        let state = rollover_state.clone();
        async move {
            if let Err(err) = run_rollover(&state, Utc::now()).await {
                tracing::error!("Fiscal-year rollover failed: {}", err);
            }
        }
    });

    Ok(vec![purge_handle, rollover_handle])
}
