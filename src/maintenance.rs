//! Background maintenance.
//!
//! Two jobs keep the process-local and persistent state bounded: a
//! fixed-interval sweep that evicts expired CSRF tokens and stale origin
//! records, and a daily cron job that marks long-idle accounts inactive.

use anyhow::Result;
use chrono::{Duration as ChronoDuration, Utc};
use std::sync::Arc;
use tokio::time::{Duration, interval};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{debug, error, info};

use crate::state::SharedState;

pub struct Maintenance {
    state: Arc<SharedState>,
}

impl Maintenance {
    #[must_use]
    pub fn new(state: Arc<SharedState>) -> Self {
        Self { state }
    }

    pub async fn start(&self) -> Result<()> {
        let config = self.state.config().await;

        if !config.maintenance.enabled {
            info!("Maintenance jobs are disabled in config");
            return Ok(());
        }

        let sched = JobScheduler::new().await?;

        let state = Arc::clone(&self.state);
        let inactivity_days = config.security.lockout.inactivity_days;
        let inactivity_job = Job::new_async(
            config.maintenance.inactivity_cron.as_str(),
            move |_uuid, _lock| {
                let state = Arc::clone(&state);
                Box::pin(async move {
                    if let Err(e) = mark_inactive_accounts(&state, inactivity_days).await {
                        error!("Inactivity job failed: {}", e);
                    }
                })
            },
        )?;

        sched.add(inactivity_job).await?;
        sched.start().await?;

        info!(
            cron = %config.maintenance.inactivity_cron,
            sweep_seconds = config.maintenance.sweep_interval_seconds,
            "Maintenance jobs scheduled"
        );

        let mut sweep_interval = interval(Duration::from_secs(
            config.maintenance.sweep_interval_seconds.max(1),
        ));

        loop {
            sweep_interval.tick().await;
            sweep_ephemeral_state(&self.state);
        }
    }
}

/// Evicts expired CSRF tokens and elapsed origin records. Cheap enough to
/// run every few minutes; both maps hold their lock only for a `retain`.
pub fn sweep_ephemeral_state(state: &SharedState) {
    let now = Utc::now();

    state.csrf.sweep(now);
    state.origin_guard.sweep(now);

    debug!(
        csrf_tokens = state.csrf.len(),
        origins = state.origin_guard.tracked_origins(),
        "Swept ephemeral auth state"
    );
}

/// Moves accounts whose last login predates the inactivity window to
/// `inactive`. Runs daily; accounts that never logged in are left alone.
pub async fn mark_inactive_accounts(state: &SharedState, inactivity_days: i64) -> Result<u64> {
    let cutoff = Utc::now() - ChronoDuration::days(inactivity_days);
    let changed = state.store.mark_inactive(cutoff).await?;

    if changed > 0 {
        info!(accounts = changed, "Marked idle accounts inactive");
    }

    Ok(changed)
}
