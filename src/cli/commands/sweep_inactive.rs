//! One-shot inactivity sweep command handler

use std::sync::Arc;

use crate::config::Config;
use crate::maintenance;
use crate::state::SharedState;

pub async fn cmd_sweep_inactive(config: &Config) -> anyhow::Result<()> {
    let inactivity_days = config.security.lockout.inactivity_days;
    let state = Arc::new(SharedState::new(config.clone()).await?);

    let marked = maintenance::mark_inactive_accounts(&state, inactivity_days).await?;
    if marked == 0 {
        println!("No dormant accounts found.");
    } else {
        println!("Marked {marked} account(s) inactive.");
    }

    Ok(())
}
