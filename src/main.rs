//! Scheduler binary: boots the billing ledger and triggers periodic
//! billing-cycle runs.
//!
//! The trigger loop is fire-and-forget with respect to any one run: a
//! failed run is logged and the loop continues, relying on cycle runs being
//! idempotent under re-delivery.

use billing_ledger::config::{self, schedule::Schedule};
use billing_ledger::core::{cycle, registry};
use billing_ledger::errors::Result;
use chrono::{Datelike, Utc};
use dotenvy::dotenv;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing as early as possible
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // .env is optional; env vars can be set externally
    dotenv().ok();

    let schedule = Schedule::from_env()?;
    info!(?schedule, "Loaded cycle schedule");

    let db = config::database::create_connection().await?;
    config::database::create_tables(&db).await?;
    info!("Database initialized");

    registry::seed_registry(&db).await?;

    let contract_config = config::contracts::load_default_config()?;
    config::contracts::seed_contracts(&db, &contract_config).await?;

    let mut ticker = tokio::time::interval(schedule.interval);
    loop {
        ticker.tick().await;

        let today = Utc::now().date_naive();
        if !schedule.allows(today.weekday()) {
            info!(weekday = %today.weekday(), "Outside run window, skipping trigger");
            continue;
        }

        if let Err(e) = cycle::reap_stale_locks(&db, schedule.lock_max_age).await {
            error!(error = %e, "Failed to reap stale generation locks");
        }

        match cycle::run_billing_cycle(&db, today.year(), today.month() as i32).await {
            Ok(report) => info!("{}", cycle::format_cycle_summary(&report)),
            Err(e) => error!(error = %e, "Billing cycle run failed"),
        }
    }
}
