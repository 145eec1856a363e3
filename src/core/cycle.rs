//! Billing cycle runs - the periodic generation pass over all active
//! contracts.
//!
//! A cycle run is triggered externally (scheduler binary or operator) for a
//! (year, month) period. For each active contract it acquires the
//! generation lock, finds or creates the period's bill and payroll, and
//! books the standing monthly-fee adjustments only when the documents were
//! newly created. Triggers are at-least-once: re-running the same period
//! converges on the same state instead of accumulating duplicate documents
//! or ledger entries.
//!
//! A per-contract [`Error::ConcurrentGenerationConflict`] is recorded and
//! skipped, never fatal to the run; the skipped contract is picked up by
//! the next trigger after the holder releases.

use crate::{
    core::{
        ledger,
        period::{
            self, BillingPeriodKey, acquire_generation_lock, release_generation_lock,
        },
    },
    entities::{AdjustmentType, Contract, DocKind, GenerationLock, contract, generation_lock},
    errors::{Error, Result},
};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{DatabaseConnection, prelude::*};
use std::time::Duration;
use tracing::{error, info, warn};

/// Outcome of one contract's generation within a cycle run.
#[derive(Debug, Clone)]
pub struct ContractCycleOutcome {
    /// The contract that was processed
    pub contract_id: i64,
    /// Customer name, for the run summary
    pub customer_name: String,
    /// The bill row for the period
    pub bill_id: i64,
    /// The payroll row for the period
    pub payroll_id: i64,
    /// Whether this run created the documents (vs. found existing ones)
    pub created: bool,
}

/// Result of one billing cycle run.
#[derive(Debug, Clone)]
pub struct CycleReport {
    /// Billing year of the run
    pub year: i32,
    /// Billing month of the run
    pub month: i32,
    /// Per-contract outcomes for contracts that completed
    pub outcomes: Vec<ContractCycleOutcome>,
    /// Contracts skipped because their generation lock was held
    pub conflicts: usize,
    /// Contracts that failed with a non-conflict error
    pub failures: usize,
}

impl CycleReport {
    /// Number of contracts whose documents were created by this run.
    #[must_use]
    pub fn created_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.created).count()
    }
}

/// Builds the primary-period key for a contract in the given period.
fn primary_key_for(c: &contract::Model, year: i32, month: i32) -> Result<BillingPeriodKey> {
    let cycle_start = NaiveDate::from_ymd_opt(year, month as u32, c.cycle_day as u32).ok_or_else(
        || Error::InvalidPeriodKey {
            message: format!("no day {} in {year}-{month:02}", c.cycle_day),
        },
    )?;
    BillingPeriodKey::new(c.id, year, month, cycle_start, None)
}

/// Generates documents and standing adjustments for one contract under its
/// generation lock. The caller owns lock acquisition and release.
async fn generate_for_contract(
    db: &DatabaseConnection,
    c: &contract::Model,
    key: &BillingPeriodKey,
) -> Result<ContractCycleOutcome> {
    let (bill, bill_created) = period::find_or_create_bill_locked(db, key).await?;
    let (payroll, payroll_created) = period::find_or_create_payroll_locked(db, key).await?;

    // Standing fees are booked once, when the documents first exist.
    // Re-delivered triggers find the documents and book nothing.
    if bill_created {
        ledger::book(
            db,
            key,
            DocKind::Bill,
            AdjustmentType::CustomerCharge,
            c.monthly_fee,
            "Monthly service fee".to_string(),
        )
        .await?;
    }
    if payroll_created {
        ledger::book(
            db,
            key,
            DocKind::Payroll,
            AdjustmentType::EmployeePayment,
            c.monthly_salary,
            "Monthly salary".to_string(),
        )
        .await?;
    }

    Ok(ContractCycleOutcome {
        contract_id: c.id,
        customer_name: c.customer_name.clone(),
        bill_id: bill.id,
        payroll_id: payroll.id,
        created: bill_created || payroll_created,
    })
}

/// Runs the billing cycle for every active contract in the given period.
///
/// Per-contract lock conflicts and errors are counted in the report rather
/// than aborting the run. The run itself only fails on errors outside any
/// single contract's scope (e.g. listing contracts).
pub async fn run_billing_cycle(
    db: &DatabaseConnection,
    year: i32,
    month: i32,
) -> Result<CycleReport> {
    let contracts = Contract::find()
        .filter(contract::Column::IsActive.eq(true))
        .filter(contract::Column::IsDeleted.eq(false))
        .all(db)
        .await?;

    let mut report = CycleReport {
        year,
        month,
        outcomes: Vec::new(),
        conflicts: 0,
        failures: 0,
    };

    for c in contracts {
        let key = match primary_key_for(&c, year, month) {
            Ok(key) => key,
            Err(e) => {
                error!(contract_id = c.id, error = %e, "Skipping contract with invalid period key");
                report.failures += 1;
                continue;
            }
        };

        match acquire_generation_lock(db, c.id).await {
            Ok(_) => {}
            Err(Error::ConcurrentGenerationConflict { contract_id }) => {
                warn!(contract_id, "Generation already in progress, skipping contract");
                report.conflicts += 1;
                continue;
            }
            Err(e) => return Err(e),
        }

        let outcome = generate_for_contract(db, &c, &key).await;
        release_generation_lock(db, c.id).await?;

        match outcome {
            Ok(o) => report.outcomes.push(o),
            Err(e) => {
                // Unknown-type/period here means a config bug; surface it on
                // the operator channel and keep the run going.
                error!(contract_id = c.id, error = %e, "Contract generation failed");
                report.failures += 1;
            }
        }
    }

    info!(
        year,
        month,
        processed = report.outcomes.len(),
        created = report.created_count(),
        conflicts = report.conflicts,
        failures = report.failures,
        "Billing cycle run complete"
    );

    Ok(report)
}

/// Generates the documents for a substitute-covered sub-period and books
/// the substitute management fee on creation.
///
/// The sub-period key shares the contract and calendar period with the
/// primary key but carries the substitute record id, so its documents
/// coexist with the primary period's documents.
pub async fn run_substitute_split(
    db: &DatabaseConnection,
    contract_id: i64,
    year: i32,
    month: i32,
    sub_cycle_start: NaiveDate,
    substitute_record_id: i64,
    management_fee: Decimal,
) -> Result<ContractCycleOutcome> {
    let contract = Contract::find_by_id(contract_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::UnknownPeriod {
            detail: format!("contract {contract_id}"),
        })?;

    let key = BillingPeriodKey::new(
        contract_id,
        year,
        month,
        sub_cycle_start,
        Some(substitute_record_id),
    )?;

    acquire_generation_lock(db, contract_id).await?;
    let outcome = async {
        // Sub-periods do not carry the standing monthly fees; their billable
        // amount is the management fee plus whatever corrections follow.
        let (bill, bill_created) = period::find_or_create_bill_locked(db, &key).await?;
        let (payroll, payroll_created) = period::find_or_create_payroll_locked(db, &key).await?;

        if bill_created {
            ledger::book(
                db,
                &key,
                DocKind::Bill,
                AdjustmentType::SubstituteManagementFee,
                management_fee,
                format!("Substitute management fee (record {substitute_record_id})"),
            )
            .await?;
        }

        Ok(ContractCycleOutcome {
            contract_id,
            customer_name: contract.customer_name.clone(),
            bill_id: bill.id,
            payroll_id: payroll.id,
            created: bill_created || payroll_created,
        })
    }
    .await;
    release_generation_lock(db, contract_id).await?;

    outcome
}

/// Deletes generation locks older than `max_age`. Run before each scheduled
/// cycle so a crashed pass cannot block its contract forever.
pub async fn reap_stale_locks(db: &DatabaseConnection, max_age: Duration) -> Result<u64> {
    let cutoff = Utc::now()
        - chrono::Duration::from_std(max_age).map_err(|e| Error::Config {
            message: format!("lock max age out of range: {e}"),
        })?;

    let result = GenerationLock::delete_many()
        .filter(generation_lock::Column::AcquiredAt.lt(cutoff))
        .exec(db)
        .await?;

    if result.rows_affected > 0 {
        warn!(reaped = result.rows_affected, "Reaped stale generation locks");
    }

    Ok(result.rows_affected)
}

/// Formats a cycle report into a human-readable summary string for logs.
#[must_use]
pub fn format_cycle_summary(report: &CycleReport) -> String {
    use std::fmt::Write;

    let mut summary = format!(
        "Billing cycle {}-{:02} - {} contracts processed ({} created, {} conflicts, {} failures)\n",
        report.year,
        report.month,
        report.outcomes.len(),
        report.created_count(),
        report.conflicts,
        report.failures
    );

    for outcome in &report.outcomes {
        let status = if outcome.created { "created" } else { "existing" };
        // write! to a String is infallible
        writeln!(
            summary,
            "  {} - bill {} / payroll {} ({status})",
            outcome.customer_name, outcome.bill_id, outcome.payroll_id
        )
        .unwrap();
    }

    summary
}
