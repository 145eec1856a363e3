//! Shared test utilities for the billing ledger.
//!
//! This module provides common helper functions for setting up test
//! databases and creating test entities with sensible defaults.

use crate::{
    core::{period, period::BillingPeriodKey, registry},
    entities::{bill, contract},
    errors::Result,
};
use chrono::NaiveDate;
use rust_decimal_macros::dec;
use sea_orm::{DatabaseConnection, Set, prelude::*};

/// Creates an in-memory `SQLite` database with all tables initialized and
/// the adjustment type registry seeded. This is the standard setup for all
/// integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    registry::seed_registry(&db).await?;
    Ok(db)
}

/// Creates a test contract with sensible defaults.
///
/// # Defaults
/// * `employee_name`: "Sato"
/// * `monthly_fee`: 1500.00
/// * `monthly_salary`: 1200.00
/// * `cycle_day`: 1, active, not deleted
pub async fn create_test_contract(
    db: &DatabaseConnection,
    customer: &str,
) -> Result<contract::Model> {
    let model = contract::ActiveModel {
        customer_name: Set(customer.to_string()),
        employee_name: Set("Sato".to_string()),
        monthly_fee: Set(dec!(1500.00)),
        monthly_salary: Set(dec!(1200.00)),
        cycle_day: Set(1),
        is_active: Set(true),
        is_deleted: Set(false),
        ..Default::default()
    };
    model.insert(db).await.map_err(Into::into)
}

/// The standard test period key: November 2025, cycle starting on the 1st,
/// primary period (no substitute).
#[must_use]
pub fn test_key(contract_id: i64) -> BillingPeriodKey {
    BillingPeriodKey {
        contract_id,
        year: 2025,
        month: 11,
        cycle_start: NaiveDate::from_ymd_opt(2025, 11, 1).unwrap(),
        substitute_record_id: None,
    }
}

/// The standard test key split by a substitute record.
#[must_use]
pub fn test_substitute_key(contract_id: i64, substitute_record_id: i64) -> BillingPeriodKey {
    BillingPeriodKey {
        substitute_record_id: Some(substitute_record_id),
        ..test_key(contract_id)
    }
}

/// Sets up a test database with one contract.
pub async fn setup_with_contract() -> Result<(DatabaseConnection, contract::Model)> {
    let db = setup_test_db().await?;
    let contract = create_test_contract(&db, "Tanaka household").await?;
    Ok((db, contract))
}

/// Sets up a test database with one contract and its primary-period bill.
/// Returns the period key alongside for booking tests.
pub async fn setup_with_bill()
-> Result<(DatabaseConnection, bill::Model, BillingPeriodKey)> {
    let (db, contract) = setup_with_contract().await?;
    let key = test_key(contract.id);
    let (bill, _) = period::find_or_create_bill(&db, &key).await?;
    Ok((db, bill, key))
}
