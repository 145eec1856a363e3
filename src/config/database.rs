//! Database configuration module for the billing ledger.
//!
//! This module handles `SQLite` database connection and schema creation using
//! `SeaORM`. Tables are generated from the entity definitions via
//! `Schema::create_table_from_entity`, so the database schema always matches
//! the Rust struct definitions without manual SQL. The composite unique
//! indexes over the billing period key columns cannot be expressed in the
//! entity derive and are created here explicitly; they are the last-resort
//! backstop against duplicate bill/payroll generation.

use crate::entities::{
    Adjustment, AdjustmentTypeRegistry, Bill, Contract, GenerationLock, Payroll, bill, payroll,
};
use crate::errors::Result;
use sea_orm::sea_query::{Index, IndexCreateStatement};
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Schema};

/// Gets the database URL from environment variable or returns default `SQLite` path.
pub fn get_database_url() -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://data/billing_ledger.sqlite".to_string())
}

/// Establishes a connection to the `SQLite` database using the `DATABASE_URL`
/// environment variable, falling back to a default local `SQLite` file.
pub async fn create_connection() -> Result<DatabaseConnection> {
    Database::connect(get_database_url()).await.map_err(Into::into)
}

/// Creates all database tables and indexes from the entity definitions.
///
/// Safe to call on every startup: both table and index creation use
/// `IF NOT EXISTS`.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let mut contract_table = schema.create_table_from_entity(Contract);
    let mut lock_table = schema.create_table_from_entity(GenerationLock);
    let mut bill_table = schema.create_table_from_entity(Bill);
    let mut payroll_table = schema.create_table_from_entity(Payroll);
    let mut adjustment_table = schema.create_table_from_entity(Adjustment);
    let mut registry_table = schema.create_table_from_entity(AdjustmentTypeRegistry);

    db.execute(builder.build(contract_table.if_not_exists())).await?;
    db.execute(builder.build(lock_table.if_not_exists())).await?;
    db.execute(builder.build(bill_table.if_not_exists())).await?;
    db.execute(builder.build(payroll_table.if_not_exists())).await?;
    db.execute(builder.build(adjustment_table.if_not_exists())).await?;
    db.execute(builder.build(registry_table.if_not_exists())).await?;

    db.execute(builder.build(&bill_period_key_index())).await?;
    db.execute(builder.build(&payroll_period_key_index())).await?;

    Ok(())
}

/// Composite unique index over the bill billing-period-key columns.
fn bill_period_key_index() -> IndexCreateStatement {
    Index::create()
        .name("uq_bills_period_key")
        .table(Bill)
        .col(bill::Column::ContractId)
        .col(bill::Column::Year)
        .col(bill::Column::Month)
        .col(bill::Column::CycleStart)
        .col(bill::Column::SourceSubstituteRecordId)
        .unique()
        .if_not_exists()
        .to_owned()
}

/// Composite unique index over the payroll billing-period-key columns.
fn payroll_period_key_index() -> IndexCreateStatement {
    Index::create()
        .name("uq_payrolls_period_key")
        .table(Payroll)
        .col(payroll::Column::ContractId)
        .col(payroll::Column::Year)
        .col(payroll::Column::Month)
        .col(payroll::Column::CycleStart)
        .col(payroll::Column::SourceSubstituteRecordId)
        .unique()
        .if_not_exists()
        .to_owned()
}
