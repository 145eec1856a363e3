//! Contract configuration loading from config.toml
//!
//! This module loads the initial contract roster from a TOML configuration
//! file. The contracts defined in config.toml are used to seed the database
//! on startup; seeding matches on (customer, employee) and is idempotent, so
//! restarting the service never duplicates contracts.

use crate::entities::{Contract, contract};
use crate::errors::{Error, Result};
use rust_decimal::Decimal;
use sea_orm::{DatabaseConnection, Set, prelude::*};
use serde::Deserialize;
use std::path::Path;
use tracing::info;

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Deserialize)]
pub struct Config {
    /// List of contract configurations to seed
    pub contracts: Vec<ContractConfig>,
}

/// Configuration for a single contract
#[derive(Debug, Deserialize, Clone)]
pub struct ContractConfig {
    /// Name of the customer household
    pub customer: String,
    /// Name of the assigned employee
    pub employee: String,
    /// Standing monthly service fee; written as a string in the TOML file
    /// (e.g. `"1500.00"`) so the amount stays exact
    pub monthly_fee: Decimal,
    /// Standing monthly salary paid to the employee, same string form
    pub monthly_salary: Decimal,
    /// Day of month (1-28) the billing cycle starts on
    pub cycle_day: i32,
}

/// Loads contract configuration from a TOML file.
///
/// # Errors
/// Returns an error if the file cannot be read, the TOML syntax is invalid,
/// or required fields are missing.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| Error::Config {
        message: format!("Failed to read config file: {e}"),
    })?;

    let config: Config = toml::from_str(&contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })?;

    validate(&config)?;
    Ok(config)
}

/// Rejects contract entries whose cycle day could not exist in every month.
fn validate(config: &Config) -> Result<()> {
    for c in &config.contracts {
        if !(1..=28).contains(&c.cycle_day) {
            return Err(Error::Config {
                message: format!(
                    "Contract {}/{}: cycle_day must be 1-28, got {}",
                    c.customer, c.employee, c.cycle_day
                ),
            });
        }
    }
    Ok(())
}

/// Loads contract configuration from the default location (./config.toml)
pub fn load_default_config() -> Result<Config> {
    load_config("config.toml")
}

/// Seeds the contract table from configuration.
///
/// Contracts are matched by (customer, employee) name pair; existing rows
/// are left untouched, missing ones are inserted active. Returns the number
/// of contracts inserted.
pub async fn seed_contracts(db: &DatabaseConnection, config: &Config) -> Result<usize> {
    let mut inserted = 0;

    for c in &config.contracts {
        let existing = Contract::find()
            .filter(contract::Column::CustomerName.eq(&c.customer))
            .filter(contract::Column::EmployeeName.eq(&c.employee))
            .filter(contract::Column::IsDeleted.eq(false))
            .one(db)
            .await?;

        if existing.is_some() {
            continue;
        }

        let model = contract::ActiveModel {
            customer_name: Set(c.customer.clone()),
            employee_name: Set(c.employee.clone()),
            monthly_fee: Set(c.monthly_fee),
            monthly_salary: Set(c.monthly_salary),
            cycle_day: Set(c.cycle_day),
            is_active: Set(true),
            is_deleted: Set(false),
            ..Default::default()
        };
        model.insert(db).await?;
        inserted += 1;
    }

    if inserted > 0 {
        info!(inserted, "Seeded contracts from configuration");
    }

    Ok(inserted)
}
