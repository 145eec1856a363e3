//! Adjustment type registry - The closed set of categorical tags for
//! financial adjustments, plus the registry table that backs runtime
//! validation.
//!
//! The enum is append-only over time: variants are added by a code change
//! and picked up by the registry seeder on the next deploy, never removed.
//! There is deliberately no way to delete a tag at runtime; a tag that is
//! referenced by persisted adjustment rows can only be retired by an
//! out-of-band migration that rewrites those rows first.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Categorical tag attached to every ledger entry.
///
/// Stored as a string column so the database stays readable and additive
/// schema evolution never renumbers existing rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(64))")]
pub enum AdjustmentType {
    /// Charge billed to the customer (standing fees, extras)
    #[sea_orm(string_value = "customer_charge")]
    CustomerCharge,
    /// Credit granted to the customer (offset of `CustomerCharge`)
    #[sea_orm(string_value = "customer_credit")]
    CustomerCredit,
    /// Payment owed to the employee (salary, bonuses)
    #[sea_orm(string_value = "employee_payment")]
    EmployeePayment,
    /// Deduction from the employee payout (offset of `EmployeePayment`)
    #[sea_orm(string_value = "employee_deduction")]
    EmployeeDeduction,
    /// Agency commission on a placement
    #[sea_orm(string_value = "commission")]
    Commission,
    /// Reversal counterpart of `Commission`
    #[sea_orm(string_value = "commission_offset")]
    CommissionOffset,
    /// Customer deposit held against the contract
    #[sea_orm(string_value = "deposit")]
    Deposit,
    /// Reversal counterpart of `Deposit`
    #[sea_orm(string_value = "deposit_offset")]
    DepositOffset,
    /// Fee deferred from an earlier period
    #[sea_orm(string_value = "deferred_fee")]
    DeferredFee,
    /// One-time introduction fee
    #[sea_orm(string_value = "introduction_fee")]
    IntroductionFee,
    /// Salary portion paid by the company rather than the customer
    #[sea_orm(string_value = "company_paid_salary")]
    CompanyPaidSalary,
    /// Management fee for a substitute-covered sub-period
    #[sea_orm(string_value = "substitute_management_fee")]
    SubstituteManagementFee,
    /// Salary advanced out of a held deposit
    #[sea_orm(string_value = "deposit_paid_salary")]
    DepositPaidSalary,
    /// Balance carried between employee accounts
    #[sea_orm(string_value = "employee_balance_transfer")]
    EmployeeBalanceTransfer,
}

impl AdjustmentType {
    /// Returns the paired offset type used to net out an entry of this
    /// type, or `None` if the type has no defined counterpart and entries
    /// carrying it cannot be reversed.
    #[must_use]
    pub const fn offset(self) -> Option<Self> {
        match self {
            Self::Commission => Some(Self::CommissionOffset),
            Self::CommissionOffset => Some(Self::Commission),
            Self::Deposit => Some(Self::DepositOffset),
            Self::DepositOffset => Some(Self::Deposit),
            Self::CustomerCharge => Some(Self::CustomerCredit),
            Self::CustomerCredit => Some(Self::CustomerCharge),
            Self::EmployeePayment => Some(Self::EmployeeDeduction),
            Self::EmployeeDeduction => Some(Self::EmployeePayment),
            _ => None,
        }
    }

    /// The string form stored in the database and in the registry table.
    #[must_use]
    pub fn tag(self) -> String {
        self.to_value()
    }
}

/// Registry table model - one row per registered tag
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "adjustment_types")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i32,
    /// The registered tag string (matches an `AdjustmentType` string value)
    #[sea_orm(unique)]
    pub tag: String,
    /// When this tag was first registered
    pub registered_at: DateTimeUtc,
}

/// The registry table has no relationships with other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
