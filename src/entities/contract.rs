//! Contract entity - One household-services engagement between a customer
//! and an employee.
//!
//! Contracts are the anchor for billing: every bill, payroll, and
//! generation lock references a contract. Contracts are soft-deleted so
//! historical billing documents keep a valid parent.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Contract database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "contracts")]
pub struct Model {
    /// Unique identifier for the contract
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Name of the customer household
    pub customer_name: String,
    /// Name of the assigned employee
    pub employee_name: String,
    /// Standing monthly service fee billed to the customer each cycle
    pub monthly_fee: Decimal,
    /// Standing monthly salary paid out to the employee each cycle
    pub monthly_salary: Decimal,
    /// Day of month (1-28) the billing cycle starts on
    pub cycle_day: i32,
    /// Whether the contract is currently billed by cycle runs
    pub is_active: bool,
    /// Soft delete flag - if true, contract is hidden but data is preserved
    pub is_deleted: bool,
}

/// Defines relationships between Contract and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One contract has many bills
    #[sea_orm(has_many = "super::bill::Entity")]
    Bills,
    /// One contract has many payrolls
    #[sea_orm(has_many = "super::payroll::Entity")]
    Payrolls,
}

impl Related<super::bill::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Bills.def()
    }
}

impl Related<super::payroll::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Payrolls.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
