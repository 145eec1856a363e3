//! Payroll entity - The employee-side document for one billing period of
//! one contract.
//!
//! Mirrors the bill entity: the same five columns form the billing period
//! key, with the same composite unique index backstop, and the same
//! never-null detail structures. Payout amounts are driven by ledger
//! entries just like bill amounts.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Payroll database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "payrolls")]
pub struct Model {
    /// Unique identifier for the payroll
    #[sea_orm(primary_key)]
    pub id: i64,
    /// The contract this payroll belongs to
    pub contract_id: i64,
    /// Billing year
    pub year: i32,
    /// Billing month (1-12)
    pub month: i32,
    /// First day of the billing cycle within the period
    pub cycle_start: Date,
    /// Substitute record that split this sub-period off the primary
    /// period, or [`super::bill::NO_SUBSTITUTE`] for the primary period
    pub source_substitute_record_id: i64,
    /// Cached sum of all booked adjustments, maintained in the same
    /// transaction as every booking
    pub total: Decimal,
    /// Structured payout details; never null, defaults to `{}`
    pub payout_detail: Json,
    /// Structured calculation breakdown; never null, defaults to `{}`
    pub calculation_detail: Json,
    /// Whether the payout has been recorded for this payroll
    pub is_settled: bool,
    /// Soft invalidation flag - settled payrolls are never physically deleted
    pub is_invalidated: bool,
    /// When this payroll row was first generated
    pub generated_at: DateTimeUtc,
}

/// Defines relationships between Payroll and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each payroll belongs to one contract
    #[sea_orm(
        belongs_to = "super::contract::Entity",
        from = "Column::ContractId",
        to = "super::contract::Column::Id"
    )]
    Contract,
}

impl Related<super::contract::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Contract.def()
    }
}

#[async_trait::async_trait]
impl ActiveModelBehavior for ActiveModel {
    /// Detail columns are non-null by policy: a pending null write is
    /// coerced back to `{}` before it reaches the database, on insert and
    /// update alike.
    async fn before_save<C>(mut self, _db: &C, _insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        super::coerce_detail_slot(&mut self.payout_detail);
        super::coerce_detail_slot(&mut self.calculation_detail);
        Ok(self)
    }
}
