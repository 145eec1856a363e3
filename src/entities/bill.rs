//! Bill entity - The customer-side document for one billing period of one
//! contract.
//!
//! The five key columns (`contract_id`, `year`, `month`, `cycle_start`,
//! `source_substitute_record_id`) form the billing period key. A composite
//! unique index over them (created in `config::database`) is the last-resort
//! backstop against duplicate generation: regenerating for the same key must
//! land on the existing row, never insert a second one.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Sentinel stored in `source_substitute_record_id` when the period is the
/// primary (non-substitute) period. SQLite treats NULLs as distinct in
/// unique indexes, so a real NULL would let duplicate primary-period rows
/// through the composite index.
pub const NO_SUBSTITUTE: i64 = -1;

/// Bill database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "bills")]
pub struct Model {
    /// Unique identifier for the bill
    #[sea_orm(primary_key)]
    pub id: i64,
    /// The contract this bill belongs to
    pub contract_id: i64,
    /// Billing year
    pub year: i32,
    /// Billing month (1-12)
    pub month: i32,
    /// First day of the billing cycle within the period
    pub cycle_start: Date,
    /// Substitute record that split this sub-period off the primary
    /// period, or [`NO_SUBSTITUTE`] for the primary period itself
    pub source_substitute_record_id: i64,
    /// Cached sum of all booked adjustments, maintained in the same
    /// transaction as every booking
    pub total: Decimal,
    /// Structured payment details; never null, defaults to `{}`
    pub payment_detail: Json,
    /// Structured calculation breakdown; never null, defaults to `{}`
    pub calculation_detail: Json,
    /// Whether payment has been recorded for this bill
    pub is_settled: bool,
    /// Soft invalidation flag - settled bills are never physically deleted
    pub is_invalidated: bool,
    /// When this bill row was first generated
    pub generated_at: DateTimeUtc,
}

/// Defines relationships between Bill and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each bill belongs to one contract
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
        super::coerce_detail_slot(&mut self.payment_detail);
        super::coerce_detail_slot(&mut self.calculation_detail);
        Ok(self)
    }
}
