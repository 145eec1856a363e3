//! Adjustment entity - One signed monetary adjustment booked against a
//! billing document.
//!
//! The ledger is append-only: rows are inserted by `core::ledger::book` and
//! `core::ledger::reverse` and never updated or deleted. Corrections are
//! modeled as new offsetting entries; the unique index on `reversal_of`
//! guarantees at most one reversal per entry.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::adjustment_type::AdjustmentType;

/// Which side of the contract a ledger entry is booked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum DocKind {
    /// Customer-side document
    #[sea_orm(string_value = "bill")]
    Bill,
    /// Employee-side document
    #[sea_orm(string_value = "payroll")]
    Payroll,
}

/// Adjustment ledger entry database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "adjustments")]
pub struct Model {
    /// Unique identifier for the ledger entry
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Whether this entry belongs to a bill or a payroll
    pub doc_kind: DocKind,
    /// The owning bill/payroll row id
    pub doc_id: i64,
    /// Categorical tag for this adjustment
    pub adjustment_type: AdjustmentType,
    /// Signed amount (positive increases the document total)
    pub amount: Decimal,
    /// Free-text description of the adjustment
    pub description: String,
    /// If this entry reverses a prior entry, that entry's id; at most one
    /// reversal may reference any given entry
    #[sea_orm(unique)]
    pub reversal_of: Option<i64>,
    /// When the entry was booked
    pub booked_at: DateTimeUtc,
}

/// The ledger table has no derivable relationships: `doc_id` points at a
/// bill or a payroll depending on `doc_kind`
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
