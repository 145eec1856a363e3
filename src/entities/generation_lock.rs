//! Generation lock entity - Per-contract "generation in progress" record.
//!
//! Acquiring the lock is a plain `INSERT`; the unique index on
//! `contract_id` makes the second concurrent insert fail at the database,
//! which the period module surfaces as `ConcurrentGenerationConflict`.
//! Releasing deletes the row. Locks left behind by a crashed pass are
//! reaped by age before each scheduled cycle run.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Generation lock database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "generation_locks")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// The contract whose generation is in progress (at most one lock each)
    #[sea_orm(unique)]
    pub contract_id: i64,
    /// When the lock was acquired, used for stale-lock reaping
    pub acquired_at: DateTimeUtc,
}

/// Defines relationships between `GenerationLock` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each lock belongs to one contract
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

impl ActiveModelBehavior for ActiveModel {}
