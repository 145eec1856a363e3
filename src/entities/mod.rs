//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

use sea_orm::{ActiveValue, prelude::Json};

pub mod adjustment;
pub mod adjustment_type;
pub mod bill;
pub mod contract;
pub mod generation_lock;
pub mod payroll;

/// Coerces a detail structure back to the empty object when it is absent.
/// Detail columns are non-null by policy; a JSON `null` never reaches the
/// database.
#[must_use]
pub fn coerce_detail(value: Json) -> Json {
    if value.is_null() {
        serde_json::json!({})
    } else {
        value
    }
}

/// In-place variant for the `before_save` hooks: a pending `Set(null)`
/// write on a detail column becomes `Set({})`.
pub(crate) fn coerce_detail_slot(slot: &mut ActiveValue<Json>) {
    if let ActiveValue::Set(value) = slot {
        if value.is_null() {
            *value = serde_json::json!({});
        }
    }
}

// Re-export specific types to avoid conflicts
pub use adjustment::{
    Column as AdjustmentColumn, DocKind, Entity as Adjustment, Model as AdjustmentModel,
};
pub use adjustment_type::{
    AdjustmentType, Column as AdjustmentTypeColumn, Entity as AdjustmentTypeRegistry,
    Model as AdjustmentTypeModel,
};
pub use bill::{Column as BillColumn, Entity as Bill, Model as BillModel, NO_SUBSTITUTE};
pub use contract::{Column as ContractColumn, Entity as Contract, Model as ContractModel};
pub use generation_lock::{
    Column as GenerationLockColumn, Entity as GenerationLock, Model as GenerationLockModel,
};
pub use payroll::{Column as PayrollColumn, Entity as Payroll, Model as PayrollModel};
