//! Adjustment type registry operations.
//!
//! The registry table is the single runtime source of truth for which tags
//! may appear on ledger entries. It is seeded from the [`AdjustmentType`]
//! enum at startup and only ever grows: `register` adds a tag, and there is
//! no unregister operation. Retiring a tag is an out-of-band migration that
//! must first rewrite every adjustment row referencing it; the runtime
//! deliberately offers no shortcut around that.
//!
//! Validation reads the table directly on every call, so a freshly
//! registered tag is visible to all ledger booking immediately.

use crate::{
    entities::{AdjustmentType, AdjustmentTypeRegistry, adjustment_type},
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{ConnectionTrait, Iterable, Set, prelude::*};
use tracing::info;

/// Seeds the registry with every [`AdjustmentType`] enum member not already
/// present. Idempotent; returns the number of tags inserted.
pub async fn seed_registry(db: &DatabaseConnection) -> Result<usize> {
    let mut inserted = 0;

    for member in AdjustmentType::iter() {
        let tag = member.tag();
        if !is_valid(db, &tag).await? {
            register(db, &tag).await?;
            inserted += 1;
        }
    }

    if inserted > 0 {
        info!(inserted, "Seeded adjustment type registry");
    }

    Ok(inserted)
}

/// Registers a new tag.
///
/// # Errors
/// Returns [`Error::DuplicateTag`] if the tag is already registered.
pub async fn register(db: &DatabaseConnection, tag: &str) -> Result<adjustment_type::Model> {
    if is_valid(db, tag).await? {
        return Err(Error::DuplicateTag {
            tag: tag.to_string(),
        });
    }

    let model = adjustment_type::ActiveModel {
        tag: Set(tag.to_string()),
        registered_at: Set(Utc::now()),
        ..Default::default()
    };

    model.insert(db).await.map_err(|e| {
        // The unique index catches a racing duplicate registration.
        match e.sql_err() {
            Some(sea_orm::SqlErr::UniqueConstraintViolation(_)) => Error::DuplicateTag {
                tag: tag.to_string(),
            },
            _ => e.into(),
        }
    })
}

/// Whether the tag is present in the registry. No caching: booking
/// validation always sees the current table contents.
pub async fn is_valid<C>(db: &C, tag: &str) -> Result<bool>
where
    C: ConnectionTrait,
{
    let found = AdjustmentTypeRegistry::find()
        .filter(adjustment_type::Column::Tag.eq(tag))
        .one(db)
        .await?;
    Ok(found.is_some())
}
