//! Adjustment ledger operations - booking, reversal, and totals.
//!
//! The ledger is append-only: entries are inserted and never mutated or
//! deleted. A correction is a new entry with negated amount and the paired
//! offset type, linked to the original through `reversal_of`. Each booking
//! runs inside one database transaction together with the owning document's
//! cached-total bump, so either both persist or neither does; the
//! transaction also serializes concurrent bookings against the same period,
//! which keeps the running total free of lost updates.
//!
//! Amounts are `rust_decimal::Decimal` end to end. Totals are summed in
//! Rust rather than with SQL `SUM`, which would route through floats on
//! SQLite.

use crate::{
    core::{
        period::{BillingPeriodKey, find_bill, find_payroll},
        registry,
    },
    entities::{Adjustment, AdjustmentType, Bill, DocKind, Payroll, adjustment, bill, payroll},
    errors::{Error, Result},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ConnectionTrait, DatabaseConnection, QueryOrder, Set, TransactionTrait, prelude::*};
use tracing::debug;

/// Resolves the bill/payroll row id owning entries for a key.
async fn resolve_doc_id<C>(db: &C, key: &BillingPeriodKey, kind: DocKind) -> Result<i64>
where
    C: ConnectionTrait,
{
    let id = match kind {
        DocKind::Bill => find_bill(db, key).await?.map(|b| b.id),
        DocKind::Payroll => find_payroll(db, key).await?.map(|p| p.id),
    };

    id.ok_or_else(|| Error::UnknownPeriod {
        detail: key.describe(),
    })
}

/// Bumps the owning document's cached total by `amount`.
///
/// The addition happens in `Decimal`, not in SQL: SQLite would route the
/// arithmetic through floats. The caller's transaction serializes the
/// read-modify-write against other bookings on the same period.
async fn bump_doc_total<C>(db: &C, kind: DocKind, doc_id: i64, amount: Decimal) -> Result<()>
where
    C: ConnectionTrait,
{
    match kind {
        DocKind::Bill => {
            let doc = Bill::find_by_id(doc_id)
                .one(db)
                .await?
                .ok_or_else(|| Error::UnknownPeriod {
                    detail: format!("bill {doc_id}"),
                })?;
            let new_total = doc.total + amount;
            let mut active: bill::ActiveModel = doc.into();
            active.total = Set(new_total);
            active.update(db).await?;
        }
        DocKind::Payroll => {
            let doc = Payroll::find_by_id(doc_id)
                .one(db)
                .await?
                .ok_or_else(|| Error::UnknownPeriod {
                    detail: format!("payroll {doc_id}"),
                })?;
            let new_total = doc.total + amount;
            let mut active: payroll::ActiveModel = doc.into();
            active.total = Set(new_total);
            active.update(db).await?;
        }
    }
    Ok(())
}

/// Books an adjustment against the document identified by the key.
///
/// # Errors
/// * [`Error::UnknownAdjustmentType`] - the type's tag is not in the registry
/// * [`Error::UnknownPeriod`] - no bill/payroll row exists for the key
/// * [`Error::InvalidAmount`] - zero amount
///
/// The entry insert and the cached-total bump share one transaction; a
/// failed booking leaves the ledger unchanged.
pub async fn book(
    db: &DatabaseConnection,
    key: &BillingPeriodKey,
    kind: DocKind,
    adjustment_type: AdjustmentType,
    amount: Decimal,
    description: String,
) -> Result<adjustment::Model> {
    if amount.is_zero() {
        return Err(Error::InvalidAmount { amount });
    }

    let txn = db.begin().await?;

    let tag = adjustment_type.tag();
    if !registry::is_valid(&txn, &tag).await? {
        return Err(Error::UnknownAdjustmentType { tag });
    }

    let doc_id = resolve_doc_id(&txn, key, kind).await?;

    let entry = adjustment::ActiveModel {
        doc_kind: Set(kind),
        doc_id: Set(doc_id),
        adjustment_type: Set(adjustment_type),
        amount: Set(amount),
        description: Set(description),
        reversal_of: Set(None),
        booked_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    bump_doc_total(&txn, kind, doc_id, amount).await?;

    txn.commit().await?;

    debug!(entry_id = entry.id, %amount, tag = %entry.adjustment_type.tag(), "Booked adjustment");
    Ok(entry)
}

/// Reverses a booked entry by creating a new entry with negated amount and
/// the paired offset type. The original entry is untouched; history is
/// never rewritten.
///
/// # Errors
/// * [`Error::UnknownPeriod`] - no entry with that id exists
/// * [`Error::AlreadyReversed`] - a reversal already references the entry
/// * [`Error::NotReversible`] - the entry's type has no offset counterpart,
///   or `reversal_type` is not that counterpart
pub async fn reverse(
    db: &DatabaseConnection,
    entry_id: i64,
    reversal_type: AdjustmentType,
) -> Result<adjustment::Model> {
    let txn = db.begin().await?;

    let original = Adjustment::find_by_id(entry_id)
        .one(&txn)
        .await?
        .ok_or_else(|| Error::UnknownPeriod {
            detail: format!("ledger entry {entry_id}"),
        })?;

    let existing_reversal = Adjustment::find()
        .filter(adjustment::Column::ReversalOf.eq(entry_id))
        .one(&txn)
        .await?;
    if existing_reversal.is_some() {
        return Err(Error::AlreadyReversed { entry_id });
    }

    match original.adjustment_type.offset() {
        Some(offset) if offset == reversal_type => {}
        _ => return Err(Error::NotReversible { entry_id }),
    }

    let reversal = adjustment::ActiveModel {
        doc_kind: Set(original.doc_kind),
        doc_id: Set(original.doc_id),
        adjustment_type: Set(reversal_type),
        amount: Set(-original.amount),
        description: Set(format!("Reversal of entry {entry_id}: {}", original.description)),
        reversal_of: Set(Some(entry_id)),
        booked_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&txn)
    .await
    .map_err(|e| match e.sql_err() {
        // Unique index on reversal_of: a racing reversal got there first.
        Some(sea_orm::SqlErr::UniqueConstraintViolation(_)) => Error::AlreadyReversed { entry_id },
        _ => e.into(),
    })?;

    bump_doc_total(&txn, original.doc_kind, original.doc_id, -original.amount).await?;

    txn.commit().await?;

    debug!(entry_id, reversal_id = reversal.id, "Reversed ledger entry");
    Ok(reversal)
}

/// Sums all entries for the document identified by the key, with exact
/// decimal arithmetic. Reversals are ordinary entries, so a booked+reversed
/// pair nets to zero.
pub async fn total_for(
    db: &DatabaseConnection,
    key: &BillingPeriodKey,
    kind: DocKind,
) -> Result<Decimal> {
    let doc_id = resolve_doc_id(db, key, kind).await?;

    let entries = Adjustment::find()
        .filter(adjustment::Column::DocKind.eq(kind))
        .filter(adjustment::Column::DocId.eq(doc_id))
        .all(db)
        .await?;

    Ok(entries.iter().map(|e| e.amount).sum())
}

/// All entries for the document identified by the key, in booking order.
/// This is the read path for the statement/reporting consumer, which never
/// writes entries itself.
pub async fn entries_for(
    db: &DatabaseConnection,
    key: &BillingPeriodKey,
    kind: DocKind,
) -> Result<Vec<adjustment::Model>> {
    let doc_id = resolve_doc_id(db, key, kind).await?;

    Adjustment::find()
        .filter(adjustment::Column::DocKind.eq(kind))
        .filter(adjustment::Column::DocId.eq(doc_id))
        .order_by_asc(adjustment::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}
