//! Billing period keys, the per-contract generation lock, and idempotent
//! bill/payroll lookup-or-creation.
//!
//! A [`BillingPeriodKey`] is the composite identity of one billable period
//! of one contract: (contract, year, month, cycle start date, optional
//! substitute record). A substitute-covered sub-period is a distinct key
//! from the primary period even when the calendar period is identical, so
//! both may carry independent bill and payroll rows.
//!
//! `find_or_create_*` is the anchor of idempotent generation: the same key
//! always lands on the same row. Concurrent generation for one contract is
//! excluded by the generation lock; the composite unique index on the key
//! columns is the backstop if the lock is ever bypassed.

use crate::{
    entities::{
        Bill, GenerationLock, NO_SUBSTITUTE, Payroll, bill, coerce_detail, generation_lock,
        payroll,
    },
    errors::{Error, Result},
};
use chrono::{Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{ConnectionTrait, DatabaseConnection, Set, prelude::*};
use tracing::debug;

/// Composite identity for one billable period of one contract.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BillingPeriodKey {
    /// The contract being billed
    pub contract_id: i64,
    /// Billing year
    pub year: i32,
    /// Billing month (1-12)
    pub month: i32,
    /// First day of the billing cycle within the period
    pub cycle_start: NaiveDate,
    /// Substitute record splitting this sub-period off the primary period;
    /// `None` is the primary period and is distinct from every `Some`
    pub substitute_record_id: Option<i64>,
}

impl BillingPeriodKey {
    /// Builds and validates a billing period key.
    ///
    /// # Errors
    /// Returns [`Error::InvalidPeriodKey`] when a component is malformed:
    /// non-positive ids, month outside 1-12, year outside 2000-2100, or a
    /// cycle start date that falls outside the (year, month) period.
    pub fn new(
        contract_id: i64,
        year: i32,
        month: i32,
        cycle_start: NaiveDate,
        substitute_record_id: Option<i64>,
    ) -> Result<Self> {
        if contract_id <= 0 {
            return Err(Error::InvalidPeriodKey {
                message: format!("contract_id must be positive, got {contract_id}"),
            });
        }
        if !(1..=12).contains(&month) {
            return Err(Error::InvalidPeriodKey {
                message: format!("month must be 1-12, got {month}"),
            });
        }
        if !(2000..=2100).contains(&year) {
            return Err(Error::InvalidPeriodKey {
                message: format!("year must be 2000-2100, got {year}"),
            });
        }
        if cycle_start.year() != year || cycle_start.month() != month as u32 {
            return Err(Error::InvalidPeriodKey {
                message: format!("cycle_start {cycle_start} is outside period {year}-{month:02}"),
            });
        }
        if let Some(id) = substitute_record_id {
            if id <= 0 {
                return Err(Error::InvalidPeriodKey {
                    message: format!("substitute_record_id must be positive, got {id}"),
                });
            }
        }

        Ok(Self {
            contract_id,
            year,
            month,
            cycle_start,
            substitute_record_id,
        })
    }

    /// The value stored in the `source_substitute_record_id` column:
    /// the substitute record id, or the [`NO_SUBSTITUTE`] sentinel.
    #[must_use]
    pub fn substitute_column_value(&self) -> i64 {
        self.substitute_record_id.unwrap_or(NO_SUBSTITUTE)
    }

    /// Human-readable form for error messages and logs.
    #[must_use]
    pub fn describe(&self) -> String {
        match self.substitute_record_id {
            Some(id) => format!(
                "contract {} {}-{:02} from {} (substitute record {id})",
                self.contract_id, self.year, self.month, self.cycle_start
            ),
            None => format!(
                "contract {} {}-{:02} from {}",
                self.contract_id, self.year, self.month, self.cycle_start
            ),
        }
    }
}

/// Acquires the generation lock for a contract.
///
/// The insert either succeeds atomically or trips the unique index on
/// `contract_id`, which is surfaced as
/// [`Error::ConcurrentGenerationConflict`] so the second caller fails fast
/// instead of producing a duplicate generation pass.
pub async fn acquire_generation_lock(
    db: &DatabaseConnection,
    contract_id: i64,
) -> Result<generation_lock::Model> {
    let model = generation_lock::ActiveModel {
        contract_id: Set(contract_id),
        acquired_at: Set(Utc::now()),
        ..Default::default()
    };

    model.insert(db).await.map_err(|e| match e.sql_err() {
        Some(sea_orm::SqlErr::UniqueConstraintViolation(_)) => {
            Error::ConcurrentGenerationConflict { contract_id }
        }
        _ => e.into(),
    })
}

/// Releases the generation lock for a contract. Releasing a lock that is
/// not held is a no-op, so the release path is safe to run after failures.
pub async fn release_generation_lock(db: &DatabaseConnection, contract_id: i64) -> Result<()> {
    GenerationLock::delete_many()
        .filter(generation_lock::Column::ContractId.eq(contract_id))
        .exec(db)
        .await?;
    Ok(())
}

/// Finds the bill row for a key, if one exists.
pub async fn find_bill<C>(db: &C, key: &BillingPeriodKey) -> Result<Option<bill::Model>>
where
    C: ConnectionTrait,
{
    Bill::find()
        .filter(bill::Column::ContractId.eq(key.contract_id))
        .filter(bill::Column::Year.eq(key.year))
        .filter(bill::Column::Month.eq(key.month))
        .filter(bill::Column::CycleStart.eq(key.cycle_start))
        .filter(bill::Column::SourceSubstituteRecordId.eq(key.substitute_column_value()))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Finds the payroll row for a key, if one exists.
pub async fn find_payroll<C>(db: &C, key: &BillingPeriodKey) -> Result<Option<payroll::Model>>
where
    C: ConnectionTrait,
{
    Payroll::find()
        .filter(payroll::Column::ContractId.eq(key.contract_id))
        .filter(payroll::Column::Year.eq(key.year))
        .filter(payroll::Column::Month.eq(key.month))
        .filter(payroll::Column::CycleStart.eq(key.cycle_start))
        .filter(payroll::Column::SourceSubstituteRecordId.eq(key.substitute_column_value()))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Finds or creates the bill for a key, guarding the whole pass with the
/// contract's generation lock.
///
/// Returns the bill and whether it was created by this call.
///
/// # Errors
/// [`Error::ConcurrentGenerationConflict`] if another generation pass holds
/// the contract's lock. The lock is released on every exit path.
pub async fn find_or_create_bill(
    db: &DatabaseConnection,
    key: &BillingPeriodKey,
) -> Result<(bill::Model, bool)> {
    acquire_generation_lock(db, key.contract_id).await?;
    let result = find_or_create_bill_locked(db, key).await;
    release_generation_lock(db, key.contract_id).await?;
    result
}

/// Finds or creates the payroll for a key, guarding with the generation
/// lock like [`find_or_create_bill`].
pub async fn find_or_create_payroll(
    db: &DatabaseConnection,
    key: &BillingPeriodKey,
) -> Result<(payroll::Model, bool)> {
    acquire_generation_lock(db, key.contract_id).await?;
    let result = find_or_create_payroll_locked(db, key).await;
    release_generation_lock(db, key.contract_id).await?;
    result
}

/// Lock-free variant for callers that already hold the contract's
/// generation lock (the cycle runner holds it across bill and payroll
/// creation for one contract).
pub(crate) async fn find_or_create_bill_locked(
    db: &DatabaseConnection,
    key: &BillingPeriodKey,
) -> Result<(bill::Model, bool)> {
    if let Some(existing) = find_bill(db, key).await? {
        debug!(bill_id = existing.id, key = %key.describe(), "Bill already exists for key");
        return Ok((existing, false));
    }

    let model = bill::ActiveModel {
        contract_id: Set(key.contract_id),
        year: Set(key.year),
        month: Set(key.month),
        cycle_start: Set(key.cycle_start),
        source_substitute_record_id: Set(key.substitute_column_value()),
        total: Set(Decimal::ZERO),
        payment_detail: Set(serde_json::json!({})),
        calculation_detail: Set(serde_json::json!({})),
        is_settled: Set(false),
        is_invalidated: Set(false),
        generated_at: Set(Utc::now()),
        ..Default::default()
    };

    let created = model.insert(db).await.map_err(|e| match e.sql_err() {
        // Composite unique index backstop: someone inserted this key while
        // the lock was bypassed. Never overwrite.
        Some(sea_orm::SqlErr::UniqueConstraintViolation(_)) => {
            Error::ConcurrentGenerationConflict {
                contract_id: key.contract_id,
            }
        }
        _ => e.into(),
    })?;

    debug!(bill_id = created.id, key = %key.describe(), "Created bill for key");
    Ok((created, true))
}

/// Lock-free payroll twin of [`find_or_create_bill_locked`].
pub(crate) async fn find_or_create_payroll_locked(
    db: &DatabaseConnection,
    key: &BillingPeriodKey,
) -> Result<(payroll::Model, bool)> {
    if let Some(existing) = find_payroll(db, key).await? {
        debug!(payroll_id = existing.id, key = %key.describe(), "Payroll already exists for key");
        return Ok((existing, false));
    }

    let model = payroll::ActiveModel {
        contract_id: Set(key.contract_id),
        year: Set(key.year),
        month: Set(key.month),
        cycle_start: Set(key.cycle_start),
        source_substitute_record_id: Set(key.substitute_column_value()),
        total: Set(Decimal::ZERO),
        payout_detail: Set(serde_json::json!({})),
        calculation_detail: Set(serde_json::json!({})),
        is_settled: Set(false),
        is_invalidated: Set(false),
        generated_at: Set(Utc::now()),
        ..Default::default()
    };

    let created = model.insert(db).await.map_err(|e| match e.sql_err() {
        Some(sea_orm::SqlErr::UniqueConstraintViolation(_)) => {
            Error::ConcurrentGenerationConflict {
                contract_id: key.contract_id,
            }
        }
        _ => e.into(),
    })?;

    debug!(payroll_id = created.id, key = %key.describe(), "Created payroll for key");
    Ok((created, true))
}

/// Updates a bill's detail structures. Passing `None` leaves a structure
/// untouched; a JSON `null` is coerced to `{}` so the columns never hold an
/// absent value.
pub async fn update_bill_details(
    db: &DatabaseConnection,
    bill_id: i64,
    payment_detail: Option<Json>,
    calculation_detail: Option<Json>,
) -> Result<bill::Model> {
    let existing = Bill::find_by_id(bill_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::UnknownPeriod {
            detail: format!("bill {bill_id}"),
        })?;

    let mut active: bill::ActiveModel = existing.into();
    if let Some(detail) = payment_detail {
        active.payment_detail = Set(coerce_detail(detail));
    }
    if let Some(detail) = calculation_detail {
        active.calculation_detail = Set(coerce_detail(detail));
    }
    active.update(db).await.map_err(Into::into)
}

/// Updates a payroll's detail structures under the same never-null policy
/// as [`update_bill_details`].
pub async fn update_payroll_details(
    db: &DatabaseConnection,
    payroll_id: i64,
    payout_detail: Option<Json>,
    calculation_detail: Option<Json>,
) -> Result<payroll::Model> {
    let existing = Payroll::find_by_id(payroll_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::UnknownPeriod {
            detail: format!("payroll {payroll_id}"),
        })?;

    let mut active: payroll::ActiveModel = existing.into();
    if let Some(detail) = payout_detail {
        active.payout_detail = Set(coerce_detail(detail));
    }
    if let Some(detail) = calculation_detail {
        active.calculation_detail = Set(coerce_detail(detail));
    }
    active.update(db).await.map_err(Into::into)
}

/// Marks a bill settled (payment recorded). Settled bills are never
/// physically deleted; only soft invalidation remains available.
pub async fn settle_bill(db: &DatabaseConnection, bill_id: i64) -> Result<bill::Model> {
    let existing = Bill::find_by_id(bill_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::UnknownPeriod {
            detail: format!("bill {bill_id}"),
        })?;

    let mut active: bill::ActiveModel = existing.into();
    active.is_settled = Set(true);
    active.update(db).await.map_err(Into::into)
}

/// Soft-invalidates a bill. There is no physical delete operation for
/// billing documents anywhere in the crate.
pub async fn invalidate_bill(db: &DatabaseConnection, bill_id: i64) -> Result<bill::Model> {
    let existing = Bill::find_by_id(bill_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::UnknownPeriod {
            detail: format!("bill {bill_id}"),
        })?;

    let mut active: bill::ActiveModel = existing.into();
    active.is_invalidated = Set(true);
    active.update(db).await.map_err(Into::into)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_key_validation_rejects_bad_components() {
        let start = date(2025, 11, 1);

        assert!(matches!(
            BillingPeriodKey::new(0, 2025, 11, start, None).unwrap_err(),
            Error::InvalidPeriodKey { message: _ }
        ));
        assert!(matches!(
            BillingPeriodKey::new(1, 2025, 13, start, None).unwrap_err(),
            Error::InvalidPeriodKey { message: _ }
        ));
        assert!(matches!(
            BillingPeriodKey::new(1, 1999, 11, date(1999, 11, 1), None).unwrap_err(),
            Error::InvalidPeriodKey { message: _ }
        ));
        // Cycle start outside the (year, month) period
        assert!(matches!(
            BillingPeriodKey::new(1, 2025, 11, date(2025, 12, 1), None).unwrap_err(),
            Error::InvalidPeriodKey { message: _ }
        ));
        assert!(matches!(
            BillingPeriodKey::new(1, 2025, 11, start, Some(0)).unwrap_err(),
            Error::InvalidPeriodKey { message: _ }
        ));
    }

    #[test]
    fn test_keys_differing_only_in_substitute_are_distinct() {
        let start = date(2025, 11, 1);
        let primary = BillingPeriodKey::new(1, 2025, 11, start, None).unwrap();
        let substitute = BillingPeriodKey::new(1, 2025, 11, start, Some(7)).unwrap();

        assert_ne!(primary, substitute);
        assert_ne!(
            primary.substitute_column_value(),
            substitute.substitute_column_value()
        );
    }

    #[test]
    fn test_coerce_detail_replaces_null_with_empty_object() {
        assert_eq!(coerce_detail(Json::Null), serde_json::json!({}));
        let detail = serde_json::json!({"method": "bank_transfer"});
        assert_eq!(coerce_detail(detail.clone()), detail);
    }

    #[tokio::test]
    async fn test_find_or_create_bill_is_idempotent() -> Result<()> {
        let (db, contract) = setup_with_contract().await?;
        let key = test_key(contract.id);

        let (first, created_first) = find_or_create_bill(&db, &key).await?;
        assert!(created_first);
        assert_eq!(first.total, Decimal::ZERO);
        assert_eq!(first.payment_detail, serde_json::json!({}));
        assert_eq!(first.calculation_detail, serde_json::json!({}));

        let (second, created_second) = find_or_create_bill(&db, &key).await?;
        assert!(!created_second);
        assert_eq!(first.id, second.id);

        Ok(())
    }

    #[tokio::test]
    async fn test_primary_and_substitute_bills_coexist() -> Result<()> {
        let (db, contract) = setup_with_contract().await?;
        let start = date(2025, 11, 1);

        let primary = BillingPeriodKey::new(contract.id, 2025, 11, start, None)?;
        let split = BillingPeriodKey::new(contract.id, 2025, 11, start, Some(1))?;

        let (bill_primary, _) = find_or_create_bill(&db, &primary).await?;
        let (bill_split, created) = find_or_create_bill(&db, &split).await?;

        assert!(created);
        assert_ne!(bill_primary.id, bill_split.id);

        Ok(())
    }

    #[tokio::test]
    async fn test_find_or_create_conflicts_while_lock_held() -> Result<()> {
        let (db, contract) = setup_with_contract().await?;
        let key = test_key(contract.id);

        // Simulate an in-flight generation pass holding the lock.
        acquire_generation_lock(&db, contract.id).await?;

        let result = find_or_create_bill(&db, &key).await;
        assert!(matches!(
            result.unwrap_err(),
            Error::ConcurrentGenerationConflict { contract_id } if contract_id == contract.id
        ));

        // After the holder releases, generation proceeds normally.
        release_generation_lock(&db, contract.id).await?;
        let (_, created) = find_or_create_bill(&db, &key).await?;
        assert!(created);

        Ok(())
    }

    #[tokio::test]
    async fn test_lock_released_after_successful_pass() -> Result<()> {
        let (db, contract) = setup_with_contract().await?;
        let key = test_key(contract.id);

        find_or_create_bill(&db, &key).await?;
        // A second pass acquires the lock without contention.
        let (_, created) = find_or_create_payroll(&db, &key).await?;
        assert!(created);

        Ok(())
    }

    #[tokio::test]
    async fn test_unique_index_backstop_rejects_duplicate_insert() -> Result<()> {
        let (db, contract) = setup_with_contract().await?;
        let key = test_key(contract.id);

        find_or_create_bill(&db, &key).await?;

        // Bypass the find step entirely and insert the same key directly;
        // the composite unique index must refuse it.
        let duplicate = bill::ActiveModel {
            contract_id: Set(key.contract_id),
            year: Set(key.year),
            month: Set(key.month),
            cycle_start: Set(key.cycle_start),
            source_substitute_record_id: Set(key.substitute_column_value()),
            total: Set(Decimal::ZERO),
            payment_detail: Set(serde_json::json!({})),
            calculation_detail: Set(serde_json::json!({})),
            is_settled: Set(false),
            is_invalidated: Set(false),
            generated_at: Set(Utc::now()),
            ..Default::default()
        };
        let result = duplicate.insert(&db).await;
        assert!(result.is_err());

        Ok(())
    }

    #[tokio::test]
    async fn test_update_details_coerces_null() -> Result<()> {
        let (db, contract) = setup_with_contract().await?;
        let key = test_key(contract.id);
        let (created, _) = find_or_create_bill(&db, &key).await?;

        let updated = update_bill_details(&db, created.id, Some(Json::Null), None).await?;
        assert_eq!(updated.payment_detail, serde_json::json!({}));
        assert_eq!(updated.calculation_detail, serde_json::json!({}));

        let detail = serde_json::json!({"method": "bank_transfer"});
        let updated = update_bill_details(&db, created.id, Some(detail.clone()), None).await?;
        assert_eq!(updated.payment_detail, detail);

        Ok(())
    }

    #[tokio::test]
    async fn test_direct_active_model_update_coerces_null_detail() -> Result<()> {
        let (db, contract) = setup_with_contract().await?;
        let key = test_key(contract.id);
        let (created, _) = find_or_create_bill(&db, &key).await?;

        // Write through the entity directly, bypassing update_bill_details;
        // the before_save hook must still keep the column non-null.
        let mut active: bill::ActiveModel = Bill::find_by_id(created.id)
            .one(&db)
            .await?
            .unwrap()
            .into();
        active.payment_detail = Set(Json::Null);
        active.calculation_detail = Set(Json::Null);
        active.update(&db).await?;

        let reloaded = Bill::find_by_id(created.id).one(&db).await?.unwrap();
        assert_eq!(reloaded.payment_detail, serde_json::json!({}));
        assert_eq!(reloaded.calculation_detail, serde_json::json!({}));

        Ok(())
    }

    #[tokio::test]
    async fn test_direct_active_model_insert_coerces_null_detail() -> Result<()> {
        let (db, contract) = setup_with_contract().await?;
        let key = test_key(contract.id);

        let inserted = payroll::ActiveModel {
            contract_id: Set(key.contract_id),
            year: Set(key.year),
            month: Set(key.month),
            cycle_start: Set(key.cycle_start),
            source_substitute_record_id: Set(key.substitute_column_value()),
            total: Set(Decimal::ZERO),
            payout_detail: Set(Json::Null),
            calculation_detail: Set(Json::Null),
            is_settled: Set(false),
            is_invalidated: Set(false),
            generated_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&db)
        .await?;

        let reloaded = Payroll::find_by_id(inserted.id).one(&db).await?.unwrap();
        assert_eq!(reloaded.payout_detail, serde_json::json!({}));
        assert_eq!(reloaded.calculation_detail, serde_json::json!({}));

        Ok(())
    }

    #[tokio::test]
    async fn test_concurrent_find_or_create_yields_single_row() -> Result<()> {
        let (db, contract) = setup_with_contract().await?;
        let key = test_key(contract.id);

        // Two generation passes racing on the same key. Either the loser
        // trips the lock and fails fast, or the passes serialize and the
        // second lands on the first's row. Never two rows.
        let (first, second) = tokio::join!(
            find_or_create_bill(&db, &key),
            find_or_create_bill(&db, &key)
        );

        match (first, second) {
            (Ok((a, a_created)), Ok((b, b_created))) => {
                assert_eq!(a.id, b.id);
                assert!(a_created ^ b_created);
            }
            (Ok((_, created)), Err(err)) | (Err(err), Ok((_, created))) => {
                assert!(created);
                assert!(matches!(
                    err,
                    Error::ConcurrentGenerationConflict { contract_id } if contract_id == contract.id
                ));
            }
            (Err(first_err), Err(second_err)) => {
                panic!("both passes failed: {first_err}, {second_err}")
            }
        }

        assert_eq!(Bill::find().all(&db).await?.len(), 1);
        assert!(GenerationLock::find().all(&db).await?.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_lock_released_when_pass_fails_mid_way() -> Result<()> {
        let (db, contract) = setup_with_contract().await?;
        let key = test_key(contract.id);

        // Break the pass between lock acquisition and the bill lookup.
        db.execute_unprepared("DROP TABLE bills").await?;
        let result = find_or_create_bill(&db, &key).await;
        assert!(matches!(result.unwrap_err(), Error::Database(_)));

        // The failed pass must not leave its lock behind.
        assert!(GenerationLock::find().all(&db).await?.is_empty());

        // With the table back, a fresh pass acquires the lock and succeeds.
        crate::config::database::create_tables(&db).await?;
        let (_, created) = find_or_create_bill(&db, &key).await?;
        assert!(created);

        Ok(())
    }

    #[tokio::test]
    async fn test_settle_and_invalidate_bill() -> Result<()> {
        let (db, contract) = setup_with_contract().await?;
        let key = test_key(contract.id);
        let (created, _) = find_or_create_bill(&db, &key).await?;

        let settled = settle_bill(&db, created.id).await?;
        assert!(settled.is_settled);

        let invalidated = invalidate_bill(&db, created.id).await?;
        assert!(invalidated.is_invalidated);
        // The row still exists: no physical deletion.
        assert!(Bill::find_by_id(created.id).one(&db).await?.is_some());

        Ok(())
    }
}
