//! Unified error types and result handling for the billing ledger.
//!
//! Every fallible operation in the crate returns [`Result`]. All ledger-level
//! errors are recoverable by the caller: a cycle run that hits a
//! [`Error::ConcurrentGenerationConflict`] for one contract records it and
//! moves on, while unknown-type/unknown-period errors point at a caller or
//! configuration bug and are surfaced through the `error!` log channel.

use rust_decimal::Decimal;
use thiserror::Error;

/// Crate-wide error type.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration loading or validation failed
    #[error("Configuration error: {message}")]
    Config {
        /// Human-readable description of what went wrong
        message: String,
    },

    /// An adjustment type tag is already present in the registry
    #[error("Adjustment type '{tag}' is already registered")]
    DuplicateTag {
        /// The offending tag
        tag: String,
    },

    /// An adjustment type tag is not present in the registry
    #[error("Unknown adjustment type '{tag}'")]
    UnknownAdjustmentType {
        /// The unrecognized tag
        tag: String,
    },

    /// No bill/payroll row exists for the given billing period key
    #[error("Unknown billing period: {detail}")]
    UnknownPeriod {
        /// Which key or entry failed to resolve
        detail: String,
    },

    /// Another generation pass holds the contract's generation lock
    #[error("Billing generation already in progress for contract {contract_id}")]
    ConcurrentGenerationConflict {
        /// The contract whose lock is held
        contract_id: i64,
    },

    /// A reversal already references the ledger entry
    #[error("Ledger entry {entry_id} has already been reversed")]
    AlreadyReversed {
        /// The entry that was targeted twice
        entry_id: i64,
    },

    /// The entry's adjustment type has no offset counterpart, or the
    /// supplied reversal type is not that counterpart
    #[error("Ledger entry {entry_id} cannot be reversed with the given type")]
    NotReversible {
        /// The entry that cannot be reversed
        entry_id: i64,
    },

    /// Malformed or partial billing period key components
    #[error("Invalid billing period key: {message}")]
    InvalidPeriodKey {
        /// Which component was rejected and why
        message: String,
    },

    /// A monetary amount was rejected (zero adjustments are meaningless)
    #[error("Invalid amount: {amount}")]
    InvalidAmount {
        /// The rejected amount
        amount: Decimal,
    },

    /// Database error from the ORM layer
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Environment variable error
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),
}

/// Convenience `Result` type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
