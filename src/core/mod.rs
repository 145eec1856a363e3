//! Core business logic - framework-agnostic ledger, period, registry, and
//! cycle operations. All functions are async and return Result types for
//! error handling.

/// Billing cycle runs and stale-lock reaping
pub mod cycle;
/// Adjustment booking, reversal, and totals
pub mod ledger;
/// Billing period keys, generation locks, and document creation
pub mod period;
/// Adjustment type registry operations
pub mod registry;
