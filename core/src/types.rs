//! Shared primitive types used across the entire ledger.

/// Exact decimal amount. Never a binary float.
pub type Money = rust_decimal::Decimal;

/// Row identifier for every persisted entity.
pub type EntityId = i64;

/// Target group identifier (elderly, low income, farmer, other, ...).
pub type GroupId = i64;
