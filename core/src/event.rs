//! Append-only audit log of ledger writes.
//!
//! RULE: An event is appended inside the same transaction as the write it
//! describes. A rolled-back write leaves no event behind.

use crate::{
    error::LedgerResult,
    money::serde_2dp,
    types::{EntityId, GroupId, Money},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Variants are added over time, never removed or reordered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEvent {
    // ── Budget events ──────────────────────────────
    BudgetCreated {
        budget_id: EntityId,
        year: i32,
        #[serde(with = "serde_2dp")]
        total_budget: Money,
    },
    BudgetUpdated {
        budget_id: EntityId,
        #[serde(with = "serde_2dp")]
        total_budget: Money,
        #[serde(with = "serde_2dp")]
        remaining_budget: Money,
    },
    BudgetDeleted {
        budget_id: EntityId,
    },

    // ── Allocation events ──────────────────────────
    AllocationAdded {
        budget_id: EntityId,
        target_group_id: GroupId,
        percentage: Decimal,
        #[serde(with = "serde_2dp")]
        allocated_amount: Money,
    },
    AllocationUpdated {
        budget_id: EntityId,
        target_group_id: GroupId,
        percentage: Decimal,
        #[serde(with = "serde_2dp")]
        allocated_amount: Money,
    },

    // ── Citizen events ─────────────────────────────
    CitizenRegistered {
        citizen_id: EntityId,
        target_group_id: GroupId,
    },
    CitizenUpdated {
        citizen_id: EntityId,
        target_group_id: GroupId,
    },
    CitizenDeleted {
        citizen_id: EntityId,
    },

    // ── Payment events ─────────────────────────────
    PaymentCreated {
        payment_id: EntityId,
        citizen_id: EntityId,
        allocation_id: EntityId,
        #[serde(with = "serde_2dp")]
        amount: Money,
        queue_order: i64,
    },
    PaymentCompleted {
        payment_id: EntityId,
        allocation_id: EntityId,
        target_group_id: GroupId,
        #[serde(with = "serde_2dp")]
        deducted_amount: Money,
    },
}

impl LedgerEvent {
    /// Stable name for the event_type column.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::BudgetCreated { .. }     => "budget_created",
            Self::BudgetUpdated { .. }     => "budget_updated",
            Self::BudgetDeleted { .. }     => "budget_deleted",
            Self::AllocationAdded { .. }   => "allocation_added",
            Self::AllocationUpdated { .. } => "allocation_updated",
            Self::CitizenRegistered { .. } => "citizen_registered",
            Self::CitizenUpdated { .. }    => "citizen_updated",
            Self::CitizenDeleted { .. }    => "citizen_deleted",
            Self::PaymentCreated { .. }    => "payment_created",
            Self::PaymentCompleted { .. }  => "payment_completed",
        }
    }
}

/// The event log entry as persisted to SQLite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLogEntry {
    pub id: Option<i64>,
    pub event_id: String,
    pub event_type: String,
    pub payload: String, // JSON-serialized LedgerEvent
    pub created_at: DateTime<Utc>,
}

impl EventLogEntry {
    pub fn new(event: &LedgerEvent, at: DateTime<Utc>) -> LedgerResult<Self> {
        Ok(Self {
            id: None,
            event_id: uuid::Uuid::new_v4().to_string(),
            event_type: event.type_name().to_string(),
            payload: serde_json::to_string(event)?,
            created_at: at,
        })
    }

    pub fn event(&self) -> LedgerResult<LedgerEvent> {
        Ok(serde_json::from_str(&self.payload)?)
    }
}
