//! Disbursement engine. Prices payments and moves them Pending → Completed.
//!
//! STATE MACHINE (per payment):
//!   Pending --complete--> Completed
//! Completed is terminal. Completing twice is rejected, never deducted twice.
//!
//! A completion is one four-way write in one transaction:
//!   1. allocation.allocated_amount -= amount_per_person
//!   2. budget.remaining_budget recomputed from the allocations
//!   3. payment.status = completed
//!   4. distribution event appended for the group
//! Either all four commit or none do.
//!
//! Pricing is pinned: a payment's `amount` is fixed when it is created. The
//! deduction at completion uses the allocation's live per-person amount,
//! which shrinks as the allocation is drawn down. The two can diverge.

use crate::{
    budget,
    clock::Clock,
    error::{LedgerError, LedgerResult},
    event::LedgerEvent,
    money::{self, serde_2dp},
    store::LedgerStore,
    types::{EntityId, GroupId, Money},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Completed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            other => Err(format!("unknown payment status '{other}'")),
        }
    }
}

/// A cash transfer owed to one citizen from one allocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Payment {
    pub id: EntityId,
    pub citizen_id: EntityId,
    pub allocation_id: EntityId,
    /// Pinned at creation; not re-derived when the allocation changes.
    #[serde(with = "serde_2dp")]
    pub amount: Money,
    pub status: PaymentStatus,
    pub queue_order: i64,
    pub transaction_date: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Identifies the payment to complete. Citizen, group and budget must all
/// agree with the stored payment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub payment_id: EntityId,
    pub citizen_id: EntityId,
    pub target_group_id: GroupId,
    pub budget_id: EntityId,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Disbursement {
    pub payment: Payment,
    #[serde(with = "serde_2dp")]
    pub deducted_amount: Money,
    pub distribution_recorded: bool,
}

/// Payment joined with its citizen, group and budget, for queue listings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentView {
    pub payment_id: EntityId,
    pub queue_order: i64,
    pub citizen_id: EntityId,
    pub national_id: String,
    pub first_name: String,
    pub last_name: String,
    pub target_group_id: GroupId,
    pub group_name: String,
    pub budget_id: EntityId,
    pub allocation_id: EntityId,
    #[serde(with = "serde_2dp")]
    pub amount: Money,
    pub status: PaymentStatus,
    pub transaction_date: DateTime<Utc>,
}

pub struct DisbursementEngine<'a> {
    store: &'a LedgerStore,
    clock: &'a dyn Clock,
}

impl<'a> DisbursementEngine<'a> {
    pub fn new(store: &'a LedgerStore, clock: &'a dyn Clock) -> Self {
        Self { store, clock }
    }

    /// Queue a payment for a newly registered citizen. A citizen gets at
    /// most one payment, always against their own group's allocation.
    ///
    /// Returns `None` when the group has no allocation, or its allocation has
    /// no recipient cap to price against. Joins the caller's transaction when
    /// one is open, so the citizen insert and the payment commit together.
    pub fn create_payment(
        &self,
        citizen_id: EntityId,
        target_group_id: GroupId,
    ) -> LedgerResult<Option<Payment>> {
        let now = self.clock.now();
        self.store.write_tx("create_payment", |s| {
            let citizen = s
                .get_citizen(citizen_id)?
                .ok_or_else(|| LedgerError::not_found("citizen", citizen_id))?;
            if citizen.target_group_id != target_group_id {
                return Err(LedgerError::validation(format!(
                    "citizen {citizen_id} belongs to target group {}, not {target_group_id}",
                    citizen.target_group_id
                )));
            }
            if s.payment_count_for_citizen(citizen_id)? > 0 {
                return Err(LedgerError::validation(format!(
                    "citizen {citizen_id} already has a payment"
                )));
            }
            let Some(allocation) = s.current_allocation_for_group(target_group_id)? else {
                log::debug!("disbursement: group {target_group_id} has no allocation, no payment");
                return Ok(None);
            };
            let Some(amount) = allocation.amount_per_person() else {
                log::warn!(
                    "disbursement: allocation {} has max_recipients 0, no payment for citizen {citizen_id}",
                    allocation.id
                );
                return Ok(None);
            };

            let queue_order = s.next_queue_order()?;
            let payment_id =
                s.insert_payment(citizen_id, allocation.id, amount, queue_order, now)?;
            s.append_event(
                &LedgerEvent::PaymentCreated {
                    payment_id,
                    citizen_id,
                    allocation_id: allocation.id,
                    amount,
                    queue_order,
                },
                now,
            )?;
            log::info!(
                "disbursement: queued payment {payment_id} #{queue_order} for citizen {citizen_id}: {}",
                money::format_2dp(amount)
            );
            require_payment(s, payment_id).map(Some)
        })
    }

    pub fn complete_payment(&self, req: &CompletionRequest) -> LedgerResult<Disbursement> {
        let now = self.clock.now();
        let result = self.store.write_tx("complete_payment", |s| {
            let payment = s
                .get_payment(req.payment_id)?
                .filter(|p| p.citizen_id == req.citizen_id)
                .ok_or_else(|| {
                    LedgerError::not_found(
                        "payment",
                        format!("{} for citizen {}", req.payment_id, req.citizen_id),
                    )
                })?;
            if payment.status == PaymentStatus::Completed {
                return Err(LedgerError::validation(format!(
                    "payment {} is already completed",
                    payment.id
                )));
            }

            let allocation = s
                .get_allocation(payment.allocation_id)?
                .ok_or_else(|| LedgerError::not_found("allocation", payment.allocation_id))?;
            if allocation.budget_id != req.budget_id
                || allocation.target_group_id != req.target_group_id
            {
                return Err(LedgerError::validation(format!(
                    "payment {} draws on budget {} / group {}, not budget {} / group {}",
                    payment.id,
                    allocation.budget_id,
                    allocation.target_group_id,
                    req.budget_id,
                    req.target_group_id
                )));
            }
            let per_person = allocation.amount_per_person().ok_or_else(|| {
                LedgerError::validation(format!(
                    "allocation {} has max_recipients 0; cannot price a disbursement",
                    allocation.id
                ))
            })?;
            if per_person <= Money::ZERO || allocation.allocated_amount < per_person {
                return Err(LedgerError::InsufficientFunds {
                    allocation_id: allocation.id,
                    allocated: allocation.allocated_amount,
                    required: per_person,
                });
            }

            s.set_allocated_amount(
                allocation.id,
                allocation.version,
                allocation.allocated_amount - per_person,
            )?;
            budget::recompute_remaining(s, allocation.budget_id)?;
            if s.mark_payment_completed(payment.id, now)? == 0 {
                return Err(LedgerError::StaleVersion {
                    entity: "payment",
                    id: payment.id,
                });
            }
            s.insert_distribution_event(allocation.target_group_id, payment.id, now)?;
            s.append_event(
                &LedgerEvent::PaymentCompleted {
                    payment_id: payment.id,
                    allocation_id: allocation.id,
                    target_group_id: allocation.target_group_id,
                    deducted_amount: per_person,
                },
                now,
            )?;

            Ok(Disbursement {
                payment: require_payment(s, payment.id)?,
                deducted_amount: per_person,
                distribution_recorded: true,
            })
        });

        match &result {
            Ok(d) => log::info!(
                "disbursement: payment {} completed, deducted {}",
                d.payment.id,
                money::format_2dp(d.deducted_amount)
            ),
            Err(e) => log::warn!("disbursement: payment {} not completed: {e}", req.payment_id),
        }
        result
    }

    pub fn get_payment(&self, payment_id: EntityId) -> LedgerResult<Payment> {
        require_payment(self.store, payment_id)
    }

    /// Payment queue, optionally limited to one budget; ordered by group then queue order.
    pub fn list_payments(&self, budget_id: Option<EntityId>) -> LedgerResult<Vec<PaymentView>> {
        self.store.payment_views(budget_id)
    }

    /// FIFO head: the group's pending payment with the lowest queue order.
    pub fn next_pending(&self, target_group_id: GroupId) -> LedgerResult<Option<Payment>> {
        self.store.next_pending_for_group(target_group_id)
    }
}

fn require_payment(store: &LedgerStore, payment_id: EntityId) -> LedgerResult<Payment> {
    store
        .get_payment(payment_id)?
        .ok_or_else(|| LedgerError::not_found("payment", payment_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_text() {
        for status in [PaymentStatus::Pending, PaymentStatus::Completed] {
            assert_eq!(status.as_str().parse::<PaymentStatus>().unwrap(), status);
        }
        assert!("cancelled".parse::<PaymentStatus>().is_err());
    }
}
