//! Allocation ledger: splits a budget across target groups by percentage.
//!
//! INVARIANTS (hold after every committed call):
//!   - Σ allocation_percentage ≤ 100 per budget, compared exactly (no tolerance).
//!   - allocated_amount = percentage / 100 × total_budget as of the last write.
//!   - remaining_budget = total_budget − Σ allocated_amount.
//!
//! The sum-check and the write share one immediate transaction, so two
//! concurrent adds against one budget cannot both pass on a stale sum.

use crate::{
    budget,
    clock::Clock,
    error::{LedgerError, LedgerResult},
    event::LedgerEvent,
    money::{self, serde_2dp, serde_2dp_opt},
    store::LedgerStore,
    types::{EntityId, GroupId, Money},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One allocation row: a budget's share for one target group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Allocation {
    pub id: EntityId,
    pub budget_id: EntityId,
    pub target_group_id: GroupId,
    pub allocation_percentage: Decimal,
    pub max_recipients: i64,
    #[serde(with = "serde_2dp")]
    pub allocated_amount: Money,
    #[serde(skip)]
    pub version: i64,
}

impl Allocation {
    /// Live per-person amount; `None` when the group has no recipient cap.
    pub fn amount_per_person(&self) -> Option<Money> {
        money::per_person(self.allocated_amount, self.max_recipients)
    }
}

/// Input to `add` and `update`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationRequest {
    pub budget_id: EntityId,
    pub target_group_id: GroupId,
    pub allocation_percentage: Decimal,
    pub max_recipients: i64,
}

/// Read projection joined with budget and group names.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AllocationView {
    pub allocation_id: EntityId,
    pub budget_id: EntityId,
    pub project_name: String,
    pub target_group_id: GroupId,
    pub target_group: String,
    pub allocation_percentage: Decimal,
    pub max_recipients: i64,
    #[serde(with = "serde_2dp")]
    pub allocated_amount: Money,
    #[serde(with = "serde_2dp")]
    pub remaining_budget: Money,
    #[serde(with = "serde_2dp_opt")]
    pub amount_per_person: Option<Money>,
}

pub struct AllocationLedger<'a> {
    store: &'a LedgerStore,
    clock: &'a dyn Clock,
}

impl<'a> AllocationLedger<'a> {
    pub fn new(store: &'a LedgerStore, clock: &'a dyn Clock) -> Self {
        Self { store, clock }
    }

    pub fn add(&self, req: &AllocationRequest) -> LedgerResult<AllocationView> {
        if req.allocation_percentage <= Decimal::ZERO {
            return Err(LedgerError::validation("allocation_percentage must be positive"));
        }
        validate_recipients(req.max_recipients)?;

        let now = self.clock.now();
        let allocation_id = self.store.write_tx("add_allocation", |s| {
            let account = budget::require(s, req.budget_id)?;
            require_group(s, req.target_group_id)?;

            let existing = s.allocations_for_budget(req.budget_id)?;
            if existing.iter().any(|a| a.target_group_id == req.target_group_id) {
                return Err(LedgerError::validation(format!(
                    "budget {} already allocates to group {}; update it instead",
                    req.budget_id, req.target_group_id
                )));
            }
            let current: Decimal = existing.iter().map(|a| a.allocation_percentage).sum();
            check_ceiling(req.budget_id, current + req.allocation_percentage)?;

            let allocated = money::share_of(account.total_budget, req.allocation_percentage);
            let id = s.insert_allocation(
                req.budget_id,
                req.target_group_id,
                req.allocation_percentage,
                req.max_recipients,
                allocated,
            )?;
            budget::recompute_remaining(s, req.budget_id)?;
            s.append_event(
                &LedgerEvent::AllocationAdded {
                    budget_id: req.budget_id,
                    target_group_id: req.target_group_id,
                    percentage: req.allocation_percentage,
                    allocated_amount: allocated,
                },
                now,
            )?;
            log::info!(
                "allocation: budget {} group {} at {}% -> {}",
                req.budget_id,
                req.target_group_id,
                req.allocation_percentage,
                money::format_2dp(allocated)
            );
            Ok(id)
        })?;
        self.view(allocation_id)
    }

    /// Revise a group's share. The group's own prior percentage is excluded
    /// from the ceiling sum. `allocated_amount` is re-derived from the
    /// percentage, which discards any deductions made by disbursements.
    pub fn update(&self, req: &AllocationRequest) -> LedgerResult<AllocationView> {
        if req.allocation_percentage < Decimal::ZERO {
            return Err(LedgerError::validation("allocation_percentage must not be negative"));
        }
        validate_recipients(req.max_recipients)?;

        let now = self.clock.now();
        let allocation_id = self.store.write_tx("update_allocation", |s| {
            let account = budget::require(s, req.budget_id)?;
            let existing = s.allocations_for_budget(req.budget_id)?;
            let current = existing
                .iter()
                .find(|a| a.target_group_id == req.target_group_id)
                .ok_or_else(|| {
                    LedgerError::not_found(
                        "allocation",
                        format!("budget {} / group {}", req.budget_id, req.target_group_id),
                    )
                })?;
            let others: Decimal = existing
                .iter()
                .filter(|a| a.target_group_id != req.target_group_id)
                .map(|a| a.allocation_percentage)
                .sum();
            check_ceiling(req.budget_id, others + req.allocation_percentage)?;

            let allocated = money::share_of(account.total_budget, req.allocation_percentage);
            s.update_allocation_terms(
                current.id,
                current.version,
                req.allocation_percentage,
                req.max_recipients,
                allocated,
            )?;
            budget::recompute_remaining(s, req.budget_id)?;
            s.append_event(
                &LedgerEvent::AllocationUpdated {
                    budget_id: req.budget_id,
                    target_group_id: req.target_group_id,
                    percentage: req.allocation_percentage,
                    allocated_amount: allocated,
                },
                now,
            )?;
            log::info!(
                "allocation: budget {} group {} revised {}% -> {}%",
                req.budget_id,
                req.target_group_id,
                current.allocation_percentage,
                req.allocation_percentage
            );
            Ok(current.id)
        })?;
        self.view(allocation_id)
    }

    /// All allocations, or one budget's, ordered by budget then group.
    pub fn list(&self, budget_id: Option<EntityId>) -> LedgerResult<Vec<AllocationView>> {
        if let Some(id) = budget_id {
            budget::require(self.store, id)?;
        }
        self.store.allocation_views(budget_id)
    }

    pub fn get(&self, allocation_id: EntityId) -> LedgerResult<Allocation> {
        self.store
            .get_allocation(allocation_id)?
            .ok_or_else(|| LedgerError::not_found("allocation", allocation_id))
    }

    fn view(&self, allocation_id: EntityId) -> LedgerResult<AllocationView> {
        self.store
            .allocation_view(allocation_id)?
            .ok_or_else(|| LedgerError::not_found("allocation", allocation_id))
    }
}

fn validate_recipients(max_recipients: i64) -> LedgerResult<()> {
    if max_recipients < 0 {
        return Err(LedgerError::validation("max_recipients must not be negative"));
    }
    Ok(())
}

fn check_ceiling(budget_id: EntityId, total: Decimal) -> LedgerResult<()> {
    if total > Decimal::ONE_HUNDRED {
        log::warn!("allocation: budget {budget_id} rejected at {total}%");
        return Err(LedgerError::OverAllocation {
            budget_id,
            total: total.normalize(),
        });
    }
    Ok(())
}

fn require_group(store: &LedgerStore, group_id: GroupId) -> LedgerResult<()> {
    if !store.target_group_exists(group_id)? {
        return Err(LedgerError::not_found("target group", group_id));
    }
    Ok(())
}
