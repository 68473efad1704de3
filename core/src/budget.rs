//! BudgetAccount: the root resource that allocations draw from.
//!
//! `remaining_budget` is a cache of `total_budget − Σ allocated_amount`.
//! It is only ever written by `recompute_remaining`, inside the same
//! transaction as the allocation or total change that invalidated it.

use crate::{
    clock::Clock,
    error::{LedgerError, LedgerResult},
    event::LedgerEvent,
    money::serde_2dp,
    store::LedgerStore,
    types::{EntityId, Money},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BudgetAccount {
    pub id: EntityId,
    pub year: i32,
    pub project_name: String,
    #[serde(with = "serde_2dp")]
    pub total_budget: Money,
    #[serde(with = "serde_2dp")]
    pub remaining_budget: Money,
    #[serde(skip)]
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBudget {
    pub year: i32,
    pub project_name: String,
    pub total_budget: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetUpdate {
    pub project_name: String,
    pub total_budget: Money,
}

pub struct BudgetAccounts<'a> {
    store: &'a LedgerStore,
    clock: &'a dyn Clock,
}

impl<'a> BudgetAccounts<'a> {
    pub fn new(store: &'a LedgerStore, clock: &'a dyn Clock) -> Self {
        Self { store, clock }
    }

    pub fn create(&self, new: &NewBudget) -> LedgerResult<BudgetAccount> {
        if new.year <= 0 {
            return Err(LedgerError::validation("year must be positive"));
        }
        validate_name_and_total(&new.project_name, new.total_budget)?;

        let now = self.clock.now();
        self.store.write_tx("create_budget", |s| {
            let id = s.insert_budget(new.year, new.project_name.trim(), new.total_budget, now)?;
            s.append_event(
                &LedgerEvent::BudgetCreated {
                    budget_id: id,
                    year: new.year,
                    total_budget: new.total_budget,
                },
                now,
            )?;
            log::info!(
                "budget: created {id} '{}' ({}) total {}",
                new.project_name,
                new.year,
                new.total_budget
            );
            require(s, id)
        })
    }

    /// Change name and total. Allocations keep their pinned amounts; the
    /// remaining cache is recomputed against the new total.
    pub fn update(&self, budget_id: EntityId, update: &BudgetUpdate) -> LedgerResult<BudgetAccount> {
        validate_name_and_total(&update.project_name, update.total_budget)?;

        let now = self.clock.now();
        self.store.write_tx("update_budget", |s| {
            let budget = require(s, budget_id)?;
            let allocated = total_allocated(s, budget_id)?;
            let remaining = update.total_budget - allocated;
            if remaining < Money::ZERO {
                return Err(LedgerError::validation(format!(
                    "total_budget {} is below the {} already allocated on budget {budget_id}",
                    update.total_budget, allocated
                )));
            }
            s.update_budget_fields(
                budget_id,
                budget.version,
                update.project_name.trim(),
                update.total_budget,
                remaining,
                now,
            )?;
            s.append_event(
                &LedgerEvent::BudgetUpdated {
                    budget_id,
                    total_budget: update.total_budget,
                    remaining_budget: remaining,
                },
                now,
            )?;
            log::info!("budget: updated {budget_id} total {} remaining {remaining}", update.total_budget);
            require(s, budget_id)
        })
    }

    pub fn delete(&self, budget_id: EntityId) -> LedgerResult<()> {
        let now = self.clock.now();
        self.store.write_tx("delete_budget", |s| {
            require(s, budget_id)?;
            let allocations = s.allocation_count_for_budget(budget_id)?;
            if allocations > 0 {
                return Err(LedgerError::validation(format!(
                    "budget {budget_id} still has {allocations} allocation(s)"
                )));
            }
            s.delete_budget(budget_id)?;
            s.append_event(&LedgerEvent::BudgetDeleted { budget_id }, now)?;
            log::info!("budget: deleted {budget_id}");
            Ok(())
        })
    }

    pub fn get(&self, budget_id: EntityId) -> LedgerResult<BudgetAccount> {
        require(self.store, budget_id)
    }

    pub fn list(&self) -> LedgerResult<Vec<BudgetAccount>> {
        self.store.list_budgets()
    }
}

fn validate_name_and_total(project_name: &str, total_budget: Money) -> LedgerResult<()> {
    if project_name.trim().is_empty() {
        return Err(LedgerError::validation("project_name is required"));
    }
    if total_budget <= Money::ZERO {
        return Err(LedgerError::validation("total_budget must be positive"));
    }
    Ok(())
}

pub(crate) fn require(store: &LedgerStore, budget_id: EntityId) -> LedgerResult<BudgetAccount> {
    store
        .get_budget(budget_id)?
        .ok_or_else(|| LedgerError::not_found("budget", budget_id))
}

/// Σ allocated_amount over the budget's allocations, exact.
pub(crate) fn total_allocated(store: &LedgerStore, budget_id: EntityId) -> LedgerResult<Money> {
    Ok(store
        .allocations_for_budget(budget_id)?
        .iter()
        .map(|a| a.allocated_amount)
        .sum())
}

/// Rewrite the remaining cache from the allocations. Must run inside the
/// caller's write transaction.
pub(crate) fn recompute_remaining(
    store: &LedgerStore,
    budget_id: EntityId,
) -> LedgerResult<BudgetAccount> {
    let budget = require(store, budget_id)?;
    let remaining = budget.total_budget - total_allocated(store, budget_id)?;
    store.set_remaining_budget(budget_id, budget.version, remaining)?;
    log::debug!("budget: {budget_id} remaining recomputed to {remaining}");
    require(store, budget_id)
}
