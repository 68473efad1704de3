//! Read-only aggregation over budgets, allocations and the payment queue.
//!
//! Nothing here writes. Sums run in Rust over exact decimals.

use crate::{
    budget::BudgetAccount,
    disbursement::PaymentStatus,
    error::{LedgerError, LedgerResult},
    money::{serde_2dp, serde_2dp_opt},
    store::LedgerStore,
    types::{EntityId, GroupId, Money},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerReport {
    #[serde(with = "serde_2dp")]
    pub total_budget: Money,
    #[serde(with = "serde_2dp")]
    pub total_remaining_budget: Money,
    pub groups: Vec<GroupReport>,
}

/// One allocation's standing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupReport {
    pub budget_id: EntityId,
    pub project_name: String,
    pub allocation_id: EntityId,
    pub target_group_id: GroupId,
    pub group_name: String,
    pub allocation_percentage: Decimal,
    pub max_recipients: i64,
    /// Live allocated amount; already net of completed disbursements.
    #[serde(with = "serde_2dp")]
    pub remaining_budget: Money,
    /// Sum of the pinned amounts of completed payments.
    #[serde(with = "serde_2dp")]
    pub total_paid: Money,
    #[serde(with = "serde_2dp_opt")]
    pub amount_per_person: Option<Money>,
    pub received_count: i64,
    pub pending_count: i64,
    pub total_citizens: i64,
    pub last_distribution_date: Option<DateTime<Utc>>,
}

pub fn build_report(store: &LedgerStore, budget_id: Option<EntityId>) -> LedgerResult<LedgerReport> {
    let budgets: Vec<BudgetAccount> = match budget_id {
        Some(id) => vec![store
            .get_budget(id)?
            .ok_or_else(|| LedgerError::not_found("budget", id))?],
        None => store.list_budgets()?,
    };

    let mut total_budget = Money::ZERO;
    let mut total_remaining_budget = Money::ZERO;
    let mut groups = Vec::new();

    for budget in &budgets {
        total_budget = checked_total(total_budget, budget.total_budget)?;
        total_remaining_budget = checked_total(total_remaining_budget, budget.remaining_budget)?;

        for allocation in store.allocations_for_budget(budget.id)? {
            let payments = store.payments_for_allocation(allocation.id)?;
            let mut total_paid = Money::ZERO;
            let mut received = HashSet::new();
            let mut pending_count = 0;
            for p in &payments {
                match p.status {
                    PaymentStatus::Completed => {
                        total_paid += p.amount;
                        received.insert(p.citizen_id);
                    }
                    PaymentStatus::Pending => pending_count += 1,
                }
            }

            groups.push(GroupReport {
                budget_id: budget.id,
                project_name: budget.project_name.clone(),
                allocation_id: allocation.id,
                target_group_id: allocation.target_group_id,
                group_name: store
                    .target_group_name(allocation.target_group_id)?
                    .unwrap_or_default(),
                allocation_percentage: allocation.allocation_percentage,
                max_recipients: allocation.max_recipients,
                remaining_budget: allocation.allocated_amount,
                total_paid,
                amount_per_person: allocation.amount_per_person(),
                received_count: received.len() as i64,
                pending_count,
                total_citizens: store.citizen_count_for_group(allocation.target_group_id)?,
                last_distribution_date: store.last_distribution_date(allocation.target_group_id)?,
            });
        }
    }

    log::debug!(
        "report: {} budget(s), {} group row(s)",
        budgets.len(),
        groups.len()
    );
    Ok(LedgerReport {
        total_budget,
        total_remaining_budget,
        groups,
    })
}

fn checked_total(acc: Money, amount: Money) -> LedgerResult<Money> {
    acc.checked_add(amount)
        .ok_or_else(|| LedgerError::validation("combined budget totals exceed the representable amount"))
}
