use crate::{
    allocation_ledger::AllocationRequest,
    budget::NewBudget,
    disbursement::CompletionRequest,
    registry::{CitizenUpdate, NewCitizen},
    types::{EntityId, GroupId, Money},
};
use serde::{Deserialize, Serialize};

/// Every request the runner accepts, one JSON object per line:
/// `{"cmd": "add_allocation", "budget_id": 1, ...}`.
/// Money travels as decimal strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum LedgerCommand {
    // ── Classification ────────────────────────────
    ListTargetGroups,
    Classify {
        age: i64,
        income: Money,
        occupation: String,
    },
    ClassifyByThreshold {
        age: i64,
        income: Money,
        occupation: String,
    },

    // ── Budgets ───────────────────────────────────
    CreateBudget(NewBudget),
    UpdateBudget {
        budget_id: EntityId,
        project_name: String,
        total_budget: Money,
    },
    DeleteBudget {
        budget_id: EntityId,
    },
    GetBudget {
        budget_id: EntityId,
    },
    ListBudgets,

    // ── Allocations ───────────────────────────────
    AddAllocation(AllocationRequest),
    UpdateAllocation(AllocationRequest),
    ListAllocations {
        #[serde(default)]
        budget_id: Option<EntityId>,
    },

    // ── Citizens ──────────────────────────────────
    RegisterCitizen(NewCitizen),
    UpdateCitizen {
        citizen_id: EntityId,
        #[serde(flatten)]
        update: CitizenUpdate,
    },
    DeleteCitizen {
        citizen_id: EntityId,
    },
    LookupCitizen {
        national_id: String,
    },
    ListCitizens,

    // ── Payments ──────────────────────────────────
    CreatePayment {
        citizen_id: EntityId,
        target_group_id: GroupId,
    },
    CompletePayment(CompletionRequest),
    ListPayments {
        #[serde(default)]
        budget_id: Option<EntityId>,
    },
    NextPending {
        target_group_id: GroupId,
    },

    // ── Reads ─────────────────────────────────────
    Report {
        #[serde(default)]
        budget_id: Option<EntityId>,
    },
    EventsSince {
        #[serde(default)]
        after_id: i64,
    },

    Quit,
}

impl LedgerCommand {
    pub fn name(&self) -> &'static str {
        match self {
            Self::ListTargetGroups => "list_target_groups",
            Self::Classify { .. } => "classify",
            Self::ClassifyByThreshold { .. } => "classify_by_threshold",
            Self::CreateBudget(_) => "create_budget",
            Self::UpdateBudget { .. } => "update_budget",
            Self::DeleteBudget { .. } => "delete_budget",
            Self::GetBudget { .. } => "get_budget",
            Self::ListBudgets => "list_budgets",
            Self::AddAllocation(_) => "add_allocation",
            Self::UpdateAllocation(_) => "update_allocation",
            Self::ListAllocations { .. } => "list_allocations",
            Self::RegisterCitizen(_) => "register_citizen",
            Self::UpdateCitizen { .. } => "update_citizen",
            Self::DeleteCitizen { .. } => "delete_citizen",
            Self::LookupCitizen { .. } => "lookup_citizen",
            Self::ListCitizens => "list_citizens",
            Self::CreatePayment { .. } => "create_payment",
            Self::CompletePayment(_) => "complete_payment",
            Self::ListPayments { .. } => "list_payments",
            Self::NextPending { .. } => "next_pending",
            Self::Report { .. } => "report",
            Self::EventsSince { .. } => "events_since",
            Self::Quit => "quit",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn parses_tagged_allocation_command() {
        let cmd: LedgerCommand = serde_json::from_str(
            r#"{"cmd":"add_allocation","budget_id":1,"target_group_id":2,
                "allocation_percentage":"33.5","max_recipients":10}"#,
        )
        .unwrap();
        match cmd {
            LedgerCommand::AddAllocation(req) => {
                assert_eq!(req.budget_id, 1);
                assert_eq!(req.allocation_percentage, Money::from_str("33.5").unwrap());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn optional_budget_filter_defaults_to_none() {
        let cmd: LedgerCommand = serde_json::from_str(r#"{"cmd":"report"}"#).unwrap();
        assert!(matches!(cmd, LedgerCommand::Report { budget_id: None }));
        assert_eq!(cmd.name(), "report");
    }

    #[test]
    fn unknown_command_is_rejected() {
        assert!(serde_json::from_str::<LedgerCommand>(r#"{"cmd":"pay_everyone"}"#).is_err());
    }
}
