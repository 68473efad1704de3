//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use aidledger_core::{
    allocation_ledger::{AllocationRequest, AllocationView},
    budget::{BudgetAccount, NewBudget},
    clock::FixedClock,
    config::LedgerConfig,
    engine::LedgerEngine,
    registry::NewCitizen,
    store::LedgerStore,
    types::{EntityId, GroupId, Money},
};
use chrono::{NaiveDate, TimeZone, Utc};
use std::path::PathBuf;
use std::str::FromStr;

pub const ELDERLY: GroupId = 1;
pub const LOW_INCOME: GroupId = 2;
pub const FARMER: GroupId = 3;
pub const OTHER: GroupId = 4;

pub fn dec(s: &str) -> Money {
    Money::from_str(s).expect("decimal literal")
}

pub fn fixed_clock() -> Box<FixedClock> {
    Box::new(FixedClock(Utc.with_ymd_and_hms(2025, 1, 15, 9, 0, 0).unwrap()))
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// In-memory engine on 2025-01-15.
pub fn engine() -> LedgerEngine {
    init_logging();
    LedgerEngine::build_test()
        .expect("in-memory engine")
        .with_clock(fixed_clock())
}

pub fn budget(engine: &LedgerEngine, total: &str) -> BudgetAccount {
    engine
        .create_budget(&NewBudget {
            year: 2025,
            project_name: "Cash transfer 2025".into(),
            total_budget: dec(total),
        })
        .expect("create budget")
}

pub fn allocation_request(
    budget_id: EntityId,
    group: GroupId,
    pct: &str,
    max_recipients: i64,
) -> AllocationRequest {
    AllocationRequest {
        budget_id,
        target_group_id: group,
        allocation_percentage: dec(pct),
        max_recipients,
    }
}

pub fn allocate(
    engine: &LedgerEngine,
    budget_id: EntityId,
    group: GroupId,
    pct: &str,
    max_recipients: i64,
) -> AllocationView {
    engine
        .add_allocation(&allocation_request(budget_id, group, pct, max_recipients))
        .expect("add allocation")
}

pub fn applicant(national_id: &str, birth: (i32, u32, u32), income: &str, occupation: &str) -> NewCitizen {
    NewCitizen {
        national_id: national_id.into(),
        first_name: "Somchai".into(),
        last_name: "Srisuk".into(),
        birth_date: NaiveDate::from_ymd_opt(birth.0, birth.1, birth.2).unwrap(),
        income: dec(income),
        occupation: occupation.into(),
    }
}

/// 74 on the fixture date; lands in the elderly group under either strategy.
pub fn elderly(national_id: &str) -> NewCitizen {
    applicant(national_id, (1950, 3, 1), "12000", "retired")
}

/// 34, low income.
pub fn low_income(national_id: &str) -> NewCitizen {
    applicant(national_id, (1990, 5, 5), "6000", "พนักงานบริษัท")
}

/// Sum of allocated amounts plus the remaining cache must equal the total.
pub fn assert_conserved(engine: &LedgerEngine, budget_id: EntityId) {
    let budget = engine.get_budget(budget_id).expect("budget");
    let allocated: Money = engine
        .store()
        .allocations_for_budget(budget_id)
        .expect("allocations")
        .iter()
        .map(|a| a.allocated_amount)
        .sum();
    assert_eq!(
        budget.total_budget,
        budget.remaining_budget + allocated,
        "conservation broken on budget {budget_id}: remaining {} + allocated {allocated}",
        budget.remaining_budget
    );
}

/// Unique database file under the system temp dir.
pub struct TempDb {
    pub path: PathBuf,
}

impl TempDb {
    pub fn new() -> Self {
        let path = std::env::temp_dir().join(format!("aidledger-{}.db", uuid::Uuid::new_v4()));
        Self { path }
    }

    pub fn path_str(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }

    pub fn engine(&self) -> LedgerEngine {
        init_logging();
        LedgerEngine::open(&self.path_str(), LedgerConfig::default_test())
            .expect("open file engine")
            .with_clock(fixed_clock())
    }

    pub fn store(&self) -> LedgerStore {
        LedgerStore::open(&self.path_str()).expect("open file store")
    }
}

impl Drop for TempDb {
    fn drop(&mut self) {
        for suffix in ["", "-wal", "-shm"] {
            let mut p = self.path.clone().into_os_string();
            p.push(suffix);
            let _ = std::fs::remove_file(p);
        }
    }
}
