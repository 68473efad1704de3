//! The ledger engine: one facade over every component.
//!
//! COMPONENTS (each borrows the engine's store and clock per call):
//!   - classifier         pure group assignment
//!   - budget             budget accounts and the remaining-budget cache
//!   - allocation_ledger  percentage shares under the 100% ceiling
//!   - registry           citizens; registration queues a payment
//!   - disbursement       payment pricing and completion
//!   - report             read-only aggregation
//!
//! RULES:
//!   - Every write is one `write_tx`; nothing commits halfway.
//!   - Components never hold state between calls. The database is the state.
//!   - Time flows only through the engine's `Clock`.
//!
//! One engine owns one connection. For concurrent callers, open one engine
//! per thread against the same database file.

use crate::{
    allocation_ledger::{Allocation, AllocationLedger, AllocationRequest, AllocationView},
    budget::{BudgetAccount, BudgetAccounts, BudgetUpdate, NewBudget},
    classifier::{self, TargetGroup},
    clock::{Clock, SystemClock},
    command::LedgerCommand,
    config::LedgerConfig,
    disbursement::{CompletionRequest, Disbursement, DisbursementEngine, Payment, PaymentView},
    error::LedgerResult,
    event::EventLogEntry,
    registry::{Citizen, CitizenRegistry, CitizenStatus, CitizenUpdate, NewCitizen, Registration},
    report::{self, LedgerReport},
    store::LedgerStore,
    types::{EntityId, GroupId, Money},
};
use serde::Serialize;
use serde_json::Value;

pub struct LedgerEngine {
    store: LedgerStore,
    config: LedgerConfig,
    clock: Box<dyn Clock>,
}

impl LedgerEngine {
    /// Wire an engine over an open store. Applies the retry policy and
    /// runs migrations.
    pub fn new(store: LedgerStore, config: LedgerConfig, clock: Box<dyn Clock>) -> LedgerResult<Self> {
        let store = store.with_retry(config.retry.clone())?;
        store.migrate()?;
        Ok(Self { store, config, clock })
    }

    pub fn open(path: &str, config: LedgerConfig) -> LedgerResult<Self> {
        Self::new(LedgerStore::open(path)?, config, Box::new(SystemClock))
    }

    /// Private in-memory database with test defaults.
    pub fn build_test() -> LedgerResult<Self> {
        Self::new(
            LedgerStore::in_memory()?,
            LedgerConfig::default_test(),
            Box::new(SystemClock),
        )
    }

    pub fn with_clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn store(&self) -> &LedgerStore {
        &self.store
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    fn budgets(&self) -> BudgetAccounts<'_> {
        BudgetAccounts::new(&self.store, self.clock.as_ref())
    }

    fn allocations(&self) -> AllocationLedger<'_> {
        AllocationLedger::new(&self.store, self.clock.as_ref())
    }

    fn registry(&self) -> CitizenRegistry<'_> {
        CitizenRegistry::new(&self.store, self.clock.as_ref(), &self.config.classification)
    }

    fn disbursement(&self) -> DisbursementEngine<'_> {
        DisbursementEngine::new(&self.store, self.clock.as_ref())
    }

    // ── Classification ───────────────────────────────────────────

    /// Band-table strategy over the stored target groups.
    pub fn classify(&self, age: i64, income: Money, occupation: &str) -> LedgerResult<GroupId> {
        let bands = self.store.target_groups()?;
        classifier::classify_by_band_table(&self.config.classification, &bands, age, income, occupation)
    }

    pub fn classify_by_threshold(
        &self,
        age: i64,
        income: Money,
        occupation: &str,
    ) -> LedgerResult<GroupId> {
        classifier::classify_by_threshold(&self.config.classification, age, income, occupation)
    }

    pub fn list_target_groups(&self) -> LedgerResult<Vec<TargetGroup>> {
        self.store.target_groups()
    }

    // ── Budgets ──────────────────────────────────────────────────

    pub fn create_budget(&self, new: &NewBudget) -> LedgerResult<BudgetAccount> {
        self.budgets().create(new)
    }

    pub fn update_budget(&self, budget_id: EntityId, update: &BudgetUpdate) -> LedgerResult<BudgetAccount> {
        self.budgets().update(budget_id, update)
    }

    pub fn delete_budget(&self, budget_id: EntityId) -> LedgerResult<()> {
        self.budgets().delete(budget_id)
    }

    pub fn get_budget(&self, budget_id: EntityId) -> LedgerResult<BudgetAccount> {
        self.budgets().get(budget_id)
    }

    pub fn list_budgets(&self) -> LedgerResult<Vec<BudgetAccount>> {
        self.budgets().list()
    }

    // ── Allocations ──────────────────────────────────────────────

    pub fn add_allocation(&self, req: &AllocationRequest) -> LedgerResult<AllocationView> {
        self.allocations().add(req)
    }

    pub fn update_allocation(&self, req: &AllocationRequest) -> LedgerResult<AllocationView> {
        self.allocations().update(req)
    }

    pub fn list_allocations(&self, budget_id: Option<EntityId>) -> LedgerResult<Vec<AllocationView>> {
        self.allocations().list(budget_id)
    }

    pub fn get_allocation(&self, allocation_id: EntityId) -> LedgerResult<Allocation> {
        self.allocations().get(allocation_id)
    }

    // ── Citizens ─────────────────────────────────────────────────

    pub fn register_citizen(&self, new: &NewCitizen) -> LedgerResult<Registration> {
        self.registry().register(new)
    }

    pub fn update_citizen(&self, citizen_id: EntityId, update: &CitizenUpdate) -> LedgerResult<Citizen> {
        self.registry().update(citizen_id, update)
    }

    pub fn delete_citizen(&self, citizen_id: EntityId) -> LedgerResult<Citizen> {
        self.registry().delete(citizen_id)
    }

    pub fn get_citizen(&self, citizen_id: EntityId) -> LedgerResult<Citizen> {
        self.registry().get(citizen_id)
    }

    pub fn list_citizens(&self) -> LedgerResult<Vec<Citizen>> {
        self.registry().list()
    }

    pub fn lookup_citizen(&self, national_id: &str) -> LedgerResult<CitizenStatus> {
        self.registry().lookup_by_national_id(national_id)
    }

    // ── Payments ─────────────────────────────────────────────────

    pub fn create_payment(
        &self,
        citizen_id: EntityId,
        target_group_id: GroupId,
    ) -> LedgerResult<Option<Payment>> {
        self.disbursement().create_payment(citizen_id, target_group_id)
    }

    pub fn complete_payment(&self, req: &CompletionRequest) -> LedgerResult<Disbursement> {
        self.disbursement().complete_payment(req)
    }

    pub fn get_payment(&self, payment_id: EntityId) -> LedgerResult<Payment> {
        self.disbursement().get_payment(payment_id)
    }

    pub fn list_payments(&self, budget_id: Option<EntityId>) -> LedgerResult<Vec<PaymentView>> {
        self.disbursement().list_payments(budget_id)
    }

    pub fn next_pending(&self, target_group_id: GroupId) -> LedgerResult<Option<Payment>> {
        self.disbursement().next_pending(target_group_id)
    }

    // ── Reads ────────────────────────────────────────────────────

    pub fn report(&self, budget_id: Option<EntityId>) -> LedgerResult<LedgerReport> {
        report::build_report(&self.store, budget_id)
    }

    pub fn events_since(&self, after_id: i64) -> LedgerResult<Vec<EventLogEntry>> {
        self.store.events_since(after_id)
    }

    // ── Command dispatch ─────────────────────────────────────────

    /// Run one command and return its result as JSON.
    /// `Quit` is a no-op here; the caller owns the loop.
    pub fn execute(&self, command: &LedgerCommand) -> LedgerResult<Value> {
        log::debug!("engine: executing {}", command.name());
        match command {
            LedgerCommand::ListTargetGroups => to_json(self.list_target_groups()?),
            LedgerCommand::Classify { age, income, occupation } => {
                to_json(self.classify(*age, *income, occupation)?)
            }
            LedgerCommand::ClassifyByThreshold { age, income, occupation } => {
                to_json(self.classify_by_threshold(*age, *income, occupation)?)
            }

            LedgerCommand::CreateBudget(new) => to_json(self.create_budget(new)?),
            LedgerCommand::UpdateBudget {
                budget_id,
                project_name,
                total_budget,
            } => to_json(self.update_budget(
                *budget_id,
                &BudgetUpdate {
                    project_name: project_name.clone(),
                    total_budget: *total_budget,
                },
            )?),
            LedgerCommand::DeleteBudget { budget_id } => {
                self.delete_budget(*budget_id)?;
                to_json(serde_json::json!({ "deleted": budget_id }))
            }
            LedgerCommand::GetBudget { budget_id } => to_json(self.get_budget(*budget_id)?),
            LedgerCommand::ListBudgets => to_json(self.list_budgets()?),

            LedgerCommand::AddAllocation(req) => to_json(self.add_allocation(req)?),
            LedgerCommand::UpdateAllocation(req) => to_json(self.update_allocation(req)?),
            LedgerCommand::ListAllocations { budget_id } => to_json(self.list_allocations(*budget_id)?),

            LedgerCommand::RegisterCitizen(new) => to_json(self.register_citizen(new)?),
            LedgerCommand::UpdateCitizen { citizen_id, update } => {
                to_json(self.update_citizen(*citizen_id, update)?)
            }
            LedgerCommand::DeleteCitizen { citizen_id } => to_json(self.delete_citizen(*citizen_id)?),
            LedgerCommand::LookupCitizen { national_id } => to_json(self.lookup_citizen(national_id)?),
            LedgerCommand::ListCitizens => to_json(self.list_citizens()?),

            LedgerCommand::CreatePayment {
                citizen_id,
                target_group_id,
            } => to_json(self.create_payment(*citizen_id, *target_group_id)?),
            LedgerCommand::CompletePayment(req) => to_json(self.complete_payment(req)?),
            LedgerCommand::ListPayments { budget_id } => to_json(self.list_payments(*budget_id)?),
            LedgerCommand::NextPending { target_group_id } => {
                to_json(self.next_pending(*target_group_id)?)
            }

            LedgerCommand::Report { budget_id } => to_json(self.report(*budget_id)?),
            LedgerCommand::EventsSince { after_id } => to_json(self.events_since(*after_id)?),
            LedgerCommand::Quit => Ok(Value::Null),
        }
    }
}

fn to_json<T: Serialize>(value: T) -> LedgerResult<Value> {
    Ok(serde_json::to_value(value)?)
}
