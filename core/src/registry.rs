//! Citizen registry, the collaborator that feeds the ledger.
//!
//! Registration classifies with the threshold chain and queues the
//! citizen's payment in the same transaction as the insert. Updates
//! reclassify with the band table and leave existing payments alone.

use crate::{
    classifier,
    clock::{self, Clock},
    config::ClassificationConfig,
    disbursement::{DisbursementEngine, Payment},
    error::{LedgerError, LedgerResult},
    event::LedgerEvent,
    money::serde_2dp,
    store::LedgerStore,
    types::{EntityId, GroupId, Money},
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Citizen {
    pub id: EntityId,
    pub national_id: String,
    pub first_name: String,
    pub last_name: String,
    pub birth_date: NaiveDate,
    pub age: i64,
    #[serde(with = "serde_2dp")]
    pub income: Money,
    pub occupation: String,
    pub target_group_id: GroupId,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCitizen {
    pub national_id: String,
    pub first_name: String,
    pub last_name: String,
    pub birth_date: NaiveDate,
    pub income: Money,
    pub occupation: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CitizenUpdate {
    pub first_name: String,
    pub last_name: String,
    pub birth_date: NaiveDate,
    pub income: Money,
    pub occupation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Registration {
    pub citizen: Citizen,
    /// `None` when the citizen's group has nothing allocated.
    pub payment: Option<Payment>,
}

/// Everything a citizen-facing status check shows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CitizenStatus {
    pub citizen: Citizen,
    pub target_group: String,
    pub latest_payment: Option<Payment>,
    pub last_distribution_date: Option<DateTime<Utc>>,
}

/// Validated citizen fields ready for insert or update.
pub(crate) struct CitizenFields<'a> {
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub birth_date: NaiveDate,
    pub age: i64,
    pub income: Money,
    pub occupation: &'a str,
    pub target_group_id: GroupId,
}

pub struct CitizenRegistry<'a> {
    store: &'a LedgerStore,
    clock: &'a dyn Clock,
    config: &'a ClassificationConfig,
}

impl<'a> CitizenRegistry<'a> {
    pub fn new(
        store: &'a LedgerStore,
        clock: &'a dyn Clock,
        config: &'a ClassificationConfig,
    ) -> Self {
        Self { store, clock, config }
    }

    pub fn register(&self, new: &NewCitizen) -> LedgerResult<Registration> {
        require_text("national_id", &new.national_id)?;
        require_text("first_name", &new.first_name)?;
        require_text("last_name", &new.last_name)?;
        require_text("occupation", &new.occupation)?;

        let now = self.clock.now();
        let age = clock::age_on(new.birth_date, self.clock.today());
        let group = classifier::classify_by_threshold(self.config, age, new.income, &new.occupation)?;

        self.store.write_tx("register_citizen", |s| {
            let national_id = new.national_id.trim();
            if s.find_citizen_by_national_id(national_id)?.is_some() {
                return Err(LedgerError::validation(format!(
                    "national_id {national_id} is already registered"
                )));
            }
            let fields = CitizenFields {
                first_name: new.first_name.trim(),
                last_name: new.last_name.trim(),
                birth_date: new.birth_date,
                age,
                income: new.income,
                occupation: new.occupation.trim(),
                target_group_id: group,
            };
            let citizen_id = s.insert_citizen(national_id, &fields, now)?;
            s.append_event(
                &LedgerEvent::CitizenRegistered {
                    citizen_id,
                    target_group_id: group,
                },
                now,
            )?;
            let payment = DisbursementEngine::new(s, self.clock).create_payment(citizen_id, group)?;
            log::info!(
                "registry: citizen {citizen_id} registered in group {group}{}",
                if payment.is_some() { " with payment" } else { "" }
            );
            Ok(Registration {
                citizen: require(s, citizen_id)?,
                payment,
            })
        })
    }

    pub fn update(&self, citizen_id: EntityId, update: &CitizenUpdate) -> LedgerResult<Citizen> {
        require_text("first_name", &update.first_name)?;
        require_text("last_name", &update.last_name)?;
        require_text("occupation", &update.occupation)?;

        let now = self.clock.now();
        let age = clock::age_on(update.birth_date, self.clock.today());

        self.store.write_tx("update_citizen", |s| {
            let before = require(s, citizen_id)?;
            let bands = s.target_groups()?;
            let group = classifier::classify_by_band_table(
                self.config,
                &bands,
                age,
                update.income,
                &update.occupation,
            )?;
            let fields = CitizenFields {
                first_name: update.first_name.trim(),
                last_name: update.last_name.trim(),
                birth_date: update.birth_date,
                age,
                income: update.income,
                occupation: update.occupation.trim(),
                target_group_id: group,
            };
            s.update_citizen(citizen_id, &fields)?;
            s.append_event(
                &LedgerEvent::CitizenUpdated {
                    citizen_id,
                    target_group_id: group,
                },
                now,
            )?;
            if before.target_group_id != group {
                log::info!(
                    "registry: citizen {citizen_id} moved from group {} to {group}",
                    before.target_group_id
                );
            }
            require(s, citizen_id)
        })
    }

    /// Deletes the citizen and any pending payments. A citizen who has
    /// already been paid stays on record.
    pub fn delete(&self, citizen_id: EntityId) -> LedgerResult<Citizen> {
        let now = self.clock.now();
        self.store.write_tx("delete_citizen", |s| {
            let citizen = require(s, citizen_id)?;
            if s.completed_payment_count_for_citizen(citizen_id)? > 0 {
                return Err(LedgerError::validation(format!(
                    "citizen {citizen_id} has completed payments and cannot be deleted"
                )));
            }
            let dropped = s.delete_pending_payments_for_citizen(citizen_id)?;
            s.delete_citizen(citizen_id)?;
            s.append_event(&LedgerEvent::CitizenDeleted { citizen_id }, now)?;
            log::info!("registry: citizen {citizen_id} deleted ({dropped} pending payment(s) dropped)");
            Ok(citizen)
        })
    }

    pub fn get(&self, citizen_id: EntityId) -> LedgerResult<Citizen> {
        require(self.store, citizen_id)
    }

    pub fn list(&self) -> LedgerResult<Vec<Citizen>> {
        self.store.list_citizens()
    }

    pub fn lookup_by_national_id(&self, national_id: &str) -> LedgerResult<CitizenStatus> {
        let citizen = self
            .store
            .find_citizen_by_national_id(national_id.trim())?
            .ok_or_else(|| LedgerError::not_found("citizen", national_id))?;
        let target_group = self
            .store
            .target_group_name(citizen.target_group_id)?
            .unwrap_or_default();
        let latest_payment = self.store.latest_payment_for_citizen(citizen.id)?;
        let last_distribution_date = self.store.last_distribution_date(citizen.target_group_id)?;
        Ok(CitizenStatus {
            citizen,
            target_group,
            latest_payment,
            last_distribution_date,
        })
    }
}

fn require_text(field: &str, value: &str) -> LedgerResult<()> {
    if value.trim().is_empty() {
        return Err(LedgerError::validation(format!("{field} is required")));
    }
    Ok(())
}

fn require(store: &LedgerStore, citizen_id: EntityId) -> LedgerResult<Citizen> {
    store
        .get_citizen(citizen_id)?
        .ok_or_else(|| LedgerError::not_found("citizen", citizen_id))
}
