//! Deterministic fake citizens for demos and load tests.
//!
//! Same seed, same clock date, same citizens. Every citizen goes through
//! the normal registration path, so classification and payment queueing
//! behave exactly as they would for a real applicant.

use crate::{
    engine::LedgerEngine,
    error::LedgerResult,
    registry::{NewCitizen, Registration},
    rng::SeedRng,
    types::Money,
};
use chrono::{Days, Months, NaiveDate};
use std::collections::HashSet;

pub const FARMER_OCCUPATION: &str = "เกษตรกร";

const OCCUPATIONS: &[&str] = &[FARMER_OCCUPATION, "พนักงานบริษัท", "ข้าราชการ", "อาชีพอิสระ"];

const FIRST_NAMES: &[&str] = &[
    "Somchai", "Somsak", "Malee", "Suda", "Arthit", "Kanya", "Prasert", "Wichai",
    "Nittaya", "Boonmee", "Pornthip", "Chaiya", "Siriporn", "Anan", "Ratana", "Kittisak",
];

const LAST_NAMES: &[&str] = &[
    "Srisuk", "Chaiyaporn", "Wongsawat", "Rattanakorn", "Boonyarat", "Kaewmanee",
    "Thongdee", "Saetang", "Phromma", "Jaidee", "Sukjai", "Intharat",
];

const NATIONAL_ID_MIN: i64 = 5_000_000_000_000;
const NATIONAL_ID_MAX: i64 = 6_000_000_000_000;

/// Draws one applicant. Age is exact against `today`, in [18, 100).
pub fn draw_citizen(rng: &mut SeedRng, today: NaiveDate) -> NewCitizen {
    let national_id = rng.range(NATIONAL_ID_MIN, NATIONAL_ID_MAX).to_string();
    let first_name = rng.pick(FIRST_NAMES).to_string();
    let last_name = rng.pick(LAST_NAMES).to_string();

    let age = rng.range(18, 100) as u32;
    // Up to 364 days before the latest birthday keeps the age exact.
    let days_back = rng.range(0, 365) as u64;
    let birth_date = today
        .checked_sub_months(Months::new(age * 12))
        .and_then(|d| d.checked_sub_days(Days::new(days_back)))
        .unwrap_or(today);

    let income = Money::from(rng.range(5_000, 35_000));
    let occupation = rng.pick(OCCUPATIONS).to_string();

    NewCitizen {
        national_id,
        first_name,
        last_name,
        birth_date,
        income,
        occupation,
    }
}

/// Registers `count` generated citizens. Ids already on file are redrawn.
pub fn generate_citizens(
    engine: &LedgerEngine,
    seed: u64,
    count: usize,
) -> LedgerResult<Vec<Registration>> {
    let mut rng = SeedRng::new(seed);
    let today = engine.clock().today();
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(count);

    while out.len() < count {
        let citizen = draw_citizen(&mut rng, today);
        if !seen.insert(citizen.national_id.clone())
            || engine
                .store()
                .find_citizen_by_national_id(&citizen.national_id)?
                .is_some()
        {
            log::debug!("population: national_id {} taken, redrawing", citizen.national_id);
            continue;
        }
        out.push(engine.register_citizen(&citizen)?);
    }

    log::info!(
        "population: registered {} citizens (seed {seed}), {} with payments",
        out.len(),
        out.iter().filter(|r| r.payment.is_some()).count()
    );
    Ok(out)
}
