//! Target group classification.
//!
//! Two strategies coexist and are deliberately NOT unified:
//!   - `classify_by_threshold`: hardcoded chain, used when a citizen registers.
//!   - `classify_by_band_table`: target-group band lookup, used when a citizen is updated.
//! Which one is authoritative is a product decision. Both are pure.

use crate::{
    config::ClassificationConfig,
    error::{LedgerError, LedgerResult},
    types::{GroupId, Money},
};
use serde::{Deserialize, Serialize};

/// Eligibility band reference row. Groups without a complete band
/// (farmer, other) never match the band table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetGroup {
    pub id: GroupId,
    pub name: String,
    pub age_min: Option<i64>,
    pub age_max: Option<i64>,
    pub income_range_min: Option<Money>,
    pub income_range_max: Option<Money>,
}

impl TargetGroup {
    /// Inclusive on both ends of both ranges.
    pub fn band_contains(&self, age: i64, income: Money) -> bool {
        match (
            self.age_min,
            self.age_max,
            self.income_range_min,
            self.income_range_max,
        ) {
            (Some(amin), Some(amax), Some(imin), Some(imax)) => {
                amin <= age && age <= amax && imin <= income && income <= imax
            }
            _ => false,
        }
    }
}

fn validate_inputs(config: &ClassificationConfig, age: i64, income: Money) -> LedgerResult<()> {
    if age < config.min_age || age > config.max_age {
        return Err(LedgerError::validation(format!(
            "age {age} outside {}..={}",
            config.min_age, config.max_age
        )));
    }
    if income < Money::ZERO {
        return Err(LedgerError::validation(format!(
            "income must be non-negative, got {income}"
        )));
    }
    Ok(())
}

fn is_farmer(config: &ClassificationConfig, occupation: &str) -> bool {
    config
        .farmer_keywords
        .iter()
        .any(|k| occupation.contains(k.as_str()))
}

/// Band-table strategy:
///   1. first group (in `bands` order) whose age and income bands contain the citizen
///   2. else farmer group if the occupation names a farmer
///   3. else the catch-all group
pub fn classify_by_band_table(
    config: &ClassificationConfig,
    bands: &[TargetGroup],
    age: i64,
    income: Money,
    occupation: &str,
) -> LedgerResult<GroupId> {
    validate_inputs(config, age, income)?;
    if let Some(group) = bands.iter().find(|g| g.band_contains(age, income)) {
        return Ok(group.id);
    }
    if is_farmer(config, occupation) {
        return Ok(config.farmer_group);
    }
    Ok(config.other_group)
}

/// Threshold strategy:
///   age >= elderly_age → elderly; income < ceiling → low income;
///   farmer occupation → farmer; otherwise other.
pub fn classify_by_threshold(
    config: &ClassificationConfig,
    age: i64,
    income: Money,
    occupation: &str,
) -> LedgerResult<GroupId> {
    validate_inputs(config, age, income)?;
    let group = if age >= config.elderly_age {
        config.elderly_group
    } else if income < config.low_income_ceiling {
        config.low_income_group
    } else if is_farmer(config, occupation) {
        config.farmer_group
    } else {
        config.other_group
    };
    Ok(group)
}
