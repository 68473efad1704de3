//! Money arithmetic and boundary formatting.
//!
//! Amounts are exact decimals end to end. Rounding happens in exactly one
//! place (per-person pricing, to cents); everything else is stored at full
//! precision and only rendered with two decimals when serialized.

use crate::types::Money;
use rust_decimal::{Decimal, RoundingStrategy};

pub const CENTS: u32 = 2;

/// `allocated / max_recipients` rounded to cents, half away from zero.
/// `None` when there are no recipients, so nothing ever divides by zero.
pub fn per_person(allocated: Money, max_recipients: i64) -> Option<Money> {
    if max_recipients <= 0 {
        return None;
    }
    Some(round_cents(allocated / Decimal::from(max_recipients)))
}

/// `percentage / 100 * total`, unrounded.
pub fn share_of(total: Money, percentage: Decimal) -> Money {
    percentage / Decimal::ONE_HUNDRED * total
}

pub fn round_cents(amount: Money) -> Money {
    amount.round_dp_with_strategy(CENTS, RoundingStrategy::MidpointAwayFromZero)
}

/// Fixed two-decimal rendering used at every external boundary.
pub fn format_2dp(amount: Money) -> String {
    format!("{:.2}", round_cents(amount))
}

/// `#[serde(with = "money::serde_2dp")]`: writes `"50000.00"`, reads a
/// string or a JSON number.
pub mod serde_2dp {
    use super::format_2dp;
    use crate::types::Money;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(amount: &Money, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&format_2dp(*amount))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Money, D::Error> {
        <Money as Deserialize>::deserialize(d)
    }
}

/// Optional variant of [`serde_2dp`]; `None` serializes as `null`.
pub mod serde_2dp_opt {
    use super::format_2dp;
    use crate::types::Money;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(amount: &Option<Money>, s: S) -> Result<S::Ok, S::Error> {
        match amount {
            Some(a) => s.serialize_some(&format_2dp(*a)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Money>, D::Error> {
        Option::<Money>::deserialize(d)
    }
}
