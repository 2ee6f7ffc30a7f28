//! Range validation of tag readings.
//!
//! A [`Range`] policy either carries simple bounds (`min_value` and
//! `max_value`) or an ordered list of [`RangeCondition`]s. A reading outside
//! the bounds, or matching none of the conditions, is invalid and resolved
//! through the policy's [`Active`] strategy.
//!
//! The validator is a pure function. The previous accepted value is passed in
//! by the caller, who owns and updates it.

use crate::tags::structures::{Active, Comparator, ConditionMode, Range, RangeCondition};
use rust_decimal::Decimal;

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// Outcome of validating one reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Validation {
    /// New current value. `None` keeps whatever was last accepted.
    pub accepted: Option<Decimal>,
    /// Invalid raw reading that should still be archived.
    pub side_value: Option<Decimal>,
    /// Whether anything should be written this cycle.
    pub persist: bool,
}

impl Validation {
    fn new(accepted: Option<Decimal>, side_value: Option<Decimal>) -> Self {
        Validation {
            accepted,
            side_value,
            persist: accepted.is_some() || side_value.is_some(),
        }
    }

    fn accept(raw: Decimal) -> Self {
        Self::new(Some(raw), None)
    }
}

/// Validate `raw` against `range`, given the previous accepted value.
pub fn validate(range: Option<&Range>, previous: Option<Decimal>, raw: Option<Decimal>) -> Validation {
    let Some(raw) = raw else {
        return Validation::default();
    };
    let Some(range) = range else {
        return Validation::accept(raw);
    };

    let accepted = match range.bounds() {
        Some((min, max)) => {
            if min <= raw && raw <= max {
                return Validation::accept(raw);
            }
            resolve_active(range, raw, previous, || Some(if raw < min { min } else { max }))
        }
        None => {
            if range.conditions.is_empty() || range.conditions.iter().any(|c| matches(c, raw, previous)) {
                return Validation::accept(raw);
            }
            resolve_active(range, raw, previous, || {
                range
                    .default_condition()
                    .and_then(|c| boundary_substitute(c, raw, previous))
            })
        }
    };

    let side_value = range.saves_invalid().then_some(raw);
    Validation::new(accepted, side_value)
}

/// Resolve the emitted value for an invalid reading.
fn resolve_active(
    range: &Range,
    raw: Decimal,
    previous: Option<Decimal>,
    boundary: impl FnOnce() -> Option<Decimal>,
) -> Option<Decimal> {
    match range.active {
        Active::Fixed(value) => Some(value.unwrap_or(raw)),
        Active::Boundary => boundary(),
        Active::Discard => None,
        Active::Latest => previous,
    }
}

/// The quantity a condition compares, or `None` when it cannot be computed.
fn quantity(mode: ConditionMode, raw: Decimal, previous: Option<Decimal>) -> Option<Decimal> {
    match mode {
        ConditionMode::Number => Some(raw),
        ConditionMode::Rate => {
            let previous = previous.filter(|p| !p.is_zero())?;
            raw.checked_sub(previous)?
                .checked_div(previous)?
                .checked_mul(HUNDRED)
        }
        ConditionMode::Delta => raw.checked_sub(previous?),
    }
}

fn matches(condition: &RangeCondition, raw: Decimal, previous: Option<Decimal>) -> bool {
    let Some(q) = quantity(condition.mode, raw, previous) else {
        return false;
    };
    match condition.condition {
        Comparator::Range => match (condition.min_value, condition.max_value) {
            (Some(min), Some(max)) => min <= q && q <= max,
            _ => false,
        },
        Comparator::Greater => condition.value.is_some_and(|v| q > v),
        Comparator::Less => condition.value.is_some_and(|v| q < v),
    }
}

/// Substitute for an invalid reading, taken from the default condition's
/// violated bound and mapped back into raw-reading space.
fn boundary_substitute(condition: &RangeCondition, raw: Decimal, previous: Option<Decimal>) -> Option<Decimal> {
    let q = quantity(condition.mode, raw, previous)?;
    let bound = match condition.condition {
        Comparator::Range => {
            let (min, max) = condition.min_value.zip(condition.max_value)?;
            if q < min {
                min
            } else {
                max
            }
        }
        Comparator::Greater | Comparator::Less => condition.value?,
    };

    match condition.mode {
        ConditionMode::Number => Some(bound),
        ConditionMode::Rate => bound
            .checked_div(HUNDRED)?
            .checked_add(Decimal::ONE)?
            .checked_mul(previous?),
        ConditionMode::Delta => bound.checked_add(previous?),
    }
}
