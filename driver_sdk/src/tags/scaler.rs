//! Raw-to-engineering value scaling.
//!
//! Steps run in a fixed order: raw-domain clamp, linear remap, rounding,
//! multiplier. Each step only runs when its configuration is present. A
//! reading is never rejected here; validation happens in [`crate::tags::range`].

use crate::tags::structures::{Scaling, Tag};
use rust_decimal::{Decimal, RoundingStrategy};
use tracing::warn;

/// Scale a raw reading according to the tag's configuration.
pub fn scale_value(tag: &Tag, raw: Decimal) -> Decimal {
    let mut value = raw;

    if let Some(scaling) = &tag.scaling {
        value = clamp_raw(scaling, value);
        if let Some(mapped) = remap(scaling, value) {
            value = mapped;
        }
    }

    if let Some(dp) = tag.fixed {
        value = value.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero);
    }

    if let Some(multiplier) = tag.multiplier {
        match value.checked_mul(multiplier) {
            Some(v) => value = v,
            None => warn!(tag = %tag.id, %value, %multiplier, "multiplier overflowed, keeping unmultiplied value"),
        }
    }

    value
}

fn clamp_raw(scaling: &Scaling, raw: Decimal) -> Decimal {
    let mut value = raw;
    if let Some(min_raw) = scaling.min_raw {
        if value < min_raw {
            value = min_raw;
        }
    }
    if let Some(max_raw) = scaling.max_raw {
        if value > max_raw {
            value = max_raw;
        }
    }
    value
}

/// Linear map of `raw` from `[min_raw, max_raw]` onto `[min_value, max_value]`.
/// `None` when a bound is missing, the raw span is empty, or the arithmetic overflows.
fn remap(scaling: &Scaling, raw: Decimal) -> Option<Decimal> {
    let (min_raw, max_raw) = scaling.min_raw.zip(scaling.max_raw)?;
    let (min_value, max_value) = scaling.min_value.zip(scaling.max_value)?;
    if max_raw == min_raw {
        return None;
    }

    let mapped = raw
        .checked_sub(min_raw)
        .and_then(|offset| offset.checked_mul(max_value.checked_sub(min_value)?))
        .and_then(|numerator| numerator.checked_div(max_raw.checked_sub(min_raw)?))
        .and_then(|v| v.checked_add(min_value));

    if mapped.is_none() {
        warn!(%raw, "linear scaling overflowed, keeping clamped raw value");
    }
    mapped
}
