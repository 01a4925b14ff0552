// SPDX-FileCopyrightText: 2026 Turnkey Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Floor-sensitive pricing.
//!
//! Every function here is a pure function of (rates, highrise rules,
//! floor): identical inputs always yield identical output, which is what
//! makes the multi-unit what-if comparison view safe to recompute.

use turnkey_core::{AreaRates, HighriseMode, HighriseRules};

/// Number of full floor ranges above the threshold floor.
///
/// Floors are partitioned into ranges of size `floor_threshold` above the
/// threshold itself: with threshold 4, floors 5-8 are range 1, floors 9-12
/// range 2, and so on. At or below the threshold there is no adjustment.
pub fn range_number(rules: &HighriseRules, floor: i64) -> i64 {
    if rules.floor_threshold <= 0 || floor <= rules.floor_threshold {
        return 0;
    }
    (floor - 1) / rules.floor_threshold
}

/// Effective price per sqft at a floor.
pub fn price_per_sqft(rates: &AreaRates, highrise: Option<&HighriseRules>, floor: i64) -> f64 {
    let base = rates.price_per_sqft;
    let Some(rules) = highrise else {
        return base;
    };
    let ranges = range_number(rules, floor) as f64;
    match rules.mode {
        HighriseMode::PerSqft => base + rules.per_sqft_increment * ranges,
        HighriseMode::FixedSqft => base + rules.fixed_price_increment * ranges,
        // The adjustment lands on the agreement value, not the rate.
        HighriseMode::FixedTotal => base,
    }
}

/// Agreement value at a floor: rate times buildup area, plus the flat
/// adjustment when the project uses fixed-total highrise pricing.
pub fn agreement_value(rates: &AreaRates, highrise: Option<&HighriseRules>, floor: i64) -> f64 {
    let value = price_per_sqft(rates, highrise, floor) * rates.buildup_area;
    match highrise {
        Some(rules) if rules.mode == HighriseMode::FixedTotal => {
            value + rules.fixed_price_increment * range_number(rules, floor) as f64
        }
        _ => value,
    }
}

/// Itemized total cost of a unit.
#[derive(Debug, Clone, PartialEq)]
pub struct CostBreakdown {
    pub agreement_value: f64,
    pub stamp_duty: f64,
    pub gst: f64,
    pub registration_charge: f64,
    pub legal_charge: f64,
    pub development_charge: f64,
    pub parking_charge: f64,
}

impl CostBreakdown {
    /// Sum of the agreement value and all charges.
    pub fn total(&self) -> f64 {
        self.agreement_value
            + self.stamp_duty
            + self.gst
            + self.registration_charge
            + self.legal_charge
            + self.development_charge
            + self.parking_charge
    }
}

/// Total cost of a unit at a floor.
///
/// Percentage charges (stamp duty, GST) are computed against the agreement
/// value, never against the running total. Parking is negotiable and only
/// included when requested.
pub fn total_cost(
    rates: &AreaRates,
    highrise: Option<&HighriseRules>,
    floor: i64,
    include_parking: bool,
) -> CostBreakdown {
    let agreement = agreement_value(rates, highrise, floor);
    let development = if rates.development_charge_per_sqft {
        rates.development_charge * rates.buildup_area
    } else {
        rates.development_charge
    };
    CostBreakdown {
        agreement_value: agreement,
        stamp_duty: agreement * rates.stamp_duty_pct / 100.0,
        gst: agreement * rates.gst_pct / 100.0,
        registration_charge: rates.registration_charge,
        legal_charge: rates.legal_charge,
        development_charge: development,
        parking_charge: if include_parking {
            rates.parking_charge
        } else {
            0.0
        },
    }
}
