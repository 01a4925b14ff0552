// SPDX-FileCopyrightText: 2026 Turnkey Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain enums and small value types shared across the workspace.

use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::TurnkeyError;

/// Current UTC time as an ISO 8601 string, the storage timestamp format.
///
/// The fixed-width UTC layout sorts lexicographically, which the storage
/// layer relies on for expiry comparisons in SQL.
pub fn now_iso() -> String {
    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// A fresh UUID v4 in the canonical lowercase-hyphenated form.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

static PHONE_JUNK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\s\-().]").unwrap());

/// A normalized 10-digit phone number.
///
/// Leads are deduplicated by this value: any formatting of the same number
/// (`+91 98765-43210`, `098765 43210`, `9876543210`) normalizes to the same
/// `Phone`, so lead lookup is idempotent across formats.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Phone(String);

impl Phone {
    /// Normalize a raw phone string to the bare 10-digit national number.
    ///
    /// Strips whitespace, dashes, and parentheses, then collapses a leading
    /// `+<country>` or trunk `0` prefix. Anything that does not leave
    /// exactly 10 digits is rejected.
    pub fn normalize(raw: &str) -> Result<Self, TurnkeyError> {
        let stripped = PHONE_JUNK.replace_all(raw.trim(), "");
        let (digits, had_plus) = match stripped.strip_prefix('+') {
            Some(rest) => (rest, true),
            None => (stripped.as_ref(), false),
        };

        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(TurnkeyError::Validation(format!(
                "phone number `{raw}` contains non-digit characters"
            )));
        }

        let national = if digits.len() == 10 {
            digits
        } else if had_plus && digits.len() > 10 && digits.len() <= 13 {
            // +<country><national>, country code 1-3 digits.
            &digits[digits.len() - 10..]
        } else if !had_plus && digits.len() == 11 && digits.starts_with('0') {
            // Trunk prefix.
            &digits[1..]
        } else {
            return Err(TurnkeyError::Validation(format!(
                "phone number `{raw}` does not normalize to 10 digits"
            )));
        };

        Ok(Phone(national.to_string()))
    }

    /// The normalized number as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Phone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle status of a lead's engagement with one project.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AssociationStatus {
    New,
    Contacted,
    VisitScheduled,
    QueuedVisit,
    VisitCompleted,
    Discussion,
    Hot,
    ReadyToBook,
    Booked,
    Lost,
}

impl AssociationStatus {
    /// Terminal statuses never regress except by admin override.
    pub fn is_terminal(self) -> bool {
        matches!(self, AssociationStatus::Booked | AssociationStatus::Lost)
    }
}

/// Verification sub-status for pretagged associations.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PretagStatus {
    PendingVerification,
    Verified,
    Rejected,
}

/// Inventory state of a physical unit.
///
/// `Blocked` is a soft, time-boxed hold: a blocked unit whose
/// `blocked_until` has passed reads as available without any sweep.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum UnitState {
    Available,
    Blocked,
    Booked,
    Sold,
    Excluded,
}

/// Commission lifecycle, independent of the booking's own mutability.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CommissionState {
    Pending,
    Approved,
    Paid,
}

/// Which staff function a commission row credits.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Beneficiary {
    ClosingManager,
    SourcingManager,
    Telecaller,
}

/// Floor-sensitive price adjustment modes.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum HighriseMode {
    /// Add `per_sqft_increment * range_number` to the price per sqft.
    PerSqft,
    /// Same shape, but the increment is a flat per-sqft amount.
    FixedSqft,
    /// Add `fixed_price_increment * range_number` to the agreement value.
    FixedTotal,
}

/// Highrise pricing rules for one project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HighriseRules {
    /// Base threshold floor, which is also the range size.
    pub floor_threshold: i64,
    pub mode: HighriseMode,
    pub per_sqft_increment: f64,
    pub fixed_price_increment: f64,
}

/// Configuration-level rates for one area/configuration variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaRates {
    pub buildup_area: f64,
    pub price_per_sqft: f64,
    pub stamp_duty_pct: f64,
    pub gst_pct: f64,
    pub registration_charge: f64,
    pub legal_charge: f64,
    pub development_charge: f64,
    /// When true, `development_charge` is per sqft rather than flat.
    pub development_charge_per_sqft: bool,
    pub parking_charge: f64,
}

/// Outcome of a notification send. Fallback is a success path: the caller
/// gets a manually-shareable deep link instead of an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Delivery {
    Sent { provider_id: Option<String> },
    Fallback { link: String },
}

/// Result of attempting exclusive acquisition of a contended row.
///
/// A row that cannot be acquired is reported busy and skipped, never
/// waited on, so batch operations degrade to "unavailable" instead of
/// stalling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acquisition {
    Acquired,
    Busy,
}

/// Adapter health, reported by `doctor`-style checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    Degraded(String),
    Unhealthy(String),
}

impl FromStr for Phone {
    type Err = TurnkeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Phone::normalize(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phone_normalization_collapses_formats() {
        let canonical = Phone::normalize("9876543210").unwrap();
        for raw in [
            "+91 98765 43210",
            "098765-43210",
            "(987) 654-3210",
            "  9876543210  ",
            "+919876543210",
        ] {
            assert_eq!(Phone::normalize(raw).unwrap(), canonical, "raw: {raw}");
        }
    }

    #[test]
    fn phone_normalization_is_idempotent() {
        let once = Phone::normalize("+91 98765 43210").unwrap();
        let twice = Phone::normalize(once.as_str()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn phone_rejects_garbage() {
        assert!(Phone::normalize("hello").is_err());
        assert!(Phone::normalize("12345").is_err());
        assert!(Phone::normalize("").is_err());
        assert!(Phone::normalize("123456789012345").is_err());
    }

    #[test]
    fn status_terminality() {
        assert!(AssociationStatus::Booked.is_terminal());
        assert!(AssociationStatus::Lost.is_terminal());
        assert!(!AssociationStatus::Hot.is_terminal());
        assert!(!AssociationStatus::QueuedVisit.is_terminal());
    }

    #[test]
    fn enums_round_trip_snake_case() {
        use std::str::FromStr;
        assert_eq!(AssociationStatus::VisitCompleted.to_string(), "visit_completed");
        assert_eq!(
            AssociationStatus::from_str("ready_to_book").unwrap(),
            AssociationStatus::ReadyToBook
        );
        assert_eq!(UnitState::from_str("available").unwrap(), UnitState::Available);
        assert_eq!(CommissionState::Pending.to_string(), "pending");
        assert_eq!(HighriseMode::from_str("fixed_total").unwrap(), HighriseMode::FixedTotal);
        assert_eq!(Beneficiary::SourcingManager.to_string(), "sourcing_manager");
    }

    #[test]
    fn now_iso_is_sortable_utc() {
        let a = now_iso();
        let b = now_iso();
        assert!(a <= b);
        assert!(a.ends_with('Z'));
        assert_eq!(a.len(), "2026-01-01T00:00:00.000Z".len());
    }

    mod properties {
        use proptest::prelude::*;

        use super::*;

        proptest! {
            #[test]
            fn normalization_idempotent_for_any_valid_input(digits in "[1-9][0-9]{9}") {
                let first = Phone::normalize(&digits).unwrap();
                let second = Phone::normalize(first.as_str()).unwrap();
                prop_assert_eq!(first, second);
            }

            #[test]
            fn formatting_junk_never_changes_identity(
                digits in "[1-9][0-9]{9}",
                prefix in prop::sample::select(vec!["", "+91", "0", "+1"]),
            ) {
                let spaced = format!(
                    "{prefix} {} {}-{}",
                    &digits[..3],
                    &digits[3..6],
                    &digits[6..]
                );
                let canonical = Phone::normalize(&digits).unwrap();
                prop_assert_eq!(Phone::normalize(&spaced).unwrap(), canonical);
            }
        }
    }
}
