// SPDX-FileCopyrightText: 2026 Turnkey Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Turnkey conversion engine.

use thiserror::Error;

use crate::roles::{Capability, Role};

/// Why a state-changing operation conflicted with the current state.
///
/// Conflicts are always surfaced to the caller and never silently retried:
/// staff must see "unit already booked" and pick a different unit, not have
/// the system retry into a double booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum ConflictReason {
    /// The unit is booked, sold, excluded, or blocked by someone else.
    #[strum(to_string = "unit is not available")]
    UnitUnavailable,
    /// Unblock was requested on a unit that holds no active block.
    #[strum(to_string = "unit is not blocked")]
    UnitNotBlocked,
    /// Approval was requested on a commission that is not pending.
    #[strum(to_string = "commission is not pending")]
    CommissionNotPending,
    /// Payment was requested on a commission that is not approved.
    #[strum(to_string = "commission is not approved")]
    CommissionNotApproved,
    /// The OTP attempt counter reached the configured maximum.
    #[strum(to_string = "maximum verification attempts exceeded")]
    AttemptsExceeded,
    /// No unexpired, unverified OTP record exists for the association.
    #[strum(to_string = "no active verification code")]
    NoActiveOtp,
    /// The association's phone is already verified.
    #[strum(to_string = "association is already verified")]
    AlreadyVerified,
    /// A non-archived association already exists for this (lead, project).
    #[strum(to_string = "lead is already associated with this project")]
    AssociationExists,
    /// The association is in a terminal status (booked/lost).
    #[strum(to_string = "association is in a terminal status")]
    TerminalStatus,
    /// The requested status change is not a legal transition.
    #[strum(to_string = "invalid status transition")]
    InvalidTransition,
    /// Conversion was requested before the phone was verified.
    #[strum(to_string = "association phone is not verified")]
    NotVerified,
}

/// The primary error type used across all Turnkey crates.
#[derive(Debug, Error)]
pub enum TurnkeyError {
    /// Missing or invalid input. Surfaced immediately, no partial state change.
    #[error("validation error: {0}")]
    Validation(String),

    /// The acting role lacks the capability for the requested action.
    #[error("permission denied: {role} may not {action}")]
    PermissionDenied { role: Role, action: Capability },

    /// A referenced entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The operation conflicts with current state. Never retried silently.
    #[error("conflict: {0}")]
    Conflict(ConflictReason),

    /// Storage backend errors (database connection, query failure).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Configuration errors (invalid TOML, missing required fields).
    #[error("configuration error: {0}")]
    Config(String),

    /// Notification channel errors that are not recoverable by fallback.
    #[error("channel error: {message}")]
    Channel {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl TurnkeyError {
    /// Shorthand for a [`TurnkeyError::NotFound`].
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        TurnkeyError::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Returns the conflict reason if this is a [`TurnkeyError::Conflict`].
    pub fn conflict_reason(&self) -> Option<ConflictReason> {
        match self {
            TurnkeyError::Conflict(reason) => Some(*reason),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_messages_name_the_resource() {
        let err = TurnkeyError::Conflict(ConflictReason::UnitUnavailable);
        assert_eq!(err.to_string(), "conflict: unit is not available");

        let err = TurnkeyError::Conflict(ConflictReason::AttemptsExceeded);
        assert_eq!(
            err.to_string(),
            "conflict: maximum verification attempts exceeded"
        );
    }

    #[test]
    fn conflict_reason_accessor() {
        let err = TurnkeyError::Conflict(ConflictReason::NoActiveOtp);
        assert_eq!(err.conflict_reason(), Some(ConflictReason::NoActiveOtp));

        let err = TurnkeyError::Validation("missing phone".into());
        assert_eq!(err.conflict_reason(), None);
    }

    #[test]
    fn permission_denied_names_role_and_action() {
        let err = TurnkeyError::PermissionDenied {
            role: Role::Telecaller,
            action: Capability::ApproveCommission,
        };
        let msg = err.to_string();
        assert!(msg.contains("telecaller"), "got: {msg}");
        assert!(msg.contains("approve_commission"), "got: {msg}");
    }
}
