// SPDX-FileCopyrightText: 2026 Turnkey Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Closed role enumeration and the capability table.
//!
//! The identity provider classifies each acting user into exactly one
//! [`Role`]; everything downstream consumes [`Role::can`] instead of
//! branching on role names at call sites.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Staff roles recognized by the conversion engine.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Telecaller,
    SourcingManager,
    ClosingManager,
    SeniorClosingManager,
    FrontDesk,
    Admin,
}

/// Actions gated by role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Trigger and confirm OTP verification for an association.
    VerifyOtp,
    /// Record a front-desk visit intake into the queue.
    QueueVisit,
    /// Promote a front-desk queued visit to a completed visit.
    PromoteQueuedVisit,
    /// Place a timed hold on a unit.
    BlockUnit,
    /// Convert a verified association into a booking.
    ConvertBooking,
    /// Move a commission from pending to approved.
    ApproveCommission,
    /// Move a commission from approved to paid.
    PayCommission,
    /// Regress a terminal association status.
    AdminOverride,
    /// Run the batch auto-assignment of leads to staff.
    AssignLeads,
}

impl Role {
    /// Whether this role is a closing role (claims queued and verified leads).
    pub fn is_closing(self) -> bool {
        matches!(self, Role::ClosingManager | Role::SeniorClosingManager)
    }

    /// Capability table. Pure function of (role, capability).
    pub fn can(self, capability: Capability) -> bool {
        use Capability::*;
        match self {
            Role::Admin => true,
            Role::Telecaller => matches!(capability, VerifyOtp),
            Role::SourcingManager => matches!(capability, VerifyOtp),
            Role::FrontDesk => matches!(capability, QueueVisit),
            Role::ClosingManager => matches!(
                capability,
                VerifyOtp | QueueVisit | PromoteQueuedVisit | BlockUnit | ConvertBooking
            ),
            Role::SeniorClosingManager => matches!(
                capability,
                VerifyOtp
                    | QueueVisit
                    | PromoteQueuedVisit
                    | BlockUnit
                    | ConvertBooking
                    | ApproveCommission
                    | PayCommission
                    | AssignLeads
            ),
        }
    }
}
