// SPDX-FileCopyrightText: 2026 Turnkey Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The visit-to-booking conversion engine.
//!
//! Five components over the storage layer: the association state machine,
//! the OTP verifier, the unit inventory allocator, the pricing engine, and
//! the credit attribution engine, plus the daily auto-assignment batch.
//! Pricing and attribution are pure; everything stateful goes through the
//! `turnkey-storage` query modules and their transactions.

pub mod allocator;
pub mod assignment;
pub mod association;
pub mod attribution;
pub mod otp;
pub mod pricing;

pub use allocator::{BookingRequest, block_unit, convert, unblock_unit};
pub use assignment::{AssignmentReport, run_for_project};
pub use association::{VisitIntake, can_transition};
pub use attribution::{BookingContext, Credit, attribute};
pub use otp::{OtpIssue, OtpVerifier};
pub use pricing::{CostBreakdown, agreement_value, price_per_sqft, total_cost};
