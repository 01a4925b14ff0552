// SPDX-FileCopyrightText: 2026 Turnkey Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed query modules, one per entity.

pub mod associations;
pub mod bookings;
pub mod commissions;
pub mod employees;
pub mod leads;
pub mod otp;
pub mod projects;
pub mod units;
