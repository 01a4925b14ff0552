// SPDX-FileCopyrightText: 2026 Turnkey Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Turnkey sales CRM conversion engine.
//!
//! This crate provides the error taxonomy, domain enums, the role and
//! capability model, and the adapter traits consumed by the engine. It
//! holds no persistence or transport code.

pub mod error;
pub mod roles;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::{ConflictReason, TurnkeyError};
pub use roles::{Capability, Role};
pub use traits::NotificationChannel;
pub use types::{
    Acquisition, AreaRates, AssociationStatus, Beneficiary, CommissionState, Delivery,
    HealthStatus, HighriseMode, HighriseRules, Phone, PretagStatus, UnitState,
};
