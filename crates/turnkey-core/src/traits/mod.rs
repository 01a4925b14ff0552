// SPDX-FileCopyrightText: 2026 Turnkey Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions for external collaborators.
//!
//! The conversion engine consumes these seams instead of concrete
//! integrations; adapters use `#[async_trait]` for dynamic dispatch.

pub mod channel;

pub use channel::NotificationChannel;
