// SPDX-FileCopyrightText: 2026 Turnkey Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the Turnkey sales CRM.
//!
//! Provides WAL-mode SQLite storage with embedded migrations, a
//! single-writer concurrency model via `tokio-rusqlite`, and typed query
//! modules per entity. The query modules are the repository surface: the
//! engine crate never composes SQL itself, and every multi-row invariant
//! (one live association per pair, exclusive unit claims, all-or-nothing
//! bookings) is enforced inside a transaction here.

pub mod database;
pub mod migrations;
pub mod models;
pub mod queries;

pub use database::Database;
pub use models::*;
