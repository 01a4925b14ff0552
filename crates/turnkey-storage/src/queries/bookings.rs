// SPDX-FileCopyrightText: 2026 Turnkey Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Atomic booking creation.
//!
//! A booking, its per-unit payments, its commission rows, and the unit
//! state flips commit together or not at all. Each unit is claimed with a
//! conditional update; the first unclaimable unit rolls the whole request
//! back, so a multi-unit request never partially commits.

use rusqlite::params;
use tracing::{info, warn};
use turnkey_core::types::{new_id, now_iso};
use turnkey_core::{ConflictReason, TurnkeyError};

use crate::database::{Database, map_tr_err};
use crate::models::{Booking, Commission, Payment};

/// Per-unit slice of a booking's money.
#[derive(Debug, Clone)]
pub struct UnitAllocation {
    pub unit_id: String,
    pub amount: f64,
    pub token_amount: f64,
    pub down_payment: f64,
}

/// A commission row to create alongside the booking.
#[derive(Debug, Clone)]
pub struct NewCommission {
    pub employee_id: String,
    pub beneficiary: String,
}

/// Everything the booking transaction needs, precomputed by the engine.
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub booking: Booking,
    pub allocations: Vec<UnitAllocation>,
    pub commissions: Vec<NewCommission>,
    /// The converting actor; their own live block on a unit does not make
    /// it busy for them.
    pub actor_id: String,
}

enum TxOutcome {
    Created,
    UnitBusy(String),
}

/// Create a booking atomically.
///
/// Claims every requested unit, inserts the booking, one payment per unit,
/// and one pending commission per credited beneficiary, and marks the
/// association booked, all in one transaction. Any unclaimable unit aborts
/// the whole request with a unit-unavailable conflict.
pub async fn create(db: &Database, new: NewBooking) -> Result<Booking, TurnkeyError> {
    let booking = new.booking.clone();
    let now = now_iso();

    let outcome = db
        .connection()
        .call(move |conn| -> Result<TxOutcome, rusqlite::Error> {
            let tx = conn.transaction()?;

            for allocation in &new.allocations {
                let claimed = tx.execute(
                    "UPDATE units
                     SET state = 'booked', booking_id = ?2, blocked_by = NULL,
                         blocked_at = NULL, blocked_until = NULL, updated_at = ?3
                     WHERE id = ?1
                       AND (state = 'available'
                            OR (state = 'blocked'
                                AND (blocked_until < ?3 OR blocked_by = ?4)))",
                    params![allocation.unit_id, new.booking.id, now, new.actor_id],
                )?;
                if claimed != 1 {
                    tx.rollback()?;
                    return Ok(TxOutcome::UnitBusy(allocation.unit_id.clone()));
                }
            }

            let b = &new.booking;
            tx.execute(
                "INSERT INTO bookings (id, association_id, lead_id, project_id, total_price,
                                       token_amount, down_payment, channel_partner_id,
                                       closing_manager_id, sourcing_manager_id, telecaller_id,
                                       archived, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                params![
                    b.id,
                    b.association_id,
                    b.lead_id,
                    b.project_id,
                    b.total_price,
                    b.token_amount,
                    b.down_payment,
                    b.channel_partner_id,
                    b.closing_manager_id,
                    b.sourcing_manager_id,
                    b.telecaller_id,
                    b.archived,
                    b.created_at,
                ],
            )?;

            for allocation in &new.allocations {
                tx.execute(
                    "INSERT INTO payments (id, booking_id, unit_id, amount, token_amount,
                                           down_payment, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        new_id(),
                        b.id,
                        allocation.unit_id,
                        allocation.amount,
                        allocation.token_amount,
                        allocation.down_payment,
                        now,
                    ],
                )?;
            }

            for commission in &new.commissions {
                tx.execute(
                    "INSERT INTO commissions (id, booking_id, employee_id, beneficiary, state,
                                              created_at)
                     VALUES (?1, ?2, ?3, ?4, 'pending', ?5)",
                    params![
                        new_id(),
                        b.id,
                        commission.employee_id,
                        commission.beneficiary,
                        now,
                    ],
                )?;
            }

            tx.execute(
                "UPDATE associations SET status = 'booked', updated_at = ?2 WHERE id = ?1",
                params![b.association_id, now],
            )?;

            tx.commit()?;
            Ok(TxOutcome::Created)
        })
        .await
        .map_err(map_tr_err)?;

    match outcome {
        TxOutcome::Created => {
            info!(
                booking_id = %booking.id,
                project_id = %booking.project_id,
                total_price = booking.total_price,
                "booking created"
            );
            Ok(booking)
        }
        TxOutcome::UnitBusy(unit_id) => {
            warn!(%unit_id, "booking aborted: unit not acquirable");
            Err(TurnkeyError::Conflict(ConflictReason::UnitUnavailable))
        }
    }
}

const BOOKING_COLUMNS: &str = "id, association_id, lead_id, project_id, total_price, \
                               token_amount, down_payment, channel_partner_id, \
                               closing_manager_id, sourcing_manager_id, telecaller_id, \
                               archived, created_at";

fn row_to_booking(row: &rusqlite::Row<'_>) -> Result<Booking, rusqlite::Error> {
    Ok(Booking {
        id: row.get(0)?,
        association_id: row.get(1)?,
        lead_id: row.get(2)?,
        project_id: row.get(3)?,
        total_price: row.get(4)?,
        token_amount: row.get(5)?,
        down_payment: row.get(6)?,
        channel_partner_id: row.get(7)?,
        closing_manager_id: row.get(8)?,
        sourcing_manager_id: row.get(9)?,
        telecaller_id: row.get(10)?,
        archived: row.get(11)?,
        created_at: row.get(12)?,
    })
}

/// Get a booking by id.
pub async fn get(db: &Database, id: &str) -> Result<Option<Booking>, TurnkeyError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<Booking>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = ?1"
            ))?;
            match stmt.query_row(params![id], row_to_booking) {
                Ok(b) => Ok(Some(b)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Bookings created for a project, newest first.
pub async fn list_for_project(
    db: &Database,
    project_id: &str,
) -> Result<Vec<Booking>, TurnkeyError> {
    let project_id = project_id.to_string();
    db.connection()
        .call(move |conn| -> Result<Vec<Booking>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {BOOKING_COLUMNS} FROM bookings
                 WHERE project_id = ?1 AND archived = 0
                 ORDER BY created_at DESC"
            ))?;
            let rows = stmt.query_map(params![project_id], row_to_booking)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Payments of a booking, one per unit.
pub async fn payments_for(db: &Database, booking_id: &str) -> Result<Vec<Payment>, TurnkeyError> {
    let booking_id = booking_id.to_string();
    db.connection()
        .call(move |conn| -> Result<Vec<Payment>, rusqlite::Error> {
            let mut stmt = conn.prepare(
                "SELECT id, booking_id, unit_id, amount, token_amount, down_payment, created_at
                 FROM payments WHERE booking_id = ?1 ORDER BY created_at",
            )?;
            let rows = stmt.query_map(params![booking_id], |row| {
                Ok(Payment {
                    id: row.get(0)?,
                    booking_id: row.get(1)?,
                    unit_id: row.get(2)?,
                    amount: row.get(3)?,
                    token_amount: row.get(4)?,
                    down_payment: row.get(5)?,
                    created_at: row.get(6)?,
                })
            })?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Commissions of a booking.
pub async fn commissions_for(
    db: &Database,
    booking_id: &str,
) -> Result<Vec<Commission>, TurnkeyError> {
    let booking_id = booking_id.to_string();
    db.connection()
        .call(move |conn| -> Result<Vec<Commission>, rusqlite::Error> {
            let mut stmt = conn.prepare(
                "SELECT id, booking_id, employee_id, beneficiary, state, approved_by,
                        approved_at, paid_by, paid_at, created_at
                 FROM commissions WHERE booking_id = ?1 ORDER BY beneficiary",
            )?;
            let rows = stmt.query_map(params![booking_id], |row| {
                Ok(Commission {
                    id: row.get(0)?,
                    booking_id: row.get(1)?,
                    employee_id: row.get(2)?,
                    beneficiary: row.get(3)?,
                    state: row.get(4)?,
                    approved_by: row.get(5)?,
                    approved_at: row.get(6)?,
                    paid_by: row.get(7)?,
                    paid_at: row.get(8)?,
                    created_at: row.get(9)?,
                })
            })?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}
