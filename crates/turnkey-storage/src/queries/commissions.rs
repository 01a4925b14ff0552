// SPDX-FileCopyrightText: 2026 Turnkey Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Commission lifecycle queries.
//!
//! Transitions are one-way conditional updates: the `WHERE state = ...`
//! clause is the guard, so a wrong-state request changes nothing and is
//! reported as a conflict.

use rusqlite::params;
use tracing::info;
use turnkey_core::types::now_iso;
use turnkey_core::{ConflictReason, TurnkeyError};

use crate::database::{Database, map_tr_err};
use crate::models::Commission;

const COMMISSION_COLUMNS: &str = "id, booking_id, employee_id, beneficiary, state, approved_by, \
                                  approved_at, paid_by, paid_at, created_at";

fn row_to_commission(row: &rusqlite::Row<'_>) -> Result<Commission, rusqlite::Error> {
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
}

/// Get a commission by id.
pub async fn get(db: &Database, id: &str) -> Result<Option<Commission>, TurnkeyError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<Commission>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COMMISSION_COLUMNS} FROM commissions WHERE id = ?1"
            ))?;
            match stmt.query_row(params![id], row_to_commission) {
                Ok(c) => Ok(Some(c)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Commissions in a given state, oldest first.
pub async fn list_by_state(db: &Database, state: &str) -> Result<Vec<Commission>, TurnkeyError> {
    let state = state.to_string();
    db.connection()
        .call(move |conn| -> Result<Vec<Commission>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COMMISSION_COLUMNS} FROM commissions
                 WHERE state = ?1 ORDER BY created_at"
            ))?;
            let rows = stmt.query_map(params![state], row_to_commission)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Approve a pending commission. One-way; a non-pending row conflicts
/// with no side effects.
pub async fn approve(db: &Database, id: &str, actor_id: &str) -> Result<(), TurnkeyError> {
    transition(
        db,
        id,
        actor_id,
        "UPDATE commissions SET state = 'approved', approved_by = ?2, approved_at = ?3
         WHERE id = ?1 AND state = 'pending'",
        ConflictReason::CommissionNotPending,
        "commission approved",
    )
    .await
}

/// Mark an approved commission paid. One-way; a non-approved row conflicts
/// with no side effects.
pub async fn mark_paid(db: &Database, id: &str, actor_id: &str) -> Result<(), TurnkeyError> {
    transition(
        db,
        id,
        actor_id,
        "UPDATE commissions SET state = 'paid', paid_by = ?2, paid_at = ?3
         WHERE id = ?1 AND state = 'approved'",
        ConflictReason::CommissionNotApproved,
        "commission paid",
    )
    .await
}

async fn transition(
    db: &Database,
    id: &str,
    actor_id: &str,
    sql: &'static str,
    wrong_state: ConflictReason,
    log_line: &'static str,
) -> Result<(), TurnkeyError> {
    let id_owned = id.to_string();
    let actor = actor_id.to_string();
    let now = now_iso();

    let changed = db
        .connection()
        .call(move |conn| -> Result<usize, rusqlite::Error> {
            conn.execute(sql, params![id_owned, actor, now])
        })
        .await
        .map_err(map_tr_err)?;

    if changed == 1 {
        info!(commission_id = id, actor_id, "{}", log_line);
        return Ok(());
    }
    match get(db, id).await? {
        Some(_) => Err(TurnkeyError::Conflict(wrong_state)),
        None => Err(TurnkeyError::not_found("commission", id)),
    }
}
