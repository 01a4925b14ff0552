// SPDX-FileCopyrightText: 2026 Turnkey Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! OTP record queries.
//!
//! Only the keyed hash of a code is ever stored; expiry is evaluated at
//! read time by string comparison against the fixed-width UTC timestamp.

use rusqlite::params;
use turnkey_core::TurnkeyError;
use turnkey_core::types::now_iso;

use crate::database::{Database, map_tr_err};
use crate::models::OtpRecord;
use crate::queries::associations::{VerificationUpdate, apply_verification_tx};

const OTP_COLUMNS: &str = "id, association_id, code_hash, expires_at, attempts, max_attempts, \
                           verified, verified_at, fallback_link, created_at";

fn row_to_record(row: &rusqlite::Row<'_>) -> Result<OtpRecord, rusqlite::Error> {
    Ok(OtpRecord {
        id: row.get(0)?,
        association_id: row.get(1)?,
        code_hash: row.get(2)?,
        expires_at: row.get(3)?,
        attempts: row.get(4)?,
        max_attempts: row.get(5)?,
        verified: row.get(6)?,
        verified_at: row.get(7)?,
        fallback_link: row.get(8)?,
        created_at: row.get(9)?,
    })
}

/// Insert a freshly issued OTP record.
pub async fn insert(db: &Database, record: &OtpRecord) -> Result<(), TurnkeyError> {
    let r = record.clone();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "INSERT INTO otp_records (id, association_id, code_hash, expires_at, attempts,
                                          max_attempts, verified, verified_at, fallback_link,
                                          created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    r.id,
                    r.association_id,
                    r.code_hash,
                    r.expires_at,
                    r.attempts,
                    r.max_attempts,
                    r.verified,
                    r.verified_at,
                    r.fallback_link,
                    r.created_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// The single active (unexpired, unverified) record for an association.
///
/// Newest first: a stale older record that somehow survived is shadowed
/// rather than consulted.
pub async fn active_record(
    db: &Database,
    association_id: &str,
) -> Result<Option<OtpRecord>, TurnkeyError> {
    let association_id = association_id.to_string();
    let now = now_iso();
    db.connection()
        .call(move |conn| -> Result<Option<OtpRecord>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {OTP_COLUMNS} FROM otp_records
                 WHERE association_id = ?1 AND verified = 0 AND expires_at > ?2
                 ORDER BY created_at DESC LIMIT 1"
            ))?;
            match stmt.query_row(params![association_id, now], row_to_record) {
                Ok(r) => Ok(Some(r)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Get a record by id.
pub async fn get(db: &Database, id: &str) -> Result<Option<OtpRecord>, TurnkeyError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<OtpRecord>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {OTP_COLUMNS} FROM otp_records WHERE id = ?1"
            ))?;
            match stmt.query_row(params![id], row_to_record) {
                Ok(r) => Ok(Some(r)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Persist the manual fallback link on a record.
pub async fn set_fallback_link(db: &Database, id: &str, link: &str) -> Result<(), TurnkeyError> {
    let id = id.to_string();
    let link = link.to_string();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "UPDATE otp_records SET fallback_link = ?1 WHERE id = ?2",
                params![link, id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Increment the attempt counter and return the new value.
///
/// Called before the hash comparison so the counter moves even on a
/// successful attempt.
pub async fn increment_attempts(db: &Database, id: &str) -> Result<i64, TurnkeyError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| -> Result<i64, rusqlite::Error> {
            let tx = conn.transaction()?;
            tx.execute(
                "UPDATE otp_records SET attempts = attempts + 1 WHERE id = ?1",
                params![id],
            )?;
            let attempts: i64 = tx.query_row(
                "SELECT attempts FROM otp_records WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )?;
            tx.commit()?;
            Ok(attempts)
        })
        .await
        .map_err(map_tr_err)
}

/// Mark a record verified and apply the association-side verification
/// update in the same transaction.
///
/// `new_expiry` extends the record's life (the pretag "trusted phone"
/// case); `None` leaves the original expiry in place.
pub async fn finalize_verification(
    db: &Database,
    record_id: &str,
    new_expiry: Option<String>,
    update: VerificationUpdate,
) -> Result<(), TurnkeyError> {
    let record_id = record_id.to_string();
    let now = now_iso();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            let tx = conn.transaction()?;
            tx.execute(
                "UPDATE otp_records
                 SET verified = 1, verified_at = ?1, expires_at = COALESCE(?2, expires_at)
                 WHERE id = ?3",
                params![now, new_expiry, record_id],
            )?;
            apply_verification_tx(&tx, &update)?;
            tx.commit()?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}
