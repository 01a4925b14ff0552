// SPDX-FileCopyrightText: 2026 Turnkey Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Unit inventory queries and the exclusive-acquisition primitives.
//!
//! A block is a soft, time-boxed hold: expiry is a wall-clock comparison
//! at read time, never a background sweep. Acquisition is a conditional
//! update inside a transaction; a row that is not acquirable reports
//! [`Acquisition::Busy`] instead of waiting.

use std::str::FromStr;

use rusqlite::params;
use tracing::info;
use turnkey_core::types::now_iso;
use turnkey_core::{Acquisition, ConflictReason, TurnkeyError, UnitState};

use crate::database::{Database, map_tr_err};
use crate::models::Unit;

const UNIT_COLUMNS: &str = "id, project_id, area_type_id, tower, floor, unit_number, state, \
                            blocked_by, blocked_at, blocked_until, booking_id, created_at, \
                            updated_at";

fn row_to_unit(row: &rusqlite::Row<'_>) -> Result<Unit, rusqlite::Error> {
    Ok(Unit {
        id: row.get(0)?,
        project_id: row.get(1)?,
        area_type_id: row.get(2)?,
        tower: row.get(3)?,
        floor: row.get(4)?,
        unit_number: row.get(5)?,
        state: row.get(6)?,
        blocked_by: row.get(7)?,
        blocked_at: row.get(8)?,
        blocked_until: row.get(9)?,
        booking_id: row.get(10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

/// SQL predicate matching a row that reads as available right now:
/// genuinely available, or carrying a block that has already lapsed.
/// `?now` must bind the current timestamp.
const AVAILABLE_PREDICATE: &str =
    "(state = 'available' OR (state = 'blocked' AND blocked_until < ?2))";

/// The state a unit reads as at `now`, with lapsed blocks collapsed to
/// available.
pub fn effective_state(unit: &Unit, now: &str) -> Result<UnitState, TurnkeyError> {
    let state = UnitState::from_str(&unit.state).map_err(|_| {
        TurnkeyError::Internal(format!(
            "unit {} has unrecognized state `{}`",
            unit.id, unit.state
        ))
    })?;
    match (state, unit.blocked_until.as_deref()) {
        (UnitState::Blocked, Some(until)) if until < now => Ok(UnitState::Available),
        _ => Ok(state),
    }
}

/// Insert a unit.
pub async fn insert(db: &Database, unit: &Unit) -> Result<(), TurnkeyError> {
    let u = unit.clone();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "INSERT INTO units (id, project_id, area_type_id, tower, floor, unit_number,
                                    state, blocked_by, blocked_at, blocked_until, booking_id,
                                    created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                params![
                    u.id,
                    u.project_id,
                    u.area_type_id,
                    u.tower,
                    u.floor,
                    u.unit_number,
                    u.state,
                    u.blocked_by,
                    u.blocked_at,
                    u.blocked_until,
                    u.booking_id,
                    u.created_at,
                    u.updated_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Get a unit by id.
pub async fn get(db: &Database, id: &str) -> Result<Option<Unit>, TurnkeyError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<Unit>, rusqlite::Error> {
            let mut stmt =
                conn.prepare(&format!("SELECT {UNIT_COLUMNS} FROM units WHERE id = ?1"))?;
            match stmt.query_row(params![id], row_to_unit) {
                Ok(u) => Ok(Some(u)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Units of a project that read as available right now.
pub async fn list_available(db: &Database, project_id: &str) -> Result<Vec<Unit>, TurnkeyError> {
    let project_id = project_id.to_string();
    let now = now_iso();
    db.connection()
        .call(move |conn| -> Result<Vec<Unit>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {UNIT_COLUMNS} FROM units
                 WHERE project_id = ?1 AND {AVAILABLE_PREDICATE}
                 ORDER BY tower, floor, unit_number"
            ))?;
            let rows = stmt.query_map(params![project_id, now], row_to_unit)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Attempt to place a timed hold on a unit.
///
/// Acquisition semantics: the conditional update claims the row only if it
/// reads as available; anything else is `Busy`. A missing unit is
/// `NotFound`.
pub async fn try_block(
    db: &Database,
    unit_id: &str,
    actor: &str,
    blocked_until: &str,
) -> Result<Acquisition, TurnkeyError> {
    let unit_id_owned = unit_id.to_string();
    let actor = actor.to_string();
    let blocked_until = blocked_until.to_string();
    let now = now_iso();

    let changed = db
        .connection()
        .call(move |conn| -> Result<usize, rusqlite::Error> {
            conn.execute(
                &format!(
                    "UPDATE units
                     SET state = 'blocked', blocked_by = ?3, blocked_at = ?2,
                         blocked_until = ?4, updated_at = ?2
                     WHERE id = ?1 AND {AVAILABLE_PREDICATE}"
                ),
                params![unit_id_owned, now, actor, blocked_until],
            )
        })
        .await
        .map_err(map_tr_err)?;

    if changed == 1 {
        info!(unit_id, "unit blocked");
        return Ok(Acquisition::Acquired);
    }
    match get(db, unit_id).await? {
        Some(_) => Ok(Acquisition::Busy),
        None => Err(TurnkeyError::not_found("unit", unit_id)),
    }
}

/// Release a block, restoring the pristine available state.
///
/// `expected_blocker` restricts release to the blocking actor; `None`
/// allows an administrative release.
pub async fn unblock(
    db: &Database,
    unit_id: &str,
    expected_blocker: Option<&str>,
) -> Result<(), TurnkeyError> {
    let unit_id_owned = unit_id.to_string();
    let expected = expected_blocker.map(str::to_string);
    let now = now_iso();

    let changed = db
        .connection()
        .call(move |conn| -> Result<usize, rusqlite::Error> {
            conn.execute(
                "UPDATE units
                 SET state = 'available', blocked_by = NULL, blocked_at = NULL,
                     blocked_until = NULL, updated_at = ?2
                 WHERE id = ?1 AND state = 'blocked'
                   AND (?3 IS NULL OR blocked_by = ?3)",
                params![unit_id_owned, now, expected],
            )
        })
        .await
        .map_err(map_tr_err)?;

    if changed == 1 {
        info!(unit_id, "unit unblocked");
        return Ok(());
    }
    match get(db, unit_id).await? {
        Some(_) => Err(TurnkeyError::Conflict(ConflictReason::UnitNotBlocked)),
        None => Err(TurnkeyError::not_found("unit", unit_id)),
    }
}

/// Mark a booked unit as sold (registration complete).
pub async fn mark_sold(db: &Database, unit_id: &str) -> Result<(), TurnkeyError> {
    let unit_id_owned = unit_id.to_string();
    let now = now_iso();
    let changed = db
        .connection()
        .call(move |conn| -> Result<usize, rusqlite::Error> {
            conn.execute(
                "UPDATE units SET state = 'sold', updated_at = ?2
                 WHERE id = ?1 AND state = 'booked'",
                params![unit_id_owned, now],
            )
        })
        .await
        .map_err(map_tr_err)?;

    if changed == 1 {
        return Ok(());
    }
    match get(db, unit_id).await? {
        Some(_) => Err(TurnkeyError::Conflict(ConflictReason::UnitUnavailable)),
        None => Err(TurnkeyError::not_found("unit", unit_id)),
    }
}

/// Exclude a unit from sale (e.g. non-commercial ground floor).
pub async fn set_excluded(db: &Database, unit_id: &str) -> Result<(), TurnkeyError> {
    let unit_id_owned = unit_id.to_string();
    let now = now_iso();
    let changed = db
        .connection()
        .call(move |conn| -> Result<usize, rusqlite::Error> {
            conn.execute(
                &format!(
                    "UPDATE units SET state = 'excluded', blocked_by = NULL, blocked_at = NULL,
                         blocked_until = NULL, updated_at = ?2
                     WHERE id = ?1 AND {AVAILABLE_PREDICATE}"
                ),
                params![unit_id_owned, now],
            )
        })
        .await
        .map_err(map_tr_err)?;

    if changed == 1 {
        return Ok(());
    }
    match get(db, unit_id).await? {
        Some(_) => Err(TurnkeyError::Conflict(ConflictReason::UnitUnavailable)),
        None => Err(TurnkeyError::not_found("unit", unit_id)),
    }
}

#[cfg(test)]
mod tests {
    use turnkey_core::types::{new_id, now_iso};

    use super::*;
    use crate::database::Database;
    use crate::models::Project;
    use crate::queries::projects;

    async fn seed_unit(db: &Database) -> Unit {
        let project = Project {
            id: new_id(),
            name: "p".into(),
            highrise_enabled: false,
            floor_threshold: 0,
            highrise_mode: "per_sqft".into(),
            per_sqft_increment: 0.0,
            fixed_price_increment: 0.0,
            archived: false,
            created_at: now_iso(),
        };
        projects::insert(db, &project).await.unwrap();

        let unit = Unit {
            id: new_id(),
            project_id: project.id,
            area_type_id: None,
            tower: "A".into(),
            floor: 5,
            unit_number: "502".into(),
            state: "available".into(),
            blocked_by: None,
            blocked_at: None,
            blocked_until: None,
            booking_id: None,
            created_at: now_iso(),
            updated_at: now_iso(),
        };
        insert(db, &unit).await.unwrap();
        unit
    }

    fn minutes_from_now(minutes: i64) -> String {
        (chrono::Utc::now() + chrono::Duration::minutes(minutes))
            .format("%Y-%m-%dT%H:%M:%S%.3fZ")
            .to_string()
    }

    #[tokio::test]
    async fn block_then_block_again_is_busy() {
        let db = Database::open_in_memory().await.unwrap();
        let unit = seed_unit(&db).await;

        let first = try_block(&db, &unit.id, "emp-1", &minutes_from_now(120))
            .await
            .unwrap();
        assert_eq!(first, Acquisition::Acquired);

        let second = try_block(&db, &unit.id, "emp-2", &minutes_from_now(120))
            .await
            .unwrap();
        assert_eq!(second, Acquisition::Busy);
    }

    #[tokio::test]
    async fn lapsed_block_reads_available_and_is_reacquirable() {
        let db = Database::open_in_memory().await.unwrap();
        let unit = seed_unit(&db).await;

        try_block(&db, &unit.id, "emp-1", &minutes_from_now(-5))
            .await
            .unwrap();

        let row = get(&db, &unit.id).await.unwrap().unwrap();
        assert_eq!(
            effective_state(&row, &now_iso()).unwrap(),
            UnitState::Available
        );

        // Another actor can claim straight over the lapsed hold.
        let reblock = try_block(&db, &unit.id, "emp-2", &minutes_from_now(60))
            .await
            .unwrap();
        assert_eq!(reblock, Acquisition::Acquired);
        let row = get(&db, &unit.id).await.unwrap().unwrap();
        assert_eq!(row.blocked_by.as_deref(), Some("emp-2"));
    }

    #[tokio::test]
    async fn unblock_restores_pristine_state() {
        let db = Database::open_in_memory().await.unwrap();
        let unit = seed_unit(&db).await;

        try_block(&db, &unit.id, "emp-1", &minutes_from_now(60))
            .await
            .unwrap();
        unblock(&db, &unit.id, Some("emp-1")).await.unwrap();

        let row = get(&db, &unit.id).await.unwrap().unwrap();
        assert_eq!(row.state, "available");
        assert!(row.blocked_by.is_none());
        assert!(row.blocked_at.is_none());
        assert!(row.blocked_until.is_none());
    }

    #[tokio::test]
    async fn unblock_by_wrong_actor_conflicts() {
        let db = Database::open_in_memory().await.unwrap();
        let unit = seed_unit(&db).await;

        try_block(&db, &unit.id, "emp-1", &minutes_from_now(60))
            .await
            .unwrap();
        let err = unblock(&db, &unit.id, Some("emp-2")).await.unwrap_err();
        assert_eq!(err.conflict_reason(), Some(ConflictReason::UnitNotBlocked));

        // Administrative release works regardless of blocker.
        unblock(&db, &unit.id, None).await.unwrap();
    }

    #[tokio::test]
    async fn unblock_available_unit_conflicts() {
        let db = Database::open_in_memory().await.unwrap();
        let unit = seed_unit(&db).await;
        let err = unblock(&db, &unit.id, None).await.unwrap_err();
        assert_eq!(err.conflict_reason(), Some(ConflictReason::UnitNotBlocked));
    }

    #[tokio::test]
    async fn missing_unit_is_not_found() {
        let db = Database::open_in_memory().await.unwrap();
        let err = try_block(&db, "nope", "emp-1", &minutes_from_now(60))
            .await
            .unwrap_err();
        assert!(matches!(err, TurnkeyError::NotFound { .. }));
    }

    #[tokio::test]
    async fn excluded_units_never_list_as_available() {
        let db = Database::open_in_memory().await.unwrap();
        let unit = seed_unit(&db).await;

        set_excluded(&db, &unit.id).await.unwrap();
        let available = list_available(&db, &unit.project_id).await.unwrap();
        assert!(available.is_empty());

        let acq = try_block(&db, &unit.id, "emp-1", &minutes_from_now(60))
            .await
            .unwrap();
        assert_eq!(acq, Acquisition::Busy);
    }
}
