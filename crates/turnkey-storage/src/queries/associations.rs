// SPDX-FileCopyrightText: 2026 Turnkey Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Association queries: one lead's engagement state with one project.
//!
//! Creation enforces the one-live-row-per-(lead, project) invariant inside
//! the insert transaction. Batch assignment uses per-row conditional
//! updates so a row claimed by a concurrent run is skipped, never
//! double-assigned.

use rusqlite::params;
use tracing::info;
use turnkey_core::types::now_iso;
use turnkey_core::{ConflictReason, TurnkeyError};

use crate::database::{Database, map_tr_err};
use crate::models::Association;

const ASSOCIATION_COLUMNS: &str =
    "id, lead_id, project_id, status, is_pretagged, pretag_status, phone_verified, \
     assigned_to, assigned_at, assigned_by, previous_visit_id, revisit_count, \
     queued_at, queued_by, channel_partner_id, created_by, created_by_role, \
     lost_reason, archived, created_at, updated_at";

fn row_to_association(row: &rusqlite::Row<'_>) -> Result<Association, rusqlite::Error> {
    Ok(Association {
        id: row.get(0)?,
        lead_id: row.get(1)?,
        project_id: row.get(2)?,
        status: row.get(3)?,
        is_pretagged: row.get(4)?,
        pretag_status: row.get(5)?,
        phone_verified: row.get(6)?,
        assigned_to: row.get(7)?,
        assigned_at: row.get(8)?,
        assigned_by: row.get(9)?,
        previous_visit_id: row.get(10)?,
        revisit_count: row.get(11)?,
        queued_at: row.get(12)?,
        queued_by: row.get(13)?,
        channel_partner_id: row.get(14)?,
        created_by: row.get(15)?,
        created_by_role: row.get(16)?,
        lost_reason: row.get(17)?,
        archived: row.get(18)?,
        created_at: row.get(19)?,
        updated_at: row.get(20)?,
    })
}

fn insert_row(tx: &rusqlite::Transaction<'_>, a: &Association) -> Result<(), rusqlite::Error> {
    tx.execute(
        "INSERT INTO associations (id, lead_id, project_id, status, is_pretagged, pretag_status,
                                   phone_verified, assigned_to, assigned_at, assigned_by,
                                   previous_visit_id, revisit_count, queued_at, queued_by,
                                   channel_partner_id, created_by, created_by_role, lost_reason,
                                   archived, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17,
                 ?18, ?19, ?20, ?21)",
        params![
            a.id,
            a.lead_id,
            a.project_id,
            a.status,
            a.is_pretagged,
            a.pretag_status,
            a.phone_verified,
            a.assigned_to,
            a.assigned_at,
            a.assigned_by,
            a.previous_visit_id,
            a.revisit_count,
            a.queued_at,
            a.queued_by,
            a.channel_partner_id,
            a.created_by,
            a.created_by_role,
            a.lost_reason,
            a.archived,
            a.created_at,
            a.updated_at,
        ],
    )?;
    Ok(())
}

/// Create a fresh association.
///
/// Fails with a conflict when a live (non-archived) association already
/// exists for the same (lead, project) pair.
pub async fn insert(db: &Database, association: &Association) -> Result<(), TurnkeyError> {
    let a = association.clone();
    let created = db
        .connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let tx = conn.transaction()?;
            let live: i64 = tx.query_row(
                "SELECT COUNT(*) FROM associations
                 WHERE lead_id = ?1 AND project_id = ?2 AND archived = 0",
                params![a.lead_id, a.project_id],
                |row| row.get(0),
            )?;
            if live > 0 {
                tx.rollback()?;
                return Ok(false);
            }
            insert_row(&tx, &a)?;
            tx.commit()?;
            Ok(true)
        })
        .await
        .map_err(map_tr_err)?;

    if created {
        Ok(())
    } else {
        Err(TurnkeyError::Conflict(ConflictReason::AssociationExists))
    }
}

/// Create a revisit: archive the previous association and insert the new
/// row pointing back at it, in one transaction.
///
/// The caller supplies the new row with `previous_visit_id` and
/// `revisit_count` already derived from the parent; this function verifies
/// the parent still exists and is live before committing.
pub async fn insert_revisit(db: &Database, association: &Association) -> Result<(), TurnkeyError> {
    let a = association.clone();
    let previous_id = a.previous_visit_id.clone().ok_or_else(|| {
        TurnkeyError::Validation("revisit requires previous_visit_id".to_string())
    })?;

    enum Outcome {
        Created,
        ParentMissing,
    }

    let now = now_iso();
    let outcome = db
        .connection()
        .call(move |conn| -> Result<Outcome, rusqlite::Error> {
            let tx = conn.transaction()?;
            let archived = tx.execute(
                "UPDATE associations SET archived = 1, updated_at = ?1
                 WHERE id = ?2 AND archived = 0",
                params![now, previous_id],
            )?;
            if archived == 0 {
                tx.rollback()?;
                return Ok(Outcome::ParentMissing);
            }
            insert_row(&tx, &a)?;
            tx.commit()?;
            Ok(Outcome::Created)
        })
        .await
        .map_err(map_tr_err)?;

    match outcome {
        Outcome::Created => Ok(()),
        Outcome::ParentMissing => Err(TurnkeyError::not_found(
            "association",
            association.previous_visit_id.clone().unwrap_or_default(),
        )),
    }
}

/// Get an association by id.
pub async fn get(db: &Database, id: &str) -> Result<Option<Association>, TurnkeyError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<Association>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ASSOCIATION_COLUMNS} FROM associations WHERE id = ?1"
            ))?;
            match stmt.query_row(params![id], row_to_association) {
                Ok(a) => Ok(Some(a)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// The live association for a (lead, project) pair.
pub async fn get_by_lead_project(
    db: &Database,
    lead_id: &str,
    project_id: &str,
) -> Result<Option<Association>, TurnkeyError> {
    let lead_id = lead_id.to_string();
    let project_id = project_id.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<Association>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ASSOCIATION_COLUMNS} FROM associations
                 WHERE lead_id = ?1 AND project_id = ?2 AND archived = 0"
            ))?;
            match stmt.query_row(params![lead_id, project_id], row_to_association) {
                Ok(a) => Ok(Some(a)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Overwrite the status (and optional lost reason) of an association.
///
/// Transition legality is the engine's concern; this only writes.
pub async fn update_status(
    db: &Database,
    id: &str,
    status: &str,
    lost_reason: Option<String>,
) -> Result<(), TurnkeyError> {
    let id = id.to_string();
    let status = status.to_string();
    let now = now_iso();
    let updated = {
        let id = id.clone();
        db.connection()
            .call(move |conn| -> Result<usize, rusqlite::Error> {
                conn.execute(
                    "UPDATE associations
                     SET status = ?1, lost_reason = COALESCE(?2, lost_reason), updated_at = ?3
                     WHERE id = ?4",
                    params![status, lost_reason, now, id],
                )
            })
            .await
            .map_err(map_tr_err)?
    };

    if updated == 0 {
        return Err(TurnkeyError::not_found("association", id));
    }
    Ok(())
}

/// How verification changes the association's assignment.
#[derive(Debug, Clone)]
pub enum AssignmentChange {
    /// Leave assignment untouched.
    Keep,
    /// Unassign and stamp `queued_at` so closing roles can claim it.
    QueueForClosing,
    /// Assign to the verifying employee.
    AssignTo(String),
}

/// Field updates applied to an association when its OTP verifies.
#[derive(Debug, Clone)]
pub struct VerificationUpdate {
    pub association_id: String,
    pub set_status: Option<String>,
    pub set_pretag_status: Option<String>,
    pub assignment: AssignmentChange,
}

/// Apply a [`VerificationUpdate`] inside an existing transaction.
///
/// Shared with the OTP queries so the record flip and the association
/// update commit together.
pub(crate) fn apply_verification_tx(
    tx: &rusqlite::Transaction<'_>,
    update: &VerificationUpdate,
) -> Result<(), rusqlite::Error> {
    let now = now_iso();
    tx.execute(
        "UPDATE associations
         SET phone_verified = 1,
             status = COALESCE(?1, status),
             pretag_status = COALESCE(?2, pretag_status),
             updated_at = ?3
         WHERE id = ?4",
        params![
            update.set_status,
            update.set_pretag_status,
            now,
            update.association_id,
        ],
    )?;

    match &update.assignment {
        AssignmentChange::Keep => {}
        AssignmentChange::QueueForClosing => {
            tx.execute(
                "UPDATE associations
                 SET assigned_to = NULL, assigned_at = NULL, assigned_by = NULL, queued_at = ?1
                 WHERE id = ?2",
                params![now, update.association_id],
            )?;
        }
        AssignmentChange::AssignTo(employee_id) => {
            tx.execute(
                "UPDATE associations
                 SET assigned_to = ?1, assigned_at = ?2, assigned_by = ?1
                 WHERE id = ?3",
                params![employee_id, now, update.association_id],
            )?;
        }
    }
    Ok(())
}

/// Claim a queued visit for a closing-role employee.
///
/// Conditional update: only a row still in `queued_visit` can be claimed,
/// so two racing claims resolve to exactly one winner. Returns whether the
/// claim succeeded; a missing row is a not-found error.
pub async fn claim_queued(
    db: &Database,
    association_id: &str,
    employee_id: &str,
) -> Result<bool, TurnkeyError> {
    let id = association_id.to_string();
    let employee = employee_id.to_string();
    let now = now_iso();

    let changed = db
        .connection()
        .call(move |conn| -> Result<usize, rusqlite::Error> {
            conn.execute(
                "UPDATE associations
                 SET status = 'visit_completed', assigned_to = ?2, assigned_at = ?3,
                     assigned_by = ?2, updated_at = ?3
                 WHERE id = ?1 AND status = 'queued_visit' AND archived = 0",
                params![id, employee, now],
            )
        })
        .await
        .map_err(map_tr_err)?;

    if changed == 1 {
        return Ok(true);
    }
    match get(db, association_id).await? {
        Some(_) => Ok(false),
        None => Err(TurnkeyError::not_found("association", association_id)),
    }
}

/// Unassigned, non-archived associations of a project in the given
/// statuses, oldest first. Candidates for the daily assignment batch.
pub async fn list_unassigned(
    db: &Database,
    project_id: &str,
    statuses: &[&str],
) -> Result<Vec<Association>, TurnkeyError> {
    let project_id = project_id.to_string();
    let status_list = statuses
        .iter()
        .map(|s| format!("'{s}'"))
        .collect::<Vec<_>>()
        .join(", ");
    db.connection()
        .call(move |conn| -> Result<Vec<Association>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ASSOCIATION_COLUMNS} FROM associations
                 WHERE project_id = ?1 AND archived = 0 AND assigned_to IS NULL
                   AND status IN ({status_list})
                 ORDER BY created_at"
            ))?;
            let rows = stmt.query_map(params![project_id], row_to_association)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Count of associations assigned to an employee within a project today.
pub async fn count_assigned_on(
    db: &Database,
    project_id: &str,
    employee_id: &str,
    date_prefix: &str,
) -> Result<i64, TurnkeyError> {
    let project_id = project_id.to_string();
    let employee_id = employee_id.to_string();
    let prefix = format!("{date_prefix}%");
    db.connection()
        .call(move |conn| -> Result<i64, rusqlite::Error> {
            conn.query_row(
                "SELECT COUNT(*) FROM associations
                 WHERE project_id = ?1 AND assigned_to = ?2 AND assigned_at LIKE ?3",
                params![project_id, employee_id, prefix],
                |row| row.get(0),
            )
        })
        .await
        .map_err(map_tr_err)
}

/// One planned assignment of the batch job.
#[derive(Debug, Clone)]
pub struct PlannedAssignment {
    pub association_id: String,
    pub employee_id: String,
    pub assigned_by: String,
}

/// Apply a batch assignment plan in one transaction.
///
/// Each row is claimed with a conditional update (`assigned_to IS NULL`);
/// rows claimed by a concurrent scheduler in the meantime are skipped
/// rather than aborting the batch. Returns (applied, skipped).
pub async fn assign_batch(
    db: &Database,
    plan: Vec<PlannedAssignment>,
) -> Result<(usize, usize), TurnkeyError> {
    let now = now_iso();
    let (applied, skipped) = db
        .connection()
        .call(move |conn| -> Result<(usize, usize), rusqlite::Error> {
            let tx = conn.transaction()?;
            let mut applied = 0;
            let mut skipped = 0;
            for item in &plan {
                let changed = tx.execute(
                    "UPDATE associations
                     SET assigned_to = ?1, assigned_at = ?2, assigned_by = ?3
                     WHERE id = ?4 AND assigned_to IS NULL AND archived = 0",
                    params![item.employee_id, now, item.assigned_by, item.association_id],
                )?;
                if changed == 1 {
                    applied += 1;
                } else {
                    skipped += 1;
                }
            }
            tx.commit()?;
            Ok((applied, skipped))
        })
        .await
        .map_err(map_tr_err)?;

    info!(applied, skipped, "assignment batch applied");
    Ok((applied, skipped))
}

#[cfg(test)]
mod tests {
    use turnkey_core::types::{new_id, now_iso};

    use super::*;
    use crate::database::Database;
    use crate::models::{Lead, Project};
    use crate::queries::projects;

    async fn seed(db: &Database) -> (String, String) {
        let project = Project {
            id: new_id(),
            name: "Metro Heights".into(),
            highrise_enabled: false,
            floor_threshold: 0,
            highrise_mode: "per_sqft".into(),
            per_sqft_increment: 0.0,
            fixed_price_increment: 0.0,
            archived: false,
            created_at: now_iso(),
        };
        projects::insert(db, &project).await.unwrap();

        let lead = Lead {
            id: new_id(),
            phone: "9876543210".into(),
            name: "Asha".into(),
            email: None,
            archived: false,
            created_at: now_iso(),
            updated_at: now_iso(),
        };
        db.connection()
            .call({
                let lead = lead.clone();
                move |conn| -> Result<(), rusqlite::Error> {
                    conn.execute(
                        "INSERT INTO leads (id, phone, name, email, archived, created_at, updated_at)
                         VALUES (?1, ?2, ?3, ?4, 0, ?5, ?6)",
                        params![lead.id, lead.phone, lead.name, lead.email, lead.created_at, lead.updated_at],
                    )?;
                    Ok(())
                }
            })
            .await
            .unwrap();

        (lead.id, project.id)
    }

    fn base_association(lead_id: &str, project_id: &str) -> Association {
        Association {
            id: new_id(),
            lead_id: lead_id.to_string(),
            project_id: project_id.to_string(),
            status: "new".into(),
            is_pretagged: false,
            pretag_status: None,
            phone_verified: false,
            assigned_to: None,
            assigned_at: None,
            assigned_by: None,
            previous_visit_id: None,
            revisit_count: 0,
            queued_at: None,
            queued_by: None,
            channel_partner_id: None,
            created_by: None,
            created_by_role: None,
            lost_reason: None,
            archived: false,
            created_at: now_iso(),
            updated_at: now_iso(),
        }
    }

    #[tokio::test]
    async fn second_live_association_for_pair_conflicts() {
        let db = Database::open_in_memory().await.unwrap();
        let (lead_id, project_id) = seed(&db).await;

        insert(&db, &base_association(&lead_id, &project_id))
            .await
            .unwrap();
        let err = insert(&db, &base_association(&lead_id, &project_id))
            .await
            .unwrap_err();
        assert_eq!(
            err.conflict_reason(),
            Some(ConflictReason::AssociationExists)
        );
    }

    #[tokio::test]
    async fn revisit_archives_parent_and_links() {
        let db = Database::open_in_memory().await.unwrap();
        let (lead_id, project_id) = seed(&db).await;

        let first = base_association(&lead_id, &project_id);
        insert(&db, &first).await.unwrap();

        let mut second = base_association(&lead_id, &project_id);
        second.previous_visit_id = Some(first.id.clone());
        second.revisit_count = 1;
        insert_revisit(&db, &second).await.unwrap();

        let parent = get(&db, &first.id).await.unwrap().unwrap();
        assert!(parent.archived);

        let child = get_by_lead_project(&db, &lead_id, &project_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(child.id, second.id);
        assert_eq!(child.previous_visit_id.as_deref(), Some(first.id.as_str()));
        assert_eq!(child.revisit_count, 1);
    }

    #[tokio::test]
    async fn revisit_of_missing_parent_fails_cleanly() {
        let db = Database::open_in_memory().await.unwrap();
        let (lead_id, project_id) = seed(&db).await;

        let mut orphan = base_association(&lead_id, &project_id);
        orphan.previous_visit_id = Some(new_id());
        orphan.revisit_count = 1;
        let err = insert_revisit(&db, &orphan).await.unwrap_err();
        assert!(matches!(err, TurnkeyError::NotFound { .. }));
    }

    #[tokio::test]
    async fn assign_batch_skips_already_claimed_rows() {
        let db = Database::open_in_memory().await.unwrap();
        let (lead_id, project_id) = seed(&db).await;

        let a = base_association(&lead_id, &project_id);
        insert(&db, &a).await.unwrap();

        let emp_a = new_id();
        let emp_b = new_id();
        db.connection()
            .call({
                let (emp_a, emp_b) = (emp_a.clone(), emp_b.clone());
                move |conn| -> Result<(), rusqlite::Error> {
                    for id in [&emp_a, &emp_b] {
                        conn.execute(
                            "INSERT INTO employees (id, name, role, archived, created_at)
                             VALUES (?1, 'x', 'closing_manager', 0, ?2)",
                            params![id, now_iso()],
                        )?;
                    }
                    Ok(())
                }
            })
            .await
            .unwrap();

        // First scheduler run claims the row.
        let (applied, skipped) = assign_batch(
            &db,
            vec![PlannedAssignment {
                association_id: a.id.clone(),
                employee_id: emp_a.clone(),
                assigned_by: "batch".into(),
            }],
        )
        .await
        .unwrap();
        assert_eq!((applied, skipped), (1, 0));

        // A concurrent run with a stale plan skips instead of double-assigning.
        let (applied, skipped) = assign_batch(
            &db,
            vec![PlannedAssignment {
                association_id: a.id.clone(),
                employee_id: emp_b.clone(),
                assigned_by: "batch".into(),
            }],
        )
        .await
        .unwrap();
        assert_eq!((applied, skipped), (0, 1));

        let row = get(&db, &a.id).await.unwrap().unwrap();
        assert_eq!(row.assigned_to.as_deref(), Some(emp_a.as_str()));
    }
}
