// SPDX-FileCopyrightText: 2026 Turnkey Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lead lookup and upsert keyed by normalized phone number.

use rusqlite::params;
use turnkey_core::types::{new_id, now_iso};
use turnkey_core::{Phone, TurnkeyError};

use crate::database::{Database, map_tr_err};
use crate::models::Lead;

fn row_to_lead(row: &rusqlite::Row<'_>) -> Result<Lead, rusqlite::Error> {
    Ok(Lead {
        id: row.get(0)?,
        phone: row.get(1)?,
        name: row.get(2)?,
        email: row.get(3)?,
        archived: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

const LEAD_COLUMNS: &str = "id, phone, name, email, archived, created_at, updated_at";

/// Find-or-create a lead by normalized phone, refreshing contact details.
///
/// Leads are global across projects and never deleted; repeat contact with
/// the same number in any format resolves to the same row.
pub async fn upsert_by_phone(
    db: &Database,
    phone: &Phone,
    name: &str,
    email: Option<String>,
) -> Result<Lead, TurnkeyError> {
    let phone = phone.as_str().to_string();
    let name = name.to_string();
    let now = now_iso();
    let id = new_id();

    db.connection()
        .call(move |conn| -> Result<Lead, rusqlite::Error> {
            let tx = conn.transaction()?;

            let existing = {
                let mut stmt = tx.prepare(&format!(
                    "SELECT {LEAD_COLUMNS} FROM leads WHERE phone = ?1"
                ))?;
                let result = stmt.query_row(params![phone], row_to_lead);
                match result {
                    Ok(lead) => Some(lead),
                    Err(rusqlite::Error::QueryReturnedNoRows) => None,
                    Err(e) => return Err(e),
                }
            };

            let lead = match existing {
                Some(mut lead) => {
                    // Subsequent contact refreshes details but never blanks them.
                    if !name.is_empty() {
                        lead.name = name.clone();
                    }
                    if email.is_some() {
                        lead.email = email.clone();
                    }
                    lead.updated_at = now.clone();
                    tx.execute(
                        "UPDATE leads SET name = ?1, email = ?2, updated_at = ?3 WHERE id = ?4",
                        params![lead.name, lead.email, lead.updated_at, lead.id],
                    )?;
                    lead
                }
                None => {
                    let lead = Lead {
                        id: id.clone(),
                        phone: phone.clone(),
                        name: name.clone(),
                        email: email.clone(),
                        archived: false,
                        created_at: now.clone(),
                        updated_at: now.clone(),
                    };
                    tx.execute(
                        "INSERT INTO leads (id, phone, name, email, archived, created_at, updated_at)
                         VALUES (?1, ?2, ?3, ?4, 0, ?5, ?6)",
                        params![
                            lead.id,
                            lead.phone,
                            lead.name,
                            lead.email,
                            lead.created_at,
                            lead.updated_at,
                        ],
                    )?;
                    lead
                }
            };

            tx.commit()?;
            Ok(lead)
        })
        .await
        .map_err(map_tr_err)
}

/// Get a lead by id.
pub async fn get(db: &Database, id: &str) -> Result<Option<Lead>, TurnkeyError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<Lead>, rusqlite::Error> {
            let mut stmt =
                conn.prepare(&format!("SELECT {LEAD_COLUMNS} FROM leads WHERE id = ?1"))?;
            match stmt.query_row(params![id], row_to_lead) {
                Ok(lead) => Ok(Some(lead)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Get a lead by normalized phone.
pub async fn get_by_phone(db: &Database, phone: &Phone) -> Result<Option<Lead>, TurnkeyError> {
    let phone = phone.as_str().to_string();
    db.connection()
        .call(move |conn| -> Result<Option<Lead>, rusqlite::Error> {
            let mut stmt =
                conn.prepare(&format!("SELECT {LEAD_COLUMNS} FROM leads WHERE phone = ?1"))?;
            match stmt.query_row(params![phone], row_to_lead) {
                Ok(lead) => Ok(Some(lead)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Archive a lead. Leads are never deleted.
pub async fn archive(db: &Database, id: &str) -> Result<(), TurnkeyError> {
    let id = id.to_string();
    let now = now_iso();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "UPDATE leads SET archived = 1, updated_at = ?1 WHERE id = ?2",
                params![now, id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;

    #[tokio::test]
    async fn upsert_is_idempotent_across_formats() {
        let db = Database::open_in_memory().await.unwrap();

        let first = upsert_by_phone(
            &db,
            &Phone::normalize("+91 98765 43210").unwrap(),
            "Asha",
            None,
        )
        .await
        .unwrap();

        let second = upsert_by_phone(
            &db,
            &Phone::normalize("098765-43210").unwrap(),
            "Asha Rao",
            Some("asha@example.test".into()),
        )
        .await
        .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.name, "Asha Rao");
        assert_eq!(second.email.as_deref(), Some("asha@example.test"));

        let looked_up = get_by_phone(&db, &Phone::normalize("9876543210").unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(looked_up.id, first.id);
    }

    #[tokio::test]
    async fn upsert_never_blanks_existing_details() {
        let db = Database::open_in_memory().await.unwrap();
        let phone = Phone::normalize("9000000001").unwrap();

        upsert_by_phone(&db, &phone, "Ravi", Some("ravi@example.test".into()))
            .await
            .unwrap();
        let after = upsert_by_phone(&db, &phone, "", None).await.unwrap();

        assert_eq!(after.name, "Ravi");
        assert_eq!(after.email.as_deref(), Some("ravi@example.test"));
    }

    #[tokio::test]
    async fn archive_keeps_the_row() {
        let db = Database::open_in_memory().await.unwrap();
        let phone = Phone::normalize("9000000002").unwrap();
        let lead = upsert_by_phone(&db, &phone, "Meena", None).await.unwrap();

        archive(&db, &lead.id).await.unwrap();
        let archived = get(&db, &lead.id).await.unwrap().unwrap();
        assert!(archived.archived);
    }
}
