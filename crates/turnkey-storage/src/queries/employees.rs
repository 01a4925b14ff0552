// SPDX-FileCopyrightText: 2026 Turnkey Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Employee and project-assignment projections of the identity provider.
//!
//! The engine only reads these tables; writes happen during sync from the
//! identity provider (out of scope here beyond simple inserts).

use std::str::FromStr;

use rusqlite::params;
use turnkey_core::{Role, TurnkeyError};

use crate::database::{Database, map_tr_err};
use crate::models::Employee;

const EMPLOYEE_COLUMNS: &str = "id, name, phone, role, archived, created_at";

fn row_to_employee(row: &rusqlite::Row<'_>) -> Result<Employee, rusqlite::Error> {
    Ok(Employee {
        id: row.get(0)?,
        name: row.get(1)?,
        phone: row.get(2)?,
        role: row.get(3)?,
        archived: row.get(4)?,
        created_at: row.get(5)?,
    })
}

/// Parse an employee's stored role string into the closed enum.
pub fn role_of(employee: &Employee) -> Result<Role, TurnkeyError> {
    Role::from_str(&employee.role).map_err(|_| {
        TurnkeyError::Internal(format!(
            "employee {} has unrecognized role `{}`",
            employee.id, employee.role
        ))
    })
}

/// Insert an employee record.
pub async fn insert(db: &Database, employee: &Employee) -> Result<(), TurnkeyError> {
    let employee = employee.clone();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "INSERT INTO employees (id, name, phone, role, archived, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    employee.id,
                    employee.name,
                    employee.phone,
                    employee.role,
                    employee.archived,
                    employee.created_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Get an employee by id.
pub async fn get(db: &Database, id: &str) -> Result<Option<Employee>, TurnkeyError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<Employee>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE id = ?1"
            ))?;
            match stmt.query_row(params![id], row_to_employee) {
                Ok(e) => Ok(Some(e)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Attach an employee to a project's serving staff.
pub async fn assign_to_project(
    db: &Database,
    project_id: &str,
    employee_id: &str,
) -> Result<(), TurnkeyError> {
    let project_id = project_id.to_string();
    let employee_id = employee_id.to_string();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "INSERT OR IGNORE INTO project_assignments (project_id, employee_id)
                 VALUES (?1, ?2)",
                params![project_id, employee_id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Active employees serving a project, ordered by id for stable round-robin.
pub async fn list_for_project(
    db: &Database,
    project_id: &str,
) -> Result<Vec<Employee>, TurnkeyError> {
    let project_id = project_id.to_string();
    db.connection()
        .call(move |conn| -> Result<Vec<Employee>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT e.{} FROM employees e
                 JOIN project_assignments pa ON pa.employee_id = e.id
                 WHERE pa.project_id = ?1 AND e.archived = 0
                 ORDER BY e.id",
                EMPLOYEE_COLUMNS.replace(", ", ", e.")
            ))?;
            let rows = stmt.query_map(params![project_id], row_to_employee)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// The sourcing manager assigned to a project, if any.
///
/// When several qualify, the lowest id wins, keeping attribution stable.
pub async fn sourcing_manager_for_project(
    db: &Database,
    project_id: &str,
) -> Result<Option<Employee>, TurnkeyError> {
    let project_id = project_id.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<Employee>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT e.{} FROM employees e
                 JOIN project_assignments pa ON pa.employee_id = e.id
                 WHERE pa.project_id = ?1 AND e.role = 'sourcing_manager' AND e.archived = 0
                 ORDER BY e.id LIMIT 1",
                EMPLOYEE_COLUMNS.replace(", ", ", e.")
            ))?;
            match stmt.query_row(params![project_id], row_to_employee) {
                Ok(e) => Ok(Some(e)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}
