// SPDX-FileCopyrightText: 2026 Turnkey Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Project and area-type configuration queries.

use std::str::FromStr;

use rusqlite::params;
use turnkey_core::{AreaRates, HighriseMode, HighriseRules, TurnkeyError};

use crate::database::{Database, map_tr_err};
use crate::models::{AreaType, Project};

fn row_to_project(row: &rusqlite::Row<'_>) -> Result<Project, rusqlite::Error> {
    Ok(Project {
        id: row.get(0)?,
        name: row.get(1)?,
        highrise_enabled: row.get(2)?,
        floor_threshold: row.get(3)?,
        highrise_mode: row.get(4)?,
        per_sqft_increment: row.get(5)?,
        fixed_price_increment: row.get(6)?,
        archived: row.get(7)?,
        created_at: row.get(8)?,
    })
}

const PROJECT_COLUMNS: &str = "id, name, highrise_enabled, floor_threshold, highrise_mode, \
                               per_sqft_increment, fixed_price_increment, archived, created_at";

fn row_to_area_type(row: &rusqlite::Row<'_>) -> Result<AreaType, rusqlite::Error> {
    Ok(AreaType {
        id: row.get(0)?,
        project_id: row.get(1)?,
        name: row.get(2)?,
        carpet_area: row.get(3)?,
        buildup_area: row.get(4)?,
        price_per_sqft: row.get(5)?,
        stamp_duty_pct: row.get(6)?,
        gst_pct: row.get(7)?,
        registration_charge: row.get(8)?,
        legal_charge: row.get(9)?,
        development_charge: row.get(10)?,
        development_charge_per_sqft: row.get(11)?,
        parking_charge: row.get(12)?,
    })
}

const AREA_TYPE_COLUMNS: &str = "id, project_id, name, carpet_area, buildup_area, price_per_sqft, \
                                 stamp_duty_pct, gst_pct, registration_charge, legal_charge, \
                                 development_charge, development_charge_per_sqft, parking_charge";

/// The project's highrise rules, or `None` when highrise pricing is off.
pub fn highrise_rules(project: &Project) -> Result<Option<HighriseRules>, TurnkeyError> {
    if !project.highrise_enabled {
        return Ok(None);
    }
    let mode = HighriseMode::from_str(&project.highrise_mode).map_err(|_| {
        TurnkeyError::Internal(format!(
            "project {} has unrecognized highrise mode `{}`",
            project.id, project.highrise_mode
        ))
    })?;
    Ok(Some(HighriseRules {
        floor_threshold: project.floor_threshold,
        mode,
        per_sqft_increment: project.per_sqft_increment,
        fixed_price_increment: project.fixed_price_increment,
    }))
}

/// Project the configuration rates of an area type for the pricing engine.
pub fn area_rates(area: &AreaType) -> AreaRates {
    AreaRates {
        buildup_area: area.buildup_area,
        price_per_sqft: area.price_per_sqft,
        stamp_duty_pct: area.stamp_duty_pct,
        gst_pct: area.gst_pct,
        registration_charge: area.registration_charge,
        legal_charge: area.legal_charge,
        development_charge: area.development_charge,
        development_charge_per_sqft: area.development_charge_per_sqft,
        parking_charge: area.parking_charge,
    }
}

/// Insert a project.
pub async fn insert(db: &Database, project: &Project) -> Result<(), TurnkeyError> {
    let project = project.clone();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "INSERT INTO projects (id, name, highrise_enabled, floor_threshold, highrise_mode,
                                       per_sqft_increment, fixed_price_increment, archived, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    project.id,
                    project.name,
                    project.highrise_enabled,
                    project.floor_threshold,
                    project.highrise_mode,
                    project.per_sqft_increment,
                    project.fixed_price_increment,
                    project.archived,
                    project.created_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Get a project by id.
pub async fn get(db: &Database, id: &str) -> Result<Option<Project>, TurnkeyError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<Project>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {PROJECT_COLUMNS} FROM projects WHERE id = ?1"
            ))?;
            match stmt.query_row(params![id], row_to_project) {
                Ok(p) => Ok(Some(p)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Non-archived projects, for batch jobs that sweep every project.
pub async fn list_active(db: &Database) -> Result<Vec<Project>, TurnkeyError> {
    db.connection()
        .call(move |conn| -> Result<Vec<Project>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {PROJECT_COLUMNS} FROM projects WHERE archived = 0 ORDER BY name"
            ))?;
            let rows = stmt.query_map([], row_to_project)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Insert an area/configuration variant.
pub async fn insert_area_type(db: &Database, area: &AreaType) -> Result<(), TurnkeyError> {
    let area = area.clone();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "INSERT INTO area_types (id, project_id, name, carpet_area, buildup_area,
                                         price_per_sqft, stamp_duty_pct, gst_pct,
                                         registration_charge, legal_charge, development_charge,
                                         development_charge_per_sqft, parking_charge)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                params![
                    area.id,
                    area.project_id,
                    area.name,
                    area.carpet_area,
                    area.buildup_area,
                    area.price_per_sqft,
                    area.stamp_duty_pct,
                    area.gst_pct,
                    area.registration_charge,
                    area.legal_charge,
                    area.development_charge,
                    area.development_charge_per_sqft,
                    area.parking_charge,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Get an area type by id.
pub async fn get_area_type(db: &Database, id: &str) -> Result<Option<AreaType>, TurnkeyError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<AreaType>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {AREA_TYPE_COLUMNS} FROM area_types WHERE id = ?1"
            ))?;
            match stmt.query_row(params![id], row_to_area_type) {
                Ok(a) => Ok(Some(a)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}
