// SPDX-FileCopyrightText: 2026 Turnkey Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Daily auto-assignment of unassigned associations to closing staff.
//!
//! Runs as a periodic batch (external cron calls the CLI). The plan is
//! computed up front; applying it claims each row conditionally, so two
//! schedulers running at once never double-assign the same association.

use tracing::{info, warn};
use turnkey_config::model::AssignmentConfig;
use turnkey_core::TurnkeyError;
use turnkey_storage::Database;
use turnkey_storage::queries::associations::{self, PlannedAssignment};
use turnkey_storage::queries::employees;

/// Statuses eligible for auto-assignment: the pre-visit pipeline.
const ASSIGNABLE_STATUSES: &[&str] = &["new", "contacted", "visit_scheduled"];

/// Identity stamped into `assigned_by` for batch assignments.
const BATCH_ACTOR: &str = "auto-assign";

/// What one batch run did.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct AssignmentReport {
    /// Rows assigned by this run.
    pub assigned: usize,
    /// Rows claimed by a concurrent run between planning and applying.
    pub skipped: usize,
    /// Candidates left over once every employee hit the daily quota.
    pub over_quota: usize,
}

/// Run one auto-assignment pass for a project.
///
/// Candidates are unassigned pre-visit associations, excluding pretagged
/// rows still pending verification (those stay visible to the whole
/// project team). Staff receive rows round-robin up to the per-employee
/// daily quota.
pub async fn run_for_project(
    db: &Database,
    config: &AssignmentConfig,
    project_id: &str,
) -> Result<AssignmentReport, TurnkeyError> {
    let today = chrono::Utc::now().format("%Y-%m-%d").to_string();

    let mut staff = Vec::new();
    for employee in employees::list_for_project(db, project_id).await? {
        let role = employees::role_of(&employee)?;
        if !role.is_closing() {
            continue;
        }
        let used = associations::count_assigned_on(db, project_id, &employee.id, &today).await?;
        let remaining = (config.daily_quota as i64 - used).max(0) as usize;
        staff.push((employee, remaining));
    }
    if staff.is_empty() {
        warn!(project_id, "no closing staff; nothing assigned");
        return Ok(AssignmentReport::default());
    }

    let candidates = associations::list_unassigned(db, project_id, ASSIGNABLE_STATUSES)
        .await?
        .into_iter()
        .filter(|a| !(a.is_pretagged && a.pretag_status.as_deref() == Some("pending_verification")))
        .collect::<Vec<_>>();

    let mut plan = Vec::new();
    let mut over_quota = 0;
    let mut cursor = 0;
    let staff_len = staff.len();
    for candidate in &candidates {
        // Round-robin over staff with remaining quota.
        let mut placed = false;
        for _ in 0..staff_len {
            let (employee, remaining) = &mut staff[cursor];
            cursor = (cursor + 1) % staff_len;
            if *remaining > 0 {
                *remaining -= 1;
                plan.push(PlannedAssignment {
                    association_id: candidate.id.clone(),
                    employee_id: employee.id.clone(),
                    assigned_by: BATCH_ACTOR.to_string(),
                });
                placed = true;
                break;
            }
        }
        if !placed {
            over_quota += 1;
        }
    }

    let (assigned, skipped) = if plan.is_empty() {
        (0, 0)
    } else {
        associations::assign_batch(db, plan).await?
    };

    let report = AssignmentReport {
        assigned,
        skipped,
        over_quota,
    };
    info!(
        project_id,
        assigned = report.assigned,
        skipped = report.skipped,
        over_quota = report.over_quota,
        "auto-assignment run complete"
    );
    Ok(report)
}
