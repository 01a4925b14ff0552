// SPDX-FileCopyrightText: 2026 Turnkey Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The association state machine: one lead's journey within one project.
//!
//! Five entry points create associations (new visit, pretag, scheduled
//! visit, revisit, queued visit); afterwards the status only moves forward
//! along the pipeline, to `lost`, or via administrative override.

use std::str::FromStr;

use tracing::{info, warn};
use turnkey_core::types::{new_id, now_iso};
use turnkey_core::{
    AssociationStatus, Capability, ConflictReason, Phone, PretagStatus, Role, TurnkeyError,
};
use turnkey_storage::queries::associations::{
    self, AssignmentChange, VerificationUpdate,
};
use turnkey_storage::queries::{employees, leads};
use turnkey_storage::{Association, Database, Employee};

/// Lead contact details plus provenance, shared by the entry points.
#[derive(Debug, Clone)]
pub struct VisitIntake {
    pub phone: String,
    pub lead_name: String,
    pub email: Option<String>,
    pub project_id: String,
    pub created_by: Option<String>,
    pub created_by_role: Option<Role>,
    pub channel_partner_id: Option<String>,
}

/// Pipeline position used for the forward-only transition guard.
fn rank(status: AssociationStatus) -> Option<u8> {
    use AssociationStatus::*;
    match status {
        New => Some(0),
        Contacted => Some(1),
        VisitScheduled => Some(2),
        VisitCompleted => Some(3),
        Discussion => Some(4),
        Hot => Some(5),
        ReadyToBook => Some(6),
        Booked => Some(7),
        // Queueing and lost sit outside the forward pipeline.
        QueuedVisit | Lost => None,
    }
}

/// Whether `from -> to` is a legal non-administrative transition.
///
/// The pipeline only moves forward; `lost` is reachable from any
/// non-terminal state; a queued visit can only be promoted to a completed
/// visit. Terminal states never regress here.
pub fn can_transition(from: AssociationStatus, to: AssociationStatus) -> bool {
    use AssociationStatus::*;
    if from == to || from.is_terminal() {
        return false;
    }
    if to == Lost {
        return true;
    }
    match (from, to) {
        (QueuedVisit, VisitCompleted) => true,
        (QueuedVisit, _) | (_, QueuedVisit) => false,
        (from, to) => match (rank(from), rank(to)) {
            (Some(f), Some(t)) => t > f,
            _ => false,
        },
    }
}

fn base_row(lead_id: &str, intake: &VisitIntake, status: AssociationStatus) -> Association {
    let now = now_iso();
    Association {
        id: new_id(),
        lead_id: lead_id.to_string(),
        project_id: intake.project_id.clone(),
        status: status.to_string(),
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
        channel_partner_id: intake.channel_partner_id.clone(),
        created_by: intake.created_by.clone(),
        created_by_role: intake.created_by_role.map(|r| r.to_string()),
        lost_reason: None,
        archived: false,
        created_at: now.clone(),
        updated_at: now,
    }
}

async fn resolve_lead(db: &Database, intake: &VisitIntake) -> Result<String, TurnkeyError> {
    let phone = Phone::normalize(&intake.phone)?;
    let lead = leads::upsert_by_phone(db, &phone, &intake.lead_name, intake.email.clone()).await?;
    Ok(lead.id)
}

/// Record a walk-in visit. The association starts at `new` and is promoted
/// to `visit_completed` by the OTP verification step of the same flow.
pub async fn new_visit(db: &Database, intake: VisitIntake) -> Result<Association, TurnkeyError> {
    let lead_id = resolve_lead(db, &intake).await?;
    let mut row = base_row(&lead_id, &intake, AssociationStatus::New);
    // A closing-role creator keeps the walk-in on their own desk.
    if let (Some(creator), Some(role)) = (&intake.created_by, intake.created_by_role)
        && role.is_closing()
    {
        row.assigned_to = Some(creator.clone());
        row.assigned_at = Some(now_iso());
        row.assigned_by = Some(creator.clone());
    }
    associations::insert(db, &row).await?;
    info!(association_id = %row.id, project_id = %row.project_id, "new-visit association created");
    Ok(row)
}

/// Pretag a channel-partner-sourced lead ahead of any visit.
///
/// The association stays unassigned, so it is visible to every staff
/// member serving the project until the phone verifies.
pub async fn pretag(db: &Database, intake: VisitIntake) -> Result<Association, TurnkeyError> {
    if intake.channel_partner_id.is_none() {
        return Err(TurnkeyError::Validation(
            "pretagging requires a channel partner reference".to_string(),
        ));
    }
    let lead_id = resolve_lead(db, &intake).await?;
    let mut row = base_row(&lead_id, &intake, AssociationStatus::New);
    row.is_pretagged = true;
    row.pretag_status = Some(PretagStatus::PendingVerification.to_string());
    associations::insert(db, &row).await?;
    info!(association_id = %row.id, project_id = %row.project_id, "pretag association created");
    Ok(row)
}

/// Schedule a visit, auto-assigning the least-loaded closing staff member.
pub async fn schedule_visit(
    db: &Database,
    intake: VisitIntake,
) -> Result<Association, TurnkeyError> {
    let lead_id = resolve_lead(db, &intake).await?;
    let mut row = base_row(&lead_id, &intake, AssociationStatus::VisitScheduled);
    match pick_auto_assignee(db, &intake.project_id).await? {
        Some(assignee) => {
            row.assigned_to = Some(assignee.id.clone());
            row.assigned_at = Some(now_iso());
            row.assigned_by = Some(
                intake
                    .created_by
                    .clone()
                    .unwrap_or_else(|| "auto-assign".to_string()),
            );
        }
        None => {
            warn!(project_id = %intake.project_id, "no closing staff to auto-assign");
        }
    }
    associations::insert(db, &row).await?;
    info!(
        association_id = %row.id,
        assigned_to = row.assigned_to.as_deref().unwrap_or("-"),
        "visit scheduled"
    );
    Ok(row)
}

/// Record a second engagement on the same project.
///
/// The previous association is archived (preserving history) and a fresh
/// row is created pointing back at it with an incremented revisit counter.
/// Verification state and channel-partner provenance carry over.
pub async fn revisit(
    db: &Database,
    previous_association_id: &str,
    created_by: Option<String>,
    created_by_role: Option<Role>,
) -> Result<Association, TurnkeyError> {
    let previous = associations::get(db, previous_association_id)
        .await?
        .ok_or_else(|| TurnkeyError::not_found("association", previous_association_id))?;
    if previous.archived {
        return Err(TurnkeyError::Conflict(ConflictReason::TerminalStatus));
    }

    let now = now_iso();
    let row = Association {
        id: new_id(),
        lead_id: previous.lead_id.clone(),
        project_id: previous.project_id.clone(),
        status: AssociationStatus::VisitCompleted.to_string(),
        is_pretagged: previous.is_pretagged,
        pretag_status: previous.pretag_status.clone(),
        phone_verified: previous.phone_verified,
        assigned_to: previous.assigned_to.clone().or_else(|| created_by.clone()),
        assigned_at: Some(now.clone()),
        assigned_by: created_by.clone(),
        previous_visit_id: Some(previous.id.clone()),
        revisit_count: previous.revisit_count + 1,
        queued_at: None,
        queued_by: None,
        channel_partner_id: previous.channel_partner_id.clone(),
        created_by,
        created_by_role: created_by_role.map(|r| r.to_string()),
        lost_reason: None,
        archived: false,
        created_at: now.clone(),
        updated_at: now,
    };
    associations::insert_revisit(db, &row).await?;
    info!(
        association_id = %row.id,
        previous = %previous.id,
        revisit_count = row.revisit_count,
        "revisit recorded"
    );
    Ok(row)
}

/// Front-desk intake: park a walk-in in the queue for a closing role.
pub async fn queue_visit(
    db: &Database,
    intake: VisitIntake,
    actor: &Employee,
) -> Result<Association, TurnkeyError> {
    require(actor, Capability::QueueVisit)?;
    let lead_id = resolve_lead(db, &intake).await?;
    let mut row = base_row(&lead_id, &intake, AssociationStatus::QueuedVisit);
    row.queued_at = Some(now_iso());
    row.queued_by = Some(actor.id.clone());
    associations::insert(db, &row).await?;
    info!(association_id = %row.id, queued_by = %actor.id, "visit queued");
    Ok(row)
}

/// A closing role claims a queued visit, completing it onto their desk.
///
/// The claim is a conditional update in storage, so two racing closers
/// resolve to exactly one winner; the loser sees the transition conflict.
pub async fn promote_queued(
    db: &Database,
    association_id: &str,
    actor: &Employee,
) -> Result<Association, TurnkeyError> {
    require(actor, Capability::PromoteQueuedVisit)?;
    if !associations::claim_queued(db, association_id, &actor.id).await? {
        return Err(TurnkeyError::Conflict(ConflictReason::InvalidTransition));
    }
    info!(association_id, claimed_by = %actor.id, "queued visit promoted");
    associations::get(db, association_id)
        .await?
        .ok_or_else(|| TurnkeyError::not_found("association", association_id))
}

/// Move an association forward along the pipeline.
///
/// Illegal moves conflict; reaching `booked` is reserved for the
/// conversion transaction and regressing a terminal status for
/// [`admin_override_status`].
pub async fn update_status(
    db: &Database,
    association_id: &str,
    to: AssociationStatus,
) -> Result<(), TurnkeyError> {
    let association = associations::get(db, association_id)
        .await?
        .ok_or_else(|| TurnkeyError::not_found("association", association_id))?;
    let from = parse_status(&association)?;

    if to == AssociationStatus::Booked {
        return Err(TurnkeyError::Conflict(ConflictReason::InvalidTransition));
    }
    if from.is_terminal() {
        return Err(TurnkeyError::Conflict(ConflictReason::TerminalStatus));
    }
    if !can_transition(from, to) {
        return Err(TurnkeyError::Conflict(ConflictReason::InvalidTransition));
    }

    associations::update_status(db, association_id, &to.to_string(), None).await
}

/// Mark an association lost with a reason.
pub async fn mark_lost(
    db: &Database,
    association_id: &str,
    reason: &str,
) -> Result<(), TurnkeyError> {
    let association = associations::get(db, association_id)
        .await?
        .ok_or_else(|| TurnkeyError::not_found("association", association_id))?;
    let from = parse_status(&association)?;
    if from.is_terminal() {
        return Err(TurnkeyError::Conflict(ConflictReason::TerminalStatus));
    }
    associations::update_status(
        db,
        association_id,
        &AssociationStatus::Lost.to_string(),
        Some(reason.to_string()),
    )
    .await?;
    info!(association_id, reason, "association lost");
    Ok(())
}

/// Administrative status override, including terminal regression.
pub async fn admin_override_status(
    db: &Database,
    association_id: &str,
    to: AssociationStatus,
    actor: &Employee,
) -> Result<(), TurnkeyError> {
    require(actor, Capability::AdminOverride)?;
    associations::update_status(db, association_id, &to.to_string(), None).await?;
    warn!(association_id, to = %to, admin = %actor.id, "administrative status override");
    Ok(())
}

/// The association-side consequences of a successful OTP verification.
///
/// Pretagged rows verify in place (scoped to this project) and only flip
/// their pretag sub-status; other rows jump to `visit_completed` unless
/// terminal. The verifier's role decides the assignment change: a
/// telecaller releases the row to the closing queue, a closing role keeps
/// it.
pub fn verification_update(
    association: &Association,
    verifier_id: &str,
    verifier_role: Role,
) -> Result<VerificationUpdate, TurnkeyError> {
    let status = parse_status(association)?;

    let set_status = if !association.is_pretagged && !status.is_terminal() {
        Some(AssociationStatus::VisitCompleted.to_string())
    } else {
        None
    };
    let set_pretag_status = if association.is_pretagged {
        Some(PretagStatus::Verified.to_string())
    } else {
        None
    };
    let assignment = if verifier_role == Role::Telecaller {
        AssignmentChange::QueueForClosing
    } else if verifier_role.is_closing() {
        AssignmentChange::AssignTo(verifier_id.to_string())
    } else {
        AssignmentChange::Keep
    };

    Ok(VerificationUpdate {
        association_id: association.id.clone(),
        set_status,
        set_pretag_status,
        assignment,
    })
}

/// Least-loaded (by today's assignments) closing staff member of a project.
pub async fn pick_auto_assignee(
    db: &Database,
    project_id: &str,
) -> Result<Option<Employee>, TurnkeyError> {
    let today = chrono::Utc::now().format("%Y-%m-%d").to_string();
    let mut best: Option<(i64, Employee)> = None;
    for employee in employees::list_for_project(db, project_id).await? {
        let role = employees::role_of(&employee)?;
        if !role.is_closing() {
            continue;
        }
        let load =
            associations::count_assigned_on(db, project_id, &employee.id, &today).await?;
        match &best {
            Some((current, _)) if *current <= load => {}
            _ => best = Some((load, employee)),
        }
    }
    Ok(best.map(|(_, e)| e))
}

fn parse_status(association: &Association) -> Result<AssociationStatus, TurnkeyError> {
    AssociationStatus::from_str(&association.status).map_err(|_| {
        TurnkeyError::Internal(format!(
            "association {} has unrecognized status `{}`",
            association.id, association.status
        ))
    })
}

fn require(actor: &Employee, capability: Capability) -> Result<Role, TurnkeyError> {
    let role = employees::role_of(actor)?;
    if !role.can(capability) {
        return Err(TurnkeyError::PermissionDenied {
            role,
            action: capability,
        });
    }
    Ok(role)
}

#[cfg(test)]
mod tests {
    use turnkey_core::types::now_iso;
    use turnkey_storage::queries::{employees as employee_queries, projects};
    use turnkey_storage::{Employee, Project};

    use super::*;

    async fn seed_project(db: &Database) -> String {
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
        project.id
    }

    async fn seed_employee(db: &Database, role: &str) -> Employee {
        let employee = Employee {
            id: new_id(),
            name: format!("{role} person"),
            phone: None,
            role: role.to_string(),
            archived: false,
            created_at: now_iso(),
        };
        employee_queries::insert(db, &employee).await.unwrap();
        employee
    }

    fn intake(project_id: &str, phone: &str) -> VisitIntake {
        VisitIntake {
            phone: phone.to_string(),
            lead_name: "Asha".into(),
            email: None,
            project_id: project_id.to_string(),
            created_by: None,
            created_by_role: None,
            channel_partner_id: None,
        }
    }

    #[test]
    fn transitions_move_forward_only() {
        use AssociationStatus::*;
        assert!(can_transition(New, Contacted));
        assert!(can_transition(New, VisitCompleted));
        assert!(can_transition(Hot, ReadyToBook));
        assert!(!can_transition(Hot, Discussion));
        assert!(!can_transition(VisitCompleted, New));
        assert!(can_transition(QueuedVisit, VisitCompleted));
        assert!(!can_transition(QueuedVisit, Discussion));
        assert!(!can_transition(Discussion, QueuedVisit));
    }

    #[test]
    fn lost_is_reachable_from_any_non_terminal() {
        use AssociationStatus::*;
        for from in [New, Contacted, VisitScheduled, QueuedVisit, Discussion, Hot, ReadyToBook] {
            assert!(can_transition(from, Lost), "{from} -> lost");
        }
        assert!(!can_transition(Booked, Lost));
        assert!(!can_transition(Lost, Lost));
    }

    #[test]
    fn terminal_states_never_regress() {
        use AssociationStatus::*;
        for to in [New, Contacted, VisitCompleted, Hot] {
            assert!(!can_transition(Booked, to));
            assert!(!can_transition(Lost, to));
        }
    }

    #[tokio::test]
    async fn pretag_requires_channel_partner() {
        let db = Database::open_in_memory().await.unwrap();
        let project_id = seed_project(&db).await;

        let err = pretag(&db, intake(&project_id, "9876543210"))
            .await
            .unwrap_err();
        assert!(matches!(err, TurnkeyError::Validation(_)));

        let mut with_cp = intake(&project_id, "9876543210");
        with_cp.channel_partner_id = Some("cp-1".into());
        let row = pretag(&db, with_cp).await.unwrap();
        assert!(row.is_pretagged);
        assert_eq!(row.pretag_status.as_deref(), Some("pending_verification"));
        assert!(row.assigned_to.is_none(), "pretag stays unassigned");
    }

    #[tokio::test]
    async fn duplicate_association_for_pair_conflicts() {
        let db = Database::open_in_memory().await.unwrap();
        let project_id = seed_project(&db).await;

        new_visit(&db, intake(&project_id, "9876543210")).await.unwrap();
        let err = new_visit(&db, intake(&project_id, "+91 98765 43210"))
            .await
            .unwrap_err();
        assert_eq!(
            err.conflict_reason(),
            Some(ConflictReason::AssociationExists)
        );
    }

    #[tokio::test]
    async fn schedule_visit_auto_assigns_least_loaded() {
        let db = Database::open_in_memory().await.unwrap();
        let project_id = seed_project(&db).await;
        let closer_a = seed_employee(&db, "closing_manager").await;
        let closer_b = seed_employee(&db, "closing_manager").await;
        let telecaller = seed_employee(&db, "telecaller").await;
        for e in [&closer_a, &closer_b, &telecaller] {
            employee_queries::assign_to_project(&db, &project_id, &e.id)
                .await
                .unwrap();
        }

        let first = schedule_visit(&db, intake(&project_id, "9000000001"))
            .await
            .unwrap();
        let second = schedule_visit(&db, intake(&project_id, "9000000002"))
            .await
            .unwrap();

        let assigned: Vec<_> = [&first, &second]
            .iter()
            .map(|a| a.assigned_to.clone().unwrap())
            .collect();
        // Telecallers are never auto-assigned; the two closers get one each.
        assert!(assigned.contains(&closer_a.id));
        assert!(assigned.contains(&closer_b.id));
        assert_eq!(first.status, "visit_scheduled");
    }

    #[tokio::test]
    async fn revisit_links_and_counts() {
        let db = Database::open_in_memory().await.unwrap();
        let project_id = seed_project(&db).await;

        let first = new_visit(&db, intake(&project_id, "9000000001")).await.unwrap();
        let second = revisit(&db, &first.id, None, None).await.unwrap();
        assert_eq!(second.revisit_count, 1);
        assert_eq!(second.previous_visit_id.as_deref(), Some(first.id.as_str()));

        let third = revisit(&db, &second.id, None, None).await.unwrap();
        assert_eq!(third.revisit_count, 2);

        // The chain is a parent-pointer list: the archived first row still
        // holds no forward reference, and the latest row is the live one.
        let live = associations::get_by_lead_project(&db, &third.lead_id, &project_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(live.id, third.id);
    }

    #[tokio::test]
    async fn queue_and_promote_flow() {
        let db = Database::open_in_memory().await.unwrap();
        let project_id = seed_project(&db).await;
        let front_desk = seed_employee(&db, "front_desk").await;
        let closer = seed_employee(&db, "closing_manager").await;
        let telecaller = seed_employee(&db, "telecaller").await;

        let queued = queue_visit(&db, intake(&project_id, "9000000009"), &front_desk)
            .await
            .unwrap();
        assert_eq!(queued.status, "queued_visit");
        assert_eq!(queued.queued_by.as_deref(), Some(front_desk.id.as_str()));

        // A telecaller may not claim queued visits.
        let err = promote_queued(&db, &queued.id, &telecaller).await.unwrap_err();
        assert!(matches!(err, TurnkeyError::PermissionDenied { .. }));

        let promoted = promote_queued(&db, &queued.id, &closer).await.unwrap();
        assert_eq!(promoted.status, "visit_completed");
        assert_eq!(promoted.assigned_to.as_deref(), Some(closer.id.as_str()));

        // Promotion is not repeatable.
        let err = promote_queued(&db, &queued.id, &closer).await.unwrap_err();
        assert_eq!(
            err.conflict_reason(),
            Some(ConflictReason::InvalidTransition)
        );
    }

    #[tokio::test]
    async fn status_updates_are_guarded() {
        let db = Database::open_in_memory().await.unwrap();
        let project_id = seed_project(&db).await;
        let admin = seed_employee(&db, "admin").await;

        let a = new_visit(&db, intake(&project_id, "9000000001")).await.unwrap();
        update_status(&db, &a.id, AssociationStatus::Contacted).await.unwrap();

        // Direct jump to booked is reserved for the conversion path.
        let err = update_status(&db, &a.id, AssociationStatus::Booked)
            .await
            .unwrap_err();
        assert_eq!(
            err.conflict_reason(),
            Some(ConflictReason::InvalidTransition)
        );

        mark_lost(&db, &a.id, "budget mismatch").await.unwrap();
        let err = update_status(&db, &a.id, AssociationStatus::Hot)
            .await
            .unwrap_err();
        assert_eq!(err.conflict_reason(), Some(ConflictReason::TerminalStatus));

        // Admin override can resurrect the row.
        admin_override_status(&db, &a.id, AssociationStatus::Discussion, &admin)
            .await
            .unwrap();
        let row = associations::get(&db, &a.id).await.unwrap().unwrap();
        assert_eq!(row.status, "discussion");
    }

    #[test]
    fn verification_update_rules() {
        let mut association = Association {
            id: "a-1".into(),
            lead_id: "l-1".into(),
            project_id: "p-1".into(),
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
        };

        // Closing verifier on a plain association: promote + self-assign.
        let update =
            verification_update(&association, "closer-1", Role::ClosingManager).unwrap();
        assert_eq!(update.set_status.as_deref(), Some("visit_completed"));
        assert!(matches!(update.assignment, AssignmentChange::AssignTo(ref id) if id == "closer-1"));

        // Telecaller verifier releases to the closing queue.
        let update = verification_update(&association, "tc-1", Role::Telecaller).unwrap();
        assert!(matches!(update.assignment, AssignmentChange::QueueForClosing));

        // Pretagged association only flips its sub-status.
        association.is_pretagged = true;
        association.pretag_status = Some("pending_verification".into());
        let update = verification_update(&association, "tc-1", Role::Telecaller).unwrap();
        assert!(update.set_status.is_none());
        assert_eq!(update.set_pretag_status.as_deref(), Some("verified"));
    }
}
