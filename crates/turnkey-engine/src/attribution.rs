// SPDX-FileCopyrightText: 2026 Turnkey Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Credit attribution: which staff earn commission from a booking.
//!
//! The rule table is evaluated top to bottom, first match wins. Each
//! credited role becomes one pending commission row; approval and payment
//! are one-way transitions gated by capability.

use tracing::{info, warn};
use turnkey_core::{Beneficiary, Capability, Role, TurnkeyError};
use turnkey_storage::Database;
use turnkey_storage::Employee;
use turnkey_storage::queries::{commissions, employees};

/// Provenance of a booking, as far as attribution cares.
#[derive(Debug, Clone)]
pub struct BookingContext {
    /// The closing-role actor performing the conversion.
    pub closing_actor_id: String,
    /// Whether the lead carries a channel-partner reference.
    pub has_channel_partner: bool,
    /// Creator of the originating visit and their role, when recorded.
    pub visit_creator: Option<(String, Role)>,
    /// The sourcing manager assigned to the project, if any.
    pub project_sourcing_manager: Option<String>,
}

impl BookingContext {
    fn telecaller_creator(&self) -> Option<&str> {
        match &self.visit_creator {
            Some((id, Role::Telecaller)) => Some(id),
            _ => None,
        }
    }

    fn sourcing_creator(&self) -> Option<&str> {
        match &self.visit_creator {
            Some((id, Role::SourcingManager)) => Some(id),
            _ => None,
        }
    }
}

/// One credited role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credit {
    pub beneficiary: Beneficiary,
    pub employee_id: String,
}

/// Decide who earns credit for a completed booking.
///
/// Rules, first match wins:
/// 1. No channel partner, not telecaller-sourced, not sourcing-sourced:
///    the closing actor alone.
/// 2. Channel-partner lead (not telecaller-originated): closing actor plus
///    the project's sourcing manager, falling back to the visit-creating
///    sourcing manager.
/// 3. Telecaller-originated visit on a channel-partner lead: closing
///    actor, the originating telecaller, and the project's sourcing
///    manager.
/// 4. Telecaller-originated visit without a channel partner: closing actor
///    and the originating telecaller.
/// 5. Remaining case (sourcing-created visit, no channel partner): closing
///    actor and the creating sourcing manager.
pub fn attribute(ctx: &BookingContext) -> Vec<Credit> {
    let mut credits = vec![Credit {
        beneficiary: Beneficiary::ClosingManager,
        employee_id: ctx.closing_actor_id.clone(),
    }];

    let telecaller = ctx.telecaller_creator();
    let sourcing_creator = ctx.sourcing_creator();

    if !ctx.has_channel_partner && telecaller.is_none() && sourcing_creator.is_none() {
        // Rule 1: walk-in closed in-house.
    } else if ctx.has_channel_partner && telecaller.is_none() {
        // Rule 2.
        if let Some(sm) = ctx
            .project_sourcing_manager
            .as_deref()
            .or(sourcing_creator)
        {
            credits.push(Credit {
                beneficiary: Beneficiary::SourcingManager,
                employee_id: sm.to_string(),
            });
        }
    } else if let (true, Some(tc)) = (ctx.has_channel_partner, telecaller) {
        // Rule 3: telecaller-originated on a channel-partner lead.
        credits.push(Credit {
            beneficiary: Beneficiary::Telecaller,
            employee_id: tc.to_string(),
        });
        if let Some(sm) = ctx.project_sourcing_manager.as_deref() {
            credits.push(Credit {
                beneficiary: Beneficiary::SourcingManager,
                employee_id: sm.to_string(),
            });
        }
    } else if let Some(tc) = telecaller {
        // Rule 4.
        credits.push(Credit {
            beneficiary: Beneficiary::Telecaller,
            employee_id: tc.to_string(),
        });
    } else if let Some(sm) = sourcing_creator {
        // Rule 5.
        credits.push(Credit {
            beneficiary: Beneficiary::SourcingManager,
            employee_id: sm.to_string(),
        });
    }

    credits
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

/// Approve a pending commission. Elevated roles only.
pub async fn approve_commission(
    db: &Database,
    commission_id: &str,
    actor: &Employee,
) -> Result<(), TurnkeyError> {
    require(actor, Capability::ApproveCommission)?;
    commissions::approve(db, commission_id, &actor.id).await
}

/// Mark an approved commission paid. Elevated roles only.
pub async fn pay_commission(
    db: &Database,
    commission_id: &str,
    actor: &Employee,
) -> Result<(), TurnkeyError> {
    require(actor, Capability::PayCommission)?;
    commissions::mark_paid(db, commission_id, &actor.id).await
}

/// Result of a bulk approval pass.
#[derive(Debug, Default)]
pub struct BulkApproval {
    pub approved: Vec<String>,
    pub skipped: Vec<String>,
}

/// Approve every listed commission that is still pending.
///
/// Rows no longer pending (or meanwhile deleted) are skipped, never abort
/// the batch. A real storage failure still propagates.
pub async fn bulk_approve(
    db: &Database,
    commission_ids: &[String],
    actor: &Employee,
) -> Result<BulkApproval, TurnkeyError> {
    require(actor, Capability::ApproveCommission)?;

    let mut outcome = BulkApproval::default();
    for id in commission_ids {
        match commissions::approve(db, id, &actor.id).await {
            Ok(()) => outcome.approved.push(id.clone()),
            Err(TurnkeyError::Conflict(reason)) => {
                warn!(commission_id = %id, %reason, "bulk approval skipped commission");
                outcome.skipped.push(id.clone());
            }
            Err(TurnkeyError::NotFound { .. }) => {
                warn!(commission_id = %id, "bulk approval skipped missing commission");
                outcome.skipped.push(id.clone());
            }
            Err(other) => return Err(other),
        }
    }

    info!(
        approved = outcome.approved.len(),
        skipped = outcome.skipped.len(),
        "bulk approval complete"
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> BookingContext {
        BookingContext {
            closing_actor_id: "closer".into(),
            has_channel_partner: false,
            visit_creator: None,
            project_sourcing_manager: None,
        }
    }

    fn beneficiaries(credits: &[Credit]) -> Vec<Beneficiary> {
        credits.iter().map(|c| c.beneficiary).collect()
    }

    #[test]
    fn walk_in_credits_closing_only() {
        let credits = attribute(&ctx());
        assert_eq!(beneficiaries(&credits), vec![Beneficiary::ClosingManager]);
        assert_eq!(credits[0].employee_id, "closer");
    }

    #[test]
    fn channel_partner_adds_project_sourcing_manager() {
        let mut c = ctx();
        c.has_channel_partner = true;
        c.project_sourcing_manager = Some("sm-1".into());
        let credits = attribute(&c);
        assert_eq!(
            beneficiaries(&credits),
            vec![Beneficiary::ClosingManager, Beneficiary::SourcingManager]
        );
        assert_eq!(credits[1].employee_id, "sm-1");
    }

    #[test]
    fn channel_partner_falls_back_to_creating_sourcing_manager() {
        let mut c = ctx();
        c.has_channel_partner = true;
        c.visit_creator = Some(("sm-2".into(), Role::SourcingManager));
        let credits = attribute(&c);
        assert_eq!(credits[1].employee_id, "sm-2");
    }

    #[test]
    fn channel_partner_with_no_resolvable_sourcing_manager() {
        let mut c = ctx();
        c.has_channel_partner = true;
        let credits = attribute(&c);
        assert_eq!(beneficiaries(&credits), vec![Beneficiary::ClosingManager]);
    }

    #[test]
    fn telecaller_on_channel_partner_lead_credits_three() {
        let mut c = ctx();
        c.has_channel_partner = true;
        c.visit_creator = Some(("tc-1".into(), Role::Telecaller));
        c.project_sourcing_manager = Some("sm-1".into());
        let credits = attribute(&c);
        assert_eq!(
            beneficiaries(&credits),
            vec![
                Beneficiary::ClosingManager,
                Beneficiary::Telecaller,
                Beneficiary::SourcingManager,
            ]
        );
    }

    #[test]
    fn telecaller_without_channel_partner_credits_two() {
        let mut c = ctx();
        c.visit_creator = Some(("tc-1".into(), Role::Telecaller));
        c.project_sourcing_manager = Some("sm-1".into()); // must not be credited
        let credits = attribute(&c);
        assert_eq!(
            beneficiaries(&credits),
            vec![Beneficiary::ClosingManager, Beneficiary::Telecaller]
        );
    }

    #[test]
    fn sourcing_created_visit_without_channel_partner() {
        let mut c = ctx();
        c.visit_creator = Some(("sm-3".into(), Role::SourcingManager));
        let credits = attribute(&c);
        assert_eq!(
            beneficiaries(&credits),
            vec![Beneficiary::ClosingManager, Beneficiary::SourcingManager]
        );
        assert_eq!(credits[1].employee_id, "sm-3");
    }

    #[test]
    fn closing_created_visit_behaves_like_walk_in() {
        let mut c = ctx();
        c.visit_creator = Some(("cm-9".into(), Role::ClosingManager));
        let credits = attribute(&c);
        assert_eq!(beneficiaries(&credits), vec![Beneficiary::ClosingManager]);
    }
}
