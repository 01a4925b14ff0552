// SPDX-FileCopyrightText: 2026 Turnkey Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Unit blocking and the booking conversion path.
//!
//! The allocator validates and prices the request, decides the commission
//! credits, and then hands the storage layer one atomic transaction that
//! claims every unit and creates booking, payments, and commissions
//! together. Contention surfaces as a unit-unavailable conflict, never as
//! a partial commit or a stall.

use std::collections::HashSet;
use std::str::FromStr;

use tracing::info;
use turnkey_core::types::{new_id, now_iso};
use turnkey_core::{Acquisition, Capability, ConflictReason, Role, TurnkeyError};
use turnkey_storage::queries::bookings::{self, NewBooking, NewCommission, UnitAllocation};
use turnkey_storage::queries::{associations, employees, projects, units};
use turnkey_storage::{Booking, Database, Employee, Unit};

use crate::attribution::{self, BookingContext};
use crate::pricing;

/// Place a timed hold on a unit for the acting employee.
pub async fn block_unit(
    db: &Database,
    unit_id: &str,
    actor: &Employee,
    duration_hours: i64,
) -> Result<(), TurnkeyError> {
    require(actor, Capability::BlockUnit)?;
    if duration_hours < 1 {
        return Err(TurnkeyError::Validation(
            "block duration must be at least one hour".to_string(),
        ));
    }
    let until = (chrono::Utc::now() + chrono::Duration::hours(duration_hours))
        .format("%Y-%m-%dT%H:%M:%S%.3fZ")
        .to_string();
    match units::try_block(db, unit_id, &actor.id, &until).await? {
        Acquisition::Acquired => Ok(()),
        Acquisition::Busy => Err(TurnkeyError::Conflict(ConflictReason::UnitUnavailable)),
    }
}

/// Release a hold. Only the blocking employee (or an admin) may release.
pub async fn unblock_unit(
    db: &Database,
    unit_id: &str,
    actor: &Employee,
) -> Result<(), TurnkeyError> {
    let role = require(actor, Capability::BlockUnit)?;
    let expected_blocker = (role != Role::Admin).then_some(actor.id.as_str());
    units::unblock(db, unit_id, expected_blocker).await
}

/// A conversion request: one booking over one or more units.
#[derive(Debug, Clone)]
pub struct BookingRequest {
    pub association_id: String,
    pub unit_ids: Vec<String>,
    /// Negotiated total across all units.
    pub total_price: f64,
    pub token_amount: f64,
    pub down_payment: f64,
    /// Overrides the association's channel partner when set.
    pub channel_partner_id: Option<String>,
}

/// Split a total across weights, rounded to 2 decimals, with the last
/// share absorbing the rounding remainder so the parts sum exactly.
///
/// Non-positive weight sums fall back to an equal split.
pub fn split_proportional(total: f64, weights: &[f64]) -> Vec<f64> {
    if weights.is_empty() {
        return Vec::new();
    }
    let sum: f64 = weights.iter().sum();
    let shares: Vec<f64> = if sum > 0.0 {
        weights.iter().map(|w| w / sum).collect()
    } else {
        vec![1.0 / weights.len() as f64; weights.len()]
    };

    let round2 = |x: f64| (x * 100.0).round() / 100.0;
    let mut out = Vec::with_capacity(weights.len());
    let mut allocated = 0.0;
    for share in shares.iter().take(weights.len() - 1) {
        let amount = round2(total * share);
        allocated += amount;
        out.push(amount);
    }
    out.push(round2(total - allocated));
    out
}

/// Convert a verified association into a booking over the given units.
///
/// Validation and pricing happen up front; the storage transaction then
/// either claims every unit and creates the whole booking graph, or rolls
/// back leaving nothing behind. Two concurrent conversions of the same
/// unit resolve to one winner; the loser gets "unit is not available" and
/// can retry with a different unit.
pub async fn convert(
    db: &Database,
    request: BookingRequest,
    actor: &Employee,
) -> Result<Booking, TurnkeyError> {
    require(actor, Capability::ConvertBooking)?;
    validate_request(&request)?;

    let association = associations::get(db, &request.association_id)
        .await?
        .ok_or_else(|| TurnkeyError::not_found("association", request.association_id.clone()))?;
    let status = turnkey_core::AssociationStatus::from_str(&association.status).map_err(|_| {
        TurnkeyError::Internal(format!(
            "association {} has unrecognized status `{}`",
            association.id, association.status
        ))
    })?;
    if association.archived || status.is_terminal() {
        return Err(TurnkeyError::Conflict(ConflictReason::TerminalStatus));
    }
    if !association.phone_verified {
        return Err(TurnkeyError::Conflict(ConflictReason::NotVerified));
    }

    let mut loaded_units = Vec::with_capacity(request.unit_ids.len());
    for unit_id in &request.unit_ids {
        let unit = units::get(db, unit_id)
            .await?
            .ok_or_else(|| TurnkeyError::not_found("unit", unit_id.clone()))?;
        if unit.project_id != association.project_id {
            return Err(TurnkeyError::Validation(format!(
                "unit {} does not belong to project {}",
                unit.id, association.project_id
            )));
        }
        loaded_units.push(unit);
    }

    let weights = list_weights(db, &association.project_id, &loaded_units).await?;
    let amounts = split_proportional(request.total_price, &weights);
    let tokens = split_proportional(request.token_amount, &weights);
    let downs = split_proportional(request.down_payment, &weights);

    let channel_partner = request
        .channel_partner_id
        .clone()
        .or_else(|| association.channel_partner_id.clone());
    let visit_creator = match (&association.created_by, &association.created_by_role) {
        (Some(id), Some(role)) => Role::from_str(role).ok().map(|r| (id.clone(), r)),
        _ => None,
    };
    let context = BookingContext {
        closing_actor_id: actor.id.clone(),
        has_channel_partner: channel_partner.is_some(),
        visit_creator,
        project_sourcing_manager: employees::sourcing_manager_for_project(
            db,
            &association.project_id,
        )
        .await?
        .map(|e| e.id),
    };
    let credits = attribution::attribute(&context);

    let find = |beneficiary: turnkey_core::Beneficiary| {
        credits
            .iter()
            .find(|c| c.beneficiary == beneficiary)
            .map(|c| c.employee_id.clone())
    };

    let booking = Booking {
        id: new_id(),
        association_id: association.id.clone(),
        lead_id: association.lead_id.clone(),
        project_id: association.project_id.clone(),
        total_price: request.total_price,
        token_amount: request.token_amount,
        down_payment: request.down_payment,
        channel_partner_id: channel_partner,
        closing_manager_id: find(turnkey_core::Beneficiary::ClosingManager),
        sourcing_manager_id: find(turnkey_core::Beneficiary::SourcingManager),
        telecaller_id: find(turnkey_core::Beneficiary::Telecaller),
        archived: false,
        created_at: now_iso(),
    };

    let allocations = loaded_units
        .iter()
        .enumerate()
        .map(|(i, unit)| UnitAllocation {
            unit_id: unit.id.clone(),
            amount: amounts[i],
            token_amount: tokens[i],
            down_payment: downs[i],
        })
        .collect();
    let commissions = credits
        .iter()
        .map(|c| NewCommission {
            employee_id: c.employee_id.clone(),
            beneficiary: c.beneficiary.to_string(),
        })
        .collect();

    let created = bookings::create(
        db,
        NewBooking {
            booking,
            allocations,
            commissions,
            actor_id: actor.id.clone(),
        },
    )
    .await?;

    info!(
        booking_id = %created.id,
        units = request.unit_ids.len(),
        credits = credits.len(),
        "conversion complete"
    );
    Ok(created)
}

fn validate_request(request: &BookingRequest) -> Result<(), TurnkeyError> {
    if request.unit_ids.is_empty() {
        return Err(TurnkeyError::Validation(
            "a booking needs at least one unit".to_string(),
        ));
    }
    let unique: HashSet<&String> = request.unit_ids.iter().collect();
    if unique.len() != request.unit_ids.len() {
        return Err(TurnkeyError::Validation(
            "duplicate unit in booking request".to_string(),
        ));
    }
    if request.total_price <= 0.0 {
        return Err(TurnkeyError::Validation(
            "total price must be positive".to_string(),
        ));
    }
    for (label, amount) in [
        ("token amount", request.token_amount),
        ("down payment", request.down_payment),
    ] {
        if amount < 0.0 {
            return Err(TurnkeyError::Validation(format!(
                "{label} must not be negative"
            )));
        }
        if amount > request.total_price {
            return Err(TurnkeyError::Validation(format!(
                "{label} exceeds the total price"
            )));
        }
    }
    Ok(())
}

/// List-price weights for the proportional split.
///
/// Uses each unit's floor-adjusted agreement value; if any unit lacks
/// configured rates the whole request falls back to an equal split so the
/// proportions stay explainable.
async fn list_weights(
    db: &Database,
    project_id: &str,
    loaded_units: &[Unit],
) -> Result<Vec<f64>, TurnkeyError> {
    let project = projects::get(db, project_id)
        .await?
        .ok_or_else(|| TurnkeyError::not_found("project", project_id))?;
    let highrise = projects::highrise_rules(&project)?;

    let mut weights = Vec::with_capacity(loaded_units.len());
    for unit in loaded_units {
        let Some(area_id) = &unit.area_type_id else {
            return Ok(vec![1.0; loaded_units.len()]);
        };
        let Some(area) = projects::get_area_type(db, area_id).await? else {
            return Ok(vec![1.0; loaded_units.len()]);
        };
        let rates = projects::area_rates(&area);
        weights.push(pricing::agreement_value(
            &rates,
            highrise.as_ref(),
            unit.floor,
        ));
    }
    Ok(weights)
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
