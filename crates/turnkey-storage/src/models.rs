// SPDX-FileCopyrightText: 2026 Turnkey Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Row types for storage entities.
//!
//! Enumerated columns (status, state, role) are stored as their snake_case
//! string forms and parsed back through the `turnkey-core` enums; the row
//! structs keep the raw `String` so a bad historical value surfaces at the
//! parse site instead of poisoning whole list queries.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lead {
    pub id: String,
    pub phone: String,
    pub name: String,
    pub email: Option<String>,
    pub archived: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Employee {
    pub id: String,
    pub name: String,
    pub phone: Option<String>,
    pub role: String,
    pub archived: bool,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub highrise_enabled: bool,
    pub floor_threshold: i64,
    pub highrise_mode: String,
    pub per_sqft_increment: f64,
    pub fixed_price_increment: f64,
    pub archived: bool,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AreaType {
    pub id: String,
    pub project_id: String,
    pub name: String,
    pub carpet_area: f64,
    pub buildup_area: f64,
    pub price_per_sqft: f64,
    pub stamp_duty_pct: f64,
    pub gst_pct: f64,
    pub registration_charge: f64,
    pub legal_charge: f64,
    pub development_charge: f64,
    pub development_charge_per_sqft: bool,
    pub parking_charge: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Association {
    pub id: String,
    pub lead_id: String,
    pub project_id: String,
    pub status: String,
    pub is_pretagged: bool,
    pub pretag_status: Option<String>,
    pub phone_verified: bool,
    pub assigned_to: Option<String>,
    pub assigned_at: Option<String>,
    pub assigned_by: Option<String>,
    pub previous_visit_id: Option<String>,
    pub revisit_count: i64,
    pub queued_at: Option<String>,
    pub queued_by: Option<String>,
    pub channel_partner_id: Option<String>,
    pub created_by: Option<String>,
    pub created_by_role: Option<String>,
    pub lost_reason: Option<String>,
    pub archived: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtpRecord {
    pub id: String,
    pub association_id: String,
    pub code_hash: String,
    pub expires_at: String,
    pub attempts: i64,
    pub max_attempts: i64,
    pub verified: bool,
    pub verified_at: Option<String>,
    pub fallback_link: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Unit {
    pub id: String,
    pub project_id: String,
    pub area_type_id: Option<String>,
    pub tower: String,
    pub floor: i64,
    pub unit_number: String,
    pub state: String,
    pub blocked_by: Option<String>,
    pub blocked_at: Option<String>,
    pub blocked_until: Option<String>,
    pub booking_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: String,
    pub association_id: String,
    pub lead_id: String,
    pub project_id: String,
    pub total_price: f64,
    pub token_amount: f64,
    pub down_payment: f64,
    pub channel_partner_id: Option<String>,
    pub closing_manager_id: Option<String>,
    pub sourcing_manager_id: Option<String>,
    pub telecaller_id: Option<String>,
    pub archived: bool,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: String,
    pub booking_id: String,
    pub unit_id: String,
    pub amount: f64,
    pub token_amount: f64,
    pub down_payment: f64,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Commission {
    pub id: String,
    pub booking_id: String,
    pub employee_id: String,
    pub beneficiary: String,
    pub state: String,
    pub approved_by: Option<String>,
    pub approved_at: Option<String>,
    pub paid_by: Option<String>,
    pub paid_at: Option<String>,
    pub created_at: String,
}
