// SPDX-FileCopyrightText: 2026 Turnkey Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Turnkey sales CRM.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Turnkey configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable
/// overrides. All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TurnkeyConfig {
    /// CRM identity and logging settings.
    #[serde(default)]
    pub crm: CrmConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Phone verification (OTP) settings.
    #[serde(default)]
    pub otp: OtpConfig,

    /// SMS gateway settings.
    #[serde(default)]
    pub sms: SmsConfig,

    /// Daily auto-assignment settings.
    #[serde(default)]
    pub assignment: AssignmentConfig,
}

/// CRM identity and logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CrmConfig {
    /// Display name of the installation, used in outbound messages.
    #[serde(default = "default_crm_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for CrmConfig {
    fn default() -> Self {
        Self {
            name: default_crm_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_crm_name() -> String {
    "turnkey".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|d| d.join("turnkey/turnkey.db").display().to_string())
        .unwrap_or_else(|| "turnkey.db".to_string())
}

/// Phone verification (OTP) configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct OtpConfig {
    /// Minutes before an issued code expires.
    #[serde(default = "default_otp_ttl_minutes")]
    pub ttl_minutes: u32,

    /// Maximum verification attempts per code.
    #[serde(default = "default_otp_max_attempts")]
    pub max_attempts: u32,

    /// Days a verified pretag association's record stays trusted.
    #[serde(default = "default_pretag_trust_days")]
    pub pretag_trust_days: u32,

    /// Secret key for the keyed code hash. `None` disables OTP issuance.
    #[serde(default)]
    pub secret: Option<String>,
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self {
            ttl_minutes: default_otp_ttl_minutes(),
            max_attempts: default_otp_max_attempts(),
            pretag_trust_days: default_pretag_trust_days(),
            secret: None,
        }
    }
}

fn default_otp_ttl_minutes() -> u32 {
    5
}

fn default_otp_max_attempts() -> u32 {
    3
}

fn default_pretag_trust_days() -> u32 {
    3650
}

/// SMS gateway configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SmsConfig {
    /// HTTP endpoint of the SMS provider. `None` forces manual-link fallback.
    #[serde(default)]
    pub gateway_url: Option<String>,

    /// API key for the SMS provider.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Sender id stamped on outbound messages.
    #[serde(default = "default_sender_id")]
    pub sender_id: String,

    /// Base URL for manually-shareable verification deep links.
    #[serde(default = "default_fallback_base_url")]
    pub fallback_base_url: String,

    /// Per-request timeout for the gateway, in seconds.
    #[serde(default = "default_sms_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SmsConfig {
    fn default() -> Self {
        Self {
            gateway_url: None,
            api_key: None,
            sender_id: default_sender_id(),
            fallback_base_url: default_fallback_base_url(),
            timeout_secs: default_sms_timeout_secs(),
        }
    }
}

fn default_sender_id() -> String {
    "TURNKY".to_string()
}

fn default_fallback_base_url() -> String {
    "https://verify.turnkey.example/v".to_string()
}

fn default_sms_timeout_secs() -> u64 {
    10
}

/// Daily auto-assignment configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AssignmentConfig {
    /// Maximum associations assigned to one employee per project per day.
    #[serde(default = "default_daily_quota")]
    pub daily_quota: u32,
}

impl Default for AssignmentConfig {
    fn default() -> Self {
        Self {
            daily_quota: default_daily_quota(),
        }
    }
}

fn default_daily_quota() -> u32 {
    10
}
