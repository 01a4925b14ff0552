// SPDX-FileCopyrightText: 2026 Turnkey Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./turnkey.toml` > `~/.config/turnkey/turnkey.toml`
//! > `/etc/turnkey/turnkey.toml` with environment variable overrides via the
//! `TURNKEY_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use tracing::debug;

use crate::model::TurnkeyConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/turnkey/turnkey.toml` (system-wide)
/// 3. `~/.config/turnkey/turnkey.toml` (user XDG config)
/// 4. `./turnkey.toml` (local directory)
/// 5. `TURNKEY_*` environment variables
pub fn load_config() -> Result<TurnkeyConfig, figment::Error> {
    debug!("loading configuration from XDG hierarchy");
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env vars).
///
/// Used for testing and explicit config specification.
pub fn load_config_from_str(toml_content: &str) -> Result<TurnkeyConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(TurnkeyConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<TurnkeyConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(TurnkeyConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used internally for config loading (exposed for diagnostic use).
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(TurnkeyConfig::default()))
        .merge(Toml::file("/etc/turnkey/turnkey.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("turnkey/turnkey.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("turnkey.toml"))
        .merge(env_provider())
}

/// Create the environment variable provider using explicit `map()` for
/// section-to-dot mapping.
///
/// Uses `Env::map()` NOT `Env::split("_")` to avoid ambiguity with
/// underscore-containing key names: `TURNKEY_OTP_MAX_ATTEMPTS` must map to
/// `otp.max_attempts`, not `otp.max.attempts`.
fn env_provider() -> Env {
    Env::prefixed("TURNKEY_").map(|key| {
        // `key` is the lowercased env var name with prefix stripped.
        // Example: TURNKEY_SMS_GATEWAY_URL -> "sms_gateway_url"
        let key_str = key.as_str();
        let mapped = key_str
            .replacen("crm_", "crm.", 1)
            .replacen("storage_", "storage.", 1)
            .replacen("otp_", "otp.", 1)
            .replacen("sms_", "sms.", 1)
            .replacen("assignment_", "assignment.", 1);
        mapped.into()
    })
}
