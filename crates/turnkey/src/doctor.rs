// SPDX-FileCopyrightText: 2026 Turnkey Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `turnkey doctor` command implementation.
//!
//! Runs diagnostic checks against the environment: configuration
//! validity, storage health, and notification channel reachability.

use std::time::{Duration, Instant};

use turnkey_config::TurnkeyConfig;
use turnkey_core::{HealthStatus, TurnkeyError};
use turnkey_storage::Database;

/// Status of a diagnostic check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

/// Result of a single diagnostic check.
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub name: &'static str,
    pub status: CheckStatus,
    pub message: String,
    pub duration: Duration,
}

/// Run the `turnkey doctor` command and print a report.
///
/// Returns an error only when a check fails hard; warnings (e.g. a
/// fallback-only SMS setup) exit cleanly.
pub async fn run_doctor(config: &TurnkeyConfig) -> Result<(), TurnkeyError> {
    let results = vec![
        check_otp_config(config),
        check_database(&config.storage.database_path).await,
        check_channel(config).await,
    ];

    println!();
    println!("  turnkey doctor");
    println!("  {}", "-".repeat(50));
    for result in &results {
        let tag = match result.status {
            CheckStatus::Pass => "[OK]  ",
            CheckStatus::Warn => "[WARN]",
            CheckStatus::Fail => "[FAIL]",
        };
        println!(
            "    {tag} {:<14} {} ({}ms)",
            result.name,
            result.message,
            result.duration.as_millis()
        );
    }
    println!();

    let failures = results
        .iter()
        .filter(|r| r.status == CheckStatus::Fail)
        .count();
    if failures > 0 {
        return Err(TurnkeyError::Internal(format!(
            "{failures} doctor check(s) failed"
        )));
    }
    Ok(())
}

fn check_otp_config(config: &TurnkeyConfig) -> CheckResult {
    let start = Instant::now();
    let (status, message) = if config.otp.secret.is_some() {
        (
            CheckStatus::Pass,
            format!(
                "ttl {}m, {} attempts",
                config.otp.ttl_minutes, config.otp.max_attempts
            ),
        )
    } else {
        (
            CheckStatus::Fail,
            "otp.secret is not configured; verification codes cannot be issued".to_string(),
        )
    };
    CheckResult {
        name: "otp",
        status,
        message,
        duration: start.elapsed(),
    }
}

async fn check_database(path: &str) -> CheckResult {
    let start = Instant::now();
    let (status, message) = match Database::open(path).await {
        Ok(db) => match db.health_check().await {
            Ok(()) => {
                let projects = turnkey_storage::queries::projects::list_active(&db)
                    .await
                    .map(|p| p.len())
                    .unwrap_or(0);
                (CheckStatus::Pass, format!("{path} ({projects} projects)"))
            }
            Err(e) => (CheckStatus::Fail, format!("schema check failed: {e}")),
        },
        Err(e) => (CheckStatus::Fail, format!("cannot open {path}: {e}")),
    };
    CheckResult {
        name: "storage",
        status,
        message,
        duration: start.elapsed(),
    }
}

async fn check_channel(config: &TurnkeyConfig) -> CheckResult {
    let start = Instant::now();
    let (status, message) = match turnkey_sms::from_config(&config.sms) {
        Ok(channel) => match channel.health_check().await {
            Ok(HealthStatus::Healthy) if config.sms.gateway_url.is_some() => {
                (CheckStatus::Pass, format!("{} reachable", channel.name()))
            }
            Ok(HealthStatus::Healthy) => (
                CheckStatus::Warn,
                "no gateway configured; codes go out as manual links".to_string(),
            ),
            Ok(HealthStatus::Degraded(msg)) | Ok(HealthStatus::Unhealthy(msg)) => {
                (CheckStatus::Warn, msg)
            }
            Err(e) => (CheckStatus::Fail, e.to_string()),
        },
        Err(e) => (CheckStatus::Fail, e.to_string()),
    };
    CheckResult {
        name: "sms",
        status,
        message,
        duration: start.elapsed(),
    }
}
