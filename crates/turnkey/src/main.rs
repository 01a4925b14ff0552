// SPDX-FileCopyrightText: 2026 Turnkey Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Turnkey - visit-to-booking conversion engine for real-estate sales.
//!
//! This is the binary entry point. The HTTP surface lives elsewhere; this
//! CLI covers operational tasks: database init, diagnostics, the daily
//! auto-assignment batch (driven by external cron), and config inspection.

mod doctor;

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;
use turnkey_config::TurnkeyConfig;
use turnkey_core::TurnkeyError;
use turnkey_storage::Database;
use turnkey_storage::queries::projects;

/// Turnkey - visit-to-booking conversion engine.
#[derive(Parser, Debug)]
#[command(name = "turnkey", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Create (or migrate) the database.
    Init,
    /// Run environment diagnostics.
    Doctor,
    /// Run the daily auto-assignment batch once.
    Assign {
        /// Project to assign; omit to sweep every active project.
        #[arg(long)]
        project: Option<String>,
    },
    /// Print the effective configuration with secrets redacted.
    Config,
}

fn init_tracing(config: &TurnkeyConfig) {
    // RUST_LOG wins over the configured level.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.crm.log_level.clone()));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match turnkey_config::load_and_validate() {
        Ok(config) => config,
        Err(errors) => {
            turnkey_config::render_errors(&errors);
            std::process::exit(1);
        }
    };
    init_tracing(&config);

    let result = match cli.command {
        Some(Commands::Init) => run_init(&config).await,
        Some(Commands::Doctor) => doctor::run_doctor(&config).await,
        Some(Commands::Assign { project }) => run_assign(&config, project).await,
        Some(Commands::Config) => run_config(&config),
        None => {
            println!("turnkey: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("turnkey: {e}");
        std::process::exit(1);
    }
}

async fn run_init(config: &TurnkeyConfig) -> Result<(), TurnkeyError> {
    let db = Database::open(&config.storage.database_path).await?;
    db.close().await?;
    println!("database ready at {}", config.storage.database_path);
    Ok(())
}

async fn run_assign(
    config: &TurnkeyConfig,
    project: Option<String>,
) -> Result<(), TurnkeyError> {
    let db = Database::open(&config.storage.database_path).await?;

    let project_ids = match project {
        Some(id) => vec![id],
        None => projects::list_active(&db)
            .await?
            .into_iter()
            .map(|p| p.id)
            .collect(),
    };

    for project_id in project_ids {
        let report =
            turnkey_engine::assignment::run_for_project(&db, &config.assignment, &project_id)
                .await?;
        info!(
            %project_id,
            assigned = report.assigned,
            skipped = report.skipped,
            over_quota = report.over_quota,
            "assignment batch"
        );
        println!(
            "{project_id}: assigned {}, skipped {}, over quota {}",
            report.assigned, report.skipped, report.over_quota
        );
    }
    db.close().await
}

fn run_config(config: &TurnkeyConfig) -> Result<(), TurnkeyError> {
    let mut redacted = config.clone();
    if redacted.otp.secret.is_some() {
        redacted.otp.secret = Some("<redacted>".to_string());
    }
    if redacted.sms.api_key.is_some() {
        redacted.sms.api_key = Some("<redacted>".to_string());
    }
    let rendered = toml::to_string_pretty(&redacted)
        .map_err(|e| TurnkeyError::Internal(format!("config render failed: {e}")))?;
    print!("{rendered}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(not(target_env = "msvc"))]
    fn jemalloc_is_active() {
        // Verify jemalloc is the global allocator by advancing the epoch.
        // Only jemalloc supports this; the system allocator would fail.
        use tikv_jemalloc_ctl::{epoch, stats};
        epoch::advance().unwrap();
        let allocated = stats::allocated::read().unwrap();
        assert!(allocated > 0, "jemalloc should report non-zero allocation");
    }

    #[test]
    fn config_redaction_hides_secrets() {
        let mut config = TurnkeyConfig::default();
        config.otp.secret = Some("super-secret".into());
        config.sms.api_key = Some("key-123".into());

        let mut redacted = config.clone();
        redacted.otp.secret = Some("<redacted>".to_string());
        redacted.sms.api_key = Some("<redacted>".to_string());
        let rendered = toml::to_string_pretty(&redacted).unwrap();
        assert!(!rendered.contains("super-secret"));
        assert!(!rendered.contains("key-123"));
    }

    #[test]
    fn cli_parses_subcommands() {
        use clap::Parser;
        let cli = Cli::parse_from(["turnkey", "assign", "--project", "p-1"]);
        match cli.command {
            Some(Commands::Assign { project }) => {
                assert_eq!(project.as_deref(), Some("p-1"));
            }
            other => panic!("unexpected: {other:?}"),
        }

        let cli = Cli::parse_from(["turnkey", "doctor"]);
        assert!(matches!(cli.command, Some(Commands::Doctor)));
    }
}
