// SPDX-FileCopyrightText: 2026 Turnkey Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All writes are serialized through tokio-rusqlite's single background
//! thread. Do NOT create additional Connection instances for writes: the
//! single-writer model is what makes the check-then-update claim
//! transactions in the query modules exclusive.

use std::path::Path;

use tracing::debug;
use turnkey_core::TurnkeyError;

use crate::migrations;

/// Convert a tokio-rusqlite error into [`TurnkeyError::Storage`].
pub fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> TurnkeyError {
    TurnkeyError::Storage { source: Box::new(e) }
}

/// Handle to the WAL-mode SQLite database.
///
/// Cloning is cheap; all clones share the same background writer thread.
#[derive(Clone)]
pub struct Database {
    conn: tokio_rusqlite::Connection,
}

impl Database {
    /// Open (creating if needed) the database at `path` and run migrations.
    pub async fn open(path: &str) -> Result<Self, TurnkeyError> {
        if let Some(parent) = Path::new(path).parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| TurnkeyError::Storage {
                source: Box::new(e),
            })?;
        }

        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(|e| TurnkeyError::Storage { source: Box::new(e) })?;

        conn.call(|conn| -> Result<(), rusqlite::Error> {
            conn.execute_batch(
                "PRAGMA journal_mode = WAL;
                 PRAGMA synchronous = NORMAL;
                 PRAGMA foreign_keys = ON;
                 PRAGMA busy_timeout = 5000;",
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;

        let db = Self { conn };
        db.migrate().await?;
        debug!(path, "database opened");
        Ok(db)
    }

    /// Open an in-memory database with migrations applied. Test use only;
    /// WAL does not apply to in-memory connections.
    pub async fn open_in_memory() -> Result<Self, TurnkeyError> {
        let conn = tokio_rusqlite::Connection::open_in_memory()
            .await
            .map_err(|e| TurnkeyError::Storage { source: Box::new(e) })?;

        conn.call(|conn| -> Result<(), rusqlite::Error> {
            conn.execute_batch("PRAGMA foreign_keys = ON;")?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;

        let db = Self { conn };
        db.migrate().await?;
        Ok(db)
    }

    async fn migrate(&self) -> Result<(), TurnkeyError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                migrations::run_migrations(conn)?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }

    /// The underlying tokio-rusqlite connection.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Liveness and schema probe: the connection answers and the core
    /// tables exist.
    pub async fn health_check(&self) -> Result<(), TurnkeyError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                let tables: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'
                     AND name IN ('leads', 'associations', 'units', 'bookings', 'commissions')",
                    [],
                    |row| row.get(0),
                )?;
                if tables != 5 {
                    return Err(rusqlite::Error::ModuleError(format!(
                        "expected 5 core tables, found {tables}"
                    )));
                }
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }

    /// Checkpoint the WAL and close the background thread.
    pub async fn close(&self) -> Result<(), TurnkeyError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        debug!("WAL checkpoint complete");
        Ok(())
    }
}
