//! User accounts backed by SQLite.
//!
//! Passwords are stored as salted PBKDF2 hashes (see [`crate::password`]).
//! The connection is guarded by a `Mutex`; callers on the async runtime
//! should go through `tokio::task::spawn_blocking`.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, ErrorCode, OptionalExtension, Row, params};
use serde::Serialize;
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info};

use crate::error::AccountError;
use crate::password::{hash_password, verify_password};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS accounts (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    username      TEXT    NOT NULL UNIQUE,
    email         TEXT    NOT NULL,
    password_hash TEXT    NOT NULL,
    first_name    TEXT    NOT NULL,
    last_name     TEXT    NOT NULL,
    created_at    TEXT    NOT NULL
);
";

/// A registered user. The password hash never leaves the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Account {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub created_at: DateTime<Utc>,
}

/// Registration form contents.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

impl NewAccount {
    fn check_required(&self) -> Result<(), AccountError> {
        for (field, value) in [
            ("username", &self.username),
            ("email", &self.email),
            ("password", &self.password),
            ("fname", &self.first_name),
            ("lname", &self.last_name),
        ] {
            if value.trim().is_empty() {
                return Err(AccountError::MissingField {
                    field: field.to_string(),
                });
            }
        }
        Ok(())
    }
}

/// SQLite-backed account table with a uniqueness constraint on `username`.
pub struct AccountStore {
    conn: Mutex<Connection>,
    password_iterations: u32,
    /// Verified against when the username is unknown, so a miss costs as
    /// much as a wrong password.
    decoy_hash: String,
}

impl std::fmt::Debug for AccountStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountStore")
            .field("password_iterations", &self.password_iterations)
            .finish()
    }
}

impl AccountStore {
    /// Open (or create) the account database at `path`.
    pub fn open(path: &Path, password_iterations: u32) -> Result<Self, AccountError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        info!(path = %path.display(), "Opened account store");
        Self::with_connection(conn, password_iterations)
    }

    /// In-memory store, used by tests and throwaway servers.
    pub fn open_in_memory(password_iterations: u32) -> Result<Self, AccountError> {
        Self::with_connection(Connection::open_in_memory()?, password_iterations)
    }

    fn with_connection(conn: Connection, password_iterations: u32) -> Result<Self, AccountError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
            password_iterations,
            decoy_hash: hash_password("", password_iterations)?,
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, AccountError> {
        self.conn.lock().map_err(|_| AccountError::LockPoisoned)
    }

    /// Create an account. Fails with `UsernameTaken` on a duplicate username.
    pub fn register(&self, new: NewAccount) -> Result<Account, AccountError> {
        new.check_required()?;
        let hash = hash_password(&new.password, self.password_iterations)?;
        let created_at = Utc::now();

        let conn = self.lock()?;
        let inserted = conn.execute(
            "INSERT INTO accounts (username, email, password_hash, first_name, last_name, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                new.username,
                new.email,
                hash,
                new.first_name,
                new.last_name,
                created_at.to_rfc3339()
            ],
        );
        match inserted {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                debug!(username = %new.username, "Registration rejected: username taken");
                return Err(AccountError::UsernameTaken {
                    username: new.username,
                });
            }
            Err(e) => return Err(e.into()),
        }

        let id = conn.last_insert_rowid();
        info!(account_id = id, username = %new.username, "Registered account");
        Ok(Account {
            id,
            username: new.username,
            email: new.email,
            first_name: new.first_name,
            last_name: new.last_name,
            created_at,
        })
    }

    /// Check credentials. `Ok(None)` for an unknown user or a wrong password.
    pub fn authenticate(&self, username: &str, password: &str) -> Result<Option<Account>, AccountError> {
        let found = {
            let conn = self.lock()?;
            conn.query_row(
                "SELECT id, username, email, first_name, last_name, created_at, password_hash
                 FROM accounts WHERE username = ?1",
                params![username],
                |row| Ok((account_from_row(row)?, row.get::<_, String>(6)?)),
            )
            .optional()?
        };

        let Some((account, hash)) = found else {
            verify_password(password, &self.decoy_hash)?;
            debug!(username, "Sign-in failed: unknown username");
            return Ok(None);
        };
        if verify_password(password, &hash)? {
            Ok(Some(account))
        } else {
            debug!(username, "Sign-in failed: wrong password");
            Ok(None)
        }
    }

    pub fn find_by_id(&self, id: i64) -> Result<Option<Account>, AccountError> {
        let conn = self.lock()?;
        Ok(conn
            .query_row(
                "SELECT id, username, email, first_name, last_name, created_at
                 FROM accounts WHERE id = ?1",
                params![id],
                account_from_row,
            )
            .optional()?)
    }

    pub fn find_by_username(&self, username: &str) -> Result<Option<Account>, AccountError> {
        let conn = self.lock()?;
        Ok(conn
            .query_row(
                "SELECT id, username, email, first_name, last_name, created_at
                 FROM accounts WHERE username = ?1",
                params![username],
                account_from_row,
            )
            .optional()?)
    }

    /// Number of registered accounts.
    pub fn count(&self) -> Result<usize, AccountError> {
        let conn = self.lock()?;
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM accounts", [], |row| row.get(0))?;
        Ok(n as usize)
    }
}

fn account_from_row(row: &Row<'_>) -> rusqlite::Result<Account> {
    let created_at: String = row.get(5)?;
    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
        })?;
    Ok(Account {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        first_name: row.get(3)?,
        last_name: row.get(4)?,
        created_at,
    })
}
