//! # MediPredict Core
//!
//! Core library for the MediPredict web application.
//! Provides configuration, account storage with salted password hashing,
//! login sessions with flash messages, the clinic directory, and shared
//! persistence helpers.

pub mod accounts;
pub mod clinics;
pub mod config;
pub mod error;
pub mod password;
pub mod persistence;
pub mod session;

// Re-export commonly used types at the crate root.
pub use accounts::{Account, AccountStore, NewAccount};
pub use clinics::{Clinic, ClinicDirectory, ClinicLookup};
pub use config::{AppConfig, load_config};
pub use error::{AccountError, ClinicError, ConfigError, CoreError, Result};
pub use session::{Flash, FlashKind, SessionManager, WebSession};
