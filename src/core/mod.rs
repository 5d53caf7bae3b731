//! Core module
//!
//! Error taxonomy, per-operation options and small shared helpers.

pub mod error;
pub mod options;
pub mod utils;

pub use error::{ErrorRecovery, RecoveryAction, Result, UpdateError};
pub use options::{HelperExecutable, UpdateOptions};
