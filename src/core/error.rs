//! Error types for the update subsystem
//!
//! One taxonomy covers both sides of the handoff. Everything up to the helper
//! launch is recoverable by retrying the whole check/apply flow; everything the
//! helper raises happens after the calling process is gone.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for update operations
pub type Result<T> = std::result::Result<T, UpdateError>;

/// Main error type for the update subsystem
#[derive(Error, Debug)]
pub enum UpdateError {
    #[error("Update source unreachable: {reason}")]
    SourceUnreachable { reason: String },

    #[error("Invalid update manifest: {reason}")]
    InvalidManifest { reason: String },

    #[error("Release asset {asset} has no usable sha256 digest")]
    MissingChecksum { asset: String },

    #[error("Package download failed: {reason}")]
    DownloadFailed { reason: String },

    #[error("Checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("Update helper not found at {}", path.display())]
    HelperMissing { path: PathBuf },

    #[error("Failed to launch update helper: {reason}")]
    LaunchFailed { reason: String },

    #[error("Update cancelled")]
    Cancelled,

    #[error("Process {pid} did not exit within {waited_secs}s")]
    ProcessTimeout { pid: u32, waited_secs: u64 },

    #[error("Package extraction failed: {reason}")]
    ExtractionFailed { reason: String },

    #[error("Directory swap failed: {reason} (installation present: {app_dir_present})")]
    SwapFailure { reason: String, app_dir_present: bool },

    #[error("Failed to restart application: {reason}")]
    RestartFailed { reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl UpdateError {
    /// Whether the installed application is known to be intact after this error.
    ///
    /// Only a swap failure can leave the installation directory missing.
    pub fn installation_intact(&self) -> bool {
        match self {
            UpdateError::SwapFailure { app_dir_present, .. } => *app_dir_present,
            _ => true,
        }
    }

    /// Errors a source raises that callers should fold into "no update".
    pub fn is_soft_check_failure(&self) -> bool {
        matches!(self, UpdateError::SourceUnreachable { .. })
    }
}

/// Trait for error recovery strategies
pub trait ErrorRecovery {
    /// Check if the error is retryable
    fn is_retryable(&self) -> bool;

    /// Get suggested retry delay in milliseconds
    fn retry_delay_ms(&self) -> Option<u64>;

    /// Get recovery action suggestion
    fn recovery_action(&self) -> RecoveryAction;
}

/// Recovery action suggestions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryAction {
    /// Retry the operation
    Retry,
    /// Treat the failure as "nothing to do" and carry on
    Fallback,
    /// Notify user and wait for input
    NotifyUser,
    /// Abort the operation
    Abort,
}

impl ErrorRecovery for UpdateError {
    fn is_retryable(&self) -> bool {
        matches!(
            self,
            UpdateError::SourceUnreachable { .. }
                | UpdateError::DownloadFailed { .. }
                | UpdateError::LaunchFailed { .. }
                | UpdateError::Io(_)
        )
    }

    fn retry_delay_ms(&self) -> Option<u64> {
        match self {
            UpdateError::SourceUnreachable { .. } => Some(60_000),
            UpdateError::DownloadFailed { .. } => Some(5_000),
            UpdateError::LaunchFailed { .. } => Some(1_000),
            UpdateError::Io(_) => Some(1_000),
            _ => None,
        }
    }

    fn recovery_action(&self) -> RecoveryAction {
        match self {
            UpdateError::SourceUnreachable { .. } => RecoveryAction::Fallback,
            UpdateError::InvalidManifest { .. } => RecoveryAction::NotifyUser,
            UpdateError::MissingChecksum { .. } => RecoveryAction::NotifyUser,
            UpdateError::DownloadFailed { .. } => RecoveryAction::Retry,
            UpdateError::ChecksumMismatch { .. } => RecoveryAction::NotifyUser,
            UpdateError::HelperMissing { .. } => RecoveryAction::NotifyUser,
            UpdateError::LaunchFailed { .. } => RecoveryAction::Retry,
            UpdateError::Cancelled => RecoveryAction::Abort,
            UpdateError::ProcessTimeout { .. } => RecoveryAction::Abort,
            UpdateError::ExtractionFailed { .. } => RecoveryAction::Abort,
            UpdateError::SwapFailure { .. } => RecoveryAction::Abort,
            UpdateError::RestartFailed { .. } => RecoveryAction::NotifyUser,
            UpdateError::Io(_) => RecoveryAction::Retry,
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_errors_fall_back() {
        let err = UpdateError::SourceUnreachable {
            reason: "connection refused".to_string(),
        };
        assert!(err.is_retryable());
        assert!(err.is_soft_check_failure());
        assert_eq!(err.recovery_action(), RecoveryAction::Fallback);

        // Malformed descriptions are surfaced, never retried
        let err = UpdateError::InvalidManifest {
            reason: "missing version".to_string(),
        };
        assert!(!err.is_retryable());
        assert!(!err.is_soft_check_failure());
        assert!(err.retry_delay_ms().is_none());
        assert_eq!(err.recovery_action(), RecoveryAction::NotifyUser);

        let err = UpdateError::MissingChecksum {
            asset: "App-linux-x64.zip".to_string(),
        };
        assert!(!err.is_retryable());
        assert_eq!(err.recovery_action(), RecoveryAction::NotifyUser);
    }

    #[test]
    fn test_apply_errors_before_handoff() {
        let err = UpdateError::ChecksumMismatch {
            expected: "abc".to_string(),
            actual: "def".to_string(),
        };
        assert!(!err.is_retryable());
        assert!(err.installation_intact());
        assert_eq!(err.recovery_action(), RecoveryAction::NotifyUser);

        let err = UpdateError::HelperMissing {
            path: PathBuf::from("/opt/app/updater/updater"),
        };
        assert!(!err.is_retryable());
        assert_eq!(err.recovery_action(), RecoveryAction::NotifyUser);

        let err = UpdateError::DownloadFailed {
            reason: "HTTP 503".to_string(),
        };
        assert!(err.is_retryable());
        assert_eq!(err.retry_delay_ms(), Some(5_000));
    }

    #[test]
    fn test_swap_failure_reports_installation_state() {
        let err = UpdateError::SwapFailure {
            reason: "rename denied".to_string(),
            app_dir_present: false,
        };
        assert!(!err.installation_intact());
        assert_eq!(err.recovery_action(), RecoveryAction::Abort);

        let err = UpdateError::SwapFailure {
            reason: "rename denied".to_string(),
            app_dir_present: true,
        };
        assert!(err.installation_intact());

        let err = UpdateError::ProcessTimeout {
            pid: 42,
            waited_secs: 30,
        };
        assert!(err.installation_intact());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_error_display() {
        let err = UpdateError::ChecksumMismatch {
            expected: "abc".to_string(),
            actual: "def".to_string(),
        };
        assert!(err.to_string().contains("abc"));
        assert!(err.to_string().contains("def"));

        let err = UpdateError::HelperMissing {
            path: PathBuf::from("/opt/app/updater"),
        };
        assert!(err.to_string().contains("/opt/app/updater"));

        let err = UpdateError::ProcessTimeout {
            pid: 4242,
            waited_secs: 30,
        };
        assert!(err.to_string().contains("4242"));
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "locked");
        let err: UpdateError = io.into();
        assert!(err.is_retryable());
        assert_eq!(err.recovery_action(), RecoveryAction::Retry);
    }
}
