//! Error types surfaced by the library
//!
//! Repository-level git failures are not errors: they are reported as
//! [`SyncResult::Failed`](crate::git::SyncResult::Failed) so one broken
//! repository never stops a run. The variants here are the conditions callers
//! need to branch on, mostly to choose the process exit status.

use std::path::PathBuf;
use thiserror::Error;

/// Exit status for a run where some repositories or categories failed
pub const EXIT_PARTIAL_FAILURE: u8 = 1;
/// Exit status for configuration problems (credentials, config file, git)
pub const EXIT_CONFIG: u8 = 2;
/// Exit status for GitHub API failures
pub const EXIT_API: u8 = 3;

#[derive(Debug, Error)]
pub enum GhSyncError {
    #[error("No GitHub credentials found: {0}")]
    MissingCredentials(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("GitHub API request failed while {action}: {detail}")]
    Api { action: String, detail: String },

    #[error("Cannot create category directory {path}: {source}")]
    DirectoryCreation {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl GhSyncError {
    /// Build an API error from an octocrab failure, keeping the status code
    /// and message GitHub returned when there is one.
    pub fn api(action: impl Into<String>, err: octocrab::Error) -> Self {
        let detail = match &err {
            octocrab::Error::GitHub { source, .. } => {
                format!("{} (HTTP {})", source.message, source.status_code)
            }
            other => other.to_string(),
        };

        Self::Api {
            action: action.into(),
            detail,
        }
    }

    /// Process exit status for this error
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::MissingCredentials(_) | Self::Config(_) => EXIT_CONFIG,
            Self::Api { .. } => EXIT_API,
            Self::DirectoryCreation { .. } => EXIT_PARTIAL_FAILURE,
        }
    }

    /// Exit status for an arbitrary error chain: the first `GhSyncError` in
    /// the chain decides, anything else counts as a partial failure.
    pub fn exit_code_for(err: &anyhow::Error) -> u8 {
        err.chain()
            .find_map(|cause| cause.downcast_ref::<GhSyncError>())
            .map(GhSyncError::exit_code)
            .unwrap_or(EXIT_PARTIAL_FAILURE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_configuration_errors_use_config_status() {
        assert_eq!(
            GhSyncError::MissingCredentials("no token".into()).exit_code(),
            EXIT_CONFIG
        );
        assert_eq!(GhSyncError::Config("bad".into()).exit_code(), EXIT_CONFIG);
    }

    #[test]
    fn test_api_error_status() {
        let err = GhSyncError::Api {
            action: "listing repositories".into(),
            detail: "Bad credentials (HTTP 401 Unauthorized)".into(),
        };
        assert_eq!(err.exit_code(), EXIT_API);
        assert!(err.to_string().contains("listing repositories"));
        assert!(err.to_string().contains("401"));
    }

    #[test]
    fn test_exit_code_found_through_context() {
        let err: anyhow::Error = Err::<(), _>(GhSyncError::Config("broken yaml".into()))
            .context("Failed to load configuration")
            .unwrap_err();
        assert_eq!(GhSyncError::exit_code_for(&err), EXIT_CONFIG);

        let plain = anyhow::anyhow!("something else");
        assert_eq!(GhSyncError::exit_code_for(&plain), EXIT_PARTIAL_FAILURE);
    }
}
