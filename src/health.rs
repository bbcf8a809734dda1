//! Preflight checks for ghsync
//!
//! Verifies the system can run a sync before any repository is touched.

use std::path::Path;

use crate::config::Config;
use crate::github::detect_authentication;

/// Result of system health checks
#[derive(Debug, Clone)]
pub struct HealthCheck {
    /// Git installation status
    pub git: CheckResult,
    /// Credential resolution status
    pub credentials: CheckResult,
    /// Root directory status
    pub root_dir: CheckResult,
    /// SSH configuration status (warning only, owned repositories clone over SSH)
    pub ssh: CheckResult,
}

/// Result of an individual health check
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub passed: bool,
    pub message: String,
    pub details: Option<String>,
    pub is_warning: bool,
}

impl CheckResult {
    fn ok_with_details(message: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            passed: true,
            message: message.into(),
            details: Some(details.into()),
            is_warning: false,
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            passed: false,
            message: message.into(),
            details: None,
            is_warning: false,
        }
    }

    fn error_with_details(message: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            passed: false,
            message: message.into(),
            details: Some(details.into()),
            is_warning: false,
        }
    }

    fn warning_with_details(message: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            passed: true,
            message: message.into(),
            details: Some(details.into()),
            is_warning: true,
        }
    }
}

impl HealthCheck {
    /// Run all health checks
    pub fn run(config: &Config, root: &Path) -> Self {
        Self {
            git: Self::check_git(),
            credentials: Self::check_credentials(config),
            root_dir: Self::check_root_dir(root),
            ssh: Self::check_ssh(),
        }
    }

    /// Check if all required checks passed (excludes warnings)
    pub fn all_passed(&self) -> bool {
        self.git.passed && self.credentials.passed && self.root_dir.passed
    }

    /// Get list of warnings
    pub fn warnings(&self) -> Vec<&CheckResult> {
        self.all_checks()
            .into_iter()
            .map(|(_, result)| result)
            .filter(|r| r.is_warning)
            .collect()
    }

    /// Check git installation
    pub fn check_git() -> CheckResult {
        match std::process::Command::new("git").arg("--version").output() {
            Ok(output) if output.status.success() => {
                let version = String::from_utf8_lossy(&output.stdout);
                CheckResult::ok_with_details("Git installed", version.trim().to_string())
            }
            Ok(_) => CheckResult::error("Git command failed"),
            Err(_) => CheckResult::error_with_details(
                "Git not found in PATH",
                "Install git: https://git-scm.com/downloads",
            ),
        }
    }

    /// Check that a token can be found, without contacting GitHub
    fn check_credentials(config: &Config) -> CheckResult {
        match detect_authentication(config) {
            Ok((strategy, credentials)) => CheckResult::ok_with_details(
                "GitHub credentials found",
                format!(
                    "Source: {:?}\nUsername: {}",
                    strategy,
                    credentials
                        .username
                        .as_deref()
                        .unwrap_or("(looked up from the API at sync time)")
                ),
            ),
            Err(e) => CheckResult::error_with_details("GitHub credentials missing", e.to_string()),
        }
    }

    /// A missing root is created on first sync, so only a non-directory fails
    fn check_root_dir(root: &Path) -> CheckResult {
        if root.is_dir() {
            CheckResult::ok_with_details("Root directory exists", root.display().to_string())
        } else if root.exists() {
            CheckResult::error_with_details(
                "Root path is not a directory",
                root.display().to_string(),
            )
        } else {
            CheckResult::warning_with_details(
                "Root directory does not exist yet",
                format!("It will be created: {}", root.display()),
            )
        }
    }

    /// Check SSH configuration (warning only)
    fn check_ssh() -> CheckResult {
        let ssh_dir = dirs::home_dir().unwrap_or_default().join(".ssh");
        if !ssh_dir.exists() {
            return CheckResult::warning_with_details(
                "~/.ssh directory not found",
                "Cloning owned repositories over SSH may not work. Run: ssh-keygen -t ed25519",
            );
        }

        let ssh_keys = ["id_rsa", "id_ed25519", "id_ecdsa"];
        let found_keys: Vec<_> = ssh_keys
            .iter()
            .filter(|key| ssh_dir.join(key).exists())
            .copied()
            .collect();

        if found_keys.is_empty() {
            CheckResult::warning_with_details(
                "No SSH keys found",
                "Cloning owned repositories over SSH may not work",
            )
        } else {
            CheckResult::ok_with_details("SSH keys found", found_keys.join(", "))
        }
    }

    /// Get all checks as a slice for iteration
    pub fn all_checks(&self) -> [(&'static str, &CheckResult); 4] {
        [
            ("Git Installation", &self.git),
            ("GitHub Credentials", &self.credentials),
            ("Root Directory", &self.root_dir),
            ("SSH Configuration", &self.ssh),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn ok(message: &str) -> CheckResult {
        CheckResult::ok_with_details(message, "")
    }

    #[test]
    fn test_check_result_warning_passes() {
        let result = CheckResult::warning_with_details("Test warning", "Warning details");
        assert!(result.passed);
        assert!(result.is_warning);
        assert_eq!(result.details, Some("Warning details".to_string()));
    }

    #[test]
    fn test_check_result_error() {
        let result = CheckResult::error("Test failed");
        assert!(!result.passed);
        assert!(!result.is_warning);
    }

    #[test]
    fn test_git_check() {
        let result = HealthCheck::check_git();
        // Git should be installed in dev environment
        assert!(result.passed);
        assert!(result.details.is_some());
    }

    #[test]
    fn test_root_dir_states() {
        let temp = TempDir::new().unwrap();
        assert!(HealthCheck::check_root_dir(temp.path()).passed);

        let missing = HealthCheck::check_root_dir(&temp.path().join("later"));
        assert!(missing.passed);
        assert!(missing.is_warning);

        let file = temp.path().join("file");
        std::fs::write(&file, "x").unwrap();
        assert!(!HealthCheck::check_root_dir(&file).passed);
    }

    #[test]
    fn test_all_passed_ignores_ssh_warning() {
        let health = HealthCheck {
            git: ok("Git OK"),
            credentials: ok("Credentials OK"),
            root_dir: ok("Dir OK"),
            ssh: CheckResult::warning_with_details("No SSH keys", "details"),
        };
        assert!(health.all_passed());
        assert_eq!(health.warnings().len(), 1);
    }

    #[test]
    fn test_all_passed_with_missing_credentials() {
        let health = HealthCheck {
            git: ok("Git OK"),
            credentials: CheckResult::error("No token"),
            root_dir: ok("Dir OK"),
            ssh: ok("SSH OK"),
        };
        assert!(!health.all_passed());
    }

    #[test]
    fn test_all_checks_returns_all_four() {
        let health = HealthCheck {
            git: ok("Git OK"),
            credentials: ok("Credentials OK"),
            root_dir: ok("Dir OK"),
            ssh: ok("SSH OK"),
        };
        let checks = health.all_checks();
        assert_eq!(checks[0].0, "Git Installation");
        assert_eq!(checks[1].0, "GitHub Credentials");
        assert_eq!(checks[2].0, "Root Directory");
        assert_eq!(checks[3].0, "SSH Configuration");
    }
}
