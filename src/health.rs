//! System health checks for syncwarden
//!
//! This module provides preflight checks to verify git is available and that
//! every configured path could be adopted, without modifying anything.

use std::sync::Arc;

use crate::prepare::PathStatus;
use crate::repo::Repo;

/// Result of system health checks
#[derive(Debug, Clone)]
pub struct HealthCheck {
    /// Git installation status
    pub git: CheckResult,
    /// One entry per configured repository, in configuration order
    pub repositories: Vec<(String, CheckResult)>,
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
    pub async fn run(git_binary: &str, repos: &[Arc<Repo>]) -> Self {
        let mut repositories = Vec::with_capacity(repos.len());
        for repo in repos {
            let name = repo.spec().path().display().to_string();
            let result = Self::check_path(repo.spec().display_url(), repo.inspect().await);
            repositories.push((name, result));
        }

        Self {
            git: Self::check_git(git_binary),
            repositories,
        }
    }

    /// Check if all required checks passed (excludes warnings)
    pub fn all_passed(&self) -> bool {
        self.git.passed && self.repositories.iter().all(|(_, r)| r.passed)
    }

    /// Get list of failed checks (errors only, not warnings)
    pub fn errors(&self) -> Vec<&CheckResult> {
        self.all_checks()
            .into_iter()
            .map(|(_, r)| r)
            .filter(|r| !r.passed && !r.is_warning)
            .collect()
    }

    /// Get list of warnings
    pub fn warnings(&self) -> Vec<&CheckResult> {
        self.all_checks()
            .into_iter()
            .map(|(_, r)| r)
            .filter(|r| r.is_warning)
            .collect()
    }

    /// Check git installation
    fn check_git(git_binary: &str) -> CheckResult {
        match std::process::Command::new(git_binary).arg("--version").output() {
            Ok(output) if output.status.success() => {
                let version = String::from_utf8_lossy(&output.stdout);
                CheckResult::ok_with_details("Git installed", version.trim().to_string())
            }
            Ok(output) => CheckResult::error_with_details(
                "Git command failed",
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ),
            Err(_) => CheckResult::error_with_details(
                format!("{} not found in PATH", git_binary),
                "Install git: https://git-scm.com/downloads",
            ),
        }
    }

    /// Map a path inspection onto a check result
    fn check_path(remote: String, status: PathStatus) -> CheckResult {
        match status {
            PathStatus::Missing => {
                CheckResult::warning_with_details("Path missing", "Will be created and cloned")
            }
            PathStatus::Empty => CheckResult::ok_with_details("Empty directory", "Will be cloned"),
            PathStatus::MatchingWorkingCopy => {
                CheckResult::ok_with_details("Working copy", format!("origin {}", remote))
            }
            PathStatus::ForeignWorkingCopy(origin) => CheckResult::error_with_details(
                "Working copy of another remote",
                format!("found {}, expected {}", crate::repo::redact_remote(&origin), remote),
            ),
            PathStatus::UnreadableOrigin(reason) => {
                CheckResult::error_with_details("Cannot read origin", reason)
            }
            PathStatus::NotARepository => CheckResult::error_with_details(
                "Directory not empty",
                "Not a git working copy; refusing to clone into it",
            ),
        }
    }

    /// Every check with its display name
    pub fn all_checks(&self) -> Vec<(&str, &CheckResult)> {
        std::iter::once(("Git Installation", &self.git))
            .chain(self.repositories.iter().map(|(name, r)| (name.as_str(), r)))
            .collect()
    }
}
