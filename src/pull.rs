//! Convergence state machine
//!
//! [`Repo::pull`] moves a repository towards its remote: clone when there is
//! no working copy, pull when tracking a branch, resolve and check out the
//! newest tag when tracking tags. Each call holds the repository lock for its
//! whole duration, is debounced, and retries a failing step a bounded number
//! of times.

use chrono::Utc;
use std::path::Path;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn, Instrument};

use crate::error::{Result, SyncError};
use crate::repo::{Repo, RepositoryState, SyncPhase, TrackingMode};

/// Pulls closer together than this are skipped
pub const DEBOUNCE_WINDOW: Duration = Duration::from_secs(5);

/// Attempts per pull before the last error is returned
pub const MAX_ATTEMPTS: usize = 3;

fn args<const N: usize>(list: [&str; N]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

impl Repo {
    /// Synchronize the working copy with the remote.
    ///
    /// Returns `Ok` without contacting the remote when the previous successful
    /// pull finished less than [`DEBOUNCE_WINDOW`] ago. On failure after
    /// [`MAX_ATTEMPTS`] attempts the last error is returned and the recorded
    /// commit, tag and pull time are left as they were.
    pub async fn pull(&self) -> Result<()> {
        self.pull_locked().instrument(self.span.clone()).await
    }

    /// Check out an arbitrary commit for manual intervention.
    ///
    /// The recorded phase, commit and tag are not touched, so the next
    /// scheduled pull converges the working copy back to its tracking target.
    pub async fn checkout_commit(&self, commit: &str) -> Result<()> {
        let commit = commit.trim();
        if commit.is_empty() || commit.starts_with('-') {
            return Err(SyncError::configuration(format!(
                "invalid commit identifier '{}'",
                commit
            )));
        }

        self.checkout_commit_locked(commit)
            .instrument(self.span.clone())
            .await
    }

    async fn checkout_commit_locked(&self, commit: &str) -> Result<()> {
        let state = self.state.lock().await;
        if state.phase == SyncPhase::Uninitialized {
            return Err(SyncError::configuration(format!(
                "no working copy at {} yet",
                self.spec.path().display()
            )));
        }

        self.git(args(["checkout", commit])).await?;
        info!("Commit {} checkout done", commit);
        Ok(())
    }

    async fn pull_locked(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        let result = self.pull_with_retry(&mut state).await;
        // A clone that succeeded moves the phase even when the attempt failed
        self.publish(&state);
        result
    }

    async fn pull_with_retry(&self, state: &mut RepositoryState) -> Result<()> {
        if let Some(last) = state.last_pull {
            let elapsed = last.elapsed();
            if elapsed < DEBOUNCE_WINDOW {
                debug!("Last pull was {:?} ago, skipping", elapsed);
                return Ok(());
            }
        }

        let previous_commit = state.last_commit.clone();

        let mut attempt = 1;
        loop {
            match self.converge(state).await {
                Ok(()) => break,
                Err(e) => {
                    warn!("Attempt {}/{} failed: {}", attempt, MAX_ATTEMPTS, e);
                    if attempt >= MAX_ATTEMPTS {
                        return Err(e);
                    }
                    attempt += 1;
                }
            }
        }

        state.last_pull = Some(Instant::now());
        state.last_pull_at = Some(Utc::now());

        if state.last_commit == previous_commit {
            info!("No new changes");
        } else if let Some(commit) = &state.last_commit {
            info!("Now at {}", commit);
        }

        Ok(())
    }

    /// One convergence attempt for the current phase
    async fn converge(&self, state: &mut RepositoryState) -> Result<()> {
        match (state.phase, self.spec.tracking()) {
            (SyncPhase::Uninitialized, _) => self.clone_remote(state).await,
            (SyncPhase::TrackingBranch, TrackingMode::Branch(branch)) => {
                self.pull_branch(branch, state).await
            }
            (SyncPhase::TrackingTag, TrackingMode::LatestTag) => {
                self.checkout_latest_tag(state).await
            }
            (phase, tracking) => Err(SyncError::configuration(format!(
                "phase {:?} does not apply to {}",
                phase, tracking
            ))),
        }
    }

    async fn clone_remote(&self, state: &mut RepositoryState) -> Result<()> {
        let path = self.spec.path();

        let mut params = vec!["clone".to_string()];
        if let TrackingMode::Branch(branch) = self.spec.tracking() {
            params.push("-b".to_string());
            params.push(branch.clone());
        }
        params.extend(self.spec.clone_args().iter().cloned());
        params.push(self.spec.url().to_string());
        params.push(path.to_string_lossy().into_owned());

        let workdir = path.parent().unwrap_or(Path::new("/"));
        self.runner.run(&self.git, &params, workdir).await?;
        info!("Cloned {}", self.spec.display_url());

        // The directory now holds a working copy; cloning again would fail
        state.phase = self.spec.tracking_phase();

        match self.spec.tracking() {
            TrackingMode::Branch(_) => {
                state.last_commit = Some(self.most_recent_commit().await?);
                Ok(())
            }
            TrackingMode::LatestTag => self.checkout_latest_tag(state).await,
        }
    }

    async fn pull_branch(&self, branch: &str, state: &mut RepositoryState) -> Result<()> {
        let mut params = vec!["pull".to_string()];
        params.extend(self.spec.pull_args().iter().cloned());
        params.push("origin".to_string());
        params.push(branch.to_string());

        self.git(params).await?;
        info!("Pulled {}", self.spec.display_url());

        state.last_commit = Some(self.most_recent_commit().await?);
        Ok(())
    }

    async fn checkout_latest_tag(&self, state: &mut RepositoryState) -> Result<()> {
        let tag = self.latest_tag().await?;

        if state.current_tag.as_deref() == Some(tag.as_str()) {
            debug!("Already at tag {}", tag);
            return Ok(());
        }

        self.git(vec!["checkout".to_string(), format!("tags/{}", tag)]).await?;
        let commit = self.most_recent_commit().await?;
        info!("Checked out tag {}", tag);

        state.current_tag = Some(tag);
        state.last_commit = Some(commit);
        Ok(())
    }

    /// Fetch remote tags and return the most recent one
    async fn latest_tag(&self) -> Result<String> {
        self.git(args(["fetch", "origin", "--tags"])).await?;

        let tag = self
            .git_output(args(["describe", "origin", "--abbrev=0", "--tags"]))
            .await
            .map_err(|e| SyncError::TagResolution {
                remote: self.spec.display_url(),
                detail: e.to_string(),
            })?;

        if tag.is_empty() {
            return Err(SyncError::TagResolution {
                remote: self.spec.display_url(),
                detail: "no tags found".to_string(),
            });
        }

        Ok(tag)
    }

    /// Hash of the commit currently checked out
    async fn most_recent_commit(&self) -> Result<String> {
        self.git_output(args(["--no-pager", "log", "-n", "1", "--pretty=format:%H"]))
            .await
    }
}
