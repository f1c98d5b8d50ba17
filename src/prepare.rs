//! Local path validation before the first synchronization
//!
//! A configured path is adopted only when it is missing, empty, or already a
//! working copy of the same origin. Anything else is refused without touching
//! the existing content.

use futures::stream::{self, Stream, StreamExt};
use std::ffi::OsString;
use std::io;
use std::path::Path;
use tracing::{debug, info, warn, Instrument};

use crate::error::{Result, SyncError};
use crate::repo::{origins_match, redact_remote, Repo, SyncPhase};

/// What currently lives at a repository's local path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathStatus {
    /// Nothing there yet
    Missing,
    /// An existing, empty directory
    Empty,
    /// A working copy whose origin matches the configured remote
    MatchingWorkingCopy,
    /// A working copy of some other remote
    ForeignWorkingCopy(String),
    /// A working copy whose origin could not be read
    UnreadableOrigin(String),
    /// A non-empty directory (or file) that is not a working copy
    NotARepository,
}

/// Outcome of scanning a directory listing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Listing {
    Empty,
    Populated,
    WorkingCopy,
}

impl Repo {
    /// Classify the local path without modifying anything.
    pub async fn inspect(&self) -> PathStatus {
        let path = self.spec.path();

        let dir = match tokio::fs::read_dir(path).await {
            Ok(dir) => dir,
            Err(_) if !path.exists() => return PathStatus::Missing,
            Err(_) => return PathStatus::NotARepository,
        };

        match scan(entries(dir)).await {
            Ok(Listing::Empty) => return PathStatus::Empty,
            Ok(Listing::Populated) => return PathStatus::NotARepository,
            Ok(Listing::WorkingCopy) => {}
            // A listing we cannot finish is never treated as empty
            Err(e) => {
                warn!("Cannot list {}: {}", path.display(), e);
                return PathStatus::NotARepository;
            }
        }

        match self.origin_url().await {
            Ok(origin) if origins_match(&origin, self.spec.url()) => PathStatus::MatchingWorkingCopy,
            Ok(origin) => PathStatus::ForeignWorkingCopy(origin),
            Err(e) => PathStatus::UnreadableOrigin(e.to_string()),
        }
    }

    /// Validate the local path and set the starting phase.
    ///
    /// Missing or empty paths are created and left uninitialized. A working
    /// copy of the same origin is adopted so the first pull does not re-clone.
    /// Must run once before any [`Repo::pull`].
    pub async fn prepare(&self) -> Result<()> {
        self.prepare_locked().instrument(self.span.clone()).await
    }

    async fn prepare_locked(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        let path = self.spec.path();

        match self.inspect().await {
            PathStatus::Missing | PathStatus::Empty => {
                tokio::fs::create_dir_all(path).await.map_err(|e| {
                    SyncError::configuration(format!(
                        "cannot create {}: {}",
                        path.display(),
                        e
                    ))
                })?;
                state.phase = SyncPhase::Uninitialized;
                self.publish(&state);
                debug!("Directory ready for clone");
                Ok(())
            }
            PathStatus::MatchingWorkingCopy => {
                state.phase = self.spec.tracking_phase();
                self.publish(&state);
                info!("Adopting existing working copy of {}", self.spec.display_url());
                Ok(())
            }
            PathStatus::ForeignWorkingCopy(origin) => Err(SyncError::configuration(format!(
                "another git repo '{}' exists at {}",
                redact_remote(&origin),
                path.display()
            ))),
            PathStatus::UnreadableOrigin(reason) => Err(SyncError::configuration(format!(
                "cannot retrieve repo url for {}: {}",
                path.display(),
                reason
            ))),
            PathStatus::NotARepository => Err(SyncError::configuration(format!(
                "cannot git clone into {}, directory not empty",
                path.display()
            ))),
        }
    }

    async fn origin_url(&self) -> Result<String> {
        self.git_output(vec![
            "config".to_string(),
            "--get".to_string(),
            "remote.origin.url".to_string(),
        ])
        .await
    }
}

/// Directory entries as (name, is a `.git` directory), ending after the first error
fn entries(dir: tokio::fs::ReadDir) -> impl Stream<Item = io::Result<(OsString, bool)>> {
    stream::unfold(Some(dir), |dir| async move {
        let mut dir = dir?;
        match dir.next_entry().await {
            Ok(Some(entry)) => {
                let name = entry.file_name();
                let git_dir = name == ".git" && is_dir(&entry.path()).await;
                Some((Ok((name, git_dir)), Some(dir)))
            }
            Ok(None) => None,
            Err(e) => Some((Err(e), None)),
        }
    })
}

/// Stops at the first `.git` directory; any listing error is returned
async fn scan<S>(entries: S) -> io::Result<Listing>
where
    S: Stream<Item = io::Result<(OsString, bool)>>,
{
    futures::pin_mut!(entries);

    let mut listing = Listing::Empty;
    while let Some(entry) = entries.next().await {
        let (_, git_dir) = entry?;
        if git_dir {
            return Ok(Listing::WorkingCopy);
        }
        listing = Listing::Populated;
    }
    Ok(listing)
}

async fn is_dir(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false)
}
