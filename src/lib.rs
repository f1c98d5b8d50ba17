//! syncwarden - keeps local directories in sync with remote git repositories
//!
//! Each configured repository is cloned once and then kept fresh on a fixed
//! interval, either by pulling a branch or by checking out the newest tag.
//!
//! ## Core Features
//!
//! - **Safe adoption**: existing working copies of the same origin are reused,
//!   anything else at the target path is refused and left untouched
//! - **Serialized attempts**: one lock per repository covers every git call
//! - **Debounce and bounded retry**: redundant pulls are skipped, failing ones
//!   retried a fixed number of times
//! - **Branch or tag tracking**: follow a branch head or the latest tag
//!
//! ## Modules
//!
//! - [`repo`]: Repository specification, state and status snapshots
//! - [`prepare`]: Local path validation before the first pull
//! - [`pull`]: The clone / pull / tag-checkout state machine
//! - [`scheduler`]: Eager startup pull and periodic background pulls
//! - [`command`]: External command execution
//! - [`error`]: Error types shared by the modules above
//! - [`config`]: Configuration management and parsing
//! - [`daemon`]: Foreground service wiring and shutdown handling
//! - [`health`]: Read-only diagnostics for git and every configured path

pub mod command;
pub mod config;
pub mod daemon;
pub mod error;
pub mod health;
pub mod prepare;
pub mod pull;
pub mod repo;
pub mod scheduler;

pub use command::{CommandRunner, ProcessRunner};
pub use config::Config;
pub use daemon::Daemon;
pub use error::SyncError;
pub use health::HealthCheck;
pub use prepare::PathStatus;
pub use repo::{Repo, RepoStatus, RepositorySpec, SyncPhase, TrackingMode};
pub use scheduler::SyncScheduler;
