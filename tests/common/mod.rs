//! Common test utilities and helpers for syncwarden tests
#![allow(dead_code)]

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

use syncwarden::{CommandRunner, Repo, RepositorySpec, SyncError, TrackingMode};

/// In-memory stand-in for git.
///
/// Models a remote with a branch head and an ordered list of tags, plus the
/// commit currently checked out locally. Every invocation is recorded, and
/// the number of invocations running at the same time is tracked so tests can
/// assert that a repository never runs two git processes at once.
pub struct FakeGit {
    state: Mutex<FakeState>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    delay: Duration,
}

struct FakeState {
    origin: String,
    head: String,
    tags: Vec<(String, String)>,
    local: Option<String>,
    failures_left: usize,
    calls: Vec<Vec<String>>,
}

impl FakeGit {
    pub fn new(head: &str) -> Self {
        Self {
            state: Mutex::new(FakeState {
                origin: "host/org/zones".to_string(),
                head: head.to_string(),
                tags: Vec::new(),
                local: None,
                failures_left: 0,
                calls: Vec::new(),
            }),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            delay: Duration::ZERO,
        }
    }

    /// Make every invocation take `delay` to finish
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Origin reported for an existing working copy
    pub fn with_origin(self, origin: &str) -> Self {
        self.state.lock().unwrap().origin = origin.to_string();
        self
    }

    /// Pretend a working copy already exists at `commit`
    pub fn with_local(self, commit: &str) -> Self {
        self.state.lock().unwrap().local = Some(commit.to_string());
        self
    }

    pub fn push_commit(&self, commit: &str) {
        self.state.lock().unwrap().head = commit.to_string();
    }

    pub fn push_tag(&self, tag: &str, commit: &str) {
        let mut state = self.state.lock().unwrap();
        state.head = commit.to_string();
        state.tags.push((tag.to_string(), commit.to_string()));
    }

    /// Fail the next `n` mutating invocations (clone, pull, fetch, checkout)
    pub fn fail_next(&self, n: usize) {
        self.state.lock().unwrap().failures_left = n;
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.state.lock().unwrap().calls.len()
    }

    /// Number of recorded invocations whose first argument is `subcommand`
    pub fn count(&self, subcommand: &str) -> usize {
        self.calls()
            .iter()
            .filter(|args| args.first().map(String::as_str) == Some(subcommand))
            .count()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn enter(&self, args: &[String]) {
        self.state.lock().unwrap().calls.push(args.to_vec());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }

    fn leave(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    fn apply(&self, args: &[String]) -> Result<(), SyncError> {
        let mut state = self.state.lock().unwrap();
        let sub = args.first().cloned().unwrap_or_default();

        if state.failures_left > 0 {
            state.failures_left -= 1;
            return Err(SyncError::execution(format!("git {}", sub), "exit status: 1"));
        }

        match sub.as_str() {
            "clone" | "pull" => state.local = Some(state.head.clone()),
            "fetch" => {}
            "checkout" => {
                let target = args.get(1).cloned().unwrap_or_default();
                let commit = match target.strip_prefix("tags/") {
                    Some(tag) => state
                        .tags
                        .iter()
                        .find(|(name, _)| name == tag)
                        .map(|(_, commit)| commit.clone())
                        .ok_or_else(|| SyncError::execution("git checkout", "unknown tag"))?,
                    None => target,
                };
                state.local = Some(commit);
            }
            other => {
                return Err(SyncError::execution(format!("git {}", other), "unsupported"));
            }
        }
        Ok(())
    }

    fn capture(&self, args: &[String]) -> Result<String, SyncError> {
        let state = self.state.lock().unwrap();
        if args.iter().any(|a| a == "describe") {
            return state
                .tags
                .last()
                .map(|(name, _)| name.clone())
                .ok_or_else(|| SyncError::execution("git describe", "No names found"));
        }
        if args.iter().any(|a| a == "log") {
            return state
                .local
                .clone()
                .ok_or_else(|| SyncError::execution("git log", "not a git repository"));
        }
        if args.iter().any(|a| a == "config") {
            return Ok(state.origin.clone());
        }
        Err(SyncError::execution("git", "unsupported"))
    }
}

#[async_trait]
impl CommandRunner for FakeGit {
    async fn run(&self, _command: &str, args: &[String], _dir: &Path) -> Result<(), SyncError> {
        self.enter(args).await;
        let result = self.apply(args);
        self.leave();
        result
    }

    async fn run_capture(
        &self,
        _command: &str,
        args: &[String],
        _dir: &Path,
    ) -> Result<String, SyncError> {
        self.enter(args).await;
        let result = self.capture(args);
        self.leave();
        result
    }
}

/// Repository at `path` tracking `tracking`, backed by `git`
pub fn fake_repo(path: &Path, tracking: TrackingMode, git: Arc<FakeGit>) -> Repo {
    let spec = RepositorySpec::new("host/org/zones", path, tracking)
        .expect("valid spec")
        .with_interval(Duration::from_secs(60));
    Repo::new(spec, git)
}

pub fn main_branch() -> TrackingMode {
    TrackingMode::Branch("main".to_string())
}

/// A real upstream git repository in a temporary directory
pub struct Upstream {
    pub dir: TempDir,
}

impl Upstream {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        git(dir.path(), &["init", "--quiet"]);
        git(dir.path(), &["symbolic-ref", "HEAD", "refs/heads/main"]);
        let upstream = Self { dir };
        upstream.commit("initial");
        upstream
    }

    pub fn url(&self) -> String {
        self.dir.path().to_string_lossy().into_owned()
    }

    /// Commit a file named after `message` and return the new hash
    pub fn commit(&self, message: &str) -> String {
        std::fs::write(self.dir.path().join(format!("{}.txt", message)), message)
            .expect("Failed to write file");
        git(self.dir.path(), &["add", "-A"]);
        git(self.dir.path(), &["commit", "--quiet", "-m", message]);
        self.head()
    }

    pub fn tag(&self, name: &str) {
        git(self.dir.path(), &["tag", name]);
    }

    pub fn head(&self) -> String {
        git(self.dir.path(), &["rev-parse", "HEAD"])
    }
}

/// Run git in `dir` with a throwaway identity and return trimmed stdout
pub fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args([
            "-c",
            "user.name=syncwarden",
            "-c",
            "user.email=syncwarden@example.org",
            "-c",
            "commit.gpgsign=false",
            "-c",
            "tag.gpgsign=false",
        ])
        .args(args)
        .current_dir(dir)
        .output()
        .expect("Failed to execute git");

    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// Write a config file listing `repositories` (url, path, branch)
pub fn write_config(dir: &Path, repositories: &[(&str, &Path, &str)]) -> PathBuf {
    let mut content = String::from("logging:\n  color: false\nrepositories:\n");
    for (url, path, branch) in repositories {
        content.push_str(&format!(
            "  - url: \"{}\"\n    path: \"{}\"\n    branch: \"{}\"\n    interval: \"60s\"\n    pull_args: [\"--ff-only\"]\n",
            url,
            path.display(),
            branch
        ));
    }

    let config_path = dir.join("config.yml");
    std::fs::write(&config_path, content).expect("Failed to write test config");
    config_path
}
