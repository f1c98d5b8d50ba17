//! Daemon Infrastructure - foreground service for periodic synchronization
//!
//! Builds the configured repositories, prepares each path, performs the eager
//! startup pull through the scheduler and keeps the periodic tasks running
//! until a shutdown signal arrives.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::command::{CommandRunner, ProcessRunner};
use crate::config::Config;
use crate::repo::Repo;
use crate::scheduler::SyncScheduler;

/// Build one [`Repo`] per configured repository, sharing a single runner
pub fn build_repos(config: &Config, runner: Arc<dyn CommandRunner>) -> Result<Vec<Arc<Repo>>> {
    let specs = config
        .repository_specs()
        .context("Failed to read repository configuration")?;

    Ok(specs
        .into_iter()
        .map(|spec| {
            Arc::new(Repo::new(spec, runner.clone()).with_git_binary(config.git_binary.clone()))
        })
        .collect())
}

/// Prepare every repository, stopping at the first invalid path
pub async fn prepare_all(repos: &[Arc<Repo>]) -> Result<()> {
    for repo in repos {
        repo.prepare().await.with_context(|| {
            format!("Failed to prepare {}", repo.spec().path().display())
        })?;
    }
    Ok(())
}

/// Daemon state and control
pub struct Daemon {
    scheduler: SyncScheduler,
}

impl Daemon {
    /// Create a new daemon instance backed by real git processes
    pub fn new(config: &Config) -> Result<Self> {
        let repos = build_repos(config, Arc::new(ProcessRunner::new()))?;
        Ok(Self::with_repos(repos))
    }

    pub fn with_repos(repos: Vec<Arc<Repo>>) -> Self {
        Self {
            scheduler: SyncScheduler::new(repos),
        }
    }

    pub fn repos(&self) -> &[Arc<Repo>] {
        self.scheduler.repos()
    }

    /// Prepare and start synchronization, then run until Ctrl+C
    pub async fn run(&self) -> Result<()> {
        self.run_until(Self::wait_for_shutdown_signal()).await
    }

    /// Prepare and start synchronization, then run until `shutdown` resolves.
    ///
    /// Preparation and the eager pull are fatal: their errors are returned
    /// before any periodic task is started.
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()>,
    {
        let started = Instant::now();
        info!("Starting syncwarden daemon for {} repositories", self.repos().len());

        prepare_all(self.repos()).await?;

        let handles = self
            .scheduler
            .start()
            .await
            .context("Initial synchronization failed")?;

        info!("Initial synchronization completed in {:.2}s", started.elapsed().as_secs_f64());

        shutdown.await;
        info!("Shutdown signal received, stopping daemon...");
        self.scheduler.shutdown();

        for handle in handles {
            if let Err(e) = handle.await {
                warn!("Periodic task ended abnormally: {}", e);
            }
        }

        info!("Daemon stopped");
        Ok(())
    }

    /// Wait for Ctrl+C
    async fn wait_for_shutdown_signal() {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for ctrl-c: {}", e);
            // Without a signal handler, keep running until the process is killed
            std::future::pending::<()>().await;
        }
        debug!("Ctrl+C received");
    }
}
