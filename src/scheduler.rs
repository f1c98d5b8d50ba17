//! Periodic synchronization
//!
//! The scheduler pulls every repository once at startup, failing fast if any of
//! those eager pulls fails, and then runs one independent background task per
//! repository that pulls on the repository's interval until shutdown.

use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, Instrument};

use crate::error::Result;
use crate::repo::Repo;

/// Drives eager and periodic pulls for a set of prepared repositories
pub struct SyncScheduler {
    repos: Vec<Arc<Repo>>,
    shutdown_sender: broadcast::Sender<()>,
}

impl SyncScheduler {
    pub fn new(repos: Vec<Arc<Repo>>) -> Self {
        let (shutdown_sender, _) = broadcast::channel(1);
        Self {
            repos,
            shutdown_sender,
        }
    }

    pub fn repos(&self) -> &[Arc<Repo>] {
        &self.repos
    }

    /// Pull every repository once, then start the periodic tasks.
    ///
    /// Eager pulls run concurrently. If any of them fails, the first error is
    /// returned and no background task is started; the caller is expected to
    /// abort.
    pub async fn start(&self) -> Result<Vec<JoinHandle<()>>> {
        info!("Running initial pull for {} repositories", self.repos.len());

        let mut pulls: FuturesUnordered<_> = self
            .repos
            .iter()
            .map(|repo| async move { repo.pull().await })
            .collect();

        let mut first_error = None;
        while let Some(result) = pulls.next().await {
            if let Err(e) = result {
                error!("Initial pull failed: {}", e);
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }

        if let Some(e) = first_error {
            return Err(e);
        }

        Ok(self.repos.iter().cloned().map(|repo| self.spawn(repo)).collect())
    }

    /// Stop all periodic tasks at their next tick boundary.
    ///
    /// A pull already in flight runs to completion.
    pub fn shutdown(&self) {
        let _ = self.shutdown_sender.send(());
    }

    fn spawn(&self, repo: Arc<Repo>) -> JoinHandle<()> {
        let mut shutdown_receiver = self.shutdown_sender.subscribe();
        let span = tracing::info_span!("schedule", path = %repo.spec().path().display());

        tokio::spawn(
            async move {
                let mut timer = interval(repo.interval());
                timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

                // Skip the first immediate tick, the eager pull already ran
                timer.tick().await;

                debug!("Periodic pull every {:?}", repo.interval());

                loop {
                    tokio::select! {
                        _ = shutdown_receiver.recv() => {
                            debug!("Shutdown received, stopping periodic pull");
                            break;
                        }

                        _ = timer.tick() => {
                            if let Err(e) = repo.pull().await {
                                error!("Scheduled pull failed: {}", e);
                            }
                        }
                    }
                }
            }
            .instrument(span),
        )
    }
}
