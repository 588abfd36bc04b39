//! Background runner for the orchestrator.
//!
//! Polls the scheduler on a fixed interval and executes whatever came due.
//! The loop runs recovery once on startup so a process restart resumes
//! every pending wait from the campaign store.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::time::interval;
use tracing::{debug, error, info};

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::orchestrator::FunnelOrchestrator;

/// Drives [`FunnelOrchestrator::run_due`] until shutdown is signalled.
pub struct EngineRunner {
    orchestrator: Arc<FunnelOrchestrator>,
    config: EngineConfig,
    shutdown_rx: mpsc::Receiver<()>,
}

impl EngineRunner {
    /// Create a runner and the sender used to stop it.
    pub fn new(
        orchestrator: Arc<FunnelOrchestrator>,
        config: EngineConfig,
    ) -> (Self, mpsc::Sender<()>) {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        (
            Self {
                orchestrator,
                config,
                shutdown_rx,
            },
            shutdown_tx,
        )
    }

    /// Run recovery, then poll for due steps until shutdown.
    pub async fn run(&mut self) -> Result<(), EngineError> {
        info!("engine runner starting");

        let recovered = self.orchestrator.recover(Utc::now()).await?;
        if recovered > 0 {
            info!(workflows = recovered, "resumed active workflows");
        }

        let mut poll = interval(self.config.poll_interval);
        loop {
            tokio::select! {
                _ = self.shutdown_rx.recv() => {
                    info!("engine runner received shutdown signal");
                    break;
                }
                _ = poll.tick() => {
                    match self.orchestrator.run_due(Utc::now()).await {
                        Ok(0) => {}
                        Ok(count) => debug!(count, "executed due steps"),
                        Err(e) => error!(error = %e, "sweep failed"),
                    }
                }
            }
        }

        info!("engine runner stopped");
        Ok(())
    }
}
