//! Reconciliation loop
//!
//! One cycle: check the coordinator, decode the update, apply it through the
//! backend, wait for readiness and commit the new version, reporting progress
//! at every stage. [`ReconciliationLoop::run`] repeats cycles on a fixed
//! interval until shut down.

mod phase;

pub use phase::{CycleOutcome, Phase};

use anyhow::{Context, Result};
use std::time::Duration;
use tokio::sync::watch;

use crate::backend::ConvergenceBackend;
use crate::coordinator::{Progress, UpdateCoordinator};
use crate::version::strip_v;

/// Owns all mutable update state for one deployment target
pub struct ReconciliationLoop<C, B: ConvergenceBackend> {
    coordinator: C,
    backend: B,
    interval: Duration,
    current_version: String,
    last_applied: Option<B::Desired>,
    phase: Phase,
}

impl<C, B> ReconciliationLoop<C, B>
where
    C: UpdateCoordinator,
    B: ConvergenceBackend,
{
    pub fn new(coordinator: C, backend: B, interval: Duration, initial_version: &str) -> Self {
        Self {
            coordinator,
            backend,
            interval,
            current_version: initial_version.to_string(),
            last_applied: None,
            phase: Phase::Idle,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn current_version(&self) -> &str {
        &self.current_version
    }

    pub fn last_applied(&self) -> Option<&B::Desired> {
        self.last_applied.as_ref()
    }

    fn transition(&mut self, phase: Phase) {
        tracing::debug!("Phase {} -> {}", self.phase, phase);
        self.phase = phase;
    }

    async fn report(&self, progress: Progress) {
        if let Err(e) = self.coordinator.report_progress(progress).await {
            tracing::warn!("Failed to report {}: {:#}", progress, e);
        }
    }

    /// Run one update cycle; the loop is back in [`Phase::Idle`] afterwards
    pub async fn reconcile_once(&mut self) -> Result<CycleOutcome> {
        let result = self.cycle().await;

        if result.is_err() {
            self.transition(Phase::ReportingError);
            self.report(Progress::Error).await;
        }
        self.transition(Phase::Idle);
        result
    }

    async fn cycle(&mut self) -> Result<CycleOutcome> {
        self.transition(Phase::CheckingUpdate);
        let update = self
            .coordinator
            .check_for_update()
            .await
            .context("checking for updates")?;

        if !update.has_update {
            self.transition(Phase::NoUpdate);
            tracing::info!("No update available (current {})", self.current_version);
            if let Some(desired) = &self.last_applied {
                if let Err(e) = self.backend.reassert(desired).await {
                    tracing::warn!("Failed to re-assert the last applied state: {:#}", e);
                }
            }
            return Ok(CycleOutcome::NoUpdate);
        }

        tracing::info!(
            "Update available: {} -> {}",
            self.current_version,
            update.version
        );
        self.report(Progress::DownloadStarted).await;

        self.transition(Phase::Decoding);
        let desired = self
            .backend
            .decode(&update)
            .await
            .with_context(|| format!("decoding update {}", update.version))?;

        self.transition(Phase::Applying);
        let touched = self
            .backend
            .apply(&desired)
            .await
            .with_context(|| format!("applying update {}", update.version))?;
        self.report(Progress::DownloadFinished).await;
        self.report(Progress::InstallationStarted).await;

        self.transition(Phase::AwaitingReady);
        self.backend
            .await_ready(&touched)
            .await
            .with_context(|| format!("rolling out update {}", update.version))?;

        self.transition(Phase::Committing);
        self.report(Progress::InstallationFinished).await;
        self.report(Progress::UpdateComplete).await;
        self.current_version = update.version.clone();
        self.last_applied = Some(desired);
        let reported = self.coordinator.instance_version();
        self.coordinator
            .set_instance_version(strip_v(&update.version));

        tracing::info!(
            "Updated to version {} (coordinator had {})",
            update.version,
            reported
        );
        Ok(CycleOutcome::Updated {
            version: update.version,
        })
    }

    /// Run a cycle now and then once per interval until `shutdown` flips to
    /// `true` or its sender is dropped. Cycle errors are logged, never fatal.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(
            "Starting {} reconciliation every {:?}",
            self.backend.kind(),
            self.interval
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            if let Err(e) = self.reconcile_once().await {
                tracing::error!("Reconciliation failed: {:#}", e);
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!("Reconciliation stopped");
    }
}
