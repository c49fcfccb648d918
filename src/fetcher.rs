//! Periodic petitions fetcher
//!
//! Runs a background task that lists all open petitions on a fixed interval
//! and publishes the result as metrics:
//! - success → `petitions_signatures` gauge overwritten per petition
//! - failure → `petitions_fetcher_errors_total` incremented
//! - always  → `petitions_fetcher_fetches` latency observed
//!
//! Lifecycle: `Idle -[start]-> Running -[stop]-> Stopping -[task exits]-> Stopped`.
//! The first cycle runs as soon as the task starts. Between cycles the task
//! waits for the interval or the stop signal; when both are ready, stop wins.

use crate::error::{AppError, AppResult};
use crate::metrics::{Metrics, SignatureLabels};
use crate::petitions::PetitionSource;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;

/// Lifecycle state of a `Fetcher`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetcherState {
    /// Constructed, not started
    Idle,
    /// Background task active, waiting or mid-fetch
    Running,
    /// Stop requested, background task draining
    Stopping,
    /// Background task exited
    Stopped,
}

impl fmt::Display for FetcherState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// One fetch-and-publish step plus the state it carries between cycles
struct Cycle {
    source: Arc<dyn PetitionSource>,
    metrics: Metrics,
    base_url: String,
    retract_stale: bool,
    /// Label sets written by the last successful cycle
    published: HashSet<SignatureLabels>,
}

impl Cycle {
    async fn fetch_and_publish(&mut self) {
        let start = Instant::now();
        tracing::info!(url = %self.base_url, "fetch-list");

        match self.source.list().await {
            Ok(petitions) => {
                let mut published = HashSet::with_capacity(petitions.len());
                for petition in &petitions {
                    tracing::debug!(
                        id = petition.id(),
                        signature_count = petition.signature_count(),
                        "publishing petition"
                    );
                    published.insert(self.metrics.set_signatures(&self.base_url, petition));
                }

                if self.retract_stale {
                    let mut retracted = 0usize;
                    for stale in self.published.difference(&published) {
                        if self.metrics.remove_signatures(stale) {
                            retracted += 1;
                        }
                    }
                    if retracted > 0 {
                        tracing::info!(retracted, "removed gauges for petitions no longer open");
                    }
                }
                self.published = published;

                tracing::info!(
                    url = %self.base_url,
                    petitions = petitions.len(),
                    "fetch-success"
                );
            }
            Err(e) => {
                tracing::error!(
                    url = %self.base_url,
                    error = %e,
                    "fetch-failure"
                );
                self.metrics.fetch_error(&self.base_url);
            }
        }

        let elapsed = start.elapsed().as_secs_f64();
        if let Err(e) = self.metrics.observe_fetch(&self.base_url, elapsed) {
            tracing::error!(error = %e, elapsed, "Failed to record fetch duration");
        }
    }
}

/// Background poller that turns petition listings into metrics
///
/// `start`, `stop` and `wait` take `&self`, so a `Fetcher` can be shared
/// behind an `Arc` between the task that starts it and a shutdown handler.
pub struct Fetcher {
    cycle: std::sync::Mutex<Option<Cycle>>,
    base_url: String,
    interval: Duration,
    stop_tx: watch::Sender<bool>,
    state_tx: watch::Sender<FetcherState>,
}

impl Fetcher {
    /// Create an idle fetcher polling `source` every `interval`
    ///
    /// `base_url` is used as the `url` label on every metric this fetcher
    /// writes.
    pub fn new(
        source: Arc<dyn PetitionSource>,
        base_url: impl Into<String>,
        interval: Duration,
        metrics: Metrics,
    ) -> Self {
        let base_url = base_url.into();
        let (stop_tx, _) = watch::channel(false);
        let (state_tx, _) = watch::channel(FetcherState::Idle);

        Self {
            cycle: std::sync::Mutex::new(Some(Cycle {
                source,
                metrics,
                base_url: base_url.clone(),
                retract_stale: false,
                published: HashSet::new(),
            })),
            base_url,
            interval,
            stop_tx,
            state_tx,
        }
    }

    /// Remove gauges for petitions missing from the latest successful fetch
    ///
    /// Off by default: vanished petitions keep their last observed value.
    pub fn with_stale_retraction(self, enabled: bool) -> Self {
        if let Ok(mut cycle) = self.cycle.lock() {
            if let Some(cycle) = cycle.as_mut() {
                cycle.retract_stale = enabled;
            }
        }
        self
    }

    /// Base URL used as the `url` metric label
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Current lifecycle state
    pub fn state(&self) -> FetcherState {
        *self.state_tx.borrow()
    }

    /// Start the background task
    ///
    /// Returns immediately; the first fetch runs asynchronously before the
    /// first interval wait. Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `AppError::FetcherAlreadyStarted` unless the fetcher is idle.
    pub fn start(&self) -> AppResult<()> {
        let mut started = false;
        self.state_tx.send_if_modified(|state| {
            if *state == FetcherState::Idle {
                *state = FetcherState::Running;
                started = true;
                true
            } else {
                false
            }
        });
        if !started {
            return Err(AppError::FetcherAlreadyStarted {
                state: self.state().to_string(),
            });
        }

        let cycle = match self.cycle.lock().ok().and_then(|mut cycle| cycle.take()) {
            Some(cycle) => cycle,
            None => {
                self.state_tx.send_replace(FetcherState::Stopped);
                return Err(AppError::Internal(
                    "fetcher cycle state unavailable".to_string(),
                ));
            }
        };

        let stop_rx = self.stop_tx.subscribe();
        let guard = StoppedOnDrop(self.state_tx.clone());
        let interval = self.interval;

        tracing::info!(
            url = %self.base_url,
            interval_seconds = interval.as_secs_f64(),
            "Starting petitions fetcher"
        );

        tokio::spawn(async move {
            let _guard = guard;
            run_loop(cycle, interval, stop_rx).await;
        });

        Ok(())
    }

    /// Request cooperative termination
    ///
    /// Idempotent and safe to call from several callers. An in-flight fetch
    /// is never interrupted; the task exits at its next wait point. Stopping
    /// an idle fetcher moves it straight to `Stopped`.
    pub fn stop(&self) {
        self.stop_tx.send_replace(true);
        self.state_tx.send_if_modified(|state| match *state {
            FetcherState::Idle => {
                *state = FetcherState::Stopped;
                true
            }
            FetcherState::Running => {
                *state = FetcherState::Stopping;
                true
            }
            FetcherState::Stopping | FetcherState::Stopped => false,
        });
        tracing::info!(url = %self.base_url, "fetch-stop requested");
    }

    /// Wait until the background task has fully exited
    ///
    /// Returns immediately if the fetcher was never started or has already
    /// stopped. Any number of callers may wait concurrently.
    pub async fn wait(&self) {
        let mut state_rx = self.state_tx.subscribe();
        // The sender lives in `self`, so this can only fail if `self` is gone.
        let _ = state_rx
            .wait_for(|state| matches!(state, FetcherState::Idle | FetcherState::Stopped))
            .await;
    }
}

impl Drop for Fetcher {
    fn drop(&mut self) {
        self.stop_tx.send_replace(true);
    }
}

/// Marks the fetcher `Stopped` when the background task ends, even on panic
struct StoppedOnDrop(watch::Sender<FetcherState>);

impl Drop for StoppedOnDrop {
    fn drop(&mut self) {
        self.0.send_replace(FetcherState::Stopped);
    }
}

async fn run_loop(mut cycle: Cycle, interval: Duration, mut stop_rx: watch::Receiver<bool>) {
    loop {
        if *stop_rx.borrow_and_update() {
            break;
        }

        cycle.fetch_and_publish().await;

        tokio::select! {
            biased;
            _ = stop_requested(&mut stop_rx) => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }

    tracing::info!(url = %cycle.base_url, "fetch-stop");
}

async fn stop_requested(stop_rx: &mut watch::Receiver<bool>) {
    // A closed channel means the owning fetcher was dropped: treat as stop.
    let _ = stop_rx.wait_for(|stop| *stop).await;
}
