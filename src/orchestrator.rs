use std::sync::Arc;

use futures::{Stream, StreamExt};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::clock::{Clock, TokioClock};
use crate::config::AutofillConfig;
use crate::dom::{ChangeBatch, ChangeSource, Document};
use crate::error::{Error, Result};
use crate::fill::{run_fill_pass, FillReport};
use crate::storage::StorageBackend;
use crate::store::CredentialStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorState {
    Idle,
    WaitingForReady,
    Attempting,
    /// Initial attempts filled nothing; waiting for the page to change.
    Observing,
    /// A pass filled at least one field. Final for the page's lifetime.
    Filled,
    /// Observation ended without a successful pass.
    Exhausted,
}

/// Drives automatic filling for one loaded page.
///
/// Construct one per page load. The orchestrator waits for the document,
/// runs a bounded number of passes, then retries on page changes with a
/// cooldown until a pass fills something. After the first successful pass it
/// never fills the page again.
pub struct AutofillOrchestrator<B, D, C = TokioClock> {
    store: Arc<CredentialStore<B>>,
    document: Arc<D>,
    clock: C,
    config: AutofillConfig,
    state: OrchestratorState,
    passes: usize,
    last_trigger: Option<Instant>,
    last_report: Option<FillReport>,
}

impl<B, D> AutofillOrchestrator<B, D, TokioClock>
where
    B: StorageBackend,
    D: Document,
{
    pub fn new(store: Arc<CredentialStore<B>>, document: Arc<D>, config: AutofillConfig) -> Self {
        Self::with_clock(store, document, config, TokioClock)
    }
}

impl<B, D, C> AutofillOrchestrator<B, D, C>
where
    B: StorageBackend,
    D: Document,
    C: Clock,
{
    pub fn with_clock(
        store: Arc<CredentialStore<B>>,
        document: Arc<D>,
        config: AutofillConfig,
        clock: C,
    ) -> Self {
        Self {
            store,
            document,
            clock,
            config,
            state: OrchestratorState::Idle,
            passes: 0,
            last_trigger: None,
            last_report: None,
        }
    }

    pub fn state(&self) -> OrchestratorState {
        self.state
    }

    pub fn is_filled(&self) -> bool {
        self.state == OrchestratorState::Filled
    }

    /// Number of automatic passes run so far.
    pub fn passes_run(&self) -> usize {
        self.passes
    }

    pub fn last_report(&self) -> Option<&FillReport> {
        self.last_report.as_ref()
    }

    async fn pass(&mut self) -> Option<FillReport> {
        self.passes += 1;
        match run_fill_pass(self.store.as_ref(), self.document.as_ref(), None).await {
            Ok(report) => {
                if report.is_success() {
                    self.state = OrchestratorState::Filled;
                }
                self.last_report = Some(report.clone());
                Some(report)
            }
            Err(e) => {
                warn!(pass = self.passes, error = %e, "fill pass failed");
                None
            }
        }
    }

    /// Wait for the page to load and settle, then run the initial passes.
    ///
    /// Returns whether the page got filled. Only the first call does any
    /// work; later calls report the current outcome.
    pub async fn start(&mut self) -> Result<bool> {
        if self.state != OrchestratorState::Idle {
            return Ok(self.is_filled());
        }

        self.state = OrchestratorState::WaitingForReady;
        if let Err(e) = self.document.wait_until_loaded().await {
            self.state = OrchestratorState::Exhausted;
            return Err(e);
        }
        self.clock.sleep(self.config.settle_delay).await;

        self.state = OrchestratorState::Attempting;
        let attempts = self.config.max_attempts.max(1);
        for attempt in 1..=attempts {
            let report = self.pass().await;
            if self.is_filled() {
                if let Some(report) = &report {
                    info!(
                        filled = report.filled_count,
                        total = report.total_selectors,
                        attempt,
                        "page auto-filled"
                    );
                }
                return Ok(true);
            }

            let failure = report.as_ref().and_then(|r| r.failure);
            if let Some(failure) = failure.filter(|f| !f.is_retryable()) {
                debug!(reason = %failure, "auto-fill not attempted");
                break;
            }
            if attempt < attempts {
                debug!(attempt, "nothing filled, retrying");
                self.clock.sleep(self.config.retry_delay).await;
            }
        }

        self.state = OrchestratorState::Observing;
        Ok(false)
    }

    /// React to one change batch while observing.
    ///
    /// Runs one pass after the debounce delay, unless the page is already
    /// filled or the previous change-triggered pass started less than the
    /// cooldown ago. Returns the report of the pass, if one ran.
    pub async fn on_change(&mut self) -> Option<FillReport> {
        if self.state != OrchestratorState::Observing {
            return None;
        }

        let now = self.clock.now();
        if let Some(last) = self.last_trigger {
            if now.duration_since(last) < self.config.cooldown {
                debug!("page change ignored during cooldown");
                return None;
            }
        }
        self.last_trigger = Some(now);

        self.clock.sleep(self.config.debounce).await;
        let report = self.pass().await;
        if let Some(report) = report.as_ref().filter(|r| r.is_success()) {
            info!(
                filled = report.filled_count,
                total = report.total_selectors,
                "page auto-filled after change"
            );
        }
        report
    }

    /// Consume change batches until a pass succeeds or the stream ends.
    /// The stream is dropped on return, which unsubscribes it.
    pub async fn observe<S>(&mut self, mut changes: S)
    where
        S: Stream<Item = ChangeBatch> + Unpin,
    {
        while let Some(batch) = changes.next().await {
            if self.is_filled() {
                break;
            }
            debug!(records = batch.records, "page changed");
            self.on_change().await;
            if self.is_filled() {
                break;
            }
        }
        if self.state == OrchestratorState::Observing {
            self.state = OrchestratorState::Exhausted;
        }
    }

    /// Full automatic flow: initial passes, then observation when needed.
    pub async fn run<S>(&mut self, changes: &S) -> Result<OrchestratorState>
    where
        S: ChangeSource + ?Sized,
    {
        if !self.start().await? && self.state == OrchestratorState::Observing {
            let stream = changes.subscribe().await?;
            self.observe(stream).await;
        }
        Ok(self.state)
    }
}

impl<B, D, C> AutofillOrchestrator<B, D, C>
where
    B: StorageBackend + 'static,
    D: Document + 'static,
    C: Clock + 'static,
{
    /// Run the full flow on its own task. The returned session keeps the
    /// document reachable while the flow waits for changes, and can be
    /// stopped at any time.
    pub fn spawn<S>(mut self, changes: Arc<S>) -> AutofillSession<D>
    where
        S: ChangeSource + 'static,
    {
        let document = self.document.clone();
        let task = tokio::spawn(async move {
            let state = self.run(changes.as_ref()).await?;
            info!(?state, passes = self.passes, "autofill flow ended");
            Ok(state)
        });
        AutofillSession { document, task }
    }
}

/// Handle to an automatic fill flow running in the background.
pub struct AutofillSession<D> {
    document: Arc<D>,
    task: JoinHandle<Result<OrchestratorState>>,
}

impl<D> AutofillSession<D> {
    pub fn document(&self) -> &Arc<D> {
        &self.document
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the flow to end. On a page that never gets fillable fields
    /// this only returns once the change stream closes.
    pub async fn wait(self) -> Result<OrchestratorState> {
        self.task
            .await
            .map_err(|e| Error::TaskFailed(e.to_string()))?
    }

    /// Abort the flow, which drops its change subscription, and hand back
    /// the document.
    pub fn stop(self) -> Arc<D> {
        self.task.abort();
        self.document
    }
}

