//! Polling loop that feeds the per-swap state machines

use crate::cnd::{LedgerAction, SwapSource};
use crate::config::TrackerConfig;
use crate::error::{TrackerError, TrackerResult};
use crate::executor::ActionExecutor;
use crate::metrics;
use crate::swap::machine::swap_id;
use crate::swap::{ActionOffer, ActionStatus, ProgressStateMachine, SwapView};

use dashmap::{DashMap, DashSet};
use futures::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio::time::{interval, timeout, Duration, MissedTickBehavior};
use tracing::{debug, error, info, warn};

type SharedMachine = Arc<Mutex<ProgressStateMachine>>;

/// Tracks every swap the coordination service lists
pub struct SwapTracker {
    /// Source of swap snapshots and ledger details
    source: Arc<dyn SwapSource>,
    /// Executor for unattended actions, if enabled
    executor: Option<Arc<dyn ActionExecutor>>,
    /// One state machine per swap id
    swaps: DashMap<String, SharedMachine>,
    /// Handles with a detail fetch in flight
    detail_fetches: Arc<DashSet<String>>,
    /// Configuration
    config: TrackerConfig,
    /// Shutdown flag
    shutdown: Arc<RwLock<bool>>,
}

impl SwapTracker {
    pub fn new(
        source: Arc<dyn SwapSource>,
        executor: Option<Arc<dyn ActionExecutor>>,
        config: TrackerConfig,
    ) -> Self {
        Self {
            source,
            executor,
            swaps: DashMap::new(),
            detail_fetches: Arc::new(DashSet::new()),
            config,
            shutdown: Arc::new(RwLock::new(false)),
        }
    }

    /// Main polling loop
    pub async fn run(&self) -> TrackerResult<()> {
        let mut poll_interval = interval(Duration::from_millis(self.config.poll_interval_ms));
        poll_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            "Swap tracker started, polling every {}ms",
            self.config.poll_interval_ms
        );

        loop {
            poll_interval.tick().await;

            if *self.shutdown.read().await {
                break;
            }

            if let Err(e) = self.poll_once().await {
                metrics::record_poll_error(&e);
                if e.is_retryable() {
                    warn!("Failed to list swaps: {}", e);
                } else {
                    error!("Failed to list swaps: {}", e);
                }
            }
        }

        info!("Swap tracker stopped");
        Ok(())
    }

    /// List swaps, drop the ones that disappeared and poll the rest
    pub async fn poll_once(&self) -> TrackerResult<()> {
        let hrefs = self.source.list_swaps().await?;

        let listed: HashSet<String> = hrefs.iter().map(|href| swap_id(href)).collect();
        self.swaps.retain(|id, _| {
            let keep = listed.contains(id);
            if !keep {
                info!(swap = %id, "Swap no longer listed, discarding state");
            }
            keep
        });

        let results = join_all(hrefs.iter().map(|href| self.poll_swap(href))).await;
        for (href, result) in hrefs.iter().zip(results) {
            if let Err(e) = result {
                metrics::record_poll_error(&e);
                warn!(%href, "Failed to poll swap: {}", e);
            }
        }

        metrics::record_swaps_tracked(self.swaps.len());
        Ok(())
    }

    /// Fetch one swap and apply the snapshot to its state machine
    pub async fn poll_swap(&self, href: &str) -> TrackerResult<()> {
        let snapshot = self.source.fetch_swap(href).await?;

        let machine = self
            .swaps
            .entry(swap_id(href))
            .or_insert_with(|| {
                info!(%href, role = %snapshot.role, ordering = %snapshot.ordering, "Tracking new swap");
                Arc::new(Mutex::new(ProgressStateMachine::new(
                    href,
                    snapshot.ordering,
                    snapshot.role,
                )))
            })
            .clone();

        let mut m = machine.lock().await;

        if m.ordering() != snapshot.ordering || m.role() != snapshot.role {
            warn!(
                %href,
                "Swap reported as {} {} but is tracked as {} {}, ignoring",
                snapshot.role,
                snapshot.ordering,
                m.role(),
                m.ordering()
            );
        }

        let observed = match m.observe(snapshot.events, snapshot.offer) {
            Ok(observed) => observed,
            Err(e) => {
                metrics::record_observation("stale");
                return Err(e);
            }
        };
        metrics::record_observation("applied");

        if let Some(offer) = &observed.activated {
            metrics::record_action_activated(offer.kind);
            metrics::record_status(m.active_status());
        }
        if observed.confirmed {
            metrics::record_status(ActionStatus::Confirmed);
        }

        if let Some(offer) = m.needs_ledger_detail().cloned() {
            self.spawn_detail_fetch(machine.clone(), offer);
        }

        if self.config.auto_execute {
            if let Some(executor) = &self.executor {
                if let Some(detail) = m.ready_for_unattended_execution().cloned() {
                    m.begin_execution()?;
                    metrics::record_status(ActionStatus::TryingToExecute);
                    debug!(%href, action = detail.name(), "Executing unattended action");

                    tokio::spawn(execute_action(
                        executor.clone(),
                        machine.clone(),
                        detail,
                        Duration::from_millis(self.config.execution_timeout_ms),
                    ));
                }
            }
        }

        Ok(())
    }

    /// Fetch the ledger detail off the polling path
    fn spawn_detail_fetch(&self, machine: SharedMachine, offer: ActionOffer) {
        if !self.detail_fetches.insert(offer.handle.clone()) {
            return;
        }

        let source = self.source.clone();
        let in_flight = self.detail_fetches.clone();
        let fetch_timeout = Duration::from_millis(self.config.detail_fetch_timeout_ms);

        tokio::spawn(async move {
            fetch_ledger_detail(source, machine, &offer, fetch_timeout).await;
            in_flight.remove(&offer.handle);
        });
    }

    pub fn machine(&self, id: &str) -> Option<SharedMachine> {
        self.swaps.get(id).map(|m| m.clone())
    }

    fn require(&self, id: &str) -> TrackerResult<SharedMachine> {
        self.machine(id)
            .ok_or_else(|| TrackerError::SwapNotFound { id: id.to_string() })
    }

    /// Views of all tracked swaps, ordered by id
    pub async fn views(&self) -> Vec<SwapView> {
        let machines: Vec<SharedMachine> = self.swaps.iter().map(|e| e.value().clone()).collect();

        let mut views = Vec::with_capacity(machines.len());
        for machine in machines {
            views.push(machine.lock().await.view());
        }
        views.sort_by(|a, b| a.id.cmp(&b.id));
        views
    }

    pub async fn view(&self, id: &str) -> TrackerResult<SwapView> {
        Ok(self.require(id)?.lock().await.view())
    }

    /// The user started signing the active action
    pub async fn begin_execution(&self, id: &str) -> TrackerResult<SwapView> {
        let machine = self.require(id)?;
        let mut m = machine.lock().await;
        m.begin_execution()?;
        metrics::record_status(ActionStatus::TryingToExecute);
        Ok(m.view())
    }

    /// A wallet reports the transaction id of the active action
    pub async fn complete(&self, id: &str, tx_id: &str) -> TrackerResult<SwapView> {
        let machine = self.require(id)?;
        let mut m = machine.lock().await;
        m.completed(tx_id)?;
        metrics::record_status(ActionStatus::WaitingConfirmation);
        Ok(m.view())
    }

    /// A wallet reports that executing the active action failed
    pub async fn fail(&self, id: &str, reason: &str) -> TrackerResult<SwapView> {
        let machine = self.require(id)?;
        let mut m = machine.lock().await;
        m.execution_failed(reason)?;
        metrics::record_status(m.active_status());
        Ok(m.view())
    }

    pub fn tracked(&self) -> usize {
        self.swaps.len()
    }

    /// Stop the polling loop
    pub async fn stop(&self) {
        *self.shutdown.write().await = true;
        info!("Swap tracker shutdown initiated");
    }
}

async fn fetch_ledger_detail(
    source: Arc<dyn SwapSource>,
    machine: SharedMachine,
    offer: &ActionOffer,
    fetch_timeout: Duration,
) {
    let result = match timeout(fetch_timeout, source.fetch_ledger_action(&offer.handle)).await {
        Ok(result) => result,
        Err(_) => Err(TrackerError::Timeout {
            operation: format!("ledger action {}", offer.handle),
        }),
    };

    match result {
        Ok(detail) => {
            metrics::record_detail_fetch(true);
            let mut m = machine.lock().await;
            if m.ledger_detail_fetched(&offer.handle, detail) {
                debug!(swap = %m.id(), action = %offer, "Ledger action detail stored");
            }
        }
        Err(e) => {
            metrics::record_detail_fetch(false);
            warn!(action = %offer, "Ledger action detail unavailable, retrying next poll: {}", e);
        }
    }
}

async fn execute_action(
    executor: Arc<dyn ActionExecutor>,
    machine: SharedMachine,
    detail: LedgerAction,
    execution_timeout: Duration,
) {
    let result = match timeout(execution_timeout, executor.execute(&detail)).await {
        Ok(result) => result,
        Err(_) => Err(TrackerError::Timeout {
            operation: format!("executing {}", detail.name()),
        }),
    };

    let mut m = machine.lock().await;
    let outcome = match result {
        Ok(tx_id) => {
            metrics::record_execution(true);
            m.completed(tx_id)
        }
        Err(e) => {
            metrics::record_execution(false);
            m.execution_failed(&e.to_string())
        }
    };

    match outcome {
        Ok(()) => metrics::record_status(m.active_status()),
        Err(e) => warn!(swap = %m.id(), "Execution outcome not applied: {}", e),
    }
}
