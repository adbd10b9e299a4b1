//! Progress state machine for a single swap
//!
//! Reduces the stream of polled (events, offer) snapshots and the completion
//! reports of the executor into the swap's active step and action status.
//! The machine is synchronous and does no I/O; callers serialize access.

use super::action::{ActionOffer, ActionStatus, SeenActions};
use super::protocol::{EventSet, ProtocolOrdering, Role};
use super::steps::{self, SwapStep};
use crate::cnd::LedgerAction;
use crate::error::{TrackerError, TrackerResult};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

/// What an observation changed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Observed {
    /// Offer that became the active action
    pub activated: Option<ActionOffer>,
    /// The active action reached `Confirmed`
    pub confirmed: bool,
}

/// Per-swap progress state
#[derive(Debug, Clone)]
pub struct ProgressStateMachine {
    id: String,
    href: String,
    ordering: ProtocolOrdering,
    role: Role,
    events: EventSet,
    seen_actions: SeenActions,
    active_action: Option<ActionOffer>,
    active_status: ActionStatus,
    /// Status to return to if the executor fails
    resume_status: Option<ActionStatus>,
    active_tx_id: Option<String>,
    pending_ledger_detail: Option<LedgerAction>,
    updated_at: DateTime<Utc>,
}

impl ProgressStateMachine {
    pub fn new(href: impl Into<String>, ordering: ProtocolOrdering, role: Role) -> Self {
        let href = href.into();
        Self {
            id: swap_id(&href),
            href,
            ordering,
            role,
            events: EventSet::new(),
            seen_actions: SeenActions::new(),
            active_action: None,
            active_status: ActionStatus::NotReadyYet,
            resume_status: None,
            active_tx_id: None,
            pending_ledger_detail: None,
            updated_at: Utc::now(),
        }
    }

    /// Apply a polled snapshot.
    ///
    /// A snapshot that drops previously observed events is rejected with
    /// `StaleObservation` and leaves the state untouched.
    pub fn observe(
        &mut self,
        events: EventSet,
        offer: Option<ActionOffer>,
    ) -> TrackerResult<Observed> {
        let missing = events.missing_from(&self.events);
        if !missing.is_empty() {
            let missing = missing
                .iter()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            return Err(TrackerError::StaleObservation { missing });
        }

        let mut observed = Observed::default();

        if events != self.events {
            debug!(swap = %self.id, events = events.len(), "New events observed");
            self.events = events;
            self.touch();
        }

        if let Some(offer) = offer {
            if self.seen_actions.record(&offer) {
                info!(swap = %self.id, action = %offer, "New action offered");

                self.active_status = ActionStatus::initial(self.ordering, offer.kind);
                self.active_action = Some(offer.clone());
                self.resume_status = None;
                self.active_tx_id = None;
                self.pending_ledger_detail = None;
                self.touch();

                observed.activated = Some(offer);
            }
        }

        if self.active_status == ActionStatus::WaitingConfirmation {
            if let Some(action) = &self.active_action {
                let postcondition = action.kind.postcondition(self.ordering, self.role);
                if self.events.contains_event(&postcondition) {
                    info!(
                        swap = %self.id,
                        action = %action,
                        event = %postcondition,
                        "Action confirmed"
                    );
                    self.active_status = ActionStatus::Confirmed;
                    self.touch();
                    observed.confirmed = true;
                }
            }
        }

        Ok(observed)
    }

    /// Hand the active action to the executor
    pub fn begin_execution(&mut self) -> TrackerResult<()> {
        if self.active_action.is_none() || !self.active_status.can_begin_execution() {
            return Err(self.invalid("begin execution"));
        }

        self.resume_status = Some(self.active_status);
        self.active_status = ActionStatus::TryingToExecute;
        self.touch();
        Ok(())
    }

    /// Record the transaction id of the executed active action.
    ///
    /// Accepted from any non-terminal status since an external signer may
    /// complete the action without `begin_execution` having been called.
    pub fn completed(&mut self, tx_id: impl Into<String>) -> TrackerResult<()> {
        if self.active_action.is_none() || self.active_status.is_terminal() {
            return Err(self.invalid("complete"));
        }

        let tx_id = tx_id.into();
        if let Some(previous) = &self.active_tx_id {
            warn!(swap = %self.id, %previous, tx_id = %tx_id, "Replacing transaction id");
        }

        info!(swap = %self.id, tx_id = %tx_id, "Action completed, waiting for confirmation");
        self.active_tx_id = Some(tx_id);
        self.active_status = ActionStatus::WaitingConfirmation;
        self.resume_status = None;
        self.pending_ledger_detail = None;
        self.touch();
        Ok(())
    }

    /// The executor gave up; the action goes back to where it was before
    /// `begin_execution` so it can be retried.
    pub fn execution_failed(&mut self, reason: &str) -> TrackerResult<()> {
        if self.active_status != ActionStatus::TryingToExecute {
            return Err(self.invalid("fail execution"));
        }

        let resume = self
            .resume_status
            .take()
            .unwrap_or(ActionStatus::AwaitingUserInteraction);
        warn!(swap = %self.id, %reason, status = %resume, "Action execution failed");
        self.active_status = resume;
        self.touch();
        Ok(())
    }

    /// Store a fetched ledger detail. Details for an offer that is no longer
    /// the active action are dropped.
    pub fn ledger_detail_fetched(&mut self, handle: &str, detail: LedgerAction) -> bool {
        let current = self
            .active_action
            .as_ref()
            .map_or(false, |action| action.handle == handle);

        if !current || self.needs_ledger_detail().is_none() {
            debug!(swap = %self.id, %handle, "Dropping ledger detail for inactive action");
            return false;
        }

        self.pending_ledger_detail = Some(detail);
        self.touch();
        true
    }

    /// Active offer whose ledger detail is still missing
    pub fn needs_ledger_detail(&self) -> Option<&ActionOffer> {
        if self.pending_ledger_detail.is_some() || !self.active_status.wants_ledger_detail() {
            return None;
        }
        self.active_action.as_ref()
    }

    pub fn active_step(&self) -> Option<SwapStep> {
        steps::active_step(
            self.ordering,
            &self.events,
            self.active_action.as_ref().map(|a| a.kind),
        )
    }

    /// Active step is ours and waits for a wallet signature
    pub fn requires_user_interaction(&self) -> bool {
        self.active_step()
            .map_or(false, |step| step.actor() == self.role)
            && self.active_status == ActionStatus::AwaitingUserInteraction
    }

    /// Active action can run unattended right now. An action whose
    /// postcondition event is already on chain is never run again.
    pub fn ready_for_unattended_execution(&self) -> Option<&LedgerAction> {
        let action = self.active_action.as_ref()?;
        if self.active_status != ActionStatus::ReadyForExecution
            || self
                .events
                .contains_event(&action.kind.postcondition(self.ordering, self.role))
        {
            return None;
        }
        self.pending_ledger_detail
            .as_ref()
            .filter(|detail| detail.is_unattended())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn ordering(&self) -> ProtocolOrdering {
        self.ordering
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn events(&self) -> &EventSet {
        &self.events
    }

    pub fn seen_actions(&self) -> &SeenActions {
        &self.seen_actions
    }

    pub fn active_action(&self) -> Option<&ActionOffer> {
        self.active_action.as_ref()
    }

    pub fn active_status(&self) -> ActionStatus {
        self.active_status
    }

    pub fn active_tx_id(&self) -> Option<&str> {
        self.active_tx_id.as_deref()
    }

    pub fn pending_ledger_detail(&self) -> Option<&LedgerAction> {
        self.pending_ledger_detail.as_ref()
    }

    /// Snapshot for display
    pub fn view(&self) -> SwapView {
        let active_step = self.active_step();
        SwapView {
            id: self.id.clone(),
            href: self.href.clone(),
            role: self.role,
            ordering: self.ordering.to_string(),
            active_step: active_step.map(|s| s.to_string()),
            step_actor: active_step.map(|s| s.actor()),
            local_step: active_step.map_or(false, |s| s.actor() == self.role),
            awaiting_event: active_step
                .and_then(|s| s.postcondition(self.ordering))
                .map(|e| e.to_string()),
            requires_user_interaction: self.requires_user_interaction(),
            status: self.active_status,
            active_action: self.active_action.clone(),
            tx_id: self.active_tx_id.clone(),
            ledger_action: self.pending_ledger_detail.clone(),
            events: self.events.iter().map(|e| e.to_string()).collect(),
            seen_actions: self.seen_actions.iter().cloned().collect(),
            updated_at: self.updated_at,
        }
    }

    fn invalid(&self, operation: &str) -> TrackerError {
        TrackerError::InvalidTransition {
            from: self.active_status.to_string(),
            operation: operation.to_string(),
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Display snapshot of one swap
#[derive(Debug, Clone, Serialize)]
pub struct SwapView {
    pub id: String,
    pub href: String,
    pub role: Role,
    pub ordering: String,
    pub active_step: Option<String>,
    pub step_actor: Option<Role>,
    pub local_step: bool,
    /// Event that ends the active step
    pub awaiting_event: Option<String>,
    pub requires_user_interaction: bool,
    pub status: ActionStatus,
    pub active_action: Option<ActionOffer>,
    pub tx_id: Option<String>,
    pub ledger_action: Option<LedgerAction>,
    pub events: Vec<String>,
    pub seen_actions: Vec<ActionOffer>,
    pub updated_at: DateTime<Utc>,
}

/// Swap id is the last path segment of its href
pub fn swap_id(href: &str) -> String {
    href.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(href)
        .to_string()
}
