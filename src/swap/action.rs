//! Action offers, their execution status and the seen-offer history

use super::protocol::{Event, EventKind, ProtocolOrdering, Role};
use crate::error::TrackerError;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Deploy,
    Fund,
    Redeem,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Deploy => "deploy",
            ActionKind::Fund => "fund",
            ActionKind::Redeem => "redeem",
        }
    }

    /// Event that proves an action of this kind, taken by `role`, landed on chain
    pub fn postcondition(&self, ordering: ProtocolOrdering, role: Role) -> Event {
        match self {
            ActionKind::Deploy => Event::new(role.sending_leg(ordering), EventKind::Deployed),
            ActionKind::Fund => Event::new(role.sending_leg(ordering), EventKind::Funded),
            ActionKind::Redeem => Event::new(role.receiving_leg(ordering), EventKind::Redeemed),
        }
    }
}

impl FromStr for ActionKind {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "deploy" => Ok(ActionKind::Deploy),
            "fund" => Ok(ActionKind::Fund),
            "redeem" => Ok(ActionKind::Redeem),
            other => Err(TrackerError::Payload(format!("unknown action: {}", other))),
        }
    }
}

/// The next action the coordination service offers for a swap.
///
/// Two offers are the same offer iff kind and handle are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActionOffer {
    pub kind: ActionKind,
    /// Opaque href of the action resource
    pub handle: String,
}

impl ActionOffer {
    pub fn new(kind: ActionKind, handle: impl Into<String>) -> Self {
        Self {
            kind,
            handle: handle.into(),
        }
    }
}

impl fmt::Display for ActionOffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.kind.as_str(), self.handle)
    }
}

/// Progress of the currently active action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    NotReadyYet,
    /// Needs a wallet signature from the user
    AwaitingUserInteraction,
    /// Can be executed without the user
    ReadyForExecution,
    /// Handed to the executor, waiting for a transaction id
    TryingToExecute,
    /// Transaction sent, waiting for the event to show up
    WaitingConfirmation,
    Confirmed,
}

impl ActionStatus {
    /// Status a freshly offered action starts in
    pub fn initial(ordering: ProtocolOrdering, kind: ActionKind) -> Self {
        match (ordering, kind) {
            (ProtocolOrdering::AlphaFirst, ActionKind::Deploy | ActionKind::Fund) => {
                ActionStatus::AwaitingUserInteraction
            }
            (ProtocolOrdering::BetaFirst, ActionKind::Fund | ActionKind::Redeem) => {
                ActionStatus::AwaitingUserInteraction
            }
            _ => ActionStatus::ReadyForExecution,
        }
    }

    pub fn can_begin_execution(&self) -> bool {
        matches!(
            self,
            ActionStatus::AwaitingUserInteraction | ActionStatus::ReadyForExecution
        )
    }

    /// Whether the action still needs its ledger detail. A detail stays
    /// wanted while the action is being executed.
    pub fn wants_ledger_detail(&self) -> bool {
        matches!(
            self,
            ActionStatus::AwaitingUserInteraction
                | ActionStatus::ReadyForExecution
                | ActionStatus::TryingToExecute
        )
    }

    pub fn is_terminal(&self) -> bool {
        *self == ActionStatus::Confirmed
    }
}

impl fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActionStatus::NotReadyYet => "NotReadyYet",
            ActionStatus::AwaitingUserInteraction => "AwaitingUserInteraction",
            ActionStatus::ReadyForExecution => "ReadyForExecution",
            ActionStatus::TryingToExecute => "TryingToExecute",
            ActionStatus::WaitingConfirmation => "WaitingConfirmation",
            ActionStatus::Confirmed => "Confirmed",
        };
        f.write_str(name)
    }
}

/// Append-only log of every offer that was ever activated.
///
/// The coordination service keeps re-offering an action until it sees the
/// resulting transaction on chain; membership here is what prevents a
/// second activation of the same offer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeenActions(Vec<ActionOffer>);

impl SeenActions {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn contains(&self, offer: &ActionOffer) -> bool {
        self.0.iter().any(|seen| seen == offer)
    }

    /// Record an offer, returning false if it was already present
    pub fn record(&mut self, offer: &ActionOffer) -> bool {
        if self.contains(offer) {
            return false;
        }
        self.0.push(offer.clone());
        true
    }

    pub fn iter(&self) -> impl Iterator<Item = &ActionOffer> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
