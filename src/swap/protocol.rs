//! Legs, observed events and the participant/ordering model of a swap

use crate::error::{TrackerError, TrackerResult};

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Ledger protocol of one swap leg
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Leg {
    /// Token-contract leg (deploy, then fund)
    Herc20,
    /// UTXO-HTLC leg (fund only)
    Hbit,
}

impl Leg {
    pub fn as_str(&self) -> &'static str {
        match self {
            Leg::Herc20 => "herc20",
            Leg::Hbit => "hbit",
        }
    }
}

impl FromStr for Leg {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "herc20" => Ok(Leg::Herc20),
            "hbit" => Ok(Leg::Hbit),
            other => Err(TrackerError::UnsupportedProtocol(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Deployed,
    Funded,
    Redeemed,
}

/// An on-chain occurrence on one leg, as reported by the coordination service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Event {
    pub leg: Leg,
    pub kind: EventKind,
}

impl Event {
    pub const fn new(leg: Leg, kind: EventKind) -> Self {
        Self { leg, kind }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            EventKind::Deployed => "deployed",
            EventKind::Funded => "funded",
            EventKind::Redeemed => "redeemed",
        };
        write!(f, "{}_{}", self.leg.as_str(), kind)
    }
}

impl FromStr for Event {
    type Err = TrackerError;

    /// Parse wire names such as `herc20_deployed` or `hbit_redeemed`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (leg, kind) = s
            .split_once('_')
            .ok_or_else(|| TrackerError::Payload(format!("malformed event name: {}", s)))?;

        let kind = match kind {
            "deployed" => EventKind::Deployed,
            "funded" => EventKind::Funded,
            "redeemed" => EventKind::Redeemed,
            other => {
                return Err(TrackerError::Payload(format!(
                    "unknown event kind: {}",
                    other
                )))
            }
        };

        Ok(Event::new(leg.parse()?, kind))
    }
}

/// Set of events observed for one swap. Duplicates collapse.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventSet(BTreeSet<Event>);

impl EventSet {
    pub fn new() -> Self {
        Self(BTreeSet::new())
    }

    pub fn contains(&self, leg: Leg, kind: EventKind) -> bool {
        self.0.contains(&Event::new(leg, kind))
    }

    pub fn contains_event(&self, event: &Event) -> bool {
        self.0.contains(event)
    }

    pub fn insert(&mut self, event: Event) -> bool {
        self.0.insert(event)
    }

    /// Events of `previous` that are absent from `self`
    pub fn missing_from(&self, previous: &EventSet) -> Vec<Event> {
        previous.0.difference(&self.0).copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Event> for EventSet {
    fn from_iter<I: IntoIterator<Item = Event>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Which leg settles first. Fixed for the lifetime of a swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProtocolOrdering {
    /// HERC20 is the alpha leg, HBIT the beta leg
    AlphaFirst,
    /// HBIT is the alpha leg, HERC20 the beta leg
    BetaFirst,
}

impl ProtocolOrdering {
    /// Derive the ordering from the protocol reported for the alpha leg
    pub fn from_alpha_protocol(protocol: &str) -> TrackerResult<Self> {
        match protocol.parse::<Leg>()? {
            Leg::Herc20 => Ok(ProtocolOrdering::AlphaFirst),
            Leg::Hbit => Ok(ProtocolOrdering::BetaFirst),
        }
    }

    pub fn alpha_leg(&self) -> Leg {
        match self {
            ProtocolOrdering::AlphaFirst => Leg::Herc20,
            ProtocolOrdering::BetaFirst => Leg::Hbit,
        }
    }

    pub fn beta_leg(&self) -> Leg {
        match self {
            ProtocolOrdering::AlphaFirst => Leg::Hbit,
            ProtocolOrdering::BetaFirst => Leg::Herc20,
        }
    }
}

impl fmt::Display for ProtocolOrdering {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolOrdering::AlphaFirst => write!(f, "herc20-hbit"),
            ProtocolOrdering::BetaFirst => write!(f, "hbit-herc20"),
        }
    }
}

/// Swap participant. Alice sends the alpha asset, Bob the beta asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Alice,
    Bob,
}

impl Role {
    pub fn sending_leg(&self, ordering: ProtocolOrdering) -> Leg {
        match self {
            Role::Alice => ordering.alpha_leg(),
            Role::Bob => ordering.beta_leg(),
        }
    }

    pub fn receiving_leg(&self, ordering: ProtocolOrdering) -> Leg {
        match self {
            Role::Alice => ordering.beta_leg(),
            Role::Bob => ordering.alpha_leg(),
        }
    }
}

impl FromStr for Role {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Alice" | "alice" => Ok(Role::Alice),
            "Bob" | "bob" => Ok(Role::Bob),
            other => Err(TrackerError::Payload(format!("unknown role: {}", other))),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Alice => write!(f, "Alice"),
            Role::Bob => write!(f, "Bob"),
        }
    }
}
