//! Swap progress model
//!
//! - Legs, events, protocol ordering and roles
//! - Action offers, their status and the seen-offer history
//! - Step activation tables, one per protocol ordering
//! - The per-swap progress state machine

pub mod action;
pub mod machine;
pub mod protocol;
pub mod steps;

pub use action::{ActionKind, ActionOffer, ActionStatus, SeenActions};
pub use machine::{Observed, ProgressStateMachine, SwapView};
pub use protocol::{Event, EventKind, EventSet, Leg, ProtocolOrdering, Role};
pub use steps::SwapStep;
