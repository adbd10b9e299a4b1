//! Coordination service (cnd) integration
//!
//! This module provides:
//! - The `SwapSource` seam the tracker polls through
//! - An HTTP implementation over cnd's siren API
//! - Ledger action payload types

pub mod client;
pub mod payload;
pub mod siren;

pub use client::{CndClient, SwapSource};
pub use payload::LedgerAction;
pub use siren::SwapSnapshot;

#[cfg(test)]
pub use client::MockSwapSource;
