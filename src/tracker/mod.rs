//! Swap tracking
//!
//! The tracker:
//! 1. Polls the coordination service for the swaps it lists
//! 2. Feeds each snapshot to that swap's progress state machine
//! 3. Fetches ledger action details off the polling path
//! 4. Executes unattended actions when enabled

pub mod engine;

pub use engine::SwapTracker;
