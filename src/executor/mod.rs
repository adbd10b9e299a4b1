//! Execution of ledger actions
//!
//! Actions that need a wallet signature are executed outside the tracker
//! and reported back through the API; the executor here only handles what
//! can run unattended.

mod bitcoind;

pub use bitcoind::BitcoindExecutor;

use crate::cnd::LedgerAction;
use crate::error::TrackerResult;

use async_trait::async_trait;

/// Carries out a ledger action and returns the resulting transaction id
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    async fn execute(&self, action: &LedgerAction) -> TrackerResult<String>;
}
