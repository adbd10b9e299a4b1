//! Ledger action payloads returned by an action href

use serde::{Deserialize, Serialize};

/// What the wallet has to do to carry out an offered action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "kebab-case")]
pub enum LedgerAction {
    BitcoinSendAmountToAddress {
        to: String,
        amount: String,
        network: String,
    },
    BitcoinBroadcastSignedTransaction {
        hex: String,
        network: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min_median_block_time: Option<u64>,
    },
    EthereumDeployContract {
        data: String,
        amount: String,
        gas_limit: String,
        chain_id: u64,
    },
    EthereumCallContract {
        contract_address: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<String>,
        gas_limit: String,
        chain_id: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min_block_timestamp: Option<u64>,
    },
}

impl LedgerAction {
    pub fn name(&self) -> &'static str {
        match self {
            LedgerAction::BitcoinSendAmountToAddress { .. } => "bitcoin-send-amount-to-address",
            LedgerAction::BitcoinBroadcastSignedTransaction { .. } => {
                "bitcoin-broadcast-signed-transaction"
            }
            LedgerAction::EthereumDeployContract { .. } => "ethereum-deploy-contract",
            LedgerAction::EthereumCallContract { .. } => "ethereum-call-contract",
        }
    }

    /// Whether the action can be carried out without a wallet signature
    pub fn is_unattended(&self) -> bool {
        matches!(self, LedgerAction::BitcoinBroadcastSignedTransaction { .. })
    }
}
