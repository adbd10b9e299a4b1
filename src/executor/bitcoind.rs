//! Broadcasts pre-signed bitcoin transactions through bitcoind's JSON-RPC

use super::ActionExecutor;
use crate::cnd::LedgerAction;
use crate::config::BitcoindConfig;
use crate::error::{TrackerError, TrackerResult};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

pub struct BitcoindExecutor {
    http: reqwest::Client,
    config: BitcoindConfig,
}

/// bitcoind's RPC_VERIFY_ALREADY_IN_CHAIN
const ALREADY_IN_CHAIN: i64 = -27;

#[derive(Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: &'static str,
    method: &'static str,
    params: [&'a str; 1],
}

#[derive(Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[derive(Deserialize)]
struct DecodedTransaction {
    txid: String,
}

impl BitcoindExecutor {
    pub fn new(config: BitcoindConfig) -> TrackerResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()?;

        Ok(Self { http, config })
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &'static str,
        param: &str,
    ) -> TrackerResult<Result<T, RpcError>> {
        let request = RpcRequest {
            jsonrpc: "1.0",
            id: "swap-tracker",
            method,
            params: [param],
        };

        let mut builder = self.http.post(&self.config.endpoint).json(&request);
        if let Some(username) = &self.config.username {
            builder = builder.basic_auth(username, self.config.password.as_ref());
        }

        // bitcoind answers RPC errors with a non-2xx status and a JSON body
        let response: RpcResponse<T> = builder.send().await?.json().await?;
        rpc_result(method, response)
    }

    /// Broadcast a signed transaction. A transaction bitcoind already has in
    /// the chain counts as broadcast; its txid is recovered by decoding it.
    async fn send_raw_transaction(&self, raw_tx: &str) -> TrackerResult<String> {
        match self.call::<String>("sendrawtransaction", raw_tx).await? {
            Ok(txid) => Ok(txid),
            Err(e) if e.code == ALREADY_IN_CHAIN => {
                let decoded = self
                    .call::<DecodedTransaction>("decoderawtransaction", raw_tx)
                    .await?
                    .map_err(|e| rpc_error("decoderawtransaction", e))?;
                warn!(txid = %decoded.txid, "Transaction already in the chain");
                Ok(decoded.txid)
            }
            Err(e) => Err(rpc_error("sendrawtransaction", e)),
        }
    }
}

#[async_trait]
impl ActionExecutor for BitcoindExecutor {
    async fn execute(&self, action: &LedgerAction) -> TrackerResult<String> {
        match action {
            LedgerAction::BitcoinBroadcastSignedTransaction { hex, network, .. } => {
                validate_raw_transaction(hex)?;
                let txid = self.send_raw_transaction(hex).await?;
                info!(%txid, %network, "Broadcast signed transaction");
                Ok(txid)
            }
            other => Err(TrackerError::Execution(format!(
                "{} requires a wallet signature",
                other.name()
            ))),
        }
    }
}

fn validate_raw_transaction(raw_tx: &str) -> TrackerResult<()> {
    let bytes = hex::decode(raw_tx)
        .map_err(|e| TrackerError::Execution(format!("invalid transaction hex: {}", e)))?;
    if bytes.is_empty() {
        return Err(TrackerError::Execution("empty transaction".to_string()));
    }
    Ok(())
}

/// Split an RPC response into its result or the RPC-level error
fn rpc_result<T>(
    method: &str,
    response: RpcResponse<T>,
) -> TrackerResult<Result<T, RpcError>> {
    if let Some(error) = response.error {
        return Ok(Err(error));
    }

    response
        .result
        .map(Ok)
        .ok_or_else(|| TrackerError::Execution(format!("bitcoind {} returned no result", method)))
}

fn rpc_error(method: &str, error: RpcError) -> TrackerError {
    TrackerError::Execution(format!(
        "bitcoind {} error {}: {}",
        method, error.code, error.message
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn executor() -> BitcoindExecutor {
        BitcoindExecutor::new(BitcoindConfig {
            endpoint: "http://127.0.0.1:18443".to_string(),
            username: Some("bitcoin".to_string()),
            password: Some("t68ej4UX2pB0cLlGwSwHFBLKxXYgomkXyFyxuBmm2U8=".to_string()),
            request_timeout_ms: 1_000,
        })
        .unwrap()
    }

    #[test]
    fn test_validate_raw_transaction() {
        assert!(validate_raw_transaction("0200000001").is_ok());
        assert!(validate_raw_transaction("").is_err());
        assert!(validate_raw_transaction("zz").is_err());
    }

    #[test]
    fn test_rpc_result() {
        let ok: RpcResponse<String> =
            serde_json::from_str(r#"{"result":"abcd","error":null,"id":"x"}"#).unwrap();
        assert_eq!(rpc_result("sendrawtransaction", ok).unwrap().unwrap(), "abcd");

        let rejected: RpcResponse<String> = serde_json::from_str(
            r#"{"result":null,"error":{"code":-26,"message":"mandatory-script-verify-flag-failed"},"id":"x"}"#,
        )
        .unwrap();
        let err = rpc_result("sendrawtransaction", rejected).unwrap().unwrap_err();
        assert_eq!(err.code, -26);
        assert!(rpc_error("sendrawtransaction", err).to_string().contains("-26"));

        let empty: RpcResponse<String> =
            serde_json::from_str(r#"{"result":null,"error":null,"id":"x"}"#).unwrap();
        assert!(rpc_result("sendrawtransaction", empty).is_err());
    }

    #[test]
    fn test_already_in_chain_is_distinguished() {
        let response: RpcResponse<String> = serde_json::from_str(
            r#"{"result":null,"error":{"code":-27,"message":"transaction already in block chain"},"id":"x"}"#,
        )
        .unwrap();
        let err = rpc_result("sendrawtransaction", response).unwrap().unwrap_err();
        assert_eq!(err.code, ALREADY_IN_CHAIN);

        let decoded: RpcResponse<DecodedTransaction> = serde_json::from_str(
            r#"{"result":{"txid":"5b1f3c","hash":"5b1f3c","version":2,"vin":[],"vout":[]},"error":null,"id":"x"}"#,
        )
        .unwrap();
        let tx = rpc_result("decoderawtransaction", decoded).unwrap().unwrap();
        assert_eq!(tx.txid, "5b1f3c");
    }

    /// Serves a bitcoind stand-in that already has every transaction
    async fn bitcoind_with_tx_in_chain() -> String {
        use axum::{http::StatusCode, routing::post, Json, Router};
        use serde_json::{json, Value};

        async fn rpc(Json(request): Json<Value>) -> (StatusCode, Json<Value>) {
            match request["method"].as_str() {
                Some("sendrawtransaction") => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({
                        "result": null,
                        "error": { "code": -27, "message": "transaction already in block chain" },
                        "id": request["id"],
                    })),
                ),
                Some("decoderawtransaction") => (
                    StatusCode::OK,
                    Json(json!({
                        "result": { "txid": "5b1f3c", "vin": [], "vout": [] },
                        "error": null,
                        "id": request["id"],
                    })),
                ),
                _ => (
                    StatusCode::NOT_FOUND,
                    Json(json!({
                        "result": null,
                        "error": { "code": -32601, "message": "Method not found" },
                        "id": request["id"],
                    })),
                ),
            }
        }

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, Router::new().route("/", post(rpc)))
                .await
                .unwrap();
        });
        format!("http://{}/", addr)
    }

    #[tokio::test]
    async fn test_rebroadcast_of_confirmed_transaction_returns_its_txid() {
        let executor = BitcoindExecutor::new(BitcoindConfig {
            endpoint: bitcoind_with_tx_in_chain().await,
            username: None,
            password: None,
            request_timeout_ms: 1_000,
        })
        .unwrap();

        let action = LedgerAction::BitcoinBroadcastSignedTransaction {
            hex: "0200000001".to_string(),
            network: "regtest".to_string(),
            min_median_block_time: None,
        };

        assert_eq!(executor.execute(&action).await.unwrap(), "5b1f3c");
    }

    #[tokio::test]
    async fn test_signature_required_actions_are_refused() {
        let action = LedgerAction::EthereumDeployContract {
            data: "0x6080".to_string(),
            amount: "0".to_string(),
            gas_limit: "0x3d090".to_string(),
            chain_id: 1337,
        };

        let err = executor().execute(&action).await.unwrap_err();
        assert!(matches!(err, TrackerError::Execution(_)));
    }

    #[tokio::test]
    async fn test_invalid_hex_is_refused_before_sending() {
        let action = LedgerAction::BitcoinBroadcastSignedTransaction {
            hex: "not-hex".to_string(),
            network: "regtest".to_string(),
            min_median_block_time: None,
        };

        let err = executor().execute(&action).await.unwrap_err();
        assert!(matches!(err, TrackerError::Execution(_)));
    }
}
