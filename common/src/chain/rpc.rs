// common/src/chain/rpc.rs
//! JSON-RPC client for a NEAR node.

use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use dashmap::DashMap;
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{AccountView, Action, ChainClient, ChainResult, Transaction, TxOutcome};
use crate::crypto::{KeyPair, PublicKey};
use crate::error::{ChainError, Error, Result};
use crate::models::{AccessKey, AccessKeyInfo, BlockRef, Finality};

/// Cause names the node uses for objects that do not exist
const UNKNOWN_ACCOUNT: &str = "UNKNOWN_ACCOUNT";
const UNKNOWN_ACCESS_KEY: &str = "UNKNOWN_ACCESS_KEY";
const CONTRACT_EXECUTION_ERROR: &str = "CONTRACT_EXECUTION_ERROR";
/// Cause names meaning the node could not serve the request right now
const UNAVAILABLE_CAUSES: &[&str] = &["TIMEOUT_ERROR", "NO_SYNCED_BLOCKS", "NOT_SYNCED_YET"];

/// Connection settings for the node
#[derive(Debug, Clone)]
pub struct RpcConfig {
    pub node_url: String,
    pub timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            node_url: "https://rpc.testnet.near.org".to_string(),
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug)]
pub struct RpcChainClient {
    http_client: Client,
    node_url: Url,
    /// Last nonce used per signer key, so concurrent transactions do not collide
    nonces: DashMap<String, u64>,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    cause: Option<RpcCause>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RpcCause {
    name: String,
    #[serde(default)]
    info: Value,
}

#[derive(Debug, Deserialize)]
struct BlockView {
    header: BlockHeader,
}

#[derive(Debug, Deserialize)]
struct BlockHeader {
    height: u64,
    hash: String,
}

#[derive(Debug, Deserialize)]
struct AccessKeyList {
    keys: Vec<AccessKeyInfo>,
}

#[derive(Debug, Deserialize)]
struct CallResult {
    result: Vec<u8>,
}

#[derive(Debug, Deserialize)]
struct FinalOutcome {
    status: Value,
    transaction: TransactionView,
}

#[derive(Debug, Deserialize)]
struct TransactionView {
    hash: String,
}

impl RpcChainClient {
    pub fn new(config: RpcConfig) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {e}")))?;
        let node_url = Url::parse(&config.node_url)
            .map_err(|e| Error::Config(format!("Invalid node url {}: {e}", config.node_url)))?;

        Ok(Self {
            http_client,
            node_url,
            nonces: DashMap::new(),
        })
    }

    fn next_nonce(&self, signer_id: &str, public_key: &PublicKey, chain_nonce: u64) -> u64 {
        let mut last = self
            .nonces
            .entry(format!("{signer_id}:{public_key}"))
            .or_insert(chain_nonce);
        *last = (*last).max(chain_nonce) + 1;
        *last
    }

    pub fn node_url(&self) -> &Url {
        &self.node_url
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> ChainResult<T> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": "dontcare",
            "method": method,
            "params": params,
        });

        tracing::debug!("RPC {} {}", method, self.node_url);
        let response: RpcResponse = self
            .http_client
            .post(self.node_url.clone())
            .json(&body)
            .send()
            .await?
            .json()
            .await?;

        if let Some(error) = response.error {
            return Err(classify_error(error));
        }

        let result = response
            .result
            .ok_or_else(|| ChainError::InvalidResponse(format!("{method} returned no result")))?;

        // Older nodes report query failures inside the result
        if let Some(message) = result.get("error").and_then(Value::as_str) {
            if message.contains("wasm execution failed") {
                return Err(ChainError::ContractExecution(message.to_string()));
            }
            return Err(ChainError::Rpc {
                name: "QUERY_ERROR".to_string(),
                cause: message.to_string(),
            });
        }

        Ok(serde_json::from_value(result)?)
    }

    async fn query<T: DeserializeOwned>(&self, request_type: &str, mut params: Value) -> ChainResult<T> {
        if let Some(object) = params.as_object_mut() {
            object.insert("request_type".to_string(), json!(request_type));
            object.insert("finality".to_string(), json!(Finality::Optimistic.as_str()));
        }
        self.call("query", params).await
    }
}

fn classify_error(error: RpcErrorBody) -> ChainError {
    let name = error.name.unwrap_or_else(|| "UNKNOWN_ERROR".to_string());
    let Some(cause) = error.cause else {
        let detail = error
            .data
            .map(|d| d.to_string())
            .or(error.message)
            .unwrap_or_default();
        return ChainError::Rpc { name, cause: detail };
    };

    match cause.name.as_str() {
        UNKNOWN_ACCOUNT => ChainError::NotFound(format!(
            "account {}",
            info_field(&cause.info, "requested_account_id")
        )),
        UNKNOWN_ACCESS_KEY => ChainError::NotFound(format!(
            "access key {}",
            info_field(&cause.info, "public_key")
        )),
        CONTRACT_EXECUTION_ERROR => ChainError::ContractExecution(
            cause
                .info
                .get("vm_error")
                .and_then(Value::as_str)
                .map(str::to_string)
                .or_else(|| error.data.map(|d| d.to_string()))
                .unwrap_or_else(|| CONTRACT_EXECUTION_ERROR.to_string()),
        ),
        c if UNAVAILABLE_CAUSES.contains(&c) => ChainError::Unavailable(c.to_string()),
        _ => ChainError::Rpc {
            name,
            cause: cause.name,
        },
    }
}

fn info_field<'a>(info: &'a Value, field: &str) -> &'a str {
    info.get(field).and_then(Value::as_str).unwrap_or("<unknown>")
}

/// Turn the final execution status of a transaction into an outcome or a typed error
fn parse_outcome(outcome: FinalOutcome) -> ChainResult<TxOutcome> {
    let transaction_hash = outcome.transaction.hash;

    if let Some(failure) = outcome.status.get("Failure") {
        let kind = failure.pointer("/ActionError/kind");
        if let Some(existing) = kind.and_then(|k| k.get("AddKeyAlreadyExists")) {
            return Err(ChainError::KeyAlreadyExists {
                public_key: info_field(existing, "public_key").to_string(),
            });
        }
        return Err(ChainError::TransactionFailed(failure.to_string()));
    }

    let value = match outcome.status.get("SuccessValue").and_then(Value::as_str) {
        Some(encoded) if !encoded.is_empty() => {
            let bytes = BASE64
                .decode(encoded)
                .map_err(|e| ChainError::InvalidResponse(format!("invalid SuccessValue: {e}")))?;
            Some(
                serde_json::from_slice(&bytes)
                    .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned())),
            )
        }
        _ => None,
    };

    Ok(TxOutcome {
        transaction_hash,
        value,
    })
}

#[async_trait]
impl ChainClient for RpcChainClient {
    async fn block(&self, finality: Finality) -> ChainResult<BlockRef> {
        let block: BlockView = self
            .call("block", json!({ "finality": finality.as_str() }))
            .await?;

        let hash: [u8; 32] = bs58::decode(&block.header.hash)
            .into_vec()
            .map_err(|e| ChainError::InvalidResponse(format!("invalid block hash: {e}")))?
            .try_into()
            .map_err(|_| ChainError::InvalidResponse("block hash is not 32 bytes".to_string()))?;

        Ok(BlockRef {
            height: block.header.height,
            hash,
        })
    }

    async fn view_account(&self, account_id: &str) -> ChainResult<AccountView> {
        self.query("view_account", json!({ "account_id": account_id }))
            .await
    }

    async fn access_keys(&self, account_id: &str) -> ChainResult<Vec<AccessKeyInfo>> {
        let list: AccessKeyList = self
            .query("view_access_key_list", json!({ "account_id": account_id }))
            .await?;
        Ok(list.keys)
    }

    async fn access_key(&self, account_id: &str, public_key: &PublicKey) -> ChainResult<AccessKey> {
        self.query(
            "view_access_key",
            json!({ "account_id": account_id, "public_key": public_key.to_string() }),
        )
        .await
    }

    async fn view_call(&self, contract_id: &str, method_name: &str, args: &Value) -> ChainResult<Value> {
        let args_base64 = BASE64.encode(serde_json::to_vec(args)?);
        let call: CallResult = self
            .query(
                "call_function",
                json!({
                    "account_id": contract_id,
                    "method_name": method_name,
                    "args_base64": args_base64,
                }),
            )
            .await?;

        if call.result.is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_slice(&call.result)?)
    }

    async fn send_transaction(
        &self,
        signer_id: &str,
        key_pair: &KeyPair,
        receiver_id: &str,
        actions: Vec<Action>,
    ) -> ChainResult<TxOutcome> {
        let public_key = key_pair.public_key();
        let access_key = self.access_key(signer_id, &public_key).await?;
        let block = self.block(Finality::Final).await?;
        let nonce = self.next_nonce(signer_id, &public_key, access_key.nonce);

        let signed = Transaction {
            signer_id: signer_id.to_string(),
            public_key,
            nonce,
            receiver_id: receiver_id.to_string(),
            block_hash: block.hash,
            actions,
        }
        .sign(key_pair)?;

        tracing::info!(
            "Broadcasting transaction {} from {} to {}",
            signed.hash(),
            signer_id,
            receiver_id
        );
        let outcome: FinalOutcome = self
            .call("broadcast_tx_commit", json!([signed.to_base64()?]))
            .await?;
        parse_outcome(outcome)
    }
}
