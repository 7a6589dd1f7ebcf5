// common/src/chain/mod.rs
//! Capabilities the protocol consumes from the chain.
//!
//! `RpcChainClient` talks to a real node over JSON-RPC; `SandboxChain` keeps
//! accounts and keys in memory for tests and local runs.

pub mod rpc;
pub mod sandbox;
pub mod transaction;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::crypto::{KeyPair, PublicKey};
use crate::error::ChainError;
use crate::models::{AccessKey, AccessKeyInfo, BlockRef, Finality};

pub use rpc::{RpcChainClient, RpcConfig};
pub use sandbox::{RecordedCall, SandboxChain};
pub use transaction::{Action, FunctionCallAction, SignedTransaction, Transaction};

pub type ChainResult<T> = std::result::Result<T, ChainError>;

/// Account state relevant to the demo
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountView {
    #[serde(with = "crate::utils::u128_dec_format")]
    pub amount: u128,
    #[serde(with = "crate::utils::u128_dec_format", default)]
    pub locked: u128,
    #[serde(default)]
    pub storage_usage: u64,
}

/// Result of a committed transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TxOutcome {
    pub transaction_hash: String,
    /// JSON return value of the last action, if it returned one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Most recent block at the requested finality
    async fn block(&self, finality: Finality) -> ChainResult<BlockRef>;

    async fn view_account(&self, account_id: &str) -> ChainResult<AccountView>;

    /// Every access key registered to `account_id`
    async fn access_keys(&self, account_id: &str) -> ChainResult<Vec<AccessKeyInfo>>;

    async fn access_key(&self, account_id: &str, public_key: &PublicKey) -> ChainResult<AccessKey>;

    /// Read-only contract method
    async fn view_call(&self, contract_id: &str, method_name: &str, args: &Value) -> ChainResult<Value>;

    /// Sign `actions` with `key_pair` on behalf of `signer_id` and wait for the outcome
    async fn send_transaction(
        &self,
        signer_id: &str,
        key_pair: &KeyPair,
        receiver_id: &str,
        actions: Vec<Action>,
    ) -> ChainResult<TxOutcome>;
}
