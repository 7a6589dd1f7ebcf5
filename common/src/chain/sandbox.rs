// common/src/chain/sandbox.rs
//! In-memory chain used by tests and local runs.
//!
//! Holds accounts with ordered key lists, enforces key permissions on
//! submitted transactions and records every transaction it accepts.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use serde_json::Value;

use super::{AccountView, Action, ChainClient, ChainResult, Transaction, TxOutcome};
use crate::crypto::{sha256, KeyPair, PublicKey};
use crate::error::ChainError;
use crate::models::{AccessKey, AccessKeyInfo, AccessKeyPermission, BlockRef, Finality};

#[derive(Debug, Clone, Default)]
struct SandboxAccount {
    keys: Vec<(PublicKey, AccessKey)>,
    amount: u128,
}

impl SandboxAccount {
    fn find_key(&self, public_key: &PublicKey) -> Option<&AccessKey> {
        self.keys.iter().find(|(k, _)| k == public_key).map(|(_, a)| a)
    }
}

/// A transaction accepted by the sandbox
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub signer_id: String,
    pub public_key: PublicKey,
    pub receiver_id: String,
    pub actions: Vec<Action>,
    pub transaction_hash: String,
}

impl RecordedCall {
    /// Method names of the FunctionCall actions in this transaction
    pub fn method_names(&self) -> Vec<&str> {
        self.actions
            .iter()
            .filter_map(|action| match action {
                Action::FunctionCall(call) => Some(call.method_name.as_str()),
                _ => None,
            })
            .collect()
    }

    /// JSON args of the first FunctionCall action
    pub fn args(&self) -> Option<Value> {
        self.actions.iter().find_map(|action| match action {
            Action::FunctionCall(call) => serde_json::from_slice(&call.args).ok(),
            _ => None,
        })
    }
}

#[derive(Debug, Default)]
pub struct SandboxChain {
    height: AtomicU64,
    accounts: DashMap<String, SandboxAccount>,
    view_results: DashMap<(String, String), Value>,
    view_panics: DashMap<(String, String), String>,
    failing_deletes: DashSet<PublicKey>,
    unreachable: AtomicBool,
    calls: Mutex<Vec<RecordedCall>>,
}

impl SandboxChain {
    pub fn new(height: u64) -> Self {
        let chain = Self::default();
        chain.set_height(height);
        chain
    }

    pub fn height(&self) -> u64 {
        self.height.load(Ordering::SeqCst)
    }

    pub fn set_height(&self, height: u64) {
        self.height.store(height, Ordering::SeqCst);
    }

    pub fn advance(&self, blocks: u64) -> u64 {
        self.height.fetch_add(blocks, Ordering::SeqCst) + blocks
    }

    pub fn create_account(&self, account_id: &str, amount: u128) {
        self.accounts
            .entry(account_id.to_string())
            .or_default()
            .amount = amount;
    }

    /// Register a key directly, creating the account if needed
    pub fn add_access_key(&self, account_id: &str, public_key: PublicKey, access_key: AccessKey) {
        let mut account = self.accounts.entry(account_id.to_string()).or_default();
        account.keys.retain(|(k, _)| *k != public_key);
        account.keys.push((public_key, access_key));
    }

    /// Register a fresh full access key and return it
    pub fn create_account_with_key(&self, account_id: &str) -> KeyPair {
        let key_pair = KeyPair::generate();
        self.add_access_key(account_id, key_pair.public_key(), AccessKey::full_access());
        key_pair
    }

    pub fn keys(&self, account_id: &str) -> Vec<AccessKeyInfo> {
        self.accounts
            .get(account_id)
            .map(|account| {
                account
                    .keys
                    .iter()
                    .map(|(public_key, access_key)| AccessKeyInfo {
                        public_key: public_key.to_string(),
                        access_key: access_key.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn has_key(&self, account_id: &str, public_key: &PublicKey) -> bool {
        self.accounts
            .get(account_id)
            .map(|account| account.find_key(public_key).is_some())
            .unwrap_or(false)
    }

    pub fn set_balance(&self, account_id: &str, amount: u128) {
        self.create_account(account_id, amount);
    }

    /// Value returned by `view_call(contract_id, method_name, _)`
    pub fn set_view_result(&self, contract_id: &str, method_name: &str, value: Value) {
        let call = (contract_id.to_string(), method_name.to_string());
        self.view_panics.remove(&call);
        self.view_results.insert(call, value);
    }

    /// Make `view_call(contract_id, method_name, _)` fail as a contract panic with `message`
    pub fn set_view_panic(&self, contract_id: &str, method_name: &str, message: &str) {
        let call = (contract_id.to_string(), method_name.to_string());
        self.view_results.remove(&call);
        self.view_panics.insert(call, message.to_string());
    }

    /// Make every DeleteKey action for `public_key` fail
    pub fn fail_delete_of(&self, public_key: PublicKey) {
        self.failing_deletes.insert(public_key);
    }

    /// Simulate the node being down
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn ensure_reachable(&self) -> ChainResult<()> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(ChainError::Unavailable("sandbox node is unreachable".to_string()));
        }
        Ok(())
    }

    fn block_hash(height: u64) -> [u8; 32] {
        sha256(&height.to_le_bytes())
    }
}

/// Reject actions a key's permission does not allow
fn check_permission(access_key: &AccessKey, signer_id: &str, receiver_id: &str, actions: &[Action]) -> ChainResult<()> {
    match &access_key.permission {
        AccessKeyPermission::FullAccess => {
            let touches_keys = actions
                .iter()
                .any(|a| matches!(a, Action::AddKey { .. } | Action::DeleteKey { .. }));
            if touches_keys && signer_id != receiver_id {
                return Err(ChainError::TransactionFailed(format!(
                    "{signer_id} cannot manage keys of {receiver_id}"
                )));
            }
            Ok(())
        }
        AccessKeyPermission::FunctionCall(permission) => {
            if permission.receiver_id != receiver_id {
                return Err(ChainError::TransactionFailed(format!(
                    "access key is restricted to {}, not {receiver_id}",
                    permission.receiver_id
                )));
            }
            for action in actions {
                let Action::FunctionCall(call) = action else {
                    return Err(ChainError::TransactionFailed(
                        "function call access key can only sign function calls".to_string(),
                    ));
                };
                if call.deposit > 0 {
                    return Err(ChainError::TransactionFailed(
                        "function call access key cannot attach a deposit".to_string(),
                    ));
                }
                if !permission.method_names.is_empty() && !permission.method_names.contains(&call.method_name) {
                    return Err(ChainError::TransactionFailed(format!(
                        "method {} is not allowed by the access key",
                        call.method_name
                    )));
                }
            }
            Ok(())
        }
    }
}

#[async_trait]
impl ChainClient for SandboxChain {
    async fn block(&self, _finality: Finality) -> ChainResult<BlockRef> {
        self.ensure_reachable()?;
        let height = self.height();
        Ok(BlockRef {
            height,
            hash: Self::block_hash(height),
        })
    }

    async fn view_account(&self, account_id: &str) -> ChainResult<AccountView> {
        self.ensure_reachable()?;
        let account = self
            .accounts
            .get(account_id)
            .ok_or_else(|| ChainError::NotFound(format!("account {account_id}")))?;
        Ok(AccountView {
            amount: account.amount,
            locked: 0,
            storage_usage: 0,
        })
    }

    async fn access_keys(&self, account_id: &str) -> ChainResult<Vec<AccessKeyInfo>> {
        self.ensure_reachable()?;
        if !self.accounts.contains_key(account_id) {
            return Err(ChainError::NotFound(format!("account {account_id}")));
        }
        Ok(self.keys(account_id))
    }

    async fn access_key(&self, account_id: &str, public_key: &PublicKey) -> ChainResult<AccessKey> {
        self.ensure_reachable()?;
        let account = self
            .accounts
            .get(account_id)
            .ok_or_else(|| ChainError::NotFound(format!("account {account_id}")))?;
        account
            .find_key(public_key)
            .cloned()
            .ok_or_else(|| ChainError::NotFound(format!("access key {public_key}")))
    }

    async fn view_call(&self, contract_id: &str, method_name: &str, _args: &Value) -> ChainResult<Value> {
        self.ensure_reachable()?;
        let call = (contract_id.to_string(), method_name.to_string());
        if let Some(message) = self.view_panics.get(&call) {
            return Err(ChainError::ContractExecution(format!(
                "Smart contract panicked: {}",
                message.value()
            )));
        }
        self.view_results
            .get(&call)
            .map(|value| value.clone())
            .ok_or_else(|| {
                ChainError::ContractExecution(format!("MethodNotFound: {contract_id}.{method_name}"))
            })
    }

    async fn send_transaction(
        &self,
        signer_id: &str,
        key_pair: &KeyPair,
        receiver_id: &str,
        actions: Vec<Action>,
    ) -> ChainResult<TxOutcome> {
        self.ensure_reachable()?;
        let public_key = key_pair.public_key();
        let access_key = self.access_key(signer_id, &public_key).await?;
        check_permission(&access_key, signer_id, receiver_id, &actions)?;

        let height = self.height();
        let signed = Transaction {
            signer_id: signer_id.to_string(),
            public_key,
            nonce: access_key.nonce + 1,
            receiver_id: receiver_id.to_string(),
            block_hash: Self::block_hash(height),
            actions: actions.clone(),
        }
        .sign(key_pair)?;
        let transaction_hash = signed.hash();

        {
            // Actions apply to a copy so a failing action leaves the account untouched
            let mut entry = self
                .accounts
                .get_mut(receiver_id)
                .ok_or_else(|| ChainError::NotFound(format!("account {receiver_id}")))?;
            let mut account = entry.value().clone();

            for action in &actions {
                match action {
                    Action::AddKey { public_key, access_key } => {
                        if account.find_key(public_key).is_some() {
                            return Err(ChainError::KeyAlreadyExists {
                                public_key: public_key.to_string(),
                            });
                        }
                        account.keys.push((*public_key, access_key.clone()));
                    }
                    Action::DeleteKey { public_key } => {
                        if self.failing_deletes.contains(public_key) {
                            return Err(ChainError::TransactionFailed(format!(
                                "DeleteKey {public_key} failed"
                            )));
                        }
                        if account.find_key(public_key).is_none() {
                            return Err(ChainError::TransactionFailed(format!(
                                "DeleteKeyDoesNotExist {public_key}"
                            )));
                        }
                        account.keys.retain(|(k, _)| k != public_key);
                    }
                    Action::FunctionCall(call) => {
                        account.amount = account.amount.saturating_add(call.deposit);
                    }
                }
            }

            *entry = account;
        }

        if let Some(mut signer) = self.accounts.get_mut(signer_id) {
            if let Some((_, key)) = signer.keys.iter_mut().find(|(k, _)| *k == public_key) {
                key.nonce += 1;
            }
        }

        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RecordedCall {
                signer_id: signer_id.to_string(),
                public_key,
                receiver_id: receiver_id.to_string(),
                actions,
                transaction_hash: transaction_hash.clone(),
            });

        tracing::debug!("Sandbox accepted {} from {}", transaction_hash, signer_id);
        Ok(TxOutcome {
            transaction_hash,
            value: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_height_controls() {
        let chain = SandboxChain::new(500);
        assert_eq!(chain.block(Finality::Final).await.unwrap().height, 500);
        assert_eq!(chain.advance(50), 550);
        chain.set_height(560);
        assert_eq!(chain.block(Finality::Optimistic).await.unwrap().height, 560);
    }

    #[tokio::test]
    async fn test_key_lookup_by_public_key() {
        let chain = SandboxChain::new(1);
        let owner = chain.create_account_with_key("alice.test");
        let stranger = KeyPair::generate().public_key();

        assert!(chain.has_key("alice.test", &owner.public_key()));
        assert!(!chain.has_key("alice.test", &stranger));
        assert!(!chain.has_key("ghost.test", &owner.public_key()));

        let key = chain.access_key("alice.test", &owner.public_key()).await.unwrap();
        assert!(key.permission.is_full_access());
        assert!(chain.access_key("alice.test", &stranger).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_unknown_account_is_not_found() {
        let chain = SandboxChain::new(1);
        let err = chain.access_keys("ghost.test").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_add_key_twice() {
        let chain = SandboxChain::new(1);
        let owner = chain.create_account_with_key("contract.test");
        let new_key = KeyPair::generate().public_key();
        let add = || Action::add_key(new_key, AccessKey::function_call("contract.test", vec![], None));

        chain
            .send_transaction("contract.test", &owner, "contract.test", vec![add()])
            .await
            .unwrap();
        let err = chain
            .send_transaction("contract.test", &owner, "contract.test", vec![add()])
            .await
            .unwrap_err();

        assert!(matches!(err, ChainError::KeyAlreadyExists { .. }));
        assert_eq!(chain.keys("contract.test").len(), 2);
        assert_eq!(chain.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_function_call_key_limits() {
        let chain = SandboxChain::new(1);
        let guest = KeyPair::generate();
        chain.add_access_key(
            "guests.contract.test",
            guest.public_key(),
            AccessKey::function_call("contract.test", vec!["mint".to_string()], None),
        );
        chain.create_account("contract.test", 0);

        let mint = Action::function_call("mint", &json!({}), 1, 0).unwrap();
        chain
            .send_transaction("guests.contract.test", &guest, "contract.test", vec![mint.clone()])
            .await
            .unwrap();

        let other_method = Action::function_call("withdraw", &json!({}), 1, 0).unwrap();
        assert!(chain
            .send_transaction("guests.contract.test", &guest, "contract.test", vec![other_method])
            .await
            .is_err());
        assert!(chain
            .send_transaction("guests.contract.test", &guest, "other.test", vec![mint])
            .await
            .is_err());

        let key = chain
            .access_key("guests.contract.test", &guest.public_key())
            .await
            .unwrap();
        assert_eq!(key.nonce, 1);
    }

    #[tokio::test]
    async fn test_unreachable() {
        let chain = SandboxChain::new(1);
        chain.set_unreachable(true);
        let err = chain.block(Finality::Final).await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_view_results() {
        let chain = SandboxChain::new(1);
        chain.set_view_result("contract.test", "get_balance", json!("5"));
        let value = chain
            .view_call("contract.test", "get_balance", &json!({}))
            .await
            .unwrap();
        assert_eq!(value, json!("5"));
        assert!(chain.view_call("contract.test", "missing", &json!({})).await.is_err());

        chain.set_view_panic("contract.test", "get_guest", "no guest");
        let err = chain
            .view_call("contract.test", "get_guest", &json!({}))
            .await
            .unwrap_err();
        assert!(err.is_contract_panic("no guest"));
    }
}
