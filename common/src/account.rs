// common/src/account.rs
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::chain::{Action, ChainClient, TxOutcome};
use crate::crypto::{KeyPair, PublicKey};
use crate::error::{ChainError, Error, Result};
use crate::keystore::KeyStore;
use crate::models::{AccessKey, AccessKeyInfo, KeyScope};

/// 200 TGas, enough for every contract method the app calls
pub const DEFAULT_GAS: u64 = 200_000_000_000_000;

/// An account bound to one key scope.
///
/// Signing always uses whatever key the shared [`KeyStore`] currently holds
/// for the account, so switching the active key affects every handle on the
/// same account.
#[derive(Clone)]
pub struct AccountHandle {
    account_id: String,
    network_id: String,
    scope: KeyScope,
    gas: u64,
    keystore: Arc<KeyStore>,
    chain: Arc<dyn ChainClient>,
}

impl AccountHandle {
    pub fn new(
        account_id: impl Into<String>,
        network_id: impl Into<String>,
        scope: KeyScope,
        keystore: Arc<KeyStore>,
        chain: Arc<dyn ChainClient>,
    ) -> Self {
        Self {
            account_id: account_id.into(),
            network_id: network_id.into(),
            scope,
            gas: DEFAULT_GAS,
            keystore,
            chain,
        }
    }

    pub fn with_gas(mut self, gas: u64) -> Self {
        self.gas = gas;
        self
    }

    /// Same account and key store, different scope
    pub fn scoped(&self, scope: KeyScope) -> Self {
        Self {
            scope,
            ..self.clone()
        }
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    pub fn network_id(&self) -> &str {
        &self.network_id
    }

    pub fn scope(&self) -> &KeyScope {
        &self.scope
    }

    pub fn keystore(&self) -> &Arc<KeyStore> {
        &self.keystore
    }

    pub fn chain(&self) -> &Arc<dyn ChainClient> {
        &self.chain
    }

    /// Key currently bound to the account
    pub fn key_pair(&self) -> Result<KeyPair> {
        self.keystore
            .get_key(&self.network_id, &self.account_id)
            .ok_or_else(|| {
                ChainError::NoSigner {
                    account_id: self.account_id.clone(),
                    network_id: self.network_id.clone(),
                }
                .into()
            })
    }

    pub fn public_key(&self) -> Result<PublicKey> {
        Ok(self.key_pair()?.public_key())
    }

    /// Detached signature over the SHA-256 digest of `message`
    pub fn sign(&self, message: &[u8]) -> Result<[u8; 64]> {
        Ok(self.key_pair()?.sign_message(message))
    }

    pub async fn view_call(&self, contract_id: &str, method_name: &str, args: &Value) -> Result<Value> {
        Ok(self.chain.view_call(contract_id, method_name, args).await?)
    }

    /// Call a change method, refused locally when the handle's scope does not cover `receiver_id`
    pub async fn change_call(
        &self,
        receiver_id: &str,
        method_name: &str,
        args: &Value,
        deposit: u128,
    ) -> Result<TxOutcome> {
        if let KeyScope::Contract(contract) = &self.scope {
            if contract != receiver_id {
                return Err(self.scope_error(receiver_id));
            }
        }
        let action = Action::function_call(method_name, args, self.gas, deposit)?;
        self.send(receiver_id, vec![action]).await
    }

    pub async fn add_key(&self, public_key: PublicKey, access_key: AccessKey) -> Result<TxOutcome> {
        self.require_full_access()?;
        self.send(&self.account_id, vec![Action::add_key(public_key, access_key)])
            .await
    }

    pub async fn delete_key(&self, public_key: PublicKey) -> Result<TxOutcome> {
        self.require_full_access()?;
        self.send(&self.account_id, vec![Action::delete_key(public_key)])
            .await
    }

    pub async fn access_keys(&self) -> Result<Vec<AccessKeyInfo>> {
        Ok(self.chain.access_keys(&self.account_id).await?)
    }

    /// Whether `public_key` is registered on the account
    pub async fn has_key(&self, public_key: &PublicKey) -> Result<bool> {
        match self.chain.access_key(&self.account_id, public_key).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn send(&self, receiver_id: &str, actions: Vec<Action>) -> Result<TxOutcome> {
        let key_pair = self.key_pair()?;
        Ok(self
            .chain
            .send_transaction(&self.account_id, &key_pair, receiver_id, actions)
            .await?)
    }

    fn require_full_access(&self) -> Result<()> {
        match self.scope {
            KeyScope::FullAccess => Ok(()),
            KeyScope::Contract(_) => Err(self.scope_error(&self.account_id)),
        }
    }

    fn scope_error(&self, receiver_id: &str) -> Error {
        Error::Scope {
            scope: self.scope.to_string(),
            receiver_id: receiver_id.to_string(),
        }
    }
}

impl fmt::Debug for AccountHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountHandle")
            .field("account_id", &self.account_id)
            .field("network_id", &self.network_id)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

/// Whether an account with this id already exists on chain
pub async fn is_account_taken(chain: &dyn ChainClient, account_id: &str) -> Result<bool> {
    match chain.view_account(account_id).await {
        Ok(_) => Ok(true),
        Err(e) if e.is_not_found() => Ok(false),
        Err(e) => Err(e.into()),
    }
}
