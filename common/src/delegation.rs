// common/src/delegation.rs
//! Delegated access keys: issuing, revoking and the guest lifecycle built on them.

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::account::AccountHandle;
use crate::chain::TxOutcome;
use crate::crypto::{KeyPair, PublicKey};
use crate::error::{Error, Result};
use crate::models::{AccessKey, GuestRecord, GuestState, KeyScope, UpgradedGuest};

/// Panic message of `get_guest` for a key with no guest
const NO_GUEST: &str = "no guest";

/// Default fee allowance of an issued key, 0.1 NEAR in yocto
pub const DEFAULT_ALLOWANCE: u128 = 100_000_000_000_000_000_000_000;

/// Account that holds guest keys for `contract_id`
pub fn guest_holder_account_id(contract_id: &str) -> String {
    format!("guests.{contract_id}")
}

/// Adds FunctionCall keys bound to one receiver onto the account it wraps
#[derive(Debug, Clone)]
pub struct KeyIssuer {
    account: AccountHandle,
    receiver_id: String,
    method_names: Vec<String>,
    allowance: Option<u128>,
}

impl KeyIssuer {
    pub fn new(account: AccountHandle, receiver_id: impl Into<String>, method_names: Vec<String>) -> Self {
        Self {
            account,
            receiver_id: receiver_id.into(),
            method_names,
            allowance: Some(DEFAULT_ALLOWANCE),
        }
    }

    /// `None` issues keys with an unlimited allowance
    pub fn with_allowance(mut self, allowance: Option<u128>) -> Self {
        self.allowance = allowance;
        self
    }

    pub fn account(&self) -> &AccountHandle {
        &self.account
    }

    pub fn receiver_id(&self) -> &str {
        &self.receiver_id
    }

    pub async fn issue(&self, public_key: &str) -> Result<TxOutcome> {
        let key: PublicKey = public_key.parse()?;
        let access_key = AccessKey::function_call(
            self.receiver_id.clone(),
            self.method_names.clone(),
            self.allowance,
        );

        match self.account.add_key(key, access_key).await {
            Ok(outcome) => {
                tracing::info!(
                    "Added key {} to {} for {}",
                    key,
                    self.account.account_id(),
                    self.receiver_id
                );
                Ok(outcome)
            }
            Err(err @ Error::KeyAlreadyExists { .. }) => {
                tracing::warn!("Key {} is already on {}", key, self.account.account_id());
                Err(err)
            }
            Err(err) => Err(err),
        }
    }
}

/// One deleted key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Revocation {
    pub public_key: String,
    pub transaction_hash: String,
}

/// Deletes every FunctionCall key bound to one receiver
#[derive(Debug, Clone)]
pub struct KeyRevoker {
    account: AccountHandle,
    receiver_id: String,
}

impl KeyRevoker {
    pub fn new(account: AccountHandle, receiver_id: impl Into<String>) -> Self {
        Self {
            account,
            receiver_id: receiver_id.into(),
        }
    }

    /// Delete all scoped keys concurrently; deletions that commit stay committed
    pub async fn revoke_all(&self) -> Result<Vec<Revocation>> {
        let keys = self.account.access_keys().await?;
        let scope = KeyScope::Contract(self.receiver_id.clone());

        let targets: Vec<PublicKey> = scope
            .filter(&keys)
            .into_iter()
            .filter_map(|info| match info.public_key.parse::<PublicKey>() {
                Ok(key) => Some(key),
                Err(e) => {
                    tracing::error!("Skipping malformed key {}: {}", info.public_key, e);
                    None
                }
            })
            .collect();

        let results = join_all(targets.into_iter().map(|key| async move {
            let result = self.account.delete_key(key).await;
            (key, result)
        }))
        .await;

        let mut deleted = Vec::new();
        let mut failures = Vec::new();
        for (key, result) in results {
            match result {
                Ok(outcome) => deleted.push(Revocation {
                    public_key: key.to_string(),
                    transaction_hash: outcome.transaction_hash,
                }),
                Err(e) => {
                    tracing::error!("Failed to delete key {}: {}", key, e);
                    failures.push(format!("{key}: {e}"));
                }
            }
        }

        tracing::info!(
            "Revoked {} keys for {} on {}",
            deleted.len(),
            self.receiver_id,
            self.account.account_id()
        );

        if !failures.is_empty() {
            return Err(Error::PartialFailure {
                deleted: deleted.len(),
                failed: failures.len(),
                message: failures.join("; "),
            });
        }
        Ok(deleted)
    }
}

/// Backend side of the guest lifecycle
#[derive(Debug, Clone)]
pub struct GuestRegistry {
    owner: AccountHandle,
    guest_issuer: KeyIssuer,
}

impl GuestRegistry {
    /// `owner` is the contract account itself, `guest_holder` the account guest keys live on
    pub fn new(owner: AccountHandle, guest_holder: AccountHandle, method_names: Vec<String>) -> Self {
        let guest_issuer = KeyIssuer::new(guest_holder, owner.account_id(), method_names);
        Self { owner, guest_issuer }
    }

    pub fn contract_id(&self) -> &str {
        self.owner.account_id()
    }

    pub fn guest_holder_id(&self) -> &str {
        self.guest_issuer.account().account_id()
    }

    /// Give the guest's key access to the contract and record the guest.
    ///
    /// A key left on the holder by an attempt whose record call failed is reused,
    /// so retrying completes the registration.
    pub async fn add_guest(&self, account_id: &str, public_key: &str) -> Result<TxOutcome> {
        match self.guest_issuer.issue(public_key).await {
            Ok(_) => {}
            Err(Error::KeyAlreadyExists { .. }) => {
                tracing::info!("Guest key {} already issued, recording {}", public_key, account_id);
            }
            Err(e) => return Err(e),
        }

        let outcome = self
            .owner
            .change_call(
                self.contract_id(),
                "add_guest",
                &json!({ "account_id": account_id, "public_key": public_key }),
                0,
            )
            .await?;
        tracing::info!("Registered guest {} with key {}", account_id, public_key);
        Ok(outcome)
    }

    /// `None` when the contract has no guest for `public_key`
    pub async fn get_guest(&self, public_key: &str) -> Result<Option<GuestRecord>> {
        let value = self
            .owner
            .view_call(self.contract_id(), "get_guest", &json!({ "public_key": public_key }))
            .await;
        parse_guest(value)
    }

    /// Remove every guest key from the holder account
    pub async fn revoke_all_guests(&self) -> Result<Vec<Revocation>> {
        KeyRevoker::new(self.guest_issuer.account().clone(), self.contract_id())
            .revoke_all()
            .await
    }
}

/// The contract panics with "no guest" for unknown keys; a null result means the same
fn parse_guest(value: Result<Value>) -> Result<Option<GuestRecord>> {
    let value = match value {
        Ok(value) => value,
        Err(Error::Chain(err)) if err.is_contract_panic(NO_GUEST) => return Ok(None),
        Err(e) => return Err(e),
    };
    if value.is_null() {
        return Ok(None);
    }
    serde_json::from_value(value)
        .map(Some)
        .map_err(|e| Error::Chain(e.into()))
}

/// Client side of the guest lifecycle: acts on the contract through the holder account
#[derive(Debug, Clone)]
pub struct GuestSession {
    holder: AccountHandle,
    contract_id: String,
    guest_account_id: String,
    state: GuestState,
}

impl GuestSession {
    /// Make `guest_key` the active signer of the holder account and scope it to the contract
    pub fn activate(
        holder: &AccountHandle,
        contract_id: &str,
        guest_account_id: &str,
        guest_key: KeyPair,
    ) -> Self {
        holder
            .keystore()
            .set_active_key(holder.network_id(), holder.account_id(), guest_key);

        Self {
            holder: holder.scoped(KeyScope::Contract(contract_id.to_string())),
            contract_id: contract_id.to_string(),
            guest_account_id: guest_account_id.to_string(),
            state: GuestState::Active,
        }
    }

    pub fn state(&self) -> GuestState {
        self.state
    }

    pub fn guest_account_id(&self) -> &str {
        &self.guest_account_id
    }

    pub fn public_key(&self) -> Result<PublicKey> {
        self.holder.public_key()
    }

    /// Scoped change call on the contract
    pub async fn call(&self, method_name: &str, args: &Value) -> Result<TxOutcome> {
        self.call_contract(&self.contract_id, method_name, args).await
    }

    /// Change call on an explicit receiver; refused locally unless it is the contract
    pub async fn call_contract(&self, receiver_id: &str, method_name: &str, args: &Value) -> Result<TxOutcome> {
        self.holder.change_call(receiver_id, method_name, args, 0).await
    }

    pub async fn view(&self, method_name: &str, args: &Value) -> Result<Value> {
        self.holder.view_call(&self.contract_id, method_name, args).await
    }

    /// The contract's record for this guest key
    pub async fn record(&self) -> Result<Option<GuestRecord>> {
        let public_key = self.public_key()?.to_string();
        let value = self
            .view("get_guest", &json!({ "public_key": public_key }))
            .await;
        parse_guest(value)
    }

    /// Check whether the guest key is still on chain; a revoked key makes the guest Unregistered
    pub async fn refresh_state(&mut self) -> Result<GuestState> {
        if self.state == GuestState::Active && !self.holder.has_key(&self.public_key()?).await? {
            tracing::info!("Guest key of {} is gone, guest is unregistered", self.guest_account_id);
            self.state = GuestState::Unregistered;
        }
        Ok(self.state)
    }

    /// Turn the guest into a self-custodied account
    pub async fn upgrade(&mut self) -> Result<UpgradedGuest> {
        let full_access = KeyPair::generate();
        let access_key = KeyPair::generate();

        self.call(
            "upgrade_guest",
            &json!({
                "public_key": full_access.public_key().to_string(),
                "access_key": access_key.public_key().to_string(),
                "method_names": "",
            }),
        )
        .await?;

        self.holder.keystore().set_active_key(
            self.holder.network_id(),
            &self.guest_account_id,
            full_access.clone(),
        );
        self.state = GuestState::Upgraded;
        tracing::info!("Guest {} upgraded to a full account", self.guest_account_id);

        Ok(UpgradedGuest {
            account_id: self.guest_account_id.clone(),
            full_access,
            access_key,
        })
    }

    /// Full access handle on the guest's own account, usable after [`GuestSession::upgrade`]
    pub fn own_account(&self) -> AccountHandle {
        AccountHandle::new(
            self.guest_account_id.clone(),
            self.holder.network_id(),
            KeyScope::FullAccess,
            self.holder.keystore().clone(),
            self.holder.chain().clone(),
        )
    }
}
