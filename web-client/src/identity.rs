// web-client/src/identity.rs
use std::sync::Arc;

use chrono::Utc;
use common::chain::ChainClient;
use common::crypto::KeyPair;
use common::models::KeyScope;
use common::{AccountHandle, KeyStore};

use crate::backend::BackendClient;
use crate::error::{ClientError, Result};
use crate::seed::{generate_seed_phrase, implicit_account_id};
use crate::storage::{self, KeyValueStore, LocalKeys, LOCAL_KEYS};

/// The local user: an implicit account from a seed phrase plus an app key on the contract
pub struct Identity {
    backend: BackendClient,
    store: Arc<dyn KeyValueStore>,
    keystore: Arc<KeyStore>,
    chain: Arc<dyn ChainClient>,
    network_id: String,
}

impl Identity {
    pub fn new(
        backend: BackendClient,
        store: Arc<dyn KeyValueStore>,
        keystore: Arc<KeyStore>,
        chain: Arc<dyn ChainClient>,
        network_id: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            store,
            keystore,
            chain,
            network_id: network_id.into(),
        }
    }

    /// Stored keys, with the app key made the contract account's active signer
    pub async fn load(&self) -> Result<Option<LocalKeys>> {
        let keys: Option<LocalKeys> = storage::load(self.store.as_ref(), LOCAL_KEYS).await?;
        let Some(keys) = keys.filter(|k| !k.seed_phrase.is_empty()) else {
            return Ok(None);
        };

        let key_pair: KeyPair = keys.access_secret.parse()?;
        self.keystore
            .set_active_key(&self.network_id, self.backend.contract_name(), key_pair);
        Ok(Some(keys))
    }

    /// Generate a seed phrase and implicit account, then obtain and confirm an app key
    pub async fn new_account(&self) -> Result<LocalKeys> {
        let seed = generate_seed_phrase()?;
        let account_id = implicit_account_id(&seed.public_key());
        let key_pair = self.new_access_key().await?;

        let keys = LocalKeys {
            seed_phrase: seed.phrase,
            account_id,
            access_public: key_pair.public_key().to_string(),
            access_secret: key_pair.secret_key(),
            signed_in: true,
            created_at: Utc::now(),
        };
        storage::save(self.store.as_ref(), LOCAL_KEYS, &keys).await?;
        tracing::info!("Created implicit account {}", keys.account_id);
        Ok(keys)
    }

    /// Replace the stored app key with a newly issued one
    pub async fn refresh_access_key(&self) -> Result<LocalKeys> {
        let mut keys = self.load().await?.ok_or(ClientError::NotSignedIn)?;
        let key_pair = self.new_access_key().await?;

        keys.access_public = key_pair.public_key().to_string();
        keys.access_secret = key_pair.secret_key();
        storage::save(self.store.as_ref(), LOCAL_KEYS, &keys).await?;
        tracing::info!("Refreshed app key of {}", keys.account_id);
        Ok(keys)
    }

    /// Revoke every app key on the contract and forget the local account.
    ///
    /// This removes the keys of every user of the contract, not only ours.
    pub async fn remove_account(&self) -> Result<usize> {
        let revoked = self.backend.delete_access_keys().await?;
        self.store.delete(LOCAL_KEYS).await?;
        self.keystore
            .remove_key(&self.network_id, self.backend.contract_name());
        tracing::info!("Removed local account, {} keys revoked", revoked.len());
        Ok(revoked.len())
    }

    /// Contract account signing with the current app key
    pub fn app_account(&self) -> AccountHandle {
        let contract_name = self.backend.contract_name();
        AccountHandle::new(
            contract_name,
            self.network_id.clone(),
            KeyScope::Contract(contract_name.to_string()),
            self.keystore.clone(),
            self.chain.clone(),
        )
    }

    /// Have the backend add a fresh key, then prove it with a signed request
    async fn new_access_key(&self) -> Result<KeyPair> {
        let key_pair = KeyPair::generate();
        let public_key = key_pair.public_key();
        self.backend.add_key(&public_key).await?;

        let previous = self
            .keystore
            .set_active_key(&self.network_id, self.backend.contract_name(), key_pair.clone());

        let confirmed = self.backend.has_access_key(&self.app_account()).await;
        if let Ok(true) = confirmed {
            return Ok(key_pair);
        }

        // Keep signing with the old key if the new one is not usable
        match previous {
            Some(previous) => {
                self.keystore
                    .set_active_key(&self.network_id, self.backend.contract_name(), previous);
            }
            None => {
                self.keystore
                    .remove_key(&self.network_id, self.backend.contract_name());
            }
        }
        match confirmed {
            Err(e) => Err(e),
            Ok(_) => Err(ClientError::KeyNotConfirmed(public_key.to_string())),
        }
    }
}
