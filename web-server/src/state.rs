// web-server/src/state.rs
use std::sync::Arc;

use common::auth::SignatureVerifier;
use common::chain::{ChainClient, RpcChainClient};
use common::delegation::{GuestRegistry, KeyIssuer, KeyRevoker};
use common::models::KeyScope;
use common::{AccountHandle, Config, KeyStore, Result};

/// Everything the handlers share; built once at startup
pub struct AppState {
    pub config: Config,
    pub chain: Arc<dyn ChainClient>,
    pub keystore: Arc<KeyStore>,
    pub verifier: SignatureVerifier,
    pub key_issuer: KeyIssuer,
    pub key_revoker: KeyRevoker,
    pub guests: GuestRegistry,
}

impl AppState {
    /// Wire the handlers to `chain`; signing keys must already be in `keystore`
    pub fn new(config: Config, chain: Arc<dyn ChainClient>, keystore: Arc<KeyStore>) -> Result<Self> {
        let contract_id = config.near.contract_name.clone();
        let network_id = config.near.network_id.clone();

        let owner = AccountHandle::new(
            contract_id.clone(),
            network_id.clone(),
            KeyScope::FullAccess,
            keystore.clone(),
            chain.clone(),
        )
        .with_gas(config.near.gas);
        let guest_holder = AccountHandle::new(
            config.guest_account_id(),
            network_id,
            KeyScope::FullAccess,
            keystore.clone(),
            chain.clone(),
        )
        .with_gas(config.near.gas);

        let key_issuer = KeyIssuer::new(
            owner.clone(),
            contract_id.clone(),
            config.contract_methods.change_methods.clone(),
        )
        .with_allowance(Some(config.allowance()?));
        let key_revoker = KeyRevoker::new(owner.clone(), contract_id);
        let guests = GuestRegistry::new(owner, guest_holder, config.guest_methods());
        let verifier = SignatureVerifier::new(chain.clone(), config.auth.valid_block_age);

        Ok(Self {
            config,
            chain,
            keystore,
            verifier,
            key_issuer,
            key_revoker,
            guests,
        })
    }

    /// Connect to the configured node and load the contract's credentials
    pub fn from_config(config: Config) -> Result<Self> {
        let chain: Arc<dyn ChainClient> = Arc::new(RpcChainClient::new(config.rpc_config())?);
        let keystore = Arc::new(KeyStore::new());
        let credentials_dir = config.credentials_dir();

        keystore.load_credentials(&credentials_dir, &config.near.network_id, &config.near.contract_name)?;

        let guest_account_id = config.guest_account_id();
        if let Err(e) = keystore.load_credentials(&credentials_dir, &config.near.network_id, &guest_account_id) {
            tracing::warn!("No credentials for guest account {}, /add-guest will fail: {}", guest_account_id, e);
        }

        Self::new(config, chain, keystore)
    }
}
