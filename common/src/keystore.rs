// common/src/keystore.rs
use std::fs;
use std::path::{Path, PathBuf};

use dashmap::DashMap;
use serde::Deserialize;

use crate::crypto::KeyPair;
use crate::error::{Error, Result};

/// Credentials file written by the chain CLI
#[derive(Debug, Deserialize)]
struct CredentialsFile {
    #[serde(default)]
    account_id: Option<String>,
    private_key: String,
}

/// Maps (network, account) to the key that currently signs for the account.
///
/// Shared by every handle built on it: switching the active key for an
/// account is visible to all later operations on that account. Callers must
/// not switch a key while another task is signing for the same account.
#[derive(Debug, Default)]
pub struct KeyStore {
    keys: DashMap<String, KeyPair>,
}

impl KeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(network_id: &str, account_id: &str) -> String {
        format!("{account_id}:{network_id}")
    }

    /// Make `key_pair` the active signer for `account_id`, returning the previous one
    pub fn set_active_key(&self, network_id: &str, account_id: &str, key_pair: KeyPair) -> Option<KeyPair> {
        tracing::debug!(
            "Active key for {} on {} set to {}",
            account_id,
            network_id,
            key_pair.public_key()
        );
        self.keys.insert(Self::slot(network_id, account_id), key_pair)
    }

    pub fn get_key(&self, network_id: &str, account_id: &str) -> Option<KeyPair> {
        self.keys
            .get(&Self::slot(network_id, account_id))
            .map(|entry| entry.value().clone())
    }

    pub fn remove_key(&self, network_id: &str, account_id: &str) -> Option<KeyPair> {
        self.keys
            .remove(&Self::slot(network_id, account_id))
            .map(|(_, key)| key)
    }

    /// Load `<dir>/<network>/<account>.json` into the store
    pub fn load_credentials(&self, dir: &Path, network_id: &str, account_id: &str) -> Result<KeyPair> {
        let path = credentials_path(dir, network_id, account_id);
        let content = fs::read_to_string(&path).map_err(|e| {
            Error::Config(format!("Failed to read credentials {}: {e}", path.display()))
        })?;
        let credentials: CredentialsFile = serde_json::from_str(&content).map_err(|e| {
            Error::Config(format!("Invalid credentials file {}: {e}", path.display()))
        })?;

        if let Some(file_account) = credentials.account_id.as_deref() {
            if file_account != account_id {
                return Err(Error::Config(format!(
                    "Credentials {} belong to {file_account}, expected {account_id}",
                    path.display()
                )));
            }
        }

        let key_pair: KeyPair = credentials.private_key.parse()?;
        tracing::info!("Loaded credentials for {} from {}", account_id, path.display());
        self.set_active_key(network_id, account_id, key_pair.clone());
        Ok(key_pair)
    }
}

pub fn credentials_path(dir: &Path, network_id: &str, account_id: &str) -> PathBuf {
    dir.join(network_id).join(format!("{account_id}.json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn temp_dir() -> PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("keystore-test-{}", Uuid::new_v4()));
        fs::create_dir_all(&path).unwrap();
        path
    }

    #[test]
    fn test_switching_active_key_is_visible() {
        let store = KeyStore::new();
        let first = KeyPair::generate();
        let second = KeyPair::generate();

        assert!(store.set_active_key("sandbox", "alice.test", first.clone()).is_none());
        let previous = store.set_active_key("sandbox", "alice.test", second.clone()).unwrap();
        assert_eq!(previous.public_key(), first.public_key());
        assert_eq!(
            store.get_key("sandbox", "alice.test").unwrap().public_key(),
            second.public_key()
        );
    }

    #[test]
    fn test_networks_are_isolated() {
        let store = KeyStore::new();
        store.set_active_key("testnet", "alice.test", KeyPair::generate());
        assert!(store.get_key("mainnet", "alice.test").is_none());
        assert!(store.remove_key("testnet", "alice.test").is_some());
        assert!(store.get_key("testnet", "alice.test").is_none());
    }

    #[test]
    fn test_load_credentials() {
        let dir = temp_dir();
        let key_pair = KeyPair::generate();
        fs::create_dir_all(dir.join("testnet")).unwrap();
        fs::write(
            credentials_path(&dir, "testnet", "contract.test"),
            serde_json::json!({
                "account_id": "contract.test",
                "public_key": key_pair.public_key().to_string(),
                "private_key": key_pair.secret_key(),
            })
            .to_string(),
        )
        .unwrap();

        let store = KeyStore::new();
        let loaded = store.load_credentials(&dir, "testnet", "contract.test").unwrap();
        assert_eq!(loaded.public_key(), key_pair.public_key());
        assert!(store.get_key("testnet", "contract.test").is_some());

        let err = store.load_credentials(&dir, "testnet", "other.test").unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        fs::remove_dir_all(dir).unwrap();
    }
}
