// common/src/auth/verifier.rs
use std::sync::Arc;

use crate::chain::ChainClient;
use crate::crypto::{decode_signature, sha256, PublicKey};
use crate::error::{Error, Result};
use crate::messages::{SignedParams, SignedPayload};
use crate::models::{Finality, KeyScope};

/// Blocks a signed height stays valid for
pub const DEFAULT_VALID_BLOCK_AGE: u64 = 100;

/// Identity established by a successfully verified request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedAccount {
    pub account_id: String,
    pub scope: KeyScope,
    pub block_height: u64,
    /// Key that produced the signature
    pub public_key: String,
}

/// Checks signed block-height tokens against the chain
#[derive(Clone)]
pub struct SignatureVerifier {
    chain: Arc<dyn ChainClient>,
    window: u64,
}

/// Accept `provided` only if `current - window < provided <= current`
pub fn check_freshness(provided: u64, current: u64, window: u64) -> Result<()> {
    let fresh = provided <= current && current - provided < window;
    if !fresh {
        return Err(Error::StaleOrFutureBlock {
            provided,
            current,
            window,
        });
    }
    Ok(())
}

impl SignatureVerifier {
    pub fn new(chain: Arc<dyn ChainClient>, window: u64) -> Self {
        Self { chain, window }
    }

    pub fn window(&self) -> u64 {
        self.window
    }

    /// Run presence, freshness and signature checks in that order
    pub async fn verify(&self, payload: &SignedPayload) -> Result<VerifiedAccount> {
        let params = payload.require()?;

        let current = self
            .chain
            .block(Finality::Optimistic)
            .await
            .map_err(|e| Error::Connectivity(e.to_string()))?
            .height;
        check_freshness(params.block_height, current, self.window)?;

        self.verify_signature(&params).await
    }

    /// Find a key of the account, within the requested scope, that signed the block number
    pub async fn verify_signature(&self, params: &SignedParams) -> Result<VerifiedAccount> {
        let rejected = || Error::InvalidSignature {
            account_id: params.account_id.clone(),
            block_number: params.block_number.clone(),
        };

        let signature = match decode_signature(&params.block_number_signature) {
            Ok(signature) => signature,
            Err(e) => {
                tracing::error!("Signature from {} could not be decoded: {}", params.account_id, e);
                return Err(rejected());
            }
        };

        let keys = match self.chain.access_keys(&params.account_id).await {
            Ok(keys) => keys,
            Err(e) => {
                tracing::error!("Failed to fetch access keys of {}: {}", params.account_id, e);
                return Err(rejected());
            }
        };

        let digest = sha256(params.block_number.as_bytes());
        for info in params.scope.filter(&keys) {
            let public_key = match info.public_key.parse::<PublicKey>() {
                Ok(key) => key,
                Err(e) => {
                    tracing::error!("Skipping malformed key {} of {}: {}", info.public_key, params.account_id, e);
                    continue;
                }
            };

            if public_key.verify(&digest, &signature) {
                return Ok(VerifiedAccount {
                    account_id: params.account_id.clone(),
                    scope: params.scope.clone(),
                    block_height: params.block_height,
                    public_key: info.public_key.clone(),
                });
            }
        }

        Err(rejected())
    }
}
