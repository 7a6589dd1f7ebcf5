// common/src/auth/issuer.rs
use crate::account::AccountHandle;
use crate::crypto::{encode_signature, KeyPair};
use crate::error::{Error, Result};
use crate::messages::SignedPayload;
use crate::models::{Finality, FreshnessToken};

/// Sign a block number the way every account key signs messages
pub fn sign_block_number(key_pair: &KeyPair, block_number: &str) -> FreshnessToken {
    let signature = key_pair.sign_message(block_number.as_bytes());
    FreshnessToken {
        block_number: block_number.to_string(),
        block_number_signature: encode_signature(&signature),
    }
}

/// Build a freshness token from the latest final block and the account's active key
pub async fn issue_token(account: &AccountHandle) -> Result<FreshnessToken> {
    // Resolve the key first so a missing signer never costs a chain call
    let key_pair = account.key_pair()?;
    let block = account
        .chain()
        .block(Finality::Final)
        .await
        .map_err(|e| Error::Connectivity(e.to_string()))?;

    let token = sign_block_number(&key_pair, &block.height.to_string());
    tracing::debug!(
        "Issued freshness token for {} at block {}",
        account.account_id(),
        token.block_number
    );
    Ok(token)
}

/// Authentication fields for a request made as `account` under `contract_name`
pub async fn signed_payload(account: &AccountHandle, contract_name: &str) -> Result<SignedPayload> {
    let token = issue_token(account).await?;
    Ok(SignedPayload::new(account.account_id(), contract_name, token))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::SandboxChain;
    use crate::crypto::{decode_signature, sha256};
    use crate::keystore::KeyStore;
    use crate::models::KeyScope;
    use std::sync::Arc;

    #[test]
    fn test_sign_block_number() {
        let key_pair = KeyPair::generate();
        let token = sign_block_number(&key_pair, "500");
        assert_eq!(token.block_number, "500");

        let signature = decode_signature(&token.block_number_signature).unwrap();
        assert_eq!(signature.len(), 64);
        assert!(key_pair.public_key().verify(&sha256(b"500"), &signature));
    }

    #[tokio::test]
    async fn test_issue_token_uses_current_height() {
        let chain = Arc::new(SandboxChain::new(1234));
        let keystore = Arc::new(KeyStore::new());
        keystore.set_active_key("sandbox", "alice.test", chain.create_account_with_key("alice.test"));
        let account = AccountHandle::new("alice.test", "sandbox", KeyScope::FullAccess, keystore, chain);

        let payload = signed_payload(&account, "").await.unwrap();
        assert_eq!(payload.block_number.as_deref(), Some("1234"));
        assert_eq!(payload.account_id.as_deref(), Some("alice.test"));
        assert_eq!(payload.contract_name.as_deref(), Some(""));
    }

    #[tokio::test]
    async fn test_unreachable_chain_fabricates_nothing() {
        let chain = Arc::new(SandboxChain::new(1));
        let keystore = Arc::new(KeyStore::new());
        keystore.set_active_key("sandbox", "alice.test", chain.create_account_with_key("alice.test"));
        chain.set_unreachable(true);
        let account = AccountHandle::new("alice.test", "sandbox", KeyScope::FullAccess, keystore, chain);

        let err = issue_token(&account).await.unwrap_err();
        assert!(matches!(err, Error::Connectivity(_)));
    }
}
