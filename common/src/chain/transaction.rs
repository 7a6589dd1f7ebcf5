// common/src/chain/transaction.rs
use std::io::{self, Write};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use borsh::BorshSerialize;
use serde_json::Value;

use crate::crypto::{sha256, KeyPair, PublicKey, TransactionSignature};
use crate::error::ChainError;
use crate::models::AccessKey;

/// Borsh tags of the action kinds, in the chain's declaration order
const FUNCTION_CALL_TAG: u8 = 2;
const ADD_KEY_TAG: u8 = 5;
const DELETE_KEY_TAG: u8 = 6;

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize)]
pub struct FunctionCallAction {
    pub method_name: String,
    pub args: Vec<u8>,
    pub gas: u64,
    pub deposit: u128,
}

/// Actions this crate submits
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    FunctionCall(FunctionCallAction),
    AddKey { public_key: PublicKey, access_key: AccessKey },
    DeleteKey { public_key: PublicKey },
}

impl Action {
    pub fn function_call(method_name: &str, args: &Value, gas: u64, deposit: u128) -> Result<Self, ChainError> {
        Ok(Action::FunctionCall(FunctionCallAction {
            method_name: method_name.to_string(),
            args: serde_json::to_vec(args)?,
            gas,
            deposit,
        }))
    }

    pub fn add_key(public_key: PublicKey, access_key: AccessKey) -> Self {
        Action::AddKey { public_key, access_key }
    }

    pub fn delete_key(public_key: PublicKey) -> Self {
        Action::DeleteKey { public_key }
    }
}

impl BorshSerialize for Action {
    fn serialize<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        match self {
            Action::FunctionCall(call) => {
                writer.write_all(&[FUNCTION_CALL_TAG])?;
                BorshSerialize::serialize(call, writer)
            }
            Action::AddKey { public_key, access_key } => {
                writer.write_all(&[ADD_KEY_TAG])?;
                BorshSerialize::serialize(public_key, writer)?;
                BorshSerialize::serialize(access_key, writer)
            }
            Action::DeleteKey { public_key } => {
                writer.write_all(&[DELETE_KEY_TAG])?;
                BorshSerialize::serialize(public_key, writer)
            }
        }
    }
}

#[derive(Debug, Clone, BorshSerialize)]
pub struct Transaction {
    pub signer_id: String,
    pub public_key: PublicKey,
    pub nonce: u64,
    pub receiver_id: String,
    pub block_hash: [u8; 32],
    pub actions: Vec<Action>,
}

impl Transaction {
    /// SHA-256 of the borsh encoding; this is what gets signed
    pub fn hash(&self) -> Result<[u8; 32], ChainError> {
        let bytes = borsh::to_vec(self)
            .map_err(|e| ChainError::InvalidResponse(format!("failed to encode transaction: {e}")))?;
        Ok(sha256(&bytes))
    }

    pub fn sign(self, key_pair: &KeyPair) -> Result<SignedTransaction, ChainError> {
        let hash = self.hash()?;
        let signature = TransactionSignature(key_pair.sign(&hash));
        Ok(SignedTransaction {
            transaction: self,
            signature,
            hash,
        })
    }
}

pub struct SignedTransaction {
    pub transaction: Transaction,
    signature: TransactionSignature,
    hash: [u8; 32],
}

impl SignedTransaction {
    /// Base58 transaction hash as shown by explorers
    pub fn hash(&self) -> String {
        bs58::encode(self.hash).into_string()
    }

    /// Borsh + base64 form expected by `broadcast_tx_commit`
    pub fn to_base64(&self) -> Result<String, ChainError> {
        let mut bytes = borsh::to_vec(&self.transaction)
            .map_err(|e| ChainError::InvalidResponse(format!("failed to encode transaction: {e}")))?;
        BorshSerialize::serialize(&self.signature, &mut bytes)
            .map_err(|e| ChainError::InvalidResponse(format!("failed to encode signature: {e}")))?;
        Ok(BASE64.encode(bytes))
    }
}
