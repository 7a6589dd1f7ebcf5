// common/src/models/token.rs
use serde::{Deserialize, Serialize};

/// Proof that the holder of an account key signed a recent block height
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FreshnessToken {
    /// Decimal string of the signed block height
    pub block_number: String,
    /// Base64 encoded ed25519 signature over sha256(block_number)
    pub block_number_signature: String,
}

/// Height and hash of a block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockRef {
    pub height: u64,
    pub hash: [u8; 32],
}

/// How settled a queried block must be
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Finality {
    /// Latest block seen by the node
    Optimistic,
    /// Block that can no longer be reverted
    Final,
}

impl Finality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Finality::Optimistic => "optimistic",
            Finality::Final => "final",
        }
    }
}
