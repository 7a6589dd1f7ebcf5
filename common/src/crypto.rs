// common/src/crypto.rs
use std::fmt;
use std::io::{self, Write};
use std::str::FromStr;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use borsh::BorshSerialize;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// Curve prefix used in the chain's textual key format
pub const ED25519_PREFIX: &str = "ed25519:";

/// Borsh tag of the ed25519 key type in transactions
const ED25519_KEY_TYPE: u8 = 0;

/// SHA-256 digest of arbitrary bytes
pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// Ed25519 public key in `ed25519:<base58>` form
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKey([u8; 32]);

impl PublicKey {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Verify a detached signature over `message`
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> bool {
        let Ok(verifying_key) = VerifyingKey::from_bytes(&self.0) else {
            return false;
        };
        let Ok(signature) = Signature::from_slice(signature) else {
            return false;
        };
        verifying_key.verify(message, &signature).is_ok()
    }
}

impl FromStr for PublicKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let data = s.strip_prefix(ED25519_PREFIX).unwrap_or(s);
        if data.contains(':') {
            return Err(Error::InvalidKey(format!("unsupported key type in {s}")));
        }
        let bytes = bs58::decode(data)
            .into_vec()
            .map_err(|e| Error::InvalidKey(format!("invalid base58 public key: {e}")))?;
        let bytes: [u8; 32] = bytes.try_into().map_err(|b: Vec<u8>| {
            Error::InvalidKey(format!("expected 32 byte public key, got {}", b.len()))
        })?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", ED25519_PREFIX, bs58::encode(self.0).into_string())
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({self})")
    }
}

impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl BorshSerialize for PublicKey {
    fn serialize<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&[ED25519_KEY_TYPE])?;
        writer.write_all(&self.0)
    }
}

/// Ed25519 key pair in `ed25519:<base58 secret||public>` form
#[derive(Clone)]
pub struct KeyPair {
    signing_key: SigningKey,
}

impl KeyPair {
    /// Generate a new random keypair
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Create a keypair from a 32 byte seed
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.signing_key.verifying_key().to_bytes())
    }

    /// Detached signature over raw bytes
    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.signing_key.sign(message).to_bytes()
    }

    /// Sign the SHA-256 digest of `message`, the way chain signers sign messages
    pub fn sign_message(&self, message: &[u8]) -> [u8; 64] {
        self.sign(&sha256(message))
    }

    /// Secret in the 64 byte `secret||public` layout used by key files
    pub fn secret_key(&self) -> String {
        format!(
            "{}{}",
            ED25519_PREFIX,
            bs58::encode(self.signing_key.to_keypair_bytes()).into_string()
        )
    }
}

impl FromStr for KeyPair {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let data = s.strip_prefix(ED25519_PREFIX).unwrap_or(s);
        let bytes = bs58::decode(data)
            .into_vec()
            .map_err(|e| Error::InvalidKey(format!("invalid base58 secret key: {e}")))?;

        let signing_key = match bytes.len() {
            64 => {
                let mut keypair_bytes = [0u8; 64];
                keypair_bytes.copy_from_slice(&bytes);
                SigningKey::from_keypair_bytes(&keypair_bytes)
                    .map_err(|e| Error::InvalidKey(format!("inconsistent keypair bytes: {e}")))?
            }
            32 => {
                let mut seed = [0u8; 32];
                seed.copy_from_slice(&bytes);
                SigningKey::from_bytes(&seed)
            }
            len => {
                return Err(Error::InvalidKey(format!(
                    "expected 32 or 64 byte secret key, got {len}"
                )))
            }
        };

        Ok(Self { signing_key })
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key())
            .finish_non_exhaustive()
    }
}

/// Borsh form of an ed25519 signature inside a signed transaction
pub(crate) struct TransactionSignature(pub [u8; 64]);

impl BorshSerialize for TransactionSignature {
    fn serialize<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&[ED25519_KEY_TYPE])?;
        writer.write_all(&self.0)
    }
}

pub fn encode_signature(signature: &[u8]) -> String {
    BASE64.encode(signature)
}

pub fn decode_signature(signature: &str) -> Result<Vec<u8>> {
    BASE64
        .decode(signature.trim())
        .map_err(|e| Error::InvalidKey(format!("invalid base64 signature: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_key_roundtrip_string() {
        let key = KeyPair::generate().public_key();
        let text = key.to_string();
        assert!(text.starts_with("ed25519:"));
        assert_eq!(text.parse::<PublicKey>().unwrap(), key);
    }

    #[test]
    fn test_public_key_without_prefix() {
        let key = KeyPair::from_seed(&[7u8; 32]).public_key();
        let bare = bs58::encode(key.as_bytes()).into_string();
        assert_eq!(bare.parse::<PublicKey>().unwrap(), key);
    }

    #[test]
    fn test_rejects_other_curves() {
        let err = "secp256k1:abc".parse::<PublicKey>().unwrap_err();
        assert!(matches!(err, Error::InvalidKey(_)));
    }

    #[test]
    fn test_rejects_short_key() {
        assert!("ed25519:1111".parse::<PublicKey>().is_err());
    }

    #[test]
    fn test_secret_key_roundtrip() {
        let pair = KeyPair::generate();
        let restored: KeyPair = pair.secret_key().parse().unwrap();
        assert_eq!(restored.public_key(), pair.public_key());
    }

    #[test]
    fn test_seed_secret_key() {
        let seed = [3u8; 32];
        let encoded = format!("ed25519:{}", bs58::encode(seed).into_string());
        let pair: KeyPair = encoded.parse().unwrap();
        assert_eq!(pair.public_key(), KeyPair::from_seed(&seed).public_key());
    }

    #[test]
    fn test_sign_message_hashes_first() {
        let pair = KeyPair::generate();
        let signature = pair.sign_message(b"500");
        let key = pair.public_key();
        assert!(key.verify(&sha256(b"500"), &signature));
        assert!(!key.verify(b"500", &signature));
    }

    #[test]
    fn test_borsh_public_key_layout() {
        let key = KeyPair::from_seed(&[1u8; 32]).public_key();
        let bytes = borsh::to_vec(&key).unwrap();
        assert_eq!(bytes.len(), 33);
        assert_eq!(bytes[0], 0);
        assert_eq!(&bytes[1..], key.as_bytes());
    }

    #[test]
    fn test_signature_base64() {
        let pair = KeyPair::generate();
        let encoded = encode_signature(&pair.sign(b"x"));
        assert_eq!(decode_signature(&encoded).unwrap().len(), 64);
        assert!(decode_signature("not base64!").is_err());
    }
}
