// web-client/src/seed.rs
//! BIP-39 seed phrases and NEAR's SLIP-10 ed25519 key derivation.

use bip39::Mnemonic;
use common::crypto::{KeyPair, PublicKey};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha512;

use crate::error::{ClientError, Result};

type HmacSha512 = Hmac<Sha512>;

/// m/44'/397'/0', the path NEAR wallets derive the account key on
pub const NEAR_DERIVATION_PATH: [u32; 3] = [44, 397, 0];

const HARDENED_OFFSET: u32 = 0x8000_0000;
const ED25519_CURVE: &[u8] = b"ed25519 seed";

/// A seed phrase and the key pair it derives
#[derive(Clone)]
pub struct SeedPhrase {
    pub phrase: String,
    pub key_pair: KeyPair,
}

impl SeedPhrase {
    pub fn public_key(&self) -> PublicKey {
        self.key_pair.public_key()
    }
}

/// Fresh 12 word phrase
pub fn generate_seed_phrase() -> Result<SeedPhrase> {
    let mut entropy = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut entropy);
    let mnemonic = Mnemonic::from_entropy(&entropy).map_err(|e| ClientError::Seed(e.to_string()))?;
    seed_phrase_from(mnemonic)
}

/// Recover the key pair of an existing phrase; case and spacing are ignored
pub fn parse_seed_phrase(phrase: &str) -> Result<SeedPhrase> {
    let normalized = phrase
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ");
    let mnemonic = Mnemonic::parse(normalized.as_str()).map_err(|e| ClientError::Seed(e.to_string()))?;
    seed_phrase_from(mnemonic)
}

fn seed_phrase_from(mnemonic: Mnemonic) -> Result<SeedPhrase> {
    let seed = mnemonic.to_seed("");
    let secret = derive_ed25519(&seed, &NEAR_DERIVATION_PATH)?;
    Ok(SeedPhrase {
        phrase: mnemonic.to_string(),
        key_pair: KeyPair::from_seed(&secret),
    })
}

/// SLIP-10 ed25519 derivation; every index is hardened
pub fn derive_ed25519(seed: &[u8], path: &[u32]) -> Result<[u8; 32]> {
    let (mut key, mut chain_code) = split(hmac_sha512(ED25519_CURVE, &[seed])?);

    for index in path {
        let hardened = (index | HARDENED_OFFSET).to_be_bytes();
        (key, chain_code) = split(hmac_sha512(&chain_code, &[&[0u8][..], &key[..], &hardened[..]])?);
    }
    Ok(key)
}

fn hmac_sha512(key: &[u8], parts: &[&[u8]]) -> Result<[u8; 64]> {
    let mut mac = HmacSha512::new_from_slice(key).map_err(|e| ClientError::Seed(e.to_string()))?;
    for part in parts {
        mac.update(part);
    }
    let mut output = [0u8; 64];
    output.copy_from_slice(&mac.finalize().into_bytes());
    Ok(output)
}

fn split(output: [u8; 64]) -> ([u8; 32], [u8; 32]) {
    let mut key = [0u8; 32];
    let mut chain_code = [0u8; 32];
    key.copy_from_slice(&output[..32]);
    chain_code.copy_from_slice(&output[32..]);
    (key, chain_code)
}

/// Implicit account id: the hex encoded public key
pub fn implicit_account_id(public_key: &PublicKey) -> String {
    hex::encode(public_key.as_bytes())
}
