// common/src/models/guest.rs
use serde::{Deserialize, Serialize};

use crate::crypto::KeyPair;

/// Contract-side record of a guest, keyed by the guest's delegated public key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestRecord {
    pub account_id: String,
    #[serde(default)]
    pub mints: u8,
    #[serde(with = "crate::utils::u128_dec_format", default)]
    pub balance: u128,
}

/// Lifecycle of a delegated guest key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GuestState {
    Unregistered,
    Active,
    Upgraded,
}

/// Keys produced when a guest becomes a self-custodied account
#[derive(Debug, Clone)]
pub struct UpgradedGuest {
    pub account_id: String,
    /// New full access key, now the active signer for `account_id`
    pub full_access: KeyPair,
    /// Additional function call key registered for the app
    pub access_key: KeyPair,
}
