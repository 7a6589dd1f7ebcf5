// common/src/auth/mod.rs
//! Signed block-height authentication.
//!
//! A client signs the decimal string of a recent block height with one of its
//! account keys; the backend checks that the height is recent and that one of
//! the account's keys in the requested scope produced the signature.

pub mod issuer;
pub mod verifier;

pub use issuer::{issue_token, sign_block_number, signed_payload};
pub use verifier::{check_freshness, SignatureVerifier, VerifiedAccount, DEFAULT_VALID_BLOCK_AGE};
