pub mod account;
pub mod auth;
pub mod chain;
pub mod config;
pub mod crypto;
pub mod delegation;
pub mod error;
pub mod keystore;
pub mod messages;
pub mod models;
pub mod polling;
pub mod utils;

pub use account::{is_account_taken, AccountHandle};
pub use crate::config::*;
pub use error::{ChainError, Error, Result};
pub use keystore::KeyStore;
pub use messages::*;
pub use utils::*;
