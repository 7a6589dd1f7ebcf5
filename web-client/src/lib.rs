// web-client/src/lib.rs
//! Client side of the signed-request protocol: backend calls, the local
//! identity and its app key, and deposit tracking.

pub mod backend;
pub mod deposit;
pub mod error;
pub mod identity;
pub mod seed;
pub mod storage;

pub use backend::BackendClient;
pub use deposit::{DepositStatus, DepositWatcher};
pub use error::{ClientError, Result};
pub use identity::Identity;
pub use storage::{FileStore, KeyValueStore, LocalKeys, MemoryStore};
