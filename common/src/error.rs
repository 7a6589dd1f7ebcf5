// common/src/error.rs
use thiserror::Error;

/// Errors raised by the chain capability layer
#[derive(Error, Debug)]
pub enum ChainError {
    /// The account, access key or other queried object does not exist
    #[error("{0} does not exist")]
    NotFound(String),

    /// AddKey action for a key the account already holds
    #[error("access key {public_key} is already added")]
    KeyAlreadyExists { public_key: String },

    /// No signing key is bound to the account
    #[error("no signer available for {account_id} on {network_id}")]
    NoSigner { account_id: String, network_id: String },

    /// Structured JSON-RPC error returned by the node
    #[error("RPC error {name}: {cause}")]
    Rpc { name: String, cause: String },

    /// View or function call aborted inside the contract, e.g. a panic
    #[error("contract execution failed: {0}")]
    ContractExecution(String),

    /// Transaction was executed but one of its actions failed
    #[error("transaction failed: {0}")]
    TransactionFailed(String),

    /// Node could not be reached
    #[error("chain node unavailable: {0}")]
    Unavailable(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl ChainError {
    /// Transport level failures that may succeed when retried
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ChainError::Http(_) | ChainError::Unavailable(_) | ChainError::InvalidResponse(_)
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ChainError::NotFound(_))
    }

    /// Contract panic whose message contains `message`
    pub fn is_contract_panic(&self, message: &str) -> bool {
        matches!(self, ChainError::ContractExecution(detail) if detail.contains(message))
    }
}

/// Protocol level errors shared by the issuer, verifier and key lifecycle
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed request: a required field is absent or unparseable
    #[error("{0}")]
    MissingParameter(String),

    /// Block height outside the accepted recency window
    #[error("You must provide a blockNumber within {window} of the most recent block; provided: {provided}, current: {current}")]
    StaleOrFutureBlock { provided: u64, current: u64, window: u64 },

    /// No candidate key verified the signature
    #[error("blockNumberSignature did not match a signature of blockNumber={block_number} from accountId={account_id}")]
    InvalidSignature { account_id: String, block_number: String },

    #[error("key is already added")]
    KeyAlreadyExists { public_key: String },

    /// Chain unreachable or no signer bound to the account
    #[error("chain connectivity error: {0}")]
    Connectivity(String),

    /// Bulk operation where some actions committed and at least one failed
    #[error("{failed} of {total} key deletions failed ({deleted} deleted): {message}", total = .deleted + .failed)]
    PartialFailure { deleted: usize, failed: usize, message: String },

    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Account handle used outside of the receiver it is scoped to
    #[error("handle scoped to {scope} cannot call {receiver_id}")]
    Scope { scope: String, receiver_id: String },

    #[error("storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Chain(ChainError),
}

impl From<ChainError> for Error {
    fn from(err: ChainError) -> Self {
        match err {
            ChainError::KeyAlreadyExists { public_key } => Error::KeyAlreadyExists { public_key },
            ChainError::Http(e) => Error::Connectivity(e.to_string()),
            ChainError::Unavailable(reason) => Error::Connectivity(reason),
            err @ ChainError::NoSigner { .. } => Error::Connectivity(err.to_string()),
            other => Error::Chain(other),
        }
    }
}

impl Error {
    /// Errors produced by the request gate before or during verification
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Error::MissingParameter(_)
                | Error::StaleOrFutureBlock { .. }
                | Error::InvalidSignature { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_already_exists_is_lifted() {
        let err: Error = ChainError::KeyAlreadyExists {
            public_key: "ed25519:abc".to_string(),
        }
        .into();
        assert!(matches!(err, Error::KeyAlreadyExists { .. }));
        assert_eq!(err.to_string(), "key is already added");
    }

    #[test]
    fn test_no_signer_is_connectivity() {
        let err: Error = ChainError::NoSigner {
            account_id: "alice.test".to_string(),
            network_id: "sandbox".to_string(),
        }
        .into();
        assert!(matches!(err, Error::Connectivity(_)));
    }

    #[test]
    fn test_stale_block_message() {
        let err = Error::StaleOrFutureBlock {
            provided: 500,
            current: 560,
            window: 100,
        };
        assert_eq!(
            err.to_string(),
            "You must provide a blockNumber within 100 of the most recent block; provided: 500, current: 560"
        );
        assert!(err.is_rejection());
    }

    #[test]
    fn test_partial_failure_message() {
        let err = Error::PartialFailure {
            deleted: 2,
            failed: 1,
            message: "boom".to_string(),
        };
        assert_eq!(err.to_string(), "1 of 3 key deletions failed (2 deleted): boom");
        assert!(!err.is_rejection());
    }

    #[test]
    fn test_retryable() {
        assert!(ChainError::InvalidResponse("x".into()).is_retryable());
        assert!(!ChainError::NotFound("account".into()).is_retryable());
        assert!(ChainError::NotFound("account".into()).is_not_found());
    }
}
