// web-client/src/error.rs
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered with `{ "error": ... }`
    #[error("backend rejected request ({status}): {message}")]
    Backend { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid backend url: {0}")]
    InvalidUrl(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("seed phrase error: {0}")]
    Seed(String),

    /// The backend accepted the key but a signed request with it was refused
    #[error("access key {0} could not be confirmed")]
    KeyNotConfirmed(String),

    #[error("no local account, create one first")]
    NotSignedIn,

    #[error(transparent)]
    Core(#[from] common::Error),
}

impl ClientError {
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Http(e) => e.is_timeout() || e.is_connect(),
            ClientError::Backend { status, .. } => *status >= 500,
            ClientError::Core(common::Error::Connectivity(_)) => true,
            _ => false,
        }
    }

    /// Request refused by the signature gate or a handler
    pub fn is_forbidden(&self) -> bool {
        matches!(self, ClientError::Backend { status: 403, .. })
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        let forbidden = ClientError::Backend {
            status: 403,
            message: "key is already added".to_string(),
        };
        assert!(forbidden.is_forbidden());
        assert!(!forbidden.is_retryable());

        let unavailable = ClientError::Backend {
            status: 503,
            message: "down".to_string(),
        };
        assert!(unavailable.is_retryable());
        assert!(ClientError::Core(common::Error::Connectivity("timeout".into())).is_retryable());
    }
}
