// web-server/src/api/error.rs
use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use common::ApiErrorBody;

/// Every failure the API reports, rendered as `403 { "error": ... }`
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Core(#[from] common::Error),

    /// Body or query string could not be parsed
    #[error("{0}")]
    Malformed(String),
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        StatusCode::FORBIDDEN
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ApiErrorBody {
            error: self.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    #[actix_web::test]
    async fn test_error_body() {
        let err = ApiError::from(common::Error::KeyAlreadyExists {
            public_key: "ed25519:abc".to_string(),
        });
        let response = err.error_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let body = to_bytes(response.into_body()).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body, serde_json::json!({ "error": "key is already added" }));
    }
}
