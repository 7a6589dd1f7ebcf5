// web-client/src/backend.rs
use std::time::Duration;

use common::auth::signed_payload;
use common::crypto::PublicKey;
use common::{AccountHandle, ClientConfig};
use reqwest::{Client, Response, Url};
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::error::{ClientError, Result};

/// HTTP client for the backend's key endpoints
#[derive(Debug, Clone)]
pub struct BackendClient {
    http_client: Client,
    base_url: Url,
    contract_name: String,
}

impl BackendClient {
    pub fn new(config: &ClientConfig, contract_name: impl Into<String>) -> Result<Self> {
        let base_url = Url::parse(&config.backend_url)
            .map_err(|e| ClientError::InvalidUrl(format!("{}: {e}", config.backend_url)))?;

        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()?;

        Ok(Self {
            http_client,
            base_url,
            contract_name: contract_name.into(),
        })
    }

    pub fn contract_name(&self) -> &str {
        &self.contract_name
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| ClientError::InvalidUrl(format!("{path}: {e}")))
    }

    /// POST `data` as JSON and return the success body
    pub async fn post_json<T: Serialize + ?Sized>(&self, path: &str, data: &T) -> Result<Value> {
        let response = self.http_client.post(self.url(path)?).json(data).send().await?;
        handle_response(response).await
    }

    /// POST `data` with `accountId`, `contractName` and a fresh signed block height merged in
    pub async fn post_signed_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        account: &AccountHandle,
        data: &T,
    ) -> Result<Value> {
        let mut body = match serde_json::to_value(data)? {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                return Err(ClientError::InvalidResponse(format!(
                    "signed request body must be a JSON object, got {other}"
                )))
            }
        };

        let payload = signed_payload(account, &self.contract_name).await?;
        if let Value::Object(auth) = serde_json::to_value(payload)? {
            body.extend(auth);
        }

        tracing::debug!("Signed request to {} as {}", path, account.account_id());
        self.post_json(path, &body).await
    }

    pub async fn get_json(&self, path: &str) -> Result<Value> {
        let response = self.http_client.get(self.url(path)?).send().await?;
        handle_response(response).await
    }

    /// Whether the backend accepts a request signed by `account`'s active key
    pub async fn has_access_key(&self, account: &AccountHandle) -> Result<bool> {
        match self.post_signed_json("/has-access-key", account, &json!({})).await {
            Ok(body) => Ok(is_success(&body)),
            Err(e) if e.is_forbidden() => {
                tracing::info!("Backend refused key of {}: {}", account.account_id(), e);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Ask the backend to add `public_key` to the contract account
    pub async fn add_key(&self, public_key: &PublicKey) -> Result<Value> {
        let body = self
            .post_json("/add-key", &json!({ "publicKey": public_key.to_string() }))
            .await?;
        Ok(body.get("result").cloned().unwrap_or(Value::Null))
    }

    /// Remove every contract-scoped key from the contract account
    pub async fn delete_access_keys(&self) -> Result<Vec<Value>> {
        let body = self.get_json("/delete-access-keys").await?;
        match body.get("result") {
            Some(Value::Array(revoked)) => Ok(revoked.clone()),
            _ => Ok(Vec::new()),
        }
    }

    pub async fn add_guest(&self, account_id: &str, public_key: &PublicKey) -> Result<Value> {
        let body = self
            .post_json(
                "/add-guest",
                &json!({ "account_id": account_id, "public_key": public_key.to_string() }),
            )
            .await?;
        Ok(body.get("result").cloned().unwrap_or(Value::Null))
    }
}

fn is_success(body: &Value) -> bool {
    body.get("success").and_then(Value::as_bool).unwrap_or(false)
}

async fn handle_response(response: Response) -> Result<Value> {
    let status = response.status();
    let text = response.text().await?;
    let body: Value = serde_json::from_str(&text).map_err(|_| {
        ClientError::InvalidResponse(format!("non-JSON response ({status}): {text}"))
    })?;

    if status.is_success() && is_success(&body) {
        return Ok(body);
    }

    let message = body
        .get("error")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| text.clone());
    Err(ClientError::Backend {
        status: status.as_u16(),
        message,
    })
}
