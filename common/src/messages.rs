// Common Crate - messages.rs
// common/src/messages.rs
use serde::{de, Deserialize, Deserializer, Serialize};

use crate::error::{Error, Result};
use crate::models::{FreshnessToken, KeyScope};

const MISSING_PARAMETERS: &str =
    "You must provide an accountId, contractName, blockNumber, and blockNumberSignature";

/// Authentication fields a signed request carries, as received
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedPayload {
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub contract_name: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub block_number: Option<String>,
    #[serde(default)]
    pub block_number_signature: Option<String>,
}

/// Authentication fields after presence checks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedParams {
    pub account_id: String,
    pub scope: KeyScope,
    /// Literal block number string, the exact bytes that were signed
    pub block_number: String,
    pub block_height: u64,
    pub block_number_signature: String,
}

impl SignedPayload {
    pub fn new(account_id: &str, contract_name: &str, token: FreshnessToken) -> Self {
        Self {
            account_id: Some(account_id.to_string()),
            contract_name: Some(contract_name.to_string()),
            block_number: Some(token.block_number),
            block_number_signature: Some(token.block_number_signature),
        }
    }

    /// Check that every field is present; `contractName` alone may be empty
    pub fn require(&self) -> Result<SignedParams> {
        let missing = || Error::MissingParameter(MISSING_PARAMETERS.to_string());

        let account_id = non_empty(&self.account_id).ok_or_else(missing)?;
        let contract_name = self.contract_name.as_deref().ok_or_else(missing)?;
        let block_number = non_empty(&self.block_number).ok_or_else(missing)?;
        let block_number_signature = non_empty(&self.block_number_signature).ok_or_else(missing)?;

        let block_height = block_number.parse::<u64>().map_err(|_| {
            Error::MissingParameter(format!(
                "blockNumber must be a non-negative integer; provided: {block_number}"
            ))
        })?;

        Ok(SignedParams {
            account_id: account_id.to_string(),
            scope: KeyScope::from_contract_name(contract_name),
            block_number: block_number.to_string(),
            block_height,
            block_number_signature: block_number_signature.to_string(),
        })
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Accept `"500"` as well as `500` for the block number
fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<String>, D::Error> {
    match Option::<serde_json::Value>::deserialize(deserializer)? {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) => Ok(Some(s)),
        Some(serde_json::Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(de::Error::custom(format!(
            "blockNumber must be a string or number, got {other}"
        ))),
    }
}

/// Body of `POST /add-key`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddKeyRequest {
    pub public_key: String,
}

/// Body of `POST /add-guest`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddGuestRequest {
    pub account_id: String,
    pub public_key: String,
}

/// Successful API response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSuccess<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<T>,
}

impl<T> ApiSuccess<T> {
    pub fn with_result(result: T) -> Self {
        Self {
            success: true,
            result: Some(result),
        }
    }
}

impl ApiSuccess<()> {
    pub fn empty() -> Self {
        Self {
            success: true,
            result: None,
        }
    }
}

/// Body of every rejected API call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorBody {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(value: serde_json::Value) -> SignedPayload {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_require_complete_payload() {
        let params = payload(json!({
            "accountId": "alice.test",
            "contractName": "",
            "blockNumber": "500",
            "blockNumberSignature": "c2ln"
        }))
        .require()
        .unwrap();

        assert_eq!(params.account_id, "alice.test");
        assert_eq!(params.scope, KeyScope::FullAccess);
        assert_eq!(params.block_height, 500);
    }

    #[test]
    fn test_numeric_block_number() {
        let params = payload(json!({
            "accountId": "alice.test",
            "contractName": "contract.test",
            "blockNumber": 500,
            "blockNumberSignature": "c2ln"
        }))
        .require()
        .unwrap();

        assert_eq!(params.block_number, "500");
        assert_eq!(params.scope, KeyScope::Contract("contract.test".to_string()));
    }

    #[test]
    fn test_missing_fields_rejected() {
        let complete = json!({
            "accountId": "alice.test",
            "contractName": "",
            "blockNumber": "500",
            "blockNumberSignature": "c2ln"
        });

        for field in ["accountId", "contractName", "blockNumber", "blockNumberSignature"] {
            let mut body = complete.clone();
            body.as_object_mut().unwrap().remove(field);
            let err = payload(body).require().unwrap_err();
            assert!(matches!(err, Error::MissingParameter(_)), "field {field}");
        }
    }

    #[test]
    fn test_empty_signature_rejected() {
        let err = payload(json!({
            "accountId": "alice.test",
            "contractName": "",
            "blockNumber": "500",
            "blockNumberSignature": ""
        }))
        .require()
        .unwrap_err();
        assert_eq!(err.to_string(), MISSING_PARAMETERS);
    }

    #[test]
    fn test_non_numeric_block_number() {
        let err = payload(json!({
            "accountId": "alice.test",
            "contractName": "",
            "blockNumber": "latest",
            "blockNumberSignature": "c2ln"
        }))
        .require()
        .unwrap_err();
        assert!(matches!(err, Error::MissingParameter(_)));
    }

    #[test]
    fn test_api_success_shape() {
        let body = serde_json::to_value(ApiSuccess::empty()).unwrap();
        assert_eq!(body, json!({ "success": true }));
        let body = serde_json::to_value(ApiSuccess::with_result(vec![1])).unwrap();
        assert_eq!(body, json!({ "success": true, "result": [1] }));
    }
}
