// common/src/models/access_key.rs
use std::fmt;

use borsh::BorshSerialize;
use serde::{Deserialize, Serialize};

/// Restriction carried by a FunctionCall access key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize)]
pub struct FunctionCallPermission {
    /// Fee budget in yocto, `None` means unlimited
    #[serde(with = "crate::utils::option_u128_dec_format", default)]
    pub allowance: Option<u128>,
    pub receiver_id: String,
    #[serde(default)]
    pub method_names: Vec<String>,
}

/// Permission of an access key, serialized as `"FullAccess"` or `{"FunctionCall": {...}}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize)]
pub enum AccessKeyPermission {
    FunctionCall(FunctionCallPermission),
    FullAccess,
}

impl AccessKeyPermission {
    /// Receiver the key is bound to, if it is a FunctionCall key
    pub fn receiver_id(&self) -> Option<&str> {
        match self {
            AccessKeyPermission::FunctionCall(permission) => Some(&permission.receiver_id),
            AccessKeyPermission::FullAccess => None,
        }
    }

    pub fn is_full_access(&self) -> bool {
        matches!(self, AccessKeyPermission::FullAccess)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize)]
pub struct AccessKey {
    #[serde(default)]
    pub nonce: u64,
    pub permission: AccessKeyPermission,
}

impl AccessKey {
    pub fn full_access() -> Self {
        Self {
            nonce: 0,
            permission: AccessKeyPermission::FullAccess,
        }
    }

    pub fn function_call(
        receiver_id: impl Into<String>,
        method_names: Vec<String>,
        allowance: Option<u128>,
    ) -> Self {
        Self {
            nonce: 0,
            permission: AccessKeyPermission::FunctionCall(FunctionCallPermission {
                allowance,
                receiver_id: receiver_id.into(),
                method_names,
            }),
        }
    }
}

/// One entry of an account's key list as reported by the chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessKeyInfo {
    pub public_key: String,
    pub access_key: AccessKey,
}

/// Which keys count as proof of identity for a request
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyScope {
    /// Only unrestricted keys
    FullAccess,
    /// Only FunctionCall keys bound to this receiver
    Contract(String),
}

impl KeyScope {
    /// Scope named by a request's `contractName`; empty means FullAccess
    pub fn from_contract_name(contract_name: &str) -> Self {
        if contract_name.is_empty() {
            KeyScope::FullAccess
        } else {
            KeyScope::Contract(contract_name.to_string())
        }
    }

    pub fn matches(&self, access_key: &AccessKey) -> bool {
        match (self, &access_key.permission) {
            (KeyScope::FullAccess, AccessKeyPermission::FullAccess) => true,
            (KeyScope::Contract(contract), AccessKeyPermission::FunctionCall(permission)) => {
                permission.receiver_id == *contract
            }
            _ => false,
        }
    }

    /// Keep only the entries of `keys` that fall in this scope
    pub fn filter<'a>(&self, keys: &'a [AccessKeyInfo]) -> Vec<&'a AccessKeyInfo> {
        keys.iter().filter(|info| self.matches(&info.access_key)).collect()
    }
}

impl fmt::Display for KeyScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyScope::FullAccess => write!(f, "FullAccess"),
            KeyScope::Contract(contract) => write!(f, "FunctionCall({contract})"),
        }
    }
}
