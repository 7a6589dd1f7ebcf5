// web-client/src/deposit.rs
use std::sync::Arc;

use common::polling::{poll_until, PollConfig, PollOutcome};
use common::AccountHandle;
use serde_json::{json, Value};

use crate::error::{ClientError, Result};
use crate::storage::KeyValueStore;

/// Storage key of the deposit amount waiting to show up in the contract
pub const DEPOSIT_ACTION: &str = "__DEPOSIT_ACTION";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DepositStatus {
    /// Nothing pending; the current contract balance
    Idle { balance: u128 },
    Confirmed { balance: u128, attempts: u32 },
    /// Gave up; the pending amount is kept for the next watch
    TimedOut { expected: u128, attempts: u32 },
}

/// Tracks a deposit made through the wallet until the contract reports it
pub struct DepositWatcher {
    account: AccountHandle,
    contract_id: String,
    store: Arc<dyn KeyValueStore>,
    poll: PollConfig,
}

impl DepositWatcher {
    pub fn new(
        account: AccountHandle,
        contract_id: impl Into<String>,
        store: Arc<dyn KeyValueStore>,
        poll: PollConfig,
    ) -> Self {
        Self {
            account,
            contract_id: contract_id.into(),
            store,
            poll,
        }
    }

    /// Remember the balance expected once the deposit lands, in yocto
    pub async fn set_pending(&self, amount: u128) -> Result<()> {
        self.store.set(DEPOSIT_ACTION, json!(amount.to_string())).await
    }

    pub async fn pending(&self) -> Result<Option<u128>> {
        match self.store.get(DEPOSIT_ACTION).await? {
            Some(value) => parse_amount(&value).map(Some),
            None => Ok(None),
        }
    }

    pub async fn clear_pending(&self) -> Result<()> {
        self.store.delete(DEPOSIT_ACTION).await
    }

    /// The account's balance held by the contract
    pub async fn balance(&self) -> Result<u128> {
        let value = self
            .account
            .view_call(
                &self.contract_id,
                "get_balance",
                &json!({ "account_id": self.account.account_id() }),
            )
            .await?;
        parse_amount(&value)
    }

    /// Poll the balance until it equals the pending amount
    pub async fn watch(&self) -> Result<DepositStatus> {
        let Some(expected) = self.pending().await? else {
            return Ok(DepositStatus::Idle {
                balance: self.balance().await?,
            });
        };
        tracing::info!("Waiting for deposit of {} to {}", expected, self.contract_id);

        let outcome = poll_until(self.poll, move |attempt| async move {
            let balance = self.balance().await?;
            tracing::debug!("Deposit check {}: balance {}, expected {}", attempt, balance, expected);
            Ok::<_, ClientError>((balance == expected).then_some((balance, attempt)))
        })
        .await?;

        match outcome {
            PollOutcome::Ready((balance, attempts)) => {
                self.clear_pending().await?;
                tracing::info!("Deposit confirmed after {} checks", attempts);
                Ok(DepositStatus::Confirmed { balance, attempts })
            }
            PollOutcome::TimedOut { attempts } => {
                tracing::warn!("Deposit of {} not seen after {} checks", expected, attempts);
                Ok(DepositStatus::TimedOut { expected, attempts })
            }
        }
    }
}

/// Contract amounts come back as decimal strings; plain numbers are accepted too
fn parse_amount(value: &Value) -> Result<u128> {
    let parsed = match value {
        Value::String(s) => s.parse::<u128>().ok(),
        Value::Number(n) => n.as_u64().map(u128::from),
        _ => None,
    };
    parsed.ok_or_else(|| ClientError::InvalidResponse(format!("not an amount: {value}")))
}
