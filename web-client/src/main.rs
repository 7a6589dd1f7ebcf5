// web-client/src/main.rs
// Web Client - main.rs
use std::env;
use std::process::ExitCode;
use std::sync::Arc;

use common::chain::{ChainClient, RpcChainClient};
use common::models::KeyScope;
use common::{format_near_amount, parse_near_amount, setup_tracing, AccountHandle, Config, KeyStore};
use web_client::{BackendClient, ClientError, DepositStatus, DepositWatcher, FileStore, Identity, KeyValueStore, Result};

const USAGE: &str = "usage: web-client [show|new|refresh|remove|deposit <amount>|watch]";

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::from_env();
    if let Err(e) = setup_tracing(&config.log_level) {
        eprintln!("Failed to set up tracing: {e}");
        return ExitCode::FAILURE;
    }

    let args: Vec<String> = env::args().skip(1).collect();
    match run(config, &args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(config: Config, args: &[String]) -> Result<()> {
    let chain: Arc<dyn ChainClient> = Arc::new(RpcChainClient::new(config.rpc_config())?);
    let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::open(&config.client.storage_dir).await?);
    let keystore = Arc::new(KeyStore::new());
    let backend = BackendClient::new(&config.client, config.near.contract_name.clone())?;
    let identity = Identity::new(
        backend,
        store.clone(),
        keystore.clone(),
        chain.clone(),
        config.near.network_id.clone(),
    );

    match args.first().map(String::as_str).unwrap_or("show") {
        "show" => match identity.load().await? {
            Some(keys) => {
                tracing::info!("Implicit account: {}", keys.account_id);
                tracing::info!("App key: {}", keys.access_public);
            }
            None => tracing::info!("No local account, run `web-client new`"),
        },
        "new" => {
            let keys = identity.new_account().await?;
            tracing::info!("Seed phrase: {}", keys.seed_phrase);
            tracing::info!("Implicit account: {}", keys.account_id);
            tracing::info!("App key: {}", keys.access_public);
        }
        "refresh" => {
            let keys = identity.refresh_access_key().await?;
            tracing::info!("New app key: {}", keys.access_public);
        }
        "remove" => {
            let revoked = identity.remove_account().await?;
            tracing::info!("Revoked {} keys and cleared local storage", revoked);
        }
        command @ ("deposit" | "watch") => {
            let keys = identity.load().await?.ok_or(ClientError::NotSignedIn)?;
            let account = AccountHandle::new(
                keys.account_id,
                config.near.network_id.clone(),
                KeyScope::FullAccess,
                keystore,
                chain,
            );
            let watcher = DepositWatcher::new(account, config.near.contract_name.clone(), store, config.deposit);

            if command == "deposit" {
                let Some(amount) = args.get(1) else {
                    tracing::error!("{}", USAGE);
                    return Ok(());
                };
                let expected = watcher.balance().await? + parse_near_amount(amount)?;
                watcher.set_pending(expected).await?;
            }
            match watcher.watch().await? {
                DepositStatus::Idle { balance } => {
                    tracing::info!("No deposit pending, balance {} NEAR", format_near_amount(balance, 2))
                }
                DepositStatus::Confirmed { balance, .. } => {
                    tracing::info!("Deposit confirmed, balance {} NEAR", format_near_amount(balance, 2))
                }
                DepositStatus::TimedOut { expected, attempts } => tracing::warn!(
                    "Balance did not reach {} NEAR after {} checks",
                    format_near_amount(expected, 2),
                    attempts
                ),
            }
        }
        other => tracing::error!("Unknown command {}; {}", other, USAGE),
    }
    Ok(())
}
