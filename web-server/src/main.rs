// Web Server - main.rs
// web-server/src/main.rs
use std::io;

use actix_web::{web, App, HttpServer};
use common::{setup_tracing, Config};
use web_server::{api, AppState};

#[actix_web::main]
async fn main() -> io::Result<()> {
    // Load configuration; LOG_LEVEL or APP__LOG_LEVEL overrides log_level
    let config = Config::from_env();
    setup_tracing(&config.log_level).map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;

    // Save address before moving config into the state
    let server_addr = config.web_server_addr.clone();
    let contract_name = config.near.contract_name.clone();

    let state = AppState::from_config(config).map_err(|e| {
        tracing::error!("Failed to initialise backend: {}", e);
        io::Error::new(io::ErrorKind::Other, e.to_string())
    })?;
    let state = web::Data::new(state);

    tracing::info!("Contract account: {}", contract_name);
    tracing::info!("Starting Web Server on {}", server_addr);

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .configure(|cfg| api::configure(cfg, &state))
    })
    .bind(&server_addr)?
    .run()
    .await
}
