// web-server/src/api/mod.rs
pub mod error;
pub mod guests;
pub mod keys;

use actix_web::{get, web, HttpResponse, Responder};

use crate::middleware::access_key_gate::AccessKeyGate;
use crate::state::AppState;
use error::ApiError;

#[get("/")]
pub async fn index() -> impl Responder {
    HttpResponse::Ok().body("Hello World!")
}

/// Register every route. Key management routes are open unless
/// `auth.open_key_endpoints` is off, in which case they require a full
/// access signature of the contract account.
pub fn configure(cfg: &mut web::ServiceConfig, state: &AppState) {
    let gate = AccessKeyGate::new(state.verifier.clone());

    cfg.app_data(web::JsonConfig::default().error_handler(|err, _req| {
        ApiError::Malformed(format!("Invalid JSON body: {err}")).into()
    }))
    .service(index)
    .service(
        web::resource("/has-access-key")
            .wrap(gate.clone())
            .route(web::post().to(keys::has_access_key)),
    );

    if state.config.auth.open_key_endpoints {
        tracing::warn!("Key endpoints are open: anyone can add or delete access keys");
        cfg.service(web::resource("/add-key").route(web::post().to(keys::add_key)))
            .service(web::resource("/delete-access-keys").route(web::get().to(keys::delete_access_keys)))
            .service(web::resource("/add-guest").route(web::post().to(guests::add_guest)));
    } else {
        let owner_gate = gate.requiring_account(state.config.near.contract_name.clone());
        cfg.service(
            web::resource("/add-key")
                .wrap(owner_gate.clone())
                .route(web::post().to(keys::add_key)),
        )
        .service(
            web::resource("/delete-access-keys")
                .wrap(owner_gate.clone())
                .route(web::get().to(keys::delete_access_keys)),
        )
        .service(
            web::resource("/add-guest")
                .wrap(owner_gate)
                .route(web::post().to(guests::add_guest)),
        );
    }
}
