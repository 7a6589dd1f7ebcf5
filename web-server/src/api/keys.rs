// web-server/src/api/keys.rs
use actix_web::{web, HttpResponse};
use common::auth::VerifiedAccount;
use common::{AddKeyRequest, ApiSuccess};

use super::error::ApiError;
use crate::state::AppState;

/// Reached only through the access key gate
pub async fn has_access_key(account: web::ReqData<VerifiedAccount>) -> HttpResponse {
    tracing::info!("{} holds a {} key", account.account_id, account.scope);
    HttpResponse::Ok().json(ApiSuccess::empty())
}

pub async fn add_key(
    state: web::Data<AppState>,
    body: web::Json<AddKeyRequest>,
) -> Result<HttpResponse, ApiError> {
    let outcome = state.key_issuer.issue(&body.public_key).await?;
    Ok(HttpResponse::Ok().json(ApiSuccess::with_result(outcome)))
}

/// Delete every key the contract account issued for itself
pub async fn delete_access_keys(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let revoked = state.key_revoker.revoke_all().await?;
    Ok(HttpResponse::Ok().json(ApiSuccess::with_result(revoked)))
}
