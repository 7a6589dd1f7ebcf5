// web-server/src/api/guests.rs
use actix_web::{web, HttpResponse};
use common::{AddGuestRequest, ApiSuccess};

use super::error::ApiError;
use crate::state::AppState;

pub async fn add_guest(
    state: web::Data<AppState>,
    body: web::Json<AddGuestRequest>,
) -> Result<HttpResponse, ApiError> {
    let outcome = state
        .guests
        .add_guest(&body.account_id, &body.public_key)
        .await?;
    Ok(HttpResponse::Ok().json(ApiSuccess::with_result(outcome)))
}
