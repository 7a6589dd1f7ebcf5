// web-server/src/middleware/access_key_gate.rs
use std::rc::Rc;

use actix_web::{
    dev::{self, forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    web, Error, HttpMessage,
};
use common::auth::{SignatureVerifier, VerifiedAccount};
use common::models::KeyScope;
use common::SignedPayload;
use futures_util::future::{ready, LocalBoxFuture, Ready};

use crate::api::error::ApiError;

/// Rejects requests that do not carry a valid signed block height.
///
/// The signed fields are read from the JSON body, or from the query string
/// when the body is empty. On success the [`VerifiedAccount`] is stored in
/// the request extensions and the body is handed to the handler untouched.
#[derive(Clone)]
pub struct AccessKeyGate {
    verifier: SignatureVerifier,
    required_account: Option<String>,
}

impl AccessKeyGate {
    pub fn new(verifier: SignatureVerifier) -> Self {
        Self {
            verifier,
            required_account: None,
        }
    }

    /// Only accept full access signatures from `account_id`
    pub fn requiring_account(mut self, account_id: impl Into<String>) -> Self {
        self.required_account = Some(account_id.into());
        self
    }

    async fn check(&self, req: &mut ServiceRequest) -> Result<VerifiedAccount, ApiError> {
        let payload = read_signed_payload(req).await?;
        let account = self.verifier.verify(&payload).await?;

        if let Some(required) = &self.required_account {
            if account.account_id != *required || account.scope != KeyScope::FullAccess {
                return Err(common::Error::InvalidSignature {
                    account_id: account.account_id,
                    block_number: account.block_height.to_string(),
                }
                .into());
            }
        }
        Ok(account)
    }
}

async fn read_signed_payload(req: &mut ServiceRequest) -> Result<SignedPayload, ApiError> {
    let body = req
        .extract::<web::Bytes>()
        .await
        .map_err(|e| ApiError::Malformed(format!("Failed to read request body: {e}")))?;

    // The extractor consumed the payload; put it back for the handler
    req.set_payload(bytes_to_payload(body.clone()));

    if body.is_empty() {
        return web::Query::<SignedPayload>::from_query(req.query_string())
            .map(web::Query::into_inner)
            .map_err(|e| ApiError::Malformed(format!("Invalid query string: {e}")));
    }
    serde_json::from_slice(&body).map_err(|e| ApiError::Malformed(format!("Invalid JSON body: {e}")))
}

fn bytes_to_payload(buf: web::Bytes) -> dev::Payload {
    let (_, mut payload) = actix_http::h1::Payload::create(true);
    payload.unread_data(buf);
    dev::Payload::from(payload)
}

impl<S, B> Transform<S, ServiceRequest> for AccessKeyGate
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = AccessKeyGateMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AccessKeyGateMiddleware {
            service: Rc::new(service),
            gate: self.clone(),
        }))
    }
}

pub struct AccessKeyGateMiddleware<S> {
    service: Rc<S>,
    gate: AccessKeyGate,
}

impl<S, B> Service<ServiceRequest> for AccessKeyGateMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<ServiceResponse<B>, Error>>;

    forward_ready!(service);

    fn call(&self, mut req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let gate = self.gate.clone();

        Box::pin(async move {
            match gate.check(&mut req).await {
                Ok(account) => {
                    tracing::debug!(
                        "Verified {} ({}) at block {} for {}",
                        account.account_id,
                        account.scope,
                        account.block_height,
                        req.path()
                    );
                    req.extensions_mut().insert(account);
                    service.call(req).await
                }
                Err(e) => {
                    tracing::warn!("Rejected request to {}: {}", req.path(), e);
                    Err(e.into())
                }
            }
        })
    }
}
