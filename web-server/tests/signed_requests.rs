// web-server/tests/signed_requests.rs
use std::sync::Arc;

use actix_web::{
    body::{to_bytes, MessageBody},
    dev::{Service, ServiceResponse},
    http::StatusCode,
    test, web, App, Error,
};
use common::auth::sign_block_number;
use common::chain::SandboxChain;
use common::crypto::KeyPair;
use common::delegation::guest_holder_account_id;
use common::models::{AccessKey, KeyScope};
use common::{Config, KeyStore, SignedPayload};
use serde_json::{json, Value};
use web_server::{api, AppState};

const CONTRACT: &str = "contract.test";

struct Backend {
    chain: Arc<SandboxChain>,
    owner_key: KeyPair,
    state: web::Data<AppState>,
}

fn backend(height: u64, open_key_endpoints: bool) -> Backend {
    let chain = Arc::new(SandboxChain::new(height));
    let keystore = Arc::new(KeyStore::new());

    let mut config = Config::default();
    config.near.network_id = "sandbox".to_string();
    config.near.contract_name = CONTRACT.to_string();
    config.auth.open_key_endpoints = open_key_endpoints;

    let owner_key = chain.create_account_with_key(CONTRACT);
    keystore.set_active_key("sandbox", CONTRACT, owner_key.clone());
    let holder = guest_holder_account_id(CONTRACT);
    keystore.set_active_key("sandbox", &holder, chain.create_account_with_key(&holder));

    let state = AppState::new(config, chain.clone(), keystore).unwrap();
    Backend {
        chain,
        owner_key,
        state: web::Data::new(state),
    }
}

async fn send<S, B>(app: &S, req: actix_http::Request) -> (StatusCode, Value)
where
    S: Service<actix_http::Request, Response = ServiceResponse<B>, Error = Error>,
    B: MessageBody + 'static,
{
    let response = match app.call(req).await {
        Ok(response) => response.map_into_boxed_body().into_parts().1,
        Err(err) => err.error_response(),
    };
    let status = response.status();
    let body = to_bytes(response.into_body()).await.unwrap_or_default();
    let body = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, body)
}

macro_rules! app {
    ($backend:expr) => {{
        let state = $backend.state.clone();
        test::init_service(
            App::new()
                .app_data(state.clone())
                .configure(|cfg| api::configure(cfg, &state)),
        )
        .await
    }};
}

fn signed(account_id: &str, contract_name: &str, key: &KeyPair, block: &str) -> SignedPayload {
    SignedPayload::new(account_id, contract_name, sign_block_number(key, block))
}

#[actix_web::test]
async fn test_has_access_key_within_window() {
    let backend = backend(550, true);
    let alice = backend.chain.create_account_with_key("alice.test");
    let app = app!(backend);

    let req = test::TestRequest::post()
        .uri("/has-access-key")
        .set_json(signed("alice.test", "", &alice, "500"))
        .to_request();
    let (status, body) = send(&app, req).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "success": true }));
}

#[actix_web::test]
async fn test_token_expires_after_window() {
    let backend = backend(550, true);
    let alice = backend.chain.create_account_with_key("alice.test");
    let app = app!(backend);
    let token = signed("alice.test", "", &alice, "500");

    backend.chain.set_height(599);
    let req = test::TestRequest::post().uri("/has-access-key").set_json(&token).to_request();
    assert_eq!(send(&app, req).await.0, StatusCode::OK);

    backend.chain.set_height(600);
    let req = test::TestRequest::post().uri("/has-access-key").set_json(&token).to_request();
    let (status, body) = send(&app, req).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(
        body["error"],
        "You must provide a blockNumber within 100 of the most recent block; provided: 500, current: 600"
    );
}

#[actix_web::test]
async fn test_future_block_rejected() {
    let backend = backend(550, true);
    let alice = backend.chain.create_account_with_key("alice.test");
    let app = app!(backend);

    let req = test::TestRequest::post()
        .uri("/has-access-key")
        .set_json(signed("alice.test", "", &alice, "551"))
        .to_request();
    assert_eq!(send(&app, req).await.0, StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn test_missing_parameters() {
    let backend = backend(550, true);
    let app = app!(backend);

    let req = test::TestRequest::post()
        .uri("/has-access-key")
        .set_json(json!({ "accountId": "alice.test", "blockNumber": "500" }))
        .to_request();
    let (status, body) = send(&app, req).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(
        body["error"],
        "You must provide an accountId, contractName, blockNumber, and blockNumberSignature"
    );
}

#[actix_web::test]
async fn test_unparseable_body_is_forbidden() {
    let backend = backend(550, true);
    let app = app!(backend);

    let req = test::TestRequest::post()
        .uri("/has-access-key")
        .insert_header(("content-type", "application/json"))
        .set_payload("{not json")
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["error"].is_string());

    let req = test::TestRequest::post()
        .uri("/add-key")
        .insert_header(("content-type", "application/json"))
        .set_payload("{not json")
        .to_request();
    assert_eq!(send(&app, req).await.0, StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn test_scoped_key_only_proves_its_contract() {
    let backend = backend(550, true);
    let app_key = KeyPair::generate();
    backend.chain.add_access_key(
        "alice.test",
        app_key.public_key(),
        AccessKey::function_call("contractA", vec![], None),
    );
    let app = app!(backend);

    let req = test::TestRequest::post()
        .uri("/has-access-key")
        .set_json(signed("alice.test", "contractA", &app_key, "550"))
        .to_request();
    assert_eq!(send(&app, req).await.0, StatusCode::OK);

    let req = test::TestRequest::post()
        .uri("/has-access-key")
        .set_json(signed("alice.test", "contractB", &app_key, "550"))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(
        body["error"],
        "blockNumberSignature did not match a signature of blockNumber=550 from accountId=alice.test"
    );
}

#[actix_web::test]
async fn test_add_key_then_prove_it() {
    let backend = backend(550, true);
    let app = app!(backend);
    let app_key = KeyPair::generate();
    let keys_before = backend.chain.keys(CONTRACT).len();

    let add = || {
        test::TestRequest::post()
            .uri("/add-key")
            .set_json(json!({ "publicKey": app_key.public_key().to_string() }))
            .to_request()
    };

    let (status, body) = send(&app, add()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert!(body["result"]["transaction_hash"].is_string());

    let (status, body) = send(&app, add()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body, json!({ "error": "key is already added" }));
    assert_eq!(backend.chain.keys(CONTRACT).len(), keys_before + 1);

    // The new key now proves identity of the contract account for the contract scope
    let req = test::TestRequest::post()
        .uri("/has-access-key")
        .set_json(signed(CONTRACT, CONTRACT, &app_key, "550"))
        .to_request();
    assert_eq!(send(&app, req).await.0, StatusCode::OK);
}

#[actix_web::test]
async fn test_delete_access_keys() {
    let backend = backend(550, true);
    for _ in 0..3 {
        backend.chain.add_access_key(
            CONTRACT,
            KeyPair::generate().public_key(),
            AccessKey::function_call(CONTRACT, vec![], None),
        );
    }
    backend.chain.add_access_key(
        CONTRACT,
        KeyPair::generate().public_key(),
        AccessKey::function_call("market.test", vec![], None),
    );
    let app = app!(backend);

    let req = test::TestRequest::get().uri("/delete-access-keys").to_request();
    let (status, body) = send(&app, req).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"].as_array().unwrap().len(), 3);
    let remaining = backend.chain.keys(CONTRACT);
    assert_eq!(remaining.len(), 2);
    assert!(KeyScope::Contract(CONTRACT.to_string()).filter(&remaining).is_empty());
}

#[actix_web::test]
async fn test_delete_access_keys_partial_failure() {
    let backend = backend(550, true);
    let keys: Vec<_> = (0..3).map(|_| KeyPair::generate().public_key()).collect();
    for key in &keys {
        backend
            .chain
            .add_access_key(CONTRACT, *key, AccessKey::function_call(CONTRACT, vec![], None));
    }
    backend.chain.fail_delete_of(keys[0]);
    let app = app!(backend);

    let req = test::TestRequest::get().uri("/delete-access-keys").to_request();
    let (status, body) = send(&app, req).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["error"].as_str().unwrap().starts_with("1 of 3 key deletions failed (2 deleted)"));
    assert!(backend.chain.has_key(CONTRACT, &keys[0]));
    assert!(!backend.chain.has_key(CONTRACT, &keys[1]));
}

#[actix_web::test]
async fn test_add_guest() {
    let backend = backend(550, true);
    let app = app!(backend);
    let guest_key = KeyPair::generate().public_key();

    let req = test::TestRequest::post()
        .uri("/add-guest")
        .set_json(json!({ "account_id": "bob.contract.test", "public_key": guest_key.to_string() }))
        .to_request();
    let (status, body) = send(&app, req).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert!(backend.chain.has_key("guests.contract.test", &guest_key));
    assert_eq!(backend.chain.calls().last().unwrap().method_names(), vec!["add_guest"]);
}

#[actix_web::test]
async fn test_closed_key_endpoints_require_owner_signature() {
    let backend = backend(550, false);
    let alice = backend.chain.create_account_with_key("alice.test");
    let app = app!(backend);
    let new_key = KeyPair::generate().public_key().to_string();

    let req = test::TestRequest::post()
        .uri("/add-key")
        .set_json(json!({ "publicKey": new_key }))
        .to_request();
    assert_eq!(send(&app, req).await.0, StatusCode::FORBIDDEN);

    // A valid signature from another account is not enough
    let mut body = serde_json::to_value(signed("alice.test", "", &alice, "550")).unwrap();
    body["publicKey"] = json!(new_key);
    let req = test::TestRequest::post().uri("/add-key").set_json(&body).to_request();
    assert_eq!(send(&app, req).await.0, StatusCode::FORBIDDEN);

    let mut body = serde_json::to_value(signed(CONTRACT, "", &backend.owner_key, "550")).unwrap();
    body["publicKey"] = json!(new_key);
    let req = test::TestRequest::post().uri("/add-key").set_json(&body).to_request();
    assert_eq!(send(&app, req).await.0, StatusCode::OK);

    let token = sign_block_number(&backend.owner_key, "550");
    let uri = format!(
        "/delete-access-keys?accountId={}&contractName=&blockNumber=550&blockNumberSignature={}",
        CONTRACT,
        token
            .block_number_signature
            .replace('+', "%2B")
            .replace('/', "%2F")
            .replace('=', "%3D")
    );
    let req = test::TestRequest::get().uri(&uri).to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"].as_array().unwrap().len(), 1);
}

#[actix_web::test]
async fn test_index() {
    let backend = backend(1, true);
    let app = app!(backend);
    let req = test::TestRequest::get().uri("/").to_request();
    let body = test::call_and_read_body(&app, req).await;
    assert_eq!(body, "Hello World!");
}
