// web-server/tests/api_test.rs
use actix::Actor;
use actix_web::cookie::Cookie;
use actix_web::http::StatusCode;
use actix_web::{test, web, App};
use async_trait::async_trait;
use candid::IDLValue;
use common::models::{Asset, AssetId, AssetPreview, AssetSummary, User};
use common::Config;
use decentfont_web_server::api::{self, SESSION_COOKIE_NAME};
use decentfont_web_server::canister::{BackendActor, CallError};
use decentfont_web_server::client_registry::ClientRegistryActor;
use decentfont_web_server::context::ContextBuilder;
use decentfont_web_server::session::{ActorFactory, KeyStorage, MemoryKeyStorage, SessionError};
use ic_agent::Identity;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

/// Canister stand-in that records the pages it was asked for
#[derive(Default)]
struct RecordingActor {
    pages: Mutex<Vec<(u64, u64)>>,
}

#[async_trait]
impl BackendActor for RecordingActor {
    async fn add_user(&self, user: &User) -> Result<IDLValue, CallError> {
        Ok(IDLValue::Bool(!user.username.is_empty()))
    }

    async fn get_user(&self) -> Result<Option<User>, CallError> {
        Ok(None)
    }

    async fn add_asset(&self, _asset: &Asset) -> Result<(bool, AssetId), CallError> {
        Ok((true, 42))
    }

    async fn list_assets(&self, page: u64, page_size: u64) -> Result<Vec<AssetSummary>, CallError> {
        self.pages.lock().unwrap().push((page, page_size));
        Ok(vec![AssetSummary { id: page * 100, name: format!("Font {}", page) }])
    }

    async fn get_asset_preview(&self, _id: AssetId) -> Result<Option<AssetPreview>, CallError> {
        Err(CallError::Rejected("network down".to_string()))
    }

    async fn get_asset(&self, _id: AssetId) -> Result<Option<Asset>, CallError> {
        Ok(None)
    }
}

struct SharedActorFactory(Arc<RecordingActor>);

#[async_trait]
impl ActorFactory for SharedActorFactory {
    async fn create(&self, _identity: Arc<dyn Identity>) -> Result<Arc<dyn BackendActor>, SessionError> {
        Ok(self.0.clone())
    }
}

fn builder(storage: Arc<dyn KeyStorage>, actor: Arc<RecordingActor>) -> ContextBuilder {
    ContextBuilder::new(
        storage,
        Arc::new(SharedActorFactory(actor)),
        Url::parse("https://identity.ic0.app").unwrap(),
        Duration::from_secs(3600),
    )
}

macro_rules! app {
    ($builder:expr) => {{
        let registry = ClientRegistryActor::new($builder).start();
        test::init_service(
            App::new()
                .app_data(web::Data::new(Config::default()))
                .app_data(web::Data::new(registry))
                .configure(api::configure),
        )
        .await
    }};
}

fn region<'a>(view: &'a Value, name: &str) -> &'a str {
    view["regions"][name].as_str().unwrap_or("")
}

#[actix_web::test]
async fn test_page_flow() {
    let actor = Arc::new(RecordingActor::default());
    let app = app!(builder(Arc::new(MemoryKeyStorage::default()), actor.clone()));

    // Page load creates an anonymous client
    let resp = test::call_service(&app, test::TestRequest::post().uri("/api/client").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let cookie = resp
        .response()
        .cookies()
        .find(|c| c.name() == SESSION_COOKIE_NAME)
        .map(Cookie::into_owned)
        .expect("session cookie");
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["new_session"], true);
    assert_eq!(body["is_authenticated"], false);
    assert_eq!(body["identity_provider"], "https://identity.ic0.app/");
    assert_eq!(region(&body["view"], "login-btn"), "Login with Internet Identity");

    // Commands need a login first
    let req = test::TestRequest::post()
        .uri("/api/commands/load-more")
        .cookie(cookie.clone())
        .to_request();
    let view: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(view["alerts"], json!(["Please login first"]));
    assert!(actor.pages.lock().unwrap().is_empty());

    // The login button logs in
    let req = test::TestRequest::post().uri("/api/auth/toggle").cookie(cookie.clone()).to_request();
    let auth: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(auth["status"]["state"], "authenticated");
    let principal = auth["status"]["principal"].as_str().unwrap().to_string();
    assert_eq!(region(&auth["view"], "login-btn"), "Logout");
    assert_eq!(region(&auth["view"], "user-info"), format!("Logged in as: {}", principal));

    // Listing walks forward one page per click
    for _ in 0..2 {
        let req = test::TestRequest::post()
            .uri("/api/commands/load-more")
            .cookie(cookie.clone())
            .to_request();
        let view: Value = test::call_and_read_body_json(&app, req).await;
        assert!(view["alerts"].as_array().unwrap().is_empty());
    }
    assert_eq!(*actor.pages.lock().unwrap(), vec![(0, 10), (1, 10)]);

    let req = test::TestRequest::post().uri("/api/commands/add-asset").cookie(cookie.clone()).to_request();
    let view: Value = test::call_and_read_body_json(&app, req).await;
    let list = region(&view, "asset-list");
    assert!(list.contains("<p>Asset: Font 0, ID: 0</p><p>Asset: Font 1, ID: 100</p>"));
    assert!(list.contains("Asset added: true, ID: 42"));
    assert_eq!(view["current_page"], 2);

    let req = test::TestRequest::post()
        .uri("/api/commands/get-preview")
        .cookie(cookie.clone())
        .set_json(json!({ "asset_id": "" }))
        .to_request();
    let view: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(region(&view, "preview-info"), "Please enter an asset ID");

    let req = test::TestRequest::post()
        .uri("/api/commands/get-preview")
        .cookie(cookie.clone())
        .set_json(json!({ "asset_id": "3" }))
        .to_request();
    let view: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(region(&view, "preview-info"), "Error: network down");

    let req = test::TestRequest::post()
        .uri("/api/commands/get-full-asset")
        .cookie(cookie.clone())
        .set_json(json!({ "asset_id": "3" }))
        .to_request();
    let view: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(region(&view, "full-asset-info"), "No asset found or not authorized");

    let req = test::TestRequest::post().uri("/api/commands/add-user").cookie(cookie.clone()).to_request();
    let view: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(region(&view, "user-info"), "User added: true");

    // Reloading the page keeps the session
    let req = test::TestRequest::post().uri("/api/client").cookie(cookie.clone()).to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["new_session"], false);
    assert_eq!(body["is_authenticated"], true);
    assert_eq!(body["principal"], principal.as_str());

    // Seek back to the start
    let req = test::TestRequest::post()
        .uri("/api/commands/reset-paging")
        .cookie(cookie.clone())
        .to_request();
    let view: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(view["current_page"], 0);

    // Invalidation logs out and drops the session
    let req = test::TestRequest::delete().uri("/api/client/session").cookie(cookie.clone()).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let req = test::TestRequest::get().uri("/api/client/view").cookie(cookie).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn test_login_restored_after_restart() {
    let storage: Arc<dyn KeyStorage> = Arc::new(MemoryKeyStorage::default());
    let first = Arc::new(RecordingActor::default());
    let app = app!(builder(storage.clone(), first));

    let resp = test::call_service(&app, test::TestRequest::post().uri("/api/client").to_request()).await;
    let cookie = resp
        .response()
        .cookies()
        .find(|c| c.name() == SESSION_COOKIE_NAME)
        .map(Cookie::into_owned)
        .expect("session cookie");

    let req = test::TestRequest::post().uri("/api/auth/login").cookie(cookie.clone()).to_request();
    let auth: Value = test::call_and_read_body_json(&app, req).await;
    let principal = auth["status"]["principal"].as_str().unwrap().to_string();

    // A new registry over the same key storage knows nothing about the cookie
    let second = Arc::new(RecordingActor::default());
    let restarted = app!(builder(storage, second.clone()));

    let req = test::TestRequest::post().uri("/api/client").cookie(cookie).to_request();
    let body: Value = test::call_and_read_body_json(&restarted, req).await;

    assert_eq!(body["is_authenticated"], true);
    assert_eq!(body["principal"], principal.as_str());
    assert!(body.get("session_error").is_none());
    assert_eq!(region(&body["view"], "user-info"), format!("Logged in as: {}", principal));
    // The initial load fetched the first page
    assert_eq!(*second.pages.lock().unwrap(), vec![(0, 10)]);
    assert_eq!(region(&body["view"], "asset-list"), "<p>Asset: Font 0, ID: 0</p>");
}

#[actix_web::test]
async fn test_requests_without_session() {
    let app = app!(builder(
        Arc::new(MemoryKeyStorage::default()),
        Arc::new(RecordingActor::default())
    ));

    let req = test::TestRequest::post().uri("/api/commands/get-user").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::post().uri("/api/commands/format-disk").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::delete().uri("/api/client/session").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn test_malformed_cookie_gets_fresh_token() {
    let app = app!(builder(
        Arc::new(MemoryKeyStorage::default()),
        Arc::new(RecordingActor::default())
    ));

    let req = test::TestRequest::post()
        .uri("/api/client")
        .cookie(Cookie::new(SESSION_COOKIE_NAME, "chosen-by-client"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let cookie = resp
        .response()
        .cookies()
        .find(|c| c.name() == SESSION_COOKIE_NAME)
        .map(Cookie::into_owned)
        .expect("session cookie");
    assert_ne!(cookie.value(), "chosen-by-client");
    assert_eq!(cookie.value().len(), 64);
}
