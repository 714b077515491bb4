//! End-to-end client and facade flows against an in-process mock upstream.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use reqwest::Method;
use serde_json::json;

use hidemail_client::client::{ClientConfig, HmeClient};
use hidemail_client::facade::{DEFAULT_RESERVE_NOTE, FacadeError, HmeFacade};
use hidemail_client::session::{
    HEADER_ACCOUNT_COUNTRY, HEADER_SCNT, HEADER_SESSION_ID, HEADER_SESSION_TOKEN, REQUIRED_HEADERS,
    Session, WebserviceEndpoint,
};
use hidemail_protocol::store::{KEY_CLIENT_STATE, KeyValueStore, MemoryStore};

#[derive(Clone)]
struct MockState {
    base: String,
    logout_calls: Arc<AtomicUsize>,
}

async fn validate(State(state): State<MockState>, headers: HeaderMap) -> impl IntoResponse {
    for required in REQUIRED_HEADERS {
        if !headers.contains_key(required) {
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "missing": required })),
            );
        }
    }
    (
        StatusCode::OK,
        Json(json!({
            "webservices": {
                "premiummailsettings": {
                    "url": format!("{}/pms", state.base),
                    "status": "active"
                }
            }
        })),
    )
}

async fn logout(State(state): State<MockState>) -> impl IntoResponse {
    state.logout_calls.fetch_add(1, Ordering::SeqCst);
    (StatusCode::SERVICE_UNAVAILABLE, "logout backend down")
}

async fn list() -> Json<serde_json::Value> {
    Json(json!({
        "success": true,
        "result": {
            "hmeEmails": [{
                "anonymousId": "anon-1",
                "hme": "quiet.heron@relay.example",
                "label": "news",
                "note": "",
                "forwardToEmail": "me@example.com",
                "isActive": true,
                "createTimestamp": 1_700_000_000_i64,
                "origin": "ON_DEMAND"
            }],
            "selectedForwardTo": "me@example.com",
            "forwardToEmails": ["me@example.com"]
        }
    }))
}

async fn generate_rate_limited() -> Json<serde_json::Value> {
    Json(json!({
        "success": false,
        "error": { "errorMessage": "rate limited" }
    }))
}

async fn reserve(Json(body): Json<serde_json::Value>) -> Json<serde_json::Value> {
    Json(json!({
        "success": true,
        "result": {
            "hme": {
                "anonymousId": "anon-2",
                "hme": body["hme"],
                "label": body["label"],
                "note": body["note"],
                "forwardToEmail": "me@example.com",
                "isActive": true,
                "createTimestamp": 1_700_000_001_i64,
                "origin": "ON_DEMAND"
            }
        }
    }))
}

async fn deactivate_not_found() -> Json<serde_json::Value> {
    Json(json!({
        "success": false,
        "error": { "errorMessage": "alias not found" }
    }))
}

async fn echo_headers(headers: HeaderMap) -> Json<serde_json::Value> {
    let mut map = serde_json::Map::new();
    for (name, value) in &headers {
        map.insert(
            name.as_str().to_string(),
            serde_json::Value::String(value.to_str().unwrap_or_default().to_string()),
        );
    }
    Json(serde_json::Value::Object(map))
}

async fn spawn_mock() -> (String, MockState) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock listener");
    let addr = listener.local_addr().expect("mock addr");
    let base = format!("http://{addr}");
    let state = MockState {
        base: base.clone(),
        logout_calls: Arc::new(AtomicUsize::new(0)),
    };

    let app = Router::new()
        .route("/setup/validate", post(validate))
        .route("/setup/logout", post(logout))
        .route("/pms/v2/hme/list", get(list))
        .route("/pms/v1/hme/generate", post(generate_rate_limited))
        .route("/pms/v1/hme/reserve", post(reserve))
        .route("/pms/v1/hme/deactivate", post(deactivate_not_found))
        .route("/echo", post(echo_headers))
        .with_state(state.clone());

    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (base, state)
}

fn captured_session() -> Session {
    let mut session = Session::default();
    session.set_headers([
        (HEADER_ACCOUNT_COUNTRY, "USA"),
        (HEADER_SESSION_ID, "sid-1"),
        (HEADER_SESSION_TOKEN, "tok-1"),
        (HEADER_SCNT, "scnt-1"),
    ]);
    session
}

fn authenticated_client(base: &str) -> HmeClient {
    let mut session = captured_session();
    session.webservices.insert(
        "premiummailsettings".to_string(),
        WebserviceEndpoint {
            url: format!("{base}/pms"),
            status: "active".to_string(),
        },
    );
    HmeClient::new(ClientConfig::new(format!("{base}/setup")), session)
}

#[tokio::test]
async fn validate_token_discovers_webservices_and_persists_state() {
    let (base, _state) = spawn_mock().await;
    let store = MemoryStore::new();
    let mut client = HmeClient::new(ClientConfig::new(format!("{base}/setup")), captured_session());

    assert!(!client.session().authenticated());
    let webservices = client
        .validate_token(Some(&store))
        .await
        .expect("validate token");
    assert!(webservices.contains_key("premiummailsettings"));
    assert!(client.session().authenticated());

    let persisted = ClientConfig::from_store(&store)
        .await
        .expect("load client state")
        .expect("client state persisted");
    assert!(persisted.webservices.contains_key("premiummailsettings"));

    let session = Session::load(&store).await.expect("load session");
    assert!(session.authenticated());
}

#[tokio::test]
async fn explicit_headers_win_and_omitted_ones_are_filled_from_session() {
    let (base, _state) = spawn_mock().await;
    let client = authenticated_client(&base);

    let echoed: serde_json::Value = client
        .request(
            Method::POST,
            &format!("{base}/echo"),
            &[(HEADER_SESSION_TOKEN, "explicit-tok")],
            Some(&json!({})),
        )
        .await
        .expect("echo call");

    assert_eq!(echoed[HEADER_SESSION_TOKEN], "explicit-tok");
    assert_eq!(echoed[HEADER_SESSION_ID], "sid-1");
    assert_eq!(echoed[HEADER_SCNT], "scnt-1");
    assert_eq!(echoed[HEADER_ACCOUNT_COUNTRY], "USA");
}

#[tokio::test]
async fn list_returns_the_parsed_result() {
    let (base, _state) = spawn_mock().await;
    let client = authenticated_client(&base);
    let facade = HmeFacade::new(&client).expect("facade");

    let listed = facade.list().await.expect("list aliases");
    assert_eq!(listed.hme_emails.len(), 1);
    assert_eq!(listed.hme_emails[0].hme, "quiet.heron@relay.example");
    assert_eq!(listed.selected_forward_to.as_deref(), Some("me@example.com"));
}

#[tokio::test]
async fn generate_failure_raises_the_generate_specific_error() {
    let (base, _state) = spawn_mock().await;
    let client = authenticated_client(&base);
    let facade = HmeFacade::new(&client).expect("facade");

    let error = facade.generate().await.expect_err("rate limited upstream");
    assert!(matches!(error, FacadeError::Generate { message } if message == "rate limited"));
}

#[tokio::test]
async fn reserve_defaults_the_note_to_the_attribution_string() {
    let (base, _state) = spawn_mock().await;
    let client = authenticated_client(&base);
    let facade = HmeFacade::new(&client).expect("facade");

    let reserved = facade
        .reserve("quiet.heron@relay.example", "news", None)
        .await
        .expect("reserve alias");
    assert_eq!(reserved.hme, "quiet.heron@relay.example");
    assert_eq!(reserved.label, "news");
    assert_eq!(reserved.note, DEFAULT_RESERVE_NOTE);
}

#[tokio::test]
async fn deactivate_failure_raises_the_deactivate_specific_error() {
    let (base, _state) = spawn_mock().await;
    let client = authenticated_client(&base);
    let facade = HmeFacade::new(&client).expect("facade");

    let error = facade.deactivate("anon-9").await.expect_err("not found");
    assert!(matches!(error, FacadeError::Deactivate { message } if message == "alias not found"));
}

#[tokio::test]
async fn sign_out_resets_the_session_even_when_logout_fails() {
    let (base, state) = spawn_mock().await;
    let store = MemoryStore::new();
    let mut client = authenticated_client(&base);
    client.session().clone().persist(&store).await.expect("seed session");
    client.config().clone().persist(&store).await.expect("seed client state");

    client.sign_out(false, &store).await.expect("sign out");

    assert_eq!(state.logout_calls.load(Ordering::SeqCst), 1);
    assert!(!client.session().authenticated());
    assert!(client.session().headers.is_empty());

    let session = Session::load(&store).await.expect("reload session");
    assert_eq!(session, Session::default());
    assert_eq!(
        store.get(KEY_CLIENT_STATE).await.expect("client state key"),
        None
    );
}
