#![allow(dead_code)]

//! In-process mock of the asset API used by the integration tests

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const USERNAME: &str = "alice";
pub const PASSWORD: &str = "secret";

#[derive(Default)]
pub struct MockApi {
    valid_access: Mutex<HashSet<String>>,
    valid_refresh: Mutex<HashSet<String>>,
    /// Authorization header of every call to `/assets`, in arrival order
    pub seen_authorization: Mutex<Vec<Option<String>>>,
    pub login_calls: AtomicUsize,
    pub refresh_calls: AtomicUsize,
    pub refresh_fails: AtomicBool,
    pub refresh_delay_ms: AtomicU64,
    issued: AtomicUsize,
}

impl MockApi {
    /// Server-side expiry of every access token issued so far
    pub fn expire_access_tokens(&self) {
        self.valid_access.lock().clear();
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<Option<String>> {
        self.seen_authorization.lock().clone()
    }

    fn issue_pair(&self) -> Value {
        let n = self.issued.fetch_add(1, Ordering::SeqCst);
        let access = forge_token(json!({
            "sub": "1",
            "username": USERNAME,
            "roles": ["admin"],
            "permissions": ["asset:view"],
            "type": "ACCESS",
            "jti": format!("access-{n}"),
            "exp": 4_102_444_800i64
        }));
        let refresh = format!("refresh-{n}");
        self.valid_access.lock().insert(access.clone());
        self.valid_refresh.lock().insert(refresh.clone());
        json!({
            "accessToken": access,
            "refreshToken": refresh,
            "expiresIn": 3600,
            "refreshExpiresIn": 604800
        })
    }

    fn is_authorized(&self, headers: &HeaderMap) -> bool {
        bearer_of(headers).is_some_and(|token| self.valid_access.lock().contains(&token))
    }
}

pub fn forge_token(claims: Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.bW9jay1zaWduYXR1cmU")
}

fn bearer_of(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string)
}

fn ok(data: Value) -> Response {
    Json(json!({"code": 0, "message": "OK", "data": data})).into_response()
}

fn failure(code: i64, message: &str) -> Json<Value> {
    Json(json!({"code": code, "message": message, "data": null}))
}

fn unauthorized(message: &str) -> Response {
    (StatusCode::UNAUTHORIZED, failure(401, message)).into_response()
}

async fn login(State(api): State<Arc<MockApi>>, Json(body): Json<Value>) -> Response {
    api.login_calls.fetch_add(1, Ordering::SeqCst);
    if body["username"] == USERNAME && body["password"] == PASSWORD {
        ok(api.issue_pair())
    } else {
        failure(1001, "Invalid username or password").into_response()
    }
}

async fn refresh(State(api): State<Arc<MockApi>>, Json(body): Json<Value>) -> Response {
    api.refresh_calls.fetch_add(1, Ordering::SeqCst);
    let delay = api.refresh_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }

    let token = body["refreshToken"].as_str().unwrap_or_default().to_string();
    if api.refresh_fails.load(Ordering::SeqCst) || !api.valid_refresh.lock().contains(&token) {
        return unauthorized("Refresh token expired");
    }
    ok(api.issue_pair())
}

async fn assets(State(api): State<Arc<MockApi>>, headers: HeaderMap) -> Response {
    api.seen_authorization.lock().push(bearer_of(&headers));
    if !api.is_authorized(&headers) {
        return unauthorized("Token expired");
    }
    ok(json!([
        {"id": 1, "name": "Laptop", "status": "IN_STOCK"},
        {"id": 2, "name": "Monitor", "status": "CHECKED_OUT"}
    ]))
}

async fn checkout(
    State(api): State<Arc<MockApi>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !api.is_authorized(&headers) {
        return unauthorized("Token expired");
    }
    if body["assetId"] == 2 {
        return failure(40001, "Asset already checked out").into_response();
    }
    ok(json!({"recordId": 77, "assetId": body["assetId"]}))
}

async fn always_unauthorized(State(api): State<Arc<MockApi>>, headers: HeaderMap) -> Response {
    api.seen_authorization.lock().push(bearer_of(&headers));
    unauthorized("Access denied")
}

async fn health() -> Response {
    Json(json!({"status": "UP"})).into_response()
}

async fn slow() -> Response {
    tokio::time::sleep(Duration::from_secs(5)).await;
    ok(Value::Null)
}

/// Start the mock on an ephemeral port; returns its state and API base URL
pub async fn spawn_mock() -> (Arc<MockApi>, String) {
    let api = Arc::new(MockApi::default());
    let app = Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/refresh", post(refresh))
        .route("/api/assets", get(assets))
        .route("/api/inventory/checkout", post(checkout))
        .route("/api/locked", get(always_unauthorized))
        .route("/api/health", get(health))
        .route("/api/slow", get(slow))
        .with_state(api.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind 127.0.0.1:0");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("mock server");
    });

    (api, format!("http://{addr}/api"))
}
