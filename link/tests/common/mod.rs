#![allow(dead_code)]
//! In-process mock of the platform backend.
//!
//! Serves the auth endpoints and a few protected resources with the real
//! response envelope. Token pairs are issued as `A1/R1`, `A2/R2`, ... and
//! every refresh rotates both tokens.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tryout_link::{
    SessionEventHandlers, SessionExpiredNotice, SessionStorage, SessionStore, TryoutLinkClient,
    TryoutLinkTimeouts,
};

pub const PASSWORD: &str = "Passw0rd";

#[derive(Default)]
struct Tokens {
    issued: u32,
    valid_access: HashSet<String>,
    valid_refresh: HashSet<String>,
}

#[derive(Default)]
pub struct MockBackend {
    tokens: Mutex<Tokens>,
    user: Mutex<Value>,
    bearers: Mutex<Vec<(String, Option<String>)>>,
    refresh_fails: Mutex<bool>,
    refresh_delay: Mutex<Duration>,
    flaky_failures: AtomicU32,
    pub refresh_calls: AtomicU32,
    pub logout_calls: AtomicU32,
    pub me_calls: AtomicU32,
    pub flaky_calls: AtomicU32,
}

impl MockBackend {
    fn issue(&self) -> (String, String) {
        let mut tokens = self.tokens.lock();
        tokens.issued += 1;
        let access = format!("A{}", tokens.issued);
        let refresh = format!("R{}", tokens.issued);
        tokens.valid_access.insert(access.clone());
        tokens.valid_refresh.insert(refresh.clone());
        (access, refresh)
    }

    /// Make every access token issued so far invalid, as if they expired.
    pub fn expire_access_tokens(&self) {
        self.tokens.lock().valid_access.clear();
    }

    pub fn revoke_refresh_tokens(&self) {
        self.tokens.lock().valid_refresh.clear();
    }

    pub fn set_refresh_fails(&self, fails: bool) {
        *self.refresh_fails.lock() = fails;
    }

    pub fn set_refresh_delay(&self, delay: Duration) {
        *self.refresh_delay.lock() = delay;
    }

    /// Fail the next `count` calls to `/flaky` with a 503.
    pub fn set_flaky_failures(&self, count: u32) {
        self.flaky_failures.store(count, Ordering::SeqCst);
    }

    pub fn is_refresh_valid(&self, token: &str) -> bool {
        self.tokens.lock().valid_refresh.contains(token)
    }

    /// Bearer tokens seen on `path`, in request order.
    pub fn bearers_for(&self, path: &str) -> Vec<Option<String>> {
        self.bearers
            .lock()
            .iter()
            .filter(|(p, _)| p == path)
            .map(|(_, bearer)| bearer.clone())
            .collect()
    }

    pub fn refresh_count(&self) -> u32 {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    fn record(&self, path: &str, headers: &HeaderMap) -> Option<String> {
        let bearer = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::to_string);
        self.bearers.lock().push((path.to_string(), bearer.clone()));
        bearer
    }

    fn authorize(&self, path: &str, headers: &HeaderMap) -> Result<(), Response> {
        match self.record(path, headers) {
            Some(token) if self.tokens.lock().valid_access.contains(&token) => Ok(()),
            _ => Err(fail(StatusCode::UNAUTHORIZED, "Token expired", None)),
        }
    }
}

fn ok(data: Value) -> Response {
    (
        StatusCode::OK,
        Json(json!({ "success": true, "data": data, "timestamp": "2024-05-01T08:00:00Z" })),
    )
        .into_response()
}

fn fail(status: StatusCode, message: &str, errors: Option<Value>) -> Response {
    let mut body = json!({
        "success": false,
        "message": message,
        "timestamp": "2024-05-01T08:00:00Z",
    });
    if let Some(errors) = errors {
        body["errorCode"] = json!("VALIDATION_ERROR");
        body["errors"] = errors;
    }
    (status, Json(body)).into_response()
}

type Shared = State<Arc<MockBackend>>;

async fn login(State(backend): Shared, Json(body): Json<Value>) -> Response {
    if body["password"] != PASSWORD {
        return fail(StatusCode::UNAUTHORIZED, "Invalid email or password", None);
    }
    let (access, refresh) = backend.issue();
    let user = backend.user.lock().clone();
    ok(json!({ "user": user, "tokens": { "accessToken": access, "refreshToken": refresh } }))
}

async fn register(State(backend): Shared, Json(body): Json<Value>) -> Response {
    if body["email"] == "taken@x.com" {
        return fail(StatusCode::CONFLICT, "Email already registered", None);
    }
    if body["password"].as_str().map_or(true, |p| p.len() < 8) {
        return fail(
            StatusCode::UNPROCESSABLE_ENTITY,
            "Validation failed",
            Some(json!([{ "field": "password", "message": "Password must be at least 8 characters" }])),
        );
    }

    let user = json!({
        "id": 2,
        "email": body["email"],
        "name": body["name"],
        "role": body["role"].as_str().unwrap_or("participant"),
    });
    let (access, refresh) = backend.issue();
    ok(json!({ "user": user, "tokens": { "accessToken": access, "refreshToken": refresh } }))
}

async fn refresh(State(backend): Shared, Json(body): Json<Value>) -> Response {
    backend.refresh_calls.fetch_add(1, Ordering::SeqCst);
    let delay = *backend.refresh_delay.lock();
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    let presented = body["refreshToken"].as_str().unwrap_or_default().to_string();
    let accepted = !*backend.refresh_fails.lock()
        && backend.tokens.lock().valid_refresh.remove(&presented);
    if !accepted {
        return fail(StatusCode::UNAUTHORIZED, "Invalid refresh token", None);
    }

    let (access, refresh) = backend.issue();
    ok(json!({ "tokens": { "accessToken": access, "refreshToken": refresh } }))
}

async fn logout(State(backend): Shared, Json(body): Json<Value>) -> Response {
    backend.logout_calls.fetch_add(1, Ordering::SeqCst);
    if let Some(token) = body["refreshToken"].as_str() {
        backend.tokens.lock().valid_refresh.remove(token);
    }
    ok(json!({ "success": true }))
}

async fn me(State(backend): Shared, headers: HeaderMap) -> Response {
    backend.me_calls.fetch_add(1, Ordering::SeqCst);
    if let Err(denied) = backend.authorize("/me", &headers) {
        return denied;
    }
    let user = backend.user.lock().clone();
    ok(json!({ "user": user }))
}

async fn update_me(State(backend): Shared, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if let Err(denied) = backend.authorize("/me", &headers) {
        return denied;
    }
    let mut user = backend.user.lock();
    if let Some(name) = body.get("name") {
        user["name"] = name.clone();
    }
    if let Some(email) = body.get("email") {
        user["email"] = email.clone();
    }
    ok(json!({ "user": user.clone() }))
}

async fn exams(State(backend): Shared, headers: HeaderMap) -> Response {
    if let Err(denied) = backend.authorize("/exams", &headers) {
        return denied;
    }
    ok(json!([
        { "id": 1, "title": "Try-out Matematika" },
        { "id": 2, "title": "Try-out Fisika" }
    ]))
}

/// Checks the bearer only after a delay, so the token can go stale meanwhile.
async fn slow_exams(State(backend): Shared, headers: HeaderMap) -> Response {
    tokio::time::sleep(Duration::from_millis(150)).await;
    if let Err(denied) = backend.authorize("/exams/slow", &headers) {
        return denied;
    }
    ok(json!([{ "id": 3, "title": "Try-out Kimia" }]))
}

async fn missing_exam(State(backend): Shared, headers: HeaderMap) -> Response {
    if let Err(denied) = backend.authorize("/exams/999", &headers) {
        return denied;
    }
    fail(StatusCode::NOT_FOUND, "Exam not found", None)
}

async fn always_unauthorized(State(backend): Shared, headers: HeaderMap) -> Response {
    backend.record("/admin/reports", &headers);
    fail(StatusCode::UNAUTHORIZED, "Not allowed", None)
}

async fn public(State(backend): Shared, headers: HeaderMap) -> Response {
    backend.record("/public", &headers);
    ok(json!({ "status": "ok" }))
}

async fn flaky(State(backend): Shared) -> Response {
    backend.flaky_calls.fetch_add(1, Ordering::SeqCst);
    let remaining = backend.flaky_failures.load(Ordering::SeqCst);
    if remaining > 0 {
        backend.flaky_failures.store(remaining - 1, Ordering::SeqCst);
        return fail(StatusCode::SERVICE_UNAVAILABLE, "Try again later", None);
    }
    ok(json!({ "status": "recovered" }))
}

async fn rate_limited(State(backend): Shared) -> Response {
    backend.flaky_calls.fetch_add(1, Ordering::SeqCst);
    fail(StatusCode::TOO_MANY_REQUESTS, "Too many requests", None)
}

async fn closed_exam() -> Response {
    (
        StatusCode::OK,
        Json(json!({ "success": false, "message": "Exam is closed", "errorCode": "EXAM_CLOSED" })),
    )
        .into_response()
}

/// Start the mock on an ephemeral port. Returns its base URL and state.
pub async fn spawn_backend() -> (String, Arc<MockBackend>) {
    let backend = Arc::new(MockBackend::default());
    *backend.user.lock() = json!({
        "id": 1,
        "email": "a@x.com",
        "name": "Ayu",
        "role": "participant",
    });

    let app = Router::new()
        .route("/auth/login", post(login))
        .route("/auth/register", post(register))
        .route("/auth/refresh", post(refresh))
        .route("/auth/logout", post(logout))
        .route("/me", get(me).patch(update_me))
        .route("/exams", get(exams))
        .route("/exams/slow", get(slow_exams))
        .route("/exams/999", get(missing_exam))
        .route("/exams/closed", get(closed_exam))
        .route("/admin/reports", get(always_unauthorized))
        .route("/public", get(public))
        .route("/flaky", get(flaky))
        .route("/rate-limited", get(rate_limited))
        .with_state(backend.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock backend");
    let addr = listener.local_addr().expect("mock backend address");
    tokio::spawn(async move { axum::serve(listener, app).await.expect("serve mock backend") });

    (format!("http://{}", addr), backend)
}

/// Callback counters for session events.
#[derive(Default)]
pub struct EventLog {
    pub expired: Mutex<Vec<SessionExpiredNotice>>,
    pub redirects: Mutex<Vec<String>>,
    pub auth_changes: Mutex<Vec<bool>>,
}

impl EventLog {
    pub fn handlers(log: &Arc<Self>) -> SessionEventHandlers {
        let expired = log.clone();
        let redirects = log.clone();
        let changes = log.clone();
        SessionEventHandlers::new()
            .on_session_expired(move |notice| expired.expired.lock().push(notice))
            .on_login_required(move |path| redirects.redirects.lock().push(path.to_string()))
            .on_auth_change(move |authenticated| changes.auth_changes.lock().push(authenticated))
    }

    pub fn expired_count(&self) -> usize {
        self.expired.lock().len()
    }

    pub fn redirects(&self) -> Vec<String> {
        self.redirects.lock().clone()
    }
}

pub fn client_with(base_url: &str, session: SessionStore, events: &Arc<EventLog>) -> TryoutLinkClient {
    TryoutLinkClient::builder()
        .base_url(base_url)
        .timeouts(TryoutLinkTimeouts::fast())
        .session(session)
        .event_handlers(EventLog::handlers(events))
        .build()
        .expect("build client")
}

/// Client over fresh in-memory storage, plus its event log.
pub fn new_client(base_url: &str) -> (TryoutLinkClient, Arc<EventLog>) {
    let events = Arc::new(EventLog::default());
    let client = client_with(base_url, SessionStore::restore(SessionStorage::in_memory()), &events);
    (client, events)
}
