// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test infrastructure: fake tokens, a recording sleeper and a
//! scriptable HTTP server standing in for Graph and the identity provider.

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::graph::{Sleeper, TokenSource};

/// Unsigned JWT carrying `oid`, `tid` and `preferred_username`.
pub fn fake_id_token(oid: &str, tid: &str, username: &str) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(
        json!({ "oid": oid, "tid": tid, "preferred_username": username, "sub": "subject" })
            .to_string(),
    );
    format!("{header}.{payload}.sig")
}

/// Base64url `client_info` as returned with `client_info=1`.
pub fn fake_client_info(uid: &str, utid: &str) -> String {
    URL_SAFE_NO_PAD.encode(json!({ "uid": uid, "utid": utid }).to_string())
}

/// Token endpoint success body for the given identity.
pub fn token_body(access_token: &str, oid: &str, tid: &str, username: &str) -> Value {
    json!({
        "token_type": "Bearer",
        "access_token": access_token,
        "refresh_token": format!("rt-{access_token}"),
        "expires_in": 3600,
        "scope": "https://graph.microsoft.com/.default",
        "id_token": fake_id_token(oid, tid, username),
        "client_info": fake_client_info(oid, tid),
    })
}

/// Device authorization success body.
pub fn device_code_body(device_code: &str, user_code: &str) -> Value {
    json!({
        "device_code": device_code,
        "user_code": user_code,
        "verification_uri": "https://microsoft.com/devicelogin",
        "expires_in": 900,
        "interval": 1,
        "message": format!("Enter the code {user_code} at https://microsoft.com/devicelogin"),
    })
}

/// Convert any `Display` error into `anyhow::Error`.
pub trait AnyhowExt<T> {
    fn anyhow(self) -> anyhow::Result<T>;
}

impl<T, E: std::fmt::Display> AnyhowExt<T> for std::result::Result<T, E> {
    fn anyhow(self) -> anyhow::Result<T> {
        self.map_err(|e| anyhow::anyhow!("{e}"))
    }
}

/// Always hands out the same bearer token.
#[derive(Debug, Clone)]
pub struct StaticTokenSource {
    token: String,
}

impl StaticTokenSource {
    pub fn new(token: impl Into<String>) -> Self {
        Self { token: token.into() }
    }
}

#[async_trait::async_trait]
impl TokenSource for StaticTokenSource {
    async fn access_token(&self, _account_id: Option<&str>) -> Result<String> {
        Ok(self.token.clone())
    }
}

/// Records requested delays and returns immediately.
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    delays: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delays(&self) -> Vec<Duration> {
        lock(&self.delays).clone()
    }
}

#[async_trait::async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        lock(&self.delays).push(duration);
    }
}

/// Canned response for [`MockServer`].
#[derive(Debug, Clone)]
pub struct MockResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    /// Held back this long before answering.
    pub delay: Option<Duration>,
}

impl MockResponse {
    pub fn json(status: u16, body: Value) -> Self {
        Self {
            status,
            headers: vec![("content-type".into(), "application/json".into())],
            body: body.to_string().into_bytes(),
            delay: None,
        }
    }

    pub fn bytes(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: vec![("content-type".into(), "application/octet-stream".into())],
            body: body.into(),
            delay: None,
        }
    }

    pub fn empty(status: u16) -> Self {
        Self { status, headers: Vec::new(), body: Vec::new(), delay: None }
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_owned(), value.to_owned()));
        self
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

/// A request seen by [`MockServer`].
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    /// Lowercase header names.
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// Decoded query parameters.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        decode_pairs(self.query.as_deref().unwrap_or_default())
    }

    /// Decoded `application/x-www-form-urlencoded` body.
    pub fn form(&self) -> HashMap<String, String> {
        decode_pairs(&String::from_utf8_lossy(&self.body)).into_iter().collect()
    }

    pub fn json(&self) -> Option<Value> {
        serde_json::from_slice(&self.body).ok()
    }
}

fn decode_pairs(encoded: &str) -> Vec<(String, String)> {
    match reqwest::Url::parse(&format!("http://local/?{encoded}")) {
        Ok(url) => url.query_pairs().into_owned().collect(),
        Err(_) => Vec::new(),
    }
}

#[derive(Default)]
struct MockState {
    /// Keyed by `(METHOD, path)`. The last response of a queue repeats.
    routes: Mutex<HashMap<(String, String), VecDeque<MockResponse>>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

/// Scriptable HTTP server on an ephemeral local port.
///
/// Unscripted routes answer 404. Stops when dropped.
pub struct MockServer {
    addr: SocketAddr,
    state: Arc<MockState>,
    shutdown: CancellationToken,
}

impl MockServer {
    pub async fn start() -> anyhow::Result<Self> {
        let state = Arc::new(MockState::default());
        let router = Router::new().fallback(mock_handler).with_state(Arc::clone(&state));
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let shutdown = CancellationToken::new();
        let stop = shutdown.clone();
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).with_graceful_shutdown(stop.cancelled_owned()).await;
        });
        Ok(Self { addr, state, shutdown })
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Queue responses for `method path`, served in order.
    pub fn on(&self, method: &str, path: &str, responses: Vec<MockResponse>) {
        lock(&self.state.routes)
            .entry((method.to_ascii_uppercase(), path.to_owned()))
            .or_default()
            .extend(responses);
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock(&self.state.requests).clone()
    }

    /// Requests that hit `method path`.
    pub fn requests_to(&self, method: &str, path: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.method.eq_ignore_ascii_case(method) && r.path == path)
            .collect()
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn mock_handler(
    State(state): State<Arc<MockState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let path = uri.path().to_owned();
    let recorded = RecordedRequest {
        method: method.as_str().to_owned(),
        path: path.clone(),
        query: uri.query().map(str::to_owned),
        headers: headers
            .iter()
            .map(|(k, v)| (k.as_str().to_owned(), v.to_str().unwrap_or_default().to_owned()))
            .collect(),
        body: body.to_vec(),
    };
    lock(&state.requests).push(recorded);

    let next = {
        let mut routes = lock(&state.routes);
        match routes.get_mut(&(method.as_str().to_owned(), path)) {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().cloned(),
            None => None,
        }
    };
    let Some(canned) = next else {
        return (StatusCode::NOT_FOUND, "no mock route").into_response();
    };

    if let Some(delay) = canned.delay {
        tokio::time::sleep(delay).await;
    }
    let mut response = canned.body.into_response();
    *response.status_mut() = StatusCode::from_u16(canned.status).unwrap_or(StatusCode::OK);
    for (name, value) in canned.headers {
        if let (Ok(name), Ok(value)) =
            (HeaderName::try_from(name.as_str()), HeaderValue::try_from(value.as_str()))
        {
            response.headers_mut().insert(name, value);
        }
    }
    response
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}
