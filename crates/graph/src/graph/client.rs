// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP client for the Graph REST API with retry and conditional headers.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use reqwest::header::{CONTENT_TYPE, RETRY_AFTER};
use reqwest::{Method, StatusCode, Url};

use crate::config::GraphConfig;
use crate::error::{GraphError, Result};
use crate::graph::retry::{
    parse_retry_after, Failure, DEFAULT_RETRY_AFTER_SECS, MAX_RETRY_AFTER_SECS,
};
use crate::graph::{RequestBody, RequestSpec, RetryPolicy, Sleeper, TokenSource, TokioSleeper};

const PREFER_TEXT_BODY: &str = "outlook.body-content-type=\"text\"";

/// Extra headers a request needs based on its method, query and body.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HeaderPolicy {
    /// `Prefer: outlook.body-content-type="text"`.
    pub prefer_text_body: bool,
    /// `ConsistencyLevel: eventual`, plus `$count=true` unless already set.
    pub eventual_consistency: bool,
    pub content_type: Option<&'static str>,
}

impl HeaderPolicy {
    pub fn for_request(spec: &RequestSpec) -> Self {
        let search = spec.query_value("$search").is_some();
        let mut policy = Self::default();

        if spec.method == Method::GET {
            let selects_body = spec.query_value("$select").is_some_and(|s| s.contains("body"));
            policy.prefer_text_body = search || selects_body;
        } else {
            policy.content_type = Some(match spec.body {
                Some(RequestBody::Json(_)) => "application/json",
                _ => "application/octet-stream",
            });
        }

        let filter = spec.query_value("$filter").unwrap_or_default();
        policy.eventual_consistency = search || filter.contains("contains(") || filter.contains("/any(");
        policy
    }
}

/// Authenticated Graph API client.
///
/// Holds no per-request state; clones share the connection pool.
#[derive(Clone)]
pub struct GraphClient {
    base_url: String,
    http: reqwest::Client,
    tokens: Arc<dyn TokenSource>,
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
    timeout: Duration,
}

impl GraphClient {
    pub fn new(base_url: impl Into<String>, tokens: Arc<dyn TokenSource>) -> Self {
        crate::ensure_crypto_provider();
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self {
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            http,
            tokens,
            policy: RetryPolicy::default(),
            sleeper: Arc::new(TokioSleeper),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn from_config(config: &GraphConfig, tokens: Arc<dyn TokenSource>) -> Self {
        Self::new(config.graph_base_url.clone(), tokens)
            .with_policy(RetryPolicy::new(config.max_retries))
            .with_timeout(config.timeout())
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Strip the base URL from a continuation link.
    pub fn relative_path<'a>(&self, link: &'a str) -> &'a str {
        link.strip_prefix(self.base_url.as_str()).unwrap_or(link)
    }

    /// Send a request and parse the JSON response. Empty bodies yield `None`.
    pub async fn send(&self, spec: &RequestSpec) -> Result<Option<serde_json::Value>> {
        let body = self.execute(spec).await?;
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        serde_json::from_slice(&body).map(Some).map_err(|e| {
            GraphError::Internal(format!("malformed response from {}: {e}", spec.path))
        })
    }

    /// Send a request and return the raw response body.
    pub async fn send_bytes(&self, spec: &RequestSpec) -> Result<Bytes> {
        self.execute(spec).await
    }

    async fn execute(&self, spec: &RequestSpec) -> Result<Bytes> {
        let policy = spec.max_retries.map(RetryPolicy::new).unwrap_or(self.policy);
        let headers = HeaderPolicy::for_request(spec);
        let url = self.url(spec, headers)?;

        let mut attempt = 0u32;
        loop {
            // Token is re-resolved per attempt so a refresh mid-retry is picked up.
            let token = self.tokens.access_token(spec.account_id.as_deref()).await?;
            let err = match self.attempt(spec, &url, headers, &token).await {
                Ok(body) => return Ok(body),
                Err(e) => e,
            };

            let Some(delay) = Failure::of(&err).and_then(|f| policy.next_delay(f, attempt)) else {
                return Err(err);
            };
            tracing::warn!(
                method = %spec.method,
                path = %spec.path,
                attempt = attempt + 1,
                max_attempts = policy.max_retries + 1,
                delay_secs = delay.as_secs(),
                err = %err,
                "graph request failed, retrying"
            );
            self.sleeper.sleep(delay).await;
            attempt += 1;
        }
    }

    async fn attempt(
        &self,
        spec: &RequestSpec,
        url: &Url,
        headers: HeaderPolicy,
        token: &str,
    ) -> Result<Bytes> {
        let mut req = self
            .http
            .request(spec.method.clone(), url.clone())
            .bearer_auth(token)
            .timeout(spec.timeout.unwrap_or(self.timeout));
        if headers.prefer_text_body {
            req = req.header("Prefer", PREFER_TEXT_BODY);
        }
        if headers.eventual_consistency {
            req = req.header("ConsistencyLevel", "eventual");
        }
        if let Some(content_type) = headers.content_type {
            req = req.header(CONTENT_TYPE, content_type);
        }
        match spec.body {
            Some(RequestBody::Json(ref value)) => {
                let body = serde_json::to_vec(value)?;
                req = req.body(body);
            }
            Some(RequestBody::Bytes(ref bytes)) => req = req.body(bytes.clone()),
            None => {}
        }

        let resp = req.send().await.map_err(|e| {
            GraphError::TransientNetwork(format!("{} {}: {e}", spec.method, spec.path))
        })?;

        let status = resp.status();
        if status.is_success() {
            return resp
                .bytes()
                .await
                .map_err(|e| GraphError::TransientNetwork(format!("reading {}: {e}", spec.path)));
        }

        let retry_after =
            parse_retry_after(resp.headers().get(RETRY_AFTER).and_then(|v| v.to_str().ok()));
        let body = resp.text().await.unwrap_or_default();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs =
                retry_after.unwrap_or(DEFAULT_RETRY_AFTER_SECS).min(MAX_RETRY_AFTER_SECS);
            return Err(GraphError::RateLimited { retry_after_secs, body });
        }
        if status.is_server_error() {
            return Err(GraphError::TransientNetwork(format!("graph api returned {status}: {body}")));
        }
        Err(GraphError::Upstream { status: status.as_u16(), body })
    }

    fn url(&self, spec: &RequestSpec, headers: HeaderPolicy) -> Result<Url> {
        let raw = if spec.path.starts_with("http://") || spec.path.starts_with("https://") {
            spec.path.clone()
        } else {
            format!("{}{}", self.base_url, spec.path)
        };
        let mut url = Url::parse(&raw)
            .map_err(|e| GraphError::Validation(format!("invalid request url {raw}: {e}")))?;

        let add_count = headers.eventual_consistency && spec.query_value("$count").is_none();
        if !spec.query.is_empty() || add_count {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &spec.query {
                pairs.append_pair(key, value);
            }
            if add_count {
                pairs.append_pair("$count", "true");
            }
        }
        Ok(url)
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
