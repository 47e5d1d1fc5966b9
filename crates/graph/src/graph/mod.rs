// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Authenticated request engine for the Graph REST API.

pub mod client;
pub mod pager;
pub mod retry;

use std::time::Duration;

use bytes::Bytes;
use reqwest::Method;

use crate::error::Result;

pub use client::GraphClient;
pub use pager::{collect, Pager};
pub use retry::{RetryPolicy, Sleeper, TokioSleeper};

/// Supplies a bearer token for each outbound call.
#[async_trait::async_trait]
pub trait TokenSource: Send + Sync {
    /// Resolve an access token for `account_id`, or the default account.
    async fn access_token(&self, account_id: Option<&str>) -> Result<String>;
}

/// Request payload.
#[derive(Debug, Clone)]
pub enum RequestBody {
    Json(serde_json::Value),
    Bytes(Bytes),
}

/// One outbound call, built fresh per request.
#[derive(Debug, Clone)]
pub struct RequestSpec {
    pub method: Method,
    /// Path relative to the base URL, or an absolute URL.
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<RequestBody>,
    /// Overrides the client's default timeout.
    pub timeout: Option<Duration>,
    /// Overrides the client's retry budget.
    pub max_retries: Option<u32>,
    pub account_id: Option<String>,
}

impl RequestSpec {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            timeout: None,
            max_retries: None,
            account_id: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.body = Some(RequestBody::Json(body));
        self
    }

    pub fn bytes(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(RequestBody::Bytes(body.into()));
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    pub fn account(mut self, account_id: Option<&str>) -> Self {
        self.account_id = account_id.filter(|id| !id.is_empty()).map(str::to_owned);
        self
    }

    /// First value for a query parameter.
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }
}
