// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP handlers for the tool API.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::Value;

use crate::error::GraphError;
use crate::state::AppState;
use crate::tools::{ToolBox, ToolInfo};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub accounts: usize,
}

#[derive(Debug, Serialize)]
pub struct ToolListResponse {
    pub tools: &'static [ToolInfo],
}

#[derive(Debug, Serialize)]
pub struct ToolResultResponse {
    pub result: Value,
}

/// `GET /api/v1/health`
pub async fn health(State(s): State<Arc<AppState>>) -> impl IntoResponse {
    let accounts = match s.tools.broker().list_accounts().await {
        Ok(accounts) => accounts.len(),
        Err(e) => {
            tracing::warn!(err = %e, "health: could not read token cache");
            0
        }
    };
    let status = if s.shutdown.is_cancelled() { "shutting_down" } else { "running" };
    Json(HealthResponse { status: status.to_owned(), accounts })
}

/// `GET /api/v1/tools`
pub async fn list_tools() -> impl IntoResponse {
    Json(ToolListResponse { tools: ToolBox::catalogue() })
}

/// `POST /api/v1/tools/{name}` with the tool arguments as the JSON body.
pub async fn call_tool(
    State(s): State<Arc<AppState>>,
    Path(name): Path<String>,
    body: Bytes,
) -> Response {
    let args = if body.iter().all(u8::is_ascii_whitespace) {
        Value::Null
    } else {
        match serde_json::from_slice::<Value>(&body) {
            Ok(args) => args,
            Err(e) => return error_response(&GraphError::Validation(format!("invalid JSON: {e}"))),
        }
    };

    match s.tools.call(&name, args).await {
        Ok(result) => Json(ToolResultResponse { result }).into_response(),
        Err(e) => {
            tracing::warn!(tool = %name, err = %e, "tool call failed");
            error_response(&e)
        }
    }
}

fn error_response(err: &GraphError) -> Response {
    err.code().to_http_response(err.to_string()).into_response()
}
