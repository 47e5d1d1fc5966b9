// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn only_transient_and_rate_limited_are_retryable() {
    assert!(GraphError::TransientNetwork("reset".into()).is_retryable());
    assert!(GraphError::RateLimited { retry_after_secs: 5, body: String::new() }.is_retryable());
    assert!(!GraphError::Upstream { status: 404, body: String::new() }.is_retryable());
    assert!(!GraphError::Authentication("denied".into()).is_retryable());
    assert!(!GraphError::Validation("too big".into()).is_retryable());
}

#[test]
fn codes_map_to_http_statuses() {
    let cases = [
        (GraphError::Configuration("x".into()), 500),
        (GraphError::AccountNotFound("x".into()), 404),
        (GraphError::Authentication("x".into()), 401),
        (GraphError::TransientNetwork("x".into()), 502),
        (GraphError::RateLimited { retry_after_secs: 1, body: String::new() }, 429),
        (GraphError::Validation("x".into()), 400),
        (GraphError::Upstream { status: 403, body: String::new() }, 502),
        (GraphError::Internal("x".into()), 500),
    ];
    for (err, status) in cases {
        assert_eq!(err.code().http_status(), status, "{err}");
    }
}

#[test]
fn error_body_carries_code_string() -> anyhow::Result<()> {
    let (status, json) = ErrorCode::AccountNotFound.to_http_response("no such account");
    assert_eq!(status, StatusCode::NOT_FOUND);
    let value = serde_json::to_value(&json.0)?;
    assert_eq!(value["error"]["code"], "ACCOUNT_NOT_FOUND");
    assert_eq!(value["error"]["message"], "no such account");
    Ok(())
}

#[test]
fn upstream_display_includes_status_and_body() {
    let err = GraphError::Upstream { status: 403, body: "accessDenied".into() };
    assert_eq!(err.to_string(), "graph api returned 403: accessDenied");
}
