// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! OAuth 2.0 Device Authorization Grant (RFC 8628) helpers.

use std::time::Duration;

use crate::credential::oauth::{DeviceCodeResponse, ProviderError, TokenResponse};
use crate::error::{GraphError, Result};

/// Upper bound on how long a single device flow is polled.
pub const MAX_DEVICE_WAIT_SECS: u64 = 3600;

pub const DEVICE_CODE_GRANT: &str = "urn:ietf:params:oauth:grant-type:device_code";

/// Result of a single device code exchange.
#[derive(Debug, Clone)]
pub enum PollOutcome {
    /// The user has not finished signing in yet.
    Pending,
    /// Pending, and the provider asks for a longer polling interval.
    SlowDown,
    Token(Box<TokenResponse>),
}

/// Initiate device authorization by POSTing to the device auth endpoint.
pub async fn initiate_device_auth(
    client: &reqwest::Client,
    device_auth_url: &str,
    client_id: &str,
    scope: &str,
) -> Result<DeviceCodeResponse> {
    let resp = client
        .post(device_auth_url)
        .form(&[("client_id", client_id), ("scope", scope)])
        .send()
        .await
        .map_err(transport_error)?;

    let status = resp.status();
    let text = resp.text().await.map_err(transport_error)?;
    if !status.is_success() {
        let err = ProviderError::parse(status.as_u16(), &text);
        return Err(GraphError::Authentication(format!(
            "failed to get device code: {}",
            err.description()
        )));
    }

    let device: DeviceCodeResponse = serde_json::from_str(&text).map_err(|e| {
        GraphError::Authentication(format!("failed to get device code: malformed response: {e}"))
    })?;
    if device.user_code.is_empty() || device.device_code.is_empty() {
        let reason = match serde_json::from_str::<ProviderError>(&text) {
            Ok(err) if !err.error.is_empty() => err.description(),
            _ => "no user code returned".to_owned(),
        };
        return Err(GraphError::Authentication(format!("failed to get device code: {reason}")));
    }
    Ok(device)
}

/// Exchange the device code once.
///
/// `authorization_pending` and `slow_down` are normal intermediate states; any
/// other provider error is fatal for this flow.
pub async fn exchange_device_code(
    client: &reqwest::Client,
    token_url: &str,
    client_id: &str,
    device_code: &str,
) -> Result<PollOutcome> {
    let resp = client
        .post(token_url)
        .form(&[
            ("grant_type", DEVICE_CODE_GRANT),
            ("client_id", client_id),
            ("device_code", device_code),
            ("client_info", "1"),
        ])
        .send()
        .await
        .map_err(transport_error)?;

    let status = resp.status();
    let text = resp.text().await.map_err(transport_error)?;
    if status.is_success() {
        let token: TokenResponse = serde_json::from_str(&text).map_err(|e| {
            GraphError::Authentication(format!("malformed token response: {e}"))
        })?;
        return Ok(PollOutcome::Token(Box::new(token)));
    }

    let err = ProviderError::parse(status.as_u16(), &text);
    if err.is("authorization_pending") {
        return Ok(PollOutcome::Pending);
    }
    if err.is("slow_down") {
        return Ok(PollOutcome::SlowDown);
    }
    Err(GraphError::Authentication(err.description()))
}

/// Poll the token endpoint until the user completes authorization or the code expires.
pub async fn poll_device_code(
    client: &reqwest::Client,
    token_url: &str,
    client_id: &str,
    device_code: &str,
    interval: u64,
    expires_in: u64,
) -> Result<TokenResponse> {
    let mut poll_interval = Duration::from_secs(interval.max(1));
    let deadline =
        tokio::time::Instant::now() + Duration::from_secs(expires_in.min(MAX_DEVICE_WAIT_SECS));

    loop {
        tokio::time::sleep(poll_interval).await;

        if tokio::time::Instant::now() >= deadline {
            return Err(GraphError::Authentication(
                "device code expired before user completed authorization".into(),
            ));
        }

        match exchange_device_code(client, token_url, client_id, device_code).await? {
            PollOutcome::Token(token) => return Ok(*token),
            PollOutcome::Pending => continue,
            PollOutcome::SlowDown => {
                poll_interval += Duration::from_secs(5);
                continue;
            }
        }
    }
}

pub(crate) fn transport_error(e: reqwest::Error) -> GraphError {
    GraphError::TransientNetwork(format!("identity provider unreachable: {e}"))
}
