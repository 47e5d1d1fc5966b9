// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Silent token acquisition via the refresh token grant.

use crate::credential::device_code::transport_error;
use crate::credential::oauth::{ProviderError, TokenResponse};
use crate::error::{GraphError, Result};

/// Redeem a refresh token for a fresh access token.
pub async fn do_refresh(
    client: &reqwest::Client,
    token_url: &str,
    client_id: &str,
    refresh_token: &str,
    scope: &str,
) -> Result<TokenResponse> {
    let resp = client
        .post(token_url)
        .form(&[
            ("grant_type", "refresh_token"),
            ("client_id", client_id),
            ("refresh_token", refresh_token),
            ("scope", scope),
            ("client_info", "1"),
        ])
        .send()
        .await
        .map_err(transport_error)?;

    let status = resp.status();
    let text = resp.text().await.map_err(transport_error)?;
    if !status.is_success() {
        let err = ProviderError::parse(status.as_u16(), &text);
        return Err(GraphError::Authentication(format!("refresh failed: {}", err.description())));
    }

    serde_json::from_str(&text)
        .map_err(|e| GraphError::Authentication(format!("malformed token response: {e}")))
}
