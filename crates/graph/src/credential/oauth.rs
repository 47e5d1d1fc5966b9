// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! OAuth helper types and utilities.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::credential::DEFAULT_VERIFICATION_URI;
use crate::error::{GraphError, Result};

/// Token endpoint response (v2.0 endpoint).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    /// Base64url JSON `{"uid","utid"}`, returned when `client_info=1` is sent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_info: Option<String>,
}

/// RFC 8628 device authorization response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceCodeResponse {
    #[serde(default)]
    pub device_code: String,
    #[serde(default)]
    pub user_code: String,
    #[serde(default = "default_verification_uri", alias = "verification_url")]
    pub verification_uri: String,
    #[serde(default = "default_expires_in")]
    pub expires_in: u64,
    #[serde(default = "default_interval")]
    pub interval: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

fn default_verification_uri() -> String {
    DEFAULT_VERIFICATION_URI.to_owned()
}

fn default_expires_in() -> u64 {
    900
}

fn default_interval() -> u64 {
    5
}

/// Error body returned by the identity provider.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProviderError {
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub error_description: Option<String>,
}

impl ProviderError {
    /// Parse an error body, keeping the raw text when it is not JSON.
    pub fn parse(status: u16, text: &str) -> Self {
        serde_json::from_str::<ProviderError>(text).unwrap_or_else(|_| ProviderError {
            error: format!("http_{status}"),
            error_description: Some(text.to_owned()),
        })
    }

    pub fn is(&self, code: &str) -> bool {
        self.error == code
    }

    /// Provider description, falling back to the error code.
    pub fn description(&self) -> String {
        match self.error_description {
            Some(ref d) if !d.is_empty() => d.clone(),
            _ => self.error.clone(),
        }
    }
}

/// Claims read from the id token. The token is not verified; it only names
/// the account that was just issued a token by the provider over TLS.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IdTokenClaims {
    #[serde(default)]
    pub oid: Option<String>,
    #[serde(default)]
    pub tid: Option<String>,
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub preferred_username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ClientInfo {
    uid: String,
    utid: String,
}

/// Account identity derived from a token response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub home_account_id: String,
    pub username: String,
    pub tenant_id: Option<String>,
}

impl TokenResponse {
    pub fn id_token_claims(&self) -> Result<IdTokenClaims> {
        let Some(ref jwt) = self.id_token else {
            return Ok(IdTokenClaims::default());
        };
        let payload = jwt
            .split('.')
            .nth(1)
            .ok_or_else(|| GraphError::Authentication("malformed id token".into()))?;
        decode_b64_json(payload)
            .map_err(|e| GraphError::Authentication(format!("malformed id token: {e}")))
    }

    /// Resolve which account this token belongs to.
    ///
    /// Prefers `client_info` (`uid.utid`) and falls back to the id token's
    /// `oid.tid`.
    pub fn identity(&self) -> Result<Identity> {
        let claims = self.id_token_claims()?;
        let username = claims
            .preferred_username
            .clone()
            .or_else(|| claims.email.clone())
            .or_else(|| claims.sub.clone())
            .unwrap_or_default();

        if let Some(ref raw) = self.client_info {
            if let Ok(info) = decode_b64_json::<ClientInfo>(raw) {
                return Ok(Identity {
                    home_account_id: format!("{}.{}", info.uid, info.utid),
                    username,
                    tenant_id: Some(info.utid),
                });
            }
        }

        match (claims.oid, claims.tid) {
            (Some(oid), Some(tid)) => Ok(Identity {
                home_account_id: format!("{oid}.{tid}"),
                username,
                tenant_id: Some(tid),
            }),
            _ => Err(GraphError::Authentication(
                "token response does not identify an account (no client_info or id token)".into(),
            )),
        }
    }
}

/// Decode base64url (padding tolerated) JSON.
pub fn decode_b64_json<T: DeserializeOwned>(input: &str) -> anyhow::Result<T> {
    let bytes = URL_SAFE_NO_PAD.decode(input.trim().trim_end_matches('='))?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Encode a value as base64url JSON without padding.
pub fn encode_b64_json<T: Serialize>(value: &T) -> Result<String> {
    Ok(URL_SAFE_NO_PAD.encode(serde_json::to_vec(value)?))
}

#[cfg(test)]
#[path = "oauth_tests.rs"]
mod tests;
