// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Device flow session threaded between the start and complete tool calls.

use serde::{Deserialize, Serialize};

use crate::credential::oauth::{decode_b64_json, encode_b64_json, DeviceCodeResponse};
use crate::error::{GraphError, Result};

/// A started device flow, handed to the caller as an opaque `flow_token`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceFlowSession {
    pub device_code: String,
    pub user_code: String,
    pub verification_uri: String,
    pub expires_in: u64,
    #[serde(default = "default_interval")]
    pub interval: u64,
    /// Expiry as epoch seconds.
    pub expires_at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

fn default_interval() -> u64 {
    5
}

/// Outcome of a single completion attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceFlowOutcome {
    /// The user has not finished signing in; call again later.
    Pending,
    Completed(crate::credential::Account),
}

impl DeviceFlowSession {
    pub fn from_response(resp: DeviceCodeResponse, now: u64) -> Self {
        Self {
            expires_at: now.saturating_add(resp.expires_in),
            device_code: resp.device_code,
            user_code: resp.user_code,
            verification_uri: resp.verification_uri,
            expires_in: resp.expires_in,
            interval: resp.interval,
            message: resp.message,
        }
    }

    pub fn is_expired(&self, now: u64) -> bool {
        now >= self.expires_at
    }

    /// Encode as a base64url flow token.
    pub fn encode(&self) -> Result<String> {
        encode_b64_json(self)
    }

    /// Decode and validate a flow token.
    ///
    /// Accepts the base64url token produced by [`encode`](Self::encode) or the
    /// bare JSON object.
    pub fn decode(token: &str) -> Result<Self> {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(GraphError::Validation("flow token is empty".into()));
        }
        let session: Self = if trimmed.starts_with('{') {
            serde_json::from_str(trimmed)
                .map_err(|e| GraphError::Validation(format!("invalid flow token: {e}")))?
        } else {
            decode_b64_json(trimmed)
                .map_err(|e| GraphError::Validation(format!("invalid flow token: {e}")))?
        };
        session.validate()?;
        Ok(session)
    }

    fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("device_code", &self.device_code),
            ("user_code", &self.user_code),
            ("verification_uri", &self.verification_uri),
        ] {
            if value.trim().is_empty() {
                return Err(GraphError::Validation(format!("invalid flow token: empty {field}")));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
