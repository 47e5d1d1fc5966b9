// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Credential brokering: multi-account token cache with device-flow sign-in.
//!
//! The broker resolves a bearer token for every outbound Graph call. Accounts
//! live in a single serialized cache behind a [`store::CredentialStore`];
//! tokens are refreshed silently when the cache holds a refresh token and
//! obtained through the OAuth device flow otherwise.

pub mod broker;
pub mod cache;
pub mod device_code;
pub mod oauth;
pub mod refresh;
pub mod session;
pub mod store;

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Scopes requested for every token. `.default` covers the app registration's
/// configured Graph permissions; the rest yield a refresh token and id token.
pub const SCOPES: &str = "https://graph.microsoft.com/.default offline_access openid profile";

/// Cache file name inside the config directory.
pub const TOKEN_CACHE_FILE: &str = "token_cache.json";

/// Client id config file name inside the config directory.
pub const CLIENT_CONFIG_FILE: &str = "config.json";

/// Fallback verification page when the provider omits one.
pub const DEFAULT_VERIFICATION_URI: &str = "https://microsoft.com/devicelogin";

/// One signed-in identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Display name (usually the UPN). Not guaranteed unique.
    pub username: String,
    /// Stable lookup key (`<object id>.<tenant id>`).
    pub account_id: String,
}

/// Events emitted by the token broker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CredentialEvent {
    /// A device flow started; the user must visit the URI and enter the code.
    DeviceCodeIssued { verification_uri: String, user_code: String, expires_in: u64 },
    /// A device flow finished and the account is now in the cache.
    AccountAuthenticated { account: Account },
    /// A cached refresh token was redeemed.
    TokenRefreshed { account_id: String },
}

pub fn epoch_secs() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}
