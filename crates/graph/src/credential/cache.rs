// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Serializable multi-account token cache.

use serde::{Deserialize, Serialize};

use crate::credential::oauth::{Identity, TokenResponse};
use crate::credential::Account;
use crate::error::Result;

const CACHE_VERSION: u32 = 1;

/// Seconds before expiry at which a cached access token is no longer handed out.
pub const ACCESS_TOKEN_BUFFER_SECS: u64 = 300;

/// All known accounts and their refresh material.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenCache {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub accounts: Vec<CachedAccount>,
    #[serde(skip)]
    changed: bool,
}

/// Cached state for a single account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedAccount {
    pub home_account_id: String,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<CachedAccessToken>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedAccessToken {
    pub secret: String,
    /// Expiry as epoch seconds.
    pub expires_at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scopes: Option<String>,
}

fn default_version() -> u32 {
    CACHE_VERSION
}

impl Default for TokenCache {
    fn default() -> Self {
        Self { version: CACHE_VERSION, accounts: Vec::new(), changed: false }
    }
}

impl CachedAccount {
    pub fn account(&self) -> Account {
        Account { username: self.username.clone(), account_id: self.home_account_id.clone() }
    }

    /// The cached access token, if it stays valid past the refresh buffer.
    pub fn valid_access_token(&self, now: u64) -> Option<&str> {
        self.access_token
            .as_ref()
            .filter(|t| t.expires_at > now.saturating_add(ACCESS_TOKEN_BUFFER_SECS))
            .map(|t| t.secret.as_str())
    }
}

impl TokenCache {
    pub fn deserialize(contents: &str) -> Result<Self> {
        Ok(serde_json::from_str(contents)?)
    }

    pub fn serialize(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Whether anything was modified since load.
    pub fn has_state_changed(&self) -> bool {
        self.changed
    }

    pub fn accounts(&self) -> Vec<Account> {
        self.accounts.iter().map(CachedAccount::account).collect()
    }

    pub fn find(&self, account_id: &str) -> Option<&CachedAccount> {
        self.accounts.iter().find(|a| a.home_account_id == account_id)
    }

    pub fn first(&self) -> Option<&CachedAccount> {
        self.accounts.first()
    }

    /// Record a token response for `identity`.
    ///
    /// An existing entry with the same account id is updated in place (keeping
    /// its position); otherwise the account is appended. A missing refresh
    /// token in the response keeps the previous one.
    pub fn store_token(&mut self, identity: &Identity, token: &TokenResponse, now: u64) -> Account {
        let access_token = CachedAccessToken {
            secret: token.access_token.clone(),
            expires_at: now.saturating_add(token.expires_in),
            scopes: token.scope.clone(),
        };

        match self.accounts.iter_mut().find(|a| a.home_account_id == identity.home_account_id) {
            Some(existing) => {
                if !identity.username.is_empty() {
                    existing.username = identity.username.clone();
                }
                if identity.tenant_id.is_some() {
                    existing.tenant_id = identity.tenant_id.clone();
                }
                if token.refresh_token.is_some() {
                    existing.refresh_token = token.refresh_token.clone();
                }
                existing.access_token = Some(access_token);
            }
            None => self.accounts.push(CachedAccount {
                home_account_id: identity.home_account_id.clone(),
                username: identity.username.clone(),
                tenant_id: identity.tenant_id.clone(),
                refresh_token: token.refresh_token.clone(),
                access_token: Some(access_token),
            }),
        }
        self.changed = true;

        Account { username: identity.username.clone(), account_id: identity.home_account_id.clone() }
    }

    /// Record a refreshed token for an account already in the cache.
    pub fn store_refreshed(&mut self, account_id: &str, token: &TokenResponse, now: u64) -> bool {
        let Some(existing) = self.accounts.iter_mut().find(|a| a.home_account_id == account_id)
        else {
            return false;
        };
        existing.access_token = Some(CachedAccessToken {
            secret: token.access_token.clone(),
            expires_at: now.saturating_add(token.expires_in),
            scopes: token.scope.clone(),
        });
        if token.refresh_token.is_some() {
            existing.refresh_token = token.refresh_token.clone();
        }
        self.changed = true;
        true
    }
}

#[cfg(test)]
#[path = "cache_tests.rs"]
mod tests;
