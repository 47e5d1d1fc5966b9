// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Token broker: resolves access tokens per account, runs device flows and
//! persists the token cache.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, Mutex};

use crate::config::GraphConfig;
use crate::credential::cache::TokenCache;
use crate::credential::device_code::{
    exchange_device_code, initiate_device_auth, poll_device_code, PollOutcome,
};
use crate::credential::oauth::TokenResponse;
use crate::credential::refresh::do_refresh;
use crate::credential::session::{DeviceFlowOutcome, DeviceFlowSession};
use crate::credential::store::{ClientConfigFile, CredentialStore, FileStore};
use crate::credential::{epoch_secs, Account, CredentialEvent, SCOPES};
use crate::error::{GraphError, Result};
use crate::graph::TokenSource;

/// Construction parameters for [`TokenBroker`].
#[derive(Debug, Clone)]
pub struct BrokerSettings {
    /// Authority URL including the tenant, e.g. `https://login.microsoftonline.com/common`.
    pub authority: String,
    /// Client id that takes priority over `config.json`.
    pub client_id_override: Option<String>,
    /// Directory holding `config.json`.
    pub config_dir: PathBuf,
    /// Timeout for each identity provider call.
    pub timeout: Duration,
}

impl BrokerSettings {
    pub fn from_config(config: &GraphConfig) -> Self {
        Self {
            authority: config.authority(),
            client_id_override: config.client_id.clone(),
            config_dir: config.config_dir(),
            timeout: config.timeout(),
        }
    }
}

/// Owns the token cache and every exchange with the identity provider.
pub struct TokenBroker {
    store: Arc<dyn CredentialStore>,
    client_config: ClientConfigFile,
    client_id_override: Option<String>,
    authority: String,
    /// Serializes cache read-modify-write within the process.
    cache_lock: Mutex<()>,
    /// Device codes already redeemed through `complete_device_flow`, with
    /// their expiry. Entries are dropped once expired.
    completed: Mutex<HashMap<String, u64>>,
    event_tx: broadcast::Sender<CredentialEvent>,
    http: reqwest::Client,
}

impl TokenBroker {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        settings: BrokerSettings,
        event_tx: broadcast::Sender<CredentialEvent>,
    ) -> Arc<Self> {
        crate::ensure_crypto_provider();
        Arc::new(Self {
            store,
            client_config: ClientConfigFile::new(&settings.config_dir),
            client_id_override: settings
                .client_id_override
                .filter(|id| !id.trim().is_empty()),
            authority: settings.authority.trim_end_matches('/').to_owned(),
            cache_lock: Mutex::new(()),
            completed: Mutex::new(HashMap::new()),
            event_tx,
            http: reqwest::Client::builder().timeout(settings.timeout).build().unwrap_or_default(),
        })
    }

    /// Broker backed by `<config_dir>/token_cache.json`.
    pub fn from_config(
        config: &GraphConfig,
        event_tx: broadcast::Sender<CredentialEvent>,
    ) -> Arc<Self> {
        let store = Arc::new(FileStore::new(&config.config_dir()));
        Self::new(store, BrokerSettings::from_config(config), event_tx)
    }

    /// Number of redeemed device codes still remembered.
    pub async fn completed_flows(&self) -> usize {
        self.completed.lock().await.len()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CredentialEvent> {
        self.event_tx.subscribe()
    }

    fn device_code_url(&self) -> String {
        format!("{}/oauth2/v2.0/devicecode", self.authority)
    }

    fn token_url(&self) -> String {
        format!("{}/oauth2/v2.0/token", self.authority)
    }

    /// Resolve the application id: override first, then `config.json`.
    pub fn get_client_id(&self) -> Result<String> {
        if let Some(ref id) = self.client_id_override {
            return Ok(id.clone());
        }
        self.client_config.client_id()?.ok_or_else(|| {
            GraphError::Configuration(
                "no client id configured; set GRAPH_CLIENT_ID or call set_client_id".into(),
            )
        })
    }

    /// Persist a client id to `config.json` and return the id now in effect.
    pub fn set_client_id(&self, client_id: &str) -> Result<String> {
        let client_id = client_id.trim();
        if client_id.is_empty() {
            return Err(GraphError::Validation("client_id must not be empty".into()));
        }
        self.client_config.set_client_id(client_id)?;
        tracing::info!(path = %self.client_config.path().display(), "client id saved");
        self.get_client_id()
    }

    /// All cached accounts in cache order.
    pub async fn list_accounts(&self) -> Result<Vec<Account>> {
        let _guard = self.cache_lock.lock().await;
        Ok(self.load_cache()?.accounts())
    }

    /// Return a usable access token for `account_id` (or the first account).
    ///
    /// Tries the cached access token, then the refresh token, then falls back to
    /// an interactive device flow bounded by the code's lifetime.
    pub async fn get_token(&self, account_id: Option<&str>) -> Result<String> {
        let account_id = account_id.filter(|id| !id.is_empty());
        let client_id = self.get_client_id()?;

        {
            let _guard = self.cache_lock.lock().await;
            let mut cache = self.load_cache()?;
            let target = match account_id {
                Some(id) => Some(
                    cache
                        .find(id)
                        .cloned()
                        .ok_or_else(|| GraphError::AccountNotFound(id.to_owned()))?,
                ),
                None => cache.first().cloned(),
            };

            if let Some(account) = target {
                let now = epoch_secs();
                if let Some(token) = account.valid_access_token(now) {
                    return Ok(token.to_owned());
                }
                if let Some(ref refresh_token) = account.refresh_token {
                    match do_refresh(
                        &self.http,
                        &self.token_url(),
                        &client_id,
                        refresh_token,
                        SCOPES,
                    )
                    .await
                    {
                        Ok(token) => {
                            cache.store_refreshed(&account.home_account_id, &token, epoch_secs());
                            self.persist(&cache)?;
                            tracing::info!(account = %account.home_account_id, "token refreshed");
                            let _ = self.event_tx.send(CredentialEvent::TokenRefreshed {
                                account_id: account.home_account_id.clone(),
                            });
                            return Ok(token.access_token);
                        }
                        Err(e) => {
                            tracing::debug!(
                                account = %account.home_account_id,
                                err = %e,
                                "silent acquisition failed, falling back to device flow"
                            );
                        }
                    }
                }
            }
        }

        let token = self.run_device_flow(&client_id).await?;
        self.absorb(&token).await?;
        Ok(token.access_token)
    }

    /// Always run a device flow and add (or update) the resulting account.
    pub async fn authenticate_new_account(&self) -> Result<Option<Account>> {
        let client_id = self.get_client_id()?;
        let token = self.run_device_flow(&client_id).await?;
        self.absorb(&token).await.map(Some)
    }

    /// Start a device flow without waiting for the user.
    pub async fn begin_device_flow(&self) -> Result<DeviceFlowSession> {
        let client_id = self.get_client_id()?;
        let device =
            initiate_device_auth(&self.http, &self.device_code_url(), &client_id, SCOPES).await?;
        let session = DeviceFlowSession::from_response(device, epoch_secs());
        self.announce(&session);
        Ok(session)
    }

    /// Attempt to finish a started device flow with a single exchange.
    pub async fn complete_device_flow(
        &self,
        session: &DeviceFlowSession,
    ) -> Result<DeviceFlowOutcome> {
        if self.completed.lock().await.contains_key(&session.device_code) {
            return Err(GraphError::Authentication("device flow already completed".into()));
        }
        if session.is_expired(epoch_secs()) {
            return Err(GraphError::Authentication(
                "device code expired; start a new authentication".into(),
            ));
        }

        let client_id = self.get_client_id()?;
        let outcome =
            exchange_device_code(&self.http, &self.token_url(), &client_id, &session.device_code)
                .await?;
        let token = match outcome {
            PollOutcome::Pending | PollOutcome::SlowDown => return Ok(DeviceFlowOutcome::Pending),
            PollOutcome::Token(token) => token,
        };

        {
            let mut completed = self.completed.lock().await;
            let now = epoch_secs();
            completed.retain(|_, expires_at| *expires_at > now);
            if completed.insert(session.device_code.clone(), session.expires_at).is_some() {
                return Err(GraphError::Authentication("device flow already completed".into()));
            }
        }
        let account = self.absorb(&token).await?;
        Ok(DeviceFlowOutcome::Completed(account))
    }

    /// Request a device code and block until the user finishes or it expires.
    async fn run_device_flow(&self, client_id: &str) -> Result<TokenResponse> {
        let device =
            initiate_device_auth(&self.http, &self.device_code_url(), client_id, SCOPES).await?;
        let session = DeviceFlowSession::from_response(device, epoch_secs());
        self.announce(&session);

        poll_device_code(
            &self.http,
            &self.token_url(),
            client_id,
            &session.device_code,
            session.interval,
            session.expires_in,
        )
        .await
    }

    fn announce(&self, session: &DeviceFlowSession) {
        match session.message {
            Some(ref message) => tracing::info!("{message}"),
            None => tracing::info!(
                verification_uri = %session.verification_uri,
                user_code = %session.user_code,
                "sign in by visiting the verification uri and entering the code"
            ),
        }
        let _ = self.event_tx.send(CredentialEvent::DeviceCodeIssued {
            verification_uri: session.verification_uri.clone(),
            user_code: session.user_code.clone(),
            expires_in: session.expires_in,
        });
    }

    /// Record a freshly issued token and return the account it signed in.
    async fn absorb(&self, token: &TokenResponse) -> Result<Account> {
        let identity = token.identity()?;

        let _guard = self.cache_lock.lock().await;
        let mut cache = self.load_cache()?;
        let stored = cache.store_token(&identity, token, epoch_secs());
        self.persist(&cache)?;

        // The cached entry keeps an earlier username when this token carried none.
        let account = cache.find(&stored.account_id).map(|a| a.account()).unwrap_or(stored);

        tracing::info!(account = %account.account_id, "account authenticated");
        let _ = self
            .event_tx
            .send(CredentialEvent::AccountAuthenticated { account: account.clone() });
        Ok(account)
    }

    fn load_cache(&self) -> Result<TokenCache> {
        let Some(contents) = self.store.read()? else {
            return Ok(TokenCache::default());
        };
        match TokenCache::deserialize(&contents) {
            Ok(cache) => Ok(cache),
            Err(e) => {
                let moved_to = self.store.set_aside(epoch_secs())?;
                tracing::warn!(err = %e, moved_to = %moved_to, "token cache unreadable, starting empty");
                Ok(TokenCache::default())
            }
        }
    }

    fn persist(&self, cache: &TokenCache) -> Result<()> {
        if cache.has_state_changed() {
            self.store.write(&cache.serialize()?)?;
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl TokenSource for TokenBroker {
    async fn access_token(&self, account_id: Option<&str>) -> Result<String> {
        self.get_token(account_id).await
    }
}
