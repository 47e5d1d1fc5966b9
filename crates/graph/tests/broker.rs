// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Integration tests for the token broker against a mock identity provider.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::sync::broadcast;

use msgraph_tools::credential::broker::{BrokerSettings, TokenBroker};
use msgraph_tools::credential::cache::TokenCache;
use msgraph_tools::credential::device_code::poll_device_code;
use msgraph_tools::credential::oauth::{Identity, TokenResponse};
use msgraph_tools::credential::session::{DeviceFlowOutcome, DeviceFlowSession};
use msgraph_tools::credential::store::{CredentialStore, FileStore, MemoryStore};
use msgraph_tools::credential::{epoch_secs, CredentialEvent};
use msgraph_tools::error::GraphError;
use msgraph_tools::test_support::{
    device_code_body, fake_client_info, token_body, MockResponse, MockServer,
};

const DEVICE_PATH: &str = "/common/oauth2/v2.0/devicecode";
const TOKEN_PATH: &str = "/common/oauth2/v2.0/token";

struct Harness {
    mock: MockServer,
    store: Arc<dyn CredentialStore>,
    broker: Arc<TokenBroker>,
    events: broadcast::Receiver<CredentialEvent>,
    _dir: tempfile::TempDir,
}

async fn harness_with(store: Arc<dyn CredentialStore>, client_id: Option<&str>) -> anyhow::Result<Harness> {
    let mock = MockServer::start().await?;
    let dir = tempfile::tempdir()?;
    let (tx, events) = broadcast::channel(64);
    let broker = TokenBroker::new(
        Arc::clone(&store),
        BrokerSettings {
            authority: format!("{}/common", mock.url()),
            client_id_override: client_id.map(str::to_owned),
            config_dir: dir.path().to_path_buf(),
            timeout: Duration::from_secs(5),
        },
        tx,
    );
    Ok(Harness { mock, store, broker, events, _dir: dir })
}

async fn harness(store: Arc<dyn CredentialStore>) -> anyhow::Result<Harness> {
    harness_with(store, Some("client-123")).await
}

/// Serialized cache holding one account.
fn cache_with(id: &str, username: &str, access_expires_in: u64, refresh: Option<&str>) -> anyhow::Result<String> {
    let mut cache = TokenCache::default();
    cache.store_token(
        &Identity {
            home_account_id: id.to_owned(),
            username: username.to_owned(),
            tenant_id: Some("tid".to_owned()),
        },
        &TokenResponse {
            access_token: format!("cached-{id}"),
            refresh_token: refresh.map(str::to_owned),
            expires_in: access_expires_in,
            token_type: None,
            scope: None,
            id_token: None,
            client_info: None,
        },
        epoch_secs(),
    );
    Ok(cache.serialize()?)
}

fn drain(rx: &mut broadcast::Receiver<CredentialEvent>) -> Vec<CredentialEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn pending() -> MockResponse {
    MockResponse::json(
        400,
        json!({"error": "authorization_pending", "error_description": "AADSTS70016: pending"}),
    )
}

#[tokio::test]
async fn warm_cache_returns_without_device_flow() -> anyhow::Result<()> {
    let store = Arc::new(MemoryStore::with_content(cache_with("oid-1.tid", "alice", 3600, Some("rt"))?));
    let mut h = harness(store).await?;

    let token = h.broker.get_token(None).await?;

    assert_eq!(token, "cached-oid-1.tid");
    assert!(h.mock.requests().is_empty());
    assert!(drain(&mut h.events).is_empty());
    Ok(())
}

#[tokio::test]
async fn unknown_account_is_not_found() -> anyhow::Result<()> {
    let store = Arc::new(MemoryStore::with_content(cache_with("oid-1.tid", "alice", 3600, Some("rt"))?));
    let h = harness(store).await?;

    let err = h.broker.get_token(Some("someone-else.tid")).await;

    assert!(matches!(err, Err(GraphError::AccountNotFound(ref id)) if id == "someone-else.tid"));
    assert!(h.mock.requests().is_empty());
    Ok(())
}

#[tokio::test]
async fn expired_token_is_refreshed_silently() -> anyhow::Result<()> {
    // Inside the 300s buffer, so the cached access token is not used.
    let store = Arc::new(MemoryStore::with_content(cache_with("oid-1.tid", "alice", 60, Some("rt-old"))?));
    let mut h = harness(store).await?;
    h.mock.on(
        "POST",
        TOKEN_PATH,
        vec![MockResponse::json(200, json!({
            "access_token": "fresh", "refresh_token": "rt-new", "expires_in": 3600
        }))],
    );

    let token = h.broker.get_token(Some("oid-1.tid")).await?;

    assert_eq!(token, "fresh");
    let form = h.mock.requests()[0].form();
    assert_eq!(form.get("grant_type").map(String::as_str), Some("refresh_token"));
    assert_eq!(form.get("refresh_token").map(String::as_str), Some("rt-old"));
    assert_eq!(form.get("client_id").map(String::as_str), Some("client-123"));

    let saved = TokenCache::deserialize(&h.store.read()?.unwrap_or_default())?;
    assert_eq!(saved.accounts[0].refresh_token.as_deref(), Some("rt-new"));
    assert!(drain(&mut h.events)
        .iter()
        .any(|e| matches!(e, CredentialEvent::TokenRefreshed { account_id } if account_id == "oid-1.tid")));

    // Second call is served from the refreshed cache.
    assert_eq!(h.broker.get_token(None).await?, "fresh");
    assert_eq!(h.mock.requests().len(), 1);
    Ok(())
}

#[tokio::test]
async fn failed_refresh_falls_back_to_device_flow() -> anyhow::Result<()> {
    let store = Arc::new(MemoryStore::with_content(cache_with("oid-1.tid", "alice", 0, Some("rt-revoked"))?));
    let mut h = harness(store).await?;
    h.mock.on("POST", DEVICE_PATH, vec![MockResponse::json(200, device_code_body("dev-1", "ABCD"))]);
    h.mock.on(
        "POST",
        TOKEN_PATH,
        vec![
            MockResponse::json(400, json!({"error": "invalid_grant", "error_description": "revoked"})),
            MockResponse::json(200, token_body("interactive", "oid-1", "tid", "alice@contoso.com")),
        ],
    );

    let token = h.broker.get_token(None).await?;

    assert_eq!(token, "interactive");
    let events = drain(&mut h.events);
    assert!(events.iter().any(|e| matches!(e, CredentialEvent::DeviceCodeIssued { user_code, .. } if user_code == "ABCD")));
    let grants: Vec<String> = h
        .mock
        .requests_to("POST", TOKEN_PATH)
        .iter()
        .filter_map(|r| r.form().get("grant_type").cloned())
        .collect();
    assert_eq!(grants, ["refresh_token", "urn:ietf:params:oauth:grant-type:device_code"]);
    Ok(())
}

#[tokio::test]
async fn authenticate_new_account_adds_without_duplicates() -> anyhow::Result<()> {
    let h = harness(Arc::new(MemoryStore::new())).await?;
    h.mock.on("POST", DEVICE_PATH, vec![MockResponse::json(200, device_code_body("dev", "CODE"))]);
    h.mock.on(
        "POST",
        TOKEN_PATH,
        vec![
            MockResponse::json(200, token_body("at-a", "oid-a", "tid", "alice@contoso.com")),
            MockResponse::json(200, token_body("at-b", "oid-b", "tid", "Bob@Contoso.com")),
            MockResponse::json(200, token_body("at-a2", "oid-a", "tid", "alice@contoso.com")),
        ],
    );

    let first = h.broker.authenticate_new_account().await?;
    let second = h.broker.authenticate_new_account().await?;
    let again = h.broker.authenticate_new_account().await?;

    assert_eq!(first.map(|a| a.account_id), Some("oid-a.tid".to_owned()));
    assert_eq!(second.map(|a| a.username), Some("Bob@Contoso.com".to_owned()));
    assert_eq!(again.map(|a| a.account_id), Some("oid-a.tid".to_owned()));

    let accounts = h.broker.list_accounts().await?;
    let ids: Vec<&str> = accounts.iter().map(|a| a.account_id.as_str()).collect();
    assert_eq!(ids, ["oid-a.tid", "oid-b.tid"]);

    // Re-authentication refreshed alice's token in place.
    assert_eq!(h.broker.get_token(Some("oid-a.tid")).await?, "at-a2");
    Ok(())
}

#[tokio::test]
async fn device_flow_pending_then_complete_then_no_replay() -> anyhow::Result<()> {
    let mut h = harness(Arc::new(MemoryStore::new())).await?;
    h.mock.on("POST", DEVICE_PATH, vec![MockResponse::json(200, device_code_body("dev-9", "WXYZ"))]);
    h.mock.on(
        "POST",
        TOKEN_PATH,
        vec![pending(), MockResponse::json(200, token_body("at", "oid-c", "tid", "carol@contoso.com"))],
    );

    let session = h.broker.begin_device_flow().await?;
    assert_eq!(session.user_code, "WXYZ");
    let token = session.encode()?;
    let session = DeviceFlowSession::decode(&token)?;

    assert_eq!(h.broker.complete_device_flow(&session).await?, DeviceFlowOutcome::Pending);

    let outcome = h.broker.complete_device_flow(&session).await?;
    let DeviceFlowOutcome::Completed(account) = outcome else {
        anyhow::bail!("expected completion, got {outcome:?}");
    };
    assert_eq!(account.username, "carol@contoso.com");
    assert_eq!(account.account_id, "oid-c.tid");
    assert!(drain(&mut h.events)
        .iter()
        .any(|e| matches!(e, CredentialEvent::AccountAuthenticated { .. })));

    let token_calls = h.mock.requests_to("POST", TOKEN_PATH).len();
    let replay = h.broker.complete_device_flow(&session).await;
    assert!(matches!(replay, Err(GraphError::Authentication(ref m)) if m.contains("already completed")));
    assert_eq!(h.mock.requests_to("POST", TOKEN_PATH).len(), token_calls);

    assert_eq!(h.broker.list_accounts().await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn slow_down_is_pending() -> anyhow::Result<()> {
    let h = harness(Arc::new(MemoryStore::new())).await?;
    h.mock.on("POST", DEVICE_PATH, vec![MockResponse::json(200, device_code_body("dev", "CODE"))]);
    h.mock.on("POST", TOKEN_PATH, vec![MockResponse::json(400, json!({"error": "slow_down"}))]);

    let session = h.broker.begin_device_flow().await?;
    assert_eq!(h.broker.complete_device_flow(&session).await?, DeviceFlowOutcome::Pending);
    Ok(())
}

#[tokio::test]
async fn provider_error_carries_description() -> anyhow::Result<()> {
    let h = harness(Arc::new(MemoryStore::new())).await?;
    h.mock.on("POST", DEVICE_PATH, vec![MockResponse::json(200, device_code_body("dev", "CODE"))]);
    h.mock.on(
        "POST",
        TOKEN_PATH,
        vec![MockResponse::json(
            400,
            json!({"error": "expired_token", "error_description": "AADSTS70020: code expired"}),
        )],
    );

    let session = h.broker.begin_device_flow().await?;
    let err = h.broker.complete_device_flow(&session).await;
    assert!(matches!(err, Err(GraphError::Authentication(ref m)) if m.contains("AADSTS70020")));
    Ok(())
}

#[tokio::test]
async fn expired_session_fails_locally() -> anyhow::Result<()> {
    let h = harness(Arc::new(MemoryStore::new())).await?;
    let session = DeviceFlowSession {
        device_code: "dev".into(),
        user_code: "CODE".into(),
        verification_uri: "https://microsoft.com/devicelogin".into(),
        expires_in: 900,
        interval: 5,
        expires_at: epoch_secs().saturating_sub(10),
        message: None,
    };

    let err = h.broker.complete_device_flow(&session).await;

    assert!(matches!(err, Err(GraphError::Authentication(ref m)) if m.contains("expired")));
    assert!(h.mock.requests().is_empty());
    Ok(())
}

#[tokio::test]
async fn missing_user_code_is_authentication_error() -> anyhow::Result<()> {
    let h = harness(Arc::new(MemoryStore::new())).await?;
    h.mock.on(
        "POST",
        DEVICE_PATH,
        vec![MockResponse::json(
            400,
            json!({"error": "invalid_client", "error_description": "AADSTS700016: unknown app"}),
        )],
    );

    let err = h.broker.begin_device_flow().await;
    assert!(matches!(err, Err(GraphError::Authentication(ref m)) if m.contains("AADSTS700016")));
    Ok(())
}

#[tokio::test]
async fn missing_client_id_is_configuration_error() -> anyhow::Result<()> {
    let h = harness_with(Arc::new(MemoryStore::new()), None).await?;
    assert!(matches!(h.broker.get_token(None).await, Err(GraphError::Configuration(_))));
    assert!(matches!(h.broker.begin_device_flow().await, Err(GraphError::Configuration(_))));
    assert!(h.mock.requests().is_empty());
    Ok(())
}

#[tokio::test]
async fn corrupt_cache_is_set_aside_not_overwritten() -> anyhow::Result<()> {
    let store = Arc::new(MemoryStore::with_content("{ not json"));
    let h = harness(store.clone()).await?;

    assert!(h.broker.list_accounts().await?.is_empty());
    assert_eq!(store.set_aside_contents(), ["{ not json"]);
    Ok(())
}

#[tokio::test]
async fn corrupt_cache_file_survives_next_sign_in() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let cache_path = dir.path().join("token_cache.json");
    std::fs::write(&cache_path, "{ not json")?;
    let h = harness(Arc::new(FileStore::new(dir.path()))).await?;
    h.mock.on("POST", DEVICE_PATH, vec![MockResponse::json(200, device_code_body("dev", "CODE"))]);
    h.mock.on(
        "POST",
        TOKEN_PATH,
        vec![MockResponse::json(200, token_body("at", "oid-e", "tid", "erin@contoso.com"))],
    );

    h.broker.authenticate_new_account().await?;

    let aside: Vec<_> = std::fs::read_dir(dir.path())?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.to_string_lossy().contains("token_cache.json.corrupt-"))
        .collect();
    assert_eq!(aside.len(), 1);
    assert_eq!(std::fs::read_to_string(&aside[0])?, "{ not json");
    assert_eq!(h.broker.list_accounts().await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn file_store_persists_across_brokers() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let store: Arc<dyn CredentialStore> = Arc::new(FileStore::new(&dir.path().join("nested")));
    let h = harness(Arc::clone(&store)).await?;
    h.mock.on("POST", DEVICE_PATH, vec![MockResponse::json(200, device_code_body("dev", "CODE"))]);
    h.mock.on(
        "POST",
        TOKEN_PATH,
        vec![MockResponse::json(200, token_body("at", "oid-d", "tid", "dana@contoso.com"))],
    );

    h.broker.authenticate_new_account().await?;
    assert!(dir.path().join("nested").join("token_cache.json").exists());

    let reopened = harness(store).await?;
    let accounts = reopened.broker.list_accounts().await?;
    assert_eq!(accounts.len(), 1);
    assert_eq!(accounts[0].username, "dana@contoso.com");
    assert_eq!(reopened.broker.get_token(None).await?, "at");
    assert!(reopened.mock.requests().is_empty());
    Ok(())
}

#[tokio::test]
async fn reauthenticating_older_account_reports_that_account() -> anyhow::Result<()> {
    let h = harness(Arc::new(MemoryStore::new())).await?;
    h.mock.on("POST", DEVICE_PATH, vec![MockResponse::json(200, device_code_body("dev", "CODE"))]);
    h.mock.on(
        "POST",
        TOKEN_PATH,
        vec![
            MockResponse::json(200, token_body("at-a", "oid-a", "tid", "alice@contoso.com")),
            MockResponse::json(200, token_body("at-b", "oid-b", "tid", "bob@contoso.com")),
            // No id token, so no username claim.
            MockResponse::json(200, json!({
                "access_token": "at-a2",
                "expires_in": 3600,
                "client_info": fake_client_info("oid-a", "tid"),
            })),
        ],
    );

    h.broker.authenticate_new_account().await?;
    h.broker.authenticate_new_account().await?;
    let again = h.broker.authenticate_new_account().await?;

    let Some(account) = again else {
        anyhow::bail!("expected an account");
    };
    assert_eq!(account.account_id, "oid-a.tid");
    assert_eq!(account.username, "alice@contoso.com");
    Ok(())
}

fn session_for(device_code: &str, lifetime_secs: u64) -> DeviceFlowSession {
    DeviceFlowSession {
        device_code: device_code.into(),
        user_code: "CODE".into(),
        verification_uri: "https://microsoft.com/devicelogin".into(),
        expires_in: lifetime_secs,
        interval: 1,
        expires_at: epoch_secs() + lifetime_secs,
        message: None,
    }
}

#[tokio::test]
async fn redeemed_device_codes_are_forgotten_after_expiry() -> anyhow::Result<()> {
    let h = harness(Arc::new(MemoryStore::new())).await?;
    h.mock.on(
        "POST",
        TOKEN_PATH,
        vec![MockResponse::json(200, token_body("at", "oid-f", "tid", "frank@contoso.com"))],
    );

    let short = session_for("dev-short", 2);
    h.broker.complete_device_flow(&short).await?;
    assert_eq!(h.broker.completed_flows().await, 1);

    tokio::time::sleep(Duration::from_millis(3100)).await;

    let long = session_for("dev-long", 900);
    h.broker.complete_device_flow(&long).await?;
    assert_eq!(h.broker.completed_flows().await, 1);

    let replay = h.broker.complete_device_flow(&long).await;
    assert!(matches!(replay, Err(GraphError::Authentication(ref m)) if m.contains("already completed")));
    Ok(())
}

#[tokio::test]
async fn device_polling_tolerates_huge_lifetime() -> anyhow::Result<()> {
    msgraph_tools::ensure_crypto_provider();
    let http = reqwest::Client::builder().build()?;
    let mock = MockServer::start().await?;
    mock.on(
        "POST",
        TOKEN_PATH,
        vec![MockResponse::json(200, token_body("at", "oid-g", "tid", "gus@contoso.com"))],
    );

    let token = poll_device_code(
        &http,
        &format!("{}{TOKEN_PATH}", mock.url()),
        "client-123",
        "dev",
        1,
        u64::MAX,
    )
    .await?;

    assert_eq!(token.access_token, "at");
    Ok(())
}
