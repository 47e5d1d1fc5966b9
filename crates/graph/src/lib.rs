// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! msgraph-tools: SharePoint and Excel tools over Microsoft Graph with
//! multi-account device-flow credentials.

pub mod config;
pub mod credential;
pub mod error;
pub mod graph;
pub mod ops;
pub mod state;
pub mod test_support;
pub mod tools;
pub mod transport;

use std::sync::{Arc, Once};

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::config::GraphConfig;
use crate::credential::broker::TokenBroker;
use crate::credential::CredentialEvent;
use crate::state::AppState;
use crate::tools::ToolBox;
use crate::transport::build_router;

/// Install the ring crypto provider for rustls once per process.
pub fn ensure_crypto_provider() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

/// Run the tool server until shutdown.
pub async fn run(config: GraphConfig) -> anyhow::Result<()> {
    ensure_crypto_provider();
    let addr = format!("{}:{}", config.host, config.port);
    let (event_tx, event_rx) = broadcast::channel(64);
    let broker = TokenBroker::from_config(&config, event_tx);
    broker.get_client_id().context(
        "no client id; set GRAPH_CLIENT_ID or write client_id to config.json in the config dir",
    )?;

    let tools = ToolBox::from_config(&config, broker);
    let state =
        Arc::new(AppState::new(tools, config.auth_token.clone(), CancellationToken::new()));
    spawn_event_logger(event_rx, state.shutdown.clone());

    {
        let shutdown = state.shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("shutdown requested");
            }
            shutdown.cancel();
        });
    }

    let listener = TcpListener::bind(&addr).await?;
    if config.auth_token.is_some() {
        tracing::info!("msgraph-tools listening on {addr} (auth enabled)");
    } else {
        tracing::info!("msgraph-tools listening on {addr}");
    }
    tracing::info!(config_dir = %config.config_dir().display(), "token cache location");
    let shutdown = state.shutdown.clone();
    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;

    Ok(())
}

/// Log credential events until the channel closes or shutdown.
fn spawn_event_logger(
    mut rx: broadcast::Receiver<CredentialEvent>,
    shutdown: CancellationToken,
) {
    tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                _ = shutdown.cancelled() => break,
                event = rx.recv() => event,
            };
            match event {
                Ok(CredentialEvent::DeviceCodeIssued { verification_uri, user_code, expires_in }) => {
                    tracing::info!(%verification_uri, %user_code, expires_in, "device code issued");
                }
                Ok(CredentialEvent::AccountAuthenticated { account }) => {
                    tracing::info!(account = %account.account_id, username = %account.username, "account signed in");
                }
                Ok(CredentialEvent::TokenRefreshed { account_id }) => {
                    tracing::debug!(account = %account_id, "access token refreshed");
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::debug!(skipped = n, "event logger lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}
