// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;
use std::time::Duration;

/// Default Microsoft Graph REST base.
pub const DEFAULT_GRAPH_BASE_URL: &str = "https://graph.microsoft.com/v1.0";

/// Default identity provider host.
pub const DEFAULT_AUTHORITY_HOST: &str = "https://login.microsoftonline.com";

/// Configuration for the Graph tool server.
#[derive(Debug, Clone, clap::Parser)]
#[command(name = "msgraph-tools", version, about)]
pub struct GraphConfig {
    /// Host to bind on.
    #[arg(long, default_value = "127.0.0.1", env = "GRAPH_MCP_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 9810, env = "GRAPH_MCP_PORT")]
    pub port: u16,

    /// Bearer token for the tool API. If unset, auth is disabled.
    #[arg(long, env = "GRAPH_MCP_AUTH_TOKEN")]
    pub auth_token: Option<String>,

    /// Application (client) id override. Takes priority over `config.json`.
    #[arg(long, env = "GRAPH_CLIENT_ID")]
    pub client_id: Option<String>,

    /// Tenant segment of the authority URL.
    #[arg(long, default_value = "common", env = "GRAPH_TENANT_ID")]
    pub tenant_id: String,

    /// Identity provider host.
    #[arg(long, default_value = DEFAULT_AUTHORITY_HOST, env = "GRAPH_AUTHORITY_HOST")]
    pub authority_host: String,

    /// Graph REST API base URL.
    #[arg(long, default_value = DEFAULT_GRAPH_BASE_URL, env = "GRAPH_BASE_URL")]
    pub graph_base_url: String,

    /// Default SharePoint site for `sharepoint_get_site_by_url`.
    #[arg(long, env = "SHAREPOINT_SITE_URL")]
    pub sharepoint_site_url: Option<String>,

    /// Directory holding `token_cache.json` and `config.json`.
    #[arg(long, env = "GRAPH_MCP_CONFIG_DIR")]
    pub config_dir: Option<PathBuf>,

    /// Extra attempts after the first for retryable failures.
    #[arg(long, default_value_t = 3, env = "GRAPH_MAX_RETRIES")]
    pub max_retries: u32,

    /// Per-request timeout in seconds.
    #[arg(long, default_value_t = 30, env = "GRAPH_TIMEOUT_SECS")]
    pub timeout_secs: u64,

    /// Per-request timeout in seconds for file downloads.
    #[arg(long, default_value_t = 60, env = "GRAPH_DOWNLOAD_TIMEOUT_SECS")]
    pub download_timeout_secs: u64,

    /// Log output format: `text` or `json`.
    #[arg(long, default_value = "text", env = "GRAPH_LOG_FORMAT")]
    pub log_format: String,
}

impl GraphConfig {
    /// Resolve the config directory.
    ///
    /// Uses `--config-dir` when set, then `$HOME/.microsoft-mcp`.
    pub fn config_dir(&self) -> PathBuf {
        match self.config_dir {
            Some(ref dir) => dir.clone(),
            None => default_config_dir(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }

    /// Full authority URL, e.g. `https://login.microsoftonline.com/common`.
    pub fn authority(&self) -> String {
        format!("{}/{}", self.authority_host.trim_end_matches('/'), self.tenant_id)
    }
}

fn default_config_dir() -> PathBuf {
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".microsoft-mcp");
    }
    PathBuf::from(".microsoft-mcp")
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
