// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Named tools over the broker and the SharePoint/Excel operations.

use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::GraphConfig;
use crate::credential::broker::TokenBroker;
use crate::credential::session::{DeviceFlowOutcome, DeviceFlowSession};
use crate::error::{GraphError, Result};
use crate::graph::GraphClient;
use crate::ops::excel::Workbook;
use crate::ops::{drives, excel, sites, CallOptions};

/// Catalogue entry.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ToolInfo {
    pub name: &'static str,
    pub description: &'static str,
}

const CATALOGUE: &[ToolInfo] = &[
    ToolInfo {
        name: "set_client_id",
        description: "Save the application (client) id used for sign-in",
    },
    ToolInfo { name: "list_accounts", description: "List all signed-in Microsoft accounts" },
    ToolInfo {
        name: "authenticate_account",
        description: "Start device flow sign-in for a new account; returns a code and a flow_token",
    },
    ToolInfo {
        name: "complete_authentication",
        description: "Finish a device flow sign-in started by authenticate_account",
    },
    ToolInfo {
        name: "sharepoint_get_site",
        description: "Get a SharePoint site by hostname and relative path",
    },
    ToolInfo {
        name: "sharepoint_get_site_by_url",
        description: "Get a SharePoint site by URL (defaults to SHAREPOINT_SITE_URL)",
    },
    ToolInfo { name: "sharepoint_list_drives", description: "List document libraries of a site" },
    ToolInfo {
        name: "sharepoint_list_files",
        description: "List files and folders in a drive root or folder",
    },
    ToolInfo {
        name: "sharepoint_download_file",
        description: "Download a file; returns base64 content",
    },
    ToolInfo {
        name: "sharepoint_upload_file",
        description: "Upload a base64-encoded file of at most 4 MiB into a folder",
    },
    ToolInfo { name: "excel_list_worksheets", description: "List worksheets of a workbook" },
    ToolInfo { name: "excel_read_range", description: "Read a worksheet range" },
    ToolInfo { name: "excel_update_range", description: "Write values into a worksheet range" },
    ToolInfo { name: "excel_list_tables", description: "List tables on a worksheet" },
    ToolInfo { name: "excel_add_table_row", description: "Append rows to a worksheet table" },
];

#[derive(Debug, Deserialize)]
struct SetClientIdArgs {
    client_id: String,
}

#[derive(Debug, Deserialize)]
struct CompleteAuthArgs {
    flow_token: String,
}

/// Account and timeout fields shared by every Graph tool.
#[derive(Debug, Default, Deserialize)]
struct CallArgs {
    #[serde(default)]
    account_id: Option<String>,
    /// Seconds.
    #[serde(default)]
    timeout: Option<f64>,
}

impl CallArgs {
    fn options(&self, default_timeout: Option<Duration>) -> Result<CallOptions> {
        let timeout = match self.timeout {
            None => default_timeout,
            Some(secs) if secs > 0.0 => match Duration::try_from_secs_f64(secs) {
                Ok(timeout) => Some(timeout),
                Err(_) => return Err(invalid_timeout(secs)),
            },
            Some(secs) => return Err(invalid_timeout(secs)),
        };
        Ok(CallOptions::new(self.account_id.as_deref(), timeout))
    }
}

fn invalid_timeout(secs: f64) -> GraphError {
    GraphError::Validation(format!("timeout must be a positive number of seconds, got {secs}"))
}

#[derive(Debug, Deserialize)]
struct GetSiteArgs {
    hostname: String,
    relative_path: String,
    #[serde(flatten)]
    call: CallArgs,
}

#[derive(Debug, Deserialize)]
struct GetSiteByUrlArgs {
    #[serde(default)]
    url: Option<String>,
    #[serde(flatten)]
    call: CallArgs,
}

#[derive(Debug, Deserialize)]
struct ListDrivesArgs {
    site_id: String,
    #[serde(flatten)]
    call: CallArgs,
}

#[derive(Debug, Deserialize)]
struct ListFilesArgs {
    drive_id: String,
    #[serde(default)]
    item_id: Option<String>,
    #[serde(flatten)]
    call: CallArgs,
}

#[derive(Debug, Deserialize)]
struct ItemArgs {
    drive_id: String,
    item_id: String,
    #[serde(flatten)]
    call: CallArgs,
}

#[derive(Debug, Deserialize)]
struct UploadArgs {
    drive_id: String,
    parent_id: String,
    filename: String,
    content_b64: String,
    #[serde(flatten)]
    call: CallArgs,
}

#[derive(Debug, Deserialize)]
struct WorksheetArgs {
    drive_id: String,
    item_id: String,
    worksheet_name: String,
    #[serde(flatten)]
    call: CallArgs,
}

#[derive(Debug, Deserialize)]
struct RangeArgs {
    drive_id: String,
    item_id: String,
    worksheet_name: String,
    range_address: String,
    #[serde(default)]
    values: Option<Vec<Vec<Value>>>,
    #[serde(flatten)]
    call: CallArgs,
}

#[derive(Debug, Deserialize)]
struct TableRowArgs {
    drive_id: String,
    item_id: String,
    worksheet_name: String,
    table_name: String,
    values: Vec<Vec<Value>>,
    #[serde(flatten)]
    call: CallArgs,
}

/// Dispatches tool calls by name.
pub struct ToolBox {
    broker: Arc<TokenBroker>,
    graph: GraphClient,
    default_site_url: Option<String>,
    download_timeout: Duration,
}

impl ToolBox {
    pub fn new(
        broker: Arc<TokenBroker>,
        graph: GraphClient,
        default_site_url: Option<String>,
        download_timeout: Duration,
    ) -> Self {
        Self { broker, graph, default_site_url, download_timeout }
    }

    pub fn from_config(config: &GraphConfig, broker: Arc<TokenBroker>) -> Self {
        let graph = GraphClient::from_config(config, broker.clone());
        Self::new(broker, graph, config.sharepoint_site_url.clone(), config.download_timeout())
    }

    pub fn broker(&self) -> &Arc<TokenBroker> {
        &self.broker
    }

    pub fn catalogue() -> &'static [ToolInfo] {
        CATALOGUE
    }

    /// Invoke tool `name` with JSON `args`.
    pub async fn call(&self, name: &str, args: Value) -> Result<Value> {
        tracing::debug!(tool = name, "tool call");
        match name {
            "set_client_id" => {
                let a: SetClientIdArgs = parse_args(name, args)?;
                let client_id = self.broker.set_client_id(&a.client_id)?;
                Ok(json!({ "status": "saved", "client_id": client_id }))
            }
            "list_accounts" => to_value(self.broker.list_accounts().await?),
            "authenticate_account" => self.authenticate_account().await,
            "complete_authentication" => {
                let a: CompleteAuthArgs = parse_args(name, args)?;
                self.complete_authentication(&a.flow_token).await
            }
            "sharepoint_get_site" => {
                let a: GetSiteArgs = parse_args(name, args)?;
                let opts = a.call.options(None)?;
                to_value(sites::get_site(&self.graph, &a.hostname, &a.relative_path, &opts).await?)
            }
            "sharepoint_get_site_by_url" => {
                let a: GetSiteByUrlArgs = parse_args(name, args)?;
                let opts = a.call.options(None)?;
                let site = sites::get_site_by_url(
                    &self.graph,
                    a.url.as_deref(),
                    self.default_site_url.as_deref(),
                    &opts,
                )
                .await?;
                to_value(site)
            }
            "sharepoint_list_drives" => {
                let a: ListDrivesArgs = parse_args(name, args)?;
                let opts = a.call.options(None)?;
                to_value(drives::list_drives(&self.graph, &a.site_id, &opts).await?)
            }
            "sharepoint_list_files" => {
                let a: ListFilesArgs = parse_args(name, args)?;
                let opts = a.call.options(None)?;
                let items =
                    drives::list_drive_items(&self.graph, &a.drive_id, a.item_id.as_deref(), &opts)
                        .await?;
                to_value(items)
            }
            "sharepoint_download_file" => {
                let a: ItemArgs = parse_args(name, args)?;
                let opts = a.call.options(Some(self.download_timeout))?;
                let content =
                    drives::download_file(&self.graph, &a.drive_id, &a.item_id, &opts).await?;
                Ok(Value::String(STANDARD.encode(&content)))
            }
            "sharepoint_upload_file" => {
                let a: UploadArgs = parse_args(name, args)?;
                let opts = a.call.options(None)?;
                let data = STANDARD.decode(a.content_b64.trim()).map_err(|e| {
                    GraphError::Validation(format!("content_b64 is not valid base64: {e}"))
                })?;
                let item = drives::upload_small_file(
                    &self.graph,
                    &a.drive_id,
                    &a.parent_id,
                    &a.filename,
                    data.into(),
                    &opts,
                )
                .await?;
                to_value(item)
            }
            "excel_list_worksheets" => {
                let a: ItemArgs = parse_args(name, args)?;
                let opts = a.call.options(None)?;
                let workbook = Workbook { drive_id: &a.drive_id, item_id: &a.item_id };
                to_value(excel::list_worksheets(&self.graph, workbook, &opts).await?)
            }
            "excel_read_range" => {
                let a: RangeArgs = parse_args(name, args)?;
                let opts = a.call.options(None)?;
                let workbook = Workbook { drive_id: &a.drive_id, item_id: &a.item_id };
                let range = excel::get_range(
                    &self.graph,
                    workbook,
                    &a.worksheet_name,
                    &a.range_address,
                    &opts,
                )
                .await?;
                Ok(range.unwrap_or(Value::Null))
            }
            "excel_update_range" => {
                let a: RangeArgs = parse_args(name, args)?;
                let opts = a.call.options(None)?;
                let values = a.values.ok_or_else(|| {
                    GraphError::Validation("excel_update_range: missing field `values`".into())
                })?;
                let workbook = Workbook { drive_id: &a.drive_id, item_id: &a.item_id };
                let range = excel::update_range(
                    &self.graph,
                    workbook,
                    &a.worksheet_name,
                    &a.range_address,
                    values,
                    &opts,
                )
                .await?;
                Ok(range.unwrap_or(Value::Null))
            }
            "excel_list_tables" => {
                let a: WorksheetArgs = parse_args(name, args)?;
                let opts = a.call.options(None)?;
                let workbook = Workbook { drive_id: &a.drive_id, item_id: &a.item_id };
                to_value(excel::list_tables(&self.graph, workbook, &a.worksheet_name, &opts).await?)
            }
            "excel_add_table_row" => {
                let a: TableRowArgs = parse_args(name, args)?;
                let opts = a.call.options(None)?;
                let workbook = Workbook { drive_id: &a.drive_id, item_id: &a.item_id };
                let row = excel::add_table_row(
                    &self.graph,
                    workbook,
                    &a.worksheet_name,
                    &a.table_name,
                    a.values,
                    &opts,
                )
                .await?;
                Ok(row.unwrap_or(Value::Null))
            }
            other => Err(GraphError::Validation(format!("unknown tool: {other}"))),
        }
    }

    async fn authenticate_account(&self) -> Result<Value> {
        let session = self.broker.begin_device_flow().await?;
        let flow_token = session.encode()?;
        Ok(json!({
            "status": "authentication_required",
            "instructions": "To authenticate a new Microsoft account:",
            "step1": format!("Visit: {}", session.verification_uri),
            "step2": format!("Enter code: {}", session.user_code),
            "step3": "Sign in with the Microsoft account you want to add",
            "step4": "After signing in, call complete_authentication with the flow_token",
            "user_code": session.user_code,
            "verification_url": session.verification_uri,
            "expires_in_seconds": session.expires_in,
            "flow_token": flow_token,
        }))
    }

    async fn complete_authentication(&self, flow_token: &str) -> Result<Value> {
        let session = DeviceFlowSession::decode(flow_token)?;
        match self.broker.complete_device_flow(&session).await? {
            DeviceFlowOutcome::Pending => Ok(json!({
                "status": "pending",
                "message": "Authentication is still pending; the user has not finished signing in.",
                "instructions": format!(
                    "Visit {} and enter code {}, then call complete_authentication again.",
                    session.verification_uri, session.user_code
                ),
            })),
            DeviceFlowOutcome::Completed(account) => Ok(json!({
                "status": "success",
                "message": format!("Successfully authenticated {}", account.username),
                "username": account.username,
                "account_id": account.account_id,
            })),
        }
    }
}

fn parse_args<T: DeserializeOwned>(tool: &str, args: Value) -> Result<T> {
    let args = if args.is_null() { json!({}) } else { args };
    serde_json::from_value(args).map_err(|e| GraphError::Validation(format!("{tool}: {e}")))
}

fn to_value<T: Serialize>(value: T) -> Result<Value> {
    Ok(serde_json::to_value(value)?)
}

#[cfg(test)]
#[path = "tools_tests.rs"]
mod tests;
