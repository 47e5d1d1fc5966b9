// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::HashSet;
use std::path::Path;

use tokio::sync::broadcast;

use super::*;
use crate::credential::broker::BrokerSettings;
use crate::credential::store::MemoryStore;
use crate::test_support::StaticTokenSource;

/// Points at a closed local port so any network attempt fails fast.
const DEAD_URL: &str = "http://127.0.0.1:9";

fn toolbox(config_dir: &Path, client_id: Option<&str>) -> ToolBox {
    let (tx, _rx) = broadcast::channel(16);
    let broker = TokenBroker::new(
        Arc::new(MemoryStore::new()),
        BrokerSettings {
            authority: format!("{DEAD_URL}/common"),
            client_id_override: client_id.map(str::to_owned),
            config_dir: config_dir.to_path_buf(),
            timeout: Duration::from_secs(1),
        },
        tx,
    );
    let graph = GraphClient::new(format!("{DEAD_URL}/v1.0"), Arc::new(StaticTokenSource::new("t")));
    ToolBox::new(broker, graph, None, Duration::from_secs(5))
}

fn assert_validation(result: Result<Value>, needle: &str) {
    match result {
        Err(GraphError::Validation(msg)) => assert!(msg.contains(needle), "{msg:?} lacks {needle:?}"),
        other => panic!("expected validation error containing {needle:?}, got {other:?}"),
    }
}

#[test]
fn catalogue_lists_every_tool_once() {
    let names: Vec<_> = ToolBox::catalogue().iter().map(|t| t.name).collect();
    let unique: HashSet<_> = names.iter().collect();
    assert_eq!(names.len(), 15);
    assert_eq!(unique.len(), names.len());
    for expected in ["authenticate_account", "complete_authentication", "excel_list_tables"] {
        assert!(names.contains(&expected), "{expected} missing");
    }
    assert!(ToolBox::catalogue().iter().all(|t| !t.description.is_empty()));
}

#[tokio::test]
async fn unknown_tool_is_validation_error() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let tools = toolbox(dir.path(), Some("cid"));
    assert_validation(tools.call("send_email", json!({})).await, "unknown tool");
    Ok(())
}

#[tokio::test]
async fn missing_arguments_are_validation_errors() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let tools = toolbox(dir.path(), Some("cid"));
    assert_validation(tools.call("sharepoint_list_drives", json!({})).await, "site_id");
    assert_validation(tools.call("complete_authentication", Value::Null).await, "flow_token");
    assert_validation(
        tools
            .call(
                "excel_update_range",
                json!({"drive_id": "d", "item_id": "i", "worksheet_name": "S", "range_address": "A1"}),
            )
            .await,
        "values",
    );
    Ok(())
}

#[tokio::test]
async fn bad_base64_upload_is_rejected() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let tools = toolbox(dir.path(), Some("cid"));
    let args = json!({
        "drive_id": "d", "parent_id": "p", "filename": "f.txt", "content_b64": "***not base64***"
    });
    assert_validation(tools.call("sharepoint_upload_file", args).await, "base64");
    Ok(())
}

#[tokio::test]
async fn oversize_upload_fails_before_network() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let tools = toolbox(dir.path(), Some("cid"));
    let content = STANDARD.encode(vec![0u8; 5 * 1024 * 1024]);
    let args = json!({
        "drive_id": "d", "parent_id": "p", "filename": "big.bin", "content_b64": content
    });
    assert_validation(tools.call("sharepoint_upload_file", args).await, "limit");
    Ok(())
}

#[tokio::test]
async fn non_positive_timeout_is_rejected() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let tools = toolbox(dir.path(), Some("cid"));
    let args = json!({"drive_id": "d", "timeout": -1.0});
    assert_validation(tools.call("sharepoint_list_files", args).await, "timeout");
    Ok(())
}

#[tokio::test]
async fn garbage_flow_token_is_validation_error() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let tools = toolbox(dir.path(), Some("cid"));
    let result = tools.call("complete_authentication", json!({"flow_token": "%%%"})).await;
    assert_validation(result, "flow token");
    Ok(())
}

#[tokio::test]
async fn list_accounts_starts_empty() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let tools = toolbox(dir.path(), Some("cid"));
    assert_eq!(tools.call("list_accounts", json!({})).await?, json!([]));
    Ok(())
}

#[tokio::test]
async fn set_client_id_persists_and_resolves() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let tools = toolbox(dir.path(), None);
    assert!(matches!(tools.broker().get_client_id(), Err(GraphError::Configuration(_))));

    let result = tools.call("set_client_id", json!({"client_id": " app-123 "})).await?;
    assert_eq!(result["client_id"], "app-123");
    assert_eq!(tools.broker().get_client_id()?, "app-123");
    assert!(dir.path().join("config.json").exists());

    assert_validation(tools.call("set_client_id", json!({"client_id": ""})).await, "client_id");
    Ok(())
}

#[tokio::test]
async fn out_of_range_timeout_is_rejected() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let tools = toolbox(dir.path(), Some("cid"));
    for timeout in [1e30, f64::MAX] {
        let args = json!({"site_id": "s", "timeout": timeout});
        assert_validation(tools.call("sharepoint_list_drives", args).await, "timeout");
    }
    Ok(())
}
