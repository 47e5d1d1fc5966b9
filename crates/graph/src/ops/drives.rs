// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Document libraries and drive items.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{GraphError, Result};
use crate::graph::{collect, GraphClient, RequestSpec};
use crate::ops::{encode_segment, parse_items, parse_value, require, CallOptions};

/// Largest payload accepted by the single-request upload endpoint.
pub const MAX_SMALL_UPLOAD_BYTES: usize = 4 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DriveSummary {
    pub id: String,
    pub name: Option<String>,
    pub drive_type: Option<String>,
    pub web_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    File,
    Folder,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DriveItemSummary {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ItemKind,
    pub size: Option<u64>,
    pub created_at: Option<String>,
    pub modified_at: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveDto {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    drive_type: Option<String>,
    #[serde(default)]
    web_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveItemDto {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    size: Option<u64>,
    #[serde(default)]
    created_date_time: Option<String>,
    #[serde(default)]
    last_modified_date_time: Option<String>,
    #[serde(default)]
    folder: Option<Value>,
}

impl From<DriveDto> for DriveSummary {
    fn from(value: DriveDto) -> Self {
        Self { id: value.id, name: value.name, drive_type: value.drive_type, web_url: value.web_url }
    }
}

impl From<DriveItemDto> for DriveItemSummary {
    fn from(value: DriveItemDto) -> Self {
        Self {
            id: value.id,
            name: value.name.unwrap_or_default(),
            kind: if value.folder.is_some() { ItemKind::Folder } else { ItemKind::File },
            size: value.size,
            created_at: value.created_date_time,
            modified_at: value.last_modified_date_time,
        }
    }
}

pub async fn list_drives(
    client: &GraphClient,
    site_id: &str,
    opts: &CallOptions,
) -> Result<Vec<DriveSummary>> {
    require("site_id", site_id)?;
    let path = format!("/sites/{}/drives", encode_segment(site_id));
    let values = collect(client, &path, opts.account_id(), opts.timeout).await?;
    let drives: Vec<DriveDto> = parse_items("drive", values)?;
    Ok(drives.into_iter().map(DriveSummary::from).collect())
}

/// Children of `item_id`, or of the drive root when no item is given.
pub async fn list_drive_items(
    client: &GraphClient,
    drive_id: &str,
    item_id: Option<&str>,
    opts: &CallOptions,
) -> Result<Vec<DriveItemSummary>> {
    require("drive_id", drive_id)?;
    let drive = encode_segment(drive_id);
    let path = match item_id.filter(|id| !id.trim().is_empty()) {
        Some(item) => format!("/drives/{drive}/items/{}/children", encode_segment(item)),
        None => format!("/drives/{drive}/root/children"),
    };
    let values = collect(client, &path, opts.account_id(), opts.timeout).await?;
    let items: Vec<DriveItemDto> = parse_items("drive item", values)?;
    Ok(items.into_iter().map(DriveItemSummary::from).collect())
}

pub async fn download_file(
    client: &GraphClient,
    drive_id: &str,
    item_id: &str,
    opts: &CallOptions,
) -> Result<Bytes> {
    require("drive_id", drive_id)?;
    require("item_id", item_id)?;
    let path =
        format!("/drives/{}/items/{}/content", encode_segment(drive_id), encode_segment(item_id));
    client.send_bytes(&opts.apply(RequestSpec::get(path))).await
}

/// Upload a file of at most 4 MiB into `parent_id` in one request.
pub async fn upload_small_file(
    client: &GraphClient,
    drive_id: &str,
    parent_id: &str,
    filename: &str,
    data: Bytes,
    opts: &CallOptions,
) -> Result<DriveItemSummary> {
    if data.len() > MAX_SMALL_UPLOAD_BYTES {
        return Err(GraphError::Validation(format!(
            "file is {} bytes, larger than the {MAX_SMALL_UPLOAD_BYTES} byte limit for simple upload",
            data.len()
        )));
    }
    require("drive_id", drive_id)?;
    require("parent_id", parent_id)?;
    require("filename", filename)?;

    let path = format!(
        "/drives/{}/items/{}:/{}:/content",
        encode_segment(drive_id),
        encode_segment(parent_id),
        encode_segment(filename),
    );
    let created = client
        .send(&opts.apply(RequestSpec::put(path).bytes(data)))
        .await?
        .ok_or_else(|| GraphError::Internal("empty upload response".into()))?;
    let dto: DriveItemDto = parse_value("drive item", created)?;
    Ok(dto.into())
}
