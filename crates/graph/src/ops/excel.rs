// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Excel workbook worksheets, ranges and tables.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{GraphError, Result};
use crate::graph::{collect, GraphClient, RequestSpec};
use crate::ops::{encode_segment, parse_items, require, CallOptions};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorksheetSummary {
    pub name: String,
    #[serde(default)]
    pub visibility: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSummary {
    pub id: String,
    pub name: String,
    #[serde(default, rename(deserialize = "showHeaders"))]
    pub show_headers: bool,
    #[serde(default, rename(deserialize = "showTotals"))]
    pub show_totals: bool,
}

/// Identifies a workbook stored in a drive.
#[derive(Debug, Clone, Copy)]
pub struct Workbook<'a> {
    pub drive_id: &'a str,
    pub item_id: &'a str,
}

impl Workbook<'_> {
    fn path(&self) -> Result<String> {
        require("drive_id", self.drive_id)?;
        require("item_id", self.item_id)?;
        Ok(format!(
            "/drives/{}/items/{}/workbook",
            encode_segment(self.drive_id),
            encode_segment(self.item_id)
        ))
    }

    fn worksheet_path(&self, worksheet: &str) -> Result<String> {
        require("worksheet_name", worksheet)?;
        Ok(format!("{}/worksheets/{}", self.path()?, encode_segment(worksheet)))
    }

    fn range_path(&self, worksheet: &str, address: &str) -> Result<String> {
        require("range_address", address)?;
        Ok(format!(
            "{}/range(address='{}')",
            self.worksheet_path(worksheet)?,
            encode_segment(address)
        ))
    }
}

pub async fn list_worksheets(
    client: &GraphClient,
    workbook: Workbook<'_>,
    opts: &CallOptions,
) -> Result<Vec<WorksheetSummary>> {
    let path = format!("{}/worksheets", workbook.path()?);
    let values = collect(client, &path, opts.account_id(), opts.timeout).await?;
    parse_items("worksheet", values)
}

pub async fn get_range(
    client: &GraphClient,
    workbook: Workbook<'_>,
    worksheet: &str,
    address: &str,
    opts: &CallOptions,
) -> Result<Option<Value>> {
    let path = workbook.range_path(worksheet, address)?;
    client.send(&opts.apply(RequestSpec::get(path))).await
}

pub async fn update_range(
    client: &GraphClient,
    workbook: Workbook<'_>,
    worksheet: &str,
    address: &str,
    values: Vec<Vec<Value>>,
    opts: &CallOptions,
) -> Result<Option<Value>> {
    check_rows(&values)?;
    let path = workbook.range_path(worksheet, address)?;
    client.send(&opts.apply(RequestSpec::patch(path).json(json!({ "values": values })))).await
}

pub async fn list_tables(
    client: &GraphClient,
    workbook: Workbook<'_>,
    worksheet: &str,
    opts: &CallOptions,
) -> Result<Vec<TableSummary>> {
    let path = format!("{}/tables", workbook.worksheet_path(worksheet)?);
    let values = collect(client, &path, opts.account_id(), opts.timeout).await?;
    parse_items("table", values)
}

pub async fn add_table_row(
    client: &GraphClient,
    workbook: Workbook<'_>,
    worksheet: &str,
    table: &str,
    values: Vec<Vec<Value>>,
    opts: &CallOptions,
) -> Result<Option<Value>> {
    check_rows(&values)?;
    require("table_name", table)?;
    let path =
        format!("{}/tables/{}/rows/add", workbook.worksheet_path(worksheet)?, encode_segment(table));
    client.send(&opts.apply(RequestSpec::post(path).json(json!({ "values": values })))).await
}

fn check_rows(values: &[Vec<Value>]) -> Result<()> {
    if values.is_empty() {
        return Err(GraphError::Validation("values must contain at least one row".into()));
    }
    Ok(())
}
