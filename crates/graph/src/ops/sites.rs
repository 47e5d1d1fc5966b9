// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{GraphError, Result};
use crate::graph::{GraphClient, RequestSpec};
use crate::ops::{encode_segment, parse_value, require, CallOptions};

/// A SharePoint site.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Site {
    pub id: String,
    pub name: Option<String>,
    pub display_name: Option<String>,
    pub web_url: Option<String>,
    /// Full response as returned by the API.
    pub raw: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SiteDto {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    web_url: Option<String>,
}

/// Look up a site by hostname and server-relative path.
pub async fn get_site(
    client: &GraphClient,
    hostname: &str,
    relative_path: &str,
    opts: &CallOptions,
) -> Result<Site> {
    require("hostname", hostname)?;
    let relative_path = relative_path.trim_start_matches('/');
    let path = format!("/sites/{}:/{relative_path}", encode_segment(hostname.trim()));

    let raw = client
        .send(&opts.apply(RequestSpec::get(path)))
        .await?
        .ok_or_else(|| GraphError::Internal("empty site response".into()))?;
    let dto: SiteDto = parse_value("site", raw.clone())?;
    Ok(Site {
        id: dto.id,
        name: dto.name,
        display_name: dto.display_name,
        web_url: dto.web_url,
        raw,
    })
}

/// Look up a site by its full URL, falling back to `default_url`.
pub async fn get_site_by_url(
    client: &GraphClient,
    url: Option<&str>,
    default_url: Option<&str>,
    opts: &CallOptions,
) -> Result<Site> {
    let (hostname, relative_path) = split_site_url(url, default_url)?;
    get_site(client, &hostname, &relative_path, opts).await
}

/// Split a site URL into hostname and path.
pub fn split_site_url(url: Option<&str>, default_url: Option<&str>) -> Result<(String, String)> {
    let raw = url
        .filter(|u| !u.trim().is_empty())
        .or(default_url.filter(|u| !u.trim().is_empty()))
        .ok_or_else(|| {
            GraphError::Validation(
                "SharePoint URL not provided; pass `url` or set SHAREPOINT_SITE_URL".into(),
            )
        })?;

    let parsed = Url::parse(raw.trim())
        .map_err(|e| GraphError::Validation(format!("invalid SharePoint URL {raw}: {e}")))?;
    let hostname = parsed.host_str().unwrap_or_default();
    let path = parsed.path().trim_matches('/');
    if hostname.is_empty() || path.is_empty() {
        return Err(GraphError::Validation(format!(
            "invalid SharePoint URL {raw}: could not parse hostname or path"
        )));
    }
    Ok((hostname.to_owned(), format!("/{path}")))
}

#[cfg(test)]
#[path = "sites_tests.rs"]
mod tests;
