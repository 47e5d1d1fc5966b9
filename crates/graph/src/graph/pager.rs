// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `@odata.nextLink` pagination.

use std::time::Duration;

use serde_json::Value;

use crate::error::Result;
use crate::graph::{GraphClient, RequestSpec};

const NEXT_LINK: &str = "@odata.nextLink";

/// Lazily walks a paged collection, one GET per page.
pub struct Pager<'a> {
    client: &'a GraphClient,
    next: Option<String>,
    account_id: Option<String>,
    timeout: Option<Duration>,
    pages: usize,
}

impl<'a> Pager<'a> {
    pub fn new(
        client: &'a GraphClient,
        path: impl Into<String>,
        account_id: Option<&str>,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            client,
            next: Some(path.into()),
            account_id: account_id.map(str::to_owned),
            timeout,
            pages: 0,
        }
    }

    /// Number of pages fetched so far.
    pub fn pages(&self) -> usize {
        self.pages
    }

    /// Fetch the next page's `value` items, or `None` when the collection is done.
    pub async fn next_page(&mut self) -> Result<Option<Vec<Value>>> {
        let Some(path) = self.next.take() else {
            return Ok(None);
        };
        let spec = RequestSpec::get(path)
            .account(self.account_id.as_deref())
            .timeout(self.timeout);
        let response = self.client.send(&spec).await?;
        self.pages += 1;

        let Some(Value::Object(mut page)) = response else {
            return Ok(None);
        };
        let Some(Value::Array(items)) = page.remove("value") else {
            return Ok(None);
        };
        self.next = match page.remove(NEXT_LINK) {
            Some(Value::String(link)) if !link.is_empty() => {
                Some(self.client.relative_path(&link).to_owned())
            }
            _ => None,
        };
        Ok(Some(items))
    }
}

/// Follow every page of `path` and return all `value` items in order.
pub async fn collect(
    client: &GraphClient,
    path: &str,
    account_id: Option<&str>,
    timeout: Option<Duration>,
) -> Result<Vec<Value>> {
    let mut pager = Pager::new(client, path, account_id, timeout);
    let mut items = Vec::new();
    while let Some(page) = pager.next_page().await? {
        items.extend(page);
    }
    tracing::debug!(path, pages = pager.pages(), items = items.len(), "collected paged results");
    Ok(items)
}
