// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed SharePoint and Excel operations over the request engine.

pub mod drives;
pub mod excel;
pub mod sites;

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{GraphError, Result};
use crate::graph::RequestSpec;

/// Per-call account selection and timeout.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    pub account_id: Option<String>,
    pub timeout: Option<Duration>,
}

impl CallOptions {
    pub fn new(account_id: Option<&str>, timeout: Option<Duration>) -> Self {
        Self { account_id: account_id.filter(|id| !id.is_empty()).map(str::to_owned), timeout }
    }

    pub fn account_id(&self) -> Option<&str> {
        self.account_id.as_deref()
    }

    pub(crate) fn apply(&self, spec: RequestSpec) -> RequestSpec {
        spec.account(self.account_id()).timeout(self.timeout)
    }
}

/// Percent-encode the characters that would end a path segment early.
pub(crate) fn encode_segment(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for c in segment.chars() {
        match c {
            '%' => out.push_str("%25"),
            '/' => out.push_str("%2F"),
            '?' => out.push_str("%3F"),
            '#' => out.push_str("%23"),
            _ => out.push(c),
        }
    }
    out
}

pub(crate) fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(GraphError::Validation(format!("{field} must not be empty")));
    }
    Ok(())
}

pub(crate) fn parse_items<T: DeserializeOwned>(what: &str, values: Vec<Value>) -> Result<Vec<T>> {
    values.into_iter().map(|v| parse_value(what, v)).collect()
}

pub(crate) fn parse_value<T: DeserializeOwned>(what: &str, value: Value) -> Result<T> {
    serde_json::from_value(value)
        .map_err(|e| GraphError::Internal(format!("unexpected {what} payload: {e}")))
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
