// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use tokio_util::sync::CancellationToken;

use crate::tools::ToolBox;

/// Shared server state.
pub struct AppState {
    pub tools: ToolBox,
    /// Bearer token required on the tool API. `None` disables auth.
    pub auth_token: Option<String>,
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(tools: ToolBox, auth_token: Option<String>, shutdown: CancellationToken) -> Self {
        Self { tools, auth_token: auth_token.filter(|t| !t.is_empty()), shutdown }
    }
}
