// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Credential persistence: token cache and client id config with atomic writes.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::credential::{CLIENT_CONFIG_FILE, TOKEN_CACHE_FILE};
use crate::error::{GraphError, Result};

/// Backing storage for the serialized token cache.
pub trait CredentialStore: Send + Sync {
    /// Return the stored cache, or `None` on first run.
    fn read(&self) -> Result<Option<String>>;

    /// Replace the stored cache. Last write wins.
    fn write(&self, content: &str) -> Result<()>;

    /// Move the stored cache out of the way so a fresh one can be written.
    ///
    /// Returns where the previous contents now live.
    fn set_aside(&self, stamp: u64) -> Result<String>;
}

/// Token cache stored as `<dir>/token_cache.json`.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(config_dir: &Path) -> Self {
        Self { path: config_dir.join(TOKEN_CACHE_FILE) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialStore for FileStore {
    fn read(&self) -> Result<Option<String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, content: &str) -> Result<()> {
        save_atomic(&self.path, content)
    }

    fn set_aside(&self, stamp: u64) -> Result<String> {
        let name = format!(
            "{}.corrupt-{stamp}",
            self.path.file_name().unwrap_or_default().to_string_lossy()
        );
        let target = self.path.with_file_name(name);
        std::fs::rename(&self.path, &target)?;
        Ok(target.display().to_string())
    }
}

/// In-process store, for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryStore {
    content: RwLock<Option<String>>,
    set_aside: RwLock<Vec<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_content(content: impl Into<String>) -> Self {
        Self { content: RwLock::new(Some(content.into())), ..Self::default() }
    }

    /// Contents previously moved out by [`CredentialStore::set_aside`].
    pub fn set_aside_contents(&self) -> Vec<String> {
        self.set_aside.read().map(|g| g.clone()).unwrap_or_default()
    }
}

impl CredentialStore for MemoryStore {
    fn read(&self) -> Result<Option<String>> {
        let guard =
            self.content.read().map_err(|_| GraphError::Internal("memory store poisoned".into()))?;
        Ok(guard.clone())
    }

    fn write(&self, content: &str) -> Result<()> {
        let mut guard =
            self.content.write().map_err(|_| GraphError::Internal("memory store poisoned".into()))?;
        *guard = Some(content.to_owned());
        Ok(())
    }

    fn set_aside(&self, stamp: u64) -> Result<String> {
        let mut guard =
            self.content.write().map_err(|_| GraphError::Internal("memory store poisoned".into()))?;
        let mut aside = self
            .set_aside
            .write()
            .map_err(|_| GraphError::Internal("memory store poisoned".into()))?;
        aside.extend(guard.take());
        Ok(format!("memory:corrupt-{stamp}"))
    }
}

/// Persisted client configuration (`config.json`).
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
}

/// Reader/writer for `<dir>/config.json`.
#[derive(Debug, Clone)]
pub struct ClientConfigFile {
    path: PathBuf,
}

impl ClientConfigFile {
    pub fn new(config_dir: &Path) -> Self {
        Self { path: config_dir.join(CLIENT_CONFIG_FILE) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted client id, if any.
    pub fn client_id(&self) -> Result<Option<String>> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let config: ClientConfig = serde_json::from_str(&contents).map_err(|e| {
            GraphError::Configuration(format!("invalid {}: {e}", self.path.display()))
        })?;
        Ok(config.client_id.filter(|id| !id.trim().is_empty()))
    }

    pub fn set_client_id(&self, client_id: &str) -> Result<()> {
        let config = ClientConfig { client_id: Some(client_id.to_owned()) };
        save_atomic(&self.path, &serde_json::to_string_pretty(&config)?)
    }
}

/// Write `contents` to `path` atomically (write tmp + rename).
///
/// Uses a unique temp filename (PID + counter) so concurrent saves never share
/// a `.tmp` file. Creates the parent directory when missing.
pub fn save_atomic(path: &Path, contents: &str) -> Result<()> {
    static COUNTER: AtomicU32 = AtomicU32::new(0);

    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir)?;
        }
    }
    let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
    let tmp_name = format!(
        "{}.{}.{}.tmp",
        path.file_name().unwrap_or_default().to_string_lossy(),
        std::process::id(),
        seq,
    );
    let tmp_path = path.with_file_name(tmp_name);
    std::fs::write(&tmp_path, contents)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
