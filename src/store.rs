//! Snapshot persistence for the registry
//!
//! The registry writes its full state after every mutation and reads it back
//! once at startup. Implementations only move whole snapshots; they never
//! see individual mutations.

use crate::error::{Error, Result};
use crate::model::Function;
use log::debug;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::RwLock;

/// Durable home of the registry snapshot.
pub trait SnapshotStore: Send + Sync {
    /// Every function of the last successful save; no prior state is an
    /// empty list, not an error.
    fn load(&self) -> impl Future<Output = Result<Vec<Function>>> + Send;

    /// Replaces the stored snapshot with `functions`.
    fn save(&self, functions: &[Function]) -> impl Future<Output = Result<()>> + Send;
}

/// Pretty-printed JSON array on disk, replaced atomically via a temp file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl SnapshotStore for JsonFileStore {
    fn load(&self) -> impl Future<Output = Result<Vec<Function>>> + Send {
        async move {
            let bytes = match tokio::fs::read(&self.path).await {
                Ok(bytes) => bytes,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                    debug!("No snapshot at {}, starting empty", self.path.display());
                    return Ok(Vec::new());
                }
                Err(err) => return Err(err.into()),
            };

            serde_json::from_slice(&bytes).map_err(|err| {
                Error::corrupt_snapshot(format!("{}: {}", self.path.display(), err))
            })
        }
    }

    fn save(&self, functions: &[Function]) -> impl Future<Output = Result<()>> + Send {
        let encoded = serde_json::to_vec_pretty(functions);
        async move {
            let encoded = encoded.map_err(|err| Error::persistence(err.to_string()))?;

            if let Some(parent) = self.path.parent() {
                if !parent.as_os_str().is_empty() {
                    tokio::fs::create_dir_all(parent).await?;
                }
            }

            let temp_path = self.temp_path();
            tokio::fs::write(&temp_path, &encoded).await?;
            tokio::fs::rename(&temp_path, &self.path).await?;
            debug!(
                "Saved {} bytes of snapshot to {}",
                encoded.len(),
                self.path.display()
            );
            Ok(())
        }
    }
}

/// Keeps the snapshot in memory, for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryStore {
    snapshot: RwLock<Vec<Function>>,
    saves: AtomicUsize,
    fail_saves: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(functions: Vec<Function>) -> Self {
        Self {
            snapshot: RwLock::new(functions),
            ..Self::default()
        }
    }

    pub async fn snapshot(&self) -> Vec<Function> {
        self.snapshot.read().await.clone()
    }

    /// Number of successful saves so far.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Makes every following save fail until switched off again.
    pub fn set_fail_on_save(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }
}

impl SnapshotStore for MemoryStore {
    fn load(&self) -> impl Future<Output = Result<Vec<Function>>> + Send {
        async move { Ok(self.snapshot.read().await.clone()) }
    }

    fn save(&self, functions: &[Function]) -> impl Future<Output = Result<()>> + Send {
        let functions = functions.to_vec();
        async move {
            if self.fail_saves.load(Ordering::SeqCst) {
                return Err(Error::persistence("memory store is set to fail"));
            }
            *self.snapshot.write().await = functions;
            self.saves.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }
}
