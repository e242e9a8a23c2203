//! Durable position marker into the contact list.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode record for {path}: {source}")]
    Encode {
        path: String,
        #[source]
        source: csv::Error,
    },

    #[error("{0}")]
    Other(String),
}

/// Persisted cursor.
///
/// `read` never fails: an absent or unreadable marker reads as `0`. A failed
/// `write` is returned to the caller, which records it and carries on.
#[async_trait]
pub trait PositionStore: Send + Sync + 'static {
    async fn read(&self) -> u64;
    async fn write(&self, position: u64) -> Result<(), StoreError>;

    /// Where the marker lives, for status output.
    fn location(&self) -> String;
}

/// Cursor kept as a decimal integer in a small text file.
#[derive(Debug, Clone)]
pub struct FileCursor {
    path: PathBuf,
}

impl FileCursor {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl PositionStore for FileCursor {
    async fn read(&self) -> u64 {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text.trim().parse().unwrap_or(0),
            Err(_) => 0,
        }
    }

    async fn write(&self, position: u64) -> Result<(), StoreError> {
        tokio::fs::write(&self.path, position.to_string())
            .await
            .map_err(|source| StoreError::Write {
                path: self.location(),
                source,
            })
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

/// In-memory [`PositionStore`] for development and testing.
#[derive(Debug, Clone, Default)]
pub struct MemoryCursor {
    position: Arc<Mutex<u64>>,
}

impl MemoryCursor {
    pub fn new(position: u64) -> Self {
        Self {
            position: Arc::new(Mutex::new(position)),
        }
    }
}

#[async_trait]
impl PositionStore for MemoryCursor {
    async fn read(&self) -> u64 {
        *self.position.lock().await
    }

    async fn write(&self, position: u64) -> Result<(), StoreError> {
        *self.position.lock().await = position;
        Ok(())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}
