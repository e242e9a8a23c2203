//! Append-only log of contacts whose send failed.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use time::OffsetDateTime;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use super::contacts::Contact;
use super::cursor::StoreError;
use super::rfc3339;

/// Error text kept per record, in characters.
pub const MAX_ERROR_LEN: usize = 200;

pub const FAILURE_COLUMNS: [&str; 8] = [
    "First Name",
    "Last Name",
    "Email",
    "Company",
    "Title",
    "Country",
    "Error",
    "Timestamp",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureRecord {
    #[serde(flatten)]
    pub contact: Contact,
    pub error: String,
    pub timestamp: String,
}

impl FailureRecord {
    pub fn new(contact: &Contact, error: &str, at: OffsetDateTime) -> Self {
        Self {
            contact: contact.clone(),
            error: error.chars().take(MAX_ERROR_LEN).collect(),
            timestamp: rfc3339(at),
        }
    }

    fn fields(&self) -> [&str; 8] {
        [
            self.contact.first_name.as_str(),
            self.contact.last_name.as_str(),
            self.contact.email.as_str(),
            self.contact.company.as_str(),
            self.contact.title.as_str(),
            self.contact.country.as_str(),
            self.error.as_str(),
            self.timestamp.as_str(),
        ]
    }
}

#[async_trait]
pub trait FailureLog: Send + Sync + 'static {
    async fn append(&self, record: &FailureRecord) -> Result<(), StoreError>;
    fn location(&self) -> String;
}

/// CSV failure log with a fixed header, written on first append.
#[derive(Debug, Clone)]
pub struct CsvFailureLog {
    path: PathBuf,
}

impl CsvFailureLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Write {
            path: self.location(),
            source,
        }
    }

    fn encode(&self, record: &FailureRecord, with_header: bool) -> Result<Vec<u8>, csv::Error> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(Vec::new());
        if with_header {
            writer.write_record(FAILURE_COLUMNS)?;
        }
        writer.write_record(record.fields())?;
        writer
            .into_inner()
            .map_err(|e| csv::Error::from(e.into_error()))
    }
}

#[async_trait]
impl FailureLog for CsvFailureLog {
    async fn append(&self, record: &FailureRecord) -> Result<(), StoreError> {
        let has_content = tokio::fs::metadata(&self.path)
            .await
            .map(|m| m.len() > 0)
            .unwrap_or(false);

        let bytes = self
            .encode(record, !has_content)
            .map_err(|source| StoreError::Encode {
                path: self.location(),
                source,
            })?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.write_error(e))?;
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| self.write_error(e))?;
        file.write_all(&bytes).await.map_err(|e| self.write_error(e))?;
        file.flush().await.map_err(|e| self.write_error(e))
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

/// In-memory [`FailureLog`] for development and testing.
#[derive(Debug, Clone, Default)]
pub struct MemoryFailureLog {
    records: Arc<Mutex<Vec<FailureRecord>>>,
}

impl MemoryFailureLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn records(&self) -> Vec<FailureRecord> {
        self.records.lock().await.clone()
    }
}

#[async_trait]
impl FailureLog for MemoryFailureLog {
    async fn append(&self, record: &FailureRecord) -> Result<(), StoreError> {
        self.records.lock().await.push(record.clone());
        Ok(())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}
