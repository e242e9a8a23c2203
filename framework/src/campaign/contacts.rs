//! Contact records and the list they are read from.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use csv::StringRecord;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;

/// One row of the contact list. Identity is the row's position in the list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub company: String,
    pub title: String,
    pub country: String,
}

impl Contact {
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            email: email.into(),
            ..Default::default()
        }
    }

    pub fn with_company(mut self, company: impl Into<String>) -> Self {
        self.company = company.into();
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_country(mut self, country: impl Into<String>) -> Self {
        self.country = country.into();
        self
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    pub fn has_email(&self) -> bool {
        !self.email.trim().is_empty()
    }
}

#[derive(Debug, Error)]
pub enum ContactError {
    #[error("contact list not found: {0}")]
    NotFound(String),

    #[error("failed to access contact list {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse contact list {path}: {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },
}

/// Ordered source of contacts, re-read on every call.
///
/// Implementations must not cache between calls so an externally edited list
/// takes effect on the next invocation.
#[async_trait]
pub trait ContactSource: Send + Sync + 'static {
    /// Human readable location, reported by status queries.
    fn location(&self) -> String;

    async fn load(&self) -> Result<Vec<Contact>, ContactError>;

    /// Permanently drop the first row equal to `contact`. Returns `false`
    /// when no such row exists any more.
    async fn remove(&self, contact: &Contact) -> Result<bool, ContactError>;
}

/// Header spellings accepted for each field.
const FIRST_NAME: &[&str] = &["First Name", "first_name"];
const LAST_NAME: &[&str] = &["Last Name", "last_name"];
const EMAIL: &[&str] = &["Email", "email"];
const COMPANY: &[&str] = &["Company", "company"];
const TITLE: &[&str] = &["Title", "title"];
const COUNTRY: &[&str] = &["Country", "country"];

#[derive(Debug, Clone, Copy)]
struct Columns {
    first_name: Option<usize>,
    last_name: Option<usize>,
    email: Option<usize>,
    company: Option<usize>,
    title: Option<usize>,
    country: Option<usize>,
}

impl Columns {
    fn locate(headers: &StringRecord) -> Self {
        let find = |names: &[&str]| headers.iter().position(|h| names.contains(&h));
        Self {
            first_name: find(FIRST_NAME),
            last_name: find(LAST_NAME),
            email: find(EMAIL),
            company: find(COMPANY),
            title: find(TITLE),
            country: find(COUNTRY),
        }
    }

    fn contact(&self, record: &StringRecord) -> Contact {
        let field = |idx: Option<usize>| {
            idx.and_then(|i| record.get(i))
                .unwrap_or_default()
                .trim()
                .to_string()
        };
        Contact {
            first_name: field(self.first_name),
            last_name: field(self.last_name),
            email: field(self.email),
            company: field(self.company),
            title: field(self.title),
            country: field(self.country),
        }
    }
}

/// Strip NUL bytes, a leading BOM and blank lines. The header line is kept
/// even when empty so the parser still sees it.
fn sanitize(raw: &[u8]) -> String {
    let text = String::from_utf8_lossy(raw);
    let text = text.trim_start_matches('\u{feff}');

    let mut cleaned = String::with_capacity(text.len());
    for (i, line) in text.lines().enumerate() {
        let line = line.replace('\0', "");
        let line = line.trim();
        if i == 0 || !line.is_empty() {
            cleaned.push_str(line);
            cleaned.push('\n');
        }
    }
    cleaned
}

struct Table {
    headers: StringRecord,
    rows: Vec<StringRecord>,
}

impl Table {
    fn parse(text: &str) -> Result<Self, csv::Error> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(text.as_bytes());
        let headers = reader.headers()?.clone();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            if record.iter().any(|f| !f.trim().is_empty()) {
                rows.push(record);
            }
        }
        Ok(Self { headers, rows })
    }

    fn contacts(&self) -> Vec<Contact> {
        let columns = Columns::locate(&self.headers);
        self.rows.iter().map(|r| columns.contact(r)).collect()
    }

    fn to_bytes(&self) -> Result<Vec<u8>, csv::Error> {
        let mut writer = csv::WriterBuilder::new()
            .flexible(true)
            .from_writer(Vec::new());
        writer.write_record(&self.headers)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer
            .into_inner()
            .map_err(|e| csv::Error::from(e.into_error()))
    }
}

/// Contact list stored as a UTF-8 CSV file with a header row.
#[derive(Debug, Clone)]
pub struct CsvContacts {
    path: PathBuf,
}

impl CsvContacts {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> ContactError {
        match source.kind() {
            std::io::ErrorKind::NotFound => ContactError::NotFound(self.location()),
            _ => ContactError::Io {
                path: self.location(),
                source,
            },
        }
    }

    async fn read_table(&self) -> Result<Table, ContactError> {
        let raw = tokio::fs::read(&self.path)
            .await
            .map_err(|e| self.io_error(e))?;
        Table::parse(&sanitize(&raw)).map_err(|source| ContactError::Csv {
            path: self.location(),
            source,
        })
    }
}

#[async_trait]
impl ContactSource for CsvContacts {
    fn location(&self) -> String {
        self.path.display().to_string()
    }

    async fn load(&self) -> Result<Vec<Contact>, ContactError> {
        Ok(self.read_table().await?.contacts())
    }

    async fn remove(&self, contact: &Contact) -> Result<bool, ContactError> {
        let mut table = self.read_table().await?;
        let columns = Columns::locate(&table.headers);
        let Some(pos) = table
            .rows
            .iter()
            .position(|r| columns.contact(r) == *contact)
        else {
            return Ok(false);
        };
        table.rows.remove(pos);

        let bytes = table.to_bytes().map_err(|source| ContactError::Csv {
            path: self.location(),
            source,
        })?;

        // Write beside the list, then swap it in.
        let staging = self.path.with_extension("csv.tmp");
        tokio::fs::write(&staging, bytes)
            .await
            .map_err(|e| self.io_error(e))?;
        tokio::fs::rename(&staging, &self.path)
            .await
            .map_err(|e| self.io_error(e))?;
        Ok(true)
    }
}

/// In-memory [`ContactSource`] for development and testing.
#[derive(Debug, Clone, Default)]
pub struct MemoryContacts {
    contacts: Arc<Mutex<Vec<Contact>>>,
}

impl MemoryContacts {
    pub fn new(contacts: Vec<Contact>) -> Self {
        Self {
            contacts: Arc::new(Mutex::new(contacts)),
        }
    }

    /// Replace the list, as an operator editing the file would.
    pub async fn replace(&self, contacts: Vec<Contact>) {
        *self.contacts.lock().await = contacts;
    }

    pub async fn snapshot(&self) -> Vec<Contact> {
        self.contacts.lock().await.clone()
    }
}

#[async_trait]
impl ContactSource for MemoryContacts {
    fn location(&self) -> String {
        "memory".to_string()
    }

    async fn load(&self) -> Result<Vec<Contact>, ContactError> {
        Ok(self.contacts.lock().await.clone())
    }

    async fn remove(&self, contact: &Contact) -> Result<bool, ContactError> {
        let mut contacts = self.contacts.lock().await;
        match contacts.iter().position(|c| c == contact) {
            Some(pos) => {
                contacts.remove(pos);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
