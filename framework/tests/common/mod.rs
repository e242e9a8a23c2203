#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use coldmail::campaign::{
    Contact, FailureLog, FailureRecord, FixedClock, MemoryContacts, MemoryCursor,
    MemoryFailureLog, PositionStore, StoreError,
};
use coldmail::mail::{Email, MailError, Mailer};
use coldmail::{Campaign, CampaignSettings, SelectionPolicy};
use time::macros::datetime;
use time::OffsetDateTime;

// 2024-03-05 is a Tuesday, 2024-03-09 a Saturday.
pub const TUESDAY_10: OffsetDateTime = datetime!(2024-03-05 10:00 UTC);
pub const SATURDAY_10: OffsetDateTime = datetime!(2024-03-09 10:00 UTC);

/// Accepts every message and keeps a copy.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<Email>>,
}

impl RecordingMailer {
    pub fn sent(&self) -> Vec<Email> {
        self.sent.lock().unwrap().clone()
    }

    pub fn recipients(&self) -> Vec<String> {
        self.sent().into_iter().flat_map(|e| e.to).collect()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: &Email) -> Result<(), MailError> {
        self.sent.lock().unwrap().push(email.clone());
        Ok(())
    }
}

/// Rejects every message with a fixed SMTP error.
pub struct RejectingMailer(pub String);

#[async_trait]
impl Mailer for RejectingMailer {
    async fn send(&self, _email: &Email) -> Result<(), MailError> {
        Err(MailError::Smtp(self.0.clone()))
    }
}

/// Never completes.
pub struct HangingMailer;

#[async_trait]
impl Mailer for HangingMailer {
    async fn send(&self, _email: &Email) -> Result<(), MailError> {
        std::future::pending::<()>().await;
        Ok(())
    }
}

/// Reads a fixed position and refuses every write.
pub struct ReadOnlyCursor(pub u64);

#[async_trait]
impl PositionStore for ReadOnlyCursor {
    async fn read(&self) -> u64 {
        self.0
    }

    async fn write(&self, _position: u64) -> Result<(), StoreError> {
        Err(StoreError::Other("disk full".into()))
    }

    fn location(&self) -> String {
        "read-only".into()
    }
}

pub struct BrokenFailureLog;

#[async_trait]
impl FailureLog for BrokenFailureLog {
    async fn append(&self, _record: &FailureRecord) -> Result<(), StoreError> {
        Err(StoreError::Other("permission denied".into()))
    }

    fn location(&self) -> String {
        "broken".into()
    }
}

pub fn contact(first: &str, email: &str, company: &str) -> Contact {
    Contact::new(first, "Tester", email).with_company(company)
}

pub fn three_contacts() -> Vec<Contact> {
    vec![
        contact("Ada", "ada@example.com", "Acme Corp"),
        contact("Bob", "bob@example.com", "Initech"),
        contact("Cy", "cy@example.com", "Globex"),
    ]
}

pub fn settings(policy: SelectionPolicy) -> CampaignSettings {
    CampaignSettings {
        policy,
        sender: coldmail::campaign::Sender::new("Sam Sender", "sam@example.com", vec![]),
        send_timeout: Duration::from_millis(200),
        ..CampaignSettings::default()
    }
}

/// An in-memory campaign plus handles to inspect its state.
pub struct Harness {
    pub campaign: Arc<Campaign>,
    pub contacts: MemoryContacts,
    pub cursor: MemoryCursor,
    pub failures: MemoryFailureLog,
    pub mailer: Arc<RecordingMailer>,
}

impl Harness {
    pub fn new(policy: SelectionPolicy, contacts: Vec<Contact>) -> Self {
        Self::with_settings(settings(policy), contacts, TUESDAY_10)
    }

    pub fn with_settings(
        settings: CampaignSettings,
        contacts: Vec<Contact>,
        now: OffsetDateTime,
    ) -> Self {
        let contacts = MemoryContacts::new(contacts);
        let cursor = MemoryCursor::new(0);
        let failures = MemoryFailureLog::new();
        let mailer = Arc::new(RecordingMailer::default());
        let campaign = Arc::new(
            Campaign::new(
                settings,
                Arc::new(contacts.clone()),
                Arc::new(cursor.clone()),
                Arc::new(failures.clone()),
            )
            .with_mailer(mailer.clone())
            .with_clock(Arc::new(FixedClock(now))),
        );

        Self {
            campaign,
            contacts,
            cursor,
            failures,
            mailer,
        }
    }
}
