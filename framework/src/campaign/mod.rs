//! The cold-outreach state machine.
//!
//! One [`Campaign::send_next`] call is one step: check the delivery gate,
//! load the contact list fresh, pick a contact, render and send one message,
//! then record the outcome. Progress lives in a [`PositionStore`]; failed
//! sends go to a [`FailureLog`] and the campaign moves on without retrying.
//!
//! Timing is owned by whoever calls `send_next` (an external cron hitting the
//! HTTP endpoint, or the CLI). Calls on one `Campaign` are serialized by an
//! internal mutex held across the send. Two processes sharing the same counter
//! file are not coordinated and can still double-send.

pub mod contacts;
pub mod content;
pub mod cursor;
pub mod failures;
pub mod gate;
mod recorder;
pub mod report;
pub mod selector;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tracing::Instrument;
use uuid::Uuid;

pub use contacts::{Contact, ContactError, ContactSource, CsvContacts, MemoryContacts};
pub use content::{compose, subject_for, CompanyInsight, Draft, Sender};
pub use cursor::{FileCursor, MemoryCursor, PositionStore, StoreError};
pub use failures::{CsvFailureLog, FailureLog, FailureRecord, MemoryFailureLog};
pub use gate::{
    BusinessHours, Clock, FixedClock, GateDecision, GateFlags, SendMode, SkipReason, SystemClock,
};
pub use report::{
    Bookkeeping, DispatchEvent, DispatchReport, EmailDetails, Outcome, Preview, ResetReport,
    StatusReport, Trigger,
};
pub use selector::{SelectionPolicy, COMPANY_PLACEHOLDER};

use crate::config::CampaignConfig;
use crate::error::Error;
use crate::mail::{Attachment, Email, MailError, Mailer, SmtpMailer};
use recorder::Recorder;
use report::{AttachmentStatus, ContactListStatus};
use selector::{Selected, Selection};

/// How many upcoming contacts [`Campaign::preview`] lists.
pub const PREVIEW_LIMIT: usize = 3;

pub(crate) fn rfc3339(at: OffsetDateTime) -> String {
    at.format(&Rfc3339)
        .unwrap_or_else(|_| at.unix_timestamp().to_string())
}

/// Behavior knobs of a campaign, independent of where its state is stored.
#[derive(Debug, Clone)]
pub struct CampaignSettings {
    pub policy: SelectionPolicy,
    pub hours: BusinessHours,
    pub flags: GateFlags,
    pub sender: Sender,
    /// File attached to every message; `None` sends text only.
    pub attachment: Option<PathBuf>,
    pub send_timeout: Duration,
}

impl Default for CampaignSettings {
    fn default() -> Self {
        Self {
            policy: SelectionPolicy::default(),
            hours: BusinessHours::default(),
            flags: GateFlags::default(),
            sender: Sender::default(),
            attachment: None,
            send_timeout: Duration::from_secs(60),
        }
    }
}

impl From<&CampaignConfig> for CampaignSettings {
    fn from(config: &CampaignConfig) -> Self {
        let address = config
            .email_address
            .as_deref()
            .map(str::trim)
            .unwrap_or_default();
        Self {
            policy: config.selection_policy,
            hours: config.business_hours(),
            flags: config.gate_flags(),
            sender: Sender::new(
                config.sender_name.as_str(),
                address,
                config.signature_links(),
            ),
            attachment: Some(config.cv_file_path.clone()),
            send_timeout: config.send_timeout(),
        }
    }
}

pub struct Campaign {
    settings: CampaignSettings,
    contacts: Arc<dyn ContactSource>,
    cursor: Arc<dyn PositionStore>,
    failures: Arc<dyn FailureLog>,
    mailer: Option<Arc<dyn Mailer>>,
    mailer_error: Option<String>,
    clock: Arc<dyn Clock>,
    lock: Mutex<()>,
}

impl Campaign {
    /// A campaign with no mailer; every send reports a configuration error
    /// until [`with_mailer`](Self::with_mailer) is called.
    pub fn new(
        settings: CampaignSettings,
        contacts: Arc<dyn ContactSource>,
        cursor: Arc<dyn PositionStore>,
        failures: Arc<dyn FailureLog>,
    ) -> Self {
        Self {
            settings,
            contacts,
            cursor,
            failures,
            mailer: None,
            mailer_error: None,
            clock: Arc::new(SystemClock),
            lock: Mutex::new(()),
        }
    }

    pub fn with_mailer(mut self, mailer: Arc<dyn Mailer>) -> Self {
        self.mailer = Some(mailer);
        self.mailer_error = None;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// File-backed campaign with an SMTP mailer when credentials are set.
    ///
    /// A relay that cannot be built leaves the campaign without a mailer, like
    /// missing credentials: sends report a configuration error carrying the
    /// reason while status, preview and reset keep working.
    pub fn from_config(config: &CampaignConfig) -> Self {
        let campaign = Self::new(
            CampaignSettings::from(config),
            Arc::new(CsvContacts::new(&config.csv_file_path)),
            Arc::new(FileCursor::new(&config.counter_file_path)),
            Arc::new(CsvFailureLog::new(&config.failed_emails_file)),
        );

        let Some(mailer_config) = config.mailer_config() else {
            return campaign;
        };
        match SmtpMailer::from_config(mailer_config) {
            Ok(mailer) => campaign.with_mailer(Arc::new(mailer)),
            Err(e) => {
                tracing::warn!(error = %e, "SMTP relay unavailable, sends will be rejected");
                Self {
                    mailer_error: Some(e.to_string()),
                    ..campaign
                }
            }
        }
    }

    pub fn settings(&self) -> &CampaignSettings {
        &self.settings
    }

    pub fn email_configured(&self) -> bool {
        self.mailer.is_some()
    }

    pub fn counter_location(&self) -> String {
        self.cursor.location()
    }

    pub async fn current_counter(&self) -> u64 {
        self.cursor.read().await
    }

    /// Advance the campaign by at most one message.
    ///
    /// Returns `Err` only for a missing mailer or an unreadable contact list.
    /// Delivery problems are a `failed` outcome and bookkeeping problems show
    /// up in the report's events.
    pub async fn send_next(&self, trigger: Trigger) -> Result<DispatchReport, Error> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("send_next", %run_id, ?trigger);
        self.dispatch(run_id, trigger).instrument(span).await
    }

    async fn dispatch(&self, run_id: Uuid, trigger: Trigger) -> Result<DispatchReport, Error> {
        let _guard = self.lock.lock().await;
        let now = self.clock.now();
        let report = |mode, outcome, events| DispatchReport {
            run_id,
            timestamp: now,
            trigger,
            policy: self.settings.policy,
            mode,
            outcome,
            events,
        };

        let mode = match trigger {
            Trigger::Manual => SendMode::Manual,
            Trigger::Scheduled => {
                match gate::evaluate(now, self.settings.hours, self.settings.flags) {
                    GateDecision::Send(mode) => mode,
                    GateDecision::Skip(reason) => {
                        let outcome = Outcome::Skipped {
                            reason,
                            message: format!("No email sent - {reason}"),
                        };
                        return Ok(report(None, outcome, Vec::new()));
                    }
                }
            }
        };

        let mailer = self.mailer.as_ref().ok_or_else(|| {
            Error::Configuration(match &self.mailer_error {
                Some(reason) => format!("SMTP relay unavailable: {reason}"),
                None => "email credentials not configured (EMAIL_ADDRESS, EMAIL_PASSWORD)".into(),
            })
        })?;

        let contacts = self.contacts.load().await?;
        let mut events = Vec::new();
        let selected =
            match selector::select(self.settings.policy, contacts, self.cursor.as_ref(), &mut events)
                .await
            {
                Selection::Next(selected) => selected,
                Selection::Exhausted { total, cursor } => {
                    let outcome = Outcome::Completed {
                        message: "All emails have been sent! Campaign completed.".into(),
                        total_recipients: total,
                        current_counter: cursor,
                    };
                    return Ok(report(Some(mode), outcome, events));
                }
            };

        let (subject, delivered) = match compose(&selected.contact, &self.settings.sender) {
            Ok(draft) => {
                let draft = match trigger {
                    Trigger::Manual => draft.into_manual_test(now),
                    Trigger::Scheduled => draft,
                };
                let delivered = self.deliver(mailer.as_ref(), &selected, &draft).await;
                (draft.subject, delivered.map_err(|e| e.to_string()))
            }
            Err(e) => (String::new(), Err(e.to_string())),
        };

        let recorder = Recorder {
            policy: self.settings.policy,
            contacts: self.contacts.as_ref(),
            cursor: self.cursor.as_ref(),
            failures: self.failures.as_ref(),
        };

        let outcome = match delivered {
            Ok(()) => {
                let bookkeeping = recorder.success(&selected, &mut events).await;
                Outcome::Sent {
                    message: format!(
                        "Email sent to {} ({}/{})",
                        selected.contact.email,
                        selected.index + 1,
                        selected.total
                    ),
                    email_details: details(&selected, subject, bookkeeping),
                }
            }
            Err(error) => {
                let bookkeeping = recorder.failure(&selected, &error, now, &mut events).await;
                Outcome::Failed {
                    message: format!(
                        "Failed to send email to {}, moving to next contact",
                        selected.contact.email
                    ),
                    error,
                    email_details: details(&selected, subject, bookkeeping),
                }
            }
        };

        Ok(report(Some(mode), outcome, events))
    }

    async fn deliver(
        &self,
        mailer: &dyn Mailer,
        selected: &Selected,
        draft: &Draft,
    ) -> Result<(), MailError> {
        let mut builder = Email::builder()
            .from(self.settings.sender.email.as_str())
            .to(selected.contact.email.as_str())
            .subject(draft.subject.as_str())
            .text(draft.body.as_str());
        if let Some(path) = &self.settings.attachment {
            builder = builder.attach(Attachment::load(path).await?);
        }
        let email = builder.build()?;

        let limit = self.settings.send_timeout;
        tokio::time::timeout(limit, mailer.send(&email))
            .await
            .map_err(|_| MailError::Timeout(limit))?
    }

    /// Where the campaign stands. Never fails; problems are reported inline.
    pub async fn status(&self) -> StatusReport {
        let current_counter = self.cursor.read().await;
        let file_path = self.contacts.location();
        let csv_status = match self.contacts.load().await {
            Ok(contacts) => ContactListStatus {
                file_exists: true,
                file_path,
                recipient_count: contacts.len(),
                current_counter,
                error: None,
            },
            Err(e) => ContactListStatus {
                file_exists: !matches!(e, ContactError::NotFound(_)),
                file_path,
                recipient_count: 0,
                current_counter,
                error: Some(e.to_string()),
            },
        };

        let attachment = match &self.settings.attachment {
            Some(path) => AttachmentStatus {
                path: path.display().to_string(),
                exists: tokio::fs::metadata(path).await.is_ok(),
            },
            None => AttachmentStatus {
                path: String::new(),
                exists: false,
            },
        };

        StatusReport {
            status: "running",
            policy: self.settings.policy,
            business_hours: self.settings.hours.to_string(),
            csv_status,
            counter_location: self.cursor.location(),
            failure_log: self.failures.location(),
            email_configured: self.email_configured(),
            attachment,
            timestamp: self.clock.now(),
        }
    }

    /// The contacts the next few calls would pick, without sending anything.
    pub async fn preview(&self) -> Result<Preview, Error> {
        let contacts = self.contacts.load().await?;
        let current_counter = self.cursor.read().await;
        let total = contacts.len();
        let deliverable = |c: &&Contact| c.has_email();

        let (finished, upcoming): (bool, Vec<Contact>) = match self.settings.policy {
            SelectionPolicy::SequentialCursor => {
                let start = usize::try_from(current_counter).unwrap_or(usize::MAX);
                let upcoming = contacts
                    .iter()
                    .skip(start)
                    .filter(deliverable)
                    .take(PREVIEW_LIMIT)
                    .cloned()
                    .collect();
                (start >= total, upcoming)
            }
            SelectionPolicy::RoundRobin if total > 0 => {
                let start = (current_counter % total as u64) as usize;
                let upcoming = contacts
                    .iter()
                    .cycle()
                    .skip(start)
                    .take(total)
                    .filter(deliverable)
                    .take(PREVIEW_LIMIT)
                    .cloned()
                    .collect();
                (false, upcoming)
            }
            SelectionPolicy::RoundRobin | SelectionPolicy::SequentialDestructive => {
                let upcoming: Vec<Contact> = contacts
                    .iter()
                    .filter(deliverable)
                    .take(PREVIEW_LIMIT)
                    .cloned()
                    .collect();
                (upcoming.is_empty(), upcoming)
            }
        };

        Ok(Preview {
            csv_path: self.contacts.location(),
            policy: self.settings.policy,
            total_recipients: total,
            current_counter,
            status: if finished { "completed" } else { "in_progress" },
            progress: if finished {
                format!("{total}/{total}")
            } else {
                format!("{}/{total}", current_counter.saturating_add(1))
            },
            current_recipient: if finished { None } else { upcoming.first().cloned() },
            next_few_recipients: upcoming,
        })
    }

    /// Put the cursor back to 0.
    pub async fn reset(&self) -> Result<ResetReport, Error> {
        let _guard = self.lock.lock().await;
        self.cursor.write(0).await.map_err(Error::Bookkeeping)?;
        Ok(ResetReport {
            status: "success",
            message: "Counter reset to 0",
            counter: 0,
            timestamp: self.clock.now(),
        })
    }
}

fn details(selected: &Selected, subject: String, bookkeeping: Bookkeeping) -> EmailDetails {
    EmailDetails {
        to: selected.contact.email.clone(),
        recipient_name: selected.contact.full_name(),
        company: selected.contact.company.clone(),
        subject,
        recipient_number: selected.index + 1,
        total_recipients: selected.total,
        bookkeeping,
    }
}
