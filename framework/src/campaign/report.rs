//! Structured results returned to whoever triggered an operation.
//!
//! The campaign core does not log. It returns a [`DispatchReport`] carrying
//! the outcome and every notable event, and the caller decides how to surface
//! them ([`DispatchReport::trace`] is what the HTTP and CLI layers use).

use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use super::contacts::Contact;
use super::gate::{SendMode, SkipReason};
use super::selector::SelectionPolicy;

/// What triggered an invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    /// External scheduler; the business-hours gate applies.
    Scheduled,
    /// Operator test send; bypasses the gate and marks the message.
    Manual,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DispatchEvent {
    /// 1-based list position skipped for lacking an email address.
    SkippedNoEmail { position: usize },
    CompanyPlaceholder { position: usize },
    CursorAdvanced { from: u64, to: u64 },
    CursorWriteFailed { error: String },
    FailureLogged,
    FailureLogWriteFailed { error: String },
    ContactRemoved,
    /// The sent row was no longer in the list when it came to removing it.
    ContactAlreadyGone,
    ContactRemoveFailed { error: String },
}

/// Bookkeeping after a send attempt. A `false` here never turns a sent
/// message into a failure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Bookkeeping {
    pub advanced_to_next: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saved_to_failed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub removed_from_list: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailDetails {
    pub to: String,
    pub recipient_name: String,
    pub company: String,
    pub subject: String,
    /// 1-based position in the list as loaded.
    pub recipient_number: usize,
    pub total_recipients: usize,
    #[serde(flatten)]
    pub bookkeeping: Bookkeeping,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Sent {
        message: String,
        email_details: EmailDetails,
    },
    Skipped {
        reason: SkipReason,
        message: String,
    },
    Failed {
        error: String,
        message: String,
        email_details: EmailDetails,
    },
    Completed {
        message: String,
        total_recipients: usize,
        current_counter: u64,
    },
}

impl Outcome {
    pub fn status(&self) -> &'static str {
        match self {
            Self::Sent { .. } => "sent",
            Self::Skipped { .. } => "skipped",
            Self::Failed { .. } => "failed",
            Self::Completed { .. } => "completed",
        }
    }

    pub fn email_details(&self) -> Option<&EmailDetails> {
        match self {
            Self::Sent { email_details, .. } | Self::Failed { email_details, .. } => {
                Some(email_details)
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DispatchReport {
    pub run_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub trigger: Trigger,
    pub policy: SelectionPolicy,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<SendMode>,
    #[serde(flatten)]
    pub outcome: Outcome,
    pub events: Vec<DispatchEvent>,
}

impl DispatchReport {
    /// Emit the outcome and events as tracing records.
    pub fn trace(&self) {
        let run_id = self.run_id;
        for event in &self.events {
            match event {
                DispatchEvent::SkippedNoEmail { position } => {
                    tracing::warn!(%run_id, position, "recipient has no email, skipping")
                }
                DispatchEvent::CompanyPlaceholder { position } => {
                    tracing::warn!(%run_id, position, "recipient has no company name, using placeholder")
                }
                DispatchEvent::CursorAdvanced { from, to } => {
                    tracing::info!(%run_id, from, to, "cursor advanced")
                }
                DispatchEvent::CursorWriteFailed { error } => {
                    tracing::error!(%run_id, %error, "failed to persist cursor")
                }
                DispatchEvent::FailureLogged => {
                    tracing::info!(%run_id, "failed send saved to failure log")
                }
                DispatchEvent::FailureLogWriteFailed { error } => {
                    tracing::error!(%run_id, %error, "failed to append to failure log")
                }
                DispatchEvent::ContactRemoved => {
                    tracing::info!(%run_id, "contact removed from list")
                }
                DispatchEvent::ContactAlreadyGone => {
                    tracing::warn!(%run_id, "contact was already gone from list")
                }
                DispatchEvent::ContactRemoveFailed { error } => {
                    tracing::error!(%run_id, %error, "failed to remove contact from list")
                }
            }
        }

        match &self.outcome {
            Outcome::Sent { email_details, .. } => tracing::info!(
                %run_id,
                to = %email_details.to,
                recipient = email_details.recipient_number,
                total = email_details.total_recipients,
                "email sent"
            ),
            Outcome::Skipped { reason, .. } => tracing::info!(%run_id, %reason, "no email sent"),
            Outcome::Failed {
                error,
                email_details,
                ..
            } => tracing::warn!(%run_id, to = %email_details.to, %error, "email failed, moving on"),
            Outcome::Completed {
                total_recipients, ..
            } => tracing::info!(%run_id, total_recipients, "campaign completed"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ContactListStatus {
    pub file_exists: bool,
    pub file_path: String,
    pub recipient_count: usize,
    pub current_counter: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AttachmentStatus {
    pub path: String,
    pub exists: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub status: &'static str,
    pub policy: SelectionPolicy,
    pub business_hours: String,
    pub csv_status: ContactListStatus,
    pub counter_location: String,
    pub failure_log: String,
    pub email_configured: bool,
    pub attachment: AttachmentStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize)]
pub struct Preview {
    pub csv_path: String,
    pub policy: SelectionPolicy,
    pub total_recipients: usize,
    pub current_counter: u64,
    /// `in_progress` or `completed`.
    pub status: &'static str,
    pub progress: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_recipient: Option<Contact>,
    pub next_few_recipients: Vec<Contact>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResetReport {
    pub status: &'static str,
    pub message: &'static str,
    pub counter: u64,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}
