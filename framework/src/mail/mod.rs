//! Outbound email: message type, attachments, and the SMTP transport.
//!
//! This module is a thin layer over [lettre](https://lettre.rs). The campaign
//! only ever talks to the [`Mailer`] trait, so tests swap in a recording fake
//! and the SMTP relay stays an external collaborator.
//!
//! ```ignore
//! let mailer = SmtpMailer::from_config(config.mailer_config().unwrap())?;
//!
//! let email = Email::builder()
//!     .from("me@example.com")
//!     .to("recruiter@example.com")
//!     .subject("Internship application")
//!     .text("Dear ...")
//!     .attach(Attachment::load("assets/cv.pdf").await?)
//!     .build()?;
//! mailer.send(&email).await?;
//! ```
//!
//! # Environment Variables
//!
//! [`CampaignConfig::mailer_config`](crate::config::CampaignConfig::mailer_config)
//! assembles a [`MailerConfig`] from:
//!
//! | Variable | Required | Description |
//! |----------|----------|-------------|
//! | `EMAIL_ADDRESS` | Yes | Sender address and SMTP username |
//! | `EMAIL_PASSWORD` | Yes | SMTP password |
//! | `SMTP_HOST` | No | Relay hostname (default: smtp.gmail.com) |
//! | `SMTP_PORT` | No | Port (default: 587) |
//! | `SMTP_TLS` | No | `starttls` (default), `tls`, or `none` |
//! | `SMTP_TIMEOUT` | No | Connection timeout in seconds (default: 30) |

mod mailer;
mod message;

pub use mailer::{Mailer, MailerConfig, SmtpMailer};
pub use message::{Attachment, Email, EmailBuilder};

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("missing required config: {0}")]
    MissingConfig(String),

    #[error("invalid email address: {0}")]
    InvalidAddress(String),

    #[error("attachment not found: {0}")]
    AttachmentNotFound(String),

    #[error("failed to read attachment {path}: {source}")]
    Attachment {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to build message: {0}")]
    Build(String),

    #[error("SMTP error: {0}")]
    Smtp(String),

    #[error("send timed out after {0:?}")]
    Timeout(Duration),
}
