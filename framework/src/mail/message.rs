//! Email message types and builder.

use std::path::Path;

use super::MailError;

/// A binary file carried alongside the text body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

impl Attachment {
    pub fn new(
        filename: impl Into<String>,
        content_type: impl Into<String>,
        data: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            filename: filename.into(),
            content_type: content_type.into(),
            data: data.into(),
        }
    }

    /// Read a static file from disk.
    ///
    /// A missing file is [`MailError::AttachmentNotFound`] so the caller never
    /// silently sends without it.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, MailError> {
        let path = path.as_ref();
        let data = tokio::fs::read(path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => MailError::AttachmentNotFound(path.display().to_string()),
            _ => MailError::Attachment {
                path: path.display().to_string(),
                source: e,
            },
        })?;

        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("attachment")
            .to_string();

        Ok(Self::new(filename, content_type_for(path), data))
    }
}

fn content_type_for(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("pdf") => "application/pdf",
        _ => "application/octet-stream",
    }
}

/// A complete plain-text email ready to send.
#[derive(Debug, Clone)]
pub struct Email {
    /// Sender address.
    pub from: String,
    /// Primary recipients.
    pub to: Vec<String>,
    /// Email subject line.
    pub subject: String,
    /// Plain-text body.
    pub text: String,
    pub attachments: Vec<Attachment>,
}

impl Email {
    /// Create a new email builder.
    pub fn builder() -> EmailBuilder {
        EmailBuilder::default()
    }
}

/// Builder for constructing [`Email`] instances.
#[derive(Debug, Default)]
pub struct EmailBuilder {
    from: Option<String>,
    to: Vec<String>,
    subject: Option<String>,
    text: Option<String>,
    attachments: Vec<Attachment>,
}

impl EmailBuilder {
    /// Set the sender address (required).
    pub fn from(mut self, address: impl Into<String>) -> Self {
        self.from = Some(address.into());
        self
    }

    /// Add a primary recipient.
    pub fn to(mut self, address: impl Into<String>) -> Self {
        self.to.push(address.into());
        self
    }

    /// Set the subject line.
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Set plain text body content.
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn attach(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    /// Build the email, validating required fields.
    pub fn build(self) -> Result<Email, MailError> {
        if self.to.iter().all(|t| t.trim().is_empty()) {
            return Err(MailError::Build("at least one recipient required".into()));
        }

        let from = self
            .from
            .ok_or_else(|| MailError::Build("from address required".into()))?;

        let subject = self
            .subject
            .ok_or_else(|| MailError::Build("subject required".into()))?;

        let text = self
            .text
            .ok_or_else(|| MailError::Build("body required".into()))?;

        Ok(Email {
            from,
            to: self.to,
            subject,
            text,
            attachments: self.attachments,
        })
    }
}
