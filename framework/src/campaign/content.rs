//! Subject and body generation for one contact.
//!
//! Everything here is deterministic: no randomness and no I/O. The subject is
//! picked by a stable hash of the company so a company sees the same subject
//! on every run, across restarts.

use askama::Template;
use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use time::OffsetDateTime;

use super::contacts::Contact;
use super::rfc3339;

pub const SUBJECT_TEMPLATES: [&str; 5] = [
    "DevOps Internship Application - {company}",
    "Cloud Engineering Student - Internship Opportunity at {company}",
    "End-of-Study Internship - DevOps & Cloud Expertise",
    "DevOps Student seeking Internship at {company}",
    "Final Year Student - Cloud Infrastructure Internship",
];

pub const MANUAL_TEST_PREFIX: &str = "[MANUAL TEST] ";

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("failed to render email body: {0}")]
    Render(#[from] askama::Error),
}

/// Index into [`SUBJECT_TEMPLATES`]: the first eight bytes of SHA-256 of the
/// company name, big-endian, modulo the template count.
pub fn subject_index(company: &str) -> usize {
    let digest = Sha256::digest(company.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    (u64::from_be_bytes(prefix) % SUBJECT_TEMPLATES.len() as u64) as usize
}

pub fn subject_for(company: &str) -> String {
    SUBJECT_TEMPLATES[subject_index(company)].replace("{company}", company)
}

/// Descriptive text interpolated into the body.
///
/// No lookup happens; every company gets the same insight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompanyInsight {
    pub industry: &'static str,
    pub focus: &'static str,
    pub values: &'static str,
    pub size: &'static str,
    pub market: &'static str,
}

impl CompanyInsight {
    pub fn research(_company: &str) -> Self {
        Self {
            industry: "Technology",
            focus: "innovation and digital transformation",
            values: "cutting-edge solutions and customer success",
            size: "growing company",
            market: "competitive technology market",
        }
    }
}

/// Who signs the message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sender {
    pub name: String,
    pub email: String,
    pub links: Vec<String>,
}

impl Sender {
    /// A blank name falls back to the address.
    pub fn new(name: impl Into<String>, email: impl Into<String>, links: Vec<String>) -> Self {
        let email = email.into();
        let name = name.into();
        let name = if name.trim().is_empty() {
            email.clone()
        } else {
            name.trim().to_string()
        };
        Self { name, email, links }
    }
}

#[derive(Template)]
#[template(path = "outreach.txt", escape = "none")]
struct OutreachBody<'a> {
    full_name: &'a str,
    title: &'a str,
    company: &'a str,
    country: &'a str,
    insight: &'a CompanyInsight,
    sender: &'a Sender,
}

/// A rendered message, not yet addressed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Draft {
    pub subject: String,
    pub body: String,
}

impl Draft {
    /// Mark a draft as an operator-triggered test send.
    pub fn into_manual_test(self, at: OffsetDateTime) -> Self {
        Self {
            subject: format!("{MANUAL_TEST_PREFIX}{}", self.subject),
            body: format!(
                "[MANUAL TEST EMAIL]\n\n{}\n\nThis is a manual test email sent at {}",
                self.body,
                rfc3339(at)
            ),
        }
    }
}

/// Render the subject and body for `contact`.
///
/// `contact.company` must already carry the placeholder when the list had no
/// company.
pub fn compose(contact: &Contact, sender: &Sender) -> Result<Draft, ContentError> {
    let insight = CompanyInsight::research(&contact.company);
    let full_name = contact.full_name();
    let body = OutreachBody {
        full_name: &full_name,
        title: &contact.title,
        company: &contact.company,
        country: &contact.country,
        insight: &insight,
        sender,
    }
    .render()?;

    Ok(Draft {
        subject: subject_for(&contact.company),
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use time::macros::datetime;

    fn sender() -> Sender {
        Sender::new(
            "Sam Sender",
            "sam@example.com",
            vec!["GitHub: github.com/sam".into()],
        )
    }

    #[test]
    fn subject_index_is_pinned() {
        // Fixed values guard against the hash drifting between builds.
        assert_eq!(subject_index("Acme Corp"), 1);
        assert_eq!(subject_index("Initech"), 1);
        assert_eq!(subject_index("Your Company"), 4);
        assert_eq!(subject_index(""), 2);
    }

    #[test]
    fn subject_interpolates_company() {
        assert_eq!(
            subject_for("Acme Corp"),
            "Cloud Engineering Student - Internship Opportunity at Acme Corp"
        );
    }

    #[test]
    fn body_mentions_contact_fields() {
        let contact = Contact::new("Ada", "Lovelace", "ada@example.com")
            .with_company("Engines Ltd")
            .with_title("CTO")
            .with_country("UK");
        let draft = compose(&contact, &sender()).unwrap();

        assert!(draft.body.starts_with("Dear Ada Lovelace,"));
        assert!(draft.body.contains("As the CTO at Engines Ltd"));
        assert!(draft.body.contains("innovative projects in UK."));
        assert!(draft.body.contains("focus on innovation and digital transformation"));
        assert!(draft.body.contains("I am Sam Sender,"));
        assert!(draft.body.contains("Email: sam@example.com\nGitHub: github.com/sam"));
    }

    #[test]
    fn body_degrades_without_optional_fields() {
        let contact = Contact::new("", "", "x@example.com").with_company("Initech");
        let draft = compose(&contact, &sender()).unwrap();

        assert!(draft.body.starts_with("Dear Hiring Team,"));
        assert!(draft.body.contains("Given your role at Initech"));
        assert!(draft.body.contains("innovative projects."));
    }

    #[test]
    fn blank_sender_name_uses_address() {
        let sender = Sender::new("  ", "me@example.com", vec![]);
        assert_eq!(sender.name, "me@example.com");
    }

    #[test]
    fn manual_test_marks_subject_and_body() {
        let draft = Draft {
            subject: "Hello".into(),
            body: "Body".into(),
        }
        .into_manual_test(datetime!(2024-03-05 10:00 UTC));

        assert_eq!(draft.subject, "[MANUAL TEST] Hello");
        assert!(draft.body.starts_with("[MANUAL TEST EMAIL]\n\nBody"));
        assert!(draft.body.ends_with("2024-03-05T10:00:00Z"));
    }

    proptest! {
        #[test]
        fn compose_is_deterministic(company in "[A-Za-z0-9 &.,-]{0,40}", first in "[A-Za-z]{0,12}") {
            let contact = Contact::new(first, "Doe", "d@example.com").with_company(company.clone());
            let a = compose(&contact, &sender()).unwrap();
            let b = compose(&contact, &sender()).unwrap();
            prop_assert_eq!(&a, &b);
            prop_assert_eq!(a.subject, subject_for(&company));
        }
    }
}
