//! Picks the next contact to email.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::contacts::Contact;
use super::cursor::PositionStore;
use super::report::DispatchEvent;

/// Substituted when a contact has no company.
pub const COMPANY_PLACEHOLDER: &str = "Your Company";

/// How the cursor maps to a contact and how it moves.
///
/// - `RoundRobin`: `cursor mod N`, advanced before delivery, wraps forever.
/// - `SequentialCursor`: `cursor` itself, advanced after the outcome is
///   recorded; `cursor >= N` means the campaign is complete.
/// - `SequentialDestructive`: always the first deliverable row, which is
///   removed from the list once handled; the cursor only counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectionPolicy {
    #[serde(rename = "round_robin")]
    RoundRobin,
    #[default]
    #[serde(rename = "sequential", alias = "sequential_cursor")]
    SequentialCursor,
    #[serde(rename = "destructive", alias = "sequential_destructive")]
    SequentialDestructive,
}

impl fmt::Display for SelectionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RoundRobin => write!(f, "round_robin"),
            Self::SequentialCursor => write!(f, "sequential"),
            Self::SequentialDestructive => write!(f, "destructive"),
        }
    }
}

/// The contact chosen for this invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selected {
    /// Fields used for content and reporting, placeholder applied.
    pub contact: Contact,
    /// The row exactly as loaded, used to find it again for removal.
    pub row: Contact,
    /// Zero-based position in the list as loaded.
    pub index: usize,
    /// Cursor value the selection was made at.
    pub cursor: u64,
    pub total: usize,
    /// Round-robin only: whether the pre-delivery advance was persisted.
    pub pre_advanced: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Next(Selected),
    /// Nothing left to send under the active policy.
    Exhausted { total: usize, cursor: u64 },
}

/// Choose the next contact from a freshly loaded list.
///
/// Rows without an email are never returned. Under the sequential policy each
/// skipped row advances the persisted cursor immediately, so a later
/// invocation does not revisit it. A failed cursor write is recorded in
/// `events` and selection continues with the in-memory position.
pub async fn select(
    policy: SelectionPolicy,
    contacts: Vec<Contact>,
    cursor: &dyn PositionStore,
    events: &mut Vec<DispatchEvent>,
) -> Selection {
    let total = contacts.len();
    let position = cursor.read().await;

    match policy {
        SelectionPolicy::SequentialCursor => {
            let mut position = position;
            loop {
                let Some(row) = usize::try_from(position).ok().and_then(|i| contacts.get(i)) else {
                    return Selection::Exhausted {
                        total,
                        cursor: position,
                    };
                };
                let index = position as usize;
                if row.has_email() {
                    return Selection::Next(selected(row, index, position, total, None, events));
                }

                events.push(DispatchEvent::SkippedNoEmail {
                    position: index + 1,
                });
                let next = position + 1;
                match cursor.write(next).await {
                    Ok(()) => events.push(DispatchEvent::CursorAdvanced {
                        from: position,
                        to: next,
                    }),
                    Err(e) => events.push(DispatchEvent::CursorWriteFailed {
                        error: e.to_string(),
                    }),
                }
                position = next;
            }
        }
        SelectionPolicy::RoundRobin => {
            if total == 0 {
                return Selection::Exhausted {
                    total,
                    cursor: position,
                };
            }
            let start = (position % total as u64) as usize;
            for step in 0..total {
                let index = (start + step) % total;
                let row = &contacts[index];
                if !row.has_email() {
                    events.push(DispatchEvent::SkippedNoEmail {
                        position: index + 1,
                    });
                    continue;
                }

                let next = ((index + 1) % total) as u64;
                let advanced = match cursor.write(next).await {
                    Ok(()) => {
                        events.push(DispatchEvent::CursorAdvanced {
                            from: position,
                            to: next,
                        });
                        true
                    }
                    Err(e) => {
                        events.push(DispatchEvent::CursorWriteFailed {
                            error: e.to_string(),
                        });
                        false
                    }
                };
                return Selection::Next(selected(
                    row,
                    index,
                    index as u64,
                    total,
                    Some(advanced),
                    events,
                ));
            }
            Selection::Exhausted {
                total,
                cursor: position,
            }
        }
        SelectionPolicy::SequentialDestructive => {
            for (index, row) in contacts.iter().enumerate() {
                if row.has_email() {
                    return Selection::Next(selected(row, index, position, total, None, events));
                }
                events.push(DispatchEvent::SkippedNoEmail {
                    position: index + 1,
                });
            }
            Selection::Exhausted {
                total,
                cursor: position,
            }
        }
    }
}

fn selected(
    row: &Contact,
    index: usize,
    cursor: u64,
    total: usize,
    pre_advanced: Option<bool>,
    events: &mut Vec<DispatchEvent>,
) -> Selected {
    let mut contact = row.clone();
    contact.email = contact.email.trim().to_string();
    if contact.company.trim().is_empty() {
        contact.company = COMPANY_PLACEHOLDER.to_string();
        events.push(DispatchEvent::CompanyPlaceholder {
            position: index + 1,
        });
    }

    Selected {
        contact,
        row: row.clone(),
        index,
        cursor,
        total,
        pre_advanced,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::campaign::cursor::MemoryCursor;

    fn list(emails: &[&str]) -> Vec<Contact> {
        emails
            .iter()
            .enumerate()
            .map(|(i, e)| Contact::new(format!("C{i}"), "X", *e).with_company("Acme"))
            .collect()
    }

    fn index_of(selection: &Selection) -> Option<usize> {
        match selection {
            Selection::Next(s) => Some(s.index),
            Selection::Exhausted { .. } => None,
        }
    }

    #[tokio::test]
    async fn sequential_reads_cursor_without_advancing() {
        let cursor = MemoryCursor::new(1);
        let mut events = vec![];
        let selection = select(
            SelectionPolicy::SequentialCursor,
            list(&["a@x", "b@x"]),
            &cursor,
            &mut events,
        )
        .await;

        assert_eq!(index_of(&selection), Some(1));
        assert_eq!(cursor.read().await, 1);
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn sequential_skips_blank_emails_and_persists() {
        let cursor = MemoryCursor::new(0);
        let mut events = vec![];
        let selection = select(
            SelectionPolicy::SequentialCursor,
            list(&["", "  ", "c@x"]),
            &cursor,
            &mut events,
        )
        .await;

        assert_eq!(index_of(&selection), Some(2));
        assert_eq!(cursor.read().await, 2);
        assert_eq!(
            events
                .iter()
                .filter(|e| matches!(e, DispatchEvent::SkippedNoEmail { .. }))
                .count(),
            2
        );
    }

    #[tokio::test]
    async fn sequential_exhausts_at_end() {
        let cursor = MemoryCursor::new(2);
        let mut events = vec![];
        let selection = select(
            SelectionPolicy::SequentialCursor,
            list(&["a@x", "b@x"]),
            &cursor,
            &mut events,
        )
        .await;
        assert_eq!(selection, Selection::Exhausted { total: 2, cursor: 2 });
    }

    #[tokio::test]
    async fn sequential_trailing_blanks_exhaust() {
        let cursor = MemoryCursor::new(1);
        let mut events = vec![];
        let selection = select(
            SelectionPolicy::SequentialCursor,
            list(&["a@x", ""]),
            &cursor,
            &mut events,
        )
        .await;
        assert_eq!(selection, Selection::Exhausted { total: 2, cursor: 2 });
        assert_eq!(cursor.read().await, 2);
    }

    #[tokio::test]
    async fn round_robin_advances_before_delivery_and_wraps() {
        let cursor = MemoryCursor::new(5);
        let mut events = vec![];
        let selection = select(
            SelectionPolicy::RoundRobin,
            list(&["a@x", "b@x"]),
            &cursor,
            &mut events,
        )
        .await;

        assert_eq!(index_of(&selection), Some(1));
        assert_eq!(cursor.read().await, 0);
        match selection {
            Selection::Next(s) => assert_eq!(s.pre_advanced, Some(true)),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn round_robin_all_blank_exhausts() {
        let cursor = MemoryCursor::new(0);
        let mut events = vec![];
        let selection = select(SelectionPolicy::RoundRobin, list(&["", ""]), &cursor, &mut events).await;
        assert!(matches!(selection, Selection::Exhausted { total: 2, .. }));
    }

    #[tokio::test]
    async fn destructive_takes_first_deliverable_row() {
        let cursor = MemoryCursor::new(7);
        let mut events = vec![];
        let selection = select(
            SelectionPolicy::SequentialDestructive,
            list(&["", "b@x", "c@x"]),
            &cursor,
            &mut events,
        )
        .await;

        assert_eq!(index_of(&selection), Some(1));
        assert_eq!(cursor.read().await, 7);
    }

    #[tokio::test]
    async fn missing_company_gets_placeholder() {
        let cursor = MemoryCursor::new(0);
        let mut events = vec![];
        let contacts = vec![Contact::new("A", "B", " a@x ")];
        let Selection::Next(s) = select(
            SelectionPolicy::SequentialCursor,
            contacts.clone(),
            &cursor,
            &mut events,
        )
        .await
        else {
            panic!("expected a contact");
        };

        assert_eq!(s.contact.company, COMPANY_PLACEHOLDER);
        assert_eq!(s.contact.email, "a@x");
        assert_eq!(s.row, contacts[0]);
        assert_eq!(events, vec![DispatchEvent::CompanyPlaceholder { position: 1 }]);
    }

    #[test]
    fn policy_names_round_trip_through_serde() {
        let policy: SelectionPolicy = serde_json::from_str("\"round_robin\"").unwrap();
        assert_eq!(policy, SelectionPolicy::RoundRobin);
        let policy: SelectionPolicy = serde_json::from_str("\"sequential_destructive\"").unwrap();
        assert_eq!(policy, SelectionPolicy::SequentialDestructive);
        assert_eq!(SelectionPolicy::default().to_string(), "sequential");
    }
}
