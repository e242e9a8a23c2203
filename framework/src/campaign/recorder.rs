//! Bookkeeping after a send attempt.
//!
//! Nothing here can fail the invocation. Every store error becomes a
//! [`DispatchEvent`] and a `false` flag in [`Bookkeeping`], so a delivered
//! message is always reported as sent.

use time::OffsetDateTime;

use super::contacts::ContactSource;
use super::cursor::PositionStore;
use super::failures::{FailureLog, FailureRecord};
use super::report::{Bookkeeping, DispatchEvent};
use super::selector::{Selected, SelectionPolicy};

pub(crate) struct Recorder<'a> {
    pub policy: SelectionPolicy,
    pub contacts: &'a dyn ContactSource,
    pub cursor: &'a dyn PositionStore,
    pub failures: &'a dyn FailureLog,
}

impl Recorder<'_> {
    pub async fn success(&self, selected: &Selected, events: &mut Vec<DispatchEvent>) -> Bookkeeping {
        self.advance(selected, events).await
    }

    /// Log the failure, then move past the contact exactly as on success.
    pub async fn failure(
        &self,
        selected: &Selected,
        error: &str,
        at: OffsetDateTime,
        events: &mut Vec<DispatchEvent>,
    ) -> Bookkeeping {
        let record = FailureRecord::new(&selected.contact, error, at);
        let logged = match self.failures.append(&record).await {
            Ok(()) => {
                events.push(DispatchEvent::FailureLogged);
                true
            }
            Err(e) => {
                events.push(DispatchEvent::FailureLogWriteFailed {
                    error: e.to_string(),
                });
                false
            }
        };

        Bookkeeping {
            saved_to_failed: Some(logged),
            ..self.advance(selected, events).await
        }
    }

    async fn advance(&self, selected: &Selected, events: &mut Vec<DispatchEvent>) -> Bookkeeping {
        match self.policy {
            SelectionPolicy::RoundRobin => Bookkeeping {
                advanced_to_next: selected.pre_advanced.unwrap_or(false),
                ..Bookkeeping::default()
            },
            SelectionPolicy::SequentialCursor => Bookkeeping {
                advanced_to_next: self.write_cursor(selected.cursor, events).await,
                ..Bookkeeping::default()
            },
            SelectionPolicy::SequentialDestructive => {
                let removed = match self.contacts.remove(&selected.row).await {
                    Ok(true) => {
                        events.push(DispatchEvent::ContactRemoved);
                        true
                    }
                    Ok(false) => {
                        events.push(DispatchEvent::ContactAlreadyGone);
                        true
                    }
                    Err(e) => {
                        events.push(DispatchEvent::ContactRemoveFailed {
                            error: e.to_string(),
                        });
                        false
                    }
                };
                // The counter only reports how many contacts were handled.
                self.write_cursor(selected.cursor, events).await;
                Bookkeeping {
                    advanced_to_next: removed,
                    removed_from_list: Some(removed),
                    ..Bookkeeping::default()
                }
            }
        }
    }

    async fn write_cursor(&self, from: u64, events: &mut Vec<DispatchEvent>) -> bool {
        let Some(to) = from.checked_add(1) else {
            events.push(DispatchEvent::CursorWriteFailed {
                error: format!("counter {from} cannot be advanced"),
            });
            return false;
        };
        match self.cursor.write(to).await {
            Ok(()) => {
                events.push(DispatchEvent::CursorAdvanced { from, to });
                true
            }
            Err(e) => {
                events.push(DispatchEvent::CursorWriteFailed {
                    error: e.to_string(),
                });
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::campaign::contacts::{Contact, MemoryContacts};
    use crate::campaign::cursor::MemoryCursor;
    use crate::campaign::failures::MemoryFailureLog;
    use crate::campaign::selector::COMPANY_PLACEHOLDER;
    use time::macros::datetime;

    fn selected(cursor: u64, pre_advanced: Option<bool>) -> Selected {
        let row = Contact::new("Ada", "Lovelace", "ada@example.com").with_company("Acme");
        Selected {
            contact: row.clone(),
            row,
            index: 0,
            cursor,
            total: 2,
            pre_advanced,
        }
    }

    struct Fixture {
        contacts: MemoryContacts,
        cursor: MemoryCursor,
        failures: MemoryFailureLog,
    }

    impl Fixture {
        fn new(cursor: u64) -> Self {
            Self {
                contacts: MemoryContacts::new(vec![
                    Contact::new("Ada", "Lovelace", "ada@example.com").with_company("Acme"),
                    Contact::new("Bob", "Byte", "bob@example.com"),
                ]),
                cursor: MemoryCursor::new(cursor),
                failures: MemoryFailureLog::new(),
            }
        }

        fn recorder(&self, policy: SelectionPolicy) -> Recorder<'_> {
            Recorder {
                policy,
                contacts: &self.contacts,
                cursor: &self.cursor,
                failures: &self.failures,
            }
        }
    }

    #[tokio::test]
    async fn sequential_success_advances_by_one() {
        let fx = Fixture::new(4);
        let mut events = vec![];
        let bk = fx
            .recorder(SelectionPolicy::SequentialCursor)
            .success(&selected(4, None), &mut events)
            .await;

        assert!(bk.advanced_to_next);
        assert_eq!(fx.cursor.read().await, 5);
        assert_eq!(events, vec![DispatchEvent::CursorAdvanced { from: 4, to: 5 }]);
    }

    #[tokio::test]
    async fn round_robin_does_not_touch_cursor_after_send() {
        let fx = Fixture::new(1);
        let mut events = vec![];
        let bk = fx
            .recorder(SelectionPolicy::RoundRobin)
            .success(&selected(0, Some(true)), &mut events)
            .await;

        assert!(bk.advanced_to_next);
        assert_eq!(fx.cursor.read().await, 1);
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn failure_logs_then_advances() {
        let fx = Fixture::new(0);
        let mut events = vec![];
        let bk = fx
            .recorder(SelectionPolicy::SequentialCursor)
            .failure(
                &selected(0, None),
                "550 mailbox unavailable",
                datetime!(2024-03-05 10:00 UTC),
                &mut events,
            )
            .await;

        assert_eq!(bk.saved_to_failed, Some(true));
        assert!(bk.advanced_to_next);
        assert_eq!(fx.cursor.read().await, 1);

        let records = fx.failures.records().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].error, "550 mailbox unavailable");
        assert_eq!(events[0], DispatchEvent::FailureLogged);
    }

    #[tokio::test]
    async fn destructive_removes_row_and_counts() {
        let fx = Fixture::new(0);
        let mut events = vec![];
        let bk = fx
            .recorder(SelectionPolicy::SequentialDestructive)
            .success(&selected(0, None), &mut events)
            .await;

        assert_eq!(bk.removed_from_list, Some(true));
        let left = fx.contacts.snapshot().await;
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].first_name, "Bob");
        assert_eq!(fx.cursor.read().await, 1);
    }

    #[tokio::test]
    async fn destructive_counter_at_max_is_reported_not_fatal() {
        let fx = Fixture::new(u64::MAX);
        let mut events = vec![];
        let bk = fx
            .recorder(SelectionPolicy::SequentialDestructive)
            .success(&selected(u64::MAX, None), &mut events)
            .await;

        assert_eq!(bk.removed_from_list, Some(true));
        assert!(bk.advanced_to_next);
        assert_eq!(fx.cursor.read().await, u64::MAX);
        assert!(matches!(
            events.last(),
            Some(DispatchEvent::CursorWriteFailed { .. })
        ));
    }

    #[tokio::test]
    async fn failure_record_uses_placeholder_company() {
        let fx = Fixture::new(0);
        let row = Contact::new("Bob", "Byte", "bob@example.com");
        let picked = Selected {
            contact: row.clone().with_company(COMPANY_PLACEHOLDER),
            row,
            index: 1,
            cursor: 0,
            total: 2,
            pre_advanced: None,
        };

        fx.recorder(SelectionPolicy::SequentialCursor)
            .failure(&picked, "550", datetime!(2024-03-05 10:00 UTC), &mut vec![])
            .await;

        let records = fx.failures.records().await;
        assert_eq!(records[0].contact.company, COMPANY_PLACEHOLDER);
    }
}
