use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

use crate::credentials::cell::SharedResult;
use crate::credentials::RefreshableCredentials;

/// Cloneable handle on an in-flight refresh attempt.
pub(crate) type SharedRefresh = SharedResult<RefreshableCredentials>;

/// Per-superseded-token lifecycle: `ABSENT → INFLIGHT → SETTLED` on success,
/// `INFLIGHT → ABSENT` on failure, `SETTLED → ABSENT` via pruning.
pub(crate) enum RefreshEntry {
    InFlight(SharedRefresh),
    Settled(RefreshableCredentials),
}

/// Idempotency index keyed by superseded access tokens. Every successful
/// refresh leaves exactly one entry keyed by the token it replaced.
#[derive(Default)]
pub(crate) struct RefreshMap {
    entries: HashMap<String, RefreshEntry>,
}

impl RefreshMap {
    pub fn get(&self, old_access_token: &str) -> Option<&RefreshEntry> {
        self.entries.get(old_access_token)
    }

    pub fn insert_in_flight(&mut self, old_access_token: String, attempt: SharedRefresh) {
        self.entries
            .insert(old_access_token, RefreshEntry::InFlight(attempt));
    }

    /// Replaces the in-flight future with the concrete record so the pruner
    /// can expire it by date.
    pub fn settle(&mut self, old_access_token: &str, record: RefreshableCredentials) {
        self.entries
            .insert(old_access_token.to_owned(), RefreshEntry::Settled(record));
    }

    /// Failed attempts leave no trace, so the next call starts fresh.
    pub fn remove(&mut self, old_access_token: &str) {
        self.entries.remove(old_access_token);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Evicts settled records past their grace window. In-flight attempts and
    /// records without an expiry date are always kept.
    pub fn prune_expired(&mut self, now: DateTime<Utc>, expiry_age_seconds: u64) -> usize {
        let age = Duration::seconds(expiry_age_seconds as i64);
        let before = self.entries.len();
        self.entries.retain(|_, entry| match entry {
            RefreshEntry::InFlight(_) => true,
            RefreshEntry::Settled(record) => match record.expiry_date {
                Some(expiry) => expiry + age > now,
                None => true,
            },
        });
        before - self.entries.len()
    }
}
