//! Reset Token Storage
//! Mission: Track outstanding password reset tokens, consumable exactly once

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

/// Server-side record for an issued reset token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetRecord {
    pub email: String,
    pub expires_at: DateTime<Utc>,
}

/// Keyed store for outstanding reset tokens.
///
/// Each operation is atomic with respect to other operations on the same
/// token. A record is either live (claimable) or claimed by exactly one
/// in-flight completion.
#[async_trait]
pub trait ResetTokenStore: Send + Sync {
    /// Record a freshly issued token
    async fn insert(&self, token: &str, record: ResetRecord);

    /// Move a live record to claimed and return it. `None` when the token is
    /// unknown, already consumed, or claimed by another completion.
    async fn claim(&self, token: &str) -> Option<ResetRecord>;

    /// Return a claimed record to live after a failed completion
    async fn release(&self, token: &str);

    /// Delete the record. True if it existed.
    async fn remove(&self, token: &str) -> bool;

    /// Drop records whose expiry has passed, claimed or not
    async fn purge_expired(&self, now: DateTime<Utc>) -> usize;

    async fn len(&self) -> usize;
}

#[derive(Debug)]
struct Entry {
    record: ResetRecord,
    claimed: bool,
}

/// In-process reset token store, sharded so unrelated tokens never contend
#[derive(Debug, Default)]
pub struct InMemoryResetTokenStore {
    entries: DashMap<String, Entry>,
}

impl InMemoryResetTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ResetTokenStore for InMemoryResetTokenStore {
    async fn insert(&self, token: &str, record: ResetRecord) {
        self.entries.insert(
            token.to_string(),
            Entry {
                record,
                claimed: false,
            },
        );
    }

    async fn claim(&self, token: &str) -> Option<ResetRecord> {
        let mut entry = self.entries.get_mut(token)?;
        if entry.claimed {
            return None;
        }
        entry.claimed = true;
        Some(entry.record.clone())
    }

    async fn release(&self, token: &str) {
        if let Some(mut entry) = self.entries.get_mut(token) {
            entry.claimed = false;
        }
    }

    async fn remove(&self, token: &str) -> bool {
        self.entries.remove(token).is_some()
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| entry.record.expires_at > now);
        before.saturating_sub(self.entries.len())
    }

    async fn len(&self) -> usize {
        self.entries.len()
    }
}
