//! Conversation history storage.
//!
//! [`ChatHistoryStore`] is the narrow interface the guide persists through.
//! Two adapters ship with the crate: [`InMemoryChatHistory`] and
//! [`SqliteChatHistory`].

mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::Result;
use crate::types::{ChatRecord, HistoryPage, normalize_paging, page_offset};

pub use sqlite::SqliteChatHistory;

/// Persists and retrieves chat records.
#[async_trait]
pub trait ChatHistoryStore: Send + Sync {
    /// Store one record.
    async fn save(&self, record: &ChatRecord) -> Result<()>;

    /// Page through a user's records, newest first. `page` is 1-based.
    async fn get_by_user(&self, user_id: &str, page: usize, limit: usize)
    -> Result<HistoryPage>;

    /// Delete every record belonging to a user, returning how many were removed.
    async fn delete_by_user(&self, user_id: &str) -> Result<usize>;
}

/// A history store shared across requests.
pub type SharedChatHistory = Arc<dyn ChatHistoryStore>;

// ─────────────────────────────────────────────────────────────────────────────
// In-memory Store
// ─────────────────────────────────────────────────────────────────────────────

/// History kept in process memory. Lost on restart.
#[derive(Debug, Default)]
pub struct InMemoryChatHistory {
    records: RwLock<Vec<ChatRecord>>,
}

impl InMemoryChatHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stored record, in insertion order.
    pub fn all(&self) -> Vec<ChatRecord> {
        self.records.read().clone()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

#[async_trait]
impl ChatHistoryStore for InMemoryChatHistory {
    async fn save(&self, record: &ChatRecord) -> Result<()> {
        self.records.write().push(record.clone());
        Ok(())
    }

    async fn get_by_user(
        &self,
        user_id: &str,
        page: usize,
        limit: usize,
    ) -> Result<HistoryPage> {
        let (page, limit) = normalize_paging(page, limit);
        let records = self.records.read();

        // Insertion order breaks created_at ties
        let mut mine: Vec<(usize, &ChatRecord)> = records
            .iter()
            .enumerate()
            .filter(|(_, r)| r.user_id == user_id)
            .collect();
        mine.sort_by(|a, b| {
            b.1.created_at
                .cmp(&a.1.created_at)
                .then_with(|| b.0.cmp(&a.0))
        });

        let total = mine.len();
        let records = mine
            .into_iter()
            .skip(page_offset(page, limit))
            .take(limit)
            .map(|(_, r)| r.clone())
            .collect();

        Ok(HistoryPage {
            records,
            total,
            page,
            limit,
        })
    }

    async fn delete_by_user(&self, user_id: &str) -> Result<usize> {
        let mut records = self.records.write();
        let before = records.len();
        records.retain(|r| r.user_id != user_id);
        Ok(before - records.len())
    }
}
