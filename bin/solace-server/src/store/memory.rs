//! In-process [`MessageStore`].

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use super::{MessageRow, MessageStore, NewMessage, StoreError};

/// Append-only vector of rows. Ids start at 1 and `created_at` never goes
/// backwards, so insertion order is creation order.
#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: Mutex<Vec<MessageRow>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<MessageRow>> {
        // A panic while holding the lock cannot leave a half-written row.
        self.rows.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn insert(&self, message: NewMessage) -> Result<MessageRow, StoreError> {
        let mut rows = self.lock();
        let now = Utc::now();
        let created_at = match rows.last() {
            Some(last) if last.created_at > now => last.created_at,
            _ => now,
        };
        let row = MessageRow {
            id: rows.len() as i64 + 1,
            created_at,
            message: message.message,
            is_bot: message.is_bot,
        };
        rows.push(row.clone());
        Ok(row)
    }

    async fn recent(&self, limit: usize) -> Result<Vec<MessageRow>, StoreError> {
        Ok(self.lock().iter().rev().take(limit).cloned().collect())
    }

    async fn list(&self) -> Result<Vec<MessageRow>, StoreError> {
        Ok(self.lock().clone())
    }
}
