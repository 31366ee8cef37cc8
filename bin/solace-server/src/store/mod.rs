//! Message persistence.
//!
//! [`MessageStore`] is the interface every handler talks to. The production
//! implementation is [`supabase::SupabaseStore`]; [`memory::MemoryStore`]
//! keeps rows in-process for tests and local development. Rows are
//! append-only: there is no update or delete.

pub mod memory;
pub mod supabase;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

pub use memory::MemoryStore;
pub use supabase::SupabaseStore;

/// A single row of the messages table, as returned by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MessageRow {
    /// Identity assigned by the store.
    pub id: i64,
    /// Creation time assigned by the store.
    pub created_at: DateTime<Utc>,
    pub message: String,
    /// `true` for therapist (model) turns, `false` for patient turns.
    pub is_bot: bool,
}

/// Insert payload; also the request body of `POST /api/chat/messages`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct NewMessage {
    pub message: String,
    pub is_bot: bool,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The store answered with a non-success status.
    #[error("store returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("invalid store URL {0}")]
    InvalidUrl(String),

    #[error("store returned no row for insert")]
    EmptyInsert,
}

#[async_trait]
pub trait MessageStore: Send + Sync + 'static {
    /// Persist one row and return it with its assigned identity and timestamp.
    async fn insert(&self, message: NewMessage) -> Result<MessageRow, StoreError>;

    /// Up to `limit` rows, newest first.
    async fn recent(&self, limit: usize) -> Result<Vec<MessageRow>, StoreError>;

    /// Every row, oldest first.
    async fn list(&self) -> Result<Vec<MessageRow>, StoreError>;
}
