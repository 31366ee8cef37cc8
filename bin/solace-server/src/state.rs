//! Shared application state injected into every Axum handler.

use std::sync::Arc;

use crate::config::{Config, StoreBackend};
use crate::model::{GeminiClient, ModelError, TextModel};
use crate::store::{MemoryStore, MessageStore, StoreError, SupabaseStore};

/// Long-lived client handles, built once in `main` and shared read-only.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration (env-derived).
    pub config: Arc<Config>,
    /// Chat history.
    pub store: Arc<dyn MessageStore>,
    /// Text generation backend.
    pub model: Arc<dyn TextModel>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("failed to build store client: {0}")]
    Store(#[from] StoreError),
    #[error("failed to build model client: {0}")]
    Model(#[from] ModelError),
}

impl AppState {
    /// Construct the configured store and model clients.
    pub fn from_config(config: Config) -> Result<Self, InitError> {
        let store: Arc<dyn MessageStore> = match config.store_backend {
            StoreBackend::Supabase => Arc::new(SupabaseStore::new(
                config.supabase_url.clone(),
                config.supabase_key.clone(),
                config.messages_table.clone(),
            )?),
            StoreBackend::Memory => Arc::new(MemoryStore::new()),
        };
        let model = Arc::new(GeminiClient::new(
            config.gemini_base_url.clone(),
            config.gemini_model.clone(),
            config.gemini_api_key.clone(),
            config.max_output_tokens,
        )?);
        Ok(Self { config: Arc::new(config), store, model })
    }
}
