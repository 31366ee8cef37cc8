//! Supabase implementation of [`MessageStore`].
//!
//! Talks to the project's PostgREST endpoint (`{url}/rest/v1/{table}`) with
//! the anon key in both the `apikey` and `Authorization` headers. Ordering
//! and limits are pushed down to the database via `order=` and `limit=`.

use async_trait::async_trait;
use reqwest::{Client, Response, Url};
use serde::Deserialize;
use tracing::debug;

use super::{MessageRow, MessageStore, NewMessage, StoreError};

#[derive(Clone, Debug)]
pub struct SupabaseStore {
    base_url: String,
    api_key: String,
    table: String,
    client: Client,
}

/// PostgREST error envelope; only `message` is surfaced.
#[derive(Deserialize)]
struct PostgrestError {
    message: String,
}

impl SupabaseStore {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        table: impl Into<String>,
    ) -> Result<Self, StoreError> {
        let client = Client::builder()
            .user_agent(concat!("solace-server/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            table: table.into(),
            client,
        })
    }

    fn table_url(&self) -> Result<Url, StoreError> {
        let raw = format!("{}/rest/v1/{}", self.base_url.trim_end_matches('/'), self.table);
        Url::parse(&raw).map_err(|e| StoreError::InvalidUrl(format!("{raw:?}: {e}")))
    }

    async fn select(&self, order: &str, limit: Option<usize>) -> Result<Vec<MessageRow>, StoreError> {
        let mut url = self.table_url()?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("select", "*").append_pair("order", order);
            if let Some(limit) = limit {
                query.append_pair("limit", &limit.to_string());
            }
        }
        debug!(%url, "selecting messages");

        let resp = self
            .client
            .get(url)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .send()
            .await?;
        Ok(check(resp).await?.json().await?)
    }
}

#[async_trait]
impl MessageStore for SupabaseStore {
    async fn insert(&self, message: NewMessage) -> Result<MessageRow, StoreError> {
        let url = self.table_url()?;
        let resp = self
            .client
            .post(url)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .header("Prefer", "return=representation")
            .json(&message)
            .send()
            .await?;
        let rows: Vec<MessageRow> = check(resp).await?.json().await?;
        rows.into_iter().next().ok_or(StoreError::EmptyInsert)
    }

    async fn recent(&self, limit: usize) -> Result<Vec<MessageRow>, StoreError> {
        self.select("created_at.desc", Some(limit)).await
    }

    async fn list(&self) -> Result<Vec<MessageRow>, StoreError> {
        self.select("created_at.asc", None).await
    }
}

/// Pass a success response through; turn anything else into [`StoreError::Api`].
async fn check(resp: Response) -> Result<Response, StoreError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<PostgrestError>(&body)
        .map(|e| e.message)
        .unwrap_or(body);
    Err(StoreError::Api { status: status.as_u16(), message })
}
