//! Chat routes: reply generation and message history.
//!
//! Generation reads the most recent rows from the store, renders them into the
//! therapist prompt and forwards it to the model. It never writes to the
//! store; clients persist both turns through `POST /api/chat/messages`.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use utoipa::{IntoParams, OpenApi, ToSchema};

use crate::error::ServerError;
use crate::prompt::{self, GREETING_INSTRUCTION};
use crate::state::AppState;
use crate::store::{MessageRow, NewMessage};

#[derive(OpenApi)]
#[openapi(
    paths(generate_response, generate_greeting, save_message, get_messages),
    components(schemas(GenerateBody, GenerateResponse, NewMessage, MessageRow))
)]
pub struct ChatApi;

/// Register chat routes.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/chat/generate", post(generate_response))
        .route("/chat/greeting", post(generate_greeting))
        .route("/chat/messages", post(save_message).get(get_messages))
}

// ── Request / response types ──────────────────────────────────────────────────

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct GenerateQuery {
    /// The patient's current message.
    pub message: Option<String>,
}

/// Alternative to the `message` query parameter.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct GenerateBody {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct GenerateResponse {
    pub response: String,
}

// ── Handlers ──────────────────────────────────────────────────────────────────

/// Generate a therapist reply (`POST /api/chat/generate`).
///
/// `message` comes from the query string, or from a JSON body when the query
/// parameter is absent.
#[utoipa::path(
    post,
    path = "/api/chat/generate",
    tag = "chat",
    params(GenerateQuery),
    request_body(content = GenerateBody, description = "Used only when the query parameter is absent", content_type = "application/json"),
    responses(
        (status = 200, description = "Reply generated", body = GenerateResponse),
        (status = 422, description = "No message supplied, or the query/body is malformed"),
        (status = 500, description = "Store or model failure"),
    )
)]
pub async fn generate_response(
    State(state): State<Arc<AppState>>,
    query: Result<Query<GenerateQuery>, QueryRejection>,
    body: Bytes,
) -> Result<Json<GenerateResponse>, ServerError> {
    let Query(query) = query?;
    let message = match query.message {
        Some(message) => message,
        None if body.is_empty() => {
            return Err(ServerError::Unprocessable("field required: message".into()));
        }
        None => {
            serde_json::from_slice::<GenerateBody>(&body)
                .map_err(|e| ServerError::Unprocessable(format!("invalid request body: {e}")))?
                .message
        }
    };

    let response = reply(&state, &message).await?;
    Ok(Json(GenerateResponse { response }))
}

/// Generate the session-opening greeting (`POST /api/chat/greeting`).
#[utoipa::path(
    post,
    path = "/api/chat/greeting",
    tag = "chat",
    responses(
        (status = 200, description = "Greeting generated", body = GenerateResponse),
        (status = 500, description = "Store or model failure"),
    )
)]
pub async fn generate_greeting(
    State(state): State<Arc<AppState>>,
) -> Result<Json<GenerateResponse>, ServerError> {
    let response = reply(&state, GREETING_INSTRUCTION).await?;
    Ok(Json(GenerateResponse { response }))
}

/// Persist one chat turn (`POST /api/chat/messages`).
#[utoipa::path(
    post,
    path = "/api/chat/messages",
    tag = "chat",
    request_body = NewMessage,
    responses(
        (status = 200, description = "Row created", body = MessageRow),
        (status = 422, description = "Body is not a valid message"),
        (status = 500, description = "Store failure"),
    )
)]
pub async fn save_message(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<NewMessage>, JsonRejection>,
) -> Result<Json<MessageRow>, ServerError> {
    let Json(req) = payload?;
    let row = state.store.insert(req).await?;
    debug!(id = row.id, is_bot = row.is_bot, "message saved");
    Ok(Json(row))
}

/// Full history, oldest first (`GET /api/chat/messages`).
#[utoipa::path(
    get,
    path = "/api/chat/messages",
    tag = "chat",
    responses(
        (status = 200, description = "All rows by creation time", body = Vec<MessageRow>),
        (status = 500, description = "Store failure"),
    )
)]
pub async fn get_messages(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<MessageRow>>, ServerError> {
    Ok(Json(state.store.list().await?))
}

/// Fetch recent history, build the prompt and ask the model for a reply.
///
/// History is used newest-first, exactly as the store returns it.
async fn reply(state: &AppState, message: &str) -> Result<String, ServerError> {
    let history = state.store.recent(state.config.context_window).await?;
    let context = prompt::render_context(&history);
    let prompt = prompt::build_prompt(&context, message);
    debug!(history = history.len(), prompt_len = prompt.len(), "generating reply");

    let text = state.model.generate(&prompt).await?;
    if text.is_empty() {
        return Err(ServerError::EmptyResponse);
    }
    info!(output_len = text.len(), "reply generated");
    Ok(text)
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::Config;
    use crate::model::{ModelError, TextModel};
    use crate::store::{MemoryStore, MessageStore, StoreError};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use std::sync::Mutex;
    use tower::ServiceExt;

    /// Records every prompt and answers with a fixed reply.
    struct RecordingModel {
        reply: String,
        prompts: Mutex<Vec<String>>,
    }

    impl RecordingModel {
        fn replying(reply: &str) -> Arc<Self> {
            Arc::new(Self { reply: reply.into(), prompts: Mutex::default() })
        }

        fn prompts(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TextModel for RecordingModel {
        async fn generate(&self, prompt: &str) -> Result<String, ModelError> {
            self.prompts.lock().unwrap().push(prompt.to_owned());
            Ok(self.reply.clone())
        }
    }

    struct FailingModel;

    #[async_trait]
    impl TextModel for FailingModel {
        async fn generate(&self, _prompt: &str) -> Result<String, ModelError> {
            Err(ModelError::Api { status: 429, message: "Resource has been exhausted".into() })
        }
    }

    struct FailingStore;

    #[async_trait]
    impl MessageStore for FailingStore {
        async fn insert(&self, _message: NewMessage) -> Result<MessageRow, StoreError> {
            Err(StoreError::Api { status: 401, message: "Invalid API key".into() })
        }
        async fn recent(&self, _limit: usize) -> Result<Vec<MessageRow>, StoreError> {
            Err(StoreError::Api { status: 401, message: "Invalid API key".into() })
        }
        async fn list(&self) -> Result<Vec<MessageRow>, StoreError> {
            Err(StoreError::Api { status: 401, message: "Invalid API key".into() })
        }
    }

    fn app(store: Arc<dyn MessageStore>, model: Arc<dyn TextModel>) -> Router {
        let state = AppState { config: Arc::new(Config::default()), store, model };
        crate::routes::build(Arc::new(state))
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let resp = app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
        (status, body)
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn post_empty(uri: &str) -> Request<Body> {
        Request::post(uri).body(Body::empty()).unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn save_returns_submitted_fields() {
        let app = app(Arc::new(MemoryStore::new()), RecordingModel::replying("ok"));
        let (status, body) = send(
            &app,
            post_json("/api/chat/messages", json!({ "message": "I feel anxious", "is_bot": false })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "I feel anxious");
        assert_eq!(body["is_bot"], false);
        assert!(body["id"].is_i64());
        assert!(body["created_at"].is_string());
    }

    #[tokio::test]
    async fn list_returns_rows_oldest_first() {
        let app = app(Arc::new(MemoryStore::new()), RecordingModel::replying("ok"));
        send(&app, post_json("/api/chat/messages", json!({ "message": "first", "is_bot": false }))).await;
        send(&app, post_json("/api/chat/messages", json!({ "message": "second", "is_bot": true }))).await;

        let (status, body) = send(&app, get("/api/chat/messages")).await;
        assert_eq!(status, StatusCode::OK);
        let rows: Vec<MessageRow> = serde_json::from_value(body).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].message, "first");
        assert_eq!(rows[1].message, "second");
        assert!(rows[0].created_at <= rows[1].created_at);
    }

    #[tokio::test]
    async fn generate_with_empty_history_still_prompts_model() {
        let model = RecordingModel::replying("Hello there.");
        let app = app(Arc::new(MemoryStore::new()), model.clone());

        let (status, body) = send(&app, post_empty("/api/chat/generate?message=Hi")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "response": "Hello there." }));

        let prompts = model.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("Previous relevant conversation context:\n\n"));
        assert!(prompts[0].contains("respond to this patient's message: Hi"));
    }

    #[tokio::test]
    async fn generate_uses_five_most_recent_rows_newest_first() {
        let store = Arc::new(MemoryStore::new());
        for (text, is_bot) in [
            ("too old", false),
            ("I keep worrying", false),
            ("What worries you most?", true),
            ("Work deadlines", false),
            ("That sounds stressful.", true),
            ("It is", false),
        ] {
            store.insert(NewMessage { message: text.into(), is_bot }).await.unwrap();
        }
        let model = RecordingModel::replying("Tell me more.");
        let app = app(store, model.clone());

        let (status, body) = send(&app, post_empty("/api/chat/generate?message=How%20are%20you%3F")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["response"], "Tell me more.");

        let prompt = &model.prompts()[0];
        assert!(prompt.contains(
            "Patient: It is\n\
             Therapist: That sounds stressful.\n\
             Patient: Work deadlines\n\
             Therapist: What worries you most?\n\
             Patient: I keep worrying"
        ));
        assert!(!prompt.contains("too old"));
        assert!(prompt.contains("Guidelines for varied responses:"));
        assert!(prompt.contains("respond to this patient's message: How are you?"));
    }

    #[tokio::test]
    async fn generate_does_not_persist_reply() {
        let store = Arc::new(MemoryStore::new());
        let app = app(store.clone(), RecordingModel::replying("reply"));
        send(&app, post_empty("/api/chat/generate?message=hi")).await;
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn generate_accepts_json_body() {
        let model = RecordingModel::replying("ok");
        let app = app(Arc::new(MemoryStore::new()), model.clone());
        let (status, _) = send(&app, post_json("/api/chat/generate", json!({ "message": "from body" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert!(model.prompts()[0].contains("respond to this patient's message: from body"));
    }

    #[tokio::test]
    async fn generate_without_message_is_422() {
        let model = RecordingModel::replying("ok");
        let app = app(Arc::new(MemoryStore::new()), model.clone());
        let (status, body) = send(&app, post_empty("/api/chat/generate")).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["detail"], "field required: message");
        assert!(model.prompts().is_empty());
    }

    #[tokio::test]
    async fn empty_model_output_is_500() {
        let app = app(Arc::new(MemoryStore::new()), RecordingModel::replying(""));
        let (status, body) = send(&app, post_empty("/api/chat/generate?message=hi")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({ "detail": "No response generated" }));
    }

    #[tokio::test]
    async fn model_failure_is_500_with_reason() {
        let app = app(Arc::new(MemoryStore::new()), Arc::new(FailingModel));
        let (status, body) = send(&app, post_empty("/api/chat/generate?message=hi")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["detail"], "model returned 429: Resource has been exhausted");
    }

    #[tokio::test]
    async fn store_failure_is_500_on_every_route() {
        let model = RecordingModel::replying("unused");
        let app = app(Arc::new(FailingStore), model.clone());

        for req in [
            post_empty("/api/chat/generate?message=hi"),
            post_json("/api/chat/messages", json!({ "message": "x", "is_bot": false })),
            get("/api/chat/messages"),
        ] {
            let (status, body) = send(&app, req).await;
            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(body["detail"], "store returned 401: Invalid API key");
        }
        assert!(model.prompts().is_empty());
    }

    #[tokio::test]
    async fn greeting_sends_fixed_instruction() {
        let model = RecordingModel::replying("Welcome, I'm glad you're here.");
        let app = app(Arc::new(MemoryStore::new()), model.clone());
        let (status, body) = send(&app, post_empty("/api/chat/greeting")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["response"], "Welcome, I'm glad you're here.");
        assert!(model.prompts()[0].ends_with(&format!("{GREETING_INSTRUCTION}\n")));
    }

    #[tokio::test]
    async fn malformed_save_body_is_422_with_detail() {
        let app = app(Arc::new(FailingStore), RecordingModel::replying("ok"));
        let (status, body) =
            send(&app, post_json("/api/chat/messages", json!({ "message": "missing flag" }))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["detail"].as_str().unwrap().contains("is_bot"));
    }

    #[tokio::test]
    async fn unparsable_save_body_is_422_with_detail() {
        let app = app(Arc::new(FailingStore), RecordingModel::replying("ok"));
        let req = Request::post("/api/chat/messages")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, body) = send(&app, req).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["detail"].is_string());

        let req = Request::post("/api/chat/messages")
            .body(Body::from(r#"{"message":"x","is_bot":false}"#))
            .unwrap();
        let (status, body) = send(&app, req).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["detail"].as_str().unwrap().contains("Content-Type"));
    }

    #[tokio::test]
    async fn bad_generate_query_is_422_with_detail() {
        let model = RecordingModel::replying("ok");
        let app = app(Arc::new(MemoryStore::new()), model.clone());
        let (status, body) = send(&app, post_empty("/api/chat/generate?message=a&message=b")).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["detail"].as_str().unwrap().contains("message"));
        assert!(model.prompts().is_empty());
    }
}
