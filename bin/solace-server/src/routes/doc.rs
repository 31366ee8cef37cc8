use crate::routes::{chat, health};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(info(
    title = "solace-server",
    description = "Therapist chat relay: Gemini replies over Supabase-backed history",
    version = "0.1.0",
))]
pub struct ApiDoc;

pub fn get_docs() -> utoipa::openapi::OpenApi {
    let mut root = ApiDoc::openapi();
    root.merge(health::HealthApi::openapi());
    root.merge(chat::ChatApi::openapi());
    root
}
