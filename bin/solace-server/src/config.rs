//! Server configuration, loaded from environment variables at startup.

use crate::prompt::CONTEXT_WINDOW;

/// Which [`MessageStore`](crate::store::MessageStore) backend to construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// Hosted Supabase table reached over PostgREST.
    Supabase,
    /// Process-local store; history is lost on restart.
    Memory,
}

impl StoreBackend {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Supabase => "supabase",
            Self::Memory => "memory",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "supabase" => Some(Self::Supabase),
            "memory" => Some(Self::Memory),
            _ => None,
        }
    }
}

/// Runtime configuration for solace-server.
///
/// Every field has a default so the server starts without any environment
/// variables set. Missing credentials are not fatal: requests that need them
/// fail with a 500 instead.
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP address to bind (default: `"0.0.0.0:8000"`).
    pub bind_address: String,

    /// `tracing` filter string, e.g. `"info"` or `"debug,tower_http=warn"`.
    pub log_level: String,

    /// When `true`, emit log records as newline-delimited JSON.
    pub log_json: bool,

    /// Serve `/swagger-ui` and `/api-docs/openapi.json`.
    pub enable_swagger: bool,

    /// Comma-separated CORS origin allow-list. `None` means any origin.
    pub cors_allowed_origins: Option<String>,

    pub store_backend: StoreBackend,

    /// Base URL of the Supabase project, e.g. `https://xyz.supabase.co`.
    pub supabase_url: String,

    pub supabase_key: String,

    /// Table holding the chat rows.
    pub messages_table: String,

    /// Number of prior rows rendered into the prompt.
    pub context_window: usize,

    pub gemini_api_key: String,

    pub gemini_model: String,

    pub gemini_base_url: String,

    pub max_output_tokens: u32,
}

impl Config {
    /// Build [`Config`] from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            bind_address: env_or("SOLACE_BIND", "0.0.0.0:8000"),
            log_level: env_or("SOLACE_LOG", "info"),
            log_json: env_flag("SOLACE_LOG_JSON", false),
            enable_swagger: env_flag("SOLACE_ENABLE_SWAGGER", true),
            cors_allowed_origins: std::env::var("SOLACE_CORS_ORIGINS")
                .ok()
                .filter(|v| !v.trim().is_empty()),
            store_backend: std::env::var("SOLACE_STORE")
                .ok()
                .and_then(|v| StoreBackend::parse(&v))
                .unwrap_or(StoreBackend::Supabase),
            supabase_url: env_or("VITE_SUPABASE_URL", ""),
            supabase_key: env_or("VITE_SUPABASE_ANON_KEY", ""),
            messages_table: env_or("SOLACE_MESSAGES_TABLE", "messages"),
            context_window: parse_env("SOLACE_CONTEXT_WINDOW", CONTEXT_WINDOW),
            gemini_api_key: env_or("VITE_GEMINI_API_KEY", ""),
            gemini_model: env_or("SOLACE_GEMINI_MODEL", "gemini-pro"),
            gemini_base_url: env_or(
                "SOLACE_GEMINI_BASE_URL",
                "https://generativelanguage.googleapis.com",
            ),
            max_output_tokens: parse_env("SOLACE_MAX_OUTPUT_TOKENS", 1024),
        }
    }

    /// Names of credential variables that are empty.
    pub fn missing_credentials(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.gemini_api_key.is_empty() {
            missing.push("VITE_GEMINI_API_KEY");
        }
        if self.store_backend == StoreBackend::Supabase {
            if self.supabase_url.is_empty() {
                missing.push("VITE_SUPABASE_URL");
            }
            if self.supabase_key.is_empty() {
                missing.push("VITE_SUPABASE_ANON_KEY");
            }
        }
        missing
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8000".into(),
            log_level: "info".into(),
            log_json: false,
            enable_swagger: true,
            cors_allowed_origins: None,
            store_backend: StoreBackend::Supabase,
            supabase_url: String::new(),
            supabase_key: String::new(),
            messages_table: "messages".into(),
            context_window: CONTEXT_WINDOW,
            gemini_api_key: String::new(),
            gemini_model: "gemini-pro".into(),
            gemini_base_url: "https://generativelanguage.googleapis.com".into(),
            max_output_tokens: 1024,
        }
    }
}

// ── private helpers ──────────────────────────────────────────────────────────

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn env_flag(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(default)
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
