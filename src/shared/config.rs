//! Application configuration. Store backend, data paths, AI credentials.

use serde::Deserialize;
use tracing::warn;

/// Default directory for durable state.
pub const DEFAULT_DATA_DIR: &str = "./data";

/// Which `StorePort` adapter backs the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Json,
    Sqlite,
    Memory,
}

#[derive(Debug, Deserialize, Default)]
pub struct AppConfig {
    /// Directory for durable state. Read from SWAPMEET_DATA_DIR.
    pub data_dir: Option<String>,

    /// Store backend: "json" (default), "sqlite", or "memory". Read from
    /// SWAPMEET_STORE_BACKEND.
    #[serde(default)]
    pub store_backend: Option<String>,

    // ─────────────────────────────────────────────────────────────────────────
    // AI Listing-Copy Configuration
    // ─────────────────────────────────────────────────────────────────────────
    /// AI API key (e.g., OpenAI). Read from SWAPMEET_AI_API_KEY.
    #[serde(default)]
    pub ai_api_key: Option<String>,

    /// AI API URL. Defaults to OpenAI. Read from SWAPMEET_AI_API_URL.
    #[serde(default)]
    pub ai_api_url: Option<String>,

    /// AI model name. Defaults to "gpt-4o". Read from SWAPMEET_AI_MODEL.
    #[serde(default)]
    pub ai_model: Option<String>,
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenv::dotenv().ok();
        let mut c = config::Config::builder();
        c = c.add_source(config::Environment::with_prefix("SWAPMEET"));
        if let Ok(path) = std::env::var("SWAPMEET_CONFIG") {
            c = c.add_source(config::File::with_name(&path));
        }
        c.build()?.try_deserialize()
    }

    /// Returns the data directory. Defaults to ./data.
    pub fn data_dir_or_default(&self) -> String {
        self.data_dir
            .clone()
            .unwrap_or_else(|| DEFAULT_DATA_DIR.to_string())
    }

    /// Returns the configured store backend. Unknown values fall back to
    /// JSON with a warning.
    pub fn store_backend_or_default(&self) -> StoreBackend {
        match self.store_backend.as_deref() {
            None | Some("json") => StoreBackend::Json,
            Some("sqlite") => StoreBackend::Sqlite,
            Some("memory") => StoreBackend::Memory,
            Some(other) => {
                warn!(backend = other, "unknown store backend, using json");
                StoreBackend::Json
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // AI Configuration Helpers
    // ─────────────────────────────────────────────────────────────────────────

    /// Returns the AI API key if configured. Reads from config or
    /// SWAPMEET_AI_API_KEY env.
    pub fn ai_api_key(&self) -> Option<String> {
        self.ai_api_key
            .clone()
            .or_else(|| std::env::var("SWAPMEET_AI_API_KEY").ok())
    }

    /// Returns the AI API URL. Defaults to the OpenAI chat completions
    /// endpoint.
    pub fn ai_api_url_or_default(&self) -> String {
        self.ai_api_url
            .clone()
            .or_else(|| std::env::var("SWAPMEET_AI_API_URL").ok())
            .unwrap_or_else(|| "https://api.openai.com/v1/chat/completions".to_string())
    }

    /// Returns the AI model name. Defaults to "gpt-4o".
    pub fn ai_model_or_default(&self) -> String {
        self.ai_model
            .clone()
            .or_else(|| std::env::var("SWAPMEET_AI_MODEL").ok())
            .unwrap_or_else(|| "gpt-4o".to_string())
    }

    /// Returns true if AI is configured (API key present).
    pub fn is_ai_configured(&self) -> bool {
        self.ai_api_key().is_some()
    }
}
