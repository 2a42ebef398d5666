use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

const DEFAULT_CONFIG_FILES: &[&str] = &[
    "helpmate.toml",
    "config/helpmate.toml",
    "crates/config/helpmate.toml",
    "../helpmate.toml",
    "../config/helpmate.toml",
    "../crates/config/helpmate.toml",
    "backend/helpmate.toml",
    "backend/config/helpmate.toml",
];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub http: HttpConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub llm: LlmConfig,
    pub knowledge: KnowledgeConfig,
    pub sessions: SessionConfig,
    pub widget: WidgetConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub address: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".to_string(),
            port: 5000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://helpmate.db".to_string(),
            max_connections: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "AuthConfig::default_session_ttl")]
    pub session_ttl_seconds: u64,
    #[serde(default = "AuthConfig::default_min_password_length")]
    pub min_password_length: usize,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_ttl_seconds: Self::default_session_ttl(),
            min_password_length: Self::default_min_password_length(),
        }
    }
}

impl AuthConfig {
    const fn default_session_ttl() -> u64 {
        // 30 days
        2_592_000
    }

    const fn default_min_password_length() -> usize {
        6
    }
}

/// Connection and sampling settings for the OpenAI-compatible completion API.
///
/// ```
/// use helpmate_config::LlmConfig;
///
/// let llm = LlmConfig::default();
/// assert_eq!(llm.base_url, "https://api.openai.com/v1");
/// assert_eq!(llm.chat_model, "gpt-4");
/// assert_eq!(llm.widget_max_tokens, 500);
/// assert!(llm.api_key.is_none());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "LlmConfig::default_base_url")]
    pub base_url: String,
    #[serde(default = "LlmConfig::default_chat_model")]
    pub chat_model: String,
    #[serde(default = "LlmConfig::default_title_model")]
    pub title_model: String,
    #[serde(default = "LlmConfig::default_request_timeout")]
    pub request_timeout_seconds: u64,
    #[serde(default = "LlmConfig::default_temperature")]
    pub temperature: f32,
    #[serde(default = "LlmConfig::default_widget_max_tokens")]
    pub widget_max_tokens: u32,
    #[serde(default = "LlmConfig::default_dashboard_max_tokens")]
    pub dashboard_max_tokens: u32,
}

impl LlmConfig {
    fn default_base_url() -> String {
        "https://api.openai.com/v1".to_string()
    }

    fn default_chat_model() -> String {
        "gpt-4".to_string()
    }

    fn default_title_model() -> String {
        "gpt-3.5-turbo".to_string()
    }

    const fn default_request_timeout() -> u64 {
        30
    }

    const fn default_temperature() -> f32 {
        0.7
    }

    const fn default_widget_max_tokens() -> u32 {
        500
    }

    const fn default_dashboard_max_tokens() -> u32 {
        800
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: Self::default_base_url(),
            chat_model: Self::default_chat_model(),
            title_model: Self::default_title_model(),
            request_timeout_seconds: Self::default_request_timeout(),
            temperature: Self::default_temperature(),
            widget_max_tokens: Self::default_widget_max_tokens(),
            dashboard_max_tokens: Self::default_dashboard_max_tokens(),
        }
    }
}

/// Limits applied when grounding a prompt in an integration's knowledge base.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeConfig {
    pub max_context_tokens: usize,
    pub max_urls: usize,
    pub max_source_chars: usize,
    pub fetch_timeout_seconds: u64,
    pub max_page_bytes: usize,
    pub summarize_overflow: bool,
    pub summary_max_tokens: u32,
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            max_context_tokens: 3_000,
            max_urls: 3,
            max_source_chars: 1_000,
            fetch_timeout_seconds: 10,
            max_page_bytes: 2_000_000,
            summarize_overflow: true,
            summary_max_tokens: 400,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub ttl_seconds: u64,
    pub max_history_messages: usize,
    pub sweep_interval_seconds: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: 86_400,
            max_history_messages: 20,
            sweep_interval_seconds: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WidgetConfig {
    pub script_url: String,
    pub asset_dir: String,
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            script_url: "http://localhost:5000/widget.js".to_string(),
            asset_dir: "public".to_string(),
        }
    }
}

/// Load the application configuration by combining defaults, files, and environment overrides.
///
/// ```
/// use helpmate_config::load;
///
/// std::env::remove_var("HELPMATE_CONFIG");
///
/// let config = load().expect("configuration should load with defaults");
/// assert!(!config.http.address.is_empty());
/// ```
pub fn load() -> anyhow::Result<AppConfig> {
    let defaults = AppConfig::default();

    let mut builder = config::Config::builder()
        .set_default("http.address", defaults.http.address.clone())?
        .set_default("http.port", i64::from(defaults.http.port))?
        .set_default("database.url", defaults.database.url.clone())?
        .set_default(
            "database.max_connections",
            i64::from(defaults.database.max_connections),
        )?
        .set_default("llm.base_url", defaults.llm.base_url.clone())?
        .set_default("llm.chat_model", defaults.llm.chat_model.clone())?
        .set_default("llm.title_model", defaults.llm.title_model.clone())?;

    let environment_overrides = config::Environment::with_prefix("HELPMATE")
        .separator("__")
        .try_parsing(true);

    let mut config_file_attached = false;

    if let Ok(path) = std::env::var("HELPMATE_CONFIG") {
        builder = builder.add_source(config::File::from(PathBuf::from(&path)));
        config_file_attached = true;
        debug!(path, "loading configuration via HELPMATE_CONFIG");
    } else if let Ok(cwd) = std::env::current_dir() {
        let fallback = DEFAULT_CONFIG_FILES
            .iter()
            .map(|candidate| cwd.join(candidate))
            .find(|path| path.exists());

        if let Some(path) = fallback {
            debug!(path = %path.display(), "loading configuration file");
            builder = builder.add_source(config::File::from(path));
            config_file_attached = true;
        }
    }

    if !config_file_attached {
        debug!("no configuration file found, relying on defaults and environment overrides");
    }

    builder = builder.add_source(environment_overrides);

    let cfg = builder.build().context("unable to build configuration")?;

    let mut config = cfg
        .try_deserialize::<AppConfig>()
        .context("invalid configuration")?;

    if config.auth.session_ttl_seconds > i64::MAX as u64 {
        config.auth.session_ttl_seconds = i64::MAX as u64;
    }

    if config.knowledge.max_urls == 0 {
        debug!("knowledge.max_urls is zero, url scraping disabled");
    }

    debug!(
        address = %config.http.address,
        port = config.http.port,
        database = %config.database.url,
        model = %config.llm.chat_model,
        "loaded backend configuration"
    );
    Ok(config)
}
