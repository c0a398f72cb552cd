use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// NewsAPI key; `NEWS_API_KEY` overrides it in `load`
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_country")]
    pub country: String,
    /// Headline categories; the first one is loaded on startup
    #[serde(default = "default_categories")]
    pub categories: Vec<String>,
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_connectivity_timeout_ms")]
    pub connectivity_timeout_ms: u64,
}

fn default_base_url() -> String {
    "https://newsapi.org".to_string()
}

fn default_country() -> String {
    "us".to_string()
}

fn default_categories() -> Vec<String> {
    [
        "general",
        "business",
        "entertainment",
        "health",
        "science",
        "sports",
        "technology",
    ]
    .iter()
    .map(|c| c.to_string())
    .collect()
}

fn default_bind_address() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_database_url() -> String {
    "sqlite:newsdesk.db?mode=rwc".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_connectivity_timeout_ms() -> u64 {
    1500
}

impl Config {
    /// Load from a TOML file, then apply `NEWS_API_KEY` and `DATABASE_URL`.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_str(&content)?;
        config.apply_env(
            std::env::var("NEWS_API_KEY").ok(),
            std::env::var("DATABASE_URL").ok(),
        );
        Ok(config)
    }

    /// Parse config from a TOML string (useful for testing)
    pub fn from_str(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        if config.categories.is_empty() {
            anyhow::bail!("At least one category must be configured");
        }
        Ok(config)
    }

    fn apply_env(&mut self, api_key: Option<String>, database_url: Option<String>) {
        if let Some(key) = api_key.filter(|k| !k.is_empty()) {
            self.api_key = key;
        }
        if let Some(url) = database_url.filter(|u| !u.is_empty()) {
            self.database_url = url;
        }
    }

    pub fn default_category(&self) -> &str {
        self.categories
            .first()
            .map(String::as_str)
            .unwrap_or("general")
    }
}
