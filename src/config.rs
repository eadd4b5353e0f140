//! Configuration: file + environment + CLI overrides, in that priority
//! order, covering every knob named in spec §6.

use clap::Parser;
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub llm: LLMConfig,
    pub cache: CacheConfig,
    pub pipeline: PipelineConfig,
    pub discovery: DiscoveryConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "0.0.0.0".to_string(), port: 8080 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LLMConfig {
    pub api_base: String,
    pub api_key: String,
    pub model: String,
    pub timeout_ms: u64,
    pub temperature_initial: f64,
    pub temperature_retry_delta: f64,
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            model: "gpt-4o-mini".to_string(),
            timeout_ms: 60_000,
            temperature_initial: 0.0,
            temperature_retry_delta: 0.2,
        }
    }
}

/// Local persistence for the trained-fingerprint marker and LLM response
/// cache (spec §9 ambient caching, implemented with `sqlx`'s SQLite driver).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub sqlite_path: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { sqlite_path: "data/nl2sql-cache.db".to_string() }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub max_attempts: u32,
    pub row_limit: usize,
    pub statement_timeout_ms: u64,
    pub retrieval_k_ddl: usize,
    pub retrieval_k_examples: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self { max_attempts: 3, row_limit: 1000, statement_timeout_ms: 30_000, retrieval_k_ddl: 8, retrieval_k_examples: 4 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub enabled: bool,
    pub max_tables: usize,
    pub max_cardinality: usize,
    pub cache_ttl_s: u64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self { enabled: true, max_tables: 50, max_cardinality: 30, cache_ttl_s: 600 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info,nl2sql_engine=debug".to_string() }
    }
}

/// Command line overrides for the configuration file / environment.
#[derive(Parser, Debug, Clone)]
#[command(name = "nl2sql-engine")]
#[command(version, about = "Natural-language-to-SQL analytics engine")]
pub struct CommandLineArgs {
    /// Path to configuration file
    #[arg(long, value_name = "PATH")]
    pub config: Option<String>,

    /// Server host (overrides config file)
    #[arg(long, value_name = "HOST")]
    pub server_host: Option<String>,

    /// Server port (overrides config file)
    #[arg(long, value_name = "PORT")]
    pub server_port: Option<u16>,

    /// LLM API base URL (overrides config file)
    #[arg(long, value_name = "URL")]
    pub llm_api_base: Option<String>,

    /// LLM API key (overrides config file)
    #[arg(long, value_name = "KEY")]
    pub llm_api_key: Option<String>,

    /// LLM model name (overrides config file)
    #[arg(long, value_name = "MODEL")]
    pub llm_model: Option<String>,

    /// Maximum self-correction attempts (overrides config file)
    #[arg(long, value_name = "N")]
    pub max_attempts: Option<u32>,

    /// Row cap per query result (overrides config file)
    #[arg(long, value_name = "N")]
    pub row_limit: Option<usize>,

    /// Disable schema process discovery (overrides config file)
    #[arg(long)]
    pub discovery_disabled: bool,

    /// Logging level (overrides config file, e.g. "info,nl2sql_engine=debug")
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,
}

impl Config {
    /// Loading order (priority from highest to lowest): CLI args, env vars
    /// (prefixed `APP_`), config file, defaults.
    pub fn load() -> Result<Self, anyhow::Error> {
        let cli_args = CommandLineArgs::parse();

        let config_path = cli_args.config.clone().or_else(Self::find_config_file);
        let mut config = if let Some(config_path) = config_path {
            Self::from_toml(&config_path)?
        } else {
            tracing::warn!("configuration file not found, using defaults");
            Config::default()
        };

        config.apply_env_overrides();
        config.apply_cli_overrides(&cli_args);
        config.validate()?;

        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("APP_SERVER_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("APP_SERVER_PORT")
            && let Ok(port) = port.parse()
        {
            self.server.port = port;
        }
        if let Ok(api_base) = std::env::var("APP_LLM_API_BASE") {
            self.llm.api_base = api_base;
        }
        if let Ok(api_key) = std::env::var("APP_LLM_API_KEY") {
            self.llm.api_key = api_key;
        }
        if let Ok(model) = std::env::var("APP_LLM_MODEL") {
            self.llm.model = model;
        }
        if let Ok(level) = std::env::var("APP_LOG_LEVEL") {
            self.logging.level = level;
        }
    }

    fn apply_cli_overrides(&mut self, args: &CommandLineArgs) {
        if let Some(host) = &args.server_host {
            self.server.host = host.clone();
        }
        if let Some(port) = args.server_port {
            self.server.port = port;
        }
        if let Some(api_base) = &args.llm_api_base {
            self.llm.api_base = api_base.clone();
        }
        if let Some(api_key) = &args.llm_api_key {
            self.llm.api_key = api_key.clone();
        }
        if let Some(model) = &args.llm_model {
            self.llm.model = model.clone();
        }
        if let Some(max_attempts) = args.max_attempts {
            self.pipeline.max_attempts = max_attempts;
        }
        if let Some(row_limit) = args.row_limit {
            self.pipeline.row_limit = row_limit;
        }
        if args.discovery_disabled {
            self.discovery.enabled = false;
        }
        if let Some(level) = &args.log_level {
            self.logging.level = level.clone();
        }
    }

    fn validate(&self) -> Result<(), anyhow::Error> {
        if self.server.port == 0 {
            anyhow::bail!("server.port cannot be 0");
        }
        if self.pipeline.max_attempts == 0 {
            anyhow::bail!("pipeline.max_attempts must be > 0");
        }
        if self.pipeline.row_limit == 0 {
            anyhow::bail!("pipeline.row_limit must be > 0");
        }
        if self.llm.api_key.is_empty() {
            tracing::warn!("llm.api_key is empty; LLM calls will fail until APP_LLM_API_KEY is set");
        }
        Ok(())
    }

    fn find_config_file() -> Option<String> {
        ["conf/config.toml", "config.toml", "./conf/config.toml", "./config.toml"]
            .into_iter()
            .find(|path| Path::new(path).exists())
            .map(str::to_string)
    }

    fn from_toml(path: &str) -> Result<Self, anyhow::Error> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_pass_validation() {
        let mut config = Config::default();
        config.llm.api_key = "test-key".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_max_attempts_fails_validation() {
        let mut config = Config::default();
        config.pipeline.max_attempts = 0;
        assert!(config.validate().is_err());
    }
}
