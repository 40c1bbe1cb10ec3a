use config::{Config as ConfigLoader, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;

use threadline_llm::{ProviderConfig, ProviderCredentials, ProviderRegistry, TextMode};
use threadline_turns::TurnConfig;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub cors: CorsConfig,
    pub logging: LoggingConfig,
    pub persistence: PersistenceConfig,
    pub llm: LlmConfig,
    #[serde(default)]
    pub stream: StreamConfig,
    #[serde(default)]
    pub turns: TurnsConfig,

    // Secrets (from ENV only)
    #[serde(default)]
    pub mongodb_uri: Option<String>,
    #[serde(skip)]
    pub credentials: ProviderCredentials,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    pub enabled: bool,
    pub origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Memory,
    Mongodb,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PersistenceConfig {
    pub backend: Backend,
    pub database: String,
    /// Users inserted into the in-memory backend at startup
    #[serde(default)]
    pub seed_users: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    /// Registry entry used for every turn
    pub default_config: String,
    #[serde(default)]
    pub system_prompt: Option<String>,
    /// Extra named configurations, layered over the built-in ones
    #[serde(default)]
    pub configs: Vec<NamedProviderConfig>,
}

/// `[[llm.configs]]` entry
#[derive(Debug, Clone, Deserialize)]
pub struct NamedProviderConfig {
    pub name: String,
    pub provider: String,
    pub model: String,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub streaming_enabled: Option<bool>,
    #[serde(default)]
    pub web_grounding: bool,
    #[serde(default)]
    pub text_mode: Option<TextMode>,
}

impl NamedProviderConfig {
    pub fn to_provider_config(&self) -> ProviderConfig {
        let mut config = ProviderConfig::new(&self.provider, &self.model)
            .web_grounding(self.web_grounding);
        if let Some(base_url) = &self.base_url {
            config = config.with_base_url(base_url);
        }
        if let Some(temperature) = self.temperature {
            config = config.temperature(temperature);
        }
        if let Some(max_tokens) = self.max_tokens {
            config = config.max_tokens(max_tokens);
        }
        if let Some(streaming) = self.streaming_enabled {
            config = config.streaming(streaming);
        }
        if let Some(mode) = self.text_mode {
            config = config.text_mode(mode);
        }
        config
    }
}

impl LlmConfig {
    /// Registry with the built-in configs, then the configured ones, all with
    /// credentials applied
    pub fn build_registry(&self, credentials: &ProviderCredentials) -> ProviderRegistry {
        let registry = ProviderRegistry::with_default_configs(credentials);
        for named in &self.configs {
            let mut config = named.to_provider_config();
            credentials.apply(&mut config);
            registry.register_config(&named.name, config);
        }
        registry
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StreamConfig {
    pub keepalive_secs: u64,
    pub channel_capacity: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            keepalive_secs: 15,
            channel_capacity: 64,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TurnsConfig {
    pub title_max_chars: usize,
    /// 0 disables the stale-turn sweeper
    pub stale_after_secs: u64,
    pub sweep_interval_secs: u64,
}

impl Default for TurnsConfig {
    fn default() -> Self {
        Self {
            title_max_chars: 50,
            stale_after_secs: 0,
            sweep_interval_secs: 60,
        }
    }
}

impl Config {
    /// Load configuration from TOML files and environment variables
    ///
    /// Hierarchy (weakest to strongest):
    /// 1. config/default.toml
    /// 2. config/{ENV}.toml (if ENV is set)
    /// 3. Environment variables prefixed `THREADLINE_`, with `__` between
    ///    nested keys (e.g. `THREADLINE_SERVER__PORT=8080`)
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("ENV").unwrap_or_else(|_| "dev".to_string());

        let builder = ConfigLoader::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(
                Environment::with_prefix("THREADLINE")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        let mut cfg: Config = builder.build()?.try_deserialize()?;

        // Load secrets from ENV (not in TOML)
        cfg.mongodb_uri = std::env::var("MONGODB_URI").ok().filter(|v| !v.is_empty());
        cfg.credentials = ProviderCredentials::from_env();
        cfg.validate()?;

        Ok(cfg)
    }

    /// Load config from a specific path (useful for testing)
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let builder = ConfigLoader::builder().add_source(File::from(path.as_ref()));

        let cfg: Config = builder.build()?.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.persistence.backend == Backend::Mongodb && self.mongodb_uri.is_none() {
            return Err(ConfigError::Message(
                "MONGODB_URI environment variable is required for the mongodb backend".to_string(),
            ));
        }
        Ok(())
    }

    pub fn turn_config(&self) -> TurnConfig {
        TurnConfig {
            default_config: self.llm.default_config.clone(),
            system_prompt: self.llm.system_prompt.clone(),
            title_max_chars: self.turns.title_max_chars,
            channel_capacity: self.stream.channel_capacity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOML: &str = r#"
        [server]
        host = "127.0.0.1"
        port = 3000

        [cors]
        enabled = true
        origins = ["http://localhost:5173"]

        [logging]
        level = "debug"
        format = "json"

        [persistence]
        backend = "memory"
        database = "threadline_test"
        seed_users = ["alice"]

        [llm]
        default_config = "local-fast"
        system_prompt = "Answer briefly."

        [[llm.configs]]
        name = "local-fast"
        provider = "local"
        model = "qwen2.5-7b"
        base_url = "http://localhost:9000"
        max_tokens = 512
        text_mode = "cumulative"

        [turns]
        title_max_chars = 40
        stale_after_secs = 600
        sweep_interval_secs = 30
    "#;

    #[test]
    fn test_config_structure() {
        let config: Config = toml::from_str(TOML).unwrap();

        assert_eq!(config.server.port, 3000);
        assert_eq!(config.persistence.backend, Backend::Memory);
        assert_eq!(config.persistence.seed_users, vec!["alice"]);
        assert_eq!(config.stream.keepalive_secs, 15);
        assert_eq!(config.turns.stale_after_secs, 600);

        let turn_config = config.turn_config();
        assert_eq!(turn_config.default_config, "local-fast");
        assert_eq!(turn_config.title_max_chars, 40);
        assert_eq!(turn_config.channel_capacity, 64);
    }

    #[test]
    fn test_named_configs_layer_over_builtins() {
        let config: Config = toml::from_str(TOML).unwrap();
        let credentials = ProviderCredentials {
            google_api_key: Some("g-key".to_string()),
            ..Default::default()
        };

        let registry = config.llm.build_registry(&credentials);

        let local = registry.resolve_config("local-fast").unwrap();
        assert_eq!(local.model, "qwen2.5-7b");
        assert_eq!(local.base_url.as_deref(), Some("http://localhost:9000"));
        assert_eq!(local.max_tokens, 512);
        assert_eq!(local.text_mode, TextMode::Cumulative);

        let gemini = registry.resolve_config("gemini_2_5_flash").unwrap();
        assert_eq!(gemini.api_key.as_deref(), Some("g-key"));
    }

    #[test]
    fn test_mongodb_backend_requires_uri() {
        let mut config: Config = toml::from_str(TOML).unwrap();
        config.persistence.backend = Backend::Mongodb;

        assert!(config.validate().is_err());

        config.mongodb_uri = Some("mongodb://localhost:27017".to_string());
        assert!(config.validate().is_ok());
    }
}
