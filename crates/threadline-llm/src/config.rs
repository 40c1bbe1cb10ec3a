// Provider configuration: which vendor to call and with which runtime parameters.
// Values are handed out by the registry as copies and never mutated in place.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::LlmError;

/// Built-in adapter families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenAI,
    Anthropic,
    Google,
    Local,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAI => "openai",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Google => "google",
            ProviderKind::Local => "local",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = LlmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "openai" => Ok(ProviderKind::OpenAI),
            "anthropic" => Ok(ProviderKind::Anthropic),
            "google" => Ok(ProviderKind::Google),
            "local" => Ok(ProviderKind::Local),
            _ => Err(LlmError::UnsupportedProvider(s.to_string())),
        }
    }
}

/// How the vendor reports text on the wire
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextMode {
    /// Each frame carries only the new text
    #[default]
    Incremental,
    /// Each frame carries the full text so far
    Cumulative,
}

/// Provider-specific tool flags
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProviderTools {
    pub web_grounding: bool,
}

/// Model/runtime parameters for one named configuration
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    /// Registry tag of the adapter, e.g. "openai"
    pub provider: String,
    pub model: String,
    /// Credential; only ever supplied from the environment
    #[serde(skip)]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_streaming_enabled")]
    pub streaming_enabled: bool,
    #[serde(default)]
    pub tools: ProviderTools,
    #[serde(default)]
    pub text_mode: TextMode,
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_streaming_enabled() -> bool {
    true
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("streaming_enabled", &self.streaming_enabled)
            .field("tools", &self.tools)
            .field("text_mode", &self.text_mode)
            .finish()
    }
}

impl ProviderConfig {
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            api_key: None,
            base_url: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            streaming_enabled: default_streaming_enabled(),
            tools: ProviderTools::default(),
            text_mode: TextMode::default(),
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn streaming(mut self, enabled: bool) -> Self {
        self.streaming_enabled = enabled;
        self
    }

    pub fn web_grounding(mut self, enabled: bool) -> Self {
        self.tools.web_grounding = enabled;
        self
    }

    pub fn text_mode(mut self, mode: TextMode) -> Self {
        self.text_mode = mode;
        self
    }

    /// Built-in adapter family, if `provider` names one
    pub fn provider_kind(&self) -> Result<ProviderKind, LlmError> {
        self.provider.parse()
    }
}

/// Vendor credentials available at startup, usually read from the environment
#[derive(Clone, Default)]
pub struct ProviderCredentials {
    pub openai_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub google_api_key: Option<String>,
    pub local_llm_url: Option<String>,
}

impl fmt::Debug for ProviderCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |key: &Option<String>| key.as_ref().map(|_| "<redacted>");
        f.debug_struct("ProviderCredentials")
            .field("openai_api_key", &redact(&self.openai_api_key))
            .field("anthropic_api_key", &redact(&self.anthropic_api_key))
            .field("google_api_key", &redact(&self.google_api_key))
            .field("local_llm_url", &self.local_llm_url)
            .finish()
    }
}

impl ProviderCredentials {
    pub fn from_env() -> Self {
        fn non_empty(key: &str) -> Option<String> {
            std::env::var(key).ok().filter(|v| !v.trim().is_empty())
        }

        Self {
            openai_api_key: non_empty("OPENAI_API_KEY"),
            anthropic_api_key: non_empty("ANTHROPIC_API_KEY"),
            google_api_key: non_empty("GOOGLE_API_KEY"),
            local_llm_url: non_empty("LOCAL_LLM_URL"),
        }
    }

    /// Fill in the credential (and base URL for local models) a config needs
    pub fn apply(&self, config: &mut ProviderConfig) {
        let key = match config.provider_kind() {
            Ok(ProviderKind::OpenAI) => self.openai_api_key.clone(),
            Ok(ProviderKind::Anthropic) => self.anthropic_api_key.clone(),
            Ok(ProviderKind::Google) => self.google_api_key.clone(),
            Ok(ProviderKind::Local) => {
                if config.base_url.is_none() {
                    config.base_url = self.local_llm_url.clone();
                }
                None
            }
            Err(_) => None,
        };

        if config.api_key.is_none() {
            config.api_key = key;
        }
    }
}

/// Named configurations available out of the box
pub fn default_configs() -> Vec<(String, ProviderConfig)> {
    vec![
        (
            "gpt-4".to_string(),
            ProviderConfig::new("openai", "gpt-4-turbo-preview"),
        ),
        (
            "gpt-3.5".to_string(),
            ProviderConfig::new("openai", "gpt-3.5-turbo"),
        ),
        (
            "claude-3".to_string(),
            ProviderConfig::new("anthropic", "claude-3-sonnet-20240229"),
        ),
        (
            "gemini_2_5_flash".to_string(),
            ProviderConfig::new("google", "gemini-2.5-flash")
                .max_tokens(8192)
                .web_grounding(true),
        ),
        (
            "llama-local".to_string(),
            ProviderConfig::new("local", "llama2-7b"),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_kind_parsing() {
        assert_eq!("OpenAI".parse::<ProviderKind>().unwrap(), ProviderKind::OpenAI);
        assert_eq!("google".parse::<ProviderKind>().unwrap(), ProviderKind::Google);
        assert!(matches!(
            "cohere".parse::<ProviderKind>(),
            Err(LlmError::UnsupportedProvider(name)) if name == "cohere"
        ));
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let config = ProviderConfig::new("openai", "gpt-4").with_api_key("sk-secret");
        let debug = format!("{:?}", config);
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_config_deserializes_with_defaults() {
        let config: ProviderConfig =
            serde_json::from_str(r#"{"provider":"google","model":"gemini-2.5-flash"}"#).unwrap();
        assert_eq!(config.temperature, 0.7);
        assert_eq!(config.max_tokens, 4096);
        assert!(config.streaming_enabled);
        assert!(!config.tools.web_grounding);
        assert_eq!(config.text_mode, TextMode::Incremental);
        assert!(config.api_key.is_none());
    }

    #[test]
    fn test_credentials_apply_by_provider() {
        let creds = ProviderCredentials {
            anthropic_api_key: Some("ak".to_string()),
            local_llm_url: Some("http://gpu-box:9000".to_string()),
            ..Default::default()
        };

        let mut claude = ProviderConfig::new("anthropic", "claude-3");
        creds.apply(&mut claude);
        assert_eq!(claude.api_key.as_deref(), Some("ak"));

        let mut local = ProviderConfig::new("local", "llama2-7b");
        creds.apply(&mut local);
        assert_eq!(local.base_url.as_deref(), Some("http://gpu-box:9000"));
        assert!(local.api_key.is_none());
    }

    #[test]
    fn test_default_configs() {
        let configs = default_configs();
        let gemini = configs
            .iter()
            .find(|(name, _)| name == "gemini_2_5_flash")
            .map(|(_, c)| c)
            .unwrap();
        assert!(gemini.tools.web_grounding);
        assert_eq!(gemini.max_tokens, 8192);
        assert_eq!(configs.len(), 5);
    }
}
