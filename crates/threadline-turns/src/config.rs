use serde::{Deserialize, Serialize};

/// Orchestrator settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnConfig {
    /// Registry config used for every turn
    pub default_config: String,
    /// Prepended to the history when set
    #[serde(default)]
    pub system_prompt: Option<String>,
    pub title_max_chars: usize,
    /// Bound of the per-turn relay channel
    pub channel_capacity: usize,
}

impl Default for TurnConfig {
    fn default() -> Self {
        Self {
            default_config: "gemini_2_5_flash".to_string(),
            system_prompt: None,
            title_max_chars: 50,
            channel_capacity: 64,
        }
    }
}

impl TurnConfig {
    pub fn new(default_config: impl Into<String>) -> Self {
        Self {
            default_config: default_config.into(),
            ..Self::default()
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_title_max_chars(mut self, max: usize) -> Self {
        self.title_max_chars = max;
        self
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    /// Thread title: the first `title_max_chars` characters of the prompt
    pub fn title_for(&self, prompt: &str) -> String {
        prompt.chars().take(self.title_max_chars).collect()
    }
}
