use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

use crate::config::{default_configs, ProviderConfig, ProviderCredentials, ProviderKind};
use crate::error::{LlmError, Result};
use crate::providers::{AnthropicAdapter, GoogleAdapter, LocalAdapter, OpenAIAdapter};
use crate::traits::ChatAdapter;

/// Provider registry: adapter singletons keyed by provider tag, and named
/// configurations.
///
/// Both maps are sharded concurrent maps, so readers never wait on an
/// unrelated writer. Configurations are handed out as copies and replaced
/// wholesale on update.
pub struct ProviderRegistry {
    /// Map of provider tag -> adapter instance
    adapters: DashMap<String, Arc<dyn ChatAdapter>>,
    /// Map of configuration name -> parameters
    configs: DashMap<String, ProviderConfig>,
}

impl ProviderRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            adapters: DashMap::new(),
            configs: DashMap::new(),
        }
    }

    /// Registry seeded with the built-in named configurations, credentials applied
    pub fn with_default_configs(credentials: &ProviderCredentials) -> Self {
        let registry = Self::new();
        for (name, mut config) in default_configs() {
            credentials.apply(&mut config);
            registry.register_config(name, config);
        }
        registry
    }

    /// Cached adapter for `provider`, constructed on first use.
    ///
    /// Construction runs while the map entry is locked, so concurrent first
    /// callers observe the same fully built instance.
    pub fn resolve_adapter(&self, provider: &str) -> Result<Arc<dyn ChatAdapter>> {
        if let Some(adapter) = self.adapters.get(provider) {
            return Ok(Arc::clone(adapter.value()));
        }

        let kind: ProviderKind = provider.parse()?;

        let adapter = match self.adapters.entry(kind.as_str().to_string()) {
            Entry::Occupied(entry) => Arc::clone(entry.get()),
            Entry::Vacant(entry) => {
                let adapter = build_adapter(kind)?;
                tracing::debug!(provider = %kind, "Constructed provider adapter");
                Arc::clone(entry.insert(adapter).value())
            }
        };

        Ok(adapter)
    }

    /// Install an adapter under a custom tag (or replace a built-in one)
    pub fn register_adapter(&self, provider: impl Into<String>, adapter: Arc<dyn ChatAdapter>) {
        self.adapters.insert(provider.into(), adapter);
    }

    /// Snapshot of the named configuration
    pub fn resolve_config(&self, name: &str) -> Result<ProviderConfig> {
        self.configs
            .get(name)
            .map(|config| config.value().clone())
            .ok_or_else(|| LlmError::UnknownConfig(name.to_string()))
    }

    /// Adapter and config snapshot for a named configuration
    pub fn resolve(&self, name: &str) -> Result<(Arc<dyn ChatAdapter>, ProviderConfig)> {
        let config = self.resolve_config(name)?;
        let adapter = self.resolve_adapter(&config.provider)?;
        Ok((adapter, config))
    }

    /// Insert or replace a named configuration
    pub fn register_config(&self, name: impl Into<String>, config: ProviderConfig) {
        self.configs.insert(name.into(), config);
    }

    /// Copy-on-write update: `apply` edits a clone which then replaces the
    /// stored value. Snapshots already handed out are unaffected.
    pub fn update_config<F>(&self, name: &str, apply: F) -> Result<ProviderConfig>
    where
        F: FnOnce(&mut ProviderConfig),
    {
        let mut entry = self
            .configs
            .get_mut(name)
            .ok_or_else(|| LlmError::UnknownConfig(name.to_string()))?;

        let mut next = entry.value().clone();
        apply(&mut next);
        *entry.value_mut() = next.clone();

        Ok(next)
    }

    /// Returns whether a configuration was removed
    pub fn remove_config(&self, name: &str) -> bool {
        self.configs.remove(name).is_some()
    }

    /// All named configurations, sorted by name
    pub fn list_configs(&self) -> Vec<(String, ProviderConfig)> {
        let mut configs: Vec<(String, ProviderConfig)> = self
            .configs
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        configs.sort_by(|a, b| a.0.cmp(&b.0));
        configs
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn build_adapter(kind: ProviderKind) -> Result<Arc<dyn ChatAdapter>> {
    let adapter: Arc<dyn ChatAdapter> = match kind {
        ProviderKind::OpenAI => Arc::new(OpenAIAdapter::new()?),
        ProviderKind::Anthropic => Arc::new(AnthropicAdapter::new()?),
        ProviderKind::Google => Arc::new(GoogleAdapter::new()?),
        ProviderKind::Local => Arc::new(LocalAdapter::new()?),
    };
    Ok(adapter)
}
