//! Provider registry.
//!
//! Constructs and holds all configured LLM provider instances. At startup the
//! registry reads the [`LlmConfig`] and instantiates the appropriate adapter
//! for each configured provider.

use crate::anthropic::AnthropicProvider;
use crate::bedrock::BedrockProvider;
use crate::google::GoogleProvider;
use crate::openai_compat::OpenAiCompatProvider;
use crate::traits::LlmProvider;
use sa_domain::config::{LlmConfig, ProviderKind};
use sa_domain::error::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ProviderRegistry
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Holds all instantiated LLM providers, keyed by their config id.
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn LlmProvider>>,
    default_provider: Option<String>,
}

/// Mask substrings that look like API keys or bearer tokens in an error
/// message, so raw secrets never leak into logs.
fn mask_secrets(msg: &str) -> String {
    let mut result = msg.to_string();
    for word in msg.split(|c: char| c.is_whitespace() || c == '\'' || c == '"' || c == ',') {
        let trimmed = word.trim();
        if trimmed.len() >= 20
            && trimmed
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            let masked = if trimmed.len() > 8 {
                format!("{}...{}", &trimmed[..4], &trimmed[trimmed.len() - 4..])
            } else {
                "***masked***".to_string()
            };
            result = result.replace(trimmed, &masked);
        }
    }
    result
}

impl ProviderRegistry {
    /// Build the registry from the application's [`LlmConfig`].
    ///
    /// Each entry in `config.providers` is instantiated using the adapter for
    /// its `kind`. A provider that fails to initialize (e.g. missing
    /// credentials) is logged with its secrets masked and skipped rather than
    /// aborting startup, unless it is the configured default, in which case
    /// the error is fatal since the gateway would have nothing to dispatch to.
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let mut providers: HashMap<String, Arc<dyn LlmProvider>> = HashMap::new();

        for pc in &config.providers {
            let result: Result<Arc<dyn LlmProvider>> = match pc.kind {
                ProviderKind::OpenaiCompat => OpenAiCompatProvider::from_config(pc)
                    .map(|p| Arc::new(p) as Arc<dyn LlmProvider>),
                ProviderKind::Anthropic => {
                    AnthropicProvider::from_config(pc).map(|p| Arc::new(p) as Arc<dyn LlmProvider>)
                }
                ProviderKind::Google => {
                    GoogleProvider::from_config(pc).map(|p| Arc::new(p) as Arc<dyn LlmProvider>)
                }
                ProviderKind::AwsBedrock => {
                    BedrockProvider::from_config(pc).map(|p| Arc::new(p) as Arc<dyn LlmProvider>)
                }
            };

            match result {
                Ok(provider) => {
                    tracing::info!(provider_id = %pc.id, kind = ?pc.kind, "registered LLM provider");
                    providers.insert(pc.id.clone(), provider);
                }
                Err(e) => {
                    let safe_error = mask_secrets(&e.to_string());
                    if config.default_provider.as_deref() == Some(pc.id.as_str()) {
                        return Err(Error::Config(format!(
                            "default provider '{}' failed to initialize: {}",
                            pc.id, safe_error
                        )));
                    }
                    tracing::warn!(
                        provider_id = %pc.id,
                        kind = ?pc.kind,
                        error = %safe_error,
                        "failed to initialize LLM provider, skipping"
                    );
                }
            }
        }

        Ok(Self {
            providers,
            default_provider: config.default_provider.clone(),
        })
    }

    /// Look up a provider by its config id.
    pub fn get(&self, provider_id: &str) -> Option<Arc<dyn LlmProvider>> {
        self.providers.get(provider_id).cloned()
    }

    /// Resolve the default provider, as configured by `default_provider`.
    pub fn default_provider(&self) -> Option<Arc<dyn LlmProvider>> {
        let id = self.default_provider.as_ref()?;
        self.providers.get(id).cloned()
    }

    /// Iterate over all registered providers.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Arc<dyn LlmProvider>)> {
        self.providers.iter()
    }

    /// Number of registered providers.
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// List all registered provider IDs (sorted).
    pub fn list_providers(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.providers.keys().cloned().collect();
        ids.sort();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::mask_secrets;

    #[test]
    fn mask_secrets_redacts_long_alnum_tokens() {
        let msg = "auth failed for key sk-abcdefghijklmnopqrstuvwxyz0123456789";
        let masked = mask_secrets(msg);
        assert!(!masked.contains("abcdefghijklmnopqrstuvwxyz"));
        assert!(masked.contains("sk-a"));
    }

    #[test]
    fn mask_secrets_leaves_short_words_alone() {
        let msg = "connection refused";
        assert_eq!(mask_secrets(msg), msg);
    }
}
