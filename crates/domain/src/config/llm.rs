use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// LLM Gateway configuration
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Registered LLM providers (data-driven: adding a provider = adding config).
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
    /// `id` of the provider used when a step doesn't pick one explicitly.
    #[serde(default)]
    pub default_provider: Option<String>,
    /// Token budget enforced before every outbound request (§4.2/§4.3).
    /// `None` disables the check.
    #[serde(default)]
    pub max_input_tokens: Option<u32>,
    /// Whether the Planning Flow runs conversation summarization before
    /// each non-first step (§4.9).
    #[serde(default = "d_true")]
    pub auto_summary: bool,
    /// Request timeout per attempt.
    #[serde(default = "d_60000")]
    pub request_timeout_ms: u64,
    /// Maximum retry attempts for transient provider errors (§4.3 step 8).
    #[serde(default = "d_6")]
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            providers: Vec::new(),
            default_provider: None,
            max_input_tokens: None,
            auto_summary: true,
            request_timeout_ms: 60_000,
            max_retries: 6,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub id: String,
    pub kind: ProviderKind,
    pub base_url: String,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub default_model: Option<String>,
    /// Models this provider advertises as accepting image content parts.
    /// An empty list means "treat every model on this provider as text-only".
    #[serde(default)]
    pub multimodal_models: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    OpenaiCompat,
    Anthropic,
    Google,
    AwsBedrock,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AuthConfig {
    #[serde(default)]
    pub mode: AuthMode,
    /// Env var containing the API key.
    #[serde(default)]
    pub env: Option<String>,
    /// Direct key (config-only setups; prefer `env`).
    #[serde(default)]
    pub key: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    #[default]
    ApiKey,
    None,
}

impl AuthConfig {
    /// Resolve the API key from config or environment. Returns `None` when
    /// `mode == None` or no source is configured.
    pub fn resolve_key(&self) -> Option<String> {
        if self.mode == AuthMode::None {
            return None;
        }
        if let Some(key) = &self.key {
            if !key.is_empty() {
                return Some(key.clone());
            }
        }
        if let Some(env) = &self.env {
            if let Ok(val) = std::env::var(env) {
                if !val.is_empty() {
                    return Some(val);
                }
            }
        }
        None
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_true() -> bool {
    true
}
fn d_60000() -> u64 {
    60_000
}
fn d_6() -> u32 {
    6
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_key_prefers_direct_key() {
        let auth = AuthConfig {
            mode: AuthMode::ApiKey,
            env: Some("SA_TEST_NONEXISTENT_ENV_VAR".into()),
            key: Some("sk-direct".into()),
        };
        assert_eq!(auth.resolve_key().as_deref(), Some("sk-direct"));
    }

    #[test]
    fn resolve_key_none_mode_is_always_none() {
        let auth = AuthConfig {
            mode: AuthMode::None,
            env: None,
            key: Some("sk-direct".into()),
        };
        assert_eq!(auth.resolve_key(), None);
    }

    #[test]
    fn llm_config_default_has_no_providers() {
        let config = LlmConfig::default();
        assert!(config.providers.is_empty());
        assert!(config.auto_summary);
        assert_eq!(config.max_retries, 6);
    }
}
