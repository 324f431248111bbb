mod agents;
mod llm;
mod sessions;
mod tools;
mod workspace;

pub use agents::*;
pub use llm::*;
pub use sessions::*;
pub use tools::*;
pub use workspace::*;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub agents: AgentsConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub sessions: SessionsConfig,
    #[serde(default)]
    pub workspace: WorkspaceConfig,
}

impl Config {
    /// Load and parse a TOML config file. Missing sections fall back to
    /// their defaults (every field carries `#[serde(default)]`).
    pub fn load(path: &Path) -> crate::error::Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(crate::error::Error::Io)?;
        toml::from_str(&raw)
            .map_err(|e| crate::error::Error::Config(format!("parsing {}: {e}", path.display())))
    }

    /// Resolve the `AgentConfig` for an executor key, falling back to the
    /// default configuration when the key has no explicit entry.
    pub fn agent_config(&self, key: &str) -> AgentConfig {
        self.agents
            .executors
            .get(key)
            .cloned()
            .unwrap_or_default()
    }

    pub fn provider(&self, id: &str) -> Option<&ProviderConfig> {
        self.llm.providers.iter().find(|p| p.id == id)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues. An empty
    /// vec means everything looks good; callers should treat any `Error`
    /// severity entry as fatal (the teacher's `cli doctor` convention).
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.llm.providers.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "llm.providers".into(),
                message: "no LLM providers configured".into(),
            });
        }

        let mut seen_ids: HashSet<&str> = HashSet::new();
        for (i, provider) in self.llm.providers.iter().enumerate() {
            if provider.id.is_empty() {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: format!("llm.providers[{i}].id"),
                    message: "provider id must not be empty".into(),
                });
            }
            if provider.base_url.is_empty() {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: format!("llm.providers[{i}].base_url"),
                    message: "provider base_url must not be empty".into(),
                });
            }
            if !provider.base_url.is_empty()
                && !provider.base_url.starts_with("http://")
                && !provider.base_url.starts_with("https://")
            {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: format!("llm.providers[{i}].base_url"),
                    message: format!(
                        "base_url must start with http:// or https:// (got \"{}\")",
                        provider.base_url
                    ),
                });
            }
            if !provider.id.is_empty() && !seen_ids.insert(&provider.id) {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Warning,
                    field: format!("llm.providers[{i}].id"),
                    message: format!(
                        "duplicate provider id \"{}\" — later provider will shadow earlier one",
                        provider.id
                    ),
                });
            }
            if provider.auth.mode == AuthMode::ApiKey {
                let has_env = provider.auth.env.as_ref().is_some_and(|v| !v.is_empty());
                let has_key = provider.auth.key.as_ref().is_some_and(|v| !v.is_empty());
                if !has_env && !has_key {
                    errors.push(ConfigError {
                        severity: ConfigSeverity::Error,
                        field: format!("llm.providers[{i}].auth"),
                        message: format!(
                            "provider \"{}\" uses api_key auth but has no auth.env or auth.key configured",
                            provider.id
                        ),
                    });
                }
            }
        }

        if let Some(default_id) = &self.llm.default_provider {
            if self.provider(default_id).is_none() {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: "llm.default_provider".into(),
                    message: format!("default_provider \"{default_id}\" is not in llm.providers"),
                });
            }
        }

        if let Some(max) = self.llm.max_input_tokens {
            if max == 0 {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: "llm.max_input_tokens".into(),
                    message: "max_input_tokens must be greater than 0 when set".into(),
                });
            }
        }

        for (key, agent) in &self.agents.executors {
            if agent.max_steps == 0 {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: format!("agents.{key}.max_steps"),
                    message: "max_steps must be greater than 0".into(),
                });
            }
        }

        for (i, pattern) in self.tools.exec_security.denied_patterns.iter().enumerate() {
            if let Err(e) = regex::Regex::new(pattern) {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: format!("tools.exec_security.denied_patterns[{i}]"),
                    message: format!("invalid regex \"{pattern}\": {e}"),
                });
            }
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        Config {
            llm: LlmConfig {
                providers: vec![ProviderConfig {
                    id: "openai".into(),
                    kind: ProviderKind::OpenaiCompat,
                    base_url: "https://api.openai.com/v1".into(),
                    auth: AuthConfig {
                        mode: AuthMode::ApiKey,
                        env: Some("OPENAI_API_KEY".into()),
                        key: None,
                    },
                    default_model: Some("gpt-4o".into()),
                    multimodal_models: vec!["gpt-4o".into()],
                }],
                default_provider: Some("openai".into()),
                ..LlmConfig::default()
            },
            ..Config::default()
        }
    }

    fn find_issue<'a>(issues: &'a [ConfigError], field_prefix: &str) -> Option<&'a ConfigError> {
        issues.iter().find(|e| e.field.starts_with(field_prefix))
    }

    #[test]
    fn valid_config_passes() {
        let issues = valid_config().validate();
        let errors: Vec<_> = issues
            .iter()
            .filter(|e| e.severity == ConfigSeverity::Error)
            .collect();
        assert!(errors.is_empty(), "expected no errors, got: {errors:?}");
    }

    #[test]
    fn provider_base_url_invalid_scheme_is_error() {
        let mut cfg = valid_config();
        cfg.llm.providers[0].base_url = "ws://localhost:1234".into();
        let issues = cfg.validate();
        let issue = find_issue(&issues, "llm.providers[0].base_url")
            .expect("expected provider base_url error");
        assert_eq!(issue.severity, ConfigSeverity::Error);
    }

    #[test]
    fn api_key_mode_no_credentials_is_error() {
        let mut cfg = valid_config();
        cfg.llm.providers[0].auth = AuthConfig {
            mode: AuthMode::ApiKey,
            env: None,
            key: None,
        };
        let issues = cfg.validate();
        let issue = find_issue(&issues, "llm.providers[0].auth").expect("expected auth error");
        assert_eq!(issue.severity, ConfigSeverity::Error);
    }

    #[test]
    fn unknown_default_provider_is_error() {
        let mut cfg = valid_config();
        cfg.llm.default_provider = Some("nonexistent".into());
        let issues = cfg.validate();
        assert!(find_issue(&issues, "llm.default_provider").is_some());
    }

    #[test]
    fn zero_max_input_tokens_is_error() {
        let mut cfg = valid_config();
        cfg.llm.max_input_tokens = Some(0);
        let issues = cfg.validate();
        assert!(find_issue(&issues, "llm.max_input_tokens").is_some());
    }

    #[test]
    fn no_providers_is_warning() {
        let mut cfg = valid_config();
        cfg.llm.providers.clear();
        let issues = cfg.validate();
        let issue = find_issue(&issues, "llm.providers").expect("expected no-providers warning");
        assert_eq!(issue.severity, ConfigSeverity::Warning);
    }

    #[test]
    fn invalid_denied_pattern_is_error() {
        let mut cfg = valid_config();
        cfg.tools.exec_security.denied_patterns = vec![r"[invalid".into()];
        let issues = cfg.validate();
        assert!(find_issue(&issues, "tools.exec_security.denied_patterns[0]").is_some());
    }

    #[test]
    fn zero_max_steps_is_error() {
        let mut cfg = valid_config();
        cfg.agents.executors.insert(
            "executor".into(),
            AgentConfig {
                max_steps: 0,
                ..AgentConfig::default()
            },
        );
        let issues = cfg.validate();
        assert!(find_issue(&issues, "agents.executor.max_steps").is_some());
    }
}
