use sa_domain::config::{AuthMode, Config, ProviderKind};

#[test]
fn default_config_has_no_providers_and_auto_summary_on() {
    let config = Config::default();
    assert!(config.llm.providers.is_empty());
    assert!(config.llm.default_provider.is_none());
    assert!(config.llm.auto_summary);
    assert!(config.agents.executor_order.is_empty());
}

#[test]
fn missing_sections_fall_back_to_defaults() {
    let toml_str = r#"
[llm]
default_provider = "openai"

[[llm.providers]]
id = "openai"
kind = "openai_compat"
base_url = "https://api.openai.com/v1"

[llm.providers.auth]
mode = "api_key"
env = "OPENAI_API_KEY"
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    assert_eq!(config.llm.providers.len(), 1);
    assert_eq!(config.llm.providers[0].kind, ProviderKind::OpenaiCompat);
    assert_eq!(config.llm.providers[0].auth.mode, AuthMode::ApiKey);
    // Sections absent from the document (agents/tools/sessions/workspace)
    // fall back to their own `Default` impls rather than failing to parse.
    assert!(config.agents.executors.is_empty());
    assert!(config.sessions.max_step_retries > 0);
}
