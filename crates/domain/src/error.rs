/// Shared error type used across all orchestrator crates.
///
/// The control-flow-relevant kinds (`TokenLimitExceeded`, `Authentication`,
/// `ToolValidation`) are dedicated variants rather than string matching, per
/// §7: retry logic and the ReAct agent branch on `matches!`/`is_retryable`,
/// never on message text.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP: {0}")]
    Http(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("provider {provider}: {message}")]
    Provider { provider: String, message: String },

    /// §4.3 step 5 / §7: raised when a request would exceed
    /// `max_input_tokens`. Bypasses retry unconditionally.
    #[error("token limit exceeded: {used} tokens > {limit} limit")]
    TokenLimitExceeded { used: u64, limit: u64 },

    /// §7: fatal, never retried.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// §4.6: Planning Tool validation failures (duplicate id, unknown plan,
    /// invalid structure, out-of-range index, invalid status).
    #[error("plan error: {0}")]
    Plan(String),

    /// §4.4: tool-level error (unknown tool, validation failure). Recorded
    /// as the tool's observation text, never propagated as a crash.
    #[error("tool error: {0}")]
    Tool(String),

    #[error("config: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// §4.3 step 8 / §9: a blacklist, not a whitelist — "never retry
    /// `TokenLimitExceeded`, argument-parse errors, or authentication
    /// failures" implies everything else transient (including
    /// `Error::Json`, concretely reachable from a provider response body
    /// that fails to parse) gets the backoff loop.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Error::TokenLimitExceeded { .. } | Error::Authentication(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_limit_and_authentication_are_never_retryable() {
        assert!(!Error::TokenLimitExceeded { used: 1, limit: 1 }.is_retryable());
        assert!(!Error::Authentication("bad key".into()).is_retryable());
    }

    #[test]
    fn everything_else_including_json_is_retryable() {
        assert!(Error::Http("502".into()).is_retryable());
        assert!(Error::Timeout("deadline".into()).is_retryable());
        assert!(Error::Provider {
            provider: "openai".into(),
            message: "oops".into()
        }
        .is_retryable());
        let json_err: Error =
            serde_json::from_str::<serde_json::Value>("not json").unwrap_err().into();
        assert!(json_err.is_retryable());
    }
}
