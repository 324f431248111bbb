use serde::{Deserialize, Serialize};

/// Advertised capabilities of a provider/model pairing. The LLM Gateway
/// consults `supports_vision` to decide whether to strip image content
/// parts before sending (§4.3 step 1) and `supports_streaming` to pick
/// between the streaming and non-streaming call path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmCapabilities {
    pub supports_tools: bool,
    pub supports_streaming: bool,
    pub supports_vision: bool,
    pub supports_json_mode: bool,
    /// Provider-advertised context window, used as a sanity ceiling
    /// alongside `max_input_tokens` (§4.2).
    pub context_window: u32,
}

impl Default for LlmCapabilities {
    fn default() -> Self {
        Self {
            supports_tools: true,
            supports_streaming: true,
            supports_vision: false,
            supports_json_mode: true,
            context_window: 128_000,
        }
    }
}
