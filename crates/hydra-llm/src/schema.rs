//! Canonical chat-completion and image-generation wire shapes.
//!
//! Inbound bodies are kept as raw `serde_json::Value` end-to-end so that
//! client fields the proxy does not interpret (temperature, max_tokens,
//! tools, ...) reach the upstream untouched. The typed structs here are the
//! routing view of a request and the canonical response synthesized by the
//! non-pass-through adapters.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Requests
// ============================================================================

/// A single conversation message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Message role ("system", "user", "assistant", "tool")
    #[serde(default)]
    pub role: String,
    /// Message text
    #[serde(default)]
    pub content: String,
}

/// Routing view of an OpenAI-compatible chat request.
///
/// Unknown fields are ignored here; the raw body is what gets forwarded.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    /// Concrete model name, or a size-class selector ("SMALL" / "BIG" / "")
    #[serde(default)]
    pub model: String,
    /// Conversation so far
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
}

/// Image-generation request body.
///
/// The prompt arrives either as `prompt` or as `inputs` (huggingface
/// dialect); the first non-empty one wins.
#[derive(Debug, Clone, Deserialize)]
pub struct ImageRequest {
    /// Concrete model name, empty or "all" for fan-out
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub inputs: String,
}

impl ImageRequest {
    /// The effective prompt text.
    #[must_use]
    pub fn prompt_text(&self) -> &str {
        if self.prompt.is_empty() {
            &self.inputs
        } else {
            &self.prompt
        }
    }
}

// ============================================================================
// Canonical response
// ============================================================================

/// Token usage block.
///
/// Provider-specific extra counters (e.g. GigaChat's `system_tokens`) are
/// captured by the flattened map and re-emitted verbatim.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A function invocation emitted by the model. Arguments are JSON text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    pub arguments: String,
}

/// A tool call wrapping a function invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub function: FunctionCall,
}

/// The assistant message of a response choice.
///
/// `content` is serialized even when `None`: explicit null is reserved for
/// the case where a tool or function call replaces textual content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseMessage {
    pub role: String,
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refusal: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_call: Option<FunctionCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
}

/// One completion choice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Choice {
    pub index: u32,
    pub message: ResponseMessage,
    pub logprobs: Option<serde_json::Value>,
    pub finish_reason: String,
}

/// Canonical chat-completion response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<Choice>,
    pub usage: Usage,
    pub system_fingerprint: String,
}

impl ChatResponse {
    /// Scaffold a synthesized response with generated identifiers:
    /// `id = "chatcmpl-<uuid4>"`, a fresh Unix `created` timestamp, and a
    /// `system_fingerprint` of `"fp_"` plus the first 8 hex chars of a uuid.
    #[must_use]
    pub fn synthesized(model: impl Into<String>, choices: Vec<Choice>, usage: Usage) -> Self {
        let fingerprint = Uuid::new_v4().simple().to_string();
        Self {
            id: format!("chatcmpl-{}", Uuid::new_v4()),
            object: "chat.completion".to_string(),
            created: chrono::Utc::now().timestamp(),
            model: model.into(),
            choices,
            usage,
            system_fingerprint: format!("fp_{}", &fingerprint[..8]),
        }
    }
}
