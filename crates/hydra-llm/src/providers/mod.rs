//! Provider adapters.
//!
//! Every configured model carries a `provider` tag which resolves to one of
//! a closed set of adapter variants. An adapter knows how to encode the
//! canonical chat body for its upstream, how to decode the reply back into
//! the canonical shape, and whether calls must pass through the
//! single-flight gate.

/// Cohere chat API adaptation
pub mod cohere;
/// GigaChat adaptation and OAuth
pub mod gigachat;
/// OpenAI-compatible pass-through dialect
pub mod openai;

use std::time::Duration;

use serde_json::Value;

use crate::catalog::Model;
use crate::error::{Error, Result};

/// Adapter variant for a provider family.
///
/// Unrecognized provider tags fall back to the pass-through dialect, which
/// is what the long tail of OpenAI-compatible hosts (groq, github, arliai,
/// openrouter, ...) speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Adapter {
    /// OpenAI-compatible request and response, body passed through
    OpenAi,
    /// Workers AI chat: pass-through dialect, gated, `@`-prefixed model
    Cloudflare,
    /// GigaChat: OAuth bearer, gated, response converted
    GigaChat,
    /// Cohere chat API response shape
    Cohere,
}

impl Adapter {
    /// Resolve a model's provider tag to its adapter.
    #[must_use]
    pub fn from_provider(provider: &str) -> Self {
        if provider.eq_ignore_ascii_case("cloudflare") {
            Self::Cloudflare
        } else if provider.eq_ignore_ascii_case("gigachat") {
            Self::GigaChat
        } else if provider.eq_ignore_ascii_case("cohere") {
            Self::Cohere
        } else {
            Self::OpenAi
        }
    }

    /// Whether calls must be serialized through the provider's gate.
    #[must_use]
    pub fn gated(self) -> bool {
        matches!(self, Self::Cloudflare | Self::GigaChat)
    }

    /// Minimum spacing between consecutive calls for gated providers.
    #[must_use]
    pub fn gap(self) -> Duration {
        Duration::from_secs(1)
    }

    /// The `model` value to send upstream.
    #[must_use]
    pub fn upstream_model(self, model: &Model) -> String {
        match self {
            // Workers AI model ids keep the full configured name behind a
            // leading `@`.
            Self::Cloudflare => format!("@{}", model.name),
            _ => model.upstream_name().to_string(),
        }
    }

    /// Encode the outbound body: the client JSON with the `model` field
    /// rewritten for this upstream. Everything else passes through.
    #[must_use]
    pub fn encode(self, model: &Model, body: &Value) -> Value {
        let mut out = body.clone();
        if let Value::Object(map) = &mut out {
            map.insert("model".to_string(), Value::String(self.upstream_model(model)));
        }
        out
    }

    /// Decode an upstream reply into the canonical chat-completion shape.
    pub fn decode(self, raw: &[u8], model: &Model, wants_tool_calls: bool) -> Result<Value> {
        match self {
            Self::OpenAi | Self::Cloudflare => {
                serde_json::from_slice(raw).map_err(|e| Error::InvalidResponse(e.to_string()))
            }
            Self::Cohere => {
                let response = cohere::decode(raw, &model.name)?;
                serde_json::to_value(response).map_err(|e| Error::InvalidResponse(e.to_string()))
            }
            Self::GigaChat => {
                let response = gigachat::convert(raw, &model.name, wants_tool_calls)?;
                serde_json::to_value(response).map_err(|e| Error::InvalidResponse(e.to_string()))
            }
        }
    }
}
