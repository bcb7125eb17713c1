//! Cohere chat API adaptation.
//!
//! Cohere replies with `{message: {content: [{text: ...}, ...]}}`; the
//! proxy extracts the first text block and synthesizes a canonical
//! single-choice response.

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::schema::{ChatResponse, Choice, ResponseMessage, Usage};

#[derive(Debug, Deserialize)]
struct CohereResponse {
    message: CohereMessage,
}

#[derive(Debug, Deserialize)]
struct CohereMessage {
    #[serde(default)]
    content: Vec<CohereContent>,
}

#[derive(Debug, Deserialize)]
struct CohereContent {
    #[serde(default)]
    text: String,
}

/// Decode a Cohere reply into the canonical shape.
pub fn decode(raw: &[u8], model_name: &str) -> Result<ChatResponse> {
    let reply: CohereResponse =
        serde_json::from_slice(raw).map_err(|e| Error::InvalidResponse(e.to_string()))?;

    let text = reply
        .message
        .content
        .into_iter()
        .next()
        .map(|c| c.text)
        .unwrap_or_default();

    let choice = Choice {
        index: 0,
        message: ResponseMessage {
            role: "assistant".to_string(),
            content: Some(text),
            refusal: None,
            function_call: None,
            tool_calls: None,
        },
        logprobs: None,
        finish_reason: "stop".to_string(),
    };

    Ok(ChatResponse::synthesized(model_name, vec![choice], Usage::default()))
}
