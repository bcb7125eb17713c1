//! GigaChat adaptation.
//!
//! GigaChat replies are nearly OpenAI-shaped but need regenerated
//! identifiers, verbatim usage copying, and function-call rewriting. The
//! credential is `client_id:client_secret`; chat calls authenticate with a
//! short-lived OAuth access token that is fetched lazily and cached until
//! close to expiry.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::schema::{ChatResponse, Choice, FunctionCall, ResponseMessage, ToolCall, Usage};

// ============================================================================
// Response conversion
// ============================================================================

#[derive(Debug, Deserialize)]
struct GigaChatResponse {
    #[serde(default)]
    choices: Vec<GigaChatChoice>,
    #[serde(default)]
    usage: Usage,
}

#[derive(Debug, Deserialize)]
struct GigaChatChoice {
    message: GigaChatMessage,
    #[serde(default)]
    finish_reason: String,
}

#[derive(Debug, Deserialize)]
struct GigaChatMessage {
    #[serde(default)]
    content: String,
    #[serde(default)]
    role: String,
    #[serde(default)]
    function_call: Option<GigaChatFunctionCall>,
}

/// Arguments arrive as a structured value and must be re-serialized into
/// JSON text for the canonical shape.
#[derive(Debug, Deserialize)]
struct GigaChatFunctionCall {
    name: String,
    #[serde(default)]
    arguments: serde_json::Value,
}

/// Convert a GigaChat reply into the canonical chat-completion shape.
///
/// `wants_tool_calls` selects between the `tool_calls` and `function_call`
/// renditions of a function invocation; a choice never carries both.
pub fn convert(raw: &[u8], model_name: &str, wants_tool_calls: bool) -> Result<ChatResponse> {
    let reply: GigaChatResponse =
        serde_json::from_slice(raw).map_err(|e| Error::InvalidResponse(e.to_string()))?;

    let mut choices = Vec::with_capacity(reply.choices.len());

    for choice in reply.choices {
        // Empty content alongside a function call becomes explicit null;
        // a bare empty string stays a string.
        let content = if choice.message.content.is_empty() && choice.message.function_call.is_some()
        {
            None
        } else {
            Some(choice.message.content)
        };

        let mut message = ResponseMessage {
            role: choice.message.role,
            content,
            refusal: None,
            function_call: None,
            tool_calls: None,
        };

        if message.role == "assistant" {
            if let Some(call) = choice.message.function_call {
                let arguments = serde_json::to_string(&call.arguments)
                    .map_err(|e| Error::InvalidResponse(e.to_string()))?;
                let function = FunctionCall {
                    name: call.name,
                    arguments,
                };
                if wants_tool_calls {
                    message.tool_calls = Some(vec![ToolCall {
                        id: format!("call_{}", Uuid::new_v4()),
                        kind: "function".to_string(),
                        function,
                    }]);
                } else {
                    message.function_call = Some(function);
                }
            }
        }

        choices.push(Choice {
            index: 0,
            message,
            logprobs: None,
            finish_reason: choice.finish_reason,
        });
    }

    Ok(ChatResponse::synthesized(model_name, choices, reply.usage))
}

// ============================================================================
// OAuth
// ============================================================================

const OAUTH_URL: &str = "https://ngw.devices.sberbank.ru:9443/api/v2/oauth";
const SCOPE: &str = "GIGACHAT_API_CORP";

/// Refresh this long before the reported expiry.
const EXPIRY_MARGIN_SECS: i64 = 60;

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn still_valid(&self, now: DateTime<Utc>) -> bool {
        self.expires_at - chrono::Duration::seconds(EXPIRY_MARGIN_SECS) > now
    }
}

#[derive(Debug, Deserialize)]
struct OauthReply {
    access_token: String,
    /// Unix milliseconds
    expires_at: i64,
}

/// Lazily fetched, cached OAuth access token for one GigaChat credential.
#[derive(Debug)]
pub struct TokenManager {
    basic: String,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenManager {
    /// Build from a `client_id:client_secret` credential.
    pub fn from_credential(credential: &str) -> Result<Self> {
        let Some((id, secret)) = credential.split_once(':') else {
            return Err(Error::OAuth(
                "credential must be client_id:client_secret".to_string(),
            ));
        };
        if id.is_empty() || secret.is_empty() {
            return Err(Error::OAuth(
                "credential must be client_id:client_secret".to_string(),
            ));
        }
        Ok(Self {
            basic: BASE64.encode(format!("{id}:{secret}")),
            cached: Mutex::new(None),
        })
    }

    /// The current access token, fetching a fresh one when the cached token
    /// is missing or within a minute of expiry.
    pub async fn token(&self, client: &Client) -> Result<String> {
        let mut cached = self.cached.lock().await;

        if let Some(token) = cached.as_ref() {
            if token.still_valid(Utc::now()) {
                return Ok(token.access_token.clone());
            }
        }

        debug!("refreshing gigachat access token");
        let response = client
            .post(OAUTH_URL)
            .header("Authorization", format!("Basic {}", self.basic))
            .header("RqUID", Uuid::new_v4().to_string())
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(format!("scope={SCOPE}"))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if status != StatusCode::OK {
            return Err(Error::OAuth(format!("token endpoint status {status}: {body}")));
        }

        let reply: OauthReply =
            serde_json::from_str(&body).map_err(|e| Error::OAuth(e.to_string()))?;
        let expires_at = DateTime::from_timestamp_millis(reply.expires_at)
            .ok_or_else(|| Error::OAuth(format!("bad expires_at: {}", reply.expires_at)))?;

        let token = CachedToken {
            access_token: reply.access_token,
            expires_at,
        };
        let access = token.access_token.clone();
        *cached = Some(token);
        Ok(access)
    }
}
