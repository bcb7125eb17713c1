//! OpenAI-compatible dialect client.
//!
//! The pass-through call shared by every provider that speaks the standard
//! chat-completion wire format, and by the gated providers whose bodies are
//! already OpenAI-shaped. One POST, bearer auth, whole-body buffering.

use reqwest::{Client, StatusCode};
use serde_json::Value;

use crate::error::{Error, Result};

/// POST a JSON body to an upstream and return the raw reply bytes.
///
/// Any status other than 200 is an error carrying the reply body, which the
/// dispatcher logs before moving to the next model.
pub async fn call(client: &Client, url: &str, token: &str, body: &Value) -> Result<Vec<u8>> {
    let response = client.post(url).bearer_auth(token).json(body).send().await?;

    let status = response.status();
    let bytes = response.bytes().await?;

    if status != StatusCode::OK {
        return Err(Error::UpstreamStatus {
            status: status.as_u16(),
            body: String::from_utf8_lossy(&bytes).into_owned(),
        });
    }

    Ok(bytes.to_vec())
}
