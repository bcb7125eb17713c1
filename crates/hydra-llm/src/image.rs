//! Image Dispatcher - the parallel path for image generation.
//!
//! Image-capable models are the catalog entries with
//! `max_request_length == 0`. A request without a pinned model (or pinned
//! to `"all"`) walks them in configuration order, skipping ineligible
//! entries and penalizing failures, until one returns plausible image
//! bytes.

use std::time::Instant;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::StatusCode;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::catalog::Model;
use crate::dispatch::{preview, Dispatcher};
use crate::error::{Error, Result};
use crate::providers::openai;
use crate::schema::ImageRequest;

/// Anything shorter than this is not an image, whatever the status said.
const MIN_IMAGE_BYTES: usize = 500;

impl Dispatcher {
    /// Handle an image-generation body and return raw image bytes.
    pub async fn image(&self, body: &[u8]) -> Result<Vec<u8>> {
        let request: ImageRequest =
            serde_json::from_slice(body).map_err(|e| Error::InvalidRequest(e.to_string()))?;

        let prompt = request.prompt_text();
        if prompt.is_empty() {
            return Err(Error::InvalidRequest("empty prompt".to_string()));
        }

        if !request.model.is_empty() && request.model != "all" {
            let model = self
                .catalog
                .get(&request.model)
                .ok_or_else(|| Error::UnknownModel(request.model.clone()))?;
            return self.image_attempt(model, prompt).await;
        }

        let mut last_error = Error::NoEligibleModel;
        for model in self.catalog.iter() {
            if !model.is_image() {
                continue;
            }
            if !self.limits.eligible(model, Instant::now()).await {
                continue;
            }
            match self.image_attempt(model, prompt).await {
                Ok(bytes) => return Ok(bytes),
                Err(error) => {
                    warn!(model = %model.name, %error, "image attempt failed");
                    self.limits.penalize(model, Instant::now()).await;
                    last_error = error;
                }
            }
        }

        Err(last_error)
    }

    async fn image_attempt(&self, model: &Model, prompt: &str) -> Result<Vec<u8>> {
        self.limits.charge(model, Instant::now()).await;
        info!(model = %model.name, preview = preview(prompt), "image request");

        let bytes = if model.provider.eq_ignore_ascii_case("airforce") {
            // Query-string GET dialect.
            let response = self
                .client
                .get(&model.url)
                .query(&[("prompt", prompt), ("model", model.upstream_name())])
                .send()
                .await?;
            let status = response.status();
            let bytes = response.bytes().await?;
            if status != StatusCode::OK {
                return Err(Error::UpstreamStatus {
                    status: status.as_u16(),
                    body: String::from_utf8_lossy(&bytes).into_owned(),
                });
            }
            bytes.to_vec()
        } else {
            let payload = image_payload(model, prompt);
            openai::call(&self.client, &model.url, &model.token, &payload).await?
        };

        decode_image(model, bytes)
    }
}

/// Build the provider-specific request body.
fn image_payload(model: &Model, prompt: &str) -> Value {
    let provider = model.provider.to_ascii_lowercase();
    match provider.as_str() {
        "huggingface" => json!({ "inputs": prompt }),
        "together" | "aimlapi" => json!({
            "model": model.upstream_name(),
            "prompt": prompt,
            "response_format": "b64_json",
        }),
        _ => json!({ "prompt": prompt }),
    }
}

/// Turn an upstream reply into raw image bytes.
fn decode_image(model: &Model, body: Vec<u8>) -> Result<Vec<u8>> {
    if body.len() < MIN_IMAGE_BYTES {
        return Err(Error::SmallBody(body.len()));
    }

    let provider = model.provider.to_ascii_lowercase();
    match provider.as_str() {
        "cloudflare" => b64_field(&body, "/result/image"),
        "together" | "aimlapi" => b64_field(&body, "/data/0/b64_json"),
        _ => Ok(body),
    }
}

fn b64_field(body: &[u8], pointer: &str) -> Result<Vec<u8>> {
    let value: Value =
        serde_json::from_slice(body).map_err(|e| Error::InvalidResponse(e.to_string()))?;
    let encoded = value
        .pointer(pointer)
        .and_then(Value::as_str)
        .ok_or_else(|| Error::InvalidResponse(format!("missing field {pointer}")))?;
    BASE64
        .decode(encoded)
        .map_err(|e| Error::InvalidResponse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::tests::model;

    fn image_model(name: &str, provider: &str) -> Model {
        let mut m = model(name, provider);
        m.max_request_length = 0;
        m
    }

    #[test]
    fn test_huggingface_payload() {
        let m = image_model("huggingface/black-forest-labs/FLUX.1-dev", "huggingface");
        assert_eq!(image_payload(&m, "a cat"), json!({"inputs": "a cat"}));
    }

    #[test]
    fn test_together_payload() {
        let m = image_model("together/black-forest-labs/FLUX.1-schnell-Free", "together");
        assert_eq!(
            image_payload(&m, "a cat"),
            json!({
                "model": "black-forest-labs/FLUX.1-schnell-Free",
                "prompt": "a cat",
                "response_format": "b64_json",
            })
        );
    }

    #[test]
    fn test_default_payload_is_prompt_only() {
        let m = image_model("cloudflare/black-forest-labs/flux-1-schnell", "cloudflare");
        assert_eq!(image_payload(&m, "a cat"), json!({"prompt": "a cat"}));
    }

    #[test]
    fn test_decode_small_body_is_error() {
        let m = image_model("huggingface/x", "huggingface");
        let err = decode_image(&m, vec![0u8; 499]).unwrap_err();
        assert!(matches!(err, Error::SmallBody(499)));
    }

    #[test]
    fn test_decode_raw_body_passes_through() {
        let m = image_model("huggingface/x", "huggingface");
        let body = vec![0xffu8; 600];
        assert_eq!(decode_image(&m, body.clone()).unwrap(), body);
    }

    #[test]
    fn test_decode_together_b64() {
        let m = image_model("together/black-forest-labs/FLUX.1-schnell-Free", "together");
        let pixels = vec![0xabu8; 450];
        let body = serde_json::to_vec(&json!({
            "data": [{"b64_json": BASE64.encode(&pixels)}]
        }))
        .unwrap();
        assert!(body.len() >= MIN_IMAGE_BYTES);
        assert_eq!(decode_image(&m, body).unwrap(), pixels);
    }

    #[test]
    fn test_decode_cloudflare_b64() {
        let m = image_model("cloudflare/black-forest-labs/flux-1-schnell", "cloudflare");
        let pixels = vec![0x11u8; 450];
        let body = serde_json::to_vec(&json!({
            "result": {"image": BASE64.encode(&pixels)}
        }))
        .unwrap();
        assert_eq!(decode_image(&m, body).unwrap(), pixels);
    }

    #[test]
    fn test_decode_missing_field_is_error() {
        let m = image_model("together/x", "together");
        let body = serde_json::to_vec(&json!({
            "data": [{"unexpected": "x".repeat(600)}]
        }))
        .unwrap();
        assert!(matches!(
            decode_image(&m, body),
            Err(Error::InvalidResponse(_))
        ));
    }
}
