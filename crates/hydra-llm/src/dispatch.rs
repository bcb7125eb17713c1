//! Dispatcher - per-request orchestration for text completions.
//!
//! Flow: parse the buffered body, resolve the model selector, pick an
//! eligible model, charge it, call the upstream through its adapter (and
//! gate, where required), decode, post-process, emit. Failed attempts
//! penalize the model and move on to the next candidate.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::{info, warn};

use crate::catalog::{Catalog, Model, SizeClass};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::gate::Gate;
use crate::limits::RateLimitStore;
use crate::providers::gigachat::TokenManager;
use crate::providers::{openai, Adapter};
use crate::schema::ChatRequest;
use crate::selector;

/// Maximum dispatch attempts for one auto-routed request.
pub const MAX_ATTEMPTS: usize = 5;

/// Per-call upstream timeout.
const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(60);

/// Marker in a model name that enables reasoning-tag stripping.
const REASONING_MARKER: &str = "DeepSeek-R1";

const THINK_CLOSE: &str = "</think>";

/// Selectors shorter than this are size classes; longer values are
/// concrete model names.
const SIZE_SELECTOR_MAX_LEN: usize = 10;

/// The request-routing core: owns the catalog, the rate-limit store, the
/// shared HTTP client, and the per-provider gates. Handlers borrow it
/// behind an `Arc`.
pub struct Dispatcher {
    pub(crate) catalog: Catalog,
    pub(crate) limits: RateLimitStore,
    pub(crate) client: reqwest::Client,
    cloudflare_gate: Gate,
    gigachat_gate: Gate,
    gigachat_auth: HashMap<String, TokenManager>,
}

impl Dispatcher {
    /// Build a dispatcher from a loaded configuration.
    pub fn new(config: Config) -> Result<Self> {
        let catalog = Catalog::new(config.models)?;
        let limits = RateLimitStore::new(&catalog, Instant::now());

        let client = reqwest::Client::builder()
            .timeout(UPSTREAM_TIMEOUT)
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {e}")))?;

        let mut gigachat_auth = HashMap::new();
        for model in catalog.iter() {
            if Adapter::from_provider(&model.provider) != Adapter::GigaChat {
                continue;
            }
            // An unresolved credential keeps the model configured but
            // failing fast at dispatch, same as any other bad token.
            if model.token.is_empty() {
                warn!(model = %model.name, "gigachat credential missing");
                continue;
            }
            gigachat_auth.insert(
                model.name.clone(),
                TokenManager::from_credential(&model.token)?,
            );
        }

        Ok(Self {
            catalog,
            limits,
            client,
            cloudflare_gate: Gate::new(Adapter::Cloudflare.gap()),
            gigachat_gate: Gate::new(Adapter::GigaChat.gap()),
            gigachat_auth,
        })
    }

    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    #[must_use]
    pub fn limits(&self) -> &RateLimitStore {
        &self.limits
    }

    /// Handle a chat-completion body and return the canonical response.
    pub async fn chat(&self, body: &[u8]) -> Result<Value> {
        let raw: Value =
            serde_json::from_slice(body).map_err(|e| Error::InvalidRequest(e.to_string()))?;
        let request: ChatRequest =
            serde_json::from_value(raw.clone()).map_err(|e| Error::InvalidRequest(e.to_string()))?;

        if let Some(first) = request.messages.first() {
            info!(preview = preview(&first.content), "chat request");
        }

        let wants_tool_calls = raw.get("tools").is_some_and(|t| !t.is_null());

        if !is_size_selector(&request.model) {
            // Pinned model: one attempt, no retries.
            let model = self
                .catalog
                .get(&request.model)
                .ok_or_else(|| Error::UnknownModel(request.model.clone()))?;
            return self.attempt(model, &raw, wants_tool_calls).await;
        }

        let size_class = SizeClass::from_selector(&request.model);
        let mut last_error = Error::NoEligibleModel;

        for _ in 0..MAX_ATTEMPTS {
            let Some(model) = selector::select(
                &self.catalog,
                &self.limits,
                size_class,
                body.len(),
                Instant::now(),
            )
            .await
            else {
                return Err(Error::NoEligibleModel);
            };

            match self.attempt(model, &raw, wants_tool_calls).await {
                Ok(response) => return Ok(response),
                Err(error) => {
                    warn!(model = %model.name, %error, "dispatch attempt failed");
                    self.limits.penalize(model, Instant::now()).await;
                    last_error = error;
                }
            }
        }

        Err(last_error)
    }

    /// One full call to one model. Charges before the network call so that
    /// failed calls still count against the quota.
    async fn attempt(&self, model: &Model, body: &Value, wants_tool_calls: bool) -> Result<Value> {
        self.limits.charge(model, Instant::now()).await;

        let adapter = Adapter::from_provider(&model.provider);
        let outbound = adapter.encode(model, body);
        info!(model = %model.name, "dispatching to upstream");

        let raw = match adapter {
            Adapter::Cloudflare => {
                self.cloudflare_gate
                    .run(openai::call(&self.client, &model.url, &model.token, &outbound))
                    .await?
            }
            Adapter::GigaChat => {
                let manager = self
                    .gigachat_auth
                    .get(&model.name)
                    .ok_or_else(|| Error::OAuth(format!("no credential for {}", model.name)))?;
                let token = manager.token(&self.client).await?;
                self.gigachat_gate
                    .run(openai::call(&self.client, &model.url, &token, &outbound))
                    .await?
            }
            _ => openai::call(&self.client, &model.url, &model.token, &outbound).await?,
        };

        let mut response = adapter.decode(&raw, model, wants_tool_calls)?;
        if !has_content(&response) {
            return Err(Error::NoContent);
        }
        if model.name.contains(REASONING_MARKER) {
            strip_reasoning(&mut response);
        }
        Ok(response)
    }
}

/// Whether a `model` value selects a size class rather than a concrete
/// model. The threshold deliberately misclassifies concrete names shorter
/// than 10 characters; real catalog names carry a `provider/` prefix and
/// clear it comfortably.
#[must_use]
pub fn is_size_selector(model: &str) -> bool {
    model.len() < SIZE_SELECTOR_MAX_LEN
}

/// A reply counts as having content when `choices[0].message.content` is a
/// non-empty string, or is null with a tool/function call standing in for
/// the text.
fn has_content(response: &Value) -> bool {
    let message = &response["choices"][0]["message"];
    match &message["content"] {
        Value::String(text) => !text.is_empty(),
        Value::Null => {
            message.get("tool_calls").is_some_and(|t| !t.is_null())
                || message.get("function_call").is_some_and(|f| !f.is_null())
        }
        _ => false,
    }
}

/// Drop everything up to and including the first `</think>` tag from the
/// first choice's content.
fn strip_reasoning(response: &mut Value) {
    let Some(content) = response.pointer_mut("/choices/0/message/content") else {
        return;
    };
    if let Value::String(text) = content {
        if let Some(position) = text.find(THINK_CLOSE) {
            *text = text[position + THINK_CLOSE.len()..].to_string();
        }
    }
}

/// Trim a log preview to 100 characters.
pub(crate) fn preview(text: &str) -> &str {
    match text.char_indices().nth(100) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}
