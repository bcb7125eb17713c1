//! Configuration loading.
//!
//! The model list lives in a YAML document. Credentials are referenced as
//! `${VAR}` and resolved from the environment at load time; a missing
//! variable resolves to an empty token with a warning, so a partially
//! configured deployment still starts.

use serde::Deserialize;
use tracing::warn;

use crate::catalog::Model;
use crate::error::{Error, Result};

/// Top-level configuration document.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Static bearer token for the inbound auth gate; absent disables it
    #[serde(default)]
    pub auth_token: Option<String>,
    #[serde(default)]
    pub models: Vec<Model>,
}

/// Parse a YAML config document and resolve `${VAR}` credential references.
pub fn from_yaml(raw: &str) -> Result<Config> {
    let mut config: Config =
        serde_yaml::from_str(raw).map_err(|e| Error::Config(e.to_string()))?;

    for model in &mut config.models {
        model.token = resolve_env(&model.token, &model.name);
    }
    if let Some(token) = config.auth_token.take() {
        config.auth_token = Some(resolve_env(&token, "auth_token"));
    }

    Ok(config)
}

/// Expand a `${VAR}` reference from the environment. Anything else is
/// returned literally.
fn resolve_env(raw: &str, owner: &str) -> String {
    let Some(name) = raw.strip_prefix("${").and_then(|s| s.strip_suffix('}')) else {
        return raw.to_string();
    };
    match std::env::var(name) {
        Ok(value) => value,
        Err(_) => {
            warn!(variable = name, owner, "credential variable not set");
            String::new()
        }
    }
}
