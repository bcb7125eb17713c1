//! Model catalog - the immutable registry of configured upstream models.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{Error, Result};

/// Coarse capability tier used when the client does not pin a concrete
/// model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SizeClass {
    /// Small, fast models; the default tier
    #[default]
    Small,
    /// Large, high-capacity models
    Big,
}

impl SizeClass {
    /// Map a short model selector to a size class. `"BIG"` selects [`Self::Big`];
    /// every other value, including the empty string, selects [`Self::Small`].
    #[must_use]
    pub fn from_selector(selector: &str) -> Self {
        if selector == "BIG" {
            Self::Big
        } else {
            Self::Small
        }
    }
}

/// A configured upstream model. Immutable after load.
#[derive(Debug, Clone, Deserialize)]
pub struct Model {
    /// Globally unique name, conventionally `provider/family/variant`
    pub name: String,
    /// Vendor/dialect family; selects the adapter
    pub provider: String,
    /// Lower is preferred
    #[serde(default)]
    pub priority: i32,
    pub requests_per_minute: u32,
    pub requests_per_hour: u32,
    pub requests_per_day: u32,
    /// Upstream endpoint
    pub url: String,
    /// Credential; `${VAR}` references are resolved at config load
    #[serde(default)]
    pub token: String,
    /// Maximum raw request body size in bytes; 0 marks an image model
    #[serde(default)]
    pub max_request_length: usize,
    #[serde(default)]
    pub size_class: SizeClass,
}

impl Model {
    /// Whether this model serves the image-generation path.
    #[must_use]
    pub fn is_image(&self) -> bool {
        self.max_request_length == 0
    }

    /// The model name with the leading `provider/` prefix removed, which is
    /// what most upstreams expect in the `model` field.
    #[must_use]
    pub fn upstream_name(&self) -> &str {
        let prefix_len = self.provider.len() + 1;
        if self.name.len() > prefix_len
            && self.name.as_bytes()[self.provider.len()] == b'/'
            && self.name[..self.provider.len()].eq_ignore_ascii_case(&self.provider)
        {
            &self.name[prefix_len..]
        } else {
            &self.name
        }
    }
}

/// Read-only keyed collection of models, loaded once at startup.
///
/// Iteration follows configuration order, which keeps selection
/// deterministic for a given config.
#[derive(Debug)]
pub struct Catalog {
    models: Vec<Model>,
    index: HashMap<String, usize>,
}

impl Catalog {
    /// Build a catalog, rejecting duplicate model names.
    pub fn new(models: Vec<Model>) -> Result<Self> {
        let mut index = HashMap::with_capacity(models.len());
        for (i, model) in models.iter().enumerate() {
            if index.insert(model.name.clone(), i).is_some() {
                return Err(Error::Config(format!("duplicate model name: {}", model.name)));
            }
        }
        Ok(Self { models, index })
    }

    /// Look up a model by exact name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Model> {
        self.index.get(name).map(|&i| &self.models[i])
    }

    /// Iterate models in configuration order.
    pub fn iter(&self) -> impl Iterator<Item = &Model> {
        self.models.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.models.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}
