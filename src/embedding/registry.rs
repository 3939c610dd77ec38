// SPDX-License-Identifier: MIT OR Apache-2.0

//! Resolution of model identifiers to embedding providers.
//!
//! An index records the model identifier it was built with; query time asks a
//! [`ProviderResolver`] for a provider serving that same identifier so query
//! vectors live in the same space as the indexed vectors.

use anyhow::{bail, Result};

use super::provider::{
    is_hashing_model, CommandProvider, EmbeddingProvider, EmbeddingProviderConfig, FastEmbedder,
    HashingProvider,
};
use crate::config::{EmbeddingConfig, EmbeddingProviderType};

/// Produces an embedding provider for a model identifier.
pub trait ProviderResolver {
    fn resolve(&self, model_id: &str) -> Result<Box<dyn EmbeddingProvider>>;
}

impl<F> ProviderResolver for F
where
    F: Fn(&str) -> Result<Box<dyn EmbeddingProvider>>,
{
    fn resolve(&self, model_id: &str) -> Result<Box<dyn EmbeddingProvider>> {
        self(model_id)
    }
}

/// Config-driven resolver.
///
/// `hashing` / `hashing-<dim>` identifiers always resolve to the hashing
/// provider; everything else goes to the configured provider type.
#[derive(Debug, Clone)]
pub struct ProviderRegistry {
    kind: EmbeddingProviderType,
    command: String,
    max_chars: usize,
}

impl ProviderRegistry {
    pub fn from_config(config: &EmbeddingConfig) -> Self {
        Self {
            kind: config.provider(),
            command: config.command().to_string(),
            max_chars: config.max_chars(),
        }
    }

    pub fn kind(&self) -> EmbeddingProviderType {
        self.kind
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::from_config(&EmbeddingConfig::default())
    }
}

impl ProviderResolver for ProviderRegistry {
    fn resolve(&self, model_id: &str) -> Result<Box<dyn EmbeddingProvider>> {
        if is_hashing_model(model_id) {
            tracing::debug!("Using hashing provider for {}", model_id);
            return Ok(Box::new(HashingProvider::from_model_id(model_id)?));
        }

        match self.kind {
            EmbeddingProviderType::Builtin => {
                tracing::debug!("Loading fastembed model {}", model_id);
                let config = EmbeddingProviderConfig::for_model(model_id, self.max_chars)?;
                Ok(Box::new(FastEmbedder::new(model_id, config)?))
            }
            EmbeddingProviderType::Command => {
                tracing::debug!("Using embedding command '{}' for {}", self.command, model_id);
                Ok(Box::new(CommandProvider::new(
                    self.command.clone(),
                    model_id.to_string(),
                )))
            }
            EmbeddingProviderType::Hashing => bail!(
                "Hashing provider requires a 'hashing' or 'hashing-<dim>' model, got '{}'",
                model_id
            ),
        }
    }
}
