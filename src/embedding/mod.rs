// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedding module - turns text into unit-length vectors
//!
//! The engine treats the model as an opaque capability: a provider maps a
//! batch of texts to a batch of vectors, and a resolver picks the provider
//! serving a given model identifier.

pub mod provider;
pub mod registry;

pub use provider::{
    is_hashing_model, l2_normalize, CommandProvider, EmbeddingProvider, EmbeddingProviderConfig,
    FastEmbedder, HashingProvider, DEFAULT_MODEL_ID,
};
pub use registry::{ProviderRegistry, ProviderResolver};
