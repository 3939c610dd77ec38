// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration file support for semdex
//!
//! Loads configuration from .semdexrc.toml in current directory or ~/.config/semdex/config.toml

use serde::Deserialize;
use std::path::Path;

use crate::corpus::{CorpusOptions, DEFAULT_MIN_DOCUMENTS, DEFAULT_SNIPPET_CHARS};
use crate::embedding::DEFAULT_MODEL_ID;
use crate::index::builder::DEFAULT_BATCH_SIZE;

/// Default number of results per query
pub const DEFAULT_TOP_K: usize = 5;

/// Output format for results (mirrored from cli for library use)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigOutputFormat {
    #[default]
    Text,
    Json,
}

/// Embedding provider type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProviderType {
    /// In-process fastembed model
    #[default]
    Builtin,
    /// External command speaking JSON over stdin/stdout
    Command,
    /// Deterministic feature hashing, no model download
    Hashing,
}

/// Indexing configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Number of documents per embedding call
    pub batch_size: Option<usize>,
    /// Corpus size below which a warning is logged
    pub min_documents: Option<usize>,
    /// Maximum snippet length in characters
    pub snippet_chars: Option<usize>,
    /// File extensions treated as documents
    pub extensions: Option<Vec<String>>,
}

impl IndexConfig {
    /// Get batch size (defaults to 64)
    pub fn batch_size(&self) -> usize {
        self.batch_size.unwrap_or(DEFAULT_BATCH_SIZE)
    }

    /// Get minimum document threshold (defaults to 100)
    pub fn min_documents(&self) -> usize {
        self.min_documents.unwrap_or(DEFAULT_MIN_DOCUMENTS)
    }

    /// Get snippet budget (defaults to 200)
    pub fn snippet_chars(&self) -> usize {
        self.snippet_chars.unwrap_or(DEFAULT_SNIPPET_CHARS)
    }

    /// Build corpus loader options from this section
    pub fn corpus_options(&self) -> CorpusOptions {
        let mut options = CorpusOptions {
            min_documents: self.min_documents(),
            snippet_chars: self.snippet_chars(),
            ..CorpusOptions::default()
        };
        if let Some(extensions) = &self.extensions {
            options.extensions = extensions.clone();
        }
        options
    }
}

/// Embedding configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Provider type (builtin, command, hashing)
    pub provider: Option<EmbeddingProviderType>,
    /// Model identifier used when building a new index
    pub model: Option<String>,
    /// Command to execute for command provider
    pub command: Option<String>,
    /// Maximum characters of a document fed to the model
    pub max_chars: Option<usize>,
}

impl EmbeddingConfig {
    /// Get provider type (defaults to Builtin)
    pub fn provider(&self) -> EmbeddingProviderType {
        self.provider.unwrap_or_default()
    }

    /// Get model identifier (defaults to sentence-transformers/all-MiniLM-L6-v2)
    pub fn model(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL_ID)
    }

    /// Get command (defaults to "embedder")
    pub fn command(&self) -> &str {
        self.command.as_deref().unwrap_or("embedder")
    }

    /// Get max chars (defaults to 2000)
    pub fn max_chars(&self) -> usize {
        self.max_chars.unwrap_or(2000)
    }
}

/// Search configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Number of results per query
    pub top_k: Option<usize>,
}

impl SearchConfig {
    /// Get top k (defaults to 5)
    pub fn top_k(&self) -> usize {
        self.top_k.unwrap_or(DEFAULT_TOP_K)
    }
}

/// Configuration loaded from .semdexrc.toml or ~/.config/semdex/config.toml
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default output format (text or json)
    pub default_format: Option<String>,

    /// Index configuration
    #[serde(default)]
    pub index: IndexConfig,

    /// Embedding configuration
    #[serde(default)]
    pub embeddings: EmbeddingConfig,

    /// Search configuration
    #[serde(default)]
    pub search: SearchConfig,
}

impl Config {
    /// Load configuration from files
    ///
    /// Precedence (highest to lowest):
    /// 1. .semdexrc.toml in current directory
    /// 2. ~/.config/semdex/config.toml
    pub fn load() -> Self {
        if let Some(config) = Self::load_from_path(Path::new(".semdexrc.toml")) {
            return config;
        }

        if let Some(home) = dirs::home_dir() {
            let config_path = home.join(".config").join("semdex").join("config.toml");
            if let Some(config) = Self::load_from_path(&config_path) {
                return config;
            }
        }

        Self::default()
    }

    fn load_from_path(path: &Path) -> Option<Self> {
        let content = std::fs::read_to_string(path).ok()?;
        match Self::from_toml_str(&content) {
            Ok(config) => {
                tracing::debug!("Loaded config from {}", path.display());
                Some(config)
            }
            Err(e) => {
                tracing::warn!("Failed to parse {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Get output format from config, parsing the string to ConfigOutputFormat
    pub fn output_format(&self) -> Option<ConfigOutputFormat> {
        self.default_format
            .as_ref()
            .and_then(|s| match s.to_lowercase().as_str() {
                "json" => Some(ConfigOutputFormat::Json),
                "text" => Some(ConfigOutputFormat::Text),
                _ => None,
            })
    }

    /// Merge CLI top_k with config (CLI wins)
    pub fn merge_top_k(&self, cli_value: Option<usize>) -> usize {
        cli_value.unwrap_or_else(|| self.search.top_k())
    }

    /// Get the index configuration
    pub fn index(&self) -> &IndexConfig {
        &self.index
    }

    /// Get the embedding configuration
    pub fn embeddings(&self) -> &EmbeddingConfig {
        &self.embeddings
    }

    /// Get the search configuration
    pub fn search(&self) -> &SearchConfig {
        &self.search
    }
}
