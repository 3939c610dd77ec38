// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query engine: cosine-similarity search over a loaded index.
//!
//! Queries are always embedded with the model recorded in the index, never a
//! caller-chosen one, so query vectors and document vectors share one space.
//! Indexed vectors are unit length, so cosine similarity is the dot product.

use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use super::rank;
use crate::embedding::{l2_normalize, EmbeddingProvider, ProviderResolver};
use crate::errors::{Error, Result};
use crate::index::{store, EmbeddingMatrix, IndexMetadata, LoadedIndex};

/// One ranked document
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct SearchHit {
    pub doc_id: String,
    /// Cosine similarity in [-1, 1]
    pub score: f32,
    pub snippet: String,
}

/// Results of a batch search, keyed by query in first-seen order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchResults {
    entries: Vec<(String, Vec<SearchHit>)>,
}

impl BatchResults {
    /// Hits for `query`, if it was part of the batch.
    pub fn get(&self, query: &str) -> Option<&[SearchHit]> {
        self.entries
            .iter()
            .find(|(q, _)| q == query)
            .map(|(_, hits)| hits.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[SearchHit])> {
        self.entries
            .iter()
            .map(|(q, hits)| (q.as_str(), hits.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for BatchResults {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (query, hits) in &self.entries {
            map.serialize_entry(query, hits)?;
        }
        map.end()
    }
}

/// An index loaded into memory for querying. Immutable once opened.
#[derive(Debug, Clone)]
pub struct SearchIndex {
    location: PathBuf,
    index: LoadedIndex,
}

impl SearchIndex {
    /// Load the index at `location`.
    pub fn open(location: &Path) -> Result<Self> {
        let index = store::load(location)?;
        tracing::debug!(
            "Loaded index {} ({} documents, dim {}, model {})",
            location.display(),
            index.matrix.rows(),
            index.matrix.dim(),
            index.model_id
        );
        Self::from_loaded(location, index)
    }

    /// Wrap an index already in memory, checking its invariants.
    pub fn from_loaded(location: &Path, index: LoadedIndex) -> Result<Self> {
        index.metadata.validate(index.matrix.rows(), location)?;
        Ok(Self {
            location: location.to_path_buf(),
            index,
        })
    }

    pub fn location(&self) -> &Path {
        &self.location
    }

    /// Model identifier the index was built with
    pub fn model_id(&self) -> &str {
        &self.index.model_id
    }

    pub fn metadata(&self) -> &IndexMetadata {
        &self.index.metadata
    }

    pub fn matrix(&self) -> &EmbeddingMatrix {
        &self.index.matrix
    }

    /// Number of indexed documents
    pub fn len(&self) -> usize {
        self.index.matrix.rows()
    }

    pub fn is_empty(&self) -> bool {
        self.index.matrix.is_empty()
    }

    /// Embedding dimension
    pub fn dim(&self) -> usize {
        self.index.matrix.dim()
    }

    /// Rank every document against an already embedded query. The query is
    /// scaled to unit length first.
    pub fn search_vector(&self, query: &[f32], top_k: usize) -> Result<Vec<SearchHit>> {
        if top_k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }
        let mut query = query.to_vec();
        l2_normalize(&mut query);
        let scores = self.index.matrix.dot_all(&query)?;
        Ok(rank::top_k(&scores, top_k)
            .into_iter()
            .map(|ranked| self.hit(ranked))
            .collect())
    }

    /// [`SearchIndex::search_vector`] for several queries.
    pub fn search_vectors(&self, queries: &[Vec<f32>], top_k: usize) -> Result<Vec<Vec<SearchHit>>> {
        queries
            .iter()
            .map(|query| self.search_vector(query, top_k))
            .collect()
    }

    /// Embed `query` with the index's model and rank documents.
    pub fn search(
        &self,
        query: &str,
        top_k: usize,
        resolver: &dyn ProviderResolver,
    ) -> Result<Vec<SearchHit>> {
        if top_k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }
        let mut provider = self.provider(resolver)?;
        let vector = provider.embed_one(query).map_err(Error::Provider)?;
        self.search_vector(&vector, top_k)
    }

    /// Embed all queries in a single provider call and rank documents for each.
    ///
    /// Blank queries are skipped; repeated queries appear once.
    pub fn batch_search(
        &self,
        queries: &[String],
        top_k: usize,
        resolver: &dyn ProviderResolver,
    ) -> Result<BatchResults> {
        let mut seen = HashSet::new();
        let unique: Vec<String> = queries
            .iter()
            .filter(|q| !q.trim().is_empty())
            .filter(|q| seen.insert(q.as_str()))
            .cloned()
            .collect();
        if unique.is_empty() {
            return Ok(BatchResults::default());
        }

        if top_k == 0 || self.is_empty() {
            return Ok(BatchResults {
                entries: unique.into_iter().map(|q| (q, Vec::new())).collect(),
            });
        }

        let mut provider = self.provider(resolver)?;
        let vectors = provider.embed_texts(&unique).map_err(Error::Provider)?;
        if vectors.len() != unique.len() {
            return Err(Error::Provider(anyhow::anyhow!(
                "provider {} returned {} embeddings for {} queries",
                provider.model_id(),
                vectors.len(),
                unique.len()
            )));
        }

        let hits = self.search_vectors(&vectors, top_k)?;
        Ok(BatchResults {
            entries: unique.into_iter().zip(hits).collect(),
        })
    }

    fn provider(&self, resolver: &dyn ProviderResolver) -> Result<Box<dyn EmbeddingProvider>> {
        resolver.resolve(self.model_id()).map_err(Error::Provider)
    }

    fn hit(&self, ranked: rank::Ranked) -> SearchHit {
        let metadata = &self.index.metadata;
        let doc_id = metadata.doc_ids[ranked.row].clone();
        let snippet = metadata.snippet(&doc_id).to_string();
        SearchHit {
            doc_id,
            score: ranked.score,
            snippet,
        }
    }
}

/// Load the index at `index_dir` and return the `top_k` best documents for `query`.
pub fn search(
    index_dir: &Path,
    query: &str,
    top_k: usize,
    resolver: &dyn ProviderResolver,
) -> Result<Vec<SearchHit>> {
    SearchIndex::open(index_dir)?.search(query, top_k, resolver)
}

/// Load the index at `index_dir` and search every query with one embedding call.
pub fn batch_search(
    index_dir: &Path,
    queries: &[String],
    top_k: usize,
    resolver: &dyn ProviderResolver,
) -> Result<BatchResults> {
    SearchIndex::open(index_dir)?.batch_search(queries, top_k, resolver)
}

/// Read one query per line, trimmed, skipping blank lines.
pub fn read_queries_file(path: &Path) -> Result<Vec<String>> {
    if !path.is_file() {
        return Err(Error::not_found("queries file", path));
    }
    let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    Ok(parse_queries(&content))
}

/// Split text into queries, one per non-blank line.
pub fn parse_queries(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
