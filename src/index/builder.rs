// SPDX-License-Identifier: MIT OR Apache-2.0

//! Index builder: corpus -> batched embeddings -> published bundle

use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use super::matrix::EmbeddingMatrix;
use super::store::{self, IndexMetadata};
use crate::corpus::{self, CorpusOptions};
use crate::embedding::{l2_normalize, EmbeddingProvider, ProviderResolver};
use crate::errors::{Error, Result};

/// Documents per embedding call.
pub const DEFAULT_BATCH_SIZE: usize = 64;

/// Options for building an index
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Documents per provider call, at least 1
    pub batch_size: usize,
    /// Corpus discovery and snippet options
    pub corpus: CorpusOptions,
    /// Draw a progress bar on stderr
    pub show_progress: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            corpus: CorpusOptions::default(),
            show_progress: false,
        }
    }
}

/// Summary of a build run
#[derive(Debug, Clone, PartialEq)]
pub struct BuildReport {
    /// Documents written; zero means nothing was published
    pub documents: usize,
    /// Embedding dimension
    pub dimension: usize,
    pub model_id: String,
    pub index_dir: PathBuf,
    /// Time spent in the embedding provider
    pub embedding_time: Duration,
}

impl BuildReport {
    /// True when the corpus was empty and no index was written.
    pub fn is_empty(&self) -> bool {
        self.documents == 0
    }
}

/// Build an index from a corpus directory
pub struct IndexBuilder {
    options: BuildOptions,
}

impl IndexBuilder {
    pub fn new(options: BuildOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    /// Build an index for `input_dir` at `index_dir`, embedding with the
    /// provider `resolver` returns for `model_id`.
    ///
    /// An empty corpus publishes nothing and returns an empty report; the
    /// provider is not even resolved in that case.
    pub fn build(
        &self,
        input_dir: &Path,
        index_dir: &Path,
        model_id: &str,
        resolver: &dyn ProviderResolver,
    ) -> Result<BuildReport> {
        self.check_options()?;
        let documents = corpus::load_corpus(input_dir, &self.options.corpus)?;
        if documents.is_empty() {
            return Ok(self.empty_report(input_dir, index_dir, model_id));
        }

        let mut provider = resolver.resolve(model_id).map_err(Error::Provider)?;
        self.write_index(input_dir, index_dir, model_id, documents, provider.as_mut())
    }

    /// Same as [`IndexBuilder::build`] with an already constructed provider;
    /// the index records `provider.model_id()`.
    pub fn build_with_provider(
        &self,
        input_dir: &Path,
        index_dir: &Path,
        provider: &mut dyn EmbeddingProvider,
    ) -> Result<BuildReport> {
        self.check_options()?;
        let model_id = provider.model_id().to_string();
        let documents = corpus::load_corpus(input_dir, &self.options.corpus)?;
        if documents.is_empty() {
            return Ok(self.empty_report(input_dir, index_dir, &model_id));
        }
        self.write_index(input_dir, index_dir, &model_id, documents, provider)
    }

    fn check_options(&self) -> Result<()> {
        if self.options.batch_size == 0 {
            return Err(Error::InvalidInput("batch size must be at least 1".into()));
        }
        Ok(())
    }

    fn empty_report(&self, input_dir: &Path, index_dir: &Path, model_id: &str) -> BuildReport {
        tracing::warn!(
            "No document files found in {}; index not written",
            input_dir.display()
        );
        BuildReport {
            documents: 0,
            dimension: 0,
            model_id: model_id.to_string(),
            index_dir: index_dir.to_path_buf(),
            embedding_time: Duration::ZERO,
        }
    }

    fn write_index(
        &self,
        input_dir: &Path,
        index_dir: &Path,
        model_id: &str,
        documents: Vec<corpus::Document>,
        provider: &mut dyn EmbeddingProvider,
    ) -> Result<BuildReport> {
        let base_dir = input_dir
            .canonicalize()
            .map_err(|e| Error::io(input_dir, e))?;

        let mut doc_ids = Vec::with_capacity(documents.len());
        let mut snippets = BTreeMap::new();
        let mut texts = Vec::with_capacity(documents.len());
        for doc in documents {
            doc_ids.push(doc.id.clone());
            snippets.insert(doc.id, doc.snippet);
            texts.push(doc.text);
        }

        tracing::info!(
            "Embedding {} documents with {} (batch size {})",
            texts.len(),
            model_id,
            self.options.batch_size
        );
        let progress = self.progress_bar(texts.len());
        let start = Instant::now();
        let matrix = embed_in_batches(provider, &texts, self.options.batch_size, &progress)?;
        let embedding_time = start.elapsed();
        progress.finish_and_clear();

        let metadata = IndexMetadata {
            doc_ids,
            base_dir: base_dir.to_string_lossy().into_owned(),
            snippets,
        };
        store::publish(index_dir, &matrix, &metadata, model_id)?;

        tracing::info!(
            "Indexed {} documents in {:.2}s",
            matrix.rows(),
            embedding_time.as_secs_f64()
        );

        Ok(BuildReport {
            documents: matrix.rows(),
            dimension: matrix.dim(),
            model_id: model_id.to_string(),
            index_dir: index_dir.to_path_buf(),
            embedding_time,
        })
    }

    fn progress_bar(&self, total_docs: usize) -> ProgressBar {
        if !self.options.show_progress {
            return ProgressBar::hidden();
        }
        let batches = total_docs.div_ceil(self.options.batch_size);
        let pb = ProgressBar::new(batches as u64);
        pb.set_message(format!("Embedding {} documents", total_docs));
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{bar:40.cyan/blue}] {pos}/{len} batches | {msg}")
                .expect("valid progress bar template")
                .progress_chars("##."),
        );
        pb
    }
}

/// Embed `texts` in chunks of `batch_size`, one matrix row per text.
///
/// Every batch must yield exactly one vector per input and every vector must
/// share the dimension of the first. Rows are scaled to unit length.
pub fn embed_in_batches(
    provider: &mut dyn EmbeddingProvider,
    texts: &[String],
    batch_size: usize,
    progress: &ProgressBar,
) -> Result<EmbeddingMatrix> {
    if batch_size == 0 {
        return Err(Error::InvalidInput("batch size must be at least 1".into()));
    }

    let mut matrix: Option<EmbeddingMatrix> = None;
    for (batch_no, batch) in texts.chunks(batch_size).enumerate() {
        tracing::debug!("Embedding batch {} ({} texts)", batch_no, batch.len());
        let vectors = provider.embed_texts(batch).map_err(Error::Provider)?;
        if vectors.len() != batch.len() {
            return Err(Error::Provider(anyhow::anyhow!(
                "provider {} returned {} embeddings for {} texts",
                provider.model_id(),
                vectors.len(),
                batch.len()
            )));
        }

        for mut vector in vectors {
            if vector.is_empty() {
                return Err(Error::Provider(anyhow::anyhow!(
                    "provider {} returned an empty embedding",
                    provider.model_id()
                )));
            }
            let rows = matrix.get_or_insert_with(|| EmbeddingMatrix::with_dim(vector.len()));
            if vector.len() != rows.dim() {
                return Err(Error::Provider(anyhow::anyhow!(
                    "provider {} changed embedding dimension from {} to {} mid-build",
                    provider.model_id(),
                    rows.dim(),
                    vector.len()
                )));
            }
            l2_normalize(&mut vector);
            rows.push_row(&vector)?;
        }
        progress.inc(1);
    }

    Ok(matrix.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashingProvider;
    use std::fs;
    use tempfile::TempDir;

    fn write_corpus(root: &Path, docs: &[(&str, &str)]) {
        for (name, text) in docs {
            let path = root.join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, text).unwrap();
        }
    }

    fn options(batch_size: usize) -> BuildOptions {
        BuildOptions {
            batch_size,
            corpus: CorpusOptions {
                min_documents: 0,
                ..CorpusOptions::default()
            },
            show_progress: false,
        }
    }

    struct FixedProvider {
        vectors: Vec<Vec<f32>>,
    }

    impl EmbeddingProvider for FixedProvider {
        fn model_id(&self) -> &str {
            "fixed"
        }

        fn embed_texts(&mut self, _texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
            Ok(self.vectors.clone())
        }
    }

    #[test]
    fn builds_and_publishes_index() {
        let corpus_dir = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        write_corpus(
            corpus_dir.path(),
            &[("b.txt", "second   doc"), ("a.txt", "first doc"), ("c/d.txt", "third")],
        );
        let index_dir = out.path().join("index");

        let mut provider = HashingProvider::new(32);
        let report = IndexBuilder::new(options(2))
            .build_with_provider(corpus_dir.path(), &index_dir, &mut provider)
            .unwrap();
        assert_eq!(report.documents, 3);
        assert_eq!(report.dimension, 32);
        assert_eq!(report.model_id, "hashing-32");

        let loaded = store::load(&index_dir).unwrap();
        assert_eq!(loaded.model_id, "hashing-32");
        assert_eq!(loaded.matrix.rows(), 3);
        assert_eq!(loaded.metadata.doc_ids[0], "a.txt");
        assert_eq!(loaded.metadata.doc_ids[1], "b.txt");
        assert_eq!(loaded.metadata.snippet("b.txt"), "second doc");
        assert_eq!(
            loaded.metadata.base_dir,
            corpus_dir.path().canonicalize().unwrap().to_string_lossy()
        );
    }

    #[test]
    fn batch_size_does_not_change_embeddings() {
        let corpus_dir = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let docs: Vec<(String, String)> = (0..7)
            .map(|i| (format!("doc{}.txt", i), format!("document number {} text", i)))
            .collect();
        let refs: Vec<(&str, &str)> = docs.iter().map(|(a, b)| (a.as_str(), b.as_str())).collect();
        write_corpus(corpus_dir.path(), &refs);

        let resolver = |model_id: &str| -> anyhow::Result<Box<dyn EmbeddingProvider>> {
            Ok(Box::new(HashingProvider::from_model_id(model_id)?))
        };
        let one = out.path().join("one");
        let many = out.path().join("many");
        IndexBuilder::new(options(1))
            .build(corpus_dir.path(), &one, "hashing-16", &resolver)
            .unwrap();
        IndexBuilder::new(options(64))
            .build(corpus_dir.path(), &many, "hashing-16", &resolver)
            .unwrap();

        let a = store::load(&one).unwrap();
        let b = store::load(&many).unwrap();
        assert_eq!(a.metadata.doc_ids, b.metadata.doc_ids);
        assert_eq!(a.matrix, b.matrix);
    }

    #[test]
    fn empty_corpus_writes_nothing() {
        let corpus_dir = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let index_dir = out.path().join("index");

        let resolver = |_: &str| -> anyhow::Result<Box<dyn EmbeddingProvider>> {
            anyhow::bail!("provider must not be resolved for an empty corpus")
        };
        let report = IndexBuilder::new(options(4))
            .build(corpus_dir.path(), &index_dir, "hashing-8", &resolver)
            .unwrap();
        assert!(report.is_empty());
        assert!(!index_dir.exists());
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let corpus_dir = TempDir::new().unwrap();
        let mut provider = HashingProvider::new(8);
        let err = IndexBuilder::new(options(0))
            .build_with_provider(corpus_dir.path(), corpus_dir.path(), &mut provider)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn missing_corpus_is_not_found() {
        let out = TempDir::new().unwrap();
        let mut provider = HashingProvider::new(8);
        let err = IndexBuilder::new(options(4))
            .build_with_provider(&out.path().join("nope"), &out.path().join("index"), &mut provider)
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn provider_count_mismatch_is_an_error() {
        let mut provider = FixedProvider {
            vectors: vec![vec![1.0, 0.0]],
        };
        let texts = vec!["a".to_string(), "b".to_string()];
        let err = embed_in_batches(&mut provider, &texts, 8, &ProgressBar::hidden()).unwrap_err();
        assert!(matches!(err, Error::Provider(_)));
    }

    #[test]
    fn provider_dimension_change_is_an_error() {
        struct Growing(usize);
        impl EmbeddingProvider for Growing {
            fn model_id(&self) -> &str {
                "growing"
            }
            fn embed_texts(&mut self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
                self.0 += 1;
                Ok(texts.iter().map(|_| vec![0.5; self.0]).collect())
            }
        }

        let texts = vec!["a".to_string(), "b".to_string()];
        let err = embed_in_batches(&mut Growing(1), &texts, 1, &ProgressBar::hidden()).unwrap_err();
        assert!(matches!(err, Error::Provider(_)));
        assert!(err.to_string().contains("changed embedding dimension from 2 to 3"));
    }

    #[test]
    fn progress_bar_names_document_count() {
        let builder = IndexBuilder::new(BuildOptions {
            show_progress: true,
            ..options(2)
        });
        let pb = builder.progress_bar(5);
        assert_eq!(pb.length(), Some(3));
        assert_eq!(pb.message(), "Embedding 5 documents");
    }

    #[test]
    fn rows_are_scaled_to_unit_length() {
        let mut provider = FixedProvider {
            vectors: vec![vec![3.0, 4.0], vec![0.0, -2.0]],
        };
        let texts = vec!["a".to_string(), "b".to_string()];
        let matrix = embed_in_batches(&mut provider, &texts, 8, &ProgressBar::hidden()).unwrap();
        assert_eq!(matrix.row(0), Some(&[0.6f32, 0.8][..]));
        assert_eq!(matrix.row(1), Some(&[0.0f32, -1.0][..]));
    }

    #[test]
    fn provider_failure_propagates() {
        let corpus_dir = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        write_corpus(corpus_dir.path(), &[("a.txt", "alpha")]);
        let resolver = |_: &str| -> anyhow::Result<Box<dyn EmbeddingProvider>> {
            anyhow::bail!("model unavailable")
        };
        let err = IndexBuilder::new(options(4))
            .build(corpus_dir.path(), &out.path().join("index"), "m", &resolver)
            .unwrap_err();
        assert!(matches!(err, Error::Provider(_)));
        assert!(!out.path().join("index").exists());
    }
}
