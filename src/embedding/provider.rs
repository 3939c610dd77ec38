// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedding provider interface and implementations.
//!
//! Providers turn a batch of texts into unit-length vectors. The builtin
//! provider runs a sentence-transformer model through fastembed; the command
//! provider shells out to an external embedder; the hashing provider is a
//! deterministic offline embedder used for tests and air-gapped setups.

use anyhow::{bail, Context, Result};
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use serde_json::Value;
use std::borrow::Cow;
use std::env;
use std::io::Write;
use std::process::{Command, Stdio};

/// Model identifier used when none is configured or recorded.
pub const DEFAULT_MODEL_ID: &str = "sentence-transformers/all-MiniLM-L6-v2";

/// Model identifier prefix served by [`HashingProvider`].
pub const HASHING_MODEL_PREFIX: &str = "hashing";

const DEFAULT_FASTEMBED_BATCH_SIZE: usize = 256;
const MAX_FASTEMBED_BATCH_SIZE: usize = 1024;
const DEFAULT_FASTEMBED_MAX_CHARS: usize = 2000;
const DEFAULT_HASHING_DIM: usize = 384;

/// Configuration for the builtin provider.
#[derive(Debug, Clone)]
pub struct EmbeddingProviderConfig {
    pub model: EmbeddingModel,
    pub batch_size: usize,
    pub max_chars: usize,
}

impl EmbeddingProviderConfig {
    /// Config for a model identifier, with `FASTEMBED_*` environment overrides applied.
    pub fn for_model(model_id: &str, max_chars: usize) -> Result<Self> {
        let model = parse_fastembed_model(model_id)?;
        let mut batch_size = parse_usize_env("FASTEMBED_BATCH_SIZE", DEFAULT_FASTEMBED_BATCH_SIZE)?;
        if batch_size == 0 {
            batch_size = DEFAULT_FASTEMBED_BATCH_SIZE;
        }
        if batch_size > MAX_FASTEMBED_BATCH_SIZE {
            tracing::warn!(
                "FASTEMBED_BATCH_SIZE={} exceeds max {}; clamping.",
                batch_size,
                MAX_FASTEMBED_BATCH_SIZE
            );
            batch_size = MAX_FASTEMBED_BATCH_SIZE;
        }

        let mut max_chars = parse_usize_env("FASTEMBED_MAX_CHARS", max_chars)?;
        if max_chars == 0 {
            max_chars = DEFAULT_FASTEMBED_MAX_CHARS;
        }

        Ok(Self {
            model,
            batch_size,
            max_chars,
        })
    }
}

impl Default for EmbeddingProviderConfig {
    fn default() -> Self {
        Self {
            model: EmbeddingModel::AllMiniLML6V2,
            batch_size: DEFAULT_FASTEMBED_BATCH_SIZE,
            max_chars: DEFAULT_FASTEMBED_MAX_CHARS,
        }
    }
}

/// Trait for embedding providers.
///
/// Implementations must be deterministic for a given model identifier and
/// input, and return exactly one vector per input text, in input order.
pub trait EmbeddingProvider: Send {
    /// Returns the model identifier.
    fn model_id(&self) -> &str;

    /// Generates embeddings for the given texts.
    fn embed_texts(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Generates an embedding for a single text.
    fn embed_one(&mut self, text: &str) -> Result<Vec<f32>> {
        let mut result = self.embed_texts(&[text.to_string()])?;
        if result.len() != 1 {
            bail!(
                "Provider {} returned {} embeddings for 1 text",
                self.model_id(),
                result.len()
            );
        }
        Ok(result.remove(0))
    }
}

/// FastEmbed provider for sentence-transformer models.
pub struct FastEmbedder {
    embedder: TextEmbedding,
    config: EmbeddingProviderConfig,
    model_id: String,
}

impl FastEmbedder {
    pub fn new(model_id: impl Into<String>, config: EmbeddingProviderConfig) -> Result<Self> {
        let model_id = model_id.into();
        let init = InitOptions::new(config.model.clone());
        let embedder = TextEmbedding::try_new(init)
            .with_context(|| format!("Failed to initialize fastembed model {}", model_id))?;

        Ok(Self {
            embedder,
            config,
            model_id,
        })
    }
}

impl EmbeddingProvider for FastEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn embed_texts(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let prepared = truncate_texts(texts, self.config.max_chars);
        let mut embeddings = self
            .embedder
            .embed(&prepared, Some(self.config.batch_size))?;

        for embedding in embeddings.iter_mut() {
            l2_normalize(embedding);
        }

        Ok(embeddings)
    }
}

/// Command provider that shells out to an external process.
///
/// The command receives `{"model": ..., "texts": [...]}` on stdin and must print
/// a JSON array of vectors (or an object with an `embeddings`, `vectors` or
/// `data` array) on stdout.
pub struct CommandProvider {
    command: String,
    model: String,
}

impl CommandProvider {
    pub fn new(command: String, model: String) -> Self {
        Self { command, model }
    }

    fn run_command(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let payload = serde_json::json!({
            "model": self.model,
            "texts": texts,
        });

        let mut child = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("Failed to spawn embedding command: {}", self.command))?;

        if let Some(mut stdin) = child.stdin.take() {
            let payload_str = payload.to_string();
            stdin
                .write_all(payload_str.as_bytes())
                .context("Failed to write embeddings payload to stdin")?;
        }

        let output = child
            .wait_with_output()
            .context("Failed to read embeddings command output")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "Embedding command failed (status {}): {}",
                output.status,
                stderr.trim()
            );
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_command_output(stdout.trim())
    }
}

impl EmbeddingProvider for CommandProvider {
    fn model_id(&self) -> &str {
        &self.model
    }

    fn embed_texts(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let mut vectors = self.run_command(texts)?;
        for vector in vectors.iter_mut() {
            l2_normalize(vector);
        }
        Ok(vectors)
    }
}

fn parse_command_output(raw: &str) -> Result<Vec<Vec<f32>>> {
    let parsed: Value = serde_json::from_str(raw)
        .with_context(|| "Failed to parse embeddings command output as JSON")?;

    let embeddings_value = match parsed {
        Value::Array(arr) => Value::Array(arr),
        Value::Object(ref obj) => {
            if let Some(value) = obj.get("embeddings") {
                value.clone()
            } else if let Some(value) = obj.get("vectors") {
                value.clone()
            } else if let Some(value) = obj.get("data") {
                value.clone()
            } else {
                bail!("Embeddings command output missing 'embeddings' field");
            }
        }
        _ => bail!("Embeddings command output must be JSON array or object"),
    };

    embeddings_value
        .as_array()
        .ok_or_else(|| anyhow::anyhow!("Embeddings output must be a JSON array"))?
        .iter()
        .map(|row| {
            row.as_array()
                .ok_or_else(|| anyhow::anyhow!("Embedding row must be an array"))?
                .iter()
                .map(|value| {
                    value
                        .as_f64()
                        .ok_or_else(|| anyhow::anyhow!("Embedding value must be a number"))
                        .map(|v| v as f32)
                })
                .collect::<Result<Vec<f32>>>()
        })
        .collect::<Result<Vec<Vec<f32>>>>()
}

/// Deterministic feature-hashing provider.
///
/// Each lowercase alphanumeric token is hashed with blake3 into one of
/// `dimension` buckets with a hash-derived sign; the result is L2-normalized.
/// Texts sharing vocabulary land close together, identical texts embed
/// identically. No model download is needed.
pub struct HashingProvider {
    model: String,
    dimension: usize,
}

impl HashingProvider {
    /// Creates a provider with the given dimension.
    pub fn new(dimension: usize) -> Self {
        let dimension = dimension.max(1);
        Self {
            model: format!("{}-{}", HASHING_MODEL_PREFIX, dimension),
            dimension,
        }
    }

    /// Creates a provider from a `hashing` or `hashing-<dim>` model identifier.
    pub fn from_model_id(model_id: &str) -> Result<Self> {
        let Some(rest) = model_id.strip_prefix(HASHING_MODEL_PREFIX) else {
            bail!("Not a hashing model identifier: {}", model_id);
        };
        let dimension = match rest.strip_prefix('-') {
            None if rest.is_empty() => DEFAULT_HASHING_DIM,
            Some(dim) => dim
                .parse::<usize>()
                .with_context(|| format!("Invalid hashing dimension in '{}'", model_id))?,
            None => bail!("Invalid hashing model identifier: {}", model_id),
        };
        if dimension == 0 {
            bail!("Hashing dimension must be positive: {}", model_id);
        }
        Ok(Self {
            model: model_id.to_string(),
            dimension,
        })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let token = token.to_lowercase();
            let hash = blake3::hash(token.as_bytes());
            let bytes = hash.as_bytes();
            let mut bucket = [0u8; 8];
            bucket.copy_from_slice(&bytes[..8]);
            let idx = (u64::from_le_bytes(bucket) % self.dimension as u64) as usize;
            let sign = if bytes[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[idx] += sign;
        }
        l2_normalize(&mut vector);
        vector
    }
}

impl EmbeddingProvider for HashingProvider {
    fn model_id(&self) -> &str {
        &self.model
    }

    fn embed_texts(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| self.embed_text(text)).collect())
    }
}

/// True if `model_id` names the hashing provider.
pub fn is_hashing_model(model_id: &str) -> bool {
    model_id == HASHING_MODEL_PREFIX
        || model_id
            .strip_prefix(HASHING_MODEL_PREFIX)
            .is_some_and(|rest| rest.starts_with('-'))
}

fn truncate_texts(texts: &[String], max_chars: usize) -> Vec<Cow<'_, str>> {
    texts
        .iter()
        .map(|text| truncate_to_chars(text.as_str(), max_chars))
        .collect()
}

fn truncate_to_chars(input: &str, max_chars: usize) -> Cow<'_, str> {
    if max_chars == 0 {
        return Cow::Borrowed("");
    }

    match input.char_indices().nth(max_chars) {
        Some((idx, _)) => Cow::Owned(input[..idx].to_string()),
        None => Cow::Borrowed(input),
    }
}

/// Scale `vector` to unit length in place. Zero vectors are left untouched.
pub fn l2_normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm == 0.0 {
        return;
    }
    for value in vector.iter_mut() {
        *value /= norm;
    }
}

/// Map a model identifier onto a fastembed model.
pub fn parse_fastembed_model(model_id: &str) -> Result<EmbeddingModel> {
    let value = model_id.trim().to_lowercase();
    let name = value
        .strip_prefix("sentence-transformers/")
        .or_else(|| value.strip_prefix("baai/"))
        .unwrap_or(value.as_str());

    match name {
        "" | "minilm" | "all-minilm-l6-v2" | "allminilm-l6-v2" => Ok(EmbeddingModel::AllMiniLML6V2),
        "all-minilm-l12-v2" | "allminilm-l12-v2" => Ok(EmbeddingModel::AllMiniLML12V2),
        "bge-small-en-v1.5" => Ok(EmbeddingModel::BGESmallENV15),
        "bge-base-en-v1.5" => Ok(EmbeddingModel::BGEBaseENV15),
        "bge-large-en-v1.5" => Ok(EmbeddingModel::BGELargeENV15),
        _ => bail!(
            "Unsupported embedding model '{}'. Supported: {}, all-MiniLM-L12-v2, bge-small-en-v1.5, bge-base-en-v1.5, bge-large-en-v1.5, hashing-<dim>",
            model_id,
            DEFAULT_MODEL_ID
        ),
    }
}

fn parse_usize_env(name: &str, default: usize) -> Result<usize> {
    match env::var(name) {
        Ok(raw) => {
            let value = raw.trim();
            if value.is_empty() {
                Ok(default)
            } else {
                value
                    .parse::<usize>()
                    .with_context(|| format!("Invalid {} value: {}", name, value))
            }
        }
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("Failed to read {}", name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dot(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[test]
    fn test_hashing_provider_is_unit_length() {
        let mut provider = HashingProvider::new(64);
        assert_eq!(provider.model_id(), "hashing-64");

        let result = provider
            .embed_texts(&["hello world".to_string(), "rust search".to_string()])
            .unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].len(), 64);
        let norm = dot(&result[0], &result[0]).sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_hashing_provider_is_deterministic() {
        let mut a = HashingProvider::from_model_id("hashing-32").unwrap();
        let mut b = HashingProvider::from_model_id("hashing-32").unwrap();
        let text = "The quick brown fox".to_string();
        assert_eq!(
            a.embed_texts(std::slice::from_ref(&text)).unwrap(),
            b.embed_texts(std::slice::from_ref(&text)).unwrap()
        );
    }

    #[test]
    fn test_hashing_provider_ignores_case_and_punctuation() {
        let mut provider = HashingProvider::new(128);
        let a = provider.embed_one("Cat, food!").unwrap();
        let b = provider.embed_one("cat food").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_hashing_empty_text_is_zero_vector() {
        let mut provider = HashingProvider::new(16);
        let vector = provider.embed_one("   ").unwrap();
        assert!(vector.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_hashing_model_ids() {
        assert_eq!(HashingProvider::from_model_id("hashing").unwrap().dimension(), 384);
        assert_eq!(HashingProvider::from_model_id("hashing-8").unwrap().dimension(), 8);
        assert!(HashingProvider::from_model_id("hashing-0").is_err());
        assert!(HashingProvider::from_model_id("hashing-x").is_err());
        assert!(HashingProvider::from_model_id("hashingfoo").is_err());
        assert!(is_hashing_model("hashing"));
        assert!(is_hashing_model("hashing-16"));
        assert!(!is_hashing_model("hashingfoo"));
        assert!(!is_hashing_model(DEFAULT_MODEL_ID));
    }

    #[test]
    fn test_empty_embed() {
        let mut provider = HashingProvider::new(384);
        let result = provider.embed_texts(&[]).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_truncate_to_chars() {
        let input = "hello";
        assert_eq!(
            truncate_to_chars(input, 2),
            Cow::<str>::Owned("he".to_string())
        );
        assert_eq!(truncate_to_chars(input, 5), Cow::Borrowed(input));
    }

    #[test]
    fn test_l2_normalize() {
        let mut v = vec![3.0, 4.0];
        l2_normalize(&mut v);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);

        let mut zero = vec![0.0, 0.0];
        l2_normalize(&mut zero);
        assert_eq!(zero, vec![0.0, 0.0]);
    }

    #[test]
    fn test_parse_fastembed_model() {
        assert!(matches!(
            parse_fastembed_model(DEFAULT_MODEL_ID).unwrap(),
            EmbeddingModel::AllMiniLML6V2
        ));
        assert!(matches!(
            parse_fastembed_model("BAAI/bge-small-en-v1.5").unwrap(),
            EmbeddingModel::BGESmallENV15
        ));
        assert!(parse_fastembed_model("unknown/model").is_err());
    }

    #[test]
    fn test_parse_command_output_shapes() {
        let plain = parse_command_output("[[1.0, 0.0], [0.0, 1.0]]").unwrap();
        assert_eq!(plain, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);

        let wrapped = parse_command_output(r#"{"embeddings": [[0.5, 0.5]]}"#).unwrap();
        assert_eq!(wrapped, vec![vec![0.5, 0.5]]);

        assert!(parse_command_output(r#"{"other": []}"#).is_err());
        assert!(parse_command_output(r#"[["a"]]"#).is_err());
        assert!(parse_command_output("not json").is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_command_provider_normalizes_output() {
        let mut provider = CommandProvider::new(
            "cat > /dev/null; echo '[[3.0, 4.0]]'".to_string(),
            "external".to_string(),
        );
        assert_eq!(provider.model_id(), "external");
        let vectors = provider.embed_texts(&["x".to_string()]).unwrap();
        assert!((vectors[0][0] - 0.6).abs() < 1e-6);
        assert!((vectors[0][1] - 0.8).abs() < 1e-6);
    }

    #[cfg(unix)]
    #[test]
    fn test_command_provider_failure_is_reported() {
        let mut provider =
            CommandProvider::new("cat > /dev/null; exit 3".to_string(), "external".to_string());
        let err = provider.embed_texts(&["x".to_string()]).unwrap_err();
        assert!(err.to_string().contains("Embedding command failed"));
    }

    struct Chatty;

    impl EmbeddingProvider for Chatty {
        fn model_id(&self) -> &str {
            "chatty"
        }

        fn embed_texts(&mut self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(vec![vec![1.0, 0.0], vec![0.0, 1.0]])
        }
    }

    #[test]
    fn test_embed_one_requires_exactly_one_vector() {
        let err = Chatty.embed_one("hello").unwrap_err();
        assert!(err.to_string().contains("returned 2 embeddings"));
    }
}
