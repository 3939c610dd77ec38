// SPDX-License-Identifier: MIT OR Apache-2.0

//! On-disk index bundle.
//!
//! An index directory holds three artifacts:
//! - `embeddings.npy`: the `(num_docs, dim)` f32 embedding matrix
//! - `metadata.json`: `doc_ids`, `base_dir` and the `snippets` map
//! - `model_name.txt`: the embedding model identifier (optional on load)

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use super::matrix::EmbeddingMatrix;
use super::npy;
use crate::embedding::DEFAULT_MODEL_ID;
use crate::errors::{Error, Result};

pub const EMBEDDINGS_FILE: &str = "embeddings.npy";
pub const METADATA_FILE: &str = "metadata.json";
pub const MODEL_FILE: &str = "model_name.txt";

const ARTIFACTS: [&str; 3] = [EMBEDDINGS_FILE, METADATA_FILE, MODEL_FILE];
const STAGING_TAG: &str = ".staging-";
const RETIRED_TAG: &str = ".retired-";

/// Per-document metadata stored next to the embedding matrix
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexMetadata {
    /// Document identifiers in matrix row order
    pub doc_ids: Vec<String>,
    /// Absolute corpus directory the index was built from
    pub base_dir: String,
    /// Identifier to snippet
    pub snippets: BTreeMap<String, String>,
}

impl IndexMetadata {
    /// Snippet for `doc_id`, empty if unknown.
    pub fn snippet(&self, doc_id: &str) -> &str {
        self.snippets.get(doc_id).map(String::as_str).unwrap_or("")
    }

    pub fn len(&self) -> usize {
        self.doc_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.doc_ids.is_empty()
    }

    /// Check the metadata against a matrix with `rows` rows.
    pub fn validate(&self, rows: usize, location: &Path) -> Result<()> {
        if rows != self.doc_ids.len() {
            return Err(Error::corrupt(
                location,
                format!(
                    "embedding matrix has {} rows but metadata lists {} documents",
                    rows,
                    self.doc_ids.len()
                ),
            ));
        }
        if let Some(missing) = self
            .doc_ids
            .iter()
            .find(|id| !self.snippets.contains_key(id.as_str()))
        {
            return Err(Error::corrupt(
                location,
                format!("no snippet for document {}", missing),
            ));
        }
        Ok(())
    }
}

/// A fully loaded index bundle
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedIndex {
    pub matrix: EmbeddingMatrix,
    pub metadata: IndexMetadata,
    pub model_id: String,
}

/// True if both required artifacts exist under `location`.
pub fn exists(location: &Path) -> bool {
    location.join(EMBEDDINGS_FILE).is_file() && location.join(METADATA_FILE).is_file()
}

/// Write the three artifacts into `location`, creating it if needed.
///
/// Files are written individually; use [`publish`] to replace an index that
/// readers may be using.
pub fn save(
    location: &Path,
    matrix: &EmbeddingMatrix,
    metadata: &IndexMetadata,
    model_id: &str,
) -> Result<()> {
    metadata.validate(matrix.rows(), location)?;
    // load trims line endings from the model file
    if model_id.is_empty() || model_id.contains(&['\r', '\n'][..]) {
        return Err(Error::InvalidInput(format!(
            "model identifier must be a non-empty single line: {:?}",
            model_id
        )));
    }
    fs::create_dir_all(location).map_err(|e| Error::io(location, e))?;

    write_file(&location.join(EMBEDDINGS_FILE), &npy::encode(matrix))?;
    let json = serde_json::to_string_pretty(metadata)?;
    write_file(&location.join(METADATA_FILE), json.as_bytes())?;
    write_file(&location.join(MODEL_FILE), model_id.as_bytes())?;
    Ok(())
}

/// Load an index, substituting [`DEFAULT_MODEL_ID`] when no model file exists.
pub fn load(location: &Path) -> Result<LoadedIndex> {
    load_with_default(location, DEFAULT_MODEL_ID)
}

/// Load an index, substituting `default_model` when no model file exists.
pub fn load_with_default(location: &Path, default_model: &str) -> Result<LoadedIndex> {
    let emb_path = location.join(EMBEDDINGS_FILE);
    let meta_path = location.join(METADATA_FILE);
    let model_path = location.join(MODEL_FILE);

    let missing: Vec<&str> = [(&emb_path, EMBEDDINGS_FILE), (&meta_path, METADATA_FILE)]
        .into_iter()
        .filter(|(path, _)| !path.is_file())
        .map(|(_, name)| name)
        .collect();
    if !missing.is_empty() {
        return Err(Error::not_found(
            format!("index artifacts ({})", missing.join(", ")),
            location,
        ));
    }

    let bytes = fs::read(&emb_path).map_err(|e| Error::io(&emb_path, e))?;
    let matrix = npy::decode(&bytes, &emb_path)?;

    let raw = fs::read_to_string(&meta_path).map_err(|e| Error::io(&meta_path, e))?;
    let metadata: IndexMetadata = serde_json::from_str(&raw)
        .map_err(|e| Error::corrupt(&meta_path, format!("invalid metadata: {}", e)))?;

    let model_id = if model_path.is_file() {
        let raw = fs::read_to_string(&model_path).map_err(|e| Error::io(&model_path, e))?;
        raw.trim_end_matches(&['\r', '\n'][..]).to_string()
    } else {
        tracing::debug!(
            "No {} in {}; assuming {}",
            MODEL_FILE,
            location.display(),
            default_model
        );
        default_model.to_string()
    };

    metadata.validate(matrix.rows(), location)?;

    Ok(LoadedIndex {
        matrix,
        metadata,
        model_id,
    })
}

/// Replace the index at `location` so readers see either the old bundle or
/// the new one, never a mix.
///
/// The bundle is written to a sibling staging directory and renamed into
/// place. Files in `location` that are not index artifacts are carried over
/// into the new directory. Staging directories left by interrupted runs are
/// removed first.
pub fn publish(
    location: &Path,
    matrix: &EmbeddingMatrix,
    metadata: &IndexMetadata,
    model_id: &str,
) -> Result<()> {
    let target = if location.exists() {
        location
            .canonicalize()
            .map_err(|e| Error::io(location, e))?
    } else {
        location.to_path_buf()
    };
    if target.exists() && !target.is_dir() {
        return Err(Error::InvalidInput(format!(
            "index location is not a directory: {}",
            target.display()
        )));
    }

    let name = target
        .file_name()
        .ok_or_else(|| {
            Error::InvalidInput(format!("invalid index location: {}", location.display()))
        })?
        .to_string_lossy()
        .into_owned();
    let parent = match target.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent).map_err(|e| Error::io(&parent, e))?;
    remove_stale_siblings(&parent, &name)?;

    let pid = std::process::id();
    let staging = parent.join(format!(".{}{}{}", name, STAGING_TAG, pid));
    remove_dir_if_exists(&staging)?;
    if let Err(err) = save(&staging, matrix, metadata, model_id) {
        let _ = fs::remove_dir_all(&staging);
        return Err(err);
    }

    if target.exists() {
        let retired = parent.join(format!(".{}{}{}", name, RETIRED_TAG, pid));
        remove_dir_if_exists(&retired)?;
        fs::rename(&target, &retired).map_err(|e| Error::io(&target, e))?;
        if let Err(e) = fs::rename(&staging, &target) {
            let _ = fs::rename(&retired, &target);
            let _ = fs::remove_dir_all(&staging);
            return Err(Error::io(&target, e));
        }
        match carry_over(&retired, &target) {
            Ok(()) => {
                if let Err(e) = fs::remove_dir_all(&retired) {
                    tracing::warn!("Failed to remove old index {}: {}", retired.display(), e);
                }
            }
            Err(e) => tracing::warn!(
                "Left previous index directory at {} ({})",
                retired.display(),
                e
            ),
        }
    } else {
        fs::rename(&staging, &target).map_err(|e| Error::io(&target, e))?;
    }

    tracing::info!("Published index to {}", target.display());
    Ok(())
}

/// Move everything except the index artifacts from `from` into `to`.
fn carry_over(from: &Path, to: &Path) -> Result<()> {
    for entry in fs::read_dir(from).map_err(|e| Error::io(from, e))? {
        let entry = entry.map_err(|e| Error::io(from, e))?;
        let file_name = entry.file_name();
        if is_artifact(&file_name.to_string_lossy()) {
            continue;
        }
        let dest = to.join(&file_name);
        fs::rename(entry.path(), &dest).map_err(|e| Error::io(&dest, e))?;
        tracing::debug!("Kept {} in {}", file_name.to_string_lossy(), to.display());
    }
    Ok(())
}

/// Remove `.{name}.staging-*` directories, and `.{name}.retired-*` ones that
/// hold nothing but index artifacts, left by interrupted runs.
fn remove_stale_siblings(parent: &Path, name: &str) -> Result<()> {
    let staging_prefix = format!(".{}{}", name, STAGING_TAG);
    let retired_prefix = format!(".{}{}", name, RETIRED_TAG);
    for entry in fs::read_dir(parent).map_err(|e| Error::io(parent, e))? {
        let entry = entry.map_err(|e| Error::io(parent, e))?;
        let file_name = entry.file_name();
        let file_name = file_name.to_string_lossy();
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let stale = file_name.starts_with(&staging_prefix)
            || (file_name.starts_with(&retired_prefix) && holds_only_artifacts(&path)?);
        if stale {
            tracing::debug!("Removing stale {}", path.display());
            remove_dir_if_exists(&path)?;
        }
    }
    Ok(())
}

fn holds_only_artifacts(dir: &Path) -> Result<bool> {
    for entry in fs::read_dir(dir).map_err(|e| Error::io(dir, e))? {
        let entry = entry.map_err(|e| Error::io(dir, e))?;
        if !is_artifact(&entry.file_name().to_string_lossy()) {
            return Ok(false);
        }
    }
    Ok(true)
}

fn is_artifact(name: &str) -> bool {
    ARTIFACTS.contains(&name)
}

fn remove_dir_if_exists(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_dir_all(path).map_err(|e| Error::io(path, e))?;
    }
    Ok(())
}

fn write_file(path: &Path, contents: &[u8]) -> Result<()> {
    fs::write(path, contents).map_err(|e| Error::io(path, e))
}
