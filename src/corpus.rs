// SPDX-License-Identifier: MIT OR Apache-2.0

//! Corpus loader
//!
//! Walks a document directory in a deterministic order, decodes each file
//! best-effort and derives the identifiers and preview snippets stored in an index.

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::errors::{Error, Result};

/// Default snippet budget in characters.
pub const DEFAULT_SNIPPET_CHARS: usize = 200;
/// Corpus size below which a warning is emitted.
pub const DEFAULT_MIN_DOCUMENTS: usize = 100;

const ELLIPSIS: &str = "...";

/// Options controlling document discovery and snippet generation
#[derive(Debug, Clone)]
pub struct CorpusOptions {
    /// File extensions (without the dot) treated as documents
    pub extensions: Vec<String>,
    /// Advisory minimum corpus size
    pub min_documents: usize,
    /// Maximum snippet length in characters
    pub snippet_chars: usize,
}

impl Default for CorpusOptions {
    fn default() -> Self {
        Self {
            extensions: vec!["txt".into()],
            min_documents: DEFAULT_MIN_DOCUMENTS,
            snippet_chars: DEFAULT_SNIPPET_CHARS,
        }
    }
}

impl CorpusOptions {
    fn is_document(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|allowed| allowed == ext))
    }
}

/// A loaded document. `text` is only kept for embedding and is never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Path relative to the corpus root, separators preserved
    pub id: String,
    /// Path on disk
    pub path: PathBuf,
    /// Full decoded text
    pub text: String,
    /// Whitespace-normalized, truncated preview
    pub snippet: String,
}

/// List document files under `root`, sorted lexicographically by path.
pub fn list_documents(root: &Path, options: &CorpusOptions) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(Error::not_found("input directory", root));
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|err| {
            let path = err
                .path()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| root.to_path_buf());
            Error::io(path, err.into())
        })?;
        let path = entry.path();
        if path.is_file() && options.is_document(path) {
            files.push(path.to_path_buf());
        }
    }
    files.sort();

    if files.len() < options.min_documents {
        tracing::warn!(
            "Found {} document files under {} (minimum recommended: {})",
            files.len(),
            root.display(),
            options.min_documents
        );
    }

    Ok(files)
}

/// Load every document under `root` with its identifier and snippet.
pub fn load_corpus(root: &Path, options: &CorpusOptions) -> Result<Vec<Document>> {
    list_documents(root, options)?
        .into_iter()
        .map(|path| {
            let text = read_document_text(&path)?;
            let snippet = make_snippet(&text, options.snippet_chars);
            Ok(Document {
                id: document_id(root, &path),
                path,
                text,
                snippet,
            })
        })
        .collect()
}

/// Read a file as UTF-8, dropping malformed byte sequences.
pub fn read_document_text(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path).map_err(|e| Error::io(path, e))?;
    Ok(decode_dropping_invalid(&bytes))
}

fn decode_dropping_invalid(bytes: &[u8]) -> String {
    let mut text = String::with_capacity(bytes.len());
    for chunk in bytes.utf8_chunks() {
        text.push_str(chunk.valid());
    }
    text
}

/// Identifier of `path` within the corpus rooted at `root`.
pub fn document_id(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .into_owned()
}

/// Collapse whitespace runs and truncate to `max_chars` characters, appending
/// an ellipsis only when something was cut.
pub fn make_snippet(text: &str, max_chars: usize) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    match collapsed.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}{}", &collapsed[..idx], ELLIPSIS),
        None => collapsed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_file(path: &Path, contents: &[u8]) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn snippet_collapses_whitespace() {
        assert_eq!(make_snippet("  hello \n\t world  ", 200), "hello world");
    }

    #[test]
    fn snippet_truncates_with_ellipsis() {
        assert_eq!(make_snippet("abcdef", 3), "abc...");
        assert_eq!(make_snippet("abc", 3), "abc");
        assert_eq!(make_snippet("", 3), "");
    }

    #[test]
    fn snippet_counts_characters_not_bytes() {
        assert_eq!(make_snippet("héllo wörld", 4), "héll...");
    }

    #[test]
    fn decode_drops_malformed_bytes() {
        assert_eq!(decode_dropping_invalid(b"ab\xffcd\xc3"), "abcd");
        assert_eq!(decode_dropping_invalid("naïve".as_bytes()), "naïve");
    }

    #[test]
    fn missing_root_is_not_found() {
        let dir = TempDir::new().unwrap();
        let err = load_corpus(&dir.path().join("nope"), &CorpusOptions::default()).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn file_root_is_not_found() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a.txt");
        write_file(&file, b"x");
        let err = list_documents(&file, &CorpusOptions::default()).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn lists_text_files_in_path_order() {
        let dir = TempDir::new().unwrap();
        write_file(&dir.path().join("b.txt"), b"b");
        write_file(&dir.path().join("a/z.txt"), b"z");
        write_file(&dir.path().join("a/c.txt"), b"c");
        write_file(&dir.path().join("notes.md"), b"ignored");

        let docs = load_corpus(dir.path(), &CorpusOptions::default()).unwrap();
        let ids: Vec<&str> = docs.iter().map(|d| d.id.as_str()).collect();
        let expected: Vec<String> = vec![
            Path::new("a").join("c.txt").to_string_lossy().into_owned(),
            Path::new("a").join("z.txt").to_string_lossy().into_owned(),
            "b.txt".to_string(),
        ];
        assert_eq!(ids, expected);
        assert_eq!(docs[2].text, "b");
    }

    #[test]
    fn custom_extensions() {
        let dir = TempDir::new().unwrap();
        write_file(&dir.path().join("a.txt"), b"a");
        write_file(&dir.path().join("b.md"), b"b");
        let options = CorpusOptions {
            extensions: vec!["md".into()],
            ..CorpusOptions::default()
        };
        let files = list_documents(dir.path(), &options).unwrap();
        assert_eq!(files, vec![dir.path().join("b.md")]);
    }

    #[test]
    fn loads_snippets_and_keeps_full_text() {
        let dir = TempDir::new().unwrap();
        let long = "word ".repeat(100);
        write_file(&dir.path().join("long.txt"), long.as_bytes());

        let options = CorpusOptions {
            snippet_chars: 10,
            min_documents: 0,
            ..CorpusOptions::default()
        };
        let docs = load_corpus(dir.path(), &options).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].snippet, "word word ...");
        assert_eq!(docs[0].text, long);
    }

    #[test]
    fn empty_directory_yields_no_documents() {
        let dir = TempDir::new().unwrap();
        let docs = load_corpus(dir.path(), &CorpusOptions::default()).unwrap();
        assert!(docs.is_empty());
    }
}
