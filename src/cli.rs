// SPDX-License-Identifier: MIT OR Apache-2.0

//! CLI argument parsing using clap

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

/// semdex - Local semantic search over text documents
///
/// Embeds every .txt file under a directory into a vector index and ranks
/// documents against natural-language queries by cosine similarity.
#[derive(Parser, Debug)]
#[command(name = "semdex")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true)]
    pub format: Option<OutputFormat>,

    /// Suppress progress and status messages
    #[arg(long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Output format for results
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Index a directory of .txt files
    Index {
        /// Directory with the documents
        #[arg(long, alias = "input_dir")]
        input_dir: PathBuf,

        /// Directory to save the index
        #[arg(long, alias = "index_dir")]
        index_dir: PathBuf,

        /// Embedding model identifier (defaults to config, then all-MiniLM-L6-v2)
        #[arg(long)]
        model: Option<String>,

        /// Documents per embedding call
        #[arg(long, alias = "batch_size")]
        batch_size: Option<usize>,
    },

    /// Search the index with a single query
    #[command(alias = "s")]
    Search {
        /// Directory containing the index
        #[arg(long, alias = "index_dir")]
        index_dir: PathBuf,

        /// Query string
        #[arg(short, long)]
        query: String,

        /// Number of top results
        #[arg(short = 'k', long, alias = "top_k")]
        top_k: Option<usize>,
    },

    /// Batch search with queries from a file (one per line)
    Batch {
        /// Directory containing the index
        #[arg(long, alias = "index_dir")]
        index_dir: PathBuf,

        /// Text file of queries
        #[arg(long, alias = "queries_file")]
        queries_file: PathBuf,

        /// Number of top results per query
        #[arg(short = 'k', long, alias = "top_k")]
        top_k: Option<usize>,
    },

    /// Show a summary of an index
    Info {
        /// Directory containing the index
        #[arg(long, alias = "index_dir")]
        index_dir: PathBuf,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn accepts_underscore_aliases() {
        let cli = Cli::try_parse_from([
            "semdex",
            "index",
            "--input_dir",
            "docs",
            "--index_dir",
            "idx",
            "--batch_size",
            "8",
        ])
        .unwrap();
        match cli.command {
            Commands::Index {
                input_dir,
                index_dir,
                model,
                batch_size,
            } => {
                assert_eq!(input_dir, PathBuf::from("docs"));
                assert_eq!(index_dir, PathBuf::from("idx"));
                assert_eq!(model, None);
                assert_eq!(batch_size, Some(8));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn search_requires_query() {
        assert!(Cli::try_parse_from(["semdex", "search", "--index-dir", "idx"]).is_err());
    }
}
