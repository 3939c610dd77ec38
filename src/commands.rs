// SPDX-License-Identifier: MIT OR Apache-2.0

//! Command handlers for the semdex binary

use anyhow::{Context as _, Result};
use colored::Colorize;
use std::path::Path;

use semdex::config::{Config, ConfigOutputFormat};
use semdex::embedding::ProviderRegistry;
use semdex::index::{BuildOptions, IndexBuilder};
use semdex::output;
use semdex::query::{self, SearchIndex};

use crate::cli::OutputFormat;

/// Settings shared by every command
pub struct Context {
    pub config: Config,
    pub format: OutputFormat,
    pub quiet: bool,
}

impl Context {
    pub fn new(config: Config, format: Option<OutputFormat>, quiet: bool) -> Self {
        let format = format.unwrap_or(match config.output_format() {
            Some(ConfigOutputFormat::Json) => OutputFormat::Json,
            _ => OutputFormat::Text,
        });
        Self {
            config,
            format,
            quiet,
        }
    }

    fn resolver(&self) -> ProviderRegistry {
        ProviderRegistry::from_config(self.config.embeddings())
    }

    fn status(&self, message: &str) {
        if !self.quiet && self.format == OutputFormat::Text {
            println!("{}", message);
        }
    }
}

pub fn index(
    ctx: &Context,
    input_dir: &Path,
    index_dir: &Path,
    model: Option<&str>,
    batch_size: Option<usize>,
) -> Result<()> {
    let model = model.unwrap_or_else(|| ctx.config.embeddings().model());
    let options = BuildOptions {
        batch_size: batch_size.unwrap_or_else(|| ctx.config.index().batch_size()),
        corpus: ctx.config.index().corpus_options(),
        show_progress: !ctx.quiet && ctx.format == OutputFormat::Text,
    };

    ctx.status(&format!("Embedding model: {}", model));
    ctx.status(&format!("Ingesting documents from: {}", input_dir.display()));

    let report = IndexBuilder::new(options)
        .build(input_dir, index_dir, model, &ctx.resolver())
        .with_context(|| format!("Failed to index {}", input_dir.display()))?;

    match ctx.format {
        OutputFormat::Json => {
            let value = serde_json::json!({
                "documents": report.documents,
                "dimension": report.dimension,
                "model": report.model_id,
                "index_dir": report.index_dir,
                "embedding_seconds": report.embedding_time.as_secs_f64(),
                "written": !report.is_empty(),
            });
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        OutputFormat::Text if report.is_empty() => {
            println!("Indexed 0 documents; no index written.");
        }
        OutputFormat::Text => {
            ctx.status(&format!(
                "Indexed {} documents. Embedding time: {:.2}s",
                report.documents,
                report.embedding_time.as_secs_f64()
            ));
            ctx.status(&format!(
                "{} Index saved to {}",
                "✓".green(),
                report.index_dir.display()
            ));
        }
    }
    Ok(())
}

pub fn search(ctx: &Context, index_dir: &Path, query: &str, top_k: Option<usize>) -> Result<()> {
    let top_k = ctx.config.merge_top_k(top_k);
    let hits = query::search(index_dir, query, top_k, &ctx.resolver())?;

    match ctx.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&hits)?),
        OutputFormat::Text => print!("{}", output::format_hits(&hits, output::use_colors())),
    }
    Ok(())
}

pub fn batch(
    ctx: &Context,
    index_dir: &Path,
    queries_file: &Path,
    top_k: Option<usize>,
) -> Result<()> {
    let top_k = ctx.config.merge_top_k(top_k);
    let index = SearchIndex::open(index_dir)?;
    let queries = query::read_queries_file(queries_file)?;
    let results = index.batch_search(&queries, top_k, &ctx.resolver())?;

    match ctx.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&results)?),
        OutputFormat::Text => print!("{}", output::format_batch(&results, output::use_colors())),
    }
    Ok(())
}

pub fn info(ctx: &Context, index_dir: &Path) -> Result<()> {
    let index = SearchIndex::open(index_dir)?;
    let metadata = index.metadata();

    match ctx.format {
        OutputFormat::Json => {
            let value = serde_json::json!({
                "index_dir": index.location(),
                "model": index.model_id(),
                "documents": index.len(),
                "dimension": index.dim(),
                "base_dir": metadata.base_dir,
            });
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        OutputFormat::Text => {
            println!("Index:     {}", index.location().display());
            println!("Model:     {}", index.model_id());
            println!("Documents: {}", index.len());
            println!("Dimension: {}", index.dim());
            println!("Base dir:  {}", metadata.base_dir);
        }
    }
    Ok(())
}
