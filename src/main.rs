// SPDX-License-Identifier: MIT OR Apache-2.0

//! semdex - Local semantic search tool
//!
//! Indexes a directory of text documents into dense embeddings and answers
//! single or batched queries by cosine similarity.

mod cli;
mod commands;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Commands};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    // Initialize tracing with SEMDEX_LOG env var (e.g., SEMDEX_LOG=debug semdex search ...)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("SEMDEX_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let ctx = commands::Context::new(semdex::config::Config::load(), cli.format, cli.quiet);

    match cli.command {
        Commands::Index {
            input_dir,
            index_dir,
            model,
            batch_size,
        } => {
            commands::index(&ctx, &input_dir, &index_dir, model.as_deref(), batch_size)?;
        }
        Commands::Search {
            index_dir,
            query,
            top_k,
        } => {
            commands::search(&ctx, &index_dir, &query, top_k)?;
        }
        Commands::Batch {
            index_dir,
            queries_file,
            top_k,
        } => {
            commands::batch(&ctx, &index_dir, &queries_file, top_k)?;
        }
        Commands::Info { index_dir } => {
            commands::info(&ctx, &index_dir)?;
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "semdex", &mut std::io::stdout());
        }
    }

    Ok(())
}
