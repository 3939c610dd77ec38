// SPDX-License-Identifier: MIT OR Apache-2.0

//! semdex - Local semantic search library
//!
//! Builds a dense embedding index over a directory of text documents and
//! ranks documents against queries by cosine similarity.

pub mod config;
pub mod corpus;
pub mod embedding;
pub mod errors;
pub mod index;
pub mod output;
pub mod query;

pub use errors::{Error, Result};
