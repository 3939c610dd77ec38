// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query module - similarity search over a persisted index

pub mod rank;
pub mod search;

pub use search::{
    batch_search, parse_queries, read_queries_file, search, BatchResults, SearchHit, SearchIndex,
};
