// SPDX-License-Identifier: MIT OR Apache-2.0

//! Index module - building and persisting embedding indexes

pub mod builder;
pub mod matrix;
pub mod npy;
pub mod store;

pub use builder::{BuildOptions, BuildReport, IndexBuilder, DEFAULT_BATCH_SIZE};
pub use matrix::EmbeddingMatrix;
pub use store::{
    load, load_with_default, publish, save, IndexMetadata, LoadedIndex, EMBEDDINGS_FILE,
    METADATA_FILE, MODEL_FILE,
};
