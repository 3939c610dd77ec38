// SPDX-License-Identifier: MIT OR Apache-2.0

//! Output and color utilities for consistent terminal formatting
//!
//! Provides result rendering respecting the NO_COLOR environment variable.

use colored::Colorize;
use std::fmt::Write;

use crate::query::{BatchResults, SearchHit};

/// Check if colors should be used (respects NO_COLOR env var)
pub fn use_colors() -> bool {
    std::env::var("NO_COLOR").is_err()
}

/// Colorize document identifier (cyan)
pub fn colorize_doc_id(text: &str, use_color: bool) -> String {
    if use_color {
        text.cyan().to_string()
    } else {
        text.to_string()
    }
}

/// Colorize score (yellow)
pub fn colorize_score(score: f32, use_color: bool) -> String {
    let text = format!("{:.4}", score);
    if use_color {
        text.yellow().to_string()
    } else {
        text
    }
}

/// Colorize snippet (dimmed)
pub fn colorize_snippet(text: &str, use_color: bool) -> String {
    if use_color {
        text.dimmed().to_string()
    } else {
        text.to_string()
    }
}

/// Colorize query header (bold)
pub fn colorize_query(text: &str, use_color: bool) -> String {
    if use_color {
        text.bold().to_string()
    } else {
        text.to_string()
    }
}

/// Render ranked hits, one numbered entry with an indented snippet each.
pub fn format_hits(hits: &[SearchHit], use_color: bool) -> String {
    let mut out = String::new();
    for (rank, hit) in hits.iter().enumerate() {
        let _ = writeln!(
            out,
            "{}. {}  |  score={}",
            rank + 1,
            colorize_doc_id(&hit.doc_id, use_color),
            colorize_score(hit.score, use_color)
        );
        let _ = writeln!(out, "   {}", colorize_snippet(&hit.snippet, use_color));
    }
    out
}

/// Render batch results, each block preceded by a blank line and its query.
pub fn format_batch(results: &BatchResults, use_color: bool) -> String {
    let mut out = String::new();
    for (query, hits) in results.iter() {
        let _ = writeln!(out, "\nQuery: {}", colorize_query(query, use_color));
        out.push_str(&format_hits(hits, use_color));
    }
    out
}
