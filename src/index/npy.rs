// SPDX-License-Identifier: MIT OR Apache-2.0

//! Minimal NumPy `.npy` codec for two-dimensional float matrices.
//!
//! Writes version 1.0 files with a `<f4` C-order payload. Reads versions 1-3
//! with `<f4` or `<f8` payloads in either memory order, which covers what
//! `numpy.save` produces for embedding matrices.

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

use super::matrix::EmbeddingMatrix;
use crate::errors::{Error, Result};

const MAGIC: &[u8] = b"\x93NUMPY";
const ALIGNMENT: usize = 64;

static DESCR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"['"]descr['"]\s*:\s*['"]([^'"]+)['"]"#).expect("valid regex"));
static FORTRAN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"['"]fortran_order['"]\s*:\s*(True|False)"#).expect("valid regex")
});
static SHAPE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"['"]shape['"]\s*:\s*\(([^)]*)\)"#).expect("valid regex"));

/// Encode `matrix` as a version 1.0 `.npy` file.
pub fn encode(matrix: &EmbeddingMatrix) -> Vec<u8> {
    let dict = format!(
        "{{'descr': '<f4', 'fortran_order': False, 'shape': ({}, {}), }}",
        matrix.rows(),
        matrix.dim()
    );
    // magic + version + u16 length, then the dict padded with spaces and a newline
    let prefix_len = MAGIC.len() + 2 + 2;
    let unpadded = prefix_len + dict.len() + 1;
    let padding = (ALIGNMENT - unpadded % ALIGNMENT) % ALIGNMENT;
    let header_len = dict.len() + padding + 1;

    let mut out = Vec::with_capacity(prefix_len + header_len + matrix.as_slice().len() * 4);
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&[1, 0]);
    out.extend_from_slice(&(header_len as u16).to_le_bytes());
    out.extend_from_slice(dict.as_bytes());
    out.extend(std::iter::repeat(b' ').take(padding));
    out.push(b'\n');
    for value in matrix.as_slice() {
        out.extend_from_slice(&value.to_le_bytes());
    }
    out
}

/// Decode a `.npy` buffer read from `path` (used for error messages).
pub fn decode(bytes: &[u8], path: &Path) -> Result<EmbeddingMatrix> {
    let corrupt = |reason: &str| Error::corrupt(path, reason);

    if bytes.len() < MAGIC.len() + 2 || &bytes[..MAGIC.len()] != MAGIC {
        return Err(corrupt("missing .npy magic"));
    }
    let major = bytes[MAGIC.len()];
    let (header_start, header_len) = match major {
        1 => {
            let at = MAGIC.len() + 2;
            let raw = bytes.get(at..at + 2).ok_or_else(|| corrupt("truncated header"))?;
            (at + 2, u16::from_le_bytes([raw[0], raw[1]]) as usize)
        }
        2 | 3 => {
            let at = MAGIC.len() + 2;
            let raw = bytes.get(at..at + 4).ok_or_else(|| corrupt("truncated header"))?;
            (at + 4, u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) as usize)
        }
        other => return Err(corrupt(&format!("unsupported .npy version {}", other))),
    };

    let header_bytes = bytes
        .get(header_start..header_start + header_len)
        .ok_or_else(|| corrupt("truncated header"))?;
    let header = std::str::from_utf8(header_bytes).map_err(|_| corrupt("header is not text"))?;
    let payload = &bytes[header_start + header_len..];

    let descr = DESCR_RE
        .captures(header)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .ok_or_else(|| corrupt("header missing descr"))?;
    let fortran_order = FORTRAN_RE
        .captures(header)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str() == "True")
        .ok_or_else(|| corrupt("header missing fortran_order"))?;
    let shape = SHAPE_RE
        .captures(header)
        .and_then(|c| c.get(1))
        .ok_or_else(|| corrupt("header missing shape"))?
        .as_str()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<usize>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|_| corrupt("invalid shape"))?;

    let (rows, dim) = match shape.as_slice() {
        [rows, dim] => (*rows, *dim),
        _ => return Err(corrupt(&format!("expected a 2-d matrix, got shape {:?}", shape))),
    };
    let count = rows
        .checked_mul(dim)
        .ok_or_else(|| corrupt("shape overflows"))?;

    let values: Vec<f32> = match descr {
        "<f4" => read_values(payload, count, 4, path)?
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect(),
        "<f8" => read_values(payload, count, 8, path)?
            .chunks_exact(8)
            .map(|b| f64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]) as f32)
            .collect(),
        other => return Err(corrupt(&format!("unsupported dtype {}", other))),
    };

    let values = if fortran_order && rows > 1 && dim > 1 {
        let mut row_major = vec![0.0f32; count];
        for col in 0..dim {
            for row in 0..rows {
                row_major[row * dim + col] = values[col * rows + row];
            }
        }
        row_major
    } else {
        values
    };

    EmbeddingMatrix::new(rows, dim, values)
}

fn read_values<'a>(payload: &'a [u8], count: usize, width: usize, path: &Path) -> Result<&'a [u8]> {
    let needed = count
        .checked_mul(width)
        .ok_or_else(|| Error::corrupt(path, "shape overflows"))?;
    if payload.len() < needed {
        return Err(Error::corrupt(
            path,
            format!("payload holds {} bytes, expected {}", payload.len(), needed),
        ));
    }
    Ok(&payload[..needed])
}
