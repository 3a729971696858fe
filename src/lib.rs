//! Binary SPIR-V rewrite passes that split bindings strict pipeline layouts
//! cannot express.
//!
//! Two passes operate directly on the word stream of **untrusted** modules,
//! without panicking or reading out of bounds:
//!
//! - [`split_combined_image_samplers`]: each combined image-sampler binding
//!   becomes a bare image binding (keeping the original set/binding) plus a
//!   synthesized sampler binding; sampling sites are rewritten to recombine
//!   the two, so downstream instructions are untouched.
//! - [`split_depth_reference_textures`]: textures used in depth-comparison
//!   samples but not declared depth-marked are retyped, and textures sampled
//!   both ways are duplicated into a depth-marked twin at a fresh binding.
//!
//! Both report what they did as a [`CorrectionMap`] from original
//! `(set, binding)` to replacement bindings and roles, which is what a caller
//! needs to patch its descriptor-set layouts. A module needing no rewrite is
//! passed through byte-identical.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod corrections;
mod error;
mod module;
mod op;
mod split_combined;
mod split_dref;

/// Helpers for assembling synthetic SPIR-V modules in tests.
///
/// This module is only available when compiling this crate's own tests, or
/// when the `test-utils` feature is enabled. It is **not** part of the stable
/// rewriting API.
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

#[cfg(test)]
mod tests_module;
#[cfg(test)]
mod tests_split_dref;

pub use crate::corrections::{BindingLocation, BindingRole, Correction, CorrectionMap};
pub use crate::error::TransformError;
pub use crate::split_combined::split_combined_image_samplers;
pub use crate::split_dref::split_depth_reference_textures;

/// Result of a successful pass: the rewritten module and its binding
/// corrections.
///
/// `words` is a fresh buffer even in the pass-through case; `corrections` is
/// independent of it and can outlive it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitOutput {
    /// The rewritten module, header included.
    pub words: Vec<u32>,
    /// Binding relocations keyed by the original `(set, binding)`.
    pub corrections: CorrectionMap,
}

/// Reinterprets a little-endian byte buffer as SPIR-V words.
///
/// The physical encoding of SPIR-V on disk and over FFI boundaries is a byte
/// stream; the passes work on words. Fails if the length is not a multiple
/// of four.
pub fn words_from_bytes(bytes: &[u8]) -> Result<Vec<u32>, TransformError> {
    if bytes.len() % 4 != 0 {
        return Err(TransformError::malformed(
            bytes.len() / 4,
            format!("byte length {} is not a multiple of 4", bytes.len()),
        ));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

/// Serializes SPIR-V words back to little-endian bytes.
pub fn bytes_from_words(words: &[u32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(words.len() * 4);
    for word in words {
        out.extend_from_slice(&word.to_le_bytes());
    }
    out
}
