use thiserror::Error;

/// Errors produced while decoding, rewriting, or re-encoding a SPIR-V module.
///
/// Every failure is reported before any caller-visible mutation happens: a
/// pass either returns a fully rewritten module or leaves its input untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransformError {
    /// The input buffer is not a well-formed SPIR-V module.
    #[error("malformed SPIR-V module at word {word_index}: {message}")]
    MalformedModule {
        /// Offset, in 32-bit words from the start of the buffer, of the
        /// instruction (or header field) that failed validation.
        word_index: usize,
        /// What failed validation there.
        message: String,
    },

    /// The module is well-formed but uses a combined-image-sampler or
    /// depth-reference pattern this pass does not know how to rewrite.
    #[error("unsupported construct at instruction {instruction_index}: {message}")]
    UnsupportedConstruct {
        /// Index of the offending instruction in the decoded instruction list.
        instruction_index: usize,
        /// What the pass cannot rewrite about it.
        message: String,
    },

    /// A fresh result id could not be allocated without overflowing the
    /// 32-bit id space.
    #[error("id space exhausted: cannot allocate a fresh result id beyond bound {bound}")]
    IdSpaceExhausted {
        /// The id bound at which allocation failed.
        bound: u32,
    },
}

impl TransformError {
    pub(crate) fn malformed(word_index: usize, message: impl Into<String>) -> Self {
        TransformError::MalformedModule {
            word_index,
            message: message.into(),
        }
    }

    pub(crate) fn unsupported(instruction_index: usize, message: impl Into<String>) -> Self {
        TransformError::UnsupportedConstruct {
            instruction_index,
            message: message.into(),
        }
    }
}
