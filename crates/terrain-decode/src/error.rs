//! Error types for decoding operations.

use std::fmt;

/// Errors that can occur while decoding a terrain tile payload.
///
/// Every variant describes a structural mismatch between the bytes and the
/// format; callers treat all of them as a corrupt payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Input buffer does not have the size the format requires.
    BufferTooSmall { expected: usize, actual: usize },
    /// Invalid data format or structure.
    InvalidFormat {
        context: &'static str,
        detail: String,
    },
    /// A read ran past the end of the buffer.
    UnexpectedEof {
        context: &'static str,
        offset: usize,
    },
    /// A vertex index refers past the end of the vertex arrays.
    IndexOutOfBounds {
        context: &'static str,
        index: u32,
        len: usize,
    },
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BufferTooSmall { expected, actual } => {
                write!(
                    f,
                    "buffer too small: expected {expected} bytes, got {actual}"
                )
            }
            Self::InvalidFormat { context, detail } => {
                write!(f, "invalid format in {context}: {detail}")
            }
            Self::UnexpectedEof { context, offset } => {
                write!(f, "unexpected end of buffer in {context} at offset {offset}")
            }
            Self::IndexOutOfBounds {
                context,
                index,
                len,
            } => {
                write!(
                    f,
                    "{context} index {index} out of bounds for {len} vertices"
                )
            }
        }
    }
}

impl std::error::Error for DecodeError {}

/// Result type for decoding operations.
pub type DecodeResult<T> = Result<T, DecodeError>;
