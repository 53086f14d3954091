//! Core error types for the xfer codecs

use crate::TypeTag;

/// Every failure a decode or encode routine can report.
///
/// All kinds are ordinary recoverable values. Registering the same type tag
/// twice is not represented here; it aborts bootstrap instead.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum XferError {
    #[error("Unexpected end of data: needed {needed} bytes, {remaining} remaining")]
    UnexpectedEof { needed: usize, remaining: usize },

    #[error("Unsupported {what} version {version} (max {max})")]
    UnsupportedVersion {
        what: &'static str,
        version: u16,
        max: u16,
    },

    #[error("Unknown type: {0}")]
    UnknownType(TypeTag),

    #[error("No type mapping for object type {0}")]
    NoObjectMapping(String),

    #[error("Short buffer: needed {needed} bytes, {available} available")]
    ShortBuffer { needed: usize, available: usize },

    #[error("Payload too large: {len} bytes (max {max})")]
    PayloadTooLarge { len: usize, max: usize },

    #[error("{field} is {len} bytes, field holds {max}")]
    TextTooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("Unsupported legacy object format (version {version}, sub-version {sub_version})")]
    UnsupportedLegacyFormat { version: u16, sub_version: u16 },

    #[error("Unknown frame opcode: {0}")]
    UnknownOpcode(u8),

    #[error("Nested objects exceed depth limit of {limit}")]
    NestingTooDeep { limit: usize },
}

impl XferError {
    /// Shorthand for a short read of `needed` bytes.
    #[inline]
    pub fn eof(needed: usize, remaining: usize) -> Self {
        XferError::UnexpectedEof { needed, remaining }
    }

    pub fn is_eof(&self) -> bool {
        matches!(self, XferError::UnexpectedEof { .. })
    }
}

pub type Result<T> = std::result::Result<T, XferError>;
