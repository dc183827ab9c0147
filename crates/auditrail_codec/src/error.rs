//! Error types for the codec crate.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur while encoding or decoding an audit record.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The record's format version is not the supported constant.
    #[error("unsupported audit record version: {version}")]
    UnsupportedVersion {
        /// The version value found on the wire.
        version: u64,
    },

    /// The record kind is not one of the two known literals.
    #[error("unknown audit record kind: {kind}")]
    UnknownKind {
        /// The kind literal found on the wire.
        kind: String,
    },

    /// The client address bytes do not form a valid IP address.
    #[error("Corrupt client address: {len} bytes is not an IP address")]
    CorruptClientAddress {
        /// Number of address bytes found on the wire.
        len: usize,
    },

    /// The status string is not a recognized status name.
    #[error("Corrupt status: {status}")]
    CorruptStatus {
        /// The status literal found on the wire.
        status: String,
    },

    /// A decoder instance was used for a second decode.
    #[error("decoder already consumed; create a new decoder per record")]
    AlreadyConsumed,

    /// A field appeared out of the fixed field order.
    #[error("unexpected field: expected {expected:?}, found {found:?}")]
    UnexpectedField {
        /// The field name required at this position.
        expected: &'static str,
        /// The field name actually read.
        found: String,
    },

    /// Unexpected end of input.
    #[error("unexpected end of input")]
    UnexpectedEof,

    /// Invalid UTF-8 string.
    #[error("invalid UTF-8 string")]
    InvalidUtf8,

    /// Integer value out of the representable range.
    #[error("integer overflow")]
    IntegerOverflow,

    /// Malformed CBOR structure.
    #[error("invalid CBOR structure: {message}")]
    InvalidStructure {
        /// Description of the structural error.
        message: String,
    },
}

impl CodecError {
    /// Create an invalid structure error.
    pub fn invalid_structure(message: impl Into<String>) -> Self {
        Self::InvalidStructure {
            message: message.into(),
        }
    }
}
