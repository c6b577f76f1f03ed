use thiserror::Error;

/// Errors from field element conversions.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FieldError {
    /// A byte encoding of the wrong length.
    #[error("expected {expected} bytes for a field element, got {got}")]
    InvalidLength {
        /// Encoding width of the field.
        expected: usize,
        /// Bytes given.
        got: usize,
    },
    /// Malformed hex text.
    #[error("invalid hex encoding: {0}")]
    InvalidHex(String),
}
