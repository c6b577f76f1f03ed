use thiserror::Error;

use crate::layout::{MAX_LOG_LEN, MIN_LOG_LEN};

/// Errors from commitment construction, path handling and sparse proofs.
///
/// A path or proof that is well formed but does not match the root is not an
/// error: the verifying operations return `Ok(false)` for it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommitmentError {
    /// `log2` of a buffer length outside the supported range.
    #[error("log length {0} is out of range ({min}..={max})", min = MIN_LOG_LEN, max = MAX_LOG_LEN)]
    LogLengthOutOfRange(u32),
    /// A source buffer that is not exactly `2^log_len` bytes.
    #[error("buffer of {len} bytes is not 2^{log_len} bytes")]
    InvalidBufferLength {
        /// Actual length.
        len: usize,
        /// Expected `log2` of the length.
        log_len: u32,
    },
    /// A buffer whose length cannot be committed to.
    #[error("buffer length {0} is not a power of two of at least two blocks")]
    NotPowerOfTwo(usize),
    /// A destination buffer that cannot hold every node.
    #[error("buffer too small: need {needed} bytes, got {got}")]
    BufferTooSmall {
        /// Required length.
        needed: usize,
        /// Actual length.
        got: usize,
    },
    /// A segment size that does not fit the tree.
    #[error("invalid segment: {0}")]
    InvalidSegment(String),
    /// A block, node or segment index past the end.
    #[error("index {index} out of range (bound {bound})")]
    IndexOutOfRange {
        /// The index given.
        index: usize,
        /// Exclusive upper bound.
        bound: usize,
    },
    /// A path whose length is not the tree height.
    #[error("path has {got} entries, expected {expected}")]
    InvalidPathLength {
        /// The tree height.
        expected: usize,
        /// Entries in the path.
        got: usize,
    },
    /// A path too short to reach the position of the block.
    #[error("path of {len} entries is too short for block {index}")]
    PathTooShort {
        /// The block index.
        index: usize,
        /// Entries in the path.
        len: usize,
    },
    /// A digest of the wrong byte length.
    #[error("digest must be 16 bytes, got {0}")]
    InvalidDigestLength(usize),
    /// Malformed hex text.
    #[error("invalid hex: {0}")]
    InvalidHex(String),
    /// A node needed to reach the root was never supplied.
    #[error("incomplete proof: missing node {index} in layer {layer}")]
    IncompleteProof {
        /// Layer of the missing node.
        layer: usize,
        /// Position within the layer.
        index: usize,
    },
    /// Two different digests for the same node.
    #[error("conflicting digest for node {index} in layer {layer}")]
    ConflictingNode {
        /// Layer of the node.
        layer: usize,
        /// Position within the layer.
        index: usize,
    },
    /// A serialized proof with the wrong number of digests.
    #[error("proof shape mismatch: expected {expected} digests, got {got}")]
    InvalidProofShape {
        /// Digests the queried indices imply.
        expected: usize,
        /// Digests present.
        got: usize,
    },
    /// A proof that fails to encode or decode.
    #[error("invalid proof: {0}")]
    InvalidProof(String),
}

impl CommitmentError {
    /// Whether the error means a proof lacks data, as opposed to a proof that
    /// was computed and found wrong or a misuse of the API.
    pub fn is_incomplete_proof(&self) -> bool {
        matches!(self, Self::IncompleteProof { .. })
    }
}

/// Alias for `core::result::Result<T, CommitmentError>`.
pub type Result<T> = core::result::Result<T, CommitmentError>;
