//! Wire form of a sparse tree.
//!
//! Only the queried block indices and the flat digest list travel; which
//! node each digest belongs to follows from the indices through
//! [`SparseMerkleTree::get_serialization_mapping`].

use std::collections::BTreeSet;

use bincode::{Decode, Encode};

use crate::{CommitmentError, Digest, error::Result, sparse::SparseMerkleTree};

/// Upper bound on an encoded proof accepted by
/// [`SparseMerkleProof::decode_from_slice`].
const MAX_ENCODED_PROOF_BYTES: usize = 100 * 1024 * 1024;

/// A serialized sparse tree for a set of queried blocks.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct SparseMerkleProof {
    /// Block indices the proof opens.
    pub queried_indices: BTreeSet<usize>,
    /// Non-derivable nodes in serialization order.
    pub nodes: Vec<Digest>,
}

impl SparseMerkleProof {
    /// Rebuild the sparse tree for a `2^src_log_len` byte buffer.
    pub fn to_tree(&self, src_log_len: u32) -> Result<SparseMerkleTree> {
        SparseMerkleTree::from_serialized(src_log_len, &self.queried_indices, &self.nodes)
    }

    /// Check the proof against `root`.
    ///
    /// `Ok(false)` if the proof is complete but hashes to another root.
    pub fn verify(&self, src_log_len: u32, root: &Digest) -> Result<bool> {
        self.to_tree(src_log_len)?.verify_root(root)
    }

    /// The queried blocks, if the proof verifies against `root`.
    pub fn verified_blocks(&self, src_log_len: u32, root: &Digest) -> Result<Option<Vec<Digest>>> {
        let tree = self.to_tree(src_log_len)?;
        if !tree.verify_root(root)? {
            return Ok(None);
        }
        self.queried_indices
            .iter()
            .map(|&idx| {
                tree.read_data(idx)
                    .copied()
                    .ok_or(CommitmentError::IncompleteProof {
                        layer: 0,
                        index: idx,
                    })
            })
            .collect::<Result<Vec<_>>>()
            .map(Some)
    }

    /// Encode to bytes using bincode.
    pub fn encode_to_vec(&self) -> Result<Vec<u8>> {
        let config = bincode::config::standard()
            .with_big_endian()
            .with_no_limit();
        bincode::encode_to_vec(self, config)
            .map_err(|e| CommitmentError::InvalidProof(format!("encode error: {}", e)))
    }

    /// Decode from bytes using bincode.
    pub fn decode_from_slice(bytes: &[u8]) -> Result<Self> {
        let config = bincode::config::standard()
            .with_big_endian()
            .with_limit::<MAX_ENCODED_PROOF_BYTES>();
        let (proof, read): (Self, _) = bincode::decode_from_slice(bytes, config)
            .map_err(|e| CommitmentError::InvalidProof(format!("decode error: {}", e)))?;
        if read != bytes.len() {
            return Err(CommitmentError::InvalidProof(format!(
                "{} trailing bytes after proof",
                bytes.len() - read
            )));
        }
        Ok(proof)
    }
}
