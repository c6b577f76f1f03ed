//! Sparse Merkle trees for batch verification.
//!
//! A verifier that checks many blocks against one root needs far fewer nodes
//! than the sum of the individual paths: ancestors are shared and a sibling
//! that lies on another queried path can be recomputed instead of sent.
//! [`SparseMerkleTree`] merges paths into layered maps and serializes only
//! what cannot be recomputed.

mod layer;
mod proof;
mod tree;

#[cfg(test)]
mod tests;

pub use layer::SparseMerkleLayer;
pub use proof::SparseMerkleProof;
pub use tree::{NodeId, SparseMerkleTree};
