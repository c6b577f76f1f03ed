//! Merkle commitments over raw power-of-two buffers.
//!
//! Tree nodes are 16-byte digests produced by a Davies-Meyer compression
//! function built on [`cipher::FieldCipher`], a block cipher over
//! GF(2^128) = GF(2)[x] / (x^128 + x^7 + x^2 + x + 1).
//!
//! # Core types
//!
//! - [`construct_tree`], [`construct_sub_tree`], [`finish_tree`]: fill a
//!   tree over caller-owned buffers, optionally segment by segment;
//!   [`split_segments`] hands out the disjoint per-segment node views.
//! - [`get_path_to_block`], [`get_paths_to_blocks`],
//!   [`verify_path_to_block`]: authentication paths.
//! - [`DenseMerkleTree`]: an owning wrapper for provers.
//! - [`SparseMerkleTree`] and [`SparseMerkleProof`]: merged paths for many
//!   blocks, serialized without redundant nodes.
//!
//! # Features
//!
//! - `parallel` (default): build tree segments on the rayon thread pool.

#![warn(missing_docs)]

pub mod cipher;
mod dense;
mod digest;
mod error;
pub mod hash;
pub mod layout;
mod sparse;


pub use dense::{
    BuildOptions, DenseMerkleTree, Path, SegmentNodes, commit_in_place, construct_sub_tree,
    construct_tree, construct_tree_with, finish_tree, get_path_to_block, get_paths_to_blocks,
    get_paths_to_blocks_in_place, split_segments, verify_path_to_block,
    verify_path_to_block_in_tree,
};
pub use digest::{DIGEST_SIZE, Digest};
pub use error::{CommitmentError, Result};
pub use sparse::{NodeId, SparseMerkleLayer, SparseMerkleProof, SparseMerkleTree};
