//! Dense Merkle trees over raw buffers.
//!
//! The free functions work on caller-owned buffers, following the layout in
//! [`crate::layout`]. [`DenseMerkleTree`] owns its buffers and is the usual
//! entry point for a prover.

mod construct;
mod path;


use std::collections::BTreeSet;

pub use construct::{
    BuildOptions, SegmentNodes, commit_in_place, construct_sub_tree, construct_tree,
    construct_tree_with, finish_tree, split_segments,
};
pub use path::{
    Path, get_path_to_block, get_paths_to_blocks, get_paths_to_blocks_in_place,
    verify_path_to_block, verify_path_to_block_in_tree,
};

use crate::{
    CommitmentError, Digest,
    error::Result,
    layout::{BLOCK_SIZE, DUAL_BLOCK_SIZE, TreeLayout},
    sparse::{SparseMerkleProof, SparseMerkleTree},
};

/// A committed buffer together with all of its tree nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DenseMerkleTree {
    layout: TreeLayout,
    data: Vec<u8>,
    nodes: Vec<u8>,
    root: Digest,
}

impl DenseMerkleTree {
    /// Commit to `src`, whose length must be a power of two of at least one
    /// dual block.
    pub fn build(src: &[u8]) -> Result<Self> {
        Self::build_with(src, &BuildOptions::default())
    }

    /// [`build`](Self::build) with explicit options.
    pub fn build_with(src: &[u8], options: &BuildOptions) -> Result<Self> {
        let layout = TreeLayout::for_buffer(src.len())?;
        let mut nodes = vec![0u8; layout.byte_len()];
        let root = construct_tree_with(src, layout.src_log_len(), &mut nodes, options)?;
        Ok(Self {
            layout,
            data: src.to_vec(),
            nodes,
            root,
        })
    }

    /// The commitment.
    pub fn root(&self) -> Digest {
        self.root
    }

    /// Index arithmetic of this tree.
    pub fn layout(&self) -> &TreeLayout {
        &self.layout
    }

    /// The committed bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// The node buffer, as filled by [`construct_tree`].
    pub fn nodes(&self) -> &[u8] {
        &self.nodes
    }

    /// Node `position` of `level` (0 = compressed dual blocks).
    pub fn node(&self, level: u32, position: usize) -> Result<Digest> {
        if level > self.layout.height() || position >= self.layout.nodes_at(level) {
            return Err(CommitmentError::IndexOutOfRange {
                index: position,
                bound: self.layout.nodes_at(level.min(self.layout.height())),
            });
        }
        let offset = self.layout.node_offset(level, position);
        Digest::from_slice(&self.nodes[offset..offset + BLOCK_SIZE])
    }

    /// Block `block_index` of the committed data.
    pub fn block(&self, block_index: usize) -> Result<Digest> {
        self.layout.check_block(block_index)?;
        let offset = block_index * BLOCK_SIZE;
        Digest::from_slice(&self.data[offset..offset + BLOCK_SIZE])
    }

    /// The dual block containing block `block_index`.
    pub fn dual_block(&self, block_index: usize) -> Result<&[u8; DUAL_BLOCK_SIZE]> {
        self.layout.check_block(block_index)?;
        let (pairs, _) = self.data.as_chunks::<DUAL_BLOCK_SIZE>();
        Ok(&pairs[block_index >> 1])
    }

    /// Authentication path of block `block_index`.
    pub fn path(&self, block_index: usize) -> Result<Path> {
        get_path_to_block(&self.nodes, self.layout.src_log_len(), block_index)
    }

    /// Authentication paths of several blocks, in input order.
    pub fn paths(&self, block_indices: &[usize]) -> Result<Vec<Path>> {
        block_indices.iter().map(|&idx| self.path(idx)).collect()
    }

    /// Sparse tree holding the paths of all `queried_indices`, without the
    /// nodes they let a verifier recompute.
    pub fn sparse_tree(&self, queried_indices: &BTreeSet<usize>) -> Result<SparseMerkleTree> {
        let mut tree = SparseMerkleTree::new(self.layout.src_log_len())?;
        let pairs: BTreeSet<usize> = queried_indices.iter().map(|idx| idx >> 1).collect();
        for &idx in queried_indices {
            self.layout.check_block(idx)?;
        }
        for pair in pairs {
            let first = 2 * pair;
            tree.add_path(
                &[self.block(first)?, self.block(first + 1)?],
                &self.path(first)?,
                pair,
            )?;
        }
        tree.prune_derivable()?;
        Ok(tree)
    }

    /// Proof opening `queried_indices` against [`root`](Self::root).
    pub fn open(&self, queried_indices: &BTreeSet<usize>) -> Result<SparseMerkleProof> {
        self.sparse_tree(queried_indices)?.to_proof(queried_indices)
    }
}
