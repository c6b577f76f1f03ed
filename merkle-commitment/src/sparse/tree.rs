use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::{
    CommitmentError, Digest,
    error::Result,
    hash::hash_pair,
    layout::{LOG_BYTES_PER_HASH, TreeLayout},
    sparse::{SparseMerkleLayer, SparseMerkleProof},
};

/// Position of a node in a [`SparseMerkleTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId {
    /// Layer, 0 for blocks.
    pub layer: usize,
    /// Position within the layer.
    pub index: usize,
}

/// The part of a tree needed to tie a set of queried blocks to the root.
///
/// Layer 0 holds 16-byte blocks of the committed buffer and layer `k` holds
/// level `k - 1` of the dense tree; the last layer is the root. Nodes arrive
/// either as authentication paths ([`add_path`](Self::add_path)) or as a
/// serialized proof ([`de_serialize`](Self::de_serialize)); nodes shared by
/// several paths are stored once.
///
/// Insertion expects a single writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SparseMerkleTree {
    layers: Vec<SparseMerkleLayer>,
}

impl SparseMerkleTree {
    /// An empty tree for a buffer of `2^src_log_len` bytes.
    pub fn new(src_log_len: u32) -> Result<Self> {
        TreeLayout::new(src_log_len)?;
        let height = (src_log_len - LOG_BYTES_PER_HASH) as usize;
        Ok(Self {
            layers: (0..=height).map(SparseMerkleLayer::new).collect(),
        })
    }

    /// A tree populated from a serialized proof.
    pub fn from_serialized(
        src_log_len: u32,
        queried_indices: &BTreeSet<usize>,
        serialized: &[Digest],
    ) -> Result<Self> {
        let mut tree = Self::new(src_log_len)?;
        tree.de_serialize(queried_indices, serialized)?;
        Ok(tree)
    }

    /// Index of the root layer.
    pub fn height(&self) -> usize {
        self.layers.len() - 1
    }

    /// Number of blocks in layer 0.
    pub fn block_count(&self) -> usize {
        1 << self.height()
    }

    /// Layer `layer`, if it exists.
    pub fn layer(&self, layer: usize) -> Option<&SparseMerkleLayer> {
        self.layers.get(layer)
    }

    /// Mutable access to layer `layer`, for inserting or pruning single
    /// nodes.
    pub fn layer_mut(&mut self, layer: usize) -> Option<&mut SparseMerkleLayer> {
        self.layers.get_mut(layer)
    }

    /// Insert the nodes listed by the serialization mapping of
    /// `queried_indices`, in order, from `serialized`.
    pub fn de_serialize(
        &mut self,
        queried_indices: &BTreeSet<usize>,
        serialized: &[Digest],
    ) -> Result<()> {
        let mapping = self.get_serialization_mapping(queried_indices)?;
        if mapping.len() != serialized.len() {
            return Err(CommitmentError::InvalidProofShape {
                expected: mapping.len(),
                got: serialized.len(),
            });
        }
        for (node, digest) in mapping.into_iter().zip(serialized) {
            self.layers[node.layer].add_entry(node.index, *digest)?;
        }
        Ok(())
    }

    /// Add the authentication path of dual block `pair_idx`.
    ///
    /// `data` are the two blocks of the pair, `path` its sibling digests from
    /// the pair's level upward.
    pub fn add_path(&mut self, data: &[Digest; 2], path: &[Digest], pair_idx: usize) -> Result<()> {
        let expected = self.height() - 1;
        if path.len() != expected {
            return Err(CommitmentError::InvalidPathLength {
                expected,
                got: path.len(),
            });
        }
        let pair_count = self.block_count() / 2;
        if pair_idx >= pair_count {
            return Err(CommitmentError::IndexOutOfRange {
                index: pair_idx,
                bound: pair_count,
            });
        }

        self.layers[0].add_entry(2 * pair_idx, data[0])?;
        self.layers[0].add_entry(2 * pair_idx + 1, data[1])?;
        let mut idx = pair_idx;
        for (layer, sibling) in self.layers[1..].iter_mut().zip(path) {
            layer.add_entry(idx ^ 1, *sibling)?;
            idx >>= 1;
        }
        Ok(())
    }

    /// Recompute the root from the stored nodes.
    ///
    /// Fails with [`CommitmentError::IncompleteProof`] if some node needed on
    /// the way up was never supplied, and with
    /// [`CommitmentError::ConflictingNode`] if a computed node disagrees with
    /// a supplied one.
    pub fn calculate_root(&self) -> Result<Digest> {
        let (leaves, upper) = self
            .layers
            .split_first()
            .ok_or(CommitmentError::IncompleteProof { layer: 0, index: 0 })?;
        if leaves.is_empty() {
            return Err(CommitmentError::IncompleteProof { layer: 0, index: 0 });
        }
        debug!(blocks = leaves.len(), height = self.height(), "calculating sparse root");

        let mut current = leaves.clone();
        for received in upper {
            current = current.calculate_next_layer(received)?;
        }
        current.read_data(0).copied().ok_or(CommitmentError::IncompleteProof {
            layer: self.height(),
            index: 0,
        })
    }

    /// Drop every stored node that the layers below determine.
    ///
    /// Paths added with [`add_path`](Self::add_path) carry siblings that other
    /// queried paths also produce; after pruning, the tree holds exactly the
    /// nodes [`to_vector`](Self::to_vector) emits, which is also what
    /// [`de_serialize`](Self::de_serialize) rebuilds. Each dropped node is
    /// compared with its recomputed digest first, and a mismatch is reported
    /// as [`CommitmentError::ConflictingNode`] with nothing removed.
    pub fn prune_derivable(&mut self) -> Result<()> {
        let mut derivable = Vec::new();
        let mut known: BTreeMap<usize, Digest> =
            self.layers[0].iter().map(|(idx, digest)| (idx, *digest)).collect();
        for (layer, stored) in self.layers.iter().enumerate().skip(1) {
            let mut next = BTreeMap::new();
            for (&idx, left) in known.iter().filter(|(idx, _)| *idx & 1 == 0) {
                let Some(right) = known.get(&(idx | 1)) else {
                    continue;
                };
                let parent = hash_pair(left, right);
                match stored.read_data(idx >> 1) {
                    Some(digest) if *digest != parent => {
                        return Err(CommitmentError::ConflictingNode {
                            layer,
                            index: idx >> 1,
                        });
                    }
                    Some(_) => derivable.push(NodeId {
                        layer,
                        index: idx >> 1,
                    }),
                    None => {}
                }
                next.insert(idx >> 1, parent);
            }
            next.extend(stored.iter().map(|(idx, digest)| (idx, *digest)));
            known = next;
        }

        for node in derivable {
            self.layers[node.layer].delete_entry(node.index);
        }
        Ok(())
    }

    /// `Ok(true)` if the stored nodes hash up to `root`, `Ok(false)` if they
    /// hash to something else, and an error if they cannot be hashed up at
    /// all.
    pub fn verify_root(&self, root: &Digest) -> Result<bool> {
        Ok(self.calculate_root()? == *root)
    }

    /// Whether block `idx` is known.
    pub fn has_data(&self, idx: usize) -> bool {
        self.layers[0].has_element(idx)
    }

    /// Block `idx`, if known.
    pub fn read_data(&self, idx: usize) -> Option<&Digest> {
        self.layers[0].read_data(idx)
    }

    /// The stored nodes that cannot be derived from the layers below, in
    /// `(layer, index)` order.
    ///
    /// For a tree built from the paths of some queried blocks this is the
    /// layout of [`get_serialization_mapping`](Self::get_serialization_mapping)
    /// for those blocks. After [`prune_derivable`](Self::prune_derivable) it
    /// is every stored node.
    pub fn to_vector(&self) -> Vec<Digest> {
        let mut out = Vec::new();
        let mut available = BTreeSet::new();
        for layer in &self.layers {
            let derivable: BTreeSet<usize> = available
                .iter()
                .filter(|&&idx| idx & 1 == 0 && available.contains(&(idx | 1)))
                .map(|idx| idx >> 1)
                .collect();
            out.extend(
                layer
                    .iter()
                    .filter(|(idx, _)| !derivable.contains(idx))
                    .map(|(_, digest)| *digest),
            );
            available = derivable;
            available.extend(layer.get_indices());
        }
        out
    }

    /// Nodes a serialization for `queried_indices` carries, in order.
    ///
    /// Layer 0 carries both blocks of every touched pair. Every higher layer
    /// carries the siblings of the nodes on the queried blocks' paths that
    /// are not on a queried path themselves. The root is never carried.
    pub fn get_serialization_mapping(
        &self,
        queried_indices: &BTreeSet<usize>,
    ) -> Result<Vec<NodeId>> {
        if let Some(&idx) = queried_indices.range(self.block_count()..).next() {
            return Err(CommitmentError::IndexOutOfRange {
                index: idx,
                bound: self.block_count(),
            });
        }

        let mut current: BTreeSet<usize> = queried_indices.iter().map(|idx| idx >> 1).collect();
        let mut mapping: Vec<NodeId> = current
            .iter()
            .flat_map(|&pair| {
                [2 * pair, 2 * pair + 1].map(|index| NodeId { layer: 0, index })
            })
            .collect();
        for layer in 1..self.height() {
            mapping.extend(
                current
                    .iter()
                    .filter(|&&idx| !current.contains(&(idx ^ 1)))
                    .map(|&idx| NodeId {
                        layer,
                        index: idx ^ 1,
                    }),
            );
            current = current.iter().map(|idx| idx >> 1).collect();
        }
        Ok(mapping)
    }

    /// `(layer, count)` summary of
    /// [`get_serialization_mapping`](Self::get_serialization_mapping), for
    /// layers that carry anything.
    pub fn serialization_shape(
        &self,
        queried_indices: &BTreeSet<usize>,
    ) -> Result<Vec<(usize, usize)>> {
        let mut shape: Vec<(usize, usize)> = Vec::new();
        for node in self.get_serialization_mapping(queried_indices)? {
            match shape.last_mut() {
                Some((layer, count)) if *layer == node.layer => *count += 1,
                _ => shape.push((node.layer, 1)),
            }
        }
        Ok(shape)
    }

    /// Serialize into a proof for `queried_indices`.
    ///
    /// Fails if the stored nodes do not have the shape the queried set
    /// implies, e.g. because paths for other blocks were added.
    pub fn to_proof(&self, queried_indices: &BTreeSet<usize>) -> Result<SparseMerkleProof> {
        let expected = self.get_serialization_mapping(queried_indices)?.len();
        let nodes = self.to_vector();
        if nodes.len() != expected {
            return Err(CommitmentError::InvalidProofShape {
                expected,
                got: nodes.len(),
            });
        }
        Ok(SparseMerkleProof {
            queried_indices: queried_indices.clone(),
            nodes,
        })
    }
}
