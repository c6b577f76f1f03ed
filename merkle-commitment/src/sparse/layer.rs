use std::collections::{BTreeMap, BTreeSet, btree_map::Entry};

use crate::{CommitmentError, Digest, error::Result, hash::hash_pair};

/// The known nodes of one tree layer, keyed by position within the layer.
///
/// Inserting is write-once: re-inserting an equal digest is a no-op and a
/// different digest is rejected, so a node received from one source can never
/// be replaced by another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SparseMerkleLayer {
    layer: usize,
    data: BTreeMap<usize, Digest>,
}

impl SparseMerkleLayer {
    /// An empty layer at depth `layer` (0 = leaves).
    pub fn new(layer: usize) -> Self {
        Self {
            layer,
            data: BTreeMap::new(),
        }
    }

    /// Depth of this layer.
    pub fn layer(&self) -> usize {
        self.layer
    }

    /// Number of known nodes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether no node is known.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Whether node `idx` is known.
    pub fn has_element(&self, idx: usize) -> bool {
        self.data.contains_key(&idx)
    }

    /// Insert node `idx`.
    pub fn add_entry(&mut self, idx: usize, digest: Digest) -> Result<()> {
        match self.data.entry(idx) {
            Entry::Vacant(entry) => {
                entry.insert(digest);
                Ok(())
            }
            Entry::Occupied(entry) if *entry.get() == digest => Ok(()),
            Entry::Occupied(_) => Err(CommitmentError::ConflictingNode {
                layer: self.layer,
                index: idx,
            }),
        }
    }

    /// Remove node `idx`, returning its digest.
    pub fn delete_entry(&mut self, idx: usize) -> Option<Digest> {
        self.data.remove(&idx)
    }

    /// Digest of node `idx`.
    pub fn read_data(&self, idx: usize) -> Option<&Digest> {
        self.data.get(&idx)
    }

    /// Hash the pair `(2 * pair_idx, 2 * pair_idx + 1)` into its parent.
    pub fn hash_pair(&self, pair_idx: usize) -> Result<Digest> {
        let node = |idx: usize| {
            self.read_data(idx)
                .ok_or(CommitmentError::IncompleteProof {
                    layer: self.layer,
                    index: idx,
                })
        };
        Ok(hash_pair(node(2 * pair_idx)?, node(2 * pair_idx + 1)?))
    }

    /// The layer above, holding `received` plus the parent of every pair of
    /// this layer.
    ///
    /// Every known node must have its sibling known as well.
    pub fn calculate_next_layer(&self, received: &SparseMerkleLayer) -> Result<SparseMerkleLayer> {
        debug_assert_eq!(received.layer, self.layer + 1);
        let mut next = received.clone();
        let mut last_pair = None;
        for pair in self.data.keys().map(|idx| idx >> 1) {
            if last_pair == Some(pair) {
                continue;
            }
            last_pair = Some(pair);
            next.add_entry(pair, self.hash_pair(pair)?)?;
        }
        Ok(next)
    }

    /// Digests in ascending index order.
    pub fn to_vector(&self) -> Vec<Digest> {
        self.data.values().copied().collect()
    }

    /// Indices of the known nodes.
    pub fn get_indices(&self) -> BTreeSet<usize> {
        self.data.keys().copied().collect()
    }

    /// `(index, digest)` pairs in ascending index order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Digest)> + '_ {
        self.data.iter().map(|(idx, digest)| (*idx, digest))
    }
}
