use std::collections::BTreeSet;

use assert_matches::assert_matches;
use proptest::prelude::*;
use rand::{Rng, SeedableRng, rngs::StdRng, seq::SliceRandom};

use super::*;
use crate::{CommitmentError, Digest, DenseMerkleTree, hash::hash_pair};

fn random_tree(src_log_len: u32, seed: u64) -> DenseMerkleTree {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut src = vec![0u8; 1 << src_log_len];
    rng.fill(&mut src[..]);
    DenseMerkleTree::build(&src).expect("build")
}

fn set(indices: &[usize]) -> BTreeSet<usize> {
    indices.iter().copied().collect()
}

fn flip(digest: Digest) -> Digest {
    let mut bytes = digest.into_bytes();
    bytes[0] ^= 1;
    Digest::new(bytes)
}

fn node(layer: usize, index: usize) -> NodeId {
    NodeId { layer, index }
}

/// Add the path of the dual block holding `block` to `sparse`.
fn add_block(sparse: &mut SparseMerkleTree, dense: &DenseMerkleTree, block: usize) {
    let first = block & !1;
    let data = [dense.block(first).unwrap(), dense.block(first + 1).unwrap()];
    sparse
        .add_path(&data, &dense.path(block).unwrap(), block >> 1)
        .expect("add path");
}

// ── SparseMerkleLayer ────────────────────────────────────────────────

#[test]
fn test_layer_entries_are_write_once() {
    let mut layer = SparseMerkleLayer::new(3);
    assert!(layer.is_empty());
    layer.add_entry(4, Digest::new([1; 16])).expect("insert");
    layer.add_entry(4, Digest::new([1; 16])).expect("same digest again");
    assert_matches!(
        layer.add_entry(4, Digest::new([2; 16])),
        Err(CommitmentError::ConflictingNode { layer: 3, index: 4 })
    );
    assert_eq!(layer.read_data(4), Some(&Digest::new([1; 16])));
    assert_eq!(layer.len(), 1);

    assert_eq!(layer.delete_entry(4), Some(Digest::new([1; 16])));
    assert_eq!(layer.delete_entry(4), None);
    layer.add_entry(4, Digest::new([2; 16])).expect("insert after delete");
}

#[test]
fn test_layer_iterates_in_index_order() {
    let mut layer = SparseMerkleLayer::new(0);
    for idx in [9, 2, 5] {
        layer.add_entry(idx, Digest::new([idx as u8; 16])).unwrap();
    }
    assert_eq!(layer.get_indices(), set(&[2, 5, 9]));
    assert_eq!(
        layer.to_vector(),
        vec![Digest::new([2; 16]), Digest::new([5; 16]), Digest::new([9; 16])]
    );
    let indices: Vec<usize> = layer.iter().map(|(idx, _)| idx).collect();
    assert_eq!(indices, vec![2, 5, 9]);
    assert!(layer.has_element(5));
    assert!(!layer.has_element(6));
}

#[test]
fn test_layer_hash_pair() {
    let mut layer = SparseMerkleLayer::new(1);
    let (left, right) = (Digest::new([7; 16]), Digest::new([8; 16]));
    layer.add_entry(4, left).unwrap();
    assert_matches!(
        layer.hash_pair(2),
        Err(CommitmentError::IncompleteProof { layer: 1, index: 5 })
    );
    layer.add_entry(5, right).unwrap();
    assert_eq!(layer.hash_pair(2).unwrap(), hash_pair(&left, &right));
}

#[test]
fn test_next_layer_merges_received_nodes() {
    let mut layer = SparseMerkleLayer::new(0);
    for idx in 0..4 {
        layer.add_entry(idx, Digest::new([idx as u8; 16])).unwrap();
    }
    let mut received = SparseMerkleLayer::new(1);
    received.add_entry(3, Digest::new([0xff; 16])).unwrap();

    let next = layer.calculate_next_layer(&received).expect("next layer");
    assert_eq!(next.layer(), 1);
    assert_eq!(next.get_indices(), set(&[0, 1, 3]));
    assert_eq!(next.read_data(1), Some(&layer.hash_pair(1).unwrap()));

    received.add_entry(0, Digest::new([0xee; 16])).unwrap();
    assert_matches!(
        layer.calculate_next_layer(&received),
        Err(CommitmentError::ConflictingNode { layer: 1, index: 0 })
    );
}

// ── SparseMerkleTree ─────────────────────────────────────────────────

#[test]
fn test_new_tree_shape() {
    let tree = SparseMerkleTree::new(7).expect("new");
    assert_eq!(tree.height(), 3);
    assert_eq!(tree.block_count(), 8);
    assert!(tree.layer(3).is_some());
    assert!(tree.layer(4).is_none());
    assert_matches!(SparseMerkleTree::new(4), Err(CommitmentError::LogLengthOutOfRange(4)));
}

#[test]
fn test_merged_paths_reach_root() {
    let dense = random_tree(8, 1);
    let mut sparse = SparseMerkleTree::new(8).unwrap();
    for block in [0, 3, 11] {
        add_block(&mut sparse, &dense, block);
        assert_eq!(sparse.calculate_root().expect("root"), dense.root());
    }
    assert!(sparse.verify_root(&dense.root()).unwrap());
    assert!(!sparse.verify_root(&flip(dense.root())).unwrap());
}

#[test]
fn test_single_dual_block_tree() {
    let dense = random_tree(5, 2);
    let mut sparse = SparseMerkleTree::new(5).unwrap();
    add_block(&mut sparse, &dense, 1);
    assert_eq!(sparse.calculate_root().unwrap(), dense.root());
    assert_eq!(sparse.get_serialization_mapping(&set(&[1])).unwrap(), vec![
        node(0, 0),
        node(0, 1)
    ]);
}

#[test]
fn test_add_path_is_idempotent() {
    let dense = random_tree(7, 3);
    let mut sparse = SparseMerkleTree::new(7).unwrap();
    add_block(&mut sparse, &dense, 5);
    let before = sparse.clone();
    add_block(&mut sparse, &dense, 5);
    add_block(&mut sparse, &dense, 4);
    assert_eq!(sparse, before);
}

#[test]
fn test_add_path_rejects_conflicting_paths() {
    let dense = random_tree(7, 4);
    let mut sparse = SparseMerkleTree::new(7).unwrap();
    add_block(&mut sparse, &dense, 0);

    let mut path = dense.path(2).unwrap();
    path[1] = flip(path[1]);
    let data = [dense.block(2).unwrap(), dense.block(3).unwrap()];
    assert_matches!(
        sparse.add_path(&data, &path, 1),
        Err(CommitmentError::ConflictingNode { layer: 2, index: 1 })
    );
}

#[test]
fn test_add_path_argument_errors() {
    let dense = random_tree(7, 5);
    let mut sparse = SparseMerkleTree::new(7).unwrap();
    let data = [dense.block(0).unwrap(), dense.block(1).unwrap()];
    let path = dense.path(0).unwrap();
    assert_matches!(
        sparse.add_path(&data, &path[..1], 0),
        Err(CommitmentError::InvalidPathLength { expected: 2, got: 1 })
    );
    assert_matches!(
        sparse.add_path(&data, &path, 4),
        Err(CommitmentError::IndexOutOfRange { index: 4, bound: 4 })
    );
    assert!(sparse.layer(0).unwrap().is_empty());
}

#[test]
fn test_computed_node_conflicting_with_received_node() {
    let dense = random_tree(7, 6);
    let mut sparse = SparseMerkleTree::new(7).unwrap();

    // pair 0 claims a wrong digest for pair 1, then pair 1 arrives intact
    let mut path = dense.path(0).unwrap();
    path[0] = flip(path[0]);
    let data = [dense.block(0).unwrap(), dense.block(1).unwrap()];
    sparse.add_path(&data, &path, 0).expect("structurally fine");
    add_block(&mut sparse, &dense, 2);

    assert_matches!(
        sparse.calculate_root(),
        Err(CommitmentError::ConflictingNode { layer: 1, index: 1 })
    );
}

#[test]
fn test_missing_nodes_are_reported() {
    let empty = SparseMerkleTree::new(7).unwrap();
    let err = empty.calculate_root().unwrap_err();
    assert!(err.is_incomplete_proof());
    assert_matches!(err, CommitmentError::IncompleteProof { layer: 0, .. });

    let dense = random_tree(7, 7);
    let mut sparse = SparseMerkleTree::new(7).unwrap();
    add_block(&mut sparse, &dense, 0);
    sparse.layer_mut(2).unwrap().delete_entry(1);
    assert_matches!(
        sparse.calculate_root(),
        Err(CommitmentError::IncompleteProof { layer: 2, index: 1 })
    );
    assert_matches!(
        sparse.verify_root(&dense.root()),
        Err(CommitmentError::IncompleteProof { .. })
    );
}

// ── Serialization ────────────────────────────────────────────────────

#[test]
fn test_serialization_mapping() {
    let tree = SparseMerkleTree::new(7).unwrap();

    assert_eq!(tree.get_serialization_mapping(&set(&[0])).unwrap(), vec![
        node(0, 0),
        node(0, 1),
        node(1, 1),
        node(2, 1)
    ]);
    // blocks 0 and 3 sit in sibling pairs, so layer 1 carries nothing
    assert_eq!(tree.get_serialization_mapping(&set(&[0, 3])).unwrap(), vec![
        node(0, 0),
        node(0, 1),
        node(0, 2),
        node(0, 3),
        node(2, 1)
    ]);
    assert_eq!(tree.get_serialization_mapping(&set(&[0, 1])).unwrap(), vec![
        node(0, 0),
        node(0, 1),
        node(1, 1),
        node(2, 1)
    ]);
    assert_eq!(tree.serialization_shape(&set(&[0, 7])).unwrap(), vec![
        (0, 4),
        (1, 2)
    ]);
    assert!(tree.get_serialization_mapping(&BTreeSet::new()).unwrap().is_empty());
    assert_matches!(
        tree.get_serialization_mapping(&set(&[2, 8])),
        Err(CommitmentError::IndexOutOfRange { index: 8, bound: 8 })
    );
}

#[test]
fn test_to_vector_follows_mapping() {
    let dense = random_tree(9, 8);
    let queried = set(&[3, 4, 17, 30, 31]);
    let sparse = dense.sparse_tree(&queried).unwrap();
    let mapping = sparse.get_serialization_mapping(&queried).unwrap();
    let expected: Vec<Digest> = mapping
        .iter()
        .map(|n| *sparse.layer(n.layer).unwrap().read_data(n.index).unwrap())
        .collect();
    assert_eq!(sparse.to_vector(), expected);
}

#[test]
fn test_de_serialize_rebuilds_the_tree() {
    let dense = random_tree(9, 9);
    let queried = set(&[0, 5, 6, 22]);
    let sparse = dense.sparse_tree(&queried).unwrap();
    let rebuilt = SparseMerkleTree::from_serialized(9, &queried, &sparse.to_vector()).unwrap();
    assert_eq!(rebuilt, sparse);
    assert_eq!(rebuilt.to_vector(), sparse.to_vector());
    assert_eq!(rebuilt.calculate_root().unwrap(), dense.root());
}

#[test]
fn test_path_built_tree_round_trips_after_pruning() {
    let dense = random_tree(9, 17);
    let queried = set(&[0, 5, 6, 22]);
    let mut sparse = SparseMerkleTree::new(9).unwrap();
    for &block in &queried {
        add_block(&mut sparse, &dense, block);
    }
    let rebuilt = SparseMerkleTree::from_serialized(9, &queried, &sparse.to_vector()).unwrap();
    // siblings shared between the paths are still stored
    assert_ne!(rebuilt, sparse);

    sparse.prune_derivable().expect("consistent paths");
    assert_eq!(rebuilt, sparse);
    assert_eq!(rebuilt.to_vector(), sparse.to_vector());
    assert_eq!(sparse.calculate_root().unwrap(), dense.root());

    let twice = SparseMerkleTree::from_serialized(9, &queried, &rebuilt.to_vector()).unwrap();
    assert_eq!(twice, rebuilt);
}

#[test]
fn test_pruning_keeps_only_serialized_nodes() {
    let dense = random_tree(7, 18);
    let mut sparse = SparseMerkleTree::new(7).unwrap();
    add_block(&mut sparse, &dense, 0);
    add_block(&mut sparse, &dense, 3);
    assert_eq!(sparse.layer(1).unwrap().get_indices(), set(&[0, 1]));

    sparse.prune_derivable().unwrap();
    assert!(sparse.layer(1).unwrap().is_empty());
    assert_eq!(sparse.layer(2).unwrap().get_indices(), set(&[1]));
    assert_eq!(sparse.to_vector().len(), 5);
    assert_eq!(sparse, dense.sparse_tree(&set(&[0, 3])).unwrap());

    let pruned = sparse.clone();
    sparse.prune_derivable().unwrap();
    assert_eq!(sparse, pruned);
}

#[test]
fn test_pruning_reports_conflicts_without_removing() {
    let dense = random_tree(7, 19);
    let mut sparse = SparseMerkleTree::new(7).unwrap();
    let mut path = dense.path(0).unwrap();
    path[0] = flip(path[0]);
    let data = [dense.block(0).unwrap(), dense.block(1).unwrap()];
    sparse.add_path(&data, &path, 0).unwrap();
    add_block(&mut sparse, &dense, 2);

    let before = sparse.clone();
    assert_matches!(
        sparse.prune_derivable(),
        Err(CommitmentError::ConflictingNode { layer: 1, index: 1 })
    );
    assert_eq!(sparse, before);
}

#[test]
fn test_de_serialize_rejects_wrong_shape() {
    let dense = random_tree(8, 10);
    let queried = set(&[1, 9]);
    let mut nodes = dense.sparse_tree(&queried).unwrap().to_vector();
    let expected = nodes.len();
    nodes.pop();

    let mut tree = SparseMerkleTree::new(8).unwrap();
    assert_matches!(
        tree.de_serialize(&queried, &nodes),
        Err(CommitmentError::InvalidProofShape { expected: e, got: g }) if e == expected && g == expected - 1
    );
    assert!(tree.layer(0).unwrap().is_empty());
}

// ── SparseMerkleProof ────────────────────────────────────────────────

#[test]
fn test_proof_bincode_round_trip() {
    let dense = random_tree(9, 11);
    let queried = set(&[2, 3, 12, 31]);
    let proof = dense.open(&queried).unwrap();
    let bytes = proof.encode_to_vec().expect("encode");
    let decoded = SparseMerkleProof::decode_from_slice(&bytes).expect("decode");
    assert_eq!(decoded, proof);
    assert!(decoded.verify(9, &dense.root()).unwrap());

    let mut trailing = bytes.clone();
    trailing.push(0);
    assert_matches!(
        SparseMerkleProof::decode_from_slice(&trailing),
        Err(CommitmentError::InvalidProof(_))
    );
    assert_matches!(
        SparseMerkleProof::decode_from_slice(&bytes[..bytes.len() - 1]),
        Err(CommitmentError::InvalidProof(_))
    );
}

#[test]
fn test_tampered_proof_fails_verification() {
    let dense = random_tree(9, 12);
    let queried = set(&[7, 20]);
    let proof = dense.open(&queried).unwrap();

    for i in 0..proof.nodes.len() {
        let mut tampered = proof.clone();
        tampered.nodes[i] = flip(tampered.nodes[i]);
        assert!(!tampered.verify(9, &dense.root()).unwrap(), "node {}", i);
        assert_eq!(tampered.verified_blocks(9, &dense.root()).unwrap(), None);
    }

    let mut truncated = proof.clone();
    truncated.nodes.pop();
    assert_matches!(
        truncated.verify(9, &dense.root()),
        Err(CommitmentError::InvalidProofShape { .. })
    );
}

#[test]
fn test_verified_blocks() {
    let dense = random_tree(8, 13);
    let queried = set(&[14, 1, 8]);
    let proof = dense.open(&queried).unwrap();
    let blocks = proof.verified_blocks(8, &dense.root()).unwrap().expect("verifies");
    assert_eq!(blocks, vec![
        dense.block(1).unwrap(),
        dense.block(8).unwrap(),
        dense.block(14).unwrap()
    ]);
}

#[test]
fn test_to_proof_rejects_extra_paths() {
    let dense = random_tree(7, 14);
    let sparse = dense.sparse_tree(&set(&[0, 3])).unwrap();
    assert_matches!(
        sparse.to_proof(&set(&[0])),
        Err(CommitmentError::InvalidProofShape { expected: 4, got: 5 })
    );
}

#[test]
fn test_shuffled_insertion_order_gives_same_tree() {
    let dense = random_tree(9, 15);
    let mut blocks: Vec<usize> = (0..32).step_by(3).collect();
    let mut in_order = SparseMerkleTree::new(9).unwrap();
    for &block in &blocks {
        add_block(&mut in_order, &dense, block);
    }

    let mut rng = StdRng::seed_from_u64(16);
    blocks.shuffle(&mut rng);
    let mut shuffled = SparseMerkleTree::new(9).unwrap();
    for &block in &blocks {
        add_block(&mut shuffled, &dense, block);
    }
    assert_eq!(shuffled, in_order);
    assert_eq!(shuffled.to_vector(), in_order.to_vector());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(12))]

    #[test]
    fn test_sparse_root_matches_dense_root(
        (src_log_len, seed, queried) in (5u32..=9).prop_flat_map(|log_len| (
            Just(log_len),
            any::<u64>(),
            prop::collection::btree_set(
                0..(1usize << (log_len - 4)),
                1..=(1usize << (log_len - 4)).min(5),
            ),
        ))
    ) {
        let dense = random_tree(src_log_len, seed);
        let sparse = dense.sparse_tree(&queried).unwrap();
        prop_assert_eq!(sparse.calculate_root().unwrap(), dense.root());

        let proof = sparse.to_proof(&queried).unwrap();
        let mapping = sparse.get_serialization_mapping(&queried).unwrap();
        prop_assert_eq!(proof.nodes.len(), mapping.len());
        prop_assert!(proof.verify(src_log_len, &dense.root()).unwrap());

        // never more than the individual paths together
        let pairs: BTreeSet<usize> = queried.iter().map(|idx| idx >> 1).collect();
        let height = dense.layout().height() as usize;
        prop_assert!(mapping.len() <= pairs.len() * (2 + height));
    }
}
