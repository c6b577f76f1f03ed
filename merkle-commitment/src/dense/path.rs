//! Authentication paths for the dense tree.

use crate::{
    CommitmentError, Digest,
    dense::construct::compress_in_place,
    error::Result,
    hash::{compress, hash_pair},
    layout::{BLOCK_SIZE, DUAL_BLOCK_SIZE, TreeLayout},
};

/// Sibling digests from level 0 up to, but excluding, the root.
pub type Path = Vec<Digest>;

/// Read the authentication path of block `block_index` from a built tree.
///
/// `tree` is the destination buffer filled by
/// [`construct_tree`](super::construct_tree). The path starts with the
/// sibling of the digest of the dual block that contains the block.
pub fn get_path_to_block(tree: &[u8], src_log_len: u32, block_index: usize) -> Result<Path> {
    let layout = TreeLayout::new(src_log_len)?;
    layout.check_destination(tree.len())?;
    layout.check_block(block_index)?;

    let mut position = block_index >> 1;
    (0..layout.height())
        .map(|level| {
            let offset = layout.node_offset(level, position ^ 1);
            position >>= 1;
            Digest::from_slice(&tree[offset..offset + BLOCK_SIZE])
        })
        .collect()
}

/// Paths for several blocks, straight from the source data.
///
/// Hashes a scratch copy of `src` level by level and collects every path on
/// the way, so no destination buffer is needed. Paths are returned in the
/// order of `block_indices`.
pub fn get_paths_to_blocks(
    src: &[u8],
    src_log_len: u32,
    block_indices: &[usize],
) -> Result<Vec<Path>> {
    let mut scratch = src.to_vec();
    get_paths_to_blocks_in_place(&mut scratch, src_log_len, block_indices)
}

/// [`get_paths_to_blocks`] using `data` itself as scratch space.
///
/// `data` is overwritten with intermediate levels.
pub fn get_paths_to_blocks_in_place(
    data: &mut [u8],
    src_log_len: u32,
    block_indices: &[usize],
) -> Result<Vec<Path>> {
    let layout = TreeLayout::new(src_log_len)?;
    layout.check_source(data.len())?;
    for &block_index in block_indices {
        layout.check_block(block_index)?;
    }

    let height = layout.height() as usize;
    let mut positions: Vec<usize> = block_indices.iter().map(|b| b >> 1).collect();
    let mut paths: Vec<Path> = vec![Vec::with_capacity(height); block_indices.len()];

    let mut len = data.len();
    for _ in 0..height {
        compress_in_place(&mut data[..len]);
        len /= 2;
        for (path, position) in paths.iter_mut().zip(positions.iter_mut()) {
            let offset = (*position ^ 1) * BLOCK_SIZE;
            path.push(Digest::from_slice(&data[offset..offset + BLOCK_SIZE])?);
            *position >>= 1;
        }
    }
    Ok(paths)
}

/// Check `path` for the dual block containing block `block_index` against
/// `root`.
///
/// Returns `Ok(false)` for any mismatch. A path too short to place the block
/// in the tree is an error.
pub fn verify_path_to_block(
    block_data: &[u8; DUAL_BLOCK_SIZE],
    root: &Digest,
    path: &[Digest],
    block_index: usize,
) -> Result<bool> {
    let mut position = block_index >> 1;
    let levels = u32::try_from(path.len()).unwrap_or(u32::MAX);
    if position.checked_shr(levels).unwrap_or(0) != 0 {
        return Err(CommitmentError::PathTooShort {
            index: block_index,
            len: path.len(),
        });
    }

    let mut node = compress(block_data);
    for sibling in path {
        node = if position & 1 == 0 {
            hash_pair(&node, sibling)
        } else {
            hash_pair(sibling, &node)
        };
        position >>= 1;
    }
    Ok(node == *root)
}

/// [`verify_path_to_block`] for a tree over `2^src_log_len` bytes.
///
/// Knowing the tree, a path of any length other than the tree height, or a
/// block outside the buffer, is an error rather than a failed check.
pub fn verify_path_to_block_in_tree(
    block_data: &[u8; DUAL_BLOCK_SIZE],
    root: &Digest,
    path: &[Digest],
    block_index: usize,
    src_log_len: u32,
) -> Result<bool> {
    let layout = TreeLayout::new(src_log_len)?;
    layout.check_block(block_index)?;
    let expected = layout.height() as usize;
    if path.len() != expected {
        return Err(CommitmentError::InvalidPathLength {
            expected,
            got: path.len(),
        });
    }
    verify_path_to_block(block_data, root, path, block_index)
}
