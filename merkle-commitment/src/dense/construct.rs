//! Tree construction over caller-provided buffers.
//!
//! The destination is cut into one mutable slice per level (see
//! [`crate::layout`]), and each level slice into one chunk per segment. A
//! segment therefore owns a disjoint set of chunks, one per level up to its
//! own root, and segments can be hashed independently. The levels above the
//! segment roots are filled afterwards by [`finish_tree`].

use tracing::{debug, trace};

use crate::{
    CommitmentError, Digest,
    error::Result,
    hash::compress,
    layout::{BLOCK_SIZE, DUAL_BLOCK_SIZE, MIN_LOG_LEN, TreeLayout},
};

/// Segments smaller than this are not worth a separate worker.
const MIN_PARALLEL_SEGMENT_LOG_LEN: u32 = 12;

/// Runtime options for [`construct_tree_with`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOptions {
    /// `log2` of the segment size in bytes. `None` picks one from the number
    /// of available cores when building in parallel, or uses a single
    /// segment otherwise.
    pub segment_log_len: Option<u32>,
    /// Build segments on the rayon thread pool. Has no effect without the
    /// `parallel` feature.
    pub parallel: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            segment_log_len: None,
            parallel: cfg!(feature = "parallel"),
        }
    }
}

impl BuildOptions {
    /// Single-threaded construction.
    pub fn sequential() -> Self {
        Self {
            segment_log_len: None,
            parallel: false,
        }
    }

    /// Fix the segment size.
    pub fn with_segment_log_len(mut self, segment_log_len: u32) -> Self {
        self.segment_log_len = Some(segment_log_len);
        self
    }

    fn resolve_segment_log_len(&self, layout: &TreeLayout) -> Result<u32> {
        match self.segment_log_len {
            Some(segment_log_len) => {
                check_segment(layout, segment_log_len)?;
                Ok(segment_log_len)
            }
            None if self.parallel => Ok(default_segment_log_len(layout)),
            None => Ok(layout.src_log_len()),
        }
    }
}

#[cfg(feature = "parallel")]
fn available_workers() -> usize {
    num_cpus::get()
}

#[cfg(not(feature = "parallel"))]
fn available_workers() -> usize {
    1
}

/// One segment per core (rounded up to a power of two), but never smaller
/// than [`MIN_PARALLEL_SEGMENT_LOG_LEN`] unless the whole buffer is.
fn default_segment_log_len(layout: &TreeLayout) -> u32 {
    let log_workers = available_workers().next_power_of_two().ilog2();
    let src_log_len = layout.src_log_len();
    src_log_len
        .saturating_sub(log_workers)
        .max(MIN_PARALLEL_SEGMENT_LOG_LEN)
        .min(src_log_len)
}

fn check_segment(layout: &TreeLayout, segment_log_len: u32) -> Result<()> {
    if !(MIN_LOG_LEN..=layout.src_log_len()).contains(&segment_log_len) {
        return Err(CommitmentError::InvalidSegment(format!(
            "segment log length {} must be between {} and {}",
            segment_log_len,
            MIN_LOG_LEN,
            layout.src_log_len()
        )));
    }
    Ok(())
}

/// Split the node area of `dst` into one slice per level, level 0 first.
fn level_slices<'a>(layout: &TreeLayout, dst: &'a mut [u8]) -> Vec<&'a mut [u8]> {
    let mut rest = &mut dst[layout.root_offset()..layout.byte_len()];
    let mut levels = Vec::with_capacity(layout.height() as usize + 1);
    for level in (0..=layout.height()).rev() {
        let (head, tail) =
            core::mem::take(&mut rest).split_at_mut(layout.nodes_at(level) * BLOCK_SIZE);
        levels.push(head);
        rest = tail;
    }
    levels.reverse();
    levels
}

/// The nodes of one segment subtree inside a destination buffer: one chunk
/// per level, from the compressed dual blocks up to the segment root.
///
/// Views of different segments never overlap, so they can be filled from
/// different threads. Obtained from [`split_segments`].
#[derive(Debug)]
pub struct SegmentNodes<'a> {
    index: usize,
    segment_log_len: u32,
    levels: Vec<&'a mut [u8]>,
}

impl SegmentNodes<'_> {
    /// Position of the segment within the buffer.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Length of the segment's source bytes.
    pub fn source_len(&self) -> usize {
        1 << self.segment_log_len
    }

    /// Hash `segment`, this segment's source bytes, into its nodes.
    pub fn build(&mut self, segment: &[u8]) -> Result<()> {
        if segment.len() != self.source_len() {
            return Err(CommitmentError::InvalidBufferLength {
                len: segment.len(),
                log_len: self.segment_log_len,
            });
        }
        self.fill(segment);
        Ok(())
    }

    /// The segment's root, as last written.
    pub fn root(&self) -> Result<Digest> {
        match self.levels.last() {
            Some(level) => Digest::from_slice(level),
            None => Err(CommitmentError::InvalidSegment("segment has no levels".into())),
        }
    }

    fn fill(&mut self, segment: &[u8]) {
        trace!(segment = self.index, "building segment");
        fill_segment(segment, &mut self.levels);
    }
}

/// Per-segment views of `dst`: for every segment, its chunk of each level
/// from 0 up to the segment root.
fn segment_views<'a>(
    layout: &TreeLayout,
    segment_log_len: u32,
    dst: &'a mut [u8],
) -> Vec<SegmentNodes<'a>> {
    let segment_levels = (segment_log_len - MIN_LOG_LEN) as usize + 1;
    let segment_count = 1usize << (layout.src_log_len() - segment_log_len);
    let mut views: Vec<SegmentNodes<'a>> = (0..segment_count)
        .map(|index| SegmentNodes {
            index,
            segment_log_len,
            levels: Vec::with_capacity(segment_levels),
        })
        .collect();
    for slice in level_slices(layout, dst).into_iter().take(segment_levels) {
        let chunk = slice.len() / segment_count;
        for (view, part) in views.iter_mut().zip(slice.chunks_exact_mut(chunk)) {
            view.levels.push(part);
        }
    }
    views
}

/// The view of segment `segment_index` alone, without touching the other
/// segments' ranges.
fn segment_view<'a>(
    layout: &TreeLayout,
    segment_log_len: u32,
    segment_index: usize,
    dst: &'a mut [u8],
) -> SegmentNodes<'a> {
    let segment_height = segment_log_len - MIN_LOG_LEN;
    let shift = layout.src_log_len() - segment_log_len;

    // highest level first, which is ascending offset order
    let mut rest = dst;
    let mut base = 0;
    let mut levels = Vec::with_capacity(segment_height as usize + 1);
    for level in (0..=segment_height).rev() {
        let start = layout.node_offset(level, segment_index << (segment_height - level));
        let len = (layout.nodes_at(level) >> shift) * BLOCK_SIZE;
        let (_, tail) = core::mem::take(&mut rest).split_at_mut(start - base);
        let (head, tail) = tail.split_at_mut(len);
        levels.push(head);
        rest = tail;
        base = start + len;
    }
    levels.reverse();
    SegmentNodes {
        index: segment_index,
        segment_log_len,
        levels,
    }
}

/// Split the node area of `dst` into the views of all segments of size
/// `2^segment_log_len`, in segment order.
///
/// Each view can be built independently, for example on its own thread;
/// [`finish_tree`] completes the tree once all are built.
pub fn split_segments(
    dst: &mut [u8],
    src_log_len: u32,
    segment_log_len: u32,
) -> Result<Vec<SegmentNodes<'_>>> {
    let layout = TreeLayout::new(src_log_len)?;
    check_segment(&layout, segment_log_len)?;
    layout.check_destination(dst.len())?;
    Ok(segment_views(&layout, segment_log_len, dst))
}

/// Compress every dual block of `below` into the matching digest of `out`.
fn hash_level(below: &[u8], out: &mut [u8]) {
    let (pairs, _) = below.as_chunks::<DUAL_BLOCK_SIZE>();
    let (digests, _) = out.as_chunks_mut::<BLOCK_SIZE>();
    debug_assert_eq!(pairs.len(), digests.len());
    for (digest, pair) in digests.iter_mut().zip(pairs) {
        *digest = compress(pair).into_bytes();
    }
}

/// Fill `levels[from..]`, each from the level below it.
fn fill_levels(levels: &mut [&mut [u8]], from: usize) {
    for level in from.max(1)..levels.len() {
        let (lower, upper) = levels.split_at_mut(level);
        hash_level(&lower[level - 1], &mut upper[0]);
    }
}

fn fill_segment(src: &[u8], levels: &mut [&mut [u8]]) {
    if let Some(leaves) = levels.first_mut() {
        hash_level(src, leaves);
    }
    fill_levels(levels, 1);
}

#[cfg_attr(not(feature = "parallel"), allow(unused_variables))]
fn build_segments(src: &[u8], segment_len: usize, segments: Vec<SegmentNodes<'_>>, parallel: bool) {
    #[cfg(feature = "parallel")]
    {
        if parallel && segments.len() > 1 {
            use rayon::prelude::*;

            src.par_chunks_exact(segment_len)
                .zip(segments.into_par_iter())
                .for_each(|(segment, mut nodes)| nodes.fill(segment));
            return;
        }
    }

    for (segment, mut nodes) in src.chunks_exact(segment_len).zip(segments) {
        nodes.fill(segment);
    }
}

/// Build the tree of `src` into `dst` and return the root.
///
/// `src` must be exactly `2^src_log_len` bytes and `dst` at least as large.
/// Uses [`BuildOptions::default`].
pub fn construct_tree(src: &[u8], src_log_len: u32, dst: &mut [u8]) -> Result<Digest> {
    construct_tree_with(src, src_log_len, dst, &BuildOptions::default())
}

/// [`construct_tree`] with explicit options.
pub fn construct_tree_with(
    src: &[u8],
    src_log_len: u32,
    dst: &mut [u8],
    options: &BuildOptions,
) -> Result<Digest> {
    let layout = TreeLayout::new(src_log_len)?;
    layout.check_source(src.len())?;
    layout.check_destination(dst.len())?;
    let segment_log_len = options.resolve_segment_log_len(&layout)?;
    debug!(
        src_log_len,
        segment_log_len,
        parallel = options.parallel,
        "constructing merkle tree"
    );

    let segments = segment_views(&layout, segment_log_len, dst);
    build_segments(src, 1 << segment_log_len, segments, options.parallel);
    finish_tree(dst, src_log_len, segment_log_len)
}

/// Build the subtree of one segment.
///
/// `segment` holds the `2^segment_log_len` source bytes of segment
/// `segment_index` of a `2^src_log_len` byte buffer; only that segment needs
/// to be in memory. The nodes are written where [`construct_tree`] would put
/// them in the full-size `dst`, and nothing outside the segment's nodes is
/// touched.
pub fn construct_sub_tree(
    segment: &[u8],
    src_log_len: u32,
    segment_log_len: u32,
    segment_index: usize,
    dst: &mut [u8],
) -> Result<()> {
    let layout = TreeLayout::new(src_log_len)?;
    check_segment(&layout, segment_log_len)?;
    TreeLayout::new(segment_log_len)?.check_source(segment.len())?;
    let segment_count = 1usize << (src_log_len - segment_log_len);
    if segment_index >= segment_count {
        return Err(CommitmentError::IndexOutOfRange {
            index: segment_index,
            bound: segment_count,
        });
    }
    layout.check_destination(dst.len())?;

    segment_view(&layout, segment_log_len, segment_index, dst).fill(segment);
    Ok(())
}

/// Fill the levels above the segment roots and return the root.
///
/// Every segment of size `2^segment_log_len` must have been built first, with
/// [`construct_sub_tree`] or through [`split_segments`].
pub fn finish_tree(dst: &mut [u8], src_log_len: u32, segment_log_len: u32) -> Result<Digest> {
    let layout = TreeLayout::new(src_log_len)?;
    check_segment(&layout, segment_log_len)?;
    layout.check_destination(dst.len())?;

    let mut levels = level_slices(&layout, dst);
    fill_levels(&mut levels, (segment_log_len - MIN_LOG_LEN) as usize + 1);

    let root = layout.root_offset();
    Digest::from_slice(&dst[root..root + BLOCK_SIZE])
}

/// Compress every dual block of `buf` into the first half of `buf`.
///
/// Digest `p` is written to bytes `16p..16p+16`, which lie at or before the
/// dual block `p` it is computed from, so processing in ascending order
/// never overwrites unread input.
pub(crate) fn compress_in_place(buf: &mut [u8]) {
    let mut pair = [0u8; DUAL_BLOCK_SIZE];
    for p in 0..buf.len() / DUAL_BLOCK_SIZE {
        pair.copy_from_slice(&buf[p * DUAL_BLOCK_SIZE..(p + 1) * DUAL_BLOCK_SIZE]);
        let digest = compress(&pair);
        buf[p * BLOCK_SIZE..(p + 1) * BLOCK_SIZE].copy_from_slice(digest.as_bytes());
    }
}

/// Root of `data` computed in place, without a destination buffer.
///
/// `data` is consumed as scratch space; on return its first 16 bytes hold
/// the root.
pub fn commit_in_place(data: &mut [u8], src_log_len: u32) -> Result<Digest> {
    let layout = TreeLayout::new(src_log_len)?;
    layout.check_source(data.len())?;

    let mut len = data.len();
    while len > BLOCK_SIZE {
        compress_in_place(&mut data[..len]);
        len /= 2;
    }
    Digest::from_slice(&data[..BLOCK_SIZE])
}
