//! The compressed de Bruijn graph and its queries.
//!
//! Nodes are maximal non-branching paths of k-mers. A node is never stored as
//! a label; it is a [`CompactNode`] pointing into the BWT:
//!
//! - `lb` / `size`: SA interval of the node's first k-mer
//! - `first_lb`: start of the SA interval of the node's last k-mer
//! - `len`: label length in characters
//!
//! Positions are mapped to node ids through three disjoint cases: separator
//! suffixes (`p < C[2]`) belong to stop nodes, positions inside a `bv1`
//! interval belong to detection-phase nodes, everything else is counted by
//! `bv3` into the lazily completed nodes.

use bytemuck::{Pod, Zeroable};
use thiserror::Error;
use tracing::warn;

use crate::fm::{BwtIndex, IntervalSymbol, SymbolIndex, first_symbol};
use crate::succinct::RankedBitVector;
use crate::wavelet::WaveletMatrix;

#[derive(Debug, Error)]
/// Errors returned while building, checking or loading a graph.
pub enum GraphError {
    /// Invalid input text or parameter.
    #[error("Invalid input: {0}")]
    Input(String),
    /// Construction or verification found a broken invariant.
    #[error("Inconsistent graph: {0}")]
    Consistency(String),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Invalid persisted structure.
    #[error("Invalid graph file: {0}")]
    Format(String),
}

/// Node record. Identity is the index in the node table.
#[repr(C)]
#[derive(Copy, Clone, Default, Pod, Zeroable, PartialEq, Eq, Debug)]
pub struct CompactNode {
    /// SA lower bound of the first k-mer of the label.
    pub lb: u64,
    /// Label length.
    pub len: u64,
    /// Number of occurrences (width of both SA intervals).
    pub size: u64,
    /// SA lower bound of the last k-mer of the label.
    pub first_lb: u64,
}

impl CompactNode {
    pub fn new(lb: u64, len: u64, size: u64, first_lb: u64) -> Self {
        Self {
            lb,
            len,
            size,
            first_lb,
        }
    }
}

/// Result of [`CompressedGraph::find_nodes`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodePath {
    /// Nodes covering the pattern, from the node holding its last k-mer back
    /// to the node holding its first character.
    pub nodes: Vec<u64>,
    /// Start of the pattern inside the label of the last entry of `nodes`.
    pub offset: i64,
}

impl NodePath {
    pub const NOT_FOUND_OFFSET: i64 = -1;

    pub fn not_found() -> Self {
        Self {
            nodes: Vec::new(),
            offset: Self::NOT_FOUND_OFFSET,
        }
    }

    pub fn is_found(&self) -> bool {
        !self.nodes.is_empty()
    }
}

/// Immutable compressed de Bruijn graph for one `k`.
#[derive(Debug, Clone)]
pub struct CompressedGraph {
    pub(crate) k: usize,
    pub(crate) bwt: BwtIndex,
    pub(crate) c_array: Vec<u64>,
    pub(crate) nodes: Vec<CompactNode>,
    pub(crate) right_max: u64,
    pub(crate) stop_nodes: Vec<u64>,
    pub(crate) bv1: RankedBitVector,
    pub(crate) bv3: RankedBitVector,
    pub(crate) doc: Option<WaveletMatrix>,
}

impl CompressedGraph {
    #[inline]
    pub fn k(&self) -> usize {
        self.k
    }

    /// Length of the indexed text (terminator included).
    #[inline]
    pub fn len(&self) -> usize {
        self.bwt.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bwt.is_empty()
    }

    #[inline]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of nodes found during detection; lazily completed nodes follow.
    #[inline]
    pub fn right_max(&self) -> u64 {
        self.right_max
    }

    /// Number of indexed sequences.
    #[inline]
    pub fn sequence_count(&self) -> usize {
        self.c_array[2] as usize
    }

    pub fn nodes(&self) -> &[CompactNode] {
        &self.nodes
    }

    pub fn node(&self, id: u64) -> &CompactNode {
        &self.nodes[id as usize]
    }

    pub fn stop_nodes(&self) -> &[u64] {
        &self.stop_nodes
    }

    pub fn c_array(&self) -> &[u64] {
        &self.c_array
    }

    pub fn bwt(&self) -> &BwtIndex {
        &self.bwt
    }

    pub fn has_document_index(&self) -> bool {
        self.doc.is_some()
    }

    pub fn document_index(&self) -> Option<&WaveletMatrix> {
        self.doc.as_ref()
    }

    pub fn size_bytes(&self) -> usize {
        self.bwt.size_bytes()
            + self.c_array.len() * 8
            + self.nodes.len() * std::mem::size_of::<CompactNode>()
            + self.stop_nodes.len() * 8
            + self.bv1.size_bytes()
            + self.bv3.size_bytes()
            + self.doc.as_ref().map_or(0, WaveletMatrix::size_bytes)
    }

    /// Detection-phase node whose suffix interval contains `p`, if any.
    #[inline]
    pub(crate) fn bv1_node(&self, p: usize) -> Option<u64> {
        bv1_node(&self.bv1, p)
    }

    /// Node whose last-k-mer interval `[first_lb, first_lb + size)` contains
    /// BWT position `p`, or `None` if no node owns `p` (suffixes whose first
    /// k characters are not the last k-mer of any node).
    pub fn node_at(&self, p: usize) -> Option<u64> {
        if p >= self.len() {
            return None;
        }
        let id = self.owner(p);
        let node = self.nodes.get(id as usize)?;
        let p = p as u64;
        (node.first_lb <= p && p < node.first_lb + node.size).then_some(id)
    }

    /// Unchecked form of [`Self::node_at`]: only meaningful for positions
    /// inside some node's last-k-mer interval.
    pub(crate) fn owner(&self, p: usize) -> u64 {
        let d = self.c_array[2] as usize;
        if p < d {
            return self.right_max - d as u64 + p as u64;
        }
        match self.bv1_node(p) {
            Some(id) => id,
            None => self.right_max + self.bv3.rank1(p) as u64,
        }
    }

    /// LF step: `(C[c] + rank(i, c), c)` for `c = bwt[i]`.
    #[inline]
    pub(crate) fn lf(&self, i: usize) -> (usize, u64) {
        let (r, c) = self.bwt.inverse_select(i);
        (self.c_array[c as usize] as usize + r, c)
    }

    /// Inverse LF for a position whose suffix starts with `c`.
    #[inline]
    fn inverse_lf(&self, i: usize, c: u64) -> Option<usize> {
        self.bwt.select(i - self.c_array[c as usize] as usize, c)
    }

    #[inline]
    fn backward_step(&self, lo: usize, hi: usize, c: u64) -> (usize, usize) {
        let base = self.c_array[c as usize] as usize;
        (base + self.bwt.rank(lo, c), base + self.bwt.rank(hi, c))
    }

    /// Nodes spelling `pattern`, innermost first, and the pattern's start
    /// inside the outermost node.
    ///
    /// Patterns shorter than `k`, patterns that do not occur and patterns
    /// containing separator bytes yield [`NodePath::not_found`].
    pub fn find_nodes(&self, pattern: &[u8]) -> NodePath {
        let k = self.k;
        let m = pattern.len();
        if m < k {
            warn!(pattern_len = m, k, "pattern shorter than k");
            return NodePath::not_found();
        }
        if pattern.iter().any(|&b| b <= 1) {
            return NodePath::not_found();
        }

        // SA interval of the last k-mer; a single candidate is verified
        // character by character.
        let (mut lo, mut hi) = (0usize, self.bwt.len());
        let mut pos = m;
        while hi - lo > 1 && pos > m - k {
            pos -= 1;
            (lo, hi) = self.backward_step(lo, hi, pattern[pos] as u64);
        }
        while lo < hi && pos > m - k {
            pos -= 1;
            let c = pattern[pos] as u64;
            let (r, s) = self.bwt.inverse_select(lo);
            if s == c {
                lo = self.c_array[c as usize] as usize + r;
                hi = lo + 1;
            } else {
                hi = lo;
            }
        }
        if lo >= hi {
            return NodePath::not_found();
        }

        // Walk forward until the k-mer interval is owned by a known node.
        let (mut i, mut j) = (lo, hi - 1);
        let mut l = 0usize;
        let node = loop {
            if let Some(id) = self.bv1_node(i) {
                break id;
            }
            let ones = self.bv3.rank1(i);
            if ones != self.bv3.rank1(j + 1) {
                break self.right_max + ones as u64;
            }
            let c = if l < k {
                pattern[m - k + l] as u64
            } else {
                first_symbol(&self.c_array, i)
            };
            let Some(ni) = self.inverse_lf(i, c) else {
                return NodePath::not_found();
            };
            j = if i == j {
                ni
            } else {
                match self.inverse_lf(j, c) {
                    Some(nj) => nj,
                    None => return NodePath::not_found(),
                }
            };
            i = ni;
            l += 1;
            if i < self.c_array[2] as usize {
                l -= k - 1;
                break self.right_max - self.c_array[2] + i as u64;
            }
        };

        let Some(mut offset) = (self.nodes[node as usize].len as usize).checked_sub(l + k) else {
            return NodePath::not_found();
        };
        let mut nodes = vec![node];

        // Extend to the left, crossing into a new node whenever the pattern
        // start reaches the first character of the current one.
        while pos > 0 {
            pos -= 1;
            (lo, hi) = self.backward_step(lo, hi, pattern[pos] as u64);
            if lo >= hi {
                return NodePath::not_found();
            }
            if offset == 0 {
                let id = self.owner(lo);
                offset = self.nodes[id as usize].len as usize - k;
                nodes.push(id);
            } else {
                offset -= 1;
            }
        }

        NodePath {
            nodes,
            offset: offset as i64,
        }
    }

    /// Ids of the sequences that contain the label of `node_id`, increasing.
    ///
    /// Empty when the graph was built without a document index. Panics if
    /// `node_id` is out of range.
    pub fn sequences_in_node(&self, node_id: u64) -> Vec<u64> {
        let node = self.nodes[node_id as usize];
        let Some(doc) = &self.doc else {
            return Vec::new();
        };
        let mut out: Vec<IntervalSymbol> = Vec::new();
        let lb = node.lb as usize;
        doc.interval_symbols(lb, lb + node.size as usize, &mut out);
        out.into_iter().map(|s| s.symbol).collect()
    }
}

/// `bv1` marks both ends of every detection interval: `p` is inside one iff
/// an odd number of marks precede it or it is a mark itself.
#[inline]
pub(crate) fn bv1_node(bv1: &RankedBitVector, p: usize) -> Option<u64> {
    let ones = bv1.rank1(p + 1);
    if ones % 2 == 1 || bv1.get(p) {
        Some(((ones - 1) / 2) as u64)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::succinct::BitVector;

    #[test]
    fn test_bv1_node_intervals() {
        // intervals [1, 3] and [5, 6]
        let bv1 = RankedBitVector::new(BitVector::from_bools(&[
            false, true, false, true, false, true, true, false,
        ]));
        let ids: Vec<Option<u64>> = (0..8).map(|p| bv1_node(&bv1, p)).collect();
        assert_eq!(
            ids,
            vec![None, Some(0), Some(0), Some(0), None, Some(1), Some(1), None]
        );
    }

    #[test]
    fn test_not_found_path() {
        let p = NodePath::not_found();
        assert!(!p.is_found());
        assert_eq!(p.offset, NodePath::NOT_FOUND_OFFSET);
    }

    #[test]
    fn test_compact_node_is_pod() {
        let nodes = [CompactNode::new(1, 2, 3, 4)];
        let bytes: &[u8] = bytemuck::cast_slice(&nodes);
        assert_eq!(bytes.len(), 32);
        assert_eq!(bytemuck::pod_read_unaligned::<CompactNode>(bytes), nodes[0]);
    }
}
