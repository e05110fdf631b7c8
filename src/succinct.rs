//! Plain bit vectors with a separable rank support.
//!
//! [`RankSupport`] only holds the superblock/block counts; the bits live in the
//! [`BitVector`] it was built for. Persisted rank tables are therefore loaded
//! against an already loaded bit vector ([`RankSupport::read_bound`]) and never
//! on their own.
//!
//! Layout: one `u64` cumulative count per 512-bit superblock, one `u16`
//! relative count per 64-bit block, popcount inside the word.

use byteorder::{LittleEndian as LE, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

use crate::graph::GraphError;
use crate::io::{read_u16_array, read_u64_array};

const SUPERBLOCK_BITS: usize = 512;
const BLOCK_BITS: usize = 64;
const BLOCKS_PER_SUPERBLOCK: usize = SUPERBLOCK_BITS / BLOCK_BITS;

/// Fixed-length bit vector backed by `u64` words (LSB first).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BitVector {
    words: Vec<u64>,
    len: usize,
}

impl BitVector {
    /// All-zero vector of `len` bits.
    pub fn zeros(len: usize) -> Self {
        Self {
            words: vec![0u64; len.div_ceil(BLOCK_BITS)],
            len,
        }
    }

    pub fn with_capacity(bits: usize) -> Self {
        Self {
            words: Vec::with_capacity(bits.div_ceil(BLOCK_BITS)),
            len: 0,
        }
    }

    pub fn from_bools(bits: &[bool]) -> Self {
        let mut bv = Self::zeros(bits.len());
        for (i, &b) in bits.iter().enumerate() {
            if b {
                bv.set(i, true);
            }
        }
        bv
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn words(&self) -> &[u64] {
        &self.words
    }

    /// Bit at `i`. Panics if `i >= len`.
    #[inline]
    pub fn get(&self, i: usize) -> bool {
        assert!(i < self.len, "bit {i} out of bounds (len={})", self.len);
        (self.words[i / BLOCK_BITS] >> (i % BLOCK_BITS)) & 1 == 1
    }

    #[inline]
    pub fn set(&mut self, i: usize, value: bool) {
        assert!(i < self.len, "bit {i} out of bounds (len={})", self.len);
        let mask = 1u64 << (i % BLOCK_BITS);
        if value {
            self.words[i / BLOCK_BITS] |= mask;
        } else {
            self.words[i / BLOCK_BITS] &= !mask;
        }
    }

    pub fn push(&mut self, value: bool) {
        if self.len % BLOCK_BITS == 0 {
            self.words.push(0);
        }
        self.len += 1;
        self.set(self.len - 1, value);
    }

    pub fn count_ones(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Positions of the set bits in increasing order.
    pub fn ones(&self) -> impl Iterator<Item = usize> + '_ {
        self.words.iter().enumerate().flat_map(|(wi, &word)| {
            let mut w = word;
            std::iter::from_fn(move || {
                if w == 0 {
                    return None;
                }
                let tz = w.trailing_zeros() as usize;
                w &= w - 1;
                Some(wi * BLOCK_BITS + tz)
            })
        })
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> std::io::Result<()> {
        w.write_u64::<LE>(self.len as u64)?;
        for &word in &self.words {
            w.write_u64::<LE>(word)?;
        }
        Ok(())
    }

    pub fn read_from<R: Read>(r: &mut R) -> Result<Self, GraphError> {
        let len = r.read_u64::<LE>()?;
        let words = read_u64_array(r, len.div_ceil(BLOCK_BITS as u64))?;
        let len = len as usize;
        let tail = len % BLOCK_BITS;
        if tail != 0 && words.last().is_some_and(|&w| w >> tail != 0) {
            return Err(GraphError::Format("bits set past the end of a bit vector".into()));
        }
        Ok(Self { words, len })
    }
}

/// Rank directory for one [`BitVector`].
///
/// Queries take the bit vector as an argument; the directory remembers the
/// length and popcount it was built for so a mismatched pairing is caught on
/// load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RankSupport {
    superblock_ranks: Vec<u64>,
    block_ranks: Vec<u16>,
    bits_len: usize,
    ones: usize,
}

impl RankSupport {
    pub fn new(bits: &BitVector) -> Self {
        let mut superblock_ranks = Vec::with_capacity(bits.len() / SUPERBLOCK_BITS + 2);
        let mut block_ranks = Vec::with_capacity(bits.words().len());
        let mut cumulative = 0u64;
        let mut superblock_start = 0u64;

        for (block_idx, word) in bits.words().iter().enumerate() {
            if block_idx % BLOCKS_PER_SUPERBLOCK == 0 {
                superblock_ranks.push(cumulative);
                superblock_start = cumulative;
            }
            block_ranks.push((cumulative - superblock_start) as u16);
            // bits past `len` are always zero
            cumulative += word.count_ones() as u64;
        }
        superblock_ranks.push(cumulative);

        Self {
            superblock_ranks,
            block_ranks,
            bits_len: bits.len(),
            ones: cumulative as usize,
        }
    }

    /// Number of set bits in `[0, pos)`.
    #[inline]
    pub fn rank1(&self, bits: &BitVector, pos: usize) -> usize {
        debug_assert_eq!(bits.len(), self.bits_len);
        if pos == 0 {
            return 0;
        }
        if pos >= self.bits_len {
            return self.ones;
        }
        let block_idx = pos / BLOCK_BITS;
        let offset = pos % BLOCK_BITS;
        let mut rank = self.superblock_ranks[pos / SUPERBLOCK_BITS] as usize
            + self.block_ranks[block_idx] as usize;
        if offset > 0 {
            let mask = (1u64 << offset) - 1;
            rank += (bits.words()[block_idx] & mask).count_ones() as usize;
        }
        rank
    }

    #[inline]
    pub fn rank0(&self, bits: &BitVector, pos: usize) -> usize {
        pos.min(self.bits_len) - self.rank1(bits, pos)
    }

    /// Position of the `k`-th set bit (0-based).
    pub fn select1(&self, bits: &BitVector, k: usize) -> Option<usize> {
        if k >= self.ones {
            return None;
        }
        // first superblock whose cumulative count exceeds k
        let sb = self.superblock_ranks.partition_point(|&r| r as usize <= k) - 1;
        let first_block = sb * BLOCKS_PER_SUPERBLOCK;
        let last_block = (first_block + BLOCKS_PER_SUPERBLOCK).min(self.block_ranks.len());
        let base = self.superblock_ranks[sb] as usize;
        let mut block = first_block;
        for b in first_block..last_block {
            if base + self.block_ranks[b] as usize > k {
                break;
            }
            block = b;
        }
        let remaining = k - base - self.block_ranks[block] as usize;
        select_in_word(bits.words()[block], remaining).map(|bit| block * BLOCK_BITS + bit)
    }

    /// Position of the `k`-th clear bit (0-based).
    pub fn select0(&self, bits: &BitVector, k: usize) -> Option<usize> {
        if k >= self.bits_len - self.ones {
            return None;
        }
        let (mut lo, mut hi) = (0usize, self.bits_len);
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if self.rank0(bits, mid + 1) <= k {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        Some(lo)
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> std::io::Result<()> {
        w.write_u64::<LE>(self.bits_len as u64)?;
        w.write_u64::<LE>(self.ones as u64)?;
        w.write_u64::<LE>(self.superblock_ranks.len() as u64)?;
        for &r in &self.superblock_ranks {
            w.write_u64::<LE>(r)?;
        }
        w.write_u64::<LE>(self.block_ranks.len() as u64)?;
        for &r in &self.block_ranks {
            w.write_u16::<LE>(r)?;
        }
        Ok(())
    }

    /// Load a rank directory and bind it to `bits`, which must already be
    /// loaded. Fails if the directory was written for a different vector.
    pub fn read_bound<R: Read>(r: &mut R, bits: &BitVector) -> Result<Self, GraphError> {
        let bits_len = r.read_u64::<LE>()? as usize;
        let ones = r.read_u64::<LE>()? as usize;
        let words = bits.words().len() as u64;
        let superblocks = r.read_u64::<LE>()?;
        if superblocks != words.div_ceil(BLOCKS_PER_SUPERBLOCK as u64) + 1 {
            return Err(GraphError::Format(format!("rank support with {superblocks} superblocks")));
        }
        let superblock_ranks = read_u64_array(r, superblocks)?;
        let blocks = r.read_u64::<LE>()?;
        if blocks != words {
            return Err(GraphError::Format("rank support block table size mismatch".into()));
        }
        let block_ranks = read_u16_array(r, blocks)?;

        if bits_len != bits.len() || ones != bits.count_ones() {
            return Err(GraphError::Format(format!(
                "rank support built for {bits_len} bits / {ones} ones, bound to {} bits / {} ones",
                bits.len(),
                bits.count_ones()
            )));
        }
        Ok(Self {
            superblock_ranks,
            block_ranks,
            bits_len,
            ones,
        })
    }
}

fn select_in_word(word: u64, k: usize) -> Option<usize> {
    let mut w = word;
    for _ in 0..k {
        if w == 0 {
            return None;
        }
        w &= w - 1;
    }
    if w == 0 {
        None
    } else {
        Some(w.trailing_zeros() as usize)
    }
}

/// A bit vector together with its rank directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RankedBitVector {
    bits: BitVector,
    rank: RankSupport,
}

impl RankedBitVector {
    pub fn new(bits: BitVector) -> Self {
        let rank = RankSupport::new(&bits);
        Self { bits, rank }
    }

    pub(crate) fn from_parts(bits: BitVector, rank: RankSupport) -> Self {
        Self { bits, rank }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bits.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    #[inline]
    pub fn get(&self, i: usize) -> bool {
        self.bits.get(i)
    }

    #[inline]
    pub fn rank1(&self, pos: usize) -> usize {
        self.rank.rank1(&self.bits, pos)
    }

    #[inline]
    pub fn rank0(&self, pos: usize) -> usize {
        self.rank.rank0(&self.bits, pos)
    }

    pub fn select1(&self, k: usize) -> Option<usize> {
        self.rank.select1(&self.bits, k)
    }

    pub fn select0(&self, k: usize) -> Option<usize> {
        self.rank.select0(&self.bits, k)
    }

    pub fn count_ones(&self) -> usize {
        self.rank1(self.len())
    }

    pub fn count_zeros(&self) -> usize {
        self.len() - self.count_ones()
    }

    pub fn bits(&self) -> &BitVector {
        &self.bits
    }

    pub fn rank_support(&self) -> &RankSupport {
        &self.rank
    }

    pub fn size_bytes(&self) -> usize {
        self.bits.words().len() * 8
            + self.rank.superblock_ranks.len() * 8
            + self.rank.block_ranks.len() * 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty() {
        let rbv = RankedBitVector::new(BitVector::from_bools(&[]));
        assert!(rbv.is_empty());
        assert_eq!(rbv.rank1(0), 0);
        assert_eq!(rbv.select1(0), None);
        assert_eq!(rbv.select0(0), None);
    }

    #[test]
    fn test_small() {
        let rbv = RankedBitVector::new(BitVector::from_bools(&[true, false, true, true, false]));
        assert_eq!(rbv.count_ones(), 3);
        assert_eq!(rbv.rank1(0), 0);
        assert_eq!(rbv.rank1(1), 1);
        assert_eq!(rbv.rank1(3), 2);
        assert_eq!(rbv.rank1(5), 3);
        assert_eq!(rbv.rank0(5), 2);
        assert_eq!(rbv.select1(0), Some(0));
        assert_eq!(rbv.select1(2), Some(3));
        assert_eq!(rbv.select1(3), None);
        assert_eq!(rbv.select0(0), Some(1));
        assert_eq!(rbv.select0(1), Some(4));
        assert_eq!(rbv.select0(2), None);
    }

    #[test]
    fn test_rank_select_consistency_across_superblocks() {
        let bits: Vec<bool> = (0..5000).map(|i| i % 7 == 0 || i % 13 == 5).collect();
        let rbv = RankedBitVector::new(BitVector::from_bools(&bits));
        let mut expected = 0;
        for (pos, &b) in bits.iter().enumerate() {
            assert_eq!(rbv.rank1(pos), expected, "rank1({pos})");
            if b {
                assert_eq!(rbv.select1(expected), Some(pos));
                expected += 1;
            }
        }
        assert_eq!(rbv.rank1(bits.len()), expected);
        for k in (0..rbv.count_zeros()).step_by(97) {
            let pos = rbv.select0(k).unwrap();
            assert!(!rbv.get(pos));
            assert_eq!(rbv.rank0(pos), k);
        }
    }

    #[test]
    fn test_dense_superblock() {
        // 448 relative ones at the last block of a superblock
        let rbv = RankedBitVector::new(BitVector::from_bools(&[true; 1100]));
        assert_eq!(rbv.rank1(511), 511);
        assert_eq!(rbv.rank1(1024), 1024);
        assert_eq!(rbv.select1(1099), Some(1099));
    }

    #[test]
    fn test_ones_iterator() {
        let mut bv = BitVector::zeros(200);
        for p in [0, 63, 64, 130, 199] {
            bv.set(p, true);
        }
        assert_eq!(bv.ones().collect::<Vec<_>>(), vec![0, 63, 64, 130, 199]);
    }

    #[test]
    fn test_push_matches_from_bools() {
        let bools: Vec<bool> = (0..130).map(|i| i % 3 == 1).collect();
        let mut bv = BitVector::with_capacity(130);
        for &b in &bools {
            bv.push(b);
        }
        assert_eq!(bv, BitVector::from_bools(&bools));
    }

    #[test]
    fn test_rank_support_rebinds_on_load() {
        let bits = BitVector::from_bools(&(0..700).map(|i| i % 5 == 0).collect::<Vec<_>>());
        let rbv = RankedBitVector::new(bits.clone());
        let mut buf = Vec::new();
        rbv.bits().write_to(&mut buf).unwrap();
        rbv.rank_support().write_to(&mut buf).unwrap();

        let mut cur = std::io::Cursor::new(buf);
        let loaded_bits = BitVector::read_from(&mut cur).unwrap();
        let rank = RankSupport::read_bound(&mut cur, &loaded_bits).unwrap();
        let loaded = RankedBitVector::from_parts(loaded_bits, rank);
        assert_eq!(loaded, rbv);
        assert_eq!(loaded.rank1(351), rbv.rank1(351));
    }

    #[test]
    fn test_read_rejects_oversized_lengths() {
        let mut buf = Vec::new();
        buf.write_u64::<LE>(u64::MAX).unwrap();
        buf.write_u64::<LE>(0b1011).unwrap();
        let err = BitVector::read_from(&mut std::io::Cursor::new(buf)).unwrap_err();
        assert!(matches!(err, GraphError::Io(_)));

        let mut buf = Vec::new();
        buf.write_u64::<LE>(3).unwrap();
        buf.write_u64::<LE>(0b1011).unwrap();
        let err = BitVector::read_from(&mut std::io::Cursor::new(buf)).unwrap_err();
        assert!(matches!(err, GraphError::Format(_)));

        let bits = BitVector::from_bools(&[true, false, true]);
        let mut buf = Vec::new();
        buf.write_u64::<LE>(3).unwrap();
        buf.write_u64::<LE>(2).unwrap();
        buf.write_u64::<LE>(u64::MAX).unwrap();
        let err = RankSupport::read_bound(&mut std::io::Cursor::new(buf), &bits).unwrap_err();
        assert!(matches!(err, GraphError::Format(_)));
    }

    #[test]
    fn test_rank_support_rejects_foreign_vector() {
        let a = BitVector::from_bools(&[true, false, true]);
        let b = BitVector::from_bools(&[true, true, true]);
        let mut buf = Vec::new();
        RankSupport::new(&a).write_to(&mut buf).unwrap();
        let err = RankSupport::read_bound(&mut std::io::Cursor::new(buf), &b).unwrap_err();
        assert!(matches!(err, GraphError::Format(_)));
    }
}
