//! Wavelet matrix over fixed-width integer symbols.
//!
//! One bit vector per bit of the symbol code (MSB first). At every level the
//! sequence is stably partitioned, 0-bits first, so a symbol's occurrences end
//! up contiguous at the last level. Supports:
//!
//! - `access(i)` / `inverse_select(i)` in O(w)
//! - `rank(i, c)`: occurrences of `c` in `[0, i)` in O(w)
//! - `select(k, c)`: position of the `k`-th `c` (0-based) in O(w log n)
//! - `interval_symbols(lb, rb)`: every distinct symbol of `[lb, rb)` with its
//!   rank at both ends, in increasing symbol order, in O(d · w) for `d`
//!   distinct symbols
//!
//! where `w` is the code width in bits.

use byteorder::{LittleEndian as LE, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

use crate::fm::IntervalSymbol;
use crate::graph::GraphError;
use crate::succinct::{BitVector, RankedBitVector};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WaveletMatrix {
    levels: Vec<RankedBitVector>,
    width: usize,
    len: usize,
}

impl WaveletMatrix {
    /// Build from a symbol sequence. The code width is taken from the largest
    /// symbol (at least one bit).
    pub fn new(sequence: &[u64]) -> Self {
        let max = sequence.iter().copied().max().unwrap_or(0);
        let width = (64 - max.leading_zeros() as usize).max(1);
        Self::with_width(sequence, width)
    }

    /// Build a byte sequence with the full 8-bit code width.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let seq: Vec<u64> = bytes.iter().map(|&b| b as u64).collect();
        Self::with_width(&seq, 8)
    }

    fn with_width(sequence: &[u64], width: usize) -> Self {
        let mut levels = Vec::with_capacity(width);
        let mut current: Vec<u64> = sequence.to_vec();
        let mut zeros = Vec::with_capacity(current.len());
        let mut ones = Vec::with_capacity(current.len());

        for level in 0..width {
            let bit_pos = width - 1 - level;
            let mut bits = BitVector::with_capacity(current.len());
            zeros.clear();
            ones.clear();
            for &code in &current {
                let bit = (code >> bit_pos) & 1 == 1;
                bits.push(bit);
                if bit {
                    ones.push(code);
                } else {
                    zeros.push(code);
                }
            }
            levels.push(RankedBitVector::new(bits));
            current.clear();
            current.extend_from_slice(&zeros);
            current.extend_from_slice(&ones);
        }

        Self {
            levels,
            width,
            len: sequence.len(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of representable symbols (`2^width`).
    pub fn sigma(&self) -> u64 {
        1u64 << self.width
    }

    #[inline]
    fn step(level: &RankedBitVector, pos: usize, bit: bool) -> usize {
        if bit {
            level.count_zeros() + level.rank1(pos)
        } else {
            level.rank0(pos)
        }
    }

    /// Symbol at position `i`. Panics if `i >= len`.
    pub fn access(&self, i: usize) -> u64 {
        self.inverse_select(i).1
    }

    /// `(rank(i, s), s)` where `s` is the symbol at `i`. Panics if `i >= len`.
    pub fn inverse_select(&self, i: usize) -> (usize, u64) {
        assert!(i < self.len, "index {i} out of bounds (len={})", self.len);
        let mut pos = i;
        let mut start = 0usize;
        let mut code = 0u64;
        for level in &self.levels {
            let bit = level.get(pos);
            code = (code << 1) | bit as u64;
            pos = Self::step(level, pos, bit);
            start = Self::step(level, start, bit);
        }
        (pos - start, code)
    }

    /// Occurrences of `symbol` in `[0, i)`.
    pub fn rank(&self, i: usize, symbol: u64) -> usize {
        if self.width < 64 && symbol >> self.width != 0 {
            return 0;
        }
        let mut lo = 0usize;
        let mut hi = i.min(self.len);
        for (level, bv) in self.levels.iter().enumerate() {
            let bit = (symbol >> (self.width - 1 - level)) & 1 == 1;
            lo = Self::step(bv, lo, bit);
            hi = Self::step(bv, hi, bit);
        }
        hi - lo
    }

    /// Position of the `k`-th (0-based) occurrence of `symbol`.
    pub fn select(&self, k: usize, symbol: u64) -> Option<usize> {
        if self.is_empty() || (self.width < 64 && symbol >> self.width != 0) {
            return None;
        }
        let mut lo = 0usize;
        let mut hi = self.len;
        for (level, bv) in self.levels.iter().enumerate() {
            let bit = (symbol >> (self.width - 1 - level)) & 1 == 1;
            lo = Self::step(bv, lo, bit);
            hi = Self::step(bv, hi, bit);
        }
        if k >= hi - lo {
            return None;
        }
        let mut pos = lo + k;
        for (level, bv) in self.levels.iter().enumerate().rev() {
            let bit = (symbol >> (self.width - 1 - level)) & 1 == 1;
            pos = if bit {
                bv.select1(pos - bv.count_zeros())?
            } else {
                bv.select0(pos)?
            };
        }
        Some(pos)
    }

    /// Report every distinct symbol in `[lb, rb)` together with
    /// `rank(lb, c)` and `rank(rb, c)`. `out` is cleared first.
    pub fn interval_symbols(&self, lb: usize, rb: usize, out: &mut Vec<IntervalSymbol>) {
        out.clear();
        if lb >= rb {
            return;
        }
        // (level, code prefix, mapped 0, mapped lb, mapped rb)
        let mut stack: Vec<(usize, u64, usize, usize, usize)> = vec![(0, 0, 0, lb, rb)];
        while let Some((level, code, start, a, b)) = stack.pop() {
            if level == self.width {
                out.push(IntervalSymbol {
                    symbol: code,
                    rank_lb: a - start,
                    rank_rb: b - start,
                });
                continue;
            }
            let bv = &self.levels[level];
            let (a1, b1) = (Self::step(bv, a, true), Self::step(bv, b, true));
            if b1 > a1 {
                stack.push((level + 1, (code << 1) | 1, Self::step(bv, start, true), a1, b1));
            }
            let (a0, b0) = (Self::step(bv, a, false), Self::step(bv, b, false));
            if b0 > a0 {
                stack.push((level + 1, code << 1, Self::step(bv, start, false), a0, b0));
            }
        }
    }

    pub fn size_bytes(&self) -> usize {
        self.levels.iter().map(RankedBitVector::size_bytes).sum()
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> std::io::Result<()> {
        w.write_u64::<LE>(self.len as u64)?;
        w.write_u64::<LE>(self.width as u64)?;
        for level in &self.levels {
            level.bits().write_to(w)?;
        }
        Ok(())
    }

    pub fn read_from<R: Read>(r: &mut R) -> Result<Self, GraphError> {
        let len = r.read_u64::<LE>()? as usize;
        let width = r.read_u64::<LE>()? as usize;
        if width == 0 || width > 64 {
            return Err(GraphError::Format(format!("wavelet matrix width {width}")));
        }
        let mut levels = Vec::with_capacity(width);
        for _ in 0..width {
            let bits = BitVector::read_from(r)?;
            if bits.len() != len {
                return Err(GraphError::Format("wavelet level length mismatch".into()));
            }
            levels.push(RankedBitVector::new(bits));
        }
        Ok(Self { levels, width, len })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn naive_rank(seq: &[u64], i: usize, c: u64) -> usize {
        seq[..i].iter().filter(|&&s| s == c).count()
    }

    #[test]
    fn test_empty() {
        let wm = WaveletMatrix::new(&[]);
        assert!(wm.is_empty());
        assert_eq!(wm.rank(0, 0), 0);
        assert_eq!(wm.select(0, 0), None);
        let mut out = Vec::new();
        wm.interval_symbols(0, 0, &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn test_small() {
        let seq = vec![0, 1, 0, 2, 1, 0, 2, 2];
        let wm = WaveletMatrix::new(&seq);
        for (i, &s) in seq.iter().enumerate() {
            assert_eq!(wm.access(i), s);
            assert_eq!(wm.inverse_select(i), (naive_rank(&seq, i, s), s));
        }
        assert_eq!(wm.rank(8, 0), 3);
        assert_eq!(wm.rank(5, 1), 2);
        assert_eq!(wm.rank(4, 2), 1);
        assert_eq!(wm.rank(8, 3), 0);
        assert_eq!(wm.select(0, 0), Some(0));
        assert_eq!(wm.select(2, 0), Some(5));
        assert_eq!(wm.select(3, 0), None);
        assert_eq!(wm.select(1, 1), Some(4));
        assert_eq!(wm.select(2, 2), Some(7));
    }

    #[test]
    fn test_bytes_rank_select() {
        let text = b"GC\x00\x01AATTGCA\x01CCG";
        let wm = WaveletMatrix::from_bytes(text);
        let seq: Vec<u64> = text.iter().map(|&b| b as u64).collect();
        for c in [0u64, 1, b'A' as u64, b'C' as u64, b'G' as u64, b'T' as u64, b'N' as u64] {
            for i in 0..=seq.len() {
                assert_eq!(wm.rank(i, c), naive_rank(&seq, i, c), "rank({i}, {c})");
            }
            let count = wm.rank(seq.len(), c);
            for k in 0..count {
                let pos = wm.select(k, c).unwrap();
                assert_eq!(seq[pos], c);
                assert_eq!(naive_rank(&seq, pos, c), k);
            }
        }
    }

    #[test]
    fn test_interval_symbols_matches_naive() {
        let seq: Vec<u64> = (0..300u64).map(|i| (i * 7 + i / 13) % 11).collect();
        let wm = WaveletMatrix::new(&seq);
        let mut out = Vec::new();
        for (lb, rb) in [(0, 300), (5, 6), (17, 90), (299, 300), (120, 121), (40, 40)] {
            wm.interval_symbols(lb, rb, &mut out);
            let mut expected: Vec<u64> = seq[lb..rb].to_vec();
            expected.sort_unstable();
            expected.dedup();
            let got: Vec<u64> = out.iter().map(|s| s.symbol).collect();
            assert_eq!(got, expected, "symbols of [{lb}, {rb})");
            for s in &out {
                assert_eq!(s.rank_lb, naive_rank(&seq, lb, s.symbol));
                assert_eq!(s.rank_rb, naive_rank(&seq, rb, s.symbol));
            }
        }
    }

    #[test]
    fn test_single_symbol_repeated() {
        let wm = WaveletMatrix::new(&[0, 0, 0, 0]);
        assert_eq!(wm.rank(3, 0), 3);
        assert_eq!(wm.select(2, 0), Some(2));
        let mut out = Vec::new();
        wm.interval_symbols(1, 4, &mut out);
        assert_eq!(out, vec![IntervalSymbol { symbol: 0, rank_lb: 1, rank_rb: 4 }]);
    }

    #[test]
    fn test_write_read() {
        let wm = WaveletMatrix::from_bytes(b"ACGT\x01GGA\x00");
        let mut buf = Vec::new();
        wm.write_to(&mut buf).unwrap();
        let loaded = WaveletMatrix::read_from(&mut std::io::Cursor::new(buf)).unwrap();
        assert_eq!(loaded, wm);
    }
}
