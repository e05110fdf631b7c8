//! FM-index capability over a BWT.
//!
//! The graph only needs rank/select-style queries on the BWT; which structure
//! answers them is a construction-time choice ([`SymbolBackend`]). [`BwtIndex`]
//! dispatches statically over the two backends shipped with the crate.

use std::io::{Read, Write};

use crate::graph::GraphError;
use crate::sampled::SampledSequence;
use crate::wavelet::WaveletMatrix;

/// One distinct symbol of a range `[lb, rb)` with its rank at both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntervalSymbol {
    pub symbol: u64,
    /// `rank(lb, symbol)`
    pub rank_lb: usize,
    /// `rank(rb, symbol)`
    pub rank_rb: usize,
}

/// Rank/select queries over a symbol sequence.
pub trait SymbolIndex {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Occurrences of `c` in `[0, i)`.
    fn rank(&self, i: usize, c: u64) -> usize;

    /// Position of the `k`-th (0-based) occurrence of `c`.
    fn select(&self, k: usize, c: u64) -> Option<usize>;

    fn access(&self, i: usize) -> u64;

    /// `(rank(i, s), s)` for the symbol `s` at `i`.
    fn inverse_select(&self, i: usize) -> (usize, u64);

    /// Distinct symbols of `[lb, rb)` in increasing order; `out` is cleared.
    fn interval_symbols(&self, lb: usize, rb: usize, out: &mut Vec<IntervalSymbol>);
}

impl SymbolIndex for WaveletMatrix {
    fn len(&self) -> usize {
        WaveletMatrix::len(self)
    }
    fn rank(&self, i: usize, c: u64) -> usize {
        WaveletMatrix::rank(self, i, c)
    }
    fn select(&self, k: usize, c: u64) -> Option<usize> {
        WaveletMatrix::select(self, k, c)
    }
    fn access(&self, i: usize) -> u64 {
        WaveletMatrix::access(self, i)
    }
    fn inverse_select(&self, i: usize) -> (usize, u64) {
        WaveletMatrix::inverse_select(self, i)
    }
    fn interval_symbols(&self, lb: usize, rb: usize, out: &mut Vec<IntervalSymbol>) {
        WaveletMatrix::interval_symbols(self, lb, rb, out)
    }
}

impl SymbolIndex for SampledSequence {
    fn len(&self) -> usize {
        SampledSequence::len(self)
    }
    fn rank(&self, i: usize, c: u64) -> usize {
        match u8::try_from(c) {
            Ok(c) => SampledSequence::rank(self, i, c),
            Err(_) => 0,
        }
    }
    fn select(&self, k: usize, c: u64) -> Option<usize> {
        SampledSequence::select(self, k, u8::try_from(c).ok()?)
    }
    fn access(&self, i: usize) -> u64 {
        SampledSequence::access(self, i) as u64
    }
    fn inverse_select(&self, i: usize) -> (usize, u64) {
        let (r, c) = SampledSequence::inverse_select(self, i);
        (r, c as u64)
    }
    fn interval_symbols(&self, lb: usize, rb: usize, out: &mut Vec<IntervalSymbol>) {
        SampledSequence::interval_symbols(self, lb, rb, out)
    }
}

/// BWT representation chosen at construction time.
#[repr(u8)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum SymbolBackend {
    /// Wavelet matrix over 8-bit codes.
    #[default]
    Wavelet = 0,
    /// Plain bytes with sampled occurrence counts.
    Sampled = 1,
}

impl SymbolBackend {
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::Wavelet),
            1 => Some(Self::Sampled),
            _ => None,
        }
    }

    pub fn tag(self) -> u8 {
        self as u8
    }
}

impl std::str::FromStr for SymbolBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "wavelet" | "wm" => Ok(Self::Wavelet),
            "sampled" | "occ" => Ok(Self::Sampled),
            other => Err(format!("unknown backend `{other}` (expected wavelet|sampled)")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BwtIndex {
    Wavelet(WaveletMatrix),
    Sampled(SampledSequence),
}

impl BwtIndex {
    pub fn new(bwt: &[u8], backend: SymbolBackend) -> Self {
        match backend {
            SymbolBackend::Wavelet => Self::Wavelet(WaveletMatrix::from_bytes(bwt)),
            SymbolBackend::Sampled => Self::Sampled(SampledSequence::new(bwt.to_vec())),
        }
    }

    pub fn backend(&self) -> SymbolBackend {
        match self {
            Self::Wavelet(_) => SymbolBackend::Wavelet,
            Self::Sampled(_) => SymbolBackend::Sampled,
        }
    }

    pub fn size_bytes(&self) -> usize {
        match self {
            Self::Wavelet(wm) => wm.size_bytes(),
            Self::Sampled(s) => s.size_bytes(),
        }
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> std::io::Result<()> {
        match self {
            Self::Wavelet(wm) => wm.write_to(w),
            Self::Sampled(s) => s.write_to(w),
        }
    }

    pub fn read_from<R: Read>(r: &mut R, backend: SymbolBackend) -> Result<Self, GraphError> {
        Ok(match backend {
            SymbolBackend::Wavelet => Self::Wavelet(WaveletMatrix::read_from(r)?),
            SymbolBackend::Sampled => Self::Sampled(SampledSequence::read_from(r)?),
        })
    }
}

impl SymbolIndex for BwtIndex {
    fn len(&self) -> usize {
        match self {
            Self::Wavelet(wm) => SymbolIndex::len(wm),
            Self::Sampled(s) => SymbolIndex::len(s),
        }
    }
    fn rank(&self, i: usize, c: u64) -> usize {
        match self {
            Self::Wavelet(wm) => SymbolIndex::rank(wm, i, c),
            Self::Sampled(s) => SymbolIndex::rank(s, i, c),
        }
    }
    fn select(&self, k: usize, c: u64) -> Option<usize> {
        match self {
            Self::Wavelet(wm) => SymbolIndex::select(wm, k, c),
            Self::Sampled(s) => SymbolIndex::select(s, k, c),
        }
    }
    fn access(&self, i: usize) -> u64 {
        match self {
            Self::Wavelet(wm) => SymbolIndex::access(wm, i),
            Self::Sampled(s) => SymbolIndex::access(s, i),
        }
    }
    fn inverse_select(&self, i: usize) -> (usize, u64) {
        match self {
            Self::Wavelet(wm) => SymbolIndex::inverse_select(wm, i),
            Self::Sampled(s) => SymbolIndex::inverse_select(s, i),
        }
    }
    fn interval_symbols(&self, lb: usize, rb: usize, out: &mut Vec<IntervalSymbol>) {
        match self {
            Self::Wavelet(wm) => SymbolIndex::interval_symbols(wm, lb, rb, out),
            Self::Sampled(s) => SymbolIndex::interval_symbols(s, lb, rb, out),
        }
    }
}

/// Cumulative symbol counts: `c[s]` is the number of BWT symbols `< s`.
pub fn c_array<I: SymbolIndex + ?Sized>(index: &I) -> Vec<u64> {
    let n = index.len();
    let mut counts = vec![0u64; 256];
    let mut out = Vec::new();
    index.interval_symbols(0, n, &mut out);
    for s in &out {
        if let Some(slot) = counts.get_mut(s.symbol as usize) {
            *slot = s.rank_rb as u64;
        }
    }
    let mut sum = 0u64;
    for c in counts.iter_mut() {
        let tmp = *c;
        *c = sum;
        sum += tmp;
    }
    counts
}

/// Largest symbol `c` with `c_array[c] <= i`, i.e. the first character of the
/// suffix at BWT position `i`.
pub fn first_symbol(c_array: &[u64], i: usize) -> u64 {
    (c_array.partition_point(|&c| c <= i as u64) - 1) as u64
}
