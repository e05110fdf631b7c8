//! Threshold LCP: for every BWT boundary, whether the LCP of the two adjacent
//! suffixes is below, equal to or above `k`.
//!
//! Boundary `b` sits between BWT positions `b - 1` and `b`; boundaries `0` and
//! `n` close the array. SA intervals are enumerated breadth-first by backward
//! extension. An interval whose end boundary is already classified is never
//! expanded again, so every boundary is touched once. At depth `d` a fresh
//! boundary has LCP exactly `d`.
//!
//! The frontier of one depth is held either as a list of pairs (few
//! intervals) or as a bit vector of `2(n + 1)` bits with interval `[a, b)`
//! stored as bits `2a + 1` and `2b` (many intervals). The representation is
//! chosen per depth from the number of live intervals.

use tracing::debug;

use crate::fm::{IntervalSymbol, SymbolIndex};
use crate::succinct::BitVector;
use crate::text::SEPARATOR;

/// LCP classification of one boundary relative to `k`.
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LcpClass {
    /// Not yet discovered. Never present in a finished array.
    Unset = 0,
    Less = 1,
    Equal = 2,
    Greater = 3,
}

impl LcpClass {
    #[inline]
    fn from_bits(bits: u64) -> Self {
        match bits & 0b11 {
            0 => Self::Unset,
            1 => Self::Less,
            2 => Self::Equal,
            _ => Self::Greater,
        }
    }
}

const PER_WORD: usize = 32;

/// Packed 2-bit [`LcpClass`] array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LcpClasses {
    words: Vec<u64>,
    len: usize,
}

impl LcpClasses {
    pub fn new(len: usize) -> Self {
        Self {
            words: vec![0u64; len.div_ceil(PER_WORD)],
            len,
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

    #[inline]
    pub fn get(&self, i: usize) -> LcpClass {
        assert!(i < self.len, "boundary {i} out of bounds (len={})", self.len);
        LcpClass::from_bits(self.words[i / PER_WORD] >> (2 * (i % PER_WORD)))
    }

    #[inline]
    pub fn set(&mut self, i: usize, class: LcpClass) {
        assert!(i < self.len, "boundary {i} out of bounds (len={})", self.len);
        let shift = 2 * (i % PER_WORD);
        let w = &mut self.words[i / PER_WORD];
        *w = (*w & !(0b11 << shift)) | ((class as u64) << shift);
    }

    pub fn iter(&self) -> impl Iterator<Item = LcpClass> + '_ {
        (0..self.len).map(|i| self.get(i))
    }

    /// Count of each class, indexed by the class discriminant.
    pub fn histogram(&self) -> [usize; 4] {
        let mut h = [0usize; 4];
        for c in self.iter() {
            h[c as usize] += 1;
        }
        h
    }
}

enum Frontier {
    Queue(Vec<(usize, usize)>),
    Bits(BitVector),
}

impl Frontier {
    fn for_count(count: usize, threshold: usize, n: usize) -> Self {
        if count < threshold {
            Self::Queue(Vec::with_capacity(count))
        } else {
            Self::Bits(BitVector::zeros(2 * (n + 1)))
        }
    }

    #[inline]
    fn push(&mut self, a: usize, b: usize) {
        match self {
            Self::Queue(q) => q.push((a, b)),
            Self::Bits(bits) => {
                bits.set(2 * a + 1, true);
                bits.set(2 * b, true);
            }
        }
    }

    fn intervals(&self) -> Box<dyn Iterator<Item = (usize, usize)> + '_> {
        match self {
            Self::Queue(q) => Box::new(q.iter().copied()),
            Self::Bits(bits) => {
                let mut ones = bits.ones();
                Box::new(std::iter::from_fn(move || {
                    let a = ones.next()?;
                    let b = ones.next()?;
                    Some(((a - 1) >> 1, b >> 1))
                }))
            }
        }
    }
}

/// Builder for [`LcpClasses`].
#[derive(Debug, Clone, Copy)]
pub struct PartialLcp {
    k: usize,
    queue_threshold: Option<usize>,
}

impl PartialLcp {
    pub fn new(k: usize) -> Self {
        Self {
            k,
            queue_threshold: None,
        }
    }

    /// Hold the frontier as a list while it has fewer than `t` intervals
    /// (default `n / 2048`).
    pub fn with_queue_threshold(mut self, t: usize) -> Self {
        self.queue_threshold = Some(t);
        self
    }

    pub fn build<I: SymbolIndex + ?Sized>(&self, bwt: &I, c_array: &[u64]) -> LcpClasses {
        let n = bwt.len();
        let threshold = self.queue_threshold.unwrap_or(n / 2048);
        let mut lcp = LcpClasses::new(n + 1);
        let mut symbols: Vec<IntervalSymbol> = Vec::new();

        let mut marker = if self.k == 0 {
            LcpClass::Equal
        } else {
            LcpClass::Less
        };
        lcp.set(0, marker);

        // Depth 0: one interval per first character. Separator suffixes are
        // pairwise distinct, so each gets a singleton instead of a shared
        // interval.
        let mut seeds = Vec::new();
        bwt.interval_symbols(0, n, &mut symbols);
        for s in &symbols {
            if s.symbol == SEPARATOR as u64 {
                continue;
            }
            let base = c_array[s.symbol as usize] as usize;
            seeds.push((base + s.rank_lb, base + s.rank_rb));
        }
        let sep = c_array[SEPARATOR as usize] as usize..c_array[SEPARATOR as usize + 1] as usize;
        seeds.extend(sep.map(|i| (i, i + 1)));

        let mut frontier = Frontier::Queue(Vec::new());
        let mut count = 0usize;
        for (a, b) in seeds {
            if lcp.get(b) == LcpClass::Unset {
                lcp.set(b, marker);
                frontier.push(a, b);
                count += 1;
            }
        }

        let mut depth = 1usize;
        while count > 0 && depth <= self.k {
            if depth == self.k {
                marker = LcpClass::Equal;
            }
            let mut next = Frontier::for_count(count, threshold, n);
            let mut next_count = 0usize;
            for (a, b) in frontier.intervals() {
                bwt.interval_symbols(a, b, &mut symbols);
                for s in &symbols {
                    let base = c_array[s.symbol as usize] as usize;
                    let (a_new, b_new) = (base + s.rank_lb, base + s.rank_rb);
                    if lcp.get(b_new) == LcpClass::Unset {
                        lcp.set(b_new, marker);
                        next.push(a_new, b_new);
                        next_count += 1;
                    }
                }
            }
            debug!(depth, intervals = next_count, queue = matches!(next, Frontier::Queue(_)), "lcp depth done");
            frontier = next;
            count = next_count;
            depth += 1;
        }

        for b in 0..lcp.len() {
            if lcp.get(b) == LcpClass::Unset {
                lcp.set(b, LcpClass::Greater);
            }
        }
        lcp
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fm::{BwtIndex, SymbolBackend, c_array};
    use crate::text::{bwt, suffix_array};

    fn brute_force(text: &[u8], k: usize) -> Vec<LcpClass> {
        let sa = suffix_array(text).unwrap();
        let n = text.len();
        let mut out = vec![LcpClass::Less; n + 1];
        for b in 1..n {
            let x = &text[sa[b - 1] as usize..];
            let y = &text[sa[b] as usize..];
            let l = x
                .iter()
                .zip(y)
                .take_while(|(p, q)| p == q && **p > SEPARATOR)
                .count();
            out[b] = match l.cmp(&k) {
                std::cmp::Ordering::Less => LcpClass::Less,
                std::cmp::Ordering::Equal => LcpClass::Equal,
                std::cmp::Ordering::Greater => LcpClass::Greater,
            };
        }
        out
    }

    fn classes(text: &[u8], k: usize, threshold: usize) -> Vec<LcpClass> {
        let sa = suffix_array(text).unwrap();
        let idx = BwtIndex::new(&bwt(text, &sa), SymbolBackend::Wavelet);
        let c = c_array(&idx);
        PartialLcp::new(k)
            .with_queue_threshold(threshold)
            .build(&idx, &c)
            .iter()
            .collect()
    }

    #[test]
    fn test_packed_classes() {
        let mut lcp = LcpClasses::new(70);
        lcp.set(0, LcpClass::Less);
        lcp.set(33, LcpClass::Greater);
        lcp.set(69, LcpClass::Equal);
        lcp.set(33, LcpClass::Equal);
        assert_eq!(lcp.get(0), LcpClass::Less);
        assert_eq!(lcp.get(33), LcpClass::Equal);
        assert_eq!(lcp.get(69), LcpClass::Equal);
        assert_eq!(lcp.get(34), LcpClass::Unset);
        assert_eq!(lcp.histogram(), [67, 1, 2, 0]);
    }

    #[test]
    fn test_matches_brute_force_both_frontiers() {
        let texts: [&[u8]; 4] = [
            b"ACGT\x00",
            b"AC\x01AG\x00",
            b"GATTACAGATTACA\x01ATTAC\x01TTTTTTTT\x00",
            b"ACACACACGTGTACAC\x01CACACA\x00",
        ];
        for text in texts {
            for k in 1..6 {
                let expected = brute_force(text, k);
                assert_eq!(classes(text, k, usize::MAX), expected, "queue, k={k}");
                assert_eq!(classes(text, k, 0), expected, "bits, k={k}");
            }
        }
    }

    #[test]
    fn test_no_unset_left() {
        let text = b"AAAAAAAAAAAAAAAA\x00";
        let got = classes(text, 3, 0);
        assert!(!got.contains(&LcpClass::Unset));
        assert!(got.contains(&LcpClass::Greater));
        assert_eq!(got[0], LcpClass::Less);
        assert_eq!(got[text.len()], LcpClass::Less);
    }
}
