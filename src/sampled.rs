//! Byte sequence with sampled occurrence counts.
//!
//! Every `SAMPLE_RATE` positions the cumulative count of each symbol present
//! in the sequence is stored; rank scans at most one sample block. Cheaper to
//! build than a wavelet matrix and fast on small alphabets such as DNA.

use byteorder::{LittleEndian as LE, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

use crate::fm::IntervalSymbol;
use crate::graph::GraphError;
use crate::io::read_array_bytes;

const SAMPLE_RATE: usize = 64;
const ABSENT: u8 = u8::MAX;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampledSequence {
    bytes: Vec<u8>,
    /// Present symbols, increasing.
    alphabet: Vec<u8>,
    /// Symbol -> index into `alphabet`, `ABSENT` otherwise.
    slot: [u8; 256],
    /// `samples[b * alphabet.len() + s]` = occurrences of `alphabet[s]` in
    /// `[0, b * SAMPLE_RATE)`.
    samples: Vec<u64>,
}

impl Default for SampledSequence {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl SampledSequence {
    pub fn new(bytes: Vec<u8>) -> Self {
        let mut present = [false; 256];
        for &b in &bytes {
            present[b as usize] = true;
        }
        let alphabet: Vec<u8> = (0..=255u8).filter(|&c| present[c as usize]).collect();
        let mut slot = [ABSENT; 256];
        for (i, &c) in alphabet.iter().enumerate() {
            slot[c as usize] = i as u8;
        }

        let sigma = alphabet.len();
        let blocks = bytes.len() / SAMPLE_RATE + 1;
        let mut samples = Vec::with_capacity(blocks * sigma);
        let mut counts = vec![0u64; sigma];
        for block in 0..blocks {
            samples.extend_from_slice(&counts);
            let start = block * SAMPLE_RATE;
            let end = (start + SAMPLE_RATE).min(bytes.len());
            for &b in &bytes[start.min(end)..end] {
                counts[slot[b as usize] as usize] += 1;
            }
        }

        Self {
            bytes,
            alphabet,
            slot,
            samples,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    #[inline]
    pub fn access(&self, i: usize) -> u8 {
        self.bytes[i]
    }

    #[inline]
    fn sample(&self, block: usize, slot: usize) -> usize {
        self.samples[block * self.alphabet.len() + slot] as usize
    }

    /// Occurrences of `c` in `[0, i)`.
    pub fn rank(&self, i: usize, c: u8) -> usize {
        let slot = self.slot[c as usize];
        if slot == ABSENT {
            return 0;
        }
        let i = i.min(self.bytes.len());
        let block = i / SAMPLE_RATE;
        let start = block * SAMPLE_RATE;
        self.sample(block, slot as usize) + self.bytes[start..i].iter().filter(|&&b| b == c).count()
    }

    /// Position of the `k`-th (0-based) occurrence of `c`.
    pub fn select(&self, k: usize, c: u8) -> Option<usize> {
        let slot = self.slot[c as usize];
        if slot == ABSENT {
            return None;
        }
        let slot = slot as usize;
        let blocks = self.samples.len() / self.alphabet.len();
        // last block whose prefix count is <= k
        let (mut lo, mut hi) = (0usize, blocks);
        while lo + 1 < hi {
            let mid = lo + (hi - lo) / 2;
            if self.sample(mid, slot) <= k {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        let mut seen = self.sample(lo, slot);
        for (off, &b) in self.bytes[lo * SAMPLE_RATE..].iter().enumerate() {
            if b == c {
                if seen == k {
                    return Some(lo * SAMPLE_RATE + off);
                }
                seen += 1;
            }
        }
        None
    }

    pub fn inverse_select(&self, i: usize) -> (usize, u8) {
        let c = self.bytes[i];
        (self.rank(i, c), c)
    }

    pub fn interval_symbols(&self, lb: usize, rb: usize, out: &mut Vec<IntervalSymbol>) {
        out.clear();
        if lb >= rb {
            return;
        }
        for &c in &self.alphabet {
            let rank_lb = self.rank(lb, c);
            let rank_rb = self.rank(rb, c);
            if rank_rb > rank_lb {
                out.push(IntervalSymbol {
                    symbol: c as u64,
                    rank_lb,
                    rank_rb,
                });
            }
        }
    }

    pub fn size_bytes(&self) -> usize {
        self.bytes.len() + self.samples.len() * 8
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> std::io::Result<()> {
        w.write_u64::<LE>(self.bytes.len() as u64)?;
        w.write_all(&self.bytes)
    }

    pub fn read_from<R: Read>(r: &mut R) -> Result<Self, GraphError> {
        let len = r.read_u64::<LE>()?;
        let bytes = read_array_bytes(r, len, 1)?;
        Ok(Self::new(bytes))
    }
}
