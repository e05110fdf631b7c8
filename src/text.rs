//! Sequence preprocessing: FASTA / in-memory sequences into the indexed text,
//! then suffix array, BWT and document array.
//!
//! Text layout: `seq_0 1 seq_1 1 ... 1 seq_{d-1} 0`. Every sequence is
//! followed by exactly one separator byte (1, or the terminating 0 for the
//! last one), so `d` sequences yield `d` separators.

use rayon::prelude::*;
use std::io::BufRead;
use std::path::Path;
use tracing::debug;

use crate::graph::GraphError;
use crate::radix::radix_sort_pairs_u64;

/// Separator between consecutive sequences.
pub const SEPARATOR: u8 = 1;
/// Terminator of the whole text.
pub const TERMINATOR: u8 = 0;

/// Normalized input: non-empty sequences over bytes `>= 2`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SequenceSet {
    names: Vec<String>,
    sequences: Vec<Vec<u8>>,
}

impl SequenceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one sequence. Empty sequences and separator bytes are rejected.
    pub fn push(&mut self, name: impl Into<String>, seq: Vec<u8>) -> Result<(), GraphError> {
        let name = name.into();
        if seq.is_empty() {
            return Err(GraphError::Input(format!("sequence `{name}` is empty")));
        }
        if let Some(p) = seq.iter().position(|&b| b <= SEPARATOR) {
            return Err(GraphError::Input(format!(
                "sequence `{name}` contains reserved byte {} at {p}",
                seq[p]
            )));
        }
        self.names.push(name);
        self.sequences.push(seq);
        Ok(())
    }

    /// Unnamed sequences, numbered in order.
    pub fn from_sequences<I, S>(sequences: I) -> Result<Self, GraphError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<[u8]>,
    {
        let mut set = Self::new();
        for (i, s) in sequences.into_iter().enumerate() {
            set.push(format!("seq{i}"), s.as_ref().to_vec())?;
        }
        Ok(set)
    }

    /// Parse FASTA. Header lines start with `>`; line breaks (`\n`, `\r\n`)
    /// inside a record are dropped.
    pub fn from_fasta<R: BufRead>(reader: R) -> Result<Self, GraphError> {
        let mut set = Self::new();
        let mut name: Option<String> = None;
        let mut seq = Vec::new();
        for line in reader.split(b'\n') {
            let mut line = line?;
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            if let Some(header) = line.strip_prefix(b">") {
                if let Some(prev) = name.take() {
                    set.push(prev, std::mem::take(&mut seq))?;
                }
                name = Some(String::from_utf8_lossy(header).trim().to_string());
            } else if name.is_some() {
                seq.extend_from_slice(&line);
            } else if !line.is_empty() {
                return Err(GraphError::Input("FASTA data before the first header".into()));
            }
        }
        if let Some(prev) = name {
            set.push(prev, seq)?;
        }
        if set.is_empty() {
            return Err(GraphError::Input("no sequence found".into()));
        }
        Ok(set)
    }

    pub fn from_fasta_path(path: &Path) -> Result<Self, GraphError> {
        let file = std::fs::File::open(path)?;
        Self::from_fasta(std::io::BufReader::new(file))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.sequences.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn sequences(&self) -> &[Vec<u8>] {
        &self.sequences
    }

    pub fn lengths(&self) -> Vec<u64> {
        self.sequences.iter().map(|s| s.len() as u64).collect()
    }

    /// Concatenated text with separators and terminator.
    pub fn text(&self) -> Vec<u8> {
        let total: usize = self.sequences.iter().map(|s| s.len() + 1).sum();
        let mut text = Vec::with_capacity(total);
        for (i, s) in self.sequences.iter().enumerate() {
            if i > 0 {
                text.push(SEPARATOR);
            }
            text.extend_from_slice(s);
        }
        text.push(TERMINATOR);
        text
    }
}

/// Suffix array by prefix doubling. `text` must end with a unique smallest
/// byte (the terminator).
pub fn suffix_array(text: &[u8]) -> Result<Vec<u64>, GraphError> {
    let n = text.len();
    if n as u64 >= u32::MAX as u64 {
        return Err(GraphError::Input(format!("text of {n} bytes is too long")));
    }
    let mut sa: Vec<u64> = (0..n as u64).collect();
    if n <= 1 {
        return Ok(sa);
    }
    let mut rank: Vec<u64> = text.iter().map(|&b| b as u64).collect();
    let mut next_rank = vec![0u64; n];
    let mut h = 1usize;
    let mut rounds = 0usize;
    loop {
        let mut keys: Vec<u64> = sa
            .par_iter()
            .map(|&i| {
                let i = i as usize;
                let second = if i + h < n { rank[i + h] + 1 } else { 0 };
                (rank[i] << 32) | second
            })
            .collect();
        radix_sort_pairs_u64(&mut keys, &mut sa);

        let mut r = 0u64;
        next_rank[sa[0] as usize] = 0;
        for t in 1..n {
            if keys[t] != keys[t - 1] {
                r += 1;
            }
            next_rank[sa[t] as usize] = r;
        }
        std::mem::swap(&mut rank, &mut next_rank);
        rounds += 1;
        if r as usize == n - 1 || h >= n {
            break;
        }
        h *= 2;
    }
    debug!(n, rounds, "suffix array built");
    Ok(sa)
}

/// `bwt[i] = text[sa[i] - 1]`, cyclically.
pub fn bwt(text: &[u8], sa: &[u64]) -> Vec<u8> {
    let n = text.len();
    sa.par_iter()
        .map(|&p| text[(p as usize + n - 1) % n])
        .collect()
}

/// `da[i]` = id of the sequence containing suffix `sa[i]`. A separator
/// belongs to the sequence it closes.
pub fn document_array(sa: &[u64], lengths: &[u64]) -> Vec<u64> {
    let mut endpos = Vec::with_capacity(lengths.len());
    let mut acc = 0u64;
    for (i, &len) in lengths.iter().enumerate() {
        acc += len + u64::from(i > 0);
        endpos.push(acc);
    }
    sa.par_iter()
        .map(|&p| endpos.partition_point(|&e| e < p) as u64)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn naive_sa(text: &[u8]) -> Vec<u64> {
        let mut sa: Vec<u64> = (0..text.len() as u64).collect();
        sa.sort_by(|&a, &b| text[a as usize..].cmp(&text[b as usize..]));
        sa
    }

    #[test]
    fn test_text_layout() {
        let set = SequenceSet::from_sequences(["AC", "AG"]).unwrap();
        assert_eq!(set.text(), b"AC\x01AG\x00".to_vec());
        assert_eq!(set.lengths(), vec![2, 2]);
    }

    #[test]
    fn test_rejects_reserved_bytes() {
        assert!(matches!(
            SequenceSet::from_sequences([b"AC\x01G".to_vec()]),
            Err(GraphError::Input(_))
        ));
        assert!(SequenceSet::from_sequences([b"".to_vec()]).is_err());
    }

    #[test]
    fn test_fasta() {
        let fasta = b">one first\nACGT\nAC\r\n>two\n\nGGA\n";
        let set = SequenceSet::from_fasta(&fasta[..]).unwrap();
        assert_eq!(set.names(), &["one first".to_string(), "two".to_string()]);
        assert_eq!(set.sequences(), &[b"ACGTAC".to_vec(), b"GGA".to_vec()]);
        assert_eq!(set.lengths(), vec![6, 3]);
        assert!(SequenceSet::from_fasta(&b"ACGT\n"[..]).is_err());
        assert!(SequenceSet::from_fasta(&b""[..]).is_err());
    }

    #[test]
    fn test_suffix_array_small() {
        let text = b"AC\x01AG\x00";
        assert_eq!(suffix_array(text).unwrap(), vec![5, 2, 0, 3, 1, 4]);
        let sa = suffix_array(text).unwrap();
        assert_eq!(bwt(text, &sa), b"GC\x00\x01AA".to_vec());
        assert_eq!(document_array(&sa, &[2, 2]), vec![1, 0, 0, 1, 0, 1]);
    }

    #[test]
    fn test_suffix_array_matches_naive() {
        for text in [
            &b"ACGT\x00"[..],
            b"AAAAAAAAAA\x01AAAA\x00",
            b"GATTACA\x01TACAGAT\x01CATTAG\x00",
            b"ABABABABABABABABABABAB\x00",
        ] {
            assert_eq!(suffix_array(text).unwrap(), naive_sa(text));
        }
    }
}
