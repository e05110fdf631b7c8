//! Graph statistics report.

use std::fmt;

use crate::fm::IntervalSymbol;
use crate::graph::CompressedGraph;

#[derive(Debug, Clone, PartialEq)]
pub struct GraphStats {
    pub k: usize,
    pub nodes: u64,
    /// Nodes occurring once.
    pub unique_nodes: u64,
    pub repeat_nodes: u64,
    /// Sum of node occurrences.
    pub labels: u64,
    /// Occurrences with a successor (stop nodes have none).
    pub edges: u64,
    pub max_length: u64,
    pub avg_length: f64,
    pub avg_length_unique: f64,
    pub avg_length_repeat: f64,
    /// `nodes_by_sequences[j]`: nodes whose label occurs in exactly `j`
    /// sequences. Empty without a document index.
    pub nodes_by_sequences: Vec<u64>,
    /// `pairs[a][b]` (`a <= b`): nodes shared by sequences `a` and `b`.
    pub pairs: Vec<Vec<u64>>,
}

fn mean(sum: u64, count: u64) -> f64 {
    if count == 0 { 0.0 } else { sum as f64 / count as f64 }
}

impl GraphStats {
    pub fn compute(graph: &CompressedGraph) -> Self {
        let (mut labels, mut unique, mut repeat) = (0u64, 0u64, 0u64);
        let (mut sum_len, mut sum_unique, mut sum_repeat, mut max_length) = (0u64, 0u64, 0u64, 0u64);
        for node in graph.nodes() {
            labels += node.size;
            sum_len += node.len;
            max_length = max_length.max(node.len);
            if node.size == 1 {
                unique += 1;
                sum_unique += node.len;
            } else {
                repeat += 1;
                sum_repeat += node.len;
            }
        }
        let node_count = graph.node_count() as u64;

        let mut nodes_by_sequences = Vec::new();
        let mut pairs = Vec::new();
        if let Some(doc) = graph.document_index() {
            let d = graph.sequence_count();
            nodes_by_sequences = vec![0u64; d + 1];
            pairs = vec![vec![0u64; d]; d];
            let mut seqs: Vec<IntervalSymbol> = Vec::new();
            for node in graph.nodes() {
                let lb = node.lb as usize;
                doc.interval_symbols(lb, lb + node.size as usize, &mut seqs);
                nodes_by_sequences[seqs.len()] += 1;
                for (i, a) in seqs.iter().enumerate() {
                    for b in &seqs[i..] {
                        pairs[a.symbol as usize][b.symbol as usize] += 1;
                    }
                }
            }
        }

        Self {
            k: graph.k(),
            nodes: node_count,
            unique_nodes: unique,
            repeat_nodes: repeat,
            labels,
            edges: labels - graph.stop_nodes().len() as u64,
            max_length,
            avg_length: mean(sum_len, node_count),
            avg_length_unique: mean(sum_unique, unique),
            avg_length_repeat: mean(sum_repeat, repeat),
            nodes_by_sequences,
            pairs,
        }
    }
}

impl fmt::Display for GraphStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "           k={:>10}", self.k)?;
        writeln!(f, "       nodes={:>10}", self.nodes)?;
        writeln!(f, "unique nodes={:>10}", self.unique_nodes)?;
        writeln!(f, "repeat nodes={:>10}", self.repeat_nodes)?;
        writeln!(f, "      labels={:>10}", self.labels)?;
        writeln!(f, "       edges={:>10}", self.edges)?;
        writeln!(f)?;
        writeln!(f, "max_length={}", self.max_length)?;
        writeln!(f, "avg_length={:.4}", self.avg_length)?;
        writeln!(f, "avg_length(unique_nodes)={:.4}", self.avg_length_unique)?;
        writeln!(f, "avg_length(repeat_nodes)={:.4}", self.avg_length_repeat)?;
        if self.nodes_by_sequences.is_empty() {
            return Ok(());
        }
        writeln!(f)?;
        for (j, count) in self.nodes_by_sequences.iter().enumerate() {
            writeln!(f, "{count:>10} nodes cover exactly {j:>3} sequences.")?;
        }
        writeln!(f)?;
        for row in &self.pairs {
            for v in row {
                write!(f, "{v:>11}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{BuildConfig, BuildContext, build_graph};
    use crate::text::SequenceSet;

    #[test]
    fn test_two_sequences_sharing_a() {
        let set = SequenceSet::from_sequences(["AC", "AG"]).unwrap();
        let ctx = BuildContext::new(&set, BuildConfig::default()).unwrap();
        let stats = GraphStats::compute(&build_graph(&ctx, 1).unwrap());
        assert_eq!(stats.nodes, 3);
        assert_eq!(stats.unique_nodes, 2);
        assert_eq!(stats.repeat_nodes, 1);
        assert_eq!(stats.labels, 4);
        assert_eq!(stats.edges, 2);
        assert_eq!(stats.max_length, 2);
        assert_eq!(stats.nodes_by_sequences, vec![0, 2, 1]);
        assert_eq!(stats.pairs, vec![vec![2, 1], vec![0, 2]]);
        let report = stats.to_string();
        assert!(report.contains("nodes cover exactly   2 sequences."));
    }

    #[test]
    fn test_without_document_index() {
        let set = SequenceSet::from_sequences(["ACGTT"]).unwrap();
        let ctx = BuildContext::new(&set, BuildConfig::default().document_index(false)).unwrap();
        let stats = GraphStats::compute(&build_graph(&ctx, 2).unwrap());
        assert!(stats.nodes_by_sequences.is_empty());
        assert_eq!(stats.edges, 0);
        assert!(!stats.to_string().contains("sequences."));
    }
}
