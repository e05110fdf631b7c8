use cdbg_index::fm::c_array;
use cdbg_index::text::{bwt, suffix_array};
use cdbg_index::*;
use proptest::prelude::*;

fn sequence_set() -> impl Strategy<Value = Vec<Vec<u8>>> {
    prop::collection::vec(
        prop::collection::vec(prop::sample::select(b"ACGT".to_vec()), 9..40),
        1..5,
    )
}

fn occurs(set: &[Vec<u8>], pattern: &[u8]) -> bool {
    set.iter().any(|s| s.windows(pattern.len()).any(|w| w == pattern))
}

/// String spelled by a node path: the outermost node from `offset`, then
/// each inner node without its first `k - 1` characters.
fn spelled(explicit: &ExplicitGraph, text: &[u8], k: usize, path: &NodePath) -> Vec<u8> {
    let mut out = Vec::new();
    let outer = *path.nodes.last().unwrap();
    out.extend_from_slice(&explicit.label(text, outer).unwrap()[path.offset as usize..]);
    for &id in path.nodes.iter().rev().skip(1) {
        out.extend_from_slice(&explicit.label(text, id).unwrap()[k - 1..]);
    }
    out
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    // Each node owns exactly the BWT positions of its last k-mer.
    #[test]
    fn prop_node_intervals_map_back(seqs in sequence_set(), k in 1usize..=8) {
        let set = SequenceSet::from_sequences(&seqs).unwrap();
        let ctx = BuildContext::new(&set, BuildConfig::default()).unwrap();
        let g = build_graph(&ctx, k).unwrap();
        for (id, node) in g.nodes().iter().enumerate() {
            prop_assert!(node.size >= 1);
            prop_assert!(node.len as usize >= k);
            for p in node.first_lb..node.first_lb + node.size {
                prop_assert_eq!(g.node_at(p as usize), Some(id as u64));
            }
        }
        for p in 0..g.len() {
            if let Some(id) = g.node_at(p) {
                prop_assert!((id as usize) < g.node_count());
            }
        }
        prop_assert_eq!(g.stop_nodes().len(), seqs.len());
    }

    #[test]
    fn prop_find_nodes_matches_scan(
        seqs in sequence_set(),
        k in 1usize..=6,
        picks in prop::collection::vec((any::<prop::sample::Index>(), any::<prop::sample::Index>(), 0usize..12), 8),
        noise in prop::collection::vec(prop::sample::select(b"ACGT".to_vec()), 6..14),
    ) {
        let set = SequenceSet::from_sequences(&seqs).unwrap();
        let ctx = BuildContext::new(&set, BuildConfig::default()).unwrap();
        let g = build_graph(&ctx, k).unwrap();
        let text = set.text();
        let explicit = g.get_explicit_representation();

        let mut patterns: Vec<Vec<u8>> = picks
            .iter()
            .map(|(si, pi, extra)| {
                let s = si.get(&seqs);
                let len = (k + extra).min(s.len());
                let start = pi.index(s.len() - len + 1);
                s[start..start + len].to_vec()
            })
            .collect();
        patterns.push(noise);

        for p in &patterns {
            let path = g.find_nodes(p);
            prop_assert_eq!(path.is_found(), occurs(&seqs, p), "pattern {:?}", p);
            if path.is_found() {
                prop_assert!(path.offset >= 0);
                let s = spelled(&explicit, &text, k, &path);
                prop_assert!(s.starts_with(p), "pattern {:?} spelled {:?}", p, s);
            } else {
                prop_assert_eq!(path.offset, NodePath::NOT_FOUND_OFFSET);
            }
        }
    }

    #[test]
    fn prop_explicit_graph_restores_text(seqs in sequence_set(), k in 1usize..=8) {
        let set = SequenceSet::from_sequences(&seqs).unwrap();
        let ctx = BuildContext::new(&set, BuildConfig::default()).unwrap();
        let g = build_graph(&ctx, k).unwrap();
        let explicit = g.get_explicit_representation();
        let spans = explicit.verify(k).unwrap();
        let expected: Vec<u64> = set.lengths().iter().map(|l| l + 1).collect();
        prop_assert_eq!(spans, expected);
        let text = set.text();
        prop_assert_eq!(explicit.restore_text(&text, k).unwrap(), text);
    }

    #[test]
    fn prop_serialization_preserves_queries(seqs in sequence_set(), k in 1usize..=8, sampled in any::<bool>()) {
        let set = SequenceSet::from_sequences(&seqs).unwrap();
        let backend = if sampled { SymbolBackend::Sampled } else { SymbolBackend::Wavelet };
        let ctx = BuildContext::new(&set, BuildConfig::default().backend(backend)).unwrap();
        let g = build_graph(&ctx, k).unwrap();
        let mut buf = Vec::new();
        g.write_to(&mut buf).unwrap();
        let loaded = CompressedGraph::read_from(&mut buf.as_slice()).unwrap();
        prop_assert_eq!(loaded.nodes(), g.nodes());
        for id in 0..g.node_count() as u64 {
            prop_assert_eq!(loaded.sequences_in_node(id), g.sequences_in_node(id));
        }
        let p = &seqs[0][..k + 1];
        prop_assert_eq!(loaded.find_nodes(p), g.find_nodes(p));
    }

    // Queue and bit-vector frontiers classify every boundary the same way.
    #[test]
    fn prop_lcp_frontiers_agree(seqs in sequence_set(), k in 1usize..=10) {
        let text = SequenceSet::from_sequences(&seqs).unwrap().text();
        let sa = suffix_array(&text).unwrap();
        let index = BwtIndex::new(&bwt(&text, &sa), SymbolBackend::Wavelet);
        let c = c_array(&index);
        let queue = PartialLcp::new(k).with_queue_threshold(usize::MAX).build(&index, &c);
        let bits = PartialLcp::new(k).with_queue_threshold(0).build(&index, &c);
        prop_assert_eq!(queue.len(), text.len() + 1);
        prop_assert!(queue.iter().eq(bits.iter()));
        prop_assert!(queue.iter().all(|class| class != LcpClass::Unset));
    }
}
