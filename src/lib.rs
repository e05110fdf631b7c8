//! Compressed implicit de Bruijn graphs over a BWT (edition 2024).
//!
//! A set of sequences is indexed once (suffix array, BWT, document array);
//! for every order `k` the graph's nodes (maximal non-branching k-mer paths)
//! are then found from a threshold LCP array and stored as SA intervals plus
//! two marker bit vectors. No label or edge is ever materialized:
//!
//! - [`CompressedGraph::find_nodes`] maps a pattern to the nodes spelling it
//! - [`CompressedGraph::sequences_in_node`] lists the sequences containing a
//!   node's label
//! - [`CompressedGraph::get_explicit_representation`] expands the graph for
//!   verification and Graphviz output
//!
//! ```no_run
//! use cdbg_index::{BuildConfig, BuildContext, SequenceSet, build_graph};
//!
//! let set = SequenceSet::from_sequences(["ACGTACGA", "CGTACG"])?;
//! let ctx = BuildContext::new(&set, BuildConfig::default())?;
//! let graph = build_graph(&ctx, 3)?;
//! let path = graph.find_nodes(b"GTAC");
//! assert!(path.is_found());
//! # Ok::<(), cdbg_index::GraphError>(())
//! ```
//!
//! See `io` for the on-disk format.

mod builder;
mod explicit;
pub mod fm;
mod graph;
mod io;
pub mod lcp;
mod radix;
mod sampled;
mod stats;
pub mod succinct;
pub mod text;
mod wavelet;

pub use builder::{BuildConfig, BuildContext, build_graph, build_graphs, graph_path, write_graphs};
pub use explicit::{ExplicitGraph, ExplicitNode};
pub use fm::{BwtIndex, IntervalSymbol, SymbolBackend, SymbolIndex};
pub use graph::{CompactNode, CompressedGraph, GraphError, NodePath};
pub use io::{CDBG_MAGIC, CDBG_VERSION, FileHeader, read_explicit, write_explicit};
pub use lcp::{LcpClass, LcpClasses, PartialLcp};
pub use sampled::SampledSequence;
pub use stats::GraphStats;
pub use text::SequenceSet;
pub use wavelet::WaveletMatrix;
