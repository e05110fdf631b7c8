//! Graph construction: artifact preparation, node detection and lazy node
//! completion.
//!
//! One [`BuildContext`] prepares the BWT (and optionally the document array)
//! once; any number of k values are then built from it.

use byteorder::{LittleEndian as LE, ReadBytesExt, WriteBytesExt};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

use crate::fm::{BwtIndex, IntervalSymbol, SymbolBackend, SymbolIndex, c_array};
use crate::graph::{CompactNode, CompressedGraph, GraphError, bv1_node};
use crate::io::{read_array_bytes, read_u64_array};
use crate::lcp::{LcpClass, LcpClasses, PartialLcp};
use crate::succinct::{BitVector, RankedBitVector};
use crate::text::{self, SequenceSet};
use crate::wavelet::WaveletMatrix;

const TEXT_FILE: &str = "cdbg.text";
const BWT_FILE: &str = "cdbg.bwt";
const DA_FILE: &str = "cdbg.da";

/// Build-time configuration.
#[derive(Clone, Debug)]
pub struct BuildConfig {
    backend: SymbolBackend,
    document_index: bool,
    cache_dir: Option<PathBuf>,
    keep_artifacts: bool,
    threads: Option<usize>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            backend: SymbolBackend::Wavelet,
            document_index: true,
            cache_dir: None,
            keep_artifacts: false,
            threads: None,
        }
    }
}

impl BuildConfig {
    /// BWT representation (default: wavelet matrix).
    pub fn backend(mut self, backend: SymbolBackend) -> Self {
        self.backend = backend;
        self
    }
    /// Build the document index needed by `sequences_in_node` (default: true).
    pub fn document_index(mut self, yes: bool) -> Self {
        self.document_index = yes;
        self
    }
    /// Store intermediate artifacts in `dir` and reuse them when they match.
    pub fn cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }
    /// Keep cached artifacts after the context is dropped (default: false).
    pub fn keep_artifacts(mut self, yes: bool) -> Self {
        self.keep_artifacts = yes;
        self
    }
    /// Fix the number of threads used for preprocessing.
    pub fn threads(mut self, n: usize) -> Self {
        self.threads = Some(n.max(1));
        self
    }

    pub(crate) fn backend_kind(&self) -> SymbolBackend {
        self.backend
    }
}

/// Prepared artifacts shared by every k of a batch.
///
/// With a cache directory configured, the text, BWT and document array are
/// written there. They are removed on drop unless `keep_artifacts` is set or
/// they were reused from an earlier run.
pub struct BuildContext {
    config: BuildConfig,
    lengths: Vec<u64>,
    bwt: Vec<u8>,
    bwt_index: BwtIndex,
    c_array: Vec<u64>,
    doc: Option<WaveletMatrix>,
    artifacts: Vec<PathBuf>,
    delete_artifacts: bool,
}

impl BuildContext {
    pub fn new(sequences: &SequenceSet, config: BuildConfig) -> Result<Self, GraphError> {
        if sequences.is_empty() {
            return Err(GraphError::Input("no sequence found".into()));
        }
        match config.threads {
            Some(n) => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(n)
                    .build()
                    .map_err(|e| GraphError::Input(format!("thread pool: {e}")))?;
                pool.install(|| Self::prepare(sequences, config))
            }
            None => Self::prepare(sequences, config),
        }
    }

    fn prepare(sequences: &SequenceSet, config: BuildConfig) -> Result<Self, GraphError> {
        let text = sequences.text();
        let lengths = sequences.lengths();
        info!(
            sequences = lengths.len(),
            text_len = text.len(),
            backend = ?config.backend,
            "preparing artifacts"
        );

        let cached = match &config.cache_dir {
            Some(dir) => load_cached(dir, &text, config.document_index)?,
            None => None,
        };
        let reused = cached.is_some();

        let (bwt, da) = match cached {
            Some(found) => {
                info!("reusing cached artifacts");
                found
            }
            None => {
                let sa = text::suffix_array(&text)?;
                let bwt = text::bwt(&text, &sa);
                let da = config
                    .document_index
                    .then(|| text::document_array(&sa, &lengths));
                (bwt, da)
            }
        };

        let mut artifacts = Vec::new();
        if let Some(dir) = &config.cache_dir {
            std::fs::create_dir_all(dir)?;
            if !reused {
                write_bytes(&dir.join(TEXT_FILE), &text)?;
                write_bytes(&dir.join(BWT_FILE), &bwt)?;
                if let Some(da) = &da {
                    write_u64s(&dir.join(DA_FILE), da)?;
                }
            }
            artifacts.push(dir.join(TEXT_FILE));
            artifacts.push(dir.join(BWT_FILE));
            if da.is_some() {
                artifacts.push(dir.join(DA_FILE));
            }
        }

        let bwt_index = BwtIndex::new(&bwt, config.backend_kind());
        let c_array = c_array(&bwt_index);
        let doc = da.as_deref().map(WaveletMatrix::new);
        debug!(
            bwt_bytes = bwt_index.size_bytes(),
            doc_bytes = doc.as_ref().map_or(0, WaveletMatrix::size_bytes),
            "indexes ready"
        );

        let delete_artifacts = !config.keep_artifacts && !reused;
        Ok(Self {
            config,
            lengths,
            bwt,
            bwt_index,
            c_array,
            doc,
            artifacts,
            delete_artifacts,
        })
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    pub fn sequence_lengths(&self) -> &[u64] {
        &self.lengths
    }

    pub fn min_sequence_len(&self) -> usize {
        self.lengths.iter().copied().min().unwrap_or(0) as usize
    }

    pub fn bwt(&self) -> &[u8] {
        &self.bwt
    }

    /// Cache files owned by this context.
    pub fn artifact_paths(&self) -> &[PathBuf] {
        &self.artifacts
    }

    /// Reject `k == 0` and `k >= ` the shortest sequence.
    pub fn check_k(&self, k: usize) -> Result<(), GraphError> {
        let min = self.min_sequence_len();
        if k == 0 || k >= min {
            return Err(GraphError::Input(format!(
                "k={k} must be in 1..{min} (shortest sequence has length {min})"
            )));
        }
        Ok(())
    }
}

impl Drop for BuildContext {
    fn drop(&mut self) {
        if !self.delete_artifacts {
            return;
        }
        for path in &self.artifacts {
            if let Err(e) = std::fs::remove_file(path) {
                debug!(path = %path.display(), error = %e, "could not remove artifact");
            }
        }
    }
}

/// Build the graph of order `k`.
pub fn build_graph(ctx: &BuildContext, k: usize) -> Result<CompressedGraph, GraphError> {
    ctx.check_k(k)?;
    info!(k, "building graph");

    let lcp = PartialLcp::new(k).build(&ctx.bwt_index, &ctx.c_array);
    let [_, less, equal, greater] = lcp.histogram();
    debug!(less, equal, greater, "lcp classes");
    let detected = detect_nodes(k, &lcp, &ctx.bwt, &ctx.c_array);
    drop(lcp);

    let right_max = detected.nodes.len() as u64;
    let bv1 = RankedBitVector::new(detected.bv1);
    let bv3 = RankedBitVector::new(detected.bv3);
    let lmax = bv3.count_ones();
    debug!(right_max, lazy = lmax, "nodes detected");

    let mut nodes = detected.nodes;
    nodes.resize(right_max as usize + lmax, CompactNode::default());
    complete_nodes(k, &ctx.bwt_index, &ctx.c_array, &bv1, &bv3, right_max, &mut nodes)?;
    info!(k, nodes = nodes.len(), "graph complete");

    Ok(CompressedGraph {
        k,
        bwt: ctx.bwt_index.clone(),
        c_array: ctx.c_array.clone(),
        nodes,
        right_max,
        stop_nodes: detected.stop_nodes,
        bv1,
        bv3,
        doc: ctx.doc.clone(),
    })
}

/// Build one graph per k. Invalid k values are reported and skipped; the
/// remaining ones still run.
pub fn build_graphs(
    ctx: &BuildContext,
    ks: &[usize],
) -> Vec<(usize, Result<CompressedGraph, GraphError>)> {
    ks.iter().map(|&k| (k, build_checked(ctx, k))).collect()
}

fn build_checked(ctx: &BuildContext, k: usize) -> Result<CompressedGraph, GraphError> {
    if let Err(e) = ctx.check_k(k) {
        warn!(k, "skipping k: {e}");
        return Err(e);
    }
    build_graph(ctx, k).inspect_err(|e| error!(k, error = %e, "graph construction failed"))
}

/// Path of the graph of order `k` under `prefix`: `<prefix>.k<k>.bin`.
pub fn graph_path(prefix: &Path, k: usize) -> PathBuf {
    let mut name = prefix.as_os_str().to_owned();
    name.push(format!(".k{k}.bin"));
    PathBuf::from(name)
}

/// Build and save one graph per k, one at a time. A k that fails to build or
/// to save is logged and reported in its slot; the remaining ones still run.
pub fn write_graphs(
    ctx: &BuildContext,
    ks: &[usize],
    prefix: &Path,
) -> Vec<(usize, Result<PathBuf, GraphError>)> {
    ks.iter()
        .map(|&k| {
            let saved = build_checked(ctx, k).and_then(|graph| {
                let path = graph_path(prefix, k);
                graph
                    .save(&path)
                    .inspect_err(|e| error!(k, path = %path.display(), error = %e, "could not write graph"))?;
                info!(
                    k,
                    nodes = graph.node_count(),
                    bytes = graph.size_bytes(),
                    path = %path.display(),
                    "graph written"
                );
                Ok(path)
            });
            (k, saved)
        })
        .collect()
}

pub(crate) struct Detection {
    pub nodes: Vec<CompactNode>,
    pub stop_nodes: Vec<u64>,
    pub bv1: BitVector,
    pub bv3: BitVector,
}

/// Single pass over the LCP classes.
///
/// A maximal run of boundaries with LCP `>= k` is the SA interval of one
/// k-mer. If the run contains an `Equal` boundary the k-mer is right-maximal
/// and becomes a node (both ends marked in `bv1`). If the run's BWT
/// characters differ the k-mer is left-branching and the LF targets of its
/// run are marked in `bv3`.
pub(crate) fn detect_nodes(k: usize, lcp: &LcpClasses, bwt: &[u8], c_array: &[u64]) -> Detection {
    let n = bwt.len();
    let mut bv1 = BitVector::zeros(n);
    let mut bv3 = BitVector::zeros(n);
    let mut nodes = Vec::new();
    // lf[c] = C[c] + occurrences of c in bwt[0..i)
    let mut lf: Vec<u64> = c_array.to_vec();

    let mut open = false;
    let mut kvalue = 0usize;
    let mut lb = 0usize;
    let mut last_change = 0usize;
    for i in 1..=n {
        lf[bwt[i - 1] as usize] += 1;
        match lcp.get(i) {
            LcpClass::Greater | LcpClass::Equal => {
                open = true;
                if lcp.get(i) == LcpClass::Equal {
                    kvalue = i;
                }
            }
            _ => {
                if open {
                    if kvalue > lb {
                        bv1.set(lb, true);
                        bv1.set(i - 1, true);
                        nodes.push(CompactNode::new(lb as u64, k as u64, (i - lb) as u64, lb as u64));
                    }
                    if last_change > lb {
                        for &c in &bwt[lb..i] {
                            bv3.set(lf[c as usize] as usize - 1, true);
                        }
                    }
                    open = false;
                }
                lb = i;
            }
        }
        if i < n && (bwt[i] != bwt[i - 1] || bwt[i] <= text::SEPARATOR) {
            last_change = i;
        }
    }

    let mut stop_nodes = Vec::new();
    for i in 0..c_array[2] as usize {
        stop_nodes.push(nodes.len() as u64);
        nodes.push(CompactNode::new(i as u64, 1, 1, i as u64));
        bv3.set(i, false);
    }

    // bv3 marks never fall inside a right-maximal interval
    let mut inside = false;
    for i in 0..n {
        if inside {
            bv3.set(i, false);
            if bv1.get(i) {
                inside = false;
            }
        } else if bv1.get(i) {
            bv3.set(i, false);
            inside = true;
        }
    }

    Detection {
        nodes,
        stop_nodes,
        bv1,
        bv3,
    }
}

/// Extend every node backwards to its first k-mer.
///
/// Detection nodes are processed in id order; lazy nodes are discovered at
/// left-branching points and processed from a LIFO worklist.
pub(crate) fn complete_nodes(
    k: usize,
    bwt: &BwtIndex,
    c_array: &[u64],
    bv1: &RankedBitVector,
    bv3: &RankedBitVector,
    right_max: u64,
    nodes: &mut [CompactNode],
) -> Result<(), GraphError> {
    let mut worklist: Vec<u64> = Vec::new();
    let mut symbols: Vec<IntervalSymbol> = Vec::new();

    for step in 0..nodes.len() as u64 {
        let id: u64 = if step < right_max {
            step
        } else {
            worklist.pop().ok_or_else(|| {
                GraphError::Consistency(format!(
                    "worklist exhausted after {step} of {} nodes",
                    nodes.len()
                ))
            })?
        };
        let id = id as usize;

        let node = nodes[id];
        let mut cur_lb = node.lb as usize;
        let mut cur_rb = (node.lb + node.size) as usize - 1;
        let mut cur_len = node.len;
        let mut extend = true;
        while extend {
            extend = false;
            bwt.interval_symbols(cur_lb, cur_rb + 1, &mut symbols);
            let quantity = symbols.len();
            for s in &symbols {
                let base = c_array[s.symbol as usize] as usize;
                let lb = base + s.rank_lb;
                let rb = base + s.rank_rb - 1;
                if s.symbol <= text::SEPARATOR as u64 || bv1_node(bv1, lb).is_some() {
                    // predecessor starts a sequence or is a node end of its own
                } else if quantity == 1 {
                    extend = true;
                    cur_len += 1;
                    cur_lb = lb;
                    cur_rb = rb;
                    continue;
                } else {
                    let next = right_max as usize + bv3.rank1(lb);
                    if next >= nodes.len() {
                        return Err(GraphError::Consistency(format!(
                            "lazy node id {next} out of range ({})",
                            nodes.len()
                        )));
                    }
                    worklist.push(next as u64);
                    nodes[next] = CompactNode::new(lb as u64, k as u64, (rb - lb + 1) as u64, lb as u64);
                }
                nodes[id].lb = cur_lb as u64;
                nodes[id].len = cur_len;
            }
        }
    }
    Ok(())
}

fn write_bytes(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut w = BufWriter::new(File::create(path)?);
    w.write_u64::<LE>(bytes.len() as u64)?;
    w.write_all(bytes)?;
    w.flush()
}

fn read_bytes(path: &Path) -> Result<Vec<u8>, GraphError> {
    let mut r = BufReader::new(File::open(path)?);
    let len = r.read_u64::<LE>()?;
    read_array_bytes(&mut r, len, 1)
}

fn write_u64s(path: &Path, values: &[u64]) -> std::io::Result<()> {
    let mut w = BufWriter::new(File::create(path)?);
    w.write_u64::<LE>(values.len() as u64)?;
    for &v in values {
        w.write_u64::<LE>(v)?;
    }
    w.flush()
}

fn read_u64s(path: &Path) -> Result<Vec<u64>, GraphError> {
    let mut r = BufReader::new(File::open(path)?);
    let len = r.read_u64::<LE>()?;
    read_u64_array(&mut r, len)
}

/// Cached `(bwt, document array)` for exactly this `text`, if present.
fn load_cached(
    dir: &Path,
    text: &[u8],
    with_doc: bool,
) -> Result<Option<(Vec<u8>, Option<Vec<u64>>)>, GraphError> {
    let (text_path, bwt_path, da_path) = (dir.join(TEXT_FILE), dir.join(BWT_FILE), dir.join(DA_FILE));
    if !text_path.exists() || !bwt_path.exists() || (with_doc && !da_path.exists()) {
        return Ok(None);
    }
    if read_bytes(&text_path)? != text {
        debug!(dir = %dir.display(), "cached text differs, rebuilding");
        return Ok(None);
    }
    let bwt = read_bytes(&bwt_path)?;
    let da = if with_doc { Some(read_u64s(&da_path)?) } else { None };
    if bwt.len() != text.len() || da.as_ref().is_some_and(|d| d.len() != text.len()) {
        return Err(GraphError::Format(format!(
            "cached artifacts in {} do not match the text",
            dir.display()
        )));
    }
    Ok(Some((bwt, da)))
}
