//! On-disk formats. All integers are little-endian.
//!
//! Graph file: [`FileHeader`] followed by the body in fixed order: `k`, BWT
//! index, C-array, node table, `right_max`, stop nodes, `bv1`, `bv3`, `bv1`
//! rank support, `bv3` rank support, document index (present iff the header
//! flag is set).
//! Rank supports are only ever loaded against the bit vector read just
//! before them.
//!
//! Explicit graph file: node count, then per node `len`, adjacency list and
//! position list, each list prefixed by its length.

use bytemuck::{Pod, Zeroable};
use byteorder::{ByteOrder, LittleEndian as LE, ReadBytesExt, WriteBytesExt};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::explicit::{ExplicitGraph, ExplicitNode};
use crate::fm::{BwtIndex, SymbolBackend, SymbolIndex};
use crate::graph::{CompactNode, CompressedGraph, GraphError};
use crate::succinct::{BitVector, RankSupport, RankedBitVector};
use crate::wavelet::WaveletMatrix;

pub const CDBG_MAGIC: u32 = 0x47_42_44_43; // "CDBG"
pub const CDBG_VERSION: u32 = 1;

#[repr(C)]
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq, Pod, Zeroable)]
pub struct FileHeader {
    pub magic: u32,
    pub version: u32,
    pub backend_u8: u8,
    pub has_doc: u8,
    pub reserved0: u16,
    pub reserved1: u32,
}

impl FileHeader {
    pub fn write_to<W: Write>(&self, w: &mut W) -> std::io::Result<()> {
        w.write_u32::<LE>(self.magic)?;
        w.write_u32::<LE>(self.version)?;
        w.write_u8(self.backend_u8)?;
        w.write_u8(self.has_doc)?;
        w.write_u16::<LE>(self.reserved0)?;
        w.write_u32::<LE>(self.reserved1)?;
        Ok(())
    }

    pub fn read_from<R: Read>(r: &mut R) -> std::io::Result<Self> {
        Ok(FileHeader {
            magic: r.read_u32::<LE>()?,
            version: r.read_u32::<LE>()?,
            backend_u8: r.read_u8()?,
            has_doc: r.read_u8()?,
            reserved0: r.read_u16::<LE>()?,
            reserved1: r.read_u32::<LE>()?,
        })
    }

    pub fn backend(&self) -> Result<SymbolBackend, GraphError> {
        SymbolBackend::from_tag(self.backend_u8)
            .ok_or_else(|| GraphError::Format(format!("unknown backend tag {}", self.backend_u8)))
    }
}

fn write_u64_vec<W: Write>(w: &mut W, values: &[u64]) -> std::io::Result<()> {
    w.write_u64::<LE>(values.len() as u64)?;
    for &v in values {
        w.write_u64::<LE>(v)?;
    }
    Ok(())
}

/// Read `count` items of `width` bytes. `count` comes from the stream, so
/// the buffer grows with the bytes actually present instead of being sized
/// up front; a short stream is `UnexpectedEof`.
pub(crate) fn read_array_bytes<R: Read>(r: &mut R, count: u64, width: u64) -> Result<Vec<u8>, GraphError> {
    let total = count
        .checked_mul(width)
        .ok_or_else(|| GraphError::Format(format!("array of {count} x {width} bytes")))?;
    let mut bytes = Vec::new();
    r.take(total).read_to_end(&mut bytes)?;
    if bytes.len() as u64 != total {
        return Err(GraphError::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            format!("expected {total} bytes, found {}", bytes.len()),
        )));
    }
    Ok(bytes)
}

pub(crate) fn read_u64_array<R: Read>(r: &mut R, count: u64) -> Result<Vec<u64>, GraphError> {
    let bytes = read_array_bytes(r, count, 8)?;
    Ok(bytes.chunks_exact(8).map(LE::read_u64).collect())
}

pub(crate) fn read_u16_array<R: Read>(r: &mut R, count: u64) -> Result<Vec<u16>, GraphError> {
    let bytes = read_array_bytes(r, count, 2)?;
    Ok(bytes.chunks_exact(2).map(LE::read_u16).collect())
}

/// Length-prefixed `u64` list holding at most `max` entries.
fn read_u64_vec<R: Read>(r: &mut R, max: u64) -> Result<Vec<u64>, GraphError> {
    let count = r.read_u64::<LE>()?;
    if count > max {
        return Err(GraphError::Format(format!("list of {count} entries, at most {max} allowed")));
    }
    read_u64_array(r, count)
}

fn read_ranked<R: Read>(r: &mut R, bits: BitVector) -> Result<RankedBitVector, GraphError> {
    let rank = RankSupport::read_bound(r, &bits)?;
    Ok(RankedBitVector::from_parts(bits, rank))
}

impl CompressedGraph {
    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<(), GraphError> {
        let header = FileHeader {
            magic: CDBG_MAGIC,
            version: CDBG_VERSION,
            backend_u8: self.bwt.backend().tag(),
            has_doc: u8::from(self.doc.is_some()),
            reserved0: 0,
            reserved1: 0,
        };
        header.write_to(w)?;

        w.write_u64::<LE>(self.k as u64)?;
        self.bwt.write_to(w)?;
        write_u64_vec(w, &self.c_array)?;
        w.write_u64::<LE>(self.nodes.len() as u64)?;
        for &field in bytemuck::cast_slice::<CompactNode, u64>(&self.nodes) {
            w.write_u64::<LE>(field)?;
        }
        w.write_u64::<LE>(self.right_max)?;
        write_u64_vec(w, &self.stop_nodes)?;
        self.bv1.bits().write_to(w)?;
        self.bv3.bits().write_to(w)?;
        self.bv1.rank_support().write_to(w)?;
        self.bv3.rank_support().write_to(w)?;
        if let Some(doc) = &self.doc {
            doc.write_to(w)?;
        }
        Ok(())
    }

    pub fn read_from<R: Read>(r: &mut R) -> Result<Self, GraphError> {
        let header = FileHeader::read_from(r)?;
        if header.magic != CDBG_MAGIC {
            return Err(GraphError::Format(format!("bad magic {:#010x}", header.magic)));
        }
        if header.version != CDBG_VERSION {
            return Err(GraphError::Format(format!("unsupported version {}", header.version)));
        }
        let backend = header.backend()?;

        let k = r.read_u64::<LE>()? as usize;
        let bwt = BwtIndex::read_from(r, backend)?;
        let n = bwt.len();
        let c_array = read_u64_vec(r, 256)?;
        if c_array.len() != 256 {
            return Err(GraphError::Format(format!("C-array of {} entries", c_array.len())));
        }

        // Node intervals are disjoint and non-empty, so there are at most n.
        let node_count = r.read_u64::<LE>()?;
        if node_count > n as u64 {
            return Err(GraphError::Format(format!("{node_count} nodes for a BWT of {n} symbols")));
        }
        let fields = read_u64_array(r, node_count * 4)?;
        let nodes: Vec<CompactNode> = bytemuck::cast_slice(&fields).to_vec();
        let node_count = node_count as usize;

        let right_max = r.read_u64::<LE>()?;
        let stop_nodes = read_u64_vec(r, node_count as u64)?;
        let bv1_bits = BitVector::read_from(r)?;
        let bv3_bits = BitVector::read_from(r)?;
        let bv1 = read_ranked(r, bv1_bits)?;
        let bv3 = read_ranked(r, bv3_bits)?;
        let doc = if header.has_doc != 0 {
            Some(WaveletMatrix::read_from(r)?)
        } else {
            None
        };

        if bv1.len() != n
            || bv3.len() != n
            || right_max.checked_add(bv3.count_ones() as u64) != Some(node_count as u64)
        {
            return Err(GraphError::Format("bit vectors do not match the node table".into()));
        }
        if doc.as_ref().is_some_and(|d| d.len() != n) {
            return Err(GraphError::Format("document index length mismatch".into()));
        }
        if stop_nodes.iter().any(|&id| id >= node_count as u64) {
            return Err(GraphError::Format("stop node id out of range".into()));
        }

        Ok(Self {
            k,
            bwt,
            c_array,
            nodes,
            right_max,
            stop_nodes,
            bv1,
            bv3,
            doc,
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), GraphError> {
        let mut w = BufWriter::new(File::create(path)?);
        self.write_to(&mut w)?;
        w.flush()?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, GraphError> {
        let mut r = BufReader::new(File::open(path)?);
        Self::read_from(&mut r)
    }
}

pub fn write_explicit<W: Write>(graph: &ExplicitGraph, w: &mut W) -> std::io::Result<()> {
    w.write_u64::<LE>(graph.nodes.len() as u64)?;
    for node in &graph.nodes {
        w.write_u64::<LE>(node.len)?;
        write_u64_vec(w, &node.adj_list)?;
        write_u64_vec(w, &node.pos_list)?;
    }
    Ok(())
}

/// Read an explicit graph written by [`write_explicit`]. Start nodes and exit
/// flags are not part of the stream.
pub fn read_explicit<R: Read>(r: &mut R) -> Result<ExplicitGraph, GraphError> {
    let count = r.read_u64::<LE>()?;
    let mut nodes = Vec::new();
    for _ in 0..count {
        let len = r.read_u64::<LE>()?;
        let adj_list = read_u64_vec(r, u64::MAX)?;
        let pos_list = read_u64_vec(r, u64::MAX)?;
        nodes.push(ExplicitNode {
            len,
            exit_node: false,
            adj_list,
            pos_list,
        });
    }
    Ok(ExplicitGraph {
        nodes,
        start_nodes: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{BuildConfig, BuildContext, build_graph};
    use crate::text::SequenceSet;
    use std::io::Cursor;

    fn graph(backend: SymbolBackend, doc: bool) -> CompressedGraph {
        let set = SequenceSet::from_sequences(["ACGTACGGT", "CGTACCA", "TTACGT"]).unwrap();
        let cfg = BuildConfig::default().backend(backend).document_index(doc);
        let ctx = BuildContext::new(&set, cfg).unwrap();
        build_graph(&ctx, 3).unwrap()
    }

    #[test]
    fn test_header_layout() {
        let h = FileHeader {
            magic: CDBG_MAGIC,
            version: CDBG_VERSION,
            backend_u8: 1,
            has_doc: 1,
            reserved0: 0,
            reserved1: 0,
        };
        let mut buf = Vec::new();
        h.write_to(&mut buf).unwrap();
        assert_eq!(buf.len(), std::mem::size_of::<FileHeader>());
        assert_eq!(&buf[..4], b"CDBG");
        assert_eq!(FileHeader::read_from(&mut Cursor::new(buf)).unwrap(), h);
    }

    #[test]
    fn test_round_trip_both_backends() {
        for backend in [SymbolBackend::Wavelet, SymbolBackend::Sampled] {
            for doc in [true, false] {
                let g = graph(backend, doc);
                let mut buf = Vec::new();
                g.write_to(&mut buf).unwrap();
                let loaded = CompressedGraph::read_from(&mut Cursor::new(buf)).unwrap();
                assert_eq!(loaded.k(), g.k());
                assert_eq!(loaded.nodes(), g.nodes());
                assert_eq!(loaded.stop_nodes(), g.stop_nodes());
                assert_eq!(loaded.bwt(), g.bwt());
                assert_eq!(loaded.has_document_index(), doc);
                for p in [&b"ACG"[..], b"TACG", b"CGTACC", b"GGG"] {
                    assert_eq!(loaded.find_nodes(p), g.find_nodes(p));
                }
                for id in 0..g.node_count() as u64 {
                    assert_eq!(loaded.sequences_in_node(id), g.sequences_in_node(id));
                }
            }
        }
    }

    #[test]
    fn test_rejects_bad_magic_and_backend() {
        let g = graph(SymbolBackend::Wavelet, true);
        let mut buf = Vec::new();
        g.write_to(&mut buf).unwrap();

        let mut bad = buf.clone();
        bad[0] = b'X';
        let err = CompressedGraph::read_from(&mut Cursor::new(bad)).unwrap_err();
        assert!(matches!(err, GraphError::Format(_)));

        let mut bad = buf.clone();
        bad[8] = 9;
        let err = CompressedGraph::read_from(&mut Cursor::new(bad)).unwrap_err();
        assert!(matches!(err, GraphError::Format(_)));

        buf.truncate(buf.len() / 2);
        let err = CompressedGraph::read_from(&mut Cursor::new(buf)).unwrap_err();
        assert!(matches!(err, GraphError::Io(_)));
    }

    #[test]
    fn test_rejects_corrupt_length_fields() {
        let g = graph(SymbolBackend::Wavelet, true);
        let mut buf = Vec::new();
        g.write_to(&mut buf).unwrap();
        let mut bwt = Vec::new();
        g.bwt.write_to(&mut bwt).unwrap();

        let c_at = 16 + 8 + bwt.len();
        let nodes_at = c_at + 8 + 256 * 8;
        assert_eq!(buf[c_at..c_at + 8], 256u64.to_le_bytes());
        assert_eq!(buf[nodes_at..nodes_at + 8], (g.node_count() as u64).to_le_bytes());

        for (at, value) in [
            (nodes_at, u64::MAX / 2),
            (nodes_at, u64::MAX),
            (nodes_at, g.len() as u64 + 1),
            (c_at, u64::MAX),
            (c_at, 255),
        ] {
            let mut bad = buf.clone();
            bad[at..at + 8].copy_from_slice(&value.to_le_bytes());
            let err = CompressedGraph::read_from(&mut Cursor::new(bad)).unwrap_err();
            assert!(matches!(err, GraphError::Format(_)), "{value} at {at}: {err}");
        }

        // a plausible count that runs past the end of the stream
        let mut bad = buf.clone();
        bad[nodes_at..nodes_at + 8].copy_from_slice(&(g.len() as u64).to_le_bytes());
        bad.truncate(nodes_at + 8 + 64);
        let err = CompressedGraph::read_from(&mut Cursor::new(bad)).unwrap_err();
        assert!(matches!(err, GraphError::Io(_)));
    }

    #[test]
    fn test_save_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("g.k3.bin");
        let g = graph(SymbolBackend::Sampled, true);
        g.save(&path).unwrap();
        let loaded = CompressedGraph::load(&path).unwrap();
        assert_eq!(loaded.nodes(), g.nodes());
    }

    #[test]
    fn test_explicit_stream_round_trip() {
        let g = graph(SymbolBackend::Wavelet, false);
        let explicit = g.get_explicit_representation();
        let mut buf = Vec::new();
        write_explicit(&explicit, &mut buf).unwrap();
        let loaded = read_explicit(&mut Cursor::new(buf)).unwrap();
        assert_eq!(loaded.nodes.len(), explicit.nodes.len());
        for (a, b) in loaded.nodes.iter().zip(&explicit.nodes) {
            assert_eq!((a.len, &a.adj_list, &a.pos_list), (b.len, &b.adj_list, &b.pos_list));
        }
    }
}
