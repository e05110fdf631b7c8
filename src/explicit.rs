//! Explicit graph: every node with its occurrences and successor edges,
//! recovered by walking each sequence backwards through the implicit graph.
//!
//! Positions are 1-based offsets into the indexed text. Per node, `pos_list`
//! and `adj_list` are filled while walking from the end of the text to its
//! start, so the last entry is the earliest occurrence.

use std::io::Write;

use crate::graph::{CompressedGraph, GraphError};
use crate::text::{SEPARATOR, TERMINATOR};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExplicitNode {
    pub len: u64,
    /// Last node of some sequence.
    pub exit_node: bool,
    /// Successor of each non-final occurrence.
    pub adj_list: Vec<u64>,
    /// Start position of each occurrence.
    pub pos_list: Vec<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExplicitGraph {
    pub nodes: Vec<ExplicitNode>,
    /// First node of each sequence, in sequence order.
    pub start_nodes: Vec<u64>,
}

impl CompressedGraph {
    /// Materialize nodes, edges and occurrence positions.
    pub fn get_explicit_representation(&self) -> ExplicitGraph {
        let mut graph = vec![ExplicitNode::default(); self.nodes.len()];
        let d = self.sequence_count();
        let mut start_nodes = vec![0u64; d];
        let mut pos = self.len() as u64 + 1;
        let mut i = 0usize;

        // The terminator suffix is position 0; each walk ends on the
        // separator closing the previous sequence.
        for s in 0..d {
            let mut prev = self.right_max - d as u64 + i as u64;
            let stop = self.nodes[prev as usize];
            pos -= stop.len;
            let entry = &mut graph[prev as usize];
            entry.len = stop.len;
            entry.pos_list.push(pos);
            entry.exit_node = true;

            let (mut next, mut c) = self.lf(stop.lb as usize);
            while c > SEPARATOR as u64 {
                let id = self.owner(next);
                let node = self.nodes[id as usize];
                let idx = node.lb + (next as u64 - node.first_lb);
                pos -= node.len - self.k as u64 + 1;
                let entry = &mut graph[id as usize];
                entry.adj_list.push(prev);
                entry.pos_list.push(pos);
                entry.len = node.len;
                prev = id;
                (next, c) = self.lf(idx as usize);
            }
            i = next;
            start_nodes[d - 1 - s] = prev;
        }

        ExplicitGraph {
            nodes: graph,
            start_nodes,
        }
    }
}

impl ExplicitGraph {
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.nodes.iter().map(|n| n.adj_list.len()).sum()
    }

    /// Label of node `id`, read from its first recorded occurrence.
    pub fn label<'t>(&self, text: &'t [u8], id: u64) -> Option<&'t [u8]> {
        let node = self.nodes.get(id as usize)?;
        let start = *node.pos_list.last()? as usize - 1;
        text.get(start..start + node.len as usize)
    }

    /// Walk every sequence in text order, consuming occurrences and edges.
    /// Returns the span of each sequence (its length plus the separator).
    /// Fails unless every walk is consistent and nothing is left over.
    pub fn verify(&self, k: usize) -> Result<Vec<u64>, GraphError> {
        self.walk(k, |_, _, _| {})
    }

    /// Rebuild the indexed text by following the graph, copying each node's
    /// new characters from `text` at the position being walked.
    pub fn restore_text(&self, text: &[u8], k: usize) -> Result<Vec<u8>, GraphError> {
        let mut out = Vec::with_capacity(text.len());
        let mut bounds_ok = true;
        self.walk(k, |pos, count, first| {
            if first && !out.is_empty() {
                out.push(SEPARATOR);
            }
            let start = pos as usize - 1;
            match text.get(start..start + count as usize) {
                Some(slice) => out.extend_from_slice(slice),
                None => bounds_ok = false,
            }
        })?;
        if !bounds_ok {
            return Err(GraphError::Consistency("node position outside the text".into()));
        }
        out.push(TERMINATOR);
        Ok(out)
    }

    /// Shared walk. `emit(pos, count, first)` receives the characters each
    /// node contributes; `first` marks the start of a sequence.
    fn walk<F>(&self, k: usize, mut emit: F) -> Result<Vec<u64>, GraphError>
    where
        F: FnMut(u64, u64, bool),
    {
        let mut graph = self.nodes.clone();
        let mut spans = Vec::new();
        let mut start_pos = 1u64;
        let k = k as u64;

        loop {
            let Some(start) = graph
                .iter()
                .position(|n| n.pos_list.last() == Some(&start_pos))
            else {
                if let Some((i, n)) = graph
                    .iter()
                    .enumerate()
                    .find(|(_, n)| !n.adj_list.is_empty() || !n.pos_list.is_empty())
                {
                    return Err(GraphError::Consistency(format!(
                        "graph not empty after {} sequences: node {i} has {} edges and {} positions left",
                        spans.len(),
                        n.adj_list.len(),
                        n.pos_list.len()
                    )));
                }
                return Ok(spans);
            };

            let mut cur = start;
            let mut cur_pos = start_pos;
            let mut first = true;
            while let Some(next) = graph[cur].adj_list.pop() {
                graph[cur].pos_list.pop();
                let len = graph[cur].len;
                let next_pos = cur_pos + len - k + 1;
                let next = next as usize;
                match graph.get(next).and_then(|n| n.pos_list.last()) {
                    Some(&p) if p == next_pos => {}
                    found => {
                        return Err(GraphError::Consistency(format!(
                            "walked from node {cur} (len={len}) at {cur_pos} to node {next}: expected position {next_pos}, found {found:?}"
                        )));
                    }
                }
                emit(cur_pos, len - k + 1, first);
                first = false;
                cur = next;
                cur_pos = next_pos;
            }

            let len = graph[cur].len;
            if graph[cur].pos_list.pop().is_none() {
                return Err(GraphError::Consistency(format!("node {cur} has no position left")));
            }
            emit(cur_pos, len.saturating_sub(1), first);
            cur_pos += len;
            spans.push(cur_pos - start_pos);
            start_pos = cur_pos;
        }
    }

    /// Graphviz rendering: `id [label="p1,p2,...:len"]` and one edge per
    /// adjacency entry.
    pub fn write_dot<W: Write>(&self, w: &mut W) -> std::io::Result<()> {
        writeln!(w, "digraph G {{")?;
        for (id, node) in self.nodes.iter().enumerate() {
            let positions: Vec<String> = node.pos_list.iter().rev().map(u64::to_string).collect();
            writeln!(w, "  {id} [label=\"{}:{}\"]", positions.join(","), node.len)?;
            for next in node.adj_list.iter().rev() {
                writeln!(w, "  {id} -> {next}")?;
            }
        }
        writeln!(w, "}}")
    }

    /// One start node id per line.
    pub fn write_start_nodes<W: Write>(&self, w: &mut W) -> std::io::Result<()> {
        for id in &self.start_nodes {
            writeln!(w, "{id}")?;
        }
        Ok(())
    }
}
