use anyhow::Context;
use clap::{Parser, Subcommand};
use cdbg_index::*;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::hint::black_box;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

/// Compressed de Bruijn graphs for pan-genomes.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build one graph per k value from a FASTA file.
    Construct {
        /// Input FASTA path
        #[arg(short, long)]
        input: PathBuf,

        /// Output prefix; graphs are written to `<prefix>.k<k>.bin`
        #[arg(short, long)]
        output: PathBuf,

        /// k value (repeatable)
        #[arg(short = 'k', long = "k")]
        ks: Vec<usize>,

        /// Text file with whitespace-separated k values
        #[arg(long)]
        k_file: Option<PathBuf>,

        /// BWT backend: wavelet|sampled
        #[arg(long, default_value = "wavelet")]
        backend: SymbolBackend,

        /// Skip the document index (disables sequence queries)
        #[arg(long, default_value_t = false)]
        no_doc: bool,

        /// Directory for intermediate artifacts
        #[arg(long)]
        cache_dir: Option<PathBuf>,

        /// Keep intermediate artifacts after construction
        #[arg(long, default_value_t = false)]
        keep_cache: bool,

        /// Threads for preprocessing
        #[arg(long)]
        threads: Option<usize>,
    },
    /// Look up every pattern of a file (one per whitespace-separated token).
    FindPattern {
        /// Graph file created by `construct`
        #[arg(short, long)]
        graph: PathBuf,

        /// Pattern file
        #[arg(short, long)]
        patterns: PathBuf,
    },
    /// Write `<prefix>.dot`, `<prefix>.start_nodes.txt` and the binary
    /// explicit graph `<prefix>.explicit.bin`.
    Impl2expl {
        /// Graph file created by `construct`
        #[arg(short, long)]
        graph: PathBuf,

        /// Output prefix
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Walk an explicit graph written by `impl2expl` and print each
    /// sequence's span.
    Verify {
        /// Explicit graph file (`<prefix>.explicit.bin`)
        #[arg(short, long)]
        explicit: PathBuf,

        /// k the graph was built with
        #[arg(short)]
        k: usize,
    },
    /// Print graph statistics.
    Details {
        /// Graph file created by `construct`
        #[arg(short, long)]
        graph: PathBuf,
    },
}

fn with_suffix(prefix: &Path, suffix: &str) -> PathBuf {
    let mut s = prefix.as_os_str().to_owned();
    s.push(suffix);
    PathBuf::from(s)
}

fn read_tokens(path: &Path) -> anyhow::Result<Vec<String>> {
    let reader = BufReader::new(File::open(path).with_context(|| format!("open {}", path.display()))?);
    let mut tokens = Vec::new();
    for line in reader.lines() {
        tokens.extend(line?.split_whitespace().map(str::to_string));
    }
    Ok(tokens)
}

fn join(values: &[u64]) -> String {
    values.iter().map(u64::to_string).collect::<Vec<_>>().join(", ")
}

#[allow(clippy::too_many_arguments)]
fn construct(
    input: &Path,
    output: &Path,
    mut ks: Vec<usize>,
    k_file: Option<&Path>,
    backend: SymbolBackend,
    no_doc: bool,
    cache_dir: Option<PathBuf>,
    keep_cache: bool,
    threads: Option<usize>,
) -> anyhow::Result<()> {
    if let Some(path) = k_file {
        for token in read_tokens(path)? {
            ks.push(token.parse().with_context(|| format!("bad k value `{token}`"))?);
        }
    }
    anyhow::ensure!(!ks.is_empty(), "no k value given (use -k or --k-file)");

    let sequences = SequenceSet::from_fasta_path(input)
        .with_context(|| format!("read {}", input.display()))?;
    let mut cfg = BuildConfig::default()
        .backend(backend)
        .document_index(!no_doc)
        .keep_artifacts(keep_cache);
    if let Some(dir) = cache_dir {
        cfg = cfg.cache_dir(dir);
    }
    if let Some(n) = threads {
        cfg = cfg.threads(n);
    }
    let ctx = BuildContext::new(&sequences, cfg)?;

    let mut failed = Vec::new();
    for (k, saved) in write_graphs(&ctx, &ks, output) {
        match saved {
            Ok(path) => eprintln!("Built graph: k={k} -> {}", path.display()),
            Err(_) => failed.push(k),
        }
    }
    anyhow::ensure!(failed.is_empty(), "no graph written for k in {failed:?}");
    Ok(())
}

fn find_pattern(graph: &Path, patterns: &Path) -> anyhow::Result<()> {
    let g = CompressedGraph::load(graph).with_context(|| format!("load {}", graph.display()))?;
    let patterns = read_tokens(patterns)?;
    let (mut t_search, mut t_first, mut t_all) = (Duration::ZERO, Duration::ZERO, Duration::ZERO);
    let mut found = 0usize;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for p in &patterns {
        let t = Instant::now();
        let path = g.find_nodes(p.as_bytes());
        t_search += t.elapsed();
        if !path.is_found() {
            writeln!(out, "Pattern '{p}' does not occur.\n")?;
            continue;
        }
        found += 1;
        writeln!(out, "Pattern '{p}' occurs in the following nodes: {}", join(&path.nodes))?;

        let t = Instant::now();
        black_box(g.sequences_in_node(path.nodes[0]));
        t_first += t.elapsed();

        let t = Instant::now();
        for &id in &path.nodes {
            let seqs = g.sequences_in_node(id);
            writeln!(
                out,
                "Node {id} corresponds to a substring that occurs in the following sequences: {}",
                join(&seqs)
            )?;
        }
        t_all += t.elapsed();
        writeln!(out)?;
    }
    writeln!(out, "Found {found} of {} patterns", patterns.len())?;
    writeln!(out, "{:>10}ms to search patterns.", t_search.as_millis())?;
    writeln!(out, "{:>10}ms to list sequences of the first node.", t_first.as_millis())?;
    writeln!(out, "{:>10}ms to list sequences of all nodes.", t_all.as_millis())?;
    Ok(())
}

fn impl2expl(graph: &Path, output: &Path) -> anyhow::Result<()> {
    let g = CompressedGraph::load(graph).with_context(|| format!("load {}", graph.display()))?;
    let explicit = g.get_explicit_representation();

    let dot_path = with_suffix(output, ".dot");
    let start_path = with_suffix(output, ".start_nodes.txt");
    let mut dot = BufWriter::new(File::create(&dot_path).with_context(|| format!("create {}", dot_path.display()))?);
    explicit.write_dot(&mut dot)?;
    dot.flush()?;
    let mut starts = BufWriter::new(File::create(&start_path).with_context(|| format!("create {}", start_path.display()))?);
    explicit.write_start_nodes(&mut starts)?;
    starts.flush()?;
    let bin_path = with_suffix(output, ".explicit.bin");
    let mut bin = BufWriter::new(File::create(&bin_path).with_context(|| format!("create {}", bin_path.display()))?);
    write_explicit(&explicit, &mut bin)?;
    bin.flush()?;
    eprintln!(
        "Explicit graph: nodes={}, edges={} -> {}",
        explicit.node_count(),
        explicit.edge_count(),
        dot_path.display()
    );
    Ok(())
}

fn verify(explicit: &Path, k: usize) -> anyhow::Result<()> {
    let mut r = BufReader::new(File::open(explicit).with_context(|| format!("open {}", explicit.display()))?);
    let graph = read_explicit(&mut r).with_context(|| format!("read {}", explicit.display()))?;
    let spans = graph.verify(k)?;
    for (i, span) in spans.iter().enumerate() {
        println!("sequence {i}: {span} characters (separator included)");
    }
    println!("Explicit graph is consistent: {} sequences", spans.len());
    Ok(())
}

fn details(graph: &Path) -> anyhow::Result<()> {
    let g = CompressedGraph::load(graph).with_context(|| format!("load {}", graph.display()))?;
    print!("{}", GraphStats::compute(&g));
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match args.command {
        Command::Construct {
            input,
            output,
            ks,
            k_file,
            backend,
            no_doc,
            cache_dir,
            keep_cache,
            threads,
        } => construct(
            &input,
            &output,
            ks,
            k_file.as_deref(),
            backend,
            no_doc,
            cache_dir,
            keep_cache,
            threads,
        ),
        Command::FindPattern { graph, patterns } => find_pattern(&graph, &patterns),
        Command::Impl2expl { graph, output } => impl2expl(&graph, &output),
        Command::Verify { explicit, k } => verify(&explicit, k),
        Command::Details { graph } => details(&graph),
    }
}
