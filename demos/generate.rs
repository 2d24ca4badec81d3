//! Grammar-authoring helper (§4.1): emits a starting grammar file for
//! an `m`x`n` undirected square grid, useful as a test fixture or
//! example grammar. Ported from `soffit.generate`.
//!
//! Lives outside `src/` since it is a generator utility rather than
//! engine surface, but it's a thin consumer of the library crate like
//! `src/bin/graphgram.rs` is.

use clap::Parser;
use graphgram::error::GraphGramError;
use graphgram::{Graph, NodeId};
use serde_json::json;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "generate", about = "Emit a starting grammar for an m x n square grid", version)]
struct Cli {
    /// Grid width (number of columns).
    #[arg(short, long, default_value_t = 5)]
    m: usize,

    /// Grid height (number of rows).
    #[arg(short, long, default_value_t = 5)]
    n: usize,

    /// Tag applied uniformly to every node.
    #[arg(long)]
    node_tag: Option<String>,

    /// Tag applied uniformly to every edge.
    #[arg(long)]
    edge_tag: Option<String>,

    /// Where to write the grammar JSON (stdout if omitted).
    #[arg(short, long)]
    output: Option<PathBuf>,
}

/// Build an undirected `m`x`n` grid graph: nodes at integer coordinates
/// `(i, j)` for `i in 0..m`, `j in 0..n`, edges only between
/// grid-adjacent cells (no diagonals, no wraparound). Grounded in
/// `soffit.generate.undirectedSquareGrid`, itself `networkx`'s
/// `grid_2d_graph`.
fn undirected_square_grid(m: usize, n: usize, node_tag: Option<&str>, edge_tag: Option<&str>) -> Graph {
    let mut g = Graph::new_undirected();
    let mut ids: HashMap<(usize, usize), NodeId> = HashMap::with_capacity(m * n);
    for i in 0..m {
        for j in 0..n {
            ids.insert((i, j), g.mint_node(node_tag.map(str::to_owned)));
        }
    }
    for i in 0..m {
        for j in 0..n {
            let here = ids[&(i, j)];
            if i + 1 < m {
                g.add_edge(here, ids[&(i + 1, j)], edge_tag.map(str::to_owned));
            }
            if j + 1 < n {
                g.add_edge(here, ids[&(i, j + 1)], edge_tag.map(str::to_owned));
            }
        }
    }
    g
}

/// The minimal grammar `soffit.generate.grammarWithStartRule` wraps
/// around `compactRep`: just `version` and `start`, no rules. Built
/// with `serde_json` rather than the original's string template so the
/// graph string is always correctly JSON-escaped.
fn grammar_with_start_rule(start: &Graph) -> String {
    let doc = json!({
        "version": "0.1",
        "start": start.compact_repr(),
    });
    serde_json::to_string_pretty(&doc).expect("a json object of strings serializes infallibly")
}

fn run(cli: &Cli) -> Result<(), GraphGramError> {
    let grid = undirected_square_grid(cli.m, cli.n, cli.node_tag.as_deref(), cli.edge_tag.as_deref());
    let doc = grammar_with_start_rule(&grid);
    match &cli.output {
        Some(path) => {
            std::fs::write(path, doc).map_err(|source| GraphGramError::Io {
                path: path.clone(),
                source,
            })?;
            log::info!("wrote {:?}", path);
        }
        None => println!("{doc}"),
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::from(1)
        }
    }
}
