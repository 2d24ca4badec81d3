//! The labeled graph model (§3, §4.1 of the design doc).
//!
//! A [`Graph`] is always keyed by dense-ish `usize` node identifiers
//! minted from a monotonically increasing counter (`next_id`), mirroring
//! `soffit.graph.graphIdentifiersToNumbers`. Node and edge tags are
//! optional strings compared by equality; an absent tag is a distinct
//! value from any present tag, never a wildcard.
//!
//! Undirected and directed graphs share one representation here rather
//! than being distinct types (unlike petgraph's `Directed`/`Undirected`
//! marker types) because rules routinely need to promote an undirected
//! graph to directed at parse time, and carrying that as a runtime flag
//! keeps the rest of the crate (which is generic over neither) simple.

use indexmap::{IndexMap, IndexSet};
use std::collections::HashMap;
use std::fmt;

/// A node identifier. Newtype over `usize` so graph code can't
/// accidentally mix node ids with unrelated integers (CSP domain
/// values, vector indices, etc.) without an explicit conversion.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub usize);

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An edge identified by its endpoints, already canonicalized for the
/// owning graph (sorted for undirected graphs, `(src, dst)` order for
/// directed ones).
pub type Edge = (NodeId, NodeId);

/// Per-graph caches mapping a tag to the nodes/edges carrying it,
/// built lazily by the match finder and reused across repeated
/// matching attempts against the same compacted host graph (§4.1,
/// §4.3's `NodeTagConstraint`/`EdgeTagConstraint` preprocessing).
#[derive(Debug, Default, Clone)]
pub struct TagCaches {
    nodes_by_tag: HashMap<Option<String>, Vec<NodeId>>,
    edges_by_tag: HashMap<Option<String>, Vec<Edge>>,
}

/// A finite, simple, labeled graph: either all directed or all
/// undirected. See the module doc for why directedness is a runtime
/// flag rather than a type parameter.
#[derive(Clone)]
pub struct Graph {
    directed: bool,
    next_id: usize,
    node_tags: IndexMap<NodeId, Option<String>>,
    out_adj: HashMap<NodeId, IndexSet<NodeId>>,
    in_adj: HashMap<NodeId, IndexSet<NodeId>>,
    edge_tags: HashMap<Edge, Option<String>>,
    tag_caches: Option<TagCaches>,
}

impl fmt::Debug for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Graph")
            .field("directed", &self.directed)
            .field("nodes", &self.node_tags.len())
            .field("edges", &self.edge_tags.len())
            .finish()
    }
}

impl Graph {
    pub fn new(directed: bool) -> Self {
        Graph {
            directed,
            next_id: 0,
            node_tags: IndexMap::new(),
            out_adj: HashMap::new(),
            in_adj: HashMap::new(),
            edge_tags: HashMap::new(),
            tag_caches: None,
        }
    }

    pub fn new_undirected() -> Self {
        Graph::new(false)
    }

    pub fn new_directed() -> Self {
        Graph::new(true)
    }

    pub fn is_directed(&self) -> bool {
        self.directed
    }

    pub fn node_count(&self) -> usize {
        self.node_tags.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_tags.len()
    }

    pub fn has_node(&self, n: NodeId) -> bool {
        self.node_tags.contains_key(&n)
    }

    /// Iterate nodes in insertion order, which is what makes `compact`
    /// deterministic given a deterministic insertion order upstream.
    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.node_tags.keys().copied()
    }

    pub fn node_tag(&self, n: NodeId) -> Option<&str> {
        self.node_tags.get(&n).and_then(|t| t.as_deref())
    }

    pub fn set_node_tag(&mut self, n: NodeId, tag: Option<String>) {
        if let Some(slot) = self.node_tags.get_mut(&n) {
            *slot = tag;
            self.tag_caches = None;
        }
    }

    /// Mint a fresh node id (`next_id`, then increment), add it to the
    /// graph, and return it. The sole way new node ids come into
    /// existence (§4.1 invariant: `nextId > max(V)` always holds).
    pub fn mint_node(&mut self, tag: Option<String>) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.node_tags.insert(id, tag);
        self.out_adj.entry(id).or_default();
        self.in_adj.entry(id).or_default();
        self.tag_caches = None;
        id
    }

    fn canonical(&self, a: NodeId, b: NodeId) -> Edge {
        if self.directed || a <= b {
            (a, b)
        } else {
            (b, a)
        }
    }

    pub fn has_edge(&self, a: NodeId, b: NodeId) -> bool {
        self.edge_tags.contains_key(&self.canonical(a, b))
    }

    pub fn edge_tag(&self, a: NodeId, b: NodeId) -> Option<&str> {
        self.edge_tags
            .get(&self.canonical(a, b))
            .and_then(|t| t.as_deref())
    }

    /// Add an edge between two existing nodes. Returns `false` without
    /// modifying anything if the edge already exists (callers that care
    /// about tag conflicts on a re-add should check `edge_tag` first;
    /// that policy lives in the parser, not the graph model).
    pub fn add_edge(&mut self, a: NodeId, b: NodeId, tag: Option<String>) -> bool {
        let key = self.canonical(a, b);
        if self.edge_tags.contains_key(&key) {
            return false;
        }
        self.edge_tags.insert(key, tag);
        self.out_adj.entry(a).or_default().insert(b);
        self.in_adj.entry(b).or_default().insert(a);
        if !self.directed && a != b {
            self.out_adj.entry(b).or_default().insert(a);
            self.in_adj.entry(a).or_default().insert(b);
        }
        self.tag_caches = None;
        true
    }

    /// Retag an existing edge in place, used by rule application (§4.5
    /// step 6) to retag an edge that survives a rewrite without
    /// removing and re-adding it. No-op if the edge does not exist.
    pub fn set_edge_tag(&mut self, a: NodeId, b: NodeId, tag: Option<String>) {
        let key = self.canonical(a, b);
        if let Some(slot) = self.edge_tags.get_mut(&key) {
            *slot = tag;
            self.tag_caches = None;
        }
    }

    pub fn remove_edge(&mut self, a: NodeId, b: NodeId) {
        let key = self.canonical(a, b);
        if self.edge_tags.remove(&key).is_none() {
            return;
        }
        if let Some(s) = self.out_adj.get_mut(&a) {
            s.shift_remove(&b);
        }
        if let Some(s) = self.in_adj.get_mut(&b) {
            s.shift_remove(&a);
        }
        if !self.directed && a != b {
            if let Some(s) = self.out_adj.get_mut(&b) {
                s.shift_remove(&a);
            }
            if let Some(s) = self.in_adj.get_mut(&a) {
                s.shift_remove(&b);
            }
        }
        self.tag_caches = None;
    }

    /// Remove a node. Debug-asserts it has no remaining incident edges,
    /// matching §4.5 step 2/3 ordering (edges are always deleted before
    /// the nodes they touch).
    pub fn remove_node(&mut self, n: NodeId) {
        debug_assert!(
            self.out_adj.get(&n).map_or(true, |s| s.is_empty())
                && self.in_adj.get(&n).map_or(true, |s| s.is_empty()),
            "remove_node({n:?}) called with dangling incident edges"
        );
        self.node_tags.shift_remove(&n);
        self.out_adj.remove(&n);
        self.in_adj.remove(&n);
        self.tag_caches = None;
    }

    pub fn has_self_loop(&self, n: NodeId) -> bool {
        self.has_edge(n, n)
    }

    /// Neighbors of `n`, excluding `n` itself even in the presence of a
    /// self loop (§4.4's dangling-condition derivation explicitly wants
    /// `neighbors(i)` with self excluded; self loops are handled
    /// separately via [`Graph::has_self_loop`]).
    pub fn neighbors(&self, n: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        let out = self.out_adj.get(&n);
        let inn = self.in_adj.get(&n);
        out.into_iter()
            .flatten()
            .chain(inn.into_iter().flatten())
            .copied()
            .filter(move |&x| x != n)
            .collect::<IndexSet<_>>()
            .into_iter()
    }

    pub fn out_neighbors(&self, n: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.out_adj.get(&n).into_iter().flatten().copied()
    }

    pub fn in_neighbors(&self, n: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.in_adj.get(&n).into_iter().flatten().copied()
    }

    pub fn degree(&self, n: NodeId) -> usize {
        self.neighbors(n).count()
    }

    /// All edges, each yielded once in canonical form.
    pub fn edges(&self) -> impl Iterator<Item = Edge> + '_ {
        self.edge_tags.keys().copied()
    }

    /// Renumber nodes to a dense `0..node_count()` range, preserving
    /// tags, edges and directedness. Returns the new graph together with
    /// `orig[i] == original NodeId of new node i`, so solver output can
    /// be mapped back to the caller's identifiers (§4.1, testable
    /// property 1).
    pub fn compact(&self) -> (Graph, Vec<NodeId>) {
        let orig: Vec<NodeId> = self.nodes().collect();
        let mut remap: HashMap<NodeId, NodeId> = HashMap::with_capacity(orig.len());
        let mut out = Graph::new(self.directed);
        for (new_idx, &old) in orig.iter().enumerate() {
            let minted = out.mint_node(self.node_tag(old).map(str::to_owned));
            debug_assert_eq!(minted, NodeId(new_idx));
            remap.insert(old, minted);
        }
        for (a, b) in self.edges() {
            let tag = self.edge_tag(a, b).map(str::to_owned);
            out.add_edge(remap[&a], remap[&b], tag);
        }
        (out, orig)
    }

    /// Promote an undirected graph to directed by doubling every edge
    /// (`a--b` becomes `a->b` and `b->a`), per `soffit.application`'s
    /// `makeAllDirected`. A no-op clone if already directed.
    pub fn to_directed(&self) -> Graph {
        if self.directed {
            return self.clone();
        }
        let mut out = Graph::new(true);
        for n in self.nodes() {
            let minted = out.mint_node(self.node_tag(n).map(str::to_owned));
            debug_assert_eq!(minted, n);
        }
        for (a, b) in self.edges() {
            let tag = self.edge_tag(a, b).map(str::to_owned);
            out.add_edge(a, b, tag.clone());
            out.add_edge(b, a, tag);
        }
        out
    }

    fn build_tag_caches(&self) -> TagCaches {
        let mut nodes_by_tag: HashMap<Option<String>, Vec<NodeId>> = HashMap::new();
        for n in self.nodes() {
            nodes_by_tag
                .entry(self.node_tag(n).map(str::to_owned))
                .or_default()
                .push(n);
        }
        let mut edges_by_tag: HashMap<Option<String>, Vec<Edge>> = HashMap::new();
        for (a, b) in self.edges() {
            edges_by_tag
                .entry(self.edge_tag(a, b).map(str::to_owned))
                .or_default()
                .push((a, b));
        }
        TagCaches {
            nodes_by_tag,
            edges_by_tag,
        }
    }

    /// Nodes carrying exactly `tag` (`None` meaning "no tag"), using and
    /// populating the lazily-built tag cache.
    pub fn nodes_with_tag(&mut self, tag: Option<&str>) -> &[NodeId] {
        if self.tag_caches.is_none() {
            self.tag_caches = Some(self.build_tag_caches());
        }
        let key = tag.map(str::to_owned);
        self.tag_caches
            .as_ref()
            .unwrap()
            .nodes_by_tag
            .get(&key)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Edges carrying exactly `tag`, each in canonical form; see
    /// [`Graph::nodes_with_tag`].
    pub fn edges_with_tag(&mut self, tag: Option<&str>) -> &[Edge] {
        if self.tag_caches.is_none() {
            self.tag_caches = Some(self.build_tag_caches());
        }
        let key = tag.map(str::to_owned);
        self.tag_caches
            .as_ref()
            .unwrap()
            .edges_by_tag
            .get(&key)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn invalidate_tag_caches(&mut self) {
        self.tag_caches = None;
    }

    /// Render back to the §6 graph-string grammar. Nodes with no tag and
    /// no incident edges are emitted as bare identifiers so they are not
    /// silently dropped; this is the inverse of `parse::graph_string`
    /// modulo the original textual vertex names (which are not retained
    /// past parsing, so round-tripping compares by isomorphism, not by
    /// name).
    pub fn compact_repr(&self) -> String {
        fn escape(tag: &str) -> String {
            tag.replace('\\', "\\\\").replace(']', "\\]")
        }
        let mut parts = Vec::new();
        for n in self.nodes() {
            let isolated = self.degree(n) == 0 && !self.has_self_loop(n);
            if let Some(tag) = self.node_tag(n) {
                parts.push(format!("{}[{}]", n, escape(tag)));
            } else if isolated {
                parts.push(format!("{n}"));
            }
        }
        for (a, b) in self.edges() {
            let op = if self.directed { "->" } else { "--" };
            let mut s = format!("{a}{op}{b}");
            if let Some(tag) = self.edge_tag(a, b) {
                s.push('[');
                s.push_str(&escape(tag));
                s.push(']');
            }
            parts.push(s);
        }
        parts.join(";")
    }
}
