//! Textual parser (§4.7, §6): the two-layer graph-grammar text format.
//!
//! The outer layer is a JSON envelope (`version`/`start`/`extensions`
//! plus rule entries) parsed with `serde_json` into an untyped
//! [`serde_json::Map`] first, so `extensions` payloads of arbitrary
//! shape pass through losslessly. The inner layer is the graph-string
//! grammar of §6 — semicolon-separated elements, `--`/`->`/`<-` edges,
//! `[...]` tags, `^`-joined vertex sets — parsed by a small
//! hand-written recursive-descent parser over `char` positions,
//! mirroring the structure (if not the implementation) of
//! `soffit.parse.parseGraphString` and `WorkingGraph`.

use crate::error::{GrammarParseError, ParseError, Position, RuleError};
use crate::graph::{Graph, NodeId};
use crate::rule::Rule;
use std::collections::HashMap;

// ---------------------------------------------------------------------
// Union-find over vertex name strings (§9 "merge/union-find").
// ---------------------------------------------------------------------

#[derive(Default)]
struct UnionFind {
    parent: HashMap<String, String>,
}

impl UnionFind {
    fn new() -> Self {
        UnionFind::default()
    }

    fn touch(&mut self, name: &str) {
        self.parent
            .entry(name.to_string())
            .or_insert_with(|| name.to_string());
    }

    fn find(&mut self, name: &str) -> String {
        self.touch(name);
        let parent = self.parent[name].clone();
        if parent == name {
            return name.to_string();
        }
        let root = self.find(&parent);
        self.parent.insert(name.to_string(), root.clone());
        root
    }

    /// Cyclic merges collapse to one root (§9): repeated unions of
    /// already-joined names are no-ops via `find`'s equality check.
    fn union(&mut self, a: &str, b: &str) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra != rb {
            self.parent.insert(ra, rb);
        }
    }
}

// ---------------------------------------------------------------------
// Character-level cursor.
// ---------------------------------------------------------------------

#[derive(Clone)]
struct Cursor {
    chars: Vec<char>,
    idx: usize,
    line: usize,
    column: usize,
}

impl Cursor {
    fn new(s: &str) -> Self {
        Cursor {
            chars: s.chars().collect(),
            idx: 0,
            line: 1,
            column: 1,
        }
    }

    fn pos(&self) -> Position {
        Position {
            line: self.line,
            column: self.column,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.idx).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.idx + offset).copied()
    }

    fn eof(&self) -> bool {
        self.idx >= self.chars.len()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.idx += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }
}

fn skip_ws(cur: &mut Cursor) {
    while matches!(cur.peek(), Some(c) if c.is_whitespace()) {
        cur.bump();
    }
}

fn is_vertex_char(c: char) -> bool {
    !c.is_whitespace() && !matches!(c, ';' | '[' | ']' | '^' | '\\' | '-' | '<' | '>')
}

// ---------------------------------------------------------------------
// Raw (pre-union-find) element structure.
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EdgeOp {
    Undirected,
    Forward,
    Backward,
}

#[derive(Debug, Clone)]
struct RawElement {
    /// A chain of `nodeExpr`s; each is itself a `^`-merge set of names.
    chain: Vec<Vec<String>>,
    /// One operator between each adjacent pair in `chain`.
    ops: Vec<EdgeOp>,
    tag: Option<String>,
}

fn parse_vertex(cur: &mut Cursor) -> Result<String, ParseError> {
    skip_ws(cur);
    let pos = cur.pos();
    if cur.peek().map_or(true, |c| !is_vertex_char(c)) {
        return Err(ParseError::ExpectedVertex { pos });
    }
    let mut s = String::new();
    while let Some(c) = cur.peek() {
        if is_vertex_char(c) {
            s.push(c);
            cur.bump();
        } else {
            break;
        }
    }
    Ok(s)
}

fn parse_node_expr(cur: &mut Cursor) -> Result<Vec<String>, ParseError> {
    let mut names = vec![parse_vertex(cur)?];
    loop {
        let save = cur.clone();
        skip_ws(cur);
        if cur.peek() == Some('^') {
            cur.bump();
            skip_ws(cur);
            names.push(parse_vertex(cur)?);
        } else {
            *cur = save;
            break;
        }
    }
    Ok(names)
}

fn parse_edge_op(cur: &mut Cursor) -> Option<EdgeOp> {
    let a = cur.peek()?;
    let b = cur.peek_at(1)?;
    let op = match (a, b) {
        ('-', '-') => EdgeOp::Undirected,
        ('-', '>') => EdgeOp::Forward,
        ('<', '-') => EdgeOp::Backward,
        _ => return None,
    };
    cur.bump();
    cur.bump();
    Some(op)
}

fn parse_tag(cur: &mut Cursor) -> Result<Option<String>, ParseError> {
    let save = cur.clone();
    skip_ws(cur);
    if cur.peek() != Some('[') {
        *cur = save;
        return Ok(None);
    }
    let start_pos = cur.pos();
    cur.bump();
    let mut s = String::new();
    loop {
        match cur.peek() {
            None => return Err(ParseError::UnterminatedTag { pos: start_pos }),
            Some('\\') => {
                cur.bump();
                match cur.bump() {
                    Some(c) => s.push(c),
                    None => return Err(ParseError::UnterminatedTag { pos: start_pos }),
                }
            }
            Some(']') => {
                cur.bump();
                break;
            }
            Some(c) => {
                s.push(c);
                cur.bump();
            }
        }
    }
    Ok(Some(s))
}

fn parse_element(cur: &mut Cursor) -> Result<RawElement, ParseError> {
    let mut chain = vec![parse_node_expr(cur)?];
    let mut ops = Vec::new();
    loop {
        let save = cur.clone();
        skip_ws(cur);
        match parse_edge_op(cur) {
            Some(op) => {
                ops.push(op);
                chain.push(parse_node_expr(cur)?);
            }
            None => {
                *cur = save;
                break;
            }
        }
    }
    let tag = parse_tag(cur)?;
    Ok(RawElement { chain, ops, tag })
}

struct RawGraph {
    elements: Vec<RawElement>,
}

fn parse_raw_graph(s: &str) -> Result<RawGraph, ParseError> {
    let mut cur = Cursor::new(s);
    skip_ws(&mut cur);
    if cur.eof() {
        return Ok(RawGraph { elements: Vec::new() });
    }
    if cur.peek() == Some(';') {
        let save = cur.clone();
        cur.bump();
        skip_ws(&mut cur);
        if cur.eof() {
            return Ok(RawGraph { elements: Vec::new() });
        }
        cur = save;
    }

    let mut elements = Vec::new();
    loop {
        elements.push(parse_element(&mut cur)?);
        skip_ws(&mut cur);
        if cur.peek() == Some(';') {
            cur.bump();
            skip_ws(&mut cur);
            if cur.eof() {
                break;
            }
        } else {
            break;
        }
    }
    skip_ws(&mut cur);
    if !cur.eof() {
        let remainder: String = cur.chars[cur.idx..].iter().collect();
        return Err(ParseError::TrailingInput { remainder });
    }
    Ok(RawGraph { elements })
}

// ---------------------------------------------------------------------
// Building a Graph from the raw structure, tracking vertex names.
// ---------------------------------------------------------------------

/// A parsed graph together with the map from every vertex name that
/// appeared in the source text to the node it resolved to (after
/// `^`-merge resolution). Used by [`build_rule`] to correlate a rule's
/// left- and right-hand sides by shared vertex name, the same
/// mechanism `soffit.grammar`'s same-named-node convention relies on.
#[derive(Debug, Clone)]
pub struct ParsedGraph {
    pub graph: Graph,
    pub names: HashMap<String, NodeId>,
}

fn resolve_or_create(
    g: &mut Graph,
    root_to_id: &mut HashMap<String, NodeId>,
    uf: &mut UnionFind,
    group: &[String],
    tag: Option<&str>,
) -> Result<NodeId, ParseError> {
    let root = uf.find(&group[0]);
    if let Some(&id) = root_to_id.get(&root) {
        if let Some(t) = tag {
            match g.node_tag(id) {
                Some(existing) if existing != t => {
                    return Err(ParseError::MismatchedTag {
                        old_tag: existing.to_string(),
                        new_tag: t.to_string(),
                    })
                }
                Some(_) => {}
                None => g.set_node_tag(id, Some(t.to_string())),
            }
        }
        Ok(id)
    } else {
        let id = g.mint_node(tag.map(str::to_owned));
        root_to_id.insert(root, id);
        Ok(id)
    }
}

fn add_edge_checked(g: &mut Graph, a: NodeId, b: NodeId, tag: Option<&str>) -> Result<(), ParseError> {
    if g.has_edge(a, b) {
        if let Some(t) = tag {
            match g.edge_tag(a, b) {
                Some(existing) if existing != t => {
                    return Err(ParseError::MismatchedTag {
                        old_tag: existing.to_string(),
                        new_tag: t.to_string(),
                    })
                }
                Some(_) => {}
                None => g.set_edge_tag(a, b, Some(t.to_string())),
            }
        }
    } else {
        g.add_edge(a, b, tag.map(str::to_owned));
    }
    Ok(())
}

fn apply_element(
    g: &mut Graph,
    root_to_id: &mut HashMap<String, NodeId>,
    uf: &mut UnionFind,
    directed_overall: bool,
    elem: &RawElement,
) -> Result<(), ParseError> {
    if elem.chain.len() == 1 {
        resolve_or_create(g, root_to_id, uf, &elem.chain[0], elem.tag.as_deref())?;
        return Ok(());
    }
    let tag = elem.tag.as_deref();
    let mut prev = resolve_or_create(g, root_to_id, uf, &elem.chain[0], None)?;
    for (i, op) in elem.ops.iter().enumerate() {
        let next = resolve_or_create(g, root_to_id, uf, &elem.chain[i + 1], None)?;
        match op {
            EdgeOp::Undirected => {
                add_edge_checked(g, prev, next, tag)?;
                if directed_overall {
                    add_edge_checked(g, next, prev, tag)?;
                }
            }
            EdgeOp::Forward => add_edge_checked(g, prev, next, tag)?,
            EdgeOp::Backward => add_edge_checked(g, next, prev, tag)?,
        }
        prev = next;
    }
    Ok(())
}

/// Parse a graph string, returning the graph plus a map from every
/// vertex name in the source to the node it resolved to. `join_allowed`
/// gates `^`-merge syntax: `false` for a rule's left-hand side and for
/// start graphs, `true` for right-hand sides (§6: "`^` in the
/// left-hand side of a rule is disallowed").
pub fn parse_named(s: &str, join_allowed: bool) -> Result<ParsedGraph, ParseError> {
    let raw = parse_raw_graph(s)?;
    let directed = raw
        .elements
        .iter()
        .any(|e| e.ops.iter().any(|op| *op != EdgeOp::Undirected));

    let mut uf = UnionFind::new();
    let mut all_names: Vec<String> = Vec::new();
    for e in &raw.elements {
        for group in &e.chain {
            for n in group {
                uf.touch(n);
                all_names.push(n.clone());
            }
            if group.len() > 1 {
                if !join_allowed {
                    return Err(ParseError::MergeDisallowed);
                }
                for other in &group[1..] {
                    uf.union(&group[0], other);
                }
            }
        }
    }

    let mut g = Graph::new(directed);
    let mut root_to_id: HashMap<String, NodeId> = HashMap::new();
    for e in &raw.elements {
        apply_element(&mut g, &mut root_to_id, &mut uf, directed, e)?;
    }

    let mut names: HashMap<String, NodeId> = HashMap::new();
    for n in all_names {
        let root = uf.find(&n);
        if let Some(&id) = root_to_id.get(&root) {
            names.insert(n, id);
        }
    }

    Ok(ParsedGraph { graph: g, names })
}

/// Parse a graph string into a plain [`Graph`], discarding vertex
/// names (they are not retained past parsing; see
/// `Graph::compact_repr`). `^`-merges are disallowed, matching the
/// constraint on start graphs and rule left-hand sides.
pub fn graph_string(s: &str) -> Result<Graph, ParseError> {
    parse_named(s, false).map(|p| p.graph)
}

/// Build a [`Rule`] by correlating `left` and `right` vertex names:
/// any name appearing in both sides' `names` maps survives (mirroring
/// `soffit.grammar`'s same-name convention); names only in `left` are
/// deleted; names only in `right` are fresh nodes the applier mints.
fn build_rule(left: &ParsedGraph, right: &ParsedGraph) -> Result<Rule, RuleError> {
    let mut rename = HashMap::new();
    for (name, &l_id) in &left.names {
        if let Some(&r_id) = right.names.get(name) {
            rename.insert(l_id, r_id);
        }
    }
    Rule::new(left.graph.clone(), right.graph.clone(), rename, Default::default())
}

/// Parse a left-hand and right-hand graph string into a [`Rule`],
/// correlating surviving nodes by shared vertex name. A convenience
/// entry point for constructing rules outside a full grammar file
/// (tests, ad hoc library use).
pub fn rule_from_strings(left: &str, right: &str) -> Result<Rule, GrammarParseError> {
    let left = parse_named(left, false).map_err(|source| GrammarParseError::BadLeft {
        left: left.to_string(),
        source,
    })?;
    let right_parsed = parse_named(right, true).map_err(|source| GrammarParseError::BadRight {
        left: String::new(),
        right: right.to_string(),
        source,
    })?;
    Ok(build_rule(&left, &right_parsed)?)
}

// ---------------------------------------------------------------------
// Outer grammar-file format (§6).
// ---------------------------------------------------------------------

use crate::driver::{Grammar, GrammarRule};

/// Parse a grammar file's JSON text into a [`Grammar`] (§6, §4.7): an
/// untyped object first, so `extensions` passes through losslessly,
/// then interpreted key by key.
pub fn load_grammar(json_text: &str) -> Result<Grammar, GrammarParseError> {
    let obj: serde_json::Map<String, serde_json::Value> = serde_json::from_str(json_text)?;

    let version = obj.get("version").and_then(|v| v.as_str()).unwrap_or("0.1");
    if version != "0.1" {
        return Err(GrammarParseError::UnsupportedVersion(version.to_string()));
    }

    let start_str = obj
        .get("start")
        .and_then(|v| v.as_str())
        .ok_or(GrammarParseError::BadStart(ParseError::UnexpectedEof {
            expected: "a \"start\" graph string",
        }))?;
    let start = graph_string(start_str).map_err(GrammarParseError::BadStart)?;
    let extensions = obj.get("extensions").cloned();

    let mut rules = Vec::new();
    for (key, value) in &obj {
        if matches!(key.as_str(), "version" | "start" | "extensions") {
            continue;
        }
        let left = parse_named(key, false).map_err(|source| GrammarParseError::BadLeft {
            left: key.clone(),
            source,
        })?;
        match value {
            serde_json::Value::String(r) => {
                let right = parse_named(r, true).map_err(|source| GrammarParseError::BadRight {
                    left: key.clone(),
                    right: r.clone(),
                    source,
                })?;
                rules.push(GrammarRule::Deterministic(build_rule(&left, &right)?));
            }
            serde_json::Value::Array(items) => {
                let mut alts = Vec::new();
                for item in items {
                    let r = item.as_str().ok_or_else(|| GrammarParseError::BadRight {
                        left: key.clone(),
                        right: item.to_string(),
                        source: ParseError::UnexpectedEof {
                            expected: "a right-hand graph string",
                        },
                    })?;
                    let right = parse_named(r, true).map_err(|source| GrammarParseError::BadRight {
                        left: key.clone(),
                        right: r.to_string(),
                        source,
                    })?;
                    alts.push(build_rule(&left, &right)?);
                }
                rules.push(GrammarRule::Choice(alts));
            }
            _ => {
                return Err(GrammarParseError::BadRight {
                    left: key.clone(),
                    right: value.to_string(),
                    source: ParseError::UnexpectedEof {
                        expected: "a string or array of strings",
                    },
                })
            }
        }
    }

    Ok(Grammar {
        rules,
        start,
        extensions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_chain_with_tags() {
        let g = graph_string("A--B[x]; B--C[x]").unwrap();
        assert_eq!(g.node_count(), 3);
        assert_eq!(g.edge_count(), 2);
        assert!(!g.is_directed());
    }

    #[test]
    fn directed_edge_promotes_whole_graph() {
        let g = graph_string("A->B; C--D").unwrap();
        assert!(g.is_directed());
        // The "--" edge in a directed graph is doubled.
        assert_eq!(g.edge_count(), 3);
    }

    #[test]
    fn backward_edge_reverses_direction() {
        let g = graph_string("A<-B").unwrap();
        let mut nodes = g.nodes();
        let a = nodes.next().unwrap();
        let b = nodes.next().unwrap();
        assert!(g.has_edge(b, a));
        assert!(!g.has_edge(a, b));
    }

    #[test]
    fn isolated_vertex_with_tag() {
        let g = graph_string("X[lonely]").unwrap();
        assert_eq!(g.node_count(), 1);
        let n = g.nodes().next().unwrap();
        assert_eq!(g.node_tag(n), Some("lonely"));
    }

    #[test]
    fn escaped_bracket_in_tag() {
        let g = graph_string(r"X[a\]b]").unwrap();
        let n = g.nodes().next().unwrap();
        assert_eq!(g.node_tag(n), Some("a]b"));
    }

    #[test]
    fn merge_on_left_side_is_rejected() {
        let err = parse_named("A^B", false).unwrap_err();
        assert_eq!(err, ParseError::MergeDisallowed);
    }

    #[test]
    fn merge_on_right_side_collapses_to_one_node() {
        let g = graph_string_allow_join("B^C^D[star]");
        assert_eq!(g.node_count(), 1);
        assert_eq!(g.node_tag(g.nodes().next().unwrap()), Some("star"));
    }

    fn graph_string_allow_join(s: &str) -> Graph {
        parse_named(s, true).unwrap().graph
    }

    #[test]
    fn mismatched_tag_on_same_node_is_an_error() {
        let err = graph_string("A[x]; A[y]").unwrap_err();
        assert!(matches!(err, ParseError::MismatchedTag { .. }));
    }

    #[test]
    fn unterminated_tag_reports_position() {
        let err = graph_string("A[oops").unwrap_err();
        match err {
            ParseError::UnterminatedTag { pos } => assert_eq!(pos.column, 2),
            other => panic!("expected UnterminatedTag, got {other:?}"),
        }
    }

    #[test]
    fn trailing_input_is_rejected() {
        let err = graph_string("A--B extra").unwrap_err();
        assert!(matches!(err, ParseError::TrailingInput { .. }));
    }

    #[test]
    fn empty_string_is_the_empty_graph() {
        let g = graph_string("").unwrap();
        assert_eq!(g.node_count(), 0);
        let g2 = graph_string(";").unwrap();
        assert_eq!(g2.node_count(), 0);
    }

    #[test]
    fn round_trip_through_compact_repr() {
        let g = graph_string("A[x]--B; B--C[e]; D").unwrap();
        let text = g.compact_repr();
        let g2 = graph_string(&text).unwrap();
        assert_eq!(g.node_count(), g2.node_count());
        assert_eq!(g.edge_count(), g2.edge_count());
    }

    #[test]
    fn rule_from_strings_correlates_by_name() {
        let rule = rule_from_strings("A[target]; A--B", "B").unwrap();
        assert_eq!(rule.deleted_nodes().len(), 1);
        assert_eq!(rule.deleted_edges().len(), 1);
    }

    #[test]
    fn load_grammar_parses_start_rules_and_extensions() {
        let json = r#"{
            "version": "0.1",
            "start": "A[target]",
            "extensions": {"anything": [1, 2, 3]},
            "A[target]; A--B": ["B[x]", "B[y]"]
        }"#;
        let grammar = load_grammar(json).unwrap();
        assert_eq!(grammar.start.node_count(), 1);
        assert_eq!(grammar.rules.len(), 1);
        assert!(matches!(grammar.rules[0], GrammarRule::Choice(ref alts) if alts.len() == 2));
        assert!(grammar.extensions.is_some());
    }

    #[test]
    fn load_grammar_rejects_unsupported_version() {
        let json = r#"{"version": "9.9", "start": "A"}"#;
        let err = load_grammar(json).unwrap_err();
        assert!(matches!(err, GrammarParseError::UnsupportedVersion(_)));
    }

    #[test]
    fn load_grammar_defaults_version_when_absent() {
        let json = r#"{"start": "A[x]", "A[x]": "A[y]"}"#;
        let grammar = load_grammar(json).unwrap();
        assert_eq!(grammar.rules.len(), 1);
    }
}
