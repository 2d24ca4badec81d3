//! Translates a host graph and a rule's left/right sides into the CSP
//! encoding described in §4.4, and drives the solver to produce a
//! stream of [`Match`] objects.
//!
//! The class split mirrors `soffit.graph.MatchFinder`/`Match`, but the
//! dangling/identification encoding (the `ConditionalTuple`-based
//! construction below) goes beyond what that module's `rightSide`
//! implements — there it's a stub ("bail out early if we already
//! decided no match is present... pass"). That part is grounded
//! directly in this specification's §4.4 algorithm description instead
//! of in a specific original-source file.

pub mod surjective;

use crate::csp::{AllDifferent, ConditionalTuple, Domain, SearchControl, Solver, Tuple, VarId};
use crate::error::MatchError;
use crate::graph::{Graph, NodeId};
use crate::rule::Rule;
use std::cell::Cell;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::{Duration, Instant};

pub const DEFAULT_MAX_MATCHES: usize = 100_000;
pub const DEFAULT_MAX_MATCH_TIME: Duration = Duration::from_secs(60);

/// Why a call to [`MatchFinder::matches`] stopped producing more
/// results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    NoMore,
    MaxMatches,
    Timeout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FinderState {
    Init,
    LeftApplied,
    RightApplied,
    Infeasible,
    Enumerating,
    Done,
}

/// An injective, tag-preserving morphism from a rule's left-hand
/// pattern into a host graph. Value-equal and hashable on its node
/// map; once hashed (e.g. inserted into a `HashSet`) it is frozen and
/// [`Match::add_map`] (private — only the finder builds matches)
/// becomes an error to call again, matching `soffit.graph.Match`'s
/// "modified after it was hashed" guard.
#[derive(Debug, Clone)]
pub struct Match {
    node_map: BTreeMap<NodeId, NodeId>,
    frozen: Cell<bool>,
}

impl Match {
    fn new() -> Self {
        Match {
            node_map: BTreeMap::new(),
            frozen: Cell::new(false),
        }
    }

    fn add_map(&mut self, left: NodeId, graph_node: NodeId) -> Result<(), MatchError> {
        if self.frozen.get() {
            return Err(MatchError::FrozenMatchModified);
        }
        self.node_map.insert(left, graph_node);
        Ok(())
    }

    pub fn node(&self, left: NodeId) -> Option<NodeId> {
        self.node_map.get(&left).copied()
    }

    pub fn edge(&self, e: (NodeId, NodeId)) -> Option<(NodeId, NodeId)> {
        Some((self.node(e.0)?, self.node(e.1)?))
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, NodeId)> + '_ {
        self.node_map.iter().map(|(&a, &b)| (a, b))
    }
}

impl PartialEq for Match {
    fn eq(&self, other: &Self) -> bool {
        self.node_map == other.node_map
    }
}
impl Eq for Match {}

impl std::hash::Hash for Match {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.frozen.set(true);
        self.node_map.hash(state);
    }
}

impl std::fmt::Display for Match {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self
            .node_map
            .iter()
            .map(|(l, g)| format!("{l}=>{g}"))
            .collect();
        write!(f, "{{ {} }}", parts.join(", "))
    }
}

/// Finds matches of a rule's left-hand side in a host graph (§4.4).
/// Drive it through the state machine: [`MatchFinder::left_side`],
/// then [`MatchFinder::right_side`], then [`MatchFinder::matches`] (or
/// [`MatchFinder::match_exists`]) exactly once.
pub struct MatchFinder {
    host: Graph,
    orig: Vec<NodeId>,
    state: FinderState,
    left_nodes: Vec<NodeId>,
    var_of: HashMap<NodeId, VarId>,
    solver: Option<Solver>,
    max_matches: usize,
    max_match_time: Duration,
    end_reason: Option<EndReason>,
}

impl MatchFinder {
    /// Compacts `host` internally (§4.1); matches reported later are
    /// translated back to `host`'s original node identifiers via the
    /// resulting back-map.
    pub fn new(host: &Graph) -> Self {
        let (compacted, orig) = host.compact();
        MatchFinder {
            host: compacted,
            orig,
            state: FinderState::Init,
            left_nodes: Vec::new(),
            var_of: HashMap::new(),
            solver: None,
            max_matches: DEFAULT_MAX_MATCHES,
            max_match_time: DEFAULT_MAX_MATCH_TIME,
            end_reason: None,
        }
    }

    pub fn set_max_matches(&mut self, n: usize) {
        self.max_matches = n;
    }

    pub fn set_max_match_time(&mut self, d: Duration) {
        self.max_match_time = d;
    }

    pub fn end_reason(&self) -> Option<EndReason> {
        self.end_reason
    }

    /// §4.4 steps 1-5: variables, node-tag restriction, injectivity,
    /// edge-tag restriction.
    pub fn left_side(&mut self, left: &Graph) -> Result<(), MatchError> {
        if self.state != FinderState::Init {
            return Err(MatchError::InvalidState("leftSide must be called first"));
        }
        if self.host.is_directed() != left.is_directed() {
            return Err(MatchError::DirectednessMismatch);
        }

        let left_nodes: Vec<NodeId> = left.nodes().collect();
        let var_of: HashMap<NodeId, VarId> =
            left_nodes.iter().enumerate().map(|(i, &n)| (n, i)).collect();

        let mut host = self.host.clone();
        let mut infeasible = false;
        let mut domains = Vec::with_capacity(left_nodes.len());
        for &ln in &left_nodes {
            let tag = left.node_tag(ln).map(str::to_owned);
            let candidates: Vec<usize> = host
                .nodes_with_tag(tag.as_deref())
                .iter()
                .map(|n| n.0)
                .collect();
            if candidates.is_empty() {
                infeasible = true;
            }
            domains.push(Domain::new(candidates));
        }

        let mut solver = Solver::new(domains);
        if infeasible {
            solver.mark_infeasible();
        } else {
            solver.add_constraint(Box::new(AllDifferent::new((0..left_nodes.len()).collect())));

            for (a, b) in left.edges() {
                let tag = left.edge_tag(a, b).map(str::to_owned);
                let mut pairs: Vec<(usize, usize)> = host
                    .edges_with_tag(tag.as_deref())
                    .iter()
                    .map(|&(u, w)| (u.0, w.0))
                    .collect();
                if !left.is_directed() {
                    let reversed: Vec<(usize, usize)> =
                        pairs.iter().map(|&(u, w)| (w, u)).collect();
                    pairs.extend(reversed);
                }
                if pairs.is_empty() {
                    solver.mark_infeasible();
                    break;
                }
                let va = var_of[&a];
                let vb = var_of[&b];
                solver.add_constraint(Box::new(Tuple::binary(va, vb, pairs)));
            }
        }

        self.host = host;
        self.left_nodes = left_nodes;
        self.var_of = var_of;
        self.solver = Some(solver);
        self.state = FinderState::LeftApplied;
        Ok(())
    }

    /// §4.4's dangling/identification encoding, built from `rule`'s
    /// derived `deletedNodes`/`deletedEdges`. `rule.left()` must be the
    /// same graph most recently passed to [`MatchFinder::left_side`].
    pub fn right_side(&mut self, rule: &Rule) -> Result<(), MatchError> {
        if self.state != FinderState::LeftApplied {
            return Err(MatchError::InvalidState("rightSide must follow leftSide"));
        }
        if self.host.is_directed() != rule.right().is_directed() {
            return Err(MatchError::DirectednessMismatch);
        }

        let mut solver = self.solver.take().expect("left_side populates solver");
        let directed = self.host.is_directed();
        let deleted_edges: HashSet<(NodeId, NodeId)> = rule.deleted_edges().into_iter().collect();
        let mut infeasible = false;

        for n in rule.deleted_nodes() {
            let Some(&v_n) = self.var_of.get(&n) else {
                continue;
            };
            let self_loop_deleted = deleted_edges.contains(&(n, n));

            if directed {
                let out_endpoints: Vec<NodeId> = deleted_edges
                    .iter()
                    .filter(|&&(a, b)| a == n && b != n)
                    .map(|&(_, b)| b)
                    .collect();
                let in_endpoints: Vec<NodeId> = deleted_edges
                    .iter()
                    .filter(|&&(a, b)| b == n && a != n)
                    .map(|&(a, _)| a)
                    .collect();
                if !self.add_dangling_constraint(
                    &mut solver,
                    v_n,
                    &out_endpoints,
                    self_loop_deleted,
                    Some(true),
                ) {
                    infeasible = true;
                }
                if !self.add_dangling_constraint(
                    &mut solver,
                    v_n,
                    &in_endpoints,
                    self_loop_deleted,
                    Some(false),
                ) {
                    infeasible = true;
                }
            } else {
                let endpoints: Vec<NodeId> = deleted_edges
                    .iter()
                    .filter_map(|&(a, b)| {
                        if a == n && b != n {
                            Some(b)
                        } else if b == n && a != n {
                            Some(a)
                        } else {
                            None
                        }
                    })
                    .collect();
                if !self.add_dangling_constraint(&mut solver, v_n, &endpoints, self_loop_deleted, None)
                {
                    infeasible = true;
                }
            }
        }

        if infeasible {
            solver.mark_infeasible();
        }
        let ok = solver.preprocess();
        self.solver = Some(solver);
        self.state = if ok {
            FinderState::RightApplied
        } else {
            FinderState::Infeasible
        };
        Ok(())
    }

    /// For a deleted left-node `n` (variable `v_n`) with the given
    /// incident-deleted-edge endpoints (one direction at a time for
    /// directed graphs, `directed_out = None` for undirected), narrow
    /// `v_n`'s domain to candidates that pass the self-loop-parity and
    /// neighbor-count checks, and — unless there are no endpoints to
    /// relate — add the `ConditionalTuple` that ties `v_n`'s value to a
    /// surjective covering of the candidate's neighborhood. Returns
    /// `false` if this emptied `v_n`'s domain (the rule can never
    /// match this host).
    fn add_dangling_constraint(
        &self,
        solver: &mut Solver,
        v_n: VarId,
        endpoints: &[NodeId],
        self_loop_deleted: bool,
        directed_out: Option<bool>,
    ) -> bool {
        let endpoint_vars: Vec<VarId> = endpoints.iter().map(|e| self.var_of[e]).collect();
        let candidates = solver.domain_values(v_n);
        let mut tuples: Vec<Vec<usize>> = Vec::new();
        let mut keep: HashSet<usize> = HashSet::new();

        for i in candidates {
            let node_i = NodeId(i);
            if self.host.has_self_loop(node_i) != self_loop_deleted {
                continue;
            }
            let neighbors: Vec<usize> = match directed_out {
                None => self.host.neighbors(node_i).map(|n| n.0).collect(),
                Some(true) => self
                    .host
                    .out_neighbors(node_i)
                    .filter(|&x| x != node_i)
                    .map(|n| n.0)
                    .collect(),
                Some(false) => self
                    .host
                    .in_neighbors(node_i)
                    .filter(|&x| x != node_i)
                    .map(|n| n.0)
                    .collect(),
            };
            if neighbors.len() > endpoints.len() {
                continue;
            }
            keep.insert(i);
            if !endpoints.is_empty() {
                for t in surjective::surjective_mappings(endpoints.len(), &neighbors) {
                    let mut row = Vec::with_capacity(1 + t.len());
                    row.push(i);
                    row.extend(t);
                    tuples.push(row);
                }
            }
        }

        solver.filter_domain(v_n, |x| keep.contains(&x));
        if keep.is_empty() {
            return false;
        }
        if !endpoints.is_empty() {
            let mut scope = vec![v_n];
            scope.extend(endpoint_vars);
            solver.add_constraint(Box::new(ConditionalTuple::new(scope, tuples)));
        }
        true
    }

    /// Drive the solver to completion (subject to `maxMatches`/
    /// `maxMatchTime`), returning every match found translated back to
    /// the original host-graph node identifiers.
    pub fn matches(&mut self) -> Vec<Match> {
        match self.state {
            FinderState::Infeasible => {
                self.end_reason = Some(EndReason::NoMore);
                self.state = FinderState::Done;
                return Vec::new();
            }
            FinderState::RightApplied => {}
            _ => return Vec::new(),
        }
        self.state = FinderState::Enumerating;

        let solver = self.solver.as_mut().expect("right_side populates solver");
        let start = Instant::now();
        let max_matches = self.max_matches;
        let max_time = self.max_match_time;
        let left_nodes = &self.left_nodes;
        let orig = &self.orig;

        let mut results: Vec<Match> = Vec::new();
        let mut hit_cap = false;
        let mut timed_out = false;

        solver.search(|assignment| {
            let mut m = Match::new();
            for (i, &ln) in left_nodes.iter().enumerate() {
                let g_compact = assignment.get(i).expect("complete assignment");
                m.add_map(ln, orig[g_compact]).expect("fresh match is never frozen");
            }
            results.push(m);
            if results.len() >= max_matches {
                hit_cap = true;
                return SearchControl::Stop;
            }
            if start.elapsed() >= max_time {
                timed_out = true;
                return SearchControl::Stop;
            }
            SearchControl::Continue
        });

        self.end_reason = Some(if hit_cap {
            EndReason::MaxMatches
        } else if timed_out {
            EndReason::Timeout
        } else {
            EndReason::NoMore
        });
        self.state = FinderState::Done;
        results
    }

    /// Short-circuits after the first solution, without materializing
    /// the rest.
    pub fn match_exists(&mut self) -> bool {
        match self.state {
            FinderState::Infeasible => {
                self.end_reason = Some(EndReason::NoMore);
                self.state = FinderState::Done;
                return false;
            }
            FinderState::RightApplied => {}
            _ => return false,
        }
        self.state = FinderState::Enumerating;

        let solver = self.solver.as_mut().expect("right_side populates solver");
        let mut found = false;
        solver.search(|_| {
            found = true;
            SearchControl::Stop
        });
        self.end_reason = Some(if found {
            EndReason::MaxMatches
        } else {
            EndReason::NoMore
        });
        self.state = FinderState::Done;
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as Map;

    fn tagged_path() -> Graph {
        // A--B[x]; B--C[x]
        let mut g = Graph::new_undirected();
        let a = g.mint_node(None);
        let b = g.mint_node(None);
        let c = g.mint_node(None);
        g.add_edge(a, b, Some("x".into()));
        g.add_edge(b, c, Some("x".into()));
        g
    }

    fn tagged_edge_pattern() -> Graph {
        let mut g = Graph::new_undirected();
        let x = g.mint_node(None);
        let y = g.mint_node(None);
        g.add_edge(x, y, Some("x".into()));
        g
    }

    fn identity_rule(g: &Graph) -> Rule {
        let rename: Map<NodeId, NodeId> = g.nodes().map(|n| (n, n)).collect();
        Rule::new(g.clone(), g.clone(), rename, HashSet::new()).unwrap()
    }

    #[test]
    fn s1_four_matches_on_tagged_path() {
        let g = tagged_path();
        let l = tagged_edge_pattern();
        let rule = identity_rule(&l);

        let mut finder = MatchFinder::new(&g);
        finder.left_side(&l).unwrap();
        finder.right_side(&rule).unwrap();
        let matches = finder.matches();
        assert_eq!(matches.len(), 4);
        assert_eq!(finder.end_reason(), Some(EndReason::NoMore));
    }

    #[test]
    fn s2_two_matches_on_tagged_singleton() {
        let mut g = Graph::new_undirected();
        g.mint_node(Some("x".into()));
        g.mint_node(Some("x".into()));

        let mut l = Graph::new_undirected();
        l.mint_node(Some("x".into()));
        let rule = identity_rule(&l);

        let mut finder = MatchFinder::new(&g);
        finder.left_side(&l).unwrap();
        finder.right_side(&rule).unwrap();
        assert_eq!(finder.matches().len(), 2);
    }

    #[test]
    fn s4_dangling_condition_rejects_match() {
        // G: X[target]; X--Y; X--Z.  Rule: A[target]; A--B => B (A deleted,
        // B survives) would leave one of X's two edges dangling.
        let mut g = Graph::new_undirected();
        let x = g.mint_node(Some("target".into()));
        let y = g.mint_node(None);
        let z = g.mint_node(None);
        g.add_edge(x, y, None);
        g.add_edge(x, z, None);

        let mut left = Graph::new_undirected();
        let la = left.mint_node(Some("target".into()));
        let lb = left.mint_node(None);
        left.add_edge(la, lb, None);

        let mut right = Graph::new_undirected();
        let rb = right.mint_node(None);
        let mut rename = Map::new();
        rename.insert(lb, rb);
        let rule = Rule::new(left.clone(), right, rename, HashSet::new()).unwrap();

        let mut finder = MatchFinder::new(&g);
        finder.left_side(&left).unwrap();
        finder.right_side(&rule).unwrap();
        assert_eq!(finder.matches().len(), 0);
    }

    #[test]
    fn s3_six_matches_across_three_sources_and_two_intermediates() {
        // Three src-tagged nodes, two intermediates each adjacent to
        // every src and to one dst-tagged node; L = X[src]; Y; Z[dst];
        // X--Y (Z unconstrained beyond its tag, so it always maps to
        // DST but contributes no edge constraint).
        let mut g = Graph::new_undirected();
        let s1 = g.mint_node(Some("src".into()));
        let s2 = g.mint_node(Some("src".into()));
        let s3 = g.mint_node(Some("src".into()));
        let a = g.mint_node(None);
        let b = g.mint_node(None);
        let dst = g.mint_node(Some("dst".into()));
        for src in [s1, s2, s3] {
            g.add_edge(src, a, None);
            g.add_edge(src, b, None);
        }
        g.add_edge(a, dst, None);
        g.add_edge(b, dst, None);

        let mut left = Graph::new_undirected();
        let x = left.mint_node(Some("src".into()));
        let y = left.mint_node(None);
        let z = left.mint_node(Some("dst".into()));
        left.add_edge(x, y, None);
        let rule = identity_rule(&left);

        let mut finder = MatchFinder::new(&g);
        finder.left_side(&left).unwrap();
        finder.right_side(&rule).unwrap();
        let matches = finder.matches();
        assert_eq!(matches.len(), 6);
        for m in &matches {
            assert_eq!(m.node(z), Some(dst));
        }
    }

    #[test]
    fn identity_rule_always_matches_self() {
        let g = tagged_path();
        let rule = identity_rule(&g);
        let mut finder = MatchFinder::new(&g);
        finder.left_side(&g).unwrap();
        finder.right_side(&rule).unwrap();
        assert!(!finder.matches().is_empty());
    }

    #[test]
    fn max_matches_cap_is_honored_exactly() {
        // Four matches are available (s1_four_matches_on_tagged_path);
        // capping at 2 must return exactly 2 and report MaxMatches.
        let g = tagged_path();
        let l = tagged_edge_pattern();
        let rule = identity_rule(&l);

        let mut finder = MatchFinder::new(&g);
        finder.set_max_matches(2);
        finder.left_side(&l).unwrap();
        finder.right_side(&rule).unwrap();
        let matches = finder.matches();
        assert_eq!(matches.len(), 2);
        assert_eq!(finder.end_reason(), Some(EndReason::MaxMatches));
    }

    #[test]
    fn directedness_mismatch_is_an_error() {
        let g = Graph::new_undirected();
        let l = Graph::new_directed();
        let mut finder = MatchFinder::new(&g);
        assert_eq!(finder.left_side(&l), Err(MatchError::DirectednessMismatch));
    }

    #[test]
    fn matches_are_injective_and_tag_preserving() {
        let g = tagged_path();
        let l = tagged_edge_pattern();
        let rule = identity_rule(&l);
        let mut finder = MatchFinder::new(&g);
        finder.left_side(&l).unwrap();
        finder.right_side(&rule).unwrap();
        for m in finder.matches() {
            let mapped: Vec<NodeId> = l.nodes().map(|n| m.node(n).unwrap()).collect();
            let unique: HashSet<NodeId> = mapped.iter().copied().collect();
            assert_eq!(unique.len(), mapped.len());
            for n in l.nodes() {
                assert_eq!(l.node_tag(n), g.node_tag(m.node(n).unwrap()));
            }
        }
    }
}
