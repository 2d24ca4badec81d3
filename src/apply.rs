//! Rule application (§4.5): given a match, build `H` from host graph
//! `G` by deleting, merging, relabeling, and adding, in the fixed
//! order that keeps the no-dangling-edge and no-duplicate-edge
//! invariants intact at every step.
//!
//! Grounded in the delete-then-contract-then-add sequence implied by
//! `soffit.graph.RuleApplication.result` (built on `nx.contracted_nodes`
//! for the merge step); here the merge step is an explicit contraction
//! over our own adjacency tables rather than delegating to a graph
//! library, since `Graph` has no such primitive of its own.

use crate::graph::{Graph, NodeId};
use crate::matchfinder::Match;
use crate::rule::Rule;
use std::collections::{HashMap, HashSet};

/// Build the rewritten graph `H` from host `G`, rule `L ⇒ R`, and a
/// match `m: V_L → V_G`. `G` itself is never mutated; `m` need not
/// cover every `R`-node — nodes with no `L`-preimage are minted fresh.
pub fn apply(host: &Graph, rule: &Rule, m: &Match) -> Graph {
    let mut h = host.clone();
    let directed = h.is_directed();

    #[cfg(debug_assertions)]
    verify(&h, rule, m);

    // 2. Delete edges.
    let mut removed: HashSet<(NodeId, NodeId)> = HashSet::new();
    for (a, b) in rule.deleted_edges() {
        if let Some((ga, gb)) = m.edge((a, b)) {
            let key = if directed || ga <= gb { (ga, gb) } else { (gb, ga) };
            if removed.insert(key) {
                h.remove_edge(ga, gb);
            }
        }
    }

    // 3. Delete nodes. Their incidence was cleared in step 2.
    for n in rule.deleted_nodes() {
        if let Some(gn) = m.node(n) {
            h.remove_node(gn);
        }
    }

    // 4. Merge (join). `^`-merges on the right-hand side surface here
    // as multiple surviving L-nodes renamed to the same R-node; group
    // by R-target and contract every image but the first onto it.
    let mut groups: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
    for (&l, &r) in rule.rename() {
        groups.entry(r).or_default().push(l);
    }

    let mut image: HashMap<NodeId, NodeId> = HashMap::new();
    for (&r_node, ls) in &groups {
        let mut ls = ls.clone();
        ls.sort();
        let keep = m.node(ls[0]).expect("surviving L-node must be matched");
        for &other_l in &ls[1..] {
            let other_g = m.node(other_l).expect("surviving L-node must be matched");
            if other_g != keep {
                contract(&mut h, keep, other_g);
            }
        }
        image.insert(r_node, keep);
    }

    // 5. Add & retag nodes. Tag conflicts from a merge are resolved
    // here: this runs after contraction, so R's own tag always wins.
    for x in rule.right().nodes() {
        let tag = rule.right().node_tag(x).map(str::to_owned);
        if let Some(&g) = image.get(&x) {
            h.set_node_tag(g, tag);
        } else {
            let fresh = h.mint_node(tag);
            image.insert(x, fresh);
        }
    }

    // 6. Add & retag edges. An R-edge survives from L (and is only
    // retagged) iff some L-edge's R-image is exactly this edge.
    let canon = |x: NodeId, y: NodeId| if directed || x <= y { (x, y) } else { (y, x) };
    let surviving: HashSet<(NodeId, NodeId)> = rule
        .left()
        .edges()
        .filter_map(|(a, b)| rule.right_image(a, b))
        .map(|(ra, rb)| canon(ra, rb))
        .filter(|&(ra, rb)| rule.right().has_edge(ra, rb))
        .collect();

    for (a, b) in rule.right().edges() {
        let tag = rule.right().edge_tag(a, b).map(str::to_owned);
        let (ga, gb) = (image[&a], image[&b]);
        if surviving.contains(&canon(a, b)) {
            h.set_edge_tag(ga, gb, tag);
        } else if !h.has_edge(ga, gb) {
            h.add_edge(ga, gb, tag);
        }
    }

    h
}

/// Contract `other` into `keep`: every edge incident to `other`
/// becomes an edge incident to `keep` instead (a self-loop if `other`
/// was adjacent to `keep` itself, or already adjacent to a node `keep`
/// was also adjacent to). Where both sides would supply a tag for the
/// same resulting edge, whichever is processed first wins — see §9's
/// "first processed edge wins" decision.
fn contract(h: &mut Graph, keep: NodeId, other: NodeId) {
    if h.is_directed() {
        let out_edges: Vec<(NodeId, Option<String>)> = h
            .out_neighbors(other)
            .map(|b| (b, h.edge_tag(other, b).map(str::to_owned)))
            .collect();
        let in_edges: Vec<(NodeId, Option<String>)> = h
            .in_neighbors(other)
            .map(|a| (a, h.edge_tag(a, other).map(str::to_owned)))
            .collect();
        for &(b, _) in &out_edges {
            h.remove_edge(other, b);
        }
        for &(a, _) in &in_edges {
            h.remove_edge(a, other);
        }
        for (b, tag) in out_edges {
            let dst = if b == other { keep } else { b };
            if !h.has_edge(keep, dst) {
                h.add_edge(keep, dst, tag);
            }
        }
        for (a, tag) in in_edges {
            let src = if a == other { keep } else { a };
            if !h.has_edge(src, keep) {
                h.add_edge(src, keep, tag);
            }
        }
    } else {
        let edges: Vec<(NodeId, Option<String>)> = h
            .neighbors(other)
            .map(|b| (b, h.edge_tag(other, b).map(str::to_owned)))
            .collect();
        let self_loop_tag = h
            .has_self_loop(other)
            .then(|| h.edge_tag(other, other).map(str::to_owned));
        for &(b, _) in &edges {
            h.remove_edge(other, b);
        }
        if h.has_self_loop(other) {
            h.remove_edge(other, other);
        }
        for (b, tag) in edges {
            if !h.has_edge(keep, b) {
                h.add_edge(keep, b, tag);
            }
        }
        if let Some(tag) = self_loop_tag {
            if !h.has_self_loop(keep) {
                h.add_edge(keep, keep, tag);
            }
        }
    }
    h.remove_node(other);
}

#[cfg(debug_assertions)]
fn verify(h: &Graph, rule: &Rule, m: &Match) {
    let deleted_edges = rule.deleted_edges();
    let mut deleted_edge_images: HashSet<(NodeId, NodeId)> = HashSet::new();
    for (a, b) in &deleted_edges {
        let (ga, gb) = m
            .edge((*a, *b))
            .unwrap_or_else(|| panic!("deleted edge ({a:?},{b:?}) is not fully matched"));
        assert!(
            h.has_edge(ga, gb),
            "deleted edge ({a:?},{b:?}) has no image in host graph"
        );
        deleted_edge_images.insert((ga, gb));
        if !h.is_directed() {
            deleted_edge_images.insert((gb, ga));
        }
    }
    for n in rule.deleted_nodes() {
        let gn = m
            .node(n)
            .unwrap_or_else(|| panic!("deleted node {n:?} is not matched"));
        assert!(h.has_node(gn), "deleted node {n:?} has no image in host graph");
        for neighbor in h.neighbors(gn) {
            assert!(
                deleted_edge_images.contains(&(gn, neighbor)),
                "deleted node {n:?} (image {gn:?}) would be left with a dangling edge to {neighbor:?}"
            );
        }
        if h.has_self_loop(gn) {
            assert!(deleted_edge_images.contains(&(gn, gn)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as Map;

    fn rule_of(left: Graph, right: Graph, rename: Map<NodeId, NodeId>) -> Rule {
        Rule::new(left, right, rename, HashSet::new()).unwrap()
    }

    fn find_one_match(host: &Graph, rule: &Rule) -> Match {
        let mut finder = crate::matchfinder::MatchFinder::new(host);
        finder.left_side(rule.left()).unwrap();
        finder.right_side(rule).unwrap();
        let mut matches = finder.matches();
        assert!(!matches.is_empty(), "expected at least one match");
        matches.remove(0)
    }

    #[test]
    fn identity_rule_round_trips_host() {
        let mut g = Graph::new_undirected();
        let a = g.mint_node(Some("x".into()));
        let b = g.mint_node(None);
        g.add_edge(a, b, Some("e".into()));

        let rename: Map<NodeId, NodeId> = g.nodes().map(|n| (n, n)).collect();
        let rule = rule_of(g.clone(), g.clone(), rename);
        let m = find_one_match(&g, &rule);

        let h = apply(&g, &rule, &m);
        assert_eq!(h.node_count(), g.node_count());
        assert_eq!(h.edge_count(), g.edge_count());
        for n in g.nodes() {
            assert_eq!(h.node_tag(n), g.node_tag(n));
        }
        assert_eq!(h.edge_tag(a, b), g.edge_tag(a, b));
    }

    #[test]
    fn deleting_a_node_removes_its_edges() {
        // L = A[target]--B, R = B (A deleted, B survives untagged).
        let mut left = Graph::new_undirected();
        let la = left.mint_node(Some("target".into()));
        let lb = left.mint_node(None);
        left.add_edge(la, lb, None);

        let mut right = Graph::new_undirected();
        let rb = right.mint_node(None);
        let mut rename = Map::new();
        rename.insert(lb, rb);
        let rule = rule_of(left, right, rename);

        // G: X[target]--Y, isolated otherwise, so A's image has no
        // edge beyond the one the rule already accounts for.
        let mut g = Graph::new_undirected();
        let x = g.mint_node(Some("target".into()));
        let y = g.mint_node(None);
        g.add_edge(x, y, None);

        let m = find_one_match(&g, &rule);
        let h = apply(&g, &rule, &m);
        assert_eq!(h.node_count(), 1);
        assert_eq!(h.edge_count(), 0);
        assert!(!h.has_node(x));
        assert!(h.has_node(y));
    }

    #[test]
    fn s6_merge_and_delete_collapses_to_one_tagged_node() {
        // L = A[target]; A--B; A--C; A--D.  R = B^C^D[star].
        let mut left = Graph::new_undirected();
        let a = left.mint_node(Some("target".into()));
        let b = left.mint_node(None);
        let c = left.mint_node(None);
        let d = left.mint_node(None);
        left.add_edge(a, b, None);
        left.add_edge(a, c, None);
        left.add_edge(a, d, None);

        let mut right = Graph::new_undirected();
        let star = right.mint_node(Some("star".into()));
        let mut rename = Map::new();
        rename.insert(b, star);
        rename.insert(c, star);
        rename.insert(d, star);
        let rule = rule_of(left, right, rename);

        // G: X[target] adjacent to three other nodes, nothing else.
        let mut g = Graph::new_undirected();
        let x = g.mint_node(Some("target".into()));
        let p = g.mint_node(None);
        let q = g.mint_node(None);
        let r = g.mint_node(None);
        g.add_edge(p, x, None);
        g.add_edge(x, q, None);
        g.add_edge(x, r, None);

        let m = find_one_match(&g, &rule);
        let h = apply(&g, &rule, &m);
        assert_eq!(h.node_count(), 1);
        assert_eq!(h.edge_count(), 0);
        let only = h.nodes().next().unwrap();
        assert_eq!(h.node_tag(only), Some("star"));
    }

    #[test]
    fn surviving_node_outside_the_match_keeps_its_external_edges() {
        // L = A[left]; B[right]; A--B.  R = A[left]; A--B--C.
        // A and B survive; C is a fresh node added by the rule.
        let mut left = Graph::new_undirected();
        let la = left.mint_node(Some("left".into()));
        let lb = left.mint_node(Some("right".into()));
        left.add_edge(la, lb, None);

        let mut right = Graph::new_undirected();
        let ra = right.mint_node(Some("left".into()));
        let rb = right.mint_node(None);
        let rc = right.mint_node(None);
        right.add_edge(ra, rb, None);
        right.add_edge(rb, rc, None);
        let mut rename = Map::new();
        rename.insert(la, ra);
        rename.insert(lb, rb);
        let rule = rule_of(left, right, rename);

        // G: X[left]--Y[right], X also adjacent to Z[head] (outside
        // the match entirely, since Z carries neither tag the rule
        // requires).
        let mut g = Graph::new_undirected();
        let x = g.mint_node(Some("left".into()));
        let y = g.mint_node(Some("right".into()));
        let z = g.mint_node(Some("head".into()));
        g.add_edge(x, y, None);
        g.add_edge(z, x, None);

        let m = find_one_match(&g, &rule);
        let h = apply(&g, &rule, &m);

        // X survives (not deleted by this rule), so its edge to Z,
        // which lies entirely outside L, is never touched.
        assert!(h.has_edge(z, x));
        assert!(h.has_edge(x, y));
        assert_eq!(h.node_count(), 4);
        assert_eq!(h.edge_count(), 3);
    }
}
