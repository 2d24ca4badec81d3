//! Rule model (§3, §4.2): a production `L ⇒ R` plus the rename/join
//! map that says which `L`-nodes survive into `R` and under what
//! identity.
//!
//! `soffit.grammar.DeterministicRule`/`RandomRule` identify surviving
//! nodes by giving them the *same name* in both the `L` and `R`
//! networkx graphs; deleted nodes simply don't appear in `R`. Here
//! node identifiers are minted per-graph (see [`crate::graph::Graph`]),
//! so the correspondence has to be carried explicitly as a `rename`
//! map rather than falling out of shared names, but the semantics are
//! the same: an `L`-node present in `dom(rename)` survives (at the
//! `R`-node `rename` sends it to); everything else is deleted.

use crate::error::RuleError;
use crate::graph::{Graph, NodeId};
use std::collections::{HashMap, HashSet};

/// A single production `L ⇒ R`.
#[derive(Debug, Clone)]
pub struct Rule {
    left: Graph,
    right: Graph,
    /// Maps every surviving `L`-node to its `R`-identity. `L`-nodes
    /// absent from this map are deleted.
    rename: HashMap<NodeId, NodeId>,
    /// `R`-nodes named here with no `L`-counterpart are defined as
    /// aliases: when applied, they inherit the match image of
    /// whichever `L`-node maps (via `rename`) to the same `R`-node.
    /// This is how `^`-merges on the right side are represented: e.g.
    /// `B^C^D[star]` produces one `R`-node with three `L`-nodes
    /// renamed onto it, so `join` is usually empty in practice and
    /// exists mainly to reject the malformed case described in §9.
    join: HashSet<NodeId>,
}

impl Rule {
    /// Validate and construct a rule from its parsed pieces. Fails if
    /// directedness disagrees, if `rename` targets a non-existent
    /// `R`-node, or if a `join` entry names an `R`-node with no
    /// `L`-counterpart anywhere in `rename`'s image (§9: "the source
    /// has a latent path where a join entry names an R-node absent
    /// from L and the corresponding L-counterpart is also absent" —
    /// rejected here rather than silently aliased).
    pub fn new(
        left: Graph,
        right: Graph,
        rename: HashMap<NodeId, NodeId>,
        join: HashSet<NodeId>,
    ) -> Result<Self, RuleError> {
        if left.is_directed() != right.is_directed() {
            return Err(RuleError::DirectednessMismatch);
        }
        for (&l, &r) in &rename {
            if !right.has_node(r) {
                return Err(RuleError::DanglingRename {
                    left_node: l.0,
                    right_node: r.0,
                });
            }
        }
        let renamed_targets: HashSet<NodeId> = rename.values().copied().collect();
        for &r in &join {
            if !renamed_targets.contains(&r) {
                return Err(RuleError::UnresolvableJoin { node: r.0 });
            }
        }
        Ok(Rule {
            left,
            right,
            rename,
            join,
        })
    }

    pub fn left(&self) -> &Graph {
        &self.left
    }

    pub fn right(&self) -> &Graph {
        &self.right
    }

    pub fn rename(&self) -> &HashMap<NodeId, NodeId> {
        &self.rename
    }

    pub fn join(&self) -> &HashSet<NodeId> {
        &self.join
    }

    /// `L`-nodes with no entry in `rename`: these do not survive to
    /// `R` and must not remain incident to any edge after their
    /// incident deleted edges are removed (§4.5 step 1).
    pub fn deleted_nodes(&self) -> Vec<NodeId> {
        self.left
            .nodes()
            .filter(|n| !self.rename.contains_key(n))
            .collect()
    }

    /// The `R`-image of an `L`-edge under `rename`, or `None` if
    /// either endpoint is deleted.
    pub fn right_image(&self, a: NodeId, b: NodeId) -> Option<(NodeId, NodeId)> {
        Some((*self.rename.get(&a)?, *self.rename.get(&b)?))
    }

    /// `L`-edges whose `R`-image is not actually an edge of `R`
    /// (§4.2), i.e. edges that do not survive the rewrite even though
    /// both endpoints might.
    pub fn deleted_edges(&self) -> Vec<(NodeId, NodeId)> {
        self.left
            .edges()
            .filter(|&(a, b)| match self.right_image(a, b) {
                None => true,
                Some((ra, rb)) => !self.right.has_edge(ra, rb),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(i: usize) -> NodeId {
        NodeId(i)
    }

    #[test]
    fn deletions_are_derived_from_rename() {
        let mut left = Graph::new_undirected();
        let a = left.mint_node(Some("target".into()));
        let b = left.mint_node(None);
        left.add_edge(a, b, None);

        let mut right = Graph::new_undirected();
        let rb = right.mint_node(None);

        let mut rename = HashMap::new();
        rename.insert(b, rb);

        let rule = Rule::new(left, right, rename, HashSet::new()).unwrap();
        assert_eq!(rule.deleted_nodes(), vec![a]);
        assert_eq!(rule.deleted_edges(), vec![(a, b)]);
    }

    #[test]
    fn dangling_rename_is_rejected() {
        let left = {
            let mut g = Graph::new_undirected();
            g.mint_node(None);
            g
        };
        let right = Graph::new_undirected();
        let mut rename = HashMap::new();
        rename.insert(n(0), n(5));
        let err = Rule::new(left, right, rename, HashSet::new()).unwrap_err();
        assert_eq!(
            err,
            RuleError::DanglingRename {
                left_node: 0,
                right_node: 5
            }
        );
    }

    #[test]
    fn unresolvable_join_is_rejected() {
        let mut left = Graph::new_undirected();
        left.mint_node(None);
        let mut right = Graph::new_undirected();
        right.mint_node(None);
        right.mint_node(None);

        let mut join = HashSet::new();
        join.insert(n(1));

        let err = Rule::new(left, right, HashMap::new(), join).unwrap_err();
        assert_eq!(err, RuleError::UnresolvableJoin { node: 1 });
    }

    #[test]
    fn directedness_mismatch_is_rejected() {
        let left = Graph::new_undirected();
        let right = Graph::new_directed();
        let err = Rule::new(left, right, HashMap::new(), HashSet::new()).unwrap_err();
        assert_eq!(err, RuleError::DirectednessMismatch);
    }
}
