//! The `Constraint` trait and the concrete propagators the match
//! finder builds on (§4.3): `Tuple`, `AllDifferent`, `ConditionalTuple`,
//! `NonoverlappingSets`, `NonoverlappingUnorderedPairs`. Each mirrors a
//! class of the same shape in `soffit.constraint`, adapted from the
//! `python-constraint` library's callback protocol (`__call__` with a
//! `forwardcheck` flag, plus an optional `preProcess` hook) to a Rust
//! trait object.

use super::domain::Domain;
use std::collections::{HashMap, HashSet};

/// Identifies one CSP variable by its position in the solver's
/// variable vector.
pub type VarId = usize;

/// A partial assignment: `values[v]` is `Some(x)` once variable `v`
/// has been assigned, `None` while still open.
#[derive(Debug, Clone)]
pub struct Assignment {
    values: Vec<Option<usize>>,
}

impl Assignment {
    pub fn new(n_vars: usize) -> Self {
        Assignment {
            values: vec![None; n_vars],
        }
    }

    pub fn get(&self, v: VarId) -> Option<usize> {
        self.values[v]
    }

    pub fn set(&mut self, v: VarId, value: usize) {
        self.values[v] = Some(value);
    }

    pub fn unset(&mut self, v: VarId) {
        self.values[v] = None;
    }
}

/// The live domains for every variable, indexed by [`VarId`].
pub type Domains = Vec<Domain>;

/// Outcome of a constraint's one-shot `pre_process` pass: whether the
/// solver should keep re-checking it during search, or whether it has
/// fully discharged itself into domain restrictions and can be dropped
/// (mirroring `constraints.remove(...)` in the Python original).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreProcessOutcome {
    Keep,
    Discharge,
}

/// A propagator over a fixed scope of variables.
///
/// `check` is the authoritative test: given a (possibly partial)
/// assignment, is it still consistent? `forward_check` additionally
/// prunes `domains` of values that can no longer participate in a
/// solution, given the current assignment; it returns `false` if it
/// prunes some variable's domain to empty. `pre_process` runs once,
/// before search starts, and may narrow domains or mark the constraint
/// for removal when it can be fully resolved ahead of time (e.g. a
/// `Tuple` constraint with exactly one allowed tuple pins every
/// variable in its scope).
pub trait Constraint: std::fmt::Debug {
    fn scope(&self) -> &[VarId];

    fn check(&self, assignment: &Assignment) -> bool;

    fn forward_check(
        &self,
        _domains: &mut Domains,
        _assignment: &Assignment,
        _depth: usize,
    ) -> bool {
        true
    }

    fn pre_process(&mut self, _domains: &mut Domains) -> PreProcessOutcome {
        PreProcessOutcome::Keep
    }
}

fn current_tuple(scope: &[VarId], assignment: &Assignment) -> Vec<Option<usize>> {
    scope.iter().map(|&v| assignment.get(v)).collect()
}

/// Whitelist of allowed value-tuples over `scope`, in order.
///
/// For the binary case (`scope.len() == 2`) a pair of forward/backward
/// adjacency maps is maintained so forward-checking a singleton side
/// can prune the other side in O(matching entries) rather than
/// rescanning the whole tuple set.
#[derive(Debug, Clone)]
pub struct Tuple {
    scope: Vec<VarId>,
    allowed: HashSet<Vec<usize>>,
    forward: HashMap<usize, HashSet<usize>>,
    backward: HashMap<usize, HashSet<usize>>,
    nth_set: Vec<HashSet<usize>>,
}

impl Tuple {
    pub fn new(scope: Vec<VarId>, tuples: impl IntoIterator<Item = Vec<usize>>) -> Self {
        let allowed: HashSet<Vec<usize>> = tuples.into_iter().collect();
        let mut forward: HashMap<usize, HashSet<usize>> = HashMap::new();
        let mut backward: HashMap<usize, HashSet<usize>> = HashMap::new();
        let mut nth_set = vec![HashSet::new(); scope.len()];
        for t in &allowed {
            for (i, &x) in t.iter().enumerate() {
                nth_set[i].insert(x);
            }
            if t.len() == 2 {
                forward.entry(t[0]).or_default().insert(t[1]);
                backward.entry(t[1]).or_default().insert(t[0]);
            }
        }
        Tuple {
            scope,
            allowed,
            forward,
            backward,
            nth_set,
        }
    }

    /// Convenience constructor for the common unary case (§4.4 step 3:
    /// restrict one variable to a node-tag-compatible set).
    pub fn unary(v: VarId, values: impl IntoIterator<Item = usize>) -> Self {
        Tuple::new(vec![v], values.into_iter().map(|x| vec![x]))
    }

    /// Convenience constructor for the binary case (§4.4 step 5: edge
    /// endpoints restricted to a tag-compatible edge set).
    pub fn binary(a: VarId, b: VarId, pairs: impl IntoIterator<Item = (usize, usize)>) -> Self {
        Tuple::new(vec![a, b], pairs.into_iter().map(|(x, y)| vec![x, y]))
    }
}

impl Constraint for Tuple {
    fn scope(&self) -> &[VarId] {
        &self.scope
    }

    fn check(&self, assignment: &Assignment) -> bool {
        let current = current_tuple(&self.scope, assignment);
        if current.iter().all(Option::is_some) {
            let full: Vec<usize> = current.into_iter().map(Option::unwrap).collect();
            return self.allowed.contains(&full);
        }
        if self.scope.len() != 2 {
            return true;
        }
        if let Some(a) = current[0] {
            if !self.forward.contains_key(&a) {
                return false;
            }
        }
        if let Some(b) = current[1] {
            if !self.backward.contains_key(&b) {
                return false;
            }
        }
        true
    }

    fn forward_check(&self, domains: &mut Domains, assignment: &Assignment, depth: usize) -> bool {
        if self.scope.len() != 2 {
            return true;
        }
        let a = assignment.get(self.scope[0]);
        let b = assignment.get(self.scope[1]);
        if let (Some(av), None) = (a, b) {
            let Some(allowed) = self.forward.get(&av) else {
                return false;
            };
            return prune_to(domains, self.scope[1], allowed, depth);
        }
        if let (None, Some(bv)) = (a, b) {
            let Some(allowed) = self.backward.get(&bv) else {
                return false;
            };
            return prune_to(domains, self.scope[0], allowed, depth);
        }
        true
    }

    fn pre_process(&mut self, domains: &mut Domains) -> PreProcessOutcome {
        if self.allowed.is_empty() {
            for &v in &self.scope {
                domains[v].restrict_to(std::iter::empty());
            }
            return PreProcessOutcome::Discharge;
        }
        if self.allowed.len() == 1 {
            let only = self.allowed.iter().next().unwrap().clone();
            for (&v, &val) in self.scope.iter().zip(only.iter()) {
                if domains[v].contains(val) {
                    domains[v].restrict_to([val]);
                } else {
                    domains[v].restrict_to(std::iter::empty());
                }
            }
            return PreProcessOutcome::Discharge;
        }
        for (i, &v) in self.scope.iter().enumerate() {
            let kept: Vec<usize> = domains[v]
                .iter()
                .filter(|x| self.nth_set[i].contains(x))
                .collect();
            domains[v].restrict_to(kept);
        }
        PreProcessOutcome::Keep
    }
}

fn prune_to(domains: &mut Domains, v: VarId, allowed: &HashSet<usize>, depth: usize) -> bool {
    let to_hide: Vec<usize> = domains[v].iter().filter(|x| !allowed.contains(x)).collect();
    for value in to_hide {
        domains[v].hide_value(value, depth);
    }
    !domains[v].is_empty()
}

/// All variables in scope must take mutually distinct values.
#[derive(Debug, Clone)]
pub struct AllDifferent {
    scope: Vec<VarId>,
}

impl AllDifferent {
    pub fn new(scope: Vec<VarId>) -> Self {
        AllDifferent { scope }
    }
}

impl Constraint for AllDifferent {
    fn scope(&self) -> &[VarId] {
        &self.scope
    }

    fn check(&self, assignment: &Assignment) -> bool {
        let mut seen = HashSet::new();
        for &v in &self.scope {
            if let Some(x) = assignment.get(v) {
                if !seen.insert(x) {
                    return false;
                }
            }
        }
        true
    }

    fn forward_check(&self, domains: &mut Domains, assignment: &Assignment, depth: usize) -> bool {
        let assigned: HashSet<usize> = self.scope.iter().filter_map(|&v| assignment.get(v)).collect();
        for &v in &self.scope {
            if assignment.get(v).is_some() {
                continue;
            }
            for value in assigned.iter().copied().collect::<Vec<_>>() {
                if domains[v].contains(value) {
                    domains[v].hide_value(value, depth);
                }
            }
            if domains[v].is_empty() {
                return false;
            }
        }
        true
    }
}

/// Tuple whitelist indexed by the first variable's value: if
/// `scope[0] == a` then `(scope[1], ..)` must complete some tuple whose
/// first component is `a`; values of `scope[0]` with no entries at all
/// are unconstrained. This is what makes the dangling/identification
/// encoding in the match finder tractable — see §4.4 and §9.
#[derive(Debug, Clone)]
pub struct ConditionalTuple {
    scope: Vec<VarId>,
    by_first: HashMap<usize, HashSet<Vec<usize>>>,
}

impl ConditionalTuple {
    pub fn new(scope: Vec<VarId>, tuples: impl IntoIterator<Item = Vec<usize>>) -> Self {
        let mut by_first: HashMap<usize, HashSet<Vec<usize>>> = HashMap::new();
        for t in tuples {
            let (first, rest) = t.split_first().expect("ConditionalTuple needs arity >= 1");
            by_first.entry(*first).or_default().insert(rest.to_vec());
        }
        ConditionalTuple { scope, by_first }
    }

    fn compatible(current: &[Option<usize>], allowed: &[usize]) -> bool {
        current
            .iter()
            .zip(allowed.iter())
            .all(|(c, a)| c.map_or(true, |cv| cv == *a))
    }

    fn possible_first(&self, first: usize, rest_current: &[Option<usize>]) -> bool {
        match self.by_first.get(&first) {
            None => true,
            Some(entries) => entries.iter().any(|a| Self::compatible(rest_current, a)),
        }
    }
}

impl Constraint for ConditionalTuple {
    fn scope(&self) -> &[VarId] {
        &self.scope
    }

    fn check(&self, assignment: &Assignment) -> bool {
        let current = current_tuple(&self.scope, assignment);
        let Some(first) = current[0] else {
            return true;
        };
        let Some(entries) = self.by_first.get(&first) else {
            return true;
        };
        let rest = &current[1..];
        if rest.iter().all(Option::is_some) {
            let full: Vec<usize> = rest.iter().map(|x| x.unwrap()).collect();
            entries.contains(&full)
        } else {
            entries.iter().any(|a| Self::compatible(rest, a))
        }
    }

    fn forward_check(&self, domains: &mut Domains, assignment: &Assignment, depth: usize) -> bool {
        let current = current_tuple(&self.scope, assignment);
        let rest = &current[1..];

        if current[0].is_none() {
            let first_var = self.scope[0];
            let candidates: Vec<usize> = domains[first_var].iter().collect();
            for value in candidates {
                if !self.possible_first(value, rest) {
                    domains[first_var].hide_value(value, depth);
                }
            }
            return !domains[first_var].is_empty();
        }

        let first = current[0].unwrap();
        let Some(entries) = self.by_first.get(&first) else {
            return true;
        };
        let compatible_entries: Vec<&Vec<usize>> =
            entries.iter().filter(|a| Self::compatible(rest, a)).collect();
        if compatible_entries.is_empty() {
            return false;
        }
        for (i, &v) in self.scope[1..].iter().enumerate() {
            if assignment.get(v).is_some() {
                continue;
            }
            let ith_values: HashSet<usize> = compatible_entries.iter().map(|e| e[i]).collect();
            let to_hide: Vec<usize> = domains[v].iter().filter(|x| !ith_values.contains(x)).collect();
            for value in to_hide {
                domains[v].hide_value(value, depth);
            }
            if domains[v].is_empty() {
                return false;
            }
        }
        true
    }
}

/// Values taken by `first_set` variables must be disjoint from values
/// taken by `second_set` variables.
#[derive(Debug, Clone)]
pub struct NonoverlappingSets {
    scope: Vec<VarId>,
    first_set: Vec<VarId>,
    second_set: Vec<VarId>,
}

impl NonoverlappingSets {
    pub fn new(first_set: Vec<VarId>, second_set: Vec<VarId>) -> Self {
        let mut scope = first_set.clone();
        scope.extend(second_set.iter().copied());
        NonoverlappingSets {
            scope,
            first_set,
            second_set,
        }
    }
}

impl Constraint for NonoverlappingSets {
    fn scope(&self) -> &[VarId] {
        &self.scope
    }

    fn check(&self, assignment: &Assignment) -> bool {
        let set_a: HashSet<usize> = self.first_set.iter().filter_map(|&v| assignment.get(v)).collect();
        for &v in &self.second_set {
            if let Some(x) = assignment.get(v) {
                if set_a.contains(&x) {
                    return false;
                }
            }
        }
        true
    }

    fn pre_process(&mut self, _domains: &mut Domains) -> PreProcessOutcome {
        if self.first_set.is_empty() || self.second_set.is_empty() {
            PreProcessOutcome::Discharge
        } else {
            PreProcessOutcome::Keep
        }
    }
}

/// Pairs of values taken by corresponding variable-pairs in
/// `first_set` must not equal (in either orientation) any pair taken
/// by `second_set`.
#[derive(Debug, Clone)]
pub struct NonoverlappingUnorderedPairs {
    scope: Vec<VarId>,
    first_set: Vec<(VarId, VarId)>,
    second_set: Vec<(VarId, VarId)>,
}

impl NonoverlappingUnorderedPairs {
    pub fn new(first_set: Vec<(VarId, VarId)>, second_set: Vec<(VarId, VarId)>) -> Self {
        let mut scope = Vec::new();
        for &(a, b) in first_set.iter().chain(second_set.iter()) {
            scope.push(a);
            scope.push(b);
        }
        NonoverlappingUnorderedPairs {
            scope,
            first_set,
            second_set,
        }
    }
}

impl Constraint for NonoverlappingUnorderedPairs {
    fn scope(&self) -> &[VarId] {
        &self.scope
    }

    fn check(&self, assignment: &Assignment) -> bool {
        let set_a: HashSet<(usize, usize)> = self
            .first_set
            .iter()
            .filter_map(|&(x, y)| Some((assignment.get(x)?, assignment.get(y)?)))
            .collect();
        for &(x, y) in &self.second_set {
            if let (Some(xv), Some(yv)) = (assignment.get(x), assignment.get(y)) {
                if set_a.contains(&(xv, yv)) || set_a.contains(&(yv, xv)) {
                    return false;
                }
            }
        }
        true
    }

    fn pre_process(&mut self, _domains: &mut Domains) -> PreProcessOutcome {
        if self.first_set.is_empty() || self.second_set.is_empty() {
            PreProcessOutcome::Discharge
        } else {
            PreProcessOutcome::Keep
        }
    }
}
