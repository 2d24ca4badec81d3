//! The generic finite-domain backtracking solver (§4.3): MRV variable
//! ordering, chronological backtracking, forward-checking per
//! constraint. Grounded in the control flow of the `python-constraint`
//! library that `soffit.constraint` builds propagators for, reworked
//! as a callback-driven search rather than a Python generator.
//!
//! The spec describes `solutions()` as "a lazy, restartable iterator";
//! here it's a callback-driven [`Solver::search`] instead; the match
//! finder always wants either "stop at the first solution" or "collect
//! up to a cap / time budget", both of which a callback returning
//! [`SearchControl`] expresses without the extra machinery a genuine
//! coroutine would need in Rust. See DESIGN.md for the tradeoff.

use super::constraint::{Assignment, Constraint, Domains, PreProcessOutcome, VarId};

/// Returned from the solution callback to tell the search whether to
/// keep looking for more solutions or stop immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchControl {
    Continue,
    Stop,
}

/// How a [`Solver::search`] call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchOutcome {
    /// Every branch of the search tree was explored.
    Exhausted,
    /// The callback returned `Stop`.
    Stopped,
}

struct ActiveConstraint {
    constraint: Box<dyn Constraint>,
    active: bool,
}

/// A finite-domain CSP: a fixed set of variables (`0..n_vars`), their
/// domains, and a set of constraints over subsets of those variables.
pub struct Solver {
    n_vars: usize,
    domains: Domains,
    constraints: Vec<ActiveConstraint>,
    var_constraints: Vec<Vec<usize>>,
    assignment: Assignment,
    infeasible: bool,
}

impl Solver {
    pub fn new(domains: Domains) -> Self {
        let n_vars = domains.len();
        Solver {
            n_vars,
            domains,
            constraints: Vec::new(),
            var_constraints: vec![Vec::new(); n_vars],
            assignment: Assignment::new(n_vars),
            infeasible: false,
        }
    }

    pub fn add_constraint(&mut self, constraint: Box<dyn Constraint>) {
        let idx = self.constraints.len();
        for &v in constraint.scope() {
            self.var_constraints[v].push(idx);
        }
        self.constraints.push(ActiveConstraint {
            constraint,
            active: true,
        });
    }

    pub fn mark_infeasible(&mut self) {
        self.infeasible = true;
    }

    pub fn domain_len(&self, v: VarId) -> usize {
        self.domains[v].len()
    }

    pub fn domain_values(&self, v: VarId) -> Vec<usize> {
        self.domains[v].iter().collect()
    }

    /// Narrow `v`'s domain to the values for which `keep` returns
    /// `true`. Intended for build-time restriction (before
    /// [`Solver::preprocess`]/[`Solver::search`] run), not as a
    /// substitute for `forward_check`.
    pub fn filter_domain(&mut self, v: VarId, mut keep: impl FnMut(usize) -> bool) {
        let kept: Vec<usize> = self.domains[v].iter().filter(|&x| keep(x)).collect();
        self.domains[v].restrict_to(kept);
    }

    /// Run every constraint's one-shot `pre_process` hook. Returns
    /// `false` if the problem is already unsatisfiable (an empty
    /// domain resulted).
    pub fn preprocess(&mut self) -> bool {
        if self.infeasible {
            return false;
        }
        for ac in &mut self.constraints {
            if !ac.active {
                continue;
            }
            match ac.constraint.pre_process(&mut self.domains) {
                PreProcessOutcome::Keep => {}
                PreProcessOutcome::Discharge => ac.active = false,
            }
        }
        self.domains.iter().all(|d| !d.is_empty())
    }

    fn select_var(&self) -> Option<VarId> {
        (0..self.n_vars)
            .filter(|&v| self.assignment.get(v).is_none())
            .min_by_key(|&v| self.domains[v].len())
    }

    fn propagate(&mut self, var: VarId, depth: usize) -> bool {
        let touched: Vec<usize> = self.var_constraints[var].clone();
        for idx in touched {
            if !self.constraints[idx].active {
                continue;
            }
            if !self.constraints[idx].constraint.check(&self.assignment) {
                return false;
            }
            if !self.constraints[idx]
                .constraint
                .forward_check(&mut self.domains, &self.assignment, depth)
            {
                return false;
            }
        }
        (0..self.n_vars)
            .filter(|&v| self.assignment.get(v).is_none())
            .all(|v| !self.domains[v].is_empty())
    }

    fn search_rec(
        &mut self,
        depth: usize,
        on_solution: &mut dyn FnMut(&Assignment) -> SearchControl,
    ) -> bool {
        let Some(var) = self.select_var() else {
            return on_solution(&self.assignment) == SearchControl::Continue;
        };

        let candidates: Vec<usize> = self.domains[var].iter().collect();
        for value in candidates {
            self.assignment.set(var, value);
            let consistent = self.propagate(var, depth + 1);
            let keep_going = if consistent {
                self.search_rec(depth + 1, on_solution)
            } else {
                true
            };
            self.assignment.unset(var);
            for d in &mut self.domains {
                d.restore_to(depth + 1);
            }
            if !keep_going {
                return false;
            }
        }
        true
    }

    /// Drive the search, invoking `on_solution` once per complete,
    /// constraint-satisfying assignment, in solver-defined (but stable
    /// for a given constraint/domain setup) order. Stops early if the
    /// callback returns [`SearchControl::Stop`].
    pub fn search(&mut self, mut on_solution: impl FnMut(&Assignment) -> SearchControl) -> SearchOutcome {
        if self.infeasible || !self.domains.iter().all(|d| !d.is_empty()) {
            return SearchOutcome::Exhausted;
        }
        if self.search_rec(0, &mut on_solution) {
            SearchOutcome::Exhausted
        } else {
            SearchOutcome::Stopped
        }
    }
}
