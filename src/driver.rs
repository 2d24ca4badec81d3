//! Grammar driver (§4.6): a grammar is a start graph plus a set of
//! rules (some deterministic, some a uniformly-random choice among
//! alternatives); each iteration tries rules in a random order, finds
//! matches for the first rule that has any, applies a uniformly chosen
//! match, and a full iteration with no applicable rule anywhere stops
//! the run. Grounded in `soffit.application.ApplicationState`,
//! `chooseAndApply`, and `Timing`.

use crate::apply::apply;
use crate::error::NoMatch;
use crate::graph::Graph;
use crate::matchfinder::MatchFinder;
use crate::rule::Rule;
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// One grammar production, either a single fixed rewrite or a set of
/// alternatives chosen uniformly at random each time the rule fires
/// (§4.6 "choice rules").
#[derive(Debug, Clone)]
pub enum GrammarRule {
    Deterministic(Rule),
    Choice(Vec<Rule>),
}

impl GrammarRule {
    /// The left-hand pattern used for matching. Choice alternatives all
    /// share the same left side by construction (`load_grammar` builds
    /// them from one key), so the first alternative's is representative.
    pub fn left(&self) -> &Graph {
        match self {
            GrammarRule::Deterministic(r) => r.left(),
            GrammarRule::Choice(alts) => alts[0].left(),
        }
    }

    fn pick(&self, rng: &mut impl Rng) -> &Rule {
        match self {
            GrammarRule::Deterministic(r) => r,
            GrammarRule::Choice(alts) => alts.choose(rng).expect("choice rule has no alternatives"),
        }
    }
}

/// A parsed grammar: a start graph, its rules, and whatever
/// `extensions` payload accompanied it in the source JSON (§6), passed
/// through untyped since its shape is consumer-defined.
#[derive(Debug, Clone)]
pub struct Grammar {
    pub rules: Vec<GrammarRule>,
    pub start: Graph,
    pub extensions: Option<serde_json::Value>,
}

/// Engine-wide tuning knobs (§3a), passed by reference into the
/// matching and driving machinery rather than threaded as separate
/// arguments everywhere.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub max_matches: usize,
    pub max_match_time: Duration,
    pub iterations: usize,
    pub seed: Option<u64>,
    pub fast_mode: bool,
    pub profile: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        EngineOptions {
            max_matches: crate::matchfinder::DEFAULT_MAX_MATCHES,
            max_match_time: crate::matchfinder::DEFAULT_MAX_MATCH_TIME,
            iterations: 100,
            seed: None,
            fast_mode: false,
            profile: false,
        }
    }
}

/// Per-rule timing samples for `--profile`, keyed by the rule's index
/// in the grammar's rule list. Grounded in `soffit.application.Timing`.
#[derive(Debug, Default, Clone)]
pub struct Profile {
    samples: HashMap<usize, Vec<Duration>>,
}

impl Profile {
    pub fn new() -> Self {
        Profile::default()
    }

    fn record(&mut self, rule_idx: usize, elapsed: Duration) {
        self.samples.entry(rule_idx).or_default().push(elapsed);
    }

    /// Log a one-line summary per rule: call count and total time
    /// spent matching it, in rule order.
    pub fn log_report(&self) {
        let mut indices: Vec<&usize> = self.samples.keys().collect();
        indices.sort();
        for idx in indices {
            let samples = &self.samples[idx];
            let total: Duration = samples.iter().sum();
            log::info!(
                "rule {idx}: {} attempts, {:.3}s total matching time",
                samples.len(),
                total.as_secs_f64()
            );
        }
    }
}

/// The outcome of one successful iteration: the rewritten graph plus
/// bookkeeping about what was tried and what fired.
pub struct IterationOutcome {
    pub graph: Graph,
    pub rules_attempted: usize,
    pub matches_found: usize,
    pub rule_index: usize,
}

/// Try every rule in `grammar`, in a freshly shuffled order, against
/// `graph`; apply a uniformly random match of the first rule that
/// matches at all. Returns `None` if no rule in the grammar matches.
pub fn run_iteration(
    grammar: &Grammar,
    graph: &Graph,
    rng: &mut impl Rng,
    opts: &EngineOptions,
    profile: Option<&mut Profile>,
) -> Option<IterationOutcome> {
    let mut order: Vec<usize> = (0..grammar.rules.len()).collect();
    order.shuffle(rng);

    let mut profile = profile;
    let mut attempted = 0;
    for rule_idx in order {
        attempted += 1;
        let grule = &grammar.rules[rule_idx];
        let chosen = grule.pick(rng);

        let start = Instant::now();
        let mut finder = MatchFinder::new(graph);
        // §3a: fast_mode caps matching at the first match found per
        // rule attempt, trading match-set diversity for speed.
        finder.set_max_matches(if opts.fast_mode { 1 } else { opts.max_matches });
        finder.set_max_match_time(opts.max_match_time);
        if finder.left_side(chosen.left()).is_err() {
            continue;
        }
        if finder.right_side(chosen).is_err() {
            continue;
        }
        let matches = finder.matches();
        if let Some(p) = profile.as_deref_mut() {
            p.record(rule_idx, start.elapsed());
        }
        if matches.is_empty() {
            continue;
        }

        let m = matches.choose(rng).expect("non-empty matches");
        let new_graph = apply(graph, chosen, m);
        return Some(IterationOutcome {
            graph: new_graph,
            rules_attempted: attempted,
            matches_found: matches.len(),
            rule_index: rule_idx,
        });
    }
    None
}

/// Drives a grammar to completion over a bounded number of iterations,
/// owning the evolving graph between calls. Grounded in
/// `soffit.application.ApplicationState`.
pub struct Runner {
    pub graph: Graph,
    pub iteration: usize,
}

impl Runner {
    pub fn new(start: Graph) -> Self {
        Runner {
            graph: start,
            iteration: 0,
        }
    }

    /// Run up to `max_iterations` rewrite steps of `grammar`, logging a
    /// one-line summary per iteration. Returns `Err(NoMatch)` the first
    /// time a whole iteration finds no applicable rule anywhere in the
    /// grammar (§4.6, §7: a recoverable condition, not propagated as a
    /// hard failure by callers that choose to treat it as a normal stop).
    pub fn run(
        &mut self,
        grammar: &Grammar,
        max_iterations: usize,
        rng: &mut impl Rng,
        opts: &EngineOptions,
        mut profile: Option<&mut Profile>,
    ) -> Result<(), NoMatch> {
        for _ in 0..max_iterations {
            match run_iteration(grammar, &self.graph, rng, opts, profile.as_deref_mut()) {
                Some(outcome) => {
                    log::info!(
                        "iteration {}: rule {} fired ({} matches found after trying {} rule(s)); graph now has {} node(s), {} edge(s)",
                        self.iteration,
                        outcome.rule_index,
                        outcome.matches_found,
                        outcome.rules_attempted,
                        outcome.graph.node_count(),
                        outcome.graph.edge_count(),
                    );
                    self.graph = outcome.graph;
                    self.iteration += 1;
                }
                None => {
                    return Err(NoMatch {
                        iteration: self.iteration,
                    })
                }
            }
        }
        Ok(())
    }
}
