//! Driver integration coverage (§4.6, §8): a tiny grammar run end to
//! end through both termination paths (iteration bound, and a
//! grammar that runs itself out of matches).

use graphgram::driver::{EngineOptions, Runner};
use graphgram::parse::load_grammar;
use rand::rngs::StdRng;
use rand::SeedableRng;

#[test]
fn runs_to_the_iteration_bound_on_a_perpetually_growing_grammar() {
    let json = r#"{
        "version": "0.1",
        "start": "A[tip]",
        "A[tip]": "A--B; B[tip]"
    }"#;
    let grammar = load_grammar(json).unwrap();
    let mut runner = Runner::new(grammar.start.clone());
    let mut rng = StdRng::seed_from_u64(99);
    let opts = EngineOptions::default();

    runner.run(&grammar, 8, &mut rng, &opts, None).unwrap();

    assert_eq!(runner.iteration, 8);
    assert_eq!(runner.graph.node_count(), 9);
    assert_eq!(runner.graph.edge_count(), 8);
}

#[test]
fn stops_with_no_match_once_the_grammar_is_exhausted() {
    let json = r#"{
        "version": "0.1",
        "start": "A[raw]; B[raw]",
        "A[raw]": "A[done]"
    }"#;
    let grammar = load_grammar(json).unwrap();
    let mut runner = Runner::new(grammar.start.clone());
    let mut rng = StdRng::seed_from_u64(5);
    let opts = EngineOptions::default();

    // Two [raw] nodes, rule fires on one at a time; after two
    // successful iterations neither node is tagged [raw] any more, so
    // the third iteration has nothing to match.
    let err = runner.run(&grammar, 20, &mut rng, &opts, None).unwrap_err();
    assert_eq!(err.iteration, 2);
    assert_eq!(runner.iteration, 2);
}

#[test]
fn a_choice_rule_always_picks_one_of_its_declared_alternatives() {
    let json = r#"{
        "version": "0.1",
        "start": "A[seed]",
        "A[seed]": ["A[x]", "A[y]"]
    }"#;
    let grammar = load_grammar(json).unwrap();
    let mut runner = Runner::new(grammar.start.clone());
    let mut rng = StdRng::seed_from_u64(1);
    let opts = EngineOptions::default();

    runner.run(&grammar, 1, &mut rng, &opts, None).unwrap();
    let tag = runner.graph.node_tag(runner.graph.nodes().next().unwrap());
    assert!(tag == Some("x") || tag == Some("y"));
}
