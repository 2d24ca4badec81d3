//! Grammar-file JSON round-trip coverage (§4.7, §6, §8): choice rules
//! and `extensions` passthrough.

use graphgram::driver::GrammarRule;
use graphgram::error::GrammarParseError;
use graphgram::parse::load_grammar;

#[test]
fn parses_start_a_deterministic_rule_and_a_choice_rule() {
    let json = r#"{
        "version": "0.1",
        "start": "A[seed]",
        "A[seed]": "A[seed]--B[grown]",
        "B[grown]": ["B[red]", "B[blue]", "B[green]"]
    }"#;
    let grammar = load_grammar(json).unwrap();
    assert_eq!(grammar.start.node_count(), 1);
    assert_eq!(grammar.rules.len(), 2);

    let mut deterministic = 0;
    let mut choice_alt_count = 0;
    for rule in &grammar.rules {
        match rule {
            GrammarRule::Deterministic(_) => deterministic += 1,
            GrammarRule::Choice(alts) => choice_alt_count = alts.len(),
        }
    }
    assert_eq!(deterministic, 1);
    assert_eq!(choice_alt_count, 3);
}

#[test]
fn extensions_payload_survives_untouched() {
    let json = r#"{
        "version": "0.1",
        "start": "A",
        "extensions": {"renderer": {"theme": "dark"}, "tags": [1, 2, 3]},
        "A": "A[done]"
    }"#;
    let grammar = load_grammar(json).unwrap();
    let ext = grammar.extensions.expect("extensions should be present");
    assert_eq!(ext["renderer"]["theme"], "dark");
    assert_eq!(ext["tags"][2], 3);
}

#[test]
fn missing_extensions_is_none() {
    let json = r#"{"version": "0.1", "start": "A", "A": "A[x]"}"#;
    let grammar = load_grammar(json).unwrap();
    assert!(grammar.extensions.is_none());
}

#[test]
fn unsupported_version_is_rejected() {
    let json = r#"{"version": "2.0", "start": "A"}"#;
    let err = load_grammar(json).unwrap_err();
    assert!(matches!(err, GrammarParseError::UnsupportedVersion(_)));
}

#[test]
fn malformed_json_is_rejected() {
    let err = load_grammar("{not json").unwrap_err();
    assert!(matches!(err, GrammarParseError::Json(_)));
}

#[test]
fn bad_left_hand_side_reports_which_key_failed() {
    let json = r#"{"version": "0.1", "start": "A", "A^B": "A"}"#;
    let err = load_grammar(json).unwrap_err();
    match err {
        GrammarParseError::BadLeft { left, .. } => assert_eq!(left, "A^B"),
        other => panic!("expected BadLeft, got {other:?}"),
    }
}
