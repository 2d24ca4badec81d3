//! Structured error types shared across the crate.
//!
//! Each layer gets its own enum so callers can match on the failure mode
//! that's relevant to them; [`GraphGramError`] unifies them at the CLI
//! boundary via `#[from]` conversions, following the same pattern used to
//! aggregate per-crate error types into one request-boundary error.

use thiserror::Error;

/// A `(line, column)` position in a textual input, 1-indexed like most
/// editors and compilers.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/// Failure to parse a single graph string (the `a--b[x]; c` grammar of
/// the graph-string format).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("unexpected character {found:?} at {pos}")]
    UnexpectedChar { found: char, pos: Position },

    #[error("unexpected end of input while expecting {expected}")]
    UnexpectedEof { expected: &'static str },

    #[error("unterminated tag starting at {pos}")]
    UnterminatedTag { pos: Position },

    #[error("vertex identifier expected at {pos}")]
    ExpectedVertex { pos: Position },

    #[error("node or edge was given tag \"{new_tag}\" but already had tag \"{old_tag}\"")]
    MismatchedTag { old_tag: String, new_tag: String },

    #[error("graph contains merged ('^') vertices where merging is not permitted")]
    MergeDisallowed,

    #[error("trailing input after graph: {remainder:?}")]
    TrailingInput { remainder: String },
}

impl ParseError {
    /// A human-formatted rendering that underlines the offending column,
    /// mirroring the original prototype's `prettyPrint` behavior.
    pub fn pretty_print(&self, source: &str) -> String {
        let mut out = format!("error parsing graph: {self}\n");
        if let Some(pos) = self.position() {
            out.push_str(source);
            out.push('\n');
            if pos.column > 0 {
                out.push_str(&" ".repeat(pos.column.saturating_sub(1)));
            }
            out.push_str("^\n");
        }
        out
    }

    fn position(&self) -> Option<Position> {
        match self {
            ParseError::UnexpectedChar { pos, .. }
            | ParseError::UnterminatedTag { pos }
            | ParseError::ExpectedVertex { pos } => Some(*pos),
            _ => None,
        }
    }
}

/// Failure to parse or interpret a whole grammar file (JSON envelope
/// around graph strings).
#[derive(Debug, Error)]
pub enum GrammarParseError {
    #[error("malformed grammar JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported grammar version {0:?}")]
    UnsupportedVersion(String),

    #[error("error parsing left-hand graph {left:?}: {source}")]
    BadLeft { left: String, source: ParseError },

    #[error("error parsing right-hand graph {right:?} (left side {left:?}): {source}")]
    BadRight {
        left: String,
        right: String,
        source: ParseError,
    },

    #[error("error parsing start graph: {0}")]
    BadStart(ParseError),

    #[error("rule is invalid: {0}")]
    InvalidRule(#[from] RuleError),
}

/// A rule's left/right sides and merge map disagree with the invariants
/// required to apply it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RuleError {
    #[error("left-hand and right-hand graphs have different directedness")]
    DirectednessMismatch,

    #[error("rename maps node {left_node} to non-existent right-hand node {right_node}")]
    DanglingRename { left_node: usize, right_node: usize },

    #[error("join references right-hand node {node} that has no corresponding left-hand node and no alias definition")]
    UnresolvableJoin { node: usize },

    #[error("'^' merge syntax is not allowed on the left-hand side of a rule")]
    MergeOnLeftSide,
}

/// Runtime misuse of the matching machinery.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MatchError {
    #[error("host graph and pattern graph have different directedness; convert both to directed first")]
    DirectednessMismatch,

    #[error("match was modified after being hashed")]
    FrozenMatchModified,

    #[error("match finder used out of sequence: {0}")]
    InvalidState(&'static str),
}

/// The driver could not find any applicable rule during an iteration.
/// This is a recoverable, expected termination condition, not a bug.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("no matching rule found in grammar at iteration {iteration}")]
pub struct NoMatch {
    pub iteration: usize,
}

/// Top-level error unifying every layer, for use at the CLI boundary.
#[derive(Debug, Error)]
pub enum GraphGramError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    GrammarParse(#[from] GrammarParseError),

    #[error(transparent)]
    Rule(#[from] RuleError),

    #[error(transparent)]
    Match(#[from] MatchError),

    #[error(transparent)]
    NoMatch(#[from] NoMatch),

    #[error("failed to read grammar file {path:?}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
}
