//! A generic finite-domain constraint solver (§4.3).
//!
//! This module has no knowledge of graphs; [`crate::matchfinder`]
//! builds the graph-specific encoding on top of the pieces here.

pub mod constraint;
pub mod domain;
pub mod solver;

pub use constraint::{
    AllDifferent, Assignment, Constraint, ConditionalTuple, Domains, NonoverlappingSets,
    NonoverlappingUnorderedPairs, PreProcessOutcome, Tuple, VarId,
};
pub use domain::Domain;
pub use solver::{SearchControl, SearchOutcome, Solver};
