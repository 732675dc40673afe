//! Error types for the trigger engine

use thiserror::Error;

/// Errors produced while turning trigger source text into an expression tree.
///
/// Parse errors are fatal to the `add_trigger_text` call that raised them; no
/// tree mutation happens before parsing succeeds.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    /// The input could not be parsed as an expression.
    #[error("syntax error near {rest:?}")]
    Syntax {
        /// The unconsumed input at the point of failure.
        rest: String,
    },

    /// The input ended in the middle of an expression.
    #[error("unexpected end of input")]
    UnexpectedEnd,
}

/// Errors produced while evaluating a predicate expression against a state.
///
/// During matching these never escape: a node whose expression fails to
/// evaluate is treated as a non-match and the walk continues.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvaluationError {
    /// The state has no value at the accessed path.
    #[error("no value at {path:?}")]
    MissingValue {
        /// The accessor path that failed to resolve.
        path: String,
    },

    /// A value had the wrong type for the operation applied to it.
    #[error("expected {expected}, found {actual}")]
    TypeMismatch {
        /// What the operation required.
        expected: String,
        /// What the state actually held.
        actual: String,
    },

    /// The evaluator does not know how to evaluate this expression kind.
    #[error("cannot evaluate {kind:?}")]
    Unsupported {
        /// Kind of the offending expression.
        kind: String,
    },
}
