//! Pluggable clause rewriting
//!
//! Optimizers run once over every clause a trigger produces, before
//! quantifier expansion. They can simplify a clause or prove it false and
//! drop it from the trigger entirely.

use crate::clause::Clause;

/// A rewrite pass applied to each derived clause during trigger construction.
pub trait ClauseOptimizer {
    /// Rewrite `clause`, or return `None` when the clause is provably always
    /// false and should be dropped.
    fn optimize(&self, clause: Clause) -> Option<Clause>;
}
