//! Pluggable predicate comparers
//!
//! Structural equality can only say two predicates are the same or unrelated.
//! A comparer registered for a predicate kind refines that into an ordering:
//! `count < 3` specializes `count < 5`, a narrow range specializes a wide one.
//! Kinds with no registered comparer silently fall back to structural
//! equality, which degrades match precision but never claims a false order.

use crate::expression::Expression;
use crate::relationship::Relationship;
use indexmap::IndexMap;

/// Orders two predicates of a single kind.
///
/// The engine consults a comparer only when both predicates have the same
/// top-level kind (after stripping one `!` from both sides), so
/// implementations may assume matching shapes.
pub trait PredicateComparer {
    /// Relationship of `predicate` relative to `other`.
    fn relationship(&self, predicate: &Expression, other: &Expression) -> Relationship;
}

/// Comparers keyed by predicate kind, in registration order.
pub type ComparerRegistry = IndexMap<String, Box<dyn PredicateComparer>>;
