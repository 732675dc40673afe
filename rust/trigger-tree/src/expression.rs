//! Predicate expression model
//!
//! The engine operates on a closed expression tree: boolean connectives over
//! atomic predicates (named calls, state accessors, comparisons, constants).
//! The engine never defines the surface grammar or the evaluation rules for
//! predicates; those are injected through [`ExpressionParser`] and
//! [`Evaluator`]. What it does own is the tree's *shape*: normalization,
//! substitution, and structural equality all work on this type.

use crate::error::{EvaluationError, ParseError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Marker call name for sub-expressions that are optionally present.
///
/// `optional(x)` expands as `true || x`: a clause without `x` and a clause
/// with it. A trigger whose optional predicate holds matches more
/// specifically; one where it does not still matches.
pub const OPTIONAL: &str = "optional";

/// Marker call name for sub-expressions excluded from specialization.
///
/// `ignore(x)` keeps `x` out of clause comparison and out of the evaluable
/// expression derived for a node, so rule-mechanics predicates (counters,
/// bookkeeping) do not make otherwise-identical triggers incomparable.
pub const IGNORE: &str = "ignore";

/// Ordered comparison operators, each with a complement used when a negation
/// is pushed onto it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComparisonOperator {
    /// `<`
    #[serde(rename = "<")]
    LessThan,
    /// `<=`
    #[serde(rename = "<=")]
    LessThanOrEqual,
    /// `==`
    #[serde(rename = "==")]
    Equal,
    /// `!=`
    #[serde(rename = "!=")]
    NotEqual,
    /// `>=`
    #[serde(rename = ">=")]
    GreaterThanOrEqual,
    /// `>`
    #[serde(rename = ">")]
    GreaterThan,
}

impl ComparisonOperator {
    /// The operator equivalent to negating this one: `!(a < b)` is `a >= b`.
    pub fn complement(self) -> Self {
        match self {
            ComparisonOperator::LessThan => ComparisonOperator::GreaterThanOrEqual,
            ComparisonOperator::LessThanOrEqual => ComparisonOperator::GreaterThan,
            ComparisonOperator::Equal => ComparisonOperator::NotEqual,
            ComparisonOperator::NotEqual => ComparisonOperator::Equal,
            ComparisonOperator::GreaterThanOrEqual => ComparisonOperator::LessThan,
            ComparisonOperator::GreaterThan => ComparisonOperator::LessThanOrEqual,
        }
    }

    /// Source-level symbol, also used as the comparer-registry key.
    pub fn symbol(self) -> &'static str {
        match self {
            ComparisonOperator::LessThan => "<",
            ComparisonOperator::LessThanOrEqual => "<=",
            ComparisonOperator::Equal => "==",
            ComparisonOperator::NotEqual => "!=",
            ComparisonOperator::GreaterThanOrEqual => ">=",
            ComparisonOperator::GreaterThan => ">",
        }
    }
}

impl fmt::Display for ComparisonOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// A predicate expression tree.
///
/// Structural equality (`PartialEq`) is the engine's deep-equality test: it
/// drives duplicate removal and the fallback clause comparison for predicate
/// kinds without a registered comparer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expression {
    /// Conjunction of sub-expressions.
    And(Vec<Expression>),
    /// Disjunction of sub-expressions.
    Or(Vec<Expression>),
    /// Negation of a sub-expression.
    Not(Box<Expression>),
    /// Ordered comparison between two operands.
    Compare {
        /// The comparison operator.
        op: ComparisonOperator,
        /// The operands, left then right.
        args: Vec<Expression>,
    },
    /// A named predicate applied to arguments; also carries the
    /// [`OPTIONAL`]/[`IGNORE`] markers.
    Call {
        /// Predicate name.
        name: String,
        /// Arguments.
        args: Vec<Expression>,
    },
    /// A lookup into the state the trigger is evaluated against.
    Accessor(String),
    /// A literal value.
    Constant(Value),
}

impl Expression {
    /// Conjunction of `children`.
    pub fn and(children: Vec<Expression>) -> Self {
        Expression::And(children)
    }

    /// Disjunction of `children`.
    pub fn or(children: Vec<Expression>) -> Self {
        Expression::Or(children)
    }

    /// Negation of `child`.
    pub fn not(child: Expression) -> Self {
        Expression::Not(Box::new(child))
    }

    /// Comparison `left op right`.
    pub fn compare(op: ComparisonOperator, left: Expression, right: Expression) -> Self {
        Expression::Compare {
            op,
            args: vec![left, right],
        }
    }

    /// Call of the named predicate.
    pub fn call(name: impl Into<String>, args: Vec<Expression>) -> Self {
        Expression::Call {
            name: name.into(),
            args,
        }
    }

    /// State lookup at `path`.
    pub fn accessor(path: impl Into<String>) -> Self {
        Expression::Accessor(path.into())
    }

    /// Literal value.
    pub fn constant(value: impl Into<Value>) -> Self {
        Expression::Constant(value.into())
    }

    /// Boolean literal.
    pub fn truth(value: bool) -> Self {
        Expression::Constant(Value::Bool(value))
    }

    /// Wrap `inner` in the [`OPTIONAL`] marker.
    pub fn optional(inner: Expression) -> Self {
        Expression::call(OPTIONAL, vec![inner])
    }

    /// Wrap `inner` in the [`IGNORE`] marker.
    pub fn ignore(inner: Expression) -> Self {
        Expression::call(IGNORE, vec![inner])
    }

    /// The kind name of the top-level node, used as the comparer-registry key.
    pub fn kind(&self) -> &str {
        match self {
            Expression::And(_) => "&&",
            Expression::Or(_) => "||",
            Expression::Not(_) => "!",
            Expression::Compare { op, .. } => op.symbol(),
            Expression::Call { name, .. } => name,
            Expression::Accessor(_) => "accessor",
            Expression::Constant(_) => "constant",
        }
    }

    /// Whether this is a single-argument call of `marker`.
    pub fn is_marker(&self, marker: &str) -> bool {
        matches!(self, Expression::Call { name, args } if name == marker && args.len() == 1)
    }

    /// Whether this is an [`IGNORE`]-wrapped predicate.
    pub fn is_ignore(&self) -> bool {
        self.is_marker(IGNORE)
    }

    /// Whether this is an [`OPTIONAL`]-wrapped predicate.
    pub fn is_optional(&self) -> bool {
        self.is_marker(OPTIONAL)
    }

    /// The argument of a single-argument marker call, if this is one.
    pub fn marker_argument(&self) -> Option<&Expression> {
        match self {
            Expression::Call { name, args }
                if (name == OPTIONAL || name == IGNORE) && args.len() == 1 =>
            {
                args.first()
            }
            _ => None,
        }
    }

    /// The boolean value of a boolean literal, if this is one.
    pub fn as_bool_constant(&self) -> Option<bool> {
        match self {
            Expression::Constant(Value::Bool(value)) => Some(*value),
            _ => None,
        }
    }

    /// Replace every `Accessor(variable)` with `Accessor(binding)`.
    ///
    /// Returns the rewritten expression and whether anything changed; the
    /// changed flag is threaded explicitly so quantifier expansion can detect
    /// predicates that do not reference the variable at all.
    pub fn substitute_variable(&self, variable: &str, binding: &str) -> (Expression, bool) {
        match self {
            Expression::Accessor(path) if path == variable => {
                (Expression::accessor(binding), true)
            }
            Expression::And(children) => {
                let (children, changed) = substitute_all(children, variable, binding);
                (Expression::And(children), changed)
            }
            Expression::Or(children) => {
                let (children, changed) = substitute_all(children, variable, binding);
                (Expression::Or(children), changed)
            }
            Expression::Not(inner) => {
                let (inner, changed) = inner.substitute_variable(variable, binding);
                (Expression::not(inner), changed)
            }
            Expression::Compare { op, args } => {
                let (args, changed) = substitute_all(args, variable, binding);
                (Expression::Compare { op: *op, args }, changed)
            }
            Expression::Call { name, args } => {
                let (args, changed) = substitute_all(args, variable, binding);
                (
                    Expression::Call {
                        name: name.clone(),
                        args,
                    },
                    changed,
                )
            }
            _ => (self.clone(), false),
        }
    }
}

fn substitute_all(
    children: &[Expression],
    variable: &str,
    binding: &str,
) -> (Vec<Expression>, bool) {
    let mut changed = false;
    let rewritten = children
        .iter()
        .map(|child| {
            let (child, child_changed) = child.substitute_variable(variable, binding);
            changed = changed || child_changed;
            child
        })
        .collect();
    (rewritten, changed)
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::And(children) => write_joined(f, children, " && "),
            Expression::Or(children) => write_joined(f, children, " || "),
            Expression::Not(inner) => write!(f, "!{inner}"),
            Expression::Compare { op, args } => match args.as_slice() {
                [left, right] => write!(f, "{left} {op} {right}"),
                _ => write_joined(f, args, &format!(" {op} ")),
            },
            Expression::Call { name, args } => {
                write!(f, "{name}(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ")")
            }
            Expression::Accessor(path) => write!(f, "{path}"),
            Expression::Constant(value) => write!(f, "{value}"),
        }
    }
}

fn write_joined(
    f: &mut fmt::Formatter<'_>,
    children: &[Expression],
    separator: &str,
) -> fmt::Result {
    write!(f, "(")?;
    for (i, child) in children.iter().enumerate() {
        if i > 0 {
            write!(f, "{separator}")?;
        }
        write!(f, "{child}")?;
    }
    write!(f, ")")
}

/// Parser for trigger source text, injected by the surrounding system.
pub trait ExpressionParser {
    /// Parse `source` into an expression tree.
    fn parse(&self, source: &str) -> Result<Expression, ParseError>;
}

/// Evaluator for predicate expressions, injected by the surrounding system.
///
/// Only consulted during matching, on the evaluable expression derived for
/// each node (the conjunction of a clause's non-ignore predicates, or the
/// literal `true` for the root). Implementations must at minimum handle
/// `Constant(true)`.
pub trait Evaluator {
    /// Evaluate `expression` against `state`.
    fn evaluate(&self, expression: &Expression, state: &Value) -> Result<bool, EvaluationError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structural_equality_is_deep() {
        let a = Expression::and(vec![
            Expression::accessor("user.name"),
            Expression::compare(
                ComparisonOperator::LessThan,
                Expression::accessor("count"),
                Expression::constant(3),
            ),
        ]);
        let b = Expression::and(vec![
            Expression::accessor("user.name"),
            Expression::compare(
                ComparisonOperator::LessThan,
                Expression::accessor("count"),
                Expression::constant(3),
            ),
        ]);
        assert_eq!(a, b);

        let c = Expression::and(vec![
            Expression::accessor("user.name"),
            Expression::compare(
                ComparisonOperator::LessThan,
                Expression::accessor("count"),
                Expression::constant(4),
            ),
        ]);
        assert_ne!(a, c);
    }

    #[test]
    fn test_substitute_variable_rewrites_accessors() {
        let expression = Expression::call("has", vec![Expression::accessor("x")]);
        let (substituted, changed) = expression.substitute_variable("x", "foo");
        assert!(changed);
        assert_eq!(
            substituted,
            Expression::call("has", vec![Expression::accessor("foo")])
        );
    }

    #[test]
    fn test_substitute_variable_reports_no_change() {
        let expression = Expression::call("has", vec![Expression::accessor("y")]);
        let (substituted, changed) = expression.substitute_variable("x", "foo");
        assert!(!changed);
        assert_eq!(substituted, expression);
    }

    #[test]
    fn test_complement_round_trips() {
        for op in [
            ComparisonOperator::LessThan,
            ComparisonOperator::LessThanOrEqual,
            ComparisonOperator::Equal,
            ComparisonOperator::NotEqual,
            ComparisonOperator::GreaterThanOrEqual,
            ComparisonOperator::GreaterThan,
        ] {
            assert_eq!(op.complement().complement(), op);
        }
    }

    #[test]
    fn test_marker_predicates() {
        let ignored = Expression::ignore(Expression::accessor("counter"));
        assert!(ignored.is_ignore());
        assert!(!ignored.is_optional());
        assert_eq!(
            ignored.marker_argument(),
            Some(&Expression::accessor("counter"))
        );

        let plain = Expression::accessor("counter");
        assert!(plain.marker_argument().is_none());
    }

    #[test]
    fn test_display_is_infix() {
        let expression = Expression::or(vec![
            Expression::and(vec![
                Expression::accessor("a"),
                Expression::not(Expression::accessor("b")),
            ]),
            Expression::compare(
                ComparisonOperator::GreaterThanOrEqual,
                Expression::accessor("n"),
                Expression::constant(10),
            ),
        ]);
        assert_eq!(expression.to_string(), "((a && !b) || n >= 10)");
    }
}
