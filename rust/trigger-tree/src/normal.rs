//! Normal-form rewriting
//!
//! Two passes turn an arbitrary boolean trigger expression into clauses:
//! [`push_down_not`] drives every negation to the leaves with De Morgan's
//! laws, and [`generate_clauses`] expands the result into disjunctive normal
//! form, one [`Clause`] per disjunct.

use crate::clause::Clause;
use crate::expression::{Expression, IGNORE, OPTIONAL};

/// Rewrite `expression` with all negation pushed to the leaves.
///
/// `and`/`or` dualize under a pending negation and double negation cancels.
/// A negated ordered comparison rewrites to its complementary operator
/// instead of staying wrapped. Negation passes *through* the
/// `optional`/`ignore` markers onto their argument, preserving the marker.
/// Every `!` that survives wraps an atomic, non-rewritable predicate.
pub fn push_down_not(expression: &Expression, negate: bool) -> Expression {
    match expression {
        Expression::And(children) => {
            let rewritten = children
                .iter()
                .map(|child| push_down_not(child, negate))
                .collect();
            if negate {
                Expression::Or(rewritten)
            } else {
                Expression::And(rewritten)
            }
        }
        Expression::Or(children) => {
            let rewritten = children
                .iter()
                .map(|child| push_down_not(child, negate))
                .collect();
            if negate {
                Expression::And(rewritten)
            } else {
                Expression::Or(rewritten)
            }
        }
        Expression::Not(inner) => push_down_not(inner, !negate),
        Expression::Compare { op, args } if negate => Expression::Compare {
            op: op.complement(),
            args: args.clone(),
        },
        Expression::Call { name, args }
            if (name == OPTIONAL || name == IGNORE) && args.len() == 1 =>
        {
            Expression::Call {
                name: name.clone(),
                args: vec![push_down_not(&args[0], negate)],
            }
        }
        _ => {
            if negate {
                Expression::not(expression.clone())
            } else {
                expression.clone()
            }
        }
    }
}

/// Expand a normalized expression into clauses whose disjunction is
/// equivalent to it.
///
/// `or` concatenates its children's clauses; `and` takes the cross product
/// (a child producing no clauses is `false`, which annihilates the whole
/// conjunction); `optional(x)` yields the empty clause and every clause of
/// `x`; boolean literals yield the empty clause (`true`) or nothing
/// (`false`); any other leaf becomes a one-predicate clause. The clause list
/// is finite and consumed exactly once per trigger.
pub fn generate_clauses(expression: &Expression) -> Vec<Clause> {
    match expression {
        Expression::And(children) => {
            let mut so_far: Vec<Clause> = Vec::new();
            let mut first = true;
            for child in children {
                let clauses = generate_clauses(child);
                if clauses.is_empty() {
                    // Encountered false.
                    so_far.clear();
                    break;
                }
                if first {
                    so_far = clauses;
                    first = false;
                } else {
                    let mut combined = Vec::with_capacity(so_far.len() * clauses.len());
                    for old in &so_far {
                        for clause in &clauses {
                            let mut predicates = old.predicates().to_vec();
                            predicates.extend(clause.predicates().iter().cloned());
                            combined.push(Clause::new(predicates));
                        }
                    }
                    so_far = combined;
                }
            }
            so_far
        }
        Expression::Or(children) => children.iter().flat_map(generate_clauses).collect(),
        Expression::Call { name, args } if name == OPTIONAL && args.len() == 1 => {
            let mut clauses = vec![Clause::default()];
            clauses.extend(generate_clauses(&args[0]));
            clauses
        }
        _ => match expression.as_bool_constant() {
            Some(true) => vec![Clause::default()],
            Some(false) => Vec::new(),
            None => vec![Clause::new(vec![expression.clone()])],
        },
    }
}
