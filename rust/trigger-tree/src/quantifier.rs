//! Quantifier expansion
//!
//! A quantifier names a variable and the concrete bindings it may take.
//! During trigger construction each quantifier rewrites the clause list
//! produced so far: `all` duplicates predicates across every binding inside
//! one clause, `any` fans a clause out into one clause per binding. The
//! expansion is purely textual; the tree stores only the resulting
//! clauses, never the quantifier itself.

use crate::clause::Clause;
use serde::{Deserialize, Serialize};

/// How a quantified variable is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuantifierKind {
    /// Every binding must hold: predicates are duplicated per binding within
    /// the clause.
    All,
    /// Some binding must hold: the clause fans out into one clause per
    /// binding, each recording its choice.
    Any,
}

/// A quantified variable and its candidate bindings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quantifier {
    /// The variable name substituted into predicates.
    pub variable: String,
    /// Universal or existential interpretation.
    pub kind: QuantifierKind,
    /// The concrete values the variable ranges over, in order.
    pub bindings: Vec<String>,
}

impl Quantifier {
    /// A universal quantifier over `bindings`.
    pub fn all(variable: impl Into<String>, bindings: Vec<String>) -> Self {
        Quantifier {
            variable: variable.into(),
            kind: QuantifierKind::All,
            bindings,
        }
    }

    /// An existential quantifier over `bindings`.
    pub fn any(variable: impl Into<String>, bindings: Vec<String>) -> Self {
        Quantifier {
            variable: variable.into(),
            kind: QuantifierKind::Any,
            bindings,
        }
    }
}

/// Expand one clause under one quantifier.
pub(crate) fn expand_clause(quantifier: &Quantifier, clause: &Clause) -> Vec<Clause> {
    match quantifier.kind {
        QuantifierKind::All => vec![expand_all(quantifier, clause)],
        QuantifierKind::Any => expand_any(quantifier, clause),
    }
}

fn expand_all(quantifier: &Quantifier, clause: &Clause) -> Clause {
    let mut predicates = Vec::new();
    if !quantifier.bindings.is_empty() {
        for predicate in clause.predicates() {
            for binding in &quantifier.bindings {
                let (substituted, changed) =
                    predicate.substitute_variable(&quantifier.variable, binding);
                predicates.push(substituted);
                if !changed {
                    // The predicate does not reference the variable; further
                    // bindings would only repeat it.
                    break;
                }
            }
        }
    } else {
        // An empty domain is vacuously true: drop every predicate that
        // references the variable, keep the rest.
        for predicate in clause.predicates() {
            let (_, changed) = predicate.substitute_variable(&quantifier.variable, "");
            if !changed {
                predicates.push(predicate.clone());
            }
        }
    }
    Clause::new(predicates)
}

fn expand_any(quantifier: &Quantifier, clause: &Clause) -> Vec<Clause> {
    let mut clauses = Vec::new();
    if !quantifier.bindings.is_empty() {
        for binding in &quantifier.bindings {
            let mut changed = false;
            let mut predicates = Vec::with_capacity(clause.predicates().len());
            for predicate in clause.predicates() {
                let (substituted, predicate_changed) =
                    predicate.substitute_variable(&quantifier.variable, binding);
                changed = changed || predicate_changed;
                predicates.push(substituted);
            }

            let mut any_bindings = clause.any_bindings().clone();
            if changed {
                any_bindings.insert(quantifier.variable.clone(), binding.clone());
            }
            clauses.push(Clause::with_bindings(predicates, any_bindings));

            if !changed {
                // Nothing depends on the variable; every further binding
                // would produce the same clause.
                break;
            }
        }
    } else {
        // An `any` over an empty domain is false: the clause survives only
        // when nothing references the variable.
        let referenced = clause
            .predicates()
            .iter()
            .any(|predicate| predicate.substitute_variable(&quantifier.variable, "").1);
        if !referenced {
            clauses.push(clause.clone());
        }
    }
    clauses
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::Expression;

    fn has(name: &str) -> Expression {
        Expression::call("has", vec![Expression::accessor(name)])
    }

    #[test]
    fn test_all_duplicates_predicates_per_binding() {
        let quantifier = Quantifier::all("x", vec!["foo".into(), "bar".into()]);
        let clause = Clause::new(vec![has("x")]);
        let expanded = expand_clause(&quantifier, &clause);
        assert_eq!(expanded.len(), 1);
        assert_eq!(expanded[0].predicates(), &[has("foo"), has("bar")]);
        assert!(expanded[0].any_bindings().is_empty());
    }

    #[test]
    fn test_all_stops_after_unchanged_substitution() {
        let quantifier = Quantifier::all("x", vec!["foo".into(), "bar".into()]);
        let clause = Clause::new(vec![has("y")]);
        let expanded = expand_clause(&quantifier, &clause);
        assert_eq!(expanded.len(), 1);
        // The unrelated predicate appears once, not once per binding.
        assert_eq!(expanded[0].predicates(), &[has("y")]);
    }

    #[test]
    fn test_all_with_empty_domain_drops_referencing_predicates() {
        let quantifier = Quantifier::all("x", Vec::new());
        let clause = Clause::new(vec![has("x"), has("y")]);
        let expanded = expand_clause(&quantifier, &clause);
        assert_eq!(expanded.len(), 1);
        assert_eq!(expanded[0].predicates(), &[has("y")]);
    }

    #[test]
    fn test_any_fans_out_and_records_bindings() {
        let quantifier = Quantifier::any("x", vec!["foo".into(), "bar".into()]);
        let clause = Clause::new(vec![has("x")]);
        let expanded = expand_clause(&quantifier, &clause);
        assert_eq!(expanded.len(), 2);
        assert_eq!(expanded[0].predicates(), &[has("foo")]);
        assert_eq!(expanded[0].any_bindings().get("x"), Some(&"foo".to_string()));
        assert_eq!(expanded[1].predicates(), &[has("bar")]);
        assert_eq!(expanded[1].any_bindings().get("x"), Some(&"bar".to_string()));
    }

    #[test]
    fn test_any_stops_after_unchanged_clause() {
        let quantifier = Quantifier::any("x", vec!["foo".into(), "bar".into()]);
        let clause = Clause::new(vec![has("y")]);
        let expanded = expand_clause(&quantifier, &clause);
        assert_eq!(expanded.len(), 1);
        assert_eq!(expanded[0].predicates(), &[has("y")]);
        // No binding is recorded when nothing was substituted.
        assert!(expanded[0].any_bindings().is_empty());
    }

    #[test]
    fn test_any_with_empty_domain_drops_referencing_clause() {
        let quantifier = Quantifier::any("x", Vec::new());
        let referencing = Clause::new(vec![has("x")]);
        assert!(expand_clause(&quantifier, &referencing).is_empty());

        let unrelated = Clause::new(vec![has("y")]);
        let expanded = expand_clause(&quantifier, &unrelated);
        assert_eq!(expanded.len(), 1);
        assert_eq!(expanded[0].predicates(), &[has("y")]);
    }

    #[test]
    fn test_sequential_quantifiers_compose() {
        let clause = Clause::new(vec![
            Expression::call("has", vec![Expression::accessor("x")]),
            Expression::call("near", vec![Expression::accessor("y")]),
        ]);
        let any = Quantifier::any("x", vec!["foo".into(), "bar".into()]);
        let all = Quantifier::all("y", vec!["home".into(), "work".into()]);

        let after_any: Vec<Clause> = expand_clause(&any, &clause);
        let after_both: Vec<Clause> = after_any
            .iter()
            .flat_map(|clause| expand_clause(&all, clause))
            .collect();

        assert_eq!(after_both.len(), 2);
        for clause in &after_both {
            // `near` was duplicated per `all` binding, `has` bound per `any`.
            assert_eq!(clause.predicates().len(), 3);
        }
        // The `all` expansion rebuilds clauses without any-bindings, mirroring
        // sequential application semantics.
        assert!(after_both.iter().all(|c| c.any_bindings().is_empty()));
    }
}
