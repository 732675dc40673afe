//! Clauses: conjunctions of predicates with quantifier bindings
//!
//! A clause is one disjunct of a trigger's normal form: an AND of predicate
//! expressions, together with the `any`-quantifier bindings that produced it
//! and a flag marking it redundant within its own trigger. Clause-to-clause
//! relationship is the heart of the engine; everything the DAG does reduces
//! to it.

use crate::compare::ComparerRegistry;
use crate::expression::Expression;
use crate::relationship::Relationship;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A conjunction of predicate expressions.
///
/// Predicate order is preserved for display but carries no meaning; the
/// predicates of a clause are pairwise distinct under structural equality
/// once construction finishes.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Clause {
    pub(crate) predicates: Vec<Expression>,
    pub(crate) any_bindings: IndexMap<String, String>,
    pub(crate) subsumed: bool,
}

impl Clause {
    /// A clause over the given predicates, with no bindings.
    pub fn new(predicates: Vec<Expression>) -> Self {
        Clause {
            predicates,
            any_bindings: IndexMap::new(),
            subsumed: false,
        }
    }

    pub(crate) fn with_bindings(
        predicates: Vec<Expression>,
        any_bindings: IndexMap<String, String>,
    ) -> Self {
        Clause {
            predicates,
            any_bindings,
            subsumed: false,
        }
    }

    /// The conjoined predicates, in insertion order.
    pub fn predicates(&self) -> &[Expression] {
        &self.predicates
    }

    /// Replace the conjoined predicates; used by clause optimizers.
    pub fn set_predicates(&mut self, predicates: Vec<Expression>) {
        self.predicates = predicates;
    }

    /// The `any`-quantifier bindings this clause was expanded with.
    pub fn any_bindings(&self) -> &IndexMap<String, String> {
        &self.any_bindings
    }

    /// Record an `any`-quantifier binding on the clause.
    pub fn bind(mut self, variable: impl Into<String>, binding: impl Into<String>) -> Self {
        self.any_bindings.insert(variable.into(), binding.into());
        self
    }

    /// Whether another clause of the same trigger already covers this one.
    pub fn subsumed(&self) -> bool {
        self.subsumed
    }

    pub(crate) fn set_subsumed(&mut self) {
        self.subsumed = true;
    }

    /// Drop later predicates that are structurally equal to an earlier one.
    pub(crate) fn remove_duplicates(&mut self) {
        let mut distinct: Vec<Expression> = Vec::with_capacity(self.predicates.len());
        for predicate in self.predicates.drain(..) {
            if !distinct.contains(&predicate) {
                distinct.push(predicate);
            }
        }
        self.predicates = distinct;
    }

    /// Number of predicates that participate in specialization ordering.
    pub(crate) fn predicate_count(&self) -> usize {
        self.predicates.iter().filter(|p| !p.is_ignore()).count()
    }

    /// The evaluable form of this clause: the conjunction of its non-ignore
    /// predicates, or the literal `true` when none remain.
    pub fn to_expression(&self) -> Expression {
        let mut predicates: Vec<Expression> = self
            .predicates
            .iter()
            .filter(|p| !p.is_ignore())
            .cloned()
            .collect();
        if predicates.is_empty() {
            Expression::truth(true)
        } else if predicates.len() == 1 {
            predicates.remove(0)
        } else {
            Expression::And(predicates)
        }
    }

    /// Relationship of this clause relative to `other`.
    ///
    /// The shorter clause (fewer non-ignore predicates, ties to `self`) is
    /// scanned against the longer one predicate by predicate; registered
    /// comparers refine same-kind pairs beyond structural equality. The
    /// accumulated result is then reconciled with the two clauses' quantifier
    /// bindings and ignore-predicate sets, and re-oriented if the operands
    /// were swapped.
    pub fn relationship(&self, other: &Clause, comparers: &ComparerRegistry) -> Relationship {
        let mut so_far = Relationship::Incomparable;
        let mut shorter = self;
        let mut longer = other;
        let mut shorter_count = shorter.predicate_count();
        let mut longer_count = longer.predicate_count();
        let mut swapped = false;
        if longer_count < shorter_count {
            std::mem::swap(&mut shorter, &mut longer);
            std::mem::swap(&mut shorter_count, &mut longer_count);
            swapped = true;
        }

        if shorter_count == 0 {
            so_far = if longer_count == 0 {
                Relationship::Equal
            } else {
                Relationship::Generalizes
            };
        } else {
            // If every predicate of shorter is equal to or more general than
            // one in longer, shorter covers a superset of longer's states.
            for short_predicate in shorter.predicates.iter().filter(|p| !p.is_ignore()) {
                let mut shorter_rel = Relationship::Incomparable;
                for long_predicate in &longer.predicates {
                    shorter_rel = predicate_relationship(short_predicate, long_predicate, comparers);
                    if shorter_rel != Relationship::Incomparable {
                        break;
                    }
                }

                if shorter_rel == Relationship::Incomparable {
                    // A predicate with no counterpart settles it.
                    so_far = Relationship::Incomparable;
                    break;
                }

                if so_far == Relationship::Incomparable {
                    so_far = shorter_rel;
                } else if so_far == Relationship::Equal {
                    match shorter_rel {
                        Relationship::Equal => {}
                        Relationship::Generalizes => so_far = Relationship::Generalizes,
                        Relationship::Specializes if shorter_count == longer_count => {
                            so_far = Relationship::Specializes;
                        }
                        _ => {
                            so_far = Relationship::Incomparable;
                            break;
                        }
                    }
                } else if shorter_rel != so_far {
                    // Mixed orderings cannot be reconciled.
                    so_far = Relationship::Incomparable;
                    break;
                }
            }

            if shorter_count != longer_count {
                so_far = match so_far {
                    Relationship::Equal | Relationship::Generalizes => Relationship::Generalizes,
                    _ => Relationship::Incomparable,
                };
            }

            so_far = bindings_relationship(so_far, shorter, longer);
        }

        so_far = ignore_relationship(so_far, shorter, longer);
        so_far.swap_if(swapped)
    }
}

/// Relationship between two individual predicates.
///
/// A single layer of `!` is stripped from both sides before the kind match,
/// so negated atomic predicates still reach their comparer. Without a
/// comparer the only answers are Equal and Incomparable.
fn predicate_relationship(
    expression: &Expression,
    other: &Expression,
    comparers: &ComparerRegistry,
) -> Relationship {
    let (root, root_other) = match (expression, other) {
        (Expression::Not(inner), Expression::Not(inner_other)) => {
            (inner.as_ref(), inner_other.as_ref())
        }
        _ => (expression, other),
    };

    if root.kind() == root_other.kind() {
        if let Some(comparer) = comparers.get(root.kind()) {
            return comparer.relationship(root, root_other);
        }
    }

    if expression == other {
        Relationship::Equal
    } else {
        Relationship::Incomparable
    }
}

/// Reconcile an Equal predicate result with the two clauses' binding maps.
fn bindings_relationship(
    so_far: Relationship,
    shorter: &Clause,
    longer: &Clause,
) -> Relationship {
    if so_far != Relationship::Equal {
        return so_far;
    }

    let mut sub = &shorter.any_bindings;
    let mut sup = &longer.any_bindings;
    let mut swapped = false;
    if sub.len() > sup.len() {
        std::mem::swap(&mut sub, &mut sup);
        swapped = true;
    }

    for (variable, binding) in sub {
        match sup.get(variable) {
            Some(found) if found == binding => {}
            // A conflicting or missing binding makes the clauses unrelated.
            _ => return Relationship::Incomparable,
        }
    }

    let result = if sub.len() < sup.len() {
        // The side with fewer bindings constrains less.
        Relationship::Generalizes
    } else {
        Relationship::Equal
    };
    result.swap_if(swapped)
}

/// Reconcile an Equal result with the two clauses' ignore-predicate sets.
fn ignore_relationship(so_far: Relationship, shorter: &Clause, longer: &Clause) -> Relationship {
    if so_far != Relationship::Equal {
        return so_far;
    }

    let short_ignores: Vec<&Expression> =
        shorter.predicates.iter().filter(|p| p.is_ignore()).collect();
    let long_ignores: Vec<&Expression> =
        longer.predicates.iter().filter(|p| p.is_ignore()).collect();
    let (sub, sup) = if short_ignores.len() <= long_ignores.len() {
        (&short_ignores, &long_ignores)
    } else {
        (&long_ignores, &short_ignores)
    };

    for predicate in sub {
        if !sup.iter().any(|candidate| candidate == predicate) {
            return Relationship::Incomparable;
        }
    }

    if shorter.predicates.is_empty() && !longer.predicates.is_empty() {
        // An empty clause is more general than an ignore-only one.
        Relationship::Generalizes
    } else if longer.predicates.is_empty() && !shorter.predicates.is_empty() {
        Relationship::Specializes
    } else if short_ignores.len() != long_ignores.len() {
        Relationship::Incomparable
    } else {
        Relationship::Equal
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.subsumed {
            write!(f, "*")?;
        }
        write!(f, "(")?;
        for (i, predicate) in self.predicates.iter().enumerate() {
            if i > 0 {
                write!(f, " && ")?;
            }
            write!(f, "{predicate}")?;
        }
        write!(f, ")")?;
        for (variable, binding) in &self.any_bindings {
            write!(f, " {variable}->{binding}")?;
        }
        Ok(())
    }
}
