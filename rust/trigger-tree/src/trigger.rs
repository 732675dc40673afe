//! Triggers: a condition expression paired with an action
//!
//! Construction compiles the source expression down to clauses: negation is
//! pushed to the leaves, the result is expanded into disjunctive normal form,
//! duplicates are removed, registered optimizers rewrite each clause,
//! quantifiers fan the clauses out over their bindings, and finally clauses
//! that another clause of the same trigger already covers are marked
//! subsumed. The action is opaque to the engine; only equality over it is
//! ever used.

use crate::clause::Clause;
use crate::compare::ComparerRegistry;
use crate::expression::Expression;
use crate::normal::{generate_clauses, push_down_not};
use crate::optimize::ClauseOptimizer;
use crate::quantifier::{expand_clause, Quantifier};
use crate::relationship::Relationship;
use std::fmt;

/// A trigger: the original condition, its opaque action, and the clauses the
/// condition compiled to.
#[derive(Debug, Clone)]
pub struct Trigger<A> {
    expression: Expression,
    action: A,
    clauses: Vec<Clause>,
}

impl<A> Trigger<A> {
    pub(crate) fn new(
        expression: Expression,
        action: A,
        quantifiers: &[Quantifier],
        comparers: &ComparerRegistry,
        optimizers: &[Box<dyn ClauseOptimizer>],
    ) -> Self {
        let normal_form = push_down_not(&expression, false);
        let mut clauses = generate_clauses(&normal_form);
        for clause in &mut clauses {
            clause.remove_duplicates();
        }

        let mut optimized = Vec::with_capacity(clauses.len());
        'next_clause: for mut clause in clauses {
            for optimizer in optimizers {
                match optimizer.optimize(clause) {
                    Some(rewritten) => clause = rewritten,
                    // Provably false; drop the clause.
                    None => continue 'next_clause,
                }
            }
            optimized.push(clause);
        }
        let mut clauses = optimized;

        for quantifier in quantifiers {
            clauses = clauses
                .iter()
                .flat_map(|clause| expand_clause(quantifier, clause))
                .collect();
        }
        for clause in &mut clauses {
            clause.remove_duplicates();
        }
        mark_subsumed(&mut clauses, comparers);

        Trigger {
            expression,
            action,
            clauses,
        }
    }

    /// The expression the trigger was registered with.
    pub fn expression(&self) -> &Expression {
        &self.expression
    }

    /// The action attached to the trigger.
    pub fn action(&self) -> &A {
        &self.action
    }

    /// The compiled clauses, subsumed ones included (flagged).
    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    /// Relationship of this trigger relative to `other`, derived from their
    /// non-subsumed clause sets.
    ///
    /// `Equal` means the clause sets cover each other in both directions.
    /// `Specializes` requires the forward direction to hold with at least one
    /// strictly specialized clause while the backward direction does not
    /// hold. A trigger whose clauses are merely a subset of another's (an OR
    /// dropped a branch) stays `Incomparable`, because a disjunction is a
    /// shortcut for independent rules, not a generalization of each of them.
    pub fn relationship(&self, other: &Trigger<A>, comparers: &ComparerRegistry) -> Relationship {
        let forward = directional(self, other, comparers);
        let backward = directional(other, self, comparers);
        match (forward, backward) {
            (Relationship::Equal, Relationship::Equal) => Relationship::Equal,
            (Relationship::Specializes, Relationship::Specializes) => Relationship::Incomparable,
            (Relationship::Specializes, _) => Relationship::Specializes,
            (_, Relationship::Specializes) => Relationship::Generalizes,
            _ => Relationship::Incomparable,
        }
    }
}

/// How `trigger`'s non-subsumed clauses sit inside `other`'s: `Equal` when
/// every clause finds an equal counterpart, `Specializes` when every clause
/// finds an equal-or-more-general counterpart and at least one is strict,
/// `Incomparable` otherwise.
fn directional<A>(
    trigger: &Trigger<A>,
    other: &Trigger<A>,
    comparers: &ComparerRegistry,
) -> Relationship {
    let mut so_far = Relationship::Incomparable;
    for clause in trigger.clauses.iter().filter(|c| !c.subsumed()) {
        let mut clause_so_far = Relationship::Incomparable;
        for second in other.clauses.iter().filter(|c| !c.subsumed()) {
            let relationship = clause.relationship(second, comparers);
            if relationship == Relationship::Equal || relationship == Relationship::Specializes {
                clause_so_far = relationship;
                break;
            }
        }

        match clause_so_far {
            // Some clause has no covering counterpart.
            Relationship::Incomparable | Relationship::Generalizes => {
                return Relationship::Incomparable;
            }
            Relationship::Equal => {
                if so_far == Relationship::Incomparable {
                    so_far = Relationship::Equal;
                }
            }
            Relationship::Specializes => so_far = Relationship::Specializes,
        }
    }
    so_far
}

/// Remove clauses equal to an earlier one and flag clauses that another
/// clause of the same trigger strictly covers.
fn mark_subsumed(clauses: &mut Vec<Clause>, comparers: &ComparerRegistry) {
    let mut i = 0;
    while i < clauses.len() {
        if !clauses[i].subsumed() {
            let mut j = i + 1;
            while j < clauses.len() {
                if clauses[j].subsumed() {
                    j += 1;
                    continue;
                }
                let relationship = clauses[i].relationship(&clauses[j], comparers);
                if relationship == Relationship::Equal {
                    clauses.remove(j);
                    continue;
                }
                if relationship == Relationship::Specializes {
                    clauses[i].set_subsumed();
                    break;
                }
                if relationship == Relationship::Generalizes {
                    clauses[j].set_subsumed();
                }
                j += 1;
            }
        }
        i += 1;
    }
}

impl<A> fmt::Display for Trigger<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.clauses.is_empty() {
            return write!(f, "<empty>");
        }
        for (i, clause) in self.clauses.iter().enumerate() {
            if i > 0 {
                write!(f, " || ")?;
            }
            write!(f, "{clause}")?;
        }
        Ok(())
    }
}
