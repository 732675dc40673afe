//! The trigger tree façade
//!
//! A trigger tree organizes triggers into a DAG ordered by logical
//! specialization so that matching returns only the most specific triggers
//! that apply: registering `a` and `a && b` and matching a state satisfying
//! both returns just the second, without the first having to be rewritten as
//! `a && !b`.
//!
//! Disjunctions and quantifier fan-out do not change how the DAG is built
//! (it contains one node per conjunction), but they do shape which triggers
//! a node reports. An OR is treated as the author's shortcut for independent
//! rules: each branch competes on its own, and the trigger stays live on
//! branches no other trigger covers.
//!
//! The tree is single-threaded by design: mutation and matching are
//! synchronous in-memory graph walks, and callers serialize concurrent use.

use crate::clause::Clause;
use crate::compare::{ComparerRegistry, PredicateComparer};
use crate::error::ParseError;
use crate::expression::{Evaluator, Expression, ExpressionParser};
use crate::node::{Node, NodeId, TriggerId};
use crate::optimize::ClauseOptimizer;
use crate::quantifier::Quantifier;
use crate::relationship::Relationship;
use crate::trigger::Trigger;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::fmt::{self, Write as _};
use tracing::debug;

/// A DAG of triggers ordered by specialization, with the registries that
/// refine how clauses compare.
pub struct TriggerTree<A> {
    pub(crate) nodes: Vec<Node>,
    pub(crate) triggers: Vec<Trigger<A>>,
    pub(crate) comparers: ComparerRegistry,
    optimizers: Vec<Box<dyn ClauseOptimizer>>,
    root: NodeId,
    total_triggers: usize,
    strict: bool,
}

impl<A: PartialEq> TriggerTree<A> {
    /// An empty tree. The root holds the empty clause, which generalizes
    /// everything and evaluates to `true`.
    pub fn new() -> Self {
        TriggerTree {
            nodes: vec![Node::new(Clause::default(), None)],
            triggers: Vec::new(),
            comparers: ComparerRegistry::new(),
            optimizers: Vec::new(),
            root: NodeId(0),
            total_triggers: 0,
            strict: false,
        }
    }

    /// Register a comparer for the given predicate kind.
    ///
    /// Kinds without a comparer fall back to structural equality, which can
    /// only answer Equal or Incomparable.
    pub fn add_comparer(
        &mut self,
        kind: impl Into<String>,
        comparer: impl PredicateComparer + 'static,
    ) {
        self.comparers.insert(kind.into(), Box::new(comparer));
    }

    /// Append a clause-rewrite pass applied to every clause of every
    /// subsequently added trigger.
    pub fn add_optimizer(&mut self, optimizer: impl ClauseOptimizer + 'static) {
        self.optimizers.push(Box::new(optimizer));
    }

    /// Re-verify tree invariants after every mutation (debug builds only).
    pub fn set_strict(&mut self, strict: bool) {
        self.strict = strict;
    }

    /// Compile `expression` into a trigger and merge its clauses into the
    /// DAG. Quantifiers expand the clauses in order before insertion.
    pub fn add_trigger(
        &mut self,
        expression: Expression,
        action: A,
        quantifiers: &[Quantifier],
    ) -> TriggerId {
        let trigger = Trigger::new(
            expression,
            action,
            quantifiers,
            &self.comparers,
            &self.optimizers,
        );
        let clauses: Vec<Clause> = trigger
            .clauses()
            .iter()
            .filter(|clause| !clause.subsumed())
            .cloned()
            .collect();

        let trigger_id = TriggerId(self.triggers.len());
        self.triggers.push(trigger);

        let mut added = false;
        for clause in clauses {
            let node_id = NodeId(self.nodes.len());
            self.nodes.push(Node::new(clause, Some(trigger_id)));
            if self.insert_node(self.root, node_id) {
                added = true;
            }
        }
        if added {
            self.total_triggers += 1;
        }
        debug!(
            trigger = %self.triggers[trigger_id.0],
            added,
            total = self.total_triggers,
            "registered trigger"
        );
        trigger_id
    }

    /// Parse `source` with the supplied parser and register the result.
    /// A parse failure aborts before any tree mutation.
    pub fn add_trigger_text(
        &mut self,
        parser: &dyn ExpressionParser,
        source: &str,
        action: A,
        quantifiers: &[Quantifier],
    ) -> Result<TriggerId, ParseError> {
        let expression = parser.parse(source)?;
        Ok(self.add_trigger(expression, action, quantifiers))
    }

    /// Remove a trigger from the tree. Returns whether it was present.
    ///
    /// Triggers it shadowed are promoted back into the most-specific sets,
    /// and nodes left holding no triggers are pruned with their
    /// specializations hoisted to the surviving parent.
    pub fn remove_trigger(&mut self, trigger: TriggerId) -> bool {
        let mut removed = false;
        let mut visited = HashSet::new();
        self.detach_trigger(self.root, trigger, &mut visited, &mut removed);
        if removed {
            self.total_triggers -= 1;
        }
        debug!(?trigger, removed, "removed trigger");
        removed
    }

    /// The most specific matching nodes for `state`.
    ///
    /// Each returned node exposes the most specific triggers for its clause;
    /// more general nodes covered by a returned one are suppressed. A
    /// predicate that fails to evaluate makes its node a non-match without
    /// aborting the walk.
    pub fn matches(&self, state: &Value, evaluator: &dyn Evaluator) -> Vec<NodeId> {
        let mut matches = Vec::new();
        let mut matched = HashMap::new();
        self.match_node(self.root, state, evaluator, &mut matches, &mut matched);
        matches
    }

    /// The distinct triggers of [`TriggerTree::matches`], in node order.
    pub fn matching_triggers(&self, state: &Value, evaluator: &dyn Evaluator) -> Vec<&Trigger<A>> {
        let mut seen = HashSet::new();
        let mut result = Vec::new();
        for node in self.matches(state, evaluator) {
            for &trigger in self.node(node).triggers() {
                if seen.insert(trigger) {
                    result.push(self.trigger(trigger));
                }
            }
        }
        result
    }

    /// The root node id.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Look up a node by id.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    /// Look up a trigger by id.
    pub fn trigger(&self, id: TriggerId) -> &Trigger<A> {
        &self.triggers[id.0]
    }

    /// Number of triggers currently represented in the DAG.
    pub fn total_triggers(&self) -> usize {
        self.total_triggers
    }

    /// Relationship of node `a`'s clause relative to node `b`'s.
    pub fn node_relationship(&self, a: NodeId, b: NodeId) -> Relationship {
        self.node(a).clause().relationship(self.node(b).clause(), &self.comparers)
    }

    /// Relationship of trigger `a` relative to trigger `b`.
    pub fn trigger_relationship(&self, a: TriggerId, b: TriggerId) -> Relationship {
        self.trigger(a).relationship(self.trigger(b), &self.comparers)
    }

    /// Check the specialization invariants over the whole DAG, returning the
    /// first offending node.
    ///
    /// Verified per node: every child's clause specializes the node's
    /// clause; siblings are pairwise incomparable; the most-specific triggers
    /// are pairwise incomparable; every shadowed trigger is equal to or
    /// generalized by a most-specific one.
    pub fn verify(&self) -> Option<NodeId> {
        let mut visited = HashSet::new();
        self.verify_from(self.root, &mut visited)
    }

    fn verify_from(&self, node: NodeId, visited: &mut HashSet<NodeId>) -> Option<NodeId> {
        if !visited.insert(node) {
            return None;
        }
        if let Some(bad) = self.verify_node(node) {
            return Some(bad);
        }
        for &child in self.node(node).specializations() {
            if let Some(bad) = self.verify_from(child, visited) {
                return Some(bad);
            }
        }
        None
    }

    fn verify_node(&self, node: NodeId) -> Option<NodeId> {
        let children = self.node(node).specializations();
        for (i, &first) in children.iter().enumerate() {
            if self.node_relationship(node, first) != Relationship::Generalizes {
                return Some(node);
            }
            for &second in &children[i + 1..] {
                if self.node_relationship(first, second) != Relationship::Incomparable {
                    return Some(node);
                }
            }
        }

        let triggers = self.node(node).triggers();
        for (i, &first) in triggers.iter().enumerate() {
            for &second in &triggers[i + 1..] {
                if matches!(
                    self.trigger_relationship(first, second),
                    Relationship::Specializes | Relationship::Generalizes
                ) {
                    return Some(node);
                }
            }
        }

        for &shadowed in self.node(node).all_triggers() {
            let covered = triggers.iter().any(|&trigger| {
                shadowed == trigger
                    || self.trigger_relationship(shadowed, trigger) == Relationship::Generalizes
            });
            if !covered {
                return Some(node);
            }
        }
        None
    }

    pub(crate) fn check_invariants(&self, node: NodeId) {
        if self.strict {
            debug_assert!(
                self.verify_node(node).is_none(),
                "tree invariants violated at {node:?}: {}",
                self.tree_to_string()
            );
        }
    }

    /// Render the DAG as an indented listing, one node per line with its
    /// most-specific trigger count.
    pub fn tree_to_string(&self) -> String {
        let mut out = String::new();
        self.node_to_string(&mut out, self.root, 0);
        out
    }

    fn node_to_string(&self, out: &mut String, node: NodeId, indent: usize) {
        let entry = self.node(node);
        let _ = writeln!(
            out,
            "{:indent$}{} [{}]",
            "",
            entry.clause(),
            entry.triggers().len(),
        );
        for &child in entry.specializations() {
            self.node_to_string(out, child, indent + 2);
        }
    }

    /// Render the DAG in Graphviz dot form.
    pub fn to_dot(&self) -> String {
        let mut out = String::from("strict digraph TriggerTree {\n");
        let mut visited = HashSet::new();
        self.node_to_dot(&mut out, self.root, &mut visited);
        out.push_str("}\n");
        out
    }

    fn node_to_dot(&self, out: &mut String, node: NodeId, visited: &mut HashSet<NodeId>) {
        if !visited.insert(node) {
            return;
        }
        let name = dot_name(self.node(node).clause());
        for &child in self.node(node).specializations() {
            let child_name = dot_name(self.node(child).clause());
            let _ = writeln!(out, "  {name} -> {child_name}");
        }
        for &child in self.node(node).specializations() {
            self.node_to_dot(out, child, visited);
        }
    }
}

fn dot_name(clause: &Clause) -> String {
    format!("\"{}\"", clause.to_string().replace('"', "\\\""))
}

impl<A: PartialEq> Default for TriggerTree<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> fmt::Display for TriggerTree<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TriggerTree with {} triggers", self.total_triggers)
    }
}
