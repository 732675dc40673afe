//! Nodes of the specialization DAG
//!
//! Each node pairs one clause with the triggers anchored at it and the nodes
//! that specialize it. The DAG is stored as an arena owned by the tree:
//! nodes are addressed by [`NodeId`] and children are id lists, so the
//! reparenting that insertion performs is an index splice rather than a deep
//! copy, and a node reached through several parents is still one node.
//!
//! Insertion walks the whole graph: adding `B` may encounter `A` whose
//! specialization `A && B` relates to `B` even though `A` itself does not,
//! so incomparable nodes still recurse into their children. A per-call
//! operations map keeps the walk from visiting a shared node twice.

use crate::clause::Clause;
use crate::expression::{Evaluator, Expression};
use crate::relationship::Relationship;
use crate::tree::TriggerTree;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use tracing::trace;

/// Index of a node in its tree's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub(crate) usize);

/// Index of a trigger in its tree's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TriggerId(pub(crate) usize);

/// One vertex of the specialization DAG.
#[derive(Debug)]
pub struct Node {
    pub(crate) clause: Clause,
    pub(crate) expression: Expression,
    pub(crate) specializations: Vec<NodeId>,
    pub(crate) triggers: Vec<TriggerId>,
    pub(crate) all_triggers: Vec<TriggerId>,
}

impl Node {
    pub(crate) fn new(clause: Clause, trigger: Option<TriggerId>) -> Self {
        let expression = clause.to_expression();
        let (triggers, all_triggers) = match trigger {
            Some(trigger) => (vec![trigger], vec![trigger]),
            None => (Vec::new(), Vec::new()),
        };
        Node {
            clause,
            expression,
            specializations: Vec::new(),
            triggers,
            all_triggers,
        }
    }

    /// The clause this node represents.
    pub fn clause(&self) -> &Clause {
        &self.clause
    }

    /// The evaluable expression derived from the clause: its non-ignore
    /// predicates conjoined, or the literal `true` for the root.
    pub fn expression(&self) -> &Expression {
        &self.expression
    }

    /// Nodes whose clause specializes this node's clause.
    pub fn specializations(&self) -> &[NodeId] {
        &self.specializations
    }

    /// The most specific triggers anchored at this clause, pairwise
    /// incomparable.
    pub fn triggers(&self) -> &[TriggerId] {
        &self.triggers
    }

    /// Every trigger whose clause set reaches this clause, including ones a
    /// more specific trigger shadows in [`Node::triggers`].
    pub fn all_triggers(&self) -> &[TriggerId] {
        &self.all_triggers
    }
}

/// Outcome of one insertion step, memoized per node per insertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Operation {
    None,
    Found,
    Added,
    Inserted,
}

impl<A: PartialEq> TriggerTree<A> {
    /// Merge `new_node` into the subgraph rooted at `root`. Returns whether
    /// the trigger carried by `new_node` ended up newly represented.
    pub(crate) fn insert_node(&mut self, root: NodeId, new_node: NodeId) -> bool {
        let mut ops = HashMap::new();
        self.add_node(root, new_node, &mut ops) == Operation::Added
    }

    fn add_node(
        &mut self,
        current: NodeId,
        new_node: NodeId,
        ops: &mut HashMap<NodeId, Operation>,
    ) -> Operation {
        if let Some(&op) = ops.get(&current) {
            return op;
        }

        let trigger = self.node(new_node).triggers[0];
        let relationship = self.node_relationship(current, new_node);
        trace!(?current, ?new_node, %relationship, "insertion step");

        let op = match relationship {
            Relationship::Equal => self.merge_trigger(current, trigger),
            Relationship::Incomparable => {
                // The new node may still relate to something deeper.
                let children = self.node(current).specializations.clone();
                for child in children {
                    self.add_node(child, new_node, ops);
                }
                Operation::None
            }
            Relationship::Specializes => {
                // The existing node belongs below the new one; the caller
                // reparents it.
                self.add_specialization(new_node, current);
                Operation::Inserted
            }
            Relationship::Generalizes => {
                let mut op = Operation::None;
                let mut found_one = false;
                let mut removals = Vec::new();
                let children = self.node(current).specializations.clone();
                for child in children {
                    let child_op = self.add_node(child, new_node, ops);
                    if child_op != Operation::None {
                        found_one = true;
                        if child_op == Operation::Inserted {
                            removals.push(child);
                            op = Operation::Added;
                        } else {
                            op = child_op;
                        }
                    }
                }

                if !removals.is_empty() {
                    let node = self.node_mut(current);
                    node.specializations.retain(|child| !removals.contains(child));
                    node.specializations.push(new_node);
                    self.check_invariants(current);
                }
                if !found_one {
                    self.node_mut(current).specializations.push(new_node);
                    self.check_invariants(current);
                    op = Operation::Added;
                }
                op
            }
        };

        ops.insert(current, op);
        op
    }

    /// Fold `trigger` into a node whose clause equals the trigger's clause.
    fn merge_trigger(&mut self, current: NodeId, trigger: TriggerId) -> Operation {
        // A trigger with the same action at the same clause is a duplicate.
        let duplicate = self.node(current).all_triggers.iter().any(|&existing| {
            self.trigger(existing).action() == self.trigger(trigger).action()
        });
        if duplicate {
            return Operation::Found;
        }

        self.node_mut(current).all_triggers.push(trigger);

        // Keep `triggers` the minimal set of mutually incomparable, maximally
        // specific triggers at this clause.
        let mut add = true;
        let mut i = 0;
        while i < self.node(current).triggers.len() {
            let existing = self.node(current).triggers[i];
            match self.trigger_relationship(trigger, existing) {
                Relationship::Generalizes => {
                    add = false;
                    break;
                }
                Relationship::Specializes => {
                    self.node_mut(current).triggers.remove(i);
                }
                _ => i += 1,
            }
        }
        if add {
            self.node_mut(current).triggers.push(trigger);
        }
        self.check_invariants(current);
        Operation::Added
    }

    /// Attach `candidate` below `parent`, reconciling it against the existing
    /// children one level down.
    fn add_specialization(&mut self, parent: NodeId, candidate: NodeId) -> bool {
        let mut removals = Vec::new();
        let children = self.node(parent).specializations.clone();
        for child in children {
            match self.node_relationship(candidate, child) {
                // Already present.
                Relationship::Equal => return false,
                Relationship::Generalizes => removals.push(child),
                // Something more specific already covers the candidate.
                Relationship::Specializes => return false,
                Relationship::Incomparable => {}
            }
        }

        for removal in removals {
            self.node_mut(parent)
                .specializations
                .retain(|child| *child != removal);
            // The candidate adopts the child it generalizes.
            self.add_specialization(candidate, removal);
        }
        self.node_mut(parent).specializations.push(candidate);
        trace!(?parent, ?candidate, "attached specialization");
        self.check_invariants(parent);
        true
    }

    /// Detach `trigger` everywhere below `node`, promoting shadowed triggers
    /// and pruning nodes left without any.
    pub(crate) fn detach_trigger(
        &mut self,
        node: NodeId,
        trigger: TriggerId,
        visited: &mut HashSet<NodeId>,
        removed: &mut bool,
    ) {
        if !visited.insert(node) {
            return;
        }

        let held = {
            let entry = self.node_mut(node);
            let before = entry.all_triggers.len();
            entry.all_triggers.retain(|t| *t != trigger);
            before != entry.all_triggers.len()
        };
        if held {
            *removed = true;
            let was_most_specific = {
                let entry = self.node_mut(node);
                let before = entry.triggers.len();
                entry.triggers.retain(|t| *t != trigger);
                before != entry.triggers.len()
            };
            if was_most_specific {
                // Promote previously shadowed triggers that no remaining
                // most-specific entry covers.
                let candidates = self.node(node).all_triggers.clone();
                for candidate in candidates {
                    let covered = self.node(node).triggers.iter().any(|&existing| {
                        matches!(
                            self.trigger_relationship(candidate, existing),
                            Relationship::Equal | Relationship::Generalizes
                        )
                    });
                    if !covered {
                        self.node_mut(node).triggers.push(candidate);
                    }
                }
            }
        }

        let children = self.node(node).specializations.clone();
        let mut empty_children = Vec::new();
        for child in children {
            self.detach_trigger(child, trigger, visited, removed);
            if self.node(child).triggers.is_empty() {
                empty_children.push(child);
            }
        }

        for child in empty_children {
            self.node_mut(node)
                .specializations
                .retain(|c| *c != child);
            // Hoist orphaned specializations unless a remaining child
            // already generalizes them.
            let grandchildren = self.node(child).specializations.clone();
            for grandchild in grandchildren {
                let covered = self
                    .node(node)
                    .specializations
                    .iter()
                    .any(|&parent| {
                        self.node_relationship(parent, grandchild) == Relationship::Generalizes
                    });
                if !covered {
                    self.node_mut(node).specializations.push(grandchild);
                }
            }
            self.check_invariants(node);
        }
    }

    /// Depth-first match below `node`, memoized per call.
    ///
    /// Children are tried first; a matching child suppresses this node but
    /// still reports found so ancestors suppress themselves too. An
    /// evaluation error is a non-match, never a failure of the whole walk.
    pub(crate) fn match_node(
        &self,
        node: NodeId,
        state: &Value,
        evaluator: &dyn Evaluator,
        matches: &mut Vec<NodeId>,
        matched: &mut HashMap<NodeId, bool>,
    ) -> bool {
        if let Some(&found) = matched.get(&node) {
            return found;
        }

        let mut found = false;
        for &child in &self.node(node).specializations {
            if self.match_node(child, state, evaluator, matches, matched) {
                found = true;
            }
        }

        if !found {
            match evaluator.evaluate(&self.node(node).expression, state) {
                Ok(true) if !self.node(node).triggers.is_empty() => {
                    matches.push(node);
                    found = true;
                }
                Ok(_) => {}
                Err(error) => {
                    trace!(%error, ?node, "evaluation failed; treating as non-match");
                }
            }
        }

        matched.insert(node, found);
        found
    }
}
