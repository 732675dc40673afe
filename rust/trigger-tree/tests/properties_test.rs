//! Property tests for the relationship algebra, normal-form rewriting, and
//! tree construction.

use proptest::prelude::*;
use serde_json::{json, Value};
use trigger_tree::helpers::{parse, StateEvaluator};
use trigger_tree::{
    generate_clauses, push_down_not, Clause, ComparerRegistry, ComparisonOperator, Evaluator,
    Expression, Relationship, TriggerTree,
};

const VARIABLES: usize = 3;

fn arb_expression() -> impl Strategy<Value = Expression> {
    let leaf = prop_oneof![
        4 => (0..VARIABLES).prop_map(|i| Expression::accessor(format!("p{i}"))),
        1 => Just(Expression::truth(true)),
        1 => Just(Expression::truth(false)),
    ];
    leaf.prop_recursive(3, 24, 3, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 1..4).prop_map(Expression::And),
            prop::collection::vec(inner.clone(), 1..4).prop_map(Expression::Or),
            inner.prop_map(Expression::not),
        ]
    })
}

fn assignments() -> Vec<Value> {
    (0..1usize << VARIABLES)
        .map(|bits| {
            let mut state = serde_json::Map::new();
            for i in 0..VARIABLES {
                state.insert(format!("p{i}"), Value::Bool(bits >> i & 1 == 1));
            }
            Value::Object(state)
        })
        .collect()
}

fn disjunction_holds(clauses: &[Clause], state: &Value) -> bool {
    clauses
        .iter()
        .any(|clause| StateEvaluator.evaluate(&clause.to_expression(), state) == Ok(true))
}

proptest! {
    /// The disjunction of generated clauses agrees with the source
    /// expression on every assignment of its predicates.
    #[test]
    fn dnf_preserves_truth_tables(expression in arb_expression()) {
        let normalized = push_down_not(&expression, false);
        let clauses = generate_clauses(&normalized);
        for state in assignments() {
            let direct = StateEvaluator
                .evaluate(&expression, &state)
                .expect("synthetic predicates evaluate");
            prop_assert_eq!(direct, disjunction_holds(&clauses, &state));
        }
    }

    /// Push-down itself never changes meaning.
    #[test]
    fn push_down_not_preserves_truth_tables(expression in arb_expression()) {
        let normalized = push_down_not(&expression, false);
        for state in assignments() {
            let direct = StateEvaluator.evaluate(&expression, &state);
            let rewritten = StateEvaluator.evaluate(&normalized, &state);
            prop_assert_eq!(direct, rewritten);
        }
    }
}

fn predicate_pool() -> Vec<Expression> {
    vec![
        Expression::accessor("a"),
        Expression::accessor("b"),
        Expression::accessor("c"),
        Expression::not(Expression::accessor("a")),
        Expression::call("has", vec![Expression::accessor("x")]),
        Expression::ignore(Expression::accessor("counter")),
        Expression::ignore(Expression::accessor("tally")),
        Expression::compare(
            ComparisonOperator::LessThan,
            Expression::accessor("n"),
            Expression::constant(3),
        ),
    ]
}

fn arb_clause() -> impl Strategy<Value = Clause> {
    let pool = predicate_pool();
    let bindings = prop::collection::btree_map("[xy]", "(foo|bar)", 0..3);
    (proptest::sample::subsequence(pool, 0..=4), bindings).prop_map(|(predicates, bindings)| {
        let mut clause = Clause::new(predicates);
        for (variable, binding) in bindings {
            clause = clause.bind(variable, binding);
        }
        clause
    })
}

proptest! {
    #[test]
    fn relationship_is_antisymmetric(a in arb_clause(), b in arb_clause()) {
        let comparers = ComparerRegistry::new();
        prop_assert_eq!(
            a.relationship(&b, &comparers),
            b.relationship(&a, &comparers).swap()
        );
    }

    #[test]
    fn relationship_is_reflexive(a in arb_clause()) {
        let comparers = ComparerRegistry::new();
        prop_assert_eq!(a.relationship(&a, &comparers), Relationship::Equal);
    }
}

fn actions(tree: &TriggerTree<&'static str>, state: &Value) -> Vec<&'static str> {
    let mut found: Vec<&'static str> = tree
        .matching_triggers(state, &StateEvaluator)
        .iter()
        .map(|trigger| *trigger.action())
        .collect();
    found.sort_unstable();
    found
}

fn definitions() -> Vec<(&'static str, &'static str)> {
    vec![
        ("a", "r_a"),
        ("a && b", "r_ab"),
        ("b", "r_b"),
        ("a && b && c", "r_abc"),
        ("a || c", "r_a_or_c"),
    ]
}

proptest! {
    /// Inserting the same triggers in any order yields the same most
    /// specific matches for every state, and a consistent tree.
    #[test]
    fn insertion_order_is_irrelevant(
        order in Just((0..5usize).collect::<Vec<_>>()).prop_shuffle()
    ) {
        let rules = definitions();

        let mut baseline = TriggerTree::new();
        baseline.set_strict(true);
        for (source, action) in &rules {
            baseline.add_trigger(parse(source).unwrap(), *action, &[]);
        }
        prop_assert!(baseline.verify().is_none());

        let mut shuffled = TriggerTree::new();
        shuffled.set_strict(true);
        for &i in &order {
            let (source, action) = rules[i];
            shuffled.add_trigger(parse(source).unwrap(), action, &[]);
        }
        prop_assert!(shuffled.verify().is_none());

        for bits in 0..8u32 {
            let state = json!({
                "a": bits & 1 != 0,
                "b": bits & 2 != 0,
                "c": bits & 4 != 0,
            });
            prop_assert_eq!(actions(&baseline, &state), actions(&shuffled, &state));
        }
    }
}
