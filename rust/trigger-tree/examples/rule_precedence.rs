//! Walks through how specialization ordering picks the winning rule.
//!
//! Run with: `cargo run --example rule_precedence`

use anyhow::Result;
use serde_json::json;
use trigger_tree::helpers::{parse, StateEvaluator};
use trigger_tree::TriggerTree;

fn main() -> Result<()> {
    let mut tree = TriggerTree::new();
    tree.add_trigger(parse("greeted")?, "say_hello", &[]);
    tree.add_trigger(parse("greeted && exists(user.name)")?, "greet_by_name", &[]);
    tree.add_trigger(parse("greeted || waved")?, "acknowledge", &[]);

    println!("{tree}");
    println!("{}", tree.tree_to_string());

    for state in [
        json!({"greeted": true}),
        json!({"greeted": true, "user": {"name": "Sam"}}),
        json!({"greeted": false, "waved": true}),
    ] {
        let actions: Vec<&&str> = tree
            .matching_triggers(&state, &StateEvaluator)
            .iter()
            .map(|trigger| trigger.action())
            .collect();
        println!("{state} -> {actions:?}");
    }
    Ok(())
}
