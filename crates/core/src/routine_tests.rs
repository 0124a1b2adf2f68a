// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::error_handler::ErrorStrategy;
use crate::payload::payload;
use serde_json::json;

#[test]
fn define_slot_and_event() {
    let mut routine = Routine::new();
    routine.define_slot("in").define_slot_with("bulk", 10, 8).define_event("out");

    assert!(routine.slot("in").is_some());
    assert_eq!(routine.slot("bulk").map(|s| s.max_queue_length()), Some(10));
    assert!(routine.event("out").is_some());
    assert!(routine.slot("missing").is_none());
}

#[test]
fn redefining_a_slot_replaces_it() {
    let mut routine = Routine::new();
    routine.define_slot_with("in", 5, 4).define_slot_with("in", 9, 2);

    assert_eq!(routine.slots().len(), 1);
    assert_eq!(routine.slot("in").map(|s| s.max_queue_length()), Some(9));
}

#[test]
fn slot_order_is_insertion_order() {
    let mut routine = Routine::new();
    routine.define_slot("zeta").define_slot("alpha");
    let names: Vec<_> = routine.slots().keys().map(|k| k.as_str()).collect();
    assert_eq!(names, vec!["zeta", "alpha"]);
}

#[test]
fn logic_is_optional_until_set() {
    let mut routine = Routine::new();
    assert!(routine.logic().is_none());
    routine.set_logic(|_ctx| Ok(()));
    assert!(routine.logic().is_some());
}

#[test]
fn error_handler_is_interior_mutable() {
    let routine = Routine::new();
    assert!(routine.error_handler().is_none());

    routine.set_error_handler(ErrorHandler::skip());
    assert_eq!(routine.error_handler().map(|h| h.strategy), Some(ErrorStrategy::Skip));
}

#[test]
fn config_bag_round_trip() {
    let routine = Routine::new();
    routine.set_config("threshold", json!(5));
    routine.set_config("label", json!("alerts"));

    assert_eq!(routine.config_value("threshold"), Some(json!(5)));
    assert_eq!(routine.config().len(), 2);
    assert!(routine.config_value("missing").is_none());
}

#[test]
fn pending_count_sums_all_slots() {
    let mut routine = Routine::new();
    routine.define_slot("a").define_slot("b");
    routine.slot("a").unwrap().enqueue(payload(json!({})), "external", 0).unwrap();
    routine.slot("a").unwrap().enqueue(payload(json!({})), "external", 0).unwrap();
    routine.slot("b").unwrap().enqueue(payload(json!({})), "external", 0).unwrap();

    assert_eq!(routine.pending_count(), 3);
}

#[test]
fn activation_policy_defaults_to_none() {
    let mut routine = Routine::new();
    assert!(routine.activation_policy().is_none());
    routine.set_activation_policy(crate::policy::ActivationPolicy::Immediate);
    assert!(routine.activation_policy().is_some());
}
