//! Dataflow resolution: memoization, fan-in and cycle handling.
mod common;
use common::*;
use kairo::prelude::*;
use serde_json::json;

#[test]
fn cyclic_subgraph_terminates_and_outside_nodes_resolve() {
    let mut document = Document::new();
    let a = Probe::new();
    let b = Probe::new();
    let c = Probe::new();
    let d = Probe::new();
    let a_id = document.add_node(a.clone()).unwrap();
    let b_id = document.add_node(b.clone()).unwrap();
    let c_id = document.add_node(c.clone()).unwrap();
    let d_id = document.add_node(d.clone()).unwrap();

    document.connect(&a_id, "out", &b_id, "in").unwrap();
    document.connect(&b_id, "out", &a_id, "in").unwrap();
    document.connect(&c_id, "out", &a_id, "in").unwrap();
    document.connect(&a_id, "out", &d_id, "in").unwrap();

    let output = document.fetch(&d_id).unwrap();
    // b saw nothing from a (cycle edge), c saw nothing at all.
    assert_eq!(output["out"], json!([[[], []]]));
    assert_eq!(document.fetch(&c_id).unwrap()["out"], json!([]));

    for probe in [&a, &b, &c, &d] {
        assert_eq!(probe.calls.get(), 1);
    }
}

#[test]
fn cycle_edge_result_is_not_cached_as_node_output() {
    let mut document = Document::new();
    let a = Probe::new();
    let b = Probe::new();
    let a_id = document.add_node(a.clone()).unwrap();
    let b_id = document.add_node(b.clone()).unwrap();
    document.connect(&a_id, "out", &b_id, "in").unwrap();
    document.connect(&b_id, "out", &a_id, "in").unwrap();

    let from_b = document.fetch(&b_id).unwrap();
    assert_eq!(from_b["out"], json!([[]]));

    // a was resolved while b was on the path; its cached entry is a real result.
    assert!(document.dataflow().is_cached(&a_id));
    assert_eq!(document.fetch(&a_id).unwrap()["out"], json!([]));
    assert_eq!(a.calls.get(), 1);
}

#[test]
fn resolver_runs_once_until_reset() {
    let mut document = Document::new();
    let probe = Probe::new();
    let id = document.add_node(probe.clone()).unwrap();

    document.fetch(&id).unwrap();
    document.fetch(&id).unwrap();
    assert_eq!(probe.calls.get(), 1);

    document.reset(Some(&id));
    document.fetch(&id).unwrap();
    assert_eq!(probe.calls.get(), 2);

    document.reset(None);
    assert!(!document.dataflow().is_cached(&id));
}

#[test]
fn reset_does_not_cascade_downstream() {
    let mut document = Document::new();
    let upstream = Probe::new();
    let downstream = Probe::new();
    let up = document.add_node(upstream.clone()).unwrap();
    let down = document.add_node(downstream.clone()).unwrap();
    document.connect(&up, "out", &down, "in").unwrap();

    document.fetch(&down).unwrap();
    document.reset(Some(&up));
    assert!(document.dataflow().is_cached(&down));

    document.fetch(&down).unwrap();
    assert_eq!(upstream.calls.get(), 1);
    assert_eq!(downstream.calls.get(), 1);
}

#[test]
fn fan_in_preserves_registration_order() {
    let mut document = Document::new();
    let join = document.create_node("join").unwrap();
    let mut texts = Vec::new();
    for word in ["alpha", "beta", "gamma"] {
        let id = document.create_node("text").unwrap();
        document.set_control_value(&id, "value", json!(word)).unwrap();
        texts.push(id);
    }

    document.connect(&texts[2], "value", &join, "parts").unwrap();
    document.connect(&texts[0], "value", &join, "parts").unwrap();
    document.connect(&texts[1], "value", &join, "parts").unwrap();

    let inputs = document.fetch_inputs(&join).unwrap();
    assert_eq!(inputs["parts"], vec![json!("gamma"), json!("alpha"), json!("beta")]);
    assert_eq!(document.fetch(&join).unwrap()["text"], json!("gamma alpha beta"));
}

#[test]
fn control_edits_invalidate_downstream_entries() {
    let mut document = Document::new();
    let text = document.create_node("text").unwrap();
    let join = document.create_node("join").unwrap();
    document.connect(&text, "value", &join, "parts").unwrap();
    document.set_control_value(&text, "value", json!("one")).unwrap();
    assert_eq!(document.fetch(&join).unwrap()["text"], json!("one"));

    document.set_control_value(&text, "value", json!("two")).unwrap();
    assert!(!document.dataflow().is_cached(&join));
    assert_eq!(document.fetch(&join).unwrap()["text"], json!("two"));

    document.set_control_value(&join, "separator", json!("-")).unwrap();
    let other = document.create_node("text").unwrap();
    document.set_control_value(&other, "value", json!("three")).unwrap();
    document.connect(&other, "value", &join, "parts").unwrap();
    assert_eq!(document.fetch(&join).unwrap()["text"], json!("two-three"));
}

#[test]
fn input_helpers_handle_missing_values() {
    let mut document = Document::new();
    let probe = Probe::new();
    let id = document.add_node(probe).unwrap();
    let engine = document.dataflow();

    assert_eq!(
        engine.fetch_input_single(document.graph(), &id, "in").unwrap(),
        serde_json::Value::Null
    );
    assert!(engine
        .fetch_input_multiple(document.graph(), &id, "in")
        .unwrap()
        .is_empty());
    assert!(matches!(
        engine.fetch_input_required(document.graph(), &id, "in"),
        Err(DataflowError::MissingRequiredInput { .. })
    ));
    assert!(matches!(
        document.fetch(&NodeId::new()),
        Err(DataflowError::NodeNotFound(_))
    ));
}

#[test]
fn rejected_control_values_leave_the_cache_alone() {
    let mut document = Document::new();
    let number = document.create_node("number").unwrap();
    document.set_control_value(&number, "value", json!(7)).unwrap();
    assert_eq!(document.fetch(&number).unwrap()["value"], json!(7));

    let error = document
        .set_control_value(&number, "value", json!("seven"))
        .unwrap_err();
    assert!(matches!(
        error,
        DocumentError::Node {
            source: NodeError::InvalidControlValue { .. },
            ..
        }
    ));
    assert!(document.dataflow().is_cached(&number));
}
