//! Dynamic ports and schema propagation.
mod common;
use kairo::node::PortSide;
use kairo::prelude::*;
use serde_json::json;

fn input_keys(document: &Document, id: &NodeId) -> Vec<String> {
    document
        .node(id)
        .unwrap()
        .core()
        .inputs()
        .into_iter()
        .map(|p| p.key)
        .collect()
}

fn output_type(document: &Document, id: &NodeId, key: &str) -> String {
    document
        .node(id)
        .unwrap()
        .core()
        .output(key)
        .unwrap()
        .socket
        .type_name()
}

#[test]
fn passthrough_mirrors_its_peer() {
    let mut document = Document::new();
    let number = document.create_node("number").unwrap();
    let passthrough = document.create_node("passthrough").unwrap();
    assert_eq!(output_type(&document, &passthrough, "value"), "any");

    let connection = document.connect(&number, "value", &passthrough, "value").unwrap();
    assert_eq!(output_type(&document, &passthrough, "value"), "number");
    assert_eq!(document.fetch(&passthrough).unwrap()["value"], json!(0.0));

    document.disconnect(&connection).unwrap();
    assert_eq!(output_type(&document, &passthrough, "value"), "any");
    assert_eq!(document.fetch(&passthrough).unwrap()["value"], json!(null));
}

#[test]
fn reshaping_is_reported_and_bumps_revision() {
    let mut document = Document::new();
    let text = document.create_node("text").unwrap();
    let passthrough = document.create_node("passthrough").unwrap();
    let revision = document.node(&passthrough).unwrap().core().revision();
    let mut events = document.subscribe();

    document.connect(&text, "value", &passthrough, "value").unwrap();
    assert!(document.node(&passthrough).unwrap().core().revision() > revision);

    let reshaped: Vec<_> = common::drain(&mut events)
        .into_iter()
        .filter_map(|event| match event {
            DocumentEvent::Reshaped { node_id, outputs } => Some((node_id, outputs)),
            _ => None,
        })
        .collect();
    assert_eq!(reshaped, vec![(passthrough.clone(), vec!["value".to_string()])]);
}

#[test]
fn object_shape_derives_one_port_per_property() {
    let mut document = Document::new();
    let shape = document.create_node("json").unwrap();
    let object = document.create_node("object").unwrap();
    document
        .set_control_value(&shape, "value", json!({"count": 1, "name": "x", "on": true}))
        .unwrap();
    document.connect(&shape, "value", &object, "shape").unwrap();

    assert_eq!(
        input_keys(&document, &object),
        vec!["shape", "field.count", "field.name", "field.on"]
    );
    let node = document.node(&object).unwrap();
    let kinds: Vec<_> = ["field.count", "field.name", "field.on"]
        .iter()
        .map(|key| node.core().input(key).unwrap().control.unwrap().kind())
        .collect();
    assert_eq!(
        kinds,
        vec![ControlKind::Number, ControlKind::Text, ControlKind::Switch]
    );
    assert_eq!(output_type(&document, &object, "object"), "object");
    assert_eq!(
        document.fetch(&object).unwrap()["object"],
        json!({"count": 0, "name": "", "on": false})
    );

    document.set_control_value(&object, "field.name", json!("kairo")).unwrap();
    let number = document.create_node("number").unwrap();
    document.set_control_value(&number, "value", json!(5)).unwrap();
    document.connect(&number, "value", &object, "field.count").unwrap();
    assert_eq!(
        document.fetch(&object).unwrap()["object"],
        json!({"count": 5, "name": "kairo", "on": false})
    );
}

#[test]
fn stale_derived_ports_lose_their_connections_first() {
    let mut document = Document::new();
    let shape = document.create_node("json").unwrap();
    let object = document.create_node("object").unwrap();
    let number = document.create_node("number").unwrap();
    document
        .set_control_value(&shape, "value", json!({"a": 1, "b": 2}))
        .unwrap();
    document.connect(&shape, "value", &object, "shape").unwrap();
    document.connect(&number, "value", &object, "field.a").unwrap();
    document.connect(&number, "value", &object, "field.b").unwrap();
    assert_eq!(document.graph().connection_count(), 3);

    // `a` disappears, `b` changes type: both ports are rebuilt.
    document
        .set_control_value(&shape, "value", json!({"b": "two", "c": null}))
        .unwrap();
    assert_eq!(
        input_keys(&document, &object),
        vec!["shape", "field.b", "field.c"]
    );
    assert_eq!(document.graph().connection_count(), 1);
    document.graph().check_integrity().unwrap();
    assert!(
        document
            .graph()
            .connections_on_port(&object, PortSide::Input, "field.b")
            .is_empty()
    );
    let node = document.node(&object).unwrap();
    assert_eq!(
        node.core().input("field.b").unwrap().control.unwrap().kind(),
        ControlKind::Text
    );
    assert_eq!(
        node.core().input("field.c").unwrap().control.unwrap().kind(),
        ControlKind::Untyped
    );
}

#[test]
fn unchanged_properties_keep_connections_and_values() {
    let mut document = Document::new();
    let shape = document.create_node("json").unwrap();
    let object = document.create_node("object").unwrap();
    let number = document.create_node("number").unwrap();
    document.set_control_value(&shape, "value", json!({"a": 1})).unwrap();
    document.connect(&shape, "value", &object, "shape").unwrap();
    document.connect(&number, "value", &object, "field.a").unwrap();

    document
        .set_control_value(&shape, "value", json!({"a": 2, "z": false}))
        .unwrap();
    assert_eq!(
        document
            .graph()
            .connections_on_port(&object, PortSide::Input, "field.a")
            .len(),
        1
    );
    assert_eq!(input_keys(&document, &object), vec!["shape", "field.a", "field.z"]);
}

#[test]
fn disconnecting_the_shape_removes_derived_ports() {
    let mut document = Document::new();
    let shape = document.create_node("json").unwrap();
    let object = document.create_node("object").unwrap();
    document.set_control_value(&shape, "value", json!({"a": 1})).unwrap();
    let connection = document.connect(&shape, "value", &object, "shape").unwrap();

    document.disconnect(&connection).unwrap();
    assert_eq!(input_keys(&document, &object), vec!["shape"]);
    assert_eq!(output_type(&document, &object, "object"), "any");
    assert_eq!(document.fetch(&object).unwrap()["object"], json!({}));
}

#[test]
fn propagation_is_one_hop_unless_rippled() {
    let mut document = Document::new();
    let source = document.create_node("json").unwrap();
    let first = document.create_node("passthrough").unwrap();
    let second = document.create_node("passthrough").unwrap();
    document.connect(&source, "value", &first, "value").unwrap();
    document.connect(&first, "value", &second, "value").unwrap();

    document.set_control_value(&source, "value", json!(42)).unwrap();
    assert_eq!(output_type(&document, &first, "value"), "number");
    assert_eq!(output_type(&document, &second, "value"), "any");

    let reshaped = document.ripple(&first, &["value".to_string()]).unwrap();
    assert_eq!(reshaped, vec![(second.clone(), vec!["value".to_string()])]);
    assert_eq!(output_type(&document, &second, "value"), "number");
    assert_eq!(document.fetch(&second).unwrap()["value"], json!(42));
}

#[test]
fn incompatible_sockets_are_refused() {
    let mut document = Document::new();
    let number = document.create_node("number").unwrap();
    let join = document.create_node("join").unwrap();
    let counter = document.create_node("counter").unwrap();

    assert!(matches!(
        document.connect(&number, "value", &join, "parts"),
        Err(DocumentError::Graph(GraphError::IncompatibleSockets { .. }))
    ));
    assert!(matches!(
        document.connect(&counter, "exec", &join, "parts"),
        Err(DocumentError::Graph(GraphError::IncompatibleSockets { .. }))
    ));
    assert!(matches!(
        document.connect(&number, "missing", &join, "parts"),
        Err(DocumentError::Graph(GraphError::PortNotFound { .. }))
    ));
    assert_eq!(document.graph().connection_count(), 0);
}
