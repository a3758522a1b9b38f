//! Unit tests for value types: schemas, statuses, controls and error messages.
use kairo::node::PortSide;
use kairo::prelude::*;
use serde_json::json;

#[test]
fn test_schema_inference_from_values() {
    let value = json!({"id": 7, "tags": ["a", "b"], "meta": null, "mixed": [1, "x"]});
    assert_eq!(
        Schema::infer(&value),
        Schema::object([
            ("id", Schema::Number),
            ("meta", Schema::Null),
            ("mixed", Schema::array(Schema::Any)),
            ("tags", Schema::array(Schema::String)),
        ])
    );
    assert_eq!(Schema::infer(&json!([])), Schema::array(Schema::Any));
}

#[test]
fn test_array_and_object_compatibility() {
    let rows = Schema::array(Schema::object([("id", Schema::Number), ("name", Schema::String)]));
    let ids = Schema::array(Schema::object([("id", Schema::Number)]));
    assert!(rows.is_compatible_with(&ids));
    assert!(!ids.is_compatible_with(&rows));
    assert!(!Schema::Number.is_compatible_with(&Schema::String));
    assert!(!Schema::Null.is_compatible_with(&Schema::Boolean));
}

#[test]
fn test_schema_display() {
    let schema = Schema::object([
        ("id", Schema::Number),
        ("tags", Schema::array(Schema::String)),
    ]);
    assert_eq!(schema.to_string(), "{id: number, tags: array<string>}");
    assert_eq!(Schema::Any.to_string(), "any");
}

#[test]
fn test_status_display_and_terminal_states() {
    assert_eq!(NodeStatus::default(), NodeStatus::Idle);
    assert_eq!(NodeStatus::Canceled.to_string(), "canceled");
    assert!(NodeStatus::Error.is_terminal());
    assert!(!NodeStatus::Running.is_terminal());
    assert!(!NodeStatus::Idle.is_terminal());
}

#[test]
fn test_control_rejects_values_of_the_wrong_kind() {
    let core = NodeCore::new(NodeId::new(), "probe", "Probe")
        .with_control("limit", Control::number(10.0))
        .with_input(Port::new("flag", Socket::new(Schema::Boolean)).with_control(Control::switch(false)));

    core.set_control_value("flag", json!(true)).unwrap();
    assert_eq!(core.control_value("flag"), Some(json!(true)));
    assert!(matches!(
        core.set_control_value("limit", json!("ten")),
        Err(NodeError::InvalidControlValue {
            kind: ControlKind::Number,
            ..
        })
    ));
    assert!(matches!(
        core.set_control_value("missing", json!(1)),
        Err(NodeError::UnknownControl(_))
    ));
    assert_eq!(core.control_f64("limit"), Some(10.0));

    let keys: Vec<String> = core.all_controls().into_iter().map(|(k, _)| k).collect();
    assert_eq!(keys, vec!["limit", "flag"]);
}

#[test]
fn test_error_messages() {
    let node_id = NodeId::new();
    let missing = GraphError::PortNotFound {
        node_id: node_id.clone(),
        side: PortSide::Output,
        key: "result".to_string(),
    };
    assert_eq!(
        missing.to_string(),
        format!("Node '{}' has no output port 'result'", node_id)
    );

    let contract = DataflowError::ResolverContract {
        node_id: node_id.clone(),
        missing: vec!["a".to_string(), "b".to_string()],
    };
    assert!(contract.to_string().ends_with("did not produce declared outputs: a, b"));

    let wrapped = DocumentError::from(missing.clone());
    assert_eq!(wrapped.to_string(), missing.to_string());
}
