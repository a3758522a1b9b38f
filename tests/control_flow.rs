//! Control-flow execution: forwarding, re-entry, failures and cancellation.
mod common;
use common::*;
use kairo::nodes::{CounterNode, DelayNode, DisplayNode};
use kairo::prelude::*;
use serde_json::json;
use std::rc::Rc;
use tokio_test::block_on;

#[test]
fn counter_self_loop_counts_down_and_stops() {
    let mut document = Document::new();
    let counter = Rc::new(CounterNode::new());
    let id = document.add_node(counter.clone()).unwrap();
    document.connect(&id, "exec", &id, "exec").unwrap();
    let mut events = document.subscribe();

    block_on(document.execute(&id)).unwrap();
    assert_eq!(counter.count(), 2.0);
    assert_eq!(forwards_of(&drain(&mut events), &id), vec!["exec".to_string()]);
    assert_eq!(document.fetch(&id).unwrap()["count"], json!(2.0));

    block_on(document.execute(&id)).unwrap();
    block_on(document.execute(&id)).unwrap();
    assert_eq!(counter.count(), 0.0);
    assert_eq!(forwards_of(&drain(&mut events), &id).len(), 2);

    block_on(document.execute(&id)).unwrap();
    assert_eq!(counter.count(), 0.0);
    assert!(forwards_of(&drain(&mut events), &id).is_empty());
    assert_eq!(counter.core().status(), NodeStatus::Completed);
    assert_eq!(document.fetch(&id).unwrap()["count"], json!(0.0));
}

#[test]
fn repeated_forward_fires_each_connection_once() {
    let mut document = Document::new();
    let source = Tally::repeating(2);
    let left = Tally::new();
    let right = Tally::new();
    let source_id = document.add_node(source.clone()).unwrap();
    let left_id = document.add_node(left.clone()).unwrap();
    let right_id = document.add_node(right.clone()).unwrap();
    document.connect(&source_id, "exec", &left_id, "exec").unwrap();
    document.connect(&source_id, "exec", &right_id, "exec").unwrap();
    let mut events = document.subscribe();

    block_on(document.execute(&source_id)).unwrap();
    assert_eq!(left.runs.get(), 1);
    assert_eq!(right.runs.get(), 1);
    assert_eq!(forwards_of(&drain(&mut events), &source_id).len(), 2);

    // A new execute is a new scope.
    block_on(document.execute(&source_id)).unwrap();
    assert_eq!(left.runs.get(), 2);
    assert_eq!(right.runs.get(), 2);
}

#[test]
fn failing_branch_does_not_stop_siblings() {
    let mut document = Document::new();
    let source = Tally::new();
    let failing = Failing::new();
    let sibling = Tally::new();
    let source_id = document.add_node(source).unwrap();
    let failing_id = document.add_node(failing.clone()).unwrap();
    let sibling_id = document.add_node(sibling.clone()).unwrap();
    document.connect(&source_id, "exec", &failing_id, "exec").unwrap();
    document.connect(&source_id, "exec", &sibling_id, "exec").unwrap();
    let mut events = document.subscribe();

    block_on(document.execute(&source_id)).unwrap();
    assert_eq!(failing.core().status(), NodeStatus::Error);
    assert_eq!(sibling.runs.get(), 1);

    let failures: Vec<_> = drain(&mut events)
        .into_iter()
        .filter_map(|event| match event {
            DocumentEvent::Failed { node_id, message } => Some((node_id, message)),
            _ => None,
        })
        .collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].0, failing_id);
    assert!(failures[0].1.contains("unavailable"));
}

#[test]
fn branch_follows_control_or_connected_condition() {
    let mut document = Document::new();
    let branch = document.create_node("branch").unwrap();
    let yes = Tally::new();
    let no = Tally::new();
    let yes_id = document.add_node(yes.clone()).unwrap();
    let no_id = document.add_node(no.clone()).unwrap();
    document.connect(&branch, "then", &yes_id, "exec").unwrap();
    document.connect(&branch, "else", &no_id, "exec").unwrap();

    block_on(document.execute(&branch)).unwrap();
    assert_eq!((yes.runs.get(), no.runs.get()), (0, 1));

    document.set_control_value(&branch, "condition", json!(true)).unwrap();
    block_on(document.execute(&branch)).unwrap();
    assert_eq!((yes.runs.get(), no.runs.get()), (1, 1));

    // A connected value wins over the inline switch.
    let flag = document.create_node("json").unwrap();
    document.set_control_value(&flag, "value", json!(false)).unwrap();
    document.connect(&flag, "value", &branch, "condition").unwrap();
    block_on(document.execute(&branch)).unwrap();
    assert_eq!((yes.runs.get(), no.runs.get()), (1, 2));
}

#[test]
fn sequence_forwards_in_order_and_display_records_values() {
    let mut document = Document::new();
    let sequence = document.create_node("sequence").unwrap();
    let text = document.create_node("text").unwrap();
    document.set_control_value(&text, "value", json!("shown")).unwrap();
    let first = Rc::new(DisplayNode::new());
    let second = Rc::new(DisplayNode::new());
    let first_id = document.add_node(first.clone()).unwrap();
    let second_id = document.add_node(second.clone()).unwrap();
    document.connect(&sequence, "second", &second_id, "exec").unwrap();
    document.connect(&sequence, "first", &first_id, "exec").unwrap();
    document.connect(&text, "value", &first_id, "value").unwrap();
    let mut events = document.subscribe();

    block_on(document.execute(&sequence)).unwrap();
    let events = drain(&mut events);
    assert_eq!(
        forwards_of(&events, &sequence),
        vec!["first".to_string(), "second".to_string()]
    );
    let first_status = events.iter().position(|e| {
        matches!(e, DocumentEvent::Status { node_id, .. } if node_id == &first_id)
    });
    let second_status = events.iter().position(|e| {
        matches!(e, DocumentEvent::Status { node_id, .. } if node_id == &second_id)
    });
    assert!(first_status < second_status);

    assert_eq!(first.values(), vec![json!("shown")]);
    assert_eq!(second.last_value(), Some(serde_json::Value::Null));
    assert_eq!(first.core().status(), NodeStatus::Completed);
}

#[test]
fn pure_data_nodes_are_not_executed() {
    let mut document = Document::new();
    let text = document.create_node("text").unwrap();
    block_on(document.execute(&text)).unwrap();
    assert_eq!(document.node(&text).unwrap().core().status(), NodeStatus::Idle);
}

#[test]
fn unknown_exec_keys_are_rejected() {
    let mut document = Document::new();
    let counter = document.create_node("counter").unwrap();
    assert!(matches!(
        block_on(document.execute_input(&counter, "value")),
        Err(ControlFlowError::UnknownExecInput { .. })
    ));
    assert!(matches!(
        block_on(document.execute(&NodeId::new())),
        Err(ControlFlowError::NodeNotFound(_))
    ));
}

#[test]
fn busy_delay_refuses_reentry() {
    let mut document = Document::new();
    let delay = Rc::new(DelayNode::new());
    let done = Tally::new();
    let delay_id = document.add_node(delay.clone()).unwrap();
    let done_id = document.add_node(done.clone()).unwrap();
    document.set_control_value(&delay_id, "millis", json!(20)).unwrap();
    document.connect(&delay_id, "exec", &done_id, "exec").unwrap();

    block_on(async {
        let second = async {
            tokio::task::yield_now().await;
            assert_eq!(delay.core().status(), NodeStatus::Running);
            document.execute(&delay_id).await
        };
        let (first, second) = tokio::join!(document.execute(&delay_id), second);
        first.unwrap();
        second.unwrap();
    });

    assert_eq!(done.runs.get(), 1);
    assert_eq!(delay.core().status(), NodeStatus::Completed);
}

#[test]
fn cancellation_aborts_a_running_delay() {
    let mut document = Document::new();
    let delay = Rc::new(DelayNode::new());
    let done = Tally::new();
    let aborted = Tally::new();
    let delay_id = document.add_node(delay.clone()).unwrap();
    let done_id = document.add_node(done.clone()).unwrap();
    let aborted_id = document.add_node(aborted.clone()).unwrap();
    document.set_control_value(&delay_id, "millis", json!(60_000)).unwrap();
    document.connect(&delay_id, "exec", &done_id, "exec").unwrap();
    document.connect(&delay_id, "aborted", &aborted_id, "exec").unwrap();

    block_on(async {
        let cancel = async {
            tokio::task::yield_now().await;
            document.cancel();
        };
        let (result, _) = tokio::join!(document.execute(&delay_id), cancel);
        result.unwrap();
    });

    assert_eq!(delay.core().status(), NodeStatus::Canceled);
    assert_eq!((done.runs.get(), aborted.runs.get()), (0, 1));

    // Runs started after the cancellation get a fresh token.
    document.set_control_value(&delay_id, "millis", json!(1)).unwrap();
    block_on(document.execute(&delay_id)).unwrap();
    assert_eq!(delay.core().status(), NodeStatus::Completed);
    assert_eq!(done.runs.get(), 1);
}

#[test]
fn cancellation_reaches_nodes_dispatched_later_in_the_walk() {
    let mut document = Document::new();
    let sequence = document.create_node("sequence").unwrap();
    let slow = Rc::new(DelayNode::new());
    let quick = Rc::new(DelayNode::new());
    let done = Tally::new();
    let slow_id = document.add_node(slow.clone()).unwrap();
    let quick_id = document.add_node(quick.clone()).unwrap();
    let done_id = document.add_node(done.clone()).unwrap();
    document.set_control_value(&slow_id, "millis", json!(60_000)).unwrap();
    document.set_control_value(&quick_id, "millis", json!(50)).unwrap();
    document.connect(&sequence, "first", &slow_id, "exec").unwrap();
    document.connect(&sequence, "second", &quick_id, "exec").unwrap();
    document.connect(&quick_id, "exec", &done_id, "exec").unwrap();

    block_on(async {
        let cancel = async {
            tokio::task::yield_now().await;
            document.cancel();
        };
        let (result, _) = tokio::join!(document.execute(&sequence), cancel);
        result.unwrap();
    });

    assert_eq!(slow.core().status(), NodeStatus::Canceled);
    assert_eq!(quick.core().status(), NodeStatus::Canceled);
    assert_eq!(done.runs.get(), 0);
}

#[test]
fn status_changes_are_observable() {
    let mut document = Document::new();
    let counter = Rc::new(CounterNode::new());
    let id = document.add_node(counter.clone()).unwrap();
    let mut status = counter.core().subscribe_status();
    assert_eq!(*status.borrow_and_update(), NodeStatus::Idle);

    block_on(document.execute(&id)).unwrap();
    assert!(status.has_changed().unwrap());
    assert_eq!(*status.borrow_and_update(), NodeStatus::Completed);
}
