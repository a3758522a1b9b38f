//! Common test nodes and helpers for building graphs.
use kairo::engine::ExecContext;
use kairo::prelude::*;
use serde_json::Value;
use std::cell::Cell;
use std::rc::Rc;
use tokio::sync::broadcast::Receiver;

/// A pure data node: `out` is the list of everything connected to `in`.
/// Counts how often its resolver runs.
#[allow(dead_code)]
pub struct Probe {
    core: NodeCore,
    pub calls: Cell<usize>,
}

#[allow(dead_code)]
impl Probe {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            core: NodeCore::new(NodeId::new(), "probe", "Probe")
                .with_input(Port::new("in", Socket::any()))
                .with_output(Port::new("out", Socket::any())),
            calls: Cell::new(0),
        })
    }
}

impl Node for Probe {
    fn core(&self) -> &NodeCore {
        &self.core
    }

    fn data(&self, inputs: &InputData) -> std::result::Result<OutputData, NodeError> {
        self.calls.set(self.calls.get() + 1);
        let seen = inputs.get("in").cloned().unwrap_or_default();
        Ok(OutputData::from_iter([("out".to_string(), Value::Array(seen))]))
    }
}

/// An exec node that counts its runs and forwards `exec` `repeat` times.
#[allow(dead_code)]
pub struct Tally {
    core: NodeCore,
    repeat: usize,
    pub runs: Cell<usize>,
}

#[allow(dead_code)]
impl Tally {
    pub fn new() -> Rc<Self> {
        Self::repeating(1)
    }

    pub fn repeating(repeat: usize) -> Rc<Self> {
        Rc::new(Self {
            core: NodeCore::new(NodeId::new(), "tally", "Tally")
                .with_input(Port::exec("exec"))
                .with_output(Port::exec("exec")),
            repeat,
            runs: Cell::new(0),
        })
    }
}

impl Node for Tally {
    fn core(&self) -> &NodeCore {
        &self.core
    }

    fn execute<'a>(&'a self, ctx: ExecContext<'a>) -> NodeFuture<'a> {
        Box::pin(async move {
            self.runs.set(self.runs.get() + 1);
            self.core.set_status(NodeStatus::Completed);
            for _ in 0..self.repeat {
                ctx.forward("exec").await?;
            }
            Ok(())
        })
    }
}

/// An exec node whose side effect always fails.
#[allow(dead_code)]
pub struct Failing {
    core: NodeCore,
}

#[allow(dead_code)]
impl Failing {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            core: NodeCore::new(NodeId::new(), "failing", "Failing")
                .with_input(Port::exec("exec"))
                .with_output(Port::exec("exec")),
        })
    }
}

impl Node for Failing {
    fn core(&self) -> &NodeCore {
        &self.core
    }

    fn execute<'a>(&'a self, _ctx: ExecContext<'a>) -> NodeFuture<'a> {
        Box::pin(async { Err(NodeError::Failed("external service unavailable".to_string())) })
    }
}

/// Collects every event currently buffered on a subscription.
#[allow(dead_code)]
pub fn drain(events: &mut Receiver<DocumentEvent>) -> Vec<DocumentEvent> {
    let mut collected = Vec::new();
    while let Ok(event) = events.try_recv() {
        collected.push(event);
    }
    collected
}

/// Keys forwarded by `node`, in order.
#[allow(dead_code)]
pub fn forwards_of(events: &[DocumentEvent], node: &NodeId) -> Vec<String> {
    events
        .iter()
        .filter_map(|event| match event {
            DocumentEvent::Forwarded { node_id, key } if node_id == node => Some(key.clone()),
            _ => None,
        })
        .collect()
}
