use crate::engine::ExecContext;
use crate::error::NodeError;
use crate::graph::NodeId;
use crate::node::{Node, NodeCore, NodeFuture, NodeStatus, Port};
use crate::socket::Socket;
use serde_json::Value;
use std::cell::RefCell;

/// Records the value on its `value` input every time it runs, then forwards `exec`.
pub struct DisplayNode {
    core: NodeCore,
    seen: RefCell<Vec<Value>>,
}

impl DisplayNode {
    pub fn new() -> Self {
        Self::with_id(NodeId::new())
    }

    pub fn with_id(id: NodeId) -> Self {
        Self {
            core: NodeCore::new(id, "display", "Display")
                .with_input(Port::exec("exec"))
                .with_input(Port::new("value", Socket::any()))
                .with_output(Port::exec("exec")),
            seen: RefCell::new(Vec::new()),
        }
    }

    /// Every value displayed so far, oldest first.
    pub fn values(&self) -> Vec<Value> {
        self.seen.borrow().clone()
    }

    pub fn last_value(&self) -> Option<Value> {
        self.seen.borrow().last().cloned()
    }
}

impl Default for DisplayNode {
    fn default() -> Self {
        Self::new()
    }
}

impl Node for DisplayNode {
    fn core(&self) -> &NodeCore {
        &self.core
    }

    fn execute<'a>(&'a self, ctx: ExecContext<'a>) -> NodeFuture<'a> {
        Box::pin(async move {
            self.core.set_status(NodeStatus::Running);
            let value = ctx.fetch_input_single("value")?;
            tracing::info!(node_id = %self.core.id(), %value, "display");
            self.seen.borrow_mut().push(value);
            self.core.set_status(NodeStatus::Completed);
            ctx.forward("exec").await.map_err(NodeError::from)
        })
    }
}
