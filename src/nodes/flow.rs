//! Exec routing nodes.

use crate::engine::ExecContext;
use crate::error::NodeError;
use crate::graph::NodeId;
use crate::node::{Control, Node, NodeCore, NodeFuture, NodeStatus, Port};
use crate::socket::{Schema, Socket};

/// Forwards `then` when its condition holds and `else` otherwise.
///
/// The condition comes from the connected input, or from the inline switch
/// when nothing is connected.
pub struct BranchNode {
    core: NodeCore,
}

impl BranchNode {
    pub fn new() -> Self {
        Self::with_id(NodeId::new())
    }

    pub fn with_id(id: NodeId) -> Self {
        Self {
            core: NodeCore::new(id, "branch", "Branch")
                .with_input(Port::exec("exec"))
                .with_input(
                    Port::new("condition", Socket::new(Schema::Boolean))
                        .with_control(Control::switch(false)),
                )
                .with_output(Port::exec("then"))
                .with_output(Port::exec("else")),
        }
    }
}

impl Default for BranchNode {
    fn default() -> Self {
        Self::new()
    }
}

impl Node for BranchNode {
    fn core(&self) -> &NodeCore {
        &self.core
    }

    fn execute<'a>(&'a self, ctx: ExecContext<'a>) -> NodeFuture<'a> {
        Box::pin(async move {
            self.core.set_status(NodeStatus::Running);
            let connected = ctx.fetch_input_multiple("condition")?;
            let condition = match connected.first() {
                Some(value) => value.as_bool().unwrap_or(false),
                None => self
                    .core
                    .control_value("condition")
                    .and_then(|v| v.as_bool())
                    .unwrap_or(false),
            };
            self.core.set_status(NodeStatus::Completed);
            let key = if condition { "then" } else { "else" };
            ctx.forward(key).await.map_err(NodeError::from)
        })
    }
}

/// Forwards `first`, then `second`.
pub struct SequenceNode {
    core: NodeCore,
}

impl SequenceNode {
    pub fn new() -> Self {
        Self::with_id(NodeId::new())
    }

    pub fn with_id(id: NodeId) -> Self {
        Self {
            core: NodeCore::new(id, "sequence", "Sequence")
                .with_input(Port::exec("exec"))
                .with_output(Port::exec("first"))
                .with_output(Port::exec("second")),
        }
    }
}

impl Default for SequenceNode {
    fn default() -> Self {
        Self::new()
    }
}

impl Node for SequenceNode {
    fn core(&self) -> &NodeCore {
        &self.core
    }

    fn execute<'a>(&'a self, ctx: ExecContext<'a>) -> NodeFuture<'a> {
        Box::pin(async move {
            self.core.set_status(NodeStatus::Running);
            let first = ctx.forward("first").await;
            let second = ctx.forward("second").await;
            self.core.set_status(NodeStatus::Completed);
            first.and(second).map_err(NodeError::from)
        })
    }
}
