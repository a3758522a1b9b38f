use super::single_output;
use crate::engine::ExecContext;
use crate::error::NodeError;
use crate::graph::NodeId;
use crate::node::{Control, InputData, Node, NodeCore, NodeFuture, NodeStatus, OutputData, Port};
use crate::socket::{Schema, Socket};
use serde_json::Value;

/// Forwards `exec` as long as its `count` control is positive, decrementing it
/// on every run. Wiring its output back into its input forms a bounded loop:
/// the re-entrant call is refused while the first one is still running.
pub struct CounterNode {
    core: NodeCore,
}

impl CounterNode {
    pub fn new() -> Self {
        Self::with_id(NodeId::new())
    }

    pub fn with_id(id: NodeId) -> Self {
        Self {
            core: NodeCore::new(id, "counter", "Counter")
                .with_control("count", Control::number(3.0))
                .with_input(Port::exec("exec"))
                .with_output(Port::exec("exec"))
                .with_output(Port::new("count", Socket::new(Schema::Number))),
        }
    }

    pub fn count(&self) -> f64 {
        self.core.control_f64("count").unwrap_or_default()
    }
}

impl Default for CounterNode {
    fn default() -> Self {
        Self::new()
    }
}

impl Node for CounterNode {
    fn core(&self) -> &NodeCore {
        &self.core
    }

    fn data(&self, _inputs: &InputData) -> Result<OutputData, NodeError> {
        Ok(single_output("count", Some(Value::from(self.count()))))
    }

    fn execute<'a>(&'a self, ctx: ExecContext<'a>) -> NodeFuture<'a> {
        Box::pin(async move {
            if !self.core.try_begin() {
                tracing::debug!(node_id = %self.core.id(), "counter busy, ignoring re-entry");
                return Ok(());
            }

            let count = self.count();
            if count <= 0.0 {
                self.core.set_status(NodeStatus::Completed);
                return Ok(());
            }

            let result = self
                .core
                .set_control_value("count", Value::from(count - 1.0));
            if let Err(error) = result {
                self.core.set_status(NodeStatus::Error);
                return Err(error);
            }
            ctx.reset_self();

            let forwarded = ctx.forward("exec").await;
            self.core.set_status(NodeStatus::Completed);
            forwarded.map_err(NodeError::from)
        })
    }
}
