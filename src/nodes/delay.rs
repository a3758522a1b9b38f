use crate::engine::ExecContext;
use crate::error::NodeError;
use crate::graph::NodeId;
use crate::node::{Control, Node, NodeCore, NodeFuture, NodeStatus, Port};
use std::time::Duration;

/// Waits `millis` milliseconds before forwarding `exec`.
///
/// Stands in for an external call: the wait is a suspension point, the node
/// refuses re-entry while it is waiting, and cancellation ends the wait early
/// with status `Canceled` and a forward on `aborted` instead.
pub struct DelayNode {
    core: NodeCore,
}

impl DelayNode {
    pub fn new() -> Self {
        Self::with_id(NodeId::new())
    }

    pub fn with_id(id: NodeId) -> Self {
        Self {
            core: NodeCore::new(id, "delay", "Delay")
                .with_control("millis", Control::number(1000.0))
                .with_input(Port::exec("exec"))
                .with_output(Port::exec("exec"))
                .with_output(Port::exec("aborted")),
        }
    }

    fn duration(&self) -> Duration {
        let millis = self.core.control_f64("millis").unwrap_or_default().max(0.0);
        Duration::from_millis(millis as u64)
    }
}

impl Default for DelayNode {
    fn default() -> Self {
        Self::new()
    }
}

impl Node for DelayNode {
    fn core(&self) -> &NodeCore {
        &self.core
    }

    fn execute<'a>(&'a self, ctx: ExecContext<'a>) -> NodeFuture<'a> {
        Box::pin(async move {
            if !self.core.try_begin() {
                tracing::debug!(node_id = %self.core.id(), "delay already running, ignoring");
                return Ok(());
            }

            let token = ctx.cancellation().clone();
            let canceled = tokio::select! {
                _ = tokio::time::sleep(self.duration()) => false,
                _ = token.cancelled() => true,
            };

            if canceled {
                tracing::debug!(node_id = %self.core.id(), "delay canceled");
                self.core.set_status(NodeStatus::Canceled);
                ctx.forward("aborted").await.map_err(NodeError::from)
            } else {
                self.core.set_status(NodeStatus::Completed);
                ctx.forward("exec").await.map_err(NodeError::from)
            }
        })
    }
}
