use super::dataflow::DataflowEngine;
use super::events::{DocumentEvent, EventBus};
use crate::error::{ControlFlowError, DataflowError};
use crate::graph::{ConnectionId, GraphQuery, NodeId};
use crate::node::{InputData, Node, NodeStatus, OutputData};
use ahash::AHashSet;
use serde_json::Value;
use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use tokio_util::sync::CancellationToken;

/// A boxed future of one step in the control-flow walk.
pub type FlowFuture<'a> = Pin<Box<dyn Future<Output = Result<(), ControlFlowError>> + 'a>>;

/// Push-based executor walking exec connections.
///
/// Holds the cancellation token for the next run. Each run takes the token once
/// and hands that same token to every node of its walk; canceling trips it and
/// swaps in a fresh one, so runs started afterwards are unaffected.
#[derive(Default)]
pub struct ControlFlowEngine {
    cancel: RefCell<CancellationToken>,
}

impl ControlFlowEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: CancellationToken) -> Self {
        Self {
            cancel: RefCell::new(token),
        }
    }

    /// Signals cancellation to every node currently running under this engine.
    pub fn cancel(&self) {
        let previous = self.cancel.replace(CancellationToken::new());
        previous.cancel();
    }

    pub fn token(&self) -> CancellationToken {
        self.cancel.borrow().clone()
    }
}

/// Everything a control-flow walk needs, borrowed from the owning document.
///
/// `cancel` is the token taken when the walk started; nodes dispatched late in
/// the walk still observe a cancellation issued early.
#[derive(Clone, Copy)]
pub struct Runtime<'a> {
    pub graph: &'a dyn GraphQuery,
    pub dataflow: &'a DataflowEngine,
    pub events: &'a EventBus,
    pub cancel: &'a CancellationToken,
}

impl<'a> Runtime<'a> {
    /// Runs one node, entered through `input` (or directly when `None`).
    ///
    /// A failing node is marked [`NodeStatus::Error`] and reported on the event
    /// channel; the walk itself goes on.
    pub fn execute(self, id: NodeId, input: Option<String>) -> FlowFuture<'a> {
        Box::pin(async move {
            let node = self
                .graph
                .node(&id)
                .ok_or_else(|| ControlFlowError::NodeNotFound(id.clone()))?;
            self.run(node, id, input).await
        })
    }

    fn dispatch(self, connection_id: ConnectionId, id: NodeId, input: String) -> FlowFuture<'a> {
        Box::pin(async move {
            let node = self
                .graph
                .node(&id)
                .ok_or_else(|| ControlFlowError::DanglingConnection {
                    connection_id,
                    node_id: id.clone(),
                })?;
            self.run(node, id, Some(input)).await
        })
    }

    async fn run(
        self,
        node: Rc<dyn Node>,
        id: NodeId,
        input: Option<String>,
    ) -> Result<(), ControlFlowError> {
        let core = node.core();
        if !core.has_exec_ports() {
            tracing::debug!(node_id = %id, "node has no exec ports, skipping");
            return Ok(());
        }
        if let Some(key) = &input {
            if !core.is_exec_input(key) {
                return Err(ControlFlowError::UnknownExecInput {
                    node_id: id,
                    key: key.clone(),
                });
            }
        }

        tracing::debug!(node_id = %id, input = ?input, "executing node");
        let ctx = ExecContext {
            rt: self,
            node_id: id.clone(),
            input,
            fired: RefCell::new(AHashSet::new()),
            cancel: self.cancel.clone(),
        };

        if let Err(error) = node.execute(ctx).await {
            tracing::warn!(node_id = %id, %error, "node execution failed");
            core.set_status(NodeStatus::Error);
            self.events.emit(DocumentEvent::Failed {
                node_id: id.clone(),
                message: error.to_string(),
            });
        }
        self.events.emit(DocumentEvent::Status {
            node_id: id,
            status: core.status(),
        });
        Ok(())
    }
}

/// Handle passed to [`Node::execute`].
///
/// Scoped to one invocation: a connection fires at most once per context, no
/// matter how often the node forwards on its output.
pub struct ExecContext<'a> {
    rt: Runtime<'a>,
    node_id: NodeId,
    input: Option<String>,
    fired: RefCell<AHashSet<ConnectionId>>,
    cancel: CancellationToken,
}

impl<'a> ExecContext<'a> {
    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    /// The exec input this invocation entered through, `None` for a direct trigger.
    pub fn input(&self) -> Option<&str> {
        self.input.as_deref()
    }

    /// Continues the control flow on the exec output `key`.
    ///
    /// Targets run one after another in connection registration order. A
    /// failing target does not stop its siblings; the first error is returned
    /// once every target has run.
    pub async fn forward(&self, key: &str) -> Result<(), ControlFlowError> {
        let node = self
            .rt
            .graph
            .node(&self.node_id)
            .ok_or_else(|| ControlFlowError::NodeNotFound(self.node_id.clone()))?;
        if !node.core().is_exec_output(key) {
            return Err(ControlFlowError::UnknownExecOutput {
                node_id: self.node_id.clone(),
                key: key.to_string(),
            });
        }

        self.rt.events.emit(DocumentEvent::Forwarded {
            node_id: self.node_id.clone(),
            key: key.to_string(),
        });

        let targets: Vec<_> = self
            .rt
            .graph
            .connections_from(&self.node_id)
            .into_iter()
            .filter(|c| c.source_output == key)
            .filter(|c| self.fired.borrow_mut().insert(c.id.clone()))
            .collect();
        tracing::debug!(node_id = %self.node_id, key, targets = targets.len(), "forwarding");

        let mut first_error = None;
        for connection in targets {
            let result = self
                .rt
                .dispatch(connection.id, connection.target, connection.target_input)
                .await;
            if let Err(error) = result {
                tracing::warn!(node_id = %self.node_id, key, %error, "downstream branch failed");
                first_error.get_or_insert(error);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Output data of any node, through the shared dataflow cache.
    pub fn fetch(&self, id: &NodeId) -> Result<OutputData, DataflowError> {
        self.rt.dataflow.fetch(self.rt.graph, id)
    }

    pub fn fetch_inputs(&self) -> Result<InputData, DataflowError> {
        self.rt.dataflow.fetch_inputs(self.rt.graph, &self.node_id)
    }

    pub fn fetch_input_single(&self, key: &str) -> Result<Value, DataflowError> {
        self.rt
            .dataflow
            .fetch_input_single(self.rt.graph, &self.node_id, key)
    }

    pub fn fetch_input_multiple(&self, key: &str) -> Result<Vec<Value>, DataflowError> {
        self.rt
            .dataflow
            .fetch_input_multiple(self.rt.graph, &self.node_id, key)
    }

    pub fn fetch_input_required(&self, key: &str) -> Result<Value, DataflowError> {
        self.rt
            .dataflow
            .fetch_input_required(self.rt.graph, &self.node_id, key)
    }

    /// Drops the cached data of this node and of everything downstream of it.
    /// Call after mutating state that `data()` reads.
    pub fn reset_self(&self) {
        self.rt.dataflow.invalidate_from(self.rt.graph, &self.node_id);
    }

    pub fn set_status(&self, status: NodeStatus) {
        if let Some(node) = self.rt.graph.node(&self.node_id) {
            node.core().set_status(status);
        }
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
