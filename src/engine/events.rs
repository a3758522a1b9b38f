use crate::graph::{Connection, NodeId};
use crate::node::NodeStatus;
use tokio::sync::broadcast;

/// Update notifications published on a document's broadcast channel.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentEvent {
    NodeAdded(NodeId),
    NodeRemoved(NodeId),
    Connected(Connection),
    Disconnected(Connection),
    /// A node's ports or output schemas changed; `outputs` lists the changed output keys.
    Reshaped { node_id: NodeId, outputs: Vec<String> },
    ControlChanged { node_id: NodeId, key: String },
    /// A node finished an `execute` call and now reports `status`.
    Status { node_id: NodeId, status: NodeStatus },
    Forwarded { node_id: NodeId, key: String },
    Failed { node_id: NodeId, message: String },
}

/// Sending half of the document update channel.
///
/// Publishing never fails: events sent while nobody listens are dropped.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<DocumentEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn emit(&self, event: DocumentEvent) {
        tracing::trace!(?event, "document event");
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DocumentEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
