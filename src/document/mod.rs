//! One open graph with its engines.
//!
//! Every structural edit goes through [`Document`], which keeps the graph, the
//! dataflow cache and dynamic schemas consistent and reports changes on the
//! update channel. Edits are recorded for [`Document::undo`] and
//! [`Document::redo`].

mod conversion;
mod history;
mod persist;

pub use conversion::*;
pub use history::*;
pub use persist::*;

use crate::engine::{
    ControlFlowEngine, DataflowEngine, DocumentEvent, EventBus, Runtime, SchemaPropagator,
};
use crate::error::{ControlFlowError, DataflowError, DocumentError, GraphError, NodeError};
use crate::graph::{Connection, ConnectionId, Graph, NodeId};
use crate::node::{InputData, Node, OutputData};
use crate::registry::NodeRegistry;
use ahash::AHashMap;
use serde_json::{Map, Value};
use std::path::Path;
use std::rc::Rc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

/// Configures a [`Document`].
pub struct DocumentBuilder {
    registry: NodeRegistry,
    event_capacity: usize,
    history_limit: usize,
    cancellation: Option<CancellationToken>,
}

impl DocumentBuilder {
    pub fn new() -> Self {
        Self {
            registry: NodeRegistry::with_builtins(),
            event_capacity: 256,
            history_limit: 100,
            cancellation: None,
        }
    }

    /// Replaces the node registry, built-ins included.
    pub fn with_registry(mut self, registry: NodeRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Loads nodes saved as `user_type_name` with the built-in `builtin_type_name`.
    pub fn with_type_mapping(mut self, user_type_name: &str, builtin_type_name: &str) -> Self {
        self.registry.map_type(user_type_name, builtin_type_name);
        self
    }

    pub fn with_node_type<F, N>(mut self, type_name: &str, factory: F) -> Self
    where
        F: Fn(NodeId) -> N + 'static,
        N: Node + 'static,
    {
        self.registry.register(type_name, factory);
        self
    }

    /// Capacity of the update channel. Slow subscribers lag beyond it.
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Number of edits kept for undo. Zero disables the history.
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    /// Uses an externally owned token for the first run's cancellation.
    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub fn build(self) -> Document {
        Document {
            graph: Graph::new(),
            dataflow: DataflowEngine::new(),
            control: self
                .cancellation
                .map(ControlFlowEngine::with_token)
                .unwrap_or_default(),
            events: EventBus::new(self.event_capacity),
            registry: self.registry,
            layout: AHashMap::new(),
            history: History::new(self.history_limit),
        }
    }
}

impl Default for DocumentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Graph state taken before an edit.
struct Snapshot {
    connections: Vec<Connection>,
    controls: Vec<(NodeId, String, Value)>,
}

pub struct Document {
    graph: Graph,
    dataflow: DataflowEngine,
    control: ControlFlowEngine,
    events: EventBus,
    registry: NodeRegistry,
    layout: AHashMap<NodeId, NodeLayout>,
    history: History,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn builder() -> DocumentBuilder {
        DocumentBuilder::new()
    }

    /// An empty document with the built-in node types.
    pub fn new() -> Self {
        DocumentBuilder::new().build()
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn registry(&self) -> &NodeRegistry {
        &self.registry
    }

    pub fn dataflow(&self) -> &DataflowEngine {
        &self.dataflow
    }

    pub fn node(&self, id: &NodeId) -> Option<Rc<dyn Node>> {
        self.graph.node(id)
    }

    /// Subscribes to document updates.
    pub fn subscribe(&self) -> broadcast::Receiver<DocumentEvent> {
        self.events.subscribe()
    }

    // --- Structural edits ---

    /// Inserts a node. Dynamic-schema nodes get their schemas set up right away.
    pub fn add_node(&mut self, node: Rc<dyn Node>) -> Result<NodeId, DocumentError> {
        let before = self.snapshot();
        let id = self.insert_node(node.clone())?;
        self.record(Edit::AddNode { node }, before);
        Ok(id)
    }

    /// Creates a node of a registered type and inserts it.
    pub fn create_node(&mut self, type_name: &str) -> Result<NodeId, DocumentError> {
        let node = self.registry.create(type_name, NodeId::new())?;
        self.add_node(node)
    }

    /// Removes a node and every connection touching it.
    ///
    /// Former downstream neighbours see their connections disappear: their
    /// schemas are re-propagated and their cached data is dropped.
    pub fn remove_node(&mut self, id: &NodeId) -> Result<Vec<Connection>, DocumentError> {
        let node = self
            .graph
            .node(id)
            .ok_or_else(|| GraphError::NodeNotFound(id.clone()))?;
        let layout = self.layout(id);
        let before = self.snapshot();
        let removed = self.delete_node(id)?;
        self.record(Edit::RemoveNode { node, layout }, before);
        Ok(removed)
    }

    pub fn connect(
        &mut self,
        source: &NodeId,
        source_output: &str,
        target: &NodeId,
        target_input: &str,
    ) -> Result<ConnectionId, DocumentError> {
        self.add_connection(Connection::new(
            source.clone(),
            source_output,
            target.clone(),
            target_input,
        ))
    }

    /// Adds a prebuilt connection, keeping its id.
    pub fn add_connection(&mut self, connection: Connection) -> Result<ConnectionId, DocumentError> {
        let before = self.snapshot();
        let id = self.attach(connection.clone())?;
        self.record(Edit::Connect { connection }, before);
        Ok(id)
    }

    pub fn disconnect(&mut self, id: &ConnectionId) -> Result<Connection, DocumentError> {
        let before = self.snapshot();
        let connection = self.detach(id)?;
        self.record(
            Edit::Disconnect {
                connection: connection.clone(),
            },
            before,
        );
        Ok(connection)
    }

    /// Sets a control value and returns the output keys whose schema changed.
    ///
    /// Cached data of the node and everything downstream is dropped; schema
    /// changes are propagated to the direct downstream neighbours.
    pub fn set_control_value(
        &mut self,
        id: &NodeId,
        key: &str,
        value: Value,
    ) -> Result<Vec<String>, DocumentError> {
        let previous = self
            .graph
            .node(id)
            .and_then(|node| node.core().control_value(key));
        let before = self.snapshot();
        let changed = self.write_control(id, key, value.clone())?;
        if let Some(previous) = previous {
            self.record(
                Edit::SetControl {
                    node_id: id.clone(),
                    key: key.to_string(),
                    before: previous,
                    after: value,
                },
                before,
            );
        }
        Ok(changed)
    }

    /// Propagates schema changes of `keys` on `id` one hop downstream.
    ///
    /// Returns the neighbours whose outputs changed as a result; rippling again
    /// from them continues the propagation. Not recorded in the edit history.
    pub fn ripple(
        &mut self,
        id: &NodeId,
        keys: &[String],
    ) -> Result<Vec<(NodeId, Vec<String>)>, DocumentError> {
        let propagator = SchemaPropagator::new(&self.dataflow, &self.events);
        let reshaped = propagator
            .ripple(&mut self.graph, id, keys)
            .map_err(|source| DocumentError::Propagation {
                node_id: id.clone(),
                source,
            })?;
        for (node_id, _) in &reshaped {
            self.dataflow.invalidate_from(&self.graph, node_id);
        }
        Ok(reshaped)
    }

    pub fn layout(&self, id: &NodeId) -> NodeLayout {
        self.layout.get(id).copied().unwrap_or_default()
    }

    pub fn set_layout(&mut self, id: &NodeId, layout: NodeLayout) {
        self.layout.insert(id.clone(), layout);
    }

    /// Removes every node and connection. The edit history is discarded.
    pub fn clear(&mut self) {
        self.graph.clear();
        self.dataflow.reset(None);
        self.layout.clear();
        self.history.clear();
    }

    // --- History ---

    /// Reverts the most recent edit. Returns `false` when there is nothing to undo.
    pub fn undo(&mut self) -> Result<bool, DocumentError> {
        let Some(entry) = self.history.take_undo() else {
            return Ok(false);
        };
        tracing::debug!(edit = entry.edit.label(), "undo");
        self.revert(&entry)?;
        self.history.push_undone(entry);
        Ok(true)
    }

    /// Re-applies the most recently undone edit.
    pub fn redo(&mut self) -> Result<bool, DocumentError> {
        let Some(entry) = self.history.take_redo() else {
            return Ok(false);
        };
        tracing::debug!(edit = entry.edit.label(), "redo");
        self.reapply(&entry.edit)?;
        self.history.push_redone(entry);
        Ok(true)
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Reverts an edit, then puts back its side effects: dropped connections,
    /// control values of rebuilt ports and the connection order.
    fn revert(&mut self, entry: &Entry) -> Result<(), DocumentError> {
        match &entry.edit {
            Edit::AddNode { node } => {
                self.delete_node(node.core().id())?;
            }
            Edit::RemoveNode { node, layout } => {
                let id = self.insert_node(node.clone())?;
                self.layout.insert(id, *layout);
            }
            Edit::Connect { connection } => {
                self.detach(&connection.id)?;
            }
            Edit::Disconnect { connection } => {
                self.attach(connection.clone())?;
            }
            Edit::SetControl {
                node_id,
                key,
                before,
                ..
            } => {
                self.write_control(node_id, key, before.clone())?;
            }
        }
        self.restore_connections(entry.dropped.clone(), true)?;
        for (node_id, key, value) in &entry.controls {
            let current = self
                .graph
                .node(node_id)
                .and_then(|node| node.core().control_value(key));
            if current.is_some_and(|current| &current != value) {
                self.write_control(node_id, key, value.clone())?;
            }
        }
        self.graph.restore_order(&entry.order);
        Ok(())
    }

    fn reapply(&mut self, edit: &Edit) -> Result<(), DocumentError> {
        match edit {
            Edit::AddNode { node } => {
                self.insert_node(node.clone())?;
            }
            Edit::RemoveNode { node, .. } => {
                self.delete_node(node.core().id())?;
            }
            Edit::Connect { connection, .. } => {
                self.attach(connection.clone())?;
            }
            Edit::Disconnect { connection, .. } => {
                self.detach(&connection.id)?;
            }
            Edit::SetControl {
                node_id,
                key,
                after,
                ..
            } => {
                self.write_control(node_id, key, after.clone())?;
            }
        }
        Ok(())
    }

    // --- Dataflow ---

    pub fn fetch(&self, id: &NodeId) -> Result<OutputData, DataflowError> {
        self.dataflow.fetch(&self.graph, id)
    }

    pub fn fetch_inputs(&self, id: &NodeId) -> Result<InputData, DataflowError> {
        self.dataflow.fetch_inputs(&self.graph, id)
    }

    /// Drops cached data of one node (or all nodes). Does not cascade.
    pub fn reset(&self, id: Option<&NodeId>) {
        self.dataflow.reset(id);
    }

    // --- Control flow ---

    /// Triggers a node directly.
    pub async fn execute(&self, id: &NodeId) -> Result<(), ControlFlowError> {
        let cancel = self.control.token();
        self.runtime(&cancel).execute(id.clone(), None).await
    }

    /// Triggers a node through one of its exec inputs.
    pub async fn execute_input(&self, id: &NodeId, input: &str) -> Result<(), ControlFlowError> {
        let cancel = self.control.token();
        self.runtime(&cancel)
            .execute(id.clone(), Some(input.to_string()))
            .await
    }

    /// Cancels every run in progress.
    pub fn cancel(&self) {
        self.control.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.control.token()
    }

    fn runtime<'a>(&'a self, cancel: &'a CancellationToken) -> Runtime<'a> {
        Runtime {
            graph: &self.graph,
            dataflow: &self.dataflow,
            events: &self.events,
            cancel,
        }
    }

    // --- Persistence ---

    pub fn save(&self) -> GraphDocument {
        let nodes = self
            .graph
            .nodes()
            .map(|node| {
                let core = node.core();
                let data: Map<String, Value> = core
                    .all_controls()
                    .iter()
                    .map(|(key, control)| (key.clone(), node.serialize_control_value(key, control)))
                    .collect();
                let layout = self.layout(core.id());
                NodeRecord {
                    id: core.id().clone(),
                    type_name: core.type_name().to_string(),
                    position: layout.position,
                    size: layout.size,
                    data,
                    inputs: node.serialize_inputs(),
                }
            })
            .collect();
        let connections = self.graph.connections().map(ConnectionRecord::from).collect();
        GraphDocument { nodes, connections }
    }

    /// Replaces the document's contents with a saved graph.
    ///
    /// Nodes are created through the registry and restored from their control
    /// data and persisted inputs before any connection is added. Dynamic nodes
    /// then recompute their schemas from the restored connections.
    ///
    /// On failure the previous contents stay in place. The edit history is
    /// discarded only once the load succeeded.
    pub fn load(&mut self, document: GraphDocument) -> Result<(), DocumentError> {
        let graph = std::mem::take(&mut self.graph);
        let layout = std::mem::take(&mut self.layout);
        self.dataflow.reset(None);

        match self.populate(document) {
            Ok(()) => {
                self.history.clear();
                tracing::debug!(
                    nodes = self.graph.node_count(),
                    connections = self.graph.connection_count(),
                    "loaded document"
                );
                Ok(())
            }
            Err(error) => {
                tracing::warn!(%error, "load failed, keeping previous contents");
                self.graph = graph;
                self.layout = layout;
                self.dataflow.reset(None);
                Err(error)
            }
        }
    }

    /// Converts a custom format and loads it.
    pub fn load_from(&mut self, source: impl IntoDocument) -> Result<(), DocumentError> {
        self.load(source.into_document()?)
    }

    pub fn from_json(json: &str) -> Result<Self, DocumentError> {
        let mut document = Self::new();
        document.load(GraphDocument::from_json(json)?)?;
        Ok(document)
    }

    pub fn to_json(&self) -> Result<String, DocumentError> {
        self.save().to_json()
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, DocumentError> {
        let mut document = Self::new();
        document.load(GraphDocument::from_file(path)?)?;
        Ok(document)
    }

    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), DocumentError> {
        self.save().save(path)
    }

    /// Adds saved connections. A connection into an output whose schema is
    /// derived from another connection can only be validated once that other
    /// connection exists, so incompatible connections are retried until no
    /// further progress is made. `announce` reports each one on the update channel.
    fn restore_connections(
        &mut self,
        mut pending: Vec<Connection>,
        announce: bool,
    ) -> Result<(), DocumentError> {
        while !pending.is_empty() {
            let before = pending.len();
            let mut deferred = Vec::new();
            let mut last_error = None;

            for connection in pending {
                match self.graph.add_connection(connection.clone()) {
                    Ok(_) => {
                        if announce {
                            self.events.emit(DocumentEvent::Connected(connection.clone()));
                        }
                        self.connection_changed(&connection)?;
                    }
                    Err(error @ GraphError::IncompatibleSockets { .. }) => {
                        deferred.push(connection);
                        last_error = Some(error);
                    }
                    Err(error) => return Err(error.into()),
                }
            }

            if deferred.len() == before {
                if let Some(error) = last_error {
                    return Err(error.into());
                }
            }
            pending = deferred;
        }
        Ok(())
    }

    fn populate(&mut self, document: GraphDocument) -> Result<(), DocumentError> {
        for record in document.nodes {
            let node = self.registry.create(&record.type_name, record.id.clone())?;
            let restore = |source: NodeError| DocumentError::NodeRestore {
                node_id: record.id.clone(),
                source,
            };
            // Derived ports first: their controls are part of `data`.
            if let Some(inputs) = record.inputs.clone() {
                node.deserialize_inputs(inputs).map_err(restore)?;
            }
            for (key, value) in record.data.iter() {
                node.deserialize_control_value(key, value.clone())
                    .map_err(restore)?;
            }
            self.layout.insert(record.id.clone(), record.layout());
            self.graph.add_node(node)?;
        }

        let connections = document.connections.into_iter().map(Connection::from).collect();
        self.restore_connections(connections, false)?;

        let dynamic: Vec<NodeId> = self
            .graph
            .nodes()
            .filter(|node| node.as_dynamic().is_some())
            .map(|node| node.core().id().clone())
            .collect();
        for id in &dynamic {
            self.setup(id)?;
        }
        Ok(())
    }

    fn insert_node(&mut self, node: Rc<dyn Node>) -> Result<NodeId, DocumentError> {
        let id = self.graph.add_node(node)?;
        self.events.emit(DocumentEvent::NodeAdded(id.clone()));
        self.setup(&id)?;
        Ok(id)
    }

    fn delete_node(&mut self, id: &NodeId) -> Result<Vec<Connection>, DocumentError> {
        let (_, removed) = self.graph.remove_node(id)?;
        self.dataflow.reset(Some(id));
        self.layout.remove(id);

        for connection in &removed {
            self.events.emit(DocumentEvent::Disconnected(connection.clone()));
            if &connection.target != id {
                self.dataflow.invalidate_from(&self.graph, &connection.target);
                self.propagate(connection)?;
            }
        }
        self.events.emit(DocumentEvent::NodeRemoved(id.clone()));
        tracing::debug!(node_id = %id, connections = removed.len(), "removed node");
        Ok(removed)
    }

    fn attach(&mut self, connection: Connection) -> Result<ConnectionId, DocumentError> {
        let id = self.graph.add_connection(connection.clone())?;
        self.events.emit(DocumentEvent::Connected(connection.clone()));
        self.connection_changed(&connection)?;
        Ok(id)
    }

    fn detach(&mut self, id: &ConnectionId) -> Result<Connection, DocumentError> {
        let connection = self.graph.remove_connection(id)?;
        self.events.emit(DocumentEvent::Disconnected(connection.clone()));
        self.connection_changed(&connection)?;
        Ok(connection)
    }

    fn write_control(
        &mut self,
        id: &NodeId,
        key: &str,
        value: Value,
    ) -> Result<Vec<String>, DocumentError> {
        let node = self
            .graph
            .node(id)
            .ok_or_else(|| GraphError::NodeNotFound(id.clone()))?;
        node.core()
            .set_control_value(key, value)
            .map_err(|source| DocumentError::Node {
                node_id: id.clone(),
                source,
            })?;
        let changed = node.control_changed(key);

        self.dataflow.invalidate_from(&self.graph, id);
        self.events.emit(DocumentEvent::ControlChanged {
            node_id: id.clone(),
            key: key.to_string(),
        });
        if !changed.is_empty() {
            self.events.emit(DocumentEvent::Reshaped {
                node_id: id.clone(),
                outputs: changed.clone(),
            });
            self.ripple(id, &changed)?;
        }
        Ok(changed)
    }

    fn snapshot(&self) -> Snapshot {
        let connections = self.graph.connections().cloned().collect();
        let mut controls = Vec::new();
        for node in self.graph.nodes().filter(|node| node.as_dynamic().is_some()) {
            let core = node.core();
            for (key, control) in core.all_controls() {
                controls.push((core.id().clone(), key, control.value().clone()));
            }
        }
        Snapshot {
            connections,
            controls,
        }
    }

    /// Records `edit`, diffing the connections against the state before it.
    fn record(&mut self, edit: Edit, before: Snapshot) {
        if !self.history.is_enabled() {
            return;
        }
        let own = edit.removed_connection().cloned();
        let dropped = before
            .connections
            .iter()
            .filter(|c| Some(&c.id) != own.as_ref() && self.graph.connection(&c.id).is_none())
            .cloned()
            .collect();
        let order = before.connections.into_iter().map(|c| c.id).collect();
        self.history.record(Entry {
            edit,
            dropped,
            controls: before.controls,
            order,
        });
    }

    fn connection_changed(&mut self, connection: &Connection) -> Result<(), DocumentError> {
        self.propagate(connection)?;
        self.dataflow.invalidate_from(&self.graph, &connection.target);
        Ok(())
    }

    fn propagate(&mut self, connection: &Connection) -> Result<Vec<String>, DocumentError> {
        let propagator = SchemaPropagator::new(&self.dataflow, &self.events);
        propagator
            .connection_changed(&mut self.graph, connection)
            .map_err(|source| DocumentError::Propagation {
                node_id: connection.target.clone(),
                source,
            })
    }

    fn setup(&mut self, id: &NodeId) -> Result<Vec<String>, DocumentError> {
        let propagator = SchemaPropagator::new(&self.dataflow, &self.events);
        propagator
            .setup(&mut self.graph, id)
            .map_err(|source| DocumentError::Propagation {
                node_id: id.clone(),
                source,
            })
    }
}
