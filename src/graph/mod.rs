//! Topology: nodes, connections and the queries both engines run against them.

mod cascade;
pub mod ids;

pub use ids::*;

use crate::error::GraphError;
use crate::node::{Node, PortSide};
use ahash::AHashMap;
use std::rc::Rc;

/// A directed edge from one node's output port to another node's input port.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Connection {
    pub id: ConnectionId,
    pub source: NodeId,
    pub source_output: String,
    pub target: NodeId,
    pub target_input: String,
}

impl Connection {
    pub fn new(
        source: NodeId,
        source_output: impl Into<String>,
        target: NodeId,
        target_input: impl Into<String>,
    ) -> Self {
        Self {
            id: ConnectionId::new(),
            source,
            source_output: source_output.into(),
            target,
            target_input: target_input.into(),
        }
    }

    /// Returns `true` if the connection touches `node_id` on either end.
    pub fn touches(&self, node_id: &NodeId) -> bool {
        &self.source == node_id || &self.target == node_id
    }

    fn same_endpoints(&self, other: &Connection) -> bool {
        self.source == other.source
            && self.source_output == other.source_output
            && self.target == other.target
            && self.target_input == other.target_input
    }
}

/// Read-only topology queries the engines depend on.
pub trait GraphQuery {
    fn node(&self, id: &NodeId) -> Option<Rc<dyn Node>>;

    /// Connections whose target is `target`, in registration order.
    fn connections_into(&self, target: &NodeId) -> Vec<Connection>;

    /// Connections whose source is `source`, in registration order.
    fn connections_from(&self, source: &NodeId) -> Vec<Connection>;
}

/// The node and connection collection of one open document.
///
/// Connections can only be registered between existing ports with compatible
/// sockets, and every removal goes through the cascade helpers, so the graph
/// never holds a connection that references a missing node or port.
#[derive(Default)]
pub struct Graph {
    nodes: AHashMap<NodeId, Rc<dyn Node>>,
    node_order: Vec<NodeId>,
    connections: AHashMap<ConnectionId, Connection>,
    connection_order: Vec<ConnectionId>,
    incoming: AHashMap<NodeId, Vec<ConnectionId>>,
    outgoing: AHashMap<NodeId, Vec<ConnectionId>>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, node: Rc<dyn Node>) -> Result<NodeId, GraphError> {
        let id = node.core().id().clone();
        if self.nodes.contains_key(&id) {
            return Err(GraphError::DuplicateNode(id));
        }
        self.nodes.insert(id.clone(), node);
        self.node_order.push(id.clone());
        Ok(id)
    }

    pub fn node(&self, id: &NodeId) -> Option<Rc<dyn Node>> {
        self.nodes.get(id).cloned()
    }

    pub fn contains_node(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &Rc<dyn Node>> {
        self.node_order.iter().filter_map(|id| self.nodes.get(id))
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn connection(&self, id: &ConnectionId) -> Option<&Connection> {
        self.connections.get(id)
    }

    /// Connections in registration order.
    pub fn connections(&self) -> impl Iterator<Item = &Connection> {
        self.connection_order
            .iter()
            .filter_map(|id| self.connections.get(id))
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn connections_into(&self, target: &NodeId) -> Vec<Connection> {
        self.collect(self.incoming.get(target))
    }

    pub fn connections_from(&self, source: &NodeId) -> Vec<Connection> {
        self.collect(self.outgoing.get(source))
    }

    /// Connections attached to one port of a node, in registration order.
    pub fn connections_on_port(&self, node_id: &NodeId, side: PortSide, key: &str) -> Vec<Connection> {
        match side {
            PortSide::Input => self
                .connections_into(node_id)
                .into_iter()
                .filter(|c| c.target_input == key)
                .collect(),
            PortSide::Output => self
                .connections_from(node_id)
                .into_iter()
                .filter(|c| c.source_output == key)
                .collect(),
        }
    }

    /// Creates and registers a connection between two existing ports.
    pub fn connect(
        &mut self,
        source: &NodeId,
        source_output: &str,
        target: &NodeId,
        target_input: &str,
    ) -> Result<ConnectionId, GraphError> {
        self.add_connection(Connection::new(
            source.clone(),
            source_output,
            target.clone(),
            target_input,
        ))
    }

    /// Registers a connection after validating both endpoints and their sockets.
    pub fn add_connection(&mut self, connection: Connection) -> Result<ConnectionId, GraphError> {
        let source_node = self
            .nodes
            .get(&connection.source)
            .ok_or_else(|| GraphError::NodeNotFound(connection.source.clone()))?;
        let target_node = self
            .nodes
            .get(&connection.target)
            .ok_or_else(|| GraphError::NodeNotFound(connection.target.clone()))?;

        let source_port = source_node
            .core()
            .output(&connection.source_output)
            .ok_or_else(|| GraphError::PortNotFound {
                node_id: connection.source.clone(),
                side: PortSide::Output,
                key: connection.source_output.clone(),
            })?;
        let target_port = target_node
            .core()
            .input(&connection.target_input)
            .ok_or_else(|| GraphError::PortNotFound {
                node_id: connection.target.clone(),
                side: PortSide::Input,
                key: connection.target_input.clone(),
            })?;

        if !source_port.socket.is_compatible_with(&target_port.socket) {
            return Err(GraphError::IncompatibleSockets {
                source_node_id: connection.source.clone(),
                source_type: source_port.socket.type_name(),
                target_node_id: connection.target.clone(),
                target_type: target_port.socket.type_name(),
            });
        }

        if self.connections().any(|c| c.same_endpoints(&connection)) {
            return Err(GraphError::DuplicateConnection {
                source_node_id: connection.source.clone(),
                source_output: connection.source_output.clone(),
                target_node_id: connection.target.clone(),
                target_input: connection.target_input.clone(),
            });
        }

        let id = connection.id.clone();
        self.outgoing
            .entry(connection.source.clone())
            .or_default()
            .push(id.clone());
        self.incoming
            .entry(connection.target.clone())
            .or_default()
            .push(id.clone());
        self.connection_order.push(id.clone());
        self.connections.insert(id.clone(), connection);
        Ok(id)
    }

    pub fn remove_connection(&mut self, id: &ConnectionId) -> Result<Connection, GraphError> {
        let connection = self
            .connections
            .remove(id)
            .ok_or_else(|| GraphError::ConnectionNotFound(id.clone()))?;
        self.connection_order.retain(|c| c != id);
        if let Some(ids) = self.outgoing.get_mut(&connection.source) {
            ids.retain(|c| c != id);
        }
        if let Some(ids) = self.incoming.get_mut(&connection.target) {
            ids.retain(|c| c != id);
        }
        Ok(connection)
    }

    /// Reorders connections to follow `order`. Connections not listed keep their
    /// relative order after the listed ones.
    pub fn restore_order(&mut self, order: &[ConnectionId]) {
        let rank: AHashMap<&ConnectionId, usize> =
            order.iter().enumerate().map(|(i, id)| (id, i)).collect();
        let key = |id: &ConnectionId| rank.get(id).copied().unwrap_or(usize::MAX);
        self.connection_order.sort_by_key(|id| key(id));
        for ids in self.incoming.values_mut().chain(self.outgoing.values_mut()) {
            ids.sort_by_key(|id| key(id));
        }
    }

    /// Verifies that every connection references existing nodes and ports.
    pub fn check_integrity(&self) -> Result<(), GraphError> {
        for connection in self.connections() {
            let source = self
                .nodes
                .get(&connection.source)
                .ok_or_else(|| GraphError::NodeNotFound(connection.source.clone()))?;
            if !source.core().has_output(&connection.source_output) {
                return Err(GraphError::PortNotFound {
                    node_id: connection.source.clone(),
                    side: PortSide::Output,
                    key: connection.source_output.clone(),
                });
            }
            let target = self
                .nodes
                .get(&connection.target)
                .ok_or_else(|| GraphError::NodeNotFound(connection.target.clone()))?;
            if !target.core().has_input(&connection.target_input) {
                return Err(GraphError::PortNotFound {
                    node_id: connection.target.clone(),
                    side: PortSide::Input,
                    key: connection.target_input.clone(),
                });
            }
        }
        Ok(())
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    fn collect(&self, ids: Option<&Vec<ConnectionId>>) -> Vec<Connection> {
        ids.map(|ids| {
            ids.iter()
                .filter_map(|id| self.connections.get(id).cloned())
                .collect()
        })
        .unwrap_or_default()
    }
}

impl GraphQuery for Graph {
    fn node(&self, id: &NodeId) -> Option<Rc<dyn Node>> {
        Graph::node(self, id)
    }

    fn connections_into(&self, target: &NodeId) -> Vec<Connection> {
        Graph::connections_into(self, target)
    }

    fn connections_from(&self, source: &NodeId) -> Vec<Connection> {
        Graph::connections_from(self, source)
    }
}
