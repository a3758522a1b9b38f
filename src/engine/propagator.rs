use super::dataflow::DataflowEngine;
use super::events::{DocumentEvent, EventBus};
use crate::error::NodeError;
use crate::graph::{Connection, Graph, NodeId};
use crate::node::{PeerSchema, Port, PortSide, SchemaChange};

/// Mutable view of the graph handed to dynamic-schema hooks.
///
/// Port removals go through the graph's cascade helpers; the connections they
/// drop are collected so the propagator can report them.
pub struct SchemaContext<'a> {
    graph: &'a mut Graph,
    node_id: NodeId,
    removed: Vec<Connection>,
}

impl<'a> SchemaContext<'a> {
    pub fn new(graph: &'a mut Graph, node_id: NodeId) -> Self {
        Self {
            graph,
            node_id,
            removed: Vec::new(),
        }
    }

    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    pub fn is_connected(&self, input_key: &str) -> bool {
        !self
            .graph
            .connections_on_port(&self.node_id, PortSide::Input, input_key)
            .is_empty()
    }

    /// Schema of the output feeding `input_key`. With several connections on
    /// the same input, the most recently registered one wins.
    pub fn peer_of(&self, input_key: &str) -> Option<PeerSchema> {
        let connection = self
            .graph
            .connections_on_port(&self.node_id, PortSide::Input, input_key)
            .pop()?;
        let port = self
            .graph
            .node(&connection.source)?
            .core()
            .output(&connection.source_output)?;
        Some(PeerSchema {
            type_name: port.socket.type_name(),
            schema: port.socket.schema(),
        })
    }

    /// Removes an input port of the node, cascading to its connections.
    pub fn remove_input(&mut self, key: &str) -> Result<Port, NodeError> {
        let node_id = self.node_id.clone();
        let (port, removed) = self.graph.remove_port(&node_id, PortSide::Input, key)?;
        self.removed.extend(removed);
        Ok(port)
    }

    /// Removes an output port of the node, cascading to its connections.
    pub fn remove_output(&mut self, key: &str) -> Result<Port, NodeError> {
        let node_id = self.node_id.clone();
        let (port, removed) = self.graph.remove_port(&node_id, PortSide::Output, key)?;
        self.removed.extend(removed);
        Ok(port)
    }

    fn into_removed(self) -> Vec<Connection> {
        self.removed
    }
}

/// Reacts to connection changes on dynamic-schema nodes.
///
/// Propagation is one hop: the node at the end of the changed connection
/// recomputes its ports and schemas, and nodes further downstream are left
/// alone unless the caller asks for [`ripple`](SchemaPropagator::ripple).
/// The exception is a downstream connection the new output schema no longer
/// satisfies: it is removed, and its target reacts as to any disconnection.
pub struct SchemaPropagator<'a> {
    pub dataflow: &'a DataflowEngine,
    pub events: &'a EventBus,
}

impl<'a> SchemaPropagator<'a> {
    pub fn new(dataflow: &'a DataflowEngine, events: &'a EventBus) -> Self {
        Self { dataflow, events }
    }

    /// Notifies the target of `connection` that the connection was added or removed.
    ///
    /// Returns the output keys whose schema changed. Targets without the
    /// dynamic capability, or whose port no longer exists, yield nothing.
    pub fn connection_changed(
        &self,
        graph: &mut Graph,
        connection: &Connection,
    ) -> Result<Vec<String>, NodeError> {
        let Some(node) = graph.node(&connection.target) else {
            return Ok(Vec::new());
        };
        let Some(dynamic) = node.as_dynamic() else {
            return Ok(Vec::new());
        };
        if !node.core().has_input(&connection.target_input) {
            return Ok(Vec::new());
        }

        let mut ctx = SchemaContext::new(graph, connection.target.clone());
        let connected = ctx.is_connected(&connection.target_input);
        let change = SchemaChange {
            input_key: connection.target_input.clone(),
            connected,
            peer: if connected {
                ctx.peer_of(&connection.target_input)
            } else {
                None
            },
        };
        tracing::debug!(
            node_id = %connection.target,
            input = %change.input_key,
            connected,
            "propagating schema change"
        );

        let changed = dynamic.on_connection_changed_schema(&change, &mut ctx)?;
        let removed = ctx.into_removed();
        self.finish(graph, &connection.target, &changed, removed)?;
        Ok(changed)
    }

    /// Recomputes a dynamic node's ports and schemas from the current connections.
    pub fn setup(&self, graph: &mut Graph, node_id: &NodeId) -> Result<Vec<String>, NodeError> {
        let Some(node) = graph.node(node_id) else {
            return Ok(Vec::new());
        };
        let Some(dynamic) = node.as_dynamic() else {
            return Ok(Vec::new());
        };

        let mut ctx = SchemaContext::new(graph, node_id.clone());
        let changed = dynamic.setup_schema(&mut ctx)?;
        let removed = ctx.into_removed();
        self.finish(graph, node_id, &changed, removed)?;
        Ok(changed)
    }

    /// Propagates one more hop: notifies every target connected to the changed
    /// outputs of `node_id`. Returns the targets that reported changes of their own.
    pub fn ripple(
        &self,
        graph: &mut Graph,
        node_id: &NodeId,
        keys: &[String],
    ) -> Result<Vec<(NodeId, Vec<String>)>, NodeError> {
        self.prune(graph, node_id, keys)?;
        let downstream: Vec<Connection> = graph
            .connections_from(node_id)
            .into_iter()
            .filter(|c| keys.contains(&c.source_output))
            .collect();

        let mut reshaped = Vec::new();
        for connection in downstream {
            let changed = self.connection_changed(graph, &connection)?;
            if !changed.is_empty() {
                reshaped.push((connection.target.clone(), changed));
            }
        }
        Ok(reshaped)
    }

    /// Drops the connections out of `keys` whose targets no longer accept the
    /// retyped outputs. Each former target is told about its lost connection.
    pub fn prune(
        &self,
        graph: &mut Graph,
        node_id: &NodeId,
        keys: &[String],
    ) -> Result<Vec<Connection>, NodeError> {
        let mut stale = Vec::new();
        for key in keys {
            stale.extend(graph.remove_incompatible(node_id, key)?);
        }
        for connection in &stale {
            tracing::debug!(
                connection_id = %connection.id,
                node_id = %node_id,
                output = %connection.source_output,
                "dropping connection the new schema no longer satisfies"
            );
            self.events.emit(DocumentEvent::Disconnected(connection.clone()));
            self.dataflow.invalidate_from(&*graph, &connection.target);
            self.connection_changed(graph, connection)?;
        }
        Ok(stale)
    }

    fn finish(
        &self,
        graph: &mut Graph,
        node_id: &NodeId,
        changed: &[String],
        removed: Vec<Connection>,
    ) -> Result<(), NodeError> {
        self.dataflow.reset(Some(node_id));
        for connection in removed {
            self.events.emit(DocumentEvent::Disconnected(connection));
        }
        if !changed.is_empty() {
            self.events.emit(DocumentEvent::Reshaped {
                node_id: node_id.clone(),
                outputs: changed.to_vec(),
            });
            self.prune(graph, node_id, changed)?;
        }
        Ok(())
    }
}
