//! Cascade deletion. Every structural edit that removes a node or a port goes
//! through these helpers so connections never outlive their endpoints.

use super::{Connection, Graph, NodeId};
use crate::error::GraphError;
use crate::node::{Node, Port, PortSide};
use std::rc::Rc;

impl Graph {
    /// Removes a node and every connection touching it.
    ///
    /// Returns the node and the removed connections, in registration order.
    pub fn remove_node(
        &mut self,
        id: &NodeId,
    ) -> Result<(Rc<dyn Node>, Vec<Connection>), GraphError> {
        if !self.nodes.contains_key(id) {
            return Err(GraphError::NodeNotFound(id.clone()));
        }

        let attached: Vec<_> = self
            .connections()
            .filter(|c| c.touches(id))
            .map(|c| c.id.clone())
            .collect();
        let removed = self.detach(&attached)?;

        let node = self
            .nodes
            .remove(id)
            .ok_or_else(|| GraphError::NodeNotFound(id.clone()))?;
        self.node_order.retain(|n| n != id);
        self.incoming.remove(id);
        self.outgoing.remove(id);
        Ok((node, removed))
    }

    /// Removes one port of a node together with the connections attached to it.
    ///
    /// Returns the removed port and connections.
    pub fn remove_port(
        &mut self,
        node_id: &NodeId,
        side: PortSide,
        key: &str,
    ) -> Result<(Port, Vec<Connection>), GraphError> {
        let node = self
            .node(node_id)
            .ok_or_else(|| GraphError::NodeNotFound(node_id.clone()))?;
        let exists = match side {
            PortSide::Input => node.core().has_input(key),
            PortSide::Output => node.core().has_output(key),
        };
        if !exists {
            return Err(GraphError::PortNotFound {
                node_id: node_id.clone(),
                side,
                key: key.to_string(),
            });
        }

        let attached: Vec<_> = self
            .connections_on_port(node_id, side, key)
            .into_iter()
            .map(|c| c.id)
            .collect();
        let removed = self.detach(&attached)?;

        let port = match side {
            PortSide::Input => node.core().take_input(key),
            PortSide::Output => node.core().take_output(key),
        }
        .ok_or_else(|| GraphError::PortNotFound {
            node_id: node_id.clone(),
            side,
            key: key.to_string(),
        })?;
        Ok((port, removed))
    }

    /// Removes the connections leaving `output_key` of `node_id` whose target
    /// socket no longer accepts the output's current schema.
    pub fn remove_incompatible(
        &mut self,
        node_id: &NodeId,
        output_key: &str,
    ) -> Result<Vec<Connection>, GraphError> {
        let Some(output) = self.node(node_id).and_then(|n| n.core().output(output_key)) else {
            return Ok(Vec::new());
        };
        let stale: Vec<_> = self
            .connections_on_port(node_id, PortSide::Output, output_key)
            .into_iter()
            .filter(|c| {
                self.node(&c.target)
                    .and_then(|n| n.core().input(&c.target_input))
                    .is_some_and(|input| !output.socket.is_compatible_with(&input.socket))
            })
            .map(|c| c.id)
            .collect();
        self.detach(&stale)
    }

    fn detach(&mut self, ids: &[super::ConnectionId]) -> Result<Vec<Connection>, GraphError> {
        ids.iter().map(|id| self.remove_connection(id)).collect()
    }
}
