use super::single_output;
use crate::engine::SchemaContext;
use crate::error::NodeError;
use crate::graph::NodeId;
use crate::node::{DynamicSchemaNode, InputData, Node, NodeCore, OutputData, Port, SchemaChange};
use crate::socket::{Schema, Socket};

/// Hands its input through unchanged. The output socket mirrors whatever is
/// connected to `value` and falls back to `any` once disconnected.
pub struct PassthroughNode {
    core: NodeCore,
}

impl PassthroughNode {
    pub fn new() -> Self {
        Self::with_id(NodeId::new())
    }

    pub fn with_id(id: NodeId) -> Self {
        Self {
            core: NodeCore::new(id, "passthrough", "Passthrough")
                .with_input(Port::new("value", Socket::any()))
                .with_output(Port::new("value", Socket::any())),
        }
    }

    fn mirror(&self, type_name: &str, schema: Schema) -> Vec<String> {
        let Some(port) = self.core.output("value") else {
            return Vec::new();
        };
        if port.socket.set_schema(type_name, schema) {
            self.core.touch();
            vec!["value".to_string()]
        } else {
            Vec::new()
        }
    }
}

impl Default for PassthroughNode {
    fn default() -> Self {
        Self::new()
    }
}

impl Node for PassthroughNode {
    fn core(&self) -> &NodeCore {
        &self.core
    }

    fn data(&self, inputs: &InputData) -> Result<OutputData, NodeError> {
        let value = inputs.get("value").and_then(|values| values.first().cloned());
        Ok(single_output("value", value))
    }

    fn as_dynamic(&self) -> Option<&dyn DynamicSchemaNode> {
        Some(self)
    }
}

impl DynamicSchemaNode for PassthroughNode {
    fn on_connection_changed_schema(
        &self,
        change: &SchemaChange,
        _ctx: &mut SchemaContext<'_>,
    ) -> Result<Vec<String>, NodeError> {
        if change.input_key != "value" {
            return Ok(Vec::new());
        }
        Ok(match &change.peer {
            Some(peer) if change.connected => self.mirror(&peer.type_name, peer.schema.clone()),
            _ => self.mirror("any", Schema::Any),
        })
    }

    fn setup_schema(&self, ctx: &mut SchemaContext<'_>) -> Result<Vec<String>, NodeError> {
        Ok(match ctx.peer_of("value") {
            Some(peer) => self.mirror(&peer.type_name, peer.schema),
            None => self.mirror("any", Schema::Any),
        })
    }
}
