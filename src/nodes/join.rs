use super::single_output;
use crate::error::NodeError;
use crate::graph::NodeId;
use crate::node::{Control, InputData, Node, NodeCore, OutputData, Port};
use crate::socket::{Schema, Socket};
use itertools::Itertools;
use serde_json::Value;

/// Joins every text connected to `parts`, in connection order.
pub struct JoinNode {
    core: NodeCore,
}

impl JoinNode {
    pub fn new() -> Self {
        Self::with_id(NodeId::new())
    }

    pub fn with_id(id: NodeId) -> Self {
        Self {
            core: NodeCore::new(id, "join", "Join")
                .with_control("separator", Control::text(" "))
                .with_input(Port::new("parts", Socket::new(Schema::String)).with_label("Parts"))
                .with_output(Port::new("text", Socket::new(Schema::String))),
        }
    }
}

impl Default for JoinNode {
    fn default() -> Self {
        Self::new()
    }
}

impl Node for JoinNode {
    fn core(&self) -> &NodeCore {
        &self.core
    }

    fn data(&self, inputs: &InputData) -> Result<OutputData, NodeError> {
        let separator = self
            .core
            .control_value("separator")
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();
        let text = inputs
            .get("parts")
            .into_iter()
            .flatten()
            .map(|part| match part {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .join(&separator);
        Ok(single_output("text", Some(Value::String(text))))
    }
}
