//! Data sources: nodes whose output is a control value.

use super::single_output;
use crate::error::NodeError;
use crate::graph::NodeId;
use crate::node::{Control, InputData, Node, NodeCore, OutputData, Port};
use crate::socket::{Schema, Socket};

/// Emits its `value` text control on the `value` output.
pub struct TextNode {
    core: NodeCore,
}

impl TextNode {
    pub fn new() -> Self {
        Self::with_id(NodeId::new())
    }

    pub fn with_id(id: NodeId) -> Self {
        Self {
            core: NodeCore::new(id, "text", "Text")
                .with_control("value", Control::text(""))
                .with_output(Port::new("value", Socket::new(Schema::String))),
        }
    }
}

impl Default for TextNode {
    fn default() -> Self {
        Self::new()
    }
}

impl Node for TextNode {
    fn core(&self) -> &NodeCore {
        &self.core
    }

    fn data(&self, _inputs: &InputData) -> Result<OutputData, NodeError> {
        Ok(single_output("value", self.core.control_value("value")))
    }
}

/// Emits its `value` number control on the `value` output.
pub struct NumberNode {
    core: NodeCore,
}

impl NumberNode {
    pub fn new() -> Self {
        Self::with_id(NodeId::new())
    }

    pub fn with_id(id: NodeId) -> Self {
        Self {
            core: NodeCore::new(id, "number", "Number")
                .with_control("value", Control::number(0.0))
                .with_output(Port::new("value", Socket::new(Schema::Number))),
        }
    }
}

impl Default for NumberNode {
    fn default() -> Self {
        Self::new()
    }
}

impl Node for NumberNode {
    fn core(&self) -> &NodeCore {
        &self.core
    }

    fn data(&self, _inputs: &InputData) -> Result<OutputData, NodeError> {
        Ok(single_output("value", self.core.control_value("value")))
    }
}

/// Emits an arbitrary JSON value. The output socket follows the shape of the value.
pub struct JsonNode {
    core: NodeCore,
}

impl JsonNode {
    pub fn new() -> Self {
        Self::with_id(NodeId::new())
    }

    pub fn with_id(id: NodeId) -> Self {
        Self {
            core: NodeCore::new(id, "json", "JSON")
                .with_control("value", Control::untyped(serde_json::Value::Null))
                .with_output(Port::new("value", Socket::any())),
        }
    }
}

impl Default for JsonNode {
    fn default() -> Self {
        Self::new()
    }
}

impl Node for JsonNode {
    fn core(&self) -> &NodeCore {
        &self.core
    }

    fn data(&self, _inputs: &InputData) -> Result<OutputData, NodeError> {
        Ok(single_output("value", self.core.control_value("value")))
    }

    fn control_changed(&self, key: &str) -> Vec<String> {
        if key != "value" {
            return Vec::new();
        }
        let schema = match self.core.control_value("value") {
            Some(serde_json::Value::Null) | None => Schema::Any,
            Some(value) => Schema::infer(&value),
        };
        let Some(port) = self.core.output("value") else {
            return Vec::new();
        };
        if port.socket.set_schema(schema.name(), schema) {
            self.core.touch();
            vec!["value".to_string()]
        } else {
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_output_follows_the_value() {
        let node = JsonNode::new();
        node.core()
            .set_control_value("value", json!({"a": 1, "b": [true]}))
            .unwrap();
        assert_eq!(node.control_changed("value"), vec!["value".to_string()]);

        let schema = node.core().output("value").unwrap().socket.schema();
        assert_eq!(
            schema,
            Schema::object([("a", Schema::Number), ("b", Schema::array(Schema::Boolean))])
        );
        assert!(node.control_changed("value").is_empty());
    }
}
