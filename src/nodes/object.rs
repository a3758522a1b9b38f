use super::single_output;
use crate::engine::SchemaContext;
use crate::error::NodeError;
use crate::graph::NodeId;
use crate::node::{
    Control, ControlKind, DynamicSchemaNode, InputData, Node, NodeCore, OutputData, Port,
    SchemaChange,
};
use crate::socket::{Schema, Socket};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cell::RefCell;
use std::collections::BTreeMap;

const FIELD_PREFIX: &str = "field.";

fn field_key(name: &str) -> String {
    format!("{}{}", FIELD_PREFIX, name)
}

/// Persisted form of the derived port set. Field values travel with the
/// node's control data.
#[derive(Debug, Serialize, Deserialize)]
struct DerivedInputs {
    properties: BTreeMap<String, Schema>,
}

/// Builds an object from per-property inputs.
///
/// Connecting an object-shaped output to `shape` derives one input port per
/// property, keyed `field.<name>`, each with an inline control matching the
/// property's schema. The `object` output carries the same object schema.
pub struct ObjectNode {
    core: NodeCore,
    derived: RefCell<Option<BTreeMap<String, Schema>>>,
}

impl ObjectNode {
    pub fn new() -> Self {
        Self::with_id(NodeId::new())
    }

    pub fn with_id(id: NodeId) -> Self {
        Self {
            core: NodeCore::new(id, "object", "Object")
                .with_input(Port::new("shape", Socket::any()).with_label("Shape"))
                .with_output(Port::new("object", Socket::any())),
            derived: RefCell::new(None),
        }
    }

    /// The property schemas the field ports were derived from.
    pub fn derived_properties(&self) -> Option<BTreeMap<String, Schema>> {
        self.derived.borrow().clone()
    }

    fn field_port(name: &str, schema: &Schema) -> Port {
        Port::new(field_key(name), Socket::new(schema.clone()))
            .with_label(name)
            .with_control(Control::new(ControlKind::for_schema(schema)))
    }

    /// Replaces the derived port set. Ports whose schema is unchanged keep
    /// their connections and control values.
    fn rebuild(
        &self,
        ctx: &mut SchemaContext<'_>,
        properties: Option<BTreeMap<String, Schema>>,
    ) -> Result<Vec<String>, NodeError> {
        let previous = self.derived.borrow().clone().unwrap_or_default();
        let next = properties.clone().unwrap_or_default();

        for (name, schema) in &previous {
            let key = field_key(name);
            if next.get(name) != Some(schema) && self.core.has_input(&key) {
                ctx.remove_input(&key)?;
            }
        }
        for (name, schema) in &next {
            if !self.core.has_input(&field_key(name)) {
                self.core.add_input(Self::field_port(name, schema));
            }
        }

        *self.derived.borrow_mut() = properties;
        Ok(self.refresh_output())
    }

    fn refresh_output(&self) -> Vec<String> {
        let schema = match &*self.derived.borrow() {
            Some(properties) => Schema::Object {
                properties: properties.clone(),
            },
            None => Schema::Any,
        };
        let Some(port) = self.core.output("object") else {
            return Vec::new();
        };
        if port.socket.set_schema(schema.name(), schema) {
            self.core.touch();
            vec!["object".to_string()]
        } else {
            Vec::new()
        }
    }
}

impl Default for ObjectNode {
    fn default() -> Self {
        Self::new()
    }
}

impl Node for ObjectNode {
    fn core(&self) -> &NodeCore {
        &self.core
    }

    fn data(&self, inputs: &InputData) -> Result<OutputData, NodeError> {
        let mut object = Map::new();
        if let Some(properties) = &*self.derived.borrow() {
            for name in properties.keys() {
                let key = field_key(name);
                let value = inputs
                    .get(&key)
                    .and_then(|values| values.first().cloned())
                    .or_else(|| self.core.control_value(&key))
                    .unwrap_or(Value::Null);
                object.insert(name.clone(), value);
            }
        }
        Ok(single_output("object", Some(Value::Object(object))))
    }

    fn as_dynamic(&self) -> Option<&dyn DynamicSchemaNode> {
        Some(self)
    }

    fn serialize_inputs(&self) -> Option<Value> {
        let properties = self.derived.borrow().clone()?;
        serde_json::to_value(DerivedInputs { properties }).ok()
    }

    fn deserialize_inputs(&self, inputs: Value) -> Result<(), NodeError> {
        if inputs.is_null() {
            return Ok(());
        }
        let restored: DerivedInputs =
            serde_json::from_value(inputs).map_err(|e| NodeError::InvalidInputs(e.to_string()))?;

        for (name, schema) in &restored.properties {
            self.core.add_input(Self::field_port(name, schema));
        }
        *self.derived.borrow_mut() = Some(restored.properties);
        self.refresh_output();
        Ok(())
    }
}

impl DynamicSchemaNode for ObjectNode {
    fn on_connection_changed_schema(
        &self,
        change: &SchemaChange,
        ctx: &mut SchemaContext<'_>,
    ) -> Result<Vec<String>, NodeError> {
        if change.input_key != "shape" {
            return Ok(Vec::new());
        }
        let properties = match &change.peer {
            Some(peer) if change.connected => peer.schema.properties().cloned(),
            _ => None,
        };
        self.rebuild(ctx, properties)
    }

    fn setup_schema(&self, ctx: &mut SchemaContext<'_>) -> Result<Vec<String>, NodeError> {
        let properties = match ctx.peer_of("shape") {
            Some(peer) => peer.schema.properties().cloned(),
            None => self.derived.borrow().clone(),
        };
        self.rebuild(ctx, properties)
    }
}
