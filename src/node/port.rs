use crate::error::NodeError;
use crate::socket::{Schema, Socket};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Which editor widget a control renders as, and which values it accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlKind {
    /// Boolean toggle.
    Switch,
    /// Numeric value input.
    Number,
    /// Text value input.
    Text,
    /// Arbitrary JSON.
    Untyped,
}

impl ControlKind {
    /// Picks the editor for a port carrying `schema`.
    pub fn for_schema(schema: &Schema) -> Self {
        match schema {
            Schema::Boolean => ControlKind::Switch,
            Schema::Number => ControlKind::Number,
            Schema::String => ControlKind::Text,
            _ => ControlKind::Untyped,
        }
    }

    pub fn default_value(self) -> Value {
        match self {
            ControlKind::Switch => Value::Bool(false),
            ControlKind::Number => Value::from(0),
            ControlKind::Text => Value::String(String::new()),
            ControlKind::Untyped => Value::Null,
        }
    }

    pub fn accepts(self, value: &Value) -> bool {
        match self {
            ControlKind::Switch => value.is_boolean(),
            ControlKind::Number => value.is_number(),
            ControlKind::Text => value.is_string(),
            ControlKind::Untyped => true,
        }
    }
}

/// An editable value attached to a node or an input port.
#[derive(Debug, Clone, PartialEq)]
pub struct Control {
    kind: ControlKind,
    value: Value,
}

impl Control {
    pub fn new(kind: ControlKind) -> Self {
        Self {
            kind,
            value: kind.default_value(),
        }
    }

    pub fn switch(value: bool) -> Self {
        Self {
            kind: ControlKind::Switch,
            value: Value::Bool(value),
        }
    }

    pub fn number(value: f64) -> Self {
        Self {
            kind: ControlKind::Number,
            value: Value::from(value),
        }
    }

    pub fn text(value: impl Into<String>) -> Self {
        Self {
            kind: ControlKind::Text,
            value: Value::String(value.into()),
        }
    }

    pub fn untyped(value: Value) -> Self {
        Self {
            kind: ControlKind::Untyped,
            value,
        }
    }

    pub fn kind(&self) -> ControlKind {
        self.kind
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn set_value(&mut self, key: &str, value: Value) -> Result<(), NodeError> {
        if !self.kind.accepts(&value) {
            return Err(NodeError::InvalidControlValue {
                key: key.to_string(),
                kind: self.kind,
                value,
            });
        }
        self.value = value;
        Ok(())
    }
}

/// Whether a port is an input or output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortSide {
    Input,
    Output,
}

impl std::fmt::Display for PortSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PortSide::Input => write!(f, "input"),
            PortSide::Output => write!(f, "output"),
        }
    }
}

/// A named socket attached to a node.
#[derive(Debug, Clone)]
pub struct Port {
    /// Port key, unique per side of a node (e.g., "exec", "value").
    pub key: String,
    /// Label shown in the editor.
    pub label: String,
    /// Socket carrying the type and schema.
    pub socket: Socket,
    /// Inline editor used while the port is not connected.
    pub control: Option<Control>,
    /// Whether the inline editor is visible.
    pub show_control: bool,
    /// Whether the node needs a value on this port.
    pub required: bool,
}

impl Port {
    pub fn new(key: impl Into<String>, socket: Socket) -> Self {
        let key = key.into();
        Self {
            label: key.clone(),
            key,
            socket,
            control: None,
            show_control: false,
            required: false,
        }
    }

    /// Create a control-flow port.
    pub fn exec(key: impl Into<String>) -> Self {
        Self::new(key, Socket::exec())
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Attach an inline control, shown by default.
    pub fn with_control(mut self, control: Control) -> Self {
        self.control = Some(control);
        self.show_control = true;
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn is_exec(&self) -> bool {
        self.socket.is_exec()
    }
}
