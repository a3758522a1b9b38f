use super::{Control, NodeStatus, Port};
use crate::error::NodeError;
use crate::graph::NodeId;
use serde_json::Value;
use std::cell::{Cell, RefCell};
use tokio::sync::watch;

/// State every node carries: identity, ports, controls and status.
///
/// Node implementations embed a `NodeCore` and expose it through
/// [`Node::core`](super::Node::core). All accessors take `&self`; the port maps
/// and controls use single-threaded interior mutability so a node can reshape
/// itself while other parts of the document hold a handle to it.
pub struct NodeCore {
    id: NodeId,
    type_name: String,
    label: String,
    inputs: RefCell<Vec<Port>>,
    outputs: RefCell<Vec<Port>>,
    controls: RefCell<Vec<(String, Control)>>,
    status: watch::Sender<NodeStatus>,
    revision: Cell<u64>,
}

impl NodeCore {
    pub fn new(id: NodeId, type_name: impl Into<String>, label: impl Into<String>) -> Self {
        let (status, _) = watch::channel(NodeStatus::Idle);
        Self {
            id,
            type_name: type_name.into(),
            label: label.into(),
            inputs: RefCell::new(Vec::new()),
            outputs: RefCell::new(Vec::new()),
            controls: RefCell::new(Vec::new()),
            status,
            revision: Cell::new(0),
        }
    }

    pub fn with_input(self, port: Port) -> Self {
        self.add_input(port);
        self
    }

    pub fn with_output(self, port: Port) -> Self {
        self.add_output(port);
        self
    }

    pub fn with_control(self, key: impl Into<String>, control: Control) -> Self {
        self.controls.borrow_mut().push((key.into(), control));
        self
    }

    pub fn id(&self) -> &NodeId {
        &self.id
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    // --- Ports ---

    pub fn inputs(&self) -> Vec<Port> {
        self.inputs.borrow().clone()
    }

    pub fn outputs(&self) -> Vec<Port> {
        self.outputs.borrow().clone()
    }

    pub fn input(&self, key: &str) -> Option<Port> {
        self.inputs.borrow().iter().find(|p| p.key == key).cloned()
    }

    pub fn output(&self, key: &str) -> Option<Port> {
        self.outputs.borrow().iter().find(|p| p.key == key).cloned()
    }

    pub fn has_input(&self, key: &str) -> bool {
        self.inputs.borrow().iter().any(|p| p.key == key)
    }

    pub fn has_output(&self, key: &str) -> bool {
        self.outputs.borrow().iter().any(|p| p.key == key)
    }

    /// Adds an input port, replacing any port with the same key in place.
    pub fn add_input(&self, port: Port) {
        upsert(&mut self.inputs.borrow_mut(), port);
        self.touch();
    }

    /// Adds an output port, replacing any port with the same key in place.
    pub fn add_output(&self, port: Port) {
        upsert(&mut self.outputs.borrow_mut(), port);
        self.touch();
    }

    /// Detaches an input port. Callers go through the graph's cascade helpers so
    /// no connection is left pointing at the removed key.
    pub(crate) fn take_input(&self, key: &str) -> Option<Port> {
        let mut inputs = self.inputs.borrow_mut();
        let index = inputs.iter().position(|p| p.key == key)?;
        let port = inputs.remove(index);
        drop(inputs);
        self.touch();
        Some(port)
    }

    pub(crate) fn take_output(&self, key: &str) -> Option<Port> {
        let mut outputs = self.outputs.borrow_mut();
        let index = outputs.iter().position(|p| p.key == key)?;
        let port = outputs.remove(index);
        drop(outputs);
        self.touch();
        Some(port)
    }

    /// Input keys that carry data (everything except exec ports), in declaration order.
    pub fn data_input_keys(&self) -> Vec<String> {
        self.inputs
            .borrow()
            .iter()
            .filter(|p| !p.is_exec())
            .map(|p| p.key.clone())
            .collect()
    }

    /// Output keys a `data()` resolver must produce.
    pub fn data_output_keys(&self) -> Vec<String> {
        self.outputs
            .borrow()
            .iter()
            .filter(|p| !p.is_exec())
            .map(|p| p.key.clone())
            .collect()
    }

    pub fn is_exec_input(&self, key: &str) -> bool {
        self.inputs
            .borrow()
            .iter()
            .any(|p| p.key == key && p.is_exec())
    }

    pub fn is_exec_output(&self, key: &str) -> bool {
        self.outputs
            .borrow()
            .iter()
            .any(|p| p.key == key && p.is_exec())
    }

    /// Returns `true` if the node takes part in control flow at all.
    pub fn has_exec_ports(&self) -> bool {
        self.inputs.borrow().iter().any(Port::is_exec)
            || self.outputs.borrow().iter().any(Port::is_exec)
    }

    /// `(key, type name)` of every output, for the UI.
    pub fn output_schema_names(&self) -> Vec<(String, String)> {
        self.outputs
            .borrow()
            .iter()
            .map(|p| (p.key.clone(), p.socket.type_name()))
            .collect()
    }

    // --- Controls ---

    /// Node-level controls, in declaration order. Port controls are not included.
    pub fn controls(&self) -> Vec<(String, Control)> {
        self.controls.borrow().clone()
    }

    /// Node-level controls followed by the inline controls of input ports.
    pub fn all_controls(&self) -> Vec<(String, Control)> {
        let mut controls = self.controls();
        controls.extend(
            self.inputs
                .borrow()
                .iter()
                .filter_map(|p| p.control.clone().map(|c| (p.key.clone(), c))),
        );
        controls
    }

    /// Looks up a control by key: node-level controls first, then input port controls.
    pub fn control(&self, key: &str) -> Option<Control> {
        if let Some((_, control)) = self.controls.borrow().iter().find(|(k, _)| k == key) {
            return Some(control.clone());
        }
        self.inputs
            .borrow()
            .iter()
            .find(|p| p.key == key)
            .and_then(|p| p.control.clone())
    }

    pub fn control_value(&self, key: &str) -> Option<Value> {
        self.control(key).map(|c| c.value().clone())
    }

    /// Convenience accessor for numeric controls.
    pub fn control_f64(&self, key: &str) -> Option<f64> {
        self.control_value(key).and_then(|v| v.as_f64())
    }

    pub fn set_control_value(&self, key: &str, value: Value) -> Result<(), NodeError> {
        if let Some((_, control)) = self
            .controls
            .borrow_mut()
            .iter_mut()
            .find(|(k, _)| k == key)
        {
            return control.set_value(key, value);
        }
        let mut inputs = self.inputs.borrow_mut();
        let control = inputs
            .iter_mut()
            .find(|p| p.key == key)
            .and_then(|p| p.control.as_mut())
            .ok_or_else(|| NodeError::UnknownControl(key.to_string()))?;
        control.set_value(key, value)
    }

    // --- Status ---

    pub fn status(&self) -> NodeStatus {
        *self.status.borrow()
    }

    pub fn set_status(&self, status: NodeStatus) {
        self.status.send_replace(status);
    }

    /// Subscribes to status changes. The receiver sees the current value immediately.
    pub fn subscribe_status(&self) -> watch::Receiver<NodeStatus> {
        self.status.subscribe()
    }

    /// Marks the node as running unless it already is.
    ///
    /// Returns `false` when a run is in progress; the caller must not start a second one.
    pub fn try_begin(&self) -> bool {
        if self.status() == NodeStatus::Running {
            return false;
        }
        self.set_status(NodeStatus::Running);
        true
    }

    // --- Shape revision ---

    /// Monotonic counter bumped whenever the port set changes.
    pub fn revision(&self) -> u64 {
        self.revision.get()
    }

    pub fn touch(&self) {
        self.revision.set(self.revision.get() + 1);
    }
}

impl std::fmt::Debug for NodeCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeCore")
            .field("id", &self.id)
            .field("type_name", &self.type_name)
            .field("inputs", &self.inputs.borrow())
            .field("outputs", &self.outputs.borrow())
            .field("controls", &self.controls.borrow())
            .field("status", &self.status())
            .finish()
    }
}

fn upsert(ports: &mut Vec<Port>, port: Port) {
    match ports.iter_mut().find(|p| p.key == port.key) {
        Some(existing) => *existing = port,
        None => ports.push(port),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::socket::{Schema, Socket};
    use serde_json::json;

    fn sample() -> NodeCore {
        NodeCore::new(NodeId::new(), "sample", "Sample")
            .with_input(Port::exec("exec"))
            .with_input(
                Port::new("flag", Socket::new(Schema::Boolean)).with_control(Control::switch(false)),
            )
            .with_output(Port::exec("exec"))
            .with_output(Port::new("value", Socket::new(Schema::Number)))
            .with_control("count", Control::number(3.0))
    }

    #[test]
    fn splits_exec_and_data_ports() {
        let core = sample();
        assert_eq!(core.data_input_keys(), vec!["flag"]);
        assert_eq!(core.data_output_keys(), vec!["value"]);
        assert!(core.is_exec_input("exec"));
        assert!(!core.is_exec_output("value"));
        assert!(core.has_exec_ports());
    }

    #[test]
    fn control_lookup_covers_port_controls() {
        let core = sample();
        core.set_control_value("flag", json!(true)).unwrap();
        assert_eq!(core.control_value("flag"), Some(json!(true)));
        core.set_control_value("count", json!(1)).unwrap();
        assert_eq!(core.control_f64("count"), Some(1.0));
        assert!(matches!(
            core.set_control_value("missing", json!(1)),
            Err(NodeError::UnknownControl(_))
        ));
    }

    #[test]
    fn busy_guard() {
        let core = sample();
        let status = core.subscribe_status();
        assert!(core.try_begin());
        assert!(!core.try_begin());
        assert_eq!(*status.borrow(), NodeStatus::Running);
        core.set_status(NodeStatus::Completed);
        assert!(core.try_begin());
    }

    #[test]
    fn upsert_keeps_position_and_bumps_revision() {
        let core = sample();
        let before = core.revision();
        core.add_input(Port::new("flag", Socket::any()));
        assert_eq!(core.inputs()[1].key, "flag");
        assert_eq!(core.inputs()[1].socket.schema(), Schema::Any);
        assert!(core.revision() > before);
    }
}
