//! Node model: ports, controls, status and the traits node implementations fulfil.

pub mod base;
pub mod port;
pub mod status;

pub use base::*;
pub use port::*;
pub use status::*;

use crate::engine::{ExecContext, SchemaContext};
use crate::error::NodeError;
use crate::socket::Schema;
use ahash::AHashMap;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;

/// Output of a `data()` resolver, keyed by output port.
pub type OutputData = AHashMap<String, Value>;

/// Resolved inputs of a node: one ordered list of upstream values per input key.
pub type InputData = AHashMap<String, Vec<Value>>;

/// A boxed future for node execution. Not `Send`: nodes run on one logical thread.
pub type NodeFuture<'a> = Pin<Box<dyn Future<Output = Result<(), NodeError>> + 'a>>;

/// The core trait for all nodes in a graph.
///
/// A node exposes its ports through [`NodeCore`], computes output data with a pure
/// [`data`](Node::data) resolver, and may perform side effects in
/// [`execute`](Node::execute) when reached through an exec connection.
///
/// # Example
///
/// ```ignore
/// struct Greeting { core: NodeCore }
///
/// impl Node for Greeting {
///     fn core(&self) -> &NodeCore { &self.core }
///
///     fn data(&self, _inputs: &InputData) -> Result<OutputData, NodeError> {
///         Ok(OutputData::from_iter([("value".to_string(), json!("hello"))]))
///     }
/// }
/// ```
pub trait Node {
    fn core(&self) -> &NodeCore;

    /// Computes the node's data outputs from its resolved inputs.
    ///
    /// Must return a value for every non-exec output the node declares; the dataflow
    /// engine rejects partial results.
    fn data(&self, _inputs: &InputData) -> Result<OutputData, NodeError> {
        Ok(OutputData::default())
    }

    /// Runs the node's side effect. Call [`ExecContext::forward`] to continue the
    /// control flow on one or more exec outputs.
    ///
    /// Nodes with a long-running effect must refuse re-entry while busy
    /// (see [`NodeCore::try_begin`]).
    fn execute<'a>(&'a self, ctx: ExecContext<'a>) -> NodeFuture<'a> {
        drop(ctx);
        Box::pin(async { Ok(()) })
    }

    /// Returns the dynamic-schema capability if the node has one.
    fn as_dynamic(&self) -> Option<&dyn DynamicSchemaNode> {
        None
    }

    /// Hook run after a control value changed. Returns the output keys whose
    /// schema changed as a consequence.
    fn control_changed(&self, _key: &str) -> Vec<String> {
        Vec::new()
    }

    fn serialize_control_value(&self, _key: &str, control: &Control) -> Value {
        control.value().clone()
    }

    fn deserialize_control_value(&self, key: &str, value: Value) -> Result<(), NodeError> {
        self.core().set_control_value(key, value)?;
        self.control_changed(key);
        Ok(())
    }

    /// Persists dynamically created ports. `None` means the port set is static.
    fn serialize_inputs(&self) -> Option<Value> {
        None
    }

    fn deserialize_inputs(&self, _inputs: Value) -> Result<(), NodeError> {
        Ok(())
    }
}

/// The schema of the output port on the other end of a connection.
#[derive(Debug, Clone, PartialEq)]
pub struct PeerSchema {
    pub type_name: String,
    pub schema: Schema,
}

/// Describes a connection change on one input of a dynamic-schema node.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaChange {
    pub input_key: String,
    /// Whether the input is connected after the change.
    pub connected: bool,
    /// The connected peer, present whenever `connected` is `true`.
    pub peer: Option<PeerSchema>,
}

/// Capability of nodes whose ports and schemas follow their connections.
pub trait DynamicSchemaNode {
    /// Recomputes derived schemas and ports after a connection on `change.input_key`
    /// was added or removed. Returns the output keys whose schema changed.
    fn on_connection_changed_schema(
        &self,
        change: &SchemaChange,
        ctx: &mut SchemaContext<'_>,
    ) -> Result<Vec<String>, NodeError>;

    /// Idempotently recomputes everything from the current connection state.
    fn setup_schema(&self, ctx: &mut SchemaContext<'_>) -> Result<Vec<String>, NodeError>;
}
