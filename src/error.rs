use crate::graph::{ConnectionId, NodeId};
use crate::node::{ControlKind, PortSide};
use serde_json::Value;
use thiserror::Error;

/// Errors raised by topology edits on a [`Graph`](crate::graph::Graph).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphError {
    #[error("Node '{0}' does not exist in the graph")]
    NodeNotFound(NodeId),

    #[error("Node '{0}' is already part of the graph")]
    DuplicateNode(NodeId),

    #[error("Node '{node_id}' has no {side} port '{key}'")]
    PortNotFound {
        node_id: NodeId,
        side: PortSide,
        key: String,
    },

    #[error(
        "Cannot connect '{source_type}' output of node '{source_node_id}' to '{target_type}' input of node '{target_node_id}'"
    )]
    IncompatibleSockets {
        source_node_id: NodeId,
        source_type: String,
        target_node_id: NodeId,
        target_type: String,
    },

    #[error("A connection from '{source_node_id}.{source_output}' to '{target_node_id}.{target_input}' already exists")]
    DuplicateConnection {
        source_node_id: NodeId,
        source_output: String,
        target_node_id: NodeId,
        target_input: String,
    },

    #[error("Connection '{0}' does not exist in the graph")]
    ConnectionNotFound(ConnectionId),
}

/// Errors raised by a node implementation.
#[derive(Error, Debug, Clone)]
pub enum NodeError {
    #[error("{0}")]
    Failed(String),

    #[error("Node has no control named '{0}'")]
    UnknownControl(String),

    #[error("Control '{key}' of kind {kind:?} cannot hold value '{value}'")]
    InvalidControlValue {
        key: String,
        kind: ControlKind,
        value: Value,
    },

    #[error("Invalid persisted inputs: {0}")]
    InvalidInputs(String),

    #[error("Operation was canceled")]
    Canceled,

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Dataflow(Box<DataflowError>),

    #[error(transparent)]
    ControlFlow(Box<ControlFlowError>),
}

impl From<DataflowError> for NodeError {
    fn from(error: DataflowError) -> Self {
        NodeError::Dataflow(Box::new(error))
    }
}

impl From<ControlFlowError> for NodeError {
    fn from(error: ControlFlowError) -> Self {
        NodeError::ControlFlow(Box::new(error))
    }
}

/// Errors that can occur while resolving node output data.
#[derive(Error, Debug, Clone)]
pub enum DataflowError {
    #[error("Node '{0}' does not exist")]
    NodeNotFound(NodeId),

    #[error("Connection '{connection_id}' references missing node '{node_id}'")]
    DanglingConnection {
        connection_id: ConnectionId,
        node_id: NodeId,
    },

    #[error("Resolver of node '{node_id}' did not produce declared outputs: {}", .missing.join(", "))]
    ResolverContract {
        node_id: NodeId,
        missing: Vec<String>,
    },

    #[error("Resolver of node '{node_id}' failed: {source}")]
    Resolver {
        node_id: NodeId,
        #[source]
        source: Box<NodeError>,
    },

    #[error("Required input '{key}' of node '{node_id}' has no value")]
    MissingRequiredInput { node_id: NodeId, key: String },
}

/// Errors raised by the control-flow walk itself. Failures inside a node's
/// `execute` are recorded on the node and never surface here.
#[derive(Error, Debug, Clone)]
pub enum ControlFlowError {
    #[error("Node '{0}' does not exist")]
    NodeNotFound(NodeId),

    #[error("Connection '{connection_id}' references missing node '{node_id}'")]
    DanglingConnection {
        connection_id: ConnectionId,
        node_id: NodeId,
    },

    #[error("Node '{node_id}' has no exec input '{key}'")]
    UnknownExecInput { node_id: NodeId, key: String },

    #[error("Node '{node_id}' has no exec output '{key}'")]
    UnknownExecOutput { node_id: NodeId, key: String },
}

/// Errors that can occur when loading or saving a graph document.
#[derive(Error, Debug, Clone)]
pub enum DocumentError {
    #[error("Failed to parse graph document JSON: {0}")]
    JsonParseError(String),

    #[error("Node '{node_id}' has an unregistered node type: '{type_name}'")]
    InvalidNodeType { node_id: NodeId, type_name: String },

    #[error("Failed to restore node '{node_id}': {source}")]
    NodeRestore {
        node_id: NodeId,
        #[source]
        source: NodeError,
    },

    #[error("Node '{node_id}' rejected the edit: {source}")]
    Node {
        node_id: NodeId,
        #[source]
        source: NodeError,
    },

    #[error("Schema propagation on node '{node_id}' failed: {source}")]
    Propagation {
        node_id: NodeId,
        #[source]
        source: NodeError,
    },

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Conversion(#[from] DocumentConversionError),

    #[error("I/O error on '{path}': {message}")]
    Io { path: String, message: String },
}

/// Errors that can occur when converting a custom user format into a Kairo `GraphDocument`.
#[derive(Error, Debug, Clone)]
pub enum DocumentConversionError {
    #[error("Invalid custom data: {0}")]
    ValidationError(String),
}
