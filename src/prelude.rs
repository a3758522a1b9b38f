//! Prelude module for convenient imports
//!
//! This module re-exports the most commonly used types and traits from the kairo crate.
//! Import this module to get access to the core functionality without having to import
//! each type individually.
//!
//! # Example
//!
//! ```rust,no_run
//! use kairo::prelude::*;
//!
//! # fn run_example() -> Result<()> {
//! let document = Document::from_file("path/to/graph.json")?;
//! for node in document.graph().nodes() {
//!     println!("{} ({})", node.core().label(), node.core().status());
//! }
//! # Ok(())
//! # }
//! ```

// Documents and persistence
pub use crate::document::{Document, DocumentBuilder, GraphDocument, IntoDocument};

// Engines
pub use crate::engine::{DataflowEngine, DocumentEvent, ExecContext, SchemaContext};

// Graph and node model
pub use crate::graph::{Connection, ConnectionId, Graph, GraphQuery, NodeId};
pub use crate::node::{
    Control, ControlKind, DynamicSchemaNode, InputData, Node, NodeCore, NodeFuture, NodeStatus,
    OutputData, Port, SchemaChange,
};
pub use crate::registry::NodeRegistry;
pub use crate::socket::{Schema, Socket};

// Error types
pub use crate::error::{
    ControlFlowError, DataflowError, DocumentError, GraphError, NodeError,
};

// Result type alias for convenience
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;
