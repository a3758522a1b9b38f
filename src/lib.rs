//! # Kairo - Node-Graph Execution Core
//!
//! **Kairo** runs visually assembled node graphs. A graph mixes two kinds of
//! edges: *data* connections, resolved lazily and memoized by the dataflow
//! engine, and *exec* connections, walked by the control-flow engine when a
//! node is triggered. Ports carry structural schemas; nodes with dynamic
//! ports reshape themselves when their connections change.
//!
//! ## Core Workflow
//!
//! 1.  **Build or Load a Graph**: Create a [`Document`](document::Document), then add
//!     nodes and connections, or load a saved [`GraphDocument`](document::GraphDocument).
//! 2.  **Pull Data**: Call [`Document::fetch`](document::Document::fetch) to resolve a
//!     node's outputs. Results are cached until something upstream changes.
//! 3.  **Trigger Execution**: Call [`Document::execute`](document::Document::execute) to
//!     run a node's side effect and follow its exec outputs.
//! 4.  **Observe**: Subscribe to the document's update channel and to per-node status.
//! 5.  **Revert**: Structural edits are recorded; [`Document::undo`](document::Document::undo)
//!     and [`Document::redo`](document::Document::redo) replay them.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use kairo::prelude::*;
//! use serde_json::json;
//!
//! # fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
//! let mut document = Document::new();
//! let text = document.create_node("text")?;
//! let display = document.create_node("display")?;
//! document.connect(&text, "value", &display, "value")?;
//! document.set_control_value(&text, "value", json!("hello"))?;
//!
//! tokio_test::block_on(document.execute(&display))?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Custom Nodes
//!
//! Implement [`Node`](node::Node) on a struct embedding a [`NodeCore`](node::NodeCore)
//! and register it with [`DocumentBuilder::with_node_type`](document::DocumentBuilder::with_node_type).
//! Nodes whose ports follow their connections also implement
//! [`DynamicSchemaNode`](node::DynamicSchemaNode).

pub mod document;
pub mod engine;
pub mod error;
pub mod graph;
pub mod node;
pub mod nodes;
pub mod prelude;
pub mod registry;
pub mod socket;

pub use serde_json::Value;
