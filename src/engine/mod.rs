//! The services that run a graph: dataflow resolution, control-flow execution
//! and schema propagation, plus the update channel they report on.

pub mod control;
pub mod dataflow;
pub mod events;
pub mod propagator;

pub use control::{ControlFlowEngine, ExecContext, FlowFuture, Runtime};
pub use dataflow::DataflowEngine;
pub use events::{DocumentEvent, EventBus};
pub use propagator::{SchemaContext, SchemaPropagator};
