//! Built-in node implementations, registered by default in every
//! [`NodeRegistry`](crate::registry::NodeRegistry).

mod counter;
mod delay;
mod display;
mod flow;
mod join;
mod object;
mod passthrough;
mod source;

pub use counter::CounterNode;
pub use delay::DelayNode;
pub use display::DisplayNode;
pub use flow::{BranchNode, SequenceNode};
pub use join::JoinNode;
pub use object::ObjectNode;
pub use passthrough::PassthroughNode;
pub use source::{JsonNode, NumberNode, TextNode};

use crate::node::OutputData;
use serde_json::Value;

fn single_output(key: &str, value: Option<Value>) -> OutputData {
    OutputData::from_iter([(key.to_string(), value.unwrap_or(Value::Null))])
}
