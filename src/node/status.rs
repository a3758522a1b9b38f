use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a node, observed by the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    #[default]
    Idle,
    Running,
    Completed,
    Error,
    Warning,
    Canceled,
}

impl NodeStatus {
    /// Returns `true` once a run has ended, successfully or not.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            NodeStatus::Completed | NodeStatus::Error | NodeStatus::Warning | NodeStatus::Canceled
        )
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeStatus::Idle => "idle",
            NodeStatus::Running => "running",
            NodeStatus::Completed => "completed",
            NodeStatus::Error => "error",
            NodeStatus::Warning => "warning",
            NodeStatus::Canceled => "canceled",
        };
        write!(f, "{}", name)
    }
}
