//! Edit history as an explicit command log.
//!
//! Every structural edit made through a [`Document`](super::Document) records
//! an [`Entry`]: the [`Edit`] itself plus the side effects schema propagation
//! had on the rest of the graph, so that undo can put them back.

use super::NodeLayout;
use crate::graph::{Connection, ConnectionId, NodeId};
use crate::node::Node;
use serde_json::Value;
use std::rc::Rc;

/// One reversible document edit.
#[derive(Clone)]
pub enum Edit {
    AddNode {
        node: Rc<dyn Node>,
    },
    RemoveNode {
        node: Rc<dyn Node>,
        layout: NodeLayout,
    },
    Connect {
        connection: Connection,
    },
    Disconnect {
        connection: Connection,
    },
    SetControl {
        node_id: NodeId,
        key: String,
        before: Value,
        after: Value,
    },
}

impl Edit {
    pub fn label(&self) -> &'static str {
        match self {
            Edit::AddNode { .. } => "add node",
            Edit::RemoveNode { .. } => "remove node",
            Edit::Connect { .. } => "connect",
            Edit::Disconnect { .. } => "disconnect",
            Edit::SetControl { .. } => "set control",
        }
    }

    /// The connection the edit itself removes, as opposed to a side effect.
    pub(crate) fn removed_connection(&self) -> Option<&ConnectionId> {
        match self {
            Edit::Disconnect { connection } => Some(&connection.id),
            _ => None,
        }
    }
}

/// A recorded edit with the state needed to revert its side effects.
#[derive(Clone)]
pub struct Entry {
    pub edit: Edit,
    /// Connections that disappeared along with the edit, in registration order.
    pub dropped: Vec<Connection>,
    /// Control values of dynamic nodes before the edit. Derived ports removed
    /// by a rebuild come back with defaults; these values are written back.
    pub controls: Vec<(NodeId, String, Value)>,
    /// Connection registration order before the edit.
    pub order: Vec<ConnectionId>,
}

/// Undo and redo stacks with a bounded depth. A limit of zero disables recording.
pub struct History {
    undo: Vec<Entry>,
    redo: Vec<Entry>,
    limit: usize,
}

impl History {
    pub fn new(limit: usize) -> Self {
        Self {
            undo: Vec::new(),
            redo: Vec::new(),
            limit,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.limit > 0
    }

    /// Records a fresh edit. Anything that could have been redone is discarded.
    pub fn record(&mut self, entry: Entry) {
        if !self.is_enabled() {
            return;
        }
        self.redo.clear();
        self.push_undo(entry);
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }

    pub(crate) fn take_undo(&mut self) -> Option<Entry> {
        self.undo.pop()
    }

    pub(crate) fn take_redo(&mut self) -> Option<Entry> {
        self.redo.pop()
    }

    pub(crate) fn push_undone(&mut self, entry: Entry) {
        self.redo.push(entry);
    }

    pub(crate) fn push_redone(&mut self, entry: Entry) {
        self.push_undo(entry);
    }

    fn push_undo(&mut self, entry: Entry) {
        self.undo.push(entry);
        if self.undo.len() > self.limit {
            self.undo.remove(0);
        }
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new(100)
    }
}
