use super::Schema;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

#[derive(Debug)]
struct SocketState {
    type_name: String,
    schema: Schema,
}

/// A shared, mutable socket cell.
///
/// Cloning a `Socket` aliases the same cell: every port holding a clone observes
/// a [`Socket::set_schema`] call immediately. Exec sockets carry no data and only
/// ever connect to other exec sockets.
#[derive(Clone)]
pub struct Socket {
    state: Rc<RefCell<SocketState>>,
    exec: bool,
}

impl Socket {
    /// Creates a data socket whose type name is derived from the schema.
    pub fn new(schema: Schema) -> Self {
        Self::named(schema.name(), schema)
    }

    pub fn named(type_name: impl Into<String>, schema: Schema) -> Self {
        Self {
            state: Rc::new(RefCell::new(SocketState {
                type_name: type_name.into(),
                schema,
            })),
            exec: false,
        }
    }

    pub fn any() -> Self {
        Self::new(Schema::Any)
    }

    /// Creates a control-flow socket.
    pub fn exec() -> Self {
        Self {
            state: Rc::new(RefCell::new(SocketState {
                type_name: "exec".to_string(),
                schema: Schema::Any,
            })),
            exec: true,
        }
    }

    pub fn is_exec(&self) -> bool {
        self.exec
    }

    pub fn type_name(&self) -> String {
        self.state.borrow().type_name.clone()
    }

    pub fn schema(&self) -> Schema {
        self.state.borrow().schema.clone()
    }

    /// Replaces the type name and schema in place. Returns `true` if anything changed.
    pub fn set_schema(&self, type_name: impl Into<String>, schema: Schema) -> bool {
        let type_name = type_name.into();
        let mut state = self.state.borrow_mut();
        if state.type_name == type_name && state.schema == schema {
            return false;
        }
        state.type_name = type_name;
        state.schema = schema;
        true
    }

    /// Returns `true` if a connection from `self` (an output) into `target` (an input) is valid.
    pub fn is_compatible_with(&self, target: &Socket) -> bool {
        match (self.exec, target.exec) {
            (true, true) => true,
            (false, false) => self
                .state
                .borrow()
                .schema
                .is_compatible_with(&target.state.borrow().schema),
            _ => false,
        }
    }

    /// Returns `true` if both handles point at the same cell.
    pub fn shares_cell(&self, other: &Socket) -> bool {
        Rc::ptr_eq(&self.state, &other.state)
    }
}

impl fmt::Debug for Socket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("Socket")
            .field("type_name", &state.type_name)
            .field("schema", &state.schema)
            .field("exec", &self.exec)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_observe_schema_changes() {
        let socket = Socket::any();
        let alias = socket.clone();
        assert!(socket.set_schema("string", Schema::String));
        assert_eq!(alias.schema(), Schema::String);
        assert_eq!(alias.type_name(), "string");
        assert!(alias.shares_cell(&socket));
        assert!(!socket.set_schema("string", Schema::String));
    }

    #[test]
    fn exec_sockets_only_pair_with_exec() {
        let exec = Socket::exec();
        assert!(exec.is_compatible_with(&Socket::exec()));
        assert!(!exec.is_compatible_with(&Socket::any()));
        assert!(!Socket::any().is_compatible_with(&exec));
        assert!(Socket::new(Schema::Number).is_compatible_with(&Socket::any()));
    }
}
