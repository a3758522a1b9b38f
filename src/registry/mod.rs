//! Maps persisted node type names to node factories.

use crate::error::DocumentError;
use crate::graph::NodeId;
use crate::node::Node;
use crate::nodes::*;
use ahash::AHashMap;
use itertools::Itertools;
use std::rc::Rc;

/// Creates a node with the given id.
pub type NodeFactory = Rc<dyn Fn(NodeId) -> Rc<dyn Node>>;

/// Defines the built-in node table: registration and lookup by name.
macro_rules! define_builtin_nodes {
    ( $( ($struct_name:ident, $type_name:literal) ),* $(,)? ) => {
        /// Registers every built-in node under its canonical type name.
        fn register_builtin_nodes(factories: &mut AHashMap<String, NodeFactory>) {
            $(
                let factory: NodeFactory =
                    Rc::new(|id: NodeId| Rc::new($struct_name::with_id(id)) as Rc<dyn Node>);
                factories.insert($type_name.to_string(), factory);
            )*
        }

        /// Returns the factory of a built-in node by its canonical type name.
        fn create_builtin_by_name(name: &str) -> Option<NodeFactory> {
            match name {
                $(
                    $type_name => {
                        let factory: NodeFactory =
                            Rc::new(|id: NodeId| Rc::new($struct_name::with_id(id)) as Rc<dyn Node>);
                        Some(factory)
                    }
                )*
                _ => None,
            }
        }

        /// Canonical names of the built-in node types.
        pub const BUILTIN_TYPES: &[&str] = &[ $( $type_name ),* ];
    };
}

define_builtin_nodes! {
    (TextNode, "text"),
    (NumberNode, "number"),
    (JsonNode, "json"),
    (JoinNode, "join"),
    (CounterNode, "counter"),
    (BranchNode, "branch"),
    (SequenceNode, "sequence"),
    (DisplayNode, "display"),
    (DelayNode, "delay"),
    (PassthroughNode, "passthrough"),
    (ObjectNode, "object"),
}

/// Node type table used when loading documents and creating nodes by name.
#[derive(Clone)]
pub struct NodeRegistry {
    factories: AHashMap<String, NodeFactory>,
}

impl NodeRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            factories: AHashMap::new(),
        }
    }

    /// A registry holding every built-in node.
    pub fn with_builtins() -> Self {
        let mut factories = AHashMap::new();
        register_builtin_nodes(&mut factories);
        Self { factories }
    }

    /// Registers a custom node type, replacing any existing entry.
    pub fn register<F, N>(&mut self, type_name: &str, factory: F)
    where
        F: Fn(NodeId) -> N + 'static,
        N: Node + 'static,
    {
        let factory: NodeFactory = Rc::new(move |id: NodeId| Rc::new(factory(id)) as Rc<dyn Node>);
        self.factories.insert(type_name.to_string(), factory);
    }

    /// Makes `user_type_name` an alias of a built-in node type.
    ///
    /// Returns `false` if `builtin_type_name` is not a built-in type. Nodes
    /// created through an alias keep their canonical type name when saved.
    pub fn map_type(&mut self, user_type_name: &str, builtin_type_name: &str) -> bool {
        match create_builtin_by_name(builtin_type_name) {
            Some(factory) => {
                self.factories.insert(user_type_name.to_string(), factory);
                true
            }
            None => {
                tracing::warn!(
                    user_type = user_type_name,
                    builtin_type = builtin_type_name,
                    "ignoring mapping to unknown built-in type"
                );
                false
            }
        }
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.factories.contains_key(type_name)
    }

    pub fn create(&self, type_name: &str, id: NodeId) -> Result<Rc<dyn Node>, DocumentError> {
        let factory = self
            .factories
            .get(type_name)
            .ok_or_else(|| DocumentError::InvalidNodeType {
                node_id: id.clone(),
                type_name: type_name.to_string(),
            })?;
        Ok(factory(id))
    }

    /// Registered type names, sorted.
    pub fn type_names(&self) -> Vec<String> {
        self.factories.keys().cloned().sorted().collect()
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}
