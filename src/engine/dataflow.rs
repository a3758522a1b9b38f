use crate::error::DataflowError;
use crate::graph::{GraphQuery, NodeId};
use crate::node::{InputData, OutputData};
use ahash::{AHashMap, AHashSet};
use serde_json::Value;
use std::cell::RefCell;

/// Pull-based, memoized resolver of node output data.
///
/// `fetch` resolves a node by first resolving every upstream source that feeds
/// its data inputs. Results are cached per node until an explicit [`reset`].
/// Resolution carries the set of nodes on the current path; re-entering one of
/// them yields an empty result for that edge, so cyclic pure-data subgraphs
/// terminate.
///
/// [`reset`]: DataflowEngine::reset
#[derive(Default)]
pub struct DataflowEngine {
    cache: RefCell<AHashMap<NodeId, OutputData>>,
}

impl DataflowEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the output data of a node, resolving and caching it if needed.
    pub fn fetch(&self, graph: &dyn GraphQuery, id: &NodeId) -> Result<OutputData, DataflowError> {
        let mut path = AHashSet::new();
        self.fetch_on_path(graph, id, &mut path)
    }

    /// Resolves every data input of a node into one ordered list of values per key.
    ///
    /// Values appear in connection registration order. Keys without any
    /// connection map to an empty list.
    pub fn fetch_inputs(&self, graph: &dyn GraphQuery, id: &NodeId) -> Result<InputData, DataflowError> {
        if graph.node(id).is_none() {
            return Err(DataflowError::NodeNotFound(id.clone()));
        }
        let mut path = AHashSet::new();
        path.insert(id.clone());
        self.fetch_inputs_on_path(graph, id, &mut path)
    }

    /// First value of an input, or `null` when nothing is connected.
    pub fn fetch_input_single(
        &self,
        graph: &dyn GraphQuery,
        id: &NodeId,
        key: &str,
    ) -> Result<Value, DataflowError> {
        Ok(self
            .fetch_input_multiple(graph, id, key)?
            .into_iter()
            .next()
            .unwrap_or(Value::Null))
    }

    /// Every value connected to an input, possibly none.
    pub fn fetch_input_multiple(
        &self,
        graph: &dyn GraphQuery,
        id: &NodeId,
        key: &str,
    ) -> Result<Vec<Value>, DataflowError> {
        let mut inputs = self.fetch_inputs(graph, id)?;
        Ok(inputs.remove(key).unwrap_or_default())
    }

    /// Like [`fetch_input_single`](Self::fetch_input_single), but fails when the
    /// input carries no value, whether or not the port is flagged `required`.
    pub fn fetch_input_required(
        &self,
        graph: &dyn GraphQuery,
        id: &NodeId,
        key: &str,
    ) -> Result<Value, DataflowError> {
        self.fetch_input_multiple(graph, id, key)?
            .into_iter()
            .next()
            .ok_or_else(|| DataflowError::MissingRequiredInput {
                node_id: id.clone(),
                key: key.to_string(),
            })
    }

    /// Drops the cache entry of one node, or every entry when `id` is `None`.
    ///
    /// Does not cascade: downstream entries stay cached.
    pub fn reset(&self, id: Option<&NodeId>) {
        let mut cache = self.cache.borrow_mut();
        match id {
            Some(id) => {
                cache.remove(id);
            }
            None => cache.clear(),
        }
    }

    /// Drops the entry of `id` and of every node reachable downstream from it.
    pub fn invalidate_from(&self, graph: &dyn GraphQuery, id: &NodeId) {
        let mut visited = AHashSet::new();
        let mut stack = vec![id.clone()];
        while let Some(current) = stack.pop() {
            if !visited.insert(current.clone()) {
                continue;
            }
            self.reset(Some(&current));
            stack.extend(
                graph
                    .connections_from(&current)
                    .into_iter()
                    .map(|c| c.target),
            );
        }
    }

    pub fn is_cached(&self, id: &NodeId) -> bool {
        self.cache.borrow().contains_key(id)
    }

    fn fetch_on_path(
        &self,
        graph: &dyn GraphQuery,
        id: &NodeId,
        path: &mut AHashSet<NodeId>,
    ) -> Result<OutputData, DataflowError> {
        if let Some(cached) = self.cache.borrow().get(id) {
            return Ok(cached.clone());
        }
        if !path.insert(id.clone()) {
            tracing::debug!(node_id = %id, "cycle detected, resolving edge as empty");
            return Ok(OutputData::default());
        }

        let node = graph
            .node(id)
            .ok_or_else(|| DataflowError::NodeNotFound(id.clone()))?;
        let inputs = self.fetch_inputs_on_path(graph, id, path)?;
        path.remove(id);

        // Unconnected ports with an inline control fall back to the control.
        let missing_required = node.core().inputs().into_iter().find(|port| {
            port.required
                && port.control.is_none()
                && !port.socket.is_exec()
                && inputs.get(&port.key).map_or(true, Vec::is_empty)
        });
        if let Some(port) = missing_required {
            return Err(DataflowError::MissingRequiredInput {
                node_id: id.clone(),
                key: port.key,
            });
        }

        let output = node
            .data(&inputs)
            .map_err(|source| DataflowError::Resolver {
                node_id: id.clone(),
                source: Box::new(source),
            })?;

        let missing: Vec<String> = node
            .core()
            .data_output_keys()
            .into_iter()
            .filter(|key| !output.contains_key(key))
            .collect();
        if !missing.is_empty() {
            return Err(DataflowError::ResolverContract {
                node_id: id.clone(),
                missing,
            });
        }

        tracing::debug!(node_id = %id, outputs = output.len(), "resolved node data");
        self.cache.borrow_mut().insert(id.clone(), output.clone());
        Ok(output)
    }

    fn fetch_inputs_on_path(
        &self,
        graph: &dyn GraphQuery,
        id: &NodeId,
        path: &mut AHashSet<NodeId>,
    ) -> Result<InputData, DataflowError> {
        let node = graph
            .node(id)
            .ok_or_else(|| DataflowError::NodeNotFound(id.clone()))?;
        let keys = node.core().data_input_keys();
        let mut inputs: InputData = keys.iter().map(|k| (k.clone(), Vec::new())).collect();

        for connection in graph.connections_into(id) {
            let Some(values) = inputs.get_mut(&connection.target_input) else {
                continue;
            };
            if graph.node(&connection.source).is_none() {
                return Err(DataflowError::DanglingConnection {
                    connection_id: connection.id.clone(),
                    node_id: connection.source.clone(),
                });
            }
            let mut output = self.fetch_on_path(graph, &connection.source, path)?;
            if let Some(value) = output.remove(&connection.source_output) {
                values.push(value);
            }
        }
        Ok(inputs)
    }
}
