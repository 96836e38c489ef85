//! Name interning for frame graph resources

use std::collections::HashMap;

use crate::error::{FrameGraphError, FrameGraphResult};

/// Unique identifier for a frame graph resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(pub(crate) u32);

impl ResourceId {
    /// The final output of the graph. Passes contributing to it are kept alive.
    pub const GRAPH_OUTPUT: ResourceId = ResourceId(0);

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Name of the [`ResourceId::GRAPH_OUTPUT`] sentinel.
pub const GRAPH_OUTPUT_NAME: &str = "GraphOutput";

/// Interns resource names into dense ids.
///
/// Owned by the graph that uses it, so ids are only meaningful within that
/// graph.
#[derive(Debug, Clone)]
pub struct ResourceRegistry {
    names: Vec<String>,
    ids: HashMap<String, ResourceId>,
}

impl ResourceRegistry {
    /// Create a registry holding only the `GraphOutput` sentinel.
    pub fn new() -> Self {
        let mut registry = Self {
            names: Vec::new(),
            ids: HashMap::new(),
        };
        registry.resource_id(GRAPH_OUTPUT_NAME);
        registry
    }

    /// Return the id of `name`, allocating the next one on first sight.
    pub fn resource_id(&mut self, name: &str) -> ResourceId {
        if let Some(&id) = self.ids.get(name) {
            return id;
        }
        let id = ResourceId(self.names.len() as u32);
        self.names.push(name.to_string());
        self.ids.insert(name.to_string(), id);
        id
    }

    /// Id of an already interned name.
    pub fn find(&self, name: &str) -> Option<ResourceId> {
        self.ids.get(name).copied()
    }

    pub fn resource_name(&self, id: ResourceId) -> FrameGraphResult<&str> {
        self.names
            .get(id.index())
            .map(String::as_str)
            .ok_or(FrameGraphError::UnknownResourceId(id.0))
    }

    /// Name for diagnostics; never fails.
    pub(crate) fn display_name(&self, id: ResourceId) -> String {
        match self.names.get(id.index()) {
            Some(name) => name.clone(),
            None => id.to_string(),
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl Default for ResourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}
