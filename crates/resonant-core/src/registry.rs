//! Type-tag -> factory-closure registry for name-driven node construction.
//!
//! Lets config-driven graphs and tests build nodes by a string tag instead
//! of naming a concrete Rust type at every call site, generalized from
//! effects to arbitrary graph nodes.

use std::collections::HashMap;

use crate::error::{EngineError, EngineResult};
use crate::server::{NodeHandle, Server};

/// Arguments passed to a node factory. Kept intentionally small and
/// generic (channel count plus a free-form tag map) since built-in and
/// custom node types each need different construction parameters.
#[derive(Debug, Clone, Default)]
pub struct NodeArgs {
    /// Channel count for nodes whose shape depends on it.
    pub channels: usize,
}

impl NodeArgs {
    /// Convenience constructor for the common case of a fixed channel count.
    pub fn with_channels(channels: usize) -> Self {
        Self { channels }
    }
}

type NodeFactory = Box<dyn Fn(&mut Server, &NodeArgs) -> EngineResult<NodeHandle> + Send + Sync>;

struct RegistryEntry {
    description: String,
    factory: NodeFactory,
}

/// Maps a type tag (e.g. `"sine_oscillator"`, `"hard_limiter"`) to a
/// constructor closure.
#[derive(Default)]
pub struct NodeRegistry {
    entries: HashMap<String, RegistryEntry>,
}

impl NodeRegistry {
    /// Creates an empty registry (no built-ins pre-registered).
    pub fn new() -> Self {
        Self { entries: HashMap::new() }
    }

    /// Registers a factory under `type_tag`, replacing any prior entry.
    pub fn register(
        &mut self,
        type_tag: impl Into<String>,
        description: impl Into<String>,
        factory: impl Fn(&mut Server, &NodeArgs) -> EngineResult<NodeHandle> + Send + Sync + 'static,
    ) {
        self.entries.insert(
            type_tag.into(),
            RegistryEntry { description: description.into(), factory: Box::new(factory) },
        );
    }

    /// Constructs a node by type tag.
    pub fn create(&self, type_tag: &str, server: &mut Server, args: &NodeArgs) -> EngineResult<NodeHandle> {
        match self.entries.get(type_tag) {
            Some(entry) => (entry.factory)(server, args),
            None => Err(EngineError::UnknownFormat(format!("no node type registered for tag '{type_tag}'"))),
        }
    }

    /// Iterates over `(type_tag, description)` for every registered type,
    /// for building config UIs or validating a config file's node list.
    pub fn descriptions(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(tag, e)| (tag.as_str(), e.description.as_str()))
    }

    /// True if `type_tag` has a registered factory.
    pub fn contains(&self, type_tag: &str) -> bool {
        self.entries.contains_key(type_tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::ServerParams;

    #[test]
    fn test_unregistered_tag_fails() {
        let registry = NodeRegistry::new();
        let mut server = Server::new(ServerParams::default()).unwrap();
        let err = registry.create("nonexistent", &mut server, &NodeArgs::default()).unwrap_err();
        assert_eq!(err.to_error_code(), crate::error::ErrorCode::UnknownFormat);
    }

    #[test]
    fn test_registered_tag_is_discoverable() {
        let mut registry = NodeRegistry::new();
        registry.register("noop", "does nothing", |server, _args| {
            server.create_passthrough_node(1)
        });
        assert!(registry.contains("noop"));
        assert_eq!(registry.descriptions().count(), 1);
    }
}
