//! Adapter registry: the single source of truth for known adapters.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::config::AdapterConfig;

use super::{AdapterError, SourceAdapter, TorznabAdapter};

struct Registered {
    adapter: Arc<dyn SourceAdapter>,
    enabled: bool,
}

/// Name-keyed adapter handles, populated once at startup.
///
/// Registration order is preserved so fan-out results merge deterministically.
#[derive(Default)]
pub struct AdapterRegistry {
    order: Vec<String>,
    adapters: HashMap<String, Registered>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the registry from configured adapters. Disabled entries stay
    /// known but are never selected.
    pub fn from_config(adapters: &[AdapterConfig]) -> Result<Self, AdapterError> {
        let mut registry = Self::new();
        for config in adapters {
            let adapter: Arc<dyn SourceAdapter> = Arc::new(TorznabAdapter::from_config(config)?);
            registry.register_with_state(adapter, config.enabled);
        }
        Ok(registry)
    }

    /// Register an adapter. A later registration with the same name replaces
    /// the handle but keeps the original position.
    pub fn register(&mut self, adapter: Arc<dyn SourceAdapter>) {
        self.register_with_state(adapter, true);
    }

    /// Register an adapter that is known but not queried by default.
    pub fn register_disabled(&mut self, adapter: Arc<dyn SourceAdapter>) {
        self.register_with_state(adapter, false);
    }

    fn register_with_state(&mut self, adapter: Arc<dyn SourceAdapter>, enabled: bool) {
        let name = adapter.name().to_string();
        if !self.adapters.contains_key(&name) {
            self.order.push(name.clone());
        }
        self.adapters.insert(name, Registered { adapter, enabled });
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn SourceAdapter>> {
        self.adapters.get(name).map(|r| Arc::clone(&r.adapter))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.adapters.contains_key(name)
    }

    /// All registered names, in registration order.
    pub fn names(&self) -> Vec<String> {
        self.order.clone()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Resolve the adapters to query for a request.
    ///
    /// `None` or an empty list selects every enabled adapter. An explicit list
    /// selects those names among the enabled ones; unknown names are ignored.
    pub fn enabled(&self, requested: Option<&[String]>) -> Vec<(String, Arc<dyn SourceAdapter>)> {
        let filter: Option<HashSet<&str>> = requested
            .filter(|names| !names.is_empty())
            .map(|names| names.iter().map(String::as_str).collect());

        self.order
            .iter()
            .filter_map(|name| {
                let entry = self.adapters.get(name)?;
                if !entry.enabled {
                    return None;
                }
                if let Some(filter) = &filter {
                    if !filter.contains(name.as_str()) {
                        return None;
                    }
                }
                Some((name.clone(), Arc::clone(&entry.adapter)))
            })
            .collect()
    }
}
