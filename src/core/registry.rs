//! Name to service routing table.
//!
//! Built once at startup from the configured services and never mutated
//! afterwards, so lookups from concurrent requests need no locking.
use std::{collections::HashMap, sync::Arc};

use crate::ports::Service;

/// Immutable mapping from route name to the service that answers it.
///
/// When several services declare the same name, the one registered last
/// wins. No error is raised for the collision.
#[derive(Clone, Default)]
pub struct ServiceRegistry {
    handlers: HashMap<String, Arc<dyn Service>>,
}

impl ServiceRegistry {
    /// Register every name of every service, in iteration order.
    pub fn build<I>(services: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn Service>>,
    {
        let mut handlers: HashMap<String, Arc<dyn Service>> = HashMap::new();
        for service in services {
            for name in service.names() {
                if handlers
                    .insert(name.clone(), Arc::clone(&service))
                    .is_some()
                {
                    tracing::debug!(route = %name, "route name re-registered, later service wins");
                }
            }
        }
        Self { handlers }
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Service>> {
        self.handlers.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Registered route names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("names", &self.names())
            .finish()
    }
}
