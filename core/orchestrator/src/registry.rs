use std::sync::Arc;

use dashmap::DashMap;
use domain::Handler;
use tokio::sync::Semaphore;
use tracing::warn;

/// Metadata snapshot for one registered handler, mirroring the source's
/// `get_agent_info()` listing.
#[derive(Debug, Clone)]
pub struct HandlerInfo {
    pub name: String,
    pub description: String,
    pub capabilities: Vec<String>,
    pub enabled: bool,
    pub confidence_threshold: f64,
}

struct Entry {
    handler: Arc<dyn Handler>,
    /// Enforces §5's "one in-flight call per handler instance".
    in_flight: Arc<Semaphore>,
}

/// Process-wide mapping from handler name to handler, populated once at
/// startup and optionally mutated at runtime (enable/disable,
/// register/unregister). Readers tolerate stale snapshots; there is no
/// cross-operation locking beyond `DashMap`'s own per-shard locks.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: DashMap<String, Entry>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self {
            handlers: DashMap::new(),
        }
    }

    /// Duplicate registration overwrites with a warning.
    pub fn register(&self, handler: Arc<dyn Handler>) {
        let name = handler.name().to_string();
        if self.handlers.contains_key(&name) {
            warn!(handler = %name, "handler already registered, overwriting");
        }
        self.handlers.insert(
            name,
            Entry {
                handler,
                in_flight: Arc::new(Semaphore::new(1)),
            },
        );
    }

    pub fn unregister(&self, name: &str) {
        self.handlers.remove(name);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Handler>> {
        self.handlers.get(name).map(|e| e.handler.clone())
    }

    /// The per-handler in-flight permit, acquired around every dispatch.
    pub fn dispatch_semaphore(&self, name: &str) -> Option<Arc<Semaphore>> {
        self.handlers.get(name).map(|e| e.in_flight.clone())
    }

    pub fn list_all(&self) -> Vec<Arc<dyn Handler>> {
        self.handlers.iter().map(|e| e.handler.clone()).collect()
    }

    pub fn list_enabled(&self) -> Vec<Arc<dyn Handler>> {
        self.handlers
            .iter()
            .filter(|e| e.handler.enabled())
            .map(|e| e.handler.clone())
            .collect()
    }

    /// Case-insensitive membership against each handler's capability
    /// list; enabled handlers only.
    pub fn find_by_capability(&self, capability: &str) -> Vec<Arc<dyn Handler>> {
        let needle = capability.to_lowercase();
        self.handlers
            .iter()
            .filter(|e| e.handler.enabled())
            .filter(|e| {
                e.handler
                    .capabilities()
                    .iter()
                    .any(|cap| cap.to_lowercase() == needle)
            })
            .map(|e| e.handler.clone())
            .collect()
    }

    pub fn describe_all(&self) -> Vec<HandlerInfo> {
        self.handlers
            .iter()
            .map(|e| HandlerInfo {
                name: e.handler.name().to_string(),
                description: e.handler.description().to_string(),
                capabilities: e.handler.capabilities(),
                enabled: e.handler.enabled(),
                confidence_threshold: e.handler.confidence_threshold(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
