//! Live proxy contexts keyed by module.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use modkit_host::ModuleId;

use crate::context::ProxyContext;

/// At most one context per module. Sharded, so registrations of different modules do not
/// contend.
#[derive(Default)]
pub struct ProxyContextRegistry {
    contexts: DashMap<ModuleId, Arc<ProxyContext>>,
}

impl ProxyContextRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `context` unless the module already has one. On `false` the caller still owns
    /// `context` and must release it.
    pub fn register_if_absent(&self, context: Arc<ProxyContext>) -> bool {
        match self.contexts.entry(context.module_id()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(context);
                true
            }
        }
    }

    pub fn remove(&self, module: ModuleId) -> Option<Arc<ProxyContext>> {
        self.contexts.remove(&module).map(|(_, ctx)| ctx)
    }

    #[must_use]
    pub fn get(&self, module: ModuleId) -> Option<Arc<ProxyContext>> {
        self.contexts.get(&module).map(|c| Arc::clone(c.value()))
    }

    #[must_use]
    pub fn contains(&self, module: ModuleId) -> bool {
        self.contexts.contains_key(&module)
    }

    /// Current contexts, ordered by module id. No map lock is held once this returns.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Arc<ProxyContext>> {
        let mut all: Vec<_> = self.contexts.iter().map(|c| Arc::clone(c.value())).collect();
        all.sort_by_key(|c| c.module_id());
        all
    }

    /// Remove and return every context.
    pub fn drain(&self) -> Vec<Arc<ProxyContext>> {
        let ids: Vec<ModuleId> = self.contexts.iter().map(|c| *c.key()).collect();
        let mut drained: Vec<_> = ids.into_iter().filter_map(|id| self.remove(id)).collect();
        drained.sort_by_key(|c| c.module_id());
        drained
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }
}
