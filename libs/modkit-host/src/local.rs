//! In-process module host.
//!
//! [`LocalModuleHost`] keeps installed modules in memory, drives their lifecycle on request and
//! delivers the resulting events to subscribers one at a time.

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, ThreadId};

use crate::host::{HostError, ModuleHost};
use crate::module::{
    ListenerId, Module, ModuleEvent, ModuleEventKind, ModuleId, ModuleListener, ModuleRef,
    ModuleState, ResourceHandle,
};
use crate::registry::{ServiceRegistration, ServiceRegistrationId, ServiceRegistry};
use crate::types::{InterfaceType, TypeSpace};

/// A module assembled in memory: headers, packaged resources and a type space.
pub struct LocalModule {
    id: ModuleId,
    symbolic_name: String,
    state: RwLock<ModuleState>,
    headers: HashMap<String, String>,
    resources: Vec<(String, Arc<[u8]>)>,
    types: TypeSpace,
}

impl LocalModule {
    pub fn new(id: ModuleId, symbolic_name: impl Into<String>) -> Self {
        Self {
            id,
            symbolic_name: symbolic_name.into(),
            state: RwLock::new(ModuleState::Installed),
            headers: HashMap::new(),
            resources: Vec::new(),
            types: TypeSpace::new(),
        }
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_resource(mut self, path: impl Into<String>, contents: impl Into<Arc<[u8]>>) -> Self {
        self.resources.push((path.into(), contents.into()));
        self
    }

    #[must_use]
    pub fn with_type(mut self, ty: InterfaceType) -> Self {
        self.types.define(ty);
        self
    }

    #[must_use]
    pub fn with_state(self, state: ModuleState) -> Self {
        *self.state.write() = state;
        self
    }

    fn set_state(&self, state: ModuleState) {
        *self.state.write() = state;
    }
}

impl Module for LocalModule {
    fn id(&self) -> ModuleId {
        self.id
    }

    fn symbolic_name(&self) -> &str {
        &self.symbolic_name
    }

    fn state(&self) -> ModuleState {
        *self.state.read()
    }

    fn header(&self, name: &str) -> Option<String> {
        self.headers.get(name).cloned()
    }

    fn find_resources(&self, path: &str, suffix: &str) -> Vec<ResourceHandle> {
        let dir = path.trim_matches('/');
        self.resources
            .iter()
            .map(|(p, contents)| ResourceHandle::new(self.id, p.clone(), Arc::clone(contents)))
            .filter(|res| res.location() == dir && res.file_name().ends_with(suffix))
            .collect()
    }

    fn load_type(&self, name: &str) -> Option<Arc<InterfaceType>> {
        self.types.get(name)
    }
}

/// In-memory [`ModuleHost`].
pub struct LocalModuleHost {
    modules: DashMap<ModuleId, Arc<LocalModule>>,
    listeners: RwLock<Vec<(ListenerId, Arc<dyn ModuleListener>)>>,
    next_listener: AtomicU64,
    // Serializes event delivery across all lifecycle operations.
    delivery: Mutex<()>,
    // Thread currently delivering, and the events its listeners raised meanwhile.
    deliverer: Mutex<Option<ThreadId>>,
    nested: Mutex<VecDeque<ModuleEvent>>,
    registry: ServiceRegistry,
}

/// Clears the deliverer mark even if a listener panics.
struct DelivererGuard<'a>(&'a Mutex<Option<ThreadId>>);

impl Drop for DelivererGuard<'_> {
    fn drop(&mut self) {
        *self.0.lock() = None;
    }
}

impl Default for LocalModuleHost {
    fn default() -> Self {
        Self {
            modules: DashMap::new(),
            listeners: RwLock::new(Vec::new()),
            next_listener: AtomicU64::new(1),
            delivery: Mutex::new(()),
            deliverer: Mutex::new(None),
            nested: Mutex::new(VecDeque::new()),
            registry: ServiceRegistry::new(),
        }
    }
}

impl LocalModuleHost {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a module and announce it. Re-installing an id replaces the previous module.
    pub fn install(&self, module: LocalModule) -> Arc<LocalModule> {
        let module = Arc::new(module);
        self.modules.insert(module.id, Arc::clone(&module));
        tracing::debug!(module = %module.symbolic_name, id = %module.id, "Installed module");
        self.fire(ModuleEventKind::Installed, Arc::clone(&module));
        module
    }

    /// Move a module to `Active` and deliver `Started`.
    ///
    /// # Errors
    /// Returns `HostError::UnknownModule` if the id is not installed.
    pub fn start_module(&self, id: ModuleId) -> Result<(), HostError> {
        let module = self.local(id)?;
        module.set_state(ModuleState::Starting);
        module.set_state(ModuleState::Active);
        tracing::debug!(module = %module.symbolic_name, %id, "Started module");
        self.fire(ModuleEventKind::Started, module);
        Ok(())
    }

    /// Move a module back to `Installed` and deliver `Stopped`.
    ///
    /// # Errors
    /// Returns `HostError::UnknownModule` if the id is not installed.
    pub fn stop_module(&self, id: ModuleId) -> Result<(), HostError> {
        let module = self.local(id)?;
        module.set_state(ModuleState::Stopping);
        self.fire(ModuleEventKind::Stopped, Arc::clone(&module));
        module.set_state(ModuleState::Installed);
        tracing::debug!(module = %module.symbolic_name, %id, "Stopped module");
        Ok(())
    }

    /// Remove a module, stopping it first if it is active.
    ///
    /// # Errors
    /// Returns `HostError::UnknownModule` if the id is not installed.
    pub fn uninstall_module(&self, id: ModuleId) -> Result<(), HostError> {
        if self.local(id)?.state() == ModuleState::Active {
            self.stop_module(id)?;
        }
        let (_, module) = self
            .modules
            .remove(&id)
            .ok_or(HostError::UnknownModule(id))?;
        module.set_state(ModuleState::Uninstalled);
        self.fire(ModuleEventKind::Uninstalled, module);
        Ok(())
    }

    #[must_use]
    pub fn module(&self, id: ModuleId) -> Option<ModuleRef> {
        self.modules
            .get(&id)
            .map(|m| Arc::clone(m.value()) as ModuleRef)
    }

    #[must_use]
    pub fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    fn local(&self, id: ModuleId) -> Result<Arc<LocalModule>, HostError> {
        self.modules
            .get(&id)
            .map(|m| Arc::clone(m.value()))
            .ok_or(HostError::UnknownModule(id))
    }

    /// Deliver an event to every listener before returning.
    ///
    /// Events raised by a listener while it handles another event are queued instead, and
    /// delivered in order right after the current one.
    fn fire(&self, kind: ModuleEventKind, module: Arc<LocalModule>) {
        let event = ModuleEvent {
            kind,
            module: module as ModuleRef,
        };
        let me = thread::current().id();
        if *self.deliverer.lock() == Some(me) {
            self.nested.lock().push_back(event);
            return;
        }

        let _serial = self.delivery.lock();
        *self.deliverer.lock() = Some(me);
        let _guard = DelivererGuard(&self.deliverer);
        let mut next = Some(event);
        while let Some(event) = next {
            self.dispatch(&event);
            next = self.nested.lock().pop_front();
        }
    }

    fn dispatch(&self, event: &ModuleEvent) {
        // Snapshot so listeners may unsubscribe while handling the event.
        let listeners: Vec<_> = self
            .listeners
            .read()
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();
        for listener in listeners {
            listener.module_changed(event);
        }
    }
}

impl ModuleHost for LocalModuleHost {
    fn modules(&self) -> Vec<ModuleRef> {
        let mut all: Vec<Arc<LocalModule>> =
            self.modules.iter().map(|m| Arc::clone(m.value())).collect();
        all.sort_by_key(|m| m.id);
        all.into_iter().map(|m| m as ModuleRef).collect()
    }

    fn subscribe(&self, listener: Arc<dyn ModuleListener>) -> ListenerId {
        let id = ListenerId::new(self.next_listener.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().push((id, listener));
        id
    }

    fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        listeners.len() != before
    }

    fn register_service(
        &self,
        registration: ServiceRegistration,
    ) -> Result<ServiceRegistrationId, HostError> {
        Ok(self.registry.register(registration))
    }

    fn unregister_service(&self, id: ServiceRegistrationId) -> Result<(), HostError> {
        self.registry.unregister(id)?;
        Ok(())
    }
}
