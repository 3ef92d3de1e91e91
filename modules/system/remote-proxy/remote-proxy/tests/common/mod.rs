#![allow(clippy::unwrap_used, clippy::expect_used, dead_code)]

//! Shared fixtures for remote-proxy integration tests: an in-memory remote directory with
//! switchable reachability, hosts that refuse or park publications, and module builders.

use std::collections::HashSet;
use std::sync::{Arc, Barrier};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use modkit_host::{
    HostError, InterfaceType, ListenerId, LocalModule, LocalModuleHost, ModuleHost, ModuleId,
    ModuleListener, ModuleRef, ServiceRegistration, ServiceRegistrationId,
};
use parking_lot::Mutex;
use remote_proxy::{
    DirectoryConnection, DirectoryEnvironment, HandleFuture, JsonDescriptorParser,
    LifecycleController, LookupExecutor, RemoteDirectory, RemoteHandle, RemoteLookupTask,
    RemoteProxyConfig, ResolutionChain, TokioLookupExecutor,
};
use remote_proxy_sdk::{DirectoryError, Invocation, RemoteCallError, RemoteService};
use serde_json::json;
use tokio::sync::Semaphore;

pub const ORDER_SERVICE: &str = "com.acme.OrderService";
pub const BILLING: &str = "com.acme.Billing";
pub const ORDER_BEAN: &str = "ejb:orders/OrderBean";
pub const BILL_BEAN: &str = "ejb:bill/BillBean";

// =============================================================================
// Remote directory
// =============================================================================

/// Observable state shared by the directory, its connections and its handles.
#[derive(Default)]
pub struct DirectoryState {
    pub connects: AtomicUsize,
    pub closes: AtomicUsize,
    pub double_closes: AtomicUsize,
    pub lookups: AtomicUsize,
    pub invocations: AtomicUsize,
    pub unreachable: AtomicBool,
    pub refuse_connect: AtomicBool,
    // (remote name, module whose chain the lookup ran with), in lookup order.
    lookup_chains: Mutex<Vec<(String, String)>>,
    bound: Mutex<HashSet<String>>,
    incompatible: Mutex<HashSet<String>>,
    gate: Mutex<Option<Arc<Semaphore>>>,
}

impl DirectoryState {
    pub fn open_connections(&self) -> usize {
        self.connects.load(Ordering::SeqCst) - self.closes.load(Ordering::SeqCst)
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.unreachable.store(!reachable, Ordering::SeqCst);
    }

    pub fn lookup_chains(&self) -> Vec<(String, String)> {
        self.lookup_chains.lock().clone()
    }
}

#[derive(Default)]
pub struct MockDirectory {
    pub state: Arc<DirectoryState>,
}

impl MockDirectory {
    pub fn with_bindings(names: &[&str]) -> Self {
        let dir = Self::default();
        dir.state
            .bound
            .lock()
            .extend(names.iter().map(|n| (*n).to_owned()));
        dir
    }

    pub fn bind(&self, name: &str) {
        self.state.bound.lock().insert(name.to_owned());
    }

    /// Handles for `name` will claim not to implement any interface.
    pub fn mark_incompatible(&self, name: &str) {
        self.state.incompatible.lock().insert(name.to_owned());
    }

    /// Make every lookup wait until [`MockDirectory::open_gate`] is called.
    pub fn close_gate(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.state.gate.lock() = Some(Arc::clone(&gate));
        gate
    }

    pub fn open_gate(gate: &Semaphore) {
        gate.add_permits(Semaphore::MAX_PERMITS / 2);
    }
}

impl RemoteDirectory for MockDirectory {
    fn connect(
        &self,
        _environment: &DirectoryEnvironment,
    ) -> Result<Arc<dyn DirectoryConnection>, DirectoryError> {
        if self.state.refuse_connect.load(Ordering::SeqCst)
            || self.state.unreachable.load(Ordering::SeqCst)
        {
            return Err(DirectoryError::Connection("connection refused".to_owned()));
        }
        self.state.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MockConnection {
            state: Arc::clone(&self.state),
            closed: AtomicBool::new(false),
        }))
    }
}

struct MockConnection {
    state: Arc<DirectoryState>,
    closed: AtomicBool,
}

#[async_trait]
impl DirectoryConnection for MockConnection {
    async fn lookup(
        &self,
        name: &str,
        chain: &ResolutionChain,
    ) -> Result<Arc<dyn RemoteHandle>, DirectoryError> {
        self.state
            .lookup_chains
            .lock()
            .push((name.to_owned(), chain.module_name().to_owned()));
        let generation = self.state.lookups.fetch_add(1, Ordering::SeqCst) + 1;

        let gate = self.state.gate.lock().clone();
        if let Some(gate) = gate {
            let _permit = gate.acquire().await.map_err(|_| DirectoryError::Closed)?;
        }

        if self.state.unreachable.load(Ordering::SeqCst) {
            return Err(DirectoryError::Connection("directory unreachable".to_owned()));
        }
        if !self.state.bound.lock().contains(name) {
            return Err(DirectoryError::NotFound {
                name: name.to_owned(),
            });
        }
        Ok(Arc::new(EchoHandle {
            name: name.to_owned(),
            generation,
            compatible: !self.state.incompatible.lock().contains(name),
            state: Arc::clone(&self.state),
        }))
    }

    fn close(&self) -> Result<(), DirectoryError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            self.state.double_closes.fetch_add(1, Ordering::SeqCst);
            return Err(DirectoryError::Closed);
        }
        self.state.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Replies with what it was asked, tagged with the lookup that produced it.
struct EchoHandle {
    name: String,
    generation: usize,
    compatible: bool,
    state: Arc<DirectoryState>,
}

#[async_trait]
impl RemoteHandle for EchoHandle {
    fn implements(&self, _interface: &InterfaceType) -> bool {
        self.compatible
    }

    async fn invoke(
        &self,
        invocation: &Invocation,
        chain: &ResolutionChain,
    ) -> Result<serde_json::Value, RemoteCallError> {
        if self.state.unreachable.load(Ordering::SeqCst) {
            return Err(RemoteCallError::Connection("directory unreachable".to_owned()));
        }
        if invocation.method == "fail" {
            return Err(RemoteCallError::Remote {
                method: invocation.method.clone(),
                message: "bean raised".to_owned(),
            });
        }
        self.state.invocations.fetch_add(1, Ordering::SeqCst);
        Ok(json!({
            "remote": self.name,
            "method": invocation.method,
            "args": invocation.args,
            "generation": self.generation,
            "module": chain.module_name(),
        }))
    }
}

// =============================================================================
// Executor
// =============================================================================

/// Tokio executor that counts submitted lookups.
pub struct CountingExecutor {
    inner: TokioLookupExecutor,
    pub submitted: AtomicUsize,
}

impl CountingExecutor {
    pub fn current() -> Self {
        Self {
            inner: TokioLookupExecutor::current().unwrap(),
            submitted: AtomicUsize::new(0),
        }
    }

    pub fn submitted(&self) -> usize {
        self.submitted.load(Ordering::SeqCst)
    }
}

impl LookupExecutor for CountingExecutor {
    fn submit(&self, task: RemoteLookupTask) -> HandleFuture {
        self.submitted.fetch_add(1, Ordering::SeqCst);
        self.inner.submit(task)
    }
}

// =============================================================================
// Host
// =============================================================================

/// Delegates to a [`LocalModuleHost`] but refuses publications once `allowed` is used up.
pub struct FailingHost {
    pub inner: Arc<LocalModuleHost>,
    allowed: AtomicUsize,
}

impl FailingHost {
    pub fn new(inner: Arc<LocalModuleHost>, allowed: usize) -> Self {
        Self {
            inner,
            allowed: AtomicUsize::new(allowed),
        }
    }
}

impl ModuleHost for FailingHost {
    fn modules(&self) -> Vec<ModuleRef> {
        self.inner.modules()
    }

    fn subscribe(&self, listener: Arc<dyn ModuleListener>) -> ListenerId {
        self.inner.subscribe(listener)
    }

    fn unsubscribe(&self, id: ListenerId) -> bool {
        self.inner.unsubscribe(id)
    }

    fn register_service(
        &self,
        registration: ServiceRegistration,
    ) -> Result<ServiceRegistrationId, HostError> {
        let granted = self
            .allowed
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if !granted {
            return Err(HostError::Rejected {
                interface: registration.interface.to_string(),
                reason: "registry is read-only".to_owned(),
            });
        }
        self.inner.register_service(registration)
    }

    fn unregister_service(&self, id: ServiceRegistrationId) -> Result<(), HostError> {
        self.inner.unregister_service(id)
    }
}

/// Delegates to a [`LocalModuleHost`] but parks the first publication until resumed.
pub struct GateHost {
    pub inner: Arc<LocalModuleHost>,
    parked: AtomicBool,
    entered: Barrier,
    resumed: Barrier,
}

impl GateHost {
    pub fn new(inner: Arc<LocalModuleHost>) -> Self {
        Self {
            inner,
            parked: AtomicBool::new(false),
            entered: Barrier::new(2),
            resumed: Barrier::new(2),
        }
    }

    /// Block until the first publication is parked.
    pub fn wait_parked(&self) {
        self.entered.wait();
    }

    pub fn resume(&self) {
        self.resumed.wait();
    }
}

impl ModuleHost for GateHost {
    fn modules(&self) -> Vec<ModuleRef> {
        self.inner.modules()
    }

    fn subscribe(&self, listener: Arc<dyn ModuleListener>) -> ListenerId {
        self.inner.subscribe(listener)
    }

    fn unsubscribe(&self, id: ListenerId) -> bool {
        self.inner.unsubscribe(id)
    }

    fn register_service(
        &self,
        registration: ServiceRegistration,
    ) -> Result<ServiceRegistrationId, HostError> {
        if !self.parked.swap(true, Ordering::SeqCst) {
            self.entered.wait();
            self.resumed.wait();
        }
        self.inner.register_service(registration)
    }

    fn unregister_service(&self, id: ServiceRegistrationId) -> Result<(), HostError> {
        self.inner.unregister_service(id)
    }
}

// =============================================================================
// Modules
// =============================================================================

pub fn descriptor(entries: &[(&str, &str)]) -> Vec<u8> {
    let services: Vec<_> = entries
        .iter()
        .map(|(interface, remote_name)| json!({ "interface": interface, "remote_name": remote_name }))
        .collect();
    serde_json::to_vec(&json!({ "services": services })).unwrap()
}

/// `Orders` declares `OrderService -> ejb:orders/OrderBean` and `Billing -> ejb:bill/BillBean`.
pub fn orders_module(id: u64) -> LocalModule {
    LocalModule::new(ModuleId(id), "com.acme.orders")
        .with_resource(
            "MODULE-INF/remote-service/orders.json",
            descriptor(&[(ORDER_SERVICE, ORDER_BEAN), (BILLING, BILL_BEAN)]),
        )
        .with_type(InterfaceType::new(ORDER_SERVICE).with_methods(["place", "status", "fail"]))
        .with_type(InterfaceType::new(BILLING).with_method("charge"))
}

pub fn module_declaring(id: u64, name: &str, entries: &[(&str, &str)]) -> LocalModule {
    LocalModule::new(ModuleId(id), name)
        .with_resource("MODULE-INF/remote-service/services.json", descriptor(entries))
}

// =============================================================================
// Harness
// =============================================================================

pub struct Harness {
    pub host: Arc<LocalModuleHost>,
    pub directory: Arc<MockDirectory>,
    pub executor: Arc<CountingExecutor>,
    pub controller: Arc<LifecycleController>,
}

impl Harness {
    /// Must be called inside a tokio runtime.
    pub fn new(host: Arc<LocalModuleHost>, directory: MockDirectory) -> Self {
        Self::with_config(host, directory, &RemoteProxyConfig::default())
    }

    pub fn with_config(
        host: Arc<LocalModuleHost>,
        directory: MockDirectory,
        config: &RemoteProxyConfig,
    ) -> Self {
        let directory = Arc::new(directory);
        let executor = Arc::new(CountingExecutor::current());
        let controller = LifecycleController::new(
            config,
            Arc::clone(&host) as Arc<dyn ModuleHost>,
            Arc::clone(&directory) as Arc<dyn RemoteDirectory>,
            Arc::clone(&executor) as Arc<dyn LookupExecutor>,
            Arc::new(JsonDescriptorParser),
        )
        .unwrap();
        Self {
            host,
            directory,
            executor,
            controller,
        }
    }

    pub fn state(&self) -> &DirectoryState {
        &self.directory.state
    }

    pub fn proxy(&self, interface: &str) -> Arc<dyn RemoteService> {
        self.host
            .registry()
            .get_typed::<dyn RemoteService>(interface)
            .unwrap()
    }
}
