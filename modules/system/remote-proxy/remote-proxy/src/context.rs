//! Everything published for one module, owned and released as a unit.

use std::sync::Arc;

use modkit_host::{ModuleHost, ModuleId, ServiceRegistration, ServiceRegistrationId};
use parking_lot::Mutex;
use remote_proxy_sdk::{DirectoryError, REMOTE_NAME, RemoteService, SERVICE_IMPORTED, SOURCE_MODULE};

use crate::chain::ResolutionChain;
use crate::descriptor::ServiceDeclaration;
use crate::directory::{ConnectionSlot, DirectoryEnvironment, RemoteDirectory};
use crate::dispatcher::{InvocationDispatcher, ServiceProxy};
use crate::error::ContextError;
use crate::scheduler::LookupExecutor;

/// Collaborators shared by every context.
pub struct ProxyDeps {
    pub host: Arc<dyn ModuleHost>,
    pub directory: Arc<dyn RemoteDirectory>,
    pub executor: Arc<dyn LookupExecutor>,
    pub environment: DirectoryEnvironment,
    pub reconnect_on_flush: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    Building,
    Active,
    Released,
}

pub struct ProxyContext {
    module_id: ModuleId,
    module_name: String,
    chain: ResolutionChain,
    connection: Arc<ConnectionSlot>,
    // Index-aligned with `registrations`.
    dispatchers: Vec<Arc<InvocationDispatcher>>,
    registrations: Vec<ServiceRegistrationId>,
    // Also serializes flush against release.
    state: Mutex<ContextState>,
}

impl ProxyContext {
    /// Connect, then publish one proxy per declaration whose interface type loads.
    ///
    /// Declarations whose type is not visible through `chain` are logged and skipped. If the
    /// host refuses a publication, everything published so far is withdrawn and the
    /// connection closed before the error is returned.
    ///
    /// # Errors
    /// `Connect` if the directory is unreachable, `Publish` if the host refuses a proxy.
    pub fn build(
        deps: &ProxyDeps,
        chain: ResolutionChain,
        declarations: &[ServiceDeclaration],
    ) -> Result<Self, ContextError> {
        let module_name = chain.module_name().to_owned();
        let connection = deps
            .directory
            .connect(&deps.environment)
            .map_err(|source| ContextError::Connect {
                module: module_name.clone(),
                source,
            })?;

        let mut ctx = Self {
            module_id: chain.module_id(),
            module_name,
            chain,
            connection: Arc::new(ConnectionSlot::new(connection)),
            dispatchers: Vec::with_capacity(declarations.len()),
            registrations: Vec::with_capacity(declarations.len()),
            state: Mutex::new(ContextState::Building),
        };

        for decl in declarations {
            let interface = match ctx.chain.load(&decl.interface_name) {
                Ok(ty) => ty,
                Err(e) => {
                    tracing::warn!(
                        module = %ctx.module_name,
                        interface = %decl.interface_name,
                        remote_name = %decl.remote_name,
                        error = %e,
                        "Failed to load interface type, remote service will not be available"
                    );
                    continue;
                }
            };

            let dispatcher = Arc::new(InvocationDispatcher::new(
                Arc::clone(&interface),
                decl.remote_name.as_str(),
                ctx.chain.clone(),
                Arc::clone(&ctx.connection),
                Arc::clone(&deps.executor),
            ));
            let proxy: Arc<dyn RemoteService> = Arc::new(ServiceProxy::new(Arc::clone(&dispatcher)));
            let registration =
                ServiceRegistration::new::<dyn RemoteService>(interface.name(), proxy)
                    .with_property(SERVICE_IMPORTED, true)
                    .with_property(REMOTE_NAME, decl.remote_name.as_str())
                    .with_property(SOURCE_MODULE, ctx.module_name.as_str());

            match deps.host.register_service(registration) {
                Ok(id) => {
                    tracing::debug!(
                        module = %ctx.module_name,
                        interface = %interface.name(),
                        remote_name = %decl.remote_name,
                        "Published remote service proxy"
                    );
                    ctx.dispatchers.push(dispatcher);
                    ctx.registrations.push(id);
                }
                Err(source) => {
                    dispatcher.release();
                    ctx.release(deps.host.as_ref());
                    return Err(ContextError::Publish {
                        module: ctx.module_name.clone(),
                        interface: interface.name().to_owned(),
                        source,
                    });
                }
            }
        }

        *ctx.state.lock() = ContextState::Active;
        Ok(ctx)
    }

    /// Withdraw every entry, release every dispatcher and close the connection.
    ///
    /// Returns `false` if the context was already released. Individual failures are logged
    /// and do not stop the rest of the teardown.
    pub fn release(&self, host: &dyn ModuleHost) -> bool {
        let mut state = self.state.lock();
        if *state == ContextState::Released {
            return false;
        }
        *state = ContextState::Released;

        for id in &self.registrations {
            if let Err(e) = host.unregister_service(*id) {
                tracing::warn!(
                    module = %self.module_name,
                    registration = %id,
                    error = %e,
                    "Failed to withdraw remote service proxy"
                );
            }
        }
        for dispatcher in &self.dispatchers {
            dispatcher.release();
        }
        if let Err(e) = self.connection.current().close() {
            tracing::warn!(
                module = %self.module_name,
                error = %e,
                "Failed to close remote directory connection"
            );
        }
        true
    }

    /// Invalidate every cached handle, reconnecting first when configured.
    ///
    /// A reconnect failure keeps the old connection and is returned, but the handles are
    /// invalidated regardless. A context that is not active is left untouched.
    ///
    /// # Errors
    /// Returns the directory error of a failed reconnect.
    pub fn flush(&self, deps: &ProxyDeps) -> Result<(), DirectoryError> {
        let state = self.state.lock();
        if *state != ContextState::Active {
            return Ok(());
        }

        let mut outcome = Ok(());
        if deps.reconnect_on_flush {
            match deps.directory.connect(&deps.environment) {
                Ok(fresh) => {
                    let stale = self.connection.replace(fresh);
                    if let Err(e) = stale.close() {
                        tracing::debug!(module = %self.module_name, error = %e, "Failed to close stale directory connection");
                    }
                }
                Err(e) => outcome = Err(e),
            }
        }

        for dispatcher in &self.dispatchers {
            dispatcher.invalidate();
        }
        tracing::debug!(
            module = %self.module_name,
            proxies = self.dispatchers.len(),
            "Invalidated remote handles"
        );
        outcome
    }

    #[must_use]
    pub fn state(&self) -> ContextState {
        *self.state.lock()
    }

    #[must_use]
    pub fn module_id(&self) -> ModuleId {
        self.module_id
    }

    #[must_use]
    pub fn module_name(&self) -> &str {
        &self.module_name
    }

    #[must_use]
    pub fn chain(&self) -> &ResolutionChain {
        &self.chain
    }

    #[must_use]
    pub fn dispatchers(&self) -> &[Arc<InvocationDispatcher>] {
        &self.dispatchers
    }

    #[must_use]
    pub fn registrations(&self) -> &[ServiceRegistrationId] {
        &self.registrations
    }
}
