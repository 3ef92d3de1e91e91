//! Drives proxy contexts from module lifecycle events.
//!
//! `start()` subscribes to the host before scanning already-active modules, so a module that
//! starts during the scan is seen at least once; the context registry keeps the outcome to a
//! single context per module. `Stopped` events withdraw the module's proxies. `stop()` tears
//! everything down and detaches from the host; dropping the controller does the same.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use modkit_host::{
    ListenerId, ModuleEvent, ModuleEventKind, ModuleHost, ModuleId, ModuleListener, ModuleRef,
    ModuleState, ServiceRegistration, ServiceRegistrationId,
};
use parking_lot::Mutex;
use remote_proxy_sdk::{FlushError, FlushFailure, PROXY_FLUSHER_INTERFACE, ProxyFlusher};

use crate::chain::ResolutionChainBuilder;
use crate::config::RemoteProxyConfig;
use crate::context::{ProxyContext, ProxyDeps};
use crate::contexts::ProxyContextRegistry;
use crate::descriptor::{DescriptorParser, DescriptorScanner};
use crate::directory::RemoteDirectory;
use crate::error::ControllerError;
use crate::scheduler::LookupExecutor;

#[derive(Default)]
struct HostRegistrations {
    listener: Option<ListenerId>,
    flusher: Option<ServiceRegistrationId>,
}

pub struct LifecycleController {
    deps: ProxyDeps,
    parser: Arc<dyn DescriptorParser>,
    scanner: DescriptorScanner,
    chains: ResolutionChainBuilder,
    contexts: ProxyContextRegistry,
    started: AtomicBool,
    stopped: AtomicBool,
    // Only touched by start/stop.
    registrations: Mutex<HostRegistrations>,
}

impl LifecycleController {
    /// Resolve the configured parent modules and prepare the controller. Nothing is
    /// subscribed or published until [`LifecycleController::start`].
    ///
    /// # Errors
    /// Returns `ParentModules` if a required parent module is missing, or duplicated under
    /// the `reject` policy.
    pub fn new(
        config: &RemoteProxyConfig,
        host: Arc<dyn ModuleHost>,
        directory: Arc<dyn RemoteDirectory>,
        executor: Arc<dyn LookupExecutor>,
        parser: Arc<dyn DescriptorParser>,
    ) -> Result<Arc<Self>, ControllerError> {
        let chains = ResolutionChainBuilder::resolve_parents(
            host.as_ref(),
            &config.parent_modules,
            config.duplicate_parents,
        )?;

        Ok(Arc::new(Self {
            deps: ProxyDeps {
                host,
                directory,
                executor,
                environment: config.directory_environment.clone(),
                reconnect_on_flush: config.reconnect_on_flush,
            },
            parser,
            scanner: DescriptorScanner::from_config(config),
            chains,
            contexts: ProxyContextRegistry::new(),
            started: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            registrations: Mutex::new(HostRegistrations::default()),
        }))
    }

    /// Subscribe to module events, publish proxies for every active module and expose the
    /// [`ProxyFlusher`] capability. Calling it again is a no-op.
    ///
    /// # Errors
    /// `Stopped` after [`LifecycleController::stop`]; `Publish` if the host refuses the
    /// flusher, in which case the controller is stopped.
    pub fn start(self: &Arc<Self>) -> Result<(), ControllerError> {
        if self.is_stopped() {
            return Err(ControllerError::Stopped);
        }
        if self.started.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let handle = Arc::new(ControllerHandle {
            controller: Arc::downgrade(self),
        });
        let listener = self.deps.host.subscribe(Arc::clone(&handle) as Arc<dyn ModuleListener>);
        self.registrations.lock().listener = Some(listener);

        for module in self.deps.host.modules() {
            if module.state() == ModuleState::Active {
                self.add_module(&module);
            }
        }

        let flusher: Arc<dyn ProxyFlusher> = handle;
        match self.deps.host.register_service(ServiceRegistration::new::<dyn ProxyFlusher>(
            PROXY_FLUSHER_INTERFACE,
            flusher,
        )) {
            Ok(id) => self.registrations.lock().flusher = Some(id),
            Err(e) => {
                tracing::error!(error = %e, "Failed to publish proxy flusher");
                self.stop();
                return Err(ControllerError::Publish(e));
            }
        }

        tracing::info!(contexts = self.contexts.len(), "Remote proxy controller started");
        Ok(())
    }

    /// Build and register the context of `module`. Returns `true` if this call published it.
    ///
    /// Modules without declarations get no context, and a module that is no longer active once
    /// its context is built keeps none. Context-level failures are logged here
    /// and never reach the caller.
    pub fn add_module(&self, module: &ModuleRef) -> bool {
        if self.is_stopped() {
            return false;
        }
        let id = module.id();
        if self.contexts.contains(id) {
            return false;
        }

        let declarations = self
            .scanner
            .declarations(module.as_ref(), self.parser.as_ref());
        if declarations.is_empty() {
            return false;
        }

        let chain = self.chains.build(Arc::clone(module));
        let ctx = match ProxyContext::build(&self.deps, chain, &declarations) {
            Ok(ctx) => Arc::new(ctx),
            Err(e) => {
                tracing::error!(
                    module = %module.symbolic_name(),
                    error = %e,
                    "Failed to publish remote services for module"
                );
                return false;
            }
        };

        if !self.contexts.register_if_absent(Arc::clone(&ctx)) {
            tracing::debug!(
                module = %module.symbolic_name(),
                "Module already has a proxy context, discarding duplicate"
            );
            ctx.release(self.deps.host.as_ref());
            return false;
        }

        // Lost a race against stop(): the drain may have run before the insert.
        if self.is_stopped() {
            if let Some(ctx) = self.contexts.remove(id) {
                ctx.release(self.deps.host.as_ref());
            }
            return false;
        }

        // The module's Stopped event may have been handled while the context was built.
        if module.state() != ModuleState::Active {
            if let Some(ctx) = self.contexts.remove(id) {
                ctx.release(self.deps.host.as_ref());
            }
            tracing::debug!(
                module = %module.symbolic_name(),
                state = ?module.state(),
                "Module left the active state during publication, withdrew its proxies"
            );
            return false;
        }

        tracing::info!(
            module = %module.symbolic_name(),
            declared = declarations.len(),
            published = ctx.registrations().len(),
            "Registered remote service proxies"
        );
        true
    }

    /// Withdraw the proxies of `module`. Returns `false` if it had none.
    pub fn remove_module(&self, module: ModuleId) -> bool {
        let Some(ctx) = self.contexts.remove(module) else {
            return false;
        };
        ctx.release(self.deps.host.as_ref());
        tracing::info!(module = %ctx.module_name(), "Withdrew remote service proxies");
        true
    }

    /// React to one lifecycle event. Ignored once stopped.
    pub fn handle_event(&self, event: &ModuleEvent) {
        if self.is_stopped() {
            return;
        }
        match event.kind {
            ModuleEventKind::Started => {
                self.add_module(&event.module);
            }
            ModuleEventKind::Stopped | ModuleEventKind::Uninstalled => {
                self.remove_module(event.module.id());
            }
            ModuleEventKind::Installed => {}
        }
    }

    /// Invalidate every handle of every context, attempting all of them.
    ///
    /// # Errors
    /// Returns one `FlushError` listing every module whose flush failed.
    pub fn flush_all(&self) -> Result<(), FlushError> {
        let contexts = self.contexts.snapshot();
        let mut failures = Vec::new();
        for ctx in &contexts {
            if let Err(error) = ctx.flush(&self.deps) {
                tracing::error!(
                    module = %ctx.module_name(),
                    error = %error,
                    "Failed to flush remote service proxies"
                );
                failures.push(FlushFailure {
                    module: ctx.module_name().to_owned(),
                    error,
                });
            }
        }

        tracing::info!(
            contexts = contexts.len(),
            failed = failures.len(),
            "Flushed remote service proxies"
        );
        if failures.is_empty() {
            Ok(())
        } else {
            Err(FlushError { failures })
        }
    }

    /// Release every context, withdraw the flusher and unsubscribe. Idempotent.
    pub fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        let host = self.deps.host.as_ref();

        let released = self
            .contexts
            .drain()
            .iter()
            .filter(|ctx| ctx.release(host))
            .count();

        let registrations = std::mem::take(&mut *self.registrations.lock());
        if let Some(id) = registrations.flusher
            && let Err(e) = host.unregister_service(id)
        {
            tracing::warn!(error = %e, "Failed to withdraw proxy flusher");
        }
        if let Some(id) = registrations.listener
            && !host.unsubscribe(id)
        {
            tracing::debug!("Module listener was already unsubscribed");
        }

        tracing::info!(released, "Remote proxy controller stopped");
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn contexts(&self) -> &ProxyContextRegistry {
        &self.contexts
    }

    #[must_use]
    pub fn host(&self) -> &Arc<dyn ModuleHost> {
        &self.deps.host
    }
}

impl Drop for LifecycleController {
    fn drop(&mut self) {
        self.stop();
    }
}

impl ProxyFlusher for LifecycleController {
    fn flush_proxies(&self) -> Result<(), FlushError> {
        self.flush_all()
    }
}

/// What the host holds on to: forwards to the controller without keeping it alive.
struct ControllerHandle {
    controller: Weak<LifecycleController>,
}

impl ModuleListener for ControllerHandle {
    fn module_changed(&self, event: &ModuleEvent) {
        if let Some(controller) = self.controller.upgrade() {
            controller.handle_event(event);
        }
    }
}

impl ProxyFlusher for ControllerHandle {
    fn flush_proxies(&self) -> Result<(), FlushError> {
        match self.controller.upgrade() {
            Some(controller) => controller.flush_all(),
            None => Ok(()),
        }
    }
}
