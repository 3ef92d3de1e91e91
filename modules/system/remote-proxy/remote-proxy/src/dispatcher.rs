//! Call interception for published proxies.
//!
//! Every proxy wraps an [`InvocationDispatcher`]. A call awaits the dispatcher's current
//! lookup future and forwards to the handle it produced. `invalidate()` drops that future so
//! the next call submits exactly one fresh lookup; calls already awaiting the old future keep
//! it. A failed lookup is shared by every call until the next invalidation.

use std::sync::Arc;

use async_trait::async_trait;
use modkit_host::InterfaceType;
use parking_lot::Mutex;
use remote_proxy_sdk::{Invocation, RemoteCallError, RemoteService};

use crate::chain::ResolutionChain;
use crate::directory::ConnectionSlot;
use crate::scheduler::{HandleFuture, LookupExecutor, RemoteLookupTask};

#[derive(Default)]
struct DispatchState {
    pending: Option<HandleFuture>,
    released: bool,
}

pub struct InvocationDispatcher {
    interface: Arc<InterfaceType>,
    remote_name: Arc<str>,
    chain: ResolutionChain,
    connection: Arc<ConnectionSlot>,
    executor: Arc<dyn LookupExecutor>,
    // Never held across an await.
    state: Mutex<DispatchState>,
}

impl InvocationDispatcher {
    /// Create the dispatcher and submit its first lookup right away.
    #[must_use]
    pub fn new(
        interface: Arc<InterfaceType>,
        remote_name: impl Into<Arc<str>>,
        chain: ResolutionChain,
        connection: Arc<ConnectionSlot>,
        executor: Arc<dyn LookupExecutor>,
    ) -> Self {
        let dispatcher = Self {
            interface,
            remote_name: remote_name.into(),
            chain,
            connection,
            executor,
            state: Mutex::new(DispatchState::default()),
        };
        let first = dispatcher.submit();
        dispatcher.state.lock().pending = Some(first);
        dispatcher
    }

    fn submit(&self) -> HandleFuture {
        self.executor.submit(RemoteLookupTask::new(
            Arc::clone(&self.interface),
            Arc::clone(&self.remote_name),
            self.chain.clone(),
            self.connection.current(),
        ))
    }

    fn released_error(&self) -> RemoteCallError {
        RemoteCallError::Released {
            remote_name: self.remote_name.to_string(),
        }
    }

    /// The lookup future calls should await, submitting a new one if invalidated.
    fn current(&self) -> Result<HandleFuture, RemoteCallError> {
        let mut state = self.state.lock();
        if state.released {
            return Err(self.released_error());
        }
        if let Some(pending) = &state.pending {
            return Ok(pending.clone());
        }
        tracing::debug!(
            module = %self.chain.module_name(),
            remote_name = %self.remote_name,
            "Re-resolving invalidated remote handle"
        );
        let fresh = self.submit();
        state.pending = Some(fresh.clone());
        Ok(fresh)
    }

    /// Forward one call to the resolved remote object.
    ///
    /// # Errors
    /// `Resolution` if the lookup failed, `Released` once the owning context is gone, or the
    /// remote object's own error.
    pub async fn invoke(
        &self,
        invocation: &Invocation,
    ) -> Result<serde_json::Value, RemoteCallError> {
        let pending = self.current()?;
        let handle = pending
            .await
            .map_err(|source| RemoteCallError::Resolution {
                remote_name: self.remote_name.to_string(),
                source,
            })?;
        // A handle resolved for a released context is stale.
        if self.state.lock().released {
            return Err(self.released_error());
        }
        handle.invoke(invocation, &self.chain).await
    }

    /// Drop the cached lookup so the next call resolves again. Returns `false` once released.
    pub fn invalidate(&self) -> bool {
        let mut state = self.state.lock();
        if state.released {
            return false;
        }
        state.pending = None;
        true
    }

    /// Final invalidation: every later call fails with `Released`.
    pub fn release(&self) {
        let mut state = self.state.lock();
        state.released = true;
        state.pending = None;
    }

    #[must_use]
    pub fn is_released(&self) -> bool {
        self.state.lock().released
    }

    #[must_use]
    pub fn interface(&self) -> &Arc<InterfaceType> {
        &self.interface
    }

    #[must_use]
    pub fn remote_name(&self) -> &str {
        &self.remote_name
    }

    #[must_use]
    pub fn chain(&self) -> &ResolutionChain {
        &self.chain
    }
}

/// The object published into the host registry for one declared interface.
#[derive(Clone)]
pub struct ServiceProxy {
    dispatcher: Arc<InvocationDispatcher>,
}

impl ServiceProxy {
    #[must_use]
    pub fn new(dispatcher: Arc<InvocationDispatcher>) -> Self {
        Self { dispatcher }
    }

    #[must_use]
    pub fn dispatcher(&self) -> &Arc<InvocationDispatcher> {
        &self.dispatcher
    }
}

#[async_trait]
impl RemoteService for ServiceProxy {
    fn interface_name(&self) -> &str {
        self.dispatcher.interface.name()
    }

    fn remote_name(&self) -> &str {
        &self.dispatcher.remote_name
    }

    async fn invoke(&self, invocation: Invocation) -> Result<serde_json::Value, RemoteCallError> {
        if !self.dispatcher.interface.has_method(&invocation.method) {
            return Err(RemoteCallError::UnknownMethod {
                interface: self.interface_name().to_owned(),
                method: invocation.method,
            });
        }
        self.dispatcher.invoke(&invocation).await
    }
}
