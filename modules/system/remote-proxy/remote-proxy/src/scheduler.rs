//! Asynchronous remote lookups.
//!
//! Resolution never runs on the thread that activates a module: each declared interface gets
//! one [`RemoteLookupTask`] submitted to a [`LookupExecutor`], and the resulting shared future
//! is what dispatchers await.

use std::sync::Arc;

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use modkit_host::InterfaceType;
use remote_proxy_sdk::DirectoryError;
use tokio::runtime::{Handle, TryCurrentError};

use crate::chain::ResolutionChain;
use crate::directory::{DirectoryConnection, RemoteHandle};

pub type LookupResult = Result<Arc<dyn RemoteHandle>, DirectoryError>;

/// Cloneable future of one lookup; every clone observes the same outcome.
pub type HandleFuture = Shared<BoxFuture<'static, LookupResult>>;

/// One-shot resolution of a remote name for a declared interface.
pub struct RemoteLookupTask {
    interface: Arc<InterfaceType>,
    remote_name: Arc<str>,
    chain: ResolutionChain,
    connection: Arc<dyn DirectoryConnection>,
}

impl RemoteLookupTask {
    #[must_use]
    pub fn new(
        interface: Arc<InterfaceType>,
        remote_name: Arc<str>,
        chain: ResolutionChain,
        connection: Arc<dyn DirectoryConnection>,
    ) -> Self {
        Self {
            interface,
            remote_name,
            chain,
            connection,
        }
    }

    #[must_use]
    pub fn remote_name(&self) -> &str {
        &self.remote_name
    }

    /// Look the name up with this task's chain and check the result against the interface.
    ///
    /// # Errors
    /// Returns the directory failure, or `TypeMismatch` if the handle does not implement the
    /// declared interface.
    pub async fn run(self) -> LookupResult {
        tracing::debug!(
            module = %self.chain.module_name(),
            interface = %self.interface.name(),
            remote_name = %self.remote_name,
            "Resolving remote object"
        );
        let handle = self.connection.lookup(&self.remote_name, &self.chain).await?;
        if !handle.implements(&self.interface) {
            return Err(DirectoryError::TypeMismatch {
                name: self.remote_name.to_string(),
                interface: self.interface.name().to_owned(),
            });
        }
        Ok(handle)
    }
}

/// Runs lookup tasks off the caller's thread.
pub trait LookupExecutor: Send + Sync {
    fn submit(&self, task: RemoteLookupTask) -> HandleFuture;
}

/// Executes lookups on a tokio runtime.
#[derive(Clone, Debug)]
pub struct TokioLookupExecutor {
    handle: Handle,
}

impl TokioLookupExecutor {
    #[must_use]
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Use the runtime the caller is running on.
    ///
    /// # Errors
    /// Fails outside a tokio runtime.
    pub fn current() -> Result<Self, TryCurrentError> {
        Handle::try_current().map(Self::new)
    }
}

impl LookupExecutor for TokioLookupExecutor {
    fn submit(&self, task: RemoteLookupTask) -> HandleFuture {
        let name = task.remote_name().to_owned();
        let join = self.handle.spawn(task.run());
        async move {
            match join.await {
                Ok(result) => result,
                Err(e) => Err(DirectoryError::Aborted {
                    name,
                    reason: e.to_string(),
                }),
            }
        }
        .boxed()
        .shared()
    }
}
