//! Contract of the remote object directory.
//!
//! The engine never talks to a transport directly. It opens one [`DirectoryConnection`] per
//! module context, looks remote objects up by name and forwards calls to the returned
//! [`RemoteHandle`]s. Every lookup and every call carries the declaring module's
//! [`ResolutionChain`] so the transport can decode values with that module's types.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use modkit_host::InterfaceType;
use parking_lot::RwLock;
use remote_proxy_sdk::{DirectoryError, Invocation, RemoteCallError};

use crate::chain::ResolutionChain;

/// Connection properties handed to [`RemoteDirectory::connect`].
pub type DirectoryEnvironment = BTreeMap<String, String>;

pub trait RemoteDirectory: Send + Sync {
    /// Open a connection. Must not block on remote I/O for longer than connection setup.
    ///
    /// # Errors
    /// Returns `DirectoryError::Connection` if the directory cannot be reached.
    fn connect(
        &self,
        environment: &DirectoryEnvironment,
    ) -> Result<Arc<dyn DirectoryConnection>, DirectoryError>;
}

#[async_trait]
pub trait DirectoryConnection: Send + Sync {
    /// Resolve `name` to a callable handle.
    async fn lookup(
        &self,
        name: &str,
        chain: &ResolutionChain,
    ) -> Result<Arc<dyn RemoteHandle>, DirectoryError>;

    /// Release the connection. Called at most once per connection by the engine.
    ///
    /// # Errors
    /// Returns the transport's failure; callers log it and move on.
    fn close(&self) -> Result<(), DirectoryError>;
}

/// A resolved remote object.
#[async_trait]
pub trait RemoteHandle: Send + Sync {
    /// Whether the remote object can serve `interface`. Transports without type information
    /// accept everything.
    fn implements(&self, _interface: &InterfaceType) -> bool {
        true
    }

    async fn invoke(
        &self,
        invocation: &Invocation,
        chain: &ResolutionChain,
    ) -> Result<serde_json::Value, RemoteCallError>;
}

/// The connection currently used by one module context. Replaced on reconnect.
pub struct ConnectionSlot {
    current: RwLock<Arc<dyn DirectoryConnection>>,
}

impl ConnectionSlot {
    #[must_use]
    pub fn new(connection: Arc<dyn DirectoryConnection>) -> Self {
        Self {
            current: RwLock::new(connection),
        }
    }

    #[must_use]
    pub fn current(&self) -> Arc<dyn DirectoryConnection> {
        Arc::clone(&self.current.read())
    }

    /// Install `connection` and return the one it replaces.
    pub fn replace(&self, connection: Arc<dyn DirectoryConnection>) -> Arc<dyn DirectoryConnection> {
        std::mem::replace(&mut *self.current.write(), connection)
    }
}
