//! Public API traits for the remote proxy module.
//!
//! Every proxy the module publishes into the host registry is an `Arc<dyn RemoteService>`
//! registered under its declared interface name. Callers never see the remote directory.

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{FlushError, RemoteCallError};
use crate::models::Invocation;

/// A locally published stand-in for a remote object.
///
/// Each call waits for the remote handle to be resolved (resolving again if the proxy was
/// flushed) and forwards the invocation.
///
/// ```ignore
/// let svc = registry.get_typed::<dyn RemoteService>("com.acme.Billing")?;
/// let out = svc.invoke(Invocation::new("charge", json!({ "cents": 500 }))).await?;
/// ```
#[async_trait]
pub trait RemoteService: Send + Sync {
    /// Declared interface this proxy implements.
    fn interface_name(&self) -> &str;

    /// Name the remote object is looked up under.
    fn remote_name(&self) -> &str;

    /// Forward one call.
    ///
    /// # Errors
    ///
    /// - `UnknownMethod` if the interface does not declare the method
    /// - `Resolution` if the remote handle could not be resolved
    /// - `Released` if the declaring module has stopped
    /// - any error the remote object raised, verbatim
    async fn invoke(&self, invocation: Invocation) -> Result<serde_json::Value, RemoteCallError>;
}

/// Capability to invalidate every cached remote handle.
pub trait ProxyFlusher: Send + Sync {
    /// Invalidate all proxies of all modules. Every module is attempted even if some fail.
    ///
    /// # Errors
    /// Returns one aggregated error listing every module that failed.
    fn flush_proxies(&self) -> Result<(), FlushError>;
}

/// Typed convenience wrapper around [`RemoteService::invoke`].
///
/// # Errors
/// Returns `Codec` if `args` cannot be serialized or the result cannot be decoded as `R`, or
/// any error from the call itself.
pub async fn call<A, R>(
    service: &dyn RemoteService,
    method: &str,
    args: &A,
) -> Result<R, RemoteCallError>
where
    A: Serialize + ?Sized,
    R: DeserializeOwned,
{
    let args = serde_json::to_value(args).map_err(|e| RemoteCallError::Codec(e.to_string()))?;
    let out = service.invoke(Invocation::new(method, args)).await?;
    serde_json::from_value(out).map_err(|e| RemoteCallError::Codec(e.to_string()))
}
