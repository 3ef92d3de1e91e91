//! Error types for the remote proxy module.

use thiserror::Error;

/// Failures reported by the remote object directory.
///
/// Cloneable because one failed lookup is observed by every call waiting on it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DirectoryError {
    /// No object is bound under the requested name.
    #[error("remote object not found: {name}")]
    NotFound { name: String },

    /// The directory could not be reached or the connection broke.
    #[error("directory connection failed: {0}")]
    Connection(String),

    /// The resolved object does not implement the declared interface.
    #[error("remote object {name} does not implement {interface}")]
    TypeMismatch { name: String, interface: String },

    /// The connection was already closed.
    #[error("directory connection closed")]
    Closed,

    /// The lookup task panicked or was cancelled before completing.
    #[error("lookup of {name} aborted: {reason}")]
    Aborted { name: String, reason: String },
}

/// Errors surfaced to callers of a published proxy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteCallError {
    /// Resolving the remote handle failed; repeated until the proxy is flushed.
    #[error("could not resolve remote object {remote_name}")]
    Resolution {
        remote_name: String,
        #[source]
        source: DirectoryError,
    },

    /// The proxy was withdrawn together with its declaring module.
    #[error("proxy for {remote_name} has been released")]
    Released { remote_name: String },

    /// The declared interface has no such method.
    #[error("interface {interface} has no method {method}")]
    UnknownMethod { interface: String, method: String },

    /// The remote object raised an error; forwarded verbatim.
    #[error("remote call {method} failed: {message}")]
    Remote { method: String, message: String },

    /// Transport failure while forwarding the call.
    #[error("remote call transport failed: {0}")]
    Connection(String),

    /// Arguments or results could not be (de)serialized.
    #[error("codec error: {0}")]
    Codec(String),
}

/// One module whose proxies could not be flushed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlushFailure {
    pub module: String,
    pub error: DirectoryError,
}

/// Aggregated outcome of a flush across all modules.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("could not flush all proxies ({} failed)", .failures.len())]
pub struct FlushError {
    pub failures: Vec<FlushFailure>,
}
