//! Error types of the remote proxy engine.

use modkit_host::{HostError, ModuleId};
use remote_proxy_sdk::DirectoryError;
use thiserror::Error;

/// A declared interface type is visible neither in the module nor in any parent module.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("interface type {name} not found from module {module}")]
pub struct TypeNotFound {
    pub module: ModuleId,
    pub name: String,
}

/// A descriptor resource could not be used. Only that resource is skipped.
#[derive(Debug, Error)]
pub enum DescriptorError {
    #[error("malformed descriptor {path}")]
    Malformed {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid descriptor {path}: {reason}")]
    Invalid { path: String, reason: String },
}

/// The configured parent modules cannot be matched against installed modules.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParentModulesError {
    #[error("required parent modules not installed: {}", .missing.join(", "))]
    Missing { missing: Vec<String> },

    #[error("parent module {name} is installed more than once")]
    Duplicate { name: String },
}

/// Failures that abort one module's proxy context.
#[derive(Debug, Error)]
pub enum ContextError {
    #[error("cannot connect to remote directory for module {module}")]
    Connect {
        module: String,
        #[source]
        source: DirectoryError,
    },

    #[error("host refused proxy for {interface} of module {module}")]
    Publish {
        module: String,
        interface: String,
        #[source]
        source: HostError,
    },
}

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error(transparent)]
    ParentModules(#[from] ParentModulesError),

    #[error("cannot publish the proxy flusher")]
    Publish(#[from] HostError),

    #[error("controller has been stopped")]
    Stopped,
}
