//! Remote proxy module.
//!
//! Publishes local proxies for remote services declared by host modules. When a module that
//! carries service descriptors becomes active, every declared interface gets a
//! [`ServiceProxy`] in the host registry. Calls on the proxy wait for the remote object to be
//! resolved through the [`RemoteDirectory`] and are forwarded to it. When the module stops,
//! its proxies are withdrawn and its directory connection closed.
//!
//! ## Usage
//!
//! ```ignore
//! let config = RemoteProxyConfig::from_figment(&figment)?;
//! let controller = LifecycleController::new(
//!     &config,
//!     host.clone(),
//!     Arc::new(MyDirectory::new()),
//!     Arc::new(TokioLookupExecutor::current()?),
//!     Arc::new(JsonDescriptorParser),
//! )?;
//! controller.start()?;
//! // ...
//! controller.stop();
//! ```
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod chain;
pub mod config;
pub mod context;
pub mod contexts;
pub mod controller;
pub mod descriptor;
pub mod directory;
pub mod dispatcher;
pub mod error;
pub mod scheduler;

pub use chain::{ResolutionChain, ResolutionChainBuilder};
pub use config::{ConfigError, DuplicateParentPolicy, RemoteProxyConfig};
pub use context::{ContextState, ProxyContext, ProxyDeps};
pub use contexts::ProxyContextRegistry;
pub use controller::LifecycleController;
pub use descriptor::{DescriptorParser, DescriptorScanner, JsonDescriptorParser, ServiceDeclaration};
pub use directory::{
    ConnectionSlot, DirectoryConnection, DirectoryEnvironment, RemoteDirectory, RemoteHandle,
};
pub use dispatcher::{InvocationDispatcher, ServiceProxy};
pub use error::{ContextError, ControllerError, DescriptorError, ParentModulesError, TypeNotFound};
pub use scheduler::{
    HandleFuture, LookupExecutor, LookupResult, RemoteLookupTask, TokioLookupExecutor,
};
