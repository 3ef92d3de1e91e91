//! Remote Proxy SDK
//!
//! This crate provides the public API for the `remote-proxy` module:
//!
//! - [`RemoteService`] - what every published proxy implements
//! - [`ProxyFlusher`] - capability to force re-resolution of all remote handles
//! - [`Invocation`] - one forwarded call
//! - [`DirectoryError`], [`RemoteCallError`], [`FlushError`] - error types
//! - [`models`] - registry property keys set on every published proxy
//!
//! ## Usage
//!
//! Consumers find a proxy in the host registry under its interface name:
//!
//! ```ignore
//! use remote_proxy_sdk::{RemoteService, call};
//!
//! let orders = registry.get_typed::<dyn RemoteService>("com.acme.OrderService")?;
//! let total: u64 = call(orders.as_ref(), "total", &json!({ "order": 7 })).await?;
//! ```
//!
//! Operators flush all proxies after the remote directory restarts:
//!
//! ```ignore
//! let flusher = registry.get_typed::<dyn ProxyFlusher>(PROXY_FLUSHER_INTERFACE)?;
//! flusher.flush_proxies()?;
//! ```
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod api;
pub mod error;
pub mod models;

pub use api::{ProxyFlusher, RemoteService, call};
pub use error::{DirectoryError, FlushError, FlushFailure, RemoteCallError};
pub use models::{
    Invocation, PROXY_FLUSHER_INTERFACE, REMOTE_NAME, SERVICE_IMPORTED, SOURCE_MODULE,
};
