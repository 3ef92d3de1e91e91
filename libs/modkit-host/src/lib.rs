//! Module host contracts.
//!
//! A module host tracks deployable modules, delivers their lifecycle events and hosts a
//! service registry. This crate defines the contract the remote proxy bridge is written
//! against and ships [`LocalModuleHost`], an in-process implementation of it.
//!
//! - [`Module`] - read-only view of one module: identity, state, headers, resources, types
//! - [`ModuleHost`] - enumeration, event subscription and service publication
//! - [`ServiceRegistry`] - `(interface, implementation, properties)` entries
//! - [`TypeSpace`] / [`InterfaceType`] - the interface types a module carries
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod host;
pub mod local;
pub mod module;
pub mod registry;
pub mod types;

pub use host::{HostError, ModuleHost};
pub use local::{LocalModule, LocalModuleHost};
pub use module::{
    ListenerId, Module, ModuleEvent, ModuleEventKind, ModuleId, ModuleListener, ModuleRef,
    ModuleState, ResourceHandle,
};
pub use registry::{
    Properties, RegistryError, ServiceObject, ServiceRecord, ServiceRegistration,
    ServiceRegistrationId, ServiceRegistry,
};
pub use types::{InterfaceType, TypeSpace};
