//! Host service registry.
//!
//! Design goals:
//! - Publishers register an implementation under an *interface name* together with a property map.
//! - Consumers look services up by interface name and downcast to the Rust type they expect,
//!   without knowing whether the implementation is local or a proxy to a remote object.
//! - Every publication returns a [`ServiceRegistrationId`]; withdrawing uses that id only.
//!
//! Implementation details:
//! - Value = `Arc<T>` stored as `Arc<dyn Any + Send + Sync>` (downcast on read). `T` may be a
//!   trait object such as `dyn RemoteService`.
//! - Entries keep publication order; `get` returns the earliest live entry for an interface.
//!
//! Notes:
//! - Existing `Arc`s held by consumers remain valid after their entry is withdrawn.

use parking_lot::RwLock;
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Service properties published next to an implementation.
pub type Properties = BTreeMap<String, serde_json::Value>;

/// Handle of one published entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServiceRegistrationId(Uuid);

impl ServiceRegistrationId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for ServiceRegistrationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ServiceRegistrationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Type-erased service implementation.
#[derive(Clone)]
pub struct ServiceObject(Arc<dyn Any + Send + Sync>);

impl ServiceObject {
    pub fn new<T>(service: Arc<T>) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
    {
        Self(Arc::new(service))
    }

    /// Recover the `Arc<T>` this object was created from.
    #[must_use]
    pub fn downcast<T>(&self) -> Option<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.0.downcast_ref::<Arc<T>>().cloned()
    }
}

impl fmt::Debug for ServiceObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ServiceObject(..)")
    }
}

/// A publication request.
#[derive(Clone, Debug)]
pub struct ServiceRegistration {
    pub interface: Arc<str>,
    pub service: ServiceObject,
    pub properties: Properties,
}

impl ServiceRegistration {
    pub fn new<T>(interface: impl Into<Arc<str>>, service: Arc<T>) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
    {
        Self {
            interface: interface.into(),
            service: ServiceObject::new(service),
            properties: Properties::new(),
        }
    }

    #[must_use]
    pub fn with_property(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

/// A live registry entry.
#[derive(Clone, Debug)]
pub struct ServiceRecord {
    pub id: ServiceRegistrationId,
    pub interface: Arc<str>,
    pub service: ServiceObject,
    pub properties: Properties,
}

impl ServiceRecord {
    #[must_use]
    pub fn property(&self, key: &str) -> Option<&serde_json::Value> {
        self.properties.get(key)
    }

    #[must_use]
    pub fn downcast<T>(&self) -> Option<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.service.downcast::<T>()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("service not found: interface={interface}")]
    NotFound { interface: String },

    #[error("type mismatch in registry for interface={interface}")]
    TypeMismatch { interface: String },

    #[error("unknown service registration: {0}")]
    UnknownRegistration(ServiceRegistrationId),
}

/// Registry of published services in publication order.
#[derive(Default)]
pub struct ServiceRegistry {
    entries: RwLock<Vec<ServiceRecord>>,
}

impl ServiceRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a service and return the handle used to withdraw it.
    pub fn register(&self, registration: ServiceRegistration) -> ServiceRegistrationId {
        let id = ServiceRegistrationId::new();
        tracing::trace!(interface = %registration.interface, %id, "Registered service");
        self.entries.write().push(ServiceRecord {
            id,
            interface: registration.interface,
            service: registration.service,
            properties: registration.properties,
        });
        id
    }

    /// Withdraw a published service.
    ///
    /// # Errors
    /// Returns `RegistryError::UnknownRegistration` if the entry was never published or was
    /// already withdrawn.
    pub fn unregister(&self, id: ServiceRegistrationId) -> Result<ServiceRecord, RegistryError> {
        let mut w = self.entries.write();
        let pos = w
            .iter()
            .position(|r| r.id == id)
            .ok_or(RegistryError::UnknownRegistration(id))?;
        let record = w.remove(pos);
        tracing::trace!(interface = %record.interface, %id, "Unregistered service");
        Ok(record)
    }

    /// Earliest live entry published under `interface`.
    ///
    /// # Errors
    /// Returns `RegistryError::NotFound` if nothing is published under that name.
    pub fn get(&self, interface: &str) -> Result<ServiceRecord, RegistryError> {
        self.entries
            .read()
            .iter()
            .find(|r| &*r.interface == interface)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound {
                interface: interface.to_owned(),
            })
    }

    /// Fetch the earliest implementation of `interface` as `Arc<T>`.
    ///
    /// # Errors
    /// Returns `NotFound` if nothing is published, `TypeMismatch` if the entry holds another type.
    pub fn get_typed<T>(&self, interface: &str) -> Result<Arc<T>, RegistryError>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.get(interface)?
            .downcast::<T>()
            .ok_or_else(|| RegistryError::TypeMismatch {
                interface: interface.to_owned(),
            })
    }

    /// All live entries for `interface`, in publication order.
    #[must_use]
    pub fn find(&self, interface: &str) -> Vec<ServiceRecord> {
        self.entries
            .read()
            .iter()
            .filter(|r| &*r.interface == interface)
            .cloned()
            .collect()
    }

    /// All live entries whose property `key` equals `value`.
    #[must_use]
    pub fn find_by_property(&self, key: &str, value: &serde_json::Value) -> Vec<ServiceRecord> {
        self.entries
            .read()
            .iter()
            .filter(|r| r.properties.get(key) == Some(value))
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn contains(&self, id: ServiceRegistrationId) -> bool {
        self.entries.read().iter().any(|r| r.id == id)
    }

    /// Clear everything (useful in tests).
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
