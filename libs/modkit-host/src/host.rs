use std::sync::Arc;

use crate::module::{ListenerId, ModuleId, ModuleListener, ModuleRef};
use crate::registry::{RegistryError, ServiceRegistration, ServiceRegistrationId};

#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("module host is shutting down")]
    ShuttingDown,

    #[error("service publication rejected for interface={interface}: {reason}")]
    Rejected { interface: String, reason: String },

    #[error("unknown module {0}")]
    UnknownModule(ModuleId),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Host facilities used by lifecycle-aware components.
///
/// Implementations deliver events to a listener one at a time; a listener never observes two
/// events concurrently from the same host.
pub trait ModuleHost: Send + Sync {
    /// Every module currently known to the host, in ascending id order.
    fn modules(&self) -> Vec<ModuleRef>;

    /// Subscribe to lifecycle events. The host holds a strong reference to `listener` until
    /// [`ModuleHost::unsubscribe`] is called.
    fn subscribe(&self, listener: Arc<dyn ModuleListener>) -> ListenerId;

    /// Returns `false` if `id` was not subscribed.
    fn unsubscribe(&self, id: ListenerId) -> bool;

    /// Publish a service into the host registry.
    ///
    /// # Errors
    /// Returns an error if the host refuses the publication.
    fn register_service(
        &self,
        registration: ServiceRegistration,
    ) -> Result<ServiceRegistrationId, HostError>;

    /// Withdraw a previously published service.
    ///
    /// # Errors
    /// Returns an error if the registration is unknown.
    fn unregister_service(&self, id: ServiceRegistrationId) -> Result<(), HostError>;
}
