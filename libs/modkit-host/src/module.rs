//! Modules as seen from outside the host.

use std::fmt;
use std::sync::Arc;

use crate::types::InterfaceType;

/// Host-assigned module identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(pub u64);

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle state of a module.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ModuleState {
    Installed,
    Starting,
    Active,
    Stopping,
    Uninstalled,
}

/// A resource packaged inside a module.
#[derive(Clone)]
pub struct ResourceHandle {
    pub module: ModuleId,
    pub path: String,
    pub contents: Arc<[u8]>,
}

impl ResourceHandle {
    pub fn new(module: ModuleId, path: impl Into<String>, contents: impl Into<Arc<[u8]>>) -> Self {
        Self {
            module,
            path: path.into(),
            contents: contents.into(),
        }
    }

    /// Last path segment.
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    /// Directory part of the path, without a trailing slash.
    #[must_use]
    pub fn location(&self) -> &str {
        self.path.rsplit_once('/').map_or("", |(dir, _)| dir)
    }
}

impl fmt::Debug for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceHandle")
            .field("module", &self.module)
            .field("path", &self.path)
            .field("len", &self.contents.len())
            .finish()
    }
}

/// Read-only view of a module owned by the host.
pub trait Module: Send + Sync {
    fn id(&self) -> ModuleId;

    fn symbolic_name(&self) -> &str;

    fn state(&self) -> ModuleState;

    /// Value of a manifest header, if declared.
    fn header(&self, name: &str) -> Option<String>;

    /// Resources directly under `path` (not recursive) whose name ends with `suffix`.
    fn find_resources(&self, path: &str, suffix: &str) -> Vec<ResourceHandle>;

    /// Load an interface type from the module's own type space.
    fn load_type(&self, name: &str) -> Option<Arc<InterfaceType>>;
}

pub type ModuleRef = Arc<dyn Module>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModuleEventKind {
    Installed,
    Started,
    Stopped,
    Uninstalled,
}

/// A discrete lifecycle notification.
#[derive(Clone)]
pub struct ModuleEvent {
    pub kind: ModuleEventKind,
    pub module: ModuleRef,
}

impl fmt::Debug for ModuleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleEvent")
            .field("kind", &self.kind)
            .field("module", &self.module.id())
            .field("symbolic_name", &self.module.symbolic_name())
            .finish()
    }
}

/// Receives lifecycle events. Hosts deliver events serially.
///
/// A listener may drive the lifecycle of the host delivering to it; the events this raises
/// are delivered once the current `module_changed` call returns.
pub trait ModuleListener: Send + Sync {
    fn module_changed(&self, event: &ModuleEvent);
}

/// Subscription handle returned by [`crate::ModuleHost::subscribe`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }
}
