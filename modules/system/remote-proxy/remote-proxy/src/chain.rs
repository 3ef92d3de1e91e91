//! Per-module type resolution chains.
//!
//! A chain answers "which interface type does this name denote for module M": M's own type
//! space first, then each configured parent module in order. The chain is passed explicitly to
//! every lookup and every forwarded call, so concurrent calls for different modules never see
//! each other's types.

use std::fmt;
use std::sync::Arc;

use modkit_host::{InterfaceType, ModuleHost, ModuleId, ModuleRef};

use crate::config::DuplicateParentPolicy;
use crate::error::{ParentModulesError, TypeNotFound};

#[derive(Clone)]
pub struct ResolutionChain {
    module: ModuleRef,
    parents: Arc<[ModuleRef]>,
}

impl ResolutionChain {
    /// Resolve an interface type by name.
    ///
    /// # Errors
    /// Returns `TypeNotFound` once the module and every parent have been searched.
    pub fn load(&self, name: &str) -> Result<Arc<InterfaceType>, TypeNotFound> {
        std::iter::once(&self.module)
            .chain(self.parents.iter())
            .find_map(|m| m.load_type(name))
            .ok_or_else(|| TypeNotFound {
                module: self.module.id(),
                name: name.to_owned(),
            })
    }

    #[must_use]
    pub fn module(&self) -> &ModuleRef {
        &self.module
    }

    #[must_use]
    pub fn module_id(&self) -> ModuleId {
        self.module.id()
    }

    #[must_use]
    pub fn module_name(&self) -> &str {
        self.module.symbolic_name()
    }

    #[must_use]
    pub fn parents(&self) -> &[ModuleRef] {
        &self.parents
    }
}

impl fmt::Debug for ResolutionChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolutionChain")
            .field("module", &self.module.symbolic_name())
            .field(
                "parents",
                &self
                    .parents
                    .iter()
                    .map(|p| p.symbolic_name())
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Builds resolution chains over a fixed list of parent modules.
#[derive(Clone)]
pub struct ResolutionChainBuilder {
    parents: Arc<[ModuleRef]>,
}

impl ResolutionChainBuilder {
    #[must_use]
    pub fn new(parents: Vec<ModuleRef>) -> Self {
        Self {
            parents: parents.into(),
        }
    }

    /// Match `required` symbolic names against the modules the host knows, keeping the order
    /// of `required`.
    ///
    /// When a name matches several modules the one with the lowest id is used, unless
    /// `policy` is [`DuplicateParentPolicy::Reject`].
    ///
    /// # Errors
    /// Returns `Missing` listing every unmatched name, or `Duplicate` under `Reject`.
    pub fn resolve_parents(
        host: &dyn ModuleHost,
        required: &[String],
        policy: DuplicateParentPolicy,
    ) -> Result<Self, ParentModulesError> {
        let modules = host.modules();
        let mut parents = Vec::with_capacity(required.len());
        let mut missing = Vec::new();

        for name in required {
            let mut matches = modules.iter().filter(|m| m.symbolic_name() == name);
            let Some(first) = matches.next() else {
                missing.push(name.clone());
                continue;
            };
            let extra = matches.count();
            if extra > 0 {
                if policy == DuplicateParentPolicy::Reject {
                    return Err(ParentModulesError::Duplicate { name: name.clone() });
                }
                tracing::warn!(
                    parent = %name,
                    chosen = %first.id(),
                    duplicates = extra,
                    "Parent module installed more than once, using the first"
                );
            }
            parents.push(Arc::clone(first));
        }

        if !missing.is_empty() {
            return Err(ParentModulesError::Missing { missing });
        }
        Ok(Self::new(parents))
    }

    #[must_use]
    pub fn build(&self, module: ModuleRef) -> ResolutionChain {
        ResolutionChain {
            module,
            parents: Arc::clone(&self.parents),
        }
    }

    #[must_use]
    pub fn parents(&self) -> &[ModuleRef] {
        &self.parents
    }
}
