//! Interface types and per-module type spaces.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// A declared service interface: a name plus the methods callable through it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InterfaceType {
    name: Arc<str>,
    methods: BTreeSet<String>,
}

impl InterfaceType {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            methods: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.methods.insert(method.into());
        self
    }

    #[must_use]
    pub fn with_methods<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.methods.extend(methods.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn has_method(&self, method: &str) -> bool {
        self.methods.contains(method)
    }

    pub fn methods(&self) -> impl Iterator<Item = &str> {
        self.methods.iter().map(String::as_str)
    }
}

/// The interface types a single module carries, keyed by name.
#[derive(Clone, Debug, Default)]
pub struct TypeSpace {
    types: HashMap<Arc<str>, Arc<InterfaceType>>,
}

impl TypeSpace {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Define (or redefine) a type and return the shared handle to it.
    pub fn define(&mut self, ty: InterfaceType) -> Arc<InterfaceType> {
        let ty = Arc::new(ty);
        self.types.insert(Arc::clone(&ty.name), Arc::clone(&ty));
        ty
    }

    #[must_use]
    pub fn with_type(mut self, ty: InterfaceType) -> Self {
        self.define(ty);
        self
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<InterfaceType>> {
        self.types.get(name).cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
