//! Named type registry
//!
//! Object files name the type to construct in their `type` attribute. The
//! registry maps those names to constructors; modules register their types
//! at startup and nothing else can be constructed.
//!
//! ```ignore
//! let mut types = TypeRegistry::new();
//! types.register::<Mesh>("Trinity.Mesh");
//! types.register_fn("Trinity.Scene", || {
//!     Arc::new(RwLock::new(Scene::new("root"))) as ObjectRef
//! });
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{ReaderError, Result};
use crate::object::{Dict, ReadObject};
use crate::value::ObjectRef;

/// Builds a fresh instance of a registered type
pub type Constructor = Box<dyn Fn() -> ObjectRef + Send + Sync>;

/// Closed table of constructible types
pub struct TypeRegistry {
    constructors: BTreeMap<String, Constructor>,
}

impl TypeRegistry {
    /// Registry that knows `dict`
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register::<Dict>(Dict::TYPE_NAME);
        registry
    }

    /// Registry that knows nothing
    pub fn empty() -> Self {
        Self {
            constructors: BTreeMap::new(),
        }
    }

    /// Register `T` under `name`, constructed with `Default`
    pub fn register<T: ReadObject + Default>(&mut self, name: &str) {
        self.register_fn(name, || Arc::new(RwLock::new(T::default())) as ObjectRef);
    }

    /// Register a constructor closure under `name`
    pub fn register_fn<F>(&mut self, name: &str, constructor: F)
    where
        F: Fn() -> ObjectRef + Send + Sync + 'static,
    {
        if self.constructors.insert(name.to_string(), Box::new(constructor)).is_some() {
            log::debug!("Type '{}' re-registered", name);
        }
    }

    /// Construct an instance of `name`
    pub fn create(&self, name: &str) -> Option<ObjectRef> {
        self.constructors.get(name).map(|construct| construct())
    }

    /// Construct an instance of `name` for the node `node`
    pub(crate) fn create_for(&self, name: &str, node: &str) -> Result<ObjectRef> {
        self.create(name).ok_or_else(|| ReaderError::UnknownType {
            type_name: name.to_string(),
            node: node.to_string(),
        })
    }

    /// Check if a type is registered
    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    /// Registered names in order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.constructors.keys().map(String::as_str)
    }

    /// Number of registered types
    pub fn len(&self) -> usize {
        self.constructors.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.constructors.is_empty()
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("types", &self.constructors.len())
            .finish()
    }
}
