//! Objects the reader can construct

use std::any::Any;
use std::collections::BTreeMap;

use trinity_resource::ResourceRegistry;

use crate::error::FieldError;
use crate::value::Value;

/// What deferred initialization gets to work with
#[derive(Clone, Copy, Default)]
pub struct InitContext<'a> {
    /// Registry for objects that request resources when initialized
    pub registry: Option<&'a ResourceRegistry>,
}

impl<'a> InitContext<'a> {
    /// Context without a registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Context handing out `registry`
    pub fn with_registry(registry: &'a ResourceRegistry) -> Self {
        Self {
            registry: Some(registry),
        }
    }
}

/// A type constructible from an object file
///
/// The reader creates the object through the type registry, then assigns
/// every child node with [`set_field`](ReadObject::set_field). Objects that
/// report [`needs_initialize`](ReadObject::needs_initialize) get one
/// [`initialize`](ReadObject::initialize) call after the whole graph is built.
pub trait ReadObject: Any + Send + Sync {
    /// Registered type name
    fn type_name(&self) -> &str;

    /// Assign a field
    ///
    /// Unknown names and mismatched values return a [`FieldError`], which the
    /// reader logs and skips.
    fn set_field(&mut self, name: &str, value: Value) -> Result<(), FieldError>;

    /// Current value of a field
    fn get_field(&self, name: &str) -> Option<Value>;

    /// Names of the fields [`get_field`](ReadObject::get_field) answers for
    fn field_names(&self) -> Vec<String>;

    /// Whether [`initialize`](ReadObject::initialize) must run
    fn needs_initialize(&self) -> bool {
        false
    }

    /// Finish construction once every field is assigned
    fn initialize(&mut self, _ctx: &InitContext<'_>) {}

    /// Downcast support
    fn as_any(&self) -> &dyn Any;

    /// Mutable downcast support
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Generic map, constructed for `type="dict"`
#[derive(Debug, Default)]
pub struct Dict {
    fields: BTreeMap<String, Value>,
}

impl Dict {
    /// Registered type name
    pub const TYPE_NAME: &'static str = "dict";

    /// Empty dict
    pub fn new() -> Self {
        Self::default()
    }

    /// Value stored under `key`
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Store a value
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.fields.insert(key.into(), value)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Entries in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl ReadObject for Dict {
    fn type_name(&self) -> &str {
        Self::TYPE_NAME
    }

    fn set_field(&mut self, name: &str, value: Value) -> Result<(), FieldError> {
        self.fields.insert(name.to_string(), value);
        Ok(())
    }

    fn get_field(&self, name: &str) -> Option<Value> {
        self.fields.get(name).cloned()
    }

    fn field_names(&self) -> Vec<String> {
        self.fields.keys().cloned().collect()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
