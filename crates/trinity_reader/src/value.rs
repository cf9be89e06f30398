//! Dynamic values produced by the reader
//!
//! Objects and lists are shared (`Arc`) so back-references in an object file
//! resolve to the very same instance.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::object::ReadObject;

/// Shared, mutable constructed object
pub type ObjectRef = Arc<RwLock<dyn ReadObject>>;

/// Shared, mutable list
pub type ListRef = Arc<RwLock<Vec<Value>>>;

/// A value assigned into an object field or list slot
#[derive(Clone, Default)]
pub enum Value {
    /// Nothing; fills list slots that were never assigned
    #[default]
    Null,
    /// Boolean keyword
    Bool(bool),
    /// Integer literal
    Int(i64),
    /// Decimal literal
    Float(f64),
    /// Anything else
    Str(String),
    /// JSON number array packed as floats
    Floats(Vec<f32>),
    /// Other JSON payloads
    Json(serde_json::Value),
    /// Constructed object
    Object(ObjectRef),
    /// Ordered sequence
    List(ListRef),
}

impl Value {
    /// Wrap a freshly constructed object
    pub fn object(object: impl ReadObject) -> Self {
        Value::Object(Arc::new(RwLock::new(object)))
    }

    /// Wrap a list
    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Arc::new(RwLock::new(items)))
    }

    /// Shape name used in diagnostics
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Floats(_) => "float array",
            Value::Json(_) => "json",
            Value::Object(_) => "object",
            Value::List(_) => "list",
        }
    }

    /// Check for [`Value::Null`]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Boolean value
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Integer value
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric value; integers widen
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Non-negative integer as an index
    pub fn as_usize(&self) -> Option<usize> {
        self.as_i64().and_then(|i| usize::try_from(i).ok())
    }

    /// String value
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Packed float array
    pub fn as_floats(&self) -> Option<&[f32]> {
        match self {
            Value::Floats(v) => Some(v),
            _ => None,
        }
    }

    /// JSON payload
    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Value::Json(v) => Some(v),
            _ => None,
        }
    }

    /// Shared object
    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Shared list
    pub fn as_list(&self) -> Option<&ListRef> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    /// Run `f` on the object if it is a `T`
    pub fn with_object<T: ReadObject, R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        let object = self.as_object()?;
        let guard = object.read();
        guard.as_any().downcast_ref::<T>().map(f)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Floats(a), Value::Floats(b)) => a == b,
            (Value::Json(a), Value::Json(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            (Value::List(a), Value::List(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Int(i) => write!(f, "Int({i})"),
            Value::Float(x) => write!(f, "Float({x})"),
            Value::Str(s) => write!(f, "Str({s:?})"),
            Value::Floats(v) => write!(f, "Floats({v:?})"),
            Value::Json(v) => write!(f, "Json({v})"),
            // Objects may be mid-write while a back-reference to them is printed
            Value::Object(o) => match o.try_read() {
                Some(guard) => write!(f, "Object({})", guard.type_name()),
                None => write!(f, "Object(<locked>)"),
            },
            Value::List(l) => match l.try_read() {
                Some(guard) => write!(f, "List(len={})", guard.len()),
                None => write!(f, "List(<locked>)"),
            },
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<Vec<f32>> for Value {
    fn from(v: Vec<f32>) -> Self {
        Value::Floats(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::Dict;

    #[test]
    fn test_accessors() {
        assert_eq!(Value::from(3i64).as_f64(), Some(3.0));
        assert_eq!(Value::from(-1i64).as_usize(), None);
        assert_eq!(Value::from("a").as_str(), Some("a"));
        assert_eq!(Value::Float(1.5).as_i64(), None);
        assert!(Value::default().is_null());
        assert_eq!(Value::from(vec![1.0f32]).kind_name(), "float array");
    }

    #[test]
    fn test_shared_values_compare_by_identity() {
        let a = Value::object(Dict::new());
        let b = Value::object(Dict::new());
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
        assert_eq!(format!("{a:?}"), "Object(dict)");
    }

    #[test]
    fn test_with_object_downcasts() {
        let value = Value::object(Dict::new());
        assert_eq!(value.with_object(|d: &Dict| d.len()), Some(0));
        assert_eq!(Value::Null.with_object(|d: &Dict| d.len()), None);
    }
}
