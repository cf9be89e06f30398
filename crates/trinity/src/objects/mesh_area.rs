//! Mesh areas

use std::any::Any;

use trinity_core::EffectId;
use trinity_reader::{FieldError, ReadObject, Value};

/// A run of geometry areas drawn with one effect
///
/// `name`, when set and known to the geometry, takes precedence over
/// `index`, so object files survive geometry re-exports that reorder areas.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshArea {
    /// Area name in the geometry
    pub name: String,
    /// First area
    pub index: usize,
    /// Number of areas
    pub count: usize,
    /// Effect path
    pub effect: String,
    /// Whether the area is drawn
    pub display: bool,
    effect_id: Option<EffectId>,
}

impl Default for MeshArea {
    fn default() -> Self {
        Self {
            name: String::new(),
            index: 0,
            count: 1,
            effect: String::new(),
            display: true,
            effect_id: None,
        }
    }
}

impl MeshArea {
    /// Registered type name
    pub const TYPE_NAME: &'static str = "MeshArea";

    /// Area `index` drawn with the effect at `effect`
    pub fn new(index: usize, effect: impl Into<String>) -> Self {
        let mut area = Self {
            index,
            effect: effect.into(),
            ..Default::default()
        };
        area.resolve_effect();
        area
    }

    /// Set the area name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the number of areas
    pub fn with_count(mut self, count: usize) -> Self {
        self.count = count;
        self
    }

    /// Effect to draw with; `None` until an effect path is set
    pub fn effect_id(&self) -> Option<EffectId> {
        self.effect_id
    }

    fn resolve_effect(&mut self) {
        self.effect_id = (!self.effect.is_empty()).then(|| EffectId::from_path(&self.effect));
    }
}

impl ReadObject for MeshArea {
    fn type_name(&self) -> &str {
        Self::TYPE_NAME
    }

    fn set_field(&mut self, name: &str, value: Value) -> Result<(), FieldError> {
        let mismatch = |expected| FieldError::mismatch(Self::TYPE_NAME, name, expected, value.kind_name());
        match name {
            "name" => self.name = value.as_str().ok_or_else(|| mismatch("string"))?.to_string(),
            "index" => self.index = value.as_usize().ok_or_else(|| mismatch("index"))?,
            "count" => self.count = value.as_usize().ok_or_else(|| mismatch("count"))?,
            "display" => self.display = value.as_bool().ok_or_else(|| mismatch("bool"))?,
            "effect" => {
                self.effect = value.as_str().ok_or_else(|| mismatch("effect path"))?.to_string();
                self.resolve_effect();
            }
            _ => return Err(FieldError::unknown(Self::TYPE_NAME, name)),
        }
        Ok(())
    }

    fn get_field(&self, name: &str) -> Option<Value> {
        match name {
            "name" => Some(Value::from(self.name.as_str())),
            "index" => Some(Value::Int(self.index as i64)),
            "count" => Some(Value::Int(self.count as i64)),
            "display" => Some(Value::Bool(self.display)),
            "effect" => Some(Value::from(self.effect.as_str())),
            _ => None,
        }
    }

    fn field_names(&self) -> Vec<String> {
        ["name", "index", "count", "display", "effect"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
