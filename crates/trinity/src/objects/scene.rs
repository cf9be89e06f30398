//! Scene containers

use std::any::Any;

use trinity_core::RenderMode;
use trinity_reader::{FieldError, ListRef, ReadObject, Value};
use trinity_render::{BatchAccumulator, PerObjectData, Renderable};

use super::mesh::Mesh;

/// Recovers a [`Renderable`] view of a type-erased scene object
#[derive(Clone, Copy)]
pub struct RenderableCast {
    get: fn(&dyn Any) -> Option<&dyn Renderable>,
    get_mut: fn(&mut dyn Any) -> Option<&mut dyn Renderable>,
}

impl RenderableCast {
    /// Cast for objects of type `T`
    pub fn of<T: Renderable + 'static>() -> Self {
        Self {
            get: |any| any.downcast_ref::<T>().map(|t| t as &dyn Renderable),
            get_mut: |any| any.downcast_mut::<T>().map(|t| t as &mut dyn Renderable),
        }
    }
}

impl std::fmt::Debug for RenderableCast {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("RenderableCast")
    }
}

/// Named list of renderable objects
#[derive(Debug)]
pub struct Scene {
    /// Scene name
    pub name: String,
    /// Whether anything is drawn
    pub display: bool,
    objects: ListRef,
    casts: Vec<RenderableCast>,
}

impl Default for Scene {
    fn default() -> Self {
        Self {
            name: String::new(),
            display: true,
            objects: ListRef::default(),
            casts: vec![RenderableCast::of::<Mesh>(), RenderableCast::of::<Scene>()],
        }
    }
}

impl Scene {
    /// Registered type name
    pub const TYPE_NAME: &'static str = "Scene";

    /// Empty scene
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Also draw objects of type `T`
    pub fn with_cast<T: Renderable + 'static>(mut self) -> Self {
        self.casts.push(RenderableCast::of::<T>());
        self
    }

    /// Append an object
    pub fn add(&mut self, object: impl ReadObject) {
        self.objects.write().push(Value::object(object));
    }

    /// Objects in draw order
    pub fn objects(&self) -> Vec<Value> {
        self.objects.read().clone()
    }

    /// Number of objects
    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    /// Check if the scene has no objects
    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }

    fn as_renderable<'a>(&self, any: &'a dyn Any) -> Option<&'a dyn Renderable> {
        self.casts.iter().find_map(|cast| (cast.get)(any))
    }
}

impl ReadObject for Scene {
    fn type_name(&self) -> &str {
        Self::TYPE_NAME
    }

    fn set_field(&mut self, name: &str, value: Value) -> Result<(), FieldError> {
        let found = value.kind_name();
        match name {
            "name" => {
                self.name = value
                    .as_str()
                    .ok_or_else(|| FieldError::mismatch(Self::TYPE_NAME, name, "string", found))?
                    .to_string()
            }
            "display" => {
                self.display = value
                    .as_bool()
                    .ok_or_else(|| FieldError::mismatch(Self::TYPE_NAME, name, "bool", found))?
            }
            "objects" => {
                self.objects = match value {
                    Value::List(list) => list,
                    Value::Null => ListRef::default(),
                    _ => return Err(FieldError::mismatch(Self::TYPE_NAME, name, "list", found)),
                }
            }
            _ => return Err(FieldError::unknown(Self::TYPE_NAME, name)),
        }
        Ok(())
    }

    fn get_field(&self, name: &str) -> Option<Value> {
        match name {
            "name" => Some(Value::from(self.name.as_str())),
            "display" => Some(Value::Bool(self.display)),
            "objects" => Some(Value::List(self.objects.clone())),
            _ => None,
        }
    }

    fn field_names(&self) -> Vec<String> {
        vec!["name".into(), "display".into(), "objects".into()]
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl Scene {
    /// Collect batches, skipping scenes already on `path`
    fn collect_batches<'f>(
        &self,
        mode: RenderMode,
        accumulator: &mut BatchAccumulator<'f>,
        per_object_data: Option<&'f PerObjectData>,
        path: &mut Vec<*const Scene>,
    ) {
        if !self.display {
            return;
        }
        path.push(self as *const Scene);
        let objects = self.objects.read();
        for object in objects.iter().filter_map(Value::as_object) {
            // The caller may already hold this lock when a scene lists itself
            let guard = object.read_recursive();
            let any = guard.as_any();
            if let Some(nested) = any.downcast_ref::<Scene>() {
                if path.contains(&(nested as *const Scene)) {
                    log::warn!("Scene '{}' is nested inside itself; skipped", nested.name);
                } else {
                    nested.collect_batches(mode, accumulator, per_object_data, path);
                }
                continue;
            }
            match self.as_renderable(any) {
                Some(renderable) => renderable.get_batches(mode, accumulator, per_object_data),
                None => log::trace!("Scene '{}' skips {}", self.name, guard.type_name()),
            }
        }
        path.pop();
    }
}

impl Renderable for Scene {
    fn get_batches<'f>(
        &self,
        mode: RenderMode,
        accumulator: &mut BatchAccumulator<'f>,
        per_object_data: Option<&'f PerObjectData>,
    ) {
        self.collect_batches(mode, accumulator, per_object_data, &mut Vec::new());
    }

    fn update(&mut self, dt: f32) {
        let objects = self.objects.read();
        for object in objects.iter().filter_map(Value::as_object) {
            // Held by an enclosing update when the scene graph loops back
            let Some(mut guard) = object.try_write() else {
                log::debug!("Scene '{}' skips an object that is already being updated", self.name);
                continue;
            };
            if let Some(cast) = self.casts.iter().find(|cast| (cast.get)(guard.as_any()).is_some()) {
                if let Some(renderable) = (cast.get_mut)(guard.as_any_mut()) {
                    renderable.update(dt);
                }
            }
        }
    }
}
