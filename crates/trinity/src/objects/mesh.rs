//! Geometry meshes
//!
//! A [`Mesh`] draws areas of one mesh of a geometry resource, with separate
//! area lists per render mode. It watches its geometry through a
//! [`GeometryBinding`], which caches the mesh's area names while the
//! geometry is good and drops them when it is purged or reloaded.

use std::any::Any;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use trinity_core::RenderMode;
use trinity_reader::{FieldError, InitContext, ListRef, ReadObject, Value};
use trinity_render::{BatchAccumulator, GeometryBatch, PerObjectData, Renderable};
use trinity_resource::{GeometryResource, Resource, ResourceObserver, ResourceRegistry};

use super::mesh_area::MeshArea;

/// Area list field names and the pass each one feeds
const AREA_LISTS: [(&str, RenderMode); 7] = [
    ("opaque_areas", RenderMode::Opaque),
    ("decal_areas", RenderMode::Decal),
    ("transparent_areas", RenderMode::Transparent),
    ("additive_areas", RenderMode::Additive),
    ("depth_areas", RenderMode::Depth),
    ("pickable_areas", RenderMode::Pickable),
    ("distortion_areas", RenderMode::Distortion),
];

fn area_slot(mode: RenderMode) -> Option<usize> {
    AREA_LISTS.iter().position(|(_, m)| *m == mode)
}

/// Cached view of a mesh's geometry, maintained by notifications
#[derive(Debug)]
pub struct GeometryBinding {
    mesh_index: usize,
    area_names: RwLock<Option<Vec<String>>>,
    rebuilds: AtomicU32,
    releases: AtomicU32,
}

impl GeometryBinding {
    /// Binding for mesh `mesh_index` of a geometry
    pub fn new(mesh_index: usize) -> Self {
        Self {
            mesh_index,
            area_names: RwLock::new(None),
            rebuilds: AtomicU32::new(0),
            releases: AtomicU32::new(0),
        }
    }

    /// Whether the cache currently reflects good geometry
    pub fn is_valid(&self) -> bool {
        self.area_names.read().is_some()
    }

    /// Index of the area called `name`, if cached
    pub fn resolve(&self, name: &str) -> Option<usize> {
        self.area_names.read().as_ref()?.iter().position(|n| n == name)
    }

    /// Times the cache was rebuilt
    pub fn rebuild_count(&self) -> u32 {
        self.rebuilds.load(Ordering::SeqCst)
    }

    /// Times the cache was released
    pub fn release_count(&self) -> u32 {
        self.releases.load(Ordering::SeqCst)
    }
}

impl ResourceObserver for GeometryBinding {
    fn release_cached_data(&self, _resource: &Resource) {
        *self.area_names.write() = None;
        self.releases.fetch_add(1, Ordering::SeqCst);
    }

    fn rebuild_cached_data(&self, resource: &Resource) {
        let names = resource
            .with_kind(|g: &GeometryResource| {
                g.mesh(self.mesh_index)
                    .map(|mesh| mesh.areas.iter().map(|a| a.name.clone()).collect::<Vec<_>>())
            })
            .flatten();
        if names.is_none() {
            log::warn!("'{}' has no mesh {}", resource.path(), self.mesh_index);
        }
        *self.area_names.write() = Some(names.unwrap_or_default());
        self.rebuilds.fetch_add(1, Ordering::SeqCst);
    }
}

/// Areas of a geometry mesh, drawn per render mode
pub struct Mesh {
    /// Object name
    pub name: String,
    /// Geometry resource path
    pub geometry_path: String,
    /// Mesh inside the geometry
    pub mesh_index: usize,
    /// Whether anything is drawn
    pub display: bool,
    areas: [ListRef; 7],
    geometry: Option<Arc<Resource>>,
    binding: Option<Arc<GeometryBinding>>,
}

impl Default for Mesh {
    fn default() -> Self {
        Self {
            name: String::new(),
            geometry_path: String::new(),
            mesh_index: 0,
            display: true,
            areas: Default::default(),
            geometry: None,
            binding: None,
        }
    }
}

impl Mesh {
    /// Registered type name
    pub const TYPE_NAME: &'static str = "Mesh";

    /// Mesh of `geometry_path`, displayed, without areas
    pub fn new(geometry_path: impl Into<String>, mesh_index: usize) -> Self {
        let mut mesh = Self::default();
        mesh.geometry_path = geometry_path.into();
        mesh.mesh_index = mesh_index;
        mesh
    }

    /// Add an area to the list for `mode`
    pub fn add_area(&mut self, mode: RenderMode, area: MeshArea) {
        match area_slot(mode) {
            Some(slot) => self.areas[slot].write().push(Value::object(area)),
            None => log::warn!("Meshes have no areas for {:?}", mode),
        }
    }

    /// Number of areas listed for `mode`
    pub fn area_count(&self, mode: RenderMode) -> usize {
        area_slot(mode).map_or(0, |slot| self.areas[slot].read().len())
    }

    /// Geometry resource, once bound
    pub fn geometry(&self) -> Option<&Arc<Resource>> {
        self.geometry.as_ref()
    }

    /// Notification binding, once bound
    pub fn binding(&self) -> Option<&Arc<GeometryBinding>> {
        self.binding.as_ref()
    }

    /// Request the geometry and start watching it
    pub fn bind(&mut self, registry: &ResourceRegistry) {
        if let (Some(geometry), Some(binding)) = (&self.geometry, &self.binding) {
            geometry.unregister_notification(binding);
        }
        if self.geometry_path.is_empty() {
            self.geometry = None;
            self.binding = None;
            return;
        }
        let geometry = registry.get_resource(&self.geometry_path);
        let binding = Arc::new(GeometryBinding::new(self.mesh_index));
        geometry.register_notification(&binding);
        self.geometry = Some(geometry);
        self.binding = Some(binding);
    }

    /// Lists are kept shared; the reader fills them after assignment
    fn area_list(value: Value) -> Option<ListRef> {
        match value {
            Value::List(list) => Some(list),
            Value::Null => Some(ListRef::default()),
            _ => None,
        }
    }
}

impl ReadObject for Mesh {
    fn type_name(&self) -> &str {
        Self::TYPE_NAME
    }

    fn set_field(&mut self, name: &str, value: Value) -> Result<(), FieldError> {
        let found = value.kind_name();
        let mismatch = |expected| FieldError::mismatch(Self::TYPE_NAME, name, expected, found);
        match name {
            "name" => self.name = value.as_str().ok_or_else(|| mismatch("string"))?.to_string(),
            "geometry" => self.geometry_path = value.as_str().ok_or_else(|| mismatch("path"))?.to_string(),
            "mesh_index" => self.mesh_index = value.as_usize().ok_or_else(|| mismatch("index"))?,
            "display" => self.display = value.as_bool().ok_or_else(|| mismatch("bool"))?,
            _ => {
                let slot = AREA_LISTS
                    .iter()
                    .position(|(field, _)| *field == name)
                    .ok_or_else(|| FieldError::unknown(Self::TYPE_NAME, name))?;
                self.areas[slot] = Self::area_list(value).ok_or_else(|| mismatch("list"))?;
            }
        }
        Ok(())
    }

    fn get_field(&self, name: &str) -> Option<Value> {
        match name {
            "name" => Some(Value::from(self.name.as_str())),
            "geometry" => Some(Value::from(self.geometry_path.as_str())),
            "mesh_index" => Some(Value::Int(self.mesh_index as i64)),
            "display" => Some(Value::Bool(self.display)),
            _ => {
                let slot = AREA_LISTS.iter().position(|(field, _)| *field == name)?;
                Some(Value::List(Arc::clone(&self.areas[slot])))
            }
        }
    }

    fn field_names(&self) -> Vec<String> {
        let mut names: Vec<String> = ["name", "geometry", "mesh_index", "display"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        names.extend(AREA_LISTS.iter().map(|(field, _)| field.to_string()));
        names
    }

    fn needs_initialize(&self) -> bool {
        true
    }

    fn initialize(&mut self, ctx: &InitContext<'_>) {
        match ctx.registry {
            Some(registry) => self.bind(registry),
            None => log::debug!("Mesh '{}' initialized without a registry; geometry not bound", self.name),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl Renderable for Mesh {
    fn get_batches<'f>(
        &self,
        mode: RenderMode,
        accumulator: &mut BatchAccumulator<'f>,
        per_object_data: Option<&'f PerObjectData>,
    ) {
        if !self.display {
            return;
        }
        let Some(slot) = area_slot(mode) else {
            return;
        };
        let (Some(geometry), Some(binding)) = (&self.geometry, &self.binding) else {
            return;
        };
        let areas = self.areas[slot].read();
        if areas.is_empty() || !geometry.is_good() {
            return;
        }

        for value in areas.iter() {
            let Some(area) = value.with_object(|a: &MeshArea| a.clone()) else {
                continue;
            };
            let Some(effect) = area.effect_id() else {
                continue;
            };
            if !area.display || area.count == 0 {
                continue;
            }
            let start = if area.name.is_empty() {
                area.index
            } else {
                binding.resolve(&area.name).unwrap_or(area.index)
            };

            let batch =
                GeometryBatch::new(mode, Arc::clone(geometry), self.mesh_index, effect).with_areas(start, area.count);
            match per_object_data {
                Some(data) => accumulator.commit(batch.with_per_object_data(data)),
                None => accumulator.commit(batch),
            }
        }
    }
}

impl Drop for Mesh {
    fn drop(&mut self) {
        if let (Some(geometry), Some(binding)) = (&self.geometry, &self.binding) {
            geometry.unregister_notification(binding);
        }
    }
}
