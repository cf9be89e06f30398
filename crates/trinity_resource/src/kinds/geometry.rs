//! Geometry resources
//!
//! Geometry files are JSON documents holding one or more meshes. Each mesh
//! has an interleaved float vertex array, an optional index list and named
//! areas (index ranges drawn as a unit):
//!
//! ```json
//! { "meshes": [ {
//!     "name": "hull",
//!     "stride": 3,
//!     "vertices": [0, 0, 0,  1, 0, 0,  0, 1, 0],
//!     "indices": [0, 1, 2],
//!     "areas": [ { "name": "main", "start": 0, "count": 3 } ]
//! } ] }
//! ```
//!
//! Preparation uploads one mesh per prepare call, so large files spread over
//! several frames of the registry's prepare budget.

use serde::{Deserialize, Serialize};
use std::any::Any;

use trinity_core::{BufferHandle, BufferKind, Device, DrawCall, EffectId, Primitive};

use crate::error::{ResourceError, Result};
use crate::loader::{PrepareContext, PrepareStatus, ResourceKind};

/// Named index range of a mesh
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeometryArea {
    /// Area name
    #[serde(default)]
    pub name: String,
    /// First index (first vertex for non-indexed meshes)
    pub start: u32,
    /// Index (or vertex) count
    pub count: u32,
}

/// CPU-side mesh as stored in a geometry file
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GeometryMesh {
    /// Mesh name
    #[serde(default)]
    pub name: String,
    /// Floats per vertex
    pub stride: u32,
    /// Interleaved vertex data
    pub vertices: Vec<f32>,
    /// Triangle or line indices; empty for non-indexed meshes
    #[serde(default)]
    pub indices: Vec<u32>,
    /// Named areas
    #[serde(default)]
    pub areas: Vec<GeometryArea>,
}

impl GeometryMesh {
    /// Number of vertices
    pub fn vertex_count(&self) -> u32 {
        if self.stride == 0 {
            0
        } else {
            (self.vertices.len() / self.stride as usize) as u32
        }
    }

    /// Number of drawable elements: indices, or vertices when non-indexed
    pub fn element_count(&self) -> u32 {
        if self.indices.is_empty() {
            self.vertex_count()
        } else {
            self.indices.len() as u32
        }
    }

    fn validate(&self, path: &str, index: usize) -> Result<()> {
        if self.stride == 0 {
            return Err(ResourceError::parse(path, format!("mesh {} has zero stride", index)));
        }
        if self.vertices.len() % self.stride as usize != 0 {
            return Err(ResourceError::parse(
                path,
                format!(
                    "mesh {}: {} floats is not a multiple of stride {}",
                    index,
                    self.vertices.len(),
                    self.stride
                ),
            ));
        }
        let vertex_count = self.vertex_count();
        if let Some(bad) = self.indices.iter().find(|&&i| i >= vertex_count) {
            return Err(ResourceError::parse(
                path,
                format!("mesh {}: index {} out of range ({} vertices)", index, bad, vertex_count),
            ));
        }
        let elements = self.element_count();
        for area in &self.areas {
            if area.start as u64 + area.count as u64 > elements as u64 {
                return Err(ResourceError::parse(
                    path,
                    format!("mesh {}: area '{}' exceeds {} elements", index, area.name, elements),
                ));
            }
        }
        Ok(())
    }
}

/// Root of a geometry file
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GeometryData {
    /// Meshes in file order
    pub meshes: Vec<GeometryMesh>,
}

/// A mesh uploaded to the device
#[derive(Clone, Debug, PartialEq)]
pub struct GpuMesh {
    /// Mesh name
    pub name: String,
    /// Vertex buffer
    pub vertex_buffer: BufferHandle,
    /// Index buffer, absent for non-indexed meshes
    pub index_buffer: Option<BufferHandle>,
    /// Floats per vertex
    pub stride: u32,
    /// Vertex count
    pub vertex_count: u32,
    /// Index count
    pub index_count: u32,
    /// Named areas
    pub areas: Vec<GeometryArea>,
}

/// Instance stream for an instanced draw
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InstanceStream {
    /// Per-instance buffer
    pub buffer: BufferHandle,
    /// Instances to draw
    pub count: u32,
}

/// JSON geometry uploaded as vertex/index buffers
#[derive(Debug, Default)]
pub struct GeometryResource {
    staging: Option<GeometryData>,
    meshes: Vec<GpuMesh>,
    mirror: Option<GeometryData>,
    byte_size: usize,
}

impl GeometryResource {
    /// Number of uploaded meshes
    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }

    /// Uploaded mesh by index
    pub fn mesh(&self, index: usize) -> Option<&GpuMesh> {
        self.meshes.get(index)
    }

    /// Number of areas in a mesh
    pub fn area_count(&self, mesh_index: usize) -> usize {
        self.meshes.get(mesh_index).map_or(0, |m| m.areas.len())
    }

    /// Index of the area called `name`
    pub fn find_area(&self, mesh_index: usize, name: &str) -> Option<usize> {
        self.meshes
            .get(mesh_index)?
            .areas
            .iter()
            .position(|a| a.name == name)
    }

    /// CPU copy of the geometry, kept when the registry runs with `system_mirror`
    pub fn mirror(&self) -> Option<&GeometryData> {
        self.mirror.as_ref()
    }

    /// Draw `area_count` areas starting at `start_area` as triangles
    ///
    /// Areas that are contiguous in the index buffer are merged into one
    /// draw. Returns `false` when nothing could be drawn.
    pub fn render_areas(
        &self,
        device: &dyn Device,
        mesh_index: usize,
        start_area: usize,
        area_count: usize,
        effect: EffectId,
        technique: &str,
    ) -> bool {
        self.draw_areas(device, mesh_index, start_area, area_count, effect, technique, Primitive::Triangles, None)
    }

    /// Draw areas as line lists
    pub fn render_lines(
        &self,
        device: &dyn Device,
        mesh_index: usize,
        start_area: usize,
        area_count: usize,
        effect: EffectId,
        technique: &str,
    ) -> bool {
        self.draw_areas(device, mesh_index, start_area, area_count, effect, technique, Primitive::Lines, None)
    }

    /// Draw areas once per instance in `instances`
    #[allow(clippy::too_many_arguments)]
    pub fn render_instanced(
        &self,
        device: &dyn Device,
        mesh_index: usize,
        instances: InstanceStream,
        start_area: usize,
        area_count: usize,
        effect: EffectId,
        technique: &str,
    ) -> bool {
        if instances.count == 0 {
            return false;
        }
        self.draw_areas(
            device,
            mesh_index,
            start_area,
            area_count,
            effect,
            technique,
            Primitive::Triangles,
            Some(instances),
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn draw_areas(
        &self,
        device: &dyn Device,
        mesh_index: usize,
        start_area: usize,
        area_count: usize,
        effect: EffectId,
        technique: &str,
        primitive: Primitive,
        instances: Option<InstanceStream>,
    ) -> bool {
        let Some(mesh) = self.meshes.get(mesh_index) else {
            return false;
        };
        let end = start_area.saturating_add(area_count).min(mesh.areas.len());
        if start_area >= end {
            return false;
        }

        let draw = |first: u32, count: u32| {
            device.draw(&DrawCall {
                effect,
                technique,
                primitive,
                vertex_buffer: mesh.vertex_buffer,
                index_buffer: mesh.index_buffer,
                instance_buffer: instances.map(|i| i.buffer),
                first,
                count,
                instances: instances.map_or(1, |i| i.count),
            });
        };

        let mut range: Option<(u32, u32)> = None;
        for area in &mesh.areas[start_area..end] {
            if area.count == 0 {
                continue;
            }
            range = match range {
                Some((first, count)) if first + count == area.start => Some((first, count + area.count)),
                Some((first, count)) => {
                    draw(first, count);
                    Some((area.start, area.count))
                }
                None => Some((area.start, area.count)),
            };
        }
        match range {
            Some((first, count)) => {
                draw(first, count);
                true
            }
            None => false,
        }
    }

    fn upload(mesh: &GeometryMesh, device: &dyn Device) -> Result<(GpuMesh, usize)> {
        let vertex_bytes: &[u8] = bytemuck::cast_slice(&mesh.vertices);
        let vertex_buffer = device.create_buffer(BufferKind::Vertex, vertex_bytes)?;

        let index_buffer = if mesh.indices.is_empty() {
            None
        } else {
            let index_bytes: &[u8] = bytemuck::cast_slice(&mesh.indices);
            match device.create_buffer(BufferKind::Index, index_bytes) {
                Ok(buffer) => Some(buffer),
                Err(e) => {
                    device.destroy_buffer(vertex_buffer);
                    return Err(e.into());
                }
            }
        };

        let size = vertex_bytes.len() + mesh.indices.len() * 4;
        let gpu = GpuMesh {
            name: mesh.name.clone(),
            vertex_buffer,
            index_buffer,
            stride: mesh.stride,
            vertex_count: mesh.vertex_count(),
            index_count: mesh.indices.len() as u32,
            areas: mesh.areas.clone(),
        };
        Ok((gpu, size))
    }
}

impl ResourceKind for GeometryResource {
    fn kind_name(&self) -> &'static str {
        "geometry"
    }

    fn prepare(&mut self, data: &[u8], ctx: &PrepareContext<'_>) -> Result<PrepareStatus> {
        if self.staging.is_none() {
            let parsed: GeometryData =
                serde_json::from_slice(data).map_err(|e| ResourceError::parse(ctx.path, e))?;
            for (index, mesh) in parsed.meshes.iter().enumerate() {
                mesh.validate(ctx.path, index)?;
            }
            self.unload(ctx.device);
            self.staging = Some(parsed);
        }

        let Some(staging) = self.staging.as_ref() else {
            return Ok(PrepareStatus::Ready);
        };
        if let Some(mesh) = staging.meshes.get(self.meshes.len()) {
            let (gpu, size) = Self::upload(mesh, ctx.device)?;
            self.meshes.push(gpu);
            self.byte_size += size;
        }

        if self.meshes.len() < staging.meshes.len() {
            return Ok(PrepareStatus::Pending);
        }

        let finished = self.staging.take();
        if ctx.config.system_mirror {
            self.mirror = finished;
        }
        log::debug!("Prepared geometry '{}' ({} meshes)", ctx.path, self.meshes.len());
        Ok(PrepareStatus::Ready)
    }

    fn unload(&mut self, device: &dyn Device) {
        for mesh in self.meshes.drain(..) {
            device.destroy_buffer(mesh.vertex_buffer);
            if let Some(index_buffer) = mesh.index_buffer {
                device.destroy_buffer(index_buffer);
            }
        }
        self.staging = None;
        self.mirror = None;
        self.byte_size = 0;
    }

    fn memory_usage(&self) -> usize {
        self.byte_size
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RegistryConfig;
    use trinity_core::{DeviceCommand, HeadlessDevice};

    const TWO_MESHES: &str = r#"{ "meshes": [
        { "name": "hull", "stride": 3,
          "vertices": [0,0,0, 1,0,0, 0,1,0, 1,1,0],
          "indices": [0,1,2, 1,3,2],
          "areas": [ { "name": "a", "start": 0, "count": 3 },
                     { "name": "b", "start": 3, "count": 3 } ] },
        { "name": "lines", "stride": 2,
          "vertices": [0,0, 1,1],
          "areas": [ { "name": "l", "start": 0, "count": 2 } ] }
    ] }"#;

    fn prepare_all(geometry: &mut GeometryResource, device: &HeadlessDevice, config: &RegistryConfig) -> usize {
        let ctx = PrepareContext {
            path: "ship.geo",
            device,
            config,
        };
        let mut calls = 1;
        while geometry.prepare(TWO_MESHES.as_bytes(), &ctx).unwrap() == PrepareStatus::Pending {
            calls += 1;
        }
        calls
    }

    #[test]
    fn test_prepare_one_mesh_per_call() {
        let device = HeadlessDevice::new();
        let config = RegistryConfig::default();
        let mut geometry = GeometryResource::default();

        assert_eq!(prepare_all(&mut geometry, &device, &config), 2);
        assert_eq!(geometry.mesh_count(), 2);
        assert_eq!(geometry.mesh(0).unwrap().vertex_count, 4);
        assert!(geometry.mesh(1).unwrap().index_buffer.is_none());
        assert_eq!(geometry.find_area(0, "b"), Some(1));
        assert!(geometry.mirror().is_none());
        assert_eq!(device.live_buffer_count(), 3);

        geometry.unload(&device);
        assert_eq!(device.live_buffer_count(), 0);
        assert_eq!(geometry.memory_usage(), 0);
    }

    #[test]
    fn test_contiguous_areas_merge() {
        let device = HeadlessDevice::new();
        let config = RegistryConfig::default();
        let mut geometry = GeometryResource::default();
        prepare_all(&mut geometry, &device, &config);
        device.take_commands();

        assert!(geometry.render_areas(&device, 0, 0, 2, EffectId::new(1), "Main"));
        let draws = device.draws();
        assert_eq!(draws.len(), 1);
        assert!(matches!(&draws[0], DeviceCommand::Draw { first: 0, count: 6, .. }));

        assert!(!geometry.render_areas(&device, 0, 5, 1, EffectId::new(1), "Main"));
        assert!(!geometry.render_areas(&device, 7, 0, 1, EffectId::new(1), "Main"));
    }

    #[test]
    fn test_lines_and_instances() {
        let device = HeadlessDevice::new();
        let config = RegistryConfig::default();
        let mut geometry = GeometryResource::default();
        prepare_all(&mut geometry, &device, &config);
        device.take_commands();

        assert!(geometry.render_lines(&device, 1, 0, 1, EffectId::new(2), "Lines"));
        let stream = InstanceStream {
            buffer: BufferHandle(99),
            count: 8,
        };
        assert!(geometry.render_instanced(&device, 0, stream, 1, 1, EffectId::new(3), "Main"));

        let draws = device.draws();
        assert!(matches!(&draws[0], DeviceCommand::Draw { primitive: Primitive::Lines, count: 2, .. }));
        assert!(matches!(&draws[1], DeviceCommand::Draw { first: 3, count: 3, instances: 8, .. }));
    }

    #[test]
    fn test_system_mirror() {
        let device = HeadlessDevice::new();
        let config = RegistryConfig::tools();
        let mut geometry = GeometryResource::default();
        prepare_all(&mut geometry, &device, &config);

        let mirror = geometry.mirror().unwrap();
        assert_eq!(mirror.meshes[0].indices, vec![0, 1, 2, 1, 3, 2]);
    }

    #[test]
    fn test_invalid_geometry() {
        let device = HeadlessDevice::new();
        let config = RegistryConfig::default();
        let ctx = PrepareContext {
            path: "bad.geo",
            device: &device,
            config: &config,
        };

        let bad_index = br#"{ "meshes": [ { "stride": 1, "vertices": [0], "indices": [4] } ] }"#;
        assert!(matches!(
            GeometryResource::default().prepare(bad_index, &ctx),
            Err(ResourceError::Parse { .. })
        ));
        assert!(GeometryResource::default().prepare(b"not json", &ctx).is_err());
        assert_eq!(device.live_buffer_count(), 0);
    }
}
