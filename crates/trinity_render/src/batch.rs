//! Render Batches
//!
//! A batch describes one draw operation without performing it. Scene objects
//! create batches every frame in `get_batches`; the accumulator commits them
//! later, possibly sorted and possibly with an overridden effect.
//!
//! # Batch Types
//!
//! - [`GeometryBatch`]: a range of areas of a geometry mesh, as triangles
//! - [`GeometryLineBatch`]: the same as line lists
//! - [`InstancedBatch`]: a range of areas drawn once per instance
//! - [`ForwardingBatch`]: hands the draw to a [`GeometryProvider`]
//!
//! Batches borrow their per-object data for the frame (`'f`), so they cannot
//! outlive the frame they were created in.

use std::sync::Arc;

use trinity_core::{Device, EffectId, RenderMode};
use trinity_resource::kinds::InstanceStream;
use trinity_resource::{GeometryResource, Resource};

use crate::per_object_data::PerObjectData;

/// Everything a batch needs to issue its draw
pub struct CommitContext<'a> {
    /// Device to draw on
    pub device: &'a dyn Device,
    /// Technique name inside the effect
    pub technique: &'a str,
    /// Effect replacing each batch's own effect (depth prepass, picking)
    pub effect_override: Option<EffectId>,
}

impl<'a> CommitContext<'a> {
    /// Context drawing with each batch's own effect
    pub fn new(device: &'a dyn Device, technique: &'a str) -> Self {
        Self {
            device,
            technique,
            effect_override: None,
        }
    }

    /// Replace every batch's effect
    pub fn with_effect_override(mut self, effect: EffectId) -> Self {
        self.effect_override = Some(effect);
        self
    }

    /// Effect to draw a batch with
    pub fn effect_for(&self, own: EffectId) -> EffectId {
        self.effect_override.unwrap_or(own)
    }
}

/// A deferred draw operation
pub trait RenderBatch {
    /// Render state family; `Any` leaves the current state alone
    fn render_mode(&self) -> RenderMode;

    /// Constants uploaded before the commit
    fn per_object_data(&self) -> Option<&PerObjectData> {
        None
    }

    /// Sort key for depth comparators
    fn depth(&self) -> f32 {
        0.0
    }

    /// Issue the draw; the only place a batch touches the device
    fn commit(&self, ctx: &CommitContext<'_>);
}

/// State shared by the built-in batch types
#[derive(Clone, Copy, Debug)]
pub struct BatchBase<'f> {
    /// Render mode
    pub mode: RenderMode,
    /// Effect drawn with unless overridden
    pub effect: EffectId,
    /// Borrowed per-object constants
    pub per_object_data: Option<&'f PerObjectData>,
    /// Depth sort key
    pub depth: f32,
}

impl<'f> BatchBase<'f> {
    /// Base with no constants at depth zero
    pub fn new(mode: RenderMode, effect: EffectId) -> Self {
        Self {
            mode,
            effect,
            per_object_data: None,
            depth: 0.0,
        }
    }
}

/// Builder methods shared by the built-in batch types
macro_rules! impl_batch_builders {
    ($ty:ident) => {
        impl<'f> $ty<'f> {
            /// Attach per-object constants for this frame
            pub fn with_per_object_data(mut self, data: &'f PerObjectData) -> Self {
                self.base.per_object_data = Some(data);
                self
            }

            /// Set the depth sort key
            pub fn with_depth(mut self, depth: f32) -> Self {
                self.base.depth = depth;
                self
            }

            /// Draw `count` areas starting at `start`
            pub fn with_areas(mut self, start: usize, count: usize) -> Self {
                self.start_area = start;
                self.area_count = count;
                self
            }
        }
    };
}

/// Triangles from a range of geometry areas
pub struct GeometryBatch<'f> {
    base: BatchBase<'f>,
    geometry: Arc<Resource>,
    mesh_index: usize,
    start_area: usize,
    area_count: usize,
}

impl<'f> GeometryBatch<'f> {
    /// Draw the first area of `mesh_index`
    pub fn new(mode: RenderMode, geometry: Arc<Resource>, mesh_index: usize, effect: EffectId) -> Self {
        Self {
            base: BatchBase::new(mode, effect),
            geometry,
            mesh_index,
            start_area: 0,
            area_count: 1,
        }
    }
}

impl_batch_builders!(GeometryBatch);

impl RenderBatch for GeometryBatch<'_> {
    fn render_mode(&self) -> RenderMode {
        self.base.mode
    }

    fn per_object_data(&self) -> Option<&PerObjectData> {
        self.base.per_object_data
    }

    fn depth(&self) -> f32 {
        self.base.depth
    }

    fn commit(&self, ctx: &CommitContext<'_>) {
        let effect = ctx.effect_for(self.base.effect);
        self.geometry.with_kind(|g: &GeometryResource| {
            g.render_areas(ctx.device, self.mesh_index, self.start_area, self.area_count, effect, ctx.technique)
        });
    }
}

/// Line lists from a range of geometry areas
pub struct GeometryLineBatch<'f> {
    base: BatchBase<'f>,
    geometry: Arc<Resource>,
    mesh_index: usize,
    start_area: usize,
    area_count: usize,
}

impl<'f> GeometryLineBatch<'f> {
    /// Draw the first area of `mesh_index` as lines
    pub fn new(mode: RenderMode, geometry: Arc<Resource>, mesh_index: usize, effect: EffectId) -> Self {
        Self {
            base: BatchBase::new(mode, effect),
            geometry,
            mesh_index,
            start_area: 0,
            area_count: 1,
        }
    }
}

impl_batch_builders!(GeometryLineBatch);

impl RenderBatch for GeometryLineBatch<'_> {
    fn render_mode(&self) -> RenderMode {
        self.base.mode
    }

    fn per_object_data(&self) -> Option<&PerObjectData> {
        self.base.per_object_data
    }

    fn depth(&self) -> f32 {
        self.base.depth
    }

    fn commit(&self, ctx: &CommitContext<'_>) {
        let effect = ctx.effect_for(self.base.effect);
        self.geometry.with_kind(|g: &GeometryResource| {
            g.render_lines(ctx.device, self.mesh_index, self.start_area, self.area_count, effect, ctx.technique)
        });
    }
}

/// Hardware-instanced geometry areas
pub struct InstancedBatch<'f> {
    base: BatchBase<'f>,
    geometry: Arc<Resource>,
    mesh_index: usize,
    instances: InstanceStream,
    start_area: usize,
    area_count: usize,
}

impl<'f> InstancedBatch<'f> {
    /// Draw the first area of `mesh_index` once per instance
    pub fn new(
        mode: RenderMode,
        geometry: Arc<Resource>,
        mesh_index: usize,
        instances: InstanceStream,
        effect: EffectId,
    ) -> Self {
        Self {
            base: BatchBase::new(mode, effect),
            geometry,
            mesh_index,
            instances,
            start_area: 0,
            area_count: 1,
        }
    }

    /// Instances drawn
    pub fn instance_count(&self) -> u32 {
        self.instances.count
    }
}

impl_batch_builders!(InstancedBatch);

impl RenderBatch for InstancedBatch<'_> {
    fn render_mode(&self) -> RenderMode {
        self.base.mode
    }

    fn per_object_data(&self) -> Option<&PerObjectData> {
        self.base.per_object_data
    }

    fn depth(&self) -> f32 {
        self.base.depth
    }

    fn commit(&self, ctx: &CommitContext<'_>) {
        let effect = ctx.effect_for(self.base.effect);
        self.geometry.with_kind(|g: &GeometryResource| {
            g.render_instanced(
                ctx.device,
                self.mesh_index,
                self.instances,
                self.start_area,
                self.area_count,
                effect,
                ctx.technique,
            )
        });
    }
}

/// Something that can draw geometry it does not expose as a resource
///
/// Decals projected onto a parent mesh are the typical provider: the decal
/// batch forwards to the parent's geometry with the decal's effect.
pub trait GeometryProvider {
    /// Draw with `effect`
    fn render_geometry(&self, ctx: &CommitContext<'_>, effect: EffectId);
}

/// Delegates the draw to a [`GeometryProvider`]
pub struct ForwardingBatch<'f> {
    base: BatchBase<'f>,
    provider: &'f dyn GeometryProvider,
}

impl<'f> ForwardingBatch<'f> {
    /// Forward to `provider`
    pub fn new(mode: RenderMode, provider: &'f dyn GeometryProvider, effect: EffectId) -> Self {
        Self {
            base: BatchBase::new(mode, effect),
            provider,
        }
    }

    /// Attach per-object constants for this frame
    pub fn with_per_object_data(mut self, data: &'f PerObjectData) -> Self {
        self.base.per_object_data = Some(data);
        self
    }

    /// Set the depth sort key
    pub fn with_depth(mut self, depth: f32) -> Self {
        self.base.depth = depth;
        self
    }
}

impl RenderBatch for ForwardingBatch<'_> {
    fn render_mode(&self) -> RenderMode {
        self.base.mode
    }

    fn per_object_data(&self) -> Option<&PerObjectData> {
        self.base.per_object_data
    }

    fn depth(&self) -> f32 {
        self.base.depth
    }

    fn commit(&self, ctx: &CommitContext<'_>) {
        self.provider.render_geometry(ctx, ctx.effect_for(self.base.effect));
    }
}
