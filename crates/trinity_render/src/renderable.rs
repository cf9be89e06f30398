//! Scene object contract

use trinity_core::RenderMode;

use crate::accumulator::BatchAccumulator;
use crate::per_object_data::PerObjectData;

/// Anything that can emit batches for a render pass
pub trait Renderable {
    /// Commit this object's batches for `mode` into `accumulator`
    ///
    /// Implementations must only emit batches whose resources are good; the
    /// accumulator does not check. No drawing happens here.
    fn get_batches<'f>(
        &self,
        mode: RenderMode,
        accumulator: &mut BatchAccumulator<'f>,
        per_object_data: Option<&'f PerObjectData>,
    );

    /// Advance animation by `dt` seconds
    fn update(&mut self, _dt: f32) {}
}
