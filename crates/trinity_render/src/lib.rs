//! # trinity_render - Batched Rendering
//!
//! Decouples "what to draw" from "when to draw it":
//! - **Batches**: self-contained draw descriptions created fresh every frame
//! - **Accumulator**: collects batches, optionally sorts them, then commits
//! - **Per-object data**: constant blocks lent to batches for one frame
//! - **Renderable**: the scene object contract feeding the accumulator
//!
//! ## Example
//!
//! ```ignore
//! use trinity_render::prelude::*;
//!
//! let mut opaque = BatchAccumulator::new();
//! let mut transparent = BatchAccumulator::with_sort(back_to_front);
//!
//! for mode in [RenderMode::Opaque, RenderMode::Transparent] {
//!     let acc = if mode == RenderMode::Opaque { &mut opaque } else { &mut transparent };
//!     scene.get_batches(mode, acc, Some(&scene_constants));
//! }
//! opaque.render(device, "Main");
//! transparent.render(device, "Main");
//! ```

pub mod accumulator;
pub mod batch;
pub mod per_object_data;
pub mod renderable;

pub use accumulator::{back_to_front, front_to_back, BatchAccumulator, BatchComparator, RenderStats};
pub use batch::{
    BatchBase, CommitContext, ForwardingBatch, GeometryBatch, GeometryLineBatch, GeometryProvider,
    InstancedBatch, RenderBatch,
};
pub use per_object_data::PerObjectData;
pub use renderable::Renderable;

/// Prelude - commonly used types
pub mod prelude {
    pub use crate::accumulator::{back_to_front, front_to_back, BatchAccumulator, RenderStats};
    pub use crate::batch::{CommitContext, GeometryBatch, RenderBatch};
    pub use crate::per_object_data::PerObjectData;
    pub use crate::renderable::Renderable;
    pub use trinity_core::RenderMode;
}
