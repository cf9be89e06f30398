//! # trinity - Trinity Renderer Core
//!
//! Ties the renderer crates together behind one explicit [`Context`]:
//! - **Resources**: cached, shared, purged when idle and reloaded on access
//! - **Batches**: renderables commit draw work per pass, drawn in one go
//! - **Object files**: declarative scene descriptions built into live
//!   objects a few milliseconds per frame
//!
//! ## Example
//!
//! ```ignore
//! use trinity::prelude::*;
//!
//! let mut ctx = Context::new(TrinityConfig::default(), device, Arc::new(FileFetcher::new("assets")));
//! let scene = Arc::new(Mutex::new(None));
//! let slot = scene.clone();
//! ctx.load_object("res:/scenes/bridge.red", move |result| *slot.lock() = result.ok());
//!
//! loop {
//!     ctx.frame();
//!     if let Some(scene) = scene.lock().as_ref() {
//!         scene.with_object(|s: &Scene| ctx.render(s, RenderMode::Opaque, "Main"));
//!     }
//! }
//! ```

// Re-export crates
pub use trinity_core;
pub use trinity_reader;
pub use trinity_render;
pub use trinity_resource;

pub mod config;
pub mod context;
pub mod error;
pub mod objects;

pub use config::TrinityConfig;
pub use context::{Context, FrameReport};
pub use error::{Error, Result};
pub use objects::{register_builtin_types, GeometryBinding, Mesh, MeshArea, RenderableCast, Scene};

/// Prelude - commonly used types
pub mod prelude {
    pub use crate::config::TrinityConfig;
    pub use crate::context::{Context, FrameReport};
    pub use crate::error::Error;
    pub use crate::objects::{Mesh, MeshArea, Scene};

    pub use trinity_core::prelude::*;
    pub use trinity_reader::prelude::*;
    pub use trinity_render::prelude::*;
    pub use trinity_resource::prelude::*;
}
