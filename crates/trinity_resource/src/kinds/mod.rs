//! Built-in resource kinds

pub mod geometry;
pub mod texture;

pub use geometry::{GeometryArea, GeometryData, GeometryMesh, GeometryResource, GpuMesh, InstanceStream};
pub use texture::TextureResource;

use crate::registry::ResourceRegistry;

/// Extensions handled by [`TextureResource`]
pub const TEXTURE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "dds", "webp"];

/// Extensions handled by [`GeometryResource`]
pub const GEOMETRY_EXTENSIONS: &[&str] = &["geo"];

/// Register the built-in kinds on `registry`
pub fn register_builtin_kinds(registry: &ResourceRegistry) {
    for ext in TEXTURE_EXTENSIONS {
        registry.register_kind::<TextureResource>(ext);
    }
    for ext in GEOMETRY_EXTENSIONS {
        registry.register_kind::<GeometryResource>(ext);
    }
}
