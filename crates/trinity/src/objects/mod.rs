//! Built-in scene objects
//!
//! - [`Mesh`]: areas of a geometry resource, per render mode
//! - [`MeshArea`]: one run of areas and the effect drawing it
//! - [`Scene`]: an ordered list of renderables

pub mod mesh;
pub mod mesh_area;
pub mod scene;

pub use mesh::{GeometryBinding, Mesh};
pub use mesh_area::MeshArea;
pub use scene::{RenderableCast, Scene};

use trinity_reader::TypeRegistry;

/// Register the built-in object types under their type names
pub fn register_builtin_types(types: &mut TypeRegistry) {
    types.register::<Mesh>(Mesh::TYPE_NAME);
    types.register::<MeshArea>(MeshArea::TYPE_NAME);
    types.register::<Scene>(Scene::TYPE_NAME);
}
