//! Device contract - the GPU abstraction consumed by the renderer
//!
//! Backends (WebGPU, Vulkan, a recording stub) implement [`Device`]. The rest
//! of Trinity only allocates and frees handles, switches standard render
//! states and issues draw calls through this trait.

use alloc::string::String;
use serde::{Deserialize, Serialize};

use crate::error::DeviceResult;

/// Standard render state families
///
/// `Any` is a sentinel: a batch in `Any` mode does not care about render
/// state, so no state change is issued for it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    /// No specific state
    #[default]
    Any,
    /// Depth-tested, depth-writing, no blending
    Opaque,
    /// Projected decals on top of opaque geometry
    Decal,
    /// Alpha blended, back-to-front
    Transparent,
    /// Additive blending
    Additive,
    /// Depth-only pass
    Depth,
    /// Fullscreen quads (post-processing)
    Fullscreen,
    /// Object-id output for picking
    Pickable,
    /// Screen-space distortion
    Distortion,
}

impl RenderMode {
    /// Every mode except the `Any` sentinel, in pass order
    pub const PASSES: [RenderMode; 8] = [
        RenderMode::Opaque,
        RenderMode::Decal,
        RenderMode::Transparent,
        RenderMode::Additive,
        RenderMode::Depth,
        RenderMode::Fullscreen,
        RenderMode::Pickable,
        RenderMode::Distortion,
    ];

    /// Check if this is the `Any` sentinel
    pub fn is_any(&self) -> bool {
        matches!(self, RenderMode::Any)
    }

    /// Whether batches of this mode are blended and need depth sorting
    pub fn is_blended(&self) -> bool {
        matches!(
            self,
            RenderMode::Transparent | RenderMode::Additive | RenderMode::Distortion
        )
    }
}

/// Opaque handle to a device texture
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TextureHandle(pub u64);

/// Opaque handle to a device buffer
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BufferHandle(pub u64);

/// Identifier of an effect (shader program + parameters) known to the device
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EffectId(pub u64);

impl EffectId {
    /// Create a new effect id
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Derive a stable id from an effect path (FNV-1a)
    pub fn from_path(path: &str) -> Self {
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in path.bytes() {
            hash ^= byte as u64;
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        Self(hash)
    }
}

/// Buffer usage
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BufferKind {
    /// Vertex data
    Vertex,
    /// 16/32-bit index data
    Index,
    /// Per-instance vertex data
    Instance,
    /// Shader constants
    Constant,
}

/// Shader stage receiving constants
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    /// Vertex shader
    Vertex,
    /// Pixel (fragment) shader
    Pixel,
}

/// Primitive topology of a draw
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Primitive {
    /// Triangle list
    #[default]
    Triangles,
    /// Line list
    Lines,
}

/// Texture creation parameters
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextureDesc {
    /// Debug label, usually the resource path
    pub label: String,
    /// Explicit size for raw RGBA8 data; `None` when the data is an encoded image
    pub size: Option<(u32, u32)>,
}

impl TextureDesc {
    /// Texture decoded from an encoded image file
    pub fn encoded(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            size: None,
        }
    }

    /// Texture from raw RGBA8 pixels
    pub fn rgba8(label: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            label: label.into(),
            size: Some((width, height)),
        }
    }
}

/// A single draw call
#[derive(Clone, Debug, PartialEq)]
pub struct DrawCall<'a> {
    /// Effect to draw with
    pub effect: EffectId,
    /// Technique inside the effect
    pub technique: &'a str,
    /// Topology
    pub primitive: Primitive,
    /// Vertex buffer
    pub vertex_buffer: BufferHandle,
    /// Index buffer (None for non-indexed draws)
    pub index_buffer: Option<BufferHandle>,
    /// Per-instance buffer for instanced draws
    pub instance_buffer: Option<BufferHandle>,
    /// First index (or vertex) of the range
    pub first: u32,
    /// Number of indices (or vertices)
    pub count: u32,
    /// Instance count (1 for plain draws)
    pub instances: u32,
}

/// The GPU device abstraction
///
/// Methods take `&self`: backends are expected to synchronise internally, the
/// renderer itself drives them from a single frame loop.
pub trait Device: Send + Sync {
    /// Create a texture from encoded or raw pixel data
    fn create_texture(&self, desc: &TextureDesc, data: &[u8]) -> DeviceResult<TextureHandle>;

    /// Release a texture
    fn destroy_texture(&self, handle: TextureHandle);

    /// Create a buffer initialised with `data`
    fn create_buffer(&self, kind: BufferKind, data: &[u8]) -> DeviceResult<BufferHandle>;

    /// Release a buffer
    fn destroy_buffer(&self, handle: BufferHandle);

    /// Apply the standard render state block for `mode`
    fn set_standard_states(&self, mode: RenderMode);

    /// Upload per-object constants for the next draw
    fn set_constants(&self, stage: ShaderStage, data: &[u8]);

    /// Issue a draw call
    fn draw(&self, call: &DrawCall<'_>);
}
