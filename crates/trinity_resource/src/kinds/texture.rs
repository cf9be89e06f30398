//! Texture resources

use std::any::Any;

use trinity_core::{Device, TextureDesc, TextureHandle};

use crate::error::Result;
use crate::loader::{PrepareContext, PrepareStatus, ResourceKind};

/// Encoded image bytes uploaded as one device texture
#[derive(Debug, Default)]
pub struct TextureResource {
    handle: Option<TextureHandle>,
    byte_size: usize,
}

impl TextureResource {
    /// Device texture, present while the resource is good
    pub fn handle(&self) -> Option<TextureHandle> {
        self.handle
    }
}

impl ResourceKind for TextureResource {
    fn kind_name(&self) -> &'static str {
        "texture"
    }

    fn prepare(&mut self, data: &[u8], ctx: &PrepareContext<'_>) -> Result<PrepareStatus> {
        if let Some(old) = self.handle.take() {
            ctx.device.destroy_texture(old);
        }
        let handle = ctx.device.create_texture(&TextureDesc::encoded(ctx.path), data)?;
        self.handle = Some(handle);
        self.byte_size = data.len();
        Ok(PrepareStatus::Ready)
    }

    fn unload(&mut self, device: &dyn Device) {
        if let Some(handle) = self.handle.take() {
            device.destroy_texture(handle);
        }
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
