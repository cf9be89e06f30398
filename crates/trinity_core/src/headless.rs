//! Headless device
//!
//! A [`Device`] that records every call instead of talking to a GPU. Handles
//! are allocated from a counter and tracked, so tests can assert that every
//! texture and buffer created by a resource is destroyed again on purge.

use alloc::collections::BTreeSet;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use parking_lot::Mutex;

use crate::device::{
    BufferHandle, BufferKind, Device, DrawCall, EffectId, Primitive, RenderMode, ShaderStage,
    TextureDesc, TextureHandle,
};
use crate::error::{DeviceError, DeviceResult};

/// A recorded device call
#[derive(Clone, Debug, PartialEq)]
pub enum DeviceCommand {
    /// Texture created
    CreateTexture { handle: TextureHandle, label: String, bytes: usize },
    /// Texture destroyed
    DestroyTexture(TextureHandle),
    /// Buffer created
    CreateBuffer { handle: BufferHandle, kind: BufferKind, bytes: usize },
    /// Buffer destroyed
    DestroyBuffer(BufferHandle),
    /// Standard states applied
    SetStates(RenderMode),
    /// Constants uploaded
    SetConstants { stage: ShaderStage, bytes: usize },
    /// Draw issued
    Draw {
        effect: EffectId,
        technique: String,
        primitive: Primitive,
        vertex_buffer: BufferHandle,
        first: u32,
        count: u32,
        instances: u32,
    },
}

/// Recording device with no GPU behind it
#[derive(Debug, Default)]
pub struct HeadlessDevice {
    next_handle: AtomicU64,
    commands: Mutex<Vec<DeviceCommand>>,
    live_textures: Mutex<BTreeSet<TextureHandle>>,
    live_buffers: Mutex<BTreeSet<BufferHandle>>,
    fail_textures: AtomicBool,
}

impl HeadlessDevice {
    /// Create a new headless device
    pub fn new() -> Self {
        Self {
            next_handle: AtomicU64::new(1),
            ..Default::default()
        }
    }

    /// Make subsequent texture creation fail
    pub fn set_fail_textures(&self, fail: bool) {
        self.fail_textures.store(fail, Ordering::Relaxed);
    }

    fn allocate(&self) -> u64 {
        // Default-constructed devices start at 0; never hand out 0
        let id = self.next_handle.fetch_add(1, Ordering::Relaxed);
        if id == 0 {
            self.next_handle.fetch_add(1, Ordering::Relaxed)
        } else {
            id
        }
    }

    fn record(&self, command: DeviceCommand) {
        self.commands.lock().push(command);
    }

    /// Snapshot of all recorded commands
    pub fn commands(&self) -> Vec<DeviceCommand> {
        self.commands.lock().clone()
    }

    /// Drain recorded commands
    pub fn take_commands(&self) -> Vec<DeviceCommand> {
        core::mem::take(&mut *self.commands.lock())
    }

    /// Recorded draw commands only
    pub fn draws(&self) -> Vec<DeviceCommand> {
        self.commands
            .lock()
            .iter()
            .filter(|c| matches!(c, DeviceCommand::Draw { .. }))
            .cloned()
            .collect()
    }

    /// Number of textures created and not yet destroyed
    pub fn live_texture_count(&self) -> usize {
        self.live_textures.lock().len()
    }

    /// Number of buffers created and not yet destroyed
    pub fn live_buffer_count(&self) -> usize {
        self.live_buffers.lock().len()
    }

    /// Check if a texture handle is still alive
    pub fn is_texture_alive(&self, handle: TextureHandle) -> bool {
        self.live_textures.lock().contains(&handle)
    }
}

impl Device for HeadlessDevice {
    fn create_texture(&self, desc: &TextureDesc, data: &[u8]) -> DeviceResult<TextureHandle> {
        if self.fail_textures.load(Ordering::Relaxed) {
            return Err(DeviceError::TextureCreation(desc.label.clone()));
        }
        if let Some((width, height)) = desc.size {
            let expected = width as usize * height as usize * 4;
            if data.len() != expected {
                return Err(DeviceError::TextureCreation(alloc::format!(
                    "{}: expected {} bytes of RGBA8 data, got {}",
                    desc.label,
                    expected,
                    data.len()
                )));
            }
        }

        let handle = TextureHandle(self.allocate());
        self.live_textures.lock().insert(handle);
        self.record(DeviceCommand::CreateTexture {
            handle,
            label: desc.label.to_string(),
            bytes: data.len(),
        });
        Ok(handle)
    }

    fn destroy_texture(&self, handle: TextureHandle) {
        if !self.live_textures.lock().remove(&handle) {
            log::warn!("Headless device: destroying unknown texture {:?}", handle);
        }
        self.record(DeviceCommand::DestroyTexture(handle));
    }

    fn create_buffer(&self, kind: BufferKind, data: &[u8]) -> DeviceResult<BufferHandle> {
        let handle = BufferHandle(self.allocate());
        self.live_buffers.lock().insert(handle);
        self.record(DeviceCommand::CreateBuffer {
            handle,
            kind,
            bytes: data.len(),
        });
        Ok(handle)
    }

    fn destroy_buffer(&self, handle: BufferHandle) {
        if !self.live_buffers.lock().remove(&handle) {
            log::warn!("Headless device: destroying unknown buffer {:?}", handle);
        }
        self.record(DeviceCommand::DestroyBuffer(handle));
    }

    fn set_standard_states(&self, mode: RenderMode) {
        self.record(DeviceCommand::SetStates(mode));
    }

    fn set_constants(&self, stage: ShaderStage, data: &[u8]) {
        self.record(DeviceCommand::SetConstants {
            stage,
            bytes: data.len(),
        });
    }

    fn draw(&self, call: &DrawCall<'_>) {
        self.record(DeviceCommand::Draw {
            effect: call.effect,
            technique: call.technique.to_string(),
            primitive: call.primitive,
            vertex_buffer: call.vertex_buffer,
            first: call.first,
            count: call.count,
            instances: call.instances,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_tracking() {
        let device = HeadlessDevice::new();

        let tex = device
            .create_texture(&TextureDesc::encoded("a.png"), &[1, 2, 3])
            .unwrap();
        let buf = device.create_buffer(BufferKind::Vertex, &[0; 12]).unwrap();

        assert_ne!(tex.0, buf.0);
        assert_eq!(device.live_texture_count(), 1);
        assert_eq!(device.live_buffer_count(), 1);

        device.destroy_texture(tex);
        device.destroy_buffer(buf);
        assert_eq!(device.live_texture_count(), 0);
        assert_eq!(device.live_buffer_count(), 0);
        assert_eq!(device.commands().len(), 4);
    }

    #[test]
    fn test_rgba8_size_check() {
        let device = HeadlessDevice::new();
        let desc = TextureDesc::rgba8("flat", 1, 1);

        assert!(device.create_texture(&desc, &[0, 0, 0, 255]).is_ok());
        assert!(device.create_texture(&desc, &[0, 0]).is_err());
    }

    #[test]
    fn test_failure_injection() {
        let device = HeadlessDevice::new();
        device.set_fail_textures(true);
        let result = device.create_texture(&TextureDesc::encoded("a.png"), &[]);
        assert_eq!(result, Err(DeviceError::TextureCreation("a.png".into())));
    }

    #[test]
    fn test_default_never_returns_zero_handle() {
        let device = HeadlessDevice::default();
        let buf = device.create_buffer(BufferKind::Index, &[]).unwrap();
        assert_ne!(buf.0, 0);
    }
}
