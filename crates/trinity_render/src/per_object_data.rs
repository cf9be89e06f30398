//! Per-object shader constants
//!
//! A scene object owns its [`PerObjectData`] and lends it to the batches it
//! emits for one frame. The accumulator uploads it right before the batch
//! commits.

use trinity_core::{Device, RawData, ShaderStage};

/// Vertex and pixel stage constant blocks of one object
#[derive(Clone, Debug, Default)]
pub struct PerObjectData {
    /// Vertex shader constants
    pub vs: Option<RawData>,
    /// Pixel shader constants
    pub ps: Option<RawData>,
}

impl PerObjectData {
    /// No constants
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach vertex stage constants; the block is created if it was not
    pub fn with_vs(mut self, mut data: RawData) -> Self {
        data.create();
        self.vs = Some(data);
        self
    }

    /// Attach pixel stage constants; the block is created if it was not
    pub fn with_ps(mut self, mut data: RawData) -> Self {
        data.create();
        self.ps = Some(data);
        self
    }

    /// Check if there is anything to upload
    pub fn is_empty(&self) -> bool {
        self.vs.is_none() && self.ps.is_none()
    }

    /// Upload both blocks; returns the number of uploads issued
    pub fn set_constants(&self, device: &dyn Device) -> usize {
        let mut uploads = 0;
        if let Some(vs) = &self.vs {
            device.set_constants(ShaderStage::Vertex, vs.as_bytes());
            uploads += 1;
        }
        if let Some(ps) = &self.ps {
            device.set_constants(ShaderStage::Pixel, ps.as_bytes());
            uploads += 1;
        }
        uploads
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use trinity_core::{DeviceCommand, HeadlessDevice};

    #[test]
    fn test_upload_both_stages() {
        let mut vs = RawData::new();
        vs.declare("world", 16).unwrap();
        let mut ps = RawData::new();
        ps.declare_with("tint", &[1.0, 0.5, 0.25, 1.0]).unwrap();

        let pod = PerObjectData::new().with_vs(vs).with_ps(ps);
        assert_relative_eq!(pod.ps.as_ref().unwrap().get("tint").unwrap()[1], 0.5);

        let device = HeadlessDevice::new();
        assert_eq!(pod.set_constants(&device), 2);
        assert_eq!(
            device.commands(),
            vec![
                DeviceCommand::SetConstants { stage: ShaderStage::Vertex, bytes: 64 },
                DeviceCommand::SetConstants { stage: ShaderStage::Pixel, bytes: 16 },
            ]
        );
    }

    #[test]
    fn test_empty() {
        let device = HeadlessDevice::new();
        assert!(PerObjectData::new().is_empty());
        assert_eq!(PerObjectData::new().set_constants(&device), 0);
    }
}
