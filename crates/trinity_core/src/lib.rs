//! # trinity_core - Trinity Core
//!
//! Leaf primitives shared by every other Trinity crate:
//! - **Device contract**: the minimal GPU abstraction the renderer consumes
//! - **Raw data blocks**: named, offset-addressed float buffers for shader constants
//! - **Frame budgets**: clock-driven limits for cooperative, resumable work
//!
//! ## Philosophy
//! The core never talks to a graphics API directly. Everything GPU-side goes
//! through [`Device`], so the whole pipeline can run against the
//! [`HeadlessDevice`] in tests and tools.

extern crate alloc;

pub mod budget;
pub mod device;
pub mod error;
pub mod headless;
pub mod raw_data;

pub use budget::*;
pub use device::*;
pub use error::*;
pub use headless::{HeadlessDevice, DeviceCommand};
pub use raw_data::{RawData, RawDataElement};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::budget::{Clock, FrameBudget, ManualClock, SystemClock};
    pub use crate::device::{
        BufferHandle, BufferKind, Device, DrawCall, EffectId, Primitive, RenderMode,
        ShaderStage, TextureDesc, TextureHandle,
    };
    pub use crate::error::{DeviceError, RawDataError};
    pub use crate::headless::HeadlessDevice;
    pub use crate::raw_data::RawData;
}
