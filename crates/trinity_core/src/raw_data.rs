//! Raw Data - named regions over a single flat float buffer
//!
//! Used to stage per-object shader constants. Regions are declared up front,
//! then [`RawData::create`] allocates one backing buffer and every named region
//! becomes a live view into it.
//!
//! ```ignore
//! let mut data = RawData::new();
//! data.declare("world", 16)?;
//! data.declare("color", 4)?;
//! data.create();
//!
//! data.set("color", &[1.0, 0.5, 0.0, 1.0]);
//! device.set_constants(ShaderStage::Vertex, data.as_bytes());
//! ```

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;

use crate::error::RawDataError;

/// A declared region inside a [`RawData`] buffer
#[derive(Clone, Debug, PartialEq)]
pub struct RawDataElement {
    /// First slot of the region
    pub offset: usize,
    /// Number of slots in the region
    pub size: usize,
    /// Values written into the region by `create`
    initial: Option<Vec<f32>>,
}

impl RawDataElement {
    /// Slot range covered by this element
    pub fn range(&self) -> core::ops::Range<usize> {
        self.offset..self.offset + self.size
    }
}

/// Flat float buffer with a name -> (offset, size) directory
#[derive(Clone, Debug, Default)]
pub struct RawData {
    elements: BTreeMap<String, RawDataElement>,
    order: Vec<String>,
    next_offset: usize,
    data: Vec<f32>,
    created: bool,
}

impl RawData {
    /// Create an empty layout
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve the next `size` slots under `name`
    pub fn declare(&mut self, name: impl Into<String>, size: usize) -> Result<(), RawDataError> {
        self.declare_element(name.into(), size, None)
    }

    /// Reserve a region and fill it with `initial` when the buffer is created
    ///
    /// The region size is `initial.len()`.
    pub fn declare_with(&mut self, name: impl Into<String>, initial: &[f32]) -> Result<(), RawDataError> {
        self.declare_element(name.into(), initial.len(), Some(initial.to_vec()))
    }

    fn declare_element(
        &mut self,
        name: String,
        size: usize,
        initial: Option<Vec<f32>>,
    ) -> Result<(), RawDataError> {
        if self.created {
            return Err(RawDataError::Sealed(name));
        }
        if self.elements.contains_key(&name) {
            return Err(RawDataError::AlreadyDeclared(name));
        }

        let element = RawDataElement {
            offset: self.next_offset,
            size,
            initial,
        };
        self.next_offset += size;
        self.order.push(name.clone());
        self.elements.insert(name, element);
        Ok(())
    }

    /// Allocate the backing buffer
    ///
    /// Calling this again after the buffer exists does nothing.
    pub fn create(&mut self) {
        if self.created {
            return;
        }

        self.data = alloc::vec![0.0; self.next_offset];
        for element in self.elements.values() {
            if let Some(initial) = &element.initial {
                self.data[element.range()].copy_from_slice(initial);
            }
        }
        self.created = true;
    }

    /// Whether `create` has been called
    pub fn is_created(&self) -> bool {
        self.created
    }

    /// Live view of a region
    pub fn get(&self, name: &str) -> Option<&[f32]> {
        if !self.created {
            return None;
        }
        let element = self.elements.get(name)?;
        Some(&self.data[element.range()])
    }

    /// Mutable live view of a region; writes land in the backing buffer
    pub fn get_mut(&mut self, name: &str) -> Option<&mut [f32]> {
        if !self.created {
            return None;
        }
        let range = self.elements.get(name)?.range();
        Some(&mut self.data[range])
    }

    /// Copy `value` into a region
    ///
    /// Only the first `min(value.len(), size)` slots are written: oversized input
    /// is truncated and shorter input leaves the region's tail untouched.
    /// Returns `false` if the region is unknown or the buffer is not created.
    pub fn set(&mut self, name: &str, value: &[f32]) -> bool {
        match self.get_mut(name) {
            Some(view) => {
                let count = value.len().min(view.len());
                view[..count].copy_from_slice(&value[..count]);
                true
            }
            None => false,
        }
    }

    /// Directory entry for a region
    pub fn element(&self, name: &str) -> Option<&RawDataElement> {
        self.elements.get(name)
    }

    /// Region names in declaration order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(|s| s.as_str())
    }

    /// Total declared slot count
    pub fn len(&self) -> usize {
        self.next_offset
    }

    /// Check if nothing has been declared
    pub fn is_empty(&self) -> bool {
        self.next_offset == 0
    }

    /// Whole backing buffer (empty before `create`)
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Whole backing buffer, mutable
    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Backing buffer as bytes, ready for a constant buffer upload
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.data)
    }
}
