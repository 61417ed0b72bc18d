// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use super::GpuResource;
use crate::renderer::api::{
    align_up, BufferDescriptor, BufferId, BufferUsage, MemoryLocation, ResourceKey, ResourceState,
};
use crate::renderer::error::ResourceError;
use crate::renderer::traits::GraphicsDevice;
use std::borrow::Cow;

/// CPU-writable staging memory with an append-only write cursor.
///
/// [`UploadBuffer::upload_data`] appends; running past the capacity is an error and
/// leaves the cursor untouched. [`UploadBuffer::update_data`] rewrites the buffer
/// from offset 0 and is meant for per-frame constant data.
#[derive(Debug)]
pub struct UploadBuffer {
    label: String,
    buffer: BufferId,
    capacity: u64,
    offset: u64,
}

impl UploadBuffer {
    /// Creates an upload buffer of `capacity` bytes.
    pub fn new(device: &dyn GraphicsDevice, label: &str, capacity: u64) -> Result<Self, ResourceError> {
        let buffer = device.create_buffer(&BufferDescriptor {
            label: Some(Cow::Borrowed(label)),
            size: capacity,
            usage: BufferUsage::COPY_SRC | BufferUsage::CONSTANT,
            memory: MemoryLocation::CpuToGpu,
        })?;
        log::debug!("Created upload buffer '{label}' of {capacity} bytes");
        Ok(Self {
            label: label.to_string(),
            buffer,
            capacity,
            offset: 0,
        })
    }

    /// Appends `data` at the current cursor and returns the offset it landed at.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::UploadOverflow`] if the data does not fit in the
    /// remaining capacity.
    pub fn upload_data(&mut self, device: &dyn GraphicsDevice, data: &[u8]) -> Result<u64, ResourceError> {
        let requested = data.len() as u64;
        if requested > self.remaining() {
            return Err(ResourceError::UploadOverflow {
                capacity: self.capacity,
                offset: self.offset,
                requested,
            });
        }
        let offset = self.offset;
        device.write_buffer(self.buffer, offset, data)?;
        self.offset += requested;
        Ok(offset)
    }

    /// Moves the cursor forward to the next multiple of `alignment`.
    pub fn align_to(&mut self, alignment: u64) -> Result<(), ResourceError> {
        let aligned = align_up(self.offset, alignment);
        if aligned > self.capacity {
            return Err(ResourceError::UploadOverflow {
                capacity: self.capacity,
                offset: self.offset,
                requested: aligned - self.offset,
            });
        }
        self.offset = aligned;
        Ok(())
    }

    /// Overwrites the buffer from offset 0. The append cursor is not touched.
    pub fn update_data(&self, device: &dyn GraphicsDevice, data: &[u8]) -> Result<(), ResourceError> {
        self.update_data_at(device, 0, data)
    }

    /// Overwrites `data.len()` bytes starting at `offset`. The append cursor is not touched.
    pub fn update_data_at(
        &self,
        device: &dyn GraphicsDevice,
        offset: u64,
        data: &[u8],
    ) -> Result<(), ResourceError> {
        let requested = data.len() as u64;
        if offset + requested > self.capacity {
            return Err(ResourceError::UploadOverflow {
                capacity: self.capacity,
                offset,
                requested,
            });
        }
        device.write_buffer(self.buffer, offset, data)
    }

    /// Releases the buffer.
    pub fn destroy(self, device: &dyn GraphicsDevice) -> Result<(), ResourceError> {
        device.destroy_buffer(self.buffer)
    }

    /// Backend buffer.
    pub fn buffer(&self) -> BufferId {
        self.buffer
    }

    /// Capacity in bytes.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Current write cursor.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Bytes left before the cursor reaches the end.
    pub fn remaining(&self) -> u64 {
        self.capacity - self.offset
    }
}

impl GpuResource for UploadBuffer {
    fn key(&self) -> ResourceKey {
        ResourceKey::Buffer(self.buffer)
    }

    fn initial_state(&self) -> ResourceState {
        ResourceState::GenericRead
    }

    fn label(&self) -> &str {
        &self.label
    }
}
