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

//! Descriptors for buffers, memory heaps and textures.

use super::flags::{BufferUsage, TextureUsage};
use super::format::TextureFormat;
use super::state::ResourceState;
use std::borrow::Cow;

/// Where the memory of a resource lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryLocation {
    /// Device-local memory, not CPU-accessible.
    GpuOnly,
    /// CPU-writable memory the GPU reads from (upload heap).
    CpuToGpu,
    /// GPU-writable memory the CPU reads back from.
    GpuToCpu,
}

/// Describes a GPU buffer to be created.
#[derive(Debug, Clone)]
pub struct BufferDescriptor<'a> {
    /// Optional debug label.
    pub label: Option<Cow<'a, str>>,
    /// Size of the buffer in bytes.
    pub size: u64,
    /// Allowed usages.
    pub usage: BufferUsage,
    /// Memory location.
    pub memory: MemoryLocation,
}

/// Alignment of placed resources inside a heap.
pub const PLACEMENT_ALIGNMENT: u64 = 64 * 1024;

/// Describes a memory heap that buffers can be placed into.
#[derive(Debug, Clone)]
pub struct HeapDescriptor<'a> {
    /// Optional debug label.
    pub label: Option<Cow<'a, str>>,
    /// Size of the heap in bytes.
    pub size: u64,
    /// Memory location of every resource placed in the heap.
    pub memory: MemoryLocation,
    /// Usages every placed buffer may request.
    pub usage: BufferUsage,
}

/// The shape of a texture resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureDimension {
    /// A 2-D texture or 2-D array.
    D2,
    /// A cube map; `array_layers` must be 6.
    Cube,
}

/// Optimized clear value baked into a render or depth target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClearValue {
    /// Clear color for render targets.
    Color([f32; 4]),
    /// Clear values for depth-stencil targets.
    DepthStencil {
        /// Depth clear value.
        depth: f32,
        /// Stencil clear value.
        stencil: u8,
    },
}

/// Describes a texture to be created.
#[derive(Debug, Clone)]
pub struct TextureDescriptor<'a> {
    /// Optional debug label.
    pub label: Option<Cow<'a, str>>,
    /// The texture shape.
    pub dimension: TextureDimension,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Number of array layers (6 for cube maps).
    pub array_layers: u32,
    /// Number of mip levels.
    pub mip_levels: u32,
    /// Samples per pixel.
    pub sample_count: u32,
    /// Pixel format.
    pub format: TextureFormat,
    /// Allowed usages.
    pub usage: TextureUsage,
    /// State the resource is created in.
    pub initial_state: ResourceState,
    /// Optimized clear value, if any.
    pub clear_value: Option<ClearValue>,
}

/// Placement of texel data inside a linear buffer, used by buffer-to-texture copies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureCopyLayout {
    /// Byte offset of the first texel in the buffer.
    pub offset: u64,
    /// Bytes between the starts of two consecutive block rows; a multiple of 256.
    pub bytes_per_row: u32,
    /// Block rows per image.
    pub rows_per_image: u32,
}

/// The destination subresource of a buffer-to-texture copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureCopyRegion {
    /// Destination mip level.
    pub mip_level: u32,
    /// Destination array layer.
    pub array_layer: u32,
    /// Width of the copied region in pixels.
    pub width: u32,
    /// Height of the copied region in pixels.
    pub height: u32,
}
