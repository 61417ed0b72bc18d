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

//! Descriptor heaps, descriptor handles and the views written into them.
//!
//! A descriptor is a slot in a heap describing how a shader or the output merger
//! interprets a resource. Handles are plain `(heap, index)` pairs; the backend owns
//! the slot contents.

use super::format::TextureFormat;
use super::ids::{BufferId, DescriptorHeapId, TextureId};
use std::borrow::Cow;

/// The kind of descriptors a heap stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorHeapKind {
    /// Render-target views.
    RenderTarget,
    /// Depth-stencil views.
    DepthStencil,
    /// Constant-buffer, shader-resource and unordered-access views.
    CbvSrvUav,
    /// Samplers.
    Sampler,
}

impl DescriptorHeapKind {
    /// Returns `true` if heaps of this kind can be made visible to shaders.
    pub const fn can_be_shader_visible(self) -> bool {
        matches!(self, Self::CbvSrvUav | Self::Sampler)
    }
}

/// Describes a descriptor heap to be created.
#[derive(Debug, Clone)]
pub struct DescriptorHeapDescriptor<'a> {
    /// Optional debug label.
    pub label: Option<Cow<'a, str>>,
    /// Kind of descriptors stored.
    pub kind: DescriptorHeapKind,
    /// Fixed number of slots.
    pub capacity: u32,
    /// Whether shaders can reference the heap through descriptor tables.
    pub shader_visible: bool,
}

/// A CPU-side handle to a descriptor slot, used to write views and bind targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CpuDescriptorHandle {
    /// Owning heap.
    pub heap: DescriptorHeapId,
    /// Slot index inside the heap.
    pub index: u32,
}

impl CpuDescriptorHandle {
    /// Returns the handle `count` slots further in the same heap.
    pub const fn offset(self, count: u32) -> Self {
        Self {
            heap: self.heap,
            index: self.index + count,
        }
    }
}

/// A GPU-side handle to a descriptor slot, used as the base of a descriptor table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GpuDescriptorHandle {
    /// Owning heap.
    pub heap: DescriptorHeapId,
    /// Slot index inside the heap.
    pub index: u32,
}

impl GpuDescriptorHandle {
    /// Returns the handle `count` slots further in the same heap.
    pub const fn offset(self, count: u32) -> Self {
        Self {
            heap: self.heap,
            index: self.index + count,
        }
    }

    /// The CPU handle of the same slot, used to rewrite it.
    pub const fn cpu(self) -> CpuDescriptorHandle {
        CpuDescriptorHandle {
            heap: self.heap,
            index: self.index,
        }
    }
}

/// A contiguous range of slots handed out by a descriptor heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorAllocation {
    /// Handle of the first slot.
    pub cpu: CpuDescriptorHandle,
    /// Shader-visible handle of the first slot, for shader-visible heaps.
    pub gpu: Option<GpuDescriptorHandle>,
    /// Number of slots in the range.
    pub count: u32,
}

impl DescriptorAllocation {
    /// CPU handle of the `i`-th slot of the range.
    pub fn cpu_at(&self, i: u32) -> CpuDescriptorHandle {
        debug_assert!(i < self.count);
        self.cpu.offset(i)
    }

    /// GPU handle of the `i`-th slot of the range, if the heap is shader-visible.
    pub fn gpu_at(&self, i: u32) -> Option<GpuDescriptorHandle> {
        debug_assert!(i < self.count);
        self.gpu.map(|gpu| gpu.offset(i))
    }

    /// Slot indices covered by the range.
    pub fn indices(&self) -> std::ops::Range<u32> {
        self.cpu.index..self.cpu.index + self.count
    }
}

/// Which planes of a depth-stencil texture a view exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureAspect {
    /// Every plane (color textures).
    All,
    /// The depth plane.
    DepthOnly,
    /// The stencil plane.
    StencilOnly,
}

/// The dimensionality of a shader-resource view of a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureViewDimension {
    /// A single-sample 2-D view.
    D2,
    /// A multi-sample 2-D view.
    D2Multisampled,
    /// A cube view.
    Cube,
}

/// How a buffer view interprets its bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferViewKind {
    /// An array of structures of the given stride.
    Structured {
        /// Size of one element in bytes.
        stride: u32,
    },
    /// Raw 32-bit words (byte-address buffer).
    Raw,
    /// Elements of a texel format.
    Typed(TextureFormat),
}

/// A view written into a descriptor slot.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewDescriptor {
    /// Render-target view of one mip of a texture.
    RenderTarget {
        /// Viewed texture.
        texture: TextureId,
        /// View format.
        format: TextureFormat,
        /// Viewed mip level.
        mip_level: u32,
    },
    /// Depth-stencil view.
    DepthStencil {
        /// Viewed texture.
        texture: TextureId,
        /// View format.
        format: TextureFormat,
        /// Depth plane is bound read-only.
        read_only_depth: bool,
        /// Stencil plane is bound read-only.
        read_only_stencil: bool,
    },
    /// Shader-resource view of a texture.
    TextureSrv {
        /// Viewed texture.
        texture: TextureId,
        /// View format.
        format: TextureFormat,
        /// View dimensionality.
        dimension: TextureViewDimension,
        /// Viewed planes.
        aspect: TextureAspect,
        /// First visible mip.
        base_mip: u32,
        /// Number of visible mips.
        mip_count: u32,
    },
    /// Unordered-access view of one mip of a texture.
    TextureUav {
        /// Viewed texture.
        texture: TextureId,
        /// View format.
        format: TextureFormat,
        /// Viewed mip level.
        mip_level: u32,
    },
    /// Shader-resource view of a buffer.
    BufferSrv {
        /// Viewed buffer.
        buffer: BufferId,
        /// Byte offset of the first element.
        offset: u64,
        /// Size of the view in bytes.
        size: u64,
        /// Interpretation of the bytes.
        kind: BufferViewKind,
    },
    /// Unordered-access view of a buffer.
    BufferUav {
        /// Viewed buffer.
        buffer: BufferId,
        /// Byte offset of the first element.
        offset: u64,
        /// Size of the view in bytes.
        size: u64,
        /// Interpretation of the bytes.
        kind: BufferViewKind,
        /// Optional 4-byte atomic counter buffer.
        counter: Option<BufferId>,
    },
    /// Constant-buffer view.
    ConstantBuffer {
        /// Viewed buffer.
        buffer: BufferId,
        /// Byte offset, a multiple of 256.
        offset: u64,
        /// Size of the view in bytes.
        size: u64,
    },
}

impl ViewDescriptor {
    /// The heap kind this view must be written into.
    pub fn heap_kind(&self) -> DescriptorHeapKind {
        match self {
            ViewDescriptor::RenderTarget { .. } => DescriptorHeapKind::RenderTarget,
            ViewDescriptor::DepthStencil { .. } => DescriptorHeapKind::DepthStencil,
            _ => DescriptorHeapKind::CbvSrvUav,
        }
    }
}
