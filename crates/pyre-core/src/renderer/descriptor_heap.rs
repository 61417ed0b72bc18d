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

//! Fixed-capacity bump allocators over descriptor heaps.
//!
//! Slots are never reclaimed individually: a heap lives as long as the renderer.
//! [`DescriptorHeap::allocate`] takes `&mut self`; callers sharing a heap across
//! threads must serialize access themselves.

use crate::config::DescriptorHeapCapacities;
use crate::renderer::api::{
    CpuDescriptorHandle, DescriptorAllocation, DescriptorHeapDescriptor, DescriptorHeapId,
    DescriptorHeapKind, GpuDescriptorHandle,
};
use crate::renderer::error::ResourceError;
use crate::renderer::traits::GraphicsDevice;
use std::borrow::Cow;

/// A descriptor heap handing out contiguous slot ranges from a monotonically
/// increasing cursor.
#[derive(Debug)]
pub struct DescriptorHeap {
    id: DescriptorHeapId,
    kind: DescriptorHeapKind,
    capacity: u32,
    cursor: u32,
    shader_visible: bool,
}

impl DescriptorHeap {
    /// Creates the heap storage on the device.
    ///
    /// `shader_visible` is ignored for render-target and depth-stencil heaps.
    pub fn new(
        device: &dyn GraphicsDevice,
        kind: DescriptorHeapKind,
        capacity: u32,
        shader_visible: bool,
        label: &str,
    ) -> Result<Self, ResourceError> {
        let shader_visible = shader_visible && kind.can_be_shader_visible();
        let id = device.create_descriptor_heap(&DescriptorHeapDescriptor {
            label: Some(Cow::Borrowed(label)),
            kind,
            capacity,
            shader_visible,
        })?;
        log::debug!(
            "Created {kind:?} descriptor heap '{label}' with {capacity} slots (shader visible: {shader_visible})"
        );
        Ok(Self {
            id,
            kind,
            capacity,
            cursor: 0,
            shader_visible,
        })
    }

    /// Reserves `count` consecutive slots.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::DescriptorHeapExhausted`] if the cursor would pass the
    /// heap capacity. The heap is left unchanged in that case.
    pub fn allocate(&mut self, count: u32) -> Result<DescriptorAllocation, ResourceError> {
        let end = self.cursor.checked_add(count).filter(|end| *end <= self.capacity);
        let Some(end) = end else {
            return Err(ResourceError::DescriptorHeapExhausted {
                kind: self.kind,
                capacity: self.capacity,
                allocated: self.cursor,
                requested: count,
            });
        };
        let index = self.cursor;
        self.cursor = end;
        Ok(DescriptorAllocation {
            cpu: CpuDescriptorHandle {
                heap: self.id,
                index,
            },
            gpu: self.shader_visible.then_some(GpuDescriptorHandle {
                heap: self.id,
                index,
            }),
            count,
        })
    }

    /// Reserves a single slot.
    pub fn allocate_one(&mut self) -> Result<DescriptorAllocation, ResourceError> {
        self.allocate(1)
    }

    /// The backend heap this allocator hands out slots from.
    pub fn id(&self) -> DescriptorHeapId {
        self.id
    }

    /// Kind of descriptors stored.
    pub fn kind(&self) -> DescriptorHeapKind {
        self.kind
    }

    /// Fixed capacity.
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Slots handed out so far.
    pub fn allocated(&self) -> u32 {
        self.cursor
    }

    /// Slots still available.
    pub fn remaining(&self) -> u32 {
        self.capacity - self.cursor
    }

    /// Whether shaders can reference the heap through descriptor tables.
    pub fn is_shader_visible(&self) -> bool {
        self.shader_visible
    }
}

/// The process-lifetime descriptor heaps, one per kind.
#[derive(Debug)]
pub struct DescriptorHeaps {
    /// Render-target views.
    pub rtv: DescriptorHeap,
    /// Depth-stencil views.
    pub dsv: DescriptorHeap,
    /// Shader-visible constant-buffer, shader-resource and unordered-access views.
    pub cbv_srv_uav: DescriptorHeap,
    /// Shader-visible samplers.
    pub sampler: DescriptorHeap,
}

impl DescriptorHeaps {
    /// Creates every heap with the configured capacities.
    pub fn new(
        device: &dyn GraphicsDevice,
        capacities: &DescriptorHeapCapacities,
    ) -> Result<Self, ResourceError> {
        Ok(Self {
            rtv: DescriptorHeap::new(
                device,
                DescriptorHeapKind::RenderTarget,
                capacities.rtv,
                false,
                "RTV Heap",
            )?,
            dsv: DescriptorHeap::new(
                device,
                DescriptorHeapKind::DepthStencil,
                capacities.dsv,
                false,
                "DSV Heap",
            )?,
            cbv_srv_uav: DescriptorHeap::new(
                device,
                DescriptorHeapKind::CbvSrvUav,
                capacities.cbv_srv_uav,
                true,
                "CBV/SRV/UAV Heap",
            )?,
            sampler: DescriptorHeap::new(
                device,
                DescriptorHeapKind::Sampler,
                capacities.sampler,
                true,
                "Sampler Heap",
            )?,
        })
    }
}
