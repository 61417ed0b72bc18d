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

//! An in-memory [`GraphicsDevice`] for tests.
//!
//! [`MockDevice`] hands out ids from an atomic counter, keeps every executed
//! [`CommandList`] for inspection and models fences as plain counters. By default
//! signals complete immediately; [`MockDevice::set_auto_complete`] holds them back
//! so tests can observe in-flight work.

use crate::renderer::api::*;
use crate::renderer::error::{PipelineError, RenderError, ResourceError};
use crate::renderer::traits::{GraphicsDevice, SwapChain};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

/// Summary of a texture created on a [`MockDevice`].
#[derive(Debug, Clone, PartialEq)]
pub struct MockTexture {
    /// Shape.
    pub dimension: TextureDimension,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Array layers.
    pub array_layers: u32,
    /// Mip levels.
    pub mip_levels: u32,
    /// Samples per pixel.
    pub sample_count: u32,
    /// Pixel format.
    pub format: TextureFormat,
    /// Allowed usages.
    pub usage: TextureUsage,
    /// Creation state.
    pub initial_state: ResourceState,
}

#[derive(Debug)]
struct MockBuffer {
    size: u64,
    memory: MemoryLocation,
    data: Vec<u8>,
    placement: Option<(HeapId, u64)>,
}

#[derive(Debug, Default)]
struct MockFence {
    completed: u64,
    pending: Vec<u64>,
}

#[derive(Debug, Default)]
struct MockState {
    buffers: HashMap<BufferId, MockBuffer>,
    heaps: HashMap<HeapId, u64>,
    textures: HashMap<TextureId, MockTexture>,
    descriptor_heaps: HashMap<DescriptorHeapId, (DescriptorHeapKind, u32)>,
    descriptors: HashMap<CpuDescriptorHandle, ViewDescriptor>,
    root_signatures: HashMap<RootSignatureId, RootSignatureDescriptor<'static>>,
    pipelines: HashMap<PipelineStateId, Option<String>>,
    allocators: HashMap<CommandAllocatorId, (CommandListType, u32)>,
    executed: Vec<(CommandListType, CommandList)>,
    fences: HashMap<FenceId, MockFence>,
    queue_waits: Vec<(CommandListType, FenceId, u64)>,
    blocking_waits: u32,
    failing_submission: Option<CommandListType>,
}

/// A [`GraphicsDevice`] that records everything and renders nothing.
#[derive(Debug)]
pub struct MockDevice {
    next_id: AtomicUsize,
    auto_complete: AtomicBool,
    capabilities: DeviceCapabilities,
    state: Mutex<MockState>,
}

impl Default for MockDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDevice {
    /// Creates a device reporting every optional capability.
    pub fn new() -> Self {
        Self::with_capabilities(DeviceCapabilities {
            adapter_name: "Mock Adapter".to_string(),
            typed_uav_load_rg11b10_float: true,
            typed_uav_load_rgba16_float: true,
            ray_tracing_tier: RayTracingTier::Tier1_1,
            mesh_shaders: true,
            uav_formats: vec![
                TextureFormat::Rgba8Unorm,
                TextureFormat::Rgba16Float,
                TextureFormat::Rg11b10Float,
                TextureFormat::Rgba32Float,
                TextureFormat::R32Float,
                TextureFormat::R32Uint,
            ],
        })
    }

    /// Creates a device reporting the given capabilities.
    pub fn with_capabilities(capabilities: DeviceCapabilities) -> Self {
        Self {
            next_id: AtomicUsize::new(1),
            auto_complete: AtomicBool::new(true),
            capabilities,
            state: Mutex::new(MockState::default()),
        }
    }

    /// When `false`, fence signals stay pending until [`MockDevice::complete_fence`]
    /// or a blocking wait retires them.
    pub fn set_auto_complete(&self, enabled: bool) {
        self.auto_complete.store(enabled, Ordering::SeqCst);
    }

    /// Makes the next submission on `queue` fail with [`RenderError::RenderingFailed`].
    pub fn fail_next_submission(&self, queue: CommandListType) {
        self.lock().failing_submission = Some(queue);
    }

    /// Retires every pending signal of `fence` up to and including `value`.
    pub fn complete_fence(&self, fence: FenceId, value: u64) {
        let mut state = self.lock();
        if let Some(f) = state.fences.get_mut(&fence) {
            f.pending.retain(|v| *v > value);
            f.completed = f.completed.max(value);
        }
    }

    /// Every executed list, in submission order.
    pub fn executed_lists(&self) -> Vec<(CommandListType, CommandList)> {
        self.lock().executed.clone()
    }

    /// Every command executed on any queue, in submission order.
    pub fn executed_commands(&self) -> Vec<Command> {
        self.lock()
            .executed
            .iter()
            .flat_map(|(_, list)| list.commands().to_vec())
            .collect()
    }

    /// Forgets executed lists.
    pub fn clear_executed(&self) {
        self.lock().executed.clear();
    }

    /// CPU-visible contents of an upload buffer.
    pub fn buffer_data(&self, id: BufferId) -> Option<Vec<u8>> {
        self.lock().buffers.get(&id).map(|b| b.data.clone())
    }

    /// Size of a live buffer.
    pub fn buffer_size(&self, id: BufferId) -> Option<u64> {
        self.lock().buffers.get(&id).map(|b| b.size)
    }

    /// Heap and offset of a placed buffer.
    pub fn buffer_placement(&self, id: BufferId) -> Option<(HeapId, u64)> {
        self.lock().buffers.get(&id).and_then(|b| b.placement)
    }

    /// Number of live buffers.
    pub fn live_buffer_count(&self) -> usize {
        self.lock().buffers.len()
    }

    /// Summary of a live texture.
    pub fn texture(&self, id: TextureId) -> Option<MockTexture> {
        self.lock().textures.get(&id).cloned()
    }

    /// Number of live textures.
    pub fn live_texture_count(&self) -> usize {
        self.lock().textures.len()
    }

    /// The view last written into a descriptor slot.
    pub fn descriptor(&self, handle: CpuDescriptorHandle) -> Option<ViewDescriptor> {
        self.lock().descriptors.get(&handle).cloned()
    }

    /// Number of allocators ever created.
    pub fn allocator_count(&self) -> usize {
        self.lock().allocators.len()
    }

    /// Number of times an allocator was reset.
    pub fn allocator_resets(&self, id: CommandAllocatorId) -> u32 {
        self.lock().allocators.get(&id).map_or(0, |(_, resets)| *resets)
    }

    /// Number of blocking fence waits that actually had to wait.
    pub fn blocking_wait_count(&self) -> u32 {
        self.lock().blocking_waits
    }

    /// GPU-side queue waits, in submission order.
    pub fn queue_waits(&self) -> Vec<(CommandListType, FenceId, u64)> {
        self.lock().queue_waits.clone()
    }

    fn next(&self) -> usize {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl GraphicsDevice for MockDevice {
    fn capabilities(&self) -> DeviceCapabilities {
        self.capabilities.clone()
    }

    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<BufferId, ResourceError> {
        if descriptor.size == 0 {
            return Err(ResourceError::BackendError("zero-sized buffer".into()));
        }
        let id = BufferId(self.next());
        let data = match descriptor.memory {
            MemoryLocation::CpuToGpu => vec![0; descriptor.size as usize],
            _ => Vec::new(),
        };
        self.lock().buffers.insert(
            id,
            MockBuffer {
                size: descriptor.size,
                memory: descriptor.memory,
                data,
                placement: None,
            },
        );
        Ok(id)
    }

    fn create_heap(&self, descriptor: &HeapDescriptor) -> Result<HeapId, ResourceError> {
        let id = HeapId(self.next());
        self.lock().heaps.insert(id, descriptor.size);
        Ok(id)
    }

    fn create_placed_buffer(
        &self,
        heap: HeapId,
        offset: u64,
        descriptor: &BufferDescriptor,
    ) -> Result<BufferId, ResourceError> {
        let mut state = self.lock();
        let heap_size = *state.heaps.get(&heap).ok_or(ResourceError::NotFound)?;
        if offset + descriptor.size > heap_size {
            return Err(ResourceError::OutOfBounds);
        }
        let id = BufferId(self.next());
        state.buffers.insert(
            id,
            MockBuffer {
                size: descriptor.size,
                memory: descriptor.memory,
                data: Vec::new(),
                placement: Some((heap, offset)),
            },
        );
        Ok(id)
    }

    fn destroy_buffer(&self, id: BufferId) -> Result<(), ResourceError> {
        self.lock()
            .buffers
            .remove(&id)
            .map(|_| ())
            .ok_or(ResourceError::NotFound)
    }

    fn write_buffer(&self, id: BufferId, offset: u64, data: &[u8]) -> Result<(), ResourceError> {
        let mut state = self.lock();
        let buffer = state.buffers.get_mut(&id).ok_or(ResourceError::NotFound)?;
        if buffer.memory != MemoryLocation::CpuToGpu {
            return Err(ResourceError::BackendError(
                "write_buffer on non-upload memory".into(),
            ));
        }
        let end = offset as usize + data.len();
        if end as u64 > buffer.size {
            return Err(ResourceError::OutOfBounds);
        }
        buffer.data[offset as usize..end].copy_from_slice(data);
        Ok(())
    }

    fn create_texture(&self, descriptor: &TextureDescriptor) -> Result<TextureId, ResourceError> {
        if descriptor.width == 0 || descriptor.height == 0 {
            return Err(ResourceError::BackendError("zero-sized texture".into()));
        }
        let id = TextureId(self.next());
        self.lock().textures.insert(
            id,
            MockTexture {
                dimension: descriptor.dimension,
                width: descriptor.width,
                height: descriptor.height,
                array_layers: descriptor.array_layers,
                mip_levels: descriptor.mip_levels,
                sample_count: descriptor.sample_count,
                format: descriptor.format,
                usage: descriptor.usage,
                initial_state: descriptor.initial_state,
            },
        );
        Ok(id)
    }

    fn destroy_texture(&self, id: TextureId) -> Result<(), ResourceError> {
        self.lock()
            .textures
            .remove(&id)
            .map(|_| ())
            .ok_or(ResourceError::NotFound)
    }

    fn create_descriptor_heap(
        &self,
        descriptor: &DescriptorHeapDescriptor,
    ) -> Result<DescriptorHeapId, ResourceError> {
        let id = DescriptorHeapId(self.next());
        self.lock()
            .descriptor_heaps
            .insert(id, (descriptor.kind, descriptor.capacity));
        Ok(id)
    }

    fn write_descriptor(
        &self,
        handle: CpuDescriptorHandle,
        view: &ViewDescriptor,
    ) -> Result<(), ResourceError> {
        let mut state = self.lock();
        let (kind, capacity) = *state
            .descriptor_heaps
            .get(&handle.heap)
            .ok_or(ResourceError::InvalidHandle)?;
        if handle.index >= capacity || kind != view.heap_kind() {
            return Err(ResourceError::InvalidHandle);
        }
        state.descriptors.insert(handle, view.clone());
        Ok(())
    }

    fn create_shader_module(
        &self,
        _descriptor: &ShaderModuleDescriptor,
    ) -> Result<ShaderModuleId, ResourceError> {
        Ok(ShaderModuleId(self.next()))
    }

    fn create_root_signature(
        &self,
        descriptor: &RootSignatureDescriptor,
    ) -> Result<RootSignatureId, ResourceError> {
        let id = RootSignatureId(self.next());
        let owned = RootSignatureDescriptor {
            label: descriptor
                .label
                .as_ref()
                .map(|l| std::borrow::Cow::Owned(l.to_string())),
            parameters: descriptor.parameters.clone(),
            static_samplers: descriptor.static_samplers.clone(),
        };
        self.lock().root_signatures.insert(id, owned);
        Ok(id)
    }

    fn create_graphics_pipeline(
        &self,
        descriptor: &GraphicsPipelineDescriptor,
    ) -> Result<PipelineStateId, ResourceError> {
        let mut state = self.lock();
        if !state.root_signatures.contains_key(&descriptor.root_signature) {
            return Err(PipelineError::InvalidRootSignature {
                id: descriptor.root_signature,
            }
            .into());
        }
        let id = PipelineStateId(self.next());
        state
            .pipelines
            .insert(id, descriptor.label.as_ref().map(|l| l.to_string()));
        Ok(id)
    }

    fn create_compute_pipeline(
        &self,
        descriptor: &ComputePipelineDescriptor,
    ) -> Result<PipelineStateId, ResourceError> {
        let mut state = self.lock();
        if !state.root_signatures.contains_key(&descriptor.root_signature) {
            return Err(PipelineError::InvalidRootSignature {
                id: descriptor.root_signature,
            }
            .into());
        }
        let id = PipelineStateId(self.next());
        state
            .pipelines
            .insert(id, descriptor.label.as_ref().map(|l| l.to_string()));
        Ok(id)
    }

    fn create_mesh_pipeline(
        &self,
        descriptor: &MeshPipelineDescriptor,
    ) -> Result<PipelineStateId, ResourceError> {
        if !self.capabilities.mesh_shaders {
            return Err(PipelineError::FeatureNotSupported("mesh shaders".into()).into());
        }
        let id = PipelineStateId(self.next());
        self.lock()
            .pipelines
            .insert(id, descriptor.label.as_ref().map(|l| l.to_string()));
        Ok(id)
    }

    fn create_command_allocator(
        &self,
        list_type: CommandListType,
    ) -> Result<CommandAllocatorId, ResourceError> {
        let id = CommandAllocatorId(self.next());
        self.lock().allocators.insert(id, (list_type, 0));
        Ok(id)
    }

    fn reset_command_allocator(&self, id: CommandAllocatorId) -> Result<(), ResourceError> {
        let mut state = self.lock();
        let entry = state.allocators.get_mut(&id).ok_or(ResourceError::NotFound)?;
        entry.1 += 1;
        Ok(())
    }

    fn execute_command_lists(
        &self,
        queue: CommandListType,
        lists: &[&CommandList],
    ) -> Result<(), RenderError> {
        let mut state = self.lock();
        if state.failing_submission == Some(queue) {
            state.failing_submission = None;
            return Err(RenderError::RenderingFailed(format!("{queue:?} queue lost")));
        }
        for list in lists {
            if !list.is_closed() {
                return Err(RenderError::RenderingFailed(format!(
                    "command list '{}' executed while open",
                    list.label()
                )));
            }
            state.executed.push((queue, (*list).clone()));
        }
        Ok(())
    }

    fn create_fence(&self, initial_value: u64) -> Result<FenceId, ResourceError> {
        let id = FenceId(self.next());
        self.lock().fences.insert(
            id,
            MockFence {
                completed: initial_value,
                pending: Vec::new(),
            },
        );
        Ok(id)
    }

    fn signal_fence(
        &self,
        _queue: CommandListType,
        fence: FenceId,
        value: u64,
    ) -> Result<(), RenderError> {
        let auto = self.auto_complete.load(Ordering::SeqCst);
        let mut state = self.lock();
        let f = state
            .fences
            .get_mut(&fence)
            .ok_or_else(|| RenderError::Internal(format!("unknown fence {fence:?}")))?;
        if auto {
            f.completed = f.completed.max(value);
        } else {
            f.pending.push(value);
        }
        Ok(())
    }

    fn queue_wait(
        &self,
        queue: CommandListType,
        fence: FenceId,
        value: u64,
    ) -> Result<(), RenderError> {
        self.lock().queue_waits.push((queue, fence, value));
        Ok(())
    }

    fn fence_completed_value(&self, fence: FenceId) -> u64 {
        self.lock().fences.get(&fence).map_or(0, |f| f.completed)
    }

    fn wait_for_fence(&self, fence: FenceId, value: u64) -> Result<(), RenderError> {
        let mut state = self.lock();
        let f = state
            .fences
            .get_mut(&fence)
            .ok_or_else(|| RenderError::FenceWait(format!("unknown fence {fence:?}")))?;
        if f.completed >= value {
            return Ok(());
        }
        if !f.pending.iter().any(|v| *v >= value) {
            return Err(RenderError::FenceWait(format!(
                "fence {fence:?} will never reach {value}"
            )));
        }
        f.pending.retain(|v| *v > value);
        f.completed = value;
        state.blocking_waits += 1;
        Ok(())
    }
}

/// A [`SwapChain`] over textures created on a [`MockDevice`].
#[derive(Debug)]
pub struct MockSwapChain {
    back_buffers: Vec<TextureId>,
    format: TextureFormat,
    size: (u32, u32),
    current: u32,
    presents: u32,
    resizes: Vec<(u32, u32)>,
}

impl MockSwapChain {
    /// Creates `buffer_count` back buffers of the given size and format.
    pub fn new(
        device: &MockDevice,
        buffer_count: u32,
        width: u32,
        height: u32,
        format: TextureFormat,
    ) -> Result<Self, ResourceError> {
        let back_buffers = (0..buffer_count)
            .map(|i| {
                device.create_texture(&TextureDescriptor {
                    label: Some(format!("Back Buffer {i}").into()),
                    dimension: TextureDimension::D2,
                    width,
                    height,
                    array_layers: 1,
                    mip_levels: 1,
                    sample_count: 1,
                    format,
                    usage: TextureUsage::RENDER_TARGET | TextureUsage::COPY_DST,
                    initial_state: ResourceState::Present,
                    clear_value: None,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            back_buffers,
            format,
            size: (width, height),
            current: 0,
            presents: 0,
            resizes: Vec::new(),
        })
    }

    /// Number of successful presents.
    pub fn present_count(&self) -> u32 {
        self.presents
    }

    /// Every size passed to [`SwapChain::resize`].
    pub fn resizes(&self) -> &[(u32, u32)] {
        &self.resizes
    }
}

impl SwapChain for MockSwapChain {
    fn buffer_count(&self) -> u32 {
        self.back_buffers.len() as u32
    }

    fn format(&self) -> TextureFormat {
        self.format
    }

    fn size(&self) -> (u32, u32) {
        self.size
    }

    fn back_buffer(&self, index: u32) -> TextureId {
        self.back_buffers[index as usize % self.back_buffers.len()]
    }

    fn current_back_buffer_index(&self) -> u32 {
        self.current
    }

    fn acquire_next(&mut self) -> Result<u32, RenderError> {
        Ok(self.current)
    }

    fn present(&mut self) -> Result<(), RenderError> {
        self.presents += 1;
        self.current = (self.current + 1) % self.buffer_count();
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<(), RenderError> {
        self.size = (width, height);
        self.resizes.push((width, height));
        Ok(())
    }
}
