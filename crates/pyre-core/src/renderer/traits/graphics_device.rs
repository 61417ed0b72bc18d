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

use crate::renderer::api::*;
use crate::renderer::error::{RenderError, ResourceError};
use std::fmt::Debug;

/// The device-level contract every graphics backend implements.
///
/// Components that need the device receive it explicitly (usually as
/// `Arc<dyn GraphicsDevice>`); there is no process-wide device.
pub trait GraphicsDevice: Send + Sync + Debug + 'static {
    /// Returns the capabilities probed when the device was created.
    fn capabilities(&self) -> DeviceCapabilities;

    /// Creates a committed buffer.
    /// ## Arguments
    /// * `descriptor` - Size, usage and memory location of the buffer.
    /// ## Returns
    /// The ID of the created buffer.
    /// ## Errors
    /// * `ResourceError` - If the backend rejects the allocation.
    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<BufferId, ResourceError>;

    /// Creates a memory heap that buffers can later be placed into.
    /// ## Arguments
    /// * `descriptor` - Size, memory location and allowed usages of the heap.
    /// ## Returns
    /// The ID of the created heap.
    fn create_heap(&self, descriptor: &HeapDescriptor) -> Result<HeapId, ResourceError>;

    /// Creates a buffer aliasing `[offset, offset + descriptor.size)` of `heap`.
    ///
    /// Overlap checking is the caller's job (see
    /// [`GpuHeap`](crate::renderer::resource::GpuHeap)).
    /// ## Arguments
    /// * `heap` - The heap to place the buffer in.
    /// * `offset` - Byte offset inside the heap, a multiple of [`PLACEMENT_ALIGNMENT`].
    /// * `descriptor` - Size and usage of the buffer.
    /// ## Errors
    /// * `ResourceError::NotFound` - If the heap does not exist.
    fn create_placed_buffer(
        &self,
        heap: HeapId,
        offset: u64,
        descriptor: &BufferDescriptor,
    ) -> Result<BufferId, ResourceError>;

    /// Destroys a buffer.
    fn destroy_buffer(&self, id: BufferId) -> Result<(), ResourceError>;

    /// Writes CPU data into a buffer living in [`MemoryLocation::CpuToGpu`] memory.
    ///
    /// The write is visible to every command list executed afterwards.
    /// ## Arguments
    /// * `id` - The written buffer.
    /// * `offset` - Byte offset of the write.
    /// * `data` - The bytes to write.
    /// ## Errors
    /// * `ResourceError::OutOfBounds` - If the write exceeds the buffer.
    fn write_buffer(&self, id: BufferId, offset: u64, data: &[u8]) -> Result<(), ResourceError>;

    /// Creates a committed texture.
    /// ## Arguments
    /// * `descriptor` - Shape, format, usage and initial state of the texture.
    /// ## Returns
    /// The ID of the created texture.
    fn create_texture(&self, descriptor: &TextureDescriptor) -> Result<TextureId, ResourceError>;

    /// Destroys a texture. Descriptors referencing it become invalid.
    fn destroy_texture(&self, id: TextureId) -> Result<(), ResourceError>;

    /// Creates the storage behind a descriptor heap.
    fn create_descriptor_heap(
        &self,
        descriptor: &DescriptorHeapDescriptor,
    ) -> Result<DescriptorHeapId, ResourceError>;

    /// Writes a view into a descriptor slot, replacing any previous content.
    /// ## Errors
    /// * `ResourceError::InvalidHandle` - If the slot is outside its heap or the
    ///   view kind does not match the heap kind.
    fn write_descriptor(
        &self,
        handle: CpuDescriptorHandle,
        view: &ViewDescriptor,
    ) -> Result<(), ResourceError>;

    /// Creates a shader module.
    /// ## Errors
    /// * `ResourceError::Shader` - If the source cannot be loaded or compiled.
    fn create_shader_module(
        &self,
        descriptor: &ShaderModuleDescriptor,
    ) -> Result<ShaderModuleId, ResourceError>;

    /// Creates a root signature.
    /// ## Errors
    /// * `ResourceError::Pipeline` - If the layout cannot be expressed by the backend.
    fn create_root_signature(
        &self,
        descriptor: &RootSignatureDescriptor,
    ) -> Result<RootSignatureId, ResourceError>;

    /// Creates a vertex/pixel pipeline state object.
    fn create_graphics_pipeline(
        &self,
        descriptor: &GraphicsPipelineDescriptor,
    ) -> Result<PipelineStateId, ResourceError>;

    /// Creates a compute pipeline state object.
    fn create_compute_pipeline(
        &self,
        descriptor: &ComputePipelineDescriptor,
    ) -> Result<PipelineStateId, ResourceError>;

    /// Creates a task/mesh pipeline state object.
    /// ## Errors
    /// * `PipelineError::FeatureNotSupported` - If the device has no mesh shaders.
    fn create_mesh_pipeline(
        &self,
        descriptor: &MeshPipelineDescriptor,
    ) -> Result<PipelineStateId, ResourceError>;

    /// Creates a command allocator for lists of the given type.
    fn create_command_allocator(
        &self,
        list_type: CommandListType,
    ) -> Result<CommandAllocatorId, ResourceError>;

    /// Resets an allocator whose recorded work has retired on the GPU.
    fn reset_command_allocator(&self, id: CommandAllocatorId) -> Result<(), ResourceError>;

    /// Submits closed command lists to the queue of the given type.
    /// ## Errors
    /// * `RenderError::RenderingFailed` - If a list is still open or cannot be replayed.
    fn execute_command_lists(
        &self,
        queue: CommandListType,
        lists: &[&CommandList],
    ) -> Result<(), RenderError>;

    /// Creates a fence with an initial completed value.
    fn create_fence(&self, initial_value: u64) -> Result<FenceId, ResourceError>;

    /// Schedules `fence` to reach `value` once all work previously submitted to `queue` retires.
    fn signal_fence(
        &self,
        queue: CommandListType,
        fence: FenceId,
        value: u64,
    ) -> Result<(), RenderError>;

    /// Makes `queue` wait on the GPU timeline until `fence` reaches `value`.
    fn queue_wait(
        &self,
        queue: CommandListType,
        fence: FenceId,
        value: u64,
    ) -> Result<(), RenderError>;

    /// Returns the last value the fence is known to have reached.
    fn fence_completed_value(&self, fence: FenceId) -> u64;

    /// Blocks the calling thread until `fence` reaches `value`.
    ///
    /// There is no timeout: a hung GPU blocks the caller indefinitely.
    fn wait_for_fence(&self, fence: FenceId, value: u64) -> Result<(), RenderError>;
}
