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

//! Backend-agnostic command recording.
//!
//! A [`CommandList`] records [`Command`] values while it is open. Once closed, it is
//! handed to [`GraphicsDevice::execute_command_lists`](crate::renderer::GraphicsDevice::execute_command_lists),
//! which replays it on the native API. Lists are cheap to create and are not pooled;
//! only their allocators are recycled.

use super::descriptor::{CpuDescriptorHandle, GpuDescriptorHandle};
use super::format::{IndexFormat, TextureFormat};
use super::ids::{BufferId, CommandAllocatorId, PipelineStateId, RootSignatureId, TextureId};
use super::resource::{TextureCopyLayout, TextureCopyRegion};
use super::state::ResourceBarrier;
use crate::renderer::error::ResourceError;

/// The kind of queue a command list is submitted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandListType {
    /// Graphics, compute and copy work.
    Direct,
    /// Compute and copy work.
    Compute,
    /// Copy work only.
    Copy,
}

impl CommandListType {
    /// Every list type, in queue creation order.
    pub const ALL: [CommandListType; 3] = [Self::Direct, Self::Compute, Self::Copy];
}

/// Which pipeline a root parameter binding targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindPoint {
    /// The graphics (or mesh) pipeline.
    Graphics,
    /// The compute pipeline.
    Compute,
}

/// The value bound to one root parameter slot.
#[derive(Debug, Clone, PartialEq)]
pub enum RootBinding {
    /// A constant buffer at a byte offset.
    ConstantBuffer {
        /// Bound buffer.
        buffer: BufferId,
        /// Byte offset, a multiple of 256.
        offset: u64,
    },
    /// A read-only structured buffer at a byte offset.
    ShaderResource {
        /// Bound buffer.
        buffer: BufferId,
        /// Byte offset.
        offset: u64,
    },
    /// A descriptor table starting at a shader-visible handle.
    DescriptorTable(GpuDescriptorHandle),
    /// Inline 32-bit constants.
    Constants {
        /// The values.
        values: Vec<u32>,
        /// Offset, in 32-bit values, inside the parameter.
        dest_offset: u32,
    },
}

/// A rasterizer viewport.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    /// Left edge in pixels.
    pub x: f32,
    /// Top edge in pixels.
    pub y: f32,
    /// Width in pixels.
    pub width: f32,
    /// Height in pixels.
    pub height: f32,
    /// Minimum depth.
    pub min_depth: f32,
    /// Maximum depth.
    pub max_depth: f32,
}

impl Viewport {
    /// A viewport covering a `width` x `height` target.
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: width as f32,
            height: height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }
}

/// A scissor rectangle in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScissorRect {
    /// Left edge.
    pub x: u32,
    /// Top edge.
    pub y: u32,
    /// Width.
    pub width: u32,
    /// Height.
    pub height: u32,
}

impl ScissorRect {
    /// A rectangle covering a `width` x `height` target.
    pub const fn full(width: u32, height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
        }
    }
}

/// A vertex buffer binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexBufferView {
    /// Bound buffer.
    pub buffer: BufferId,
    /// Byte offset of the first vertex.
    pub offset: u64,
    /// Size of the view in bytes.
    pub size: u64,
    /// Bytes between vertices.
    pub stride: u32,
}

/// An index buffer binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexBufferView {
    /// Bound buffer.
    pub buffer: BufferId,
    /// Byte offset of the first index.
    pub offset: u64,
    /// Size of the view in bytes.
    pub size: u64,
    /// Index format.
    pub format: IndexFormat,
}

/// One recorded GPU command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// A batch of state transitions.
    ResourceBarrier(Vec<ResourceBarrier>),
    /// Binds a pipeline state object.
    SetPipelineState(PipelineStateId),
    /// Binds the root signature of a bind point.
    SetRootSignature {
        /// Target bind point.
        bind_point: BindPoint,
        /// The root signature.
        root_signature: RootSignatureId,
    },
    /// Binds one root parameter slot.
    SetRootParameter {
        /// Target bind point.
        bind_point: BindPoint,
        /// Root parameter slot.
        slot: u32,
        /// The bound value.
        binding: RootBinding,
    },
    /// Binds color and depth targets.
    SetRenderTargets {
        /// Render-target views, in attachment order.
        colors: Vec<CpuDescriptorHandle>,
        /// Depth-stencil view.
        depth: Option<CpuDescriptorHandle>,
    },
    /// Clears a render-target view.
    ClearRenderTarget {
        /// The cleared view.
        target: CpuDescriptorHandle,
        /// Clear color.
        color: [f32; 4],
    },
    /// Clears a depth-stencil view.
    ClearDepthStencil {
        /// The cleared view.
        target: CpuDescriptorHandle,
        /// Depth clear value, if depth is cleared.
        depth: Option<f32>,
        /// Stencil clear value, if stencil is cleared.
        stencil: Option<u8>,
    },
    /// Sets the viewport.
    SetViewport(Viewport),
    /// Sets the scissor rectangle.
    SetScissor(ScissorRect),
    /// Binds a vertex buffer slot.
    SetVertexBuffer {
        /// Input slot.
        slot: u32,
        /// The binding.
        view: VertexBufferView,
    },
    /// Binds the index buffer.
    SetIndexBuffer(IndexBufferView),
    /// Non-indexed draw.
    DrawInstanced {
        /// Vertices per instance.
        vertex_count: u32,
        /// Number of instances.
        instance_count: u32,
        /// First vertex.
        start_vertex: u32,
        /// First instance.
        start_instance: u32,
    },
    /// Indexed draw.
    DrawIndexedInstanced {
        /// Indices per instance.
        index_count: u32,
        /// Number of instances.
        instance_count: u32,
        /// First index in the index buffer.
        start_index: u32,
        /// Value added to each index before fetching the vertex.
        base_vertex: i32,
        /// First instance.
        start_instance: u32,
    },
    /// Compute dispatch.
    Dispatch {
        /// Thread groups along X.
        x: u32,
        /// Thread groups along Y.
        y: u32,
        /// Thread groups along Z.
        z: u32,
    },
    /// Mesh-shader dispatch.
    DispatchMesh {
        /// Thread groups along X.
        x: u32,
        /// Thread groups along Y.
        y: u32,
        /// Thread groups along Z.
        z: u32,
    },
    /// Buffer-to-buffer copy.
    CopyBufferRegion {
        /// Destination buffer.
        dst: BufferId,
        /// Destination byte offset.
        dst_offset: u64,
        /// Source buffer.
        src: BufferId,
        /// Source byte offset.
        src_offset: u64,
        /// Bytes to copy.
        size: u64,
    },
    /// Buffer-to-texture copy.
    CopyBufferToTexture {
        /// Source buffer.
        src: BufferId,
        /// Layout of the texels in the source buffer.
        layout: TextureCopyLayout,
        /// Destination texture.
        dst: TextureId,
        /// Destination subresource and extent.
        region: TextureCopyRegion,
    },
    /// Resolves a multisampled texture into a single-sample one.
    ResolveSubresource {
        /// Single-sample destination.
        dst: TextureId,
        /// Multisampled source.
        src: TextureId,
        /// Resolve format.
        format: TextureFormat,
    },
    /// Opens a named debug region.
    BeginEvent(String),
    /// Closes the innermost debug region.
    EndEvent,
}

/// Work counters gathered from a recorded list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CommandStats {
    /// Draw commands.
    pub draw_calls: u32,
    /// Compute dispatches.
    pub dispatches: u32,
    /// Mesh dispatches.
    pub mesh_dispatches: u32,
    /// Triangles submitted by draw commands.
    pub triangles: u64,
}

impl std::ops::AddAssign for CommandStats {
    fn add_assign(&mut self, rhs: Self) {
        self.draw_calls += rhs.draw_calls;
        self.dispatches += rhs.dispatches;
        self.mesh_dispatches += rhs.mesh_dispatches;
        self.triangles += rhs.triangles;
    }
}

/// A list of recorded GPU commands bound to a command allocator.
#[derive(Debug, Clone)]
pub struct CommandList {
    label: String,
    list_type: CommandListType,
    allocator: CommandAllocatorId,
    commands: Vec<Command>,
    recording: bool,
    rejected: u32,
}

impl CommandList {
    /// Creates a list open for recording against `allocator`.
    pub fn new(list_type: CommandListType, allocator: CommandAllocatorId, label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            list_type,
            allocator,
            commands: Vec::new(),
            recording: true,
            rejected: 0,
        }
    }

    /// Discards every recorded command and reopens the list against a new allocator.
    pub fn reset(&mut self, allocator: CommandAllocatorId) {
        self.allocator = allocator;
        self.commands.clear();
        self.recording = true;
        self.rejected = 0;
    }

    /// Ends recording.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::CommandListClosed`] if the list was already closed or
    /// if commands were recorded after an earlier close.
    pub fn close(&mut self) -> Result<(), ResourceError> {
        if !self.recording || self.rejected > 0 {
            return Err(ResourceError::CommandListClosed);
        }
        self.recording = false;
        Ok(())
    }

    /// Returns `true` once [`CommandList::close`] succeeded.
    pub fn is_closed(&self) -> bool {
        !self.recording
    }

    /// Debug label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Queue type the list must be submitted to.
    pub fn list_type(&self) -> CommandListType {
        self.list_type
    }

    /// Allocator backing the recorded commands.
    pub fn allocator(&self) -> CommandAllocatorId {
        self.allocator
    }

    /// The recorded commands.
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Number of commands rejected because the list was closed.
    pub fn rejected_commands(&self) -> u32 {
        self.rejected
    }

    fn record(&mut self, command: Command) {
        if self.recording {
            self.commands.push(command);
        } else {
            log::error!(
                "Command list '{}' is closed; dropping {:?}",
                self.label,
                command
            );
            self.rejected += 1;
        }
    }

    /// Records a batch of transitions; empty batches are skipped.
    pub fn resource_barrier(&mut self, barriers: Vec<ResourceBarrier>) {
        if !barriers.is_empty() {
            self.record(Command::ResourceBarrier(barriers));
        }
    }

    /// Binds a pipeline state object.
    pub fn set_pipeline_state(&mut self, pipeline: PipelineStateId) {
        self.record(Command::SetPipelineState(pipeline));
    }

    /// Binds the graphics root signature.
    pub fn set_graphics_root_signature(&mut self, root_signature: RootSignatureId) {
        self.record(Command::SetRootSignature {
            bind_point: BindPoint::Graphics,
            root_signature,
        });
    }

    /// Binds the compute root signature.
    pub fn set_compute_root_signature(&mut self, root_signature: RootSignatureId) {
        self.record(Command::SetRootSignature {
            bind_point: BindPoint::Compute,
            root_signature,
        });
    }

    /// Binds a root parameter slot.
    pub fn set_root_parameter(&mut self, bind_point: BindPoint, slot: u32, binding: RootBinding) {
        self.record(Command::SetRootParameter {
            bind_point,
            slot,
            binding,
        });
    }

    /// Binds a constant buffer to a graphics root slot.
    pub fn set_graphics_root_constant_buffer(&mut self, slot: u32, buffer: BufferId, offset: u64) {
        self.set_root_parameter(
            BindPoint::Graphics,
            slot,
            RootBinding::ConstantBuffer { buffer, offset },
        );
    }

    /// Binds a read-only structured buffer to a graphics root slot.
    pub fn set_graphics_root_shader_resource(&mut self, slot: u32, buffer: BufferId, offset: u64) {
        self.set_root_parameter(
            BindPoint::Graphics,
            slot,
            RootBinding::ShaderResource { buffer, offset },
        );
    }

    /// Binds a descriptor table to a graphics root slot.
    pub fn set_graphics_root_descriptor_table(&mut self, slot: u32, base: GpuDescriptorHandle) {
        self.set_root_parameter(BindPoint::Graphics, slot, RootBinding::DescriptorTable(base));
    }

    /// Sets inline constants of a graphics root slot.
    pub fn set_graphics_root_constants(&mut self, slot: u32, values: &[u32], dest_offset: u32) {
        self.set_root_parameter(
            BindPoint::Graphics,
            slot,
            RootBinding::Constants {
                values: values.to_vec(),
                dest_offset,
            },
        );
    }

    /// Binds a constant buffer to a compute root slot.
    pub fn set_compute_root_constant_buffer(&mut self, slot: u32, buffer: BufferId, offset: u64) {
        self.set_root_parameter(
            BindPoint::Compute,
            slot,
            RootBinding::ConstantBuffer { buffer, offset },
        );
    }

    /// Binds a descriptor table to a compute root slot.
    pub fn set_compute_root_descriptor_table(&mut self, slot: u32, base: GpuDescriptorHandle) {
        self.set_root_parameter(BindPoint::Compute, slot, RootBinding::DescriptorTable(base));
    }

    /// Binds render targets.
    pub fn set_render_targets(
        &mut self,
        colors: &[CpuDescriptorHandle],
        depth: Option<CpuDescriptorHandle>,
    ) {
        self.record(Command::SetRenderTargets {
            colors: colors.to_vec(),
            depth,
        });
    }

    /// Clears a render-target view.
    pub fn clear_render_target(&mut self, target: CpuDescriptorHandle, color: [f32; 4]) {
        self.record(Command::ClearRenderTarget { target, color });
    }

    /// Clears a depth-stencil view.
    pub fn clear_depth_stencil(
        &mut self,
        target: CpuDescriptorHandle,
        depth: Option<f32>,
        stencil: Option<u8>,
    ) {
        self.record(Command::ClearDepthStencil {
            target,
            depth,
            stencil,
        });
    }

    /// Sets the viewport and a matching scissor rectangle.
    pub fn set_viewport_and_scissor(&mut self, width: u32, height: u32) {
        self.record(Command::SetViewport(Viewport::full(width, height)));
        self.record(Command::SetScissor(ScissorRect::full(width, height)));
    }

    /// Binds a vertex buffer slot.
    pub fn set_vertex_buffer(&mut self, slot: u32, view: VertexBufferView) {
        self.record(Command::SetVertexBuffer { slot, view });
    }

    /// Binds the index buffer.
    pub fn set_index_buffer(&mut self, view: IndexBufferView) {
        self.record(Command::SetIndexBuffer(view));
    }

    /// Records a non-indexed draw.
    pub fn draw_instanced(
        &mut self,
        vertex_count: u32,
        instance_count: u32,
        start_vertex: u32,
        start_instance: u32,
    ) {
        self.record(Command::DrawInstanced {
            vertex_count,
            instance_count,
            start_vertex,
            start_instance,
        });
    }

    /// Records an indexed draw.
    pub fn draw_indexed_instanced(
        &mut self,
        index_count: u32,
        instance_count: u32,
        start_index: u32,
        base_vertex: i32,
        start_instance: u32,
    ) {
        self.record(Command::DrawIndexedInstanced {
            index_count,
            instance_count,
            start_index,
            base_vertex,
            start_instance,
        });
    }

    /// Records a compute dispatch.
    pub fn dispatch(&mut self, x: u32, y: u32, z: u32) {
        self.record(Command::Dispatch { x, y, z });
    }

    /// Records a mesh-shader dispatch.
    pub fn dispatch_mesh(&mut self, x: u32, y: u32, z: u32) {
        self.record(Command::DispatchMesh { x, y, z });
    }

    /// Records a buffer-to-buffer copy.
    pub fn copy_buffer_region(
        &mut self,
        dst: BufferId,
        dst_offset: u64,
        src: BufferId,
        src_offset: u64,
        size: u64,
    ) {
        self.record(Command::CopyBufferRegion {
            dst,
            dst_offset,
            src,
            src_offset,
            size,
        });
    }

    /// Records a buffer-to-texture copy.
    pub fn copy_buffer_to_texture(
        &mut self,
        src: BufferId,
        layout: TextureCopyLayout,
        dst: TextureId,
        region: TextureCopyRegion,
    ) {
        self.record(Command::CopyBufferToTexture {
            src,
            layout,
            dst,
            region,
        });
    }

    /// Records an MSAA resolve.
    pub fn resolve_subresource(&mut self, dst: TextureId, src: TextureId, format: TextureFormat) {
        self.record(Command::ResolveSubresource { dst, src, format });
    }

    /// Opens a named debug region.
    pub fn begin_event(&mut self, name: impl Into<String>) {
        self.record(Command::BeginEvent(name.into()));
    }

    /// Closes the innermost debug region.
    pub fn end_event(&mut self) {
        self.record(Command::EndEvent);
    }

    /// Counts draws, dispatches and triangles in the recorded commands.
    pub fn stats(&self) -> CommandStats {
        let mut stats = CommandStats::default();
        for command in &self.commands {
            match command {
                Command::DrawInstanced {
                    vertex_count,
                    instance_count,
                    ..
                } => {
                    stats.draw_calls += 1;
                    stats.triangles += u64::from(vertex_count / 3) * u64::from(*instance_count);
                }
                Command::DrawIndexedInstanced {
                    index_count,
                    instance_count,
                    ..
                } => {
                    stats.draw_calls += 1;
                    stats.triangles += u64::from(index_count / 3) * u64::from(*instance_count);
                }
                Command::Dispatch { .. } => stats.dispatches += 1,
                Command::DispatchMesh { .. } => stats.mesh_dispatches += 1,
                _ => {}
            }
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list() -> CommandList {
        CommandList::new(CommandListType::Direct, CommandAllocatorId(0), "test")
    }

    #[test]
    fn records_while_open() {
        let mut cmd = list();
        cmd.draw_indexed_instanced(36, 1, 0, 0, 0);
        cmd.dispatch(1, 2, 3);
        assert_eq!(cmd.commands().len(), 2);
        let stats = cmd.stats();
        assert_eq!(stats.draw_calls, 1);
        assert_eq!(stats.dispatches, 1);
        assert_eq!(stats.triangles, 12);
    }

    #[test]
    fn closed_list_rejects_commands() {
        let mut cmd = list();
        cmd.close().unwrap();
        assert!(cmd.is_closed());
        cmd.dispatch(1, 1, 1);
        assert!(cmd.commands().is_empty());
        assert_eq!(cmd.rejected_commands(), 1);
        assert!(matches!(cmd.close(), Err(ResourceError::CommandListClosed)));
    }

    #[test]
    fn reset_reopens_and_clears() {
        let mut cmd = list();
        cmd.draw_instanced(3, 1, 0, 0);
        cmd.close().unwrap();
        cmd.reset(CommandAllocatorId(7));
        assert!(!cmd.is_closed());
        assert!(cmd.commands().is_empty());
        assert_eq!(cmd.allocator(), CommandAllocatorId(7));
    }

    #[test]
    fn empty_barrier_batches_are_skipped() {
        let mut cmd = list();
        cmd.resource_barrier(Vec::new());
        assert!(cmd.commands().is_empty());
    }
}
