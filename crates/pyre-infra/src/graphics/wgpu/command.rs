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

//! Replay of recorded [`Command`]s into `wgpu` command encoders.
//!
//! Commands are recorded D3D12-style with explicit render-target binds and
//! clears, while `wgpu` groups draws into render passes whose load operations
//! carry the clears. The replayer bridges the two:
//!
//! - Draws are collected into an open pass keyed by the bound targets; the pass is
//!   encoded when the targets change or a non-draw command needs the encoder.
//! - Clears are parked per target and become the load operation of the next pass
//!   that binds the target, or a pass of their own at the next flush point.
//! - Resource barriers are dropped; `wgpu` tracks usage transitions itself.

use super::device::{PipelineEntry, WgpuDevice};
use super::conversions::IntoWgpu;
use pyre_core::renderer::api::{
    BindPoint, Command, CpuDescriptorHandle, IndexBufferView, RootBinding, RootSignatureId,
    ScissorRect, VertexBufferView, Viewport,
};
use pyre_core::renderer::{RenderError, ResourceError};
use std::collections::{BTreeMap, HashMap};
use std::ops::Range;
use std::sync::Arc;

#[derive(Debug, Default)]
struct BindState {
    root_signature: Option<RootSignatureId>,
    bindings: BTreeMap<u32, RootBinding>,
    push_constants: Vec<u8>,
}

#[derive(Debug)]
enum DrawCall {
    Vertices {
        vertices: Range<u32>,
        instances: Range<u32>,
    },
    Indexed {
        indices: Range<u32>,
        base_vertex: i32,
        instances: Range<u32>,
    },
}

/// Everything a draw needs, resolved at record time.
#[derive(Debug)]
struct DrawRecord {
    pipeline: Arc<wgpu::RenderPipeline>,
    bind_groups: Vec<(u32, Arc<wgpu::BindGroup>)>,
    push_constants: Option<(wgpu::ShaderStages, Vec<u8>)>,
    vertex_buffers: Vec<(u32, Arc<wgpu::Buffer>, Range<u64>)>,
    index_buffer: Option<(Arc<wgpu::Buffer>, Range<u64>, wgpu::IndexFormat)>,
    viewport: Option<Viewport>,
    scissor: Option<ScissorRect>,
    call: DrawCall,
}

#[derive(Debug, Clone, Copy)]
struct DepthClear {
    depth: Option<f32>,
    stencil: Option<u8>,
}

#[derive(Debug)]
struct OpenPass {
    colors: Vec<CpuDescriptorHandle>,
    depth: Option<CpuDescriptorHandle>,
    color_clears: Vec<Option<[f32; 4]>>,
    depth_clear: Option<DepthClear>,
    draws: Vec<DrawRecord>,
}

/// Replays one command list into a fresh `wgpu` command buffer.
pub(crate) struct CommandReplayer<'a> {
    device: &'a WgpuDevice,
    label: &'a str,
    encoder: wgpu::CommandEncoder,
    graphics: BindState,
    compute: BindState,
    pipeline: Option<PipelineEntry>,
    colors: Vec<CpuDescriptorHandle>,
    depth: Option<CpuDescriptorHandle>,
    viewport: Option<Viewport>,
    scissor: Option<ScissorRect>,
    vertex_buffers: BTreeMap<u32, VertexBufferView>,
    index_buffer: Option<IndexBufferView>,
    color_clears: HashMap<CpuDescriptorHandle, [f32; 4]>,
    depth_clears: HashMap<CpuDescriptorHandle, DepthClear>,
    pass: Option<OpenPass>,
    open_events: u32,
}

fn failed(label: &str, what: impl std::fmt::Display) -> RenderError {
    RenderError::RenderingFailed(format!("command list '{label}': {what}"))
}

impl<'a> CommandReplayer<'a> {
    pub(crate) fn new(device: &'a WgpuDevice, label: &'a str) -> Self {
        let encoder = device
            .raw_device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) });
        Self {
            device,
            label,
            encoder,
            graphics: BindState::default(),
            compute: BindState::default(),
            pipeline: None,
            colors: Vec::new(),
            depth: None,
            viewport: None,
            scissor: None,
            vertex_buffers: BTreeMap::new(),
            index_buffer: None,
            color_clears: HashMap::new(),
            depth_clears: HashMap::new(),
            pass: None,
            open_events: 0,
        }
    }

    /// Replays `commands` and returns the finished command buffer.
    pub(crate) fn replay(mut self, commands: &[Command]) -> Result<wgpu::CommandBuffer, RenderError> {
        for command in commands {
            self.apply(command)?;
        }
        self.flush()?;
        while self.open_events > 0 {
            self.encoder.pop_debug_group();
            self.open_events -= 1;
        }
        Ok(self.encoder.finish())
    }

    fn bind_state(&mut self, bind_point: BindPoint) -> &mut BindState {
        match bind_point {
            BindPoint::Graphics => &mut self.graphics,
            BindPoint::Compute => &mut self.compute,
        }
    }

    fn apply(&mut self, command: &Command) -> Result<(), RenderError> {
        match command {
            Command::ResourceBarrier(_) => {}
            Command::SetPipelineState(id) => {
                self.pipeline = Some(self.device.pipeline(*id)?);
            }
            Command::SetRootSignature {
                bind_point,
                root_signature,
            } => {
                let size = self
                    .device
                    .root_signature(*root_signature)?
                    .descriptor
                    .push_constant_size() as usize;
                let state = self.bind_state(*bind_point);
                if state.root_signature != Some(*root_signature) {
                    state.root_signature = Some(*root_signature);
                    state.bindings.clear();
                    state.push_constants = vec![0; size];
                }
            }
            Command::SetRootParameter {
                bind_point,
                slot,
                binding,
            } => self.set_root_parameter(*bind_point, *slot, binding)?,
            Command::SetRenderTargets { colors, depth } => {
                self.colors = colors.clone();
                self.depth = *depth;
            }
            Command::ClearRenderTarget { target, color } => {
                self.flush_pass_using(*target)?;
                self.color_clears.insert(*target, *color);
            }
            Command::ClearDepthStencil {
                target,
                depth,
                stencil,
            } => {
                self.flush_pass_using(*target)?;
                let clear = self.depth_clears.entry(*target).or_insert(DepthClear {
                    depth: None,
                    stencil: None,
                });
                clear.depth = depth.or(clear.depth);
                clear.stencil = stencil.or(clear.stencil);
            }
            Command::SetViewport(viewport) => self.viewport = Some(*viewport),
            Command::SetScissor(scissor) => self.scissor = Some(*scissor),
            Command::SetVertexBuffer { slot, view } => {
                self.vertex_buffers.insert(*slot, *view);
            }
            Command::SetIndexBuffer(view) => self.index_buffer = Some(*view),
            Command::DrawInstanced {
                vertex_count,
                instance_count,
                start_vertex,
                start_instance,
            } => self.record_draw(DrawCall::Vertices {
                vertices: *start_vertex..start_vertex + vertex_count,
                instances: *start_instance..start_instance + instance_count,
            })?,
            Command::DrawIndexedInstanced {
                index_count,
                instance_count,
                start_index,
                base_vertex,
                start_instance,
            } => self.record_draw(DrawCall::Indexed {
                indices: *start_index..start_index + index_count,
                base_vertex: *base_vertex,
                instances: *start_instance..start_instance + instance_count,
            })?,
            Command::Dispatch { x, y, z } => self.dispatch(*x, *y, *z)?,
            Command::DispatchMesh { .. } => {
                return Err(failed(
                    self.label,
                    "mesh dispatch is not supported by the wgpu backend",
                ));
            }
            Command::CopyBufferRegion {
                dst,
                dst_offset,
                src,
                src_offset,
                size,
            } => {
                self.flush()?;
                let (src_buffer, src_base, _) = self.device.buffer(*src)?;
                let (dst_buffer, dst_base, _) = self.device.buffer(*dst)?;
                self.encoder.copy_buffer_to_buffer(
                    &src_buffer,
                    src_base + src_offset,
                    &dst_buffer,
                    dst_base + dst_offset,
                    *size,
                );
            }
            Command::CopyBufferToTexture {
                src,
                layout,
                dst,
                region,
            } => {
                self.flush()?;
                let (buffer, base, _) = self.device.buffer(*src)?;
                let texture = self.device.texture(*dst)?;
                self.encoder.copy_buffer_to_texture(
                    wgpu::TexelCopyBufferInfo {
                        buffer: &buffer,
                        layout: wgpu::TexelCopyBufferLayout {
                            offset: base + layout.offset,
                            bytes_per_row: Some(layout.bytes_per_row),
                            rows_per_image: Some(layout.rows_per_image),
                        },
                    },
                    wgpu::TexelCopyTextureInfo {
                        texture: &texture,
                        mip_level: region.mip_level,
                        origin: wgpu::Origin3d {
                            x: 0,
                            y: 0,
                            z: region.array_layer,
                        },
                        aspect: wgpu::TextureAspect::All,
                    },
                    wgpu::Extent3d {
                        width: region.width,
                        height: region.height,
                        depth_or_array_layers: 1,
                    },
                );
            }
            Command::ResolveSubresource { dst, src, .. } => {
                self.flush()?;
                let source = self.device.attachment_view(*src)?;
                let target = self.device.attachment_view(*dst)?;
                self.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("Pyre Resolve"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: &source,
                        depth_slice: None,
                        resolve_target: Some(&target),
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Load,
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: None,
                    timestamp_writes: None,
                    occlusion_query_set: None,
                });
            }
            Command::BeginEvent(name) => {
                self.flush()?;
                self.encoder.push_debug_group(name);
                self.open_events += 1;
            }
            Command::EndEvent => {
                self.flush()?;
                if self.open_events == 0 {
                    log::warn!("CommandReplayer: Unbalanced EndEvent in '{}'", self.label);
                } else {
                    self.encoder.pop_debug_group();
                    self.open_events -= 1;
                }
            }
        }
        Ok(())
    }

    fn set_root_parameter(
        &mut self,
        bind_point: BindPoint,
        slot: u32,
        binding: &RootBinding,
    ) -> Result<(), RenderError> {
        let label = self.label;
        let root_signature = self
            .bind_state(bind_point)
            .root_signature
            .ok_or_else(|| failed(label, "root parameter set before a root signature"))?;
        match binding {
            RootBinding::Constants {
                values,
                dest_offset,
            } => {
                let range = self
                    .device
                    .root_signature(root_signature)?
                    .descriptor
                    .push_constant_range(slot)
                    .ok_or_else(|| failed(label, format!("slot {slot} holds no root constants")))?;
                let start = (range.start + dest_offset * 4) as usize;
                let bytes: &[u8] = bytemuck::cast_slice(values.as_slice());
                if start + bytes.len() > range.end as usize {
                    return Err(ResourceError::OutOfBounds.into());
                }
                let state = self.bind_state(bind_point);
                state.push_constants[start..start + bytes.len()].copy_from_slice(bytes);
            }
            _ => {
                self.bind_state(bind_point)
                    .bindings
                    .insert(slot, binding.clone());
            }
        }
        Ok(())
    }

    /// Resolves the bind groups and push constants of a bind point.
    #[allow(clippy::type_complexity)]
    fn resolve_bindings(
        &self,
        bind_point: BindPoint,
    ) -> Result<
        (
            Vec<(u32, Arc<wgpu::BindGroup>)>,
            Option<(wgpu::ShaderStages, Vec<u8>)>,
        ),
        RenderError,
    > {
        let state = match bind_point {
            BindPoint::Graphics => &self.graphics,
            BindPoint::Compute => &self.compute,
        };
        let root_signature = state
            .root_signature
            .ok_or_else(|| failed(self.label, "work recorded without a root signature"))?;
        let entry = self.device.root_signature(root_signature)?;

        let mut groups = Vec::with_capacity(state.bindings.len() + 1);
        for (slot, _) in entry
            .group_layouts
            .iter()
            .enumerate()
            .filter(|(_, layout)| layout.is_some())
        {
            let binding = state
                .bindings
                .get(&(slot as u32))
                .ok_or_else(|| failed(self.label, format!("root parameter {slot} is unbound")))?;
            groups.push(self.device.bind_group(root_signature, slot as u32, binding)?);
        }
        if let Some((index, group)) = &entry.sampler_group {
            groups.push((*index, Arc::clone(group)));
        }

        let push_constants = (!state.push_constants.is_empty()
            && !entry.push_constant_stages.is_empty())
        .then(|| (entry.push_constant_stages, state.push_constants.clone()));
        Ok((groups, push_constants))
    }

    fn record_draw(&mut self, call: DrawCall) -> Result<(), RenderError> {
        let pipeline = match &self.pipeline {
            Some(PipelineEntry::Render(pipeline)) => Arc::clone(pipeline),
            _ => return Err(failed(self.label, "draw without a graphics pipeline")),
        };
        let (bind_groups, push_constants) = self.resolve_bindings(BindPoint::Graphics)?;

        let mut vertex_buffers = Vec::with_capacity(self.vertex_buffers.len());
        for (slot, view) in &self.vertex_buffers {
            let (buffer, base, _) = self.device.buffer(view.buffer)?;
            let start = base + view.offset;
            vertex_buffers.push((*slot, buffer, start..start + view.size));
        }
        let index_buffer = match (&call, self.index_buffer) {
            (DrawCall::Indexed { .. }, Some(view)) => {
                let (buffer, base, _) = self.device.buffer(view.buffer)?;
                let start = base + view.offset;
                Some((buffer, start..start + view.size, view.format.into_wgpu()))
            }
            (DrawCall::Indexed { .. }, None) => {
                return Err(failed(self.label, "indexed draw without an index buffer"))
            }
            _ => None,
        };

        let record = DrawRecord {
            pipeline,
            bind_groups,
            push_constants,
            vertex_buffers,
            index_buffer,
            viewport: self.viewport,
            scissor: self.scissor,
            call,
        };

        let same_targets = matches!(
            &self.pass,
            Some(pass) if pass.colors == self.colors && pass.depth == self.depth
        );
        if !same_targets {
            self.flush_pass()?;
            self.pass = Some(OpenPass {
                colors: self.colors.clone(),
                depth: self.depth,
                color_clears: self
                    .colors
                    .iter()
                    .map(|target| self.color_clears.remove(target))
                    .collect(),
                depth_clear: self.depth.and_then(|target| self.depth_clears.remove(&target)),
                draws: Vec::new(),
            });
        }
        if let Some(pass) = self.pass.as_mut() {
            pass.draws.push(record);
        }
        Ok(())
    }

    fn dispatch(&mut self, x: u32, y: u32, z: u32) -> Result<(), RenderError> {
        let pipeline = match &self.pipeline {
            Some(PipelineEntry::Compute(pipeline)) => Arc::clone(pipeline),
            _ => return Err(failed(self.label, "dispatch without a compute pipeline")),
        };
        let (bind_groups, push_constants) = self.resolve_bindings(BindPoint::Compute)?;
        self.flush()?;

        let mut pass = self.encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some(self.label),
            timestamp_writes: None,
        });
        pass.set_pipeline(&pipeline);
        for (index, group) in &bind_groups {
            pass.set_bind_group(*index, group.as_ref(), &[]);
        }
        if let Some((_, data)) = &push_constants {
            pass.set_push_constants(0, data);
        }
        pass.dispatch_workgroups(x, y, z);
        Ok(())
    }

    /// Encodes the open pass if it renders to `target`, so a following clear lands after its draws.
    fn flush_pass_using(&mut self, target: CpuDescriptorHandle) -> Result<(), RenderError> {
        let uses_target = self
            .pass
            .as_ref()
            .is_some_and(|pass| pass.colors.contains(&target) || pass.depth == Some(target));
        if uses_target {
            self.flush_pass()?;
        }
        Ok(())
    }

    /// Encodes the open pass and every parked clear.
    fn flush(&mut self) -> Result<(), RenderError> {
        self.flush_pass()?;

        let mut color_clears: Vec<_> = self.color_clears.drain().collect();
        color_clears.sort_by_key(|(target, _)| *target);
        for (target, color) in color_clears {
            self.pass = Some(OpenPass {
                colors: vec![target],
                depth: None,
                color_clears: vec![Some(color)],
                depth_clear: None,
                draws: Vec::new(),
            });
            self.flush_pass()?;
        }

        let mut depth_clears: Vec<_> = self.depth_clears.drain().collect();
        depth_clears.sort_by_key(|(target, _)| *target);
        for (target, clear) in depth_clears {
            self.pass = Some(OpenPass {
                colors: Vec::new(),
                depth: Some(target),
                color_clears: Vec::new(),
                depth_clear: Some(clear),
                draws: Vec::new(),
            });
            self.flush_pass()?;
        }
        Ok(())
    }

    fn flush_pass(&mut self) -> Result<(), RenderError> {
        let Some(open) = self.pass.take() else {
            return Ok(());
        };

        let color_views = open
            .colors
            .iter()
            .map(|target| self.device.render_target_view(*target))
            .collect::<Result<Vec<_>, _>>()?;
        let depth = open
            .depth
            .map(|target| self.device.depth_stencil_view(target))
            .transpose()?;

        let color_attachments: Vec<Option<wgpu::RenderPassColorAttachment>> = color_views
            .iter()
            .zip(&open.color_clears)
            .map(|(view, clear)| {
                Some(wgpu::RenderPassColorAttachment {
                    view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: match clear {
                            Some([r, g, b, a]) => wgpu::LoadOp::Clear(wgpu::Color {
                                r: f64::from(*r),
                                g: f64::from(*g),
                                b: f64::from(*b),
                                a: f64::from(*a),
                            }),
                            None => wgpu::LoadOp::Load,
                        },
                        store: wgpu::StoreOp::Store,
                    },
                })
            })
            .collect();

        let depth_stencil_attachment =
            depth
                .as_ref()
                .map(|attachment| wgpu::RenderPassDepthStencilAttachment {
                    view: &attachment.view,
                    depth_ops: (!attachment.read_only_depth).then(|| wgpu::Operations {
                        load: match open.depth_clear.and_then(|clear| clear.depth) {
                            Some(depth) => wgpu::LoadOp::Clear(depth),
                            None => wgpu::LoadOp::Load,
                        },
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: (attachment.has_stencil && !attachment.read_only_stencil).then(
                        || wgpu::Operations {
                            load: match open.depth_clear.and_then(|clear| clear.stencil) {
                                Some(stencil) => wgpu::LoadOp::Clear(u32::from(stencil)),
                                None => wgpu::LoadOp::Load,
                            },
                            store: wgpu::StoreOp::Store,
                        },
                    ),
                });

        let mut pass = self.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(self.label),
            color_attachments: &color_attachments,
            depth_stencil_attachment,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        for draw in &open.draws {
            pass.set_pipeline(&draw.pipeline);
            for (index, group) in &draw.bind_groups {
                pass.set_bind_group(*index, group.as_ref(), &[]);
            }
            if let Some((stages, data)) = &draw.push_constants {
                pass.set_push_constants(*stages, 0, data);
            }
            for (slot, buffer, range) in &draw.vertex_buffers {
                pass.set_vertex_buffer(*slot, buffer.slice(range.clone()));
            }
            if let Some((buffer, range, format)) = &draw.index_buffer {
                pass.set_index_buffer(buffer.slice(range.clone()), *format);
            }
            if let Some(viewport) = draw.viewport {
                pass.set_viewport(
                    viewport.x,
                    viewport.y,
                    viewport.width,
                    viewport.height,
                    viewport.min_depth,
                    viewport.max_depth,
                );
            }
            if let Some(scissor) = draw.scissor {
                pass.set_scissor_rect(scissor.x, scissor.y, scissor.width, scissor.height);
            }
            match &draw.call {
                DrawCall::Vertices {
                    vertices,
                    instances,
                } => pass.draw(vertices.clone(), instances.clone()),
                DrawCall::Indexed {
                    indices,
                    base_vertex,
                    instances,
                } => pass.draw_indexed(indices.clone(), *base_vertex, instances.clone()),
            }
        }
        Ok(())
    }
}
