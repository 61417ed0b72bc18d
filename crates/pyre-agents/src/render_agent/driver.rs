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

//! Runs the frame graph: one direct command list per frame, plus a compute list
//! for light culling.

use super::context::RendererContext;
use super::frame::{FrameStats, FrameView, GuiHook};
use super::frame_graph::{FrameGraph, FrameStage};
use super::targets::{RenderTargets, DEPTH_FORMAT};
use pyre_core::math::{directional_light_view_projection, Mat4};
use pyre_core::renderer::api::{BufferId, CommandListType, ResourceState, TextureId};
use pyre_core::renderer::{
    CommandList, FrameData, FrameRing, RenderError, ResourceStateTable, UploadBuffer,
};
use pyre_core::scene::{MeshData, SceneView, TextureData};
use pyre_lanes::{
    extract_draws, DepthOnlyPass, DepthOnlyView, FrameConstants, LightBuffers, MeshletDraw,
    PassFrame, PostProcessPass, RenderPass, SkyboxPass,
};
use std::sync::Arc;

/// How the color stage draws lit geometry.
#[derive(Debug)]
pub(crate) enum ColorTechnique {
    /// Light culling on the compute queue, then indexed lit draws.
    ClusterForward {
        light_cull: RenderPass,
        lit: RenderPass,
    },
    /// Meshlet dispatches.
    MeshShader { pass: RenderPass },
}

impl ColorTechnique {
    fn geometry_pass(&self) -> &RenderPass {
        match self {
            ColorTechnique::ClusterForward { lit, .. } => lit,
            ColorTechnique::MeshShader { pass } => pass,
        }
    }
}

/// The part of a frame that lives from the depth stage to submission.
struct FrameRecording {
    list: CommandList,
    back_buffer: u32,
    constants: FrameConstants,
    stats: FrameStats,
    // Set once the list went to the queue manager, which then owns its allocator.
    submitted: bool,
}

/// Renderer state that persists across frames.
#[derive(Debug)]
pub(crate) struct FrameDriver {
    context: Arc<RendererContext>,
    graph: FrameGraph,
    ring: FrameRing,
    // One `FrameData` block per ring slot, bound straight from upload memory.
    constants: UploadBuffer,
    // Direct-queue fence value that last read each slot.
    slot_fences: Vec<u64>,
    states: ResourceStateTable,
    // Target textures registered in `states`, and the resize generation they belong to.
    tracked_targets: Vec<TextureId>,
    targets_generation: Option<u64>,
    vertex_buffer: BufferId,
    index_buffer: BufferId,
    depth_prepass: RenderPass,
    shadow: RenderPass,
    skybox: Option<RenderPass>,
    color: ColorTechnique,
    post_process: RenderPass,
    // Set up on the first frame from the camera of that frame.
    shadow_view_projection: Option<Mat4>,
}

impl FrameDriver {
    /// Builds the passes shared by every technique.
    pub(crate) fn new(context: Arc<RendererContext>, color: ColorTechnique) -> Result<Self, RenderError> {
        let config = context.config().clone();
        let device = context.device().as_ref();
        let depth_prepass = RenderPass::DepthOnly(DepthOnlyPass::new(
            device,
            DepthOnlyView::Camera,
            DEPTH_FORMAT,
            config.msaa_samples,
        )?);
        let shadow = RenderPass::DepthOnly(DepthOnlyPass::new(device, DepthOnlyView::Shadow, DEPTH_FORMAT, 1)?);
        let post_process = RenderPass::PostProcess(PostProcessPass::new(
            device,
            context.scene_format(),
            context.back_buffer_format(),
            config.tone_mapping,
            config.bloom,
        )?);

        let ring = FrameRing::new(config.buffer_count);
        let constants = UploadBuffer::new(device, "Frame Constants", ring.buffer_size())?;
        let (vertex_buffer, index_buffer) = {
            let geometry = context.geometry();
            (geometry.vertices().buffer().buffer(), geometry.indices().buffer().buffer())
        };
        let mut states = ResourceStateTable::new();
        states.register(vertex_buffer, ResourceState::Common);
        states.register(index_buffer, ResourceState::Common);
        context.lights().track(&mut states);

        Ok(Self {
            graph: FrameGraph::new()?,
            slot_fences: vec![0; ring.buffer_count() as usize],
            ring,
            constants,
            states,
            tracked_targets: Vec::new(),
            targets_generation: None,
            vertex_buffer,
            index_buffer,
            depth_prepass,
            shadow,
            skybox: None,
            color,
            post_process,
            shadow_view_projection: None,
            context,
        })
    }

    /// Uploads a unit cube and the six faces, and draws them behind the scene.
    pub(crate) fn set_skybox(&mut self, faces: &[TextureData; 6]) -> Result<(), RenderError> {
        let context = Arc::clone(&self.context);
        let mesh = context.upload_static_mesh(&MeshData::cube())?;
        let pass = {
            let mut heaps = context.heaps();
            SkyboxPass::new(
                context.device().as_ref(),
                &mut heaps,
                context.uploader(),
                mesh,
                faces,
                context.scene_format(),
                context.config().msaa_samples,
                DEPTH_FORMAT,
            )?
        };
        log::info!("Skybox enabled");
        self.skybox = Some(RenderPass::Skybox(pass));
        Ok(())
    }

    pub(crate) fn context(&self) -> &Arc<RendererContext> {
        &self.context
    }

    pub(crate) fn color(&self) -> &ColorTechnique {
        &self.color
    }

    pub(crate) fn ring(&self) -> &FrameRing {
        &self.ring
    }

    /// Records, submits and presents one frame.
    ///
    /// Blocks while the ring slot of this frame is still read by the GPU and, when
    /// light culling is serialized, until the culling dispatch retired.
    pub(crate) fn render_frame(
        &mut self,
        scene: &dyn SceneView,
        view: &FrameView,
        meshlet_draws: &[MeshletDraw],
        mut gui: Option<&mut dyn GuiHook>,
    ) -> Result<FrameStats, RenderError> {
        let context = Arc::clone(&self.context);
        let stages = self.graph.stages().to_vec();
        let draws = extract_draws(scene);
        let geometry = context.geometry_views();
        let materials = context.materials();
        let lights = context.lights();
        let targets = context.targets();

        let mut recording: Option<FrameRecording> = None;
        let record = || -> Result<FrameStats, RenderError> {
            let mut stats = None;
            for stage in stages {
                log::trace!("Frame {}: {}", self.ring.frame(), stage.name());
                if stage == FrameStage::DepthOnly {
                    recording = Some(self.begin_frame(&targets, &lights, view)?);
                }
                let Some(rec) = recording.as_mut() else {
                    return Err(RenderError::Internal(format!(
                        "{} scheduled before {}",
                        stage.name(),
                        FrameStage::DepthOnly.name()
                    )));
                };
                let frame = PassFrame {
                    constants: rec.constants,
                    geometry,
                    draws: &draws,
                    meshlet_draws,
                    targets: targets.pass_targets(rec.back_buffer)?,
                    lights: &lights,
                    materials: &materials,
                };
                match stage {
                    FrameStage::DepthOnly => self.depth_stage(&mut rec.list, &frame)?,
                    FrameStage::Skybox => self.skybox_stage(&mut rec.list, &frame)?,
                    FrameStage::Color => self.color_stage(rec, &frame)?,
                    FrameStage::Gui => Self::gui_stage(&mut self.states, &mut rec.list, &frame, gui.as_deref_mut())?,
                    FrameStage::PostRender => stats = Some(self.post_render(rec, &frame)?),
                }
            }
            stats.ok_or_else(|| RenderError::Internal("frame graph has no PostRender stage".to_string()))
        };
        let outcome = record();
        if let (Err(err), Some(rec)) = (&outcome, &recording) {
            if !rec.submitted {
                log::warn!("Frame {} abandoned: {err}", rec.stats.frame_index);
                context.queues().discard(CommandListType::Direct, rec.list.allocator(), 0);
            }
        }
        outcome
    }

    fn begin_frame(
        &mut self,
        targets: &RenderTargets,
        lights: &LightBuffers,
        view: &FrameView,
    ) -> Result<FrameRecording, RenderError> {
        let queues = Arc::clone(self.context.queues());
        let slot = self.ring.slot() as usize;
        queues.graphics_queue().wait_for_fence(self.slot_fences[slot])?;
        let back_buffer = self.context.acquire_next_back_buffer()?;

        if self.targets_generation != Some(targets.generation()) {
            for texture in self.tracked_targets.drain(..) {
                self.states.forget(texture);
            }
            targets.track(&mut self.states);
            self.tracked_targets = targets.textures();
            self.targets_generation = Some(targets.generation());
        }

        let shadow_view_projection = *self.shadow_view_projection.get_or_insert_with(|| {
            log::debug!("Setting up the shadow projection from the first frame's camera");
            directional_light_view_projection(view.sun.direction, view.camera.target, view.sun.shadow_extent)
        });
        let config = self.context.config();
        let (width, height) = targets.size();
        let data = FrameData::new(
            &view.camera,
            width,
            height,
            &view.sun,
            shadow_view_projection,
            config.cluster_grid,
            lights.light_count(),
            config.bloom,
        );
        // Bound in place from upload memory. The slot is not rewritten before its fence retires.
        let offset = self.ring.slot_offset();
        self.constants
            .update_data_at(self.context.device().as_ref(), offset, bytemuck::bytes_of(&data))?;

        let list = queues.allocate_command_list(
            CommandListType::Direct,
            format!("Frame {}", self.ring.frame()),
        )?;
        Ok(FrameRecording {
            list,
            back_buffer,
            constants: FrameConstants {
                buffer: self.constants.buffer(),
                offset,
            },
            stats: FrameStats {
                frame_index: self.ring.frame(),
                ..Default::default()
            },
            submitted: false,
        })
    }

    fn depth_stage(&mut self, list: &mut CommandList, frame: &PassFrame<'_>) -> Result<(), RenderError> {
        let mut transaction = self.states.transaction();
        transaction.require(frame.targets.back_buffer.texture(), ResourceState::RenderTarget)?;
        if frame.geometry.is_some() {
            transaction
                .require(self.vertex_buffer, ResourceState::VertexAndConstantBuffer)?
                .require(self.index_buffer, ResourceState::IndexBuffer)?;
        }
        transaction.commit(list)?;

        self.depth_prepass.render(list, &mut self.states, frame)?;
        self.shadow.render(list, &mut self.states, frame)
    }

    fn skybox_stage(&mut self, list: &mut CommandList, frame: &PassFrame<'_>) -> Result<(), RenderError> {
        let scene = frame.targets.scene_color;
        self.states.transition(list, scene.texture(), ResourceState::RenderTarget)?;
        list.set_render_targets(&[scene.rtv()], None);
        list.clear_render_target(scene.rtv(), scene.clear_color());
        if let Some(skybox) = &self.skybox {
            skybox.render(list, &mut self.states, frame)?;
        }
        Ok(())
    }

    fn color_stage(&mut self, rec: &mut FrameRecording, frame: &PassFrame<'_>) -> Result<(), RenderError> {
        if let ColorTechnique::ClusterForward { light_cull, .. } = &self.color {
            let queues = self.context.queues();
            let mut compute = queues.allocate_command_list(CommandListType::Compute, "Light Cull")?;
            if let Err(err) = light_cull.render(&mut compute, &mut self.states, frame) {
                queues.discard(CommandListType::Compute, compute.allocator(), 0);
                return Err(err);
            }
            rec.stats.record(compute.stats());
            let value = queues.close_and_execute(&mut compute)?;
            if self.context.config().serialize_light_cull {
                queues.compute_queue().wait_for_fence(value)?;
            } else {
                queues.graphics_queue().wait_for_queue(queues.compute_queue(), value)?;
            }
        }
        self.color
            .geometry_pass()
            .render(&mut rec.list, &mut self.states, frame)?;
        self.post_process.render(&mut rec.list, &mut self.states, frame)
    }

    fn gui_stage<'h>(
        states: &mut ResourceStateTable,
        list: &mut CommandList,
        frame: &PassFrame<'_>,
        hook: Option<&mut (dyn GuiHook + 'h)>,
    ) -> Result<(), RenderError> {
        let back_buffer = frame.targets.back_buffer;
        states.transition(list, back_buffer.texture(), ResourceState::RenderTarget)?;
        list.set_render_targets(&[back_buffer.rtv()], None);
        list.set_viewport_and_scissor(back_buffer.width(), back_buffer.height());
        if let Some(hook) = hook {
            list.begin_event("GUI");
            hook.record(list);
            list.end_event();
        }
        Ok(())
    }

    fn post_render(&mut self, rec: &mut FrameRecording, frame: &PassFrame<'_>) -> Result<FrameStats, RenderError> {
        self.states
            .transition(&mut rec.list, frame.targets.back_buffer.texture(), ResourceState::Present)?;
        rec.stats.record(rec.list.stats());
        rec.submitted = true;
        let fence_value = self.context.queues().close_and_execute(&mut rec.list)?;
        self.slot_fences[self.ring.slot() as usize] = fence_value;
        self.context.present()?;
        self.ring.advance();

        let stats = rec.stats;
        log::trace!(
            "Frame {} submitted at fence {fence_value}: {} draws, {} dispatches, {} triangles",
            stats.frame_index,
            stats.draw_calls,
            stats.dispatches,
            stats.triangles
        );
        Ok(stats)
    }
}
