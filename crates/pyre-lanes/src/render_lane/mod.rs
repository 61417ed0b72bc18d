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

//! Rendering lane: the closed set of render passes and what they consume.
//!
//! Each pass owns exactly one root signature and (usually) one pipeline state,
//! built once at construction. Per frame it receives a [`PassFrame`] describing
//! the bound resources, records its state transitions through the shared
//! [`ResourceStateTable`] and issues its draws or dispatches.
//!
//! Dispatch goes through [`RenderPass::render`]; there is no pass trait.

mod depth_only_lane;
mod extract_lane;
mod light_cull_lane;
mod lit_forward_lane;
mod material_table;
mod mesh_shader_lane;
mod post_process_lane;
pub mod shaders;
mod skybox_lane;
#[cfg(test)]
pub(crate) mod test_support;

pub use depth_only_lane::*;
pub use extract_lane::*;
pub use light_cull_lane::*;
pub use lit_forward_lane::*;
pub use material_table::*;
pub use mesh_shader_lane::*;
pub use post_process_lane::*;
pub use skybox_lane::*;

use pyre_core::renderer::api::{
    BindPoint, BufferId, CommandList, IndexBufferView, PipelineStateId, ResourceState,
    RootSignatureId, ShaderModuleDescriptor, ShaderModuleId, ShaderSource, TextureId,
    VertexBufferView,
};
use pyre_core::renderer::{
    ColorBuffer, DepthBuffer, GraphicsDevice, RenderError, ResourceError, ResourceStateTable,
};
use std::borrow::Cow;
use std::collections::HashSet;

/// A root signature and the pipeline state built against it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassPipeline {
    /// The binding contract.
    pub root_signature: RootSignatureId,
    /// The compiled pipeline state.
    pub pipeline: PipelineStateId,
    /// Whether the pipeline runs on the graphics or compute bind point.
    pub bind_point: BindPoint,
}

impl PassPipeline {
    /// Binds root signature then pipeline state.
    pub fn bind(&self, list: &mut CommandList) {
        match self.bind_point {
            BindPoint::Graphics => list.set_graphics_root_signature(self.root_signature),
            BindPoint::Compute => list.set_compute_root_signature(self.root_signature),
        }
        list.set_pipeline_state(self.pipeline);
    }
}

/// Byte location of the current frame's constants in the ring buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameConstants {
    /// The GPU-resident ring buffer.
    pub buffer: BufferId,
    /// Offset of the slot used this frame.
    pub offset: u64,
}

/// Views over the shared vertex and index mega-buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeometryViews {
    /// The whole vertex mega-buffer.
    pub vertex: VertexBufferView,
    /// The whole index mega-buffer.
    pub index: IndexBufferView,
}

impl GeometryViews {
    /// Binds both views on the input assembler.
    pub fn bind(&self, list: &mut CommandList) {
        list.set_vertex_buffer(0, self.vertex);
        list.set_index_buffer(self.index);
    }
}

/// The render targets a frame draws into.
#[derive(Debug, Clone, Copy)]
pub struct PassTargets<'a> {
    /// Scene depth, with the same sample count as `scene_color`.
    pub depth: &'a DepthBuffer,
    /// Directional shadow map.
    pub shadow: &'a DepthBuffer,
    /// Where sky and lit geometry are drawn; multisampled when MSAA is on.
    pub scene_color: &'a ColorBuffer,
    /// Single-sampled resolve of `scene_color`, present when tone mapping an MSAA target.
    pub resolved: Option<&'a ColorBuffer>,
    /// Extract, horizontal and vertical bloom targets, present when tone mapping.
    pub bloom: Option<[&'a ColorBuffer; 3]>,
    /// The swap-chain buffer presented this frame.
    pub back_buffer: &'a ColorBuffer,
}

/// Everything a pass may bind during one frame.
#[derive(Debug, Clone, Copy)]
pub struct PassFrame<'a> {
    /// Current frame constants.
    pub constants: FrameConstants,
    /// Mega-buffer views; `None` before any geometry was loaded.
    pub geometry: Option<GeometryViews>,
    /// Indexed draws extracted from the scene.
    pub draws: &'a [DrawItem],
    /// Meshlet draws for the mesh-shader path.
    pub meshlet_draws: &'a [MeshletDraw],
    /// Render targets.
    pub targets: PassTargets<'a>,
    /// Light and cluster buffers, shared by culling and shading.
    pub lights: &'a LightBuffers,
    /// Material lookup with fallback.
    pub materials: &'a MaterialTable,
}

/// Identifies a pass variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderPassKind {
    /// Camera depth prepass.
    DepthOnly,
    /// Shadow map from the sun's point of view.
    Shadow,
    /// Cube-mapped sky.
    Skybox,
    /// Cluster light culling compute pass.
    LightCull,
    /// Lit indexed draws.
    LitForward,
    /// Resolve, bloom and tone mapping.
    PostProcess,
    /// Lit meshlet dispatches.
    MeshShader,
}

/// The closed set of render passes.
#[derive(Debug)]
pub enum RenderPass {
    /// Depth-only geometry, camera or shadow.
    DepthOnly(DepthOnlyPass),
    /// Sky behind all geometry.
    Skybox(SkyboxPass),
    /// Light culling into the cluster grid.
    LightCull(LightCullPass),
    /// Lit indexed geometry.
    LitForward(LitForwardPass),
    /// Full-screen post-processing.
    PostProcess(PostProcessPass),
    /// Lit meshlet geometry.
    MeshShader(MeshShaderPass),
}

impl RenderPass {
    /// Which variant this is.
    pub fn kind(&self) -> RenderPassKind {
        match self {
            RenderPass::DepthOnly(pass) => match pass.view() {
                DepthOnlyView::Camera => RenderPassKind::DepthOnly,
                DepthOnlyView::Shadow => RenderPassKind::Shadow,
            },
            RenderPass::Skybox(_) => RenderPassKind::Skybox,
            RenderPass::LightCull(_) => RenderPassKind::LightCull,
            RenderPass::LitForward(_) => RenderPassKind::LitForward,
            RenderPass::PostProcess(_) => RenderPassKind::PostProcess,
            RenderPass::MeshShader(_) => RenderPassKind::MeshShader,
        }
    }

    /// Human-readable name, used for debug markers.
    pub fn name(&self) -> &'static str {
        match self.kind() {
            RenderPassKind::DepthOnly => "Depth Prepass",
            RenderPassKind::Shadow => "Shadow Pass",
            RenderPassKind::Skybox => "Skybox Pass",
            RenderPassKind::LightCull => "Light Cull Pass",
            RenderPassKind::LitForward => "Lit Forward Pass",
            RenderPassKind::PostProcess => "Post Process Pass",
            RenderPassKind::MeshShader => "Mesh Shader Pass",
        }
    }

    /// The pipeline bound first by [`RenderPass::set_render_pass_states`].
    pub fn pipeline(&self) -> Option<PassPipeline> {
        match self {
            RenderPass::DepthOnly(pass) => Some(pass.pipeline()),
            RenderPass::Skybox(pass) => Some(pass.pipeline()),
            RenderPass::LightCull(pass) => Some(pass.pipeline()),
            RenderPass::LitForward(pass) => Some(pass.pipeline()),
            RenderPass::PostProcess(pass) => pass.first_pipeline(),
            RenderPass::MeshShader(pass) => Some(pass.pipeline()),
        }
    }

    /// Binds the pass's root signature and pipeline state.
    pub fn set_render_pass_states(&self, list: &mut CommandList) {
        if let Some(pipeline) = self.pipeline() {
            pipeline.bind(list);
        }
    }

    /// Records the pass into `list`, transitioning resources through `states`.
    pub fn render(
        &self,
        list: &mut CommandList,
        states: &mut ResourceStateTable,
        frame: &PassFrame<'_>,
    ) -> Result<(), RenderError> {
        log::trace!("Recording {}", self.name());
        list.begin_event(self.name());
        let result = match self {
            RenderPass::DepthOnly(pass) => pass.render(list, states, frame),
            RenderPass::Skybox(pass) => pass.render(list, states, frame),
            RenderPass::LightCull(pass) => pass.render(list, states, frame),
            RenderPass::LitForward(pass) => pass.render(list, states, frame),
            RenderPass::PostProcess(pass) => pass.render(list, states, frame),
            RenderPass::MeshShader(pass) => pass.render(list, states, frame),
        };
        list.end_event();
        result
    }
}

pub(crate) fn wgsl_module(
    device: &dyn GraphicsDevice,
    label: &str,
    source: &'static str,
) -> Result<ShaderModuleId, ResourceError> {
    device.create_shader_module(&ShaderModuleDescriptor {
        label: Some(Cow::Borrowed(label)),
        source: ShaderSource::Wgsl(Cow::Borrowed(source)),
    })
}

/// Moves sampled textures into `state` with one batched barrier.
///
/// Textures are uploaded outside the frame, so one the table has not seen yet
/// is registered in its creation state first. Repeated ids are transitioned once.
pub(crate) fn require_textures(
    list: &mut CommandList,
    states: &mut ResourceStateTable,
    textures: impl IntoIterator<Item = TextureId>,
    state: ResourceState,
) -> Result<(), ResourceError> {
    let mut seen = HashSet::new();
    let unique: Vec<TextureId> = textures.into_iter().filter(|id| seen.insert(*id)).collect();
    for &texture in &unique {
        if states.state(texture).is_none() {
            states.register(texture, ResourceState::CopyDest);
        }
    }
    let mut transaction = states.transaction();
    for texture in unique {
        transaction.require(texture, state)?;
    }
    transaction.commit(list)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pyre_core::renderer::api::{Command, TextureFormat};
    use test_support::Fixture;

    #[test]
    fn test_render_wraps_pass_in_debug_region() {
        let fixture = Fixture::new(1);
        let pass = RenderPass::DepthOnly(
            DepthOnlyPass::new(&fixture.device, DepthOnlyView::Shadow, TextureFormat::Depth32Float, 1).unwrap(),
        );
        assert_eq!(pass.kind(), RenderPassKind::Shadow);
        let mut list = fixture.list();

        pass.render(&mut list, &mut fixture.states(), &fixture.frame(&[])).unwrap();

        let commands = list.commands();
        assert_eq!(commands.first(), Some(&Command::BeginEvent("Shadow Pass".to_string())));
        assert_eq!(commands.last(), Some(&Command::EndEvent));
    }

    #[test]
    fn test_set_render_pass_states_binds_compute_signature() {
        let fixture = Fixture::new(1);
        let pass = RenderPass::LightCull(LightCullPass::new(&fixture.device).unwrap());
        let pipeline = pass.pipeline().unwrap();
        let mut list = fixture.list();

        pass.set_render_pass_states(&mut list);

        assert_eq!(
            list.commands(),
            &[
                Command::SetRootSignature {
                    bind_point: BindPoint::Compute,
                    root_signature: pipeline.root_signature,
                },
                Command::SetPipelineState(pipeline.pipeline),
            ]
        );
    }

    #[test]
    fn test_failed_pass_still_closes_debug_region() {
        let fixture = Fixture::new(1);
        let pass = RenderPass::PostProcess(
            PostProcessPass::new(
                &fixture.device,
                test_support::HDR,
                test_support::BACK_BUFFER,
                true,
                Default::default(),
            )
            .unwrap(),
        );
        let mut frame = fixture.frame(&[]);
        frame.targets.bloom = None;
        let mut list = fixture.list();

        assert!(pass.render(&mut list, &mut fixture.states(), &frame).is_err());
        assert_eq!(list.commands().last(), Some(&Command::EndEvent));
    }
}
