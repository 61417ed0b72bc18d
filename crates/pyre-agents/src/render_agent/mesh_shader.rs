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

//! The mesh-shader renderer.

use super::context::RendererContext;
use super::driver::{ColorTechnique, FrameDriver};
use super::frame::{FrameStats, FrameView, GuiHook};
use super::targets::DEPTH_FORMAT;
use pyre_core::renderer::api::{BufferId, Vertex};
use pyre_core::renderer::{ObjectData, RenderError};
use pyre_core::scene::{SceneView, TextureData};
use pyre_lanes::{MeshShaderPass, MeshletDraw, PassPipeline, RenderPass};
use std::sync::Arc;

/// The frame graph of [`ClusterForwardRenderer`](super::ClusterForwardRenderer)
/// with the color stage drawing meshlets through task/mesh shaders.
///
/// Only meshes whose meshlets were uploaded with
/// [`RendererContext::upload_meshlets`] are drawn. A mesh's meshlets cover all of
/// its triangles and use the material of its first sub-mesh.
#[derive(Debug)]
pub struct MeshShaderRenderer {
    driver: FrameDriver,
    vertex_buffer: BufferId,
}

impl MeshShaderRenderer {
    /// Builds every pass against the formats of `context`.
    ///
    /// # Errors
    ///
    /// `PipelineError::FeatureNotSupported` when the device has no mesh shaders.
    pub fn new(context: Arc<RendererContext>) -> Result<Self, RenderError> {
        let pass = RenderPass::MeshShader(MeshShaderPass::new(
            context.device().as_ref(),
            context.scene_format(),
            DEPTH_FORMAT,
            context.config().msaa_samples,
        )?);
        let vertex_buffer = context.geometry().vertices().buffer().buffer();
        let driver = FrameDriver::new(Arc::clone(&context), ColorTechnique::MeshShader { pass })?;
        log::info!("Mesh shader renderer ready");
        Ok(Self { driver, vertex_buffer })
    }

    /// Adds a sky built from six cube faces (+X, -X, +Y, -Y, +Z, -Z).
    pub fn with_skybox(mut self, faces: &[TextureData; 6]) -> Result<Self, RenderError> {
        self.driver.set_skybox(faces)?;
        Ok(self)
    }

    /// Renders and presents one frame of `scene`.
    pub fn render_frame(
        &mut self,
        scene: &dyn SceneView,
        view: &FrameView,
        gui: Option<&mut dyn GuiHook>,
    ) -> Result<FrameStats, RenderError> {
        let draws = self.meshlet_draws(scene);
        self.driver.render_frame(scene, view, &draws, gui)
    }

    fn meshlet_draws(&self, scene: &dyn SceneView) -> Vec<MeshletDraw> {
        let mut draws = Vec::new();
        if !scene.is_ready() {
            return draws;
        }
        let meshlets = self.driver.context().meshlets();
        scene.for_each_drawable(&mut |drawable| {
            let Some(buffers) = meshlets.get(&drawable.mesh.base_vertex) else {
                return;
            };
            draws.push(MeshletDraw {
                object: ObjectData::new(drawable.model, drawable.base_color),
                vertex_buffer: self.vertex_buffer,
                vertex_offset: u64::from(drawable.mesh.base_vertex) * u64::from(Vertex::STRIDE),
                meshlets: buffers.table(),
                meshlet_count: buffers.meshlet_count(),
                material: drawable
                    .mesh
                    .submeshes
                    .first()
                    .and_then(|submesh| drawable.material_for(submesh))
                    .map(str::to_string),
            });
        });
        draws
    }

    /// The pipeline of the mesh-shader pass.
    pub fn mesh_pipeline(&self) -> Option<PassPipeline> {
        match self.driver.color() {
            ColorTechnique::MeshShader { pass } => pass.pipeline(),
            ColorTechnique::ClusterForward { .. } => None,
        }
    }

    /// Logical index of the next frame.
    pub fn frame_index(&self) -> u64 {
        self.driver.ring().frame()
    }

    /// The shared context.
    pub fn context(&self) -> &Arc<RendererContext> {
        self.driver.context()
    }
}
