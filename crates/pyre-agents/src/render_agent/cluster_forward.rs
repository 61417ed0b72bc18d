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

//! The clustered forward renderer.

use super::context::RendererContext;
use super::driver::{ColorTechnique, FrameDriver};
use super::frame::{FrameStats, FrameView, GuiHook};
use super::targets::DEPTH_FORMAT;
use pyre_core::renderer::RenderError;
use pyre_core::scene::{SceneView, TextureData};
use pyre_lanes::{LightCullPass, LitForwardPass, PassPipeline, RenderPass};
use std::sync::Arc;

/// Depth prepass, shadow map, sky, compute light culling into the cluster grid,
/// lit indexed draws, post-processing, GUI, present.
#[derive(Debug)]
pub struct ClusterForwardRenderer {
    driver: FrameDriver,
}

impl ClusterForwardRenderer {
    /// Builds every pass against the formats of `context`.
    pub fn new(context: Arc<RendererContext>) -> Result<Self, RenderError> {
        let device = context.device().as_ref();
        let light_cull = RenderPass::LightCull(LightCullPass::new(device)?);
        let lit = RenderPass::LitForward(LitForwardPass::new(
            device,
            context.scene_format(),
            DEPTH_FORMAT,
            context.config().msaa_samples,
        )?);
        let driver = FrameDriver::new(Arc::clone(&context), ColorTechnique::ClusterForward { light_cull, lit })?;
        log::info!("Cluster forward renderer ready");
        Ok(Self { driver })
    }

    /// Adds a sky built from six cube faces (+X, -X, +Y, -Y, +Z, -Z).
    pub fn with_skybox(mut self, faces: &[TextureData; 6]) -> Result<Self, RenderError> {
        self.driver.set_skybox(faces)?;
        Ok(self)
    }

    /// Renders and presents one frame of `scene`.
    ///
    /// Nothing is drawn while the scene is not ready; the frame is still cleared,
    /// submitted and presented.
    pub fn render_frame(
        &mut self,
        scene: &dyn SceneView,
        view: &FrameView,
        gui: Option<&mut dyn GuiHook>,
    ) -> Result<FrameStats, RenderError> {
        self.driver.render_frame(scene, view, &[], gui)
    }

    /// The pipeline of the lit geometry pass.
    pub fn lit_pipeline(&self) -> Option<PassPipeline> {
        match self.driver.color() {
            ColorTechnique::ClusterForward { lit, .. } => lit.pipeline(),
            ColorTechnique::MeshShader { .. } => None,
        }
    }

    /// The pipeline of the light-cull compute pass.
    pub fn light_cull_pipeline(&self) -> Option<PassPipeline> {
        match self.driver.color() {
            ColorTechnique::ClusterForward { light_cull, .. } => light_cull.pipeline(),
            ColorTechnique::MeshShader { .. } => None,
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
