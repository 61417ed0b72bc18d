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

use super::shaders::DEPTH_ONLY_WGSL;
use super::{wgsl_module, PassFrame, PassPipeline};
use pyre_core::renderer::api::{
    BindPoint, CullMode, DepthStencilState, GraphicsPipelineDescriptor, PrimitiveTopology,
    ResourceState, RootParameter, RootSignatureDescriptor, ShaderStageDescriptor,
    ShaderVisibility, TextureFormat, Vertex,
};
use pyre_core::renderer::{
    CommandList, DepthView, GraphicsDevice, ObjectData, RenderError, ResourceError,
    ResourceStateTable,
};
use std::borrow::Cow;

const FRAME_SLOT: u32 = 0;
const OBJECT_SLOT: u32 = 1;

/// Which depth target a [`DepthOnlyPass`] fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DepthOnlyView {
    /// The scene depth, seen from the camera.
    Camera,
    /// The shadow map, seen from the sun.
    Shadow,
}

/// Draws scene geometry into a depth target with no color output.
#[derive(Debug)]
pub struct DepthOnlyPass {
    view: DepthOnlyView,
    pipeline: PassPipeline,
}

impl DepthOnlyPass {
    /// Builds the root signature and depth-only pipeline for `view`.
    ///
    /// `sample_count` must match the target; the shadow map is always single-sampled.
    pub fn new(
        device: &dyn GraphicsDevice,
        view: DepthOnlyView,
        depth_format: TextureFormat,
        sample_count: u32,
    ) -> Result<Self, ResourceError> {
        let (label, entry_point, depth_stencil, sample_count) = match view {
            DepthOnlyView::Camera => (
                "Depth Prepass",
                "vs_depth",
                DepthStencilState::read_write(depth_format),
                sample_count,
            ),
            DepthOnlyView::Shadow => (
                "Shadow Pass",
                "vs_shadow",
                DepthStencilState {
                    depth_bias: 2,
                    slope_scaled_depth_bias: 2.0,
                    ..DepthStencilState::read_write(depth_format)
                },
                1,
            ),
        };

        let root_signature = device.create_root_signature(&RootSignatureDescriptor {
            label: Some(Cow::Owned(format!("{label} Root Signature"))),
            parameters: vec![
                RootParameter::ConstantBuffer {
                    visibility: ShaderVisibility::VERTEX,
                },
                RootParameter::Constants {
                    visibility: ShaderVisibility::VERTEX,
                    num_values: ObjectData::NUM_VALUES,
                },
            ],
            static_samplers: Vec::new(),
        })?;
        let module = wgsl_module(device, label, DEPTH_ONLY_WGSL)?;
        let pipeline = device.create_graphics_pipeline(&GraphicsPipelineDescriptor {
            label: Some(Cow::Borrowed(label)),
            root_signature,
            vertex: ShaderStageDescriptor {
                module,
                entry_point: Cow::Borrowed(entry_point),
            },
            pixel: None,
            input_layout: Some(Vertex::input_layout()),
            topology: PrimitiveTopology::TriangleList,
            cull_mode: CullMode::Back,
            color_targets: Vec::new(),
            depth_stencil: Some(depth_stencil),
            sample_count,
        })?;
        log::debug!("Created {label} pipeline ({sample_count}x)");

        Ok(Self {
            view,
            pipeline: PassPipeline {
                root_signature,
                pipeline,
                bind_point: BindPoint::Graphics,
            },
        })
    }

    /// Camera or shadow.
    pub fn view(&self) -> DepthOnlyView {
        self.view
    }

    /// The depth-only pipeline.
    pub fn pipeline(&self) -> PassPipeline {
        self.pipeline
    }

    /// Clears the target and draws every item into it.
    pub fn render(
        &self,
        list: &mut CommandList,
        states: &mut ResourceStateTable,
        frame: &PassFrame<'_>,
    ) -> Result<(), RenderError> {
        let target = match self.view {
            DepthOnlyView::Camera => frame.targets.depth,
            DepthOnlyView::Shadow => frame.targets.shadow,
        };
        states.transition(list, target.texture(), ResourceState::DepthWrite)?;

        let dsv = target.dsv(DepthView::ReadWrite);
        list.set_render_targets(&[], Some(dsv));
        list.clear_depth_stencil(dsv, Some(target.clear_depth()), None);
        list.set_viewport_and_scissor(target.width(), target.height());

        let Some(geometry) = frame.geometry else {
            return Ok(());
        };
        self.pipeline.bind(list);
        list.set_graphics_root_constant_buffer(FRAME_SLOT, frame.constants.buffer, frame.constants.offset);
        geometry.bind(list);
        for item in frame.draws {
            list.set_graphics_root_constants(OBJECT_SLOT, item.object.as_values(), 0);
            item.draw(list);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render_lane::test_support::Fixture;
    use pyre_core::renderer::api::Command;

    #[test]
    fn test_prepass_clears_and_draws_every_item() {
        let fixture = Fixture::new(1);
        let pass = DepthOnlyPass::new(&fixture.device, DepthOnlyView::Camera, TextureFormat::Depth32Float, 1).unwrap();
        let draws = fixture.draws(3);
        let mut list = fixture.list();
        let mut states = fixture.states();

        pass.render(&mut list, &mut states, &fixture.frame(&draws)).unwrap();

        let stats = list.stats();
        assert_eq!(stats.draw_calls, 3);
        assert!(list.commands().iter().any(|c| matches!(
            c,
            Command::ClearDepthStencil { depth: Some(d), stencil: None, .. } if *d == 1.0
        )));
        assert_eq!(states.state(fixture.depth.texture()), Some(ResourceState::DepthWrite));
    }

    #[test]
    fn test_shadow_targets_shadow_map() {
        let fixture = Fixture::new(4);
        let pass = DepthOnlyPass::new(&fixture.device, DepthOnlyView::Shadow, TextureFormat::Depth32Float, 4).unwrap();
        assert_eq!(pass.view(), DepthOnlyView::Shadow);
        let draws = fixture.draws(1);
        let mut list = fixture.list();
        let mut states = fixture.states();
        states.register(fixture.shadow.texture(), ResourceState::PixelShaderResource);

        pass.render(&mut list, &mut states, &fixture.frame(&draws)).unwrap();

        let shadow_dsv = fixture.shadow.dsv(DepthView::ReadWrite);
        assert!(list.commands().iter().any(|c| matches!(
            c,
            Command::SetRenderTargets { colors, depth: Some(d) } if colors.is_empty() && *d == shadow_dsv
        )));
        assert_eq!(states.state(fixture.shadow.texture()), Some(ResourceState::DepthWrite));
    }

    #[test]
    fn test_no_geometry_draws_nothing() {
        let fixture = Fixture::new(1);
        let pass = DepthOnlyPass::new(&fixture.device, DepthOnlyView::Camera, TextureFormat::Depth32Float, 1).unwrap();
        let draws = fixture.draws(2);
        let mut frame = fixture.frame(&draws);
        frame.geometry = None;
        let mut list = fixture.list();

        pass.render(&mut list, &mut fixture.states(), &frame).unwrap();
        assert_eq!(list.stats().draw_calls, 0);
    }
}
