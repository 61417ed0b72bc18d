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

use super::shaders::LIT_FORWARD_WGSL;
use super::{require_textures, wgsl_module, PassFrame, PassPipeline};
use pyre_core::renderer::api::{
    BindPoint, BindingShape, BlendMode, ColorTargetState, CompareFunction, CullMode,
    DepthStencilState, DescriptorRange, GraphicsPipelineDescriptor, PrimitiveTopology,
    ResourceState, RootParameter, RootSignatureDescriptor, ShaderStageDescriptor,
    ShaderVisibility, StaticSampler, TextureFormat, Vertex,
};
use pyre_core::renderer::{
    CommandList, DepthView, GraphicsDevice, ObjectData, RenderError, ResourceError,
    ResourceStateTable,
};
use std::borrow::Cow;

const FRAME_SLOT: u32 = 0;
const LIGHT_TABLE_SLOT: u32 = 1;
const OBJECT_SLOT: u32 = 2;
const MATERIAL_SLOT: u32 = 3;
const SHADOW_SLOT: u32 = 4;
const NORMAL_SLOT: u32 = 5;

/// Clustered forward shading of every draw item.
///
/// Depth comes from the prepass, so the pass tests with `LessEqual` and never
/// writes depth. Each draw binds its material, or the default one when the
/// material is missing.
#[derive(Debug)]
pub struct LitForwardPass {
    pipeline: PassPipeline,
}

impl LitForwardPass {
    /// Builds the lit root signature and pipeline for the scene color target.
    pub fn new(
        device: &dyn GraphicsDevice,
        color_format: TextureFormat,
        depth_format: TextureFormat,
        sample_count: u32,
    ) -> Result<Self, ResourceError> {
        let root_signature = device.create_root_signature(&RootSignatureDescriptor {
            label: Some(Cow::Borrowed("Lit Forward Root Signature")),
            parameters: vec![
                RootParameter::ConstantBuffer {
                    visibility: ShaderVisibility::ALL_GRAPHICS,
                },
                RootParameter::DescriptorTable {
                    visibility: ShaderVisibility::PIXEL,
                    ranges: vec![
                        DescriptorRange::new(BindingShape::ReadOnlyBuffer, 1),
                        DescriptorRange::new(BindingShape::ReadWriteBuffer, 1),
                    ],
                },
                RootParameter::Constants {
                    visibility: ShaderVisibility::ALL_GRAPHICS,
                    num_values: ObjectData::NUM_VALUES,
                },
                RootParameter::DescriptorTable {
                    visibility: ShaderVisibility::PIXEL,
                    ranges: vec![DescriptorRange::new(BindingShape::Texture { cube: false }, 2)],
                },
                RootParameter::DescriptorTable {
                    visibility: ShaderVisibility::PIXEL,
                    ranges: vec![DescriptorRange::new(BindingShape::DepthTexture, 1)],
                },
                RootParameter::DescriptorTable {
                    visibility: ShaderVisibility::PIXEL,
                    ranges: vec![DescriptorRange::new(BindingShape::Texture { cube: false }, 1)],
                },
            ],
            static_samplers: vec![StaticSampler::LINEAR_WRAP, StaticSampler::SHADOW],
        })?;
        let module = wgsl_module(device, "Lit Forward", LIT_FORWARD_WGSL)?;
        let pipeline = device.create_graphics_pipeline(&GraphicsPipelineDescriptor {
            label: Some(Cow::Borrowed("Lit Forward")),
            root_signature,
            vertex: ShaderStageDescriptor {
                module,
                entry_point: Cow::Borrowed("vs_main"),
            },
            pixel: Some(ShaderStageDescriptor {
                module,
                entry_point: Cow::Borrowed("fs_main"),
            }),
            input_layout: Some(Vertex::input_layout()),
            topology: PrimitiveTopology::TriangleList,
            cull_mode: CullMode::Back,
            color_targets: vec![ColorTargetState {
                format: color_format,
                blend: BlendMode::Opaque,
            }],
            depth_stencil: Some(DepthStencilState {
                depth_write: false,
                depth_compare: CompareFunction::LessEqual,
                ..DepthStencilState::read_write(depth_format)
            }),
            sample_count,
        })?;
        log::debug!("Created lit forward pipeline ({color_format:?}, {sample_count}x)");

        Ok(Self {
            pipeline: PassPipeline {
                root_signature,
                pipeline,
                bind_point: BindPoint::Graphics,
            },
        })
    }

    /// The lit pipeline.
    pub fn pipeline(&self) -> PassPipeline {
        self.pipeline
    }

    /// Shades every draw item into the scene color target.
    pub fn render(
        &self,
        list: &mut CommandList,
        states: &mut ResourceStateTable,
        frame: &PassFrame<'_>,
    ) -> Result<(), RenderError> {
        let Some(geometry) = frame.geometry else {
            return Ok(());
        };
        let targets = frame.targets;
        let bindings: Vec<_> = frame
            .draws
            .iter()
            .map(|item| frame.materials.resolve(item.material.as_deref()))
            .collect();

        require_textures(
            list,
            states,
            bindings.iter().flat_map(|binding| binding.textures),
            ResourceState::PixelShaderResource,
        )?;
        frame.lights.require_shading(list, states)?;
        let mut transaction = states.transaction();
        transaction
            .require(targets.scene_color.texture(), ResourceState::RenderTarget)?
            .require(targets.depth.texture(), ResourceState::DepthRead)?
            .require(targets.shadow.texture(), ResourceState::PixelShaderResource)?;
        transaction.commit(list)?;

        list.set_render_targets(
            &[targets.scene_color.rtv()],
            Some(targets.depth.dsv(DepthView::DepthReadOnly)),
        );
        list.set_viewport_and_scissor(targets.scene_color.width(), targets.scene_color.height());
        self.pipeline.bind(list);
        list.set_graphics_root_constant_buffer(FRAME_SLOT, frame.constants.buffer, frame.constants.offset);
        list.set_graphics_root_descriptor_table(LIGHT_TABLE_SLOT, frame.lights.table());
        list.set_graphics_root_descriptor_table(SHADOW_SLOT, targets.shadow.depth_srv());
        geometry.bind(list);

        for (item, binding) in frame.draws.iter().zip(&bindings) {
            list.set_graphics_root_constants(OBJECT_SLOT, item.object.as_values(), 0);
            list.set_graphics_root_descriptor_table(MATERIAL_SLOT, binding.table);
            list.set_graphics_root_descriptor_table(NORMAL_SLOT, binding.normal);
            item.draw(list);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render_lane::test_support::{Fixture, HDR};
    use pyre_core::renderer::api::{Command, RootBinding};
    use pyre_core::scene::TextureData;

    fn pass(fixture: &Fixture, samples: u32) -> LitForwardPass {
        LitForwardPass::new(&fixture.device, HDR, TextureFormat::Depth32Float, samples).unwrap()
    }

    fn material_tables(list: &CommandList) -> Vec<u32> {
        list.commands()
            .iter()
            .filter_map(|c| match c {
                Command::SetRootParameter {
                    slot: MATERIAL_SLOT,
                    binding: RootBinding::DescriptorTable(handle),
                    ..
                } => Some(handle.index),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_one_draw_per_item() {
        let fixture = Fixture::new(4);
        let draws = fixture.draws(5);
        let mut list = fixture.list();

        pass(&fixture, 4).render(&mut list, &mut fixture.states(), &fixture.frame(&draws)).unwrap();

        assert_eq!(list.stats().draw_calls, 5);
        assert_eq!(list.stats().triangles, 5);
    }

    #[test]
    fn test_missing_material_binds_default() {
        let mut fixture = Fixture::new(1);
        fixture
            .materials
            .request_load(
                &fixture.device,
                &mut fixture.heaps,
                &fixture.uploader,
                "material-1",
                TextureData::solid(2, 2, [10, 20, 30, 255]),
            )
            .unwrap();
        let draws = fixture.draws(3);
        let mut list = fixture.list();

        pass(&fixture, 1).render(&mut list, &mut fixture.states(), &fixture.frame(&draws)).unwrap();

        let default = fixture.materials.default_binding().table.index;
        let loaded = fixture.materials.resolve(Some("material-1")).table.index;
        assert_eq!(material_tables(&list), vec![default, loaded, default]);
        assert_eq!(list.stats().draw_calls, 3);
    }

    #[test]
    fn test_shared_textures_transition_once() {
        let fixture = Fixture::new(1);
        let draws = fixture.draws(4);
        let mut list = fixture.list();
        let mut states = fixture.states();

        pass(&fixture, 1).render(&mut list, &mut states, &fixture.frame(&draws)).unwrap();

        let defaults = fixture.materials.default_binding().textures;
        for texture in defaults {
            assert_eq!(states.state(texture), Some(ResourceState::PixelShaderResource));
        }
        assert_eq!(states.state(fixture.shadow.texture()), Some(ResourceState::PixelShaderResource));
        assert_eq!(states.state(fixture.depth.texture()), Some(ResourceState::DepthRead));
    }
}
