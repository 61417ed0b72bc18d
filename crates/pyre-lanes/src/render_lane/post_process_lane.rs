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

use super::shaders::POST_PROCESS_WGSL;
use super::{wgsl_module, PassFrame, PassPipeline};
use pyre_core::config::BloomConfig;
use pyre_core::renderer::api::{
    BindPoint, BindingShape, BlendMode, ColorTargetState, CullMode, DescriptorRange,
    GraphicsPipelineDescriptor, PipelineStateId, PrimitiveTopology, ResourceState,
    RootParameter, RootSignatureDescriptor, RootSignatureId, ShaderModuleId,
    ShaderStageDescriptor, ShaderVisibility, StaticSampler, TextureFormat,
};
use pyre_core::renderer::{
    ColorBuffer, CommandList, GraphicsDevice, RenderError, ResourceError, ResourceStateTable,
};
use std::borrow::Cow;

const PARAMS_SLOT: u32 = 0;
const SOURCE_SLOT: u32 = 1;
const PARAM_COUNT: u32 = 4;

#[derive(Debug, Clone, Copy)]
struct ToneMapStages {
    extract: PipelineStateId,
    blur_horizontal: PipelineStateId,
    blur_vertical: PipelineStateId,
    combine: PipelineStateId,
    tone_map: PipelineStateId,
}

/// MSAA resolve, bloom and tone mapping into the back buffer.
///
/// Without tone mapping the scene is drawn in the back-buffer format and the
/// pass only resolves it, or does nothing when the scene color already is the
/// back buffer.
#[derive(Debug)]
pub struct PostProcessPass {
    root_signature: RootSignatureId,
    stages: Option<ToneMapStages>,
    bloom: BloomConfig,
}

fn fullscreen_pipeline(
    device: &dyn GraphicsDevice,
    root_signature: RootSignatureId,
    module: ShaderModuleId,
    entry_point: &'static str,
    format: TextureFormat,
    blend: BlendMode,
) -> Result<PipelineStateId, ResourceError> {
    device.create_graphics_pipeline(&GraphicsPipelineDescriptor {
        label: Some(Cow::Borrowed(entry_point)),
        root_signature,
        vertex: ShaderStageDescriptor {
            module,
            entry_point: Cow::Borrowed("vs_fullscreen"),
        },
        pixel: Some(ShaderStageDescriptor {
            module,
            entry_point: Cow::Borrowed(entry_point),
        }),
        input_layout: None,
        topology: PrimitiveTopology::TriangleList,
        cull_mode: CullMode::None,
        color_targets: vec![ColorTargetState { format, blend }],
        depth_stencil: None,
        sample_count: 1,
    })
}

impl PostProcessPass {
    /// Builds the shared root signature and, when `tone_mapping` is set, the five
    /// full-screen stage pipelines.
    pub fn new(
        device: &dyn GraphicsDevice,
        hdr_format: TextureFormat,
        back_buffer_format: TextureFormat,
        tone_mapping: bool,
        bloom: BloomConfig,
    ) -> Result<Self, ResourceError> {
        let root_signature = device.create_root_signature(&RootSignatureDescriptor {
            label: Some(Cow::Borrowed("Post Process Root Signature")),
            parameters: vec![
                RootParameter::Constants {
                    visibility: ShaderVisibility::PIXEL,
                    num_values: PARAM_COUNT,
                },
                RootParameter::DescriptorTable {
                    visibility: ShaderVisibility::PIXEL,
                    ranges: vec![DescriptorRange::new(BindingShape::Texture { cube: false }, 1)],
                },
            ],
            static_samplers: vec![StaticSampler::LINEAR_CLAMP],
        })?;

        let stages = if tone_mapping {
            let module = wgsl_module(device, "Post Process", POST_PROCESS_WGSL)?;
            let stage = |entry, format, blend| {
                fullscreen_pipeline(device, root_signature, module, entry, format, blend)
            };
            let stages = ToneMapStages {
                extract: stage("fs_bloom_extract", hdr_format, BlendMode::Opaque)?,
                blur_horizontal: stage("fs_blur_horizontal", hdr_format, BlendMode::Opaque)?,
                blur_vertical: stage("fs_blur_vertical", hdr_format, BlendMode::Opaque)?,
                combine: stage("fs_combine", hdr_format, BlendMode::Additive)?,
                tone_map: stage("fs_tone_map", back_buffer_format, BlendMode::Opaque)?,
            };
            log::debug!("Created post-process chain ({hdr_format:?} -> {back_buffer_format:?})");
            Some(stages)
        } else {
            None
        };

        Ok(Self {
            root_signature,
            stages,
            bloom,
        })
    }

    /// Whether the bloom and tone-mapping chain runs.
    pub fn tone_mapping(&self) -> bool {
        self.stages.is_some()
    }

    /// The first stage pipeline, if the chain runs.
    pub fn first_pipeline(&self) -> Option<PassPipeline> {
        self.stages.map(|stages| PassPipeline {
            root_signature: self.root_signature,
            pipeline: stages.extract,
            bind_point: BindPoint::Graphics,
        })
    }

    /// Resolves the scene, then runs the chain when enabled.
    pub fn render(
        &self,
        list: &mut CommandList,
        states: &mut ResourceStateTable,
        frame: &PassFrame<'_>,
    ) -> Result<(), RenderError> {
        let targets = frame.targets;
        let scene = targets.scene_color;

        let source = if scene.sample_count() > 1 {
            let destination = match (self.stages.is_some(), targets.resolved) {
                (true, Some(resolved)) => resolved,
                (true, None) => {
                    return Err(ResourceError::ContextNotReady("resolve target".to_string()).into())
                }
                (false, _) => targets.back_buffer,
            };
            let mut transaction = states.transaction();
            transaction
                .require(scene.texture(), ResourceState::ResolveSource)?
                .require(destination.texture(), ResourceState::ResolveDest)?;
            transaction.commit(list)?;
            list.resolve_subresource(destination.texture(), scene.texture(), destination.format());
            destination
        } else {
            scene
        };

        let Some(stages) = self.stages else {
            return Ok(());
        };
        let [extract, blur_h, blur_v] = targets
            .bloom
            .ok_or_else(|| ResourceError::ContextNotReady("bloom targets".to_string()))?;

        list.set_graphics_root_signature(self.root_signature);
        let chain = [
            (stages.extract, source, extract),
            (stages.blur_horizontal, extract, blur_h),
            (stages.blur_vertical, blur_h, blur_v),
            (stages.combine, blur_v, source),
            (stages.tone_map, source, targets.back_buffer),
        ];
        for (pipeline, input, output) in chain {
            self.fullscreen(list, states, pipeline, input, output)?;
        }
        Ok(())
    }

    fn fullscreen(
        &self,
        list: &mut CommandList,
        states: &mut ResourceStateTable,
        pipeline: PipelineStateId,
        input: &ColorBuffer,
        output: &ColorBuffer,
    ) -> Result<(), RenderError> {
        let srv = input.srv().ok_or(ResourceError::InvalidHandle)?;
        let mut transaction = states.transaction();
        transaction
            .require(input.texture(), ResourceState::PixelShaderResource)?
            .require(output.texture(), ResourceState::RenderTarget)?;
        transaction.commit(list)?;

        let params = [
            self.bloom.threshold,
            self.bloom.intensity,
            1.0 / input.width() as f32,
            1.0 / input.height() as f32,
        ]
        .map(f32::to_bits);
        list.set_render_targets(&[output.rtv()], None);
        list.set_viewport_and_scissor(output.width(), output.height());
        list.set_pipeline_state(pipeline);
        list.set_graphics_root_constants(PARAMS_SLOT, &params, 0);
        list.set_graphics_root_descriptor_table(SOURCE_SLOT, srv);
        list.draw_instanced(3, 1, 0, 0);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render_lane::test_support::{Fixture, BACK_BUFFER, HDR, HEIGHT, WIDTH};
    use approx::assert_relative_eq;
    use pyre_core::renderer::api::{Command, RootBinding, TextureId};

    fn pass(fixture: &Fixture, tone_mapping: bool) -> PostProcessPass {
        PostProcessPass::new(&fixture.device, HDR, BACK_BUFFER, tone_mapping, BloomConfig::default()).unwrap()
    }

    fn resolves(list: &CommandList) -> Vec<(TextureId, TextureId)> {
        list.commands()
            .iter()
            .filter_map(|c| match c {
                Command::ResolveSubresource { dst, src, .. } => Some((*dst, *src)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_msaa_chain_resolves_then_runs_five_stages() {
        let fixture = Fixture::new(4);
        let post = pass(&fixture, true);
        let mut list = fixture.list();
        let mut states = fixture.states();

        post.render(&mut list, &mut states, &fixture.frame(&[])).unwrap();

        let resolved = fixture.resolved.as_ref().unwrap();
        assert_eq!(resolves(&list), vec![(resolved.texture(), fixture.scene_color.texture())]);
        assert_eq!(list.stats().draw_calls, 5);
        assert_eq!(states.state(fixture.back_buffer.texture()), Some(ResourceState::RenderTarget));
        // Combine wrote the bloom back onto the resolved scene, which tone mapping then read.
        assert_eq!(states.state(resolved.texture()), Some(ResourceState::PixelShaderResource));
    }

    #[test]
    fn test_single_sample_chain_reads_scene_directly() {
        let fixture = Fixture::new(1);
        let post = pass(&fixture, true);
        let mut list = fixture.list();

        post.render(&mut list, &mut fixture.states(), &fixture.frame(&[])).unwrap();

        assert!(resolves(&list).is_empty());
        assert_eq!(list.stats().draw_calls, 5);
        assert!(post.first_pipeline().is_some());
    }

    #[test]
    fn test_without_tone_mapping_msaa_resolves_into_back_buffer() {
        let fixture = Fixture::new(4);
        let post = pass(&fixture, false);
        let mut list = fixture.list();

        post.render(&mut list, &mut fixture.states(), &fixture.frame(&[])).unwrap();

        assert_eq!(
            resolves(&list),
            vec![(fixture.back_buffer.texture(), fixture.scene_color.texture())]
        );
        assert_eq!(list.stats().draw_calls, 0);
        assert!(post.first_pipeline().is_none());
    }

    #[test]
    fn test_without_tone_mapping_single_sample_is_a_no_op() {
        let fixture = Fixture::new(1);
        let post = pass(&fixture, false);
        let mut list = fixture.list();

        post.render(&mut list, &mut fixture.states(), &fixture.frame(&[])).unwrap();
        assert!(list.commands().is_empty());
    }

    #[test]
    fn test_stage_params_carry_bloom_settings() {
        let fixture = Fixture::new(1);
        let post = pass(&fixture, true);
        let mut list = fixture.list();

        post.render(&mut list, &mut fixture.states(), &fixture.frame(&[])).unwrap();

        let params = list
            .commands()
            .iter()
            .find_map(|c| match c {
                Command::SetRootParameter {
                    slot: PARAMS_SLOT,
                    binding: RootBinding::Constants { values, .. },
                    ..
                } => Some(values.iter().map(|v| f32::from_bits(*v)).collect::<Vec<_>>()),
                _ => None,
            })
            .unwrap();
        let bloom = BloomConfig::default();
        assert_relative_eq!(params[0], bloom.threshold);
        assert_relative_eq!(params[1], bloom.intensity);
        assert_relative_eq!(params[2], 1.0 / WIDTH as f32);
        assert_relative_eq!(params[3], 1.0 / HEIGHT as f32);
    }

    #[test]
    fn test_chain_without_bloom_targets_fails() {
        let fixture = Fixture::new(1);
        let post = pass(&fixture, true);
        let mut frame = fixture.frame(&[]);
        frame.targets.bloom = None;

        let result = post.render(&mut fixture.list(), &mut fixture.states(), &frame);
        assert!(matches!(
            result,
            Err(RenderError::ResourceError(ResourceError::ContextNotReady(_)))
        ));
    }
}
