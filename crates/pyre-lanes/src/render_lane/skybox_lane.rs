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

use super::shaders::SKYBOX_WGSL;
use super::{require_textures, wgsl_module, PassFrame, PassPipeline};
use pyre_core::renderer::api::{
    BindPoint, BindingShape, BlendMode, ColorTargetState, CompareFunction, CullMode,
    DepthStencilState, DescriptorRange, GraphicsPipelineDescriptor, PrimitiveTopology,
    ResourceState, RootParameter, RootSignatureDescriptor, ShaderStageDescriptor,
    ShaderVisibility, StaticSampler, TextureFormat, Vertex,
};
use pyre_core::renderer::{
    CommandList, DepthView, DescriptorHeaps, GraphicsDevice, RenderError, ResourceError,
    ResourceStateTable, ResourceUploader, Texture,
};
use pyre_core::scene::{GpuMesh, TextureData};
use std::borrow::Cow;

const FRAME_SLOT: u32 = 0;
const CUBE_SLOT: u32 = 1;

/// A cube-mapped sky drawn at the far plane behind all geometry.
#[derive(Debug)]
pub struct SkyboxPass {
    pipeline: PassPipeline,
    cube_map: Texture,
    mesh: GpuMesh,
}

impl SkyboxPass {
    /// Builds the cube map from six faces in +X, -X, +Y, -Y, +Z, -Z order.
    ///
    /// `mesh` is a unit cube already resident in the mega-buffers. Faces must be
    /// square and share one size and format.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        device: &dyn GraphicsDevice,
        heaps: &mut DescriptorHeaps,
        uploader: &dyn ResourceUploader,
        mesh: GpuMesh,
        faces: &[TextureData; 6],
        color_format: TextureFormat,
        sample_count: u32,
        depth_format: TextureFormat,
    ) -> Result<Self, RenderError> {
        let (size, height) = faces[0].size();
        let format = faces[0].format();
        if size != height || faces.iter().any(|f| f.size() != (size, size) || f.format() != format) {
            return Err(ResourceError::BackendError(
                "sky faces must be square with matching size and format".to_string(),
            )
            .into());
        }
        let mut texels = Vec::new();
        for face in faces {
            texels.extend(face.load_bytes()?);
        }
        let cube_map = Texture::create_cube(device, heaps, "Sky Cube Map", size, 1, format)?;
        cube_map.upload(uploader, &texels)?;

        let root_signature = device.create_root_signature(&RootSignatureDescriptor {
            label: Some(Cow::Borrowed("Skybox Root Signature")),
            parameters: vec![
                RootParameter::ConstantBuffer {
                    visibility: ShaderVisibility::ALL_GRAPHICS,
                },
                RootParameter::DescriptorTable {
                    visibility: ShaderVisibility::PIXEL,
                    ranges: vec![DescriptorRange::new(BindingShape::Texture { cube: true }, 1)],
                },
            ],
            static_samplers: vec![StaticSampler::LINEAR_CLAMP],
        })?;
        let module = wgsl_module(device, "Skybox", SKYBOX_WGSL)?;
        let pipeline = device.create_graphics_pipeline(&GraphicsPipelineDescriptor {
            label: Some(Cow::Borrowed("Skybox")),
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
            // The camera sits inside the cube.
            cull_mode: CullMode::None,
            color_targets: vec![ColorTargetState {
                format: color_format,
                blend: BlendMode::Opaque,
            }],
            depth_stencil: Some(DepthStencilState {
                depth_write: false,
                depth_compare: CompareFunction::Always,
                ..DepthStencilState::read_write(depth_format)
            }),
            sample_count,
        })?;
        log::info!("Created skybox ({size}x{size} faces, {format:?})");

        Ok(Self {
            pipeline: PassPipeline {
                root_signature,
                pipeline,
                bind_point: BindPoint::Graphics,
            },
            cube_map,
            mesh,
        })
    }

    /// The sky pipeline.
    pub fn pipeline(&self) -> PassPipeline {
        self.pipeline
    }

    /// The uploaded cube map.
    pub fn cube_map(&self) -> &Texture {
        &self.cube_map
    }

    /// Draws the cube into the scene color target.
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
        require_textures(list, states, [self.cube_map.texture()], ResourceState::PixelShaderResource)?;
        let mut transaction = states.transaction();
        transaction
            .require(targets.scene_color.texture(), ResourceState::RenderTarget)?
            .require(targets.depth.texture(), ResourceState::DepthRead)?;
        transaction.commit(list)?;

        list.set_render_targets(
            &[targets.scene_color.rtv()],
            Some(targets.depth.dsv(DepthView::DepthReadOnly)),
        );
        list.set_viewport_and_scissor(targets.scene_color.width(), targets.scene_color.height());
        self.pipeline.bind(list);
        list.set_graphics_root_constant_buffer(FRAME_SLOT, frame.constants.buffer, frame.constants.offset);
        list.set_graphics_root_descriptor_table(CUBE_SLOT, self.cube_map.srv());
        geometry.bind(list);
        for submesh in &self.mesh.submeshes {
            list.draw_indexed_instanced(
                submesh.index_count(),
                1,
                self.mesh.first_index + submesh.index_offset,
                self.mesh.base_vertex as i32,
                0,
            );
        }
        Ok(())
    }

    /// Releases the cube map.
    pub fn destroy(self, device: &dyn GraphicsDevice) -> Result<(), ResourceError> {
        self.cube_map.destroy(device)
    }
}
