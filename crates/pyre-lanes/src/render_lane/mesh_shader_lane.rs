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

use super::shaders::MESHLET_SHADER_PATH;
use super::{require_textures, PassFrame, PassPipeline};
use pyre_core::renderer::api::{
    BindPoint, BindingShape, BlendMode, BufferId, BufferUsage, ColorTargetState, CompareFunction,
    CullMode, DepthStencilState, DescriptorRange, GpuDescriptorHandle, MeshPipelineDescriptor,
    ResourceState, RootParameter, RootSignatureDescriptor,
    ShaderModuleDescriptor, ShaderSource, ShaderStageDescriptor, ShaderVisibility,
    StaticSampler, TextureFormat,
};
use pyre_core::renderer::meshlet::{Meshlet, MeshletData};
use pyre_core::renderer::{
    CommandList, DepthView, DescriptorHeaps, GpuBuffer, GpuBufferDescriptor, GpuBufferKind,
    GraphicsDevice, ObjectData, PipelineError, RenderError, ResourceError, ResourceStateTable,
    ResourceUploader,
};
use std::borrow::Cow;
use std::path::PathBuf;

const FRAME_SLOT: u32 = 0;
const VERTICES_SLOT: u32 = 1;
const MESHLET_SLOT: u32 = 2;
const OBJECT_SLOT: u32 = 3;
const MATERIAL_SLOT: u32 = 4;

/// One mesh drawn through the mesh-shader pipeline: one thread group per meshlet.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshletDraw {
    /// Model matrix and base color.
    pub object: ObjectData,
    /// Buffer holding the mesh's vertices.
    pub vertex_buffer: BufferId,
    /// Byte offset of the mesh's first vertex.
    pub vertex_offset: u64,
    /// Table of `[meshlets, vertex indices, primitives]`.
    pub meshlets: GpuDescriptorHandle,
    /// Thread groups to dispatch.
    pub meshlet_count: u32,
    /// Name of the bound material, if any.
    pub material: Option<String>,
}

/// The three meshlet buffers of one mesh and the table binding them.
#[derive(Debug)]
pub struct MeshletBuffers {
    buffers: [GpuBuffer; 3],
    table: GpuDescriptorHandle,
    meshlet_count: u32,
}

impl MeshletBuffers {
    /// Uploads `data`, blocking until the copies retired.
    pub fn new(
        device: &dyn GraphicsDevice,
        heaps: &mut DescriptorHeaps,
        uploader: &dyn ResourceUploader,
        label: &str,
        data: &MeshletData,
    ) -> Result<Self, RenderError> {
        let mut words = |name: &str, values: &[u32], element_size: u32| -> Result<GpuBuffer, RenderError> {
            GpuBuffer::create_with_data(
                device,
                heaps,
                uploader,
                &GpuBufferDescriptor {
                    label: Cow::Owned(format!("{label} {name}")),
                    element_count: (values.len() as u32 * 4 / element_size).max(1),
                    element_size,
                    kind: GpuBufferKind::Structured,
                    extra_usage: BufferUsage::NONE,
                },
                bytemuck::cast_slice(values),
            )
        };
        let meshlets: &[u32] = bytemuck::cast_slice::<Meshlet, u32>(&data.meshlets);
        let buffers = [
            words("Meshlets", meshlets, std::mem::size_of::<Meshlet>() as u32)?,
            words("Vertex Indices", &data.vertex_indices, 4)?,
            words("Primitives", &data.primitives, 4)?,
        ];

        let slots = heaps.cbv_srv_uav.allocate(3)?;
        for (i, buffer) in buffers.iter().enumerate() {
            device.write_descriptor(slots.cpu_at(i as u32), &buffer.srv_view())?;
        }
        let table = slots.gpu_at(0).ok_or(ResourceError::InvalidHandle)?;
        log::debug!("Uploaded {} meshlets for '{label}'", data.len());

        Ok(Self {
            buffers,
            table,
            meshlet_count: data.len() as u32,
        })
    }

    /// Base of the meshlet table.
    pub fn table(&self) -> GpuDescriptorHandle {
        self.table
    }

    /// Number of meshlets.
    pub fn meshlet_count(&self) -> u32 {
        self.meshlet_count
    }

    /// Releases the buffers.
    pub fn destroy(self, device: &dyn GraphicsDevice) -> Result<(), ResourceError> {
        for buffer in self.buffers {
            buffer.destroy(device, None)?;
        }
        Ok(())
    }
}

/// Lit meshlet geometry through task/mesh shaders.
///
/// Only constructible on devices reporting mesh-shader support.
#[derive(Debug)]
pub struct MeshShaderPass {
    pipeline: PassPipeline,
}

impl MeshShaderPass {
    /// Builds the mesh root signature and pipeline.
    ///
    /// # Errors
    ///
    /// [`PipelineError::FeatureNotSupported`] when the device has no mesh shaders.
    pub fn new(
        device: &dyn GraphicsDevice,
        color_format: TextureFormat,
        depth_format: TextureFormat,
        sample_count: u32,
    ) -> Result<Self, ResourceError> {
        if !device.capabilities().mesh_shaders {
            return Err(PipelineError::FeatureNotSupported("mesh shaders".to_string()).into());
        }
        let root_signature = device.create_root_signature(&RootSignatureDescriptor {
            label: Some(Cow::Borrowed("Mesh Shader Root Signature")),
            parameters: vec![
                RootParameter::ConstantBuffer {
                    visibility: ShaderVisibility::MESH | ShaderVisibility::PIXEL,
                },
                RootParameter::ShaderResource {
                    visibility: ShaderVisibility::MESH,
                },
                RootParameter::DescriptorTable {
                    visibility: ShaderVisibility::MESH,
                    ranges: vec![DescriptorRange::new(BindingShape::ReadOnlyBuffer, 3)],
                },
                RootParameter::Constants {
                    visibility: ShaderVisibility::MESH | ShaderVisibility::PIXEL,
                    num_values: ObjectData::NUM_VALUES,
                },
                RootParameter::DescriptorTable {
                    visibility: ShaderVisibility::PIXEL,
                    ranges: vec![DescriptorRange::new(BindingShape::Texture { cube: false }, 2)],
                },
            ],
            static_samplers: vec![StaticSampler::LINEAR_WRAP],
        })?;
        let module = device.create_shader_module(&ShaderModuleDescriptor {
            label: Some(Cow::Borrowed("Meshlet")),
            source: ShaderSource::File(PathBuf::from(MESHLET_SHADER_PATH)),
        })?;
        let pipeline = device.create_mesh_pipeline(&MeshPipelineDescriptor {
            label: Some(Cow::Borrowed("Mesh Shader")),
            root_signature,
            task: None,
            mesh: ShaderStageDescriptor {
                module,
                entry_point: Cow::Borrowed("MSMain"),
            },
            pixel: ShaderStageDescriptor {
                module,
                entry_point: Cow::Borrowed("PSMain"),
            },
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
        log::info!("Created mesh shader pipeline");

        Ok(Self {
            pipeline: PassPipeline {
                root_signature,
                pipeline,
                bind_point: BindPoint::Graphics,
            },
        })
    }

    /// The mesh pipeline.
    pub fn pipeline(&self) -> PassPipeline {
        self.pipeline
    }

    /// Dispatches every meshlet draw over the scene color, tested against the prepass depth.
    pub fn render(
        &self,
        list: &mut CommandList,
        states: &mut ResourceStateTable,
        frame: &PassFrame<'_>,
    ) -> Result<(), RenderError> {
        let targets = frame.targets;
        let bindings: Vec<_> = frame
            .meshlet_draws
            .iter()
            .map(|draw| frame.materials.resolve(draw.material.as_deref()))
            .collect();
        require_textures(
            list,
            states,
            bindings.iter().flat_map(|binding| binding.textures),
            ResourceState::PixelShaderResource,
        )?;
        let mut transaction = states.transaction();
        transaction
            .require(targets.scene_color.texture(), ResourceState::RenderTarget)?
            .require(targets.depth.texture(), ResourceState::DepthRead)?;
        transaction.commit(list)?;

        let rtv = targets.scene_color.rtv();
        list.set_render_targets(&[rtv], Some(targets.depth.dsv(DepthView::DepthReadOnly)));
        list.set_viewport_and_scissor(targets.scene_color.width(), targets.scene_color.height());
        self.pipeline.bind(list);
        list.set_graphics_root_constant_buffer(FRAME_SLOT, frame.constants.buffer, frame.constants.offset);

        for (draw, binding) in frame.meshlet_draws.iter().zip(&bindings) {
            if draw.meshlet_count == 0 {
                continue;
            }
            list.set_graphics_root_shader_resource(VERTICES_SLOT, draw.vertex_buffer, draw.vertex_offset);
            list.set_graphics_root_descriptor_table(MESHLET_SLOT, draw.meshlets);
            list.set_graphics_root_constants(OBJECT_SLOT, draw.object.as_values(), 0);
            list.set_graphics_root_descriptor_table(MATERIAL_SLOT, binding.table);
            list.dispatch_mesh(draw.meshlet_count, 1, 1);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render_lane::test_support::{Fixture, HDR};
    use pyre_core::math::{LinearRgba, Mat4};
    use pyre_core::renderer::api::{Command, DeviceCapabilities, RayTracingTier};
    use pyre_core::renderer::meshlet::build_meshlets;
    use pyre_core::scene::MeshData;
    use pyre_core::testing::MockDevice;

    #[test]
    fn test_requires_mesh_shader_support() {
        let device = MockDevice::with_capabilities(DeviceCapabilities {
            adapter_name: "No Mesh".to_string(),
            typed_uav_load_rg11b10_float: true,
            typed_uav_load_rgba16_float: true,
            ray_tracing_tier: RayTracingTier::NotSupported,
            mesh_shaders: false,
            uav_formats: Vec::new(),
        });
        let result = MeshShaderPass::new(&device, HDR, TextureFormat::Depth32Float, 1);
        assert!(matches!(
            result,
            Err(ResourceError::Pipeline(PipelineError::FeatureNotSupported(_)))
        ));
    }

    #[test]
    fn test_one_thread_group_per_meshlet() {
        let mut fixture = Fixture::new(1);
        let pass = MeshShaderPass::new(&fixture.device, HDR, TextureFormat::Depth32Float, 1).unwrap();
        let cube = MeshData::cube();
        let meshlets = MeshletBuffers::new(
            &fixture.device,
            &mut fixture.heaps,
            &fixture.uploader,
            "Cube",
            &build_meshlets(&cube.indices),
        )
        .unwrap();
        assert_eq!(meshlets.meshlet_count(), 1);

        let draw = MeshletDraw {
            object: ObjectData::new(Mat4::IDENTITY, LinearRgba::WHITE),
            vertex_buffer: fixture.vertices.buffer(),
            vertex_offset: 0,
            meshlets: meshlets.table(),
            meshlet_count: meshlets.meshlet_count(),
            material: None,
        };
        let empty = MeshletDraw {
            meshlet_count: 0,
            ..draw.clone()
        };
        let draws = [draw, empty];
        let mut frame = fixture.frame(&[]);
        frame.meshlet_draws = &draws;
        let mut list = fixture.list();
        let mut states = fixture.states();

        pass.render(&mut list, &mut states, &frame).unwrap();

        let stats = list.stats();
        assert_eq!(stats.mesh_dispatches, 1);
        assert_eq!(stats.draw_calls, 0);
        assert_eq!(states.state(fixture.depth.texture()), Some(ResourceState::DepthRead));
        assert!(!list
            .commands()
            .iter()
            .any(|c| matches!(c, Command::ClearRenderTarget { .. } | Command::ClearDepthStencil { .. })));
    }

    #[test]
    fn test_meshlet_table_points_at_three_buffers() {
        let mut fixture = Fixture::new(1);
        let data = build_meshlets(&MeshData::plane(1.0).indices);
        let before = fixture.uploader.buffer_uploads().len();
        let meshlets =
            MeshletBuffers::new(&fixture.device, &mut fixture.heaps, &fixture.uploader, "Plane", &data).unwrap();

        let uploads = &fixture.uploader.buffer_uploads()[before..];
        assert_eq!(uploads.len(), 3);
        assert_eq!(uploads[0].1, data.meshlets.len() * 16);
        assert_eq!(uploads[2].1, data.primitives.len() * 4);
        meshlets.destroy(&fixture.device).unwrap();
    }
}
