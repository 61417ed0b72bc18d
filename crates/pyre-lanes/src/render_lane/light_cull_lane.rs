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

use super::shaders::LIGHT_CULL_WGSL;
use super::{wgsl_module, PassFrame, PassPipeline};
use pyre_core::renderer::api::{
    BindPoint, BindingShape, BufferUsage, ComputePipelineDescriptor, DescriptorRange,
    GpuDescriptorHandle, ResourceState, RootParameter, RootSignatureDescriptor,
    ShaderStageDescriptor, ShaderVisibility,
};
use pyre_core::renderer::{
    Cluster, ClusterGrid, CommandList, DescriptorHeaps, GpuBuffer, GpuBufferDescriptor,
    GpuBufferKind, GraphicsDevice, Light, LightSet, RenderError, ResourceError,
    ResourceStateTable, ResourceUploader,
};
use std::borrow::Cow;

const FRAME_SLOT: u32 = 0;
const LIGHT_TABLE_SLOT: u32 = 1;

/// The point-light buffer and the cluster grid it is culled into.
///
/// Both are bound through one two-slot descriptor table: the light SRV followed
/// by the cluster UAV.
#[derive(Debug)]
pub struct LightBuffers {
    lights: GpuBuffer,
    clusters: GpuBuffer,
    table: GpuDescriptorHandle,
    grid: ClusterGrid,
    light_count: u32,
}

impl LightBuffers {
    /// Allocates room for `max_lights` lights and one cluster per grid cell.
    pub fn new(
        device: &dyn GraphicsDevice,
        heaps: &mut DescriptorHeaps,
        max_lights: u32,
        grid: ClusterGrid,
    ) -> Result<Self, ResourceError> {
        let lights = GpuBuffer::create(
            device,
            heaps,
            &GpuBufferDescriptor {
                label: Cow::Borrowed("Point Lights"),
                element_count: max_lights.max(1),
                element_size: Light::STRIDE,
                kind: GpuBufferKind::Structured,
                extra_usage: BufferUsage::NONE,
            },
        )?;
        let clusters = GpuBuffer::create(
            device,
            heaps,
            &GpuBufferDescriptor {
                label: Cow::Borrowed("Light Clusters"),
                element_count: grid.cluster_count(),
                element_size: Cluster::STRIDE,
                kind: GpuBufferKind::Structured,
                extra_usage: BufferUsage::NONE,
            },
        )?;

        let slots = heaps.cbv_srv_uav.allocate(2)?;
        device.write_descriptor(slots.cpu_at(0), &lights.srv_view())?;
        device.write_descriptor(slots.cpu_at(1), &clusters.uav_view())?;
        let table = slots.gpu_at(0).ok_or(ResourceError::InvalidHandle)?;
        log::debug!(
            "Allocated light buffers: {} lights, {} clusters",
            max_lights,
            grid.cluster_count()
        );

        Ok(Self {
            lights,
            clusters,
            table,
            grid,
            light_count: 0,
        })
    }

    /// Copies `set` into the light buffer, blocking until the copy retired.
    pub fn upload(&mut self, uploader: &dyn ResourceUploader, set: &LightSet) -> Result<(), RenderError> {
        if set.len() > self.lights.element_count() {
            return Err(ResourceError::OutOfBounds.into());
        }
        if !set.is_empty() {
            uploader.upload_to_buffer(self.lights.buffer(), 0, set.as_bytes())?;
        }
        self.light_count = set.len();
        Ok(())
    }

    /// Starts tracking both buffers.
    pub fn track(&self, states: &mut ResourceStateTable) {
        states.track(&self.lights);
        states.track(&self.clusters);
    }

    /// Base of the `[lights, clusters]` table.
    pub fn table(&self) -> GpuDescriptorHandle {
        self.table
    }

    /// The light buffer.
    pub fn lights(&self) -> &GpuBuffer {
        &self.lights
    }

    /// The cluster buffer.
    pub fn clusters(&self) -> &GpuBuffer {
        &self.clusters
    }

    /// The cluster grid.
    pub fn grid(&self) -> &ClusterGrid {
        &self.grid
    }

    /// Lights uploaded by the last [`LightBuffers::upload`].
    pub fn light_count(&self) -> u32 {
        self.light_count
    }

    /// Requires both buffers in the states lit shading reads them in.
    pub(crate) fn require_shading(
        &self,
        list: &mut CommandList,
        states: &mut ResourceStateTable,
    ) -> Result<(), ResourceError> {
        let mut transaction = states.transaction();
        transaction
            .require(self.lights.buffer(), ResourceState::AllShaderResource)?
            .require(self.clusters.buffer(), ResourceState::UnorderedAccess)?;
        transaction.commit(list)?;
        Ok(())
    }

    /// Releases both buffers.
    pub fn destroy(self, device: &dyn GraphicsDevice) -> Result<(), ResourceError> {
        self.lights.destroy(device, None)?;
        self.clusters.destroy(device, None)
    }
}

/// Assigns every point light to the clusters its range overlaps.
///
/// Runs one workgroup per cluster. Writes the cluster buffer that lit shading reads.
#[derive(Debug)]
pub struct LightCullPass {
    pipeline: PassPipeline,
}

impl LightCullPass {
    /// Builds the compute root signature and pipeline.
    pub fn new(device: &dyn GraphicsDevice) -> Result<Self, ResourceError> {
        let root_signature = device.create_root_signature(&RootSignatureDescriptor {
            label: Some(Cow::Borrowed("Light Cull Root Signature")),
            parameters: vec![
                RootParameter::ConstantBuffer {
                    visibility: ShaderVisibility::COMPUTE,
                },
                RootParameter::DescriptorTable {
                    visibility: ShaderVisibility::COMPUTE,
                    ranges: vec![
                        DescriptorRange::new(BindingShape::ReadOnlyBuffer, 1),
                        DescriptorRange::new(BindingShape::ReadWriteBuffer, 1),
                    ],
                },
            ],
            static_samplers: Vec::new(),
        })?;
        let module = wgsl_module(device, "Light Cull", LIGHT_CULL_WGSL)?;
        let pipeline = device.create_compute_pipeline(&ComputePipelineDescriptor {
            label: Some(Cow::Borrowed("Light Cull")),
            root_signature,
            compute: ShaderStageDescriptor {
                module,
                entry_point: Cow::Borrowed("cs_main"),
            },
        })?;

        Ok(Self {
            pipeline: PassPipeline {
                root_signature,
                pipeline,
                bind_point: BindPoint::Compute,
            },
        })
    }

    /// The compute pipeline.
    pub fn pipeline(&self) -> PassPipeline {
        self.pipeline
    }

    /// Dispatches one workgroup per cluster.
    pub fn render(
        &self,
        list: &mut CommandList,
        states: &mut ResourceStateTable,
        frame: &PassFrame<'_>,
    ) -> Result<(), RenderError> {
        let lights = frame.lights;
        lights.require_shading(list, states)?;

        self.pipeline.bind(list);
        list.set_compute_root_constant_buffer(FRAME_SLOT, frame.constants.buffer, frame.constants.offset);
        list.set_compute_root_descriptor_table(LIGHT_TABLE_SLOT, lights.table());
        let (x, y, z) = lights.grid().dispatch_size();
        list.dispatch(x, y, z);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render_lane::test_support::Fixture;
    use pyre_core::config::ClusterGridConfig;
    use pyre_core::math::{LinearRgba, Vec3};
    use pyre_core::renderer::api::{Command, ViewDescriptor};

    #[test]
    fn test_dispatch_covers_cluster_grid() {
        let fixture = Fixture::new(1);
        let pass = LightCullPass::new(&fixture.device).unwrap();
        let mut list = fixture.list();
        let mut states = fixture.states();

        pass.render(&mut list, &mut states, &fixture.frame(&[])).unwrap();

        let dims = fixture.lights.grid().dims();
        assert!(list
            .commands()
            .iter()
            .any(|c| *c == Command::Dispatch { x: dims.x, y: dims.y, z: dims.z }));
        assert_eq!(
            states.state(fixture.lights.clusters().buffer()),
            Some(ResourceState::UnorderedAccess)
        );
        assert_eq!(list.stats().dispatches, 1);
    }

    #[test]
    fn test_table_holds_light_srv_then_cluster_uav() {
        let mut fixture = Fixture::new(1);
        let buffers = LightBuffers::new(
            &fixture.device,
            &mut fixture.heaps,
            8,
            ClusterGrid::new(ClusterGridConfig { x: 2, y: 2, z: 2 }),
        )
        .unwrap();

        let heap = fixture.heaps.cbv_srv_uav.id();
        let slot = |offset: u32| pyre_core::renderer::api::CpuDescriptorHandle {
            heap,
            index: buffers.table().index + offset,
        };
        assert!(matches!(
            fixture.device.descriptor(slot(0)),
            Some(ViewDescriptor::BufferSrv { buffer, .. }) if buffer == buffers.lights().buffer()
        ));
        assert!(matches!(
            fixture.device.descriptor(slot(1)),
            Some(ViewDescriptor::BufferUav { buffer, .. }) if buffer == buffers.clusters().buffer()
        ));
        assert_eq!(buffers.clusters().size(), 8 * u64::from(Cluster::STRIDE));
    }

    #[test]
    fn test_upload_rejects_more_lights_than_capacity() {
        let mut fixture = Fixture::new(1);
        let mut buffers = LightBuffers::new(
            &fixture.device,
            &mut fixture.heaps,
            1,
            ClusterGrid::new(ClusterGridConfig { x: 1, y: 1, z: 1 }),
        )
        .unwrap();
        let mut set = LightSet::with_capacity(2);
        for x in 0..2 {
            set.push(Light::point(Vec3::new(x as f32, 0.0, 0.0), 5.0, LinearRgba::WHITE, 1.0))
                .unwrap();
        }

        assert!(buffers.upload(&fixture.uploader, &set).is_err());
        set.clear();
        set.push(Light::point(Vec3::ZERO, 5.0, LinearRgba::WHITE, 1.0)).unwrap();
        buffers.upload(&fixture.uploader, &set).unwrap();
        assert_eq!(buffers.light_count(), 1);
        assert_eq!(fixture.uploader.buffer_uploads(), vec![(buffers.lights().buffer(), 32)]);
    }
}
