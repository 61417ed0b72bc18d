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

//! Shared fixtures for pass tests, backed by the mock device.

use super::{
    DrawItem, FrameConstants, GeometryViews, LightBuffers, MaterialTable, PassFrame, PassTargets,
};
use pyre_core::config::{ClusterGridConfig, DescriptorHeapCapacities};
use pyre_core::math::{LinearRgba, Mat4};
use pyre_core::renderer::api::{
    BufferId, CommandAllocatorId, CommandListType, IndexFormat, TextureCopyRegion, TextureFormat,
    TextureId, Vertex,
};
use pyre_core::renderer::{
    ClusterGrid, ColorBuffer, ColorBufferDescriptor, CommandList, DepthBuffer, DescriptorHeaps,
    GpuBuffer, GpuBufferDescriptor, GpuBufferKind, ObjectData, RenderError, ResourceStateTable,
    ResourceUploader,
};
use pyre_core::testing::MockDevice;
use std::borrow::Cow;
use std::sync::Mutex;

pub(crate) const WIDTH: u32 = 64;
pub(crate) const HEIGHT: u32 = 32;
pub(crate) const HDR: TextureFormat = TextureFormat::Rg11b10Float;
pub(crate) const BACK_BUFFER: TextureFormat = TextureFormat::Bgra8UnormSrgb;

/// Records uploads instead of copying.
#[derive(Debug, Default)]
pub(crate) struct CountingUploader {
    buffers: Mutex<Vec<(BufferId, usize)>>,
    textures: Mutex<Vec<(TextureId, usize)>>,
}

impl CountingUploader {
    pub(crate) fn buffer_uploads(&self) -> Vec<(BufferId, usize)> {
        self.buffers.lock().unwrap().clone()
    }

    pub(crate) fn texture_uploads(&self) -> Vec<(TextureId, usize)> {
        self.textures.lock().unwrap().clone()
    }
}

impl ResourceUploader for CountingUploader {
    fn upload_to_buffer(&self, dst: BufferId, _dst_offset: u64, data: &[u8]) -> Result<(), RenderError> {
        self.buffers.lock().unwrap().push((dst, data.len()));
        Ok(())
    }

    fn upload_to_texture(
        &self,
        dst: TextureId,
        _format: TextureFormat,
        _region: TextureCopyRegion,
        data: &[u8],
    ) -> Result<(), RenderError> {
        self.textures.lock().unwrap().push((dst, data.len()));
        Ok(())
    }
}

fn color_buffer(
    device: &MockDevice,
    heaps: &mut DescriptorHeaps,
    label: &'static str,
    sample_count: u32,
    format: TextureFormat,
) -> ColorBuffer {
    ColorBuffer::create(
        device,
        heaps,
        &ColorBufferDescriptor {
            label: Cow::Borrowed(label),
            width: WIDTH,
            height: HEIGHT,
            mip_levels: 1,
            sample_count,
            format,
            clear_color: [0.0; 4],
        },
    )
    .unwrap()
}

/// A full set of targets, buffers and materials for recording passes.
pub(crate) struct Fixture {
    pub device: MockDevice,
    pub heaps: DescriptorHeaps,
    pub uploader: CountingUploader,
    pub depth: DepthBuffer,
    pub shadow: DepthBuffer,
    pub scene_color: ColorBuffer,
    pub resolved: Option<ColorBuffer>,
    pub bloom: [ColorBuffer; 3],
    pub back_buffer: ColorBuffer,
    pub lights: LightBuffers,
    pub materials: MaterialTable,
    pub vertices: GpuBuffer,
    pub indices: GpuBuffer,
    pub constants: GpuBuffer,
}

impl Fixture {
    /// HDR targets with bloom; a separate resolve target when `sample_count > 1`.
    pub(crate) fn new(sample_count: u32) -> Self {
        let device = MockDevice::new();
        let mut heaps = DescriptorHeaps::new(&device, &DescriptorHeapCapacities::default()).unwrap();
        let uploader = CountingUploader::default();

        let depth = DepthBuffer::create(
            &device, &mut heaps, "Scene Depth", WIDTH, HEIGHT, sample_count,
            TextureFormat::Depth32Float, 1.0, 0,
        )
        .unwrap();
        let shadow = DepthBuffer::create(
            &device, &mut heaps, "Shadow Map", 128, 128, 1, TextureFormat::Depth32Float, 1.0, 0,
        )
        .unwrap();
        let scene_color = color_buffer(&device, &mut heaps, "Scene Color", sample_count, HDR);
        let resolved = (sample_count > 1).then(|| color_buffer(&device, &mut heaps, "Resolved", 1, HDR));
        let bloom = ["Bloom Extract", "Bloom Blur H", "Bloom Blur V"]
            .map(|label| color_buffer(&device, &mut heaps, label, 1, HDR));
        let back_buffer = color_buffer(&device, &mut heaps, "Back Buffer", 1, BACK_BUFFER);
        let lights = LightBuffers::new(
            &device,
            &mut heaps,
            16,
            ClusterGrid::new(ClusterGridConfig { x: 4, y: 2, z: 3 }),
        )
        .unwrap();
        let materials = MaterialTable::new(&device, &mut heaps, &uploader).unwrap();

        let buffer = |heaps: &mut DescriptorHeaps, label: &'static str, count: u32, size: u32, kind| {
            GpuBuffer::create(
                &device,
                heaps,
                &GpuBufferDescriptor {
                    label: Cow::Borrowed(label),
                    element_count: count,
                    element_size: size,
                    kind,
                    extra_usage: Default::default(),
                },
            )
            .unwrap()
        };
        let vertices = buffer(&mut heaps, "Vertices", 1024, Vertex::STRIDE, GpuBufferKind::Structured);
        let indices = buffer(&mut heaps, "Indices", 4096, 4, GpuBufferKind::VertexIndex);
        let constants = buffer(&mut heaps, "Frame Constants", 3, 256, GpuBufferKind::VertexIndex);

        Self {
            device,
            heaps,
            uploader,
            depth,
            shadow,
            scene_color,
            resolved,
            bloom,
            back_buffer,
            lights,
            materials,
            vertices,
            indices,
            constants,
        }
    }

    pub(crate) fn targets(&self) -> PassTargets<'_> {
        PassTargets {
            depth: &self.depth,
            shadow: &self.shadow,
            scene_color: &self.scene_color,
            resolved: self.resolved.as_ref(),
            bloom: Some([&self.bloom[0], &self.bloom[1], &self.bloom[2]]),
            back_buffer: &self.back_buffer,
        }
    }

    pub(crate) fn frame<'a>(&'a self, draws: &'a [DrawItem]) -> PassFrame<'a> {
        PassFrame {
            constants: FrameConstants {
                buffer: self.constants.buffer(),
                offset: 256,
            },
            geometry: Some(GeometryViews {
                vertex: self.vertices.vertex_buffer_view(0, self.vertices.element_count()),
                index: self.indices.index_buffer_view(IndexFormat::Uint32),
            }),
            draws,
            meshlet_draws: &[],
            targets: self.targets(),
            lights: &self.lights,
            materials: &self.materials,
        }
    }

    /// `count` single-triangle draws, each naming its own material.
    pub(crate) fn draws(&self, count: u32) -> Vec<DrawItem> {
        (0..count)
            .map(|i| DrawItem {
                object: ObjectData::new(Mat4::IDENTITY, LinearRgba::WHITE),
                index_count: 3,
                start_index: i * 3,
                base_vertex: 0,
                material: Some(format!("material-{i}")),
            })
            .collect()
    }

    pub(crate) fn list(&self) -> CommandList {
        CommandList::new(CommandListType::Direct, CommandAllocatorId(0), "Test List")
    }

    /// A state table tracking every target and buffer in its creation state.
    pub(crate) fn states(&self) -> ResourceStateTable {
        let mut states = ResourceStateTable::new();
        states.track(&self.depth);
        states.track(&self.shadow);
        states.track(&self.scene_color);
        if let Some(resolved) = &self.resolved {
            states.track(resolved);
        }
        for bloom in &self.bloom {
            states.track(bloom);
        }
        states.track(&self.back_buffer);
        self.lights.track(&mut states);
        states
    }
}
