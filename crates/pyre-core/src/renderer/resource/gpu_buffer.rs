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

use super::{GpuHeap, GpuResource, ResourceUploader};
use crate::renderer::api::{
    BufferDescriptor, BufferId, BufferUsage, BufferViewKind, GpuDescriptorHandle, HeapId,
    IndexBufferView, IndexFormat, MemoryLocation, ResourceKey, ResourceState, TextureFormat,
    VertexBufferView, ViewDescriptor,
};
use crate::renderer::descriptor_heap::DescriptorHeaps;
use crate::renderer::error::{RenderError, ResourceError};
use crate::renderer::traits::GraphicsDevice;
use std::borrow::Cow;

/// How a linear buffer is viewed by shaders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GpuBufferKind {
    /// Bound through vertex and index buffer views only.
    VertexIndex,
    /// Array of structures with SRV, UAV and a 4-byte atomic counter buffer.
    Structured,
    /// Raw 32-bit words with SRV and UAV.
    ByteAddress,
    /// Elements of a texel format with SRV and UAV.
    Typed(TextureFormat),
}

/// Parameters of [`GpuBuffer::create`].
#[derive(Debug, Clone)]
pub struct GpuBufferDescriptor<'a> {
    /// Debug label.
    pub label: Cow<'a, str>,
    /// Number of elements.
    pub element_count: u32,
    /// Size of one element in bytes.
    pub element_size: u32,
    /// View flavor.
    pub kind: GpuBufferKind,
    /// Usages added to the ones implied by `kind`.
    pub extra_usage: BufferUsage,
}

impl GpuBufferDescriptor<'_> {
    /// Total size in bytes.
    pub fn size(&self) -> u64 {
        u64::from(self.element_count) * u64::from(self.element_size)
    }

    fn usage(&self) -> BufferUsage {
        let base = match self.kind {
            GpuBufferKind::VertexIndex => BufferUsage::VERTEX | BufferUsage::INDEX,
            _ => BufferUsage::STORAGE,
        };
        base | BufferUsage::COPY_DST | BufferUsage::COPY_SRC | self.extra_usage
    }

    fn view_kind(&self) -> Option<BufferViewKind> {
        match self.kind {
            GpuBufferKind::VertexIndex => None,
            GpuBufferKind::Structured => Some(BufferViewKind::Structured {
                stride: self.element_size,
            }),
            GpuBufferKind::ByteAddress => Some(BufferViewKind::Raw),
            GpuBufferKind::Typed(format) => Some(BufferViewKind::Typed(format)),
        }
    }
}

/// A GPU-resident linear buffer of `element_count * element_size` bytes.
#[derive(Debug)]
pub struct GpuBuffer {
    label: String,
    buffer: BufferId,
    element_count: u32,
    element_size: u32,
    kind: GpuBufferKind,
    srv: Option<GpuDescriptorHandle>,
    uav: Option<GpuDescriptorHandle>,
    counter: Option<BufferId>,
    placement: Option<(HeapId, u64)>,
}

impl GpuBuffer {
    /// Creates a committed GPU-only buffer and its views.
    pub fn create(
        device: &dyn GraphicsDevice,
        heaps: &mut DescriptorHeaps,
        desc: &GpuBufferDescriptor,
    ) -> Result<Self, ResourceError> {
        let buffer = device.create_buffer(&BufferDescriptor {
            label: Some(Cow::Borrowed(desc.label.as_ref())),
            size: desc.size(),
            usage: desc.usage(),
            memory: MemoryLocation::GpuOnly,
        })?;
        Self::finish(device, heaps, desc, buffer, None)
    }

    /// Creates the buffer and synchronously uploads `data` into it.
    ///
    /// Blocks until the copy has retired on the GPU.
    pub fn create_with_data(
        device: &dyn GraphicsDevice,
        heaps: &mut DescriptorHeaps,
        uploader: &dyn ResourceUploader,
        desc: &GpuBufferDescriptor,
        data: &[u8],
    ) -> Result<Self, RenderError> {
        if data.len() as u64 > desc.size() {
            return Err(ResourceError::OutOfBounds.into());
        }
        let buffer = Self::create(device, heaps, desc)?;
        uploader.upload_to_buffer(buffer.buffer, 0, data)?;
        Ok(buffer)
    }

    /// Places the buffer inside `heap` at `offset`.
    ///
    /// # Errors
    ///
    /// Fails with [`ResourceError::MisalignedPlacement`] or
    /// [`ResourceError::RegionOverlap`] when the region is not available.
    pub fn create_placed(
        device: &dyn GraphicsDevice,
        heaps: &mut DescriptorHeaps,
        heap: &mut GpuHeap,
        offset: u64,
        desc: &GpuBufferDescriptor,
    ) -> Result<Self, ResourceError> {
        let size = desc.size();
        heap.reserve(offset, size)?;
        let created = device.create_placed_buffer(
            heap.id(),
            offset,
            &BufferDescriptor {
                label: Some(Cow::Borrowed(desc.label.as_ref())),
                size,
                usage: desc.usage(),
                memory: heap.memory(),
            },
        );
        let buffer = match created {
            Ok(buffer) => buffer,
            Err(err) => {
                heap.release(offset);
                return Err(err);
            }
        };
        let placed = Self::finish(device, heaps, desc, buffer, Some((heap.id(), offset)));
        if placed.is_err() {
            heap.release(offset);
        }
        placed
    }

    fn finish(
        device: &dyn GraphicsDevice,
        heaps: &mut DescriptorHeaps,
        desc: &GpuBufferDescriptor,
        buffer: BufferId,
        placement: Option<(HeapId, u64)>,
    ) -> Result<Self, ResourceError> {
        let mut this = Self {
            label: desc.label.to_string(),
            buffer,
            element_count: desc.element_count,
            element_size: desc.element_size,
            kind: desc.kind,
            srv: None,
            uav: None,
            counter: None,
            placement,
        };

        if let Err(err) = this.attach_views(device, heaps, desc) {
            let label = this.label.clone();
            if let Err(cleanup) = this.destroy(device, None) {
                log::warn!("Failed to release partially created buffer '{label}': {cleanup}");
            }
            return Err(err);
        }

        log::debug!(
            "Created {:?} buffer '{}' ({} x {} bytes{})",
            desc.kind,
            desc.label,
            desc.element_count,
            desc.element_size,
            if placement.is_some() { ", placed" } else { "" }
        );
        Ok(this)
    }

    fn attach_views(
        &mut self,
        device: &dyn GraphicsDevice,
        heaps: &mut DescriptorHeaps,
        desc: &GpuBufferDescriptor,
    ) -> Result<(), ResourceError> {
        if desc.kind == GpuBufferKind::Structured {
            self.counter = Some(device.create_buffer(&BufferDescriptor {
                label: Some(Cow::Owned(format!("{} Counter", desc.label))),
                size: 4,
                usage: BufferUsage::STORAGE | BufferUsage::COPY_DST | BufferUsage::COPY_SRC,
                memory: MemoryLocation::GpuOnly,
            })?);
        }

        if desc.view_kind().is_some() {
            let slots = heaps.cbv_srv_uav.allocate(2)?;
            device.write_descriptor(slots.cpu_at(0), &self.srv_view())?;
            device.write_descriptor(slots.cpu_at(1), &self.uav_view())?;
            self.srv = slots.gpu_at(0);
            self.uav = slots.gpu_at(1);
        }
        Ok(())
    }

    /// Releases the buffer and its counter. Placed buffers also free their heap region.
    pub fn destroy(self, device: &dyn GraphicsDevice, heap: Option<&mut GpuHeap>) -> Result<(), ResourceError> {
        if let (Some(heap), Some((_, offset))) = (heap, self.placement) {
            heap.release(offset);
        }
        if let Some(counter) = self.counter {
            device.destroy_buffer(counter)?;
        }
        device.destroy_buffer(self.buffer)
    }

    fn view_kind(&self) -> BufferViewKind {
        match self.kind {
            GpuBufferKind::Structured => BufferViewKind::Structured {
                stride: self.element_size,
            },
            GpuBufferKind::Typed(format) => BufferViewKind::Typed(format),
            GpuBufferKind::VertexIndex | GpuBufferKind::ByteAddress => BufferViewKind::Raw,
        }
    }

    /// Shader-resource view of the whole buffer.
    pub fn srv_view(&self) -> ViewDescriptor {
        ViewDescriptor::BufferSrv {
            buffer: self.buffer,
            offset: 0,
            size: self.size(),
            kind: self.view_kind(),
        }
    }

    /// Unordered-access view of the whole buffer, with its counter if structured.
    pub fn uav_view(&self) -> ViewDescriptor {
        ViewDescriptor::BufferUav {
            buffer: self.buffer,
            offset: 0,
            size: self.size(),
            kind: self.view_kind(),
            counter: self.counter,
        }
    }

    /// Vertex buffer view over `count` elements starting at element `first`.
    pub fn vertex_buffer_view(&self, first: u32, count: u32) -> VertexBufferView {
        VertexBufferView {
            buffer: self.buffer,
            offset: u64::from(first) * u64::from(self.element_size),
            size: u64::from(count) * u64::from(self.element_size),
            stride: self.element_size,
        }
    }

    /// Index buffer view over the whole buffer.
    pub fn index_buffer_view(&self, format: IndexFormat) -> IndexBufferView {
        IndexBufferView {
            buffer: self.buffer,
            offset: 0,
            size: self.size(),
            format,
        }
    }

    /// Backend buffer.
    pub fn buffer(&self) -> BufferId {
        self.buffer
    }

    /// Shader-resource view slot, absent for vertex/index buffers.
    pub fn srv(&self) -> Option<GpuDescriptorHandle> {
        self.srv
    }

    /// Unordered-access view slot, absent for vertex/index buffers.
    pub fn uav(&self) -> Option<GpuDescriptorHandle> {
        self.uav
    }

    /// Atomic counter of a structured buffer.
    pub fn counter(&self) -> Option<BufferId> {
        self.counter
    }

    /// Heap and offset of a placed buffer.
    pub fn placement(&self) -> Option<(HeapId, u64)> {
        self.placement
    }

    /// View flavor.
    pub fn kind(&self) -> GpuBufferKind {
        self.kind
    }

    /// Number of elements.
    pub fn element_count(&self) -> u32 {
        self.element_count
    }

    /// Size of one element.
    pub fn element_size(&self) -> u32 {
        self.element_size
    }

    /// Total size in bytes.
    pub fn size(&self) -> u64 {
        u64::from(self.element_count) * u64::from(self.element_size)
    }
}

impl GpuResource for GpuBuffer {
    fn key(&self) -> ResourceKey {
        ResourceKey::Buffer(self.buffer)
    }

    fn initial_state(&self) -> ResourceState {
        ResourceState::Common
    }

    fn label(&self) -> &str {
        &self.label
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DescriptorHeapCapacities;
    use crate::renderer::api::{TextureCopyRegion, TextureId, PLACEMENT_ALIGNMENT};
    use crate::testing::MockDevice;
    use std::cell::RefCell;

    fn setup() -> (MockDevice, DescriptorHeaps) {
        let device = MockDevice::new();
        let heaps = DescriptorHeaps::new(&device, &DescriptorHeapCapacities::default()).unwrap();
        (device, heaps)
    }

    fn desc(kind: GpuBufferKind, count: u32, size: u32) -> GpuBufferDescriptor<'static> {
        GpuBufferDescriptor {
            label: Cow::Borrowed("Test Buffer"),
            element_count: count,
            element_size: size,
            kind,
            extra_usage: BufferUsage::NONE,
        }
    }

    #[derive(Default)]
    struct RecordingUploader {
        uploads: RefCell<Vec<(BufferId, u64, usize)>>,
    }

    impl ResourceUploader for RecordingUploader {
        fn upload_to_buffer(&self, dst: BufferId, dst_offset: u64, data: &[u8]) -> Result<(), RenderError> {
            self.uploads.borrow_mut().push((dst, dst_offset, data.len()));
            Ok(())
        }

        fn upload_to_texture(
            &self,
            _dst: TextureId,
            _format: TextureFormat,
            _region: TextureCopyRegion,
            _data: &[u8],
        ) -> Result<(), RenderError> {
            Ok(())
        }
    }

    #[test]
    fn size_is_count_times_stride() {
        let (device, mut heaps) = setup();
        let buffer = GpuBuffer::create(&device, &mut heaps, &desc(GpuBufferKind::VertexIndex, 1000, 60)).unwrap();
        assert_eq!(buffer.size(), 60_000);
        assert_eq!(device.buffer_size(buffer.buffer()), Some(60_000));
        assert!(buffer.srv().is_none());
        assert_eq!(heaps.cbv_srv_uav.allocated(), 0);
    }

    #[test]
    fn structured_buffer_has_views_and_counter() {
        let (device, mut heaps) = setup();
        let buffer = GpuBuffer::create(&device, &mut heaps, &desc(GpuBufferKind::Structured, 256, 48)).unwrap();
        let counter = buffer.counter().unwrap();
        assert_eq!(device.buffer_size(counter), Some(4));
        let uav_cpu = crate::renderer::api::CpuDescriptorHandle {
            heap: heaps.cbv_srv_uav.id(),
            index: buffer.uav().unwrap().index,
        };
        assert!(matches!(
            device.descriptor(uav_cpu),
            Some(ViewDescriptor::BufferUav {
                kind: BufferViewKind::Structured { stride: 48 },
                counter: Some(_),
                ..
            })
        ));
    }

    #[test]
    fn typed_and_raw_buffers_have_no_counter() {
        let (device, mut heaps) = setup();
        let typed = GpuBuffer::create(
            &device,
            &mut heaps,
            &desc(GpuBufferKind::Typed(TextureFormat::R32Uint), 64, 4),
        )
        .unwrap();
        let raw = GpuBuffer::create(&device, &mut heaps, &desc(GpuBufferKind::ByteAddress, 64, 4)).unwrap();
        assert!(typed.counter().is_none() && raw.counter().is_none());
        assert!(matches!(raw.srv_view(), ViewDescriptor::BufferSrv { kind: BufferViewKind::Raw, .. }));
    }

    #[test]
    fn initial_data_goes_through_uploader() {
        let (device, mut heaps) = setup();
        let uploader = RecordingUploader::default();
        let buffer = GpuBuffer::create_with_data(
            &device,
            &mut heaps,
            &uploader,
            &desc(GpuBufferKind::ByteAddress, 16, 4),
            &[7u8; 64],
        )
        .unwrap();
        assert_eq!(*uploader.uploads.borrow(), vec![(buffer.buffer(), 0, 64)]);

        let too_big = GpuBuffer::create_with_data(
            &device,
            &mut heaps,
            &uploader,
            &desc(GpuBufferKind::ByteAddress, 1, 4),
            &[0u8; 8],
        );
        assert!(too_big.is_err());
    }

    #[test]
    fn placed_buffers_must_not_overlap() {
        let (device, mut heaps) = setup();
        let mut heap = GpuHeap::new(
            &device,
            "Heap",
            2 * PLACEMENT_ALIGNMENT,
            MemoryLocation::GpuOnly,
            BufferUsage::STORAGE,
        )
        .unwrap();
        let first = GpuBuffer::create_placed(
            &device,
            &mut heaps,
            &mut heap,
            0,
            &desc(GpuBufferKind::VertexIndex, 1024, 64),
        )
        .unwrap();
        assert_eq!(first.placement(), Some((heap.id(), 0)));
        assert_eq!(device.buffer_placement(first.buffer()), Some((heap.id(), 0)));

        let overlapping = GpuBuffer::create_placed(
            &device,
            &mut heaps,
            &mut heap,
            0,
            &desc(GpuBufferKind::VertexIndex, 16, 4),
        );
        assert!(matches!(overlapping, Err(ResourceError::RegionOverlap { .. })));

        GpuBuffer::create_placed(
            &device,
            &mut heaps,
            &mut heap,
            PLACEMENT_ALIGNMENT,
            &desc(GpuBufferKind::VertexIndex, 16, 4),
        )
        .unwrap();

        first.destroy(&device, Some(&mut heap)).unwrap();
        assert_eq!(heap.placement_count(), 1);
    }

    #[test]
    fn failed_placement_frees_region_and_buffers() {
        let device = MockDevice::new();
        let mut heaps = DescriptorHeaps::new(
            &device,
            &DescriptorHeapCapacities {
                cbv_srv_uav: 1,
                ..Default::default()
            },
        )
        .unwrap();
        let mut heap = GpuHeap::new(
            &device,
            "Heap",
            PLACEMENT_ALIGNMENT,
            MemoryLocation::GpuOnly,
            BufferUsage::STORAGE,
        )
        .unwrap();
        let live = device.live_buffer_count();

        let result = GpuBuffer::create_placed(
            &device,
            &mut heaps,
            &mut heap,
            0,
            &desc(GpuBufferKind::Structured, 16, 16),
        );
        assert!(matches!(result, Err(ResourceError::DescriptorHeapExhausted { .. })));
        assert_eq!(heap.placement_count(), 0);
        assert_eq!(device.live_buffer_count(), live);

        let raw = GpuBuffer::create_placed(
            &device,
            &mut heaps,
            &mut heap,
            0,
            &desc(GpuBufferKind::VertexIndex, 16, 16),
        )
        .unwrap();
        assert_eq!(raw.placement(), Some((heap.id(), 0)));
    }
}
