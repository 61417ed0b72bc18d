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

//! Append-only vertex and index mega-buffers shared by every mesh.

use bytemuck::Pod;
use pyre_core::renderer::api::{BufferUsage, IndexFormat, Vertex};
use pyre_core::renderer::{
    DescriptorHeaps, GpuBuffer, GpuBufferDescriptor, GpuBufferKind, GraphicsDevice, RenderError,
    ResourceError, ResourceUploader,
};
use pyre_core::scene::{GpuMesh, MeshData};
use pyre_lanes::GeometryViews;
use std::borrow::Cow;
use std::marker::PhantomData;

/// A fixed-capacity GPU buffer filled front to back with elements of `T`.
///
/// Elements are only ever appended; [`VertexBufferRenderer::clear`] rewinds the
/// write cursor to the pinned prefix without touching the GPU memory.
#[derive(Debug)]
pub struct VertexBufferRenderer<T: Pod> {
    buffer: GpuBuffer,
    // Elements written so far.
    count: u32,
    // Elements that survive `clear`.
    pinned: u32,
    _element: PhantomData<T>,
}

impl<T: Pod> VertexBufferRenderer<T> {
    /// Wraps an empty buffer whose element size is `size_of::<T>()`.
    pub fn new(buffer: GpuBuffer) -> Self {
        debug_assert_eq!(buffer.element_size() as usize, std::mem::size_of::<T>());
        Self {
            buffer,
            count: 0,
            pinned: 0,
            _element: PhantomData,
        }
    }

    /// Uploads `elements` after the last appended element and returns the index of
    /// the first one.
    ///
    /// # Errors
    ///
    /// [`ResourceError::OutOfBounds`] when the elements do not fit; nothing is
    /// written in that case.
    pub fn append(&mut self, uploader: &dyn ResourceUploader, elements: &[T]) -> Result<u32, RenderError> {
        let first = self.count;
        if elements.len() as u64 > u64::from(self.remaining()) {
            return Err(ResourceError::OutOfBounds.into());
        }
        let offset = u64::from(first) * u64::from(self.buffer.element_size());
        uploader.upload_to_buffer(self.buffer.buffer(), offset, bytemuck::cast_slice(elements))?;
        self.count += elements.len() as u32;
        Ok(first)
    }

    /// Elements appended so far.
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Capacity in elements.
    pub fn capacity(&self) -> u32 {
        self.buffer.element_count()
    }

    /// Elements that still fit.
    pub fn remaining(&self) -> u32 {
        self.capacity() - self.count
    }

    /// The underlying buffer.
    pub fn buffer(&self) -> &GpuBuffer {
        &self.buffer
    }

    /// Keeps every element written so far across [`VertexBufferRenderer::clear`].
    pub fn pin(&mut self) {
        self.pinned = self.count;
    }

    /// Rewinds the write cursor to the end of the pinned elements.
    pub fn clear(&mut self) {
        self.count = self.pinned;
    }

    /// Releases the buffer.
    pub fn destroy(self, device: &dyn GraphicsDevice) -> Result<(), ResourceError> {
        self.buffer.destroy(device, None)
    }
}

/// The vertex and index mega-buffers every resident mesh lives in.
#[derive(Debug)]
pub struct MegaBuffers {
    vertices: VertexBufferRenderer<Vertex>,
    indices: VertexBufferRenderer<u32>,
}

impl MegaBuffers {
    /// Allocates both buffers at their full capacity.
    pub fn new(
        device: &dyn GraphicsDevice,
        heaps: &mut DescriptorHeaps,
        vertex_capacity: u32,
        index_capacity: u32,
    ) -> Result<Self, ResourceError> {
        let vertices = GpuBuffer::create(
            device,
            heaps,
            &GpuBufferDescriptor {
                label: Cow::Borrowed("Vertex Mega-Buffer"),
                element_count: vertex_capacity,
                element_size: Vertex::STRIDE,
                kind: GpuBufferKind::VertexIndex,
                // Meshlet dispatches read vertices as raw storage.
                extra_usage: BufferUsage::STORAGE,
            },
        )?;
        let indices = GpuBuffer::create(
            device,
            heaps,
            &GpuBufferDescriptor {
                label: Cow::Borrowed("Index Mega-Buffer"),
                element_count: index_capacity,
                element_size: 4,
                kind: GpuBufferKind::VertexIndex,
                extra_usage: BufferUsage::NONE,
            },
        )?;
        log::info!(
            "Created mega-buffers for {vertex_capacity} vertices and {index_capacity} indices"
        );
        Ok(Self {
            vertices: VertexBufferRenderer::new(vertices),
            indices: VertexBufferRenderer::new(indices),
        })
    }

    /// Appends a mesh and returns where it landed.
    ///
    /// Indices are stored as given, relative to the mesh's first vertex; draws add
    /// [`GpuMesh::base_vertex`]. Both buffers are checked before anything is
    /// written, so a mesh that does not fit leaves them untouched.
    pub fn upload_mesh(&mut self, uploader: &dyn ResourceUploader, mesh: &MeshData) -> Result<GpuMesh, RenderError> {
        if mesh.vertices.len() as u64 > u64::from(self.vertices.remaining())
            || mesh.indices.len() as u64 > u64::from(self.indices.remaining())
        {
            log::error!(
                "Mesh '{}' ({} vertices, {} indices) does not fit in the mega-buffers ({} vertices, {} indices left)",
                mesh.name,
                mesh.vertices.len(),
                mesh.indices.len(),
                self.vertices.remaining(),
                self.indices.remaining()
            );
            return Err(ResourceError::OutOfBounds.into());
        }
        let base_vertex = self.vertices.append(uploader, &mesh.vertices)?;
        let first_index = self.indices.append(uploader, &mesh.indices)?;
        log::debug!(
            "Uploaded mesh '{}' at vertex {base_vertex}, index {first_index}",
            mesh.name
        );
        Ok(GpuMesh {
            base_vertex,
            vertex_count: mesh.vertices.len() as u32,
            first_index,
            index_count: mesh.indices.len() as u32,
            submeshes: mesh.submeshes.clone(),
        })
    }

    /// Views over the written part of both buffers, `None` while empty.
    pub fn views(&self) -> Option<GeometryViews> {
        if self.indices.count() == 0 {
            return None;
        }
        Some(GeometryViews {
            vertex: self.vertices.buffer().vertex_buffer_view(0, self.vertices.count()),
            index: self.indices.buffer().index_buffer_view(IndexFormat::Uint32),
        })
    }

    /// The vertex buffer.
    pub fn vertices(&self) -> &VertexBufferRenderer<Vertex> {
        &self.vertices
    }

    /// The index buffer.
    pub fn indices(&self) -> &VertexBufferRenderer<u32> {
        &self.indices
    }

    /// Makes every mesh uploaded so far survive [`MegaBuffers::clear`].
    pub fn pin(&mut self) {
        self.vertices.pin();
        self.indices.pin();
    }

    /// Forgets every unpinned mesh. The GPU must no longer read their contents.
    pub fn clear(&mut self) {
        self.vertices.clear();
        self.indices.clear();
    }

    /// Releases both buffers.
    pub fn destroy(self, device: &dyn GraphicsDevice) -> Result<(), ResourceError> {
        self.vertices.destroy(device)?;
        self.indices.destroy(device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render_agent::uploader::SyncUploader;
    use pyre_core::config::DescriptorHeapCapacities;
    use pyre_core::renderer::CommandQueueManager;
    use pyre_core::testing::MockDevice;
    use std::sync::Arc;

    fn setup(vertex_capacity: u32, index_capacity: u32) -> (Arc<MockDevice>, SyncUploader, MegaBuffers) {
        let device = Arc::new(MockDevice::new());
        let queues = Arc::new(CommandQueueManager::new(device.clone()).unwrap());
        let uploader = SyncUploader::new(device.clone(), queues);
        let mut heaps = DescriptorHeaps::new(device.as_ref(), &DescriptorHeapCapacities::default()).unwrap();
        let buffers = MegaBuffers::new(device.as_ref(), &mut heaps, vertex_capacity, index_capacity).unwrap();
        (device, uploader, buffers)
    }

    #[test]
    fn meshes_are_placed_back_to_back() {
        let (_device, uploader, mut buffers) = setup(100, 200);
        assert!(buffers.views().is_none());

        let first = buffers.upload_mesh(&uploader, &MeshData::cube()).unwrap();
        let second = buffers.upload_mesh(&uploader, &MeshData::plane(2.0)).unwrap();

        assert_eq!((first.base_vertex, first.first_index), (0, 0));
        assert_eq!((second.base_vertex, second.first_index), (24, 36));
        assert_eq!(second.index_count, 6);
        assert_eq!(buffers.vertices().count(), 28);

        let views = buffers.views().unwrap();
        assert_eq!(views.vertex.size, 28 * u64::from(Vertex::STRIDE));
        assert_eq!(views.vertex.stride, Vertex::STRIDE);
        assert_eq!(views.index.format, IndexFormat::Uint32);
    }

    #[test]
    fn overflowing_mesh_leaves_buffers_untouched() {
        let (device, uploader, mut buffers) = setup(30, 40);
        buffers.upload_mesh(&uploader, &MeshData::cube()).unwrap();
        device.clear_executed();

        let result = buffers.upload_mesh(&uploader, &MeshData::cube());
        assert!(matches!(result, Err(RenderError::ResourceError(ResourceError::OutOfBounds))));
        assert_eq!(buffers.vertices().count(), 24);
        assert_eq!(buffers.indices().count(), 36);
        assert!(device.executed_lists().is_empty());
    }

    #[test]
    fn clear_rewinds_both_cursors() {
        let (_device, uploader, mut buffers) = setup(100, 200);
        buffers.upload_mesh(&uploader, &MeshData::cube()).unwrap();
        buffers.clear();
        let mesh = buffers.upload_mesh(&uploader, &MeshData::plane(1.0)).unwrap();
        assert_eq!((mesh.base_vertex, mesh.first_index), (0, 0));
    }

    #[test]
    fn pinned_meshes_survive_clear() {
        let (_device, uploader, mut buffers) = setup(100, 200);
        buffers.upload_mesh(&uploader, &MeshData::cube()).unwrap();
        buffers.pin();
        buffers.upload_mesh(&uploader, &MeshData::plane(1.0)).unwrap();

        buffers.clear();
        assert_eq!(buffers.vertices().count(), 24);
        let mesh = buffers.upload_mesh(&uploader, &MeshData::plane(1.0)).unwrap();
        assert_eq!((mesh.base_vertex, mesh.first_index), (24, 36));
    }
}
