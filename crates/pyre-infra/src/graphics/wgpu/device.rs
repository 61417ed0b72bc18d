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

//! The `wgpu` implementation of [`GraphicsDevice`].

use super::binding::{build_root_signature, BindingKey, RootSignatureEntry};
use super::command::CommandReplayer;
use super::conversions::{buffer_usages, texture_usages, IntoWgpu};
use super::fence::EmulatedFence;
use pyre_core::renderer::api::*;
use pyre_core::renderer::{
    GraphicsDevice, PipelineError, RenderError, ResourceError, ShaderError,
};
use std::collections::HashMap;
use std::num::NonZeroU64;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// A buffer as seen by the rest of the backend. Placed buffers share the heap's
/// `wgpu` buffer and start at a non-zero offset inside it.
#[derive(Debug)]
pub(crate) struct BufferEntry {
    pub(crate) buffer: Arc<wgpu::Buffer>,
    pub(crate) offset: u64,
    pub(crate) size: u64,
}

#[derive(Debug)]
struct HeapEntry {
    buffer: Arc<wgpu::Buffer>,
    size: u64,
    usage: BufferUsage,
}

#[derive(Debug)]
enum TextureEntry {
    Owned(wgpu::Texture),
    /// Resolves to whichever surface texture is currently acquired.
    BackBuffer,
}

#[derive(Debug)]
struct DescriptorTable {
    kind: DescriptorHeapKind,
    slots: Vec<Option<ViewDescriptor>>,
}

#[derive(Debug, Clone)]
pub(crate) enum PipelineEntry {
    Render(Arc<wgpu::RenderPipeline>),
    Compute(Arc<wgpu::ComputePipeline>),
}

/// A resolved depth-stencil attachment.
#[derive(Debug)]
pub(crate) struct DepthAttachment {
    pub(crate) view: wgpu::TextureView,
    pub(crate) read_only_depth: bool,
    pub(crate) read_only_stencil: bool,
    pub(crate) has_stencil: bool,
}

type BindGroupKey = (RootSignatureId, u32, BindingKey);

enum BoundResource {
    Buffer {
        buffer: Arc<wgpu::Buffer>,
        offset: u64,
        size: Option<NonZeroU64>,
    },
    View(wgpu::TextureView),
}

/// The internal, non-clonable state of the [`WgpuDevice`].
#[derive(Debug)]
pub struct WgpuDeviceInternal {
    device: wgpu::Device,
    queue: wgpu::Queue,
    capabilities: DeviceCapabilities,
    limits: wgpu::Limits,

    buffers: Mutex<HashMap<BufferId, BufferEntry>>,
    heaps: Mutex<HashMap<HeapId, HeapEntry>>,
    textures: Mutex<HashMap<TextureId, TextureEntry>>,
    descriptor_tables: Mutex<HashMap<DescriptorHeapId, DescriptorTable>>,
    shader_modules: Mutex<HashMap<ShaderModuleId, Arc<wgpu::ShaderModule>>>,
    root_signatures: Mutex<HashMap<RootSignatureId, Arc<RootSignatureEntry>>>,
    pipelines: Mutex<HashMap<PipelineStateId, PipelineEntry>>,
    allocators: Mutex<HashMap<CommandAllocatorId, CommandListType>>,
    fences: Mutex<HashMap<FenceId, Arc<EmulatedFence>>>,
    bind_groups: Mutex<HashMap<BindGroupKey, Arc<wgpu::BindGroup>>>,
    /// The surface texture acquired for the current frame, if any.
    back_buffer: Mutex<Option<wgpu::Texture>>,

    next_id: AtomicUsize,
}

/// A clonable, thread-safe handle to the `wgpu` device.
///
/// The D3D12-style contract of [`GraphicsDevice`] is emulated on top of `wgpu`:
/// descriptor heaps are CPU-side tables resolved into bind groups at draw time,
/// command lists are replayed into `wgpu` encoders on submission and fences are
/// backed by submission indices.
#[derive(Clone, Debug)]
pub struct WgpuDevice {
    internal: Arc<WgpuDeviceInternal>,
}

fn lock<'a, T>(mutex: &'a Mutex<T>, what: &str) -> Result<MutexGuard<'a, T>, ResourceError> {
    mutex
        .lock()
        .map_err(|e| ResourceError::BackendError(format!("Mutex poisoned ({what}): {e}")))
}

impl WgpuDevice {
    /// Wraps a created device and queue.
    pub fn new(device: wgpu::Device, queue: wgpu::Queue, capabilities: DeviceCapabilities) -> Self {
        let limits = device.limits();
        Self {
            internal: Arc::new(WgpuDeviceInternal {
                device,
                queue,
                capabilities,
                limits,
                buffers: Mutex::new(HashMap::new()),
                heaps: Mutex::new(HashMap::new()),
                textures: Mutex::new(HashMap::new()),
                descriptor_tables: Mutex::new(HashMap::new()),
                shader_modules: Mutex::new(HashMap::new()),
                root_signatures: Mutex::new(HashMap::new()),
                pipelines: Mutex::new(HashMap::new()),
                allocators: Mutex::new(HashMap::new()),
                fences: Mutex::new(HashMap::new()),
                bind_groups: Mutex::new(HashMap::new()),
                back_buffer: Mutex::new(None),
                next_id: AtomicUsize::new(1),
            }),
        }
    }

    fn next_id(&self) -> usize {
        self.internal.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// The underlying `wgpu` device.
    pub fn raw_device(&self) -> &wgpu::Device {
        &self.internal.device
    }

    /// Registers a texture id that resolves to the acquired surface texture.
    pub(crate) fn register_back_buffer(&self) -> Result<TextureId, ResourceError> {
        let id = TextureId(self.next_id());
        lock(&self.internal.textures, "textures")?.insert(id, TextureEntry::BackBuffer);
        Ok(id)
    }

    /// Sets or clears the surface texture back-buffer ids resolve to.
    pub(crate) fn set_back_buffer(&self, texture: Option<wgpu::Texture>) {
        let mut current = self
            .internal
            .back_buffer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *current = texture;
    }

    fn invalidate_bind_groups(&self) -> Result<(), ResourceError> {
        lock(&self.internal.bind_groups, "bind_groups")?.clear();
        Ok(())
    }

    pub(crate) fn buffer(&self, id: BufferId) -> Result<(Arc<wgpu::Buffer>, u64, u64), ResourceError> {
        let buffers = lock(&self.internal.buffers, "buffers")?;
        let entry = buffers.get(&id).ok_or(ResourceError::NotFound)?;
        Ok((Arc::clone(&entry.buffer), entry.offset, entry.size))
    }

    pub(crate) fn texture(&self, id: TextureId) -> Result<wgpu::Texture, ResourceError> {
        let textures = lock(&self.internal.textures, "textures")?;
        match textures.get(&id).ok_or(ResourceError::NotFound)? {
            TextureEntry::Owned(texture) => Ok(texture.clone()),
            TextureEntry::BackBuffer => lock(&self.internal.back_buffer, "back_buffer")?
                .clone()
                .ok_or_else(|| {
                    ResourceError::BackendError("back buffer used outside of an acquired frame".into())
                }),
        }
    }

    fn descriptor(&self, heap: DescriptorHeapId, index: u32) -> Result<ViewDescriptor, ResourceError> {
        let tables = lock(&self.internal.descriptor_tables, "descriptor_tables")?;
        tables
            .get(&heap)
            .ok_or(ResourceError::NotFound)?
            .slots
            .get(index as usize)
            .cloned()
            .flatten()
            .ok_or(ResourceError::InvalidHandle)
    }

    pub(crate) fn root_signature(
        &self,
        id: RootSignatureId,
    ) -> Result<Arc<RootSignatureEntry>, ResourceError> {
        lock(&self.internal.root_signatures, "root_signatures")?
            .get(&id)
            .cloned()
            .ok_or(PipelineError::InvalidRootSignature { id }.into())
    }

    pub(crate) fn pipeline(&self, id: PipelineStateId) -> Result<PipelineEntry, ResourceError> {
        lock(&self.internal.pipelines, "pipelines")?
            .get(&id)
            .cloned()
            .ok_or(ResourceError::NotFound)
    }

    /// Resolves a render-target descriptor into an attachment view.
    pub(crate) fn render_target_view(
        &self,
        handle: CpuDescriptorHandle,
    ) -> Result<wgpu::TextureView, ResourceError> {
        match self.descriptor(handle.heap, handle.index)? {
            ViewDescriptor::RenderTarget {
                texture,
                format,
                mip_level,
            } => Ok(self.texture(texture)?.create_view(&wgpu::TextureViewDescriptor {
                label: Some("Pyre RTV"),
                format: Some(format.into_wgpu()),
                dimension: Some(wgpu::TextureViewDimension::D2),
                base_mip_level: mip_level,
                mip_level_count: Some(1),
                ..Default::default()
            })),
            _ => Err(ResourceError::InvalidHandle),
        }
    }

    /// Resolves a depth-stencil descriptor into an attachment view.
    pub(crate) fn depth_stencil_view(
        &self,
        handle: CpuDescriptorHandle,
    ) -> Result<DepthAttachment, ResourceError> {
        match self.descriptor(handle.heap, handle.index)? {
            ViewDescriptor::DepthStencil {
                texture,
                format,
                read_only_depth,
                read_only_stencil,
            } => Ok(DepthAttachment {
                view: self.texture(texture)?.create_view(&wgpu::TextureViewDescriptor {
                    label: Some("Pyre DSV"),
                    format: Some(format.into_wgpu()),
                    dimension: Some(wgpu::TextureViewDimension::D2),
                    mip_level_count: Some(1),
                    ..Default::default()
                }),
                read_only_depth,
                read_only_stencil,
                has_stencil: format.has_stencil(),
            }),
            _ => Err(ResourceError::InvalidHandle),
        }
    }

    /// A plain single-mip 2-D view, used for resolves.
    pub(crate) fn attachment_view(&self, id: TextureId) -> Result<wgpu::TextureView, ResourceError> {
        Ok(self.texture(id)?.create_view(&wgpu::TextureViewDescriptor {
            label: Some("Pyre Resolve View"),
            dimension: Some(wgpu::TextureViewDimension::D2),
            mip_level_count: Some(1),
            ..Default::default()
        }))
    }

    fn bound_buffer(
        &self,
        buffer: BufferId,
        offset: u64,
        size: Option<u64>,
        uniform: bool,
    ) -> Result<BoundResource, ResourceError> {
        let (raw, base, total) = self.buffer(buffer)?;
        if offset >= total {
            return Err(ResourceError::OutOfBounds);
        }
        let mut size = size.unwrap_or(total - offset).min(total - offset);
        if uniform {
            size = size.min(u64::from(self.internal.limits.max_uniform_buffer_binding_size));
        }
        Ok(BoundResource::Buffer {
            buffer: raw,
            offset: base + offset,
            size: NonZeroU64::new(size),
        })
    }

    fn bound_view(&self, view: &ViewDescriptor) -> Result<BoundResource, ResourceError> {
        match *view {
            ViewDescriptor::TextureSrv {
                texture,
                format,
                dimension,
                aspect,
                base_mip,
                mip_count,
            } => {
                let array_layer_count = match dimension {
                    TextureViewDimension::Cube => Some(6),
                    _ => Some(1),
                };
                Ok(BoundResource::View(self.texture(texture)?.create_view(
                    &wgpu::TextureViewDescriptor {
                        label: Some("Pyre SRV"),
                        format: Some(format.into_wgpu()),
                        dimension: Some(dimension.into_wgpu()),
                        aspect: aspect.into_wgpu(),
                        base_mip_level: base_mip,
                        mip_level_count: Some(mip_count),
                        array_layer_count,
                        ..Default::default()
                    },
                )))
            }
            ViewDescriptor::TextureUav {
                texture,
                format,
                mip_level,
            } => Ok(BoundResource::View(self.texture(texture)?.create_view(
                &wgpu::TextureViewDescriptor {
                    label: Some("Pyre UAV"),
                    format: Some(format.into_wgpu()),
                    dimension: Some(wgpu::TextureViewDimension::D2),
                    base_mip_level: mip_level,
                    mip_level_count: Some(1),
                    ..Default::default()
                },
            ))),
            ViewDescriptor::BufferSrv {
                buffer,
                offset,
                size,
                ..
            }
            | ViewDescriptor::BufferUav {
                buffer,
                offset,
                size,
                ..
            } => self.bound_buffer(buffer, offset, Some(size), false),
            ViewDescriptor::ConstantBuffer {
                buffer,
                offset,
                size,
            } => self.bound_buffer(buffer, offset, Some(size), true),
            ViewDescriptor::RenderTarget { .. } | ViewDescriptor::DepthStencil { .. } => {
                Err(ResourceError::InvalidHandle)
            }
        }
    }

    /// Returns the bind group index and bind group for a root parameter binding.
    ///
    /// Bind groups are cached per `(root signature, slot, binding)` until the next
    /// descriptor write or resource destruction.
    pub(crate) fn bind_group(
        &self,
        root_signature: RootSignatureId,
        slot: u32,
        binding: &RootBinding,
    ) -> Result<(u32, Arc<wgpu::BindGroup>), ResourceError> {
        let entry = self.root_signature(root_signature)?;
        let (Some(group_index), Some(Some(layout))) = (
            entry.descriptor.bind_group_index(slot),
            entry.group_layouts.get(slot as usize),
        ) else {
            return Err(ResourceError::InvalidHandle);
        };

        let key = match *binding {
            RootBinding::ConstantBuffer { buffer, offset }
            | RootBinding::ShaderResource { buffer, offset } => {
                BindingKey::Buffer { buffer, offset }
            }
            RootBinding::DescriptorTable(base) => BindingKey::Table(base),
            RootBinding::Constants { .. } => return Err(ResourceError::InvalidHandle),
        };
        if let Some(group) = lock(&self.internal.bind_groups, "bind_groups")?.get(&(root_signature, slot, key)) {
            return Ok((group_index, Arc::clone(group)));
        }

        let parameter = &entry.descriptor.parameters[slot as usize];
        let resources: Vec<BoundResource> = match (parameter, key) {
            (RootParameter::ConstantBuffer { .. }, BindingKey::Buffer { buffer, offset }) => {
                vec![self.bound_buffer(buffer, offset, None, true)?]
            }
            (RootParameter::ShaderResource { .. }, BindingKey::Buffer { buffer, offset }) => {
                vec![self.bound_buffer(buffer, offset, None, false)?]
            }
            (RootParameter::DescriptorTable { .. }, BindingKey::Table(base)) => (0..parameter
                .table_size())
                .map(|i| {
                    let view = self.descriptor(base.heap, base.index + i)?;
                    self.bound_view(&view)
                })
                .collect::<Result<_, _>>()?,
            _ => return Err(ResourceError::InvalidHandle),
        };

        let entries: Vec<wgpu::BindGroupEntry> = resources
            .iter()
            .enumerate()
            .map(|(binding, resource)| wgpu::BindGroupEntry {
                binding: binding as u32,
                resource: match resource {
                    BoundResource::Buffer {
                        buffer,
                        offset,
                        size,
                    } => wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                        buffer,
                        offset: *offset,
                        size: *size,
                    }),
                    BoundResource::View(view) => wgpu::BindingResource::TextureView(view),
                },
            })
            .collect();
        let group = Arc::new(self.internal.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: entry.descriptor.label.as_deref(),
            layout,
            entries: &entries,
        }));
        lock(&self.internal.bind_groups, "bind_groups")?
            .insert((root_signature, slot, key), Arc::clone(&group));
        Ok((group_index, group))
    }

    fn shader_module(&self, id: ShaderModuleId) -> Result<Arc<wgpu::ShaderModule>, ResourceError> {
        lock(&self.internal.shader_modules, "shader_modules")?
            .get(&id)
            .cloned()
            .ok_or(ShaderError::NotFound { id }.into())
    }

    /// Runs `create` inside a validation error scope and turns a captured error into `on_error`.
    fn scoped<T>(
        &self,
        create: impl FnOnce(&wgpu::Device) -> T,
        on_error: impl FnOnce(String) -> ResourceError,
    ) -> Result<T, ResourceError> {
        self.internal
            .device
            .push_error_scope(wgpu::ErrorFilter::Validation);
        let value = create(&self.internal.device);
        match pollster::block_on(self.internal.device.pop_error_scope()) {
            Some(error) => Err(on_error(error.to_string())),
            None => Ok(value),
        }
    }

    fn fence(&self, id: FenceId) -> Result<Arc<EmulatedFence>, RenderError> {
        lock(&self.internal.fences, "fences")?
            .get(&id)
            .cloned()
            .ok_or(RenderError::ResourceError(ResourceError::NotFound))
    }
}

impl GraphicsDevice for WgpuDevice {
    fn capabilities(&self) -> DeviceCapabilities {
        self.internal.capabilities.clone()
    }

    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<BufferId, ResourceError> {
        let size = align_up(descriptor.size.max(4), wgpu::COPY_BUFFER_ALIGNMENT);
        let buffer = self.internal.device.create_buffer(&wgpu::BufferDescriptor {
            label: descriptor.label.as_deref(),
            size,
            usage: buffer_usages(descriptor.usage, descriptor.memory),
            mapped_at_creation: false,
        });
        let id = BufferId(self.next_id());
        lock(&self.internal.buffers, "buffers")?.insert(
            id,
            BufferEntry {
                buffer: Arc::new(buffer),
                offset: 0,
                size,
            },
        );
        log::trace!(
            "WgpuDevice: Created buffer {:?} ({} bytes, label {:?})",
            id,
            size,
            descriptor.label
        );
        Ok(id)
    }

    fn create_heap(&self, descriptor: &HeapDescriptor) -> Result<HeapId, ResourceError> {
        let buffer = self.internal.device.create_buffer(&wgpu::BufferDescriptor {
            label: descriptor.label.as_deref(),
            size: align_up(descriptor.size, wgpu::COPY_BUFFER_ALIGNMENT),
            usage: buffer_usages(descriptor.usage, descriptor.memory),
            mapped_at_creation: false,
        });
        let id = HeapId(self.next_id());
        lock(&self.internal.heaps, "heaps")?.insert(
            id,
            HeapEntry {
                buffer: Arc::new(buffer),
                size: descriptor.size,
                usage: descriptor.usage,
            },
        );
        log::debug!(
            "WgpuDevice: Created heap {:?} of {} bytes (label {:?})",
            id,
            descriptor.size,
            descriptor.label
        );
        Ok(id)
    }

    fn create_placed_buffer(
        &self,
        heap: HeapId,
        offset: u64,
        descriptor: &BufferDescriptor,
    ) -> Result<BufferId, ResourceError> {
        let heaps = lock(&self.internal.heaps, "heaps")?;
        let heap_entry = heaps.get(&heap).ok_or(ResourceError::NotFound)?;
        if offset % PLACEMENT_ALIGNMENT != 0 {
            return Err(ResourceError::MisalignedPlacement {
                offset,
                alignment: PLACEMENT_ALIGNMENT,
            });
        }
        let size = align_up(descriptor.size, wgpu::COPY_BUFFER_ALIGNMENT);
        if offset + size > heap_entry.size {
            return Err(ResourceError::RegionOverlap { offset, size });
        }
        if !heap_entry.usage.contains(descriptor.usage) {
            return Err(ResourceError::BackendError(format!(
                "placed buffer usage {:?} exceeds heap usage {:?}",
                descriptor.usage, heap_entry.usage
            )));
        }
        let buffer = Arc::clone(&heap_entry.buffer);
        drop(heaps);

        let id = BufferId(self.next_id());
        lock(&self.internal.buffers, "buffers")?.insert(
            id,
            BufferEntry {
                buffer,
                offset,
                size,
            },
        );
        Ok(id)
    }

    fn destroy_buffer(&self, id: BufferId) -> Result<(), ResourceError> {
        let entry = lock(&self.internal.buffers, "buffers")?
            .remove(&id)
            .ok_or(ResourceError::NotFound)?;
        // Placed buffers share the heap allocation, which stays alive.
        if entry.offset == 0 && Arc::strong_count(&entry.buffer) == 1 {
            entry.buffer.destroy();
        }
        self.invalidate_bind_groups()
    }

    fn write_buffer(&self, id: BufferId, offset: u64, data: &[u8]) -> Result<(), ResourceError> {
        let (buffer, base, size) = self.buffer(id)?;
        if offset + data.len() as u64 > size {
            return Err(ResourceError::OutOfBounds);
        }
        if data.is_empty() {
            return Ok(());
        }
        let padded_len = align_up(data.len() as u64, wgpu::COPY_BUFFER_ALIGNMENT);
        if padded_len == data.len() as u64 {
            self.internal.queue.write_buffer(&buffer, base + offset, data);
        } else {
            let mut padded = data.to_vec();
            padded.resize(padded_len as usize, 0);
            self.internal
                .queue
                .write_buffer(&buffer, base + offset, &padded);
        }
        Ok(())
    }

    fn create_texture(&self, descriptor: &TextureDescriptor) -> Result<TextureId, ResourceError> {
        let texture = self.internal.device.create_texture(&wgpu::TextureDescriptor {
            label: descriptor.label.as_deref(),
            size: wgpu::Extent3d {
                width: descriptor.width.max(1),
                height: descriptor.height.max(1),
                depth_or_array_layers: descriptor.array_layers.max(1),
            },
            mip_level_count: descriptor.mip_levels.max(1),
            sample_count: descriptor.sample_count.max(1),
            dimension: wgpu::TextureDimension::D2,
            format: descriptor.format.into_wgpu(),
            usage: texture_usages(descriptor.usage, descriptor.sample_count),
            view_formats: &[],
        });
        let id = TextureId(self.next_id());
        lock(&self.internal.textures, "textures")?.insert(id, TextureEntry::Owned(texture));
        log::trace!(
            "WgpuDevice: Created texture {:?} ({}x{} {:?}, label {:?})",
            id,
            descriptor.width,
            descriptor.height,
            descriptor.format,
            descriptor.label
        );
        Ok(id)
    }

    fn destroy_texture(&self, id: TextureId) -> Result<(), ResourceError> {
        match lock(&self.internal.textures, "textures")?.remove(&id) {
            Some(TextureEntry::Owned(texture)) => texture.destroy(),
            Some(TextureEntry::BackBuffer) => {}
            None => return Err(ResourceError::NotFound),
        }
        self.invalidate_bind_groups()
    }

    fn create_descriptor_heap(
        &self,
        descriptor: &DescriptorHeapDescriptor,
    ) -> Result<DescriptorHeapId, ResourceError> {
        let id = DescriptorHeapId(self.next_id());
        lock(&self.internal.descriptor_tables, "descriptor_tables")?.insert(
            id,
            DescriptorTable {
                kind: descriptor.kind,
                slots: vec![None; descriptor.capacity as usize],
            },
        );
        Ok(id)
    }

    fn write_descriptor(
        &self,
        handle: CpuDescriptorHandle,
        view: &ViewDescriptor,
    ) -> Result<(), ResourceError> {
        {
            let mut tables = lock(&self.internal.descriptor_tables, "descriptor_tables")?;
            let table = tables.get_mut(&handle.heap).ok_or(ResourceError::NotFound)?;
            if table.kind != view.heap_kind() {
                return Err(ResourceError::InvalidHandle);
            }
            let slot = table
                .slots
                .get_mut(handle.index as usize)
                .ok_or(ResourceError::InvalidHandle)?;
            *slot = Some(view.clone());
        }
        self.invalidate_bind_groups()
    }

    fn create_shader_module(
        &self,
        descriptor: &ShaderModuleDescriptor,
    ) -> Result<ShaderModuleId, ResourceError> {
        let label = descriptor
            .label
            .as_deref()
            .unwrap_or("Pyre Shader")
            .to_string();
        let source = match &descriptor.source {
            ShaderSource::Wgsl(text) => text.clone(),
            ShaderSource::File(path) => {
                if path.extension().and_then(|ext| ext.to_str()) != Some("wgsl") {
                    return Err(ShaderError::LoadError {
                        path: path.display().to_string(),
                        source_error: "the wgpu backend only loads .wgsl sources".into(),
                    }
                    .into());
                }
                std::fs::read_to_string(path)
                    .map_err(|e| ShaderError::LoadError {
                        path: path.display().to_string(),
                        source_error: e.to_string(),
                    })?
                    .into()
            }
        };

        let module = self.scoped(
            |device| {
                device.create_shader_module(wgpu::ShaderModuleDescriptor {
                    label: Some(&label),
                    source: wgpu::ShaderSource::Wgsl(source),
                })
            },
            |details| {
                ShaderError::CompilationError {
                    label: label.clone(),
                    details,
                }
                .into()
            },
        )?;

        let id = ShaderModuleId(self.next_id());
        lock(&self.internal.shader_modules, "shader_modules")?.insert(id, Arc::new(module));
        log::debug!("WgpuDevice: Created shader module '{label}' with ID: {id:?}");
        Ok(id)
    }

    fn create_root_signature(
        &self,
        descriptor: &RootSignatureDescriptor,
    ) -> Result<RootSignatureId, ResourceError> {
        let entry = build_root_signature(&self.internal.device, &self.internal.limits, descriptor)?;
        let id = RootSignatureId(self.next_id());
        lock(&self.internal.root_signatures, "root_signatures")?.insert(id, Arc::new(entry));
        Ok(id)
    }

    fn create_graphics_pipeline(
        &self,
        descriptor: &GraphicsPipelineDescriptor,
    ) -> Result<PipelineStateId, ResourceError> {
        let root = self.root_signature(descriptor.root_signature)?;
        let vertex_module = self.shader_module(descriptor.vertex.module)?;
        let pixel_module = descriptor
            .pixel
            .as_ref()
            .map(|pixel| self.shader_module(pixel.module))
            .transpose()?;

        let attributes: Vec<wgpu::VertexAttribute> = descriptor
            .input_layout
            .iter()
            .flat_map(|layout| layout.elements.iter())
            .map(|element| wgpu::VertexAttribute {
                format: element.format.into_wgpu(),
                offset: u64::from(element.offset),
                shader_location: element.location,
            })
            .collect();
        let vertex_buffers: Vec<wgpu::VertexBufferLayout> = descriptor
            .input_layout
            .iter()
            .map(|layout| wgpu::VertexBufferLayout {
                array_stride: u64::from(layout.stride),
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &attributes,
            })
            .collect();
        let targets: Vec<Option<wgpu::ColorTargetState>> = descriptor
            .color_targets
            .iter()
            .map(|target| {
                Some(wgpu::ColorTargetState {
                    format: target.format.into_wgpu(),
                    blend: target.blend.into_wgpu(),
                    write_mask: wgpu::ColorWrites::ALL,
                })
            })
            .collect();
        let depth_stencil = descriptor
            .depth_stencil
            .map(|state| wgpu::DepthStencilState {
                format: state.format.into_wgpu(),
                depth_write_enabled: state.depth_write,
                depth_compare: state.depth_compare.into_wgpu(),
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState {
                    constant: state.depth_bias,
                    slope_scale: state.slope_scaled_depth_bias,
                    clamp: 0.0,
                },
            });

        let label = descriptor.label.as_deref();
        let pipeline = self.scoped(
            |device| {
                device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                    label,
                    layout: Some(&root.layout),
                    vertex: wgpu::VertexState {
                        module: &vertex_module,
                        entry_point: Some(&descriptor.vertex.entry_point),
                        compilation_options: Default::default(),
                        buffers: &vertex_buffers,
                    },
                    primitive: wgpu::PrimitiveState {
                        topology: descriptor.topology.into_wgpu(),
                        strip_index_format: None,
                        front_face: wgpu::FrontFace::Ccw,
                        cull_mode: descriptor.cull_mode.into_wgpu(),
                        unclipped_depth: false,
                        polygon_mode: wgpu::PolygonMode::Fill,
                        conservative: false,
                    },
                    depth_stencil: depth_stencil.clone(),
                    multisample: wgpu::MultisampleState {
                        count: descriptor.sample_count.max(1),
                        mask: !0,
                        alpha_to_coverage_enabled: false,
                    },
                    fragment: descriptor.pixel.as_ref().zip(pixel_module.as_ref()).map(
                        |(pixel, module)| wgpu::FragmentState {
                            module,
                            entry_point: Some(&pixel.entry_point),
                            compilation_options: Default::default(),
                            targets: &targets,
                        },
                    ),
                    multiview: None,
                    cache: None,
                })
            },
            |details| {
                PipelineError::CompilationFailed {
                    label: label.map(str::to_string),
                    details,
                }
                .into()
            },
        )?;

        let id = PipelineStateId(self.next_id());
        lock(&self.internal.pipelines, "pipelines")?
            .insert(id, PipelineEntry::Render(Arc::new(pipeline)));
        log::debug!("WgpuDevice: Created graphics pipeline {label:?} with ID: {id:?}");
        Ok(id)
    }

    fn create_compute_pipeline(
        &self,
        descriptor: &ComputePipelineDescriptor,
    ) -> Result<PipelineStateId, ResourceError> {
        let root = self.root_signature(descriptor.root_signature)?;
        let module = self.shader_module(descriptor.compute.module)?;
        let label = descriptor.label.as_deref();
        let pipeline = self.scoped(
            |device| {
                device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                    label,
                    layout: Some(&root.layout),
                    module: &module,
                    entry_point: Some(&descriptor.compute.entry_point),
                    compilation_options: Default::default(),
                    cache: None,
                })
            },
            |details| {
                PipelineError::CompilationFailed {
                    label: label.map(str::to_string),
                    details,
                }
                .into()
            },
        )?;

        let id = PipelineStateId(self.next_id());
        lock(&self.internal.pipelines, "pipelines")?
            .insert(id, PipelineEntry::Compute(Arc::new(pipeline)));
        log::debug!("WgpuDevice: Created compute pipeline {label:?} with ID: {id:?}");
        Ok(id)
    }

    fn create_mesh_pipeline(
        &self,
        descriptor: &MeshPipelineDescriptor,
    ) -> Result<PipelineStateId, ResourceError> {
        Err(PipelineError::FeatureNotSupported(format!(
            "mesh pipeline {:?}: the wgpu backend exposes no task/mesh stages",
            descriptor.label
        ))
        .into())
    }

    fn create_command_allocator(
        &self,
        list_type: CommandListType,
    ) -> Result<CommandAllocatorId, ResourceError> {
        let id = CommandAllocatorId(self.next_id());
        lock(&self.internal.allocators, "allocators")?.insert(id, list_type);
        Ok(id)
    }

    fn reset_command_allocator(&self, id: CommandAllocatorId) -> Result<(), ResourceError> {
        // Encoders are created per submission, so there is no memory to recycle.
        lock(&self.internal.allocators, "allocators")?
            .contains_key(&id)
            .then_some(())
            .ok_or(ResourceError::NotFound)
    }

    fn execute_command_lists(
        &self,
        queue: CommandListType,
        lists: &[&CommandList],
    ) -> Result<(), RenderError> {
        let mut command_buffers = Vec::with_capacity(lists.len());
        for list in lists {
            if !list.is_closed() {
                return Err(RenderError::RenderingFailed(format!(
                    "command list '{}' submitted while still open",
                    list.label()
                )));
            }
            if list.list_type() != queue && queue != CommandListType::Direct {
                log::warn!(
                    "WgpuDevice: {:?} list '{}' submitted to the {:?} queue",
                    list.list_type(),
                    list.label(),
                    queue
                );
            }
            command_buffers.push(CommandReplayer::new(self, list.label()).replay(list.commands())?);
        }
        self.internal.queue.submit(command_buffers);
        Ok(())
    }

    fn create_fence(&self, initial_value: u64) -> Result<FenceId, ResourceError> {
        let id = FenceId(self.next_id());
        lock(&self.internal.fences, "fences")?.insert(id, Arc::new(EmulatedFence::new(initial_value)));
        Ok(id)
    }

    fn signal_fence(
        &self,
        _queue: CommandListType,
        fence: FenceId,
        value: u64,
    ) -> Result<(), RenderError> {
        self.fence(fence)?.signal(&self.internal.queue, value)
    }

    fn queue_wait(
        &self,
        _queue: CommandListType,
        fence: FenceId,
        _value: u64,
    ) -> Result<(), RenderError> {
        // Every list type shares the device's single queue, which already runs in order.
        self.fence(fence).map(|_| ())
    }

    fn fence_completed_value(&self, fence: FenceId) -> u64 {
        let Ok(fence) = self.fence(fence) else {
            return 0;
        };
        if let Err(e) = self.internal.device.poll(wgpu::PollType::Poll) {
            log::warn!("WgpuDevice: Non-blocking poll failed: {e}");
        }
        fence.retire();
        fence.completed()
    }

    fn wait_for_fence(&self, fence: FenceId, value: u64) -> Result<(), RenderError> {
        self.fence(fence)?.wait(&self.internal.device, value)
    }
}
