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

use super::GpuResource;
use crate::renderer::api::{
    ClearValue, CpuDescriptorHandle, GpuDescriptorHandle, ResourceKey, ResourceState,
    TextureAspect, TextureDescriptor, TextureDimension, TextureFormat, TextureId, TextureUsage,
    TextureViewDimension, ViewDescriptor,
};
use crate::renderer::descriptor_heap::DescriptorHeaps;
use crate::renderer::error::ResourceError;
use crate::renderer::traits::GraphicsDevice;
use std::borrow::Cow;

/// The four ways a depth buffer can be bound as a depth-stencil target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DepthView {
    /// Depth and stencil writable.
    ReadWrite,
    /// Depth read-only, stencil writable.
    DepthReadOnly,
    /// Depth writable, stencil read-only.
    StencilReadOnly,
    /// Both planes read-only.
    ReadOnly,
}

impl DepthView {
    const fn index(self) -> usize {
        match self {
            Self::ReadWrite => 0,
            Self::DepthReadOnly => 1,
            Self::StencilReadOnly => 2,
            Self::ReadOnly => 3,
        }
    }
}

/// A depth(-stencil) target with its four depth-stencil views and shader-readable
/// depth and stencil views.
///
/// Formats without a stencil plane alias the stencil variants onto the depth ones.
#[derive(Debug)]
pub struct DepthBuffer {
    label: String,
    texture: TextureId,
    width: u32,
    height: u32,
    sample_count: u32,
    format: TextureFormat,
    clear_depth: f32,
    clear_stencil: u8,
    dsvs: [CpuDescriptorHandle; 4],
    depth_srv: GpuDescriptorHandle,
    stencil_srv: GpuDescriptorHandle,
}

impl DepthBuffer {
    /// Allocates the depth texture with the given clear values and writes its views.
    #[allow(clippy::too_many_arguments)]
    pub fn create(
        device: &dyn GraphicsDevice,
        heaps: &mut DescriptorHeaps,
        label: &str,
        width: u32,
        height: u32,
        sample_count: u32,
        format: TextureFormat,
        clear_depth: f32,
        clear_stencil: u8,
    ) -> Result<Self, ResourceError> {
        if !format.is_depth() {
            return Err(ResourceError::BackendError(format!(
                "depth buffer '{label}' created with color format {format:?}"
            )));
        }
        let texture = device.create_texture(&TextureDescriptor {
            label: Some(Cow::Borrowed(label)),
            dimension: TextureDimension::D2,
            width,
            height,
            array_layers: 1,
            mip_levels: 1,
            sample_count,
            format,
            usage: TextureUsage::DEPTH_STENCIL | TextureUsage::SHADER_RESOURCE,
            initial_state: ResourceState::DepthWrite,
            clear_value: Some(ClearValue::DepthStencil {
                depth: clear_depth,
                stencil: clear_stencil,
            }),
        })?;

        let has_stencil = format.has_stencil();
        let dsv_count = if has_stencil { 4 } else { 2 };
        let slots = heaps.dsv.allocate(dsv_count)?;
        let write_dsv = |slot: u32, read_only_depth: bool, read_only_stencil: bool| {
            device.write_descriptor(
                slots.cpu_at(slot),
                &ViewDescriptor::DepthStencil {
                    texture,
                    format,
                    read_only_depth,
                    read_only_stencil,
                },
            )
        };
        write_dsv(0, false, false)?;
        write_dsv(1, true, false)?;
        let dsvs = if has_stencil {
            write_dsv(2, false, true)?;
            write_dsv(3, true, true)?;
            [slots.cpu_at(0), slots.cpu_at(1), slots.cpu_at(2), slots.cpu_at(3)]
        } else {
            [slots.cpu_at(0), slots.cpu_at(1), slots.cpu_at(0), slots.cpu_at(1)]
        };

        let dimension = if sample_count > 1 {
            TextureViewDimension::D2Multisampled
        } else {
            TextureViewDimension::D2
        };
        let srv_slots = heaps.cbv_srv_uav.allocate(if has_stencil { 2 } else { 1 })?;
        let write_srv = |slot: u32, aspect: TextureAspect| {
            device.write_descriptor(
                srv_slots.cpu_at(slot),
                &ViewDescriptor::TextureSrv {
                    texture,
                    format,
                    dimension,
                    aspect,
                    base_mip: 0,
                    mip_count: 1,
                },
            )
        };
        write_srv(0, TextureAspect::DepthOnly)?;
        let depth_srv = srv_slots.gpu_at(0).ok_or(ResourceError::InvalidHandle)?;
        let stencil_srv = if has_stencil {
            write_srv(1, TextureAspect::StencilOnly)?;
            srv_slots.gpu_at(1).ok_or(ResourceError::InvalidHandle)?
        } else {
            depth_srv
        };

        log::debug!("Created depth buffer '{label}' {width}x{height} {format:?} (samples: {sample_count})");

        Ok(Self {
            label: label.to_string(),
            texture,
            width,
            height,
            sample_count,
            format,
            clear_depth,
            clear_stencil,
            dsvs,
            depth_srv,
            stencil_srv,
        })
    }

    /// Releases the texture.
    pub fn destroy(self, device: &dyn GraphicsDevice) -> Result<(), ResourceError> {
        device.destroy_texture(self.texture)
    }

    /// Recreates the texture at a new size and rewrites every view in its existing slot.
    ///
    /// Descriptor handles stay valid. The new texture starts in
    /// [`ResourceState::DepthWrite`] under a new id.
    pub fn resize(&mut self, device: &dyn GraphicsDevice, width: u32, height: u32) -> Result<(), ResourceError> {
        let texture = device.create_texture(&TextureDescriptor {
            label: Some(Cow::Borrowed(self.label.as_str())),
            dimension: TextureDimension::D2,
            width,
            height,
            array_layers: 1,
            mip_levels: 1,
            sample_count: self.sample_count,
            format: self.format,
            usage: TextureUsage::DEPTH_STENCIL | TextureUsage::SHADER_RESOURCE,
            initial_state: ResourceState::DepthWrite,
            clear_value: Some(ClearValue::DepthStencil {
                depth: self.clear_depth,
                stencil: self.clear_stencil,
            }),
        })?;
        device.destroy_texture(self.texture)?;
        self.texture = texture;
        self.width = width;
        self.height = height;

        let has_stencil = self.format.has_stencil();
        let variants = [
            (DepthView::ReadWrite, false, false),
            (DepthView::DepthReadOnly, true, false),
            (DepthView::StencilReadOnly, false, true),
            (DepthView::ReadOnly, true, true),
        ];
        for (view, read_only_depth, read_only_stencil) in variants {
            if !has_stencil && read_only_stencil {
                continue;
            }
            device.write_descriptor(
                self.dsv(view),
                &ViewDescriptor::DepthStencil {
                    texture,
                    format: self.format,
                    read_only_depth,
                    read_only_stencil,
                },
            )?;
        }
        device.write_descriptor(self.depth_srv.cpu(), &self.depth_srv_view())?;
        if has_stencil {
            let mut view = self.depth_srv_view();
            if let ViewDescriptor::TextureSrv { aspect, .. } = &mut view {
                *aspect = TextureAspect::StencilOnly;
            }
            device.write_descriptor(self.stencil_srv.cpu(), &view)?;
        }
        log::debug!("Resized depth buffer '{}' to {width}x{height}", self.label);
        Ok(())
    }

    /// The depth-stencil view for `view`.
    pub fn dsv(&self, view: DepthView) -> CpuDescriptorHandle {
        self.dsvs[view.index()]
    }

    /// Shader-readable depth plane.
    pub fn depth_srv(&self) -> GpuDescriptorHandle {
        self.depth_srv
    }

    /// Shader-readable stencil plane; the depth view when the format has no stencil.
    pub fn stencil_srv(&self) -> GpuDescriptorHandle {
        self.stencil_srv
    }

    /// The view a shader-resource descriptor table slot needs to sample depth.
    pub fn depth_srv_view(&self) -> ViewDescriptor {
        ViewDescriptor::TextureSrv {
            texture: self.texture,
            format: self.format,
            dimension: if self.sample_count > 1 {
                TextureViewDimension::D2Multisampled
            } else {
                TextureViewDimension::D2
            },
            aspect: TextureAspect::DepthOnly,
            base_mip: 0,
            mip_count: 1,
        }
    }

    /// Backend texture.
    pub fn texture(&self) -> TextureId {
        self.texture
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Samples per pixel.
    pub fn sample_count(&self) -> u32 {
        self.sample_count
    }

    /// Depth format.
    pub fn format(&self) -> TextureFormat {
        self.format
    }

    /// Depth clear value.
    pub fn clear_depth(&self) -> f32 {
        self.clear_depth
    }

    /// Stencil clear value.
    pub fn clear_stencil(&self) -> u8 {
        self.clear_stencil
    }
}

impl GpuResource for DepthBuffer {
    fn key(&self) -> ResourceKey {
        ResourceKey::Texture(self.texture)
    }

    fn initial_state(&self) -> ResourceState {
        ResourceState::DepthWrite
    }

    fn label(&self) -> &str {
        &self.label
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DescriptorHeapCapacities;
    use crate::testing::MockDevice;

    fn setup() -> (MockDevice, DescriptorHeaps) {
        let device = MockDevice::new();
        let heaps = DescriptorHeaps::new(&device, &DescriptorHeapCapacities::default()).unwrap();
        (device, heaps)
    }

    #[test]
    fn stencil_format_gets_four_distinct_views() {
        let (device, mut heaps) = setup();
        let depth = DepthBuffer::create(
            &device,
            &mut heaps,
            "Depth",
            1280,
            720,
            4,
            TextureFormat::Depth24PlusStencil8,
            1.0,
            0,
        )
        .unwrap();
        assert_eq!(heaps.dsv.allocated(), 4);
        let views = [
            DepthView::ReadWrite,
            DepthView::DepthReadOnly,
            DepthView::StencilReadOnly,
            DepthView::ReadOnly,
        ]
        .map(|v| depth.dsv(v));
        for (i, a) in views.iter().enumerate() {
            for b in &views[i + 1..] {
                assert_ne!(a, b);
            }
        }
        assert_ne!(depth.depth_srv(), depth.stencil_srv());
        assert!(matches!(
            device.descriptor(depth.dsv(DepthView::ReadOnly)),
            Some(ViewDescriptor::DepthStencil {
                read_only_depth: true,
                read_only_stencil: true,
                ..
            })
        ));
    }

    #[test]
    fn depth_only_format_aliases_stencil_views() {
        let (device, mut heaps) = setup();
        let depth = DepthBuffer::create(
            &device,
            &mut heaps,
            "Shadow Map",
            1920,
            1080,
            1,
            TextureFormat::Depth32Float,
            1.0,
            0,
        )
        .unwrap();
        assert_eq!(heaps.dsv.allocated(), 2);
        assert_eq!(depth.dsv(DepthView::StencilReadOnly), depth.dsv(DepthView::ReadWrite));
        assert_eq!(depth.dsv(DepthView::ReadOnly), depth.dsv(DepthView::DepthReadOnly));
        assert_eq!(depth.stencil_srv(), depth.depth_srv());
        assert_eq!(device.texture(depth.texture()).unwrap().initial_state, ResourceState::DepthWrite);
    }

    #[test]
    fn rejects_color_format() {
        let (device, mut heaps) = setup();
        let result = DepthBuffer::create(
            &device,
            &mut heaps,
            "Bad",
            4,
            4,
            1,
            TextureFormat::Rgba8Unorm,
            1.0,
            0,
        );
        assert!(result.is_err());
    }

    #[test]
    fn resize_rewrites_views_in_place() {
        let (device, mut heaps) = setup();
        let mut depth = DepthBuffer::create(
            &device,
            &mut heaps,
            "Depth",
            640,
            480,
            4,
            TextureFormat::Depth24PlusStencil8,
            1.0,
            0,
        )
        .unwrap();
        let old = depth.texture();
        let dsv = depth.dsv(DepthView::DepthReadOnly);

        depth.resize(&device, 800, 600).unwrap();

        assert!(device.texture(old).is_none());
        assert_eq!(heaps.dsv.allocated(), 4);
        assert_eq!(depth.dsv(DepthView::DepthReadOnly), dsv);
        let texture = depth.texture();
        assert!(matches!(
            device.descriptor(dsv),
            Some(ViewDescriptor::DepthStencil { texture: t, read_only_depth: true, .. }) if t == texture
        ));
        assert!(matches!(
            device.descriptor(depth.stencil_srv().cpu()),
            Some(ViewDescriptor::TextureSrv { aspect: TextureAspect::StencilOnly, .. })
        ));
        assert_eq!(device.texture(texture).unwrap().height, 600);
    }
}
