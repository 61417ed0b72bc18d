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

/// Parameters of [`ColorBuffer::create`].
#[derive(Debug, Clone)]
pub struct ColorBufferDescriptor<'a> {
    /// Debug label.
    pub label: Cow<'a, str>,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Number of mip levels; each gets its own unordered-access view.
    pub mip_levels: u32,
    /// Samples per pixel.
    pub sample_count: u32,
    /// Pixel format.
    pub format: TextureFormat,
    /// Optimized clear color.
    pub clear_color: [f32; 4],
}

/// A 2-D render target readable by shaders.
///
/// Single-sample buffers in a format the device can store to also get one
/// unordered-access view per mip. Swap-chain buffers only carry a render-target view.
#[derive(Debug)]
pub struct ColorBuffer {
    label: String,
    texture: TextureId,
    width: u32,
    height: u32,
    mip_levels: u32,
    sample_count: u32,
    format: TextureFormat,
    clear_color: [f32; 4],
    rtv: CpuDescriptorHandle,
    srv: Option<GpuDescriptorHandle>,
    uavs: Vec<GpuDescriptorHandle>,
    swap_chain_buffer: bool,
}

impl ColorBuffer {
    /// Allocates the texture and writes its render-target, shader-resource and
    /// per-mip unordered-access views.
    pub fn create(
        device: &dyn GraphicsDevice,
        heaps: &mut DescriptorHeaps,
        desc: &ColorBufferDescriptor,
    ) -> Result<Self, ResourceError> {
        let mip_levels = desc.mip_levels.max(1);
        let multisampled = desc.sample_count > 1;
        let with_uav = !multisampled && device.capabilities().supports_uav(desc.format);

        let mut usage = TextureUsage::RENDER_TARGET | TextureUsage::SHADER_RESOURCE;
        if with_uav {
            usage |= TextureUsage::UNORDERED_ACCESS;
        }
        if multisampled {
            usage |= TextureUsage::COPY_SRC;
        }

        let texture = device.create_texture(&TextureDescriptor {
            label: Some(Cow::Borrowed(desc.label.as_ref())),
            dimension: TextureDimension::D2,
            width: desc.width,
            height: desc.height,
            array_layers: 1,
            mip_levels,
            sample_count: desc.sample_count,
            format: desc.format,
            usage,
            initial_state: ResourceState::Common,
            clear_value: Some(ClearValue::Color(desc.clear_color)),
        })?;

        let rtv = heaps.rtv.allocate_one()?.cpu;
        device.write_descriptor(
            rtv,
            &ViewDescriptor::RenderTarget {
                texture,
                format: desc.format,
                mip_level: 0,
            },
        )?;

        let srv_slot = heaps.cbv_srv_uav.allocate_one()?;
        device.write_descriptor(
            srv_slot.cpu,
            &ViewDescriptor::TextureSrv {
                texture,
                format: desc.format,
                dimension: if multisampled {
                    TextureViewDimension::D2Multisampled
                } else {
                    TextureViewDimension::D2
                },
                aspect: TextureAspect::All,
                base_mip: 0,
                mip_count: mip_levels,
            },
        )?;
        let srv = srv_slot.gpu.ok_or(ResourceError::InvalidHandle)?;

        let mut uavs = Vec::new();
        if with_uav {
            let slots = heaps.cbv_srv_uav.allocate(mip_levels)?;
            for mip in 0..mip_levels {
                device.write_descriptor(
                    slots.cpu_at(mip),
                    &ViewDescriptor::TextureUav {
                        texture,
                        format: desc.format,
                        mip_level: mip,
                    },
                )?;
                uavs.push(slots.gpu_at(mip).ok_or(ResourceError::InvalidHandle)?);
            }
        }

        log::debug!(
            "Created color buffer '{}' {}x{} {:?} (samples: {}, mips: {}, uav: {})",
            desc.label,
            desc.width,
            desc.height,
            desc.format,
            desc.sample_count,
            mip_levels,
            with_uav
        );

        Ok(Self {
            label: desc.label.to_string(),
            texture,
            width: desc.width,
            height: desc.height,
            mip_levels,
            sample_count: desc.sample_count,
            format: desc.format,
            clear_color: desc.clear_color,
            rtv,
            srv: Some(srv),
            uavs,
            swap_chain_buffer: false,
        })
    }

    /// Wraps a swap-chain back buffer. Only a render-target view is created.
    pub fn create_from_swap_chain(
        device: &dyn GraphicsDevice,
        heaps: &mut DescriptorHeaps,
        label: &str,
        texture: TextureId,
        width: u32,
        height: u32,
        format: TextureFormat,
    ) -> Result<Self, ResourceError> {
        let rtv = heaps.rtv.allocate_one()?.cpu;
        device.write_descriptor(
            rtv,
            &ViewDescriptor::RenderTarget {
                texture,
                format,
                mip_level: 0,
            },
        )?;
        Ok(Self {
            label: label.to_string(),
            texture,
            width,
            height,
            mip_levels: 1,
            sample_count: 1,
            format,
            clear_color: [0.0; 4],
            rtv,
            srv: None,
            uavs: Vec::new(),
            swap_chain_buffer: true,
        })
    }

    /// Releases the texture. Swap-chain buffers are owned by the swap chain and are left alone.
    pub fn destroy(self, device: &dyn GraphicsDevice) -> Result<(), ResourceError> {
        if self.swap_chain_buffer {
            return Ok(());
        }
        device.destroy_texture(self.texture)
    }

    /// Recreates the texture at a new size and rewrites every view in its existing slot.
    ///
    /// Descriptor handles stay valid, so resizing never grows the heaps. The new
    /// texture starts in [`ResourceState::Common`] under a new id. Swap-chain buffers
    /// are resized by their swap chain, which keeps the texture id; only the recorded
    /// size and the render-target view are refreshed for them.
    pub fn resize(&mut self, device: &dyn GraphicsDevice, width: u32, height: u32) -> Result<(), ResourceError> {
        if self.swap_chain_buffer {
            self.width = width;
            self.height = height;
            return device.write_descriptor(
                self.rtv,
                &ViewDescriptor::RenderTarget {
                    texture: self.texture,
                    format: self.format,
                    mip_level: 0,
                },
            );
        }
        let mut usage = TextureUsage::RENDER_TARGET | TextureUsage::SHADER_RESOURCE;
        if !self.uavs.is_empty() {
            usage |= TextureUsage::UNORDERED_ACCESS;
        }
        if self.sample_count > 1 {
            usage |= TextureUsage::COPY_SRC;
        }
        let texture = device.create_texture(&TextureDescriptor {
            label: Some(Cow::Borrowed(self.label.as_str())),
            dimension: TextureDimension::D2,
            width,
            height,
            array_layers: 1,
            mip_levels: self.mip_levels,
            sample_count: self.sample_count,
            format: self.format,
            usage,
            initial_state: ResourceState::Common,
            clear_value: Some(ClearValue::Color(self.clear_color)),
        })?;
        device.destroy_texture(self.texture)?;
        self.texture = texture;
        self.width = width;
        self.height = height;

        device.write_descriptor(
            self.rtv,
            &ViewDescriptor::RenderTarget {
                texture,
                format: self.format,
                mip_level: 0,
            },
        )?;
        if let Some(srv) = self.srv {
            device.write_descriptor(srv.cpu(), &self.srv_view())?;
        }
        for (mip, uav) in self.uavs.iter().enumerate() {
            device.write_descriptor(
                uav.cpu(),
                &ViewDescriptor::TextureUav {
                    texture,
                    format: self.format,
                    mip_level: mip as u32,
                },
            )?;
        }
        log::debug!("Resized color buffer '{}' to {width}x{height}", self.label);
        Ok(())
    }

    /// Backend texture.
    pub fn texture(&self) -> TextureId {
        self.texture
    }

    /// Render-target view of mip 0.
    pub fn rtv(&self) -> CpuDescriptorHandle {
        self.rtv
    }

    /// Shader-resource view; `None` for swap-chain buffers.
    pub fn srv(&self) -> Option<GpuDescriptorHandle> {
        self.srv
    }

    /// Unordered-access view of `mip`, if the buffer has one.
    pub fn uav(&self, mip: u32) -> Option<GpuDescriptorHandle> {
        self.uavs.get(mip as usize).copied()
    }

    /// The view a shader-resource descriptor table slot needs to see this buffer.
    pub fn srv_view(&self) -> ViewDescriptor {
        ViewDescriptor::TextureSrv {
            texture: self.texture,
            format: self.format,
            dimension: if self.sample_count > 1 {
                TextureViewDimension::D2Multisampled
            } else {
                TextureViewDimension::D2
            },
            aspect: TextureAspect::All,
            base_mip: 0,
            mip_count: self.mip_levels,
        }
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Mip count.
    pub fn mip_levels(&self) -> u32 {
        self.mip_levels
    }

    /// Samples per pixel.
    pub fn sample_count(&self) -> u32 {
        self.sample_count
    }

    /// Pixel format.
    pub fn format(&self) -> TextureFormat {
        self.format
    }

    /// Optimized clear color.
    pub fn clear_color(&self) -> [f32; 4] {
        self.clear_color
    }

    /// Whether this wraps a swap-chain back buffer.
    pub fn is_swap_chain_buffer(&self) -> bool {
        self.swap_chain_buffer
    }
}

impl GpuResource for ColorBuffer {
    fn key(&self) -> ResourceKey {
        ResourceKey::Texture(self.texture)
    }

    fn initial_state(&self) -> ResourceState {
        if self.swap_chain_buffer {
            ResourceState::Present
        } else {
            ResourceState::Common
        }
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

    fn desc(sample_count: u32, mip_levels: u32) -> ColorBufferDescriptor<'static> {
        ColorBufferDescriptor {
            label: Cow::Borrowed("Scene Color"),
            width: 640,
            height: 480,
            mip_levels,
            sample_count,
            format: TextureFormat::Rgba16Float,
            clear_color: [0.0, 0.0, 0.0, 1.0],
        }
    }

    #[test]
    fn single_sample_gets_one_uav_per_mip() {
        let (device, mut heaps) = setup();
        let buffer = ColorBuffer::create(&device, &mut heaps, &desc(1, 3)).unwrap();
        assert!(buffer.uav(0).is_some());
        assert!(buffer.uav(2).is_some());
        assert!(buffer.uav(3).is_none());
        // 1 SRV + 3 UAVs.
        assert_eq!(heaps.cbv_srv_uav.allocated(), 4);
        assert_eq!(heaps.rtv.allocated(), 1);
        let texture = device.texture(buffer.texture()).unwrap();
        assert!(texture.usage.contains(TextureUsage::UNORDERED_ACCESS));
    }

    #[test]
    fn multisampled_buffer_has_no_uav() {
        let (device, mut heaps) = setup();
        let buffer = ColorBuffer::create(&device, &mut heaps, &desc(4, 1)).unwrap();
        assert!(buffer.uav(0).is_none());
        let texture = device.texture(buffer.texture()).unwrap();
        assert!(!texture.usage.contains(TextureUsage::UNORDERED_ACCESS));
        assert_eq!(texture.sample_count, 4);
        assert!(matches!(
            buffer.srv_view(),
            ViewDescriptor::TextureSrv {
                dimension: TextureViewDimension::D2Multisampled,
                ..
            }
        ));
    }

    #[test]
    fn swap_chain_buffer_only_has_rtv() {
        let (device, mut heaps) = setup();
        let buffer = ColorBuffer::create_from_swap_chain(
            &device,
            &mut heaps,
            "Back Buffer 0",
            TextureId(999),
            800,
            600,
            TextureFormat::Bgra8Unorm,
        )
        .unwrap();
        assert!(buffer.is_swap_chain_buffer());
        assert!(buffer.srv().is_none());
        assert!(buffer.uav(0).is_none());
        assert_eq!(heaps.cbv_srv_uav.allocated(), 0);
        assert_eq!(buffer.initial_state(), ResourceState::Present);
        assert!(matches!(
            device.descriptor(buffer.rtv()),
            Some(ViewDescriptor::RenderTarget { texture: TextureId(999), .. })
        ));
        buffer.destroy(&device).unwrap();
    }

    #[test]
    fn resize_keeps_descriptor_slots() {
        let (device, mut heaps) = setup();
        let mut buffer = ColorBuffer::create(&device, &mut heaps, &desc(1, 2)).unwrap();
        let (old_texture, rtv, srv, uav) = (buffer.texture(), buffer.rtv(), buffer.srv(), buffer.uav(1));
        let allocated = heaps.cbv_srv_uav.allocated();

        buffer.resize(&device, 1280, 720).unwrap();

        assert_ne!(buffer.texture(), old_texture);
        assert!(device.texture(old_texture).is_none());
        assert_eq!((buffer.width(), buffer.height()), (1280, 720));
        assert_eq!(buffer.rtv(), rtv);
        assert_eq!(buffer.srv(), srv);
        assert_eq!(buffer.uav(1), uav);
        assert_eq!(heaps.cbv_srv_uav.allocated(), allocated);
        let texture = buffer.texture();
        assert!(matches!(
            device.descriptor(rtv),
            Some(ViewDescriptor::RenderTarget { texture: t, .. }) if t == texture
        ));
        assert!(matches!(
            device.descriptor(uav.unwrap().cpu()),
            Some(ViewDescriptor::TextureUav { texture: t, mip_level: 1, .. }) if t == texture
        ));
        assert_eq!(device.texture(texture).unwrap().width, 1280);
    }
}
