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

use super::{GpuResource, ResourceUploader};
use crate::renderer::api::{
    GpuDescriptorHandle, ResourceKey, ResourceState, TextureAspect, TextureCopyRegion,
    TextureDescriptor, TextureDimension, TextureFormat, TextureId, TextureUsage,
    TextureViewDimension, ViewDescriptor,
};
use crate::renderer::descriptor_heap::DescriptorHeaps;
use crate::renderer::error::{RenderError, ResourceError};
use crate::renderer::traits::GraphicsDevice;
use std::borrow::Cow;

/// A sampled texture created in the copy-destination state with one shader-resource view.
///
/// The owner uploads its contents and transitions it to a shader-readable state.
#[derive(Debug)]
pub struct Texture {
    label: String,
    texture: TextureId,
    dimension: TextureDimension,
    width: u32,
    height: u32,
    mip_levels: u32,
    format: TextureFormat,
    srv: GpuDescriptorHandle,
}

impl Texture {
    /// Creates a 2-D texture.
    pub fn create_2d(
        device: &dyn GraphicsDevice,
        heaps: &mut DescriptorHeaps,
        label: &str,
        width: u32,
        height: u32,
        mip_levels: u32,
        format: TextureFormat,
    ) -> Result<Self, ResourceError> {
        Self::create(device, heaps, label, TextureDimension::D2, width, height, mip_levels, format)
    }

    /// Creates a cube map with six `size`-by-`size` faces.
    pub fn create_cube(
        device: &dyn GraphicsDevice,
        heaps: &mut DescriptorHeaps,
        label: &str,
        size: u32,
        mip_levels: u32,
        format: TextureFormat,
    ) -> Result<Self, ResourceError> {
        Self::create(device, heaps, label, TextureDimension::Cube, size, size, mip_levels, format)
    }

    #[allow(clippy::too_many_arguments)]
    fn create(
        device: &dyn GraphicsDevice,
        heaps: &mut DescriptorHeaps,
        label: &str,
        dimension: TextureDimension,
        width: u32,
        height: u32,
        mip_levels: u32,
        format: TextureFormat,
    ) -> Result<Self, ResourceError> {
        let mip_levels = mip_levels.max(1);
        let texture = device.create_texture(&TextureDescriptor {
            label: Some(Cow::Borrowed(label)),
            dimension,
            width,
            height,
            array_layers: if dimension == TextureDimension::Cube { 6 } else { 1 },
            mip_levels,
            sample_count: 1,
            format,
            usage: TextureUsage::SHADER_RESOURCE | TextureUsage::COPY_DST,
            initial_state: ResourceState::CopyDest,
            clear_value: None,
        })?;

        let mut this = Self {
            label: label.to_string(),
            texture,
            dimension,
            width,
            height,
            mip_levels,
            format,
            srv: GpuDescriptorHandle {
                heap: heaps.cbv_srv_uav.id(),
                index: 0,
            },
        };
        let slot = heaps.cbv_srv_uav.allocate_one()?;
        device.write_descriptor(slot.cpu, &this.srv_view())?;
        this.srv = slot.gpu.ok_or(ResourceError::InvalidHandle)?;

        log::debug!("Created {dimension:?} texture '{label}' {width}x{height} {format:?}");
        Ok(this)
    }

    /// Uploads tightly packed texel rows of every face into mip 0 and blocks until the
    /// copy has retired.
    ///
    /// `data` holds one face after another for cube maps.
    pub fn upload(&self, uploader: &dyn ResourceUploader, data: &[u8]) -> Result<(), RenderError> {
        let face_size = self.mip0_face_size();
        let faces = self.array_layers() as usize;
        if data.len() != face_size * faces {
            return Err(RenderError::ResourceError(ResourceError::OutOfBounds));
        }
        for (layer, face) in data.chunks_exact(face_size).enumerate() {
            uploader.upload_to_texture(
                self.texture,
                self.format,
                TextureCopyRegion {
                    mip_level: 0,
                    array_layer: layer as u32,
                    width: self.width,
                    height: self.height,
                },
                face,
            )?;
        }
        Ok(())
    }

    /// Bytes of one tightly packed face of mip 0.
    pub fn mip0_face_size(&self) -> usize {
        self.format.unpadded_row_pitch(self.width) as usize * self.format.row_count(self.height) as usize
    }

    /// Releases the texture.
    pub fn destroy(self, device: &dyn GraphicsDevice) -> Result<(), ResourceError> {
        device.destroy_texture(self.texture)
    }

    /// The view a shader-resource descriptor table slot needs to see this texture.
    pub fn srv_view(&self) -> ViewDescriptor {
        ViewDescriptor::TextureSrv {
            texture: self.texture,
            format: self.format,
            dimension: match self.dimension {
                TextureDimension::D2 => TextureViewDimension::D2,
                TextureDimension::Cube => TextureViewDimension::Cube,
            },
            aspect: TextureAspect::All,
            base_mip: 0,
            mip_count: self.mip_levels,
        }
    }

    /// Shader-resource view slot.
    pub fn srv(&self) -> GpuDescriptorHandle {
        self.srv
    }

    /// Backend texture.
    pub fn texture(&self) -> TextureId {
        self.texture
    }

    /// Shape.
    pub fn dimension(&self) -> TextureDimension {
        self.dimension
    }

    /// Number of array layers.
    pub fn array_layers(&self) -> u32 {
        match self.dimension {
            TextureDimension::D2 => 1,
            TextureDimension::Cube => 6,
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

    /// Pixel format.
    pub fn format(&self) -> TextureFormat {
        self.format
    }
}

impl GpuResource for Texture {
    fn key(&self) -> ResourceKey {
        ResourceKey::Texture(self.texture)
    }

    fn initial_state(&self) -> ResourceState {
        ResourceState::CopyDest
    }

    fn label(&self) -> &str {
        &self.label
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DescriptorHeapCapacities;
    use crate::renderer::api::BufferId;
    use crate::testing::MockDevice;
    use std::cell::RefCell;

    #[derive(Default)]
    struct FaceRecorder {
        faces: RefCell<Vec<(u32, usize)>>,
    }

    impl ResourceUploader for FaceRecorder {
        fn upload_to_buffer(&self, _: BufferId, _: u64, _: &[u8]) -> Result<(), RenderError> {
            Ok(())
        }

        fn upload_to_texture(
            &self,
            _dst: TextureId,
            _format: TextureFormat,
            region: TextureCopyRegion,
            data: &[u8],
        ) -> Result<(), RenderError> {
            self.faces.borrow_mut().push((region.array_layer, data.len()));
            Ok(())
        }
    }

    fn setup() -> (MockDevice, DescriptorHeaps) {
        let device = MockDevice::new();
        let heaps = DescriptorHeaps::new(&device, &DescriptorHeapCapacities::default()).unwrap();
        (device, heaps)
    }

    #[test]
    fn textures_start_in_copy_dest() {
        let (device, mut heaps) = setup();
        let texture =
            Texture::create_2d(&device, &mut heaps, "Default", 2, 2, 1, TextureFormat::Rgba8Unorm).unwrap();
        let created = device.texture(texture.texture()).unwrap();
        assert_eq!(created.initial_state, ResourceState::CopyDest);
        assert_eq!(texture.initial_state(), ResourceState::CopyDest);
        assert_eq!(heaps.cbv_srv_uav.allocated(), 1);
    }

    #[test]
    fn cube_has_six_layers_and_cube_view() {
        let (device, mut heaps) = setup();
        let cube =
            Texture::create_cube(&device, &mut heaps, "Sky", 4, 1, TextureFormat::Rgba8UnormSrgb).unwrap();
        assert_eq!(device.texture(cube.texture()).unwrap().array_layers, 6);
        assert!(matches!(
            cube.srv_view(),
            ViewDescriptor::TextureSrv {
                dimension: TextureViewDimension::Cube,
                ..
            }
        ));

        let recorder = FaceRecorder::default();
        cube.upload(&recorder, &vec![0u8; 6 * 4 * 4 * 4]).unwrap();
        assert_eq!(recorder.faces.borrow().len(), 6);
        assert_eq!(recorder.faces.borrow()[5], (5, 64));
        assert!(cube.upload(&recorder, &[0u8; 10]).is_err());
    }
}
