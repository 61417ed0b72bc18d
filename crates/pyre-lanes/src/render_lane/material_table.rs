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

//! Material name to texture lookup with default fallbacks.
//!
//! Every material occupies three consecutive shader-visible descriptors:
//! diffuse, roughness and normal map. The lit pass binds the first two as one
//! table and the normal map as another. A name that was never loaded, or whose
//! textures failed to load, resolves to the default textures instead of failing
//! the frame.

use pyre_core::renderer::api::{GpuDescriptorHandle, TextureFormat, TextureId};
use pyre_core::renderer::{
    DescriptorHeaps, GraphicsDevice, RenderError, ResourceError, ResourceUploader, Texture,
};
use pyre_core::scene::TextureData;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

const DIFFUSE: usize = 0;
const ROUGHNESS: usize = 1;
const NORMAL: usize = 2;

/// The textures making up one material. Missing maps use the defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialTextures {
    /// Base color, sampled as sRGB.
    pub diffuse: TextureData,
    /// Roughness in the green channel.
    pub roughness: Option<TextureData>,
    /// Tangent-space normal map.
    pub normal: Option<TextureData>,
}

impl From<TextureData> for MaterialTextures {
    fn from(diffuse: TextureData) -> Self {
        Self {
            diffuse,
            roughness: None,
            normal: None,
        }
    }
}

/// Descriptor tables and texture ids bound for one sub-mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaterialBinding {
    /// Table of `[diffuse, roughness]`.
    pub table: GpuDescriptorHandle,
    /// Table of `[normal]`.
    pub normal: GpuDescriptorHandle,
    /// Diffuse, roughness and normal textures, for state tracking.
    pub textures: [TextureId; 3],
    /// Whether this is the default material standing in for a missing one.
    pub fallback: bool,
}

#[derive(Debug)]
struct Material {
    owned: Vec<Texture>,
    binding: MaterialBinding,
}

/// Loaded materials by name, plus the defaults they fall back to.
#[derive(Debug)]
pub struct MaterialTable {
    defaults: [Texture; 3],
    default_binding: MaterialBinding,
    materials: HashMap<String, Material>,
    warned: Mutex<HashSet<String>>,
}

fn linear_format(format: TextureFormat) -> TextureFormat {
    match format {
        TextureFormat::Rgba8UnormSrgb => TextureFormat::Rgba8Unorm,
        TextureFormat::Bgra8UnormSrgb => TextureFormat::Bgra8Unorm,
        other => other,
    }
}

fn upload_texture(
    device: &dyn GraphicsDevice,
    heaps: &mut DescriptorHeaps,
    uploader: &dyn ResourceUploader,
    label: &str,
    data: &TextureData,
    format: TextureFormat,
    bytes: &[u8],
) -> Result<Texture, RenderError> {
    let (width, height) = data.size();
    let texture = Texture::create_2d(device, heaps, label, width, height, 1, format)?;
    texture.upload(uploader, bytes)?;
    Ok(texture)
}

fn write_table(
    device: &dyn GraphicsDevice,
    heaps: &mut DescriptorHeaps,
    textures: [&Texture; 3],
    fallback: bool,
) -> Result<MaterialBinding, ResourceError> {
    let slots = heaps.cbv_srv_uav.allocate(MaterialTable::SLOTS_PER_MATERIAL)?;
    for (i, texture) in textures.iter().enumerate() {
        device.write_descriptor(slots.cpu_at(i as u32), &texture.srv_view())?;
    }
    Ok(MaterialBinding {
        table: slots.gpu_at(DIFFUSE as u32).ok_or(ResourceError::InvalidHandle)?,
        normal: slots.gpu_at(NORMAL as u32).ok_or(ResourceError::InvalidHandle)?,
        textures: textures.map(Texture::texture),
        fallback,
    })
}

impl MaterialTable {
    /// Descriptors reserved per material.
    pub const SLOTS_PER_MATERIAL: u32 = 3;

    /// Creates the 2x2 default diffuse, roughness and normal textures.
    pub fn new(
        device: &dyn GraphicsDevice,
        heaps: &mut DescriptorHeaps,
        uploader: &dyn ResourceUploader,
    ) -> Result<Self, RenderError> {
        let defaults = [
            ("Default Diffuse", TextureFormat::Rgba8UnormSrgb, [255, 255, 255, 255]),
            ("Default Roughness", TextureFormat::Rgba8Unorm, [255, 128, 0, 255]),
            ("Default Normal", TextureFormat::Rgba8Unorm, [128, 128, 255, 255]),
        ]
        .map(|(label, format, rgba)| {
            let data = TextureData::solid(2, 2, rgba);
            let bytes = data.load_bytes()?;
            upload_texture(device, heaps, uploader, label, &data, format, &bytes)
        });
        let [diffuse, roughness, normal] = defaults;
        let defaults = [diffuse?, roughness?, normal?];
        let default_binding = write_table(device, heaps, [&defaults[0], &defaults[1], &defaults[2]], true)?;
        log::debug!("Created default material textures");

        Ok(Self {
            defaults,
            default_binding,
            materials: HashMap::new(),
            warned: Mutex::new(HashSet::new()),
        })
    }

    /// Creates and uploads the textures of `name`, blocking until the upload retired.
    ///
    /// A texture that cannot be read is replaced by the matching default with a
    /// warning. Returns whether every requested texture loaded. Loading a name
    /// twice keeps the first version.
    pub fn request_load(
        &mut self,
        device: &dyn GraphicsDevice,
        heaps: &mut DescriptorHeaps,
        uploader: &dyn ResourceUploader,
        name: &str,
        textures: impl Into<MaterialTextures>,
    ) -> Result<bool, RenderError> {
        if self.materials.contains_key(name) {
            log::debug!("Material '{name}' is already loaded");
            return Ok(true);
        }
        let textures = textures.into();
        let sources = [
            Some((&textures.diffuse, textures.diffuse.format())),
            textures.roughness.as_ref().map(|t| (t, linear_format(t.format()))),
            textures.normal.as_ref().map(|t| (t, linear_format(t.format()))),
        ];

        let mut complete = true;
        let mut owned = Vec::with_capacity(3);
        let mut slots = [None, None, None];
        for (slot, source) in sources.into_iter().enumerate() {
            let Some((data, format)) = source else {
                continue;
            };
            let bytes = match data.load_bytes() {
                Ok(bytes) => bytes,
                Err(err) => {
                    log::warn!("Material '{name}' slot {slot}: {err}; using the default texture");
                    complete = false;
                    continue;
                }
            };
            let label = format!("{name} [{slot}]");
            slots[slot] = Some(owned.len());
            owned.push(upload_texture(device, heaps, uploader, &label, data, format, &bytes)?);
        }

        let pick = |slot: usize| match slots[slot] {
            Some(index) => &owned[index],
            None => &self.defaults[slot],
        };
        let binding = write_table(device, heaps, [pick(DIFFUSE), pick(ROUGHNESS), pick(NORMAL)], false)?;
        log::info!("Loaded material '{name}' ({} textures)", owned.len());
        self.materials.insert(name.to_string(), Material { owned, binding });
        Ok(complete)
    }

    /// The binding for `name`, or the default binding when it is unknown.
    ///
    /// The first fallback for a given name is logged.
    pub fn resolve(&self, name: Option<&str>) -> MaterialBinding {
        let Some(name) = name else {
            return self.default_binding;
        };
        if let Some(material) = self.materials.get(name) {
            return material.binding;
        }
        let mut warned = self
            .warned
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if warned.insert(name.to_string()) {
            log::warn!("Material '{name}' is not loaded; using the default material");
        }
        self.default_binding
    }

    /// The default material.
    pub fn default_binding(&self) -> MaterialBinding {
        self.default_binding
    }

    /// Whether `name` has been loaded.
    pub fn contains(&self, name: &str) -> bool {
        self.materials.contains_key(name)
    }

    /// Loaded material names, sorted, for browsing.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.materials.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of loaded materials.
    pub fn len(&self) -> usize {
        self.materials.len()
    }

    /// Whether no material has been loaded.
    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }

    /// Destroys every texture, defaults included.
    pub fn destroy(self, device: &dyn GraphicsDevice) -> Result<(), ResourceError> {
        for material in self.materials.into_values() {
            for texture in material.owned {
                texture.destroy(device)?;
            }
        }
        for texture in self.defaults {
            texture.destroy(device)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pyre_core::config::DescriptorHeapCapacities;
    use crate::render_lane::test_support::CountingUploader;
    use pyre_core::renderer::api::ViewDescriptor;
    use pyre_core::testing::MockDevice;
    use std::path::PathBuf;

    fn setup() -> (MockDevice, DescriptorHeaps, CountingUploader) {
        let device = MockDevice::new();
        let heaps = DescriptorHeaps::new(&device, &DescriptorHeapCapacities::default()).unwrap();
        (device, heaps, CountingUploader::default())
    }

    fn srv_texture(device: &MockDevice, heaps: &DescriptorHeaps, handle: GpuDescriptorHandle) -> TextureId {
        let cpu = pyre_core::renderer::api::CpuDescriptorHandle {
            heap: heaps.cbv_srv_uav.id(),
            index: handle.index,
        };
        match device.descriptor(cpu) {
            Some(ViewDescriptor::TextureSrv { texture, .. }) => texture,
            other => panic!("expected a texture SRV, got {other:?}"),
        }
    }

    #[test]
    fn test_defaults_are_uploaded_once() {
        let (device, mut heaps, uploader) = setup();
        let table = MaterialTable::new(&device, &mut heaps, &uploader).unwrap();

        let uploads = uploader.texture_uploads();
        assert_eq!(uploads.len(), 3);
        assert!(uploads.iter().all(|(_, len)| *len == 16));
        assert!(table.is_empty());
        assert!(table.default_binding().fallback);
    }

    #[test]
    fn test_unknown_material_falls_back_to_defaults() {
        let (device, mut heaps, uploader) = setup();
        let table = MaterialTable::new(&device, &mut heaps, &uploader).unwrap();

        let binding = table.resolve(Some("bricks"));
        assert!(binding.fallback);
        assert_eq!(binding, table.default_binding());
        assert_eq!(table.resolve(None), table.default_binding());
        assert_eq!(srv_texture(&device, &heaps, binding.normal), binding.textures[2]);
    }

    #[test]
    fn test_loaded_material_occupies_three_consecutive_slots() {
        let (device, mut heaps, uploader) = setup();
        let mut table = MaterialTable::new(&device, &mut heaps, &uploader).unwrap();

        let loaded = table
            .request_load(&device, &mut heaps, &uploader, "bricks", TextureData::solid(4, 4, [200, 10, 10, 255]))
            .unwrap();
        assert!(loaded);

        let binding = table.resolve(Some("bricks"));
        assert!(!binding.fallback);
        assert_eq!(binding.normal.index, binding.table.index + 2);
        assert_eq!(srv_texture(&device, &heaps, binding.table), binding.textures[0]);
        assert_ne!(binding.textures[0], table.default_binding().textures[0]);
        // Roughness and normal were not supplied.
        assert_eq!(binding.textures[1], table.default_binding().textures[1]);
        assert_eq!(binding.textures[2], table.default_binding().textures[2]);
        assert_eq!(table.names(), vec!["bricks"]);
    }

    #[test]
    fn test_unreadable_texture_uses_default_slot() {
        let (device, mut heaps, uploader) = setup();
        let mut table = MaterialTable::new(&device, &mut heaps, &uploader).unwrap();

        let textures = MaterialTextures {
            diffuse: TextureData::solid(2, 2, [1, 2, 3, 4]),
            roughness: None,
            normal: Some(TextureData::Native {
                path: PathBuf::from("/nonexistent/normal.dds"),
                format: TextureFormat::Bc5RgUnorm,
                width: 4,
                height: 4,
            }),
        };
        let loaded = table
            .request_load(&device, &mut heaps, &uploader, "rock", textures)
            .unwrap();
        assert!(!loaded);

        let binding = table.resolve(Some("rock"));
        assert!(!binding.fallback);
        assert_eq!(binding.textures[2], table.default_binding().textures[2]);
    }

    #[test]
    fn test_second_load_keeps_first_version() {
        let (device, mut heaps, uploader) = setup();
        let mut table = MaterialTable::new(&device, &mut heaps, &uploader).unwrap();
        table
            .request_load(&device, &mut heaps, &uploader, "a", TextureData::solid(2, 2, [0; 4]))
            .unwrap();
        let first = table.resolve(Some("a"));
        let allocated = heaps.cbv_srv_uav.allocated();

        table
            .request_load(&device, &mut heaps, &uploader, "a", TextureData::solid(2, 2, [9; 4]))
            .unwrap();
        assert_eq!(table.resolve(Some("a")), first);
        assert_eq!(heaps.cbv_srv_uav.allocated(), allocated);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_destroy_releases_textures() {
        let (device, mut heaps, uploader) = setup();
        let mut table = MaterialTable::new(&device, &mut heaps, &uploader).unwrap();
        table
            .request_load(&device, &mut heaps, &uploader, "a", TextureData::solid(2, 2, [0; 4]))
            .unwrap();
        assert_eq!(device.live_texture_count(), 4);

        table.destroy(&device).unwrap();
        assert_eq!(device.live_texture_count(), 0);
    }
}
