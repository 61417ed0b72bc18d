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

//! Conversions from Pyre's backend-agnostic types to their `wgpu` counterparts.

use pyre_core::renderer::api::{
    AddressMode, BindingShape, BlendMode, BufferUsage, CompareFunction, CullMode, FilterMode,
    IndexFormat, MemoryLocation, PrimitiveTopology, ShaderVisibility, StaticSampler,
    TextureAspect, TextureFormat, TextureUsage, TextureViewDimension, VertexFormat,
};

/// A local extension trait to convert our engine's types into WGPU-compatible types.
/// This avoids Rust's orphan rules while keeping an idiomatic `.into_wgpu()` syntax.
pub trait IntoWgpu<T> {
    /// Consumes self and converts it into a WGPU-compatible type.
    fn into_wgpu(self) -> T;
}

impl IntoWgpu<wgpu::TextureFormat> for TextureFormat {
    fn into_wgpu(self) -> wgpu::TextureFormat {
        match self {
            TextureFormat::R8Unorm => wgpu::TextureFormat::R8Unorm,
            TextureFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
            TextureFormat::Rgba8UnormSrgb => wgpu::TextureFormat::Rgba8UnormSrgb,
            TextureFormat::Bgra8Unorm => wgpu::TextureFormat::Bgra8Unorm,
            TextureFormat::Bgra8UnormSrgb => wgpu::TextureFormat::Bgra8UnormSrgb,
            TextureFormat::Rgb10a2Unorm => wgpu::TextureFormat::Rgb10a2Unorm,
            TextureFormat::Rg11b10Float => wgpu::TextureFormat::Rg11b10Ufloat,
            TextureFormat::Rgba16Float => wgpu::TextureFormat::Rgba16Float,
            TextureFormat::Rgba32Float => wgpu::TextureFormat::Rgba32Float,
            TextureFormat::R32Float => wgpu::TextureFormat::R32Float,
            TextureFormat::R32Uint => wgpu::TextureFormat::R32Uint,
            TextureFormat::Depth32Float => wgpu::TextureFormat::Depth32Float,
            TextureFormat::Depth24PlusStencil8 => wgpu::TextureFormat::Depth24PlusStencil8,
            TextureFormat::Depth32FloatStencil8 => wgpu::TextureFormat::Depth32FloatStencil8,
            TextureFormat::Bc1RgbaUnorm => wgpu::TextureFormat::Bc1RgbaUnorm,
            TextureFormat::Bc3RgbaUnorm => wgpu::TextureFormat::Bc3RgbaUnorm,
            TextureFormat::Bc5RgUnorm => wgpu::TextureFormat::Bc5RgUnorm,
            TextureFormat::Bc7RgbaUnorm => wgpu::TextureFormat::Bc7RgbaUnorm,
        }
    }
}

/// Maps a `wgpu` format back to the engine's format, if the engine knows it.
pub fn from_wgpu_texture_format(format: wgpu::TextureFormat) -> Option<TextureFormat> {
    Some(match format {
        wgpu::TextureFormat::R8Unorm => TextureFormat::R8Unorm,
        wgpu::TextureFormat::Rgba8Unorm => TextureFormat::Rgba8Unorm,
        wgpu::TextureFormat::Rgba8UnormSrgb => TextureFormat::Rgba8UnormSrgb,
        wgpu::TextureFormat::Bgra8Unorm => TextureFormat::Bgra8Unorm,
        wgpu::TextureFormat::Bgra8UnormSrgb => TextureFormat::Bgra8UnormSrgb,
        wgpu::TextureFormat::Rgb10a2Unorm => TextureFormat::Rgb10a2Unorm,
        wgpu::TextureFormat::Rg11b10Ufloat => TextureFormat::Rg11b10Float,
        wgpu::TextureFormat::Rgba16Float => TextureFormat::Rgba16Float,
        wgpu::TextureFormat::Rgba32Float => TextureFormat::Rgba32Float,
        wgpu::TextureFormat::R32Float => TextureFormat::R32Float,
        wgpu::TextureFormat::R32Uint => TextureFormat::R32Uint,
        wgpu::TextureFormat::Depth32Float => TextureFormat::Depth32Float,
        wgpu::TextureFormat::Depth24PlusStencil8 => TextureFormat::Depth24PlusStencil8,
        wgpu::TextureFormat::Depth32FloatStencil8 => TextureFormat::Depth32FloatStencil8,
        wgpu::TextureFormat::Bc1RgbaUnorm => TextureFormat::Bc1RgbaUnorm,
        wgpu::TextureFormat::Bc3RgbaUnorm => TextureFormat::Bc3RgbaUnorm,
        wgpu::TextureFormat::Bc5RgUnorm => TextureFormat::Bc5RgUnorm,
        wgpu::TextureFormat::Bc7RgbaUnorm => TextureFormat::Bc7RgbaUnorm,
        _ => return None,
    })
}

impl IntoWgpu<wgpu::IndexFormat> for IndexFormat {
    fn into_wgpu(self) -> wgpu::IndexFormat {
        match self {
            IndexFormat::Uint16 => wgpu::IndexFormat::Uint16,
            IndexFormat::Uint32 => wgpu::IndexFormat::Uint32,
        }
    }
}

impl IntoWgpu<wgpu::CompareFunction> for CompareFunction {
    fn into_wgpu(self) -> wgpu::CompareFunction {
        match self {
            CompareFunction::Never => wgpu::CompareFunction::Never,
            CompareFunction::Less => wgpu::CompareFunction::Less,
            CompareFunction::LessEqual => wgpu::CompareFunction::LessEqual,
            CompareFunction::Equal => wgpu::CompareFunction::Equal,
            CompareFunction::Greater => wgpu::CompareFunction::Greater,
            CompareFunction::GreaterEqual => wgpu::CompareFunction::GreaterEqual,
            CompareFunction::NotEqual => wgpu::CompareFunction::NotEqual,
            CompareFunction::Always => wgpu::CompareFunction::Always,
        }
    }
}

impl IntoWgpu<Option<wgpu::Face>> for CullMode {
    fn into_wgpu(self) -> Option<wgpu::Face> {
        match self {
            CullMode::None => None,
            CullMode::Front => Some(wgpu::Face::Front),
            CullMode::Back => Some(wgpu::Face::Back),
        }
    }
}

impl IntoWgpu<wgpu::PrimitiveTopology> for PrimitiveTopology {
    fn into_wgpu(self) -> wgpu::PrimitiveTopology {
        match self {
            PrimitiveTopology::TriangleList => wgpu::PrimitiveTopology::TriangleList,
            PrimitiveTopology::TriangleStrip => wgpu::PrimitiveTopology::TriangleStrip,
            PrimitiveTopology::LineList => wgpu::PrimitiveTopology::LineList,
        }
    }
}

impl IntoWgpu<wgpu::VertexFormat> for VertexFormat {
    fn into_wgpu(self) -> wgpu::VertexFormat {
        match self {
            VertexFormat::Float32x2 => wgpu::VertexFormat::Float32x2,
            VertexFormat::Float32x3 => wgpu::VertexFormat::Float32x3,
            VertexFormat::Float32x4 => wgpu::VertexFormat::Float32x4,
        }
    }
}

impl IntoWgpu<Option<wgpu::BlendState>> for BlendMode {
    fn into_wgpu(self) -> Option<wgpu::BlendState> {
        match self {
            BlendMode::Opaque => None,
            BlendMode::Additive => {
                let add = wgpu::BlendComponent {
                    src_factor: wgpu::BlendFactor::One,
                    dst_factor: wgpu::BlendFactor::One,
                    operation: wgpu::BlendOperation::Add,
                };
                Some(wgpu::BlendState {
                    color: add,
                    alpha: add,
                })
            }
            BlendMode::Alpha => Some(wgpu::BlendState::ALPHA_BLENDING),
        }
    }
}

impl IntoWgpu<wgpu::ShaderStages> for ShaderVisibility {
    fn into_wgpu(self) -> wgpu::ShaderStages {
        // Task and mesh stages have no stable wgpu counterpart.
        let mut stages = wgpu::ShaderStages::NONE;
        if self.contains(ShaderVisibility::VERTEX) {
            stages |= wgpu::ShaderStages::VERTEX;
        }
        if self.contains(ShaderVisibility::PIXEL) {
            stages |= wgpu::ShaderStages::FRAGMENT;
        }
        if self.contains(ShaderVisibility::COMPUTE) {
            stages |= wgpu::ShaderStages::COMPUTE;
        }
        stages
    }
}

/// Buffer usages for a buffer of the given engine usage living in `memory`.
///
/// Every buffer may be the destination of a queue write or a copy, which is how
/// both upload-heap writes and default-heap uploads reach it.
pub fn buffer_usages(usage: BufferUsage, memory: MemoryLocation) -> wgpu::BufferUsages {
    if memory == MemoryLocation::GpuToCpu {
        return wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST;
    }
    let mut usages = wgpu::BufferUsages::COPY_DST;
    if usage.contains(BufferUsage::VERTEX) {
        usages |= wgpu::BufferUsages::VERTEX;
    }
    if usage.contains(BufferUsage::INDEX) {
        usages |= wgpu::BufferUsages::INDEX;
    }
    if usage.contains(BufferUsage::CONSTANT) {
        usages |= wgpu::BufferUsages::UNIFORM;
    }
    if usage.contains(BufferUsage::STORAGE) {
        usages |= wgpu::BufferUsages::STORAGE;
    }
    if usage.contains(BufferUsage::COPY_SRC) {
        usages |= wgpu::BufferUsages::COPY_SRC;
    }
    usages
}

/// Texture usages for a texture of the given engine usage and sample count.
///
/// Multisampled textures may only be attachments or sampled.
pub fn texture_usages(usage: TextureUsage, sample_count: u32) -> wgpu::TextureUsages {
    let mut usages = wgpu::TextureUsages::empty();
    if usage.intersects(TextureUsage::RENDER_TARGET | TextureUsage::DEPTH_STENCIL) {
        usages |= wgpu::TextureUsages::RENDER_ATTACHMENT;
    }
    if usage.contains(TextureUsage::SHADER_RESOURCE) {
        usages |= wgpu::TextureUsages::TEXTURE_BINDING;
    }
    if sample_count > 1 {
        return usages;
    }
    if usage.contains(TextureUsage::UNORDERED_ACCESS) {
        usages |= wgpu::TextureUsages::STORAGE_BINDING;
    }
    if usage.contains(TextureUsage::COPY_SRC) {
        usages |= wgpu::TextureUsages::COPY_SRC;
    }
    if usage.contains(TextureUsage::COPY_DST) {
        usages |= wgpu::TextureUsages::COPY_DST;
    }
    usages
}

impl IntoWgpu<wgpu::TextureViewDimension> for TextureViewDimension {
    fn into_wgpu(self) -> wgpu::TextureViewDimension {
        match self {
            TextureViewDimension::D2 | TextureViewDimension::D2Multisampled => {
                wgpu::TextureViewDimension::D2
            }
            TextureViewDimension::Cube => wgpu::TextureViewDimension::Cube,
        }
    }
}

impl IntoWgpu<wgpu::TextureAspect> for TextureAspect {
    fn into_wgpu(self) -> wgpu::TextureAspect {
        match self {
            TextureAspect::All => wgpu::TextureAspect::All,
            TextureAspect::DepthOnly => wgpu::TextureAspect::DepthOnly,
            TextureAspect::StencilOnly => wgpu::TextureAspect::StencilOnly,
        }
    }
}

impl IntoWgpu<wgpu::FilterMode> for FilterMode {
    fn into_wgpu(self) -> wgpu::FilterMode {
        match self {
            FilterMode::Point => wgpu::FilterMode::Nearest,
            FilterMode::Linear => wgpu::FilterMode::Linear,
        }
    }
}

impl IntoWgpu<wgpu::AddressMode> for AddressMode {
    fn into_wgpu(self) -> wgpu::AddressMode {
        match self {
            AddressMode::Wrap => wgpu::AddressMode::Repeat,
            AddressMode::Clamp => wgpu::AddressMode::ClampToEdge,
        }
    }
}

impl IntoWgpu<wgpu::BindingType> for BindingShape {
    fn into_wgpu(self) -> wgpu::BindingType {
        match self {
            BindingShape::ConstantBuffer => wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            BindingShape::ReadOnlyBuffer => wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only: true },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            BindingShape::ReadWriteBuffer => wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only: false },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            BindingShape::Texture { cube } => wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: if cube {
                    wgpu::TextureViewDimension::Cube
                } else {
                    wgpu::TextureViewDimension::D2
                },
                multisampled: false,
            },
            BindingShape::MultisampledTexture => wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: false },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: true,
            },
            BindingShape::DepthTexture => wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Depth,
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            BindingShape::StorageTexture { format } => wgpu::BindingType::StorageTexture {
                access: wgpu::StorageTextureAccess::WriteOnly,
                format: format.into_wgpu(),
                view_dimension: wgpu::TextureViewDimension::D2,
            },
        }
    }
}

impl IntoWgpu<wgpu::BindingType> for StaticSampler {
    fn into_wgpu(self) -> wgpu::BindingType {
        if self.comparison.is_some() {
            wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Comparison)
        } else {
            wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering)
        }
    }
}

/// Builds the sampler a static sampler describes.
pub fn sampler_descriptor(sampler: &StaticSampler) -> wgpu::SamplerDescriptor<'static> {
    let address = sampler.address.into_wgpu();
    let filter = sampler.filter.into_wgpu();
    wgpu::SamplerDescriptor {
        label: Some("Pyre Static Sampler"),
        address_mode_u: address,
        address_mode_v: address,
        address_mode_w: address,
        mag_filter: filter,
        min_filter: filter,
        mipmap_filter: filter,
        compare: sampler.comparison.map(|c| c.into_wgpu()),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_texture_format_round_trip_for_hdr_formats() {
        for format in [
            TextureFormat::Rg11b10Float,
            TextureFormat::Rgba16Float,
            TextureFormat::Rgb10a2Unorm,
            TextureFormat::Depth24PlusStencil8,
        ] {
            assert_eq!(from_wgpu_texture_format(format.into_wgpu()), Some(format));
        }
        assert_eq!(from_wgpu_texture_format(wgpu::TextureFormat::Rg8Unorm), None);
    }

    #[test]
    fn test_visibility_conversion() {
        assert_eq!(
            ShaderVisibility::ALL_GRAPHICS.into_wgpu(),
            wgpu::ShaderStages::VERTEX_FRAGMENT
        );
        assert_eq!(
            ShaderVisibility::COMPUTE.into_wgpu(),
            wgpu::ShaderStages::COMPUTE
        );
        assert_eq!(ShaderVisibility::MESH.into_wgpu(), wgpu::ShaderStages::NONE);
    }

    #[test]
    fn test_buffer_usages_always_accept_copies() {
        let usages = buffer_usages(BufferUsage::VERTEX, MemoryLocation::GpuOnly);
        assert!(usages.contains(wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST));
        let constant = buffer_usages(
            BufferUsage::CONSTANT | BufferUsage::COPY_SRC,
            MemoryLocation::CpuToGpu,
        );
        assert!(constant.contains(wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_SRC));
        let readback = buffer_usages(BufferUsage::STORAGE, MemoryLocation::GpuToCpu);
        assert_eq!(
            readback,
            wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST
        );
    }

    #[test]
    fn test_multisampled_textures_drop_storage_and_copies() {
        let usage = TextureUsage::RENDER_TARGET
            | TextureUsage::SHADER_RESOURCE
            | TextureUsage::UNORDERED_ACCESS
            | TextureUsage::COPY_SRC;
        assert_eq!(
            texture_usages(usage, 4),
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING
        );
        assert!(texture_usages(usage, 1).contains(wgpu::TextureUsages::STORAGE_BINDING));
    }

    #[test]
    fn test_blend_mode_conversion() {
        let opaque: Option<wgpu::BlendState> = BlendMode::Opaque.into_wgpu();
        assert!(opaque.is_none());
        let additive: Option<wgpu::BlendState> = BlendMode::Additive.into_wgpu();
        assert_eq!(
            additive.map(|b| b.color.dst_factor),
            Some(wgpu::BlendFactor::One)
        );
    }

    #[test]
    fn test_shadow_sampler_is_comparison() {
        let ty: wgpu::BindingType = StaticSampler::SHADOW.into_wgpu();
        assert_eq!(
            ty,
            wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Comparison)
        );
        let desc = sampler_descriptor(&StaticSampler::LINEAR_WRAP);
        assert_eq!(desc.address_mode_u, wgpu::AddressMode::Repeat);
        assert!(desc.compare.is_none());
    }

    #[test]
    fn test_cull_mode_conversion() {
        let back: Option<wgpu::Face> = CullMode::Back.into_wgpu();
        assert_eq!(back, Some(wgpu::Face::Back));
        let none: Option<wgpu::Face> = CullMode::None.into_wgpu();
        assert_eq!(none, None);
    }
}
