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

//! Adapter descriptions and device capability flags.

use super::format::TextureFormat;

/// A backend-agnostic representation of a graphics API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GraphicsBackendType {
    /// Vulkan API.
    Vulkan,
    /// Apple's Metal API.
    Metal,
    /// Microsoft's DirectX 12 API.
    Dx12,
    /// OpenGL API.
    OpenGL,
    /// WebGPU API.
    WebGpu,
    /// An unknown or unsupported backend.
    #[default]
    Unknown,
}

/// The physical type of a graphics device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RendererDeviceType {
    /// A GPU integrated into the CPU.
    IntegratedGpu,
    /// A discrete, dedicated GPU.
    DiscreteGpu,
    /// A virtualized GPU.
    VirtualGpu,
    /// A software renderer running on the CPU.
    Cpu,
    /// An unknown device type.
    #[default]
    Unknown,
}

/// Hardware ray-tracing support level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum RayTracingTier {
    /// No hardware ray tracing.
    #[default]
    NotSupported,
    /// Tier 1.0 ray tracing.
    Tier1_0,
    /// Tier 1.1 ray tracing (inline ray queries).
    Tier1_1,
}

/// Everything the adapter selection policy needs to know about one adapter.
#[derive(Debug, Clone, Default)]
pub struct AdapterCandidate {
    /// Human-readable adapter name.
    pub name: String,
    /// Graphics API the adapter was enumerated through.
    pub backend: GraphicsBackendType,
    /// Physical device type.
    pub device_type: RendererDeviceType,
    /// Dedicated video memory in bytes, used to rank adapters.
    pub dedicated_video_memory: u64,
    /// Whether the adapter is a software rasterizer.
    pub is_software: bool,
    /// Whether a device can be created at the renderer's required feature level.
    pub meets_feature_level: bool,
    /// Hardware ray-tracing support.
    pub ray_tracing_tier: RayTracingTier,
}

/// Capabilities recorded once after device creation and consumed by later passes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceCapabilities {
    /// Name of the adapter the device was created on.
    pub adapter_name: String,
    /// Typed unordered-access loads are supported for [`TextureFormat::Rg11b10Float`].
    pub typed_uav_load_rg11b10_float: bool,
    /// Typed unordered-access loads are supported for [`TextureFormat::Rgba16Float`].
    pub typed_uav_load_rgba16_float: bool,
    /// Hardware ray-tracing support of the device.
    pub ray_tracing_tier: RayTracingTier,
    /// Task/mesh shader pipelines are supported.
    pub mesh_shaders: bool,
    /// Formats that may be bound through unordered access views.
    pub uav_formats: Vec<TextureFormat>,
}

impl DeviceCapabilities {
    /// Returns `true` if textures of `format` may be created with unordered access.
    pub fn supports_uav(&self, format: TextureFormat) -> bool {
        self.uav_formats.contains(&format)
    }

    /// The HDR format post-processing should use for its intermediate UAV targets.
    pub fn preferred_hdr_uav_format(&self) -> TextureFormat {
        if self.typed_uav_load_rg11b10_float {
            TextureFormat::Rg11b10Float
        } else if self.typed_uav_load_rgba16_float {
            TextureFormat::Rgba16Float
        } else {
            TextureFormat::Rgba8Unorm
        }
    }
}
