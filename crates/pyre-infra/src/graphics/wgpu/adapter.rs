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

//! Turns `wgpu` adapters into [`AdapterCandidate`] records for the selection policy.
//!
//! `wgpu` exposes neither dedicated video memory nor a D3D-style feature level, so
//! both are derived here: memory is estimated from the device type, and the
//! "feature level" is the set of features and limits the renderer's passes need.

use pyre_core::renderer::api::{
    AdapterCandidate, GraphicsBackendType, RayTracingTier, RendererDeviceType,
};
use wgpu::{Backend, DeviceType};

/// Bind groups needed by the widest root signature (five parameter groups and samplers).
pub const REQUIRED_BIND_GROUPS: u32 = 6;

/// Push-constant bytes needed for the per-object root constants.
pub const REQUIRED_PUSH_CONSTANT_BYTES: u32 = 128;

/// Returns a human-readable name for a backend.
pub fn backend_name(backend: Backend) -> &'static str {
    match backend {
        Backend::Vulkan => "Vulkan",
        Backend::Metal => "Metal",
        Backend::Dx12 => "DirectX 12",
        Backend::Gl => "OpenGL",
        Backend::BrowserWebGpu => "WebGPU",
        Backend::Noop => "No-op",
    }
}

/// Converts a WGPU backend to our generic [`GraphicsBackendType`].
pub fn backend_to_type(backend: Backend) -> GraphicsBackendType {
    match backend {
        Backend::Vulkan => GraphicsBackendType::Vulkan,
        Backend::Dx12 => GraphicsBackendType::Dx12,
        Backend::Gl => GraphicsBackendType::OpenGL,
        Backend::Metal => GraphicsBackendType::Metal,
        Backend::BrowserWebGpu => GraphicsBackendType::WebGpu,
        Backend::Noop => GraphicsBackendType::Unknown,
    }
}

/// Converts a WGPU device type to our generic [`RendererDeviceType`].
pub fn device_type_to_type(device_type: DeviceType) -> RendererDeviceType {
    match device_type {
        DeviceType::IntegratedGpu => RendererDeviceType::IntegratedGpu,
        DeviceType::DiscreteGpu => RendererDeviceType::DiscreteGpu,
        DeviceType::VirtualGpu => RendererDeviceType::VirtualGpu,
        DeviceType::Cpu => RendererDeviceType::Cpu,
        DeviceType::Other => RendererDeviceType::Unknown,
    }
}

/// Rough dedicated memory of a device type, used only to rank adapters.
pub fn estimated_dedicated_memory(device_type: DeviceType) -> u64 {
    const GIB: u64 = 1 << 30;
    match device_type {
        DeviceType::DiscreteGpu => 8 * GIB,
        DeviceType::VirtualGpu => 2 * GIB,
        DeviceType::IntegratedGpu => GIB / 2,
        DeviceType::Cpu | DeviceType::Other => 0,
    }
}

/// Whether an adapter exposes everything the renderer's passes rely on.
pub fn meets_feature_level(
    features: wgpu::Features,
    limits: &wgpu::Limits,
    downlevel: &wgpu::DownlevelCapabilities,
) -> bool {
    features.contains(wgpu::Features::PUSH_CONSTANTS)
        && downlevel
            .flags
            .contains(wgpu::DownlevelFlags::COMPUTE_SHADERS)
        && limits.max_bind_groups >= REQUIRED_BIND_GROUPS
        && limits.max_push_constant_size >= REQUIRED_PUSH_CONSTANT_BYTES
}

/// Hardware ray-tracing support exposed by an adapter.
pub fn ray_tracing_tier(features: wgpu::Features) -> RayTracingTier {
    if features.contains(wgpu::Features::EXPERIMENTAL_RAY_QUERY) {
        RayTracingTier::Tier1_1
    } else {
        RayTracingTier::NotSupported
    }
}

/// Builds the selection record of one adapter from its reported properties.
pub fn describe_adapter(
    name: &str,
    backend: Backend,
    device_type: DeviceType,
    features: wgpu::Features,
    limits: &wgpu::Limits,
    downlevel: &wgpu::DownlevelCapabilities,
) -> AdapterCandidate {
    AdapterCandidate {
        name: name.to_string(),
        backend: backend_to_type(backend),
        device_type: device_type_to_type(device_type),
        dedicated_video_memory: estimated_dedicated_memory(device_type),
        is_software: device_type == DeviceType::Cpu,
        meets_feature_level: meets_feature_level(features, limits, downlevel),
        ray_tracing_tier: ray_tracing_tier(features),
    }
}

/// Builds the selection record of a live adapter.
pub fn candidate_for(adapter: &wgpu::Adapter) -> AdapterCandidate {
    let info = adapter.get_info();
    describe_adapter(
        &info.name,
        info.backend,
        info.device_type,
        adapter.features(),
        &adapter.limits(),
        &adapter.get_downlevel_capabilities(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capable_limits() -> wgpu::Limits {
        wgpu::Limits {
            max_bind_groups: 8,
            max_push_constant_size: 256,
            ..wgpu::Limits::default()
        }
    }

    #[test]
    fn test_backend_name_function() {
        assert_eq!(backend_name(Backend::Vulkan), "Vulkan");
        assert_eq!(backend_name(Backend::Dx12), "DirectX 12");
        assert_eq!(backend_name(Backend::Gl), "OpenGL");
    }

    #[test]
    fn test_backend_type_conversion() {
        assert_eq!(backend_to_type(Backend::Vulkan), GraphicsBackendType::Vulkan);
        assert_eq!(backend_to_type(Backend::Metal), GraphicsBackendType::Metal);
        assert_eq!(backend_to_type(Backend::Noop), GraphicsBackendType::Unknown);
    }

    #[test]
    fn test_discrete_gpu_ranks_above_integrated() {
        assert!(
            estimated_dedicated_memory(DeviceType::DiscreteGpu)
                > estimated_dedicated_memory(DeviceType::IntegratedGpu)
        );
        assert_eq!(estimated_dedicated_memory(DeviceType::Cpu), 0);
    }

    #[test]
    fn test_feature_level_requires_push_constants_and_bind_groups() {
        let downlevel = wgpu::DownlevelCapabilities::default();
        let limits = capable_limits();
        assert!(meets_feature_level(
            wgpu::Features::PUSH_CONSTANTS,
            &limits,
            &downlevel
        ));
        assert!(!meets_feature_level(wgpu::Features::empty(), &limits, &downlevel));
        assert!(!meets_feature_level(
            wgpu::Features::PUSH_CONSTANTS,
            &wgpu::Limits::default(),
            &downlevel
        ));
    }

    #[test]
    fn test_cpu_adapter_is_software() {
        let candidate = describe_adapter(
            "llvmpipe",
            Backend::Vulkan,
            DeviceType::Cpu,
            wgpu::Features::PUSH_CONSTANTS,
            &capable_limits(),
            &wgpu::DownlevelCapabilities::default(),
        );
        assert!(candidate.is_software);
        assert!(candidate.meets_feature_level);
        assert_eq!(candidate.ray_tracing_tier, RayTracingTier::NotSupported);
        assert_eq!(candidate.device_type, RendererDeviceType::Cpu);
    }

    #[test]
    fn test_ray_query_maps_to_tier_one_one() {
        assert_eq!(
            ray_tracing_tier(wgpu::Features::EXPERIMENTAL_RAY_QUERY),
            RayTracingTier::Tier1_1
        );
    }
}
