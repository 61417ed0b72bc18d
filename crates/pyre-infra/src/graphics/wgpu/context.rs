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

//! Adapter selection, device creation and swap-chain setup.

use super::adapter::{backend_name, candidate_for};
use super::conversions::{from_wgpu_texture_format, IntoWgpu};
use super::device::WgpuDevice;
use super::swap_chain::WgpuSwapChain;
use anyhow::{anyhow, Context, Result};
use pyre_core::platform::PyreWindowHandle;
use pyre_core::renderer::api::{DeviceCapabilities, TextureFormat};
use pyre_core::renderer::{select_adapter, GraphicsDevice, RenderError};
use pyre_core::RendererConfig;
use std::sync::Arc;
use wgpu::SurfaceTargetUnsafe;

/// Formats probed for unordered-access (storage) support.
const UAV_CANDIDATE_FORMATS: [TextureFormat; 6] = [
    TextureFormat::Rgba8Unorm,
    TextureFormat::Rgba16Float,
    TextureFormat::Rgba32Float,
    TextureFormat::Rg11b10Float,
    TextureFormat::R32Float,
    TextureFormat::R32Uint,
];

/// Owns the `wgpu` instance, the selected adapter and the logical device.
///
/// Created once at renderer construction. The swap chain is created separately,
/// once a window exists, and at most once per manager.
#[derive(Debug)]
pub struct DeviceManager {
    instance: wgpu::Instance,
    adapter: wgpu::Adapter,
    device: WgpuDevice,
    swap_chain_created: bool,
}

fn format_features(
    adapter: &wgpu::Adapter,
    device_features: wgpu::Features,
    format: wgpu::TextureFormat,
) -> wgpu::TextureFormatFeatures {
    if device_features.contains(wgpu::Features::TEXTURE_ADAPTER_SPECIFIC_FORMAT_FEATURES) {
        adapter.get_texture_format_features(format)
    } else {
        format.guaranteed_format_features(device_features)
    }
}

/// Records the optional capabilities later passes consult.
fn probe_capabilities(
    adapter: &wgpu::Adapter,
    device_features: wgpu::Features,
) -> DeviceCapabilities {
    let typed_uav_load = |format: TextureFormat| {
        let features = format_features(adapter, device_features, format.into_wgpu());
        features
            .allowed_usages
            .contains(wgpu::TextureUsages::STORAGE_BINDING)
            && features
                .flags
                .contains(wgpu::TextureFormatFeatureFlags::STORAGE_READ_WRITE)
    };
    let uav_formats = UAV_CANDIDATE_FORMATS
        .into_iter()
        .filter(|format| {
            format_features(adapter, device_features, format.into_wgpu())
                .allowed_usages
                .contains(wgpu::TextureUsages::STORAGE_BINDING)
        })
        .collect();

    DeviceCapabilities {
        adapter_name: adapter.get_info().name,
        typed_uav_load_rg11b10_float: typed_uav_load(TextureFormat::Rg11b10Float),
        typed_uav_load_rgba16_float: typed_uav_load(TextureFormat::Rgba16Float),
        ray_tracing_tier: super::adapter::ray_tracing_tier(device_features),
        mesh_shaders: false,
        uav_formats,
    }
}

impl DeviceManager {
    /// Selects an adapter and creates the logical device.
    ///
    /// ## Errors
    /// Fails when no adapter qualifies (see [`select_adapter`]) or device creation fails.
    pub fn new(config: &RendererConfig) -> Result<Self> {
        log::info!("Initializing wgpu device manager...");
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());

        let mut adapters = instance.enumerate_adapters(wgpu::Backends::all());
        let candidates: Vec<_> = adapters.iter().map(candidate_for).collect();
        for candidate in &candidates {
            log::debug!("Found adapter: {candidate:?}");
        }
        let index = select_adapter(&candidates, config.require_ray_tracing)
            .context("Adapter selection failed")?;
        let adapter = adapters.swap_remove(index);
        let info = adapter.get_info();
        log::info!(
            "Using graphics adapter \"{}\" ({})",
            info.name,
            backend_name(info.backend)
        );

        let wanted = wgpu::Features::PUSH_CONSTANTS
            | wgpu::Features::TEXTURE_COMPRESSION_BC
            | wgpu::Features::DEPTH32FLOAT_STENCIL8
            | wgpu::Features::TEXTURE_ADAPTER_SPECIFIC_FORMAT_FEATURES;
        let required_features = adapter.features() & wanted;
        let adapter_limits = adapter.limits();
        let required_limits = wgpu::Limits {
            max_bind_groups: adapter_limits.max_bind_groups,
            max_push_constant_size: adapter_limits.max_push_constant_size.min(256),
            ..wgpu::Limits::default()
        };

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("Pyre Logical Device"),
            required_features,
            required_limits,
            memory_hints: wgpu::MemoryHints::default(),
            trace: wgpu::Trace::default(),
        }))
        .map_err(|e| anyhow!("Failed to create logical device: {}", e))?;
        log::info!("Logical device and queue created.");

        device.on_uncaptured_error(Box::new(|e| {
            log::error!("WGPU Uncaptured Error: {e:?}");
        }));

        let capabilities = probe_capabilities(&adapter, device.features());
        log::info!(
            "Device capabilities: typed UAV loads rg11b10={} rgba16f={}, ray tracing {:?}, mesh shaders {}",
            capabilities.typed_uav_load_rg11b10_float,
            capabilities.typed_uav_load_rgba16_float,
            capabilities.ray_tracing_tier,
            capabilities.mesh_shaders
        );

        Ok(Self {
            instance,
            adapter,
            device: WgpuDevice::new(device, queue, capabilities),
            swap_chain_created: false,
        })
    }

    /// The backend device.
    pub fn device(&self) -> &WgpuDevice {
        &self.device
    }

    /// The device as the backend-agnostic trait object the renderer consumes.
    pub fn graphics_device(&self) -> Arc<dyn GraphicsDevice> {
        Arc::new(self.device.clone())
    }

    /// Information about the selected adapter.
    pub fn adapter_info(&self) -> wgpu::AdapterInfo {
        self.adapter.get_info()
    }

    /// Creates the swap chain presenting into `window`.
    ///
    /// The window must outlive the returned swap chain.
    ///
    /// ## Errors
    /// * `RenderError::SwapChainAlreadyCreated` - On a second call.
    /// * `RenderError::InitializationFailed` - If the surface cannot be created or
    ///   the adapter cannot present to it.
    pub fn create_swap_chain(
        &mut self,
        window: PyreWindowHandle,
        width: u32,
        height: u32,
        buffer_count: u32,
        format: TextureFormat,
    ) -> Result<WgpuSwapChain, RenderError> {
        if self.swap_chain_created {
            return Err(RenderError::SwapChainAlreadyCreated);
        }

        let surface_target = unsafe {
            SurfaceTargetUnsafe::from_window(&window).map_err(|e| {
                RenderError::InitializationFailed(format!("Failed to create surface target: {e}"))
            })?
        };
        let surface = unsafe { self.instance.create_surface_unsafe(surface_target) }.map_err(
            |e| RenderError::InitializationFailed(format!("Failed to create surface: {e}")),
        )?;
        if !self.adapter.is_surface_supported(&surface) {
            return Err(RenderError::InitializationFailed(
                "the selected adapter cannot present to this window".into(),
            ));
        }

        let caps = surface.get_capabilities(&self.adapter);
        let preferred = format.into_wgpu();
        let (surface_format, format) = if caps.formats.contains(&preferred) {
            (preferred, format)
        } else {
            let fallback = caps
                .formats
                .iter()
                .find_map(|f| from_wgpu_texture_format(*f).map(|ours| (*f, ours)))
                .ok_or_else(|| {
                    RenderError::InitializationFailed(format!(
                        "surface supports none of the renderer's formats: {:?}",
                        caps.formats
                    ))
                })?;
            log::warn!(
                "Back-buffer format {:?} is not supported by the surface, falling back to {:?}",
                format,
                fallback.1
            );
            fallback
        };

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: width.max(1),
            height: height.max(1),
            present_mode: caps
                .present_modes
                .iter()
                .copied()
                .find(|m| *m == wgpu::PresentMode::Mailbox)
                .unwrap_or(wgpu::PresentMode::Fifo),
            alpha_mode: caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: buffer_count.saturating_sub(1).max(1),
        };

        let swap_chain =
            WgpuSwapChain::new(surface, config, self.device.clone(), format, buffer_count)?;
        self.swap_chain_created = true;
        log::info!(
            "Swap chain created: {width}x{height}, {buffer_count} buffers, {format:?}"
        );
        Ok(swap_chain)
    }
}
