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

//! Presentation through a `wgpu` surface.

use super::device::WgpuDevice;
use pyre_core::renderer::api::{TextureFormat, TextureId};
use pyre_core::renderer::{RenderError, SwapChain};

/// A `wgpu` surface exposed as a chain of back buffers.
///
/// `wgpu` hands out one surface texture per frame rather than a fixed set of
/// buffers, so every back-buffer id resolves to whichever texture is currently
/// acquired; the ids themselves cycle to keep frame-indexed bookkeeping stable.
#[derive(Debug)]
pub struct WgpuSwapChain {
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
    device: WgpuDevice,
    format: TextureFormat,
    back_buffers: Vec<TextureId>,
    current: u32,
    frame: Option<wgpu::SurfaceTexture>,
}

impl WgpuSwapChain {
    pub(crate) fn new(
        surface: wgpu::Surface<'static>,
        config: wgpu::SurfaceConfiguration,
        device: WgpuDevice,
        format: TextureFormat,
        buffer_count: u32,
    ) -> Result<Self, RenderError> {
        surface.configure(device.raw_device(), &config);
        let back_buffers = (0..buffer_count.max(1))
            .map(|_| device.register_back_buffer())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            surface,
            config,
            device,
            format,
            back_buffers,
            current: 0,
            frame: None,
        })
    }

    fn reconfigure(&self) {
        self.surface
            .configure(self.device.raw_device(), &self.config);
    }
}

impl SwapChain for WgpuSwapChain {
    fn buffer_count(&self) -> u32 {
        self.back_buffers.len() as u32
    }

    fn format(&self) -> TextureFormat {
        self.format
    }

    fn size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    fn back_buffer(&self, index: u32) -> TextureId {
        self.back_buffers[index as usize % self.back_buffers.len()]
    }

    fn current_back_buffer_index(&self) -> u32 {
        self.current
    }

    fn acquire_next(&mut self) -> Result<u32, RenderError> {
        if self.frame.is_some() {
            return Ok(self.current);
        }
        let mut reconfigured = false;
        let frame = loop {
            match self.surface.get_current_texture() {
                Ok(frame) => break frame,
                Err(e @ (wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated))
                    if !reconfigured =>
                {
                    log::warn!(
                        "WgpuSwapChain: Surface lost or outdated ({:?}). Reconfiguring with W={}, H={}",
                        e,
                        self.config.width,
                        self.config.height
                    );
                    self.reconfigure();
                    reconfigured = true;
                }
                Err(e) => {
                    log::error!("WgpuSwapChain: Failed to acquire frame: {e:?}");
                    return Err(RenderError::SurfaceAcquisitionFailed(format!("{e:?}")));
                }
            }
        };
        if frame.suboptimal {
            log::debug!("WgpuSwapChain: Acquired a suboptimal frame");
        }
        self.device.set_back_buffer(Some(frame.texture.clone()));
        self.frame = Some(frame);
        Ok(self.current)
    }

    fn present(&mut self) -> Result<(), RenderError> {
        let frame = self.frame.take().ok_or_else(|| {
            RenderError::RenderingFailed("present called without an acquired back buffer".into())
        })?;
        self.device.set_back_buffer(None);
        frame.present();
        self.current = (self.current + 1) % self.buffer_count();
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<(), RenderError> {
        if width == 0 || height == 0 {
            log::debug!("WgpuSwapChain: Ignoring resize to {width}x{height}");
            return Ok(());
        }
        self.frame = None;
        self.device.set_back_buffer(None);
        self.config.width = width;
        self.config.height = height;
        self.reconfigure();
        log::info!("WgpuSwapChain: Resized to {width}x{height}");
        Ok(())
    }
}
