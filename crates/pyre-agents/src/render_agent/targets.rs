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

//! Size-dependent render targets and the swap-chain back buffers.

use pyre_core::config::RendererConfig;
use pyre_core::renderer::api::{TextureFormat, TextureId};
use pyre_core::renderer::{
    ColorBuffer, ColorBufferDescriptor, DepthBuffer, DescriptorHeaps, GraphicsDevice,
    ResourceError, ResourceStateTable, SwapChain,
};
use pyre_lanes::PassTargets;
use std::borrow::Cow;

/// Format of the scene depth buffer and the shadow map.
pub const DEPTH_FORMAT: TextureFormat = TextureFormat::Depth32Float;

/// Every render target a frame draws into.
///
/// All targets except the shadow map follow the swap-chain size. Resizing
/// recreates the textures in place, so descriptor slots are never reallocated.
#[derive(Debug)]
pub struct RenderTargets {
    depth: DepthBuffer,
    // Fixed size, independent of the window.
    shadow: DepthBuffer,
    // None when the lit pass draws straight into the back buffer.
    scene_color: Option<ColorBuffer>,
    resolved: Option<ColorBuffer>,
    bloom: Option<[ColorBuffer; 3]>,
    back_buffers: Vec<ColorBuffer>,
    // Bumped on every resize; frame drivers rebuild their state tables when it changes.
    generation: u64,
}

impl RenderTargets {
    /// Creates the targets at the swap chain's current size.
    pub fn new(
        device: &dyn GraphicsDevice,
        heaps: &mut DescriptorHeaps,
        config: &RendererConfig,
        swap_chain: &dyn SwapChain,
    ) -> Result<Self, ResourceError> {
        let (width, height) = swap_chain.size();
        let samples = config.msaa_samples;
        let scene_format = scene_format(device, config, swap_chain.format());

        let depth = DepthBuffer::create(
            device,
            heaps,
            "Scene Depth",
            width,
            height,
            samples,
            DEPTH_FORMAT,
            config.clear_depth,
            config.clear_stencil,
        )?;
        let (shadow_width, shadow_height) = config.shadow_map_size;
        let shadow = DepthBuffer::create(
            device,
            heaps,
            "Shadow Map",
            shadow_width,
            shadow_height,
            1,
            DEPTH_FORMAT,
            config.clear_depth,
            config.clear_stencil,
        )?;

        let color = |heaps: &mut DescriptorHeaps, label: &'static str, sample_count: u32| {
            ColorBuffer::create(
                device,
                heaps,
                &ColorBufferDescriptor {
                    label: Cow::Borrowed(label),
                    width,
                    height,
                    mip_levels: 1,
                    sample_count,
                    format: scene_format,
                    clear_color: [0.0, 0.0, 0.0, 1.0],
                },
            )
        };
        let scene_color = if samples > 1 || config.tone_mapping {
            Some(color(heaps, "Scene Color", samples)?)
        } else {
            None
        };
        let resolved = if samples > 1 && config.tone_mapping {
            Some(color(heaps, "Resolved Scene Color", 1)?)
        } else {
            None
        };
        let bloom = if config.tone_mapping {
            Some([
                color(heaps, "Bloom Extract", 1)?,
                color(heaps, "Bloom Blur H", 1)?,
                color(heaps, "Bloom Blur V", 1)?,
            ])
        } else {
            None
        };

        let back_buffers = (0..swap_chain.buffer_count())
            .map(|index| {
                ColorBuffer::create_from_swap_chain(
                    device,
                    heaps,
                    &format!("Back Buffer {index}"),
                    swap_chain.back_buffer(index),
                    width,
                    height,
                    swap_chain.format(),
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        log::info!(
            "Created render targets at {width}x{height} ({samples}x MSAA, scene format {scene_format:?})"
        );
        Ok(Self {
            depth,
            shadow,
            scene_color,
            resolved,
            bloom,
            back_buffers,
            generation: 0,
        })
    }

    /// Recreates every window-sized target at `width` x `height`.
    ///
    /// The GPU must be idle and the swap chain already resized.
    pub fn resize(&mut self, device: &dyn GraphicsDevice, width: u32, height: u32) -> Result<(), ResourceError> {
        self.depth.resize(device, width, height)?;
        for target in self
            .scene_color
            .iter_mut()
            .chain(self.resolved.iter_mut())
            .chain(self.bloom.iter_mut().flatten())
            .chain(self.back_buffers.iter_mut())
        {
            target.resize(device, width, height)?;
        }
        self.generation += 1;
        Ok(())
    }

    /// The targets bound while rendering into back buffer `index`.
    ///
    /// # Errors
    ///
    /// [`ResourceError::OutOfBounds`] for an index past the swap chain.
    pub fn pass_targets(&self, index: u32) -> Result<PassTargets<'_>, ResourceError> {
        let back_buffer = self.back_buffer(index)?;
        Ok(PassTargets {
            depth: &self.depth,
            shadow: &self.shadow,
            scene_color: self.scene_color.as_ref().unwrap_or(back_buffer),
            resolved: self.resolved.as_ref(),
            bloom: self.bloom.as_ref().map(|[a, b, c]| [a, b, c]),
            back_buffer,
        })
    }

    /// The wrapper of back buffer `index`.
    pub fn back_buffer(&self, index: u32) -> Result<&ColorBuffer, ResourceError> {
        self.back_buffers.get(index as usize).ok_or(ResourceError::OutOfBounds)
    }

    /// Registers every target in its creation state.
    pub fn track(&self, states: &mut ResourceStateTable) {
        states.track(&self.depth);
        states.track(&self.shadow);
        for target in self.color_targets() {
            states.track(target);
        }
    }

    /// Every texture owned or wrapped by the targets.
    pub fn textures(&self) -> Vec<TextureId> {
        [self.depth.texture(), self.shadow.texture()]
            .into_iter()
            .chain(self.color_targets().map(ColorBuffer::texture))
            .collect()
    }

    fn color_targets(&self) -> impl Iterator<Item = &ColorBuffer> {
        self.scene_color
            .iter()
            .chain(self.resolved.iter())
            .chain(self.bloom.iter().flatten())
            .chain(self.back_buffers.iter())
    }

    /// Scene depth.
    pub fn depth(&self) -> &DepthBuffer {
        &self.depth
    }

    /// Shadow map.
    pub fn shadow(&self) -> &DepthBuffer {
        &self.shadow
    }

    /// The intermediate scene target, if the frame does not draw into the back buffer.
    pub fn scene_color(&self) -> Option<&ColorBuffer> {
        self.scene_color.as_ref()
    }

    /// Current window-sized extent.
    pub fn size(&self) -> (u32, u32) {
        (self.depth.width(), self.depth.height())
    }

    /// Number of resizes so far.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Releases every target except the back buffers, which the swap chain owns.
    pub fn destroy(self, device: &dyn GraphicsDevice) -> Result<(), ResourceError> {
        self.depth.destroy(device)?;
        self.shadow.destroy(device)?;
        for target in self
            .scene_color
            .into_iter()
            .chain(self.resolved)
            .chain(self.bloom.into_iter().flatten())
        {
            target.destroy(device)?;
        }
        Ok(())
    }
}

/// Format lit geometry is drawn in: an HDR format when the post-process chain
/// runs, the back-buffer format otherwise.
pub fn scene_format(device: &dyn GraphicsDevice, config: &RendererConfig, back_buffer: TextureFormat) -> TextureFormat {
    if config.tone_mapping {
        device.capabilities().preferred_hdr_uav_format()
    } else {
        back_buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pyre_core::renderer::api::ResourceState;
    use pyre_core::testing::{MockDevice, MockSwapChain};

    fn build(msaa_samples: u32, tone_mapping: bool) -> (MockDevice, MockSwapChain, DescriptorHeaps, RenderTargets) {
        let device = MockDevice::new();
        let config = RendererConfig {
            msaa_samples,
            tone_mapping,
            shadow_map_size: (256, 256),
            ..Default::default()
        };
        let mut heaps = DescriptorHeaps::new(&device, &config.descriptor_heaps).unwrap();
        let swap_chain = MockSwapChain::new(&device, 3, 64, 32, TextureFormat::Bgra8UnormSrgb).unwrap();
        let targets = RenderTargets::new(&device, &mut heaps, &config, &swap_chain).unwrap();
        (device, swap_chain, heaps, targets)
    }

    #[test]
    fn plain_single_sample_draws_into_the_back_buffer() {
        let (_device, swap_chain, _heaps, targets) = build(1, false);
        let pass = targets.pass_targets(1).unwrap();
        assert_eq!(pass.scene_color.texture(), swap_chain.back_buffer(1));
        assert!(pass.resolved.is_none() && pass.bloom.is_none());
    }

    #[test]
    fn msaa_tone_mapping_gets_a_resolve_target() {
        let (_device, _swap_chain, _heaps, targets) = build(4, true);
        let pass = targets.pass_targets(0).unwrap();
        assert_eq!(pass.scene_color.sample_count(), 4);
        assert_eq!(pass.depth.sample_count(), 4);
        assert_eq!(pass.resolved.map(ColorBuffer::sample_count), Some(1));
        assert!(pass.bloom.is_some());
        assert_eq!(pass.shadow.width(), 256);
        assert!(targets.pass_targets(3).is_err());
    }

    #[test]
    fn resize_keeps_shadow_map_and_bumps_generation() {
        let (device, _swap_chain, mut heaps, mut targets) = build(4, true);
        let allocated = heaps.rtv.allocated();

        targets.resize(&device, 128, 96).unwrap();

        assert_eq!(targets.size(), (128, 96));
        assert_eq!(targets.generation(), 1);
        assert_eq!(targets.shadow().width(), 256);
        assert_eq!(targets.back_buffer(2).unwrap().width(), 128);
        assert_eq!(heaps.rtv.allocated(), allocated);
    }

    #[test]
    fn tracked_back_buffers_start_in_present_state() {
        let (_device, swap_chain, _heaps, targets) = build(1, true);
        let mut states = ResourceStateTable::new();
        targets.track(&mut states);
        assert_eq!(states.state(swap_chain.back_buffer(0)), Some(ResourceState::Present));
        assert_eq!(states.state(targets.depth().texture()), Some(ResourceState::DepthWrite));
        assert_eq!(states.len(), targets.textures().len());
    }
}
