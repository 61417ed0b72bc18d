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

//! Per-frame and per-draw constant data and the ring that cycles it.

use crate::config::{BloomConfig, ClusterGridConfig};
use crate::math::{Camera, LinearRgba, Mat4, Vec3};
use crate::renderer::api::align_up;
use bytemuck::{Pod, Zeroable};

/// Required alignment of constant-buffer views.
pub const CONSTANT_BUFFER_ALIGNMENT: u64 = 256;

/// Constants shared by every pass of one frame.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct FrameData {
    /// World to view.
    pub view: [[f32; 4]; 4],
    /// View to clip.
    pub projection: [[f32; 4]; 4],
    /// World to clip.
    pub view_projection: [[f32; 4]; 4],
    /// Clip to view, used to rebuild cluster bounds.
    pub inverse_projection: [[f32; 4]; 4],
    /// World to shadow-map clip space.
    pub shadow_view_projection: [[f32; 4]; 4],
    /// Eye position in `xyz`.
    pub camera_position: [f32; 4],
    /// Direction the sun light travels, in `xyz`.
    pub light_direction: [f32; 4],
    /// Sun color in `rgb`, intensity in `a`.
    pub light_color: [f32; 4],
    /// Render target size in pixels.
    pub viewport_size: [f32; 2],
    /// Near and far clip distances.
    pub near_far: [f32; 2],
    /// Cluster grid dimensions in `xyz`, light count in `w`.
    pub cluster_dims: [u32; 4],
    /// Bloom threshold and intensity.
    pub bloom: [f32; 4],
}

impl Default for FrameData {
    fn default() -> Self {
        Self::zeroed()
    }
}

/// A directional light lighting the whole scene and casting the shadow map.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SunLight {
    /// Direction the light travels.
    pub direction: Vec3,
    /// Linear color.
    pub color: LinearRgba,
    /// Intensity multiplier.
    pub intensity: f32,
    /// Half extent of the shadow volume around the camera target.
    pub shadow_extent: f32,
}

impl Default for SunLight {
    fn default() -> Self {
        Self {
            direction: Vec3::new(-0.3, -1.0, -0.4),
            color: LinearRgba::WHITE,
            intensity: 3.0,
            shadow_extent: 30.0,
        }
    }
}

impl FrameData {
    /// Size of one frame constant block.
    pub const SIZE: u64 = std::mem::size_of::<FrameData>() as u64;

    /// Distance between two ring slots in the constant buffer.
    pub const SLOT_STRIDE: u64 = align_up(Self::SIZE, CONSTANT_BUFFER_ALIGNMENT);

    /// Fills the constants for `camera` looking at a `width` x `height` target.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        camera: &Camera,
        width: u32,
        height: u32,
        sun: &SunLight,
        shadow_view_projection: Mat4,
        cluster_grid: ClusterGridConfig,
        light_count: u32,
        bloom: BloomConfig,
    ) -> Self {
        let aspect = width as f32 / height.max(1) as f32;
        let view = camera.view();
        let projection = camera.projection(aspect);
        let direction = sun.direction.try_normalize().unwrap_or(Vec3::NEG_Y);
        Self {
            view: view.to_cols_array_2d(),
            projection: projection.to_cols_array_2d(),
            view_projection: (projection * view).to_cols_array_2d(),
            inverse_projection: projection.inverse().to_cols_array_2d(),
            shadow_view_projection: shadow_view_projection.to_cols_array_2d(),
            camera_position: camera.position.extend(1.0).to_array(),
            light_direction: direction.extend(0.0).to_array(),
            light_color: [sun.color.r, sun.color.g, sun.color.b, sun.intensity],
            viewport_size: [width as f32, height as f32],
            near_far: [camera.near, camera.far],
            cluster_dims: [cluster_grid.x, cluster_grid.y, cluster_grid.z, light_count],
            bloom: [bloom.threshold, bloom.intensity, 0.0, 0.0],
        }
    }
}

/// Per-draw inline constants: the model matrix and the diffuse color.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ObjectData {
    /// Object to world.
    pub model: [[f32; 4]; 4],
    /// Base color multiplied into the diffuse texture.
    pub diffuse_color: [f32; 4],
}

impl ObjectData {
    /// Number of 32-bit values pushed per draw.
    pub const NUM_VALUES: u32 = (std::mem::size_of::<ObjectData>() / 4) as u32;

    /// Creates the constants for one draw.
    pub fn new(model: Mat4, diffuse_color: LinearRgba) -> Self {
        Self {
            model: model.to_cols_array_2d(),
            diffuse_color: diffuse_color.to_array(),
        }
    }

    /// The constants as 32-bit values.
    pub fn as_values(&self) -> &[u32] {
        bytemuck::cast_slice(std::slice::from_ref(self))
    }
}

/// Maps logical frame numbers onto the fixed set of ring slots.
///
/// Frame `k` uses slot `k % buffer_count`; a slot is only rewritten after the work
/// of the frame that last used it has been recycled through the allocator pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameRing {
    buffer_count: u32,
    frame: u64,
}

impl FrameRing {
    /// Creates a ring of `buffer_count` slots starting at frame 0.
    pub fn new(buffer_count: u32) -> Self {
        Self {
            buffer_count: buffer_count.max(1),
            frame: 0,
        }
    }

    /// The slot logical frame `frame` writes into.
    pub fn slot_for(&self, frame: u64) -> u32 {
        (frame % u64::from(self.buffer_count)) as u32
    }

    /// The current logical frame.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// The slot of the current frame.
    pub fn slot(&self) -> u32 {
        self.slot_for(self.frame)
    }

    /// Byte offset of the current slot in a ring buffer of `FrameData` blocks.
    pub fn slot_offset(&self) -> u64 {
        u64::from(self.slot()) * FrameData::SLOT_STRIDE
    }

    /// Moves to the next frame and returns its slot.
    pub fn advance(&mut self) -> u32 {
        self.frame += 1;
        self.slot()
    }

    /// Number of slots.
    pub fn buffer_count(&self) -> u32 {
        self.buffer_count
    }

    /// Bytes a buffer needs to hold every slot.
    pub fn buffer_size(&self) -> u64 {
        u64::from(self.buffer_count) * FrameData::SLOT_STRIDE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn constant_layouts() {
        assert_eq!(FrameData::SIZE % 16, 0);
        assert_eq!(FrameData::SLOT_STRIDE % CONSTANT_BUFFER_ALIGNMENT, 0);
        assert!(FrameData::SLOT_STRIDE >= FrameData::SIZE);
        assert_eq!(ObjectData::NUM_VALUES, 20);
    }

    #[test]
    fn slot_is_frame_modulo_buffer_count() {
        for buffer_count in 2..=4u32 {
            let ring = FrameRing::new(buffer_count);
            for k in 0..50u64 {
                assert_eq!(ring.slot_for(k), (k % u64::from(buffer_count)) as u32);
                assert_eq!(ring.slot_for(k), ring.slot_for(k + u64::from(buffer_count)));
            }
        }
    }

    #[test]
    fn advance_cycles_slots_and_offsets() {
        let mut ring = FrameRing::new(3);
        let slots: Vec<u32> = (0..6).map(|_| ring.advance()).collect();
        assert_eq!(slots, vec![1, 2, 0, 1, 2, 0]);
        assert_eq!(ring.frame(), 6);
        assert_eq!(ring.slot_offset(), 0);
        ring.advance();
        assert_eq!(ring.slot_offset(), FrameData::SLOT_STRIDE);
        assert_eq!(ring.buffer_size(), 3 * FrameData::SLOT_STRIDE);
    }

    #[test]
    fn object_data_values_round_the_model_matrix() {
        let data = ObjectData::new(Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0)), LinearRgba::WHITE);
        let values = data.as_values();
        assert_eq!(values.len(), 20);
        assert_relative_eq!(f32::from_bits(values[12]), 1.0);
        assert_relative_eq!(f32::from_bits(values[16]), 1.0);
    }

    #[test]
    fn frame_data_records_viewport_and_lights() {
        let data = FrameData::new(
            &Camera::default(),
            1280,
            720,
            &SunLight::default(),
            Mat4::IDENTITY,
            ClusterGridConfig::default(),
            7,
            BloomConfig::default(),
        );
        assert_eq!(data.viewport_size, [1280.0, 720.0]);
        assert_eq!(data.cluster_dims, [16, 8, 24, 7]);
        assert_relative_eq!(Vec3::from_slice(&data.light_direction[..3]).length(), 1.0, epsilon = 1e-5);
    }
}
