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

//! Point lights and the cluster grid they are culled into.

use crate::config::ClusterGridConfig;
use crate::math::{LinearRgba, Vec3};
use crate::renderer::error::ResourceError;
use bytemuck::{Pod, Zeroable};

/// Most lights a single cluster can reference.
pub const MAX_LIGHTS_PER_CLUSTER: usize = 32;

/// A point light as laid out in the structured light buffer.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct Light {
    /// World-space position in `xyz`, range in `w`.
    pub position_range: [f32; 4],
    /// Linear color in `rgb`, intensity in `a`.
    pub color_intensity: [f32; 4],
}

impl Light {
    /// Size of one light in the structured buffer.
    pub const STRIDE: u32 = std::mem::size_of::<Light>() as u32;

    /// Creates a point light.
    pub fn point(position: Vec3, range: f32, color: LinearRgba, intensity: f32) -> Self {
        Self {
            position_range: [position.x, position.y, position.z, range],
            color_intensity: [color.r, color.g, color.b, intensity],
        }
    }

    /// World-space position.
    pub fn position(&self) -> Vec3 {
        Vec3::new(self.position_range[0], self.position_range[1], self.position_range[2])
    }

    /// Influence radius.
    pub fn range(&self) -> f32 {
        self.position_range[3]
    }
}

/// A bounded list of lights uploaded as one structured buffer.
#[derive(Debug, Clone)]
pub struct LightSet {
    lights: Vec<Light>,
    capacity: u32,
}

impl LightSet {
    /// Creates an empty set holding at most `capacity` lights.
    pub fn with_capacity(capacity: u32) -> Self {
        Self {
            lights: Vec::with_capacity(capacity as usize),
            capacity,
        }
    }

    /// Appends a light.
    ///
    /// # Errors
    ///
    /// [`ResourceError::OutOfBounds`] once the set holds `capacity` lights.
    pub fn push(&mut self, light: Light) -> Result<(), ResourceError> {
        if self.lights.len() as u32 >= self.capacity {
            return Err(ResourceError::OutOfBounds);
        }
        self.lights.push(light);
        Ok(())
    }

    /// Removes every light.
    pub fn clear(&mut self) {
        self.lights.clear();
    }

    /// The lights in insertion order.
    pub fn lights(&self) -> &[Light] {
        &self.lights
    }

    /// Number of lights.
    pub fn len(&self) -> u32 {
        self.lights.len() as u32
    }

    /// Returns `true` without lights.
    pub fn is_empty(&self) -> bool {
        self.lights.is_empty()
    }

    /// Maximum number of lights.
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Bytes of the structured buffer backing a full set.
    pub fn buffer_size(&self) -> u64 {
        u64::from(self.capacity) * u64::from(Light::STRIDE)
    }

    /// The lights as raw bytes, ready for upload.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.lights)
    }
}

/// The per-cluster record written by the light-cull pass.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct Cluster {
    /// View-space minimum corner.
    pub aabb_min: [f32; 4],
    /// View-space maximum corner.
    pub aabb_max: [f32; 4],
    /// Number of valid entries in `light_indices`.
    pub light_count: u32,
    /// Padding to a 16-byte boundary.
    pub _pad: [u32; 3],
    /// Indices into the light buffer.
    pub light_indices: [u32; MAX_LIGHTS_PER_CLUSTER],
}

impl Cluster {
    /// Size of one cluster in the structured buffer.
    pub const STRIDE: u32 = std::mem::size_of::<Cluster>() as u32;
}

/// The `X x Y x Z` grid of view-space clusters.
///
/// Depth slices are distributed logarithmically between the near and far planes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClusterGrid {
    dims: ClusterGridConfig,
}

impl ClusterGrid {
    /// Creates a grid with the configured dimensions.
    pub fn new(dims: ClusterGridConfig) -> Self {
        Self { dims }
    }

    /// Grid dimensions.
    pub fn dims(&self) -> ClusterGridConfig {
        self.dims
    }

    /// Total number of clusters.
    pub fn cluster_count(&self) -> u32 {
        self.dims.x * self.dims.y * self.dims.z
    }

    /// Bytes of the structured cluster buffer.
    pub fn buffer_size(&self) -> u64 {
        u64::from(self.cluster_count()) * u64::from(Cluster::STRIDE)
    }

    /// The thread-group grid the light-cull pass dispatches: one group per cluster.
    pub fn dispatch_size(&self) -> (u32, u32, u32) {
        (self.dims.x, self.dims.y, self.dims.z)
    }

    /// Linear index of cluster `(x, y, z)`, or `None` outside the grid.
    pub fn cluster_index(&self, x: u32, y: u32, z: u32) -> Option<u32> {
        (x < self.dims.x && y < self.dims.y && z < self.dims.z)
            .then(|| x + self.dims.x * (y + self.dims.y * z))
    }

    /// Depth slice containing positive view depth `depth`, clamped to the grid.
    pub fn depth_slice(&self, depth: f32, near: f32, far: f32) -> u32 {
        if depth <= near {
            return 0;
        }
        let slice = (depth / near).ln() * self.dims.z as f32 / (far / near).ln();
        (slice.floor() as u32).min(self.dims.z - 1)
    }

    /// Near and far view depth of slice `z`.
    pub fn slice_bounds(&self, z: u32, near: f32, far: f32) -> (f32, f32) {
        let ratio = far / near;
        let slices = self.dims.z as f32;
        (
            near * ratio.powf(z as f32 / slices),
            near * ratio.powf((z + 1) as f32 / slices),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn light_layout_is_two_vec4() {
        assert_eq!(Light::STRIDE, 32);
        assert_eq!(Cluster::STRIDE % 16, 0);
    }

    #[test]
    fn light_set_is_bounded() {
        let mut set = LightSet::with_capacity(2);
        let light = Light::point(Vec3::ONE, 5.0, LinearRgba::WHITE, 2.0);
        set.push(light).unwrap();
        set.push(light).unwrap();
        assert!(matches!(set.push(light), Err(ResourceError::OutOfBounds)));
        assert_eq!(set.as_bytes().len(), 64);
        assert_eq!(set.buffer_size(), 64);
        assert_relative_eq!(set.lights()[0].range(), 5.0);
    }

    #[test]
    fn cluster_index_is_x_major() {
        let grid = ClusterGrid::new(ClusterGridConfig { x: 16, y: 8, z: 24 });
        assert_eq!(grid.cluster_count(), 3072);
        assert_eq!(grid.cluster_index(0, 0, 0), Some(0));
        assert_eq!(grid.cluster_index(1, 0, 0), Some(1));
        assert_eq!(grid.cluster_index(0, 1, 0), Some(16));
        assert_eq!(grid.cluster_index(0, 0, 1), Some(128));
        assert_eq!(grid.cluster_index(15, 7, 23), Some(3071));
        assert_eq!(grid.cluster_index(16, 0, 0), None);
    }

    #[test]
    fn depth_slices_are_logarithmic_and_clamped() {
        let grid = ClusterGrid::new(ClusterGridConfig { x: 1, y: 1, z: 4 });
        let (near, far) = (1.0, 10_000.0);
        assert_eq!(grid.depth_slice(0.5, near, far), 0);
        assert_eq!(grid.depth_slice(5.0, near, far), 0);
        assert_eq!(grid.depth_slice(50.0, near, far), 1);
        assert_eq!(grid.depth_slice(20_000.0, near, far), 3);
        let (lo, hi) = grid.slice_bounds(1, near, far);
        assert_relative_eq!(lo, 10.0, epsilon = 1e-3);
        assert_relative_eq!(hi, 100.0, epsilon = 1e-2);
    }
}
