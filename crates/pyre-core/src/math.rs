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

//! Math primitives used by the renderer.
//!
//! Linear algebra comes from `glam`; this module adds the small amount of
//! camera math the frame orchestrator needs on top of it.

pub use glam::{Mat3, Mat4, Quat, Vec2, Vec3, Vec4};

/// A small constant for floating-point comparisons.
pub const EPSILON: f32 = 1e-5;

/// A linear-space RGBA color.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LinearRgba {
    /// Red channel.
    pub r: f32,
    /// Green channel.
    pub g: f32,
    /// Blue channel.
    pub b: f32,
    /// Alpha channel.
    pub a: f32,
}

impl LinearRgba {
    /// Opaque white.
    pub const WHITE: Self = Self::new(1.0, 1.0, 1.0, 1.0);
    /// Opaque black.
    pub const BLACK: Self = Self::new(0.0, 0.0, 0.0, 1.0);

    /// Creates a color from its four channels.
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Returns the channels as an array.
    pub const fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

/// A perspective camera described by its pose and projection parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    /// World-space eye position.
    pub position: Vec3,
    /// World-space point the camera looks at.
    pub target: Vec3,
    /// World-space up direction.
    pub up: Vec3,
    /// Vertical field of view in radians.
    pub fov_y: f32,
    /// Near clip plane distance.
    pub near: f32,
    /// Far clip plane distance.
    pub far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 2.0, 6.0),
            target: Vec3::ZERO,
            up: Vec3::Y,
            fov_y: std::f32::consts::FRAC_PI_4,
            near: 0.1,
            far: 500.0,
        }
    }
}

impl Camera {
    /// Returns the right-handed view matrix.
    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up)
    }

    /// Returns the right-handed projection matrix for the given aspect ratio.
    pub fn projection(&self, aspect_ratio: f32) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, aspect_ratio.max(EPSILON), self.near, self.far)
    }
}

/// Builds an orthographic view-projection for a directional light looking at `focus`.
///
/// The light volume is a box of `extent` world units around the focus point.
pub fn directional_light_view_projection(direction: Vec3, focus: Vec3, extent: f32) -> Mat4 {
    let direction = direction.try_normalize().unwrap_or(Vec3::NEG_Y);
    let eye = focus - direction * extent;
    let up = if direction.abs_diff_eq(Vec3::Y, 1e-3) || direction.abs_diff_eq(Vec3::NEG_Y, 1e-3) {
        Vec3::Z
    } else {
        Vec3::Y
    };
    let view = Mat4::look_at_rh(eye, focus, up);
    let projection = Mat4::orthographic_rh(-extent, extent, -extent, extent, 0.0, extent * 2.0);
    projection * view
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn camera_view_maps_target_onto_negative_z() {
        let camera = Camera::default();
        let target_in_view = camera.view().transform_point3(camera.target);
        assert_relative_eq!(target_in_view.x, 0.0, epsilon = 1e-5);
        assert_relative_eq!(target_in_view.y, 0.0, epsilon = 1e-5);
        assert!(target_in_view.z < 0.0);
    }

    #[test]
    fn light_view_projection_keeps_focus_inside_clip_volume() {
        let vp = directional_light_view_projection(Vec3::new(-0.3, -1.0, -0.2), Vec3::ZERO, 20.0);
        let clip = vp * Vec4::new(0.0, 0.0, 0.0, 1.0);
        assert!(clip.x.abs() <= 1.0 && clip.y.abs() <= 1.0);
        assert!((0.0..=1.0).contains(&clip.z));
    }

    #[test]
    fn straight_down_light_does_not_degenerate() {
        let vp = directional_light_view_projection(Vec3::NEG_Y, Vec3::ZERO, 10.0);
        assert!(vp.is_finite());
    }
}
