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

//! The vertex layout shared by every geometry pass and the mega-buffers.

use super::pipeline::{InputElement, InputLayout, VertexFormat};
use bytemuck::{Pod, Zeroable};

/// One vertex of the shared vertex mega-buffer.
///
/// The layout is bit-exact: position at 0, normal at 16, tangent at 28,
/// bitangent at 40, texture coordinates at 52, for a 60-byte stride.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct Vertex {
    /// Homogeneous object-space position.
    pub position: [f32; 4],
    /// Object-space normal.
    pub normal: [f32; 3],
    /// Object-space tangent.
    pub tangent: [f32; 3],
    /// Object-space bitangent.
    pub bitangent: [f32; 3],
    /// Texture coordinates.
    pub uv: [f32; 2],
}

impl Vertex {
    /// Size of one vertex in bytes.
    pub const STRIDE: u32 = 60;
    /// Byte offset of [`Vertex::position`].
    pub const POSITION_OFFSET: u32 = 0;
    /// Byte offset of [`Vertex::normal`].
    pub const NORMAL_OFFSET: u32 = 16;
    /// Byte offset of [`Vertex::tangent`].
    pub const TANGENT_OFFSET: u32 = 28;
    /// Byte offset of [`Vertex::bitangent`].
    pub const BITANGENT_OFFSET: u32 = 40;
    /// Byte offset of [`Vertex::uv`].
    pub const UV_OFFSET: u32 = 52;

    /// Creates a vertex from a position, normal and texture coordinates, with a
    /// tangent frame derived from the normal.
    pub fn new(position: [f32; 3], normal: [f32; 3], uv: [f32; 2]) -> Self {
        let n = glam::Vec3::from(normal).normalize_or(glam::Vec3::Y);
        let reference = if n.y.abs() < 0.999 { glam::Vec3::Y } else { glam::Vec3::X };
        let tangent = reference.cross(n).normalize();
        let bitangent = n.cross(tangent);
        Self {
            position: [position[0], position[1], position[2], 1.0],
            normal: n.to_array(),
            tangent: tangent.to_array(),
            bitangent: bitangent.to_array(),
            uv,
        }
    }

    /// The input layout matching this struct.
    pub fn input_layout() -> InputLayout {
        InputLayout {
            stride: Self::STRIDE,
            elements: vec![
                InputElement {
                    semantic: "POSITION",
                    location: 0,
                    format: VertexFormat::Float32x4,
                    offset: Self::POSITION_OFFSET,
                },
                InputElement {
                    semantic: "NORMAL",
                    location: 1,
                    format: VertexFormat::Float32x3,
                    offset: Self::NORMAL_OFFSET,
                },
                InputElement {
                    semantic: "TANGENT",
                    location: 2,
                    format: VertexFormat::Float32x3,
                    offset: Self::TANGENT_OFFSET,
                },
                InputElement {
                    semantic: "BITANGENT",
                    location: 3,
                    format: VertexFormat::Float32x3,
                    offset: Self::BITANGENT_OFFSET,
                },
                InputElement {
                    semantic: "TEXCOORD",
                    location: 4,
                    format: VertexFormat::Float32x2,
                    offset: Self::UV_OFFSET,
                },
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::{offset_of, size_of};

    #[test]
    fn layout_is_bit_exact() {
        assert_eq!(size_of::<Vertex>(), 60);
        assert_eq!(offset_of!(Vertex, position), 0);
        assert_eq!(offset_of!(Vertex, normal), 16);
        assert_eq!(offset_of!(Vertex, tangent), 28);
        assert_eq!(offset_of!(Vertex, bitangent), 40);
        assert_eq!(offset_of!(Vertex, uv), 52);
    }

    #[test]
    fn input_layout_matches_struct() {
        let layout = Vertex::input_layout();
        assert_eq!(layout.stride as usize, size_of::<Vertex>());
        let end = layout
            .elements
            .iter()
            .map(|e| e.offset + e.format.size())
            .max()
            .unwrap();
        assert_eq!(end, Vertex::STRIDE);
    }

    #[test]
    fn tangent_frame_is_orthonormal() {
        let v = Vertex::new([0.0; 3], [0.0, 0.0, 1.0], [0.0, 0.0]);
        let n = glam::Vec3::from(v.normal);
        let t = glam::Vec3::from(v.tangent);
        let b = glam::Vec3::from(v.bitangent);
        assert!(n.dot(t).abs() < 1e-5);
        assert!(n.dot(b).abs() < 1e-5);
        assert!((t.length() - 1.0).abs() < 1e-5);
    }
}
