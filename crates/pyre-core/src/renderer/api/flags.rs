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

//! Small bit-flag sets used by descriptors and root signatures.

macro_rules! flag_set {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$flag_meta:meta])* $flag:ident = $bit:expr ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
        pub struct $name {
            bits: u32,
        }

        impl $name {
            /// The empty set.
            pub const NONE: Self = Self { bits: 0 };
            $( $(#[$flag_meta])* pub const $flag: Self = Self { bits: $bit }; )*

            /// Creates a set from raw bits.
            pub const fn from_bits(bits: u32) -> Self {
                Self { bits }
            }

            /// Returns the raw bits.
            pub const fn bits(&self) -> u32 {
                self.bits
            }

            /// Combines two sets.
            pub const fn union(self, other: Self) -> Self {
                Self {
                    bits: self.bits | other.bits,
                }
            }

            /// Returns `true` if every flag of `other` is set in `self`.
            pub const fn contains(&self, other: Self) -> bool {
                (self.bits & other.bits) == other.bits
            }

            /// Returns `true` if at least one flag of `other` is set in `self`.
            pub const fn intersects(&self, other: Self) -> bool {
                (self.bits & other.bits) != 0
            }

            /// Returns `true` if no flag is set.
            pub const fn is_empty(&self) -> bool {
                self.bits == 0
            }

            /// Returns a copy of `self` without the flags of `other`.
            pub const fn difference(self, other: Self) -> Self {
                Self {
                    bits: self.bits & !other.bits,
                }
            }
        }

        impl std::ops::BitOr for $name {
            type Output = Self;

            fn bitor(self, rhs: Self) -> Self {
                self.union(rhs)
            }
        }

        impl std::ops::BitOrAssign for $name {
            fn bitor_assign(&mut self, rhs: Self) {
                self.bits |= rhs.bits;
            }
        }
    };
}

flag_set! {
    /// Shader stages that can see a root parameter.
    ShaderVisibility {
        /// Vertex shader stage.
        VERTEX = 1 << 0,
        /// Pixel (fragment) shader stage.
        PIXEL = 1 << 1,
        /// Compute shader stage.
        COMPUTE = 1 << 2,
        /// Amplification (task) shader stage.
        TASK = 1 << 3,
        /// Mesh shader stage.
        MESH = 1 << 4,
        /// Vertex and pixel stages.
        ALL_GRAPHICS = (1 << 0) | (1 << 1),
        /// Every stage.
        ALL = 0b1_1111,
    }
}

flag_set! {
    /// The ways a buffer may be used by the GPU.
    BufferUsage {
        /// Bound as a vertex buffer.
        VERTEX = 1 << 0,
        /// Bound as an index buffer.
        INDEX = 1 << 1,
        /// Read as a constant buffer.
        CONSTANT = 1 << 2,
        /// Read or written as a structured, raw or typed buffer.
        STORAGE = 1 << 3,
        /// Source of copy operations.
        COPY_SRC = 1 << 4,
        /// Destination of copy operations.
        COPY_DST = 1 << 5,
    }
}

flag_set! {
    /// The ways a texture may be used by the GPU.
    TextureUsage {
        /// Bound as a render target.
        RENDER_TARGET = 1 << 0,
        /// Bound as a depth-stencil target.
        DEPTH_STENCIL = 1 << 1,
        /// Sampled or read in shaders.
        SHADER_RESOURCE = 1 << 2,
        /// Written through unordered access views.
        UNORDERED_ACCESS = 1 << 3,
        /// Source of copy or resolve operations.
        COPY_SRC = 1 << 4,
        /// Destination of copy or resolve operations.
        COPY_DST = 1 << 5,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn union_and_contains() {
        let usage = BufferUsage::VERTEX | BufferUsage::COPY_DST;
        assert!(usage.contains(BufferUsage::VERTEX));
        assert!(!usage.contains(BufferUsage::INDEX));
        assert!(usage.intersects(BufferUsage::COPY_DST | BufferUsage::INDEX));
        assert_eq!(usage.difference(BufferUsage::VERTEX), BufferUsage::COPY_DST);
    }

    #[test]
    fn all_graphics_covers_vertex_and_pixel() {
        assert!(ShaderVisibility::ALL_GRAPHICS.contains(ShaderVisibility::VERTEX));
        assert!(ShaderVisibility::ALL_GRAPHICS.contains(ShaderVisibility::PIXEL));
        assert!(!ShaderVisibility::ALL_GRAPHICS.contains(ShaderVisibility::COMPUTE));
        assert!(ShaderVisibility::ALL.contains(ShaderVisibility::MESH));
    }
}
