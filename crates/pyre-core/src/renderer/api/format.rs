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

//! Pixel and index formats.

use serde::{Deserialize, Serialize};

/// Defines the memory format of pixels in a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TextureFormat {
    /// One 8-bit unsigned normalized component.
    R8Unorm,
    /// Four 8-bit unsigned normalized components (RGBA).
    Rgba8Unorm,
    /// Four 8-bit unsigned normalized components (RGBA) in the sRGB color space.
    Rgba8UnormSrgb,
    /// Four 8-bit unsigned normalized components (BGRA).
    Bgra8Unorm,
    /// Four 8-bit unsigned normalized components (BGRA) in the sRGB color space.
    Bgra8UnormSrgb,
    /// 10 bits per color channel and 2 bits of alpha.
    Rgb10a2Unorm,
    /// Packed unsigned floats: 11 bits red and green, 10 bits blue.
    Rg11b10Float,
    /// Four 16-bit float components.
    Rgba16Float,
    /// Four 32-bit float components.
    Rgba32Float,
    /// One 32-bit float component.
    R32Float,
    /// One 32-bit unsigned integer component.
    R32Uint,
    /// 32-bit float depth.
    Depth32Float,
    /// 24-bit depth with an 8-bit stencil plane.
    Depth24PlusStencil8,
    /// 32-bit float depth with an 8-bit stencil plane.
    Depth32FloatStencil8,
    /// BC1 block compression, RGBA.
    Bc1RgbaUnorm,
    /// BC3 block compression, RGBA.
    Bc3RgbaUnorm,
    /// BC5 block compression, two channels.
    Bc5RgUnorm,
    /// BC7 block compression, RGBA.
    Bc7RgbaUnorm,
}

impl TextureFormat {
    /// Returns `true` for formats carrying a depth plane.
    pub const fn is_depth(self) -> bool {
        matches!(
            self,
            Self::Depth32Float | Self::Depth24PlusStencil8 | Self::Depth32FloatStencil8
        )
    }

    /// Returns `true` for formats carrying a stencil plane.
    pub const fn has_stencil(self) -> bool {
        matches!(self, Self::Depth24PlusStencil8 | Self::Depth32FloatStencil8)
    }

    /// Returns `true` for block-compressed formats.
    pub const fn is_block_compressed(self) -> bool {
        matches!(
            self,
            Self::Bc1RgbaUnorm | Self::Bc3RgbaUnorm | Self::Bc5RgUnorm | Self::Bc7RgbaUnorm
        )
    }

    /// Returns the width and height of one addressable block (1x1 for uncompressed formats).
    pub const fn block_dimensions(self) -> (u32, u32) {
        if self.is_block_compressed() {
            (4, 4)
        } else {
            (1, 1)
        }
    }

    /// Returns the size in bytes of one block (one pixel for uncompressed formats).
    pub const fn block_size(self) -> u32 {
        match self {
            Self::R8Unorm => 1,
            Self::Rgba8Unorm
            | Self::Rgba8UnormSrgb
            | Self::Bgra8Unorm
            | Self::Bgra8UnormSrgb
            | Self::Rgb10a2Unorm
            | Self::Rg11b10Float
            | Self::R32Float
            | Self::R32Uint
            | Self::Depth32Float
            | Self::Depth24PlusStencil8 => 4,
            Self::Depth32FloatStencil8 | Self::Rgba16Float | Self::Bc1RgbaUnorm => 8,
            Self::Rgba32Float | Self::Bc3RgbaUnorm | Self::Bc5RgUnorm | Self::Bc7RgbaUnorm => 16,
        }
    }

    /// Returns the tightly packed size of one row of `width` pixels.
    pub const fn unpadded_row_pitch(self, width: u32) -> u32 {
        let (block_w, _) = self.block_dimensions();
        width.div_ceil(block_w) * self.block_size()
    }

    /// Returns the number of block rows covering `height` pixels.
    pub const fn row_count(self, height: u32) -> u32 {
        let (_, block_h) = self.block_dimensions();
        height.div_ceil(block_h)
    }
}

/// Specifies the data type of indices in an index buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexFormat {
    /// Indices are 16-bit unsigned integers.
    Uint16,
    /// Indices are 32-bit unsigned integers.
    Uint32,
}

impl IndexFormat {
    /// Size of one index in bytes.
    pub const fn size(self) -> u32 {
        match self {
            Self::Uint16 => 2,
            Self::Uint32 => 4,
        }
    }
}

/// Row pitch alignment required for buffer-to-texture copies.
pub const TEXTURE_DATA_PITCH_ALIGNMENT: u32 = 256;

/// Rounds `value` up to the next multiple of `alignment`, which must be a power of two.
pub const fn align_up(value: u64, alignment: u64) -> u64 {
    (value + alignment - 1) & !(alignment - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_formats_report_stencil_planes() {
        assert!(TextureFormat::Depth32Float.is_depth());
        assert!(!TextureFormat::Depth32Float.has_stencil());
        assert!(TextureFormat::Depth24PlusStencil8.has_stencil());
        assert!(!TextureFormat::Rgba16Float.is_depth());
    }

    #[test]
    fn row_pitch_accounts_for_blocks() {
        assert_eq!(TextureFormat::Rgba8Unorm.unpadded_row_pitch(3), 12);
        assert_eq!(TextureFormat::Bc1RgbaUnorm.unpadded_row_pitch(10), 24);
        assert_eq!(TextureFormat::Bc7RgbaUnorm.row_count(10), 3);
    }

    #[test]
    fn align_up_rounds_to_power_of_two() {
        assert_eq!(align_up(0, 256), 0);
        assert_eq!(align_up(1, 256), 256);
        assert_eq!(align_up(256, 256), 256);
        assert_eq!(align_up(257, 256), 512);
    }
}
