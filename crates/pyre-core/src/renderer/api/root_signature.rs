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

//! Root signatures: the declared contract of which resources a pipeline reads.
//!
//! A root signature is an ordered list of root parameters. Backends without a
//! native root-signature concept map it onto their binding model with the helpers
//! on [`RootSignatureDescriptor`]:
//!
//! - `Constants` parameters become push constants, packed in slot order.
//! - Every other parameter becomes one bind group, numbered in slot order with
//!   the constants skipped.
//! - Static samplers share one extra bind group placed after the last parameter group.

use super::flags::ShaderVisibility;
use super::format::TextureFormat;
use super::pipeline::CompareFunction;
use std::borrow::Cow;

/// The resource shape expected at one binding of a descriptor table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingShape {
    /// A constant buffer.
    ConstantBuffer,
    /// A structured or raw buffer read by shaders.
    ReadOnlyBuffer,
    /// A structured or raw buffer written by shaders.
    ReadWriteBuffer,
    /// A filterable float texture.
    Texture {
        /// Whether the view is a cube.
        cube: bool,
    },
    /// A multisampled float texture.
    MultisampledTexture,
    /// A depth texture sampled with a comparison sampler.
    DepthTexture,
    /// A texture written through an unordered access view.
    StorageTexture {
        /// Storage format of the texture.
        format: TextureFormat,
    },
}

/// A run of consecutive descriptors inside a descriptor table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DescriptorRange {
    /// Shape of every descriptor in the run.
    pub shape: BindingShape,
    /// Number of descriptors.
    pub count: u32,
}

impl DescriptorRange {
    /// Creates a range of `count` descriptors of the same shape.
    pub const fn new(shape: BindingShape, count: u32) -> Self {
        Self { shape, count }
    }
}

/// One slot of a root signature.
#[derive(Debug, Clone, PartialEq)]
pub enum RootParameter {
    /// A constant buffer bound directly by address.
    ConstantBuffer {
        /// Stages that read the parameter.
        visibility: ShaderVisibility,
    },
    /// A read-only structured buffer bound directly by address.
    ShaderResource {
        /// Stages that read the parameter.
        visibility: ShaderVisibility,
    },
    /// A table of descriptors starting at a GPU descriptor handle.
    DescriptorTable {
        /// Stages that read the parameter.
        visibility: ShaderVisibility,
        /// Descriptor runs, in binding order.
        ranges: Vec<DescriptorRange>,
    },
    /// Inline 32-bit constants.
    Constants {
        /// Stages that read the parameter.
        visibility: ShaderVisibility,
        /// Number of 32-bit values.
        num_values: u32,
    },
}

impl RootParameter {
    /// Stages that read the parameter.
    pub fn visibility(&self) -> ShaderVisibility {
        match self {
            RootParameter::ConstantBuffer { visibility }
            | RootParameter::ShaderResource { visibility }
            | RootParameter::DescriptorTable { visibility, .. }
            | RootParameter::Constants { visibility, .. } => *visibility,
        }
    }

    /// Number of descriptors the parameter covers when it is a table.
    pub fn table_size(&self) -> u32 {
        match self {
            RootParameter::DescriptorTable { ranges, .. } => ranges.iter().map(|r| r.count).sum(),
            _ => 0,
        }
    }
}

/// Texel filtering of a static sampler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterMode {
    /// Nearest texel.
    Point,
    /// Linear interpolation.
    Linear,
}

/// Behavior of texture coordinates outside [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressMode {
    /// Repeat the texture.
    Wrap,
    /// Clamp to the edge texel.
    Clamp,
}

/// A sampler baked into the root signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StaticSampler {
    /// Texel filtering.
    pub filter: FilterMode,
    /// Addressing on every axis.
    pub address: AddressMode,
    /// Comparison function, for shadow sampling.
    pub comparison: Option<CompareFunction>,
}

impl StaticSampler {
    /// Trilinear wrapping sampler.
    pub const LINEAR_WRAP: Self = Self {
        filter: FilterMode::Linear,
        address: AddressMode::Wrap,
        comparison: None,
    };
    /// Bilinear clamping sampler.
    pub const LINEAR_CLAMP: Self = Self {
        filter: FilterMode::Linear,
        address: AddressMode::Clamp,
        comparison: None,
    };
    /// Depth comparison sampler for shadow maps.
    pub const SHADOW: Self = Self {
        filter: FilterMode::Linear,
        address: AddressMode::Clamp,
        comparison: Some(CompareFunction::LessEqual),
    };
}

/// Describes a root signature to be created.
#[derive(Debug, Clone, PartialEq)]
pub struct RootSignatureDescriptor<'a> {
    /// Optional debug label.
    pub label: Option<Cow<'a, str>>,
    /// Root parameters, indexed by slot.
    pub parameters: Vec<RootParameter>,
    /// Samplers baked into the signature.
    pub static_samplers: Vec<StaticSampler>,
}

impl RootSignatureDescriptor<'_> {
    /// The bind group a non-constant slot maps to, or `None` for constant slots
    /// and out-of-range slots.
    pub fn bind_group_index(&self, slot: u32) -> Option<u32> {
        let slot = slot as usize;
        match self.parameters.get(slot)? {
            RootParameter::Constants { .. } => None,
            _ => Some(
                self.parameters[..slot]
                    .iter()
                    .filter(|p| !matches!(p, RootParameter::Constants { .. }))
                    .count() as u32,
            ),
        }
    }

    /// Number of bind groups used by non-constant parameters.
    pub fn parameter_group_count(&self) -> u32 {
        self.parameters
            .iter()
            .filter(|p| !matches!(p, RootParameter::Constants { .. }))
            .count() as u32
    }

    /// The bind group holding the static samplers, if any.
    pub fn sampler_group_index(&self) -> Option<u32> {
        (!self.static_samplers.is_empty()).then(|| self.parameter_group_count())
    }

    /// Byte range of the push constants backing a `Constants` slot.
    pub fn push_constant_range(&self, slot: u32) -> Option<std::ops::Range<u32>> {
        let slot = slot as usize;
        let RootParameter::Constants { num_values, .. } = self.parameters.get(slot)? else {
            return None;
        };
        let start: u32 = self.parameters[..slot]
            .iter()
            .map(|p| match p {
                RootParameter::Constants { num_values, .. } => num_values * 4,
                _ => 0,
            })
            .sum();
        Some(start..start + num_values * 4)
    }

    /// Total size in bytes of every `Constants` slot.
    pub fn push_constant_size(&self) -> u32 {
        self.parameters
            .iter()
            .map(|p| match p {
                RootParameter::Constants { num_values, .. } => num_values * 4,
                _ => 0,
            })
            .sum()
    }

    /// Union of the visibilities of every `Constants` slot.
    pub fn push_constant_visibility(&self) -> ShaderVisibility {
        self.parameters
            .iter()
            .filter(|p| matches!(p, RootParameter::Constants { .. }))
            .fold(ShaderVisibility::NONE, |acc, p| acc | p.visibility())
    }

    /// Union of every parameter's visibility.
    pub fn visibility(&self) -> ShaderVisibility {
        self.parameters
            .iter()
            .fold(ShaderVisibility::NONE, |acc, p| acc | p.visibility())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn color_pass_layout() -> RootSignatureDescriptor<'static> {
        RootSignatureDescriptor {
            label: None,
            parameters: vec![
                RootParameter::ConstantBuffer {
                    visibility: ShaderVisibility::ALL_GRAPHICS,
                },
                RootParameter::DescriptorTable {
                    visibility: ShaderVisibility::PIXEL,
                    ranges: vec![
                        DescriptorRange::new(BindingShape::ReadOnlyBuffer, 1),
                        DescriptorRange::new(BindingShape::ReadWriteBuffer, 1),
                    ],
                },
                RootParameter::Constants {
                    visibility: ShaderVisibility::ALL_GRAPHICS,
                    num_values: 20,
                },
                RootParameter::DescriptorTable {
                    visibility: ShaderVisibility::PIXEL,
                    ranges: vec![DescriptorRange::new(BindingShape::Texture { cube: false }, 2)],
                },
            ],
            static_samplers: vec![StaticSampler::LINEAR_WRAP, StaticSampler::SHADOW],
        }
    }

    #[test]
    fn constants_slots_are_skipped_when_numbering_groups() {
        let layout = color_pass_layout();
        assert_eq!(layout.bind_group_index(0), Some(0));
        assert_eq!(layout.bind_group_index(1), Some(1));
        assert_eq!(layout.bind_group_index(2), None);
        assert_eq!(layout.bind_group_index(3), Some(2));
        assert_eq!(layout.bind_group_index(9), None);
        assert_eq!(layout.sampler_group_index(), Some(3));
    }

    #[test]
    fn push_constant_ranges_are_packed() {
        let layout = color_pass_layout();
        assert_eq!(layout.push_constant_range(2), Some(0..80));
        assert_eq!(layout.push_constant_range(0), None);
        assert_eq!(layout.push_constant_size(), 80);
    }

    #[test]
    fn table_size_sums_ranges() {
        let layout = color_pass_layout();
        assert_eq!(layout.parameters[1].table_size(), 2);
        assert_eq!(layout.parameters[0].table_size(), 0);
    }
}
