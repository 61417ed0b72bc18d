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

//! Shader modules and pipeline state descriptors.

use super::format::TextureFormat;
use super::ids::{RootSignatureId, ShaderModuleId};
use std::borrow::Cow;
use std::path::PathBuf;

/// Where the code of a shader module comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum ShaderSource<'a> {
    /// WGSL source text.
    Wgsl(Cow<'a, str>),
    /// A file the backend loads itself (source or precompiled bytecode).
    File(PathBuf),
}

/// Describes a shader module to be created.
#[derive(Debug, Clone)]
pub struct ShaderModuleDescriptor<'a> {
    /// Optional debug label.
    pub label: Option<Cow<'a, str>>,
    /// The shader code.
    pub source: ShaderSource<'a>,
}

/// A shader module together with the entry point a pipeline stage uses.
#[derive(Debug, Clone, PartialEq)]
pub struct ShaderStageDescriptor<'a> {
    /// The module containing the entry point.
    pub module: ShaderModuleId,
    /// Name of the entry point.
    pub entry_point: Cow<'a, str>,
}

/// Comparison used by depth tests and comparison samplers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareFunction {
    /// Never passes.
    Never,
    /// Passes if the new value is less than the stored one.
    Less,
    /// Passes if the new value is less than or equal to the stored one.
    LessEqual,
    /// Passes if the values are equal.
    Equal,
    /// Passes if the new value is greater than the stored one.
    Greater,
    /// Passes if the new value is greater than or equal to the stored one.
    GreaterEqual,
    /// Passes if the values differ.
    NotEqual,
    /// Always passes.
    Always,
}

/// Depth-stencil state of a graphics pipeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthStencilState {
    /// Format of the bound depth target.
    pub format: TextureFormat,
    /// Whether passing fragments write depth.
    pub depth_write: bool,
    /// Depth comparison.
    pub depth_compare: CompareFunction,
    /// Constant depth bias, used by shadow rendering.
    pub depth_bias: i32,
    /// Slope-scaled depth bias.
    pub slope_scaled_depth_bias: f32,
}

impl DepthStencilState {
    /// Standard depth testing with writes.
    pub const fn read_write(format: TextureFormat) -> Self {
        Self {
            format,
            depth_write: true,
            depth_compare: CompareFunction::LessEqual,
            depth_bias: 0,
            slope_scaled_depth_bias: 0.0,
        }
    }
}

/// Face culling mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CullMode {
    /// No culling.
    None,
    /// Cull front faces.
    Front,
    /// Cull back faces.
    Back,
}

/// Primitive assembly topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveTopology {
    /// Independent triangles.
    TriangleList,
    /// Triangle strip.
    TriangleStrip,
    /// Independent lines.
    LineList,
}

/// Format of one vertex attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexFormat {
    /// Two 32-bit floats.
    Float32x2,
    /// Three 32-bit floats.
    Float32x3,
    /// Four 32-bit floats.
    Float32x4,
}

impl VertexFormat {
    /// Size of the attribute in bytes.
    pub const fn size(self) -> u32 {
        match self {
            Self::Float32x2 => 8,
            Self::Float32x3 => 12,
            Self::Float32x4 => 16,
        }
    }
}

/// One element of an input layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InputElement {
    /// Semantic name, used for diagnostics.
    pub semantic: &'static str,
    /// Shader input location.
    pub location: u32,
    /// Attribute format.
    pub format: VertexFormat,
    /// Byte offset from the start of the vertex.
    pub offset: u32,
}

/// Vertex input layout of a graphics pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InputLayout {
    /// Bytes between consecutive vertices.
    pub stride: u32,
    /// Attributes read from each vertex.
    pub elements: Vec<InputElement>,
}

/// Color blending of a render target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendMode {
    /// Overwrite.
    Opaque,
    /// Add source to destination.
    Additive,
    /// Standard alpha blending.
    Alpha,
}

/// One color target of a graphics pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ColorTargetState {
    /// Target format.
    pub format: TextureFormat,
    /// Blending.
    pub blend: BlendMode,
}

/// Describes a traditional vertex/pixel pipeline.
#[derive(Debug, Clone)]
pub struct GraphicsPipelineDescriptor<'a> {
    /// Optional debug label.
    pub label: Option<Cow<'a, str>>,
    /// Root signature the pipeline is compiled against.
    pub root_signature: RootSignatureId,
    /// Vertex stage.
    pub vertex: ShaderStageDescriptor<'a>,
    /// Pixel stage; depth-only pipelines have none.
    pub pixel: Option<ShaderStageDescriptor<'a>>,
    /// Vertex input layout; `None` for pipelines generating vertices in the shader.
    pub input_layout: Option<InputLayout>,
    /// Primitive topology.
    pub topology: PrimitiveTopology,
    /// Face culling.
    pub cull_mode: CullMode,
    /// Color targets, in binding order.
    pub color_targets: Vec<ColorTargetState>,
    /// Depth-stencil state.
    pub depth_stencil: Option<DepthStencilState>,
    /// Samples per pixel of every target.
    pub sample_count: u32,
}

/// Describes a compute pipeline.
#[derive(Debug, Clone)]
pub struct ComputePipelineDescriptor<'a> {
    /// Optional debug label.
    pub label: Option<Cow<'a, str>>,
    /// Root signature the pipeline is compiled against.
    pub root_signature: RootSignatureId,
    /// Compute stage.
    pub compute: ShaderStageDescriptor<'a>,
}

/// Describes a task/mesh/pixel pipeline.
#[derive(Debug, Clone)]
pub struct MeshPipelineDescriptor<'a> {
    /// Optional debug label.
    pub label: Option<Cow<'a, str>>,
    /// Root signature the pipeline is compiled against.
    pub root_signature: RootSignatureId,
    /// Optional amplification stage.
    pub task: Option<ShaderStageDescriptor<'a>>,
    /// Mesh stage.
    pub mesh: ShaderStageDescriptor<'a>,
    /// Pixel stage.
    pub pixel: ShaderStageDescriptor<'a>,
    /// Face culling.
    pub cull_mode: CullMode,
    /// Color targets, in binding order.
    pub color_targets: Vec<ColorTargetState>,
    /// Depth-stencil state.
    pub depth_stencil: Option<DepthStencilState>,
    /// Samples per pixel of every target.
    pub sample_count: u32,
}
