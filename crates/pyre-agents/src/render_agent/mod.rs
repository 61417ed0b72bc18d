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

//! Frame orchestration: the shared renderer context, the frame graph and the two
//! renderers built on it.

mod cluster_forward;
mod context;
mod driver;
mod frame;
mod frame_graph;
mod mega_buffer;
mod mesh_shader;
mod targets;
mod uploader;

pub use cluster_forward::ClusterForwardRenderer;
pub use context::RendererContext;
pub use frame::{FrameStats, FrameView, GuiHook};
pub use frame_graph::{FrameGraph, FrameStage};
pub use mega_buffer::{MegaBuffers, VertexBufferRenderer};
pub use mesh_shader::MeshShaderRenderer;
pub use targets::{RenderTargets, DEPTH_FORMAT};
pub use uploader::SyncUploader;
