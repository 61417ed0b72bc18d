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

//! Resource states and the transition barriers that move resources between them.

use super::ids::{BufferId, TextureId};

/// The access state a GPU resource is currently in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceState {
    /// No particular access; the state of freshly created buffers.
    Common,
    /// Read as vertex or constant buffer.
    VertexAndConstantBuffer,
    /// Read as index buffer.
    IndexBuffer,
    /// Written as a render target.
    RenderTarget,
    /// Read and written through unordered access views.
    UnorderedAccess,
    /// Written as a depth-stencil target.
    DepthWrite,
    /// Read-only depth-stencil binding.
    DepthRead,
    /// Read by pixel shaders.
    PixelShaderResource,
    /// Read by non-pixel shader stages.
    NonPixelShaderResource,
    /// Read by every shader stage.
    AllShaderResource,
    /// Destination of a copy.
    CopyDest,
    /// Source of a copy.
    CopySource,
    /// Destination of an MSAA resolve.
    ResolveDest,
    /// Source of an MSAA resolve.
    ResolveSource,
    /// Ready for presentation.
    Present,
    /// CPU-writable upload memory; resources in upload heaps never leave this state.
    GenericRead,
}

impl ResourceState {
    /// Returns `true` for states in which the GPU may write the resource.
    pub const fn is_write(self) -> bool {
        matches!(
            self,
            Self::RenderTarget
                | Self::UnorderedAccess
                | Self::DepthWrite
                | Self::CopyDest
                | Self::ResolveDest
        )
    }
}

/// Identity of a tracked resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKey {
    /// A linear buffer.
    Buffer(BufferId),
    /// A texture or pixel buffer.
    Texture(TextureId),
}

impl From<BufferId> for ResourceKey {
    fn from(id: BufferId) -> Self {
        ResourceKey::Buffer(id)
    }
}

impl From<TextureId> for ResourceKey {
    fn from(id: TextureId) -> Self {
        ResourceKey::Texture(id)
    }
}

/// A single state transition recorded into a command list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceBarrier {
    /// The transitioned resource.
    pub resource: ResourceKey,
    /// State before the barrier.
    pub before: ResourceState,
    /// State after the barrier.
    pub after: ResourceState,
}
