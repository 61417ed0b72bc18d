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

//! Typed wrappers over opaque GPU allocations.
//!
//! Each wrapper owns its backend resource and the descriptor slots that view it.
//! Current access states are not stored on the wrappers: they live in a single
//! [`ResourceStateTable`] that render passes update through [`StateTransaction`]s.

mod color_buffer;
mod depth_buffer;
mod gpu_buffer;
mod heap;
mod state_table;
mod texture;
mod upload_buffer;

pub use self::color_buffer::{ColorBuffer, ColorBufferDescriptor};
pub use self::depth_buffer::{DepthBuffer, DepthView};
pub use self::gpu_buffer::{GpuBuffer, GpuBufferDescriptor, GpuBufferKind};
pub use self::heap::GpuHeap;
pub use self::state_table::{ResourceStateTable, StateTransaction};
pub use self::texture::Texture;
pub use self::upload_buffer::UploadBuffer;

use crate::renderer::api::{
    BufferId, ResourceKey, ResourceState, TextureCopyRegion, TextureFormat, TextureId,
};
use crate::renderer::error::RenderError;

/// Common surface of every GPU resource wrapper.
pub trait GpuResource {
    /// Identity used by the resource-state table.
    fn key(&self) -> ResourceKey;

    /// The state the resource is in right after creation.
    fn initial_state(&self) -> ResourceState;

    /// Debug label.
    fn label(&self) -> &str;
}

/// Copies CPU data into GPU-only resources and blocks until the copy retired.
///
/// Implemented by the renderer context on top of the copy queue; resource
/// constructors taking initial data go through it.
pub trait ResourceUploader {
    /// Writes `data` into `dst` at `dst_offset`.
    fn upload_to_buffer(&self, dst: BufferId, dst_offset: u64, data: &[u8]) -> Result<(), RenderError>;

    /// Writes tightly packed texel rows into one subresource of `dst`.
    fn upload_to_texture(
        &self,
        dst: TextureId,
        format: TextureFormat,
        region: TextureCopyRegion,
        data: &[u8],
    ) -> Result<(), RenderError>;
}
