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

use crate::renderer::api::{TextureFormat, TextureId};
use crate::renderer::error::RenderError;
use std::fmt::Debug;

/// A chain of presentable back buffers.
pub trait SwapChain: Send + Debug {
    /// Number of back buffers.
    fn buffer_count(&self) -> u32;

    /// Back-buffer format.
    fn format(&self) -> TextureFormat;

    /// Back-buffer size in pixels.
    fn size(&self) -> (u32, u32);

    /// The texture backing back buffer `index`.
    fn back_buffer(&self, index: u32) -> TextureId;

    /// Index of the back buffer the current frame renders into.
    fn current_back_buffer_index(&self) -> u32;

    /// Acquires the next back buffer and returns its index.
    fn acquire_next(&mut self) -> Result<u32, RenderError>;

    /// Presents the current back buffer and advances the chain.
    fn present(&mut self) -> Result<(), RenderError>;

    /// Recreates the back buffers at a new size. Back-buffer texture ids are kept.
    fn resize(&mut self, width: u32, height: u32) -> Result<(), RenderError>;
}
