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

//! Backend-agnostic rendering contracts and GPU bookkeeping.
//!
//! This module defines the "common language" of the renderer: the opaque ids and
//! descriptors in [`api`], the [`GraphicsDevice`] and [`SwapChain`] traits a backend
//! implements, and the bookkeeping structures that sit directly on top of them
//! (descriptor heaps, command allocator pools, queues, resource wrappers).
//!
//! The concrete backend lives in `pyre-infra`; passes in `pyre-lanes` and the frame
//! orchestration in `pyre-agents` only ever talk to these traits.

pub mod adapter;
pub mod api;
pub mod command;
pub mod descriptor_heap;
pub mod error;
pub mod frame;
pub mod light;
pub mod meshlet;
pub mod resource;
pub mod traits;

pub use self::adapter::select_adapter;
pub use self::api::*;
pub use self::command::{CommandAllocatorPool, CommandQueue, CommandQueueManager};
pub use self::descriptor_heap::{DescriptorHeap, DescriptorHeaps};
pub use self::error::{PipelineError, RenderError, ResourceError, ShaderError};
pub use self::frame::{FrameData, FrameRing, ObjectData, SunLight};
pub use self::light::{Cluster, ClusterGrid, Light, LightSet};
pub use self::resource::{
    ColorBuffer, ColorBufferDescriptor, DepthBuffer, DepthView, GpuBuffer, GpuBufferDescriptor,
    GpuBufferKind, GpuHeap, GpuResource, ResourceStateTable, ResourceUploader, StateTransaction,
    Texture, UploadBuffer,
};
pub use self::traits::{GraphicsDevice, SwapChain};
