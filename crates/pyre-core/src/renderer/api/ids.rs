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

//! Opaque handles to objects owned by the graphics backend.
//!
//! The backend hands these out and resolves them internally; they carry no
//! lifetime and are cheap to copy.

/// An opaque handle to a GPU buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(pub usize);

/// An opaque handle to a GPU texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub usize);

/// An opaque handle to a memory heap that placed buffers are sub-allocated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HeapId(pub usize);

/// An opaque handle to a descriptor heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DescriptorHeapId(pub usize);

/// An opaque handle to a compiled shader module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderModuleId(pub usize);

/// An opaque handle to a root signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RootSignatureId(pub usize);

/// An opaque handle to a graphics, compute or mesh pipeline state object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PipelineStateId(pub usize);

/// An opaque handle to a command allocator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommandAllocatorId(pub usize);

/// An opaque handle to a fence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FenceId(pub usize);
