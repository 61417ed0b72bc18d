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

//! # Pyre Lanes
//!
//! The hot path of the renderer: every render pass with its root signature and
//! pipeline state, the WGSL sources they are built from, the extraction of draw
//! items from the scene and the material table that resolves textures per
//! sub-mesh.
//!
//! Passes only talk to `pyre-core` contracts; they record into a
//! [`CommandList`](pyre_core::renderer::CommandList) and never touch a backend.

#![warn(missing_docs)]

pub mod render_lane;

pub use render_lane::*;
