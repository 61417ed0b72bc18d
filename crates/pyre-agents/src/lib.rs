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

//! # Pyre Agents
//!
//! Orchestration on top of the render lanes: the [`RendererContext`] owning the
//! shared GPU state, the two frame orchestrators and the background scene loader.
//!
//! A frame is a fixed graph of stages (depth, sky, color, GUI, present) recorded
//! into one direct command list, with light culling submitted separately on the
//! compute queue. Geometry and textures reach the GPU through blocking copy-queue
//! uploads, so whatever the loader hands to the scene is already resident.

#![warn(missing_docs)]

pub mod asset_agent;
pub mod render_agent;

pub use asset_agent::{EntityDescription, LoadEvent, SceneDescription, SceneLoader, SceneSource};
pub use render_agent::{
    ClusterForwardRenderer, FrameGraph, FrameStage, FrameStats, FrameView, GuiHook,
    MeshShaderRenderer, RendererContext,
};
