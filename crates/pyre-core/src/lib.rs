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

//! # Pyre Core
//!
//! Foundational crate containing the rendering contracts, GPU resource bookkeeping
//! (descriptor heaps, command allocator pools, queues, resource wrappers) and the
//! backend-agnostic command recording used by every other Pyre crate.

#![warn(missing_docs)]

pub mod config;
pub mod graph;
pub mod math;
pub mod platform;
pub mod renderer;
pub mod scene;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use config::{ConfigError, RendererConfig};
