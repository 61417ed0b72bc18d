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

//! Backend-agnostic rendering API.
//!
//! - **[`ids`]**: Opaque handles to backend objects.
//! - **[`format`]** and **[`flags`]**: Pixel formats and usage/visibility flag sets.
//! - **[`resource`]**: Buffer, heap and texture descriptors.
//! - **[`descriptor`]**: Descriptor handles and view descriptions.
//! - **[`root_signature`]** and **[`pipeline`]**: Binding contracts and pipeline state.
//! - **[`state`]**: Resource states and transition barriers.
//! - **[`command_list`]**: Recorded GPU commands.
//! - **[`vertex`]**: The vertex layout shared by every geometry pass.
//! - **[`capabilities`]**: Adapter and device capability records.

pub mod capabilities;
pub mod command_list;
pub mod descriptor;
pub mod flags;
pub mod format;
pub mod ids;
pub mod pipeline;
pub mod resource;
pub mod root_signature;
pub mod state;
pub mod vertex;

pub use self::capabilities::*;
pub use self::command_list::*;
pub use self::descriptor::*;
pub use self::flags::*;
pub use self::format::*;
pub use self::ids::*;
pub use self::pipeline::*;
pub use self::resource::*;
pub use self::root_signature::*;
pub use self::state::*;
pub use self::vertex::*;
