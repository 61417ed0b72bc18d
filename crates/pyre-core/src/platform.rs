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

//! Window handle abstraction consumed by swap-chain creation.

use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use std::sync::Arc;

/// Combines the windowing handle traits required by graphics backends.
pub trait WindowHandle: HasWindowHandle + HasDisplayHandle {}

impl<T: HasWindowHandle + HasDisplayHandle> WindowHandle for T {}

/// A shared, thread-safe window handle.
pub type PyreWindowHandle = Arc<dyn WindowHandle + Send + Sync>;

/// A window the renderer can present into.
pub trait PyreWindow: HasWindowHandle + HasDisplayHandle + Send + Sync {
    /// Returns the physical dimensions (width, height) of the window's inner area.
    fn inner_size(&self) -> (u32, u32);

    /// Requests that the window be redrawn.
    fn request_redraw(&self);

    /// Clones a shared handle to the window, used to create the presentation surface.
    fn clone_handle_arc(&self) -> PyreWindowHandle;
}
