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

//! Desktop windows backed by `winit`.

use pyre_core::platform::{PyreWindow, PyreWindowHandle};
use raw_window_handle::{
    DisplayHandle, HandleError, HasDisplayHandle, HasWindowHandle, WindowHandle,
};
use std::sync::Arc;
use winit::{
    dpi::LogicalSize,
    error::OsError,
    event_loop::ActiveEventLoop,
    window::{Window, WindowAttributes, WindowId},
};

/// The window the sandbox presents into.
///
/// Cloning shares the same OS window; the surface keeps its own handle through
/// [`PyreWindow::clone_handle_arc`].
#[derive(Debug, Clone)]
pub struct WinitWindow {
    inner: Arc<Window>,
}

/// Collects window attributes until the event loop is running.
#[derive(Debug, Clone)]
pub struct WinitWindowBuilder {
    attributes: WindowAttributes,
}

impl WinitWindowBuilder {
    /// A 1280x720 window titled "Pyre".
    pub fn new() -> Self {
        Self {
            attributes: Window::default_attributes()
                .with_title("Pyre")
                .with_inner_size(LogicalSize::new(1280, 720)),
        }
    }

    /// Replaces the title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.attributes = self.attributes.with_title(title);
        self
    }

    /// Inner size in logical pixels.
    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.attributes = self.attributes.with_inner_size(LogicalSize::new(width, height));
        self
    }

    /// Opens the window. Only valid once `resumed` has been delivered.
    pub fn build(self, event_loop: &ActiveEventLoop) -> Result<WinitWindow, OsError> {
        let title = self.attributes.title.clone();
        let window = event_loop.create_window(self.attributes)?;
        let size = window.inner_size();
        log::info!("Opened window '{title}' ({}x{} physical)", size.width, size.height);
        Ok(WinitWindow {
            inner: Arc::new(window),
        })
    }
}

impl Default for WinitWindowBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl WinitWindow {
    /// Matches incoming `WindowEvent`s against this window.
    pub fn id(&self) -> WindowId {
        self.inner.id()
    }
}

impl HasWindowHandle for WinitWindow {
    fn window_handle(&self) -> Result<WindowHandle<'_>, HandleError> {
        self.inner.window_handle()
    }
}

impl HasDisplayHandle for WinitWindow {
    fn display_handle(&self) -> Result<DisplayHandle<'_>, HandleError> {
        self.inner.display_handle()
    }
}

impl PyreWindow for WinitWindow {
    fn inner_size(&self) -> (u32, u32) {
        let physical = self.inner.inner_size();
        (physical.width, physical.height)
    }

    fn request_redraw(&self) {
        self.inner.request_redraw();
    }

    fn clone_handle_arc(&self) -> PyreWindowHandle {
        Arc::clone(&self.inner) as PyreWindowHandle
    }
}
