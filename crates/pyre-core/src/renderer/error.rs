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

//! Defines the hierarchy of error types for the rendering subsystem.
//!
//! Conditions the renderer cannot recover from (heap exhaustion, upload overflow,
//! adapter or swap-chain failures) are reported through these types and bubble up
//! to the application, which logs them and exits.

use crate::renderer::api::{DescriptorHeapKind, ResourceKey, RootSignatureId, ShaderModuleId};
use std::fmt;

/// An error related to the loading or compilation of a shader module.
#[derive(Debug)]
pub enum ShaderError {
    /// An error occurred while trying to load the shader from a path.
    LoadError {
        /// The path of the file that failed to load.
        path: String,
        /// The underlying I/O or source error.
        source_error: String,
    },
    /// The shader source failed to compile into a backend-specific module.
    CompilationError {
        /// A descriptive label for the shader, if available.
        label: String,
        /// Detailed error messages from the shader compiler.
        details: String,
    },
    /// The requested shader module could not be found.
    NotFound {
        /// The ID of the shader module that was not found.
        id: ShaderModuleId,
    },
}

impl fmt::Display for ShaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderError::LoadError { path, source_error } => {
                write!(
                    f,
                    "Failed to load shader source from '{path}': {source_error}"
                )
            }
            ShaderError::CompilationError { label, details } => {
                write!(f, "Shader compilation failed for '{label}': {details}")
            }
            ShaderError::NotFound { id } => {
                write!(f, "Shader module not found for ID: {id:?}")
            }
        }
    }
}

impl std::error::Error for ShaderError {}

/// An error related to root signatures and pipeline state objects.
#[derive(Debug)]
pub enum PipelineError {
    /// The root signature could not be translated into a backend layout.
    LayoutCreationFailed(String),
    /// The backend failed to build the pipeline state object.
    CompilationFailed {
        /// A descriptive label for the pipeline, if available.
        label: Option<String>,
        /// Detailed error messages from the backend.
        details: String,
    },
    /// The root signature referenced by a pipeline or command does not exist.
    InvalidRootSignature {
        /// The ID of the missing root signature.
        id: RootSignatureId,
    },
    /// The color target format is not compatible with the pipeline or device.
    IncompatibleColorTarget(String),
    /// A required graphics feature is not supported by the device.
    FeatureNotSupported(String),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::LayoutCreationFailed(msg) => {
                write!(f, "Root signature translation failed: {msg}")
            }
            PipelineError::CompilationFailed { label, details } => {
                write!(
                    f,
                    "Pipeline compilation failed for '{}': {}",
                    label.as_deref().unwrap_or("Unknown"),
                    details
                )
            }
            PipelineError::InvalidRootSignature { id } => {
                write!(f, "Invalid root signature ID: {id:?}")
            }
            PipelineError::IncompatibleColorTarget(msg) => {
                write!(f, "Incompatible color target format: {msg}")
            }
            PipelineError::FeatureNotSupported(msg) => {
                write!(f, "Feature not supported: {msg}")
            }
        }
    }
}

impl std::error::Error for PipelineError {}

/// An error related to the creation or use of a GPU resource.
#[derive(Debug)]
pub enum ResourceError {
    /// A shader-specific error occurred.
    Shader(ShaderError),
    /// A pipeline-specific error occurred.
    Pipeline(PipelineError),
    /// A generic resource could not be found.
    NotFound,
    /// The handle or ID used to reference a resource is invalid.
    InvalidHandle,
    /// An error originating from the specific graphics backend implementation.
    BackendError(String),
    /// An attempt was made to access a resource out of its bounds.
    OutOfBounds,
    /// A descriptor heap ran out of slots.
    DescriptorHeapExhausted {
        /// Kind of the exhausted heap.
        kind: DescriptorHeapKind,
        /// Fixed capacity of the heap.
        capacity: u32,
        /// Slots already handed out.
        allocated: u32,
        /// Slots requested by the failing call.
        requested: u32,
    },
    /// An append into an upload buffer would run past its end.
    UploadOverflow {
        /// Capacity of the upload buffer in bytes.
        capacity: u64,
        /// Current write offset.
        offset: u64,
        /// Size of the rejected write.
        requested: u64,
    },
    /// A placed resource would overlap another placement or run past its heap.
    RegionOverlap {
        /// Requested byte offset inside the heap.
        offset: u64,
        /// Requested size in bytes.
        size: u64,
    },
    /// A placed resource offset does not respect the placement alignment.
    MisalignedPlacement {
        /// Requested byte offset inside the heap.
        offset: u64,
        /// Required alignment in bytes.
        alignment: u64,
    },
    /// A command was recorded into a list that is not open for recording.
    CommandListClosed,
    /// A size-dependent resource was requested before the output size is known.
    ContextNotReady(String),
    /// The same resource was given two target states in one state transaction.
    DuplicateTransition(ResourceKey),
    /// A transition was requested for a resource the state table does not track.
    UntrackedResource(ResourceKey),
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceError::Shader(err) => write!(f, "Shader resource error: {err}"),
            ResourceError::Pipeline(err) => write!(f, "Pipeline resource error: {err}"),
            ResourceError::NotFound => write!(f, "Resource not found with ID."),
            ResourceError::InvalidHandle => write!(f, "Invalid resource handle or ID."),
            ResourceError::BackendError(msg) => {
                write!(f, "Backend-specific resource error: {msg}")
            }
            ResourceError::OutOfBounds => {
                write!(f, "Resource access out of bounds.")
            }
            ResourceError::DescriptorHeapExhausted {
                kind,
                capacity,
                allocated,
                requested,
            } => write!(
                f,
                "{kind:?} descriptor heap exhausted: {allocated}/{capacity} slots used, {requested} requested"
            ),
            ResourceError::UploadOverflow {
                capacity,
                offset,
                requested,
            } => write!(
                f,
                "Upload buffer overflow: {requested} bytes at offset {offset} exceeds capacity {capacity}"
            ),
            ResourceError::RegionOverlap { offset, size } => write!(
                f,
                "Placed resource [{offset}, {}) overlaps an existing placement or the heap end",
                offset + size
            ),
            ResourceError::MisalignedPlacement { offset, alignment } => write!(
                f,
                "Placed resource offset {offset} is not aligned to {alignment} bytes"
            ),
            ResourceError::CommandListClosed => {
                write!(f, "Command list is closed for recording.")
            }
            ResourceError::ContextNotReady(what) => {
                write!(f, "Renderer context not ready: {what}")
            }
            ResourceError::DuplicateTransition(key) => {
                write!(f, "Resource {key:?} transitioned twice in one transaction")
            }
            ResourceError::UntrackedResource(key) => {
                write!(f, "Resource {key:?} is not registered in the state table")
            }
        }
    }
}

impl std::error::Error for ResourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ResourceError::Shader(err) => Some(err),
            ResourceError::Pipeline(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ShaderError> for ResourceError {
    fn from(err: ShaderError) -> Self {
        ResourceError::Shader(err)
    }
}

impl From<PipelineError> for ResourceError {
    fn from(err: PipelineError) -> Self {
        ResourceError::Pipeline(err)
    }
}

/// A high-level error raised by the device, the swap chain or the frame orchestrator.
#[derive(Debug)]
pub enum RenderError {
    /// An operation was attempted before the renderer was initialized.
    NotInitialized,
    /// A failure occurred during the initialization of the graphics backend.
    InitializationFailed(String),
    /// No adapter satisfies the renderer's requirements.
    AdapterSelection(String),
    /// The swap chain was already created on this device manager.
    SwapChainAlreadyCreated,
    /// Failed to acquire the next back buffer from the swap chain.
    SurfaceAcquisitionFailed(String),
    /// A critical, unrecoverable rendering operation failed.
    RenderingFailed(String),
    /// An error occurred while managing a GPU resource.
    ResourceError(ResourceError),
    /// The graphics device was lost.
    DeviceLost,
    /// Waiting on a fence failed.
    FenceWait(String),
    /// An unexpected or internal error occurred.
    Internal(String),
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::NotInitialized => {
                write!(f, "The renderer is not initialized.")
            }
            RenderError::InitializationFailed(msg) => {
                write!(f, "Failed to initialize graphics backend: {msg}")
            }
            RenderError::AdapterSelection(msg) => {
                write!(f, "No suitable graphics adapter: {msg}")
            }
            RenderError::SwapChainAlreadyCreated => {
                write!(f, "The swap chain has already been created.")
            }
            RenderError::SurfaceAcquisitionFailed(msg) => {
                write!(f, "Failed to acquire back buffer: {msg}")
            }
            RenderError::RenderingFailed(msg) => {
                write!(f, "A critical rendering operation failed: {msg}")
            }
            RenderError::ResourceError(err) => {
                write!(f, "Graphics resource operation failed: {err}")
            }
            RenderError::DeviceLost => write!(f, "The graphics device was lost."),
            RenderError::FenceWait(msg) => write!(f, "Fence wait failed: {msg}"),
            RenderError::Internal(msg) => {
                write!(f, "An internal or unexpected error occurred: {msg}")
            }
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RenderError::ResourceError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ResourceError> for RenderError {
    fn from(err: ResourceError) -> Self {
        RenderError::ResourceError(err)
    }
}

impl From<PipelineError> for RenderError {
    fn from(err: PipelineError) -> Self {
        RenderError::ResourceError(err.into())
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use super::*;

    #[test]
    fn shader_error_display() {
        let err = ShaderError::LoadError {
            path: "shaders/skybox.wgsl".to_string(),
            source_error: "File not found".to_string(),
        };
        assert_eq!(
            format!("{err}"),
            "Failed to load shader source from 'shaders/skybox.wgsl': File not found"
        );
    }

    #[test]
    fn heap_exhaustion_display() {
        let err = ResourceError::DescriptorHeapExhausted {
            kind: DescriptorHeapKind::RenderTarget,
            capacity: 4,
            allocated: 4,
            requested: 1,
        };
        assert_eq!(
            err.to_string(),
            "RenderTarget descriptor heap exhausted: 4/4 slots used, 1 requested"
        );
    }

    #[test]
    fn upload_overflow_display() {
        let err = ResourceError::UploadOverflow {
            capacity: 256,
            offset: 200,
            requested: 64,
        };
        assert_eq!(
            err.to_string(),
            "Upload buffer overflow: 64 bytes at offset 200 exceeds capacity 256"
        );
    }

    #[test]
    fn render_error_wraps_resource_error() {
        let shader_err = ShaderError::NotFound {
            id: ShaderModuleId(101),
        };
        let res_err: ResourceError = shader_err.into();
        let render_err: RenderError = res_err.into();
        assert_eq!(
            format!("{render_err}"),
            "Graphics resource operation failed: Shader resource error: Shader module not found for ID: ShaderModuleId(101)"
        );
        assert!(render_err.source().is_some());
        assert!(render_err.source().unwrap().source().is_some());
    }

    #[test]
    fn pipeline_error_converts_into_render_error() {
        let err: RenderError = PipelineError::FeatureNotSupported("mesh shaders".into()).into();
        assert_eq!(
            err.to_string(),
            "Graphics resource operation failed: Pipeline resource error: Feature not supported: mesh shaders"
        );
    }
}
