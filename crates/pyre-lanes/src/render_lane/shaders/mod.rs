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

//! Built-in shader sources of the Pyre render passes.
//!
//! Every WGSL source is prefixed with `common.wgsl`, which declares the frame,
//! object, light and cluster layouts mirrored from `pyre_core::renderer`.
//!
//! Bind group numbering follows the root-signature mapping: each non-constant
//! root parameter takes the next group in slot order, root constants become
//! push constants and static samplers share the trailing group.

/// Depth-only geometry: camera prepass (`vs_depth`) and shadow map (`vs_shadow`).
pub const DEPTH_ONLY_WGSL: &str = concat!(include_str!("common.wgsl"), include_str!("depth_only.wgsl"));

/// Cube-mapped sky drawn behind all geometry.
pub const SKYBOX_WGSL: &str = concat!(include_str!("common.wgsl"), include_str!("skybox.wgsl"));

/// Per-cluster light culling compute shader.
pub const LIGHT_CULL_WGSL: &str = concat!(include_str!("common.wgsl"), include_str!("light_cull.wgsl"));

/// Clustered forward shading with a directional shadow and normal mapping.
pub const LIT_FORWARD_WGSL: &str = concat!(include_str!("common.wgsl"), include_str!("lit_forward.wgsl"));

/// Full-screen bloom chain and tone mapping.
pub const POST_PROCESS_WGSL: &str = concat!(include_str!("common.wgsl"), include_str!("post_process.wgsl"));

/// Path of the task/mesh shader source, compiled by backends with mesh-shader support.
pub const MESHLET_SHADER_PATH: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/src/render_lane/shaders/meshlet.hlsl");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sources_share_common_declarations() {
        for source in [DEPTH_ONLY_WGSL, SKYBOX_WGSL, LIGHT_CULL_WGSL, LIT_FORWARD_WGSL, POST_PROCESS_WGSL] {
            assert!(source.contains("struct FrameData"));
        }
    }

    #[test]
    fn test_entry_points_present() {
        assert!(DEPTH_ONLY_WGSL.contains("fn vs_depth"));
        assert!(DEPTH_ONLY_WGSL.contains("fn vs_shadow"));
        assert!(LIGHT_CULL_WGSL.contains("fn cs_main"));
        for entry in ["fs_bloom_extract", "fs_blur_horizontal", "fs_blur_vertical", "fs_combine", "fs_tone_map"] {
            assert!(POST_PROCESS_WGSL.contains(entry), "missing {entry}");
        }
        assert!(MESHLET_SHADER_PATH.ends_with("meshlet.hlsl"));
    }
}
