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

//! Runtime configuration for the renderer.
//!
//! Every size that would otherwise be a compile-time constant (ring depth, light
//! capacity, cluster grid, heap capacities, mega-buffer sizes) lives here and is
//! validated once at startup by [`RendererConfig::validate`].

use crate::renderer::api::TextureFormat;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors produced while loading or validating a [`RendererConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read renderer config '{path}': {source}")]
    Io {
        /// The path that failed to load.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The configuration text is not valid RON for [`RendererConfig`].
    #[error("failed to parse renderer config: {0}")]
    Parse(#[from] ron::error::SpannedError),
    /// A field holds a value outside its accepted range.
    #[error("invalid renderer config field `{field}`: {reason}")]
    Invalid {
        /// The offending field.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}

/// The dimensions of the 3-D light cluster grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterGridConfig {
    /// Number of clusters along the screen X axis.
    pub x: u32,
    /// Number of clusters along the screen Y axis.
    pub y: u32,
    /// Number of depth slices.
    pub z: u32,
}

impl Default for ClusterGridConfig {
    fn default() -> Self {
        Self { x: 16, y: 8, z: 24 }
    }
}

/// Fixed capacities of the descriptor heaps created at renderer construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescriptorHeapCapacities {
    /// Render-target view slots.
    pub rtv: u32,
    /// Depth-stencil view slots.
    pub dsv: u32,
    /// Shader-visible constant-buffer / shader-resource / unordered-access slots.
    pub cbv_srv_uav: u32,
    /// Sampler slots.
    pub sampler: u32,
}

impl Default for DescriptorHeapCapacities {
    fn default() -> Self {
        Self {
            rtv: 64,
            dsv: 16,
            cbv_srv_uav: 4096,
            sampler: 16,
        }
    }
}

/// Parameters forwarded to the bloom post-process stage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BloomConfig {
    /// Luminance above which pixels contribute to bloom.
    pub threshold: f32,
    /// Strength of the bloom contribution when combined with the scene.
    pub intensity: f32,
}

impl Default for BloomConfig {
    fn default() -> Self {
        Self {
            threshold: 1.0,
            intensity: 0.6,
        }
    }
}

/// The full set of tunables read by the renderer at construction time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Number of swap-chain buffers and per-frame ring slots.
    pub buffer_count: u32,
    /// Capacity of the structured light buffer.
    pub max_lights: u32,
    /// Dimensions of the light cluster grid dispatched by the light-cull pass.
    pub cluster_grid: ClusterGridConfig,
    /// Fixed size of the shadow map, independent of the window size.
    pub shadow_map_size: (u32, u32),
    /// Capacity of the shared vertex mega-buffer, in vertices.
    pub vertex_capacity: u32,
    /// Capacity of the shared index mega-buffer, in indices.
    pub index_capacity: u32,
    /// Capacities of the process-lifetime descriptor heaps.
    pub descriptor_heaps: DescriptorHeapCapacities,
    /// Sample count of the main color and depth targets.
    pub msaa_samples: u32,
    /// Runs bloom and tone mapping instead of resolving MSAA straight into the back buffer.
    pub tone_mapping: bool,
    /// Bloom stage parameters.
    pub bloom: BloomConfig,
    /// Blocks the render thread on the light-cull compute fence before the lit draws.
    ///
    /// When `false` the direct queue waits on the compute fence on the GPU timeline instead.
    pub serialize_light_cull: bool,
    /// Refuses to start on adapters without hardware ray tracing.
    pub require_ray_tracing: bool,
    /// Depth clear value.
    pub clear_depth: f32,
    /// Stencil clear value.
    pub clear_stencil: u8,
    /// Back-buffer format requested from the swap chain.
    pub back_buffer_format: TextureFormat,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            buffer_count: 3,
            max_lights: 256,
            cluster_grid: ClusterGridConfig::default(),
            shadow_map_size: (1920, 1080),
            vertex_capacity: 4 * 1024 * 1024,
            index_capacity: 16 * 1024 * 1024,
            descriptor_heaps: DescriptorHeapCapacities::default(),
            msaa_samples: 4,
            tone_mapping: true,
            bloom: BloomConfig::default(),
            serialize_light_cull: true,
            require_ray_tracing: false,
            clear_depth: 1.0,
            clear_stencil: 0,
            back_buffer_format: TextureFormat::Rgb10a2Unorm,
        }
    }
}

impl RendererConfig {
    /// Upper bound accepted for [`RendererConfig::max_lights`].
    pub const MAX_LIGHT_CAPACITY: u32 = 4096;

    /// Parses a configuration from RON text and validates it.
    pub fn from_ron_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = ron::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a configuration file and validates it.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_ron_str(&text)?;
        log::info!("Loaded renderer config from '{}'", path.display());
        Ok(config)
    }

    /// Checks every field against its accepted range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
            ConfigError::Invalid {
                field,
                reason: reason.into(),
            }
        }

        if !(2..=4).contains(&self.buffer_count) {
            return Err(invalid(
                "buffer_count",
                format!("expected 2..=4, got {}", self.buffer_count),
            ));
        }
        if self.max_lights == 0 || self.max_lights > Self::MAX_LIGHT_CAPACITY {
            return Err(invalid(
                "max_lights",
                format!(
                    "expected 1..={}, got {}",
                    Self::MAX_LIGHT_CAPACITY,
                    self.max_lights
                ),
            ));
        }
        let grid = self.cluster_grid;
        if grid.x == 0 || grid.y == 0 || grid.z == 0 {
            return Err(invalid(
                "cluster_grid",
                format!("every dimension must be non-zero, got {}x{}x{}", grid.x, grid.y, grid.z),
            ));
        }
        if self.shadow_map_size.0 == 0 || self.shadow_map_size.1 == 0 {
            return Err(invalid("shadow_map_size", "dimensions must be non-zero"));
        }
        let heaps = self.descriptor_heaps;
        if heaps.rtv == 0 || heaps.dsv == 0 || heaps.cbv_srv_uav == 0 || heaps.sampler == 0 {
            return Err(invalid("descriptor_heaps", "every capacity must be non-zero"));
        }
        if ![1, 2, 4, 8].contains(&self.msaa_samples) {
            return Err(invalid(
                "msaa_samples",
                format!("expected 1, 2, 4 or 8, got {}", self.msaa_samples),
            ));
        }
        if self.vertex_capacity == 0 {
            return Err(invalid("vertex_capacity", "must be non-zero"));
        }
        if self.index_capacity == 0 {
            return Err(invalid("index_capacity", "must be non-zero"));
        }
        if self.back_buffer_format.is_depth() {
            return Err(invalid(
                "back_buffer_format",
                format!("{:?} is a depth format", self.back_buffer_format),
            ));
        }
        Ok(())
    }

    /// Total number of light clusters in the grid.
    pub fn cluster_count(&self) -> u32 {
        self.cluster_grid.x * self.cluster_grid.y * self.cluster_grid.z
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        let config = RendererConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.buffer_count, 3);
        assert_eq!(config.max_lights, 256);
        assert_eq!(config.shadow_map_size, (1920, 1080));
    }

    #[test]
    fn rejects_out_of_range_buffer_count() {
        let config = RendererConfig {
            buffer_count: 7,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "buffer_count",
                ..
            }
        ));
    }

    #[test]
    fn rejects_zero_cluster_dimension() {
        let config = RendererConfig {
            cluster_grid: ClusterGridConfig { x: 16, y: 0, z: 24 },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_unsupported_sample_count() {
        let config = RendererConfig {
            msaa_samples: 3,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid renderer config field `msaa_samples`: expected 1, 2, 4 or 8, got 3"
        );
    }

    #[test]
    fn parses_partial_ron_with_defaults() {
        let config = RendererConfig::from_ron_str(
            "(max_lights: 64, tone_mapping: false, cluster_grid: (x: 8, y: 4, z: 16))",
        )
        .unwrap();
        assert_eq!(config.max_lights, 64);
        assert!(!config.tone_mapping);
        assert_eq!(config.cluster_count(), 8 * 4 * 16);
        assert_eq!(config.buffer_count, 3);
    }

    #[test]
    fn parse_rejects_invalid_values() {
        let result = RendererConfig::from_ron_str("(max_lights: 0)");
        assert!(matches!(
            result,
            Err(ConfigError::Invalid {
                field: "max_lights",
                ..
            })
        ));
    }

    #[test]
    fn load_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "(buffer_count: 2, msaa_samples: 1)").unwrap();
        let config = RendererConfig::load(file.path()).unwrap();
        assert_eq!(config.buffer_count, 2);
        assert_eq!(config.msaa_samples, 1);
    }

    #[test]
    fn load_reports_missing_file() {
        let err = RendererConfig::load("/definitely/not/here.ron").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
