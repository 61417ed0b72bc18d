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

//! The policy choosing which adapter the device is created on.
//!
//! Kept free of any backend so it can be exercised with synthetic adapter lists.

use crate::renderer::api::{AdapterCandidate, RayTracingTier};
use crate::renderer::error::RenderError;

/// Picks an adapter from `candidates` and returns its index in the slice.
///
/// Candidates are ranked by dedicated video memory, largest first. The first
/// hardware adapter that can create a device at the required feature level wins,
/// provided it also supports ray tracing when `require_ray_tracing` is set.
/// Without a ray-tracing requirement a software adapter is accepted as a last resort.
///
/// # Errors
///
/// [`RenderError::AdapterSelection`] when no candidate qualifies.
pub fn select_adapter(
    candidates: &[AdapterCandidate],
    require_ray_tracing: bool,
) -> Result<usize, RenderError> {
    let mut ranked: Vec<usize> = (0..candidates.len()).collect();
    ranked.sort_by(|a, b| {
        candidates[*b]
            .dedicated_video_memory
            .cmp(&candidates[*a].dedicated_video_memory)
    });

    for &index in &ranked {
        let candidate = &candidates[index];
        if candidate.is_software || !candidate.meets_feature_level {
            log::debug!("Skipping adapter '{}'", candidate.name);
            continue;
        }
        if require_ray_tracing && candidate.ray_tracing_tier < RayTracingTier::Tier1_0 {
            log::debug!("Skipping adapter '{}': no hardware ray tracing", candidate.name);
            continue;
        }
        log::info!(
            "Selected adapter '{}' ({:?}, {:?}, {} MiB dedicated)",
            candidate.name,
            candidate.backend,
            candidate.device_type,
            candidate.dedicated_video_memory / (1024 * 1024)
        );
        return Ok(index);
    }

    if require_ray_tracing {
        return Err(RenderError::AdapterSelection(
            "hardware ray tracing is required but no adapter supports it".to_string(),
        ));
    }

    let fallback = ranked
        .into_iter()
        .find(|&i| candidates[i].is_software && candidates[i].meets_feature_level);
    match fallback {
        Some(index) => {
            log::warn!(
                "No hardware adapter available, falling back to software adapter '{}'",
                candidates[index].name
            );
            Ok(index)
        }
        None => Err(RenderError::AdapterSelection(format!(
            "none of the {} enumerated adapters can create a device",
            candidates.len()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::api::RendererDeviceType;

    fn adapter(name: &str, memory_mib: u64, software: bool, rt: RayTracingTier) -> AdapterCandidate {
        AdapterCandidate {
            name: name.to_string(),
            device_type: if software {
                RendererDeviceType::Cpu
            } else {
                RendererDeviceType::DiscreteGpu
            },
            dedicated_video_memory: memory_mib * 1024 * 1024,
            is_software: software,
            meets_feature_level: true,
            ray_tracing_tier: rt,
            ..Default::default()
        }
    }

    #[test]
    fn prefers_largest_dedicated_memory() {
        let candidates = [
            adapter("small", 2048, false, RayTracingTier::NotSupported),
            adapter("large", 8192, false, RayTracingTier::NotSupported),
            adapter("warp", 0, true, RayTracingTier::NotSupported),
        ];
        assert_eq!(select_adapter(&candidates, false).unwrap(), 1);
    }

    #[test]
    fn skips_adapters_below_feature_level() {
        let mut large = adapter("large", 8192, false, RayTracingTier::Tier1_1);
        large.meets_feature_level = false;
        let candidates = [large, adapter("small", 1024, false, RayTracingTier::NotSupported)];
        assert_eq!(select_adapter(&candidates, false).unwrap(), 1);
    }

    #[test]
    fn ray_tracing_requirement_filters_adapters() {
        let candidates = [
            adapter("raster", 16384, false, RayTracingTier::NotSupported),
            adapter("rt", 4096, false, RayTracingTier::Tier1_0),
        ];
        assert_eq!(select_adapter(&candidates, true).unwrap(), 1);
    }

    #[test]
    fn software_fallback_only_without_ray_tracing() {
        let candidates = [adapter("warp", 0, true, RayTracingTier::NotSupported)];
        assert_eq!(select_adapter(&candidates, false).unwrap(), 0);
        assert!(matches!(
            select_adapter(&candidates, true),
            Err(RenderError::AdapterSelection(_))
        ));
    }

    #[test]
    fn empty_list_fails() {
        assert!(select_adapter(&[], false).is_err());
    }
}
