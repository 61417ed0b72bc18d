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

//! Per-frame inputs and outputs of a renderer.

use pyre_core::math::Camera;
use pyre_core::renderer::api::CommandStats;
use pyre_core::renderer::{CommandList, SunLight};

/// What the caller controls every frame.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameView {
    /// The viewing camera.
    pub camera: Camera,
    /// The directional light.
    pub sun: SunLight,
}

/// Work submitted by one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Logical index of the frame.
    pub frame_index: u64,
    /// Draw commands over every list of the frame.
    pub draw_calls: u32,
    /// Compute and mesh dispatches.
    pub dispatches: u32,
    /// Triangles submitted by draws.
    pub triangles: u64,
}

impl FrameStats {
    /// Adds the counters of one recorded list.
    pub fn record(&mut self, stats: CommandStats) {
        self.draw_calls += stats.draw_calls;
        self.dispatches += stats.dispatches + stats.mesh_dispatches;
        self.triangles += stats.triangles;
    }
}

/// Records an overlay on top of the finished frame.
///
/// The back buffer is bound as the only render target with a full viewport when
/// [`GuiHook::record`] runs.
pub trait GuiHook {
    /// Records the overlay's commands.
    fn record(&mut self, list: &mut CommandList);
}

impl<F: FnMut(&mut CommandList)> GuiHook for F {
    fn record(&mut self, list: &mut CommandList) {
        self(list)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mesh_dispatches_count_as_dispatches() {
        let mut stats = FrameStats::default();
        stats.record(CommandStats {
            draw_calls: 3,
            dispatches: 1,
            mesh_dispatches: 2,
            triangles: 36,
        });
        stats.record(CommandStats {
            draw_calls: 1,
            ..Default::default()
        });
        assert_eq!((stats.draw_calls, stats.dispatches, stats.triangles), (4, 3, 36));
    }
}
