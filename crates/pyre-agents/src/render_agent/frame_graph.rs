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

//! The fixed task graph of frame stages.

use pyre_core::graph::topological_sort;
use pyre_core::renderer::RenderError;

/// One stage of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameStage {
    /// Opens the frame, writes the constants and draws camera and shadow depth.
    DepthOnly,
    /// Clears the scene target and draws the sky.
    Skybox,
    /// Light culling, lit geometry and post-processing.
    Color,
    /// The caller's overlay on the back buffer.
    Gui,
    /// Submits, presents and advances the ring.
    PostRender,
}

impl FrameStage {
    /// Every stage, in declaration order.
    pub const ALL: [FrameStage; 5] = [
        FrameStage::DepthOnly,
        FrameStage::Skybox,
        FrameStage::Color,
        FrameStage::Gui,
        FrameStage::PostRender,
    ];

    /// Name used in logs.
    pub fn name(self) -> &'static str {
        match self {
            FrameStage::DepthOnly => "DepthOnlyPass",
            FrameStage::Skybox => "SkyboxPass",
            FrameStage::Color => "ColorPass",
            FrameStage::Gui => "GuiPass",
            FrameStage::PostRender => "PostRender",
        }
    }
}

const EDGES: [(FrameStage, FrameStage); 4] = [
    (FrameStage::DepthOnly, FrameStage::Skybox),
    (FrameStage::Skybox, FrameStage::Color),
    (FrameStage::Color, FrameStage::Gui),
    (FrameStage::Gui, FrameStage::PostRender),
];

/// Execution order of the frame stages, resolved once from their dependencies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameGraph {
    order: Vec<FrameStage>,
}

impl FrameGraph {
    /// The linear chain every renderer runs.
    pub fn new() -> Result<Self, RenderError> {
        Self::from_edges(EDGES)
    }

    fn from_edges(edges: impl IntoIterator<Item = (FrameStage, FrameStage)>) -> Result<Self, RenderError> {
        let order = topological_sort(FrameStage::ALL, edges)
            .map_err(|cycle| RenderError::Internal(format!("frame graph: {cycle}")))?;
        log::debug!("Frame graph order: {order:?}");
        Ok(Self { order })
    }

    /// Stages in execution order.
    pub fn stages(&self) -> &[FrameStage] {
        &self.order
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stages_form_a_linear_chain() {
        let graph = FrameGraph::new().unwrap();
        assert_eq!(graph.stages(), &FrameStage::ALL);
    }

    #[test]
    fn edges_decide_the_order() {
        let graph = FrameGraph::from_edges([
            (FrameStage::PostRender, FrameStage::DepthOnly),
            (FrameStage::Gui, FrameStage::PostRender),
        ])
        .unwrap();
        let position = |stage| graph.stages().iter().position(|s| *s == stage).unwrap();
        assert!(position(FrameStage::Gui) < position(FrameStage::PostRender));
        assert!(position(FrameStage::PostRender) < position(FrameStage::DepthOnly));
    }

    #[test]
    fn a_cycle_is_rejected() {
        let mut edges = EDGES.to_vec();
        edges.push((FrameStage::PostRender, FrameStage::DepthOnly));
        assert!(matches!(FrameGraph::from_edges(edges), Err(RenderError::Internal(_))));
    }
}
