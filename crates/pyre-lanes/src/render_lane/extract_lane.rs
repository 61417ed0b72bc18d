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

//! Turns the scene's drawables into flat per-sub-mesh draw items.

use pyre_core::renderer::{CommandList, ObjectData};
use pyre_core::scene::{Drawable, SceneView};

/// One indexed draw: a sub-mesh of a drawable, located in the shared mega-buffers.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawItem {
    /// Root constants of the draw: model matrix and base color.
    pub object: ObjectData,
    /// Indices read by the draw.
    pub index_count: u32,
    /// First index, relative to the start of the index mega-buffer.
    pub start_index: u32,
    /// Added to every index before fetching a vertex.
    pub base_vertex: i32,
    /// Name of the bound material, if the sub-mesh has one.
    pub material: Option<String>,
}

impl DrawItem {
    /// Issues the indexed draw.
    pub fn draw(&self, list: &mut CommandList) {
        list.draw_indexed_instanced(self.index_count, 1, self.start_index, self.base_vertex, 0);
    }
}

/// Draw items of one drawable, one per sub-mesh, in sub-mesh order.
pub fn draw_items(drawable: &Drawable<'_>) -> Vec<DrawItem> {
    let object = ObjectData::new(drawable.model, drawable.base_color);
    drawable
        .mesh
        .submeshes
        .iter()
        .filter(|submesh| submesh.triangle_count > 0)
        .map(|submesh| DrawItem {
            object,
            index_count: submesh.index_count(),
            start_index: drawable.mesh.first_index + submesh.index_offset,
            base_vertex: drawable.mesh.base_vertex as i32,
            material: drawable.material_for(submesh).map(str::to_string),
        })
        .collect()
}

/// Draw items of every drawable in the scene.
///
/// Returns nothing while the scene's ready flag is unset.
pub fn extract_draws(scene: &dyn SceneView) -> Vec<DrawItem> {
    if !scene.is_ready() {
        return Vec::new();
    }
    let mut draws = Vec::new();
    scene.for_each_drawable(&mut |drawable| draws.extend(draw_items(&drawable)));
    draws
}

#[cfg(test)]
mod tests {
    use super::*;
    use pyre_core::math::{LinearRgba, Mat4, Vec3};
    use pyre_core::scene::{sequential_submeshes, Entity, GpuMesh, Scene, Transform};

    fn mesh(base_vertex: u32, first_index: u32, triangle_counts: &[u32]) -> GpuMesh {
        let submeshes = sequential_submeshes(triangle_counts);
        GpuMesh {
            base_vertex,
            vertex_count: 8,
            first_index,
            index_count: submeshes.iter().map(|s| s.index_count()).sum(),
            submeshes,
        }
    }

    #[test]
    fn test_submesh_offsets_follow_triangle_counts() {
        let mesh = mesh(0, 0, &[4, 10, 1]);
        let materials = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let drawable = Drawable {
            mesh: &mesh,
            model: Mat4::IDENTITY,
            materials: &materials,
            base_color: LinearRgba::WHITE,
        };

        let draws = draw_items(&drawable);
        let spans: Vec<(u32, u32)> = draws.iter().map(|d| (d.start_index, d.index_count)).collect();
        assert_eq!(spans, vec![(0, 12), (12, 30), (42, 3)]);
        assert_eq!(draws[1].material.as_deref(), Some("b"));
    }

    #[test]
    fn test_mesh_location_offsets_draws() {
        let mesh = mesh(1000, 300, &[2, 2]);
        let drawable = Drawable {
            mesh: &mesh,
            model: Mat4::from_translation(Vec3::X),
            materials: &[],
            base_color: LinearRgba::BLACK,
        };

        let draws = draw_items(&drawable);
        assert_eq!(draws[0].start_index, 300);
        assert_eq!(draws[1].start_index, 306);
        assert!(draws.iter().all(|d| d.base_vertex == 1000 && d.material.is_none()));
        assert_eq!(draws[0].object.model[3][0], 1.0);
    }

    #[test]
    fn test_unready_scene_yields_no_draws() {
        let scene = Scene::new();
        scene.push(Entity {
            name: "Cube".to_string(),
            mesh: mesh(0, 0, &[12]),
            transform: Transform::default(),
            materials: Vec::new(),
            base_color: LinearRgba::WHITE,
        });
        assert!(extract_draws(&scene).is_empty());

        scene.set_ready(true);
        let draws = extract_draws(&scene);
        assert_eq!(draws.len(), 1);
        assert_eq!(draws[0].index_count, 36);
    }

    #[test]
    fn test_draw_records_indexed_command() {
        let item = DrawItem {
            object: ObjectData::new(Mat4::IDENTITY, LinearRgba::WHITE),
            index_count: 36,
            start_index: 6,
            base_vertex: 24,
            material: None,
        };
        let mut list = CommandList::new(
            pyre_core::renderer::CommandListType::Direct,
            pyre_core::renderer::CommandAllocatorId(1),
            "test",
        );
        item.draw(&mut list);
        let stats = list.stats();
        assert_eq!(stats.draw_calls, 1);
        assert_eq!(stats.triangles, 12);
    }
}
