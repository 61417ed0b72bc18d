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

//! The data the renderer consumes from asset importers and the scene container.
//!
//! Importers hand over normalized [`MeshData`] and [`TextureData`]; the scene hands
//! over [`Drawable`]s through the [`SceneView`] trait. The renderer never parses a
//! file format and never changes scene topology.

use crate::math::{LinearRgba, Mat4, Quat, Vec3};
use crate::renderer::api::{TextureFormat, Vertex};
use crate::renderer::error::ResourceError;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

/// One material range of a mesh's index list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubMesh {
    /// Index into the mesh's material bindings.
    pub material_index: u32,
    /// Number of triangles.
    pub triangle_count: u32,
    /// First index, relative to the mesh's first index.
    pub index_offset: u32,
}

impl SubMesh {
    /// Indices drawn for this sub-mesh.
    pub fn index_count(&self) -> u32 {
        self.triangle_count * 3
    }
}

/// Lays sub-meshes out back to back: sub-mesh `k` starts at three times the
/// triangle count of every sub-mesh before it.
pub fn sequential_submeshes(triangle_counts: &[u32]) -> Vec<SubMesh> {
    let mut offset = 0;
    triangle_counts
        .iter()
        .enumerate()
        .map(|(material_index, &triangle_count)| {
            let submesh = SubMesh {
                material_index: material_index as u32,
                triangle_count,
                index_offset: offset,
            };
            offset += triangle_count * 3;
            submesh
        })
        .collect()
}

/// A normalized, importer-independent mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshData {
    /// Name used in logs.
    pub name: String,
    /// Vertices in the renderer's layout.
    pub vertices: Vec<Vertex>,
    /// Triangle list indices, relative to the first vertex.
    pub indices: Vec<u32>,
    /// Per-material index ranges.
    pub submeshes: Vec<SubMesh>,
}

impl MeshData {
    /// Builds a mesh whose sub-meshes cover `indices` in order, one per material.
    ///
    /// # Errors
    ///
    /// [`ResourceError::OutOfBounds`] if the triangle counts do not add up to the
    /// index count or an index points past the vertex list.
    pub fn new(
        name: impl Into<String>,
        vertices: Vec<Vertex>,
        indices: Vec<u32>,
        triangle_counts: &[u32],
    ) -> Result<Self, ResourceError> {
        let total: u64 = triangle_counts.iter().map(|t| u64::from(*t) * 3).sum();
        if total != indices.len() as u64 || indices.iter().any(|i| *i as usize >= vertices.len()) {
            return Err(ResourceError::OutOfBounds);
        }
        Ok(Self {
            name: name.into(),
            vertices,
            indices,
            submeshes: sequential_submeshes(triangle_counts),
        })
    }

    /// Number of triangles over all sub-meshes.
    pub fn triangle_count(&self) -> u32 {
        self.submeshes.iter().map(|s| s.triangle_count).sum()
    }

    /// A unit cube centered on the origin with outward normals and one material.
    pub fn cube() -> Self {
        const FACES: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
            ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]),
            ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
            ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
            ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
            ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
            ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ];
        let mut vertices = Vec::with_capacity(24);
        let mut indices = Vec::with_capacity(36);
        for (normal, right, up) in FACES {
            let (n, r, u) = (Vec3::from(normal), Vec3::from(right), Vec3::from(up));
            let base = vertices.len() as u32;
            for (sx, sy) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
                let p = (n + r * sx + u * sy) * 0.5;
                vertices.push(Vertex::new(
                    p.to_array(),
                    normal,
                    [(sx + 1.0) * 0.5, 1.0 - (sy + 1.0) * 0.5],
                ));
            }
            indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }
        Self {
            name: "Cube".to_string(),
            vertices,
            indices,
            submeshes: sequential_submeshes(&[12]),
        }
    }

    /// A square on the XZ plane, `size` units wide, facing up.
    pub fn plane(size: f32) -> Self {
        let h = size * 0.5;
        let up = [0.0, 1.0, 0.0];
        let vertices = vec![
            Vertex::new([-h, 0.0, h], up, [0.0, 1.0]),
            Vertex::new([h, 0.0, h], up, [1.0, 1.0]),
            Vertex::new([h, 0.0, -h], up, [1.0, 0.0]),
            Vertex::new([-h, 0.0, -h], up, [0.0, 0.0]),
        ];
        Self {
            name: "Plane".to_string(),
            vertices,
            indices: vec![0, 1, 2, 0, 2, 3],
            submeshes: sequential_submeshes(&[2]),
        }
    }
}

/// A normalized texture.
#[derive(Debug, Clone, PartialEq)]
pub enum TextureData {
    /// Decoded RGBA8 pixels, rows top to bottom.
    Rgba8 {
        /// Width in pixels.
        width: u32,
        /// Height in pixels.
        height: u32,
        /// `width * height * 4` bytes.
        pixels: Vec<u8>,
    },
    /// Texel data already in GPU layout (for example block-compressed), read as-is
    /// from `path`.
    Native {
        /// File holding tightly packed block rows of mip 0.
        path: PathBuf,
        /// GPU format of the data.
        format: TextureFormat,
        /// Width in pixels.
        width: u32,
        /// Height in pixels.
        height: u32,
    },
}

impl TextureData {
    /// A `width` x `height` texture of one color.
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        Self::Rgba8 {
            width,
            height,
            pixels: rgba.repeat((width * height) as usize),
        }
    }

    /// Width and height in pixels.
    pub fn size(&self) -> (u32, u32) {
        match self {
            Self::Rgba8 { width, height, .. } | Self::Native { width, height, .. } => (*width, *height),
        }
    }

    /// GPU format the texture is created with.
    pub fn format(&self) -> TextureFormat {
        match self {
            Self::Rgba8 { .. } => TextureFormat::Rgba8UnormSrgb,
            Self::Native { format, .. } => *format,
        }
    }

    /// The texel bytes of mip 0, reading the file for native data.
    pub fn load_bytes(&self) -> Result<Vec<u8>, ResourceError> {
        let (width, height) = self.size();
        let format = self.format();
        let expected = format.unpadded_row_pitch(width) as usize * format.row_count(height) as usize;
        let bytes = match self {
            Self::Rgba8 { pixels, .. } => pixels.clone(),
            Self::Native { path, .. } => std::fs::read(path).map_err(|e| {
                ResourceError::BackendError(format!("failed to read texture '{}': {e}", path.display()))
            })?,
        };
        if bytes.len() != expected {
            return Err(ResourceError::OutOfBounds);
        }
        Ok(bytes)
    }
}

/// Where a mesh lives inside the shared vertex and index buffers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GpuMesh {
    /// Offset of the mesh's first vertex in the vertex buffer, in vertices.
    pub base_vertex: u32,
    /// Number of vertices.
    pub vertex_count: u32,
    /// Offset of the mesh's first index in the index buffer, in indices.
    pub first_index: u32,
    /// Number of indices.
    pub index_count: u32,
    /// Per-material index ranges, relative to `first_index`.
    pub submeshes: Vec<SubMesh>,
}

/// A position, rotation and scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    /// Translation.
    pub translation: Vec3,
    /// Rotation.
    pub rotation: Quat,
    /// Non-uniform scale.
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    /// A transform that only translates.
    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Default::default()
        }
    }

    /// Object to world.
    pub fn model_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

/// A renderable entity: a resident mesh, its transform and its material bindings.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    /// Debug name.
    pub name: String,
    /// GPU-resident geometry.
    pub mesh: GpuMesh,
    /// Object transform.
    pub transform: Transform,
    /// Material name per sub-mesh `material_index`.
    pub materials: Vec<String>,
    /// Color multiplied into the diffuse texture.
    pub base_color: LinearRgba,
}

/// One entity as seen by the draw loops.
#[derive(Debug, Clone, Copy)]
pub struct Drawable<'a> {
    /// GPU-resident geometry.
    pub mesh: &'a GpuMesh,
    /// Object to world.
    pub model: Mat4,
    /// Material name per sub-mesh `material_index`.
    pub materials: &'a [String],
    /// Base color.
    pub base_color: LinearRgba,
}

impl Drawable<'_> {
    /// The material bound to `submesh`, if any.
    pub fn material_for(&self, submesh: &SubMesh) -> Option<&str> {
        self.materials.get(submesh.material_index as usize).map(String::as_str)
    }
}

/// Read-only access to the scene for the draw loops.
pub trait SceneView: Send + Sync {
    /// Whether every mesh and texture of the scene is resident.
    fn is_ready(&self) -> bool;

    /// Calls `visit` for every drawable entity.
    fn for_each_drawable(&self, visit: &mut dyn FnMut(Drawable<'_>));
}

/// A flat entity list shared between the loading thread and the render thread.
#[derive(Debug, Default)]
pub struct Scene {
    entities: RwLock<Vec<Entity>>,
    ready: Arc<AtomicBool>,
}

impl Scene {
    /// Creates an empty scene that is not ready.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entity whose mesh is already resident.
    pub fn push(&self, entity: Entity) {
        let mut entities = self
            .entities
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        entities.push(entity);
    }

    /// Removes every entity and clears the ready flag.
    pub fn clear(&self) {
        self.ready.store(false, Ordering::Release);
        self.entities
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }

    /// Number of entities.
    pub fn len(&self) -> usize {
        self.entities.read().map(|e| e.len()).unwrap_or_default()
    }

    /// Returns `true` without entities.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sets the ready flag.
    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::Release);
    }

    /// The shared ready flag.
    pub fn ready_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.ready)
    }
}

impl SceneView for Scene {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    fn for_each_drawable(&self, visit: &mut dyn FnMut(Drawable<'_>)) {
        let entities = self
            .entities
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        for entity in entities.iter() {
            visit(Drawable {
                mesh: &entity.mesh,
                model: entity.transform.model_matrix(),
                materials: &entity.materials,
                base_color: entity.base_color,
            });
        }
    }
}
