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

//! Greedy meshlet packing for the mesh-shader path.

use bytemuck::{Pod, Zeroable};

/// Most unique vertices one meshlet may reference.
pub const MAX_MESHLET_VERTICES: usize = 64;
/// Most triangles one meshlet may emit.
pub const MAX_MESHLET_PRIMITIVES: usize = 124;

/// One entry of the meshlet table.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Pod, Zeroable)]
pub struct Meshlet {
    /// First entry in [`MeshletData::vertex_indices`].
    pub vertex_offset: u32,
    /// Number of unique vertices.
    pub vertex_count: u32,
    /// First entry in [`MeshletData::primitives`].
    pub primitive_offset: u32,
    /// Number of triangles.
    pub primitive_count: u32,
}

/// A mesh split into meshlets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MeshletData {
    /// The meshlet table; the mesh pass dispatches one thread group per entry.
    pub meshlets: Vec<Meshlet>,
    /// Mesh vertex indices referenced by each meshlet, concatenated.
    pub vertex_indices: Vec<u32>,
    /// Triangles as three 8-bit meshlet-local indices packed into the low 24 bits.
    pub primitives: Vec<u32>,
}

impl MeshletData {
    /// Packs three meshlet-local vertex indices into one primitive word.
    pub const fn pack_triangle(a: u8, b: u8, c: u8) -> u32 {
        a as u32 | (b as u32) << 8 | (c as u32) << 16
    }

    /// Unpacks a primitive word.
    pub const fn unpack_triangle(packed: u32) -> [u8; 3] {
        [packed as u8, (packed >> 8) as u8, (packed >> 16) as u8]
    }

    /// Number of meshlets.
    pub fn len(&self) -> usize {
        self.meshlets.len()
    }

    /// Returns `true` for an empty mesh.
    pub fn is_empty(&self) -> bool {
        self.meshlets.is_empty()
    }
}

/// Splits an indexed triangle list into meshlets of at most
/// [`MAX_MESHLET_VERTICES`] vertices and [`MAX_MESHLET_PRIMITIVES`] triangles.
///
/// Triangles are consumed in order; a meshlet is closed as soon as the next
/// triangle would push it over either limit. Trailing indices that do not form a
/// full triangle are ignored.
pub fn build_meshlets(indices: &[u32]) -> MeshletData {
    let mut data = MeshletData::default();
    let mut local: Vec<u32> = Vec::with_capacity(MAX_MESHLET_VERTICES);
    let mut current = Meshlet::default();

    for triangle in indices.chunks_exact(3) {
        let new_vertices = triangle
            .iter()
            .enumerate()
            .filter(|&(i, v)| !local.contains(v) && !triangle[..i].contains(v))
            .count();
        if local.len() + new_vertices > MAX_MESHLET_VERTICES
            || current.primitive_count as usize + 1 > MAX_MESHLET_PRIMITIVES
        {
            flush(&mut data, &mut local, &mut current);
        }

        let mut corners = [0u8; 3];
        for (corner, vertex) in corners.iter_mut().zip(triangle) {
            let slot = match local.iter().position(|v| v == vertex) {
                Some(slot) => slot,
                None => {
                    local.push(*vertex);
                    local.len() - 1
                }
            };
            *corner = slot as u8;
        }
        data.primitives
            .push(MeshletData::pack_triangle(corners[0], corners[1], corners[2]));
        current.primitive_count += 1;
    }
    flush(&mut data, &mut local, &mut current);
    data
}

fn flush(data: &mut MeshletData, local: &mut Vec<u32>, current: &mut Meshlet) {
    if current.primitive_count == 0 {
        return;
    }
    current.vertex_count = local.len() as u32;
    data.vertex_indices.append(local);
    data.meshlets.push(*current);
    *current = Meshlet {
        vertex_offset: data.vertex_indices.len() as u32,
        vertex_count: 0,
        primitive_offset: data.primitives.len() as u32,
        primitive_count: 0,
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A `n` x `n` quad grid, two triangles per cell.
    fn grid(n: u32) -> Vec<u32> {
        let mut indices = Vec::new();
        for y in 0..n {
            for x in 0..n {
                let i = y * (n + 1) + x;
                indices.extend_from_slice(&[i, i + 1, i + n + 1, i + 1, i + n + 2, i + n + 1]);
            }
        }
        indices
    }

    #[test]
    fn single_triangle_is_one_meshlet() {
        let data = build_meshlets(&[5, 6, 7]);
        assert_eq!(data.len(), 1);
        assert_eq!(data.vertex_indices, vec![5, 6, 7]);
        assert_eq!(MeshletData::unpack_triangle(data.primitives[0]), [0, 1, 2]);
    }

    #[test]
    fn respects_limits_and_reconstructs_every_triangle() {
        let indices = grid(24);
        let data = build_meshlets(&indices);
        assert!(data.len() > 1);

        let mut rebuilt = Vec::new();
        for meshlet in &data.meshlets {
            assert!(meshlet.vertex_count as usize <= MAX_MESHLET_VERTICES);
            assert!(meshlet.primitive_count as usize <= MAX_MESHLET_PRIMITIVES);
            let vertices = &data.vertex_indices
                [meshlet.vertex_offset as usize..(meshlet.vertex_offset + meshlet.vertex_count) as usize];
            let primitives = &data.primitives
                [meshlet.primitive_offset as usize..(meshlet.primitive_offset + meshlet.primitive_count) as usize];
            for packed in primitives {
                for local in MeshletData::unpack_triangle(*packed) {
                    rebuilt.push(vertices[local as usize]);
                }
            }
        }
        assert_eq!(rebuilt, indices);
    }

    #[test]
    fn primitive_limit_closes_meshlet() {
        // Degenerate triangles reuse one vertex, so only the primitive limit applies.
        let indices = vec![0u32; 3 * (MAX_MESHLET_PRIMITIVES + 1)];
        let data = build_meshlets(&indices);
        assert_eq!(data.len(), 2);
        assert_eq!(data.meshlets[1].primitive_count, 1);
        assert_eq!(data.meshlets[1].primitive_offset as usize, MAX_MESHLET_PRIMITIVES);
    }

    #[test]
    fn empty_and_partial_input() {
        assert!(build_meshlets(&[]).is_empty());
        assert!(build_meshlets(&[1, 2]).is_empty());
    }
}
