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

use crate::renderer::api::{BufferUsage, HeapDescriptor, HeapId, MemoryLocation, PLACEMENT_ALIGNMENT};
use crate::renderer::error::ResourceError;
use crate::renderer::traits::GraphicsDevice;
use std::borrow::Cow;

/// A memory heap that buffers are placed into at caller-chosen offsets.
///
/// The heap records every live placement and rejects misaligned, overlapping or
/// out-of-range requests before they reach the device.
#[derive(Debug)]
pub struct GpuHeap {
    id: HeapId,
    size: u64,
    memory: MemoryLocation,
    usage: BufferUsage,
    /// Live placements as `(offset, size)`, sorted by offset.
    regions: Vec<(u64, u64)>,
}

impl GpuHeap {
    /// Creates the heap on the device.
    pub fn new(
        device: &dyn GraphicsDevice,
        label: &str,
        size: u64,
        memory: MemoryLocation,
        usage: BufferUsage,
    ) -> Result<Self, ResourceError> {
        let id = device.create_heap(&HeapDescriptor {
            label: Some(Cow::Borrowed(label)),
            size,
            memory,
            usage,
        })?;
        log::debug!("Created {memory:?} heap '{label}' of {size} bytes");
        Ok(Self {
            id,
            size,
            memory,
            usage,
            regions: Vec::new(),
        })
    }

    /// Reserves `[offset, offset + size)`.
    pub fn reserve(&mut self, offset: u64, size: u64) -> Result<(), ResourceError> {
        if offset % PLACEMENT_ALIGNMENT != 0 {
            return Err(ResourceError::MisalignedPlacement {
                offset,
                alignment: PLACEMENT_ALIGNMENT,
            });
        }
        let end = offset.checked_add(size).filter(|end| size > 0 && *end <= self.size);
        let Some(end) = end else {
            return Err(ResourceError::RegionOverlap { offset, size });
        };
        let index = self.regions.partition_point(|(start, _)| *start < offset);
        let overlaps_prev = index > 0 && {
            let (start, len) = self.regions[index - 1];
            start + len > offset
        };
        let overlaps_next = self
            .regions
            .get(index)
            .is_some_and(|(start, _)| *start < end);
        if overlaps_prev || overlaps_next {
            return Err(ResourceError::RegionOverlap { offset, size });
        }
        self.regions.insert(index, (offset, size));
        Ok(())
    }

    /// Releases the placement starting at `offset`.
    pub fn release(&mut self, offset: u64) {
        self.regions.retain(|(start, _)| *start != offset);
    }

    /// Backend heap.
    pub fn id(&self) -> HeapId {
        self.id
    }

    /// Heap size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Memory location shared by every placement.
    pub fn memory(&self) -> MemoryLocation {
        self.memory
    }

    /// Usages placed buffers may request.
    pub fn usage(&self) -> BufferUsage {
        self.usage
    }

    /// Number of live placements.
    pub fn placement_count(&self) -> usize {
        self.regions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockDevice;

    fn heap() -> GpuHeap {
        GpuHeap::new(
            &MockDevice::new(),
            "Geometry Heap",
            4 * PLACEMENT_ALIGNMENT,
            MemoryLocation::GpuOnly,
            BufferUsage::VERTEX | BufferUsage::INDEX,
        )
        .unwrap()
    }

    #[test]
    fn accepts_disjoint_regions_in_any_order() {
        let mut heap = heap();
        heap.reserve(2 * PLACEMENT_ALIGNMENT, PLACEMENT_ALIGNMENT).unwrap();
        heap.reserve(0, 2 * PLACEMENT_ALIGNMENT).unwrap();
        heap.reserve(3 * PLACEMENT_ALIGNMENT, 100).unwrap();
        assert_eq!(heap.placement_count(), 3);
    }

    #[test]
    fn rejects_overlap_on_either_side() {
        let mut heap = heap();
        heap.reserve(PLACEMENT_ALIGNMENT, PLACEMENT_ALIGNMENT + 1).unwrap();
        assert!(matches!(
            heap.reserve(0, PLACEMENT_ALIGNMENT + 1),
            Err(ResourceError::RegionOverlap { .. })
        ));
        assert!(matches!(
            heap.reserve(2 * PLACEMENT_ALIGNMENT, 16),
            Err(ResourceError::RegionOverlap { .. })
        ));
    }

    #[test]
    fn rejects_misaligned_and_out_of_range() {
        let mut heap = heap();
        assert!(matches!(
            heap.reserve(256, 16),
            Err(ResourceError::MisalignedPlacement { .. })
        ));
        assert!(matches!(
            heap.reserve(3 * PLACEMENT_ALIGNMENT, PLACEMENT_ALIGNMENT + 1),
            Err(ResourceError::RegionOverlap { .. })
        ));
    }

    #[test]
    fn release_frees_the_region() {
        let mut heap = heap();
        heap.reserve(0, PLACEMENT_ALIGNMENT).unwrap();
        heap.release(0);
        heap.reserve(0, PLACEMENT_ALIGNMENT).unwrap();
    }
}
