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

//! Blocking uploads through the copy queue.

use pyre_core::renderer::api::{
    align_up, BufferId, CommandListType, TextureCopyLayout, TextureCopyRegion, TextureFormat,
    TextureId, TEXTURE_DATA_PITCH_ALIGNMENT,
};
use pyre_core::renderer::{
    CommandList, CommandQueueManager, GraphicsDevice, RenderError, ResourceError,
    ResourceUploader, UploadBuffer,
};
use std::borrow::Cow;
use std::sync::{Arc, Mutex};

/// Smallest scratch buffer ever allocated.
const MIN_SCRATCH_SIZE: u64 = 64 * 1024;

/// Copies CPU data into GPU-only resources on the copy queue, then blocks the
/// calling thread until the copy fence has retired.
///
/// Returning from an upload therefore means the data is resident: a mesh is never
/// handed to the scene half-copied. One scratch upload buffer is shared by every
/// upload; it is replaced by a larger one when a request does not fit. Concurrent
/// callers are serialized on it.
#[derive(Debug)]
pub struct SyncUploader {
    device: Arc<dyn GraphicsDevice>,
    queues: Arc<CommandQueueManager>,
    scratch: Mutex<Option<UploadBuffer>>,
}

impl SyncUploader {
    /// Creates the uploader; the scratch buffer is allocated by the first upload.
    pub fn new(device: Arc<dyn GraphicsDevice>, queues: Arc<CommandQueueManager>) -> Self {
        Self {
            device,
            queues,
            scratch: Mutex::new(None),
        }
    }

    /// Current scratch capacity in bytes, 0 before the first upload.
    pub fn scratch_capacity(&self) -> u64 {
        self.scratch
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .as_ref()
            .map_or(0, UploadBuffer::capacity)
    }

    fn with_scratch(
        &self,
        size: u64,
        record: impl FnOnce(&UploadBuffer) -> Result<(), RenderError>,
    ) -> Result<(), RenderError> {
        let mut scratch = self
            .scratch
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if scratch.as_ref().map_or(true, |buffer| buffer.capacity() < size) {
            // Every previous upload has retired, so the old buffer is idle.
            if let Some(old) = scratch.take() {
                old.destroy(self.device.as_ref())?;
            }
            let capacity = size.max(MIN_SCRATCH_SIZE).next_power_of_two();
            log::debug!("Growing upload scratch buffer to {capacity} bytes");
            *scratch = Some(UploadBuffer::new(self.device.as_ref(), "Upload Scratch", capacity)?);
        }
        match scratch.as_ref() {
            Some(buffer) => record(buffer),
            None => Err(ResourceError::ContextNotReady("upload scratch buffer".to_string()).into()),
        }
    }

    fn submit_and_wait(&self, mut list: CommandList) -> Result<(), RenderError> {
        let fence_value = self.queues.close_and_execute(&mut list)?;
        self.queues.copy_queue().wait_for_fence(fence_value)
    }
}

impl ResourceUploader for SyncUploader {
    fn upload_to_buffer(&self, dst: BufferId, dst_offset: u64, data: &[u8]) -> Result<(), RenderError> {
        if data.is_empty() {
            return Ok(());
        }
        let size = data.len() as u64;
        self.with_scratch(size, |scratch| {
            scratch.update_data(self.device.as_ref(), data)?;
            let mut list = self
                .queues
                .allocate_command_list(CommandListType::Copy, "Buffer Upload")?;
            list.copy_buffer_region(dst, dst_offset, scratch.buffer(), 0, size);
            self.submit_and_wait(list)
        })?;
        log::trace!("Uploaded {size} bytes into {dst:?} at offset {dst_offset}");
        Ok(())
    }

    fn upload_to_texture(
        &self,
        dst: TextureId,
        format: TextureFormat,
        region: TextureCopyRegion,
        data: &[u8],
    ) -> Result<(), RenderError> {
        let row_pitch = format.unpadded_row_pitch(region.width) as usize;
        let rows = format.row_count(region.height) as usize;
        if data.len() != row_pitch * rows {
            return Err(ResourceError::OutOfBounds.into());
        }
        if data.is_empty() {
            return Ok(());
        }

        // Copy rows must start on the pitch alignment.
        let padded_pitch = align_up(row_pitch as u64, u64::from(TEXTURE_DATA_PITCH_ALIGNMENT)) as usize;
        let staged: Cow<'_, [u8]> = if padded_pitch == row_pitch {
            Cow::Borrowed(data)
        } else {
            let mut padded = vec![0; padded_pitch * rows];
            for (src, dst) in data.chunks_exact(row_pitch).zip(padded.chunks_exact_mut(padded_pitch)) {
                dst[..row_pitch].copy_from_slice(src);
            }
            Cow::Owned(padded)
        };

        self.with_scratch(staged.len() as u64, |scratch| {
            scratch.update_data(self.device.as_ref(), &staged)?;
            let mut list = self
                .queues
                .allocate_command_list(CommandListType::Copy, "Texture Upload")?;
            list.copy_buffer_to_texture(
                scratch.buffer(),
                TextureCopyLayout {
                    offset: 0,
                    bytes_per_row: padded_pitch as u32,
                    rows_per_image: rows as u32,
                },
                dst,
                region,
            );
            self.submit_and_wait(list)
        })?;
        log::trace!(
            "Uploaded {}x{} {format:?} into {dst:?} (layer {}, mip {})",
            region.width,
            region.height,
            region.array_layer,
            region.mip_level
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pyre_core::renderer::api::Command;
    use pyre_core::testing::MockDevice;

    fn setup() -> (Arc<MockDevice>, SyncUploader) {
        let device = Arc::new(MockDevice::new());
        let queues = Arc::new(CommandQueueManager::new(device.clone()).unwrap());
        let uploader = SyncUploader::new(device.clone(), queues);
        (device, uploader)
    }

    #[test]
    fn buffer_upload_runs_on_the_copy_queue() {
        let (device, uploader) = setup();
        uploader.upload_to_buffer(BufferId(4242), 128, &[7u8; 40]).unwrap();

        let lists = device.executed_lists();
        assert_eq!(lists.len(), 1);
        assert_eq!(lists[0].0, CommandListType::Copy);
        assert!(matches!(
            lists[0].1.commands(),
            [Command::CopyBufferRegion { dst: BufferId(4242), dst_offset: 128, src_offset: 0, size: 40, .. }]
        ));
    }

    #[test]
    fn scratch_grows_only_when_needed() {
        let (device, uploader) = setup();
        assert_eq!(uploader.scratch_capacity(), 0);

        uploader.upload_to_buffer(BufferId(1), 0, &[1u8; 16]).unwrap();
        assert_eq!(uploader.scratch_capacity(), MIN_SCRATCH_SIZE);
        let live = device.live_buffer_count();

        uploader.upload_to_buffer(BufferId(1), 0, &vec![2u8; 100_000]).unwrap();
        assert_eq!(uploader.scratch_capacity(), 131_072);
        // The old scratch buffer was released.
        assert_eq!(device.live_buffer_count(), live);

        uploader.upload_to_buffer(BufferId(1), 0, &[3u8; 16]).unwrap();
        assert_eq!(uploader.scratch_capacity(), 131_072);
    }

    #[test]
    fn texture_rows_are_padded_to_the_pitch_alignment() {
        let (device, uploader) = setup();
        let region = TextureCopyRegion {
            mip_level: 0,
            array_layer: 2,
            width: 2,
            height: 2,
        };
        uploader
            .upload_to_texture(TextureId(9), TextureFormat::Rgba8Unorm, region, &[255u8; 16])
            .unwrap();

        let commands = device.executed_commands();
        assert!(matches!(
            commands.as_slice(),
            [Command::CopyBufferToTexture {
                layout: TextureCopyLayout { offset: 0, bytes_per_row: 256, rows_per_image: 2 },
                dst: TextureId(9),
                region: TextureCopyRegion { array_layer: 2, .. },
                ..
            }]
        ));
    }

    #[test]
    fn texture_data_must_match_the_region() {
        let (device, uploader) = setup();
        let region = TextureCopyRegion {
            mip_level: 0,
            array_layer: 0,
            width: 4,
            height: 4,
        };
        let result = uploader.upload_to_texture(TextureId(9), TextureFormat::Rgba8Unorm, region, &[0u8; 12]);
        assert!(matches!(result, Err(RenderError::ResourceError(ResourceError::OutOfBounds))));
        assert!(device.executed_lists().is_empty());
    }
}
