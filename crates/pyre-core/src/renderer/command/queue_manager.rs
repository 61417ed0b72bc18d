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

use super::CommandAllocatorPool;
use crate::renderer::api::{CommandAllocatorId, CommandList, CommandListType, FenceId};
use crate::renderer::error::{RenderError, ResourceError};
use crate::renderer::traits::GraphicsDevice;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// One hardware queue with its fence and allocator pool.
///
/// Fence values start at 1 and grow by one per signal. The last completed value is
/// cached so repeated completion checks do not go back to the device.
pub struct CommandQueue {
    device: Arc<dyn GraphicsDevice>,
    list_type: CommandListType,
    fence: FenceId,
    /// Next value to signal. Held while submitting so lists and signals stay ordered.
    next_fence_value: Mutex<u64>,
    last_completed: AtomicU64,
    pool: CommandAllocatorPool,
}

impl fmt::Debug for CommandQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandQueue")
            .field("list_type", &self.list_type)
            .field("fence", &self.fence)
            .field("last_completed", &self.last_completed.load(Ordering::Acquire))
            .finish_non_exhaustive()
    }
}

impl CommandQueue {
    /// Creates the queue's fence and an empty allocator pool.
    pub fn new(
        device: Arc<dyn GraphicsDevice>,
        list_type: CommandListType,
    ) -> Result<Self, ResourceError> {
        let fence = device.create_fence(0)?;
        log::debug!("Created {list_type:?} command queue with fence {fence:?}");
        Ok(Self {
            device,
            list_type,
            fence,
            next_fence_value: Mutex::new(1),
            last_completed: AtomicU64::new(0),
            pool: CommandAllocatorPool::new(list_type),
        })
    }

    /// The list type this queue accepts.
    pub fn list_type(&self) -> CommandListType {
        self.list_type
    }

    /// The queue's fence.
    pub fn fence(&self) -> FenceId {
        self.fence
    }

    /// The allocator pool feeding this queue.
    pub fn pool(&self) -> &CommandAllocatorPool {
        &self.pool
    }

    /// Submits a closed list and signals the fence behind it.
    ///
    /// Returns the fence value that retires once the list has executed.
    pub fn execute_command_list(&self, list: &CommandList) -> Result<u64, RenderError> {
        if list.list_type() != self.list_type {
            return Err(RenderError::RenderingFailed(format!(
                "{:?} list '{}' submitted to the {:?} queue",
                list.list_type(),
                list.label(),
                self.list_type
            )));
        }
        let mut next = self.lock_next()?;
        self.device.execute_command_lists(self.list_type, &[list])?;
        let value = *next;
        self.device.signal_fence(self.list_type, self.fence, value)?;
        *next += 1;
        Ok(value)
    }

    /// Signals the fence without submitting work and returns the signalled value.
    pub fn signal(&self) -> Result<u64, RenderError> {
        let mut next = self.lock_next()?;
        let value = *next;
        self.device.signal_fence(self.list_type, self.fence, value)?;
        *next += 1;
        Ok(value)
    }

    /// Value the next signal will use.
    pub fn next_fence_value(&self) -> u64 {
        self.next_fence_value
            .lock()
            .map(|next| *next)
            .unwrap_or_default()
    }

    /// Refreshes and returns the last value the GPU has completed.
    pub fn completed_fence_value(&self) -> u64 {
        let completed = self.device.fence_completed_value(self.fence);
        self.last_completed.fetch_max(completed, Ordering::AcqRel).max(completed)
    }

    /// Returns `true` once `value` has retired.
    pub fn is_fence_complete(&self, value: u64) -> bool {
        value <= self.last_completed.load(Ordering::Acquire) || value <= self.completed_fence_value()
    }

    /// Blocks the calling thread until `value` has retired. There is no timeout.
    pub fn wait_for_fence(&self, value: u64) -> Result<(), RenderError> {
        if self.is_fence_complete(value) {
            return Ok(());
        }
        self.device.wait_for_fence(self.fence, value)?;
        self.last_completed.fetch_max(value, Ordering::AcqRel);
        Ok(())
    }

    /// Blocks until every submitted list has executed.
    pub fn wait_for_idle(&self) -> Result<(), RenderError> {
        let value = self.signal()?;
        self.wait_for_fence(value)
    }

    /// Makes this queue wait on the GPU timeline for `value` on `other`'s fence.
    pub fn wait_for_queue(&self, other: &CommandQueue, value: u64) -> Result<(), RenderError> {
        self.device.queue_wait(self.list_type, other.fence, value)
    }

    /// Requests an allocator whose previous work has retired.
    pub fn request_allocator(&self) -> Result<CommandAllocatorId, ResourceError> {
        let completed = self.completed_fence_value();
        self.pool.request_allocator(self.device.as_ref(), completed)
    }

    /// Hands `allocator` back to the pool, reusable once `fence_value` retires.
    pub fn discard_allocator(&self, fence_value: u64, allocator: CommandAllocatorId) {
        self.pool.discard_allocator(fence_value, allocator);
    }

    fn lock_next(&self) -> Result<std::sync::MutexGuard<'_, u64>, RenderError> {
        self.next_fence_value
            .lock()
            .map_err(|_| RenderError::Internal("command queue mutex poisoned".into()))
    }
}

/// Owns the direct, compute and copy queues.
#[derive(Debug)]
pub struct CommandQueueManager {
    direct: CommandQueue,
    compute: CommandQueue,
    copy: CommandQueue,
}

impl CommandQueueManager {
    /// Creates one queue per list type on `device`.
    pub fn new(device: Arc<dyn GraphicsDevice>) -> Result<Self, ResourceError> {
        Ok(Self {
            direct: CommandQueue::new(Arc::clone(&device), CommandListType::Direct)?,
            compute: CommandQueue::new(Arc::clone(&device), CommandListType::Compute)?,
            copy: CommandQueue::new(device, CommandListType::Copy)?,
        })
    }

    /// The queue serving `list_type`.
    pub fn queue(&self, list_type: CommandListType) -> &CommandQueue {
        match list_type {
            CommandListType::Direct => &self.direct,
            CommandListType::Compute => &self.compute,
            CommandListType::Copy => &self.copy,
        }
    }

    /// The direct (graphics) queue.
    pub fn graphics_queue(&self) -> &CommandQueue {
        &self.direct
    }

    /// The compute queue.
    pub fn compute_queue(&self) -> &CommandQueue {
        &self.compute
    }

    /// The copy queue.
    pub fn copy_queue(&self) -> &CommandQueue {
        &self.copy
    }

    /// Creates a new list open for recording on a pooled allocator.
    ///
    /// Lists themselves are never pooled; only their allocators are recycled.
    pub fn allocate_command_list(
        &self,
        list_type: CommandListType,
        label: impl Into<String>,
    ) -> Result<CommandList, ResourceError> {
        let allocator = self.queue(list_type).request_allocator()?;
        Ok(CommandList::new(list_type, allocator, label))
    }

    /// Returns `allocator` to the pool of `list_type` once `fence_value` retires.
    pub fn discard(&self, list_type: CommandListType, allocator: CommandAllocatorId, fence_value: u64) {
        self.queue(list_type).discard_allocator(fence_value, allocator);
    }

    /// Closes `list`, submits it on its queue and recycles its allocator behind the
    /// returned fence value.
    ///
    /// The allocator is recycled immediately when closing or submitting fails.
    pub fn close_and_execute(&self, list: &mut CommandList) -> Result<u64, RenderError> {
        let queue = self.queue(list.list_type());
        let submitted = list
            .close()
            .map_err(RenderError::from)
            .and_then(|()| queue.execute_command_list(list));
        match submitted {
            Ok(value) => {
                queue.discard_allocator(value, list.allocator());
                Ok(value)
            }
            Err(err) => {
                queue.discard_allocator(0, list.allocator());
                Err(err)
            }
        }
    }

    /// Blocks until every queue is idle.
    pub fn wait_for_idle(&self) -> Result<(), RenderError> {
        for list_type in CommandListType::ALL {
            self.queue(list_type).wait_for_idle()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockDevice;

    fn manager() -> (Arc<MockDevice>, CommandQueueManager) {
        let device = Arc::new(MockDevice::new());
        let manager = CommandQueueManager::new(device.clone()).unwrap();
        (device, manager)
    }

    #[test]
    fn queue_lookup_is_by_type() {
        let (_, manager) = manager();
        for list_type in CommandListType::ALL {
            assert_eq!(manager.queue(list_type).list_type(), list_type);
        }
        assert_ne!(manager.graphics_queue().fence(), manager.copy_queue().fence());
    }

    #[test]
    fn fence_values_increase_per_submission() {
        let (device, manager) = manager();
        let mut first = manager.allocate_command_list(CommandListType::Direct, "a").unwrap();
        let mut second = manager.allocate_command_list(CommandListType::Direct, "b").unwrap();
        let v1 = manager.close_and_execute(&mut first).unwrap();
        let v2 = manager.close_and_execute(&mut second).unwrap();
        assert_eq!((v1, v2), (1, 2));
        assert_eq!(device.executed_lists().len(), 2);
        assert!(manager.graphics_queue().is_fence_complete(2));
    }

    #[test]
    fn allocator_is_recycled_after_its_fence_retires() {
        let (device, manager) = manager();
        device.set_auto_complete(false);
        let mut list = manager.allocate_command_list(CommandListType::Direct, "frame").unwrap();
        let allocator = list.allocator();
        let value = manager.close_and_execute(&mut list).unwrap();

        let pending = manager.allocate_command_list(CommandListType::Direct, "next").unwrap();
        assert_ne!(pending.allocator(), allocator);

        device.complete_fence(manager.graphics_queue().fence(), value);
        let reused = manager.allocate_command_list(CommandListType::Direct, "later").unwrap();
        assert_eq!(reused.allocator(), allocator);
    }

    #[test]
    fn discarded_allocator_is_handed_out_again() {
        let (device, manager) = manager();
        let allocator = manager.graphics_queue().request_allocator().unwrap();
        let created = device.allocator_count();

        manager.discard(CommandListType::Direct, allocator, 0);
        let list = manager.allocate_command_list(CommandListType::Direct, "reuse").unwrap();
        assert_eq!(list.allocator(), allocator);
        assert_eq!(device.allocator_count(), created);
    }

    #[test]
    fn failed_submission_recycles_the_allocator() {
        let (device, manager) = manager();
        let mut list = manager.allocate_command_list(CommandListType::Compute, "lost").unwrap();
        let allocator = list.allocator();
        device.fail_next_submission(CommandListType::Compute);

        assert!(manager.close_and_execute(&mut list).is_err());
        let retry = manager.allocate_command_list(CommandListType::Compute, "retry").unwrap();
        assert_eq!(retry.allocator(), allocator);
        assert!(device.executed_lists().is_empty());
    }

    #[test]
    fn wait_for_fence_blocks_on_pending_values_only() {
        let (device, manager) = manager();
        device.set_auto_complete(false);
        let queue = manager.compute_queue();
        let value = queue.signal().unwrap();
        assert!(!queue.is_fence_complete(value));

        queue.wait_for_fence(value).unwrap();
        assert!(queue.is_fence_complete(value));
        queue.wait_for_fence(value).unwrap();
        assert_eq!(device.blocking_wait_count(), 1);
    }

    #[test]
    fn rejects_list_on_wrong_queue() {
        let (_, manager) = manager();
        let mut list = manager.allocate_command_list(CommandListType::Copy, "upload").unwrap();
        list.close().unwrap();
        let result = manager.graphics_queue().execute_command_list(&list);
        assert!(matches!(result, Err(RenderError::RenderingFailed(_))));
    }

    #[test]
    fn closing_twice_fails_submission() {
        let (_, manager) = manager();
        let mut list = manager.allocate_command_list(CommandListType::Direct, "x").unwrap();
        list.close().unwrap();
        let result = manager.close_and_execute(&mut list);
        assert!(matches!(
            result,
            Err(RenderError::ResourceError(ResourceError::CommandListClosed))
        ));
    }

    #[test]
    fn cross_queue_wait_is_recorded() {
        let (device, manager) = manager();
        let value = manager.compute_queue().signal().unwrap();
        manager
            .graphics_queue()
            .wait_for_queue(manager.compute_queue(), value)
            .unwrap();
        assert_eq!(
            device.queue_waits(),
            vec![(CommandListType::Direct, manager.compute_queue().fence(), value)]
        );
    }
}
