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

use crate::renderer::api::{CommandAllocatorId, CommandListType};
use crate::renderer::error::ResourceError;
use crate::renderer::traits::GraphicsDevice;
use std::collections::VecDeque;
use std::sync::Mutex;

#[derive(Debug, Default)]
struct PoolState {
    /// Discarded allocators with the fence value that retires them, oldest first.
    ready: VecDeque<(u64, CommandAllocatorId)>,
    created: usize,
}

/// Recycles the command allocators of one list type.
///
/// An allocator discarded at fence value `f` is handed out again only once the
/// queue reports a completed fence value `>= f`; until then requests create fresh
/// allocators, so the pool grows when submission outpaces the GPU.
///
/// The pool is shared between submission threads and guards its queue with a mutex.
#[derive(Debug)]
pub struct CommandAllocatorPool {
    list_type: CommandListType,
    state: Mutex<PoolState>,
}

impl CommandAllocatorPool {
    /// Creates an empty pool for allocators of `list_type`.
    pub fn new(list_type: CommandListType) -> Self {
        Self {
            list_type,
            state: Mutex::new(PoolState::default()),
        }
    }

    /// Returns an allocator ready for recording.
    ///
    /// The oldest discarded allocator is reset and reused when its retire value is
    /// `<= completed_fence_value`; otherwise a new allocator is created.
    ///
    /// # Errors
    ///
    /// Propagates device failures while resetting or creating an allocator.
    pub fn request_allocator(
        &self,
        device: &dyn GraphicsDevice,
        completed_fence_value: u64,
    ) -> Result<CommandAllocatorId, ResourceError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| ResourceError::BackendError("allocator pool mutex poisoned".into()))?;

        if let Some(&(retire_value, allocator)) = state.ready.front() {
            if retire_value <= completed_fence_value {
                device.reset_command_allocator(allocator)?;
                state.ready.pop_front();
                return Ok(allocator);
            }
        }

        let allocator = device.create_command_allocator(self.list_type)?;
        state.created += 1;
        log::debug!(
            "Created {:?} command allocator {:?} ({} in pool)",
            self.list_type,
            allocator,
            state.created
        );
        Ok(allocator)
    }

    /// Queues `allocator` for reuse once `fence_value` has retired.
    pub fn discard_allocator(&self, fence_value: u64, allocator: CommandAllocatorId) {
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        state.ready.push_back((fence_value, allocator));
    }

    /// Number of allocators this pool has created.
    pub fn size(&self) -> usize {
        self.state
            .lock()
            .map(|state| state.created)
            .unwrap_or_default()
    }

    /// Number of discarded allocators waiting for reuse.
    pub fn ready_count(&self) -> usize {
        self.state
            .lock()
            .map(|state| state.ready.len())
            .unwrap_or_default()
    }

    /// The list type served by this pool.
    pub fn list_type(&self) -> CommandListType {
        self.list_type
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockDevice;
    use std::collections::HashMap;
    use std::sync::Arc;

    #[test]
    fn reuses_allocator_discarded_at_completed_value() {
        let device = MockDevice::new();
        let pool = CommandAllocatorPool::new(CommandListType::Direct);
        let first = pool.request_allocator(&device, 0).unwrap();
        pool.discard_allocator(5, first);

        let again = pool.request_allocator(&device, 5).unwrap();
        assert_eq!(again, first);
        assert_eq!(device.allocator_resets(first), 1);
        assert_eq!(pool.size(), 1);
    }

    #[test]
    fn creates_new_allocator_while_fence_is_pending() {
        let device = MockDevice::new();
        let pool = CommandAllocatorPool::new(CommandListType::Direct);
        let first = pool.request_allocator(&device, 0).unwrap();
        pool.discard_allocator(5, first);

        let second = pool.request_allocator(&device, 4).unwrap();
        assert_ne!(second, first);
        assert_eq!(device.allocator_resets(first), 0);
        assert_eq!(pool.size(), 2);
        assert_eq!(pool.ready_count(), 1);
    }

    #[test]
    fn reuse_is_fifo() {
        let device = MockDevice::new();
        let pool = CommandAllocatorPool::new(CommandListType::Compute);
        let a = pool.request_allocator(&device, 0).unwrap();
        let b = pool.request_allocator(&device, 0).unwrap();
        pool.discard_allocator(1, a);
        pool.discard_allocator(2, b);

        assert_eq!(pool.request_allocator(&device, 10).unwrap(), a);
        assert_eq!(pool.request_allocator(&device, 10).unwrap(), b);
    }

    /// Replays a scripted sequence of requests and discards and checks that no
    /// allocator is handed out before its retire value completes.
    #[test]
    fn never_returns_allocator_before_retire_value() {
        let device = MockDevice::new();
        let pool = CommandAllocatorPool::new(CommandListType::Direct);
        let mut retire_of: HashMap<CommandAllocatorId, u64> = HashMap::new();
        let mut in_use: Vec<CommandAllocatorId> = Vec::new();
        let mut completed = 0u64;
        let mut next_fence = 1u64;

        for step in 0..200u64 {
            if step % 3 == 0 {
                completed = completed.max(next_fence.saturating_sub(1 + step % 4));
            }
            if step % 2 == 0 || in_use.is_empty() {
                let allocator = pool.request_allocator(&device, completed).unwrap();
                if let Some(retire) = retire_of.get(&allocator) {
                    assert!(
                        *retire <= completed,
                        "allocator {allocator:?} reused at completed={completed} before retire={retire}"
                    );
                }
                in_use.push(allocator);
            } else {
                let allocator = in_use.remove(0);
                pool.discard_allocator(next_fence, allocator);
                retire_of.insert(allocator, next_fence);
                next_fence += 1;
            }
        }
    }

    #[test]
    fn pool_is_shared_across_threads() {
        let device = Arc::new(MockDevice::new());
        let pool = Arc::new(CommandAllocatorPool::new(CommandListType::Direct));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let device = Arc::clone(&device);
                let pool = Arc::clone(&pool);
                std::thread::spawn(move || {
                    for fence in 1..=25 {
                        let allocator = pool.request_allocator(device.as_ref(), fence - 1).unwrap();
                        pool.discard_allocator(fence, allocator);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(pool.ready_count(), pool.size());
    }
}
