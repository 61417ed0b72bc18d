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

//! Fence emulation on top of `wgpu` submission tracking.
//!
//! `wgpu` has a single queue per device and no user-visible fences. A signal is
//! an empty submission whose index marks "everything submitted so far"; the
//! completion callback raises the fence value, and blocking waits poll the
//! device until that submission retires.

use pyre_core::renderer::RenderError;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// A monotonically increasing completion counter backed by submission indices.
#[derive(Debug)]
pub(crate) struct EmulatedFence {
    completed: Arc<AtomicU64>,
    pending: Mutex<Vec<(u64, wgpu::SubmissionIndex)>>,
}

impl EmulatedFence {
    pub(crate) fn new(initial_value: u64) -> Self {
        Self {
            completed: Arc::new(AtomicU64::new(initial_value)),
            pending: Mutex::new(Vec::new()),
        }
    }

    /// The last value the fence is known to have reached.
    pub(crate) fn completed(&self) -> u64 {
        self.completed.load(Ordering::Acquire)
    }

    /// Schedules the fence to reach `value` once all work submitted so far retires.
    pub(crate) fn signal(&self, queue: &wgpu::Queue, value: u64) -> Result<(), RenderError> {
        let index = queue.submit(std::iter::empty());
        let completed = Arc::clone(&self.completed);
        queue.on_submitted_work_done(move || {
            completed.fetch_max(value, Ordering::AcqRel);
        });
        self.pending
            .lock()
            .map_err(|_| RenderError::Internal("fence mutex poisoned".into()))?
            .push((value, index));
        Ok(())
    }

    /// Blocks until the fence reaches `value`.
    pub(crate) fn wait(&self, device: &wgpu::Device, value: u64) -> Result<(), RenderError> {
        if self.completed() >= value {
            return Ok(());
        }
        let (target, index) = {
            let pending = self
                .pending
                .lock()
                .map_err(|_| RenderError::Internal("fence mutex poisoned".into()))?;
            pending
                .iter()
                .filter(|(v, _)| *v >= value)
                .min_by_key(|(v, _)| *v)
                .map(|(v, index)| (*v, index.clone()))
                .ok_or_else(|| {
                    RenderError::FenceWait(format!("value {value} was never signaled"))
                })?
        };
        device
            .poll(wgpu::PollType::WaitForSubmissionIndex(index))
            .map_err(|e| RenderError::FenceWait(e.to_string()))?;
        // The submission retired, so everything signaled at or below `target` did too.
        self.completed.fetch_max(target, Ordering::AcqRel);
        self.retire();
        Ok(())
    }

    /// Drops pending signals the fence has already passed.
    pub(crate) fn retire(&self) {
        let done = self.completed();
        if let Ok(mut pending) = self.pending.lock() {
            pending.retain(|(v, _)| *v > done);
        }
    }
}
