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

use super::GpuResource;
use crate::renderer::api::{CommandList, ResourceBarrier, ResourceKey, ResourceState};
use crate::renderer::error::ResourceError;
use std::collections::HashMap;

/// The current access state of every tracked resource.
#[derive(Debug, Default)]
pub struct ResourceStateTable {
    states: HashMap<ResourceKey, ResourceState>,
}

impl ResourceStateTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts tracking `resource` in its creation state.
    pub fn track(&mut self, resource: &dyn GpuResource) {
        self.register(resource.key(), resource.initial_state());
    }

    /// Starts tracking `key` in `state`, replacing any previous entry.
    pub fn register(&mut self, key: impl Into<ResourceKey>, state: ResourceState) {
        self.states.insert(key.into(), state);
    }

    /// Stops tracking `key`.
    pub fn forget(&mut self, key: impl Into<ResourceKey>) {
        self.states.remove(&key.into());
    }

    /// The current state of `key`, if tracked.
    pub fn state(&self, key: impl Into<ResourceKey>) -> Option<ResourceState> {
        self.states.get(&key.into()).copied()
    }

    /// Number of tracked resources.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Returns `true` when nothing is tracked.
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Opens a transaction collecting the states one pass needs.
    pub fn transaction(&mut self) -> StateTransaction<'_> {
        StateTransaction {
            table: self,
            requests: Vec::new(),
        }
    }

    /// Moves a single resource to `state`, recording a barrier when it changes.
    pub fn transition(
        &mut self,
        list: &mut CommandList,
        key: impl Into<ResourceKey>,
        state: ResourceState,
    ) -> Result<(), ResourceError> {
        let mut transaction = self.transaction();
        transaction.require(key, state)?;
        transaction.commit(list)?;
        Ok(())
    }
}

/// The states a pass requires, applied together by [`StateTransaction::commit`].
///
/// Nothing is recorded or changed until the transaction commits; dropping it
/// discards the requests.
#[derive(Debug)]
pub struct StateTransaction<'a> {
    table: &'a mut ResourceStateTable,
    requests: Vec<(ResourceKey, ResourceState)>,
}

impl StateTransaction<'_> {
    /// Requires `key` to be in `state` when the pass runs.
    ///
    /// # Errors
    ///
    /// [`ResourceError::DuplicateTransition`] if `key` was already required in this
    /// transaction, [`ResourceError::UntrackedResource`] if the table does not know it.
    pub fn require(&mut self, key: impl Into<ResourceKey>, state: ResourceState) -> Result<&mut Self, ResourceError> {
        let key = key.into();
        if self.requests.iter().any(|(k, _)| *k == key) {
            return Err(ResourceError::DuplicateTransition(key));
        }
        if !self.table.states.contains_key(&key) {
            return Err(ResourceError::UntrackedResource(key));
        }
        self.requests.push((key, state));
        Ok(self)
    }

    /// Records one batched barrier holding every real transition and updates the table.
    ///
    /// Returns the number of transitions recorded.
    pub fn commit(self, list: &mut CommandList) -> Result<usize, ResourceError> {
        let mut barriers = Vec::with_capacity(self.requests.len());
        for (key, after) in &self.requests {
            let before = self
                .table
                .states
                .get(key)
                .copied()
                .ok_or(ResourceError::UntrackedResource(*key))?;
            if before != *after {
                barriers.push(ResourceBarrier {
                    resource: *key,
                    before,
                    after: *after,
                });
            }
        }
        for (key, after) in self.requests {
            self.table.states.insert(key, after);
        }
        let count = barriers.len();
        list.resource_barrier(barriers);
        Ok(count)
    }
}
