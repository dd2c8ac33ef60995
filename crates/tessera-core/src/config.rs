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

//! Settings for a [`Registry`](crate::Registry).

/// The number of identity slots a registry manages by default.
pub const DEFAULT_SLOT_CAPACITY: usize = 1024;

/// What the slot allocator does when every slot is held.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExhaustionPolicy {
    /// Log an error and refuse the acquisition.
    #[default]
    Fail,
    /// Double the pool (at least one more slot) and hand out a fresh id.
    Grow,
    /// Log an error and hand out the sentinel slot `0`.
    ///
    /// The sentinel aliases whichever collection already holds slot `0`, so
    /// both collections see each other's capabilities. Kept only for hosts
    /// that depend on the legacy degradation.
    Sentinel,
}

/// A collection of settings for the identity slot allocator and the capability pools.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryConfig {
    /// The number of identity slots available before the exhaustion policy applies.
    pub slot_capacity: usize,
    /// The behavior once all `slot_capacity` slots are held.
    pub exhaustion: ExhaustionPolicy,
}

impl RegistryConfig {
    /// Returns a copy of this configuration with a different slot capacity.
    #[must_use]
    pub fn with_slot_capacity(mut self, slot_capacity: usize) -> Self {
        self.slot_capacity = slot_capacity;
        self
    }

    /// Returns a copy of this configuration with a different exhaustion policy.
    #[must_use]
    pub fn with_exhaustion_policy(mut self, exhaustion: ExhaustionPolicy) -> Self {
        self.exhaustion = exhaustion;
        self
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            slot_capacity: DEFAULT_SLOT_CAPACITY,
            exhaustion: ExhaustionPolicy::Fail,
        }
    }
}
